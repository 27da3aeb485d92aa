use aatoolbox::config::{CountryConfig, PathConfig};
use aatoolbox::datasources::glofas::{
    CdsRetrieve, DischargeGrid, Glofas, GlofasProduct, GlofasRequest, GribDecoder, Members, MessageKind,
};
use aatoolbox::error::{AatoolboxError, Result};
use aatoolbox::http::{ChannelProgress, ProgressMessage};
use aatoolbox::utils::GeoBoundingBox;
use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Mutex};

const COUNTRY: &str = r#"
iso3 = "abc"

[glofas]
reporting_points = [
    { name = "station_1", lon = 0.52, lat = -0.83 },
    { name = "station_2", lon = 2.11, lat = 0.48 },
]
"#;

#[derive(Default)]
struct MockCds {
    calls: Mutex<Vec<(String, Value, PathBuf)>>,
}

impl MockCds {
    fn calls(&self) -> Vec<(String, Value, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

impl CdsRetrieve for MockCds {
    fn retrieve(&self, name: &str, request: &Value, target: &Path) -> Result<()> {
        std::fs::write(target, b"GRIB")?;
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), request.clone(), target.to_path_buf()));
        Ok(())
    }
}

/// Serves prepared grids in place of real GRIB decoding
struct FakeDecoder {
    all: Option<DischargeGrid>,
    control: Option<DischargeGrid>,
    perturbed: Option<DischargeGrid>,
}

impl GribDecoder for FakeDecoder {
    fn decode(&self, path: &Path, kind: MessageKind) -> Result<DischargeGrid> {
        assert!(path.is_file());
        let grid = match kind {
            MessageKind::All => &self.all,
            MessageKind::Control => &self.control,
            MessageKind::Perturbed => &self.perturbed,
        };
        grid.clone()
            .ok_or_else(|| AatoolboxError::Processing(format!("no {:?} messages", kind)))
    }
}

fn paths(dir: &Path) -> PathConfig {
    PathConfig::with_base_dir(dir)
}

fn country() -> CountryConfig {
    CountryConfig::from_toml_str(COUNTRY).unwrap()
}

fn download_bbox() -> GeoBoundingBox {
    GeoBoundingBox::new(1.0, -2.2, 3.3, -4.4).unwrap()
}

fn process_bbox() -> GeoBoundingBox {
    GeoBoundingBox::new(1.0, -2.0, 3.0, -4.0).unwrap()
}

fn months() -> Vec<String> {
    (1..=12).map(|m| format!("{:02}", m)).collect()
}

fn days() -> Vec<String> {
    (1..=31).map(|d| format!("{:02}", d)).collect()
}

// Cell centres offset by half a cell from the bounding box, as on the GloFAS grid
fn latitudes() -> Vec<f64> {
    (0..50).map(|i| -2.05 + 0.1 * i as f64).collect()
}

fn longitudes() -> Vec<f64> {
    (0..90).map(|i| -4.05 + 0.1 * i as f64).collect()
}

fn times() -> Vec<NaiveDateTime> {
    (0..2)
        .map(|d| {
            NaiveDate::from_ymd_opt(2014, 9, 6 + d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        })
        .collect()
}

fn random_grid(members: Members, step: Option<Vec<u32>>, seed: u64) -> DischargeGrid {
    let n_members = match &members {
        Members::Axis(numbers) => numbers.len(),
        _ => 1,
    };
    let n_steps = step.as_ref().map_or(1, Vec::len);
    let size = n_members * 2 * n_steps * 50 * 90;
    let mut rng = StdRng::seed_from_u64(seed);
    let dis24 = (0..size).map(|_| 5000.0 + 100.0 * rng.gen::<f64>()).collect();
    DischargeGrid::new(members, times(), step, latitudes(), longitudes(), dis24).unwrap()
}

fn nearest(coords: &[f64], value: f64) -> usize {
    coords
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - value).abs().total_cmp(&(*b - value).abs()))
        .map(|(i, _)| i)
        .unwrap()
}

fn expected_series(grid: &DischargeGrid, lon: f64, lat: f64) -> Vec<f64> {
    let (n_lat, n_lon) = (grid.latitude.len(), grid.longitude.len());
    let (i_lat, i_lon) = (nearest(&grid.latitude, lat), nearest(&grid.longitude, lon));
    let rows = grid.dis24.len() / (n_lat * n_lon);
    (0..rows)
        .map(|r| grid.dis24[(r * n_lat + i_lat) * n_lon + i_lon])
        .collect()
}

fn assert_column(df: &polars::prelude::DataFrame, name: &str, expected: &[f64]) {
    let values: Vec<f64> = df
        .column(name)
        .unwrap()
        .f64()
        .unwrap()
        .into_no_null_iter()
        .collect();
    assert_eq!(values.len(), expected.len());
    for (a, b) in values.iter().zip(expected) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }
}

#[test]
fn test_reanalysis_download() {
    let dir = tempfile::tempdir().unwrap();
    let glofas = Glofas::new(&paths(dir.path()), country(), GlofasProduct::Reanalysis, download_bbox()).unwrap();
    let client = MockCds::default();
    let (tx, rx) = mpsc::channel();
    let mut progress = ChannelProgress::new(tx);

    glofas
        .download(&client, &GlofasRequest::years(2000, 2000), false, &mut progress)
        .unwrap();

    let calls = client.calls();
    assert_eq!(calls.len(), 1);
    let (name, request, target) = &calls[0];
    assert_eq!(name, "cems-glofas-historical");
    assert_eq!(
        request,
        &json!({
            "variable": "river_discharge_in_the_last_24_hours",
            "format": "grib",
            "dataset": ["consolidated_reanalysis"],
            "hyear": "2000",
            "hmonth": months(),
            "hday": days(),
            "geo_bounding_box": [1.05, -4.45, -2.25, 3.35],
            "system_version": "version_3_1",
            "hydrological_model": "lisflood",
        })
    );
    assert_eq!(
        target,
        &dir.path().join(
            "public/raw/abc/glofas/cems-glofas-historical/abc_cems-glofas-historical_2000_Np1d1Sm2d2Ep3d4Wm4d5.grib"
        )
    );

    let messages: Vec<ProgressMessage> = rx.try_iter().collect();
    assert_eq!(
        messages,
        vec![
            ProgressMessage::Started { current: 1, total: 1 },
            ProgressMessage::Completed { current: 1, total: 1 },
        ]
    );
}

#[test]
fn test_forecast_download() {
    let dir = tempfile::tempdir().unwrap();
    let glofas = Glofas::new(&paths(dir.path()), country(), GlofasProduct::Forecast, download_bbox()).unwrap();
    let client = MockCds::default();
    let request = GlofasRequest::years(2000, 2000).with_leadtime(3);

    glofas
        .download(&client, &request, false, &mut aatoolbox::http::LogProgress)
        .unwrap();

    let calls = client.calls();
    let (name, request, target) = &calls[0];
    assert_eq!(name, "cems-glofas-forecast");
    assert_eq!(
        request,
        &json!({
            "variable": "river_discharge_in_the_last_24_hours",
            "format": "grib",
            "product_type": ["control_forecast", "ensemble_perturbed_forecasts"],
            "year": "2000",
            "month": months(),
            "day": days(),
            "geo_bounding_box": [1.05, -4.45, -2.25, 3.35],
            "system_version": "operational",
            "hydrological_model": "lisflood",
            "leadtime_hour": ["24", "48", "72"],
        })
    );
    assert_eq!(
        target,
        &dir.path().join(
            "public/raw/abc/glofas/cems-glofas-forecast/abc_cems-glofas-forecast_2000_ltmax03d_Np1d1Sm2d2Ep3d4Wm4d5.grib"
        )
    );
}

#[test]
fn test_reforecast_download() {
    let dir = tempfile::tempdir().unwrap();
    let glofas = Glofas::new(&paths(dir.path()), country(), GlofasProduct::Reforecast, download_bbox()).unwrap();
    let client = MockCds::default();
    let request = GlofasRequest::years(2000, 2000).with_leadtime(3);

    glofas
        .download(&client, &request, false, &mut aatoolbox::http::LogProgress)
        .unwrap();

    let calls = client.calls();
    let (name, request, target) = &calls[0];
    assert_eq!(name, "cems-glofas-reforecast");
    assert_eq!(
        request,
        &json!({
            "variable": "river_discharge_in_the_last_24_hours",
            "format": "grib",
            "product_type": ["control_reforecast", "ensemble_perturbed_reforecasts"],
            "hyear": "2000",
            "hmonth": months(),
            "hday": days(),
            "geo_bounding_box": [1.05, -4.45, -2.25, 3.35],
            "system_version": "version_3_1",
            "hydrological_model": "lisflood",
            "leadtime_hour": ["24", "48", "72"],
        })
    );
    assert_eq!(
        target,
        &dir.path().join(
            "public/raw/abc/glofas/cems-glofas-reforecast/abc_cems-glofas-reforecast_2000_ltmax03d_Np1d1Sm2d2Ep3d4Wm4d5.grib"
        )
    );
}

#[test]
fn test_download_skips_existing_files() {
    let dir = tempfile::tempdir().unwrap();
    let glofas = Glofas::new(&paths(dir.path()), country(), GlofasProduct::Reanalysis, download_bbox()).unwrap();
    let client = MockCds::default();
    let request = GlofasRequest::years(2000, 2001);
    let (tx, rx) = mpsc::channel();
    let mut progress = ChannelProgress::new(tx);

    glofas.download(&client, &request, false, &mut progress).unwrap();
    let files = glofas.download(&client, &request, false, &mut progress).unwrap();
    assert_eq!(client.calls().len(), 2);
    assert_eq!(files.len(), 2);

    let skipped = rx
        .try_iter()
        .filter(|m| matches!(m, ProgressMessage::Skipped { .. }))
        .count();
    assert_eq!(skipped, 2);

    glofas.download(&client, &request, true, &mut progress).unwrap();
    assert_eq!(client.calls().len(), 4);
}

#[test]
fn test_download_rejects_invalid_requests() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockCds::default();
    let mut progress = aatoolbox::http::LogProgress;

    let reanalysis = Glofas::new(&paths(dir.path()), country(), GlofasProduct::Reanalysis, download_bbox()).unwrap();
    let with_leadtime = GlofasRequest::years(2000, 2000).with_leadtime(3);
    assert!(reanalysis.download(&client, &with_leadtime, false, &mut progress).is_err());
    assert!(reanalysis
        .download(&client, &GlofasRequest::years(1981, 1980), false, &mut progress)
        .is_err());

    let forecast = Glofas::new(&paths(dir.path()), country(), GlofasProduct::Forecast, download_bbox()).unwrap();
    assert!(forecast
        .download(&client, &GlofasRequest::years(2021, 2021), false, &mut progress)
        .is_err());
    let too_long = GlofasRequest::years(2021, 2021).with_leadtime(31);
    assert!(forecast.download(&client, &too_long, false, &mut progress).is_err());

    assert!(client.calls().is_empty());
}

#[test]
fn test_reanalysis_process() {
    let dir = tempfile::tempdir().unwrap();
    let glofas = Glofas::new(&paths(dir.path()), country(), GlofasProduct::Reanalysis, process_bbox()).unwrap();
    let request = GlofasRequest::years(2000, 2000);
    glofas
        .download(&MockCds::default(), &request, false, &mut aatoolbox::http::LogProgress)
        .unwrap();

    let grid = random_grid(Members::None, None, 12345);
    let decoder = FakeDecoder {
        all: Some(grid.clone()),
        control: None,
        perturbed: None,
    };

    let output = glofas.process(&decoder, &request, false).unwrap();
    assert_eq!(
        output,
        dir.path().join("public/processed/abc/glofas/abc_cems-glofas-historical_2000-2000_Np1d1Sm2d0Ep3d0Wm4d0.csv")
    );

    let df = glofas.load(&request).unwrap();
    let names: Vec<&str> = df.get_column_names().iter().map(|c| c.as_str()).collect();
    assert_eq!(names, vec!["time", "station_1", "station_2"]);
    assert_eq!(df.height(), 2);
    assert_column(&df, "station_1", &expected_series(&grid, 0.52, -0.83));
    assert_column(&df, "station_2", &expected_series(&grid, 2.11, 0.48));
}

#[test]
fn test_year_ranges_are_processed_separately() {
    let dir = tempfile::tempdir().unwrap();
    let glofas = Glofas::new(&paths(dir.path()), country(), GlofasProduct::Reanalysis, process_bbox()).unwrap();
    let one_year = GlofasRequest::years(2000, 2000);
    let two_years = GlofasRequest::years(2000, 2001);
    glofas
        .download(&MockCds::default(), &two_years, false, &mut aatoolbox::http::LogProgress)
        .unwrap();

    let grid = random_grid(Members::None, None, 7);
    let decoder = FakeDecoder {
        all: Some(grid.clone()),
        control: None,
        perturbed: None,
    };
    let short = glofas.process(&decoder, &one_year, false).unwrap();
    let long = glofas.process(&decoder, &two_years, false).unwrap();
    assert_ne!(short, long);
    assert!(short.is_file() && long.is_file());

    assert_eq!(glofas.load(&one_year).unwrap().height(), 2);

    // One grid per yearly file, joined along time
    let df = glofas.load(&two_years).unwrap();
    assert_eq!(df.height(), 4);
    let mut expected = expected_series(&grid, 0.52, -0.83);
    expected.extend(expected_series(&grid, 0.52, -0.83));
    assert_column(&df, "station_1", &expected);

    let reforecast = Glofas::new(&paths(dir.path()), country(), GlofasProduct::Reforecast, process_bbox()).unwrap();
    let a = reforecast.processed_filepath(2000, 2000, Some(3));
    let b = reforecast.processed_filepath(2000, 2000, Some(5));
    assert_ne!(a, b);
}

#[test]
fn test_forecast_process() {
    let dir = tempfile::tempdir().unwrap();
    let glofas = Glofas::new(&paths(dir.path()), country(), GlofasProduct::Reforecast, process_bbox()).unwrap();
    let request = GlofasRequest::years(2000, 2000).with_leadtime(3);
    glofas
        .download(&MockCds::default(), &request, false, &mut aatoolbox::http::LogProgress)
        .unwrap();

    let steps = Some(vec![24, 48, 72]);
    let control = random_grid(Members::Scalar(0), steps.clone(), 1);
    let perturbed = random_grid(Members::Axis((1..=6).collect()), steps, 2);
    let decoder = FakeDecoder {
        all: None,
        control: Some(control.clone()),
        perturbed: Some(perturbed.clone()),
    };

    glofas.process(&decoder, &request, false).unwrap();
    let df = glofas.load(&request).unwrap();

    let names: Vec<&str> = df.get_column_names().iter().map(|c| c.as_str()).collect();
    assert_eq!(names, vec!["number", "time", "step", "station_1", "station_2"]);
    assert_eq!(df.height(), 7 * 2 * 3);

    let numbers: Vec<i64> = df
        .column("number")
        .unwrap()
        .i64()
        .unwrap()
        .into_no_null_iter()
        .collect();
    assert_eq!(&numbers[..6], &[0; 6]);
    assert_eq!(numbers[6], 1);
    assert_eq!(numbers[41], 6);

    let mut expected = expected_series(&control, 0.52, -0.83);
    expected.extend(expected_series(&perturbed, 0.52, -0.83));
    assert_column(&df, "station_1", &expected);
}

#[test]
fn test_process_does_not_clobber() {
    let dir = tempfile::tempdir().unwrap();
    let glofas = Glofas::new(&paths(dir.path()), country(), GlofasProduct::Reanalysis, process_bbox()).unwrap();
    let request = GlofasRequest::years(2000, 2000);
    glofas
        .download(&MockCds::default(), &request, false, &mut aatoolbox::http::LogProgress)
        .unwrap();

    let first = FakeDecoder {
        all: Some(random_grid(Members::None, None, 1)),
        control: None,
        perturbed: None,
    };
    glofas.process(&first, &request, false).unwrap();

    let second_grid = random_grid(Members::None, None, 2);
    let second = FakeDecoder {
        all: Some(second_grid.clone()),
        control: None,
        perturbed: None,
    };
    glofas.process(&second, &request, false).unwrap();
    let df = glofas.load(&request).unwrap();
    let unchanged = expected_series(&second_grid, 0.52, -0.83);
    let values = df.column("station_1").unwrap().f64().unwrap().get(0).unwrap();
    assert!((values - unchanged[0]).abs() > 1e-9);

    glofas.process(&second, &request, true).unwrap();
    let df = glofas.load(&request).unwrap();
    assert_column(&df, "station_1", &unchanged);
}

#[test]
fn test_process_requires_raw_files() {
    let dir = tempfile::tempdir().unwrap();
    let glofas = Glofas::new(&paths(dir.path()), country(), GlofasProduct::Reanalysis, process_bbox()).unwrap();
    let decoder = FakeDecoder {
        all: Some(random_grid(Members::None, None, 1)),
        control: None,
        perturbed: None,
    };
    let err = glofas
        .process(&decoder, &GlofasRequest::years(2000, 2000), false)
        .unwrap_err();
    assert!(matches!(err, AatoolboxError::FileNotFound { .. }));
}

#[test]
fn test_process_requires_reporting_points() {
    let dir = tempfile::tempdir().unwrap();
    let glofas = Glofas::new(
        &paths(dir.path()),
        CountryConfig::new("abc").unwrap(),
        GlofasProduct::Reanalysis,
        process_bbox(),
    )
    .unwrap();
    let decoder = FakeDecoder {
        all: None,
        control: None,
        perturbed: None,
    };
    let err = glofas
        .process(&decoder, &GlofasRequest::years(2000, 2000), false)
        .unwrap_err();
    assert!(matches!(err, AatoolboxError::Configuration(_)));
}

#[test]
fn test_reporting_point_out_of_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let country = CountryConfig::from_toml_str(
        r#"
iso3 = "abc"
[glofas]
reporting_points = [{ name = "far_away", lon = 50.0, lat = 0.0 }]
"#,
    )
    .unwrap();
    let glofas = Glofas::new(&paths(dir.path()), country, GlofasProduct::Reanalysis, process_bbox()).unwrap();
    let request = GlofasRequest::years(2000, 2000);
    glofas
        .download(&MockCds::default(), &request, false, &mut aatoolbox::http::LogProgress)
        .unwrap();
    let decoder = FakeDecoder {
        all: Some(random_grid(Members::None, None, 1)),
        control: None,
        perturbed: None,
    };

    let err = glofas.process(&decoder, &request, false).unwrap_err();
    match err {
        AatoolboxError::OutOfBounds { name, axis, .. } => {
            assert_eq!(name, "far_away");
            assert_eq!(axis, "lon");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_load_before_process() {
    let dir = tempfile::tempdir().unwrap();
    let glofas = Glofas::new(&paths(dir.path()), country(), GlofasProduct::Reanalysis, process_bbox()).unwrap();
    let err = glofas.load(&GlofasRequest::years(2000, 2000)).unwrap_err();
    assert!(err.to_string().contains("process()"));
}
