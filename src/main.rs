use aatoolbox::config::{create_country_config, AppConfig, ConfigManager, CountryConfig};
use aatoolbox::data::CsvStore;
use aatoolbox::datasources::glofas::CdsClient;
use aatoolbox::datasources::{Glofas, GlofasProduct, GlofasRequest, NdviProduct, UsgsNdvi};
use aatoolbox::http::{HttpClient, LogProgress};
use aatoolbox::raster::{read_features, Stat, StatsOptions};
use aatoolbox::utils::{DateInput, GeoBoundingBox};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "aatoolbox", version, about = "Download and process anticipatory action datasets")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory, overriding the configured base directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect the active configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// USGS FEWS NET eMODIS NDVI
    Ndvi {
        #[command(subcommand)]
        action: NdviAction,
    },
    /// GloFAS river discharge from the Climate Data Store
    Glofas {
        #[command(subcommand)]
        action: GlofasAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the merged configuration as TOML
    Show,
    /// Write the merged configuration to a TOML file
    Save { path: PathBuf },
}

#[derive(Args, Debug)]
struct CountryArgs {
    /// ISO3 code, looked up under the countries directory
    #[arg(long)]
    iso3: String,

    /// Country configuration file overriding the lookup
    #[arg(long)]
    country_config: Option<PathBuf>,
}

impl CountryArgs {
    fn load(&self, app: &AppConfig) -> Result<CountryConfig> {
        let config = match &self.country_config {
            Some(path) => CountryConfig::load_from_file(path)?,
            None => create_country_config(&self.iso3, &app.path)?,
        };
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct NdviArgs {
    #[command(flatten)]
    country: CountryArgs,

    #[arg(long, default_value = "smoothed")]
    product: NdviProduct,

    /// First dekad, `YYYY-MM-DD` or `YYYY-dNN`
    #[arg(long)]
    start: Option<DateInput>,

    /// Last dekad, `YYYY-MM-DD` or `YYYY-dNN`
    #[arg(long)]
    end: Option<DateInput>,

    #[arg(long)]
    clobber: bool,
}

#[derive(Subcommand, Debug)]
enum NdviAction {
    Download(NdviArgs),
    Process {
        #[command(flatten)]
        ndvi: NdviArgs,

        /// GeoJSON feature collection of the areas to aggregate over
        #[arg(long)]
        features: PathBuf,

        /// Feature property naming each area
        #[arg(long)]
        feature_col: String,

        #[arg(long, value_delimiter = ',', default_value = "mean,std,min,max,sum,count")]
        stats: Vec<Stat>,

        #[arg(long, value_delimiter = ',')]
        percentiles: Vec<u32>,

        #[arg(long)]
        nodata: Option<f64>,
    },
    Load {
        #[command(flatten)]
        ndvi: NdviArgs,

        #[arg(long)]
        feature_col: String,
    },
}

#[derive(Args, Debug)]
struct GlofasArgs {
    #[command(flatten)]
    country: CountryArgs,

    #[arg(long)]
    product: GlofasProduct,

    /// Area as north,south,east,west
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    bbox: Vec<f64>,

    #[arg(long)]
    year_min: Option<i32>,

    #[arg(long)]
    year_max: Option<i32>,

    /// Maximum lead time in days
    #[arg(long)]
    leadtime_max: Option<u32>,
}

impl GlofasArgs {
    fn build(&self, app: &AppConfig) -> Result<(Glofas, GlofasRequest)> {
        let [north, south, east, west] = <[f64; 4]>::try_from(self.bbox.as_slice())
            .context("--bbox takes exactly four values")?;
        let bbox = GeoBoundingBox::new(north, south, east, west)?;
        let glofas = Glofas::new(&app.path, self.country.load(app)?, self.product, bbox)?;
        let request = GlofasRequest {
            year_min: self.year_min,
            year_max: self.year_max,
            leadtime_max: self.leadtime_max,
        };
        Ok((glofas, request))
    }
}

#[derive(Subcommand, Debug)]
enum GlofasAction {
    /// Print the CDS request for one year
    Query {
        #[command(flatten)]
        glofas: GlofasArgs,

        #[arg(long)]
        year: i32,

        #[arg(long)]
        month: Option<u32>,
    },
    Download {
        #[command(flatten)]
        glofas: GlofasArgs,

        #[arg(long)]
        clobber: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let manager = ConfigManager::new(
        AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?,
    );
    if let Some(data_dir) = cli.data_dir {
        manager.update(|c| c.path.base_dir = data_dir)?;
    }
    let app = manager.get();

    match cli.command {
        Command::Config { action: ConfigAction::Show } => {
            println!("{}", manager.to_toml()?);
        }
        Command::Config { action: ConfigAction::Save { path } } => {
            manager.save_to_file(&path)?;
            log::info!("Configuration written to {}", path.display());
        }
        Command::Ndvi { action } => run_ndvi(&app, action)?,
        Command::Glofas { action } => run_glofas(&app, action)?,
    }
    Ok(())
}

fn build_ndvi(app: &AppConfig, args: &NdviArgs) -> Result<UsgsNdvi> {
    let ndvi = UsgsNdvi::new(
        &app.path,
        args.country.load(app)?,
        args.product,
        args.start.as_ref(),
        args.end.as_ref(),
    )?;
    Ok(ndvi)
}

fn run_ndvi(app: &AppConfig, action: NdviAction) -> Result<()> {
    match action {
        NdviAction::Download(args) => {
            let ndvi = build_ndvi(app, &args)?;
            let client = HttpClient::new(&app.http)?;
            let dir = ndvi.download(&client, args.clobber, &mut LogProgress)?;
            log::info!("Raw NDVI rasters are in {}", dir.display());
        }
        NdviAction::Process {
            ndvi: args,
            features,
            feature_col,
            stats,
            percentiles,
            nodata,
        } => {
            let ndvi = build_ndvi(app, &args)?;
            let features = read_features(&features, &feature_col)
                .with_context(|| format!("Failed to read features from {}", features.display()))?;
            let options = StatsOptions { stats, percentiles, nodata };
            let path = ndvi.process(&features, &feature_col, &options, args.clobber)?;
            log::info!("Processed statistics written to {}", path.display());
        }
        NdviAction::Load { ndvi: args, feature_col } => {
            let ndvi = build_ndvi(app, &args)?;
            let df = ndvi.load(&feature_col)?;
            let metadata = CsvStore::create_metadata(ndvi.processed_path(&feature_col), &df)?;
            if let Some((first, last)) = &metadata.date_range {
                log::info!("{} rows from {} to {}", metadata.num_rows, first, last);
            }
            println!("{}", df);
        }
    }
    Ok(())
}

fn run_glofas(app: &AppConfig, action: GlofasAction) -> Result<()> {
    match action {
        GlofasAction::Query { glofas, year, month } => {
            let (glofas, request) = glofas.build(app)?;
            let query = glofas.get_query(year, month, request.leadtime_max);
            println!("{}", serde_json::to_string_pretty(&query)?);
        }
        GlofasAction::Download { glofas, clobber } => {
            let (glofas, request) = glofas.build(app)?;
            let http = HttpClient::new(&app.http)?;
            let client = CdsClient::new(&http, &app.cds)?;
            let paths = glofas.download(&client, &request, clobber, &mut LogProgress)?;
            log::info!("Downloaded {} GloFAS files", paths.len());
        }
    }
    Ok(())
}
