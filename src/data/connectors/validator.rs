use crate::error::{AatoolboxError, Result};
use polars::prelude::*;

pub struct TableValidator;

impl TableValidator {
    /// Ensure every column in `required` is present
    pub fn validate_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
        let columns = df.get_column_names();
        for name in required {
            if !columns.iter().any(|col| col.as_str() == *name) {
                return Err(AatoolboxError::Processing(format!(
                    "Missing required column: {} (found {:?})",
                    name, columns
                )));
            }
        }
        Ok(())
    }

    /// Check for null values in every column
    pub fn check_nulls(df: &DataFrame) -> Vec<(String, usize)> {
        df.get_columns()
            .iter()
            .filter(|col| col.null_count() > 0)
            .map(|col| (col.name().to_string(), col.null_count()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn test_validate_columns() {
        let df = df! {
            "date" => &["2020-01-01"],
            "year" => &[2020i64],
            "dekad" => &[1i64],
        }
        .unwrap();

        assert!(TableValidator::validate_columns(&df, &["date", "year", "dekad"]).is_ok());
        assert!(TableValidator::validate_columns(&df, &["date", "mean"]).is_err());
    }

    #[test]
    fn test_check_nulls() {
        let df = df! {
            "mean" => &[Some(1.0), None, Some(3.0)],
            "count" => &[Some(1.0), Some(2.0), Some(3.0)],
        }
        .unwrap();

        let report = TableValidator::check_nulls(&df);
        assert_eq!(report, vec![("mean".to_string(), 1)]);
    }
}
