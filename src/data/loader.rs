//! Data loading and saving through polars

use super::{Column, ColumnData, Dataset};
use crate::error::{PdpError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Load a CSV file with a header row into a [`Dataset`]
pub fn load_csv(path: impl AsRef<Path>) -> Result<Dataset> {
    DataLoader::new().load_csv(path)
}

/// Data loader for the file formats accepted as training data
pub struct DataLoader {
    /// Rows used for schema inference
    infer_schema_length: usize,
    /// Column names forced to categorical even when they parse as numbers
    categorical: Vec<String>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 100,
            categorical: Vec::new(),
        }
    }

    /// Set the number of rows used for schema inference
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = n.max(1);
        self
    }

    /// Treat the named columns as categorical
    pub fn with_categorical(mut self, names: Vec<String>) -> Self {
        self.categorical = names;
        self
    }

    /// Load a CSV file
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        self.load_delimited(path, b',')
    }

    /// Load a delimited text file with a header row
    pub fn load_delimited(&self, path: impl AsRef<Path>, delimiter: u8) -> Result<Dataset> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| PdpError::DataError(format!("{}: {}", path.display(), e)))?;

        let parse_opts = CsvParseOptions::default().with_separator(delimiter);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()?;

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded training data");
        self.from_dataframe(&df)
    }

    /// Load a JSON file
    pub fn load_json(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| PdpError::DataError(format!("{}: {}", path.display(), e)))?;

        let df = JsonReader::new(file).finish()?;
        self.from_dataframe(&df)
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        let path = path.as_ref();
        let lower = path.to_string_lossy().to_lowercase();

        if lower.ends_with(".tsv") {
            self.load_delimited(path, b'\t')
        } else if lower.ends_with(".json") {
            self.load_json(path)
        } else {
            self.load_csv(path)
        }
    }

    /// Convert a polars frame into a [`Dataset`]
    pub fn from_dataframe(&self, df: &DataFrame) -> Result<Dataset> {
        let columns = df
            .iter()
            .map(|series| {
                let force_cat = self
                    .categorical
                    .iter()
                    .any(|c| c.as_str() == series.name().as_str());
                column_from_series(series, force_cat)
            })
            .collect::<Result<Vec<_>>>()?;
        Dataset::new(columns)
    }
}

fn column_from_series(series: &Series, force_categorical: bool) -> Result<Column> {
    let name = series.name().to_string();
    if series.null_count() > 0 {
        return Err(PdpError::DataError(format!(
            "Column '{}' has {} missing values",
            name,
            series.null_count()
        )));
    }

    match series.dtype() {
        DataType::String => {
            let values: Vec<&str> = series
                .str()?
                .into_iter()
                .map(|v| v.unwrap_or_default())
                .collect();
            Ok(Column::categorical(name, &values))
        }
        DataType::Boolean => {
            let values: Vec<&str> = series
                .bool()?
                .into_iter()
                .map(|v| if v.unwrap_or(false) { "true" } else { "false" })
                .collect();
            Ok(Column::categorical(name, &values))
        }
        dt if dt.is_numeric() => {
            let cast = series.cast(&DataType::Float64)?;
            let values: Vec<f64> = cast
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            if force_categorical {
                let labels: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                Ok(Column::categorical(name, &labels))
            } else {
                Ok(Column::numeric(name, values))
            }
        }
        other => Err(PdpError::DataError(format!(
            "Column '{}' has unsupported type {}",
            name, other
        ))),
    }
}

/// Convert a [`Dataset`] back into a polars frame
pub(crate) fn dataset_to_dataframe(ds: &Dataset) -> Result<DataFrame> {
    let series: Vec<Series> = ds
        .columns()
        .iter()
        .map(|col| match col.data() {
            ColumnData::Numeric(v) => Series::new(col.name().into(), v.clone()),
            ColumnData::Categorical { levels, codes } => {
                let labels: Vec<String> = codes.iter().map(|&c| levels[c as usize].clone()).collect();
                Series::new(col.name().into(), labels)
            }
        })
        .collect();
    Ok(DataFrame::new(series)?)
}

/// Save frames to disk
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path.as_ref())?;
        CsvWriter::new(&mut file).finish(df)?;
        Ok(())
    }

    /// Save to JSON (array of records)
    pub fn save_json(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path.as_ref())?;
        JsonWriter::new(&mut file)
            .with_json_format(JsonFormat::Json)
            .finish(df)?;
        Ok(())
    }

    /// Save a dataset to CSV
    pub fn save_dataset_csv(ds: &Dataset, path: impl AsRef<Path>) -> Result<()> {
        let mut df = dataset_to_dataframe(ds)?;
        Self::save_csv(&mut df, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;
    use std::io::Write;

    #[test]
    fn test_load_csv_mixed_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "x,group,y").unwrap();
        writeln!(f, "1.5,a,3").unwrap();
        writeln!(f, "2.5,b,4").unwrap();
        writeln!(f, "3.5,a,5").unwrap();
        drop(f);

        let ds = load_csv(&path).unwrap();
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.numeric("x").unwrap(), &[1.5, 2.5, 3.5]);
        assert!(ds.column("group").unwrap().is_categorical());
        assert_eq!(ds.numeric("y").unwrap(), &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_forced_categorical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(&path, "code,x\n1,0.5\n2,0.7\n1,0.9\n").unwrap();

        let ds = DataLoader::new()
            .with_categorical(vec!["code".to_string()])
            .load_csv(&path)
            .unwrap();
        let col = ds.column("code").unwrap();
        assert!(col.is_categorical());
        assert_eq!(col.cardinality(), 2);
    }

    #[test]
    fn test_dataset_csv_roundtrip_keeps_levels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let ds = Dataset::new(vec![
            Column::numeric("x", vec![1.0, 2.0]),
            Column::categorical("g", &["u", "v"]),
        ])
        .unwrap();

        DataSaver::save_dataset_csv(&ds, &path).unwrap();
        let back = load_csv(&path).unwrap();
        assert_eq!(back.value(1, "g"), Some(Value::from("v")));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_csv("/nonexistent/train.csv"),
            Err(PdpError::DataError(_))
        ));
    }
}
