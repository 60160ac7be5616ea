// src/io/reader.rs

use anyhow::{Context, Result};
use arrow::{
    csv::{reader::Format, ReaderBuilder},
    datatypes::SchemaRef,
    record_batch::RecordBatch,
};
use glob::glob;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{
    fs::File,
    io::{Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, instrument};

use crate::error::EtlError;

/// An in-memory table: one schema plus the batches read under it.
#[derive(Debug, Clone)]
pub struct Table {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl Table {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

/// True when any component of `path` below `dir` starts with `_` or `.`
/// (`_temporary/`, `_SUCCESS`, `._part-0.parquet`).
fn is_hidden(dir: &Path, path: &Path) -> bool {
    path.strip_prefix(dir)
        .unwrap_or(path)
        .components()
        .any(|c| {
            let name = c.as_os_str().to_string_lossy();
            name.starts_with('_') || name.starts_with('.')
        })
}

/// Every visible `*.parquet` below `dir`, sorted by path so reruns see the
/// same order.
fn list_parquet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*.parquet", dir.display());
    let mut files: Vec<PathBuf> = glob(&pattern)
        .with_context(|| format!("bad glob pattern {pattern}"))?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .filter(|p| {
            let hidden = is_hidden(dir, p);
            if hidden {
                debug!(file = %p.display(), "skipping hidden file");
            }
            !hidden
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Read a directory of Parquet files into memory.
///
/// The schema of the first file (in path order) is reported as the table
/// schema; later files are expected to match it.
#[instrument(level = "info", skip(dir), fields(dir = %dir.as_ref().display()))]
pub fn read_parquet_dir<P: AsRef<Path>>(dir: P, batch_size: usize) -> Result<Table> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(EtlError::MissingInput(dir.to_path_buf()).into());
    }
    let files = list_parquet_files(dir)?;
    if files.is_empty() {
        return Err(EtlError::MissingInput(dir.to_path_buf()).into());
    }

    let mut schema: Option<SchemaRef> = None;
    let mut batches = Vec::new();
    for path in &files {
        let file =
            File::open(path).with_context(|| format!("failed to open `{}`", path.display()))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .with_context(|| format!("reading parquet metadata of `{}`", path.display()))?;
        if schema.is_none() {
            schema = Some(builder.schema().clone());
        }
        let reader = builder.with_batch_size(batch_size).build()?;
        let before = batches.len();
        for batch in reader {
            batches.push(batch.with_context(|| format!("decoding `{}`", path.display()))?);
        }
        debug!(file = %path.display(), batches = batches.len() - before, "read parquet file");
    }

    let table = Table {
        schema: schema.context("no parquet schema found")?,
        batches,
    };
    info!(files = files.len(), rows = table.num_rows(), "loaded parquet directory");
    Ok(table)
}

/// Read a delimited text file with a header row. Column types are inferred
/// by scanning the whole file before the data is decoded.
#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_delimited<P: AsRef<Path>>(path: P, delimiter: u8, batch_size: usize) -> Result<Table> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(EtlError::MissingInput(path.to_path_buf()).into());
    }
    let mut file =
        File::open(path).with_context(|| format!("failed to open `{}`", path.display()))?;

    let format = Format::default()
        .with_header(true)
        .with_delimiter(delimiter);
    let (schema, records) = format
        .infer_schema(&mut file, None)
        .with_context(|| format!("inferring schema of `{}`", path.display()))?;
    debug!(records, columns = schema.fields().len(), "inferred schema");

    file.seek(SeekFrom::Start(0))?;
    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_delimiter(delimiter)
        .with_batch_size(batch_size)
        .build(file)
        .context("creating CSV reader")?;

    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("parsing `{}`", path.display()))?;

    let table = Table { schema, batches };
    info!(rows = table.num_rows(), "loaded delimited file");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::{
        array::{Float64Array, Int64Array, StringArray},
        datatypes::{DataType, Field, Schema},
    };
    use parquet::arrow::ArrowWriter;
    use std::fs;
    use tempfile::tempdir;

    fn write_parquet(path: &Path, values: &[f64]) -> Result<()> {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Float64, true)]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(Float64Array::from(values.to_vec()))],
        )?;
        let mut writer = ArrowWriter::try_new(File::create(path)?, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }

    #[test]
    fn reads_all_files_in_path_order() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("nested"))?;
        write_parquet(&dir.path().join("b.parquet"), &[3.0])?;
        write_parquet(&dir.path().join("a.parquet"), &[1.0, 2.0])?;
        write_parquet(&dir.path().join("nested/c.parquet"), &[4.0])?;
        fs::write(dir.path().join("_SUCCESS"), b"")?;

        let table = read_parquet_dir(dir.path(), 1024)?;
        assert_eq!(table.num_rows(), 4);
        let first: Vec<f64> = table
            .batches
            .iter()
            .flat_map(|b| {
                b.column(0)
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .unwrap()
                    .values()
                    .to_vec()
            })
            .collect();
        assert_eq!(first, vec![1.0, 2.0, 3.0, 4.0]);
        Ok(())
    }

    #[test]
    fn skips_underscore_and_dot_paths() -> Result<()> {
        let dir = tempdir()?;
        write_parquet(&dir.path().join("part-0.parquet"), &[1.0, 2.0])?;
        fs::create_dir_all(dir.path().join("_temporary/0"))?;
        write_parquet(&dir.path().join("_temporary/0/part-0.parquet"), &[1.0, 2.0])?;
        fs::write(dir.path().join("._part-0.parquet"), b"not parquet")?;

        let table = read_parquet_dir(dir.path(), 1024)?;
        assert_eq!(table.num_rows(), 2);
        Ok(())
    }

    #[test]
    fn only_hidden_files_is_missing_input() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("_temporary"))?;
        write_parquet(&dir.path().join("_temporary/part-0.parquet"), &[1.0])?;
        let err = read_parquet_dir(dir.path(), 1024).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::MissingInput(_))
        ));
        Ok(())
    }

    #[test]
    fn empty_or_missing_dir_is_missing_input() -> Result<()> {
        let dir = tempdir()?;
        let err = read_parquet_dir(dir.path(), 1024).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::MissingInput(_))
        ));
        let err = read_parquet_dir(dir.path().join("nope"), 1024).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::MissingInput(_))
        ));
        Ok(())
    }

    #[test]
    fn infers_types_from_semicolon_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cities.csv");
        fs::write(
            &path,
            "City;Median Age;Count\nSilver Spring;33.8;40\nQuincy;41.0;72\n",
        )?;

        let table = read_delimited(&path, b';', 1024)?;
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.schema.field(0).data_type(), &DataType::Utf8);
        assert_eq!(table.schema.field(1).data_type(), &DataType::Float64);
        assert_eq!(table.schema.field(2).data_type(), &DataType::Int64);

        let batch = &table.batches[0];
        let city = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(city.value(1), "Quincy");
        let count = batch.column(2).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(count.value(0), 40);
        Ok(())
    }

    #[test]
    fn missing_csv_is_missing_input() {
        let err = read_delimited("/no/such/file.csv", b';', 16).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::MissingInput(_))
        ));
    }
}
