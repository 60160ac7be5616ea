// src/io/writer.rs

use anyhow::{Context, Result};
use arrow::{
    array::{Array, ArrayRef, StringArray, UInt32Array},
    compute::{cast, take},
    datatypes::{DataType, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};
use std::{
    collections::BTreeMap,
    fmt::Write as _,
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info};

use crate::error::EtlError;

/// Directory name for rows whose partition value is null or empty.
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";
/// Empty marker left in a table directory once it is fully written.
pub const SUCCESS_MARKER: &str = "_SUCCESS";
const PART_FILE: &str = "part-00000.parquet";

/// Escape a value for use in a `col=value` directory name, Hive style.
pub fn escape_partition_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        let needs_escape = matches!(
            c,
            '\u{01}'..='\u{1F}'
                | '"'
                | '#'
                | '%'
                | '\''
                | '*'
                | '/'
                | ':'
                | '='
                | '?'
                | '\\'
                | '\u{7F}'
                | '{'
                | '['
                | ']'
                | '^'
        );
        if needs_escape {
            let _ = write!(out, "%{:02X}", c as u32);
        } else {
            out.push(c);
        }
    }
    out
}

/// Outcome of a committed table write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub rows: u64,
    pub files: usize,
}

/// Overwrite-mode writer for one output table.
///
/// Data lands in a hidden staging directory next to the target; `commit`
/// swaps it into place. Dropping an uncommitted writer discards the staging
/// directory and leaves whatever was committed before untouched.
pub struct TableWriter {
    table: String,
    final_dir: PathBuf,
    staging_dir: PathBuf,
    partition: Option<(usize, String)>,
    file_schema: SchemaRef,
    props: WriterProperties,
    /// Keyed by partition directory name; "" for unpartitioned tables.
    writers: BTreeMap<String, ArrowWriter<BufWriter<File>>>,
    rows: u64,
    committed: bool,
}

impl TableWriter {
    pub fn create<P: AsRef<Path>>(
        root: P,
        table: &str,
        schema: SchemaRef,
        partition_by: Option<&str>,
        props: WriterProperties,
    ) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)
            .with_context(|| format!("creating output root {}", root.display()))?;

        let final_dir = root.join(table);
        let staging_dir = root.join(format!(".{table}.staging"));
        if staging_dir.exists() {
            fs::remove_dir_all(&staging_dir).with_context(|| {
                format!("removing stale staging dir {}", staging_dir.display())
            })?;
        }
        fs::create_dir_all(&staging_dir)
            .with_context(|| format!("creating staging dir {}", staging_dir.display()))?;

        let (partition, file_schema) = match partition_by {
            Some(col) => {
                let idx = schema
                    .index_of(col)
                    .map_err(|_| EtlError::missing_column(table, col))?;
                let fields: Vec<_> = schema
                    .fields()
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != idx)
                    .map(|(_, f)| f.clone())
                    .collect();
                (
                    Some((idx, col.to_string())),
                    Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
                )
            }
            None => (None, schema),
        };

        Ok(Self {
            table: table.to_string(),
            final_dir,
            staging_dir,
            partition,
            file_schema,
            props,
            writers: BTreeMap::new(),
            rows: 0,
            committed: false,
        })
    }

    /// Append a batch carrying the full (unpartitioned) table schema.
    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        if batch.num_rows() == 0 {
            return Ok(());
        }
        match self.partition.clone() {
            None => {
                let table = self.table.clone();
                let writer = self.writer_for("")?;
                writer
                    .write(batch)
                    .with_context(|| format!("writing batch to table {table}"))?;
            }
            Some((idx, col)) => self.write_partitioned(batch, idx, &col)?,
        }
        self.rows += batch.num_rows() as u64;
        Ok(())
    }

    fn write_partitioned(&mut self, batch: &RecordBatch, idx: usize, col: &str) -> Result<()> {
        let keys = cast(batch.column(idx), &DataType::Utf8)
            .with_context(|| format!("casting partition column {col} to string"))?;
        let keys = keys
            .as_any()
            .downcast_ref::<StringArray>()
            .context("partition column did not cast to Utf8")?;

        let mut groups: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for row in 0..keys.len() {
            let dir = match keys.is_valid(row).then(|| keys.value(row)) {
                Some(v) if !v.is_empty() => format!("{col}={}", escape_partition_value(v)),
                _ => format!("{col}={DEFAULT_PARTITION}"),
            };
            groups.entry(dir).or_default().push(row as u32);
        }

        for (dir, rows) in groups {
            let indices = UInt32Array::from(rows);
            let columns = batch
                .columns()
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != idx)
                .map(|(_, c)| take(c.as_ref(), &indices, None))
                .collect::<std::result::Result<Vec<ArrayRef>, _>>()
                .context("selecting partition rows")?;
            let part = RecordBatch::try_new(self.file_schema.clone(), columns)
                .context("building partition batch")?;
            let writer = self.writer_for(&dir)?;
            writer
                .write(&part)
                .with_context(|| format!("writing partition {dir}"))?;
        }
        Ok(())
    }

    fn writer_for(&mut self, dir: &str) -> Result<&mut ArrowWriter<BufWriter<File>>> {
        if !self.writers.contains_key(dir) {
            let part_dir = self.staging_dir.join(dir);
            fs::create_dir_all(&part_dir)
                .with_context(|| format!("creating {}", part_dir.display()))?;
            let path = part_dir.join(PART_FILE);
            let file = File::create(&path)
                .with_context(|| format!("creating file {}", path.display()))?;
            let writer = ArrowWriter::try_new(
                BufWriter::new(file),
                self.file_schema.clone(),
                Some(self.props.clone()),
            )
            .context("creating parquet writer")?;
            debug!(table = %self.table, partition = dir, "opened part file");
            self.writers.insert(dir.to_string(), writer);
        }
        self.writers
            .get_mut(dir)
            .context("writer vanished after insert")
    }

    /// Close every part file and replace the previous table with this one.
    pub fn commit(mut self) -> Result<WriteSummary> {
        // An unpartitioned table always gets a part file so its schema survives.
        if self.partition.is_none() && self.writers.is_empty() {
            self.writer_for("")?;
        }

        let writers = std::mem::take(&mut self.writers);
        let files = writers.len();
        for (dir, writer) in writers {
            writer
                .close()
                .with_context(|| format!("closing parquet writer for `{dir}`"))?;
        }
        File::create(self.staging_dir.join(SUCCESS_MARKER)).context("writing _SUCCESS marker")?;

        if self.final_dir.exists() {
            fs::remove_dir_all(&self.final_dir)
                .with_context(|| format!("removing previous {}", self.final_dir.display()))?;
        }
        fs::rename(&self.staging_dir, &self.final_dir).with_context(|| {
            format!(
                "renaming {} -> {}",
                self.staging_dir.display(),
                self.final_dir.display()
            )
        })?;
        self.committed = true;

        info!(
            table = %self.table,
            path = %self.final_dir.display(),
            rows = self.rows,
            files,
            "committed table"
        );
        Ok(WriteSummary {
            path: self.final_dir.clone(),
            rows: self.rows,
            files,
        })
    }
}

impl Drop for TableWriter {
    fn drop(&mut self) {
        if !self.committed {
            self.writers.clear();
            let _ = fs::remove_dir_all(&self.staging_dir);
        }
    }
}
