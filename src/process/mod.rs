// src/process/mod.rs
pub mod convert;
pub mod date_parser;
pub mod dates;
pub mod demographics;
pub mod fact;
pub mod recode;

use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use rayon::prelude::*;
use std::time::Instant;
use tracing::{info, instrument};

use crate::{
    config::Config,
    io::{read_delimited, read_parquet_dir, TableWriter, WriteSummary},
};
use convert::{normalize_immigration_batch, ARRIVAL_DATE};
use dates::{ArrivalDates, DATES_TABLE};
use demographics::{rename_demographics, rename_demographics_schema, DEMOGRAPHICS_TABLE};
use fact::{fact_schema, project_fact, FACT_TABLE, PARTITION_COLUMN};

/// Immigration source: a directory of Parquet files under the input root.
pub const IMMIGRATION_SOURCE: &str = "sas_data";
/// Demographics source: a `;`-separated text file under the input root.
pub const DEMOGRAPHICS_SOURCE: &str = "us-cities-demographics.csv";
const DEMOGRAPHICS_DELIMITER: u8 = b';';

/// What one full run committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub immigration: WriteSummary,
    pub arrival_dates: WriteSummary,
    pub demographics: WriteSummary,
}

/// Run both pipelines, immigration first. The first failure aborts the run.
pub fn run(config: &Config) -> Result<RunSummary> {
    info!(
        input = %config.input_root.display(),
        output = %config.output_root.display(),
        "starting run"
    );
    let (immigration, arrival_dates) =
        process_immigration_data(config).context("immigration pipeline failed")?;
    let demographics =
        process_demographics_data(config).context("demographics pipeline failed")?;
    Ok(RunSummary {
        immigration,
        arrival_dates,
        demographics,
    })
}

/// Load raw immigration records, write the fact table partitioned by state
/// and the arrival date dimension.
#[instrument(level = "info", skip(config))]
pub fn process_immigration_data(config: &Config) -> Result<(WriteSummary, WriteSummary)> {
    let start = Instant::now();
    let raw = read_parquet_dir(config.input_root.join(IMMIGRATION_SOURCE), config.batch_size)?;

    // Derive output schemas from an empty batch so a source without rows
    // still produces well-typed tables.
    let empty = RecordBatch::new_empty(raw.schema.clone());
    let normalized_schema = normalize_immigration_batch(&empty)?.schema();
    let normalized: Vec<RecordBatch> = raw
        .batches
        .into_par_iter()
        .map(|batch| normalize_immigration_batch(&batch))
        .collect::<Result<_>>()?;
    info!(batches = normalized.len(), elapsed = ?start.elapsed(), "normalized immigration batches");

    let props = config.writer_properties()?;
    let mut facts = TableWriter::create(
        &config.output_root,
        FACT_TABLE,
        fact_schema(&normalized_schema)?,
        Some(PARTITION_COLUMN),
        props.clone(),
    )?;
    let mut arrivals = ArrivalDates::new();
    for batch in &normalized {
        facts.write(&project_fact(batch)?)?;
        arrivals.observe(batch, ARRIVAL_DATE)?;
    }
    let fact_summary = facts.commit()?;

    let dims = arrivals.to_batch(ARRIVAL_DATE)?;
    let mut dates = TableWriter::create(&config.output_root, DATES_TABLE, dims.schema(), None, props)?;
    dates.write(&dims)?;
    let dates_summary = dates.commit()?;

    info!(
        rows = fact_summary.rows,
        partitions = fact_summary.files,
        arrival_dates = dates_summary.rows,
        elapsed = ?start.elapsed(),
        "immigration pipeline done"
    );
    Ok((fact_summary, dates_summary))
}

/// Load the demographics file, apply canonical column names, write it whole.
#[instrument(level = "info", skip(config))]
pub fn process_demographics_data(config: &Config) -> Result<WriteSummary> {
    let start = Instant::now();
    let raw = read_delimited(
        config.input_root.join(DEMOGRAPHICS_SOURCE),
        DEMOGRAPHICS_DELIMITER,
        config.batch_size,
    )?;

    let schema = rename_demographics_schema(&raw.schema);
    let mut out = TableWriter::create(
        &config.output_root,
        DEMOGRAPHICS_TABLE,
        schema.clone(),
        None,
        config.writer_properties()?,
    )?;
    for batch in &raw.batches {
        out.write(&rename_demographics(batch, &schema)?)?;
    }
    let summary = out.commit()?;

    info!(rows = summary.rows, elapsed = ?start.elapsed(), "demographics pipeline done");
    Ok(summary)
}
