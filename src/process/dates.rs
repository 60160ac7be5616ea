use crate::error::EtlError;
use crate::process::date_parser::date32_to_date;
use anyhow::{Context, Result};
use arrow::{
    array::{Array, ArrayRef, Date32Array, Date32Builder, Int32Builder},
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use chrono::{Datelike, NaiveDate};
use std::{collections::BTreeSet, sync::Arc};

pub const DATES_TABLE: &str = "arrival_dates";

/// Derived columns of the arrival date dimension, after the `arrdate` key.
const DERIVED: [(&str, fn(NaiveDate) -> i32); 5] = [
    ("arrival_day", |d| d.day() as i32),
    ("arrival_week", |d| d.iso_week().week() as i32),
    ("arrival_month", |d| d.month() as i32),
    ("arrival_year", |d| d.year()),
    // 1 = Sunday .. 7 = Saturday
    ("arrival_weekday", |d| d.weekday().number_from_sunday() as i32),
];

pub fn dates_schema(key: &str) -> SchemaRef {
    let mut fields = vec![Field::new(key, DataType::Date32, true)];
    fields.extend(
        DERIVED
            .iter()
            .map(|(name, _)| Field::new(*name, DataType::Int32, true)),
    );
    Arc::new(Schema::new(fields))
}

/// Distinct arrival dates seen across the batches of one run.
#[derive(Debug, Default, Clone)]
pub struct ArrivalDates {
    days: BTreeSet<i32>,
    saw_null: bool,
}

impl ArrivalDates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the `Date32` column `column` of `batch` into the set.
    pub fn observe(&mut self, batch: &RecordBatch, column: &str) -> Result<()> {
        let arr = batch
            .column_by_name(column)
            .ok_or_else(|| EtlError::missing_column(DATES_TABLE, column))?;
        let dates = arr
            .as_any()
            .downcast_ref::<Date32Array>()
            .ok_or_else(|| EtlError::UnsupportedType {
                column: column.to_string(),
                data_type: arr.data_type().clone(),
            })?;
        self.saw_null |= dates.null_count() > 0;
        self.days.extend(dates.iter().flatten());
        Ok(())
    }

    /// Number of rows `to_batch` will emit.
    pub fn len(&self) -> usize {
        self.days.len() + usize::from(self.saw_null)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One row per distinct date in ascending order; a null date, if any was
    /// seen, becomes a single trailing all-null row.
    pub fn to_batch(&self, key: &str) -> Result<RecordBatch> {
        let n = self.len();
        let mut keys = Date32Builder::with_capacity(n);
        let mut derived: Vec<Int32Builder> =
            DERIVED.iter().map(|_| Int32Builder::with_capacity(n)).collect();

        for &day in &self.days {
            keys.append_value(day);
            let date = date32_to_date(day);
            for ((_, f), b) in DERIVED.iter().zip(derived.iter_mut()) {
                b.append_option(date.map(*f));
            }
        }
        if self.saw_null {
            keys.append_null();
            for b in derived.iter_mut() {
                b.append_null();
            }
        }

        let mut columns: Vec<ArrayRef> = Vec::with_capacity(DERIVED.len() + 1);
        columns.push(Arc::new(keys.finish()));
        columns.extend(derived.iter_mut().map(|b| Arc::new(b.finish()) as ArrayRef));
        RecordBatch::try_new(dates_schema(key), columns).context("building date dimension")
    }
}
