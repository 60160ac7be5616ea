use crate::error::EtlError;
use crate::process::date_parser;
use crate::process::recode::{recode_column, CategoryMap, TRAVEL_MODES, VISA_CATEGORIES};
use anyhow::{Context, Result};
use arrow::{
    array::{Array, ArrayRef, Date32Builder, Float64Array, StringArray},
    compute::cast,
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::sync::Arc;

pub const ARRIVAL_DATE: &str = "arrdate";
pub const DEPARTURE_DATE: &str = "depdate";
pub const ADMITTED_UNTIL: &str = "dtaddto";
pub const VISA_CODE: &str = "i94visa";
pub const TRAVEL_MODE_CODE: &str = "i94mode";

/// How one raw immigration column is rewritten in place.
enum Rewrite {
    SasOffset,
    MonthDayYear,
    Recode(&'static CategoryMap),
}

const REWRITES: &[(&str, Rewrite)] = &[
    (ARRIVAL_DATE, Rewrite::SasOffset),
    (DEPARTURE_DATE, Rewrite::SasOffset),
    (ADMITTED_UNTIL, Rewrite::MonthDayYear),
    (VISA_CODE, Rewrite::Recode(&VISA_CATEGORIES)),
    (TRAVEL_MODE_CODE, Rewrite::Recode(&TRAVEL_MODES)),
];

/// Day offsets from 1960-01-01 → `Date32`. Offsets are truncated toward zero;
/// non-numeric, non-finite or out-of-range values become null.
pub fn sas_offsets_to_dates(arr: &ArrayRef) -> Result<ArrayRef> {
    let nums = cast(arr, &DataType::Float64)
        .with_context(|| format!("casting {} offsets to Float64", arr.data_type()))?;
    let nums = nums
        .as_any()
        .downcast_ref::<Float64Array>()
        .context("cast did not yield Float64Array")?;

    let mut b = Date32Builder::with_capacity(nums.len());
    for v in nums.iter() {
        let day = v
            .filter(|v| v.is_finite())
            .map(f64::trunc)
            .filter(|v| *v >= i32::MIN as f64 && *v <= i32::MAX as f64)
            .and_then(|v| date_parser::sas_offset_to_date32(v as i64));
        b.append_option(day);
    }
    Ok(Arc::new(b.finish()) as ArrayRef)
}

/// `MMddyyyy` strings → `Date32`; unparseable values become null.
pub fn mmddyyyy_to_dates(arr: &ArrayRef) -> Result<ArrayRef> {
    let strs = cast(arr, &DataType::Utf8)
        .with_context(|| format!("casting {} to Utf8", arr.data_type()))?;
    let strs = strs
        .as_any()
        .downcast_ref::<StringArray>()
        .context("cast did not yield StringArray")?;

    let mut b = Date32Builder::with_capacity(strs.len());
    for s in strs.iter() {
        b.append_option(
            s.and_then(date_parser::parse_mmddyyyy)
                .and_then(date_parser::date_to_date32),
        );
    }
    Ok(Arc::new(b.finish()) as ArrayRef)
}

/// Convert the date columns and recode the visa/mode codes of a raw
/// immigration batch. Column names and order are kept; only the types of the
/// five rewritten columns change.
pub fn normalize_immigration_batch(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    for (name, _) in REWRITES {
        if schema.index_of(name).is_err() {
            return Err(EtlError::missing_column("immigration", name).into());
        }
    }

    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut columns = Vec::with_capacity(batch.num_columns());
    for (fld, arr) in schema.fields().iter().zip(batch.columns()) {
        let rewrite = REWRITES
            .iter()
            .find(|(name, _)| *name == fld.name().as_str())
            .map(|(_, r)| r);
        let (col, nullable) = match rewrite {
            Some(Rewrite::SasOffset) => (sas_offsets_to_dates(arr)?, true),
            Some(Rewrite::MonthDayYear) => (mmddyyyy_to_dates(arr)?, true),
            Some(Rewrite::Recode(map)) => (recode_column(arr, map)?, false),
            None => {
                fields.push(fld.clone());
                columns.push(arr.clone());
                continue;
            }
        };
        fields.push(Arc::new(Field::new(
            fld.name(),
            col.data_type().clone(),
            nullable,
        )));
        columns.push(col);
    }

    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    RecordBatch::try_new(schema, columns).context("building normalized immigration batch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Date32Array, Float64Array, Int32Array};
    use chrono::NaiveDate;

    fn dates(arr: &ArrayRef) -> Vec<Option<NaiveDate>> {
        arr.as_any()
            .downcast_ref::<Date32Array>()
            .unwrap()
            .iter()
            .map(|v| v.and_then(date_parser::date32_to_date))
            .collect()
    }

    fn raw_batch() -> Result<RecordBatch> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("cicid", DataType::Float64, true),
            Field::new(ARRIVAL_DATE, DataType::Float64, true),
            Field::new(DEPARTURE_DATE, DataType::Float64, true),
            Field::new(ADMITTED_UNTIL, DataType::Utf8, true),
            Field::new(VISA_CODE, DataType::Float64, true),
            Field::new(TRAVEL_MODE_CODE, DataType::Float64, true),
        ]));
        Ok(RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Float64Array::from(vec![6.0, 7.0])),
                Arc::new(Float64Array::from(vec![Some(20447.0), None])),
                Arc::new(Float64Array::from(vec![Some(20454.9), Some(-3.0)])),
                Arc::new(StringArray::from(vec![Some("06292016"), Some("D/S")])),
                Arc::new(Float64Array::from(vec![Some(2.0), Some(5.0)])),
                Arc::new(Float64Array::from(vec![Some(9.0), None])),
            ],
        )?)
    }

    #[test]
    fn offsets_truncate_and_null_out() -> Result<()> {
        let arr: ArrayRef = Arc::new(Float64Array::from(vec![
            Some(20447.7),
            Some(-0.5),
            Some(f64::NAN),
            Some(1e12),
            None,
        ]));
        assert_eq!(
            dates(&sas_offsets_to_dates(&arr)?),
            vec![
                NaiveDate::from_ymd_opt(2015, 12, 25),
                NaiveDate::from_ymd_opt(1960, 1, 1),
                None,
                None,
                None
            ]
        );
        Ok(())
    }

    #[test]
    fn integer_offsets_are_accepted() -> Result<()> {
        let arr: ArrayRef = Arc::new(Int32Array::from(vec![0, 366]));
        assert_eq!(
            dates(&sas_offsets_to_dates(&arr)?),
            vec![
                NaiveDate::from_ymd_opt(1960, 1, 1),
                NaiveDate::from_ymd_opt(1961, 1, 1)
            ]
        );
        Ok(())
    }

    #[test]
    fn normalizes_in_place() -> Result<()> {
        let out = normalize_immigration_batch(&raw_batch()?)?;
        let schema = out.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(
            names,
            vec!["cicid", "arrdate", "depdate", "dtaddto", "i94visa", "i94mode"]
        );
        assert_eq!(schema.field(1).data_type(), &DataType::Date32);
        assert_eq!(schema.field(3).data_type(), &DataType::Date32);
        assert_eq!(schema.field(4).data_type(), &DataType::Utf8);

        assert_eq!(
            dates(out.column(1)),
            vec![NaiveDate::from_ymd_opt(2015, 12, 25), None]
        );
        assert_eq!(
            dates(out.column(2)),
            vec![
                NaiveDate::from_ymd_opt(2016, 1, 1),
                NaiveDate::from_ymd_opt(1959, 12, 29)
            ]
        );
        assert_eq!(
            dates(out.column(3)),
            vec![NaiveDate::from_ymd_opt(2016, 6, 29), None]
        );

        let visa = out.column(4).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!((visa.value(0), visa.value(1)), ("Pleasure", "N/A"));
        let mode = out.column(5).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!((mode.value(0), mode.value(1)), ("Not Reported", "N/A"));
        Ok(())
    }

    #[test]
    fn missing_code_column_is_fatal() -> Result<()> {
        let batch = raw_batch()?;
        let trimmed = batch.project(&[0, 1, 2, 3, 4])?;
        let err = normalize_immigration_batch(&trimmed).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::MissingColumn { column, .. }) if column == TRAVEL_MODE_CODE
        ));
        Ok(())
    }
}
