use crate::error::EtlError;
use anyhow::{Context, Result};
use arrow::{
    datatypes::{Field, FieldRef, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use std::sync::Arc;

pub const FACT_TABLE: &str = "immigration";
pub const PARTITION_COLUMN: &str = "us_state";

/// Normalized immigration column → public fact column.
pub const FACT_COLUMNS: [(&str, &str); 19] = [
    ("cicid", "cicid"),
    ("i94yr", "arrival_year"),
    ("i94mon", "arrival_month"),
    ("i94cit", "citizinship"),
    ("i94res", "residence"),
    ("i94port", "port"),
    ("arrdate", "arrival_date"),
    ("i94mode", "travel_mode"),
    ("i94addr", PARTITION_COLUMN),
    ("depdate", "departure_date"),
    ("i94bir", "age"),
    ("i94visa", "visa_category"),
    ("visapost", "dep_issued_visa"),
    ("dtaddto", "visa_expiration_date"),
    ("gender", "gender"),
    ("airline", "airline"),
    ("admnum", "admission_number"),
    ("fltno", "flight_number"),
    ("visatype", "visa_type"),
];

/// Fact schema derived from a normalized source schema.
pub fn fact_schema(source: &Schema) -> Result<SchemaRef> {
    let fields = FACT_COLUMNS
        .iter()
        .map(|(src, dst)| -> Result<FieldRef> {
            let f = source
                .field_with_name(src)
                .map_err(|_| EtlError::missing_column(FACT_TABLE, src))?;
            Ok(Arc::new(Field::new(*dst, f.data_type().clone(), f.is_nullable())))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(Schema::new(fields)))
}

/// Select and rename the fact columns. No rows are filtered or deduplicated.
pub fn project_fact(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = fact_schema(&batch.schema())?;
    let columns = FACT_COLUMNS
        .iter()
        .map(|(src, _)| {
            batch
                .column_by_name(src)
                .cloned()
                .ok_or_else(|| anyhow::Error::from(EtlError::missing_column(FACT_TABLE, src)))
        })
        .collect::<Result<Vec<_>>>()?;
    RecordBatch::try_new(schema, columns).context("building fact batch")
}
