use anyhow::{Context, Result};
use arrow::{
    datatypes::{Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::warn;

pub const DEMOGRAPHICS_TABLE: &str = "demographics";

/// Source header → canonical name. Matching is exact, including case,
/// spaces and hyphens.
pub const DEMOGRAPHIC_RENAMES: [(&str, &str); 8] = [
    ("Median Age", "median_age"),
    ("Male Population", "male_population"),
    ("Female Population", "female_population"),
    ("Total Population", "total_population"),
    ("Number of Veterans", "n_veterans"),
    ("Foreign-born", "foreign_born"),
    ("Average Household Size", "avg_household_size"),
    ("State Code", "state_code"),
];

/// Schema with the canonical names applied. A rename whose source column is
/// absent is skipped with a warning; types, nullability and order are kept.
pub fn rename_demographics_schema(schema: &Schema) -> SchemaRef {
    for (from, _) in DEMOGRAPHIC_RENAMES {
        if schema.index_of(from).is_err() {
            warn!(column = from, "demographics column not found, rename skipped");
        }
    }
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| {
            match DEMOGRAPHIC_RENAMES
                .iter()
                .find(|(from, _)| *from == f.name().as_str())
            {
                Some((_, to)) => f.as_ref().clone().with_name(*to),
                None => f.as_ref().clone(),
            }
        })
        .collect();
    Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()))
}

/// Relabel a batch to `schema` (from [`rename_demographics_schema`]). The
/// column arrays are shared, not copied.
pub fn rename_demographics(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    RecordBatch::try_new(schema.clone(), batch.columns().to_vec())
        .context("relabelling demographics batch")
}
