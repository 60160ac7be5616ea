use anyhow::{Context, Result};
use arrow::{
    array::{Array, ArrayRef, Float64Array, StringBuilder},
    compute::cast,
    datatypes::DataType,
};
use std::sync::Arc;

/// A finite code → label table with a fallback for everything else.
///
/// Codes match on exact `f64` equality; null and unknown codes get `default`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryMap {
    pub entries: &'static [(f64, &'static str)],
    pub default: &'static str,
}

pub const NOT_APPLICABLE: &str = "N/A";

pub const VISA_CATEGORIES: CategoryMap = CategoryMap {
    entries: &[(1.0, "Business"), (2.0, "Pleasure"), (3.0, "Student")],
    default: NOT_APPLICABLE,
};

pub const TRAVEL_MODES: CategoryMap = CategoryMap {
    entries: &[
        (1.0, "Air"),
        (2.0, "Sea"),
        (3.0, "Land"),
        (9.0, "Not Reported"),
    ],
    default: NOT_APPLICABLE,
};

impl CategoryMap {
    pub fn label(&self, code: Option<f64>) -> &'static str {
        code.and_then(|c| {
            self.entries
                .iter()
                .find(|(k, _)| *k == c)
                .map(|(_, label)| *label)
        })
        .unwrap_or(self.default)
    }
}

/// Replace a numeric code column with its labels. The source is cast to
/// `Float64` first; values that do not cast become null and so the default.
pub fn recode_column(codes: &ArrayRef, map: &CategoryMap) -> Result<ArrayRef> {
    let as_f64 = cast(codes, &DataType::Float64)
        .with_context(|| format!("casting {} codes to Float64", codes.data_type()))?;
    let as_f64 = as_f64
        .as_any()
        .downcast_ref::<Float64Array>()
        .context("cast did not yield Float64Array")?;

    let mut b = StringBuilder::with_capacity(as_f64.len(), as_f64.len() * 8);
    for code in as_f64.iter() {
        b.append_value(map.label(code));
    }
    Ok(Arc::new(b.finish()) as ArrayRef)
}
