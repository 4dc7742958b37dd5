//! Per-field isolation of display values.
//!
//! Every displayed number goes through [`guard`], which turns failed reads,
//! non-finite results and panics into a [`FieldError`] scoped to that one field.

use crate::error::{ReportError, Result};
use crate::normalize::parse_metric_text;
use crate::schema::{AccountRecord, FieldValue};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Display-level error for one field, serialized as `{"error": "<label>数据错误"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    error: String,
}

impl FieldError {
    pub fn new(label: &str) -> Self {
        Self {
            error: format!("{}数据错误", label),
        }
    }

    pub fn message(&self) -> &str {
        &self.error
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.error)
    }
}

pub type FieldResult = std::result::Result<f64, FieldError>;

/// Reads a numeric field. Text values are normalized; a missing field is an error.
pub fn read_metric(record: &AccountRecord, field: &str) -> Result<f64> {
    match record.field(field) {
        Some(FieldValue::Number(n)) => Ok(*n),
        Some(FieldValue::Text(text)) => Ok(parse_metric_text(text)),
        None => Err(ReportError::MissingField {
            field: field.to_string(),
        }),
    }
}

/// Like [`read_metric`], but NaN and infinities are errors.
pub fn read_finite(record: &AccountRecord, field: &str) -> Result<f64> {
    read_metric(record, field).and_then(|value| ensure_finite(field, value))
}

fn ensure_finite(field: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ReportError::NonFiniteValue {
            field: field.to_string(),
            value,
        })
    }
}

/// Evaluates `compute` for the field named `label`.
///
/// Never propagates: errors, panics and non-finite numbers all come back as a
/// [`FieldError`] carrying the label.
pub fn guard<F>(label: &str, compute: F) -> FieldResult
where
    F: FnOnce() -> Result<f64>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(compute)).unwrap_or_else(|_| {
        Err(ReportError::ComputationPanicked {
            field: label.to_string(),
        })
    });

    match outcome.and_then(|value| ensure_finite(label, value)) {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!("Field '{}' is not displayable: {}", label, e);
            Err(FieldError::new(label))
        }
    }
}
