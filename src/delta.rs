use crate::accessor::{guard, read_metric, FieldError};
use crate::schema::AccountRecord;

/// Period-over-period change of one metric.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricDelta {
    /// No previous-period record for the entity. Not the same as zero change.
    Absent,
    Change(f64),
    Error(FieldError),
}

impl MetricDelta {
    pub fn is_absent(&self) -> bool {
        matches!(self, MetricDelta::Absent)
    }

    pub fn change(&self) -> Option<f64> {
        match self {
            MetricDelta::Change(v) => Some(*v),
            _ => None,
        }
    }
}

/// Computes `current - previous` for `field`.
///
/// `previous` is the already matched record of the prior period. Only the
/// forward total is recomputed this way; all other increments are read as
/// reported.
pub fn compute_delta(
    current: &AccountRecord,
    previous: Option<&AccountRecord>,
    field: &str,
    label: &str,
) -> MetricDelta {
    let Some(previous) = previous else {
        return MetricDelta::Absent;
    };

    let current_value = guard(label, || read_metric(current, field));
    let previous_value = guard(label, || read_metric(previous, field));

    match (current_value, previous_value) {
        (Ok(now), Ok(before)) => match guard(label, || Ok(now - before)) {
            Ok(change) => MetricDelta::Change(change),
            Err(e) => MetricDelta::Error(e),
        },
        (Err(e), _) | (_, Err(e)) => MetricDelta::Error(e),
    }
}
