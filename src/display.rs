use crate::accessor::{guard, read_metric, FieldError, FieldResult};
use crate::delta::{compute_delta, MetricDelta};
use crate::entity::{dedup_by_key, entity_key, find_by_key};
use crate::schema::{AccountRecord, DisplayMetric, IncrementSource, ReportSchema, Snapshot};
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;

/// A displayable number, a per-field error, or "no prior data".
///
/// Serializes as a bare number, `{"error": "..."}`, or `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DisplayValue {
    Number(f64),
    Error(FieldError),
    Absent,
}

impl DisplayValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            DisplayValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DisplayValue::Error(_))
    }
}

impl From<FieldResult> for DisplayValue {
    fn from(result: FieldResult) -> Self {
        match result {
            Ok(n) => DisplayValue::Number(n),
            Err(e) => DisplayValue::Error(e),
        }
    }
}

impl From<MetricDelta> for DisplayValue {
    fn from(delta: MetricDelta) -> Self {
        match delta {
            MetricDelta::Absent => DisplayValue::Absent,
            MetricDelta::Change(n) => DisplayValue::Number(n),
            MetricDelta::Error(e) => DisplayValue::Error(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCell {
    pub value: DisplayValue,
    pub increment: DisplayValue,
}

/// The ten display metrics of one account, keyed by metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DisplayMetricBundle {
    metrics: BTreeMap<DisplayMetric, MetricCell>,
}

impl DisplayMetricBundle {
    pub fn get(&self, metric: DisplayMetric) -> Option<&MetricCell> {
        self.metrics.get(&metric)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DisplayMetric, &MetricCell)> {
        self.metrics.iter().map(|(m, c)| (*m, c))
    }

    pub fn error_count(&self) -> usize {
        self.metrics
            .values()
            .map(|c| usize::from(c.value.is_error()) + usize::from(c.increment.is_error()))
            .sum()
    }
}

fn increment_label(metric: DisplayMetric) -> String {
    format!("{}增量", metric.label())
}

/// Builds the display bundle for one account.
///
/// `previous` is the same entity's record from the prior period, if any. A bad
/// field only affects its own cell.
pub fn build_bundle(
    current: &AccountRecord,
    previous: Option<&AccountRecord>,
    schema: &ReportSchema,
) -> DisplayMetricBundle {
    let mut metrics = BTreeMap::new();

    for binding in &schema.metrics {
        let label = binding.metric.label();
        let value: DisplayValue = guard(label, || read_metric(current, &binding.value_field)).into();

        let increment: DisplayValue = match &binding.increment {
            IncrementSource::Column { field } => {
                guard(&increment_label(binding.metric), || read_metric(current, field)).into()
            }
            IncrementSource::PeriodDelta => compute_delta(
                current,
                previous,
                &binding.value_field,
                &increment_label(binding.metric),
            )
            .into(),
        };

        metrics.insert(binding.metric, MetricCell { value, increment });
    }

    DisplayMetricBundle { metrics }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityReport {
    pub key: String,
    pub primary_name: String,
    pub alternate_name: String,
    pub has_previous: bool,
    pub metrics: DisplayMetricBundle,
}

/// Builds one report per distinct entity of `current`, in row order.
///
/// Prior-period records are matched by entity key.
pub fn build_period_report(
    current: &Snapshot,
    previous: Option<&Snapshot>,
    schema: &ReportSchema,
) -> Vec<EntityReport> {
    let reports: Vec<EntityReport> = dedup_by_key(current.records())
        .into_iter()
        .map(|record| {
            let key = entity_key(record);
            let matched = previous.and_then(|snapshot| find_by_key(snapshot.records(), key));
            if matched.is_none() {
                debug!("No prior-period record for '{}' in {}", key, current.period());
            }

            EntityReport {
                key: key.to_string(),
                primary_name: record.primary_name().to_string(),
                alternate_name: record.alternate_name().to_string(),
                has_previous: matched.is_some(),
                metrics: build_bundle(record, matched, schema),
            }
        })
        .collect();

    info!(
        "Built period report for {} against {}: {} entities, {} field error(s)",
        current.period(),
        previous.map_or("none".to_string(), |p| p.period().to_string()),
        reports.len(),
        reports.iter().map(|r| r.metrics.error_count()).sum::<usize>()
    );

    reports
}
