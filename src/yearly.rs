use crate::accessor::read_finite;
use crate::error::Result;
use crate::record::ingest_periods;
use crate::schema::{AccountRecord, Period, ReportSchema, Snapshot, Workbook, YearlyReportConfig};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricTriplet {
    pub total_reads: f64,
    pub headline_reads: f64,
    pub forward_total: f64,
}

impl MetricTriplet {
    pub fn from_record(record: &AccountRecord, config: &YearlyReportConfig) -> Result<Self> {
        Ok(Self {
            total_reads: read_finite(record, &config.total_reads_field)?,
            headline_reads: read_finite(record, &config.headline_reads_field)?,
            forward_total: read_finite(record, &config.forward_total_field)?,
        })
    }
}

impl Add for MetricTriplet {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            total_reads: self.total_reads + rhs.total_reads,
            headline_reads: self.headline_reads + rhs.headline_reads,
            forward_total: self.forward_total + rhs.forward_total,
        }
    }
}

impl AddAssign for MetricTriplet {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for MetricTriplet {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesEntry {
    pub period: Period,
    pub metrics: MetricTriplet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySeries {
    pub name: String,
    pub series: Vec<SeriesEntry>,
    pub total: MetricTriplet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedPeriod {
    pub period: Period,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyAggregate {
    /// One entry per allowlisted entity, in allowlist order.
    pub entities: Vec<EntitySeries>,
    /// Periods that were aggregated, in input order.
    pub periods: Vec<Period>,
    pub skipped: Vec<SkippedPeriod>,
}

impl YearlyAggregate {
    pub fn entity(&self, name: &str) -> Option<&EntitySeries> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("Entity,Period,Total Reads,Headline Reads,Forward Total\n");

        for entity in &self.entities {
            let name = csv_field(&entity.name);
            for entry in &entity.series {
                output.push_str(&format!(
                    "{},{},{},{},{}\n",
                    name,
                    entry.period,
                    entry.metrics.total_reads,
                    entry.metrics.headline_reads,
                    entry.metrics.forward_total
                ));
            }
            output.push_str(&format!(
                "{},Total,{},{},{}\n",
                name, entity.total.total_reads, entity.total.headline_reads, entity.total.forward_total
            ));
        }

        output
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Folds per-period snapshots into per-entity series and totals.
///
/// Only records whose primary name is allowlisted contribute. A period whose
/// snapshot failed to ingest, or whose allowlisted records cannot be read, is
/// skipped as a whole and recorded in [`YearlyAggregate::skipped`].
pub fn aggregate_snapshots<I>(inputs: I, config: &YearlyReportConfig) -> YearlyAggregate
where
    I: IntoIterator<Item = (Period, Result<Snapshot>)>,
{
    let mut entities: Vec<EntitySeries> = Vec::with_capacity(config.entities.len());
    let mut index: HashMap<&str, usize> = HashMap::new();
    for name in &config.entities {
        if index.contains_key(name.as_str()) {
            continue;
        }
        index.insert(name.as_str(), entities.len());
        entities.push(EntitySeries {
            name: name.clone(),
            series: Vec::new(),
            total: MetricTriplet::default(),
        });
    }

    let mut periods = Vec::new();
    let mut skipped = Vec::new();

    for (period, snapshot) in inputs {
        let contributions = snapshot.and_then(|snapshot| {
            let mut found: Vec<(usize, MetricTriplet)> = Vec::new();
            for record in snapshot.records() {
                if let Some(&idx) = index.get(record.primary_name()) {
                    found.push((idx, MetricTriplet::from_record(record, config)?));
                }
            }
            Ok(found)
        });

        match contributions {
            Ok(contributions) => {
                debug!(
                    "Period {}: {} allowlisted record(s)",
                    period,
                    contributions.len()
                );
                for (idx, metrics) in contributions {
                    let entity = &mut entities[idx];
                    entity.series.push(SeriesEntry {
                        period: period.clone(),
                        metrics,
                    });
                    entity.total += metrics;
                }
                periods.push(period);
            }
            Err(e) => {
                warn!("Skipping period {} in yearly aggregation: {}", period, e);
                skipped.push(SkippedPeriod {
                    period,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "Yearly aggregation: {} entities over {} period(s), {} skipped",
        entities.len(),
        periods.len(),
        skipped.len()
    );

    YearlyAggregate {
        entities,
        periods,
        skipped,
    }
}

/// Ingests every workbook and aggregates the results.
pub fn aggregate_workbooks(
    inputs: &[(Period, Workbook)],
    schema: &ReportSchema,
    config: &YearlyReportConfig,
) -> YearlyAggregate {
    aggregate_snapshots(ingest_periods(inputs, schema), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::schema::FieldValue;
    use std::collections::BTreeMap;

    fn record(name: &str, reads: f64, headline: f64, forwards: f64) -> AccountRecord {
        let fields: BTreeMap<String, FieldValue> = [
            ("总阅读数", reads),
            ("头条阅读数", headline),
            ("总转发数", forwards),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), FieldValue::Number(*v)))
        .collect();
        AccountRecord::new(name, "", fields)
    }

    fn snapshot(period: &str, records: Vec<AccountRecord>) -> (Period, Result<Snapshot>) {
        let period = Period::new(period).unwrap();
        (period.clone(), Ok(Snapshot::new(period, records)))
    }

    fn config() -> YearlyReportConfig {
        YearlyReportConfig::with_entities(["晨报", "晚报", "周刊"])
    }

    #[test]
    fn test_series_and_totals() {
        let inputs = vec![
            snapshot("202401", vec![record("晨报", 100.0, 60.0, 5.0), record("路人", 1.0, 1.0, 1.0)]),
            snapshot("202402", vec![record("晨报", 200.0, 90.0, 7.0), record("晚报", 50.0, 20.0, 1.0)]),
        ];

        let aggregate = aggregate_snapshots(inputs, &config());
        assert_eq!(aggregate.entities.len(), 3);
        assert_eq!(aggregate.periods.len(), 2);

        let morning = aggregate.entity("晨报").unwrap();
        assert_eq!(morning.series.len(), 2);
        assert_eq!(
            morning.total,
            MetricTriplet {
                total_reads: 300.0,
                headline_reads: 150.0,
                forward_total: 12.0
            }
        );

        let evening = aggregate.entity("晚报").unwrap();
        assert_eq!(evening.series.len(), 1);
        assert_eq!(evening.series[0].period.as_str(), "202402");

        let weekly = aggregate.entity("周刊").unwrap();
        assert!(weekly.series.is_empty());
        assert_eq!(weekly.total, MetricTriplet::default());

        assert!(aggregate.entity("路人").is_none());
    }

    #[test]
    fn test_series_sum_equals_total() {
        let inputs = vec![
            snapshot("202403", vec![record("晨报", 3.0, 1.0, 0.5)]),
            snapshot("202401", vec![record("晨报", 10.0, 4.0, 2.0), record("晚报", 7.0, 7.0, 7.0)]),
            snapshot("202402", vec![record("晚报", 1.0, 2.0, 3.0)]),
        ];

        let aggregate = aggregate_snapshots(inputs, &config());
        for entity in &aggregate.entities {
            let summed: MetricTriplet = entity.series.iter().map(|e| e.metrics).sum();
            assert_eq!(summed, entity.total, "entity {}", entity.name);
        }
        let tokens: Vec<&str> = aggregate.periods.iter().map(Period::as_str).collect();
        assert_eq!(tokens, vec!["202403", "202401", "202402"]);
    }

    #[test]
    fn test_failed_period_is_skipped() {
        let inputs = vec![
            snapshot("202401", vec![record("晨报", 10.0, 1.0, 1.0)]),
            (
                Period::new("202402").unwrap(),
                Err(ReportError::EmptyWorkbook),
            ),
            snapshot("202403", vec![record("晨报", 5.0, 1.0, 1.0)]),
        ];

        let aggregate = aggregate_snapshots(inputs, &config());
        assert_eq!(aggregate.periods.len(), 2);
        assert_eq!(aggregate.skipped.len(), 1);
        assert_eq!(aggregate.skipped[0].period.as_str(), "202402");
        assert_eq!(aggregate.entity("晨报").unwrap().total.total_reads, 15.0);
    }

    #[test]
    fn test_unreadable_record_skips_period_for_all_entities() {
        let broken = AccountRecord::new("晚报", "", BTreeMap::new());
        let inputs = vec![
            snapshot("202401", vec![record("晨报", 10.0, 1.0, 1.0), broken]),
            snapshot("202402", vec![record("晨报", 1.0, 1.0, 1.0), record("晚报", f64::NAN, 0.0, 0.0)]),
            snapshot("202403", vec![record("晨报", 2.0, 1.0, 1.0)]),
        ];

        let aggregate = aggregate_snapshots(inputs, &config());
        let skipped: Vec<&str> = aggregate.skipped.iter().map(|s| s.period.as_str()).collect();
        assert_eq!(skipped, vec!["202401", "202402"]);

        let morning = aggregate.entity("晨报").unwrap();
        assert_eq!(morning.series.len(), 1);
        assert_eq!(morning.total.total_reads, 2.0);
    }

    #[test]
    fn test_duplicate_allowlist_entries_are_merged() {
        let config = YearlyReportConfig::with_entities(["晨报", "晨报"]);
        let aggregate = aggregate_snapshots(
            vec![snapshot("202401", vec![record("晨报", 1.0, 1.0, 1.0)])],
            &config,
        );
        assert_eq!(aggregate.entities.len(), 1);
        assert_eq!(aggregate.entities[0].series.len(), 1);
    }

    #[test]
    fn test_csv_export() {
        let config = YearlyReportConfig::with_entities(["晨报, 早版"]);
        let aggregate = aggregate_snapshots(
            vec![snapshot("202401", vec![record("晨报, 早版", 12.0, 3.0, 1.0)])],
            &config,
        );

        let csv = aggregate.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Entity,Period,Total Reads,Headline Reads,Forward Total");
        assert_eq!(lines[1], "\"晨报, 早版\",202401,12,3,1");
        assert_eq!(lines[2], "\"晨报, 早版\",Total,12,3,1");
    }

    #[test]
    fn test_json_export() {
        let aggregate = aggregate_snapshots(
            vec![snapshot("202401", vec![record("晨报", 1.0, 2.0, 3.0)])],
            &config(),
        );
        let json = aggregate.to_json().unwrap();
        assert!(json.contains("\"forward_total\": 3.0"));
        assert!(json.contains("\"202401\""));

        let parsed: YearlyAggregate = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, aggregate);
    }
}
