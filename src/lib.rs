//! # Account Report Digest
//!
//! A library for turning periodic account-performance spreadsheet exports into
//! normalized snapshots, period-over-period display bundles and yearly series.
//!
//! ## Core Concepts
//!
//! - **Snapshot**: every included row of one period's report, keyed by a six-digit `YYYYMM` period
//! - **Normalization**: text cells like `"1.2w"` (×10,000) or `"+23"` become finite numbers
//! - **Entity key**: the alternate account name when present, else the primary name
//! - **Display bundle**: ten metrics per account, each a `{value, increment}` pair where
//!   a corrupt field degrades to `{"error": "<label>数据错误"}` without affecting its siblings
//! - **Yearly aggregate**: per-entity series and totals of reads, headline reads and forwards
//!   for an allowlist of accounts
//!
//! ## Example
//!
//! ```rust,ignore
//! use account_report_digest::*;
//!
//! let digest = ReportDigest::new(
//!     ReportSchema::default(),
//!     YearlyReportConfig::with_entities(["晨报"]),
//! )?;
//!
//! let current = digest.ingest(&"202402".parse()?, &february_workbook)?;
//! let previous = digest.ingest(&"202401".parse()?, &january_workbook)?;
//! let report = digest.period_report(&current, Some(&previous));
//! ```

pub mod accessor;
pub mod delta;
pub mod display;
pub mod entity;
pub mod error;
pub mod normalize;
pub mod record;
pub mod schema;
pub mod yearly;

#[cfg(feature = "xlsx")]
pub mod workbook;

pub use accessor::{guard, read_finite, read_metric, FieldError, FieldResult};
pub use delta::{compute_delta, MetricDelta};
pub use display::{
    build_bundle, build_period_report, DisplayMetricBundle, DisplayValue, EntityReport, MetricCell,
};
pub use entity::{dedup_by_key, entity_key, find_by_key};
pub use error::{ReportError, Result};
pub use normalize::{normalize_cell, parse_metric_text, MYRIAD};
pub use record::{build_record, ingest_periods, ingest_workbook, parse_sheet};
pub use schema::*;
pub use yearly::{
    aggregate_snapshots, aggregate_workbooks, EntitySeries, MetricTriplet, SeriesEntry,
    SkippedPeriod, YearlyAggregate,
};

#[cfg(feature = "xlsx")]
pub use workbook::read_workbook;

use log::{debug, info};

/// Report layout plus yearly configuration, validated once.
#[derive(Debug, Clone)]
pub struct ReportDigest {
    schema: ReportSchema,
    yearly: YearlyReportConfig,
}

impl ReportDigest {
    pub fn new(schema: ReportSchema, yearly: YearlyReportConfig) -> Result<Self> {
        schema.validate()?;

        info!(
            "Report digest configured: identity fields '{}'/'{}', {} yearly entities",
            schema.primary_name_field,
            schema.alternate_name_field,
            yearly.entities.len()
        );
        debug!("Metric bindings: {:?}", schema.metrics);

        Ok(Self { schema, yearly })
    }

    pub fn schema(&self) -> &ReportSchema {
        &self.schema
    }

    pub fn yearly_config(&self) -> &YearlyReportConfig {
        &self.yearly
    }

    pub fn ingest(&self, period: &Period, workbook: &Workbook) -> Result<Snapshot> {
        ingest_workbook(workbook, period, &self.schema)
    }

    pub fn period_report(&self, current: &Snapshot, previous: Option<&Snapshot>) -> Vec<EntityReport> {
        build_period_report(current, previous, &self.schema)
    }

    pub fn yearly(&self, inputs: &[(Period, Workbook)]) -> YearlyAggregate {
        aggregate_workbooks(inputs, &self.schema, &self.yearly)
    }

    pub fn yearly_from_snapshots<I>(&self, snapshots: I) -> YearlyAggregate
    where
        I: IntoIterator<Item = Snapshot>,
    {
        aggregate_snapshots(
            snapshots
                .into_iter()
                .map(|snapshot| (snapshot.period().clone(), Ok(snapshot))),
            &self.yearly,
        )
    }
}
