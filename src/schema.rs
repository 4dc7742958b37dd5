use crate::error::{ReportError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// A raw cell as produced by the workbook decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    /// String coercion used for identity and header cells. Empty cells become "".
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Empty => String::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

/// One included row of a period report.
///
/// The two identity fields are typed; every other column is carried by name so
/// new metric columns flow through without code changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    primary_name: String,
    alternate_name: String,
    fields: BTreeMap<String, FieldValue>,
}

impl AccountRecord {
    pub fn new(
        primary_name: impl Into<String>,
        alternate_name: impl Into<String>,
        fields: BTreeMap<String, FieldValue>,
    ) -> Self {
        Self {
            primary_name: primary_name.into(),
            alternate_name: alternate_name.into(),
            fields,
        }
    }

    pub fn primary_name(&self) -> &str {
        &self.primary_name
    }

    pub fn alternate_name(&self) -> &str {
        &self.alternate_name
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        match self.fields.get(name)? {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Six-digit `YYYYMM` token naming one monthly report.
///
/// Periods are compared as strings and never converted to dates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period(String);

impl Period {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.len() == 6 && token.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(token))
        } else {
            Err(ReportError::InvalidPeriod(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The four-character year prefix of the token.
    pub fn year(&self) -> &str {
        &self.0[..4]
    }
}

impl TryFrom<String> for Period {
    type Error = ReportError;

    fn try_from(value: String) -> Result<Self> {
        Period::new(value)
    }
}

impl From<Period> for String {
    fn from(value: Period) -> Self {
        value.0
    }
}

impl FromStr for Period {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        Period::new(s)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// All included records of one period, in sheet row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    period: Period,
    records: Vec<AccountRecord>,
}

impl Snapshot {
    pub fn new(period: Period, records: Vec<AccountRecord>) -> Self {
        Self { period, records }
    }

    pub fn period(&self) -> &Period {
        &self.period
    }

    pub fn records(&self) -> &[AccountRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub type SheetGrid = Vec<Vec<CellValue>>;

/// A decoded workbook: sheet names in workbook order and one cell grid per sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheet_names: Vec<String>,
    sheets: BTreeMap<String, SheetGrid>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, name: impl Into<String>, rows: SheetGrid) -> Self {
        self.insert_sheet(name, rows);
        self
    }

    pub fn insert_sheet(&mut self, name: impl Into<String>, rows: SheetGrid) {
        let name = name.into();
        if !self.sheets.contains_key(&name) {
            self.sheet_names.push(name.clone());
        }
        self.sheets.insert(name, rows);
    }

    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    pub fn sheet(&self, name: &str) -> Option<&[Vec<CellValue>]> {
        self.sheets.get(name).map(Vec::as_slice)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMetric {
    PostCount,
    TotalReads,
    HeadlineReads,
    HitThresholdCount,
    AverageReads,
    RecommendCount,
    LikeCount,
    ForwardCount,
    Rank,
    RankChange,
}

impl DisplayMetric {
    pub const ALL: [DisplayMetric; 10] = [
        DisplayMetric::PostCount,
        DisplayMetric::TotalReads,
        DisplayMetric::HeadlineReads,
        DisplayMetric::HitThresholdCount,
        DisplayMetric::AverageReads,
        DisplayMetric::RecommendCount,
        DisplayMetric::LikeCount,
        DisplayMetric::ForwardCount,
        DisplayMetric::Rank,
        DisplayMetric::RankChange,
    ];

    /// Human-readable label, as used in per-field error messages.
    pub fn label(self) -> &'static str {
        match self {
            DisplayMetric::PostCount => "发文篇数",
            DisplayMetric::TotalReads => "总阅读数",
            DisplayMetric::HeadlineReads => "头条阅读数",
            DisplayMetric::HitThresholdCount => "10万+篇数",
            DisplayMetric::AverageReads => "平均阅读数",
            DisplayMetric::RecommendCount => "在看数",
            DisplayMetric::LikeCount => "点赞数",
            DisplayMetric::ForwardCount => "转发数",
            DisplayMetric::Rank => "排名",
            DisplayMetric::RankChange => "排名变化",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum IncrementSource {
    #[schemars(description = "Read the increment verbatim from a pre-computed column of the same report")]
    Column {
        #[schemars(description = "Header of the increment column")]
        field: String,
    },

    #[schemars(
        description = "Recompute the increment as current minus previous period value of the bound value column"
    )]
    PeriodDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricBinding {
    #[schemars(description = "Display metric this binding feeds")]
    pub metric: DisplayMetric,

    #[schemars(description = "Header of the column holding the metric value")]
    pub value_field: String,

    #[schemars(description = "Where the period-over-period increment comes from")]
    pub increment: IncrementSource,
}

impl MetricBinding {
    fn with_column(metric: DisplayMetric, value_field: &str, increment_field: &str) -> Self {
        Self {
            metric,
            value_field: value_field.to_string(),
            increment: IncrementSource::Column {
                field: increment_field.to_string(),
            },
        }
    }
}

/// Column layout of one period report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportSchema {
    #[schemars(description = "Header of the primary account name column")]
    pub primary_name_field: String,

    #[schemars(description = "Header of the alternate account name column; preferred as entity key when non-empty")]
    pub alternate_name_field: String,

    #[serde(default)]
    #[schemars(description = "Sheet to read. Defaults to the first sheet of the workbook")]
    pub sheet: Option<String>,

    #[schemars(description = "Bindings for the ten display metrics, each bound exactly once")]
    pub metrics: Vec<MetricBinding>,
}

impl Default for ReportSchema {
    fn default() -> Self {
        use DisplayMetric::*;

        Self {
            primary_name_field: "账号名称".to_string(),
            alternate_name_field: "账号别名".to_string(),
            sheet: None,
            metrics: vec![
                MetricBinding::with_column(PostCount, "发文篇数", "发文篇数增量"),
                MetricBinding::with_column(TotalReads, "总阅读数", "总阅读数增量"),
                MetricBinding::with_column(HeadlineReads, "头条阅读数", "头条阅读数增量"),
                MetricBinding::with_column(HitThresholdCount, "10万+篇数", "10万+篇数增量"),
                MetricBinding::with_column(AverageReads, "平均阅读数", "平均阅读数增量"),
                MetricBinding::with_column(RecommendCount, "在看数", "在看数增量"),
                MetricBinding::with_column(LikeCount, "点赞数", "点赞数增量"),
                MetricBinding {
                    metric: ForwardCount,
                    value_field: "总转发数".to_string(),
                    increment: IncrementSource::PeriodDelta,
                },
                MetricBinding::with_column(Rank, "排名", "排名变化"),
                MetricBinding::with_column(RankChange, "排名变化", "排名变化增量"),
            ],
        }
    }
}

impl ReportSchema {
    pub fn from_json(json: &str) -> Result<Self> {
        let schema: ReportSchema = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> Result<()> {
        if self.primary_name_field.trim().is_empty() || self.alternate_name_field.trim().is_empty() {
            return Err(ReportError::InvalidSchema(
                "identity field names must not be empty".to_string(),
            ));
        }
        if self.primary_name_field == self.alternate_name_field {
            return Err(ReportError::InvalidSchema(format!(
                "primary and alternate name fields are both '{}'",
                self.primary_name_field
            )));
        }

        let mut seen = HashSet::new();
        for binding in &self.metrics {
            if !seen.insert(binding.metric) {
                return Err(ReportError::InvalidSchema(format!(
                    "metric {:?} is bound more than once",
                    binding.metric
                )));
            }
        }
        if let Some(missing) = DisplayMetric::ALL.iter().find(|m| !seen.contains(*m)) {
            return Err(ReportError::InvalidSchema(format!(
                "metric {:?} has no binding",
                missing
            )));
        }

        Ok(())
    }

    pub fn binding(&self, metric: DisplayMetric) -> Option<&MetricBinding> {
        self.metrics.iter().find(|b| b.metric == metric)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ReportSchema)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

/// Allowlist and metric columns of the yearly report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct YearlyReportConfig {
    #[schemars(description = "Primary account names to track, in report order")]
    pub entities: Vec<String>,

    #[schemars(description = "Header of the total reads column")]
    pub total_reads_field: String,

    #[schemars(description = "Header of the headline reads column")]
    pub headline_reads_field: String,

    #[schemars(description = "Header of the forward total column")]
    pub forward_total_field: String,
}

impl Default for YearlyReportConfig {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            total_reads_field: "总阅读数".to_string(),
            headline_reads_field: "头条阅读数".to_string(),
            forward_total_field: "总转发数".to_string(),
        }
    }
}

impl YearlyReportConfig {
    pub fn with_entities<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entities: entities.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(YearlyReportConfig)
    }
}
