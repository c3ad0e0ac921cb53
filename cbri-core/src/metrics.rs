//! The metrics record for one analyzed revision and its wire form.
//!
//! A [`MetricsRecord`] is validated once at construction and never changes
//! afterwards. [`MetricsRecord::to_payload`] renders it as the flat object of
//! strings the measurement endpoint accepts:
//!
//! ```text
//! {
//!   "date": "2023-06-14T22:00:00Z",
//!   "architecture_type": "Core-Periphery",
//!   "is_core": "True",
//!   "propagation_cost": "33.5",
//!   "useful_lines_of_code": "10234",
//!   ...
//! }
//! ```

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Timestamp format expected by the dashboard, always in UTC.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Code-quality metrics computed for one revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMetricsRecord", into = "RawMetricsRecord")]
pub struct MetricsRecord {
    captured_at: DateTime<Utc>,
    revision_id: String,
    architecture_type: String,
    is_core: bool,
    propagation_cost: f64,
    uloc: u64,
    num_classes: u64,
    num_files: u64,
    core_size: u64,
    num_files_in_core: u64,
    num_files_overly_complex: u64,
    percent_files_overly_complex: f64,
    useful_lines_of_comments: u64,
    useful_comment_density: f64,
    duplicate_uloc: u64,
    percent_duplicate_uloc: f64,
    include_tree_map: bool,
}

impl MetricsRecord {
    pub fn builder() -> MetricsRecordBuilder {
        MetricsRecordBuilder::default()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn revision_id(&self) -> &str {
        &self.revision_id
    }

    pub fn architecture_type(&self) -> &str {
        &self.architecture_type
    }

    pub fn is_core(&self) -> bool {
        self.is_core
    }

    pub fn propagation_cost(&self) -> f64 {
        self.propagation_cost
    }

    /// Useful (non-blank, non-comment) lines of code.
    pub fn uloc(&self) -> u64 {
        self.uloc
    }

    pub fn num_classes(&self) -> u64 {
        self.num_classes
    }

    pub fn num_files(&self) -> u64 {
        self.num_files
    }

    pub fn core_size(&self) -> u64 {
        self.core_size
    }

    pub fn num_files_in_core(&self) -> u64 {
        self.num_files_in_core
    }

    pub fn num_files_overly_complex(&self) -> u64 {
        self.num_files_overly_complex
    }

    pub fn percent_files_overly_complex(&self) -> f64 {
        self.percent_files_overly_complex
    }

    pub fn useful_lines_of_comments(&self) -> u64 {
        self.useful_lines_of_comments
    }

    pub fn useful_comment_density(&self) -> f64 {
        self.useful_comment_density
    }

    pub fn duplicate_uloc(&self) -> u64 {
        self.duplicate_uloc
    }

    pub fn percent_duplicate_uloc(&self) -> f64 {
        self.percent_duplicate_uloc
    }

    /// Whether the tree-map view should be requested along with this measurement.
    pub fn include_tree_map(&self) -> bool {
        self.include_tree_map
    }

    /// Render the record as the measurement request body.
    pub fn to_payload(&self) -> MeasurementPayload {
        MeasurementPayload {
            date: self.captured_at.format(DATE_FORMAT).to_string(),
            architecture_type: self.architecture_type.clone(),
            is_core: python_bool(self.is_core).to_string(),
            propagation_cost: decimal(self.propagation_cost),
            useful_lines_of_code: self.uloc.to_string(),
            num_classes: self.num_classes.to_string(),
            num_files: self.num_files.to_string(),
            core_size: self.core_size.to_string(),
            num_files_in_core: self.num_files_in_core.to_string(),
            num_files_overly_complex: self.num_files_overly_complex.to_string(),
            percent_files_overly_complex: decimal(self.percent_files_overly_complex),
            useful_lines_of_comments: self.useful_lines_of_comments.to_string(),
            useful_comment_density: decimal(self.useful_comment_density),
            duplicate_uloc: self.duplicate_uloc.to_string(),
            percent_duplicate_uloc: decimal(self.percent_duplicate_uloc),
        }
    }
}

/// Body of `POST /repositories/{id}/measurements/`. Every value is a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementPayload {
    pub date: String,
    pub architecture_type: String,
    pub is_core: String,
    pub propagation_cost: String,
    pub useful_lines_of_code: String,
    pub num_classes: String,
    pub num_files: String,
    pub core_size: String,
    pub num_files_in_core: String,
    pub num_files_overly_complex: String,
    pub percent_files_overly_complex: String,
    pub useful_lines_of_comments: String,
    pub useful_comment_density: String,
    pub duplicate_uloc: String,
    pub percent_duplicate_uloc: String,
}

impl MeasurementPayload {
    /// Every key of the request body, in wire order.
    pub const KEYS: [&'static str; 15] = [
        "date",
        "architecture_type",
        "is_core",
        "propagation_cost",
        "useful_lines_of_code",
        "num_classes",
        "num_files",
        "core_size",
        "num_files_in_core",
        "num_files_overly_complex",
        "percent_files_overly_complex",
        "useful_lines_of_comments",
        "useful_comment_density",
        "duplicate_uloc",
        "percent_duplicate_uloc",
    ];
}

fn python_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Decimal rendering that always keeps a fractional part: `10.0`, `33.5`.
fn decimal(value: f64) -> String {
    let rendered = value.to_string();
    if rendered.contains('.') {
        rendered
    } else {
        format!("{rendered}.0")
    }
}

/// Builder for [`MetricsRecord`]. Every field except `include_tree_map` is required.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecordBuilder {
    captured_at: Option<DateTime<Utc>>,
    revision_id: Option<String>,
    architecture_type: Option<String>,
    is_core: Option<bool>,
    propagation_cost: Option<f64>,
    uloc: Option<u64>,
    num_classes: Option<u64>,
    num_files: Option<u64>,
    core_size: Option<u64>,
    num_files_in_core: Option<u64>,
    num_files_overly_complex: Option<u64>,
    percent_files_overly_complex: Option<f64>,
    useful_lines_of_comments: Option<u64>,
    useful_comment_density: Option<f64>,
    duplicate_uloc: Option<u64>,
    percent_duplicate_uloc: Option<f64>,
    include_tree_map: bool,
}

impl MetricsRecordBuilder {
    pub fn captured_at(mut self, at: DateTime<Utc>) -> Self {
        self.captured_at = Some(at);
        self
    }

    pub fn revision_id(mut self, id: impl Into<String>) -> Self {
        self.revision_id = Some(id.into());
        self
    }

    pub fn architecture_type(mut self, kind: impl Into<String>) -> Self {
        self.architecture_type = Some(kind.into());
        self
    }

    pub fn is_core(mut self, is_core: bool) -> Self {
        self.is_core = Some(is_core);
        self
    }

    pub fn propagation_cost(mut self, cost: f64) -> Self {
        self.propagation_cost = Some(cost);
        self
    }

    pub fn uloc(mut self, uloc: u64) -> Self {
        self.uloc = Some(uloc);
        self
    }

    pub fn num_classes(mut self, n: u64) -> Self {
        self.num_classes = Some(n);
        self
    }

    pub fn num_files(mut self, n: u64) -> Self {
        self.num_files = Some(n);
        self
    }

    pub fn core_size(mut self, n: u64) -> Self {
        self.core_size = Some(n);
        self
    }

    pub fn num_files_in_core(mut self, n: u64) -> Self {
        self.num_files_in_core = Some(n);
        self
    }

    pub fn num_files_overly_complex(mut self, n: u64) -> Self {
        self.num_files_overly_complex = Some(n);
        self
    }

    pub fn percent_files_overly_complex(mut self, pct: f64) -> Self {
        self.percent_files_overly_complex = Some(pct);
        self
    }

    pub fn useful_lines_of_comments(mut self, n: u64) -> Self {
        self.useful_lines_of_comments = Some(n);
        self
    }

    pub fn useful_comment_density(mut self, pct: f64) -> Self {
        self.useful_comment_density = Some(pct);
        self
    }

    pub fn duplicate_uloc(mut self, n: u64) -> Self {
        self.duplicate_uloc = Some(n);
        self
    }

    pub fn percent_duplicate_uloc(mut self, pct: f64) -> Self {
        self.percent_duplicate_uloc = Some(pct);
        self
    }

    pub fn include_tree_map(mut self, include: bool) -> Self {
        self.include_tree_map = include;
        self
    }

    /// Validate the collected fields and produce the record.
    pub fn build(self) -> Result<MetricsRecord, RecordError> {
        Ok(MetricsRecord {
            captured_at: four_digit_year(required("captured_at", self.captured_at)?)?,
            revision_id: required("revision_id", self.revision_id)?,
            architecture_type: required("architecture_type", self.architecture_type)?,
            is_core: required("is_core", self.is_core)?,
            propagation_cost: non_negative(
                "propagation_cost",
                required("propagation_cost", self.propagation_cost)?,
            )?,
            uloc: required("uloc", self.uloc)?,
            num_classes: required("num_classes", self.num_classes)?,
            num_files: required("num_files", self.num_files)?,
            core_size: required("core_size", self.core_size)?,
            num_files_in_core: required("num_files_in_core", self.num_files_in_core)?,
            num_files_overly_complex: required(
                "num_files_overly_complex",
                self.num_files_overly_complex,
            )?,
            percent_files_overly_complex: percentage(
                "percent_files_overly_complex",
                required(
                    "percent_files_overly_complex",
                    self.percent_files_overly_complex,
                )?,
            )?,
            useful_lines_of_comments: required(
                "useful_lines_of_comments",
                self.useful_lines_of_comments,
            )?,
            useful_comment_density: percentage(
                "useful_comment_density",
                required("useful_comment_density", self.useful_comment_density)?,
            )?,
            duplicate_uloc: required("duplicate_uloc", self.duplicate_uloc)?,
            percent_duplicate_uloc: percentage(
                "percent_duplicate_uloc",
                required("percent_duplicate_uloc", self.percent_duplicate_uloc)?,
            )?,
            include_tree_map: self.include_tree_map,
        })
    }
}

fn required<T>(field: &'static str, value: Option<T>) -> Result<T, RecordError> {
    value.ok_or(RecordError::MissingField { field })
}

fn four_digit_year(at: DateTime<Utc>) -> Result<DateTime<Utc>, RecordError> {
    match at.year() {
        0..=9999 => Ok(at),
        year => Err(RecordError::DateOutOfRange { year }),
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, RecordError> {
    if value.is_finite() && value >= 0.0 {
        // normalizes -0.0
        Ok(value.abs())
    } else {
        Err(RecordError::OutOfRange { field, value })
    }
}

fn percentage(field: &'static str, value: f64) -> Result<f64, RecordError> {
    let value = non_negative(field, value)?;
    if value <= 100.0 {
        Ok(value)
    } else {
        Err(RecordError::OutOfRange { field, value })
    }
}

/// Serde shape of [`MetricsRecord`]; decoding goes through the builder checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawMetricsRecord {
    captured_at: DateTime<Utc>,
    revision_id: String,
    architecture_type: String,
    is_core: bool,
    propagation_cost: f64,
    uloc: u64,
    num_classes: u64,
    num_files: u64,
    core_size: u64,
    num_files_in_core: u64,
    num_files_overly_complex: u64,
    percent_files_overly_complex: f64,
    useful_lines_of_comments: u64,
    useful_comment_density: f64,
    duplicate_uloc: u64,
    percent_duplicate_uloc: f64,
    #[serde(default)]
    include_tree_map: bool,
}

impl TryFrom<RawMetricsRecord> for MetricsRecord {
    type Error = RecordError;

    fn try_from(raw: RawMetricsRecord) -> Result<Self, Self::Error> {
        MetricsRecord::builder()
            .captured_at(raw.captured_at)
            .revision_id(raw.revision_id)
            .architecture_type(raw.architecture_type)
            .is_core(raw.is_core)
            .propagation_cost(raw.propagation_cost)
            .uloc(raw.uloc)
            .num_classes(raw.num_classes)
            .num_files(raw.num_files)
            .core_size(raw.core_size)
            .num_files_in_core(raw.num_files_in_core)
            .num_files_overly_complex(raw.num_files_overly_complex)
            .percent_files_overly_complex(raw.percent_files_overly_complex)
            .useful_lines_of_comments(raw.useful_lines_of_comments)
            .useful_comment_density(raw.useful_comment_density)
            .duplicate_uloc(raw.duplicate_uloc)
            .percent_duplicate_uloc(raw.percent_duplicate_uloc)
            .include_tree_map(raw.include_tree_map)
            .build()
    }
}

impl From<MetricsRecord> for RawMetricsRecord {
    fn from(record: MetricsRecord) -> Self {
        Self {
            captured_at: record.captured_at,
            revision_id: record.revision_id,
            architecture_type: record.architecture_type,
            is_core: record.is_core,
            propagation_cost: record.propagation_cost,
            uloc: record.uloc,
            num_classes: record.num_classes,
            num_files: record.num_files,
            core_size: record.core_size,
            num_files_in_core: record.num_files_in_core,
            num_files_overly_complex: record.num_files_overly_complex,
            percent_files_overly_complex: record.percent_files_overly_complex,
            useful_lines_of_comments: record.useful_lines_of_comments,
            useful_comment_density: record.useful_comment_density,
            duplicate_uloc: record.duplicate_uloc,
            percent_duplicate_uloc: record.percent_duplicate_uloc,
            include_tree_map: record.include_tree_map,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn sample() -> MetricsRecordBuilder {
        MetricsRecord::builder()
            .captured_at(Utc.with_ymd_and_hms(2023, 6, 14, 22, 0, 0).unwrap())
            .revision_id("Jenkins-Build-7")
            .architecture_type("Core-Periphery")
            .is_core(true)
            .propagation_cost(33.5)
            .uloc(10234)
            .num_classes(120)
            .num_files(98)
            .core_size(14)
            .num_files_in_core(14)
            .num_files_overly_complex(3)
            .percent_files_overly_complex(3.06)
            .useful_lines_of_comments(2048)
            .useful_comment_density(20.0)
            .duplicate_uloc(512)
            .percent_duplicate_uloc(5.0)
    }

    #[test]
    fn test_payload_encodings() {
        let payload = sample().build().unwrap().to_payload();

        assert_eq!(payload.date, "2023-06-14T22:00:00Z");
        assert_eq!(payload.architecture_type, "Core-Periphery");
        assert_eq!(payload.is_core, "True");
        assert_eq!(payload.propagation_cost, "33.5");
        assert_eq!(payload.useful_lines_of_code, "10234");
        assert_eq!(payload.num_classes, "120");
        assert_eq!(payload.percent_files_overly_complex, "3.06");
        assert_eq!(payload.useful_comment_density, "20.0");
        assert_eq!(payload.percent_duplicate_uloc, "5.0");

        let payload = sample().is_core(false).build().unwrap().to_payload();
        assert_eq!(payload.is_core, "False");
    }

    #[test]
    fn test_payload_json_has_exactly_wire_keys() {
        let payload = sample().build().unwrap().to_payload();
        let value = serde_json::to_value(&payload).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), MeasurementPayload::KEYS.len());
        for key in MeasurementPayload::KEYS {
            assert!(object[key].is_string(), "{key} should be a string");
        }
    }

    #[test]
    fn test_date_is_rendered_in_utc() {
        let offset = chrono::FixedOffset::east_opt(2 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2023, 6, 15, 0, 0, 0).unwrap();
        let payload = sample()
            .captured_at(local.with_timezone(&Utc))
            .build()
            .unwrap()
            .to_payload();

        assert_eq!(payload.date, "2023-06-14T22:00:00Z");
    }

    #[test]
    fn test_missing_field_rejected() {
        let err = MetricsRecord::builder()
            .revision_id("r1")
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RecordError::MissingField {
                field: "captured_at"
            }
        );
    }

    #[test]
    fn test_out_of_range_rejected() {
        let err = sample().propagation_cost(-1.0).build().unwrap_err();
        assert!(matches!(
            err,
            RecordError::OutOfRange {
                field: "propagation_cost",
                ..
            }
        ));

        let err = sample().useful_comment_density(100.5).build().unwrap_err();
        assert!(matches!(
            err,
            RecordError::OutOfRange {
                field: "useful_comment_density",
                ..
            }
        ));

        let err = sample().percent_duplicate_uloc(f64::NAN).build().unwrap_err();
        assert!(matches!(err, RecordError::OutOfRange { .. }));

        assert!(sample().percent_duplicate_uloc(100.0).build().is_ok());
        let record = sample().duplicate_uloc(0).percent_duplicate_uloc(-0.0).build().unwrap();
        assert_eq!(record.to_payload().percent_duplicate_uloc, "0.0");
    }

    #[test]
    fn test_capture_year_must_have_four_digits() {
        let err = sample()
            .captured_at(Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap())
            .build()
            .unwrap_err();
        assert_eq!(err, RecordError::DateOutOfRange { year: 10000 });

        let err = sample()
            .captured_at(Utc.with_ymd_and_hms(-1, 12, 31, 23, 59, 59).unwrap())
            .build()
            .unwrap_err();
        assert_eq!(err, RecordError::DateOutOfRange { year: -1 });

        let payload = sample()
            .captured_at(Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap())
            .build()
            .unwrap()
            .to_payload();
        assert_eq!(payload.date, "9999-12-31T23:59:59Z");
    }

    #[test]
    fn test_deserialize_validates() {
        let record = sample().include_tree_map(true).build().unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["captured_at"], "2023-06-14T22:00:00Z");

        let decoded: MetricsRecord = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(decoded, record);
        assert!(decoded.include_tree_map());

        let mut bad = json;
        bad["percent_duplicate_uloc"] = serde_json::json!(250.0);
        let err = serde_json::from_value::<MetricsRecord>(bad).unwrap_err();
        assert!(err.to_string().contains("percent_duplicate_uloc"));
    }

    #[test]
    fn test_decimal_rendering() {
        assert_eq!(decimal(0.0), "0.0");
        assert_eq!(decimal(100.0), "100.0");
        assert_eq!(decimal(0.0001), "0.0001");
        assert_eq!(decimal(12345678.25), "12345678.25");
    }

    proptest! {
        #[test]
        fn prop_payload_fields_round_trip(
            cost in 0.0f64..=100.0,
            pct in 0.0f64..=100.0,
            uloc in any::<u64>(),
            is_core in any::<bool>(),
            secs in 0i64..4_102_444_800,
        ) {
            let at = Utc.timestamp_opt(secs, 0).unwrap();
            let record = sample()
                .captured_at(at)
                .propagation_cost(cost)
                .percent_files_overly_complex(pct)
                .uloc(uloc)
                .is_core(is_core)
                .build()
                .unwrap();
            let payload = record.to_payload();

            prop_assert_eq!(payload.propagation_cost.parse::<f64>().unwrap(), cost);
            prop_assert!(payload.propagation_cost.contains('.'));
            prop_assert_eq!(payload.percent_files_overly_complex.parse::<f64>().unwrap(), pct);
            prop_assert_eq!(payload.useful_lines_of_code.parse::<u64>().unwrap(), uloc);
            prop_assert_eq!(payload.is_core, if is_core { "True" } else { "False" });

            let parsed = chrono::NaiveDateTime::parse_from_str(&payload.date, DATE_FORMAT).unwrap();
            prop_assert_eq!(parsed.and_utc(), at);
        }
    }
}
