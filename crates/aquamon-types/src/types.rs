//! Core types for water-quality sensor data.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{Date, OffsetDateTime, UtcOffset};

use crate::error::ParseError;
use crate::timestamp::parse_timestamp;

/// Inclusive physical range of a metric.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetricRange {
    /// Lowest accepted value.
    pub min: f64,
    /// Highest accepted value.
    pub max: f64,
}

impl MetricRange {
    /// Create a new range.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `value` lies inside the range (inclusive).
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// One of the seven water-quality metrics carried by a [`Reading`].
///
/// Variants are declared in display order, which is also the column order
/// used by tables and CSV exports.
///
/// ```
/// use aquamon_types::Metric;
///
/// assert_eq!(Metric::Ph.range().max, 14.0);
/// assert_eq!(Metric::Ec.csv_header(), "EC(µS/cm)");
/// assert_eq!("tds".parse::<Metric>(), Ok(Metric::Tds));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Metric {
    /// Acidity, dimensionless.
    Ph,
    /// Electrical conductivity in µS/cm.
    Ec,
    /// Dissolved oxygen in mg/L.
    DissolvedOxygen,
    /// Oxidation-reduction (redox) potential in mV.
    Orp,
    /// Turbidity in NTU.
    Turbidity,
    /// Total dissolved solids in ppm.
    Tds,
    /// Water temperature in °C.
    Temperature,
}

impl Metric {
    /// All metrics, in display order.
    pub const ALL: [Metric; 7] = [
        Metric::Ph,
        Metric::Ec,
        Metric::DissolvedOxygen,
        Metric::Orp,
        Metric::Turbidity,
        Metric::Tds,
        Metric::Temperature,
    ];

    /// Physical domain of the metric. Values outside are clamped, not rejected.
    #[must_use]
    pub const fn range(self) -> MetricRange {
        match self {
            Metric::Ph => MetricRange::new(0.0, 14.0),
            Metric::Ec => MetricRange::new(0.0, 100_000.0),
            Metric::DissolvedOxygen => MetricRange::new(0.0, 50.0),
            Metric::Orp => MetricRange::new(-2000.0, 2000.0),
            Metric::Turbidity => MetricRange::new(0.0, 4000.0),
            Metric::Tds => MetricRange::new(0.0, 50_000.0),
            Metric::Temperature => MetricRange::new(-50.0, 150.0),
        }
    }

    /// Unit suffix, empty for pH.
    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Metric::Ph => "",
            Metric::Ec => "µS/cm",
            Metric::DissolvedOxygen => "mg/L",
            Metric::Orp => "mV",
            Metric::Turbidity => "NTU",
            Metric::Tds => "ppm",
            Metric::Temperature => "°C",
        }
    }

    /// Short label used on tiles and table headers.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Metric::Ph => "pH",
            Metric::Ec => "EC",
            Metric::DissolvedOxygen => "DO",
            Metric::Orp => "ORP",
            Metric::Turbidity => "Turbidity",
            Metric::Tds => "TDS",
            Metric::Temperature => "Temp",
        }
    }

    /// Column header used in CSV exports.
    #[must_use]
    pub const fn csv_header(self) -> &'static str {
        match self {
            Metric::Ph => "pH",
            Metric::Ec => "EC(µS/cm)",
            Metric::DissolvedOxygen => "DO(mg/L)",
            Metric::Orp => "ORP(mV)",
            Metric::Turbidity => "Turbidity(NTU)",
            Metric::Tds => "TDS(ppm)",
            Metric::Temperature => "Temp(°C)",
        }
    }

    /// Key of this metric in a [`RawRecord`].
    #[must_use]
    pub const fn raw_key(self) -> &'static str {
        match self {
            Metric::Ph => "ph",
            Metric::Ec => "ec_uS_cm",
            Metric::DissolvedOxygen => "do_mg_L",
            Metric::Orp => "orp_mV",
            Metric::Turbidity => "turbidity_NTU",
            Metric::Tds => "tds_ppm",
            Metric::Temperature => "temp_C",
        }
    }

    /// Position of the metric in [`Metric::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Metric {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ph" => Ok(Metric::Ph),
            "ec" | "conductivity" | "ec_us_cm" => Ok(Metric::Ec),
            "do" | "dissolved_oxygen" | "do_mg_l" => Ok(Metric::DissolvedOxygen),
            "orp" | "redox" | "orp_mv" => Ok(Metric::Orp),
            "turbidity" | "turbidity_ntu" => Ok(Metric::Turbidity),
            "tds" | "tds_ppm" => Ok(Metric::Tds),
            "temp" | "temperature" | "temp_c" => Ok(Metric::Temperature),
            _ => Err(ParseError::UnknownMetric(s.to_string())),
        }
    }
}

/// One normalized sensor observation.
///
/// Metric values are either validated numbers inside [`Metric::range`] or
/// `None` for "no data". Readings are built once by the normalizer and never
/// mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Reading {
    /// When the observation was taken, if the raw token could be parsed.
    #[cfg_attr(feature = "serde", serde(default, with = "time::serde::rfc3339::option"))]
    pub timestamp: Option<OffsetDateTime>,
    /// Device identifier. May be empty.
    pub device: String,
    /// pH.
    pub ph: Option<f64>,
    /// Electrical conductivity in µS/cm.
    pub ec: Option<f64>,
    /// Dissolved oxygen in mg/L.
    pub dissolved_oxygen: Option<f64>,
    /// Redox potential in mV.
    pub orp: Option<f64>,
    /// Turbidity in NTU.
    pub turbidity: Option<f64>,
    /// Total dissolved solids in ppm.
    pub tds: Option<f64>,
    /// Temperature in °C.
    pub temperature: Option<f64>,
    /// Radio signal strength, passed through from the raw record.
    pub signal_strength: Option<i64>,
    /// Radio signal-to-noise ratio, passed through from the raw record.
    pub signal_noise_ratio: Option<i64>,
}

impl Reading {
    /// Create an empty reading for a device.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Option<OffsetDateTime>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set one metric value.
    #[must_use]
    pub fn with_value(mut self, metric: Metric, value: Option<f64>) -> Self {
        *self.slot_mut(metric) = value;
        self
    }

    /// Set the signal fields.
    #[must_use]
    pub fn with_signal(mut self, strength: Option<i64>, noise_ratio: Option<i64>) -> Self {
        self.signal_strength = strength;
        self.signal_noise_ratio = noise_ratio;
        self
    }

    /// Value of one metric.
    #[must_use]
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Ph => self.ph,
            Metric::Ec => self.ec,
            Metric::DissolvedOxygen => self.dissolved_oxygen,
            Metric::Orp => self.orp,
            Metric::Turbidity => self.turbidity,
            Metric::Tds => self.tds,
            Metric::Temperature => self.temperature,
        }
    }

    fn slot_mut(&mut self, metric: Metric) -> &mut Option<f64> {
        match metric {
            Metric::Ph => &mut self.ph,
            Metric::Ec => &mut self.ec,
            Metric::DissolvedOxygen => &mut self.dissolved_oxygen,
            Metric::Orp => &mut self.orp,
            Metric::Turbidity => &mut self.turbidity,
            Metric::Tds => &mut self.tds,
            Metric::Temperature => &mut self.temperature,
        }
    }

    /// Calendar day of the timestamp at the given offset.
    #[must_use]
    pub fn day(&self, offset: UtcOffset) -> Option<Date> {
        self.timestamp.map(|ts| ts.to_offset(offset).date())
    }
}

/// Keys accepted for the timestamp token, in lookup order.
pub const TIMESTAMP_KEYS: &[&str] = &["timestamp", "ts"];
/// Keys accepted for the device field inside a raw record.
pub const DEVICE_KEYS: &[&str] = &["device", "deviceId"];
/// Keys accepted for signal strength.
pub const SIGNAL_STRENGTH_KEYS: &[&str] = &["signalStrength", "rssi"];
/// Keys accepted for signal-to-noise ratio.
pub const SIGNAL_NOISE_KEYS: &[&str] = &["signalNoiseRatio", "snr"];

/// A record as stored remotely, tagged with the device it was read from.
///
/// The field map is owned by the store and may contain anything; accessors
/// never fail and return `None` for absent or unusable values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// Device the record was collected under.
    pub device: String,
    /// Raw key/value pairs.
    pub fields: Map<String, Value>,
}

impl RawRecord {
    /// Create a record from a device tag and field map.
    pub fn new(device: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            device: device.into(),
            fields,
        }
    }

    /// Build a record from an arbitrary JSON value; non-objects yield `None`.
    pub fn from_value(device: impl Into<String>, value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self::new(device, fields)),
            _ => None,
        }
    }

    /// Look up the first present key among `keys`.
    #[must_use]
    pub fn get_any(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter()
            .filter_map(|k| self.fields.get(*k))
            .find(|v| !v.is_null())
    }

    /// Numeric value of a field: JSON numbers and numeric strings are accepted.
    ///
    /// Non-finite values are returned as-is; range checks belong to the validator.
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get_any(&[key]).and_then(value_as_f64)
    }

    /// Integer value of the first present key among `keys`.
    #[must_use]
    pub fn integer(&self, keys: &[&str]) -> Option<i64> {
        let value = self.get_any(keys)?;
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Parsed timestamp of the record, if any.
    #[must_use]
    pub fn timestamp(&self) -> Option<OffsetDateTime> {
        self.get_any(TIMESTAMP_KEYS).and_then(parse_timestamp)
    }

    /// Device id written inside the record itself, if any.
    #[must_use]
    pub fn embedded_device(&self) -> Option<&str> {
        self.get_any(DEVICE_KEYS).and_then(Value::as_str)
    }

    /// Sort key in Unix milliseconds; a missing timestamp counts as the epoch.
    #[must_use]
    pub fn sort_key(&self) -> i128 {
        self.timestamp()
            .map(|ts| ts.unix_timestamp_nanos() / 1_000_000)
            .unwrap_or(0)
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn record(value: Value) -> RawRecord {
        RawRecord::from_value("tank-1", value).unwrap()
    }

    #[test]
    fn test_metric_order_matches_index() {
        for (i, metric) in Metric::ALL.iter().enumerate() {
            assert_eq!(metric.index(), i);
        }
    }

    #[test]
    fn test_metric_ranges() {
        assert_eq!(Metric::Orp.range(), MetricRange::new(-2000.0, 2000.0));
        assert_eq!(Metric::Temperature.range(), MetricRange::new(-50.0, 150.0));
        assert!(Metric::Tds.range().contains(50_000.0));
        assert!(!Metric::Ph.range().contains(14.01));
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("pH".parse::<Metric>(), Ok(Metric::Ph));
        assert_eq!("Temperature".parse::<Metric>(), Ok(Metric::Temperature));
        assert_eq!(
            "salinity".parse::<Metric>(),
            Err(ParseError::UnknownMetric("salinity".to_string()))
        );
    }

    #[test]
    fn test_reading_with_value_and_value() {
        let reading = Reading::new("A")
            .with_value(Metric::Ec, Some(450.0))
            .with_value(Metric::Tds, Some(200.0));
        assert_eq!(reading.value(Metric::Ec), Some(450.0));
        assert_eq!(reading.value(Metric::Tds), Some(200.0));
        assert_eq!(reading.value(Metric::Ph), None);
        assert_eq!(reading.device, "A");
    }

    #[test]
    fn test_reading_day_uses_offset() {
        let reading =
            Reading::new("A").with_timestamp(Some(datetime!(2024-01-01 23:30:00 UTC)));
        let plus_one = UtcOffset::from_hms(1, 0, 0).unwrap();
        assert_eq!(
            reading.day(UtcOffset::UTC).unwrap().to_string(),
            "2024-01-01"
        );
        assert_eq!(reading.day(plus_one).unwrap().to_string(), "2024-01-02");
    }

    #[test]
    fn test_raw_record_from_non_object() {
        assert!(RawRecord::from_value("A", json!(42)).is_none());
        assert!(RawRecord::from_value("A", json!([1, 2])).is_none());
    }

    #[test]
    fn test_raw_record_number_accepts_strings() {
        let raw = record(json!({"ec_uS_cm": "450.5", "ph": 7, "tds_ppm": "", "orp_mV": "abc"}));
        assert_eq!(raw.number("ec_uS_cm"), Some(450.5));
        assert_eq!(raw.number("ph"), Some(7.0));
        assert_eq!(raw.number("tds_ppm"), None);
        assert_eq!(raw.number("orp_mV"), None);
        assert_eq!(raw.number("missing"), None);
    }

    #[test]
    fn test_raw_record_integer_aliases() {
        let raw = record(json!({"rssi": -71, "snr": "9"}));
        assert_eq!(raw.integer(SIGNAL_STRENGTH_KEYS), Some(-71));
        assert_eq!(raw.integer(SIGNAL_NOISE_KEYS), Some(9));
    }

    #[test]
    fn test_raw_record_null_is_absent() {
        let raw = record(json!({"timestamp": null, "ts": "2024-01-01T00:00:00Z"}));
        assert_eq!(raw.timestamp(), Some(datetime!(2024-01-01 0:00 UTC)));
    }

    #[test]
    fn test_raw_record_sort_key_missing_is_epoch() {
        let raw = record(json!({"ph": 7}));
        assert_eq!(raw.sort_key(), 0);
        let raw = record(json!({"timestamp": "1970-01-01T00:00:01Z"}));
        assert_eq!(raw.sort_key(), 1000);
    }

    #[test]
    fn test_reading_serialization() {
        let reading = Reading::new("tank-2")
            .with_timestamp(Some(datetime!(2024-01-01 0:00 UTC)))
            .with_value(Metric::Ec, Some(500.0))
            .with_signal(Some(-60), None);
        let json = serde_json::to_string(&reading).unwrap();
        assert!(json.contains("\"device\":\"tank-2\""));
        assert!(json.contains("\"ec\":500.0"));
        assert!(json.contains("\"signalStrength\":-60"));
        assert!(json.contains("\"timestamp\":\"2024-01-01T00:00:00Z\""));

        let parsed: Reading = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, reading);
    }
}
