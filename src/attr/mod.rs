//! Typed attribute values.
//!
//! Every value is immutable once constructed. Equality and ordering are
//! type specific; values of different types never compare equal.

mod factory;
mod time;
mod x500;

pub use factory::AttributeFactory;
pub use time::{format_duration, parse_date, parse_datetime, parse_duration, parse_time, Period};
pub use x500::X500Name;

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime};

use crate::{xml::Node, Error, Result};

/// Closed set of attribute types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    String,
    X500Name,
    AnyUri,
    DateTime,
    Date,
    Time,
    Duration,
    Period,
    Boolean,
    Element,
    Generic,
}

impl DataType {
    pub const ALL: [DataType; 11] = [
        DataType::String,
        DataType::X500Name,
        DataType::AnyUri,
        DataType::DateTime,
        DataType::Date,
        DataType::Time,
        DataType::Duration,
        DataType::Period,
        DataType::Boolean,
        DataType::Element,
        DataType::Generic,
    ];

    /// Short name, also used as function name prefix (`string-equal`).
    pub fn short_name(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::X500Name => "x500Name",
            DataType::AnyUri => "anyURI",
            DataType::DateTime => "datetime",
            DataType::Date => "date",
            DataType::Time => "time",
            DataType::Duration => "duration",
            DataType::Period => "period",
            DataType::Boolean => "boolean",
            DataType::Element => "element",
            DataType::Generic => "generic",
        }
    }

    /// Parses a raw string into a typed value.
    ///
    /// `Element` and `Generic` values are not parsed from strings here;
    /// the factory builds those directly.
    pub fn parse(self, raw: &str) -> Result<Value> {
        let value = match self {
            DataType::String => Value::String(raw.to_string()),
            DataType::X500Name => Value::X500Name(X500Name::parse(raw)?),
            DataType::AnyUri => {
                let raw = raw.trim();
                if raw.is_empty() || raw.contains(char::is_whitespace) {
                    return Err(Error::invalid_value(self.short_name(), raw));
                }
                Value::AnyUri(raw.to_string())
            }
            DataType::DateTime => Value::DateTime(parse_datetime(raw)?),
            DataType::Date => Value::Date(parse_date(raw)?),
            DataType::Time => Value::Time(parse_time(raw)?),
            DataType::Duration => Value::Duration(parse_duration(raw)?),
            DataType::Period => Value::Period(Period::parse(raw)?),
            DataType::Boolean => match raw.trim() {
                "true" | "1" => Value::Boolean(true),
                "false" | "0" => Value::Boolean(false),
                _ => return Err(Error::invalid_value(self.short_name(), raw)),
            },
            DataType::Element => Value::Element(Node::parse(raw)?),
            DataType::Generic => Value::Generic {
                type_name: DataType::Generic.short_name().to_string(),
                raw: raw.to_string(),
            },
        };
        Ok(value)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Typed payload of an attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    X500Name(X500Name),
    AnyUri(String),
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
    Duration(Duration),
    Period(Period),
    Boolean(bool),
    /// Nested identity structure (GACL).
    Element(Node),
    /// Well-formed value of a type the factory does not know. Kept as the
    /// raw string tagged with its declared type.
    Generic { type_name: String, raw: String },
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::String(_) => DataType::String,
            Value::X500Name(_) => DataType::X500Name,
            Value::AnyUri(_) => DataType::AnyUri,
            Value::DateTime(_) => DataType::DateTime,
            Value::Date(_) => DataType::Date,
            Value::Time(_) => DataType::Time,
            Value::Duration(_) => DataType::Duration,
            Value::Period(_) => DataType::Period,
            Value::Boolean(_) => DataType::Boolean,
            Value::Element(_) => DataType::Element,
            Value::Generic { .. } => DataType::Generic,
        }
    }
}

/// An attribute value together with the identity it was asserted under.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeValue {
    value: Value,
    id: Option<String>,
    issuer: Option<String>,
    category: Option<String>,
}

impl AttributeValue {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            id: None,
            issuer: None,
            category: None,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(Value::String(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(Value::Boolean(value))
    }

    /// Parses `raw` as `data_type`.
    pub fn parse(data_type: DataType, raw: &str) -> Result<Self> {
        data_type.parse(raw).map(Self::new)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_issuer(mut self, issuer: Option<String>) -> Self {
        self.issuer = issuer;
        self
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn data_type(&self) -> DataType {
        self.value.data_type()
    }

    /// Declared type name: the short name for known types, the original
    /// name for generic values.
    pub fn type_name(&self) -> &str {
        match &self.value {
            Value::Generic { type_name, .. } => type_name,
            value => value.data_type().short_name(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            Value::Boolean(value) => Some(value),
            _ => None,
        }
    }

    /// Raw string form, parseable again with the same type.
    pub fn encode(&self) -> String {
        match &self.value {
            Value::String(value) | Value::AnyUri(value) => value.clone(),
            Value::X500Name(name) => name.to_string(),
            Value::DateTime(value) => value.to_rfc3339(),
            Value::Date(value) => value.format("%Y-%m-%d").to_string(),
            Value::Time(value) => value.format("%H:%M:%S%.f").to_string(),
            Value::Duration(value) => format_duration(value),
            Value::Period(period) => {
                format!("{}/{}", period.start.to_rfc3339(), period.end.to_rfc3339())
            }
            Value::Boolean(value) => value.to_string(),
            Value::Element(node) => node.to_xml(),
            Value::Generic { raw, .. } => raw.clone(),
        }
    }

    /// Type specific equality of the payloads; ids are not compared.
    pub fn equals(&self, other: &AttributeValue) -> bool {
        match (&self.value, &other.value) {
            (Value::DateTime(left), Value::DateTime(right)) => left == right,
            (
                Value::Generic {
                    type_name: left_type,
                    raw: left,
                },
                Value::Generic {
                    type_name: right_type,
                    raw: right,
                },
            ) => left_type == right_type && left.trim() == right.trim(),
            (left, right) => left == right,
        }
    }

    /// Ordering for the types that have one.
    pub fn compare(&self, other: &AttributeValue) -> Option<Ordering> {
        match (&self.value, &other.value) {
            (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
            (Value::DateTime(left), Value::DateTime(right)) => Some(left.cmp(right)),
            (Value::Date(left), Value::Date(right)) => Some(left.cmp(right)),
            (Value::Time(left), Value::Time(right)) => Some(left.cmp(right)),
            (Value::Duration(left), Value::Duration(right)) => Some(left.cmp(right)),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}={}({})", id, self.type_name(), self.encode()),
            None => write!(f, "{}({})", self.type_name(), self.encode()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(DataType::String, "alice" ; "string")]
    #[test_case(DataType::X500Name, "/O=Grid/CN=Alice" ; "x500")]
    #[test_case(DataType::AnyUri, "https://example.org/jobs" ; "uri")]
    #[test_case(DataType::DateTime, "2007-09-10T20:30:20+02:00" ; "datetime")]
    #[test_case(DataType::Date, "2007-09-10" ; "date")]
    #[test_case(DataType::Time, "20:30:20" ; "time")]
    #[test_case(DataType::Duration, "P1DT2H" ; "duration")]
    #[test_case(DataType::Period, "2007-09-10T00:00:00Z/P1D" ; "period")]
    #[test_case(DataType::Boolean, "true" ; "boolean")]
    fn encode_parses_back_to_an_equal_value(data_type: DataType, raw: &str) {
        let value = AttributeValue::parse(data_type, raw).unwrap();
        let again = AttributeValue::parse(data_type, &value.encode()).unwrap();

        assert_eq!(data_type, value.data_type());
        assert!(value.equals(&again));
    }

    #[test]
    fn values_of_different_types_are_never_equal() {
        let string = AttributeValue::string("/O=Grid/CN=Alice");
        let name = AttributeValue::parse(DataType::X500Name, "/O=Grid/CN=Alice").unwrap();

        assert!(!string.equals(&name));
        assert!(!name.equals(&string));
    }

    #[test]
    fn datetimes_compare_by_instant() {
        let utc = AttributeValue::parse(DataType::DateTime, "2007-09-10T18:30:20Z").unwrap();
        let local = AttributeValue::parse(DataType::DateTime, "2007-09-10T20:30:20+02:00").unwrap();

        assert!(utc.equals(&local));
        assert_eq!(Some(Ordering::Equal), utc.compare(&local));
    }

    #[test]
    fn ids_do_not_take_part_in_equality() {
        let left = AttributeValue::string("v").with_id("a");
        let right = AttributeValue::string("v").with_id("b");

        assert!(left.equals(&right));
        assert_eq!(Some("a"), left.id());
    }

    #[test]
    fn invalid_raw_values_are_rejected() {
        assert!(AttributeValue::parse(DataType::Boolean, "yes").is_err());
        assert!(AttributeValue::parse(DataType::AnyUri, "two words").is_err());
        assert!(AttributeValue::parse(DataType::Date, "10/09/2007").is_err());
    }
}
