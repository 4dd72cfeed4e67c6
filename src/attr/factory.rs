use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use super::{AttributeValue, DataType, Value};
use crate::{xml::Node, Result};

pub const XS: &str = "http://www.w3.org/2001/XMLSchema#";
pub const XACML_X500: &str = "urn:oasis:names:tc:xacml:1.0:data-type:x500Name";
pub const XQUERY_DAY_TIME_DURATION: &str =
    "http://www.w3.org/TR/2002/WD-xquery-operators-20020816#dayTimeDuration";

/// Maps the type names of one dialect onto `DataType`s.
///
/// Unknown type names never fail: the raw string is kept as a generic
/// value tagged with the declared name, so reference based matching
/// still works for it.
#[derive(Debug, Clone)]
pub struct AttributeFactory {
    by_name: BTreeMap<String, DataType>,
    names: HashMap<DataType, String>,
}

impl AttributeFactory {
    pub fn empty() -> Self {
        Self {
            by_name: BTreeMap::new(),
            names: HashMap::new(),
        }
    }

    /// Short type names of the compact json dialect (`string`, `x500Name`, ...).
    pub fn compact() -> Self {
        let mut factory = Self::empty();
        for data_type in DataType::ALL.iter().copied() {
            factory.register(data_type.short_name(), data_type);
        }
        // spellings accepted from hand written policies.
        factory.register("X500Name", DataType::X500Name);
        factory.register("x500name", DataType::X500Name);
        factory.register("anyUri", DataType::AnyUri);
        factory.register("dateTime", DataType::DateTime);
        factory
    }

    /// XML schema and XACML data type identifiers.
    pub fn xacml() -> Self {
        let mut factory = Self::empty();
        factory.register(&format!("{}string", XS), DataType::String);
        factory.register(&format!("{}anyURI", XS), DataType::AnyUri);
        factory.register(&format!("{}dateTime", XS), DataType::DateTime);
        factory.register(&format!("{}date", XS), DataType::Date);
        factory.register(&format!("{}time", XS), DataType::Time);
        factory.register(&format!("{}boolean", XS), DataType::Boolean);
        factory.register(XACML_X500, DataType::X500Name);
        factory.register(XQUERY_DAY_TIME_DURATION, DataType::Duration);
        factory.register(&format!("{}dayTimeDuration", XS), DataType::Duration);
        factory.register(&format!("{}duration", XS), DataType::Duration);
        factory
    }

    /// GACL documents carry no type names; identities are elements and
    /// permissions are plain strings.
    pub fn gacl() -> Self {
        let mut factory = Self::empty();
        factory.register("string", DataType::String);
        factory.register("element", DataType::Element);
        factory
    }

    /// Registers `name` for `data_type`. The first name registered for a
    /// type is the one used when serializing.
    pub fn register(&mut self, name: &str, data_type: DataType) {
        self.by_name.insert(name.to_string(), data_type);
        self.names.entry(data_type).or_insert_with(|| name.to_string());
    }

    pub fn data_type(&self, type_name: &str) -> Option<DataType> {
        self.by_name.get(type_name).copied()
    }

    /// Dialect name of `data_type`, if the dialect knows it.
    pub fn type_name(&self, data_type: DataType) -> Option<&str> {
        self.names.get(&data_type).map(String::as_str)
    }

    /// Name to write for `value`: the dialect's name for known types, the
    /// declared name for generic values.
    pub fn name_of(&self, value: &AttributeValue) -> String {
        match value.value() {
            Value::Generic { type_name, .. } => type_name.clone(),
            _ => self
                .type_name(value.data_type())
                .unwrap_or_else(|| value.data_type().short_name())
                .to_string(),
        }
    }

    /// Creates a value of the dialect type `type_name` from `raw`.
    ///
    /// Fails only when a known type cannot parse `raw`.
    pub fn create(&self, raw: &str, type_name: &str) -> Result<AttributeValue> {
        let generic = || {
            AttributeValue::new(Value::Generic {
                type_name: type_name.to_string(),
                raw: raw.trim().to_string(),
            })
        };
        match self.data_type(type_name) {
            Some(DataType::Generic) => Ok(generic()),
            Some(data_type) => AttributeValue::parse(data_type, raw),
            None => {
                warn!(type_name, "unknown attribute type, keeping raw value as generic");
                Ok(generic())
            }
        }
    }

    pub fn create_element(&self, node: &Node) -> AttributeValue {
        AttributeValue::new(Value::Element(node.clone()))
    }
}

impl Default for AttributeFactory {
    fn default() -> Self {
        Self::compact()
    }
}
