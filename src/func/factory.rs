use std::collections::HashMap;
use std::sync::Arc;

use super::{
    AtLeastOneMemberOfFunction, EqualFunction, Function, InRangeFunction, IsInFunction,
    LogicalFunction, MatchFunction, OneAndOnlyFunction, Operator,
};
use crate::attr::DataType;
use crate::{Error, Result};

pub const XACML_FUNCTION: &str = "urn:oasis:names:tc:xacml:1.0:function:";
pub const XACML2_FUNCTION: &str = "urn:oasis:names:tc:xacml:2.0:function:";

const TYPED: [DataType; 10] = [
    DataType::String,
    DataType::X500Name,
    DataType::AnyUri,
    DataType::DateTime,
    DataType::Date,
    DataType::Time,
    DataType::Duration,
    DataType::Period,
    DataType::Boolean,
    DataType::Generic,
];

/// Function registry of one dialect, keyed by name and by
/// `(operator, type)`.
#[derive(Debug, Clone, Default)]
pub struct FnFactory {
    functions: HashMap<String, Arc<dyn Function>>,
    operators: HashMap<(Operator, DataType), Arc<dyn Function>>,
}

impl FnFactory {
    pub fn empty() -> Self {
        Self::default()
    }

    /// `<type>-equal`, `<type>-match`, `period-in-range`, bag functions
    /// and the logical connectives under their short names.
    pub fn compact() -> Self {
        let mut factory = Self::empty();
        for data_type in TYPED.iter().copied() {
            let short = data_type.short_name();
            factory.register_operator(
                Operator::Equal,
                data_type,
                Arc::new(EqualFunction::new(format!("{}-equal", short), data_type)),
            );
            factory.register(Arc::new(OneAndOnlyFunction::new(
                format!("{}-one-and-only", short),
                data_type,
            )));
            factory.register(Arc::new(IsInFunction::new(format!("{}-is-in", short))));
            factory.register(Arc::new(AtLeastOneMemberOfFunction::new(format!(
                "{}-at-least-one-member-of",
                short
            ))));
        }
        let matchable = [DataType::String, DataType::X500Name, DataType::AnyUri, DataType::Generic];
        for data_type in matchable {
            factory.register_operator(
                Operator::Match,
                data_type,
                Arc::new(MatchFunction::new(
                    format!("{}-match", data_type.short_name()),
                    data_type,
                )),
            );
        }
        factory.register_operator(
            Operator::InRange,
            DataType::Period,
            Arc::new(InRangeFunction::new("period-in-range")),
        );
        factory.register(Arc::new(LogicalFunction::and("and")));
        factory.register(Arc::new(LogicalFunction::or("or")));
        factory.register(Arc::new(LogicalFunction::not("not")));
        factory
    }

    /// XACML function identifiers on top of the compact names. X.500 names
    /// compare without regard to component order in this dialect.
    pub fn xacml() -> Self {
        let mut factory = Self::compact();
        let xacml_types = [
            (DataType::String, "string"),
            (DataType::X500Name, "x500Name"),
            (DataType::AnyUri, "anyURI"),
            (DataType::DateTime, "dateTime"),
            (DataType::Date, "date"),
            (DataType::Time, "time"),
            (DataType::Duration, "dayTimeDuration"),
            (DataType::Boolean, "boolean"),
        ];
        for (data_type, short) in xacml_types.iter().copied() {
            let mut equal =
                EqualFunction::new(format!("{}{}-equal", XACML_FUNCTION, short), data_type);
            if data_type == DataType::X500Name {
                equal = equal.unordered_names();
            }
            factory.register_operator(Operator::Equal, data_type, Arc::new(equal));
            factory.register(Arc::new(OneAndOnlyFunction::new(
                format!("{}{}-one-and-only", XACML_FUNCTION, short),
                data_type,
            )));
            factory.register(Arc::new(IsInFunction::new(format!(
                "{}{}-is-in",
                XACML_FUNCTION, short
            ))));
            factory.register(Arc::new(AtLeastOneMemberOfFunction::new(format!(
                "{}{}-at-least-one-member-of",
                XACML_FUNCTION, short
            ))));
        }
        // the short name follows the dialect's semantics as well.
        factory.register(Arc::new(
            EqualFunction::new("x500Name-equal", DataType::X500Name).unordered_names(),
        ));

        factory.register_operator(
            Operator::Match,
            DataType::String,
            Arc::new(MatchFunction::new(
                format!("{}string-regexp-match", XACML_FUNCTION),
                DataType::String,
            )),
        );
        factory.register_operator(
            Operator::Match,
            DataType::X500Name,
            Arc::new(MatchFunction::new(
                format!("{}x500Name-match", XACML_FUNCTION),
                DataType::X500Name,
            )),
        );
        factory.register_operator(
            Operator::Match,
            DataType::AnyUri,
            Arc::new(MatchFunction::new(
                format!("{}anyURI-regexp-match", XACML2_FUNCTION),
                DataType::AnyUri,
            )),
        );
        factory.register(Arc::new(MatchFunction::new(
            format!("{}x500Name-regexp-match", XACML2_FUNCTION),
            DataType::X500Name,
        )));
        factory.register(Arc::new(LogicalFunction::and(format!("{}and", XACML_FUNCTION))));
        factory.register(Arc::new(LogicalFunction::or(format!("{}or", XACML_FUNCTION))));
        factory.register(Arc::new(LogicalFunction::not(format!("{}not", XACML_FUNCTION))));
        factory
    }

    /// Registers `function` under its own name.
    pub fn register(&mut self, function: Arc<dyn Function>) {
        self.functions.insert(function.name().to_string(), function);
    }

    /// Registers `function` under its name and as the dialect's
    /// implementation of `operator` for `data_type`.
    pub fn register_operator(
        &mut self,
        operator: Operator,
        data_type: DataType,
        function: Arc<dyn Function>,
    ) {
        self.operators.insert((operator, data_type), Arc::clone(&function));
        self.register(function);
    }

    pub fn create(&self, name: &str) -> Result<Arc<dyn Function>> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))
    }

    pub fn create_for(&self, operator: Operator, data_type: DataType) -> Result<Arc<dyn Function>> {
        self.operators
            .get(&(operator, data_type))
            .cloned()
            .ok_or_else(|| {
                Error::UnknownFunction(format!("{}-{}", data_type.short_name(), operator.suffix()))
            })
    }
}
