use std::collections::HashMap;
use std::sync::Arc;

use super::{CombiningAlgorithm, FirstApplicable, OnlyOneApplicable, OrderedAlgorithm};
use crate::{Error, Result};

const XACML_RULE_ALG: &str = "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:";
const XACML_POLICY_ALG: &str = "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:";

/// Combining algorithms of one dialect, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct AlgFactory {
    algorithms: HashMap<String, Arc<dyn CombiningAlgorithm>>,
}

impl AlgFactory {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Deny-Overrides, Permit-Overrides, First-Applicable,
    /// Only-One-Applicable and the 24 ordered algorithms.
    pub fn compact() -> Self {
        let mut factory = Self::empty();
        factory.register(Arc::new(OrderedAlgorithm::deny_overrides()));
        factory.register(Arc::new(OrderedAlgorithm::permit_overrides()));
        factory.register(Arc::new(FirstApplicable::new("First-Applicable")));
        factory.register(Arc::new(OnlyOneApplicable::new("Only-One-Applicable")));
        for algorithm in OrderedAlgorithm::permutations() {
            factory.register(Arc::new(algorithm));
        }
        factory
    }

    /// Compact names plus the XACML rule and policy combining identifiers.
    pub fn xacml() -> Self {
        let mut factory = Self::compact();
        for prefix in &[XACML_RULE_ALG, XACML_POLICY_ALG] {
            let deny = OrderedAlgorithm::deny_overrides();
            let permit = OrderedAlgorithm::permit_overrides();
            factory.register(Arc::new(OrderedAlgorithm::new(
                format!("{}deny-overrides", prefix),
                *deny.order(),
            )));
            factory.register(Arc::new(OrderedAlgorithm::new(
                format!("{}permit-overrides", prefix),
                *permit.order(),
            )));
            factory.register(Arc::new(FirstApplicable::new(format!("{}first-applicable", prefix))));
        }
        factory.register(Arc::new(OnlyOneApplicable::new(format!(
            "{}only-one-applicable",
            XACML_POLICY_ALG
        ))));
        factory
    }

    pub fn register(&mut self, algorithm: Arc<dyn CombiningAlgorithm>) {
        self.algorithms.insert(algorithm.name().to_string(), algorithm);
    }

    pub fn create(&self, name: &str) -> Result<Arc<dyn CombiningAlgorithm>> {
        self.algorithms
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownAlgorithm(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.algorithms.contains_key(name)
    }
}
