use std::sync::Arc;

use tracing::debug;

use crate::alg::{CombiningAlgorithm, Evaluable};
use crate::gacl::GaclPolicy;
use crate::matcher::MatchResult;
use crate::policy::{Evaluation, Policy};
use crate::request::EvaluationContext;
use crate::Decision;

/// A loaded policy of any dialect.
#[derive(Debug, Clone)]
pub enum PolicyDocument {
    /// Rule tree of the compact or XACML dialect.
    Rules(Policy),
    /// Flat access control list.
    Acl(GaclPolicy),
}

impl PolicyDocument {
    pub fn id(&self) -> &str {
        match self {
            PolicyDocument::Rules(policy) => policy.id(),
            PolicyDocument::Acl(acl) => acl.id(),
        }
    }

    pub fn matches(&self, ctx: &EvaluationContext<'_>) -> MatchResult {
        match self {
            PolicyDocument::Rules(policy) => policy.matches(ctx),
            PolicyDocument::Acl(acl) => acl.matches(ctx),
        }
    }

    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Evaluation {
        match self {
            PolicyDocument::Rules(policy) => policy.evaluate(ctx),
            PolicyDocument::Acl(acl) => Evaluation {
                decision: acl.eval(ctx),
                obligations: Vec::new(),
            },
        }
    }
}

impl Evaluable for PolicyDocument {
    fn decide(&self, ctx: &EvaluationContext<'_>) -> Decision {
        self.evaluate(ctx).decision
    }
}

impl From<Policy> for PolicyDocument {
    fn from(policy: Policy) -> Self {
        PolicyDocument::Rules(policy)
    }
}

impl From<GaclPolicy> for PolicyDocument {
    fn from(acl: GaclPolicy) -> Self {
        PolicyDocument::Acl(acl)
    }
}

/// A policy together with where it was loaded from.
#[derive(Debug, Clone)]
pub struct PolicyElement {
    policy: Arc<PolicyDocument>,
    source: Option<String>,
}

impl PolicyElement {
    pub fn policy(&self) -> &PolicyDocument {
        &self.policy
    }

    /// Shared handle, kept by response items that name the policy.
    pub fn policy_ref(&self) -> Arc<PolicyDocument> {
        Arc::clone(&self.policy)
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

/// Ordered set of policies and the algorithm combining their decisions
/// for one tuple.
///
/// The store is only read while requests are evaluated. Adding or
/// removing policies needs `&mut self` and therefore exclusive access.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    policies: Vec<PolicyElement>,
    combining_alg: Arc<dyn CombiningAlgorithm>,
}

impl PolicyStore {
    pub fn new(combining_alg: Arc<dyn CombiningAlgorithm>) -> Self {
        Self {
            policies: Vec::new(),
            combining_alg,
        }
    }

    pub fn add_policy(&mut self, policy: impl Into<PolicyDocument>, source: Option<String>) {
        let policy = policy.into();
        debug!(
            policy = policy.id(),
            source = source.as_deref().unwrap_or("inline"),
            "policy added"
        );
        self.policies.push(PolicyElement {
            policy: Arc::new(policy),
            source,
        });
    }

    pub fn remove_policies(&mut self) {
        debug!(count = self.policies.len(), "policies removed");
        self.policies.clear();
    }

    pub fn policies(&self) -> &[PolicyElement] {
        &self.policies
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn combining_alg(&self) -> &dyn CombiningAlgorithm {
        self.combining_alg.as_ref()
    }

    pub fn set_combining_alg(&mut self, combining_alg: Arc<dyn CombiningAlgorithm>) {
        self.combining_alg = combining_alg;
    }

    /// Policies whose target does not rule the tuple out. Undecided
    /// targets are kept and left to the combining algorithm.
    pub fn find_applicable<'a>(&'a self, ctx: &EvaluationContext<'_>) -> Vec<&'a PolicyElement> {
        self.policies
            .iter()
            .filter(|element| element.policy.matches(ctx) != MatchResult::NoMatch)
            .collect()
    }

    /// Combined decision of the applicable policies.
    pub fn decide(&self, ctx: &EvaluationContext<'_>) -> Decision {
        let applicable = self.find_applicable(ctx);
        let children: Vec<&dyn Evaluable> = applicable
            .iter()
            .map(|element| element.policy() as &dyn Evaluable)
            .collect();
        self.combining_alg.combine(ctx, &children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alg::OrderedAlgorithm;
    use crate::policy::tests::{build_policy, single};
    use crate::request::RequestTuple;

    fn policy(id: &str, subject: &str, effect: &str) -> Policy {
        build_policy(&format!(
            r#"{{
                "policyId": "{}",
                "target": {{ "subjects": [[{{ "attributeId": "subject-id", "value": "{}" }}]] }},
                "rules": [{{ "ruleId": "r", "effect": "{}" }}]
            }}"#,
            id, subject, effect
        ))
    }

    fn store() -> PolicyStore {
        let mut store = PolicyStore::new(Arc::new(OrderedAlgorithm::deny_overrides()));
        store.add_policy(
            policy("alice-permit", "alice", "Permit"),
            Some("file:///etc/pdp/a.json".into()),
        );
        store.add_policy(policy("alice-deny", "alice", "Deny"), None);
        store.add_policy(policy("bob-permit", "bob", "Permit"), None);
        store
    }

    #[test]
    fn find_applicable_keeps_matching_and_undecided() {
        let store = store();
        let alice = single("subjects", "subject-id", "alice");
        let carol = single("subjects", "subject-id", "carol");
        let nobody = single("subjects", "vo", "atlas");

        let ids = |tuple: &RequestTuple| {
            store
                .find_applicable(&EvaluationContext::new(tuple))
                .iter()
                .map(|element| element.policy().id().to_string())
                .collect::<Vec<_>>()
        };

        // every target asks about subject-id, so a presented but different
        // value leaves the target undecided rather than unmatched.
        assert_eq!(vec!["alice-permit", "alice-deny", "bob-permit"], ids(&alice));
        assert_eq!(3, ids(&carol).len());
        assert!(ids(&nobody).is_empty());
    }

    #[test]
    fn deny_overrides_across_policies() {
        let store = store();
        let alice = single("subjects", "subject-id", "alice");

        assert_eq!(Decision::Deny, store.decide(&EvaluationContext::new(&alice)));
    }

    #[test]
    fn remove_policies_empties_the_store() {
        let mut store = store();
        assert_eq!(Some("file:///etc/pdp/a.json"), store.policies()[0].source());

        store.remove_policies();

        assert!(store.is_empty());
        let empty = RequestTuple::default();
        assert_eq!(Decision::NotApplicable, store.decide(&EvaluationContext::new(&empty)));
    }
}
