mod builder;
pub use builder::{to_json, PolicyBuilder};
pub(crate) use builder::SCHEMA_VERSION;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::alg::{CombiningAlgorithm, Evaluable};
use crate::condition::Condition;
use crate::matcher::{MatchResult, Target};
use crate::request::EvaluationContext;
use crate::{AttributeValue, Decision, Error, Result};

/// Fixed outcome of a rule whose target and condition hold.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Permit,
    Deny,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Permit => "Permit",
            Effect::Deny => "Deny",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effect {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "Permit" | "permit" => Ok(Effect::Permit),
            "Deny" | "deny" => Ok(Effect::Deny),
            _ => Err(Error::InvalidDocument(format!("'{}' is not a rule effect", value))),
        }
    }
}

impl From<Effect> for Decision {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Permit => Decision::Permit,
            Effect::Deny => Decision::Deny,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeAssignment {
    pub attribute_id: String,
    pub value: AttributeValue,
}

impl AttributeAssignment {
    pub fn new(attribute_id: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            attribute_id: attribute_id.into(),
            value,
        }
    }
}

/// Attribute assignments handed to the caller together with a decision
/// equal to `fulfill_on`.
#[derive(Debug, Clone, PartialEq)]
pub struct Obligation {
    pub id: String,
    pub fulfill_on: Effect,
    pub assignments: Vec<AttributeAssignment>,
}

impl Obligation {
    pub fn new(id: impl Into<String>, fulfill_on: Effect) -> Self {
        Self {
            id: id.into(),
            fulfill_on,
            assignments: Vec::new(),
        }
    }

    pub fn with_assignment(mut self, assignment: AttributeAssignment) -> Self {
        self.assignments.push(assignment);
        self
    }

    fn applies_to(&self, decision: Decision) -> bool {
        Decision::from(self.fulfill_on) == decision
    }

    /// First assignment of `attribute_id`.
    pub fn assignment(&self, attribute_id: &str) -> Option<&AttributeValue> {
        self.assignments
            .iter()
            .find(|assignment| assignment.attribute_id == attribute_id)
            .map(|assignment| &assignment.value)
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    id: String,
    description: Option<String>,
    effect: Effect,
    target: Target,
    condition: Option<Condition>,
    obligations: Vec<Obligation>,
}

impl Rule {
    pub fn new(id: impl Into<String>, effect: Effect) -> Self {
        Self {
            id: id.into(),
            description: None,
            effect,
            target: Target::empty(),
            condition: None,
            obligations: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn with_condition(mut self, condition: Option<Condition>) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_obligation(mut self, obligation: Obligation) -> Self {
        self.obligations.push(obligation);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn obligations(&self) -> &[Obligation] {
        &self.obligations
    }

    pub fn matches(&self, ctx: &EvaluationContext<'_>) -> MatchResult {
        self.target.matches(ctx)
    }

    /// NotApplicable when the target does not match, Indeterminate when it
    /// is undecided or the condition does not hold, the effect otherwise.
    pub fn eval(&self, ctx: &EvaluationContext<'_>) -> Decision {
        match self.matches(ctx) {
            MatchResult::NoMatch => return Decision::NotApplicable,
            MatchResult::Indeterminate => return Decision::Indeterminate,
            MatchResult::Match => {}
        }
        if let Some(condition) = &self.condition {
            if !condition.is_satisfied(ctx) {
                trace!(rule = %self.id, "condition not satisfied");
                return Decision::Indeterminate;
            }
        }
        self.effect.into()
    }
}

impl Evaluable for Rule {
    fn decide(&self, ctx: &EvaluationContext<'_>) -> Decision {
        self.eval(ctx)
    }
}

/// Decision of a policy together with the obligations that go with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub decision: Decision,
    pub obligations: Vec<Obligation>,
}

impl Evaluation {
    pub fn not_applicable() -> Self {
        Self {
            decision: Decision::NotApplicable,
            obligations: Vec::new(),
        }
    }
}

/// Target, ordered rules and the algorithm combining their decisions.
#[derive(Debug, Clone)]
pub struct Policy {
    id: String,
    description: Option<String>,
    target: Target,
    rules: Vec<Rule>,
    combining_alg: Arc<dyn CombiningAlgorithm>,
    obligations: Vec<Obligation>,
}

impl Policy {
    pub fn new(id: impl Into<String>, combining_alg: Arc<dyn CombiningAlgorithm>) -> Self {
        Self {
            id: id.into(),
            description: None,
            target: Target::empty(),
            rules: Vec::new(),
            combining_alg,
            obligations: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_obligation(mut self, obligation: Obligation) -> Self {
        self.obligations.push(obligation);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn combining_alg(&self) -> &dyn CombiningAlgorithm {
        self.combining_alg.as_ref()
    }

    pub fn obligations(&self) -> &[Obligation] {
        &self.obligations
    }

    pub fn matches(&self, ctx: &EvaluationContext<'_>) -> MatchResult {
        self.target.matches(ctx)
    }

    /// NotApplicable when the target does not match. A matching or
    /// undecided target defers to the rules, which are evaluated lazily,
    /// in order, until the algorithm has settled.
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Evaluation {
        if self.matches(ctx) == MatchResult::NoMatch {
            return Evaluation::not_applicable();
        }

        let mut decided = Vec::with_capacity(self.rules.len());
        let decision = {
            let mut decisions = self.rules.iter().map(|rule| {
                let decision = rule.eval(ctx);
                decided.push((rule, decision));
                decision
            });
            self.combining_alg.combine_decisions(&mut decisions)
        };
        trace!(policy = %self.id, %decision, rules = decided.len(), "policy evaluated");

        let obligations = self
            .obligations
            .iter()
            .filter(|obligation| obligation.applies_to(decision))
            .chain(
                decided
                    .iter()
                    .filter(|(_, rule_decision)| *rule_decision == decision)
                    .flat_map(|(rule, _)| rule.obligations.iter())
                    .filter(|obligation| obligation.applies_to(decision)),
            )
            .cloned()
            .collect();

        Evaluation { decision, obligations }
    }
}

impl Evaluable for Policy {
    fn decide(&self, ctx: &EvaluationContext<'_>) -> Decision {
        self.evaluate(ctx).decision
    }
}
