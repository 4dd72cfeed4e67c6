//! Combining algorithms reducing ordered child decisions to one decision.
//!
//! The same family is used between the rules of a policy and between the
//! policies of a store.

mod factory;
mod ordered;

pub use factory::AlgFactory;
pub use ordered::{FirstApplicable, OnlyOneApplicable, OrderedAlgorithm};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::request::EvaluationContext;
use crate::{Error, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Permit,
    Deny,
    Indeterminate,
    NotApplicable,
}

impl Decision {
    pub const ALL: [Decision; 4] = [
        Decision::Permit,
        Decision::Deny,
        Decision::Indeterminate,
        Decision::NotApplicable,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Decision::Permit => 0,
            Decision::Deny => 1,
            Decision::Indeterminate => 2,
            Decision::NotApplicable => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Permit => "Permit",
            Decision::Deny => "Deny",
            Decision::Indeterminate => "Indeterminate",
            Decision::NotApplicable => "NotApplicable",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "Permit" => Ok(Decision::Permit),
            "Deny" => Ok(Decision::Deny),
            "Indeterminate" => Ok(Decision::Indeterminate),
            "NotApplicable" | "Not_Applicable" => Ok(Decision::NotApplicable),
            _ => Err(Error::InvalidDocument(format!("Unknown decision '{}'", value))),
        }
    }
}

/// Anything that produces a decision for the tuple in `ctx`: rules inside
/// a policy, policies inside a store.
pub trait Evaluable {
    fn decide(&self, ctx: &EvaluationContext<'_>) -> Decision;
}

pub trait CombiningAlgorithm: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Reduces child decisions, in order. Implementations stop pulling
    /// from `decisions` as soon as the result is settled.
    fn combine_decisions(&self, decisions: &mut dyn Iterator<Item = Decision>) -> Decision;

    /// Evaluates `children` lazily against `ctx` and combines them.
    fn combine(&self, ctx: &EvaluationContext<'_>, children: &[&dyn Evaluable]) -> Decision {
        self.combine_decisions(&mut children.iter().map(|child| child.decide(ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestTuple;
    use std::cell::Cell;

    struct Fixed<'a> {
        decision: Decision,
        calls: &'a Cell<usize>,
    }

    impl Evaluable for Fixed<'_> {
        fn decide(&self, _ctx: &EvaluationContext<'_>) -> Decision {
            self.calls.set(self.calls.get() + 1);
            self.decision
        }
    }

    #[test]
    fn combine_evaluates_children_lazily() {
        let calls = Cell::new(0);
        let children: Vec<Fixed<'_>> = [Decision::Permit, Decision::Deny, Decision::Permit]
            .iter()
            .map(|decision| Fixed {
                decision: *decision,
                calls: &calls,
            })
            .collect();
        let refs: Vec<&dyn Evaluable> =
            children.iter().map(|child| child as &dyn Evaluable).collect();

        let tuple = RequestTuple::default();
        let ctx = EvaluationContext::new(&tuple);

        let algorithm = AlgFactory::compact().create("Deny-Overrides").unwrap();
        assert_eq!(Decision::Deny, algorithm.combine(&ctx, &refs));
        assert_eq!(2, calls.get());
    }

    #[test]
    fn decision_names_round_trip() {
        for decision in Decision::ALL.iter() {
            assert_eq!(*decision, decision.to_string().parse().unwrap());
        }
    }
}
