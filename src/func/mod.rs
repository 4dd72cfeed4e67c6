//! Named typed operators over attribute values.

mod bag;
mod compare;
mod factory;
mod logical;

pub use bag::{AtLeastOneMemberOfFunction, IsInFunction, OneAndOnlyFunction};
pub use compare::{EqualFunction, InRangeFunction, MatchFunction};
pub use factory::FnFactory;
pub use logical::LogicalFunction;

use std::fmt;
use std::str::FromStr;

use crate::{AttributeValue, Error, Result};

/// Values produced by resolving one operand; scalars are bags of one.
pub type Bag = Vec<AttributeValue>;

pub trait Function: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Applies the function to already resolved arguments.
    ///
    /// With `check_id` set, comparisons also require the attribute ids to
    /// agree. A literal without id matches any id.
    fn evaluate(&self, args: &[Bag], check_id: bool) -> Result<Bag>;

    /// Pairwise form used by target matching: `policy` is the literal
    /// declared in the policy, `request` the value found in the request.
    fn matches(
        &self,
        policy: &AttributeValue,
        request: &AttributeValue,
        check_id: bool,
    ) -> Result<bool> {
        let result = self.evaluate(&[vec![policy.clone()], vec![request.clone()]], check_id)?;
        single(self.name(), &result)?
            .as_bool()
            .ok_or_else(|| Error::Evaluation(format!("{} did not return a boolean", self.name())))
    }
}

/// The three comparison operators every type may provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    Match,
    InRange,
}

impl Operator {
    pub fn suffix(self) -> &'static str {
        match self {
            Operator::Equal => "equal",
            Operator::Match => "match",
            Operator::InRange => "in-range",
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "" | "equal" => Ok(Operator::Equal),
            "match" => Ok(Operator::Match),
            "inrange" | "in-range" => Ok(Operator::InRange),
            _ => Err(Error::UnknownFunction(name.into())),
        }
    }
}

/// Ids agree unless both sides carry one and they differ.
pub(crate) fn ids_agree(policy: &AttributeValue, request: &AttributeValue) -> bool {
    match (policy.id(), request.id()) {
        (Some(left), Some(right)) => left == right,
        _ => true,
    }
}

pub(crate) fn single<'a>(function: &str, bag: &'a [AttributeValue]) -> Result<&'a AttributeValue> {
    match bag {
        [value] => Ok(value),
        _ => Err(Error::Evaluation(format!(
            "{} expects a single value, got {}",
            function,
            bag.len()
        ))),
    }
}

pub(crate) fn expect_args(function: &str, args: &[Bag], count: usize) -> Result<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(Error::Evaluation(format!(
            "{} expects {} arguments, got {}",
            function,
            count,
            args.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use test_case::test_case;

    #[test_case("Match", Operator::Match ; "capitalized")]
    #[test_case("MATCH", Operator::Match ; "upper")]
    #[test_case("InRange", Operator::InRange ; "in range")]
    #[test_case("inrange", Operator::InRange ; "lower in range")]
    #[test_case("", Operator::Equal ; "default")]
    fn operator_aliases(name: &str, expected: Operator) {
        assert_eq!(expected, name.parse().unwrap());
    }

    #[test]
    fn unknown_operator() {
        assert_matches!("bigger".parse::<Operator>(), Err(Error::UnknownFunction(_)));
    }
}
