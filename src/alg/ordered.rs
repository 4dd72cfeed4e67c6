use super::{CombiningAlgorithm, Decision};

/// Returns the first decision, in priority order, found among the
/// children; the lowest priority decision when none is found.
///
/// Deny-Overrides is the order Deny, Indeterminate, Permit, NotApplicable;
/// Permit-Overrides swaps Deny and Permit.
#[derive(Debug, Clone)]
pub struct OrderedAlgorithm {
    name: String,
    order: [Decision; 4],
}

impl OrderedAlgorithm {
    pub fn new(name: impl Into<String>, order: [Decision; 4]) -> Self {
        Self {
            name: name.into(),
            order,
        }
    }

    pub fn deny_overrides() -> Self {
        Self::new(
            "Deny-Overrides",
            [
                Decision::Deny,
                Decision::Indeterminate,
                Decision::Permit,
                Decision::NotApplicable,
            ],
        )
    }

    pub fn permit_overrides() -> Self {
        Self::new(
            "Permit-Overrides",
            [
                Decision::Permit,
                Decision::Indeterminate,
                Decision::Deny,
                Decision::NotApplicable,
            ],
        )
    }

    /// All 24 total orders, named after their priority sequence, e.g.
    /// `Permit-Deny-Indeterminate-NotApplicable`.
    pub fn permutations() -> Vec<Self> {
        let mut out = Vec::with_capacity(24);
        permute(&mut Decision::ALL.to_vec(), 0, &mut out);
        out
    }

    pub fn order(&self) -> &[Decision; 4] {
        &self.order
    }
}

fn permute(items: &mut Vec<Decision>, k: usize, out: &mut Vec<OrderedAlgorithm>) {
    if k == items.len() {
        let order = [items[0], items[1], items[2], items[3]];
        let name = order.iter().map(|decision| decision.as_str()).collect::<Vec<_>>().join("-");
        out.push(OrderedAlgorithm::new(name, order));
        return;
    }
    for i in k..items.len() {
        items.swap(k, i);
        permute(items, k + 1, out);
        items.swap(k, i);
    }
}

impl CombiningAlgorithm for OrderedAlgorithm {
    fn name(&self) -> &str {
        &self.name
    }

    fn combine_decisions(&self, decisions: &mut dyn Iterator<Item = Decision>) -> Decision {
        let mut seen = [false; 4];
        for decision in decisions {
            // nothing can outrank the top priority.
            if decision == self.order[0] {
                return decision;
            }
            seen[decision.index()] = true;
        }
        self.order
            .iter()
            .copied()
            .find(|decision| seen[decision.index()])
            .unwrap_or(self.order[3])
    }
}

/// First child that is not NotApplicable decides.
#[derive(Debug, Clone)]
pub struct FirstApplicable {
    name: String,
}

impl FirstApplicable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl CombiningAlgorithm for FirstApplicable {
    fn name(&self) -> &str {
        &self.name
    }

    fn combine_decisions(&self, decisions: &mut dyn Iterator<Item = Decision>) -> Decision {
        for decision in decisions {
            if decision != Decision::NotApplicable {
                return decision;
            }
        }
        Decision::NotApplicable
    }
}

/// Exactly one child may be applicable; more than one is Indeterminate.
#[derive(Debug, Clone)]
pub struct OnlyOneApplicable {
    name: String,
}

impl OnlyOneApplicable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl CombiningAlgorithm for OnlyOneApplicable {
    fn name(&self) -> &str {
        &self.name
    }

    fn combine_decisions(&self, decisions: &mut dyn Iterator<Item = Decision>) -> Decision {
        let mut applicable = None;
        for decision in decisions {
            if decision == Decision::NotApplicable {
                continue;
            }
            if applicable.is_some() {
                return Decision::Indeterminate;
            }
            applicable = Some(decision);
        }
        applicable.unwrap_or(Decision::NotApplicable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use test_case::test_case;

    use super::Decision::{Deny, Indeterminate, NotApplicable, Permit};

    fn combine(algorithm: &dyn CombiningAlgorithm, decisions: &[Decision]) -> Decision {
        algorithm.combine_decisions(&mut decisions.iter().copied())
    }

    fn any_decision() -> impl Strategy<Value = Decision> {
        prop_oneof![Just(Permit), Just(Deny), Just(Indeterminate), Just(NotApplicable)]
    }

    #[test_case(&[Permit, Deny, Permit], Deny ; "deny wins")]
    #[test_case(&[Permit, Indeterminate], Indeterminate ; "indeterminate before permit")]
    #[test_case(&[NotApplicable, Permit], Permit ; "permit")]
    #[test_case(&[NotApplicable], NotApplicable ; "not applicable")]
    #[test_case(&[], NotApplicable ; "empty")]
    fn deny_overrides(decisions: &[Decision], expected: Decision) {
        assert_eq!(expected, combine(&OrderedAlgorithm::deny_overrides(), decisions));
    }

    #[test_case(&[Deny, Permit, Deny], Permit ; "permit wins")]
    #[test_case(&[Deny, Indeterminate], Indeterminate ; "indeterminate before deny")]
    #[test_case(&[NotApplicable, Deny], Deny ; "deny")]
    #[test_case(&[], NotApplicable ; "empty")]
    fn permit_overrides(decisions: &[Decision], expected: Decision) {
        assert_eq!(expected, combine(&OrderedAlgorithm::permit_overrides(), decisions));
    }

    #[test]
    fn there_are_24_distinct_orders() {
        let all = OrderedAlgorithm::permutations();
        let names: HashSet<&str> = all.iter().map(|algorithm| algorithm.name()).collect();

        assert_eq!(24, all.len());
        assert_eq!(24, names.len());
        assert!(names.contains("Permit-Deny-Indeterminate-NotApplicable"));
        assert!(names.contains("NotApplicable-Indeterminate-Deny-Permit"));
    }

    #[test]
    fn ordered_stops_at_top_priority() {
        let algorithm = OrderedAlgorithm::deny_overrides();
        let mut pulled = 0;
        let mut decisions = [Permit, Deny, Permit, Permit].iter().copied().inspect(|_| pulled += 1);

        assert_eq!(Deny, algorithm.combine_decisions(&mut decisions));
        drop(decisions);
        assert_eq!(2, pulled);
    }

    #[test_case(&[NotApplicable, Deny, Permit], Deny ; "first applicable")]
    #[test_case(&[NotApplicable, Indeterminate, Permit], Indeterminate ; "indeterminate counts")]
    #[test_case(&[NotApplicable], NotApplicable ; "none")]
    fn first_applicable(decisions: &[Decision], expected: Decision) {
        assert_eq!(expected, combine(&FirstApplicable::new("First-Applicable"), decisions));
    }

    #[test]
    fn first_applicable_stops_at_first_decision() {
        let algorithm = FirstApplicable::new("First-Applicable");
        let mut pulled = 0;
        let mut decisions = [NotApplicable, Permit, Deny].iter().copied().inspect(|_| pulled += 1);

        assert_eq!(Permit, algorithm.combine_decisions(&mut decisions));
        drop(decisions);
        assert_eq!(2, pulled);
    }

    #[test_case(&[NotApplicable, Permit], Permit ; "single")]
    #[test_case(&[Deny, Permit], Indeterminate ; "two applicable")]
    #[test_case(&[], NotApplicable ; "empty")]
    fn only_one_applicable(decisions: &[Decision], expected: Decision) {
        assert_eq!(expected, combine(&OnlyOneApplicable::new("Only-One-Applicable"), decisions));
    }

    proptest! {
        #[test]
        fn deny_overrides_any_deny_is_deny(
            mut decisions in prop::collection::vec(any_decision(), 0..12),
            position in any::<prop::sample::Index>(),
        ) {
            let at = position.index(decisions.len() + 1);
            decisions.insert(at, Deny);
            prop_assert_eq!(Deny, combine(&OrderedAlgorithm::deny_overrides(), &decisions));
        }

        #[test]
        fn permit_overrides_permit_without_deny_is_permit(
            mut decisions in prop::collection::vec(
                prop_oneof![Just(Permit), Just(NotApplicable)], 0..12),
            position in any::<prop::sample::Index>(),
        ) {
            let at = position.index(decisions.len() + 1);
            decisions.insert(at, Permit);
            prop_assert_eq!(Permit, combine(&OrderedAlgorithm::permit_overrides(), &decisions));
        }

        #[test]
        fn ordered_returns_first_present_in_priority(
            decisions in prop::collection::vec(any_decision(), 0..12),
            index in 0usize..24,
        ) {
            let algorithm = &OrderedAlgorithm::permutations()[index];
            let expected = algorithm
                .order()
                .iter()
                .copied()
                .find(|decision| decisions.contains(decision))
                .unwrap_or(algorithm.order()[3]);
            prop_assert_eq!(expected, combine(algorithm, &decisions));
        }
    }
}
