//! Target matching.
//!
//! A `Target` is an AND over sections, a section an OR over groups, a
//! group an AND over single `Match`es. Two strategies exist:
//!
//! - `MatchStrategy::Reference` resolves each match operand against the
//!   request; an operand that resolves to nothing makes the match
//!   Indeterminate while a resolved but different value is NoMatch.
//! - `MatchStrategy::AttributeId` compares every literal against the
//!   whole request section and additionally tracks whether the literal's
//!   attribute id was presented at all. A section whose ids were all
//!   presented but whose values disagree turns the target Indeterminate;
//!   an id that is wholly absent is NoMatch.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::attr::DataType;
use crate::func::{Bag, Function};
use crate::request::{Category, EvaluationContext, RequestAttribute};
use crate::{AttributeFactory, AttributeValue, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    Match,
    NoMatch,
    Indeterminate,
}

/// How much of a group's attribute ids were found in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IdMatch {
    None,
    Partial,
    Full,
}

/// Reference to request attributes by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Designator {
    pub category: Category,
    pub attribute_id: String,
    pub data_type: DataType,
    /// Dialect spelling of `data_type`.
    pub type_name: String,
    pub issuer: Option<String>,
    pub subject_category: Option<String>,
    pub must_be_present: bool,
}

impl Designator {
    pub fn new(
        category: Category,
        attribute_id: impl Into<String>,
        data_type: DataType,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            category,
            attribute_id: attribute_id.into(),
            data_type,
            type_name: type_name.into(),
            issuer: None,
            subject_category: None,
            must_be_present: false,
        }
    }

    pub fn with_issuer(mut self, issuer: Option<String>) -> Self {
        self.issuer = issuer;
        self
    }

    pub fn with_subject_category(mut self, subject_category: Option<String>) -> Self {
        self.subject_category = subject_category;
        self
    }

    pub fn with_must_be_present(mut self, must_be_present: bool) -> Self {
        self.must_be_present = must_be_present;
        self
    }

    fn selects(&self, attribute: &RequestAttribute) -> bool {
        let value = attribute.value();
        attribute.id() == self.attribute_id
            && value.data_type() == self.data_type
            && (self.data_type != DataType::Generic || value.type_name() == self.type_name)
            && self.issuer.as_deref().map_or(true, |issuer| attribute.issuer() == Some(issuer))
            && self
                .subject_category
                .as_deref()
                .map_or(true, |category| attribute.category() == Some(category))
    }

    /// Values of all request attributes the designator selects.
    pub fn resolve(&self, ctx: &EvaluationContext<'_>) -> Result<Bag> {
        let bag: Bag = ctx
            .attributes(self.category)
            .iter()
            .filter(|attribute| self.selects(attribute))
            .map(|attribute| attribute.value().clone())
            .collect();
        if bag.is_empty() && self.must_be_present {
            return Err(Error::Evaluation(format!(
                "required {} attribute '{}' is missing",
                self.category, self.attribute_id
            )));
        }
        Ok(bag)
    }
}

/// Path lookup into the retained request document.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub path: String,
    pub data_type: DataType,
    pub type_name: String,
    pub must_be_present: bool,
}

impl Selector {
    pub fn new(path: impl Into<String>, data_type: DataType, type_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data_type,
            type_name: type_name.into(),
            must_be_present: false,
        }
    }

    pub fn with_must_be_present(mut self, must_be_present: bool) -> Self {
        self.must_be_present = must_be_present;
        self
    }

    pub fn resolve(&self, ctx: &EvaluationContext<'_>) -> Result<Bag> {
        let found = ctx.content().map(|content| content.select(&self.path)).unwrap_or_default();
        if found.is_empty() && self.must_be_present {
            return Err(Error::Evaluation(format!("path '{}' selected nothing", self.path)));
        }

        let mut factory = AttributeFactory::empty();
        factory.register(&self.type_name, self.data_type);
        found.iter().map(|raw| factory.create(raw, &self.type_name)).collect()
    }
}

/// Where the request side of a match comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Every attribute of the enclosing section.
    Section,
    Designator(Designator),
    Selector(Selector),
}

#[derive(Clone)]
pub struct Match {
    pub function: Arc<dyn Function>,
    /// Literal declared in the policy.
    pub value: AttributeValue,
    pub operand: Operand,
}

impl fmt::Debug for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("function", &self.function.name())
            .field("value", &self.value)
            .field("operand", &self.operand)
            .finish()
    }
}

impl Match {
    pub fn new(function: Arc<dyn Function>, value: AttributeValue, operand: Operand) -> Self {
        Self {
            function,
            value,
            operand,
        }
    }

    fn candidates(&self, ctx: &EvaluationContext<'_>, category: Category) -> Result<Bag> {
        match &self.operand {
            Operand::Section => Ok(ctx
                .attributes(category)
                .iter()
                .filter(|attribute| self.value.id().map_or(true, |id| id == attribute.id()))
                .map(|attribute| attribute.value().clone())
                .collect()),
            Operand::Designator(designator) => designator.resolve(ctx),
            Operand::Selector(selector) => selector.resolve(ctx),
        }
    }

    /// Reference semantics: Indeterminate when the operand cannot be
    /// resolved, Match when any resolved value satisfies the function.
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>, category: Category) -> MatchResult {
        let candidates = match self.candidates(ctx, category) {
            Ok(candidates) if !candidates.is_empty() => candidates,
            Ok(_) => return MatchResult::Indeterminate,
            Err(error) => {
                trace!(%error, "match operand could not be resolved");
                return MatchResult::Indeterminate;
            }
        };

        let mut failed = false;
        for candidate in &candidates {
            match self.function.matches(&self.value, candidate, false) {
                Ok(true) => return MatchResult::Match,
                Ok(false) => {}
                Err(error) => {
                    trace!(function = self.function.name(), %error, "match function failed");
                    failed = true;
                }
            }
        }
        if failed {
            MatchResult::Indeterminate
        } else {
            MatchResult::NoMatch
        }
    }

    /// Whether the literal's id was presented in `attributes`. A literal
    /// without id counts as presented.
    fn id_presented(&self, attributes: &[RequestAttribute]) -> bool {
        match self.value.id() {
            Some(id) => attributes.iter().any(|attribute| attribute.id() == id),
            None => true,
        }
    }

    /// Whether any attribute satisfies the function, ids included.
    fn value_matches(&self, attributes: &[RequestAttribute]) -> bool {
        attributes.iter().any(|attribute| {
            matches!(self.function.matches(&self.value, attribute.value(), true), Ok(true))
        })
    }
}

/// Conjunction of matches.
#[derive(Debug, Clone, Default)]
pub struct MatchGroup {
    pub matches: Vec<Match>,
}

impl MatchGroup {
    pub fn new(matches: Vec<Match>) -> Self {
        Self { matches }
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>, category: Category) -> MatchResult {
        let mut indeterminate = false;
        for item in &self.matches {
            match item.evaluate(ctx, category) {
                MatchResult::NoMatch => return MatchResult::NoMatch,
                MatchResult::Indeterminate => indeterminate = true,
                MatchResult::Match => {}
            }
        }
        if indeterminate {
            MatchResult::Indeterminate
        } else {
            MatchResult::Match
        }
    }

    /// Walks the matches in order and stops at the first one whose value
    /// is not satisfied; ids of the matches after it are not counted.
    fn id_evaluate(&self, attributes: &[RequestAttribute]) -> (bool, IdMatch) {
        let mut ids = 0;
        for item in &self.matches {
            if item.id_presented(attributes) {
                ids += 1;
            }
            if !item.value_matches(attributes) {
                let id_match = if ids == self.matches.len() {
                    IdMatch::Full
                } else if ids > 0 {
                    IdMatch::Partial
                } else {
                    IdMatch::None
                };
                return (false, id_match);
            }
        }
        (true, IdMatch::Full)
    }
}

/// Disjunction of groups over one request category.
#[derive(Debug, Clone)]
pub struct Section {
    pub category: Category,
    pub groups: Vec<MatchGroup>,
}

impl Section {
    pub fn new(category: Category, groups: Vec<MatchGroup>) -> Self {
        Self { category, groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> MatchResult {
        if self.is_empty() {
            return MatchResult::Match;
        }
        let mut indeterminate = false;
        for group in &self.groups {
            match group.evaluate(ctx, self.category) {
                MatchResult::Match => return MatchResult::Match,
                MatchResult::Indeterminate => indeterminate = true,
                MatchResult::NoMatch => {}
            }
        }
        if indeterminate {
            MatchResult::Indeterminate
        } else {
            MatchResult::NoMatch
        }
    }

    /// `Ok(())` when some group fully matches, otherwise the best id
    /// coverage seen across groups.
    fn id_evaluate(&self, ctx: &EvaluationContext<'_>) -> std::result::Result<(), IdMatch> {
        let attributes = ctx.attributes(self.category);
        let mut best = IdMatch::None;
        for group in &self.groups {
            match group.id_evaluate(attributes) {
                (true, _) => return Ok(()),
                (false, id_match) => best = best.max(id_match),
            }
        }
        Err(best)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Reference,
    AttributeId,
}

/// Applicability predicate of a rule or policy. An empty target matches
/// every tuple.
#[derive(Debug, Clone)]
pub struct Target {
    pub sections: Vec<Section>,
    pub strategy: MatchStrategy,
}

impl Target {
    pub fn new(sections: Vec<Section>, strategy: MatchStrategy) -> Self {
        Self { sections, strategy }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), MatchStrategy::Reference)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(Section::is_empty)
    }

    pub fn section(&self, category: Category) -> Option<&Section> {
        self.sections.iter().find(|section| section.category == category)
    }

    pub fn matches(&self, ctx: &EvaluationContext<'_>) -> MatchResult {
        match self.strategy {
            MatchStrategy::Reference => self.reference_match(ctx),
            MatchStrategy::AttributeId => self.id_match(ctx),
        }
    }

    fn reference_match(&self, ctx: &EvaluationContext<'_>) -> MatchResult {
        let mut indeterminate = false;
        for section in &self.sections {
            match section.evaluate(ctx) {
                MatchResult::NoMatch => return MatchResult::NoMatch,
                MatchResult::Indeterminate => indeterminate = true,
                MatchResult::Match => {}
            }
        }
        if indeterminate {
            MatchResult::Indeterminate
        } else {
            MatchResult::Match
        }
    }

    fn id_match(&self, ctx: &EvaluationContext<'_>) -> MatchResult {
        let mut all_ids_presented = true;
        let mut all_matched = true;
        for section in self.sections.iter().filter(|section| !section.is_empty()) {
            if let Err(id_match) = section.id_evaluate(ctx) {
                all_matched = false;
                all_ids_presented &= id_match == IdMatch::Full;
            }
        }
        if all_matched {
            MatchResult::Match
        } else if all_ids_presented {
            MatchResult::Indeterminate
        } else {
            MatchResult::NoMatch
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestTuple;
    use crate::xml::Node;
    use crate::FnFactory;
    use test_case::test_case;

    fn string_equal() -> Arc<dyn Function> {
        FnFactory::compact().create("string-equal").unwrap()
    }

    fn literal(id: &str, value: &str) -> Match {
        Match::new(string_equal(), AttributeValue::string(value).with_id(id), Operand::Section)
    }

    fn designated(id: &str, value: &str) -> Match {
        let designator = Designator::new(Category::Subject, id, DataType::String, "string");
        Match::new(string_equal(), AttributeValue::string(value), Operand::Designator(designator))
    }

    fn subjects(attributes: &[(&str, &str)]) -> RequestTuple {
        RequestTuple {
            subject: attributes
                .iter()
                .map(|(id, value)| {
                    RequestAttribute::new(*id, AttributeValue::string(*value)).unwrap()
                })
                .collect(),
            ..RequestTuple::default()
        }
    }

    fn target(strategy: MatchStrategy, groups: Vec<Vec<Match>>) -> Target {
        let groups = groups.into_iter().map(MatchGroup::new).collect();
        Target::new(vec![Section::new(Category::Subject, groups)], strategy)
    }

    #[test]
    fn empty_target_matches_anything() {
        let tuple = subjects(&[("id", "alice")]);
        let ctx = EvaluationContext::new(&tuple);

        assert_eq!(MatchResult::Match, Target::empty().matches(&ctx));
        let empty_sections =
            Target::new(vec![Section::new(Category::Action, vec![])], MatchStrategy::AttributeId);
        assert_eq!(MatchResult::Match, empty_sections.matches(&ctx));
    }

    #[test_case(&[("id", "alice")], MatchResult::Match ; "resolved and equal")]
    #[test_case(&[("id", "bob")], MatchResult::NoMatch ; "resolved and different")]
    #[test_case(&[("role", "admin")], MatchResult::Indeterminate ; "unresolved")]
    fn reference_matching(attributes: &[(&str, &str)], expected: MatchResult) {
        let tuple = subjects(attributes);
        let target = target(MatchStrategy::Reference, vec![vec![designated("id", "alice")]]);

        assert_eq!(expected, target.matches(&EvaluationContext::new(&tuple)));
    }

    #[test]
    fn reference_section_prefers_match_over_indeterminate() {
        let tuple = subjects(&[("id", "alice")]);
        let target = target(
            MatchStrategy::Reference,
            vec![vec![designated("role", "admin")], vec![designated("id", "alice")]],
        );

        assert_eq!(MatchResult::Match, target.matches(&EvaluationContext::new(&tuple)));
    }

    #[test]
    fn reference_group_no_match_wins_over_indeterminate() {
        let tuple = subjects(&[("id", "bob")]);
        let target = target(
            MatchStrategy::Reference,
            vec![vec![designated("role", "admin"), designated("id", "alice")]],
        );

        assert_eq!(MatchResult::NoMatch, target.matches(&EvaluationContext::new(&tuple)));
    }

    #[test]
    fn designator_filters_by_issuer() {
        let tuple = RequestTuple {
            subject: vec![RequestAttribute::new("id", AttributeValue::string("alice"))
                .unwrap()
                .with_issuer(Some("ca-1".into()))],
            ..RequestTuple::default()
        };
        let ctx = EvaluationContext::new(&tuple);
        let designator = Designator::new(Category::Subject, "id", DataType::String, "string");

        let ca = |name: &str| Some(name.to_string());
        assert_eq!(1, designator.clone().with_issuer(ca("ca-1")).resolve(&ctx).unwrap().len());
        assert!(designator.clone().with_issuer(ca("ca-2")).resolve(&ctx).unwrap().is_empty());
        assert!(designator
            .with_must_be_present(true)
            .with_issuer(ca("ca-2"))
            .resolve(&ctx)
            .is_err());
    }

    #[test]
    fn selector_reads_request_content() {
        let content = Node::parse(
            r#"<Request>
                <Resource><Path owner="alice">/jobs/1</Path></Resource>
            </Request>"#,
        )
        .unwrap();
        let tuple = RequestTuple::default();
        let ctx = EvaluationContext::new(&tuple).with_content(Some(&content));
        let selector = Selector::new("//Path/@owner", DataType::String, "string");
        let alice = AttributeValue::string("alice");
        let item = Match::new(string_equal(), alice, Operand::Selector(selector));

        assert_eq!(MatchResult::Match, item.evaluate(&ctx, Category::Resource));
        assert_eq!(
            MatchResult::Indeterminate,
            item.evaluate(&EvaluationContext::new(&tuple), Category::Resource)
        );
    }

    #[test_case(&[("id", "alice")], MatchResult::Match ; "id and value")]
    #[test_case(&[("id", "bob")], MatchResult::Indeterminate ; "id presented value differs")]
    #[test_case(&[("role", "alice")], MatchResult::NoMatch ; "id absent")]
    #[test_case(&[], MatchResult::NoMatch ; "nothing presented")]
    fn id_matching(attributes: &[(&str, &str)], expected: MatchResult) {
        let tuple = subjects(attributes);
        let target = target(MatchStrategy::AttributeId, vec![vec![literal("id", "alice")]]);

        assert_eq!(expected, target.matches(&EvaluationContext::new(&tuple)));
    }

    #[test]
    fn id_matching_any_request_attribute_may_satisfy() {
        let tuple = subjects(&[("id", "bob"), ("id", "alice")]);
        let target = target(MatchStrategy::AttributeId, vec![vec![literal("id", "alice")]]);

        assert_eq!(MatchResult::Match, target.matches(&EvaluationContext::new(&tuple)));
    }

    #[test]
    fn id_matching_all_ids_presented_but_second_value_differs() {
        let tuple = subjects(&[("id", "alice"), ("vo", "cms")]);
        let target = target(
            MatchStrategy::AttributeId,
            vec![vec![literal("id", "alice"), literal("vo", "atlas")]],
        );

        assert_eq!(MatchResult::Indeterminate, target.matches(&EvaluationContext::new(&tuple)));
    }

    #[test]
    fn id_matching_stops_counting_at_first_failed_value() {
        // both ids are presented, but the walk stops at the first match and
        // never counts the second id, so the group is only partial.
        let tuple = subjects(&[("id", "bob"), ("vo", "atlas")]);
        let target = target(
            MatchStrategy::AttributeId,
            vec![vec![literal("id", "alice"), literal("vo", "atlas")]],
        );

        assert_eq!(MatchResult::NoMatch, target.matches(&EvaluationContext::new(&tuple)));
    }

    #[test]
    fn id_matching_best_group_decides() {
        let tuple = subjects(&[("id", "bob")]);
        let target = target(
            MatchStrategy::AttributeId,
            vec![vec![literal("role", "admin")], vec![literal("id", "alice")]],
        );

        assert_eq!(MatchResult::Indeterminate, target.matches(&EvaluationContext::new(&tuple)));
    }

    #[test]
    fn id_matching_any_section_without_ids_is_no_match() {
        let mut tuple = subjects(&[("id", "bob")]);
        tuple.action = vec![RequestAttribute::new("op", AttributeValue::string("read")).unwrap()];
        let target = Target::new(
            vec![
                Section::new(
                    Category::Subject,
                    vec![MatchGroup::new(vec![literal("id", "alice")])],
                ),
                Section::new(
                    Category::Action,
                    vec![MatchGroup::new(vec![literal("action", "read")])],
                ),
            ],
            MatchStrategy::AttributeId,
        );

        assert_eq!(MatchResult::NoMatch, target.matches(&EvaluationContext::new(&tuple)));
    }

    #[test]
    fn id_matching_literal_without_id_is_wildcard() {
        let tuple = subjects(&[("anything", "alice")]);
        let item = Match::new(string_equal(), AttributeValue::string("alice"), Operand::Section);
        let target = target(MatchStrategy::AttributeId, vec![vec![item]]);

        assert_eq!(MatchResult::Match, target.matches(&EvaluationContext::new(&tuple)));
    }
}
