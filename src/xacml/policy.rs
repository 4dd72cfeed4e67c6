use super::{designator_category, required, vocabulary, Vocabulary, VOCABULARY};
use crate::condition::{Condition, ConditionBuilder, Expression, ExprId};
use crate::matcher::{
    Designator, Match, MatchGroup, MatchStrategy, Operand, Section, Selector, Target,
};
use crate::policy::{AttributeAssignment, Effect, Obligation, Policy, Rule};
use crate::request::Category;
use crate::xml::Node;
use crate::{AttributeFactory, AttributeValue, DataType, Error, Registries, Result};

const POLICY_NAMESPACE: &str = "urn:oasis:names:tc:xacml:2.0:policy:schema:os";
const SELECTOR: &str = "AttributeSelector";

/// Parses an XACML 2.0 `<Policy>` into a rule tree matched by reference.
///
/// Policy sets and variable definitions are not supported.
pub fn parse_xacml_policy(document: &str, registries: &Registries) -> Result<Policy> {
    let root = Node::parse(document)?;
    match root.name() {
        "Policy" => Reader { registries }.policy(&root),
        "PolicySet" => Err(Error::InvalidDocument("policy sets are not supported".into())),
        other => Err(Error::InvalidDocument(format!("expected <Policy>, found <{}>", other))),
    }
}

struct Reader<'a> {
    registries: &'a Registries,
}

impl Reader<'_> {
    fn policy(&self, node: &Node) -> Result<Policy> {
        let id = required(node, "PolicyId")?;
        let combining_alg = self
            .registries
            .algorithms
            .create(required(node, "RuleCombiningAlgId")?)?;

        let mut policy = Policy::new(id, combining_alg)
            .with_description(description(node))
            .with_target(self.target(node.child("Target"))?);
        for rule in node.children_named("Rule") {
            policy = policy.with_rule(self.rule(rule)?);
        }
        for obligation in obligations(node) {
            policy = policy.with_obligation(self.obligation(obligation)?);
        }
        Ok(policy)
    }

    fn rule(&self, node: &Node) -> Result<Rule> {
        let effect: Effect = required(node, "Effect")?.parse()?;
        let condition = match node.child("Condition") {
            Some(condition) => Some(self.condition(condition)?),
            None => None,
        };

        let mut rule = Rule::new(required(node, "RuleId")?, effect)
            .with_description(description(node))
            .with_target(self.target(node.child("Target"))?)
            .with_condition(condition);
        for obligation in obligations(node) {
            rule = rule.with_obligation(self.obligation(obligation)?);
        }
        Ok(rule)
    }

    fn target(&self, node: Option<&Node>) -> Result<Target> {
        let mut sections = Vec::new();
        if let Some(node) = node {
            for vocabulary in VOCABULARY.iter() {
                let section = match node.child(vocabulary.section) {
                    Some(section) => section,
                    None => continue,
                };
                // <AnySubject/> and friends of XACML 1.0.
                if section.children().iter().any(|child| child.name().starts_with("Any")) {
                    continue;
                }
                let groups = section
                    .children_named(vocabulary.group)
                    .map(|group| {
                        group
                            .children_named(vocabulary.matcher)
                            .map(|item| self.target_match(item, vocabulary))
                            .collect::<Result<Vec<_>>>()
                            .map(MatchGroup::new)
                    })
                    .collect::<Result<Vec<_>>>()?;
                if !groups.is_empty() {
                    sections.push(Section::new(vocabulary.category, groups));
                }
            }
        }
        Ok(Target::new(sections, MatchStrategy::Reference))
    }

    fn target_match(&self, node: &Node, vocabulary: &Vocabulary) -> Result<Match> {
        let function = self.registries.functions.create(required(node, "MatchId")?)?;
        let literal = node.child("AttributeValue").ok_or_else(|| {
            Error::InvalidDocument(format!("<{}> has no AttributeValue", node.name()))
        })?;
        let value = self.value(literal)?;

        let operand = if let Some(designator) = node.child(vocabulary.designator) {
            Operand::Designator(self.designator(designator, vocabulary.category)?)
        } else if let Some(selector) = node.child(SELECTOR) {
            Operand::Selector(self.selector(selector)?)
        } else {
            return Err(Error::InvalidDocument(format!(
                "<{}> has neither {} nor {}",
                node.name(),
                vocabulary.designator,
                SELECTOR
            )));
        };
        Ok(Match::new(function, value, operand))
    }

    /// `<Condition>` holds one expression, or is itself the application
    /// in XACML 1.0 documents.
    fn condition(&self, node: &Node) -> Result<Condition> {
        let mut builder = Condition::builder();
        let root = if node.attribute("FunctionId").is_some() {
            self.apply(&mut builder, node)?
        } else {
            match node.children() {
                [expression] => self.expression(&mut builder, expression)?,
                _ => {
                    return Err(Error::InvalidDocument(
                        "<Condition> must hold exactly one expression".into(),
                    ))
                }
            }
        };
        builder.build(root)
    }

    fn expression(&self, builder: &mut ConditionBuilder, node: &Node) -> Result<ExprId> {
        let id = match node.name() {
            "Apply" => self.apply(builder, node)?,
            "AttributeValue" => builder.value(self.value(node)?),
            SELECTOR => builder.selector(self.selector(node)?),
            name => match designator_category(name) {
                Some(category) => builder.designator(self.designator(node, category)?),
                None => {
                    return Err(Error::InvalidDocument(format!(
                        "unsupported expression <{}>",
                        name
                    )))
                }
            },
        };
        Ok(id)
    }

    fn apply(&self, builder: &mut ConditionBuilder, node: &Node) -> Result<ExprId> {
        let function = self.registries.functions.create(required(node, "FunctionId")?)?;
        let args = node
            .children()
            .iter()
            .filter(|child| child.name() != "Description")
            .map(|child| self.expression(builder, child))
            .collect::<Result<Vec<_>>>()?;
        Ok(builder.apply(function, args))
    }

    fn value(&self, node: &Node) -> Result<AttributeValue> {
        self.registries.attributes.create(node.text(), required(node, "DataType")?)
    }

    fn data_type(&self, type_name: &str) -> DataType {
        self.registries.attributes.data_type(type_name).unwrap_or(DataType::Generic)
    }

    fn designator(&self, node: &Node, category: Category) -> Result<Designator> {
        let type_name = required(node, "DataType")?;
        let subject_category = match category {
            Category::Subject => node.non_empty_attribute("SubjectCategory").map(str::to_string),
            _ => None,
        };
        let attribute_id = required(node, "AttributeId")?;
        Ok(Designator::new(category, attribute_id, self.data_type(type_name), type_name)
            .with_issuer(node.non_empty_attribute("Issuer").map(str::to_string))
            .with_subject_category(subject_category)
            .with_must_be_present(must_be_present(node)))
    }

    fn selector(&self, node: &Node) -> Result<Selector> {
        let type_name = required(node, "DataType")?;
        let path = required(node, "RequestContextPath")?;
        Ok(Selector::new(path, self.data_type(type_name), type_name)
            .with_must_be_present(must_be_present(node)))
    }

    fn obligation(&self, node: &Node) -> Result<Obligation> {
        let fulfill_on: Effect = required(node, "FulfillOn")?.parse()?;
        let mut obligation = Obligation::new(required(node, "ObligationId")?, fulfill_on);
        for assignment in node.children_named("AttributeAssignment") {
            obligation = obligation.with_assignment(AttributeAssignment::new(
                required(assignment, "AttributeId")?,
                self.value(assignment)?,
            ));
        }
        Ok(obligation)
    }
}

fn description(node: &Node) -> Option<String> {
    node.child("Description").map(|description| description.text().to_string())
}

fn obligations(node: &Node) -> impl Iterator<Item = &Node> {
    node.children_named("Obligations")
        .flat_map(|obligations| obligations.children_named("Obligation"))
}

fn must_be_present(node: &Node) -> bool {
    node.attribute("MustBePresent") == Some("true")
}

/// Writes `policy` as an XACML 2.0 `<Policy>`, naming types with
/// `attributes`.
///
/// Matches of compact policies have no designator; they are written as
/// designators of the literal's id.
pub fn xacml_policy_to_xml(policy: &Policy, attributes: &AttributeFactory) -> String {
    let writer = Writer { attributes };
    let mut root = Node::new("Policy")
        .with_attribute("xmlns", POLICY_NAMESPACE)
        .with_attribute("PolicyId", policy.id())
        .with_attribute("RuleCombiningAlgId", policy.combining_alg().name());
    if let Some(description) = policy.description() {
        root.push_child(Node::new("Description").with_text(description));
    }
    root.push_child(writer.target(policy.target()));
    for rule in policy.rules() {
        root.push_child(writer.rule(rule));
    }
    if !policy.obligations().is_empty() {
        root.push_child(writer.obligations(policy.obligations()));
    }
    root.to_xml()
}

struct Writer<'a> {
    attributes: &'a AttributeFactory,
}

impl Writer<'_> {
    fn rule(&self, rule: &Rule) -> Node {
        let mut node = Node::new("Rule")
            .with_attribute("RuleId", rule.id())
            .with_attribute("Effect", rule.effect().as_str());
        if let Some(description) = rule.description() {
            node.push_child(Node::new("Description").with_text(description));
        }
        node.push_child(self.target(rule.target()));
        if let Some(condition) = rule.condition() {
            let expression = self.expression(condition, condition.root());
            node.push_child(Node::new("Condition").with_child(expression));
        }
        if !rule.obligations().is_empty() {
            node.push_child(self.obligations(rule.obligations()));
        }
        node
    }

    fn target(&self, target: &Target) -> Node {
        let mut node = Node::new("Target");
        for section in target.sections.iter().filter(|section| !section.is_empty()) {
            let vocabulary = vocabulary(section.category);
            let mut section_node = Node::new(vocabulary.section);
            for group in &section.groups {
                let mut group_node = Node::new(vocabulary.group);
                for item in &group.matches {
                    group_node.push_child(self.target_match(item, section.category));
                }
                section_node.push_child(group_node);
            }
            node.push_child(section_node);
        }
        node
    }

    fn target_match(&self, item: &Match, category: Category) -> Node {
        let operand = match &item.operand {
            Operand::Designator(designator) => self.designator(designator),
            Operand::Selector(selector) => self.selector(selector),
            Operand::Section => {
                let type_name = self.attributes.name_of(&item.value);
                self.designator(&Designator::new(
                    category,
                    item.value.id().unwrap_or_default(),
                    item.value.data_type(),
                    type_name,
                ))
            }
        };
        Node::new(vocabulary(category).matcher)
            .with_attribute("MatchId", item.function.name())
            .with_child(self.value("AttributeValue", &item.value))
            .with_child(operand)
    }

    fn expression(&self, condition: &Condition, id: ExprId) -> Node {
        match condition.node(id) {
            Expression::Value(value) => self.value("AttributeValue", value),
            Expression::Designator(designator) => self.designator(designator),
            Expression::Selector(selector) => self.selector(selector),
            Expression::Apply { function, args } => args.iter().fold(
                Node::new("Apply").with_attribute("FunctionId", function.name()),
                |node, arg| node.with_child(self.expression(condition, *arg)),
            ),
        }
    }

    fn value(&self, name: &str, value: &AttributeValue) -> Node {
        Node::new(name)
            .with_attribute("DataType", self.attributes.name_of(value))
            .with_text(value.encode())
    }

    fn designator(&self, designator: &Designator) -> Node {
        let type_name = match designator.data_type {
            DataType::Generic => designator.type_name.as_str(),
            data_type => self.attributes.type_name(data_type).unwrap_or(&designator.type_name),
        };
        let mut node = Node::new(vocabulary(designator.category).designator)
            .with_attribute("AttributeId", designator.attribute_id.as_str())
            .with_attribute("DataType", type_name);
        if let Some(issuer) = &designator.issuer {
            node = node.with_attribute("Issuer", issuer.as_str());
        }
        if let Some(subject_category) = &designator.subject_category {
            node = node.with_attribute("SubjectCategory", subject_category.as_str());
        }
        if designator.must_be_present {
            node = node.with_attribute("MustBePresent", "true");
        }
        node
    }

    fn selector(&self, selector: &Selector) -> Node {
        let type_name = match selector.data_type {
            DataType::Generic => selector.type_name.as_str(),
            data_type => self.attributes.type_name(data_type).unwrap_or(&selector.type_name),
        };
        let mut node = Node::new(SELECTOR)
            .with_attribute("RequestContextPath", selector.path.as_str())
            .with_attribute("DataType", type_name);
        if selector.must_be_present {
            node = node.with_attribute("MustBePresent", "true");
        }
        node
    }

    fn obligations(&self, obligations: &[Obligation]) -> Node {
        let mut node = Node::new("Obligations");
        for obligation in obligations {
            let mut obligation_node = Node::new("Obligation")
                .with_attribute("ObligationId", obligation.id.as_str())
                .with_attribute("FulfillOn", obligation.fulfill_on.as_str());
            for assignment in &obligation.assignments {
                obligation_node.push_child(
                    self.value("AttributeAssignment", &assignment.value)
                        .with_attribute("AttributeId", assignment.attribute_id.as_str()),
                );
            }
            node.push_child(obligation_node);
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::EvaluationContext;
    use crate::xacml::parse_xacml_request;
    use crate::xacml::request::tests::REQUEST;
    use crate::Decision;
    use assert_matches::assert_matches;

    const POLICY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <Policy xmlns="urn:oasis:names:tc:xacml:2.0:policy:schema:os"
          PolicyId="records"
          RuleCombiningAlgId="urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:deny-overrides">
          <Description>Medical records</Description>
          <Target>
            <Resources>
              <Resource>
                <ResourceMatch MatchId="urn:oasis:names:tc:xacml:1.0:function:anyURI-equal">
                  <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#anyURI"
                    >https://example.org/records/1</AttributeValue>
                  <ResourceAttributeDesignator
                    AttributeId="urn:oasis:names:tc:xacml:1.0:resource:resource-id"
                    DataType="http://www.w3.org/2001/XMLSchema#anyURI"/>
                </ResourceMatch>
              </Resource>
            </Resources>
          </Target>
          <Rule RuleId="owner-reads" Effect="Permit">
            <Target>
              <Subjects>
                <Subject>
                  <SubjectMatch MatchId="urn:oasis:names:tc:xacml:1.0:function:x500Name-equal">
                    <AttributeValue DataType="urn:oasis:names:tc:xacml:1.0:data-type:x500Name"
                      >O=Grid,CN=Alice</AttributeValue>
                    <SubjectAttributeDesignator
                      AttributeId="urn:oasis:names:tc:xacml:1.0:subject:subject-id"
                      DataType="urn:oasis:names:tc:xacml:1.0:data-type:x500Name"/>
                  </SubjectMatch>
                </Subject>
              </Subjects>
              <Actions>
                <Action>
                  <ActionMatch MatchId="urn:oasis:names:tc:xacml:1.0:function:string-equal">
                    <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#string"
                      >read</AttributeValue>
                    <ActionAttributeDesignator
                      AttributeId="urn:oasis:names:tc:xacml:1.0:action:action-id"
                      DataType="http://www.w3.org/2001/XMLSchema#string"/>
                  </ActionMatch>
                </Action>
              </Actions>
            </Target>
            <Condition>
              <Apply FunctionId="urn:oasis:names:tc:xacml:1.0:function:and">
                <Apply FunctionId="urn:oasis:names:tc:xacml:1.0:function:string-is-in">
                  <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#string"
                    >admins</AttributeValue>
                  <SubjectAttributeDesignator AttributeId="group"
                    DataType="http://www.w3.org/2001/XMLSchema#string"
                    SubjectCategory="urn:oasis:names:tc:xacml:1.0:subject-category:codebase"/>
                </Apply>
                <Apply FunctionId="urn:oasis:names:tc:xacml:1.0:function:string-equal">
                  <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#string"
                    >alice</AttributeValue>
                  <Apply FunctionId="urn:oasis:names:tc:xacml:1.0:function:string-one-and-only">
                    <AttributeSelector RequestContextPath="//record/@owner"
                      DataType="http://www.w3.org/2001/XMLSchema#string"/>
                  </Apply>
                </Apply>
              </Apply>
            </Condition>
          </Rule>
          <Rule RuleId="no-writes" Effect="Deny">
            <Target>
              <Actions>
                <Action>
                  <ActionMatch MatchId="urn:oasis:names:tc:xacml:1.0:function:string-equal">
                    <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#string"
                      >write</AttributeValue>
                    <ActionAttributeDesignator
                      AttributeId="urn:oasis:names:tc:xacml:1.0:action:action-id"
                      DataType="http://www.w3.org/2001/XMLSchema#string"/>
                  </ActionMatch>
                </Action>
              </Actions>
            </Target>
          </Rule>
          <Obligations>
            <Obligation ObligationId="urn:example:obligation:local-account" FulfillOn="Permit">
              <AttributeAssignment AttributeId="local-identity"
                DataType="http://www.w3.org/2001/XMLSchema#string">alice01</AttributeAssignment>
            </Obligation>
          </Obligations>
        </Policy>"#;

    fn decisions(policy: &Policy) -> Vec<(Decision, usize)> {
        let request = parse_xacml_request(REQUEST, &AttributeFactory::xacml()).unwrap();
        request
            .tuples()
            .iter()
            .map(|tuple| {
                let ctx = EvaluationContext::new(tuple).with_content(request.content());
                let evaluation = policy.evaluate(&ctx);
                (evaluation.decision, evaluation.obligations.len())
            })
            .collect()
    }

    #[test]
    fn parse_policy_document() {
        let policy = parse_xacml_policy(POLICY, &Registries::xacml()).unwrap();

        assert_eq!("records", policy.id());
        assert_eq!(Some("Medical records"), policy.description());
        assert_eq!(MatchStrategy::Reference, policy.target().strategy);
        assert_eq!(2, policy.rules().len());
        assert_eq!(Effect::Deny, policy.rules()[1].effect());
        assert_eq!(8, policy.rules()[0].condition().unwrap().len());
        assert_eq!(
            Some("alice01"),
            policy.obligations()[0]
                .assignment("local-identity")
                .map(|value| value.encode())
                .as_deref()
        );
    }

    #[test]
    fn evaluate_against_request() {
        let policy = parse_xacml_policy(POLICY, &Registries::xacml()).unwrap();

        // read is permitted through the owner rule, write is denied.
        assert_eq!(vec![(Decision::Permit, 1), (Decision::Deny, 0)], decisions(&policy));
    }

    #[test]
    fn written_policy_reads_back() {
        let registries = Registries::xacml();
        let policy = parse_xacml_policy(POLICY, &registries).unwrap();

        let xml = xacml_policy_to_xml(&policy, &registries.attributes);
        let reread = parse_xacml_policy(&xml, &registries).unwrap();

        assert_eq!(policy.combining_alg().name(), reread.combining_alg().name());
        let condition = |policy: &Policy| policy.rules()[0].condition().unwrap().len();
        let operand =
            |policy: &Policy| policy.target().sections[0].groups[0].matches[0].operand.clone();
        assert_eq!(condition(&policy), condition(&reread));
        assert_eq!(operand(&policy), operand(&reread));
        assert_eq!(decisions(&policy), decisions(&reread));
    }

    #[test]
    fn condition_function_attribute_form() {
        let document = r#"<Policy PolicyId="p" RuleCombiningAlgId="First-Applicable">
            <Rule RuleId="r" Effect="Permit">
                <Condition FunctionId="urn:oasis:names:tc:xacml:1.0:function:string-equal">
                    <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#string"
                      >a</AttributeValue>
                    <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#string"
                      >a</AttributeValue>
                </Condition>
            </Rule>
        </Policy>"#;

        let policy = parse_xacml_policy(document, &Registries::xacml()).unwrap();

        assert_eq!(3, policy.rules()[0].condition().unwrap().len());
        assert!(policy.target().is_empty());
    }

    #[test]
    fn any_subject_matches_everyone() {
        let document = r#"<Policy PolicyId="p" RuleCombiningAlgId="First-Applicable">
            <Target><Subjects><AnySubject/></Subjects></Target>
        </Policy>"#;

        let policy = parse_xacml_policy(document, &Registries::xacml()).unwrap();

        assert!(policy.target().is_empty());
    }

    #[test]
    fn unsupported_documents_are_rejected() {
        let registries = Registries::xacml();

        assert_matches!(
            parse_xacml_policy("<PolicySet PolicySetId=\"s\"/>", &registries),
            Err(Error::InvalidDocument(_))
        );
        assert_matches!(
            parse_xacml_policy(
                r#"<Policy PolicyId="p" RuleCombiningAlgId="First-Applicable">
                    <Rule RuleId="r" Effect="Permit">
                        <Condition><VariableReference VariableId="v"/></Condition>
                    </Rule>
                </Policy>"#,
                &registries
            ),
            Err(Error::InvalidDocument(_))
        );
        assert_matches!(
            parse_xacml_policy(
                r#"<Policy PolicyId="p" RuleCombiningAlgId="urn:unknown"/>"#,
                &registries
            ),
            Err(Error::UnknownAlgorithm(_))
        );
        assert_matches!(
            parse_xacml_policy(r#"<Policy RuleCombiningAlgId="First-Applicable"/>"#, &registries),
            Err(Error::InvalidDocument(_))
        );
    }
}
