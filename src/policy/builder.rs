use serde::{Deserialize, Serialize};

use crate::{
    condition::{Condition, ConditionBuilder, Expression, ExprId},
    func::{Function, Operator},
    matcher::{Designator, Match, MatchGroup, MatchStrategy, Operand, Section, Selector, Target},
    policy::{AttributeAssignment, Effect as CoreEffect, Obligation, Policy, Rule},
    request::Category,
    AttributeFactory, AttributeValue, DataType, DefaultValidator, Error, Field, PolicyValidator,
    Registries, Result,
};

pub(crate) const SCHEMA_VERSION: &str = "2023-06-01";

/// Builds a `Policy` from a compact json policy document.
///
/// Functions, algorithms and attribute types are looked up in the given
/// registries, the compact ones by default. Every id, description and
/// literal value is passed to the validator before it is used.
pub struct PolicyBuilder<'a, V = DefaultValidator> {
    json: String,
    validator: V,
    registries: Option<&'a Registries>,
}

impl PolicyBuilder<'static, DefaultValidator> {
    pub fn from_json(json: &str) -> Self {
        Self {
            json: json.into(),
            validator: DefaultValidator,
            registries: None,
        }
    }
}

impl<'a, V> PolicyBuilder<'a, V>
where
    V: PolicyValidator,
{
    pub fn with_validator<W: PolicyValidator>(self, validator: W) -> PolicyBuilder<'a, W> {
        PolicyBuilder {
            json: self.json,
            validator,
            registries: self.registries,
        }
    }

    pub fn with_registries<'b>(self, registries: &'b Registries) -> PolicyBuilder<'b, V> {
        PolicyBuilder {
            json: self.json,
            validator: self.validator,
            registries: Some(registries),
        }
    }

    pub fn build(self) -> Result<Policy> {
        let definition: PolicyDefinition20230601 =
            serde_json::from_str(&self.json).map_err(Error::Deserializing)?;

        if definition.schema_version != SCHEMA_VERSION {
            return Err(Error::Validation(format!(
                "unsupported schema version '{}'",
                definition.schema_version
            )));
        }

        let compact;
        let registries = match self.registries {
            Some(registries) => registries,
            None => {
                compact = Registries::compact();
                &compact
            }
        };
        let context = Context {
            registries,
            validator: &self.validator,
        };

        context.process_policy(definition)
    }
}

struct Context<'a, V> {
    registries: &'a Registries,
    validator: &'a V,
}

impl<V: PolicyValidator> Context<'_, V> {
    fn process_policy(&self, definition: PolicyDefinition20230601) -> Result<Policy> {
        self.validator.validate(Field::PolicyId, &definition.policy_id)?;
        if let Some(description) = &definition.description {
            self.validator.validate(Field::Description, description)?;
        }

        let combining_alg = self.registries.algorithms.create(&definition.combining_alg)?;
        let mut policy = Policy::new(definition.policy_id, combining_alg)
            .with_description(definition.description)
            .with_target(self.process_target(definition.target.unwrap_or_default())?);

        for obligation in definition.obligations {
            policy = policy.with_obligation(self.process_obligation(obligation)?);
        }
        for rule in definition.rules {
            policy = policy.with_rule(self.process_rule(rule)?);
        }
        Ok(policy)
    }

    fn process_rule(&self, definition: Rule20230601) -> Result<Rule> {
        self.validator.validate(Field::RuleId, &definition.rule_id)?;
        if let Some(description) = &definition.description {
            self.validator.validate(Field::Description, description)?;
        }

        let condition = match definition.condition {
            Some(expression) => {
                let mut builder = Condition::builder();
                let root = self.process_expression(&mut builder, expression)?;
                Some(builder.build(root)?)
            }
            None => None,
        };

        let mut rule = Rule::new(definition.rule_id, definition.effect.into())
            .with_description(definition.description)
            .with_target(self.process_target(definition.target)?)
            .with_condition(condition);
        for obligation in definition.obligations {
            rule = rule.with_obligation(self.process_obligation(obligation)?);
        }
        Ok(rule)
    }

    fn process_target(&self, definition: Target20230601) -> Result<Target> {
        let sections = vec![
            (Category::Subject, definition.subjects),
            (Category::Resource, definition.resources),
            (Category::Action, definition.actions),
            (Category::Environment, definition.environment),
        ];

        let mut result = Vec::new();
        for (category, groups) in sections {
            if groups.is_empty() {
                continue;
            }
            let groups = groups
                .into_iter()
                .map(|group| {
                    group
                        .into_iter()
                        .map(|item| self.process_match(item))
                        .collect::<Result<Vec<_>>>()
                        .map(MatchGroup::new)
                })
                .collect::<Result<Vec<_>>>()?;
            result.push(Section::new(category, groups));
        }
        Ok(Target::new(result, MatchStrategy::AttributeId))
    }

    fn process_match(&self, definition: Match20230601) -> Result<Match> {
        let mut value = self.process_value(&definition.value, &definition.type_name)?;
        if let Some(attribute_id) = definition.attribute_id {
            self.validator.validate(Field::AttributeId, &attribute_id)?;
            value = value.with_id(attribute_id);
        }
        let function = self.function(definition.function.as_deref(), value.data_type())?;
        Ok(Match::new(function, value, Operand::Section))
    }

    /// An operator name (`equal`, `match`, `inRange`) picks the function
    /// for the literal's type; anything else is a function name.
    fn function(
        &self,
        name: Option<&str>,
        data_type: DataType,
    ) -> Result<std::sync::Arc<dyn Function>> {
        let functions = &self.registries.functions;
        match name {
            None => functions.create_for(Operator::Equal, data_type),
            Some(name) => match name.parse::<Operator>() {
                Ok(operator) => functions.create_for(operator, data_type),
                Err(_) => functions.create(name),
            },
        }
    }

    fn process_value(&self, raw: &str, type_name: &str) -> Result<AttributeValue> {
        self.validator.validate(Field::AttributeValue, raw)?;
        self.registries.attributes.create(raw, type_name)
    }

    fn data_type(&self, type_name: &str) -> DataType {
        self.registries.attributes.data_type(type_name).unwrap_or(DataType::Generic)
    }

    fn process_expression(
        &self,
        builder: &mut ConditionBuilder,
        definition: Expression20230601,
    ) -> Result<ExprId> {
        let id = match definition {
            Expression20230601::Value(literal) => {
                builder.value(self.process_value(&literal.value, &literal.type_name)?)
            }
            Expression20230601::Designator(designator) => {
                self.validator.validate(Field::AttributeId, &designator.attribute_id)?;
                let data_type = self.data_type(&designator.type_name);
                builder.designator(
                    Designator::new(
                        designator.category,
                        designator.attribute_id,
                        data_type,
                        designator.type_name,
                    )
                    .with_issuer(designator.issuer)
                    .with_must_be_present(designator.must_be_present),
                )
            }
            Expression20230601::Selector(selector) => {
                let data_type = self.data_type(&selector.type_name);
                builder.selector(
                    Selector::new(selector.path, data_type, selector.type_name)
                        .with_must_be_present(selector.must_be_present),
                )
            }
            Expression20230601::Apply(apply) => {
                let function = self.registries.functions.create(&apply.function_id)?;
                let args = apply
                    .args
                    .into_iter()
                    .map(|arg| self.process_expression(builder, arg))
                    .collect::<Result<Vec<_>>>()?;
                builder.apply(function, args)
            }
        };
        Ok(id)
    }

    fn process_obligation(&self, definition: Obligation20230601) -> Result<Obligation> {
        let mut obligation =
            Obligation::new(definition.obligation_id, definition.fulfill_on.into());
        for assignment in definition.assignments {
            self.validator.validate(Field::AttributeId, &assignment.attribute_id)?;
            let value = self.process_value(&assignment.value, &assignment.type_name)?;
            let assignment = AttributeAssignment::new(assignment.attribute_id, value);
            obligation = obligation.with_assignment(assignment);
        }
        Ok(obligation)
    }
}

/// Serializes `policy` back into a compact json document.
pub fn to_json(policy: &Policy) -> Result<String> {
    let names = AttributeFactory::compact();
    let definition = PolicyDefinition20230601 {
        schema_version: SCHEMA_VERSION.into(),
        policy_id: policy.id().into(),
        description: policy.description().map(str::to_string),
        combining_alg: policy.combining_alg().name().into(),
        target: if policy.target().is_empty() {
            None
        } else {
            Some(target_definition(policy.target(), &names))
        },
        obligations: policy
            .obligations()
            .iter()
            .map(|obligation| obligation_definition(obligation, &names))
            .collect(),
        rules: policy
            .rules()
            .iter()
            .map(|rule| Rule20230601 {
                rule_id: rule.id().into(),
                description: rule.description().map(str::to_string),
                effect: rule.effect().into(),
                target: target_definition(rule.target(), &names),
                condition: rule
                    .condition()
                    .map(|condition| expression_definition(condition, condition.root(), &names)),
                obligations: rule
                    .obligations()
                    .iter()
                    .map(|obligation| obligation_definition(obligation, &names))
                    .collect(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&definition).map_err(Error::Serializing)
}

fn target_definition(target: &Target, names: &AttributeFactory) -> Target20230601 {
    let mut definition = Target20230601::default();
    for section in &target.sections {
        let groups = section
            .groups
            .iter()
            .map(|group| group.matches.iter().map(|item| match_definition(item, names)).collect())
            .collect();
        let slot = match section.category {
            Category::Subject => &mut definition.subjects,
            Category::Resource => &mut definition.resources,
            Category::Action => &mut definition.actions,
            Category::Environment => &mut definition.environment,
        };
        *slot = groups;
    }
    definition
}

fn match_definition(item: &Match, names: &AttributeFactory) -> Match20230601 {
    let attribute_id = match &item.operand {
        Operand::Designator(designator) => Some(designator.attribute_id.clone()),
        _ => item.value.id().map(str::to_string),
    };
    Match20230601 {
        attribute_id,
        type_name: names.name_of(&item.value),
        value: item.value.encode(),
        function: Some(item.function.name().into()),
    }
}

fn expression_definition(
    condition: &Condition,
    id: ExprId,
    names: &AttributeFactory,
) -> Expression20230601 {
    match condition.node(id) {
        Expression::Value(value) => Expression20230601::Value(Literal20230601 {
            type_name: names.name_of(value),
            value: value.encode(),
        }),
        Expression::Designator(designator) => Expression20230601::Designator(Designator20230601 {
            category: designator.category,
            attribute_id: designator.attribute_id.clone(),
            type_name: designator.type_name.clone(),
            issuer: designator.issuer.clone(),
            must_be_present: designator.must_be_present,
        }),
        Expression::Selector(selector) => Expression20230601::Selector(Selector20230601 {
            path: selector.path.clone(),
            type_name: selector.type_name.clone(),
            must_be_present: selector.must_be_present,
        }),
        Expression::Apply { function, args } => Expression20230601::Apply(Apply20230601 {
            function_id: function.name().into(),
            args: args
                .iter()
                .map(|arg| expression_definition(condition, *arg, names))
                .collect(),
        }),
    }
}

fn obligation_definition(obligation: &Obligation, names: &AttributeFactory) -> Obligation20230601 {
    Obligation20230601 {
        obligation_id: obligation.id.clone(),
        fulfill_on: obligation.fulfill_on.into(),
        assignments: obligation
            .assignments
            .iter()
            .map(|assignment| Assignment20230601 {
                attribute_id: assignment.attribute_id.clone(),
                type_name: names.name_of(&assignment.value),
                value: assignment.value.encode(),
            })
            .collect(),
    }
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.into()
}

fn default_combining_alg() -> String {
    "Deny-Overrides".into()
}

fn default_type() -> String {
    "string".into()
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyDefinition20230601 {
    #[serde(default = "default_schema_version")]
    schema_version: String,
    policy_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default = "default_combining_alg")]
    combining_alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<Target20230601>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    obligations: Vec<Obligation20230601>,
    rules: Vec<Rule20230601>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Rule20230601 {
    rule_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    effect: Effect20230601,
    #[serde(flatten)]
    target: Target20230601,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition: Option<Expression20230601>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    obligations: Vec<Obligation20230601>,
}

/// Each section is an OR over groups, each group an AND over matches.
#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Target20230601 {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    subjects: Vec<Vec<Match20230601>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    resources: Vec<Vec<Match20230601>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    actions: Vec<Vec<Match20230601>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    environment: Vec<Vec<Match20230601>>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Match20230601 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attribute_id: Option<String>,
    #[serde(rename = "type", default = "default_type")]
    type_name: String,
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Expression20230601 {
    Value(Literal20230601),
    Designator(Designator20230601),
    Selector(Selector20230601),
    Apply(Apply20230601),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Literal20230601 {
    #[serde(rename = "type", default = "default_type")]
    type_name: String,
    value: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Designator20230601 {
    category: Category,
    attribute_id: String,
    #[serde(rename = "type", default = "default_type")]
    type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issuer: Option<String>,
    #[serde(default)]
    must_be_present: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Selector20230601 {
    path: String,
    #[serde(rename = "type", default = "default_type")]
    type_name: String,
    #[serde(default)]
    must_be_present: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Apply20230601 {
    function_id: String,
    #[serde(default)]
    args: Vec<Expression20230601>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Obligation20230601 {
    obligation_id: String,
    fulfill_on: Effect20230601,
    #[serde(default)]
    assignments: Vec<Assignment20230601>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Assignment20230601 {
    attribute_id: String,
    #[serde(rename = "type", default = "default_type")]
    type_name: String,
    value: String,
}

#[derive(Serialize, Deserialize, Copy, Clone)]
enum Effect20230601 {
    #[serde(alias = "permit")]
    Permit,
    #[serde(alias = "deny")]
    Deny,
}

impl From<Effect20230601> for CoreEffect {
    fn from(effect: Effect20230601) -> Self {
        match effect {
            Effect20230601::Permit => CoreEffect::Permit,
            Effect20230601::Deny => CoreEffect::Deny,
        }
    }
}

impl From<CoreEffect> for Effect20230601 {
    fn from(effect: CoreEffect) -> Self {
        match effect {
            CoreEffect::Permit => Effect20230601::Permit,
            CoreEffect::Deny => Effect20230601::Deny,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::tests::build_policy;
    use assert_matches::assert_matches;

    const POLICY: &str = r#"{
        "schemaVersion": "2023-06-01",
        "policyId": "storage",
        "description": "Grid storage access",
        "combiningAlg": "Permit-Overrides",
        "target": {
            "resources": [[{
                "attributeId": "resource-id",
                "type": "anyURI",
                "value": "https://storage.example.org/",
                "function": "match"
            }]]
        },
        "rules": [
            {
                "ruleId": "atlas-members",
                "effect": "permit",
                "subjects": [
                    [
                        {
                            "attributeId": "subject-id",
                            "type": "x500Name",
                            "value": "/O=Grid/OU=atlas",
                            "function": "Match"
                        },
                        { "attributeId": "vo", "value": "atlas" }
                    ],
                    [{ "attributeId": "role", "value": "admin" }]
                ],
                "actions": [[
                    { "attributeId": "action-id", "value": "read|list", "function": "string-match" }
                ]],
                "environment": [[{
                    "attributeId": "now",
                    "type": "period",
                    "value": "2023-01-01T00:00:00Z/P1Y",
                    "function": "inRange"
                }]],
                "condition": {
                    "apply": {
                        "functionId": "not",
                        "args": [
                            {
                                "apply": {
                                    "functionId": "string-is-in",
                                    "args": [
                                        { "value": { "value": "banned" } },
                                        {
                                            "designator": {
                                                "category": "subject",
                                                "attributeId": "group"
                                            }
                                        }
                                    ]
                                }
                            }
                        ]
                    }
                },
                "obligations": [
                    {
                        "obligationId": "map",
                        "fulfillOn": "Permit",
                        "assignments": [{ "attributeId": "local-identity", "value": "atlas001" }]
                    }
                ]
            },
            {
                "ruleId": "no-deletes",
                "description": "nobody deletes",
                "effect": "Deny",
                "actions": [[{ "attributeId": "action-id", "value": "delete" }]]
            }
        ]
    }"#;

    #[test]
    fn test_basic_definition() {
        let policy = build_policy(POLICY);

        assert_eq!("storage", policy.id());
        assert_eq!("Permit-Overrides", policy.combining_alg().name());
        assert_eq!(2, policy.rules().len());

        let rule = &policy.rules()[0];
        assert_eq!(CoreEffect::Permit, rule.effect());
        assert_eq!(3, rule.target().sections.len());
        let subjects = rule.target().section(Category::Subject).unwrap();
        assert_eq!(2, subjects.groups.len());
        assert_eq!(2, subjects.groups[0].matches.len());
        assert_eq!("x500Name-match", subjects.groups[0].matches[0].function.name());
        assert_eq!(Some("subject-id"), subjects.groups[0].matches[0].value.id());
        assert_eq!(4, rule.condition().unwrap().len());
        assert_eq!(1, rule.obligations().len());

        let environment = rule.target().section(Category::Environment).unwrap();
        assert_eq!("period-in-range", environment.groups[0].matches[0].function.name());
        assert_eq!(Some("nobody deletes"), policy.rules()[1].description());
    }

    #[test]
    fn round_trip_preserves_ids_effects_and_algorithms() {
        let policy = build_policy(POLICY);

        let json = to_json(&policy).unwrap();
        let again = build_policy(&json);

        assert_eq!(policy.id(), again.id());
        assert_eq!(policy.description(), again.description());
        assert_eq!(policy.combining_alg().name(), again.combining_alg().name());
        assert_eq!(policy.target().sections.len(), again.target().sections.len());
        for (rule, other) in policy.rules().iter().zip(again.rules()) {
            assert_eq!(rule.id(), other.id());
            assert_eq!(rule.effect(), other.effect());
            assert_eq!(rule.target().sections.len(), other.target().sections.len());
            assert_eq!(rule.condition().map(Condition::len), other.condition().map(Condition::len));
            assert_eq!(rule.obligations(), other.obligations());
        }
    }

    #[test]
    fn unknown_function_fails() {
        let json = r#"{
            "policyId": "p",
            "rules": [{
                "ruleId": "r",
                "effect": "Permit",
                "subjects": [[{ "value": "a", "function": "string-soundex" }]]
            }]
        }"#;

        assert_matches!(PolicyBuilder::from_json(json).build(), Err(Error::UnknownFunction(_)));
    }

    #[test]
    fn operator_without_implementation_for_type_fails() {
        let json = r#"{
            "policyId": "p",
            "rules": [{
                "ruleId": "r",
                "effect": "Permit",
                "subjects": [[{ "type": "boolean", "value": "true", "function": "match" }]]
            }]
        }"#;

        assert_matches!(PolicyBuilder::from_json(json).build(), Err(Error::UnknownFunction(_)));
    }

    #[test]
    fn unknown_algorithm_fails() {
        let json = r#"{ "policyId": "p", "combiningAlg": "Majority", "rules": [] }"#;

        assert_matches!(PolicyBuilder::from_json(json).build(), Err(Error::UnknownAlgorithm(_)));
    }

    #[test]
    fn invalid_effect_fails() {
        let json = r#"{ "policyId": "p", "rules": [{ "ruleId": "r", "effect": "Allow" }] }"#;

        assert_matches!(PolicyBuilder::from_json(json).build(), Err(Error::Deserializing(_)));
    }

    #[test]
    fn unsupported_schema_version_fails() {
        let json = r#"{ "schemaVersion": "2020-10-30", "policyId": "p", "rules": [] }"#;

        assert_matches!(PolicyBuilder::from_json(json).build(), Err(Error::Validation(_)));
    }

    #[test]
    fn validator_sees_every_rule_id() {
        struct NoDashes;

        impl PolicyValidator for NoDashes {
            fn validate(&self, field: Field, value: &str) -> Result<()> {
                match field {
                    Field::RuleId if value.contains('-') => {
                        Err(Error::Validation(format!("bad rule id {}", value)))
                    }
                    _ => Ok(()),
                }
            }
        }

        let result = PolicyBuilder::from_json(POLICY).with_validator(NoDashes).build();

        assert_matches!(result, Err(Error::Validation(_)));
    }

    #[test]
    fn xacml_registries_resolve_urn_functions() {
        let json = r#"{
            "policyId": "p",
            "rules": [{
                "ruleId": "r",
                "effect": "Permit",
                "subjects": [[{
                    "attributeId": "subject-id",
                    "type": "urn:oasis:names:tc:xacml:1.0:data-type:x500Name",
                    "value": "CN=Alice,O=Grid",
                    "function": "urn:oasis:names:tc:xacml:1.0:function:x500Name-equal"
                }]]
            }]
        }"#;
        let registries = Registries::xacml();

        let policy = PolicyBuilder::from_json(json).with_registries(&registries).build().unwrap();

        let item = &policy.rules()[0].target().sections[0].groups[0].matches[0];
        assert_eq!(DataType::X500Name, item.value.data_type());
    }
}
