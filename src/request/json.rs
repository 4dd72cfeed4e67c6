use serde::Deserialize;

use super::{AttributeGroup, Category, Request, RequestAttribute, RequestItem};
use crate::policy::SCHEMA_VERSION;
use crate::{AttributeFactory, Error, Result};

/// Parses a compact json request document.
///
/// ```json
/// {
///     "schemaVersion": "2023-06-01",
///     "requestItems": [
///         {
///             "subjects": [[{ "attributeId": "subject-id", "value": "alice" }]],
///             "actions": [{ "attributeId": "action-id", "value": "read" }]
///         }
///     ]
/// }
/// ```
///
/// A group is either a list of attributes or a single attribute. The
/// schema version may be left out.
pub fn parse_compact_request(json: &str, attributes: &AttributeFactory) -> Result<Request> {
    let definition: RequestDefinition20230601 =
        serde_json::from_str(json).map_err(Error::Deserializing)?;

    if let Some(version) = definition.schema_version.as_deref() {
        if version != SCHEMA_VERSION {
            return Err(Error::Validation(format!("unsupported schema version '{}'", version)));
        }
    }

    let items = definition
        .request_items
        .into_iter()
        .map(|item| process_item(item, attributes))
        .collect::<Result<Vec<_>>>()?;

    Ok(Request::new(items))
}

fn process_item(item: RequestItem20230601, attributes: &AttributeFactory) -> Result<RequestItem> {
    let mut result = RequestItem::new();
    let sections = vec![
        (Category::Subject, item.subjects),
        (Category::Resource, item.resources),
        (Category::Action, item.actions),
        (Category::Environment, item.environments),
    ];
    for (category, groups) in sections {
        for group in groups {
            let group = process_group(group, attributes)?;
            result.groups_mut(category).push(group);
        }
    }
    Ok(result)
}

fn process_group(group: Group20230601, attributes: &AttributeFactory) -> Result<AttributeGroup> {
    let definitions = match group {
        Group20230601::Many(definitions) => definitions,
        Group20230601::One(definition) => vec![definition],
    };
    definitions
        .into_iter()
        .map(|definition| {
            let value = attributes.create(&definition.value, &definition.type_name)?;
            Ok(RequestAttribute::new(definition.attribute_id, value)?
                .with_type_name(definition.type_name)
                .with_issuer(definition.issuer)
                .with_category(definition.category))
        })
        .collect()
}

fn default_type() -> String {
    "string".into()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestDefinition20230601 {
    #[serde(default)]
    schema_version: Option<String>,
    request_items: Vec<RequestItem20230601>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RequestItem20230601 {
    #[serde(default)]
    subjects: Vec<Group20230601>,
    #[serde(default)]
    resources: Vec<Group20230601>,
    #[serde(default)]
    actions: Vec<Group20230601>,
    #[serde(default, alias = "environment")]
    environments: Vec<Group20230601>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Group20230601 {
    Many(Vec<Attribute20230601>),
    One(Attribute20230601),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Attribute20230601 {
    attribute_id: String,
    #[serde(rename = "type", default = "default_type")]
    type_name: String,
    value: String,
    #[serde(default)]
    issuer: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataType;
    use assert_matches::assert_matches;

    #[test]
    fn groups_and_single_attributes() {
        let json = r#"{
            "schemaVersion": "2023-06-01",
            "requestItems": [
                {
                    "subjects": [
                        [
                            {
                                "attributeId": "subject-id",
                                "type": "x500Name",
                                "value": "/O=Grid/CN=Alice",
                                "issuer": "/O=Grid/CN=CA"
                            },
                            { "attributeId": "vo", "value": "atlas" }
                        ]
                    ],
                    "resources": [
                        {
                            "attributeId": "resource-id",
                            "type": "anyURI",
                            "value": "https://example.org/jobs"
                        }
                    ],
                    "actions": [
                        { "attributeId": "action-id", "value": "submit" },
                        { "attributeId": "action-id", "value": "cancel" }
                    ]
                }
            ]
        }"#;

        let request = parse_compact_request(json, &AttributeFactory::compact()).unwrap();
        let tuples = request.tuples();

        assert_eq!(2, tuples.len());
        let subject = &tuples[0].subject;
        assert_eq!(2, subject.len());
        assert_eq!(DataType::X500Name, subject[0].value().data_type());
        assert_eq!(Some("/O=Grid/CN=CA"), subject[0].issuer());
        assert_eq!("string", subject[1].type_name());
        assert_eq!("cancel", tuples[1].action[0].value().encode());
        assert!(tuples[1].environment.is_empty());
    }

    #[test]
    fn unknown_type_is_kept_as_generic() {
        let json = r#"{
            "requestItems": [
                {
                    "subjects": [
                        { "attributeId": "role", "type": "urn:example:role", "value": "admin" }
                    ]
                }
            ]
        }"#;

        let request = parse_compact_request(json, &AttributeFactory::compact()).unwrap();
        let attribute = &request.tuples()[0].subject[0];

        assert_eq!(DataType::Generic, attribute.value().data_type());
        assert_eq!("urn:example:role", attribute.value().type_name());
    }

    #[test]
    fn invalid_value_fails_the_request() {
        let json = r#"{
            "requestItems": [
                {
                    "environment": [
                        { "attributeId": "now", "type": "datetime", "value": "yesterday" }
                    ]
                }
            ]
        }"#;

        assert_matches!(
            parse_compact_request(json, &AttributeFactory::compact()),
            Err(Error::InvalidValue { .. })
        );
    }

    #[test]
    fn missing_attribute_id_is_rejected() {
        let json = r#"{ "requestItems": [{ "subjects": [{ "value": "alice" }] }] }"#;

        assert_matches!(
            parse_compact_request(json, &AttributeFactory::compact()),
            Err(Error::Deserializing(_))
        );
    }

    #[test]
    fn schema_version_is_checked_when_present() {
        let request = |version: &str| {
            format!(
                r#"{{
                    "schemaVersion": "{}",
                    "requestItems": [
                        {{ "actions": [{{ "attributeId": "action-id", "value": "read" }}] }}
                    ]
                }}"#,
                version
            )
        };

        let attributes = AttributeFactory::compact();
        assert!(parse_compact_request(&request("2023-06-01"), &attributes).is_ok());
        assert_matches!(
            parse_compact_request(&request("2019-01-01"), &attributes),
            Err(Error::Validation(_))
        );
    }
}
