use super::{required, vocabulary, ACCESS_SUBJECT};
use crate::request::{AttributeGroup, Category, Request, RequestAttribute, RequestItem};
use crate::xml::Node;
use crate::{AttributeFactory, Error, Result};

/// Parses an XACML 2.0 `<Request>`.
///
/// All `<Subject>` elements form one subject group, each attribute keeping
/// its subject category. Every `<Resource>` and every `<Action>` is a group
/// of its own, `<Environment>` is a single group. The document is retained
/// for attribute selectors.
pub fn parse_xacml_request(document: &str, attributes: &AttributeFactory) -> Result<Request> {
    let root = Node::parse(document)?;
    if root.name() != "Request" {
        return Err(Error::InvalidDocument(format!("expected <Request>, found <{}>", root.name())));
    }

    let mut item = RequestItem::new();

    let mut subject = Vec::new();
    for node in root.children_named(vocabulary(Category::Subject).group) {
        let category = node.non_empty_attribute("SubjectCategory").unwrap_or(ACCESS_SUBJECT);
        subject.extend(parse_attributes(node, attributes, Some(category))?);
    }
    if !subject.is_empty() {
        item.subjects.push(subject);
    }

    for category in [Category::Resource, Category::Action] {
        for node in root.children_named(vocabulary(category).group) {
            let group = parse_attributes(node, attributes, None)?;
            item.groups_mut(category).push(group);
        }
    }

    let mut environment = Vec::new();
    for node in root.children_named(vocabulary(Category::Environment).group) {
        environment.extend(parse_attributes(node, attributes, None)?);
    }
    if !environment.is_empty() {
        item.environments.push(environment);
    }

    Ok(Request::new(vec![item]).with_content(root))
}

fn parse_attributes(
    node: &Node,
    factory: &AttributeFactory,
    category: Option<&str>,
) -> Result<AttributeGroup> {
    let mut group = Vec::new();
    for attribute in node.children_named("Attribute") {
        let id = required(attribute, "AttributeId")?;
        let data_type = required(attribute, "DataType")?;
        let issuer = attribute.non_empty_attribute("Issuer").map(str::to_string);

        let values: Vec<&Node> = attribute.children_named("AttributeValue").collect();
        if values.is_empty() {
            return Err(Error::InvalidDocument(format!("attribute '{}' has no value", id)));
        }
        for value in values {
            let value = factory.create(value.text(), data_type)?;
            group.push(
                RequestAttribute::new(id, value)?
                    .with_type_name(data_type)
                    .with_issuer(issuer.clone())
                    .with_category(category.map(str::to_string)),
            );
        }
    }
    Ok(group)
}
