//! Normalized authorization requests.
//!
//! A request holds one or more items; each item lists alternative
//! subject, resource, action and environment attribute groups. Before
//! evaluation every item is split into the cartesian set of
//! `RequestTuple`s, and each tuple is judged on its own.

mod json;

pub use json::parse_compact_request;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{xml::Node, AttributeValue, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Subject,
    Resource,
    Action,
    Environment,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Subject,
        Category::Resource,
        Category::Action,
        Category::Environment,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Subject => "subject",
            Category::Resource => "resource",
            Category::Action => "action",
            Category::Environment => "environment",
        };
        f.write_str(name)
    }
}

/// One assertion inside a request document.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestAttribute {
    id: String,
    type_name: String,
    issuer: Option<String>,
    category: Option<String>,
    value: AttributeValue,
}

impl RequestAttribute {
    /// The value is tagged with `id`, so id aware functions can compare it
    /// against policy literals.
    pub fn new(id: impl Into<String>, value: AttributeValue) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::BadRequest("Attribute id must be specified".into()));
        }
        Ok(Self {
            type_name: value.type_name().to_string(),
            value: value.with_id(id.clone()),
            id,
            issuer: None,
            category: None,
        })
    }

    /// Keeps the dialect's spelling of the type.
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    pub fn with_issuer(mut self, issuer: Option<String>) -> Self {
        self.value = self.value.with_issuer(issuer.clone());
        self.issuer = issuer;
        self
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.value = self.value.with_category(category.clone());
        self.category = category;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn value(&self) -> &AttributeValue {
        &self.value
    }
}

pub type AttributeGroup = Vec<RequestAttribute>;

/// Alternative attribute groups per category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestItem {
    pub subjects: Vec<AttributeGroup>,
    pub resources: Vec<AttributeGroup>,
    pub actions: Vec<AttributeGroup>,
    pub environments: Vec<AttributeGroup>,
}

impl RequestItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, category: Category, group: AttributeGroup) -> Self {
        self.groups_mut(category).push(group);
        self
    }

    pub fn groups(&self, category: Category) -> &[AttributeGroup] {
        match category {
            Category::Subject => &self.subjects,
            Category::Resource => &self.resources,
            Category::Action => &self.actions,
            Category::Environment => &self.environments,
        }
    }

    pub fn groups_mut(&mut self, category: Category) -> &mut Vec<AttributeGroup> {
        match category {
            Category::Subject => &mut self.subjects,
            Category::Resource => &mut self.resources,
            Category::Action => &mut self.actions,
            Category::Environment => &mut self.environments,
        }
    }

    /// Cartesian product of the groups; a category without groups takes
    /// part as a single empty group.
    pub fn split(&self) -> Vec<RequestTuple> {
        let empty: [AttributeGroup; 1] = [Vec::new()];
        let alternatives = |category| {
            let groups = self.groups(category);
            if groups.is_empty() {
                &empty[..]
            } else {
                groups
            }
        };

        let mut tuples = Vec::new();
        for subject in alternatives(Category::Subject) {
            for resource in alternatives(Category::Resource) {
                for action in alternatives(Category::Action) {
                    for environment in alternatives(Category::Environment) {
                        tuples.push(RequestTuple {
                            subject: subject.clone(),
                            resource: resource.clone(),
                            action: action.clone(),
                            environment: environment.clone(),
                        });
                    }
                }
            }
        }
        tuples
    }
}

/// A parsed request document.
#[derive(Debug, Clone, Default)]
pub struct Request {
    items: Vec<RequestItem>,
    content: Option<Arc<Node>>,
}

impl Request {
    pub fn new(items: Vec<RequestItem>) -> Self {
        Self { items, content: None }
    }

    /// Keeps the source document for path based attribute selectors.
    pub fn with_content(mut self, content: Node) -> Self {
        self.content = Some(Arc::new(content));
        self
    }

    pub fn items(&self) -> &[RequestItem] {
        &self.items
    }

    pub fn content(&self) -> Option<&Node> {
        self.content.as_deref()
    }

    pub fn tuples(&self) -> Vec<RequestTuple> {
        self.items.iter().flat_map(RequestItem::split).collect()
    }
}

/// One concrete combination judged by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestTuple {
    pub subject: Vec<RequestAttribute>,
    pub resource: Vec<RequestAttribute>,
    pub action: Vec<RequestAttribute>,
    pub environment: Vec<RequestAttribute>,
}

impl RequestTuple {
    pub fn section(&self, category: Category) -> &[RequestAttribute] {
        match category {
            Category::Subject => &self.subject,
            Category::Resource => &self.resource,
            Category::Action => &self.action,
            Category::Environment => &self.environment,
        }
    }
}

/// Borrowed view of the tuple under evaluation and its source document.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    tuple: &'a RequestTuple,
    content: Option<&'a Node>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(tuple: &'a RequestTuple) -> Self {
        Self { tuple, content: None }
    }

    pub fn with_content(mut self, content: Option<&'a Node>) -> Self {
        self.content = content;
        self
    }

    pub fn tuple(&self) -> &'a RequestTuple {
        self.tuple
    }

    pub fn content(&self) -> Option<&'a Node> {
        self.content
    }

    pub fn attributes(&self, category: Category) -> &'a [RequestAttribute] {
        self.tuple.section(category)
    }
}
