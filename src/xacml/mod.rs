//! XACML 2.0 request and policy documents.

mod policy;
mod request;

pub use policy::{parse_xacml_policy, xacml_policy_to_xml};
pub use request::parse_xacml_request;

use crate::request::Category;
use crate::xml::Node;
use crate::{Error, Result};

pub const ACCESS_SUBJECT: &str = "urn:oasis:names:tc:xacml:1.0:subject-category:access-subject";

/// Element names of one request category.
struct Vocabulary {
    category: Category,
    /// `<Subjects>` inside a target.
    section: &'static str,
    /// `<Subject>` inside a target section or a request.
    group: &'static str,
    /// `<SubjectMatch>`.
    matcher: &'static str,
    /// `<SubjectAttributeDesignator>`.
    designator: &'static str,
}

static VOCABULARY: [Vocabulary; 4] = [
    Vocabulary {
        category: Category::Subject,
        section: "Subjects",
        group: "Subject",
        matcher: "SubjectMatch",
        designator: "SubjectAttributeDesignator",
    },
    Vocabulary {
        category: Category::Resource,
        section: "Resources",
        group: "Resource",
        matcher: "ResourceMatch",
        designator: "ResourceAttributeDesignator",
    },
    Vocabulary {
        category: Category::Action,
        section: "Actions",
        group: "Action",
        matcher: "ActionMatch",
        designator: "ActionAttributeDesignator",
    },
    Vocabulary {
        category: Category::Environment,
        section: "Environments",
        group: "Environment",
        matcher: "EnvironmentMatch",
        designator: "EnvironmentAttributeDesignator",
    },
];

fn vocabulary(category: Category) -> &'static Vocabulary {
    let index = match category {
        Category::Subject => 0,
        Category::Resource => 1,
        Category::Action => 2,
        Category::Environment => 3,
    };
    &VOCABULARY[index]
}

fn designator_category(element: &str) -> Option<Category> {
    VOCABULARY
        .iter()
        .find(|vocabulary| vocabulary.designator == element)
        .map(|vocabulary| vocabulary.category)
}

fn required<'a>(node: &'a Node, attribute: &str) -> Result<&'a str> {
    node.non_empty_attribute(attribute).ok_or_else(|| {
        Error::InvalidDocument(format!("<{}> is missing the {} attribute", node.name(), attribute))
    })
}
