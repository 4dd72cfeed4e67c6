//! Flat access control lists.
//!
//! ```xml
//! <gacl>
//!   <entry>
//!     <person><dn>/O=Grid/CN=Alice</dn></person>
//!     <allow><read/><list/></allow>
//!     <deny><write/></deny>
//!   </entry>
//! </gacl>
//! ```
//!
//! Every child of an entry other than `allow` and `deny` is a credential.
//! An entry applies to a caller holding all of its credentials, where a
//! held credential must structurally contain the one in the entry.
//! Requests use the same vocabulary: each entry lists the caller's
//! credentials and, under `allow`, the permissions asked for.

use std::collections::BTreeSet;

use tracing::warn;

use crate::alg::Evaluable;
use crate::attr::Value;
use crate::matcher::MatchResult;
use crate::request::{Category, EvaluationContext, Request, RequestAttribute, RequestItem};
use crate::xml::Node;
use crate::{AttributeFactory, AttributeValue, Decision, Error, Result};

const ROOT: &str = "gacl";
const ENTRY: &str = "entry";
const ALLOW: &str = "allow";
const DENY: &str = "deny";
const ANY_USER: &str = "any-user";
const AUTH_USER: &str = "auth-user";
const PERSON: &str = "person";
const DN_LIST: &str = "dn-list";
const NONE: &str = "none";

/// Attribute id of requested permissions.
pub const ACTION_ID: &str = "action";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AclEntry {
    pub credentials: Vec<Node>,
    pub allow: BTreeSet<String>,
    pub deny: BTreeSet<String>,
}

impl AclEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(mut self, credential: Node) -> Self {
        self.credentials.push(credential);
        self
    }

    pub fn allowing(mut self, permission: impl Into<String>) -> Self {
        self.allow.insert(permission.into());
        self
    }

    pub fn denying(mut self, permission: impl Into<String>) -> Self {
        self.deny.insert(permission.into());
        self
    }

    fn parse(node: &Node) -> Result<Self> {
        if node.name() != ENTRY {
            return Err(Error::InvalidDocument(format!("unexpected <{}> in acl", node.name())));
        }
        let mut entry = AclEntry::new();
        for child in node.children() {
            match child.name() {
                ALLOW => entry.allow.extend(permissions(child)),
                DENY => entry.deny.extend(permissions(child)),
                _ => entry.credentials.push(child.clone()),
            }
        }
        Ok(entry)
    }

    fn applies_to(&self, identities: &[&Node]) -> bool {
        self.credentials.iter().all(|credential| match credential.name() {
            ANY_USER => true,
            AUTH_USER => identities.iter().any(|identity| identity.name() == PERSON),
            // lists live in external files, which are never fetched.
            DN_LIST => false,
            // a bare credential only matches an equally bare identity.
            _ if credential.children().is_empty() => identities
                .iter()
                .any(|identity| identity.children().is_empty() && identity.contains(credential)),
            _ => identities.iter().any(|identity| identity.contains(credential)),
        })
    }

    fn to_node(&self) -> Node {
        let mut node = Node::new(ENTRY);
        for credential in &self.credentials {
            node.push_child(credential.clone());
        }
        for (name, set) in &[(ALLOW, &self.allow), (DENY, &self.deny)] {
            if !set.is_empty() {
                node.push_child(set.iter().fold(Node::new(*name), |node, permission| {
                    node.with_child(Node::new(permission.as_str()))
                }));
            }
        }
        node
    }
}

fn permissions(node: &Node) -> impl Iterator<Item = String> + '_ {
    node.children()
        .iter()
        .map(|permission| permission.name().to_string())
        .filter(|permission| permission != NONE)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GaclPolicy {
    id: String,
    entries: Vec<AclEntry>,
}

impl GaclPolicy {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entries: Vec::new(),
        }
    }

    pub fn with_entry(mut self, entry: AclEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn from_xml(id: impl Into<String>, document: &str) -> Result<Self> {
        let root = Node::parse(document)?;
        if root.name() != ROOT {
            return Err(Error::InvalidDocument(format!(
                "expected <{}>, found <{}>",
                ROOT,
                root.name()
            )));
        }
        let entries = root.children().iter().map(AclEntry::parse).collect::<Result<Vec<_>>>()?;
        Ok(Self {
            id: id.into(),
            entries,
        })
    }

    pub fn to_xml(&self) -> String {
        self.entries
            .iter()
            .fold(Node::new(ROOT), |root, entry| root.with_child(entry.to_node()))
            .to_xml()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn entries(&self) -> &[AclEntry] {
        &self.entries
    }

    pub fn matches(&self, ctx: &EvaluationContext<'_>) -> MatchResult {
        let identities = identities(ctx);
        if self.entries.iter().any(|entry| entry.applies_to(&identities)) {
            MatchResult::Match
        } else {
            MatchResult::NoMatch
        }
    }

    /// Permit when every requested permission is allowed by some
    /// applicable entry and denied by none; Deny otherwise. NotApplicable
    /// when no entry applies or nothing was requested.
    pub fn eval(&self, ctx: &EvaluationContext<'_>) -> Decision {
        let identities = identities(ctx);
        let requested: Vec<String> = ctx
            .attributes(Category::Action)
            .iter()
            .filter(|attribute| attribute.id() == ACTION_ID)
            .map(|attribute| attribute.value().encode())
            .collect();

        let mut applicable = false;
        let mut allow = BTreeSet::new();
        let mut deny = BTreeSet::new();
        for entry in self.entries.iter().filter(|entry| entry.applies_to(&identities)) {
            applicable = true;
            allow.extend(entry.allow.iter().map(String::as_str));
            deny.extend(entry.deny.iter().map(String::as_str));
        }

        if !applicable || requested.is_empty() {
            return Decision::NotApplicable;
        }
        let permitted = requested
            .iter()
            .all(|permission| {
                allow.contains(permission.as_str()) && !deny.contains(permission.as_str())
            });
        if permitted {
            Decision::Permit
        } else {
            Decision::Deny
        }
    }
}

impl Evaluable for GaclPolicy {
    fn decide(&self, ctx: &EvaluationContext<'_>) -> Decision {
        self.eval(ctx)
    }
}

fn identities<'a>(ctx: &EvaluationContext<'a>) -> Vec<&'a Node> {
    ctx.attributes(Category::Subject)
        .iter()
        .filter_map(|attribute| match attribute.value().value() {
            Value::Element(node) => Some(node),
            _ => None,
        })
        .collect()
}

/// Parses a gacl request: one request item per entry, its credentials as
/// subject elements and its allowed permissions as requested actions.
pub fn parse_gacl_request(document: &str, attributes: &AttributeFactory) -> Result<Request> {
    let root = Node::parse(document)?;
    if root.name() != ROOT {
        return Err(Error::InvalidDocument(format!("expected <{}>, found <{}>", ROOT, root.name())));
    }

    let mut items = Vec::new();
    for node in root.children() {
        let entry = AclEntry::parse(node)?;
        if !entry.deny.is_empty() {
            warn!("deny permissions in a gacl request are ignored");
        }

        let subject = entry
            .credentials
            .iter()
            .map(|credential| {
                RequestAttribute::new(credential.name(), attributes.create_element(credential))
            })
            .collect::<Result<Vec<_>>>()?;
        let actions = entry
            .allow
            .iter()
            .map(|permission| {
                RequestAttribute::new(ACTION_ID, AttributeValue::string(permission.as_str()))
            })
            .collect::<Result<Vec<_>>>()?;

        items.push(
            RequestItem::new()
                .with_group(Category::Subject, subject)
                .with_group(Category::Action, actions),
        );
    }
    Ok(Request::new(items).with_content(root))
}
