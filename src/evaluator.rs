use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{EvaluatorBuilder, EvaluatorConfig};
use crate::gacl::{parse_gacl_request, GaclPolicy};
use crate::policy::{Evaluation, Obligation, PolicyBuilder};
use crate::request::{parse_compact_request, EvaluationContext, Request, RequestTuple};
use crate::store::{PolicyDocument, PolicyStore};
use crate::xacml::{parse_xacml_policy, parse_xacml_request};
use crate::{Decision, Error, Registries, Result};

/// Obligation attribute naming the local account of a permitted caller.
pub const LOCAL_IDENTITY: &str = "local-identity";

/// Document vocabulary of requests and policies.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Json documents, target matches by attribute id.
    Compact,
    Xacml,
    Gacl,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Compact => "compact",
            Dialect::Xacml => "xacml",
            Dialect::Gacl => "gacl",
        }
    }

    /// Default lookup tables of the dialect.
    pub fn registries(self) -> Registries {
        match self {
            Dialect::Compact => Registries::compact(),
            Dialect::Xacml => Registries::xacml(),
            Dialect::Gacl => Registries::gacl(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "compact" | "json" => Ok(Dialect::Compact),
            "xacml" => Ok(Dialect::Xacml),
            "gacl" => Ok(Dialect::Gacl),
            _ => Err(Error::UnknownDialect(value.to_string())),
        }
    }
}

/// How the decisions of the applicable policies of one tuple turn into
/// recorded permits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvaluatorMode {
    /// The first Deny drops the tuple from the response.
    FailsOnDeny,
    /// Stops at the first Deny, keeping the permits seen before it.
    StopsOnDeny,
    /// Stops at the first Permit.
    StopsOnPermit,
    /// Records every Permit.
    StopsNever,
}

impl Default for EvaluatorMode {
    fn default() -> Self {
        EvaluatorMode::FailsOnDeny
    }
}

/// A policy that permitted a tuple, with the obligations it returned.
#[derive(Debug, Clone)]
pub struct PermitRecord {
    pub policy: Arc<PolicyDocument>,
    pub obligations: Vec<Obligation>,
}

impl PermitRecord {
    pub fn policy_id(&self) -> &str {
        self.policy.id()
    }
}

#[derive(Debug, Clone)]
pub struct ResponseItem {
    pub tuple: RequestTuple,
    /// Decision of the store's combining algorithm for the tuple.
    pub decision: Decision,
    pub permitting: Vec<PermitRecord>,
}

impl ResponseItem {
    /// First `local-identity` assignment among the permitting obligations.
    pub fn local_identity(&self) -> Option<String> {
        self.permitting
            .iter()
            .flat_map(|record| record.obligations.iter())
            .find_map(|obligation| obligation.assignment(LOCAL_IDENTITY))
            .map(|value| value.encode())
    }
}

/// Permitted tuples of one request.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub items: Vec<ResponseItem>,
}

impl Response {
    pub fn items(&self) -> &[ResponseItem] {
        &self.items
    }

    /// A request is permitted when at least one tuple is.
    pub fn is_permitted(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Parses requests and policies of one dialect and decides requests
/// against the loaded policies.
///
/// Evaluation only reads the evaluator, so a shared evaluator may serve
/// concurrent requests. Loading and removing policies needs `&mut self`.
#[derive(Debug, Clone)]
pub struct Evaluator {
    dialect: Dialect,
    registries: Registries,
    store: PolicyStore,
    mode: EvaluatorMode,
}

impl Evaluator {
    pub(crate) fn from_parts(
        dialect: Dialect,
        registries: Registries,
        store: PolicyStore,
        mode: EvaluatorMode,
    ) -> Self {
        Self {
            dialect,
            registries,
            store,
            mode,
        }
    }

    /// Evaluator with the dialect's registries, Deny-Overrides between
    /// policies and `FailsOnDeny`.
    pub fn new(dialect: Dialect) -> Result<Self> {
        EvaluatorBuilder::new(dialect).build()
    }

    pub fn builder(dialect: Dialect) -> EvaluatorBuilder {
        EvaluatorBuilder::new(dialect)
    }

    pub fn from_config(config: &EvaluatorConfig) -> Result<Self> {
        let dialect = config.validate()?;
        config
            .policies
            .iter()
            .fold(
                EvaluatorBuilder::new(dialect)
                    .with_mode(config.mode)
                    .with_combining_alg(&config.policy_combining_alg),
                |builder, policy| builder.with_policy(&policy.document, policy.source.clone()),
            )
            .build()
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn store(&self) -> &PolicyStore {
        &self.store
    }

    pub fn mode(&self) -> EvaluatorMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: EvaluatorMode) {
        self.mode = mode;
    }

    /// Replaces the algorithm combining decisions across policies.
    pub fn set_combining_alg(&mut self, name: &str) -> Result<()> {
        let algorithm = self.registries.algorithms.create(name)?;
        self.store.set_combining_alg(algorithm);
        Ok(())
    }

    /// Parses a policy document of the evaluator's dialect.
    pub fn parse_policy(&self, document: &str, source: Option<&str>) -> Result<PolicyDocument> {
        let policy = match self.dialect {
            Dialect::Compact => PolicyBuilder::from_json(document)
                .with_registries(&self.registries)
                .build()?
                .into(),
            Dialect::Xacml => parse_xacml_policy(document, &self.registries)?.into(),
            Dialect::Gacl => {
                let id = source
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("gacl-{}", self.store.len()));
                GaclPolicy::from_xml(id, document)?.into()
            }
        };
        Ok(policy)
    }

    /// Parses and loads a policy document. `source` names where it came
    /// from, a path or url, and is kept with the policy.
    pub fn add_policy(&mut self, document: &str, source: Option<String>) -> Result<()> {
        let policy = self.parse_policy(document, source.as_deref())?;
        self.store.add_policy(policy, source);
        Ok(())
    }

    pub fn remove_policies(&mut self) {
        self.store.remove_policies();
    }

    pub fn parse_request(&self, document: &str) -> Result<Request> {
        let attributes = &self.registries.attributes;
        match self.dialect {
            Dialect::Compact => parse_compact_request(document, attributes),
            Dialect::Xacml => parse_xacml_request(document, attributes),
            Dialect::Gacl => parse_gacl_request(document, attributes),
        }
    }

    /// Parses `document` and evaluates it against the loaded policies.
    pub fn evaluate(&self, document: &str) -> Result<Response> {
        let request = self.parse_request(document)?;
        Ok(self.evaluate_request(&request))
    }

    pub fn evaluate_request(&self, request: &Request) -> Response {
        evaluate_in(&self.store, self.mode, request)
    }

    /// Evaluates `document` against `policy` alone. The loaded policies
    /// are neither used nor changed.
    pub fn evaluate_with(&self, document: &str, policy: &str) -> Result<Response> {
        let request = self.parse_request(document)?;
        let mut store = self.store.clone();
        store.remove_policies();
        store.add_policy(self.parse_policy(policy, None)?, None);
        Ok(evaluate_in(&store, self.mode, &request))
    }

    /// Combined decision of every tuple of `request`, permitted or not.
    pub fn decisions(&self, request: &Request) -> Vec<Decision> {
        request
            .tuples()
            .iter()
            .map(|tuple| {
                let ctx = EvaluationContext::new(tuple).with_content(request.content());
                self.store.decide(&ctx)
            })
            .collect()
    }
}

fn evaluate_in(store: &PolicyStore, mode: EvaluatorMode, request: &Request) -> Response {
    let tuples = request.tuples();
    let items: Vec<ResponseItem> = tuples
        .into_iter()
        .filter_map(|tuple| evaluate_tuple(store, mode, request, tuple))
        .collect();
    info!(permitted = items.len(), policies = store.len(), ?mode, "request evaluated");
    Response { items }
}

fn evaluate_tuple(
    store: &PolicyStore,
    mode: EvaluatorMode,
    request: &Request,
    tuple: RequestTuple,
) -> Option<ResponseItem> {
    let ctx = EvaluationContext::new(&tuple).with_content(request.content());

    let evaluations: Vec<(Arc<PolicyDocument>, Evaluation)> = store
        .find_applicable(&ctx)
        .into_iter()
        .map(|element| (element.policy_ref(), element.policy().evaluate(&ctx)))
        .collect();
    let decision = store
        .combining_alg()
        .combine_decisions(&mut evaluations.iter().map(|(_, evaluation)| evaluation.decision));

    let mut permitting = Vec::new();
    for (policy, evaluation) in evaluations {
        debug!(policy = policy.id(), decision = %evaluation.decision, "policy decided");
        match (evaluation.decision, mode) {
            (Decision::Deny, EvaluatorMode::FailsOnDeny) => {
                warn!(policy = policy.id(), "tuple denied, dropped from response");
                return None;
            }
            (Decision::Deny, EvaluatorMode::StopsOnDeny) => break,
            (Decision::Permit, _) => {
                permitting.push(PermitRecord {
                    policy,
                    obligations: evaluation.obligations,
                });
                if mode == EvaluatorMode::StopsOnPermit {
                    break;
                }
            }
            _ => {}
        }
    }

    debug!(%decision, permits = permitting.len(), "tuple decided");
    if permitting.is_empty() {
        None
    } else {
        Some(ResponseItem {
            tuple,
            decision,
            permitting,
        })
    }
}
