#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cognitive_complexity,
    clippy::large_enum_variant,
    clippy::similar_names,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::match_same_arms,
    clippy::must_use_candidate,
    clippy::missing_errors_doc
)]
//! A policy decision point.
//!
//! Requests are split into (subject, resource, action, environment)
//! tuples, each tuple is matched against the targets of the loaded
//! policies and the decisions of the applicable ones are combined. Three
//! document dialects share the engine: compact json policies, XACML 2.0
//! and GACL access control lists.

mod alg;
mod attr;
mod condition;
mod config;
mod errors;
mod evaluator;
mod func;
mod gacl;
mod matcher;
mod policy;
mod registry;
mod request;
mod store;
mod validator;
mod xacml;
mod xml;

pub use alg::{
    AlgFactory, CombiningAlgorithm, Decision, Evaluable, FirstApplicable, OnlyOneApplicable,
    OrderedAlgorithm,
};
pub use attr::{AttributeFactory, AttributeValue, DataType, Period, Value, X500Name};
pub use condition::{Condition, ConditionBuilder, ExprId, Expression};
pub use config::{EvaluatorBuilder, EvaluatorConfig, PolicySource};
pub use errors::{Error, Result};
pub use evaluator::{
    Dialect, Evaluator, EvaluatorMode, PermitRecord, Response, ResponseItem, LOCAL_IDENTITY,
};
pub use func::{Bag, FnFactory, Function, Operator};
pub use gacl::{parse_gacl_request, AclEntry, GaclPolicy};
pub use matcher::{
    Designator, IdMatch, Match, MatchGroup, MatchResult, MatchStrategy, Operand, Section, Selector,
    Target,
};
pub use policy::{
    to_json, AttributeAssignment, Effect, Evaluation, Obligation, Policy, PolicyBuilder, Rule,
};
pub use registry::Registries;
pub use request::{
    parse_compact_request, AttributeGroup, Category, EvaluationContext, Request, RequestAttribute,
    RequestItem, RequestTuple,
};
pub use store::{PolicyDocument, PolicyElement, PolicyStore};
pub use validator::{DefaultValidator, Field, PolicyValidator};
pub use xacml::{parse_xacml_policy, parse_xacml_request, xacml_policy_to_xml, ACCESS_SUBJECT};
pub use xml::Node;
