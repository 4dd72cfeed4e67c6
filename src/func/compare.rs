use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use regex::Regex;

use super::{expect_args, ids_agree, single, Bag, Function};
use crate::attr::{DataType, Value};
use crate::{AttributeValue, Error, Result};

/// `<type>-equal`.
#[derive(Debug)]
pub struct EqualFunction {
    name: String,
    data_type: DataType,
    unordered_names: bool,
}

impl EqualFunction {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            unordered_names: false,
        }
    }

    /// X.500 names compare without regard to the order of their components.
    pub fn unordered_names(mut self) -> Self {
        self.unordered_names = true;
        self
    }

    fn compare(&self, policy: &AttributeValue, request: &AttributeValue) -> bool {
        if !accepts(self.data_type, policy) || !accepts(self.data_type, request) {
            return false;
        }
        match (policy.value(), request.value()) {
            (Value::X500Name(left), Value::X500Name(right)) if self.unordered_names => {
                left.eq_unordered(right)
            }
            _ => policy.equals(request),
        }
    }
}

impl Function for EqualFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, args: &[Bag], check_id: bool) -> Result<Bag> {
        expect_args(&self.name, args, 2)?;
        let policy = single(&self.name, &args[0])?;
        let request = single(&self.name, &args[1])?;
        Ok(vec![AttributeValue::boolean(self.matches(policy, request, check_id)?)])
    }

    fn matches(
        &self,
        policy: &AttributeValue,
        request: &AttributeValue,
        check_id: bool,
    ) -> Result<bool> {
        Ok((!check_id || ids_agree(policy, request)) && self.compare(policy, request))
    }
}

/// `<type>-match`: regular expressions for strings and generic values,
/// hierarchical prefixes for X.500 names and URIs.
///
/// Patterns are compiled on first use and kept for the life of the
/// function.
#[derive(Debug)]
pub struct MatchFunction {
    name: String,
    data_type: DataType,
    patterns: RwLock<HashMap<String, Regex>>,
}

impl MatchFunction {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            patterns: RwLock::new(HashMap::new()),
        }
    }

    fn compare(&self, policy: &AttributeValue, request: &AttributeValue) -> Result<bool> {
        match (policy.value(), request.value()) {
            (Value::X500Name(prefix), Value::X500Name(name)) => Ok(prefix.is_prefix_of(name)),
            (Value::AnyUri(prefix), Value::AnyUri(uri)) => Ok(uri_has_prefix(uri, prefix)),
            (Value::String(pattern), Value::String(input)) => self.regex_match(pattern, input),
            // regexp-match functions take a string pattern for any other type.
            (Value::String(pattern), _) if self.data_type != DataType::String => {
                self.regex_match(pattern, &request.encode())
            }
            (Value::Generic { raw: pattern, .. }, _) if self.data_type == DataType::Generic => {
                self.regex_match(pattern, &request.encode())
            }
            _ => Ok(false),
        }
    }

    fn regex_match(&self, pattern: &str, input: &str) -> Result<bool> {
        let patterns = self.patterns.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(regex) = patterns.get(pattern) {
            return Ok(regex.is_match(input));
        }
        drop(patterns);

        let regex = Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| Error::Evaluation(format!("invalid pattern '{}': {}", pattern, e)))?;
        let matched = regex.is_match(input);
        self.patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern.to_string(), regex);
        Ok(matched)
    }

    #[cfg(test)]
    fn compiled(&self) -> usize {
        self.patterns.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Function for MatchFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, args: &[Bag], check_id: bool) -> Result<Bag> {
        expect_args(&self.name, args, 2)?;
        let policy = single(&self.name, &args[0])?;
        let request = single(&self.name, &args[1])?;
        Ok(vec![AttributeValue::boolean(self.matches(policy, request, check_id)?)])
    }

    fn matches(
        &self,
        policy: &AttributeValue,
        request: &AttributeValue,
        check_id: bool,
    ) -> Result<bool> {
        if check_id && !ids_agree(policy, request) {
            return Ok(false);
        }
        self.compare(policy, request)
    }
}

/// `<type>-in-range`: the policy side is a period, the request side a
/// date-time or a period lying completely inside it.
#[derive(Debug)]
pub struct InRangeFunction {
    name: String,
}

impl InRangeFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Function for InRangeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, args: &[Bag], check_id: bool) -> Result<Bag> {
        expect_args(&self.name, args, 2)?;
        let policy = single(&self.name, &args[0])?;
        let request = single(&self.name, &args[1])?;
        Ok(vec![AttributeValue::boolean(self.matches(policy, request, check_id)?)])
    }

    fn matches(
        &self,
        policy: &AttributeValue,
        request: &AttributeValue,
        check_id: bool,
    ) -> Result<bool> {
        if check_id && !ids_agree(policy, request) {
            return Ok(false);
        }
        match (policy.value(), request.value()) {
            (Value::Period(range), Value::DateTime(instant)) => Ok(range.contains(instant)),
            (Value::Period(range), Value::Period(inner)) => Ok(range.encloses(inner)),
            _ => Ok(false),
        }
    }
}

fn accepts(data_type: DataType, value: &AttributeValue) -> bool {
    value.data_type() == data_type
}

fn uri_has_prefix(uri: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match uri.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(&['/', '?', '#'][..]),
        None => false,
    }
}
