use serde::{Deserialize, Serialize};

use crate::evaluator::{Dialect, Evaluator, EvaluatorMode};
use crate::store::PolicyStore;
use crate::{Error, Registries, Result};

const DEFAULT_COMBINING_ALG: &str = "Deny-Overrides";

/// Serializable evaluator settings.
///
/// ```json
/// {
///     "dialect": "xacml",
///     "mode": "StopsNever",
///     "policyCombiningAlg": "Permit-Overrides",
///     "policies": [{ "document": "<Policy .../>", "source": "/etc/pdp/policy.xml" }]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EvaluatorConfig {
    #[serde(default = "default_dialect")]
    pub dialect: String,
    #[serde(default)]
    pub mode: EvaluatorMode,
    #[serde(default = "default_combining_alg")]
    pub policy_combining_alg: String,
    #[serde(default)]
    pub policies: Vec<PolicySource>,
}

/// A policy document supplied inline, with where it was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicySource {
    pub document: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

fn default_dialect() -> String {
    Dialect::Compact.as_str().into()
}

fn default_combining_alg() -> String {
    DEFAULT_COMBINING_ALG.into()
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            dialect: default_dialect(),
            mode: EvaluatorMode::default(),
            policy_combining_alg: default_combining_alg(),
            policies: Vec::new(),
        }
    }
}

impl EvaluatorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EvaluatorConfig = serde_json::from_str(json).map_err(Error::Deserializing)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the names in the configuration and returns the dialect.
    pub fn validate(&self) -> Result<Dialect> {
        let dialect: Dialect = self
            .dialect
            .parse()
            .map_err(|_| Error::Configuration(format!("unknown dialect '{}'", self.dialect)))?;
        if !dialect.registries().algorithms.contains(&self.policy_combining_alg) {
            return Err(Error::Configuration(format!(
                "unknown policy combining algorithm '{}'",
                self.policy_combining_alg
            )));
        }
        Ok(dialect)
    }
}

/// Builds an `Evaluator`, loading its initial policies.
///
/// ```ignore
/// let evaluator = Evaluator::builder(Dialect::Compact)
///     .with_mode(EvaluatorMode::StopsNever)
///     .with_policy(POLICY, Some("/etc/pdp/policy.json".into()))
///     .build()?;
/// ```
#[derive(Debug)]
pub struct EvaluatorBuilder {
    dialect: Dialect,
    registries: Option<Registries>,
    mode: EvaluatorMode,
    combining_alg: String,
    policies: Vec<PolicySource>,
}

impl EvaluatorBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            registries: None,
            mode: EvaluatorMode::default(),
            combining_alg: DEFAULT_COMBINING_ALG.into(),
            policies: Vec::new(),
        }
    }

    /// Replaces the dialect's default registries, e.g. with extra
    /// functions registered.
    pub fn with_registries(mut self, registries: Registries) -> Self {
        self.registries = Some(registries);
        self
    }

    pub fn with_mode(mut self, mode: EvaluatorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_combining_alg(mut self, name: &str) -> Self {
        self.combining_alg = name.into();
        self
    }

    pub fn with_policy(mut self, document: &str, source: Option<String>) -> Self {
        self.policies.push(PolicySource {
            document: document.into(),
            source,
        });
        self
    }

    pub fn build(self) -> Result<Evaluator> {
        let registries = self.registries.unwrap_or_else(|| self.dialect.registries());
        let combining_alg = registries
            .algorithms
            .create(&self.combining_alg)
            .map_err(|error| Error::Configuration(error.to_string()))?;

        let store = PolicyStore::new(combining_alg);
        let mut evaluator = Evaluator::from_parts(self.dialect, registries, store, self.mode);
        for policy in self.policies {
            evaluator.add_policy(&policy.document, policy.source)?;
        }
        Ok(evaluator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Decision;
    use assert_matches::assert_matches;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config = EvaluatorConfig::from_json("{}").unwrap();

        assert_eq!(EvaluatorConfig::default(), config);
        assert_eq!(EvaluatorMode::FailsOnDeny, config.mode);
        assert_eq!("Deny-Overrides", config.policy_combining_alg);
    }

    #[test]
    fn evaluator_from_config() {
        let config = EvaluatorConfig::from_json(
            r#"{
                "dialect": "gacl",
                "mode": "StopsNever",
                "policyCombiningAlg": "Permit-Overrides",
                "policies": [
                    {
                        "document": "<gacl><entry><any-user/><allow><read/></allow></entry></gacl>",
                        "source": "/etc/pdp/public.gacl"
                    }
                ]
            }"#,
        )
        .unwrap();

        let evaluator = Evaluator::from_config(&config).unwrap();
        let request = evaluator
            .parse_request(
                "<gacl><entry>
                    <person><dn>/O=X/CN=Y</dn></person>
                    <allow><read/></allow>
                </entry></gacl>",
            )
            .unwrap();

        assert_eq!(Dialect::Gacl, evaluator.dialect());
        assert_eq!(EvaluatorMode::StopsNever, evaluator.mode());
        assert_eq!("Permit-Overrides", evaluator.store().combining_alg().name());
        assert_eq!(Some("/etc/pdp/public.gacl"), evaluator.store().policies()[0].source());
        assert_eq!(vec![Decision::Permit], evaluator.decisions(&request));
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        assert_matches!(
            EvaluatorConfig::from_json(r#"{ "dialect": "saml" }"#),
            Err(Error::Configuration(_))
        );
        assert_matches!(
            EvaluatorConfig::from_json(r#"{ "policyCombiningAlg": "Majority" }"#),
            Err(Error::Configuration(_))
        );
        assert_matches!(
            EvaluatorConfig::from_json(r#"{ "policyStore": [] }"#),
            Err(Error::Deserializing(_))
        );
        assert_matches!(
            EvaluatorBuilder::new(Dialect::Xacml).with_combining_alg("Majority").build(),
            Err(Error::Configuration(_))
        );
    }

    #[test]
    fn broken_policy_fails_the_build() {
        assert_matches!(
            Evaluator::builder(Dialect::Xacml).with_policy("<PolicySet/>", None).build(),
            Err(Error::InvalidDocument(_))
        );
    }
}
