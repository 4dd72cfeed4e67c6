use crate::errors::Result;

/// Hook called for every identifier and literal while a compact policy
/// is built. Returning an error aborts the build.
pub trait PolicyValidator {
    fn validate(&self, field: Field, value: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    PolicyId,
    RuleId,
    AttributeId,
    AttributeValue,
    Description,
}

/// Rejects empty policy and rule ids, accepts everything else.
#[derive(Debug, Default)]
pub struct DefaultValidator;

impl PolicyValidator for DefaultValidator {
    fn validate(&self, field: Field, value: &str) -> Result<()> {
        match field {
            Field::PolicyId | Field::RuleId | Field::AttributeId if value.trim().is_empty() => Err(
                crate::Error::Validation(format!("{:?} must not be empty", field)),
            ),
            _ => Ok(()),
        }
    }
}
