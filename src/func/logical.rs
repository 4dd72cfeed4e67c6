use super::{single, Bag, Function};
use crate::{AttributeValue, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connective {
    And,
    Or,
    Not,
}

/// `and`, `or` and `not` over boolean arguments.
///
/// `and`/`or` stop at the first argument deciding the result, so later
/// arguments may be non-boolean without failing the evaluation.
#[derive(Debug)]
pub struct LogicalFunction {
    name: String,
    connective: Connective,
}

impl LogicalFunction {
    pub fn and(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connective: Connective::And,
        }
    }

    pub fn or(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connective: Connective::Or,
        }
    }

    pub fn not(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connective: Connective::Not,
        }
    }

    fn boolean(&self, bag: &[AttributeValue]) -> Result<bool> {
        single(&self.name, bag)?
            .as_bool()
            .ok_or_else(|| Error::Evaluation(format!("{} expects boolean arguments", self.name)))
    }
}

impl Function for LogicalFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, args: &[Bag], _check_id: bool) -> Result<Bag> {
        let result = match self.connective {
            Connective::And => {
                let mut result = true;
                for arg in args {
                    if !self.boolean(arg)? {
                        result = false;
                        break;
                    }
                }
                result
            }
            Connective::Or => {
                let mut result = false;
                for arg in args {
                    if self.boolean(arg)? {
                        result = true;
                        break;
                    }
                }
                result
            }
            Connective::Not => match args {
                [arg] => !self.boolean(arg)?,
                _ => {
                    return Err(Error::Evaluation(format!(
                        "{} expects exactly one argument",
                        self.name
                    )))
                }
            },
        };
        Ok(vec![AttributeValue::boolean(result)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bool_bag(value: bool) -> Bag {
        vec![AttributeValue::boolean(value)]
    }

    #[test]
    fn connectives() {
        let and = LogicalFunction::and("and");
        let or = LogicalFunction::or("or");
        let not = LogicalFunction::not("not");

        let mixed = [bool_bag(true), bool_bag(false)];
        assert_eq!(bool_bag(false), and.evaluate(&mixed, false).unwrap());
        assert_eq!(bool_bag(true), and.evaluate(&[], false).unwrap());
        assert_eq!(bool_bag(true), or.evaluate(&[bool_bag(false), bool_bag(true)], false).unwrap());
        assert_eq!(bool_bag(false), or.evaluate(&[], false).unwrap());
        assert_eq!(bool_bag(false), not.evaluate(&[bool_bag(true)], false).unwrap());
    }

    #[test]
    fn short_circuit_skips_later_arguments() {
        let and = LogicalFunction::and("and");
        let text = vec![AttributeValue::string("not a boolean")];

        assert_eq!(bool_bag(false), and.evaluate(&[bool_bag(false), text.clone()], false).unwrap());
        assert!(and.evaluate(&[bool_bag(true), text], false).is_err());
    }

    #[test]
    fn not_needs_one_argument() {
        let not = LogicalFunction::not("not");
        assert!(not.evaluate(&[bool_bag(true), bool_bag(true)], false).is_err());
    }
}
