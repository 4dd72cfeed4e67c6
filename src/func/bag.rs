use super::{expect_args, single, Bag, Function};
use crate::attr::DataType;
use crate::{AttributeValue, Error, Result};

/// `<type>-one-and-only`: unwraps a bag holding exactly one value.
#[derive(Debug)]
pub struct OneAndOnlyFunction {
    name: String,
    data_type: DataType,
}

impl OneAndOnlyFunction {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

impl Function for OneAndOnlyFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, args: &[Bag], _check_id: bool) -> Result<Bag> {
        expect_args(&self.name, args, 1)?;
        let value = single(&self.name, &args[0])?;
        if value.data_type() != self.data_type {
            return Err(Error::Evaluation(format!(
                "{} got a {} value",
                self.name,
                value.type_name()
            )));
        }
        Ok(vec![value.clone()])
    }
}

/// `<type>-is-in`: the single first argument is a member of the second bag.
#[derive(Debug)]
pub struct IsInFunction {
    name: String,
}

impl IsInFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Function for IsInFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, args: &[Bag], check_id: bool) -> Result<Bag> {
        expect_args(&self.name, args, 2)?;
        let wanted = single(&self.name, &args[0])?;
        let found = args[1].iter().any(|member| member_equals(wanted, member, check_id));
        Ok(vec![AttributeValue::boolean(found)])
    }
}

/// `<type>-at-least-one-member-of`: the two bags intersect.
#[derive(Debug)]
pub struct AtLeastOneMemberOfFunction {
    name: String,
}

impl AtLeastOneMemberOfFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Function for AtLeastOneMemberOfFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, args: &[Bag], check_id: bool) -> Result<Bag> {
        expect_args(&self.name, args, 2)?;
        let found = args[0]
            .iter()
            .any(|left| args[1].iter().any(|right| member_equals(left, right, check_id)));
        Ok(vec![AttributeValue::boolean(found)])
    }
}

fn member_equals(left: &AttributeValue, right: &AttributeValue, check_id: bool) -> bool {
    (!check_id || super::ids_agree(left, right)) && left.equals(right)
}
