//! Boolean guards of rules.
//!
//! An expression tree is stored flat: every node lives in one vector and
//! refers to its arguments by `ExprId`. Trees are built once when the
//! policy is loaded and only read afterwards.

use std::sync::Arc;

use crate::func::{Bag, Function};
use crate::matcher::{Designator, Selector};
use crate::request::EvaluationContext;
use crate::{AttributeValue, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(usize);

#[derive(Debug, Clone)]
pub enum Expression {
    Value(AttributeValue),
    Designator(Designator),
    Selector(Selector),
    Apply {
        function: Arc<dyn Function>,
        args: Vec<ExprId>,
    },
}

#[derive(Debug, Clone)]
pub struct Condition {
    nodes: Vec<Expression>,
    root: ExprId,
}

impl Condition {
    pub fn builder() -> ConditionBuilder {
        ConditionBuilder::default()
    }

    pub fn root(&self) -> ExprId {
        self.root
    }

    pub fn node(&self, id: ExprId) -> &Expression {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Evaluates the tree for the tuple in `ctx`. The result must be a
    /// single boolean value.
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<AttributeValue> {
        let mut bag = self.resolve(self.root, ctx)?;
        match (bag.pop(), bag.is_empty()) {
            (Some(value), true) if value.as_bool().is_some() => Ok(value),
            _ => Err(Error::Evaluation("condition did not produce a single boolean".into())),
        }
    }

    /// Convenience over `evaluate`: errors count as not satisfied.
    pub fn is_satisfied(&self, ctx: &EvaluationContext<'_>) -> bool {
        matches!(self.evaluate(ctx).map(|value| value.as_bool()), Ok(Some(true)))
    }

    fn resolve(&self, id: ExprId, ctx: &EvaluationContext<'_>) -> Result<Bag> {
        match self.node(id) {
            Expression::Value(value) => Ok(vec![value.clone()]),
            Expression::Designator(designator) => designator.resolve(ctx),
            Expression::Selector(selector) => selector.resolve(ctx),
            Expression::Apply { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.resolve(*arg, ctx))
                    .collect::<Result<Vec<_>>>()?;
                function.evaluate(&args, false)
            }
        }
    }
}

/// Appends nodes bottom-up; arguments must be added before the
/// application using them.
#[derive(Debug, Default)]
pub struct ConditionBuilder {
    nodes: Vec<Expression>,
}

impl ConditionBuilder {
    pub fn push(&mut self, expression: Expression) -> ExprId {
        self.nodes.push(expression);
        ExprId(self.nodes.len() - 1)
    }

    pub fn value(&mut self, value: AttributeValue) -> ExprId {
        self.push(Expression::Value(value))
    }

    pub fn designator(&mut self, designator: Designator) -> ExprId {
        self.push(Expression::Designator(designator))
    }

    pub fn selector(&mut self, selector: Selector) -> ExprId {
        self.push(Expression::Selector(selector))
    }

    pub fn apply(&mut self, function: Arc<dyn Function>, args: Vec<ExprId>) -> ExprId {
        self.push(Expression::Apply { function, args })
    }

    /// Fails unless every application refers only to nodes added before
    /// it, which also rules out ids taken from another builder.
    pub fn build(self, root: ExprId) -> Result<Condition> {
        if root.0 >= self.nodes.len() {
            return Err(Error::InvalidDocument(
                "condition root is not part of the expression".into(),
            ));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            if let Expression::Apply { function, args } = node {
                if args.iter().any(|arg| arg.0 >= index) {
                    return Err(Error::InvalidDocument(format!(
                        "'{}' refers to an expression that is not one of its arguments",
                        function.name()
                    )));
                }
            }
        }
        Ok(Condition {
            nodes: self.nodes,
            root,
        })
    }
}
