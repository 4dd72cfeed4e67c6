use crate::{AlgFactory, AttributeFactory, FnFactory};

/// The three lookup tables of a dialect. Owned by the evaluator and
/// handed by reference to everything that builds policies or requests.
#[derive(Debug, Clone)]
pub struct Registries {
    pub attributes: AttributeFactory,
    pub functions: FnFactory,
    pub algorithms: AlgFactory,
}

impl Registries {
    pub fn compact() -> Self {
        Self {
            attributes: AttributeFactory::compact(),
            functions: FnFactory::compact(),
            algorithms: AlgFactory::compact(),
        }
    }

    pub fn xacml() -> Self {
        Self {
            attributes: AttributeFactory::xacml(),
            functions: FnFactory::xacml(),
            algorithms: AlgFactory::xacml(),
        }
    }

    pub fn gacl() -> Self {
        Self {
            attributes: AttributeFactory::gacl(),
            functions: FnFactory::compact(),
            algorithms: AlgFactory::compact(),
        }
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::compact()
    }
}
