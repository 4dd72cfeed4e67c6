use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("An error occurred deserializing policy definition: {0}.")]
    Deserializing(#[source] serde_json::Error),

    #[error("An error occurred serializing policy definition: {0}.")]
    Serializing(#[source] serde_json::Error),

    #[error("An error occurred reading xml document: {0}.")]
    Xml(String),

    #[error("Document is not valid: {0}.")]
    InvalidDocument(String),

    #[error("An error occurred validating policy definition: {0}.")]
    Validation(String),

    #[error("Bad request: {0}.")]
    BadRequest(String),

    #[error("'{value}' is not a valid {data_type} value.")]
    InvalidValue { data_type: String, value: String },

    #[error("Unknown function '{0}'.")]
    UnknownFunction(String),

    #[error("Unknown combining algorithm '{0}'.")]
    UnknownAlgorithm(String),

    #[error("Unknown policy dialect '{0}'.")]
    UnknownDialect(String),

    #[error("Evaluation failed: {0}.")]
    Evaluation(String),

    #[error("Invalid evaluator configuration: {0}.")]
    Configuration(String),
}

impl Error {
    pub(crate) fn invalid_value(data_type: impl Into<String>, value: impl Into<String>) -> Self {
        Error::InvalidValue {
            data_type: data_type.into(),
            value: value.into(),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(error: quick_xml::Error) -> Self {
        Error::Xml(error.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(error.to_string())
    }
}
