//! Error types for the binding evaluator

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Evaluation errors
///
/// Every variant except [`Error::Expander`] carries the full expression, and all
/// graph-walk variants name the path segment that failed (for example
/// `user.addresses['home']`).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed expression syntax, rejected before any graph access.
    #[error("Parse error in `{expression}` at offset {offset}: {message}")]
    Parse {
        expression: String,
        offset: usize,
        message: &'static str,
    },

    /// The named member does not exist on the type at all.
    #[error("Missing property `{member}` on type `{type_name}` at `{segment}` in `{expression}`")]
    MissingProperty {
        expression: String,
        segment: String,
        type_name: String,
        member: String,
    },

    /// A submitted string could not be converted to the target type.
    #[error("Conversion failed at `{segment}` in `{expression}`: {message}")]
    Conversion {
        expression: String,
        segment: String,
        message: String,
    },

    /// A structural or configuration defect (missing attribute, no converter,
    /// no construction path, read-only member).
    #[error("Converter state error at `{segment}` in `{expression}`: {message}")]
    ConverterState {
        expression: String,
        segment: String,
        message: String,
    },

    /// A `${...}` placeholder failed to evaluate.
    #[error("Failed to expand `${{{placeholder}}}`: {source}")]
    Expander {
        placeholder: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// True for per-field, user-input conversion failures that a binder should
    /// report as validation messages.
    pub fn is_conversion(&self) -> bool {
        matches!(self, Error::Conversion { .. })
    }

    /// True for development-time defects that should abort the request.
    pub fn is_converter_state(&self) -> bool {
        matches!(self, Error::ConverterState { .. })
    }

    pub fn is_missing_property(&self) -> bool {
        matches!(self, Error::MissingProperty { .. })
    }

    /// The expression this error was raised for, if any.
    pub fn expression(&self) -> Option<&str> {
        match self {
            Error::Parse { expression, .. }
            | Error::MissingProperty { expression, .. }
            | Error::Conversion { expression, .. }
            | Error::ConverterState { expression, .. } => Some(expression),
            Error::Expander { .. } => None,
        }
    }
}

/// Failure reported by a [`Converter`](crate::convert::Converter).
///
/// Converters don't know where in the graph they are applied; the evaluator
/// attaches the expression and segment when turning this into an [`Error`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// The value is not valid for the target type.
    #[error("{0}")]
    Invalid(String),

    /// The converter cannot operate in the current configuration.
    #[error("{0}")]
    State(String),
}

impl ConvertError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ConvertError::Invalid(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        ConvertError::State(message.into())
    }

    pub(crate) fn locate(self, expression: &str, segment: String) -> Error {
        match self {
            ConvertError::Invalid(message) => Error::Conversion {
                expression: expression.to_string(),
                segment,
                message,
            },
            ConvertError::State(message) => Error::ConverterState {
                expression: expression.to_string(),
                segment,
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expander_display_names_placeholder() {
        let err = Error::Expander {
            placeholder: "user.name".into(),
            source: Box::new(Error::Parse {
                expression: "user.".into(),
                offset: 5,
                message: "empty segment",
            }),
        };
        assert!(err.to_string().starts_with("Failed to expand `${user.name}`"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn locate_maps_kinds() {
        let err = ConvertError::invalid("bad").locate("a.b", "a.b".into());
        assert!(err.is_conversion());
        let err = ConvertError::state("no converter").locate("a.b", "a".into());
        assert!(err.is_converter_state());
        assert_eq!(err.expression(), Some("a.b"));
    }
}
