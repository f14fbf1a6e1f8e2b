//! Error handling for the record flow engine
//!
//! This module defines the crate-wide error type and a Result alias. Each
//! variant belongs to one category of the runtime error taxonomy, and
//! [`FlowError::status`] maps it onto the terminal status a component reports.

use crate::graph::error::GraphError;
use crate::graph::status::NodeStatus;
use thiserror::Error;

/// Main error type for record flow operations
#[derive(Error, Debug)]
pub enum FlowError {
    /// Bad schema, key, or component attribute. Raised at init time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A value does not fit the declared type of its field
    #[error("Type mismatch on field '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// A buffer is too small for the record being (de)serialized
    #[error("Buffer overflow: {needed} bytes needed, {available} available")]
    BufferOverflow { needed: usize, available: usize },

    /// Input data that could not be decoded into a record
    #[error("Malformed record {location}: {message}")]
    Malformed { location: String, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error tied to one source or target of a multi-file window
    #[error("An error occurred while accessing '{name}': {source}")]
    Source {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Write to a port whose consumer is gone
    #[error("Port closed: {0}")]
    PortClosed(String),

    /// Records arrived out of the required key order
    #[error("Ordering violation: {0}")]
    OrderingViolation(String),

    /// The graph was asked to stop
    #[error("Aborted")]
    Aborted,

    /// Graph construction errors
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Failure inside an injected transformation function
    #[error("Transformation error: {0}")]
    Transform(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<FlowError>,
    },
}

impl FlowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        FlowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a malformed-record error
    pub fn malformed(location: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::Malformed {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a source error carrying the identity of the failing source
    pub fn source(name: impl Into<String>, source: std::io::Error) -> Self {
        FlowError::Source {
            name: name.into(),
            source,
        }
    }

    /// Wrap an error returned by user transformation code
    pub fn from_transform(err: anyhow::Error) -> Self {
        FlowError::Transform(format!("{:#}", err))
    }

    /// The innermost error, with all context layers removed
    pub fn root(&self) -> &FlowError {
        match self {
            FlowError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self.root(), FlowError::Malformed { .. })
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.root(), FlowError::Aborted)
    }

    /// Terminal status a component reports when it fails with this error.
    pub fn status(&self) -> NodeStatus {
        match self.root() {
            FlowError::Aborted => NodeStatus::Aborted,
            FlowError::TypeMismatch { .. }
            | FlowError::BufferOverflow { .. }
            | FlowError::Malformed { .. } => NodeStatus::FatalError,
            _ => NodeStatus::Error,
        }
    }

    /// Whether this failure should stop the rest of the graph.
    ///
    /// Ordering violations are reported but leave other components running.
    pub fn aborts_graph(&self) -> bool {
        !matches!(
            self.root(),
            FlowError::OrderingViolation(_) | FlowError::Aborted
        )
    }
}

/// Result type alias for record flow operations
pub type Result<T> = std::result::Result<T, FlowError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for anyhow::Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| FlowError::from_transform(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| FlowError::from_transform(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FlowError::Configuration("Field 'id' not found".to_string());
        assert_eq!(err.to_string(), "Configuration error: Field 'id' not found");
    }

    #[test]
    fn test_error_with_context() {
        let err = FlowError::PortClosed("out 0".to_string());
        let with_ctx = err.with_context("Writer failed");
        assert!(with_ctx.to_string().contains("Writer failed"));
        assert!(matches!(with_ctx.root(), FlowError::PortClosed(_)));
    }

    #[test]
    fn test_source_error_names_source() {
        let err = FlowError::source(
            "data/part-02.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("data/part-02.csv"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(FlowError::Aborted.status(), NodeStatus::Aborted);
        assert_eq!(
            FlowError::BufferOverflow {
                needed: 10,
                available: 2
            }
            .status(),
            NodeStatus::FatalError
        );
        assert_eq!(
            FlowError::malformed("row 3", "bad int").with_context("reader").status(),
            NodeStatus::FatalError
        );
        assert_eq!(
            FlowError::Configuration("x".into()).status(),
            NodeStatus::Error
        );
    }

    #[test]
    fn test_ordering_violation_does_not_abort_graph() {
        assert!(!FlowError::OrderingViolation("row 4".into()).aborts_graph());
        assert!(FlowError::Configuration("x".into()).aborts_graph());
        assert!(!FlowError::Aborted.aborts_graph());
    }

    #[test]
    fn test_anyhow_context() {
        let res: anyhow::Result<()> = Err(anyhow::anyhow!("division by zero"));
        let err = res.context("reformat").unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }
}
