//! Error types for the fraud training pipeline
//!
//! Every failure is tagged with the pipeline stage it happened in. The
//! underlying cause (polars, I/O, bincode, a model error) is kept as the
//! error source so the full chain can be reported at the entry point.

use std::fmt;
use thiserror::Error;

/// Boxed error used as the wrapped cause of a stage failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, FraudError>;

/// Pipeline stage a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Load,
    Validation,
    Feature,
    Modelling,
    Persistence,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Validation => "validation",
            Stage::Feature => "feature",
            Stage::Modelling => "modelling",
            Stage::Persistence => "persistence",
        };
        f.write_str(name)
    }
}

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum FraudError {
    #[error("load error: {message}")]
    Load {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("feature error: {message}")]
    Feature {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("modelling error{}: {message}", candidate_label(.candidate))]
    Modelling {
        message: String,
        candidate: Option<String>,
        #[source]
        source: Option<BoxError>,
    },

    #[error("persistence error: {message}")]
    Persistence {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

fn candidate_label(candidate: &Option<String>) -> String {
    match candidate {
        Some(name) => format!(" [{}]", name),
        None => String::new(),
    }
}

impl FraudError {
    pub fn load(message: impl Into<String>) -> Self {
        FraudError::Load { message: message.into(), source: None }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        FraudError::Validation { message: message.into(), source: None }
    }

    pub fn feature(message: impl Into<String>) -> Self {
        FraudError::Feature { message: message.into(), source: None }
    }

    pub fn modelling(message: impl Into<String>) -> Self {
        FraudError::Modelling { message: message.into(), candidate: None, source: None }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        FraudError::Persistence { message: message.into(), source: None }
    }

    /// Attach the underlying cause
    pub fn with_source<E>(mut self, err: E) -> Self
    where
        E: Into<BoxError>,
    {
        let boxed = Some(err.into());
        match &mut self {
            FraudError::Load { source, .. }
            | FraudError::Validation { source, .. }
            | FraudError::Feature { source, .. }
            | FraudError::Modelling { source, .. }
            | FraudError::Persistence { source, .. } => *source = boxed,
        }
        self
    }

    /// Attach the roster candidate that failed (modelling errors only)
    pub fn for_candidate(mut self, name: impl Into<String>) -> Self {
        if let FraudError::Modelling { candidate, .. } = &mut self {
            *candidate = Some(name.into());
        }
        self
    }

    /// Stage the failure belongs to
    pub fn stage(&self) -> Stage {
        match self {
            FraudError::Load { .. } => Stage::Load,
            FraudError::Validation { .. } => Stage::Validation,
            FraudError::Feature { .. } => Stage::Feature,
            FraudError::Modelling { .. } => Stage::Modelling,
            FraudError::Persistence { .. } => Stage::Persistence,
        }
    }

    /// Candidate name for modelling failures
    pub fn candidate(&self) -> Option<&str> {
        match self {
            FraudError::Modelling { candidate, .. } => candidate.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = FraudError::feature("column 'amount' not found");
        assert_eq!(err.to_string(), "feature error: column 'amount' not found");
        assert_eq!(err.stage(), Stage::Feature);
    }

    #[test]
    fn test_modelling_error_names_candidate() {
        let err = FraudError::modelling("fit failed").for_candidate("Decision Tree Classifier");
        assert_eq!(err.to_string(), "modelling error [Decision Tree Classifier]: fit failed");
        assert_eq!(err.candidate(), Some("Decision Tree Classifier"));
    }

    #[test]
    fn test_source_is_preserved() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = FraudError::load("cannot open data.csv").with_source(io_err);
        let source = err.source().expect("source should be attached");
        assert_eq!(source.to_string(), "file not found");
    }

    #[test]
    fn test_for_candidate_ignored_outside_modelling() {
        let err = FraudError::persistence("unwritable").for_candidate("x");
        assert_eq!(err.candidate(), None);
        assert_eq!(err.stage().to_string(), "persistence");
    }
}
