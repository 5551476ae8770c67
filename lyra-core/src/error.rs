//! Error taxonomy for the reconciliation engine

use std::fmt;

use thiserror::Error;

use crate::kind::Kind;
use crate::service::ServiceError;

/// A single validation failure inside a template
///
/// Validation never short-circuits; defects are collected and returned as one
/// aggregate so a template with N problems reports all N.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDefect {
    pub kind: Option<Kind>,
    pub meta_name: Option<String>,
    pub field: String,
    pub message: String,
}

impl ValidationDefect {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: None,
            meta_name: None,
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn for_resource(mut self, kind: Kind, meta_name: impl Into<String>) -> Self {
        self.kind = Some(kind);
        self.meta_name = Some(meta_name.into());
        self
    }
}

impl fmt::Display for ValidationDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.meta_name) {
            (Some(kind), Some(meta)) => {
                write!(f, "{}/{}: {}: {}", kind, meta, self.field, self.message)
            }
            _ => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

fn join_defects(defects: &[ValidationDefect]) -> String {
    defects
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Engine error
#[derive(Debug, Error)]
pub enum Error {
    #[error("template validation failed: {}", join_defects(.0))]
    Validation(Vec<ValidationDefect>),

    #[error("reference to missing {kind} \"{meta_name}\"")]
    RefMissing { kind: Kind, meta_name: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("remote service failure: {0}")]
    Remote(#[from] ServiceError),

    /// Rollback ran after the wrapped root cause; its own failures are
    /// carried as diagnostics and never mask the root cause.
    #[error("{root} (rollback diagnostics: {})", diagnostics.join("; "))]
    Rollback {
        root: Box<Error>,
        diagnostics: Vec<String>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// The root cause, unwrapping any rollback decoration
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Rollback { root, .. } => root.root_cause(),
            other => other,
        }
    }

    /// Wrap this error with rollback diagnostics, if any were collected
    pub fn with_rollback_diagnostics(self, diagnostics: Vec<String>) -> Error {
        if diagnostics.is_empty() {
            self
        } else {
            Error::Rollback {
                root: Box::new(self),
                diagnostics,
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
