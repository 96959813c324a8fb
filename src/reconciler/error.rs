//! Error types raised by resource kinds and the reconciler.

use thiserror::Error;

use crate::api::ApiError;
use crate::identifier::IdentifierError;
use crate::qualified_name::QualifiedNameError;
use crate::wait::WaitError;

/// Errors raised by a [`super::ResourceApi`] implementation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ResourceError {
    /// The control plane rejected or failed the call.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// An identifier could not be parsed or built.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    /// A qualified name could not be parsed.
    #[error(transparent)]
    QualifiedName(#[from] QualifiedNameError),
    /// A required field is absent from the [`ResourceSpec`](crate::resource::ResourceSpec).
    #[error("missing required field {field}")]
    MissingField {
        /// Field name.
        field: String,
    },
    /// A field holds a value the kind cannot use.
    #[error("invalid field {field}: {message}")]
    InvalidField {
        /// Field name.
        field: String,
        /// Reason for rejection.
        message: String,
    },
}

impl ResourceError {
    pub(crate) fn missing(field: &str) -> Self {
        Self::MissingField {
            field: field.to_owned(),
        }
    }

    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_owned(),
            message: message.into(),
        }
    }
}

/// Errors returned by [`super::Reconciler`] operations. Each variant names
/// the phase it happened in.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ReconcileError {
    /// Input was rejected before any network call.
    #[error("invalid {kind} input: {source}")]
    Invalid {
        /// Resource kind.
        kind: &'static str,
        /// Underlying validation error.
        source: ResourceError,
    },
    /// A control-plane call failed.
    #[error("failed to {operation} {kind} {id}: {source}")]
    Api {
        /// Resource kind.
        kind: &'static str,
        /// Operation that was attempted.
        operation: &'static str,
        /// Resource or job identifier; empty before creation.
        id: String,
        /// Underlying API error.
        source: Box<ApiError>,
    },
    /// Waiting for a terminal status failed.
    #[error("{kind} {id} did not become {goal}: {source}")]
    Wait {
        /// Resource kind.
        kind: &'static str,
        /// Resource or job identifier.
        id: String,
        /// Description of the awaited outcome.
        goal: &'static str,
        /// Underlying wait error.
        source: WaitError,
    },
    /// The resource disappeared while the reconciler waited for it.
    #[error("{kind} {id} disappeared while waiting for it")]
    Vanished {
        /// Resource kind.
        kind: &'static str,
        /// Resource identifier.
        id: String,
    },
    /// A step after the first failed and completed steps were rolled back.
    #[error("{source}{}", compensation_note(.failures))]
    Compensation {
        /// Step whose forward action failed.
        step: String,
        /// Original error.
        source: Box<ReconcileError>,
        /// Messages of compensations that also failed, newest first.
        failures: Vec<String>,
    },
}

fn compensation_note(failures: &[String]) -> String {
    failures
        .iter()
        .map(|failure| format!(" (rollback also failed: {failure})"))
        .collect()
}

impl ReconcileError {
    /// Phase the error occurred in: `identifier`, `mutation`, `wait` or
    /// `compensation`. A clean rollback reports the phase of the step that
    /// failed; `compensation` is reserved for rollbacks that failed too.
    #[must_use]
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Invalid { .. } => "identifier",
            Self::Api { .. } => "mutation",
            Self::Wait { .. } | Self::Vanished { .. } => "wait",
            Self::Compensation {
                source, failures, ..
            } if failures.is_empty() => source.phase(),
            Self::Compensation { .. } => "compensation",
        }
    }

    /// Last status observed by a failed wait.
    #[must_use]
    pub fn last_status(&self) -> Option<&str> {
        match self {
            Self::Wait { source, .. } => source.last_status(),
            Self::Compensation { source, .. } => source.last_status(),
            Self::Invalid { .. } | Self::Api { .. } | Self::Vanished { .. } => None,
        }
    }

    /// Whether the error is a not-found answer from the control plane.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api { source, .. } => source.is_not_found(),
            Self::Invalid {
                source: ResourceError::Api(source),
                ..
            } => source.is_not_found(),
            _ => false,
        }
    }

    pub(crate) fn invalid(kind: &'static str, source: impl Into<ResourceError>) -> Self {
        Self::Invalid {
            kind,
            source: source.into(),
        }
    }

    pub(crate) fn api(
        kind: &'static str,
        operation: &'static str,
        id: impl ToString,
        source: ApiError,
    ) -> Self {
        Self::Api {
            kind,
            operation,
            id: id.to_string(),
            source: Box::new(source),
        }
    }

    /// Classifies a resource-kind error: API failures keep the operation,
    /// everything else is invalid input.
    pub(crate) fn from_resource(
        kind: &'static str,
        operation: &'static str,
        id: impl ToString,
        source: ResourceError,
    ) -> Self {
        match source {
            ResourceError::Api(api) => Self::api(kind, operation, id, api),
            other => Self::invalid(kind, other),
        }
    }
}
