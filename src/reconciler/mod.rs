//! Generic create/read/update/delete driver over per-kind resource APIs.
//!
//! Each resource kind implements [`ResourceApi`] to describe its wire calls
//! and status vocabulary. [`Reconciler`] owns the convergence policy shared by
//! every kind: settle after mutations, drain after deletes, diff-driven
//! updates and rollback of partially provisioned resources.

mod driver;
mod error;
mod timeouts;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::api::{ApiError, ApiFuture};
use crate::identifier::{IdentifierError, ResourceId};
use crate::qualified_name::QualifiedName;
use crate::resource::{ResourceSpec, ResourceState};

pub use driver::Reconciler;
pub use error::{ReconcileError, ResourceError};
pub use timeouts::{
    DEFAULT_CREATE_TIMEOUT, DEFAULT_DELETE_TIMEOUT, DEFAULT_MIN_TIMEOUT, DEFAULT_POLL_INTERVAL,
    DEFAULT_UPDATE_TIMEOUT, Timeouts,
};

/// Future returned by resource-kind calls that may fail validation as well as
/// at the API.
pub type ResourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ResourceError>> + Send + 'a>>;

/// Job statuses that keep a job wait polling.
pub const JOB_PENDING: &[&str] = &["queued", "running"];
/// Job status that ends a job wait successfully.
pub const JOB_COMPLETED: &[&str] = &["completed"];
/// Job status that ends a job wait with a failure.
pub const JOB_FAILED: &[&str] = &["failed"];

/// Status vocabulary of a resource kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Lifecycle {
    /// Statuses seen while a resource is being provisioned or updated.
    pub pending: &'static [&'static str],
    /// Statuses of a usable resource.
    pub ready: &'static [&'static str],
    /// Statuses that keep a deletion draining. Usually includes the ready
    /// and pending statuses, since a delete is not visible immediately.
    pub deleting: &'static [&'static str],
    /// Statuses of a removed resource that is still listed.
    pub deleted: &'static [&'static str],
    /// Terminal failure statuses.
    pub failed: &'static [&'static str],
}

/// Reference to an asynchronous control-plane job.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct JobRef(String);

impl JobRef {
    /// Wraps a job identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Job identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {}", self.0)
    }
}

/// Result of a creation call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Created {
    /// The resource is immediately usable.
    Ready(ResourceState),
    /// The resource exists but is still being provisioned.
    InProgress(ResourceId),
    /// Provisioning runs as a job; the resource becomes visible once the job
    /// completes.
    Job {
        /// Identifier the resource will have.
        id: ResourceId,
        /// Job to poll first.
        job: JobRef,
    },
}

impl Created {
    /// Identifier of the created resource.
    #[must_use]
    pub const fn id(&self) -> &ResourceId {
        match self {
            Self::Ready(state) => &state.id,
            Self::InProgress(id) | Self::Job { id, .. } => id,
        }
    }
}

/// Result of a deletion call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Deletion {
    /// The resource is gone.
    Done,
    /// Deletion was accepted and the resource is draining.
    InProgress,
    /// Deletion runs as a job.
    Job(JobRef),
}

/// One sub-mutation selected by [`ResourceApi::plan`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Mutation {
    /// Partial update of a group of fields sharing one API call.
    Patch {
        /// Name of the call group, such as `interface` or `security_groups`.
        group: String,
        /// Changed fields handled by this call.
        fields: BTreeSet<String>,
    },
    /// Re-issue the insert with overwrite enabled.
    Upsert,
    /// Send an `UPDATE` lifecycle event to the named hook.
    Notify {
        /// Hook name, as returned by [`ResourceApi::hooks`].
        hook: String,
    },
}

/// A dependent action bound to a resource's lifecycle, such as a trigger
/// feed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LifecycleHook {
    /// Hook name, unique per resource.
    pub name: String,
    /// Action invoked with lifecycle events.
    pub action: QualifiedName,
    /// Parameters passed with every event.
    pub parameters: BTreeMap<String, Value>,
}

/// Lifecycle events sent to hooks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LifecycleEvent {
    /// The resource was created.
    Create,
    /// The resource's hook parameters changed.
    Update,
    /// The resource is about to be deleted.
    Delete,
}

impl LifecycleEvent {
    /// Wire name of the event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`Reconciler::update`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UpdateOutcome {
    /// Nothing needed to be sent.
    Unchanged,
    /// Mutations were applied and the resource settled.
    Applied(ResourceState),
}

/// Wire calls and status vocabulary of one resource kind.
pub trait ResourceApi: Send + Sync {
    /// Kind tag used in specs, logs and errors.
    fn kind(&self) -> &'static str;

    /// Number of segments in the kind's identifiers.
    fn id_segments(&self) -> usize {
        1
    }

    /// Parses an identifier of this kind.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when `raw` has the wrong shape.
    fn parse_id(&self, raw: &str) -> Result<ResourceId, IdentifierError> {
        ResourceId::parse(raw, self.id_segments())
    }

    /// Status vocabulary.
    fn lifecycle(&self) -> Lifecycle;

    /// Issues the creation call. `overwrite` re-issues an insert over an
    /// existing resource.
    fn create<'a>(&'a self, spec: &'a ResourceSpec, overwrite: bool)
    -> ResourceFuture<'a, Created>;

    /// Reads the resource. A missing resource is [`ApiError::NotFound`].
    fn get<'a>(&'a self, id: &'a ResourceId) -> ApiFuture<'a, ResourceState>;

    /// Selects the sub-mutations covering `changed` fields. Fields the kind
    /// cannot change in place are ignored.
    fn plan(&self, changed: &BTreeSet<String>) -> Vec<Mutation>;

    /// Applies one [`Mutation::Patch`] group.
    fn apply<'a>(
        &'a self,
        id: &'a ResourceId,
        mutation: &'a Mutation,
        old: &'a ResourceSpec,
        new: &'a ResourceSpec,
    ) -> ResourceFuture<'a, ()>;

    /// Issues the deletion call.
    fn delete<'a>(&'a self, id: &'a ResourceId) -> ApiFuture<'a, Deletion>;

    /// Reads the status of an asynchronous job started for the resource `id`.
    fn job_status<'a>(
        &'a self,
        _id: &'a ResourceId,
        _job: &'a JobRef,
    ) -> ApiFuture<'a, String> {
        let kind = self.kind();
        Box::pin(async move { Err(ApiError::unsupported(kind, "job polling")) })
    }

    /// Lifecycle hooks declared by `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError`] when a hook reference is malformed.
    fn hooks(&self, _spec: &ResourceSpec) -> Result<Vec<LifecycleHook>, ResourceError> {
        Ok(Vec::new())
    }

    /// Sends a lifecycle event to a hook.
    fn notify<'a>(
        &'a self,
        _id: &'a ResourceId,
        _hook: &'a LifecycleHook,
        _event: LifecycleEvent,
    ) -> ApiFuture<'a, ()> {
        let kind = self.kind();
        Box::pin(async move { Err(ApiError::unsupported(kind, "lifecycle hooks")) })
    }
}
