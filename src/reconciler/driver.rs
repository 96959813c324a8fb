//! Convergence policy shared by every resource kind.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::diff::changed_fields;
use crate::identifier::ResourceId;
use crate::resource::{ResourceSpec, ResourceState};
use crate::transaction::{ProvisioningTransaction, TransactionError, action};
use crate::wait::{Observed, Settled, WaitError, WaitPolicy, WaitSpec, WaitSpecBuilder, wait_for};

use super::{
    Created, Deletion, JOB_COMPLETED, JOB_FAILED, JOB_PENDING, JobRef, LifecycleEvent,
    LifecycleHook, Mutation, ReconcileError, ResourceApi, ResourceError, Timeouts, UpdateOutcome,
};

const NEW_RESOURCE: &str = "<new>";

/// Drives one resource kind through create, read, update and delete.
///
/// Every call is one sequential task: no work is spawned and the only
/// suspension points are API calls and poll sleeps.
#[derive(Debug)]
pub struct Reconciler<A> {
    api: A,
    timeouts: Timeouts,
}

impl<A: ResourceApi> Reconciler<A> {
    /// Creates a reconciler with default timeouts.
    #[must_use]
    pub fn new(api: A) -> Self {
        Self {
            api,
            timeouts: Timeouts::default(),
        }
    }

    /// Overrides the wait timings.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// The wrapped resource API.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Wait timings in effect.
    #[must_use]
    pub const fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Parses a raw identifier of this kind.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Invalid`] for malformed identifiers.
    pub fn parse_id(&self, raw: &str) -> Result<ResourceId, ReconcileError> {
        self.api
            .parse_id(raw)
            .map_err(|err| ReconcileError::invalid(self.api.kind(), err))
    }

    /// Creates the resource, waits for it to settle and registers its
    /// lifecycle hooks. When a hook fails, registered hooks are sent a
    /// `DELETE` event and the resource is deleted again.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] naming the failed phase; after rollback the
    /// error is [`ReconcileError::Compensation`].
    pub async fn create(&self, spec: &ResourceSpec) -> Result<ResourceState, ReconcileError> {
        let kind = self.api.kind();
        let hooks = self
            .api
            .hooks(spec)
            .map_err(|err| ReconcileError::invalid(kind, err))?;
        info!(kind, hooks = hooks.len(), "creating resource");

        let created: Mutex<Option<ResourceState>> = Mutex::new(None);
        let slot = &created;
        let primary = format!("create {kind}");
        let mut transaction = ProvisioningTransaction::new().step(
            primary.clone(),
            action(move || async move {
                let state = self.provision(spec, false, self.timeouts.create).await?;
                *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(state);
                Ok(())
            }),
            Some(action(move || async move {
                let id = created_id(kind, slot)?;
                self.delete_and_drain(&id).await
            })),
        );
        for hook in &hooks {
            transaction = transaction.step(
                format!("register {}", hook.name),
                action(move || async move {
                    let id = created_id(kind, slot)?;
                    self.notify(&id, hook, LifecycleEvent::Create).await
                }),
                Some(action(move || async move {
                    let id = created_id(kind, slot)?;
                    self.notify(&id, hook, LifecycleEvent::Delete).await
                })),
            );
        }
        transaction
            .run()
            .await
            .map_err(|err| rolled_back(err, &primary))?;

        let state = created
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .ok_or_else(|| ReconcileError::Vanished {
                kind,
                id: NEW_RESOURCE.to_owned(),
            })?;
        info!(kind, id = %state.id, status = %state.status, "resource created");
        Ok(state)
    }

    /// Reads the resource. A missing resource, or one already reporting a
    /// deleted status, is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Api`] for any other API failure.
    pub async fn read(&self, id: &ResourceId) -> Result<Option<ResourceState>, ReconcileError> {
        let kind = self.api.kind();
        match self.api.get(id).await {
            Ok(state) if self.api.lifecycle().deleted.contains(&state.status.as_str()) => {
                debug!(kind, %id, status = %state.status, "resource reports deleted");
                Ok(None)
            }
            Ok(state) => Ok(Some(state)),
            Err(err) if err.is_not_found() => {
                debug!(kind, %id, "resource not found");
                Ok(None)
            }
            Err(err) => Err(ReconcileError::api(kind, "read", id, err)),
        }
    }

    /// Whether the resource exists.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::read`].
    pub async fn exists(&self, id: &ResourceId) -> Result<bool, ReconcileError> {
        Ok(self.read(id).await?.is_some())
    }

    /// Applies the difference between `old` and `new`.
    ///
    /// Without changed fields no call is made. Otherwise the mutations
    /// planned by the kind run in order and the resource is awaited until it
    /// settles.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] for the first failing mutation or wait.
    pub async fn update(
        &self,
        id: &ResourceId,
        old: &ResourceSpec,
        new: &ResourceSpec,
    ) -> Result<UpdateOutcome, ReconcileError> {
        let kind = self.api.kind();
        let changed = changed_fields(old, new);
        if changed.is_empty() {
            debug!(kind, %id, "no changes");
            return Ok(UpdateOutcome::Unchanged);
        }
        let mutations = self.api.plan(&changed);
        if mutations.is_empty() {
            debug!(kind, %id, ?changed, "changed fields cannot be updated in place");
            return Ok(UpdateOutcome::Unchanged);
        }
        let hooks = self
            .api
            .hooks(new)
            .map_err(|err| ReconcileError::invalid(kind, err))?;

        info!(kind, %id, mutations = mutations.len(), "updating resource");
        for mutation in &mutations {
            self.mutate(id, mutation, old, new, &hooks).await?;
        }
        let state = self.settle(id, self.timeouts.update).await?;
        Ok(UpdateOutcome::Applied(state))
    }

    /// Deletes the resource: sends `DELETE` to its lifecycle hooks, then
    /// deletes it and waits for it to drain. An absent resource is success.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when a hook or the deletion fails. A hook
    /// failure stops the teardown before the resource is deleted.
    pub async fn delete(&self, id: &ResourceId) -> Result<(), ReconcileError> {
        let kind = self.api.kind();
        let Some(state) = self.read(id).await? else {
            info!(kind, %id, "resource already absent");
            return Ok(());
        };
        let hooks = self
            .api
            .hooks(&state.to_spec(kind))
            .map_err(|err| ReconcileError::invalid(kind, err))?;

        let mut teardown = ProvisioningTransaction::new();
        for hook in &hooks {
            teardown = teardown.step(
                format!("deregister {}", hook.name),
                action(move || async move { self.deregister(id, hook).await }),
                None,
            );
        }
        teardown
            .step(
                format!("delete {kind} {id}"),
                action(move || async move { self.delete_and_drain(id).await }),
                None,
            )
            .run()
            .await
            .map_err(|err| err.source)
    }

    async fn mutate(
        &self,
        id: &ResourceId,
        mutation: &Mutation,
        old: &ResourceSpec,
        new: &ResourceSpec,
        hooks: &[LifecycleHook],
    ) -> Result<(), ReconcileError> {
        let kind = self.api.kind();
        match mutation {
            Mutation::Patch { group, fields } => {
                debug!(kind, %id, group = %group, ?fields, "patching");
                self.api
                    .apply(id, mutation, old, new)
                    .await
                    .map_err(|err| ReconcileError::from_resource(kind, "update", id, err))
            }
            Mutation::Upsert => {
                debug!(kind, %id, "re-issuing insert with overwrite");
                let created = self
                    .api
                    .create(new, true)
                    .await
                    .map_err(|err| ReconcileError::from_resource(kind, "update", id, err))?;
                if let Created::Job { job, .. } = &created {
                    self.await_job(id, job, self.timeouts.update).await?;
                }
                Ok(())
            }
            Mutation::Notify { hook } => {
                let Some(target) = hooks.iter().find(|candidate| &candidate.name == hook) else {
                    return Err(ReconcileError::invalid(
                        kind,
                        ResourceError::invalid(hook, "no lifecycle hook with this name"),
                    ));
                };
                self.notify(id, target, LifecycleEvent::Update).await
            }
        }
    }

    async fn provision(
        &self,
        spec: &ResourceSpec,
        overwrite: bool,
        timeout: Duration,
    ) -> Result<ResourceState, ReconcileError> {
        let kind = self.api.kind();
        let created = self
            .api
            .create(spec, overwrite)
            .await
            .map_err(|err| ReconcileError::from_resource(kind, "create", NEW_RESOURCE, err))?;
        match created {
            Created::Ready(state) => Ok(state),
            Created::InProgress(id) => self.settle(&id, timeout).await,
            Created::Job { id, job } => {
                self.await_job(&id, &job, timeout).await?;
                self.settle(&id, timeout).await
            }
        }
    }

    async fn notify(
        &self,
        id: &ResourceId,
        hook: &LifecycleHook,
        event: LifecycleEvent,
    ) -> Result<(), ReconcileError> {
        let kind = self.api.kind();
        info!(kind, %id, hook = %hook.name, %event, "sending lifecycle event");
        self.api
            .notify(id, hook, event)
            .await
            .map_err(|err| ReconcileError::api(kind, "notify", id, err))
    }

    async fn deregister(&self, id: &ResourceId, hook: &LifecycleHook) -> Result<(), ReconcileError> {
        match self.notify(id, hook, LifecycleEvent::Delete).await {
            Err(err) if err.is_not_found() => {
                warn!(kind = self.api.kind(), %id, hook = %hook.name, "hook action not found; continuing teardown");
                Ok(())
            }
            other => other,
        }
    }

    async fn delete_and_drain(&self, id: &ResourceId) -> Result<(), ReconcileError> {
        let kind = self.api.kind();
        let timeout = self.timeouts.delete;
        info!(kind, %id, "deleting resource");
        let deletion = match self.api.delete(id).await {
            Ok(deletion) => deletion,
            Err(err) if err.is_not_found() => {
                debug!(kind, %id, "resource already gone");
                return Ok(());
            }
            Err(err) => return Err(ReconcileError::api(kind, "delete", id, err)),
        };
        match deletion {
            Deletion::Done => Ok(()),
            Deletion::InProgress => self.drain(id, timeout).await,
            Deletion::Job(job) => {
                self.await_job(id, &job, timeout).await?;
                self.drain(id, timeout).await
            }
        }
    }

    fn wait_builder(&self, policy: WaitPolicy, timeout: Duration) -> WaitSpecBuilder {
        WaitSpec::builder(policy)
            .timeout(timeout)
            .poll_interval(self.timeouts.poll_interval)
            .min_timeout(self.timeouts.min_timeout)
            .delay(self.timeouts.delay)
    }

    async fn settle(&self, id: &ResourceId, timeout: Duration) -> Result<ResourceState, ReconcileError> {
        let kind = self.api.kind();
        let lifecycle = self.api.lifecycle();
        let wait_error = |source: WaitError| ReconcileError::Wait {
            kind,
            id: id.to_string(),
            goal: "ready",
            source,
        };
        let spec = self
            .wait_builder(WaitPolicy::Settle, timeout)
            .pending(lifecycle.pending.iter().copied())
            .target(lifecycle.ready.iter().copied())
            .failure(lifecycle.failed.iter().copied())
            .build()
            .map_err(|err| wait_error(err.into()))?;

        let api = &self.api;
        let subject = format!("{kind} {id}");
        let settled = wait_for(&spec, &subject, move || async move {
            let state = api.get(id).await?;
            Ok(Observed::new(state.status.clone(), state))
        })
        .await
        .map_err(wait_error)?;
        match settled {
            Settled::Reached(observed) => Ok(observed.value),
            Settled::Gone => Err(ReconcileError::Vanished {
                kind,
                id: id.to_string(),
            }),
        }
    }

    async fn drain(&self, id: &ResourceId, timeout: Duration) -> Result<(), ReconcileError> {
        let kind = self.api.kind();
        let lifecycle = self.api.lifecycle();
        let wait_error = |source: WaitError| ReconcileError::Wait {
            kind,
            id: id.to_string(),
            goal: "deleted",
            source,
        };
        let spec = self
            .wait_builder(WaitPolicy::Drain, timeout)
            .pending(lifecycle.deleting.iter().copied())
            .target(lifecycle.deleted.iter().copied())
            .failure(lifecycle.failed.iter().copied())
            .build()
            .map_err(|err| wait_error(err.into()))?;

        let api = &self.api;
        let subject = format!("{kind} {id}");
        wait_for(&spec, &subject, move || async move {
            let state = api.get(id).await?;
            Ok(Observed::new(state.status, ()))
        })
        .await
        .map_err(wait_error)?;
        info!(kind, %id, "resource deleted");
        Ok(())
    }

    async fn await_job(
        &self,
        id: &ResourceId,
        job: &JobRef,
        timeout: Duration,
    ) -> Result<(), ReconcileError> {
        let kind = self.api.kind();
        let wait_error = |source: WaitError| ReconcileError::Wait {
            kind,
            id: format!("{id} ({job})"),
            goal: "completed",
            source,
        };
        let spec = self
            .wait_builder(WaitPolicy::Settle, timeout)
            .pending(JOB_PENDING.iter().copied())
            .target(JOB_COMPLETED.iter().copied())
            .failure(JOB_FAILED.iter().copied())
            .build()
            .map_err(|err| wait_error(err.into()))?;

        let api = &self.api;
        let subject = format!("{kind} {id} {job}");
        wait_for(&spec, &subject, move || async move {
            let status = api.job_status(id, job).await?;
            Ok(Observed::new(status, ()))
        })
        .await
        .map_err(wait_error)?;
        debug!(kind, %id, %job, "job completed");
        Ok(())
    }
}

fn created_id(
    kind: &'static str,
    slot: &Mutex<Option<ResourceState>>,
) -> Result<ResourceId, ReconcileError> {
    slot.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(|state| state.id.clone())
        .ok_or_else(|| ReconcileError::Vanished {
            kind,
            id: NEW_RESOURCE.to_owned(),
        })
}

/// Errors from the first step pass through; later failures report the
/// rollback.
fn rolled_back(err: TransactionError<ReconcileError>, primary: &str) -> ReconcileError {
    if err.step == primary {
        return err.source;
    }
    ReconcileError::Compensation {
        step: err.step,
        source: Box::new(err.source),
        failures: err
            .compensation_failures
            .iter()
            .map(|failure| format!("{}: {}", failure.step, failure.error))
            .collect(),
    }
}
