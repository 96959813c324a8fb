//! Ordered provisioning steps with reverse-order compensation.
//!
//! A [`ProvisioningTransaction`] runs its steps strictly in order. When a
//! forward action fails, the compensations of the steps that already
//! completed run newest first, and the failure is returned together with any
//! compensation errors. Steps registered without a compensation are
//! irreversible and are skipped during rollback.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tracing::{debug, info, warn};

/// Future returned by a forward or compensating action.
pub type StepFuture<'a, E> = Pin<Box<dyn Future<Output = Result<(), E>> + Send + 'a>>;

/// A boxed, run-once action.
pub type Action<'a, E> = Box<dyn FnOnce() -> StepFuture<'a, E> + Send + 'a>;

/// Boxes a closure returning a future into an [`Action`].
pub fn action<'a, E, F, Fut>(run: F) -> Action<'a, E>
where
    F: FnOnce() -> Fut + Send + 'a,
    Fut: Future<Output = Result<(), E>> + Send + 'a,
{
    Box::new(move || Box::pin(run()))
}

struct Step<'a, E> {
    name: String,
    forward: Action<'a, E>,
    compensate: Option<Action<'a, E>>,
}

/// Ordered steps with optional compensating actions.
pub struct ProvisioningTransaction<'a, E> {
    steps: Vec<Step<'a, E>>,
}

impl<E> fmt::Debug for ProvisioningTransaction<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.steps.iter().map(|step| step.name.as_str()).collect();
        f.debug_struct("ProvisioningTransaction")
            .field("steps", &names)
            .finish()
    }
}

impl<E> Default for ProvisioningTransaction<'_, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, E> ProvisioningTransaction<'a, E> {
    /// Creates an empty transaction.
    #[must_use]
    pub const fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Appends a step. `compensate` undoes `forward` and runs only if a later
    /// step fails.
    #[must_use]
    pub fn step(
        mut self,
        name: impl Into<String>,
        forward: Action<'a, E>,
        compensate: Option<Action<'a, E>>,
    ) -> Self {
        self.steps.push(Step {
            name: name.into(),
            forward,
            compensate,
        });
        self
    }

    /// Number of registered steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no steps are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step in order.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError`] naming the failed step. Its
    /// `compensation_failures` list every compensation that also failed,
    /// newest first.
    pub async fn run(self) -> Result<(), TransactionError<E>>
    where
        E: fmt::Display,
    {
        let mut completed: Vec<(String, Option<Action<'a, E>>)> = Vec::new();
        for step in self.steps {
            debug!(step = %step.name, "running step");
            if let Err(source) = (step.forward)().await {
                warn!(step = %step.name, error = %source, "step failed; rolling back");
                let compensation_failures = compensate(completed).await;
                return Err(TransactionError {
                    step: step.name,
                    source,
                    compensation_failures,
                });
            }
            completed.push((step.name, step.compensate));
        }
        Ok(())
    }
}

async fn compensate<E>(completed: Vec<(String, Option<Action<'_, E>>)>) -> Vec<CompensationFailure<E>>
where
    E: fmt::Display,
{
    let mut failures = Vec::new();
    for (name, undo) in completed.into_iter().rev() {
        let Some(undo) = undo else {
            debug!(step = %name, "step is irreversible; skipping");
            continue;
        };
        info!(step = %name, "compensating");
        if let Err(error) = undo().await {
            warn!(step = %name, %error, "compensation failed");
            failures.push(CompensationFailure { step: name, error });
        }
    }
    failures
}

/// A compensation that failed during rollback.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompensationFailure<E> {
    /// Step whose compensation failed.
    pub step: String,
    /// Error returned by the compensation.
    pub error: E,
}

/// Failure of a transaction step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransactionError<E> {
    /// Step whose forward action failed.
    pub step: String,
    /// Error returned by the forward action.
    pub source: E,
    /// Compensations that failed while rolling back, newest first.
    pub compensation_failures: Vec<CompensationFailure<E>>,
}

impl<E: fmt::Display> fmt::Display for TransactionError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} failed: {}", self.step, self.source)?;
        for failure in &self.compensation_failures {
            write!(
                f,
                " (compensation for {} also failed: {})",
                failure.step, failure.error
            )?;
        }
        Ok(())
    }
}

impl<E> std::error::Error for TransactionError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
