//! Core library for the `converge` resource reconciliation engine.
//!
//! The crate drives cloud resources towards a desired state: it creates,
//! reads, updates and deletes them through REST control planes, waits for
//! asynchronous status changes with a bounded poller, rolls back multi-step
//! provisioning with compensating actions and suppresses spurious diffs on
//! semantically equal key/value encodings.

pub mod api;
pub mod config;
pub mod diff;
pub mod identifier;
pub mod qualified_name;
pub mod reconciler;
pub mod resource;
pub mod resources;
pub mod test_support;
pub mod transaction;
pub mod wait;

pub use api::{ApiError, ApiRequest, ApiResponse, HttpTransport, Transport};
pub use config::{ConfigError, ConvergeConfig};
pub use identifier::{IdentifierError, ResourceId};
pub use qualified_name::{QualifiedName, QualifiedNameError};
pub use reconciler::{ReconcileError, Reconciler, ResourceApi, ResourceError, Timeouts};
pub use resource::{FieldValue, ResourceSpec, ResourceState};
pub use resources::{
    BARE_METAL_NIC_KIND, BareMetalNicApi, CLOUD_CONNECTION_KIND, CloudConnectionApi, TRIGGER_KIND,
    TriggerApi,
};
pub use transaction::{ProvisioningTransaction, TransactionError};
pub use wait::{WaitError, WaitPolicy, WaitSpec, wait_for};
