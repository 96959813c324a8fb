//! Shared fixtures for reconciliation scenarios.

use std::cell::RefCell;
use std::future::Future;
use std::time::Duration;

use converge::test_support::ScriptedTransport;
use converge::{
    BareMetalNicApi, ReconcileError, Reconciler, ResourceSpec, Timeouts, TriggerApi,
};
use rstest::fixture;
use serde_json::{Value, json};
use tokio::runtime::Builder;

pub const FEED: &str = "/whisk.system/alarms/alarm";

/// Scripted control plane plus the outcome of the last operation.
pub struct ReconcileWorld {
    pub transport: ScriptedTransport,
    pub spec: RefCell<Option<ResourceSpec>>,
    pub outcome: RefCell<Option<Result<(), ReconcileError>>>,
}

#[fixture]
pub fn reconcile_world() -> ReconcileWorld {
    ReconcileWorld {
        transport: ScriptedTransport::new(),
        spec: RefCell::new(None),
        outcome: RefCell::new(None),
    }
}

impl ReconcileWorld {
    fn timeouts() -> Timeouts {
        Timeouts {
            create: Duration::from_secs(60),
            update: Duration::from_secs(60),
            delete: Duration::from_secs(60),
            poll_interval: Duration::from_secs(10),
            min_timeout: Duration::from_secs(10),
            delay: Duration::ZERO,
        }
    }

    pub fn triggers(&self) -> Reconciler<TriggerApi<ScriptedTransport>> {
        Reconciler::new(TriggerApi::new(self.transport.clone(), "_", "uuid:key"))
            .with_timeouts(Self::timeouts())
    }

    pub fn interfaces(&self) -> Reconciler<BareMetalNicApi<ScriptedTransport>> {
        Reconciler::new(BareMetalNicApi::new(self.transport.clone()))
            .with_timeouts(Self::timeouts())
    }

    pub fn record(&self, outcome: Result<(), ReconcileError>) {
        self.outcome.replace(Some(outcome));
    }
}

/// Runs `future` on a current-thread runtime with paused time so poll
/// sleeps complete instantly.
pub fn block_on<F: Future>(future: F) -> F::Output {
    let runtime = Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap_or_else(|err| panic!("runtime should build: {err}"));
    runtime.block_on(future)
}

pub fn trigger_json(annotations: Value) -> Value {
    json!({
        "name": "ticker",
        "parameters": [],
        "annotations": annotations,
        "publish": false
    })
}

pub fn nic_json(status: &str) -> Value {
    json!({
        "id": "nic-1",
        "name": "eth1",
        "status": status,
        "interface_type": "pci",
        "allowed_vlans": [],
        "security_groups": []
    })
}
