//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, PoisonError};

use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};

use crate::api::{ApiError, ApiFuture, ApiRequest, ApiResponse, Transport};

type Script = Arc<std::sync::Mutex<VecDeque<Result<ApiResponse, ApiError>>>>;

/// Scripted transport that returns pre-seeded responses in FIFO order and
/// records every request it receives.
///
/// Used to drive resource kinds deterministically without a network.
#[derive(Clone, Debug, Default)]
pub struct ScriptedTransport {
    responses: Script,
    requests: Arc<std::sync::Mutex<Vec<ApiRequest>>>,
}

impl ScriptedTransport {
    /// Creates a new transport with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all requests sent so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns `"METHOD path"` for every request, for compact assertions.
    #[must_use]
    pub fn request_lines(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| format!("{} {}", request.method.as_str(), request.path))
            .collect()
    }

    /// Number of responses not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn push(&self, outcome: Result<ApiResponse, ApiError>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    /// Pushes a response with the given status and JSON body.
    pub fn push_json(&self, status: u16, body: &Value) {
        self.push(Ok(ApiResponse {
            status,
            body: body.to_string().into_bytes(),
        }));
    }

    /// Pushes a `200 OK` response with a JSON body.
    pub fn push_ok(&self, body: &Value) {
        self.push_json(200, body);
    }

    /// Pushes a response with the given status and an empty body.
    pub fn push_status(&self, status: u16) {
        self.push(Ok(ApiResponse {
            status,
            body: Vec::new(),
        }));
    }

    /// Pushes a `404` response.
    pub fn push_not_found(&self) {
        self.push_json(
            404,
            &serde_json::json!({"errors": [{"code": "not_found", "message": "not found"}]}),
        );
    }

    /// Pushes a connection-level failure.
    pub fn push_transport_error(&self, message: impl Into<String>) {
        self.push(Err(ApiError::Transport {
            message: message.into(),
        }));
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: ApiRequest) -> ApiFuture<'_, ApiResponse> {
        let description = format!("{} {}", request.method.as_str(), request.path);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        let outcome = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Err(ApiError::Transport {
                    message: format!("no scripted response available for {description}"),
                })
            });
        Box::pin(async move { outcome })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        Self::apply(pairs, &[]).await
    }

    /// Sets `pairs` and removes `removed` while holding a global mutex.
    pub async fn apply(pairs: &[(&str, &str)], removed: &[&str]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs
                    .iter()
                    .map(|(key, _)| *key)
                    .chain(removed.iter().copied())
                    .all(|key| seen.insert(key))
            },
            "duplicate environment variable keys passed to EnvGuard"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len() + removed.len());
        for (key, value) in pairs {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
        }
        for key in removed {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::remove_var(key) };
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
