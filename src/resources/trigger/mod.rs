//! Functions triggers and their feed registration.
//!
//! Triggers are stored with insert-with-overwrite semantics, so updates
//! re-issue the whole trigger. A trigger naming a `feed` registers itself
//! with the feed action through a lifecycle hook: the hook receives `CREATE`
//! after the trigger exists, `UPDATE` when feed parameters change and
//! `DELETE` before the trigger is removed.

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::api::{ApiError, ApiFuture, ApiRequest, Transport, decode, execute};
use crate::diff::{KeyValue, key_value_map, without_key};
use crate::identifier::ResourceId;
use crate::qualified_name::QualifiedName;
use crate::reconciler::{
    Created, Deletion, LifecycleEvent, LifecycleHook, Lifecycle, Mutation, ResourceApi,
    ResourceError, ResourceFuture,
};
use crate::resource::{ResourceSpec, ResourceState};

use super::{encoded_key_values, key_values, optional_bool, required_str};

/// Kind tag of Functions triggers.
pub const TRIGGER_KIND: &str = "function_trigger";
/// Annotation carrying the fully qualified feed action.
pub const FEED_ANNOTATION: &str = "feed";
/// Name of the feed lifecycle hook.
pub const FEED_HOOK: &str = "feed";

const ACTIVE: &str = "active";
const NAMESPACE_IDENTITY: &str = "namespace";
const FEED_FIELD: &str = "feed";
const FEED_PARAMETERS: &str = "feed_parameters";
const STORED_FIELDS: &[&str] = &["parameters", "annotations", "publish"];

#[derive(Deserialize)]
struct Trigger {
    name: String,
    #[serde(default)]
    parameters: Vec<KeyValue>,
    #[serde(default)]
    annotations: Vec<KeyValue>,
    #[serde(default)]
    publish: bool,
}

impl Trigger {
    fn to_state(&self, namespace: &str) -> Result<ResourceState, ResourceError> {
        let id = ResourceId::composite([namespace, self.name.as_str()])?;
        let feed = self
            .annotations
            .iter()
            .find(|entry| entry.key == FEED_ANNOTATION)
            .and_then(|entry| entry.value.as_str());
        let visible = without_key(self.annotations.clone(), FEED_ANNOTATION);
        let mut state = ResourceState::new(id, ACTIVE)
            .with_attribute("name", self.name.as_str())
            .with_attribute("publish", self.publish)
            .with_attribute("parameters", encoded_key_values("parameters", &self.parameters)?)
            .with_attribute("annotations", encoded_key_values("annotations", &visible)?);
        if let Some(feed) = feed {
            state = state.with_attribute(FEED_FIELD, feed);
        }
        Ok(state)
    }
}

/// Triggers of one Functions namespace family.
#[derive(Clone)]
pub struct TriggerApi<T> {
    transport: T,
    default_namespace: String,
    auth_key: String,
}

impl<T> fmt::Debug for TriggerApi<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerApi")
            .field("default_namespace", &self.default_namespace)
            .field("auth_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl<T: Transport> TriggerApi<T> {
    /// Creates the API. `default_namespace` applies to triggers and feeds
    /// that name no namespace; `auth_key` is handed to feed actions so they
    /// can fire the trigger.
    #[must_use]
    pub fn new(
        transport: T,
        default_namespace: impl Into<String>,
        auth_key: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            default_namespace: default_namespace.into(),
            auth_key: auth_key.into(),
        }
    }

    /// Namespace used when a name carries none.
    #[must_use]
    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    fn namespace_of<'a>(&'a self, spec: &'a ResourceSpec) -> &'a str {
        spec.identity(NAMESPACE_IDENTITY)
            .unwrap_or(&self.default_namespace)
    }

    fn feed(&self, spec: &ResourceSpec) -> Result<Option<QualifiedName>, ResourceError> {
        spec.str_field(FEED_FIELD)
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| QualifiedName::resolve_with_default(raw, &self.default_namespace))
            .transpose()
            .map_err(ResourceError::from)
    }

    async fn put_trigger(
        &self,
        spec: &ResourceSpec,
        overwrite: bool,
    ) -> Result<Created, ResourceError> {
        let name = required_str(spec, "name")?;
        let namespace = self.namespace_of(spec);
        let parameters = key_values(spec, "parameters")?;
        let mut annotations = without_key(key_values(spec, "annotations")?, FEED_ANNOTATION);
        if let Some(feed) = self.feed(spec)? {
            annotations.push(KeyValue::new(FEED_ANNOTATION, feed.format()));
        }
        let publish = optional_bool(spec, "publish")?.unwrap_or(false);

        let path = trigger_path(namespace, name);
        let body = json!({
            "name": name,
            "parameters": parameters,
            "annotations": annotations,
            "publish": publish,
        });
        debug!(%path, overwrite, "putting trigger");
        let response = execute(
            &self.transport,
            ApiRequest::put(path.as_str(), Some(body)).query("overwrite", overwrite.to_string()),
        )
        .await?;
        let trigger: Trigger = decode(&response, &path)?;
        Ok(Created::Ready(trigger.to_state(namespace)?))
    }

    async fn fetch(&self, id: &ResourceId) -> Result<ResourceState, ApiError> {
        let path = trigger_path(id.first(), id.last());
        let response = execute(&self.transport, ApiRequest::get(path.as_str())).await?;
        let trigger: Trigger = decode(&response, &path)?;
        trigger
            .to_state(id.first())
            .map_err(|err| ApiError::Decode {
                path,
                message: err.to_string(),
            })
    }

    fn lifecycle_body(&self, id: &ResourceId, hook: &LifecycleHook, event: LifecycleEvent) -> Value {
        let mut body = Map::new();
        if event != LifecycleEvent::Delete {
            body.extend(hook.parameters.clone());
        }
        body.insert(String::from("lifecycleEvent"), json!(event.as_str()));
        body.insert(
            String::from("triggerName"),
            json!(format!("/{}/{}", id.first(), id.last())),
        );
        body.insert(String::from("authKey"), json!(self.auth_key));
        Value::Object(body)
    }
}

fn trigger_path(namespace: &str, name: &str) -> String {
    format!("/namespaces/{namespace}/triggers/{name}")
}

impl<T: Transport> ResourceApi for TriggerApi<T> {
    fn kind(&self) -> &'static str {
        TRIGGER_KIND
    }

    fn id_segments(&self) -> usize {
        2
    }

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle {
            pending: &[],
            ready: &[ACTIVE],
            deleting: &[ACTIVE],
            deleted: &[],
            failed: &[],
        }
    }

    fn create<'a>(&'a self, spec: &'a ResourceSpec, overwrite: bool) -> ResourceFuture<'a, Created> {
        Box::pin(self.put_trigger(spec, overwrite))
    }

    fn get<'a>(&'a self, id: &'a ResourceId) -> ApiFuture<'a, ResourceState> {
        Box::pin(self.fetch(id))
    }

    /// Stored fields are re-issued as one upsert and feed parameter changes
    /// are announced to the feed. The feed itself cannot be switched in
    /// place: a change to `feed` plans nothing and is logged, so the trigger
    /// has to be replaced.
    fn plan(&self, changed: &BTreeSet<String>) -> Vec<Mutation> {
        if changed.contains(FEED_FIELD) {
            warn!(
                kind = TRIGGER_KIND,
                "feed changes require replacing the trigger; ignoring"
            );
        }
        let mut mutations = Vec::new();
        if STORED_FIELDS.iter().any(|field| changed.contains(*field)) {
            mutations.push(Mutation::Upsert);
        }
        if changed.contains(FEED_PARAMETERS) {
            mutations.push(Mutation::Notify {
                hook: FEED_HOOK.to_owned(),
            });
        }
        mutations
    }

    fn apply<'a>(
        &'a self,
        _id: &'a ResourceId,
        mutation: &'a Mutation,
        _old: &'a ResourceSpec,
        _new: &'a ResourceSpec,
    ) -> ResourceFuture<'a, ()> {
        Box::pin(async move {
            Err(ResourceError::invalid(
                "mutation",
                format!("{mutation:?} is not supported by {TRIGGER_KIND}"),
            ))
        })
    }

    fn delete<'a>(&'a self, id: &'a ResourceId) -> ApiFuture<'a, Deletion> {
        Box::pin(async move {
            let path = trigger_path(id.first(), id.last());
            execute(&self.transport, ApiRequest::delete(path)).await?;
            Ok(Deletion::Done)
        })
    }

    fn hooks(&self, spec: &ResourceSpec) -> Result<Vec<LifecycleHook>, ResourceError> {
        let Some(action) = self.feed(spec)? else {
            return Ok(Vec::new());
        };
        let parameters = key_value_map(key_values(spec, FEED_PARAMETERS)?);
        Ok(vec![LifecycleHook {
            name: FEED_HOOK.to_owned(),
            action,
            parameters,
        }])
    }

    fn notify<'a>(
        &'a self,
        id: &'a ResourceId,
        hook: &'a LifecycleHook,
        event: LifecycleEvent,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let namespace = hook
                .action
                .namespace()
                .unwrap_or(&self.default_namespace);
            let path = format!(
                "/namespaces/{namespace}/actions/{}",
                hook.action.path_in_namespace()
            );
            let request = ApiRequest::post(path, self.lifecycle_body(id, hook, event))
                .query("blocking", "true")
                .query("result", "false");
            execute(&self.transport, request).await?;
            Ok(())
        })
    }
}
