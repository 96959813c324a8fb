//! Power Systems cloud connections.
//!
//! Creation may answer with the connection itself or with a job reference;
//! deletion always runs as a job. Identifiers are
//! `"<cloud instance id>/<cloud connection id>"`.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::api::{ApiError, ApiFuture, ApiRequest, ApiResponse, Transport, decode, execute};
use crate::identifier::ResourceId;
use crate::reconciler::{
    Created, Deletion, JobRef, Lifecycle, Mutation, ResourceApi, ResourceError, ResourceFuture,
};
use crate::resource::{FieldValue, ResourceSpec, ResourceState};

use super::{optional_bool, required_str};

/// Kind tag of cloud connections.
pub const CLOUD_CONNECTION_KIND: &str = "pi_cloud_connection";

const VISIBLE: &str = "available";
const SETTINGS_GROUP: &str = "settings";
const NETWORKS_GROUP: &str = "networks";
const SETTINGS: &[(&str, &str)] = &[
    ("name", "name"),
    ("speed", "speed"),
    ("global_routing", "globalRouting"),
    ("metered", "metered"),
    ("transit_enabled", "transitEnabled"),
];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloudConnection {
    #[serde(rename = "cloudConnectionID")]
    cloud_connection_id: String,
    name: String,
    #[serde(default)]
    speed: u64,
    #[serde(default)]
    global_routing: bool,
    #[serde(default)]
    metered: bool,
    #[serde(default)]
    transit_enabled: bool,
    #[serde(default)]
    networks: Vec<NetworkReference>,
}

#[derive(Deserialize)]
struct NetworkReference {
    #[serde(rename = "networkID")]
    network_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccepted {
    #[serde(rename = "cloudConnectionID")]
    cloud_connection_id: String,
    job_ref: JobReference,
}

#[derive(Deserialize)]
struct JobReference {
    id: String,
}

#[derive(Deserialize)]
struct Job {
    status: JobStatus,
}

#[derive(Deserialize)]
struct JobStatus {
    state: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CreateResponse {
    Accepted(CreateAccepted),
    Connection(CloudConnection),
}

impl CloudConnection {
    fn to_state(&self, cloud_instance: &str) -> Result<ResourceState, ResourceError> {
        let id = ResourceId::composite([cloud_instance, self.cloud_connection_id.as_str()])?;
        let mut networks: Vec<String> = self
            .networks
            .iter()
            .map(|network| network.network_id.clone())
            .collect();
        networks.sort();
        Ok(ResourceState::new(id, VISIBLE)
            .with_attribute("name", self.name.as_str())
            .with_attribute("speed", self.speed)
            .with_attribute("global_routing", self.global_routing)
            .with_attribute("metered", self.metered)
            .with_attribute("transit_enabled", self.transit_enabled)
            .with_attribute("networks", networks))
    }
}

/// Cloud connections of one Power Systems workspace.
#[derive(Clone, Debug)]
pub struct CloudConnectionApi<T> {
    transport: T,
    cloud_instance_id: String,
}

impl<T: Transport> CloudConnectionApi<T> {
    /// Creates the API for the workspace `cloud_instance_id`.
    #[must_use]
    pub fn new(transport: T, cloud_instance_id: impl Into<String>) -> Self {
        Self {
            transport,
            cloud_instance_id: cloud_instance_id.into(),
        }
    }

    /// Workspace new connections are created in.
    #[must_use]
    pub fn cloud_instance_id(&self) -> &str {
        &self.cloud_instance_id
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        execute(&self.transport, request).await
    }

    async fn fetch(&self, id: &ResourceId) -> Result<ResourceState, ApiError> {
        let path = connection_path(id);
        let response = self.send(ApiRequest::get(path.as_str())).await?;
        let connection: CloudConnection = decode(&response, &path)?;
        connection
            .to_state(id.first())
            .map_err(|err| ApiError::Decode {
                path,
                message: err.to_string(),
            })
    }

    async fn create_connection(&self, spec: &ResourceSpec) -> Result<Created, ResourceError> {
        let name = required_str(spec, "name")?;
        let speed = spec
            .field("speed")
            .and_then(FieldValue::as_u64)
            .ok_or_else(|| ResourceError::missing("speed"))?;
        let mut body = Map::from_iter([
            (String::from("name"), json!(name)),
            (String::from("speed"), json!(speed)),
        ]);
        for (field, wire) in SETTINGS.iter().skip(2) {
            if let Some(flag) = optional_bool(spec, field)? {
                body.insert((*wire).to_owned(), json!(flag));
            }
        }
        let networks = network_ids(spec);
        if !networks.is_empty() {
            let references: Vec<Value> = networks.iter().map(|id| json!({"networkID": id})).collect();
            body.insert(String::from("networks"), Value::from(references));
        }

        let path = format!("/cloud-instances/{}/cloud-connections", self.cloud_instance_id);
        let response = self
            .send(ApiRequest::post(path.as_str(), Value::Object(body)))
            .await?;
        match decode::<CreateResponse>(&response, &path)? {
            CreateResponse::Accepted(accepted) => {
                let id = ResourceId::composite([
                    self.cloud_instance_id.as_str(),
                    accepted.cloud_connection_id.as_str(),
                ])?;
                debug!(%id, job = %accepted.job_ref.id, "cloud connection creation queued");
                Ok(Created::Job {
                    id,
                    job: JobRef::new(accepted.job_ref.id),
                })
            }
            CreateResponse::Connection(connection) => {
                Ok(Created::Ready(connection.to_state(&self.cloud_instance_id)?))
            }
        }
    }

    async fn update_settings(
        &self,
        id: &ResourceId,
        fields: &BTreeSet<String>,
        new: &ResourceSpec,
    ) -> Result<(), ResourceError> {
        let body: Map<String, Value> = SETTINGS
            .iter()
            .filter(|(field, _)| fields.contains(*field))
            .map(|(field, wire)| {
                let value = new.field(field).map_or(Value::Null, FieldValue::to_json);
                ((*wire).to_owned(), value)
            })
            .collect();
        self.send(ApiRequest::put(connection_path(id), Some(Value::Object(body))))
            .await?;
        Ok(())
    }

    async fn update_networks(
        &self,
        id: &ResourceId,
        old: &ResourceSpec,
        new: &ResourceSpec,
    ) -> Result<(), ResourceError> {
        let before = network_ids(old);
        let after = network_ids(new);
        let base = connection_path(id);
        for network in after.difference(&before) {
            debug!(%id, network = %network, "attaching network");
            self.send(ApiRequest::put(format!("{base}/networks/{network}"), None))
                .await?;
        }
        for network in before.difference(&after) {
            debug!(%id, network = %network, "detaching network");
            match self
                .send(ApiRequest::delete(format!("{base}/networks/{network}")))
                .await
            {
                Ok(_) => {}
                Err(err) if err.is_not_found() => {
                    debug!(%id, network = %network, "network already detached");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

fn connection_path(id: &ResourceId) -> String {
    format!(
        "/cloud-instances/{}/cloud-connections/{}",
        id.first(),
        id.last()
    )
}

fn network_ids(spec: &ResourceSpec) -> BTreeSet<String> {
    spec.field("networks")
        .map(FieldValue::as_string_list)
        .unwrap_or_default()
        .into_iter()
        .collect()
}

impl<T: Transport> ResourceApi for CloudConnectionApi<T> {
    fn kind(&self) -> &'static str {
        CLOUD_CONNECTION_KIND
    }

    fn id_segments(&self) -> usize {
        2
    }

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle {
            pending: &[],
            ready: &[VISIBLE],
            deleting: &[VISIBLE],
            deleted: &[],
            failed: &["failed"],
        }
    }

    fn create<'a>(&'a self, spec: &'a ResourceSpec, _overwrite: bool) -> ResourceFuture<'a, Created> {
        Box::pin(self.create_connection(spec))
    }

    fn get<'a>(&'a self, id: &'a ResourceId) -> ApiFuture<'a, ResourceState> {
        Box::pin(self.fetch(id))
    }

    fn plan(&self, changed: &BTreeSet<String>) -> Vec<Mutation> {
        let settings: BTreeSet<String> = SETTINGS
            .iter()
            .map(|(field, _)| *field)
            .filter(|field| changed.contains(*field))
            .map(str::to_owned)
            .collect();
        let mut mutations = Vec::new();
        if !settings.is_empty() {
            mutations.push(Mutation::Patch {
                group: SETTINGS_GROUP.to_owned(),
                fields: settings,
            });
        }
        if changed.contains(NETWORKS_GROUP) {
            mutations.push(Mutation::Patch {
                group: NETWORKS_GROUP.to_owned(),
                fields: BTreeSet::from([NETWORKS_GROUP.to_owned()]),
            });
        }
        mutations
    }

    fn apply<'a>(
        &'a self,
        id: &'a ResourceId,
        mutation: &'a Mutation,
        old: &'a ResourceSpec,
        new: &'a ResourceSpec,
    ) -> ResourceFuture<'a, ()> {
        Box::pin(async move {
            match mutation {
                Mutation::Patch { group, fields } if group == SETTINGS_GROUP => {
                    self.update_settings(id, fields, new).await
                }
                Mutation::Patch { group, .. } if group == NETWORKS_GROUP => {
                    self.update_networks(id, old, new).await
                }
                other => Err(ResourceError::invalid(
                    "mutation",
                    format!("{other:?} is not supported by {CLOUD_CONNECTION_KIND}"),
                )),
            }
        })
    }

    fn delete<'a>(&'a self, id: &'a ResourceId) -> ApiFuture<'a, Deletion> {
        Box::pin(async move {
            let path = connection_path(id);
            let response = self.send(ApiRequest::delete(path.as_str())).await?;
            if response.body.is_empty() {
                return Ok(Deletion::Done);
            }
            let job: JobReference = decode(&response, &path)?;
            Ok(Deletion::Job(JobRef::new(job.id)))
        })
    }

    fn job_status<'a>(&'a self, id: &'a ResourceId, job: &'a JobRef) -> ApiFuture<'a, String> {
        Box::pin(async move {
            let path = format!("/cloud-instances/{}/jobs/{}", id.first(), job.id());
            let response = self.send(ApiRequest::get(path.as_str())).await?;
            let observed: Job = decode(&response, &path)?;
            Ok(observed.status.state)
        })
    }
}
