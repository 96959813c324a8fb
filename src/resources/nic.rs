//! Network interfaces attached to bare-metal servers (VPC API).
//!
//! Interfaces are child resources: their identifier is
//! `"<server id>/<interface id>"`. The API answers with one of several
//! interface shapes discriminated by `interface_type`.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::api::{ApiError, ApiFuture, ApiRequest, Transport, decode, execute};
use crate::identifier::ResourceId;
use crate::reconciler::{
    Created, Deletion, Lifecycle, Mutation, ResourceApi, ResourceError, ResourceFuture,
};
use crate::resource::{FieldValue, ResourceSpec, ResourceState};

use super::{Reference, optional_bool, required_str, sorted_ids};

/// Kind tag of bare-metal server network interfaces.
pub const BARE_METAL_NIC_KIND: &str = "bare_metal_server_network_interface";
/// Identity field naming the parent server.
pub const SERVER_IDENTITY: &str = "bare_metal_server";

const API_VERSION: &str = "2024-04-30";
const INTERFACE_GROUP: &str = "interface";
const SECURITY_GROUPS_GROUP: &str = "security_groups";
const INTERFACE_FIELDS: &[&str] = &[
    "name",
    "allow_ip_spoofing",
    "enable_infrastructure_nat",
    "allowed_vlans",
    "allow_interface_to_float",
];

/// Fields shared by every interface shape.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct NicCommon {
    /// Interface identifier.
    pub id: String,
    /// User-visible name.
    pub name: String,
    /// Lifecycle status.
    pub status: String,
    /// Whether source IP spoofing is allowed.
    #[serde(default)]
    pub allow_ip_spoofing: bool,
    /// Whether infrastructure NAT is enabled.
    #[serde(default)]
    pub enable_infrastructure_nat: bool,
    /// Attached subnet.
    #[serde(default)]
    pub subnet: Option<Reference>,
    /// Bound security groups.
    #[serde(default)]
    pub security_groups: Vec<Reference>,
}

/// Interface as returned by the API.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(tag = "interface_type", rename_all = "snake_case")]
pub enum NetworkInterface {
    /// Physical interface.
    Pci {
        /// Shared fields.
        #[serde(flatten)]
        common: NicCommon,
        /// VLAN IDs that may use this interface.
        #[serde(default)]
        allowed_vlans: Vec<u64>,
    },
    /// VLAN interface carried by a PCI interface.
    Vlan {
        /// Shared fields.
        #[serde(flatten)]
        common: NicCommon,
        /// VLAN ID.
        vlan: u64,
        /// Whether the interface may float to another server.
        #[serde(default)]
        allow_interface_to_float: bool,
    },
    /// s390x `HiperSocket` interface.
    Hipersocket {
        /// Shared fields.
        #[serde(flatten)]
        common: NicCommon,
    },
}

impl NetworkInterface {
    /// Shared fields of any shape.
    #[must_use]
    pub const fn common(&self) -> &NicCommon {
        match self {
            Self::Pci { common, .. } | Self::Vlan { common, .. } | Self::Hipersocket { common } => {
                common
            }
        }
    }

    /// Wire name of the shape.
    #[must_use]
    pub const fn interface_type(&self) -> &'static str {
        match self {
            Self::Pci { .. } => "pci",
            Self::Vlan { .. } => "vlan",
            Self::Hipersocket { .. } => "hipersocket",
        }
    }

    /// Converts the interface into observed state under `server`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Identifier`] when the IDs are malformed.
    pub fn to_state(&self, server: &str) -> Result<ResourceState, ResourceError> {
        let common = self.common();
        let id = ResourceId::composite([server, common.id.as_str()])?;
        let mut state = ResourceState::new(id, common.status.as_str())
            .with_attribute("name", common.name.as_str())
            .with_attribute("interface_type", self.interface_type())
            .with_attribute("allow_ip_spoofing", common.allow_ip_spoofing)
            .with_attribute("enable_infrastructure_nat", common.enable_infrastructure_nat)
            .with_attribute("security_groups", sorted_ids(&common.security_groups));
        if let Some(subnet) = &common.subnet {
            state = state.with_attribute("subnet", subnet.id.as_str());
        }
        Ok(match self {
            Self::Pci { allowed_vlans, .. } => {
                let mut vlans = allowed_vlans.clone();
                vlans.sort_unstable();
                state.with_attribute("allowed_vlans", FieldValue::from(Value::from(vlans)))
            }
            Self::Vlan {
                vlan,
                allow_interface_to_float,
                ..
            } => state
                .with_attribute("vlan", *vlan)
                .with_attribute("allow_interface_to_float", *allow_interface_to_float),
            Self::Hipersocket { .. } => state,
        })
    }
}

/// Bare-metal server network interfaces.
#[derive(Clone, Debug)]
pub struct BareMetalNicApi<T> {
    transport: T,
}

impl<T: Transport> BareMetalNicApi<T> {
    /// Creates the API over a VPC transport.
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    async fn send(&self, request: ApiRequest) -> Result<crate::api::ApiResponse, ApiError> {
        let versioned = request
            .query("version", API_VERSION)
            .query("generation", "2");
        execute(&self.transport, versioned).await
    }

    async fn fetch(&self, id: &ResourceId) -> Result<ResourceState, ApiError> {
        let (server, nic) = (id.first(), id.last());
        let path = nic_path(server, nic);
        let response = self.send(ApiRequest::get(path.as_str())).await?;
        let interface: NetworkInterface = decode(&response, &path)?;
        interface.to_state(server).map_err(|err| ApiError::Decode {
            path,
            message: err.to_string(),
        })
    }

    async fn create_interface(&self, spec: &ResourceSpec) -> Result<Created, ResourceError> {
        let server = spec
            .identity(SERVER_IDENTITY)
            .ok_or_else(|| ResourceError::missing(SERVER_IDENTITY))?;
        let body = creation_body(spec)?;
        let path = format!("/bare_metal_servers/{server}/network_interfaces");
        let response = self.send(ApiRequest::post(path.as_str(), body)).await?;
        let interface: NetworkInterface = decode(&response, &path)?;
        let state = interface.to_state(server)?;
        debug!(id = %state.id, status = %state.status, "network interface created");
        if state.status == "available" {
            Ok(Created::Ready(state))
        } else {
            Ok(Created::InProgress(state.id))
        }
    }

    async fn patch_interface(
        &self,
        id: &ResourceId,
        fields: &BTreeSet<String>,
        new: &ResourceSpec,
    ) -> Result<(), ResourceError> {
        let mut body = Map::new();
        for field in fields {
            let value = new.field(field).map_or(Value::Null, FieldValue::to_json);
            body.insert(field.clone(), value);
        }
        let path = nic_path(id.first(), id.last());
        self.send(ApiRequest::patch(path, Value::Object(body)))
            .await?;
        Ok(())
    }

    async fn rebind_security_groups(
        &self,
        id: &ResourceId,
        old: &ResourceSpec,
        new: &ResourceSpec,
    ) -> Result<(), ResourceError> {
        let before = security_groups(old);
        let after = security_groups(new);
        let nic = id.last();
        for group in after.difference(&before) {
            debug!(%id, security_group = %group, "binding security group");
            self.send(ApiRequest::put(format!("/security_groups/{group}/targets/{nic}"), None))
                .await?;
        }
        for group in before.difference(&after) {
            debug!(%id, security_group = %group, "unbinding security group");
            match self
                .send(ApiRequest::delete(format!("/security_groups/{group}/targets/{nic}")))
                .await
            {
                Ok(_) => {}
                Err(err) if err.is_not_found() => {
                    debug!(%id, security_group = %group, "binding already gone");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

fn nic_path(server: &str, nic: &str) -> String {
    format!("/bare_metal_servers/{server}/network_interfaces/{nic}")
}

fn security_groups(spec: &ResourceSpec) -> BTreeSet<String> {
    spec.field("security_groups")
        .map(FieldValue::as_string_list)
        .unwrap_or_default()
        .into_iter()
        .collect()
}

fn creation_body(spec: &ResourceSpec) -> Result<Value, ResourceError> {
    let interface_type = spec.str_field("interface_type").unwrap_or("pci");
    let subnet = required_str(spec, "subnet")?;
    let mut body = BTreeMap::from([
        (String::from("interface_type"), json!(interface_type)),
        (String::from("subnet"), json!({"id": subnet})),
    ]);
    if let Some(name) = spec.str_field("name") {
        body.insert(String::from("name"), json!(name));
    }
    for flag in ["allow_ip_spoofing", "enable_infrastructure_nat"] {
        if let Some(value) = optional_bool(spec, flag)? {
            body.insert(flag.to_owned(), json!(value));
        }
    }
    let groups = security_groups(spec);
    if !groups.is_empty() {
        let references: Vec<Value> = groups.iter().map(|id| json!({"id": id})).collect();
        body.insert(String::from("security_groups"), Value::from(references));
    }
    match interface_type {
        "pci" => {
            if let Some(vlans) = spec.field("allowed_vlans") {
                body.insert(String::from("allowed_vlans"), vlans.to_json());
            }
        }
        "vlan" => {
            let vlan = spec
                .field("vlan")
                .and_then(FieldValue::as_u64)
                .ok_or_else(|| ResourceError::missing("vlan"))?;
            body.insert(String::from("vlan"), json!(vlan));
            if let Some(float) = optional_bool(spec, "allow_interface_to_float")? {
                body.insert(String::from("allow_interface_to_float"), json!(float));
            }
        }
        "hipersocket" => {}
        other => {
            return Err(ResourceError::invalid(
                "interface_type",
                format!("{other:?} is not one of pci, vlan, hipersocket"),
            ));
        }
    }
    Ok(Value::Object(body.into_iter().collect()))
}

impl<T: Transport> ResourceApi for BareMetalNicApi<T> {
    fn kind(&self) -> &'static str {
        BARE_METAL_NIC_KIND
    }

    fn id_segments(&self) -> usize {
        2
    }

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle {
            pending: &["pending"],
            ready: &["available"],
            deleting: &["available", "deleting", "pending"],
            deleted: &["deleted"],
            failed: &["failed"],
        }
    }

    fn create<'a>(&'a self, spec: &'a ResourceSpec, _overwrite: bool) -> ResourceFuture<'a, Created> {
        Box::pin(self.create_interface(spec))
    }

    fn get<'a>(&'a self, id: &'a ResourceId) -> ApiFuture<'a, ResourceState> {
        Box::pin(self.fetch(id))
    }

    fn plan(&self, changed: &BTreeSet<String>) -> Vec<Mutation> {
        let mut mutations = Vec::new();
        let interface_fields: BTreeSet<String> = changed
            .iter()
            .filter(|field| INTERFACE_FIELDS.contains(&field.as_str()))
            .cloned()
            .collect();
        if !interface_fields.is_empty() {
            mutations.push(Mutation::Patch {
                group: INTERFACE_GROUP.to_owned(),
                fields: interface_fields,
            });
        }
        if changed.contains(SECURITY_GROUPS_GROUP) {
            mutations.push(Mutation::Patch {
                group: SECURITY_GROUPS_GROUP.to_owned(),
                fields: BTreeSet::from([SECURITY_GROUPS_GROUP.to_owned()]),
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
                Mutation::Patch { group, fields } if group == INTERFACE_GROUP => {
                    self.patch_interface(id, fields, new).await
                }
                Mutation::Patch { group, .. } if group == SECURITY_GROUPS_GROUP => {
                    self.rebind_security_groups(id, old, new).await
                }
                other => Err(ResourceError::invalid(
                    "mutation",
                    format!("{other:?} is not supported by {BARE_METAL_NIC_KIND}"),
                )),
            }
        })
    }

    fn delete<'a>(&'a self, id: &'a ResourceId) -> ApiFuture<'a, Deletion> {
        Box::pin(async move {
            self.send(ApiRequest::delete(nic_path(id.first(), id.last())))
                .await?;
            Ok(Deletion::InProgress)
        })
    }
}
