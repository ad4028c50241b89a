use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{generate_id, EndpointConfig, Id, LifecycleState, ResourceTemplate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DefinitionKind {
    #[serde(rename = "HTTP")]
    Rest,
    #[serde(rename = "GRAPHQL")]
    GraphQl,
    Soap,
    #[serde(rename = "WS")]
    WebSocket,
    #[serde(rename = "WEBSUB")]
    WebSub,
    Sse,
    Async,
}

impl DefinitionKind {
    /// Event-driven kinds whose definition document is replaced wholesale on
    /// update instead of being regenerated from the merged record.
    pub fn is_async(&self) -> bool {
        matches!(
            self,
            DefinitionKind::WebSocket
                | DefinitionKind::WebSub
                | DefinitionKind::Sse
                | DefinitionKind::Async
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    #[default]
    Public,
    Restricted,
    Private,
}

/// The full stored record for one managed API. Owned by the control plane and
/// mutated only through reconciliation; request handlers work on transient
/// copies. `revision` backs the compare-and-swap check on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub id: Id,
    pub name: String,
    pub version: String,
    pub context: String,
    pub organization: String,
    pub kind: DefinitionKind,
    pub status: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Machine-readable schema document (OpenAPI/AsyncAPI JSON or GraphQL SDL).
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub operations: Vec<ResourceTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_config: Option<EndpointConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visible_roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Channel-to-endpoint routing for WebSocket-style APIs, rebuilt whenever
    /// the async definition changes.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub ws_routing: HashMap<String, String>,
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Descriptor {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        context: impl Into<String>,
        organization: impl Into<String>,
        kind: DefinitionKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            name: name.into(),
            version: version.into(),
            context: context.into(),
            organization: organization.into(),
            kind,
            status: LifecycleState::Created,
            description: None,
            definition: String::new(),
            operations: Vec::new(),
            endpoint_config: None,
            categories: Vec::new(),
            visibility: Visibility::default(),
            visible_roles: Vec::new(),
            tags: Vec::new(),
            ws_routing: HashMap::new(),
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update payload for a descriptor. Absent fields keep the stored
/// value without any scope check; present fields are adopted only when the
/// caller's scopes permit the change.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DescriptorUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_config: Option<EndpointConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<ResourceTemplate>>,
}

impl DescriptorUpdate {
    /// An update echoing the stored record field for field; applying it must
    /// be a no-op.
    pub fn from_descriptor(descriptor: &Descriptor) -> Self {
        Self {
            name: Some(descriptor.name.clone()),
            description: descriptor.description.clone(),
            tags: Some(descriptor.tags.clone()),
            visibility: Some(descriptor.visibility),
            visible_roles: Some(descriptor.visible_roles.clone()),
            categories: Some(descriptor.categories.clone()),
            endpoint_config: descriptor.endpoint_config.clone(),
            operations: Some(descriptor.operations.clone()),
        }
    }
}

/// Creation payload; the lifecycle state is always CREATED on insert.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewDescriptor {
    pub name: String,
    pub version: String,
    pub context: String,
    pub kind: DefinitionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Operator-authored definition document; generated from the operations
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default)]
    pub operations: Vec<ResourceTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_config: Option<EndpointConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visible_roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_uses_transport_wire_names() {
        assert_eq!(
            serde_json::to_string(&DefinitionKind::Rest).unwrap(),
            "\"HTTP\""
        );
        assert_eq!(
            serde_json::from_str::<DefinitionKind>("\"WEBSUB\"").unwrap(),
            DefinitionKind::WebSub
        );
        assert!(DefinitionKind::WebSocket.is_async());
        assert!(!DefinitionKind::GraphQl.is_async());
    }

    #[test]
    fn update_deserializes_with_absent_fields() {
        let update: DescriptorUpdate = serde_json::from_str(r#"{"name": "Orders"}"#).unwrap();
        assert_eq!(update.name.as_deref(), Some("Orders"));
        assert!(update.operations.is_none());
        assert!(update.endpoint_config.is_none());
    }

    #[test]
    fn echo_update_mirrors_descriptor() {
        let mut descriptor =
            Descriptor::new("Orders", "1.0.0", "/orders", "acme", DefinitionKind::Rest);
        descriptor.tags = vec!["sales".to_string()];
        let echo = DescriptorUpdate::from_descriptor(&descriptor);
        assert_eq!(echo.name.as_deref(), Some("Orders"));
        assert_eq!(echo.tags, Some(vec!["sales".to_string()]));
    }
}
