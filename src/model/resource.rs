use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::Id;

/// One operation exposed by an API: an HTTP verb (or protocol equivalent such
/// as SUBSCRIBE for WebSocket channels) plus a path pattern, with any
/// operator-attached per-operation policies. `used_by` holds the ids of
/// composite products that currently reference this exact verb+path pair; it
/// is authoritative state owned by the store, never by request payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceTemplate {
    pub verb: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<OperationPolicy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub used_by: Vec<Id>,
}

impl ResourceTemplate {
    pub fn new(verb: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            path: path.into(),
            policies: Vec::new(),
            used_by: Vec::new(),
        }
    }

    /// Identity key, `VERB:path`. Verbs are case-insensitive so the key is
    /// always uppercased on the verb side.
    pub fn key(&self) -> String {
        format!("{}:{}", self.verb.to_uppercase(), self.path)
    }

    pub fn matches(&self, verb: &str, path: &str) -> bool {
        self.verb.eq_ignore_ascii_case(verb) && self.path.eq_ignore_ascii_case(path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationPolicy {
    pub name: String,
    #[serde(default = "default_policy_version")]
    pub version: String,
    #[serde(default)]
    pub direction: PolicyDirection,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, String>,
}

fn default_policy_version() -> String {
    "v1".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyDirection {
    #[default]
    Request,
    Response,
    Fault,
}

/// Index payload-supplied policies by template key, skipping templates that
/// carry none. Used to overlay policies onto a freshly extracted template set.
pub fn policies_by_key(templates: &[ResourceTemplate]) -> HashMap<String, Vec<OperationPolicy>> {
    templates
        .iter()
        .filter(|t| !t.policies.is_empty())
        .map(|t| (t.key(), t.policies.clone()))
        .collect()
}

/// Structural comparison of two template sets that ignores `used_by`, which a
/// request payload never owns.
pub fn same_operations(a: &[ResourceTemplate], b: &[ResourceTemplate]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let view = |ts: &[ResourceTemplate]| -> Vec<(String, Vec<OperationPolicy>)> {
        let mut v: Vec<_> = ts.iter().map(|t| (t.key(), t.policies.clone())).collect();
        v.sort_by(|x, y| x.0.cmp(&y.0));
        v
    };
    view(a) == view(b)
}
