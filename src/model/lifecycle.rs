use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle checklist item names honored by the transition executor.
pub const CHECK_DEPRECATE_OLD_VERSIONS: &str = "Deprecate Old Versions";
pub const CHECK_REQUIRE_RESUBSCRIPTION: &str = "Require Re-Subscription";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Created,
    Prototyped,
    Published,
    Blocked,
    Deprecated,
    Retired,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleState::Created => "CREATED",
            LifecycleState::Prototyped => "PROTOTYPED",
            LifecycleState::Published => "PUBLISHED",
            LifecycleState::Blocked => "BLOCKED",
            LifecycleState::Deprecated => "DEPRECATED",
            LifecycleState::Retired => "RETIRED",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleAction {
    #[serde(rename = "Publish")]
    Publish,
    #[serde(rename = "Deploy as a Prototype")]
    DeployAsPrototype,
    #[serde(rename = "Demote to Created")]
    DemoteToCreated,
    #[serde(rename = "Block")]
    Block,
    #[serde(rename = "Re-Publish")]
    RePublish,
    #[serde(rename = "Deprecate")]
    Deprecate,
    #[serde(rename = "Retire")]
    Retire,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Publish => "Publish",
            LifecycleAction::DeployAsPrototype => "Deploy as a Prototype",
            LifecycleAction::DemoteToCreated => "Demote to Created",
            LifecycleAction::Block => "Block",
            LifecycleAction::RePublish => "Re-Publish",
            LifecycleAction::Deprecate => "Deprecate",
            LifecycleAction::Retire => "Retire",
        }
    }

    /// Case-insensitive parse of a wire action name.
    pub fn parse(raw: &str) -> Option<Self> {
        let all = [
            LifecycleAction::Publish,
            LifecycleAction::DeployAsPrototype,
            LifecycleAction::DemoteToCreated,
            LifecycleAction::Block,
            LifecycleAction::RePublish,
            LifecycleAction::Deprecate,
            LifecycleAction::Retire,
        ];
        all.into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

impl std::fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Directed transition table: state -> { action -> target state }. Loaded per
/// deployment; `standard()` is the default graph for managed APIs. Terminal
/// states simply have no outgoing edges.
#[derive(Debug, Clone)]
pub struct LifecycleTable {
    transitions: HashMap<LifecycleState, Vec<(LifecycleAction, LifecycleState)>>,
}

impl LifecycleTable {
    pub fn standard() -> Self {
        use LifecycleAction::*;
        use LifecycleState::*;
        let mut transitions = HashMap::new();
        transitions.insert(
            Created,
            vec![(Publish, Published), (DeployAsPrototype, Prototyped)],
        );
        transitions.insert(
            Prototyped,
            vec![(Publish, Published), (DemoteToCreated, Created)],
        );
        transitions.insert(
            Published,
            vec![
                (Block, Blocked),
                (Deprecate, Deprecated),
                (DemoteToCreated, Created),
            ],
        );
        transitions.insert(Blocked, vec![(RePublish, Published), (Deprecate, Deprecated)]);
        transitions.insert(Deprecated, vec![(Retire, Retired)]);
        transitions.insert(Retired, Vec::new());
        Self { transitions }
    }

    pub fn allowed_actions(&self, state: LifecycleState) -> Vec<LifecycleAction> {
        self.transitions
            .get(&state)
            .map(|edges| edges.iter().map(|(a, _)| *a).collect())
            .unwrap_or_default()
    }

    pub fn target(&self, state: LifecycleState, action: LifecycleAction) -> Option<LifecycleState> {
        self.transitions
            .get(&state)?
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, target)| *target)
    }
}

impl Default for LifecycleTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Named boolean conditions accompanying a transition, parsed from the wire
/// format `name:bool,name:bool`. Fragments that do not split into exactly two
/// parts are dropped, not merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checklist(HashMap<String, bool>);

impl Checklist {
    pub fn parse(raw: &str) -> Self {
        let mut items = HashMap::new();
        for fragment in raw.split(',') {
            let parts: Vec<&str> = fragment.split(':').collect();
            if parts.len() == 2 {
                let name = parts[0].trim();
                if name.is_empty() {
                    continue;
                }
                let value = parts[1].trim().eq_ignore_ascii_case("true");
                items.insert(name.to_string(), value);
            }
        }
        Self(items)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// One appended entry in a descriptor's lifecycle history. History is never
/// rewritten, only appended to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub previous_state: LifecycleState,
    pub new_state: LifecycleState,
    pub action: LifecycleAction,
    pub actor: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleResult {
    pub state: LifecycleState,
    pub event: LifecycleEvent,
}
