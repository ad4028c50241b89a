use itertools::Itertools;

use crate::error::{EngineError, Result};
use crate::model::{Checklist, Id, LifecycleAction, LifecycleResult};
use crate::store::Store;

/// Gates lifecycle transitions through the allowed-action table and checklist
/// parsing. The transition table itself is a collaborator query; the gate
/// never hard-codes the state graph.
pub struct LifecycleGate;

impl LifecycleGate {
    pub async fn transition<S: Store>(
        store: &S,
        id: &Id,
        organization: &str,
        action_raw: &str,
        checklist_raw: &str,
        actor: &str,
    ) -> Result<LifecycleResult> {
        let allowed = store.allowed_actions(id, organization).await?;
        log::debug!("allowed actions for {}: [{}]", id, format_actions(&allowed));
        let action = LifecycleAction::parse(action_raw)
            .filter(|a| allowed.contains(a))
            .ok_or_else(|| EngineError::InvalidLifecycleAction {
                action: action_raw.to_string(),
                allowed: allowed.iter().map(ToString::to_string).collect(),
            })?;

        let checklist = Checklist::parse(checklist_raw);
        log::info!(
            "applying lifecycle action '{}' to {} ({} checklist item(s))",
            action,
            id,
            checklist.len()
        );
        store
            .apply_transition(id, organization, action, &checklist, actor)
            .await
    }
}

/// Render an allowed-action list for error payloads and logs.
pub fn format_actions(actions: &[LifecycleAction]) -> String {
    actions.iter().map(ToString::to_string).join(", ")
}
