use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::model::{
    compare_versions, Checklist, Descriptor, Id, LifecycleAction, LifecycleEvent, LifecycleResult,
    LifecycleState, LifecycleTable, CHECK_DEPRECATE_OLD_VERSIONS,
};
use crate::store::traits::{DescriptorStore, LifecycleStore, Store};

/// In-memory store backing the server and the test suites. Descriptors,
/// lifecycle history and the per-organization category registry live behind
/// `parking_lot` locks; no lock is held across an await point.
pub struct MemoryStore {
    descriptors: RwLock<HashMap<Id, Descriptor>>,
    history: RwLock<HashMap<Id, Vec<LifecycleEvent>>>,
    categories: RwLock<HashMap<String, Vec<String>>>,
    lifecycle: LifecycleTable,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            descriptors: RwLock::new(HashMap::new()),
            history: RwLock::new(HashMap::new()),
            categories: RwLock::new(HashMap::new()),
            lifecycle: LifecycleTable::standard(),
        }
    }

    /// Register category names for an organization (admin surface stand-in).
    pub fn register_categories(&self, organization: &str, names: Vec<String>) {
        self.categories
            .write()
            .insert(organization.to_string(), names);
    }

    /// Mark a verb+path pair of a stored descriptor as referenced by a
    /// composite product. This is the back-reference state the resource guard
    /// queries.
    pub fn register_product_dependency(
        &self,
        descriptor_id: &Id,
        verb: &str,
        path: &str,
        product_id: &Id,
    ) -> bool {
        let mut descriptors = self.descriptors.write();
        let Some(descriptor) = descriptors.get_mut(descriptor_id) else {
            return false;
        };
        for template in &mut descriptor.operations {
            if template.matches(verb, path) {
                if !template.used_by.contains(product_id) {
                    template.used_by.push(product_id.clone());
                }
                return true;
            }
        }
        false
    }

    fn append_event(&self, id: &Id, event: LifecycleEvent) {
        self.history.write().entry(id.clone()).or_default().push(event);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DescriptorStore for MemoryStore {
    async fn get_descriptor(&self, id: &Id, organization: &str) -> Result<Option<Descriptor>> {
        Ok(self
            .descriptors
            .read()
            .get(id)
            .filter(|d| d.organization == organization)
            .cloned())
    }

    async fn insert_descriptor(&self, descriptor: Descriptor) -> Result<Descriptor> {
        let mut descriptors = self.descriptors.write();
        if descriptors.contains_key(&descriptor.id) {
            return Err(EngineError::Internal(format!(
                "descriptor {} already exists",
                descriptor.id
            )));
        }
        descriptors.insert(descriptor.id.clone(), descriptor.clone());
        Ok(descriptor)
    }

    async fn save_descriptor(
        &self,
        mut updated: Descriptor,
        previous: &Descriptor,
    ) -> Result<Descriptor> {
        let mut descriptors = self.descriptors.write();
        let current = descriptors
            .get(&updated.id)
            .ok_or_else(|| EngineError::NotFound(updated.id.clone()))?;
        if current.revision != previous.revision {
            return Err(EngineError::ConflictingUpdate {
                id: updated.id.clone(),
                expected: previous.revision,
            });
        }
        // Product back-references survive on templates still present after
        // the update; the engine never owns them.
        for template in &mut updated.operations {
            if let Some(existing) = current
                .operations
                .iter()
                .find(|t| t.matches(&template.verb, &template.path))
            {
                template.used_by = existing.used_by.clone();
            }
        }
        updated.revision = current.revision + 1;
        updated.updated_at = Utc::now();
        descriptors.insert(updated.id.clone(), updated.clone());
        Ok(updated)
    }

    async fn delete_descriptor(&self, id: &Id, organization: &str) -> Result<bool> {
        let mut descriptors = self.descriptors.write();
        match descriptors.get(id) {
            Some(d) if d.organization == organization => {
                descriptors.remove(id);
                self.history.write().remove(id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_categories(&self, organization: &str) -> Result<Vec<String>> {
        Ok(self
            .categories
            .read()
            .get(organization)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl LifecycleStore for MemoryStore {
    async fn allowed_actions(&self, id: &Id, organization: &str) -> Result<Vec<LifecycleAction>> {
        let descriptors = self.descriptors.read();
        let descriptor = descriptors
            .get(id)
            .filter(|d| d.organization == organization)
            .ok_or_else(|| EngineError::NotFound(id.clone()))?;
        Ok(self.lifecycle.allowed_actions(descriptor.status))
    }

    async fn apply_transition(
        &self,
        id: &Id,
        organization: &str,
        action: LifecycleAction,
        checklist: &Checklist,
        actor: &str,
    ) -> Result<LifecycleResult> {
        let (event, siblings) = {
            let mut descriptors = self.descriptors.write();
            let descriptor = descriptors
                .get_mut(id)
                .filter(|d| d.organization == organization)
                .ok_or_else(|| EngineError::NotFound(id.clone()))?;
            let previous_state = descriptor.status;
            let new_state = self.lifecycle.target(previous_state, action).ok_or_else(|| {
                EngineError::InvalidLifecycleAction {
                    action: action.to_string(),
                    allowed: self
                        .lifecycle
                        .allowed_actions(previous_state)
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                }
            })?;
            let name = descriptor.name.clone();
            let version = descriptor.version.clone();
            descriptor.status = new_state;
            descriptor.revision += 1;
            descriptor.updated_at = Utc::now();

            let mut siblings = Vec::new();
            if action == LifecycleAction::Publish && checklist.is_set(CHECK_DEPRECATE_OLD_VERSIONS)
            {
                for other in descriptors.values_mut() {
                    if other.id != *id
                        && other.organization == organization
                        && other.name == name
                        && other.status == LifecycleState::Published
                        && compare_versions(&other.version, &version) == std::cmp::Ordering::Less
                    {
                        let event = LifecycleEvent {
                            previous_state: other.status,
                            new_state: LifecycleState::Deprecated,
                            action: LifecycleAction::Deprecate,
                            actor: "system".to_string(),
                            at: Utc::now(),
                        };
                        other.status = LifecycleState::Deprecated;
                        other.revision += 1;
                        siblings.push((other.id.clone(), event));
                    }
                }
            }

            let event = LifecycleEvent {
                previous_state,
                new_state,
                action,
                actor: actor.to_string(),
                at: Utc::now(),
            };
            (event, siblings)
        };

        for (sibling_id, sibling_event) in siblings {
            log::info!(
                "deprecated older version {} while publishing {}",
                sibling_id,
                id
            );
            self.append_event(&sibling_id, sibling_event);
        }
        self.append_event(id, event.clone());

        Ok(LifecycleResult {
            state: event.new_state,
            event,
        })
    }

    async fn lifecycle_history(&self, id: &Id, organization: &str) -> Result<Vec<LifecycleEvent>> {
        let known = self
            .descriptors
            .read()
            .get(id)
            .map(|d| d.organization == organization)
            .unwrap_or(false);
        if !known {
            return Err(EngineError::NotFound(id.clone()));
        }
        Ok(self.history.read().get(id).cloned().unwrap_or_default())
    }
}

impl Store for MemoryStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DefinitionKind, ResourceTemplate};

    fn seeded(name: &str, version: &str) -> Descriptor {
        let mut d = Descriptor::new(name, version, "/ctx", "acme", DefinitionKind::Rest);
        d.operations = vec![ResourceTemplate::new("GET", "/a")];
        d
    }

    #[tokio::test]
    async fn save_enforces_compare_and_swap() {
        let store = MemoryStore::new();
        let original = store.insert_descriptor(seeded("Orders", "1.0.0")).await.unwrap();

        let mut first = original.clone();
        first.description = Some("first".to_string());
        store.save_descriptor(first, &original).await.unwrap();

        let mut second = original.clone();
        second.description = Some("second".to_string());
        let err = store.save_descriptor(second, &original).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICTING_UPDATE");
    }

    #[tokio::test]
    async fn save_carries_product_back_references_forward() {
        let store = MemoryStore::new();
        let original = store.insert_descriptor(seeded("Orders", "1.0.0")).await.unwrap();
        assert!(store.register_product_dependency(&original.id, "get", "/a", &"p1".to_string()));

        let stored = store
            .get_descriptor(&original.id, "acme")
            .await
            .unwrap()
            .unwrap();
        let mut updated = stored.clone();
        updated.operations = vec![
            ResourceTemplate::new("GET", "/a"),
            ResourceTemplate::new("POST", "/b"),
        ];
        let saved = store.save_descriptor(updated, &stored).await.unwrap();
        let get_a = saved.operations.iter().find(|t| t.matches("GET", "/a")).unwrap();
        assert_eq!(get_a.used_by, vec!["p1".to_string()]);
        let post_b = saved.operations.iter().find(|t| t.matches("POST", "/b")).unwrap();
        assert!(post_b.used_by.is_empty());
    }

    #[tokio::test]
    async fn publish_with_checklist_deprecates_older_published_versions() {
        let store = MemoryStore::new();
        let mut old = seeded("Orders", "1.0.0");
        old.status = LifecycleState::Published;
        let old = store.insert_descriptor(old).await.unwrap();
        let new = store.insert_descriptor(seeded("Orders", "2.0.0")).await.unwrap();

        let checklist = Checklist::parse("Deprecate Old Versions:true");
        let result = store
            .apply_transition(&new.id, "acme", LifecycleAction::Publish, &checklist, "admin")
            .await
            .unwrap();
        assert_eq!(result.state, LifecycleState::Published);

        let old_now = store.get_descriptor(&old.id, "acme").await.unwrap().unwrap();
        assert_eq!(old_now.status, LifecycleState::Deprecated);
        let old_history = store.lifecycle_history(&old.id, "acme").await.unwrap();
        assert_eq!(old_history.len(), 1);
        assert_eq!(old_history[0].actor, "system");
    }

    #[tokio::test]
    async fn transition_for_another_organization_is_not_found() {
        let store = MemoryStore::new();
        let d = store.insert_descriptor(seeded("Orders", "1.0.0")).await.unwrap();
        let err = store
            .apply_transition(&d.id, "globex", LifecycleAction::Publish, &Checklist::default(), "admin")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        let untouched = store.get_descriptor(&d.id, "acme").await.unwrap().unwrap();
        assert_eq!(untouched.status, LifecycleState::Created);
    }

    #[tokio::test]
    async fn transition_appends_exactly_one_history_entry() {
        let store = MemoryStore::new();
        let d = store.insert_descriptor(seeded("Orders", "1.0.0")).await.unwrap();
        store
            .apply_transition(&d.id, "acme", LifecycleAction::Publish, &Checklist::default(), "admin")
            .await
            .unwrap();
        let history = store.lifecycle_history(&d.id, "acme").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].previous_state, LifecycleState::Created);
        assert_eq!(history[0].new_state, LifecycleState::Published);
    }
}
