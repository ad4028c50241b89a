use crate::error::Result;
use crate::model::{
    Checklist, Descriptor, Id, LifecycleAction, LifecycleEvent, LifecycleResult,
};

/// Persistence collaborator for descriptors. The engine holds only transient,
/// request-scoped copies; this trait owns the records, the product
/// back-reference sets and the revision check.
#[async_trait::async_trait]
pub trait DescriptorStore: Send + Sync {
    async fn get_descriptor(&self, id: &Id, organization: &str) -> Result<Option<Descriptor>>;

    async fn insert_descriptor(&self, descriptor: Descriptor) -> Result<Descriptor>;

    /// Persist `updated` if and only if the stored revision still matches
    /// `previous.revision`; otherwise fail with `ConflictingUpdate`. The store
    /// carries product back-references forward onto templates that survive
    /// the update.
    async fn save_descriptor(&self, updated: Descriptor, previous: &Descriptor)
        -> Result<Descriptor>;

    async fn delete_descriptor(&self, id: &Id, organization: &str) -> Result<bool>;

    /// Category names known to an organization, for validating references.
    async fn list_categories(&self, organization: &str) -> Result<Vec<String>>;
}

/// Lifecycle collaborator: the transition table query plus the transition
/// write, which may honor checklist behaviors such as deprecating sibling
/// versions.
#[async_trait::async_trait]
pub trait LifecycleStore: Send + Sync {
    async fn allowed_actions(&self, id: &Id, organization: &str) -> Result<Vec<LifecycleAction>>;

    async fn apply_transition(
        &self,
        id: &Id,
        organization: &str,
        action: LifecycleAction,
        checklist: &Checklist,
        actor: &str,
    ) -> Result<LifecycleResult>;

    async fn lifecycle_history(&self, id: &Id, organization: &str) -> Result<Vec<LifecycleEvent>>;
}

pub trait Store: DescriptorStore + LifecycleStore + Send + Sync {}
