pub mod credentials;
pub mod guard;
pub mod lifecycle;
pub mod reconcile;
pub mod regenerate;
pub mod scopes;

pub use credentials::CredentialMigrator;
pub use guard::{ProductResourceGuard, ResourceTemplateMatcher};
pub use lifecycle::LifecycleGate;
pub use reconcile::Reconciler;
pub use regenerate::{DefinitionRegenerator, RegeneratedDefinition};
pub use scopes::{DescriptorField, FieldOverrideResolver, ScopeTable};
