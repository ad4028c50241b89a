use crate::error::{EngineError, Result};
use crate::model::{Descriptor, ResourceTemplate};

/// Verb+path matching between template sets, case-insensitive on both sides.
pub struct ResourceTemplateMatcher;

impl ResourceTemplateMatcher {
    pub fn contains(set: &[ResourceTemplate], verb: &str, path: &str) -> bool {
        set.iter().any(|t| t.matches(verb, path))
    }
}

/// Protects composite products from updates that would silently drop resource
/// templates they reference. Runs strictly before any persistence step.
pub struct ProductResourceGuard;

impl ProductResourceGuard {
    /// Existing templates that are referenced by at least one product and have
    /// no match in the updated set.
    pub fn removed_product_resources<'a>(
        existing: &'a [ResourceTemplate],
        updated: &[ResourceTemplate],
    ) -> Vec<&'a ResourceTemplate> {
        existing
            .iter()
            .filter(|t| !t.used_by.is_empty())
            .filter(|t| !ResourceTemplateMatcher::contains(updated, &t.verb, &t.path))
            .collect()
    }

    pub fn check(descriptor: &Descriptor, updated: &[ResourceTemplate]) -> Result<()> {
        let removed = Self::removed_product_resources(&descriptor.operations, updated);
        if removed.is_empty() {
            return Ok(());
        }
        Err(EngineError::ResourceInUse {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            resources: removed.iter().map(|t| t.key()).collect(),
        })
    }
}
