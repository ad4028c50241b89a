use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::model::{same_operations, Descriptor, DescriptorUpdate};

pub const SCOPE_API_MANAGE: &str = "apim:api_manage";
pub const SCOPE_API_CREATE: &str = "apim:api_create";
pub const SCOPE_API_PUBLISH: &str = "apim:api_publish";

/// Updatable descriptor fields, one entry per field of `DescriptorUpdate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorField {
    Name,
    Description,
    Tags,
    Visibility,
    VisibleRoles,
    Categories,
    EndpointConfig,
    Operations,
}

impl DescriptorField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptorField::Name => "name",
            DescriptorField::Description => "description",
            DescriptorField::Tags => "tags",
            DescriptorField::Visibility => "visibility",
            DescriptorField::VisibleRoles => "visibleRoles",
            DescriptorField::Categories => "categories",
            DescriptorField::EndpointConfig => "endpointConfig",
            DescriptorField::Operations => "operations",
        }
    }
}

/// Declarative field-to-scope mapping, built once at startup. Holding the
/// class-level scope grants every field; otherwise a changed field is only
/// accepted when the caller's scopes intersect the field's required set.
#[derive(Debug, Clone)]
pub struct ScopeTable {
    class_scopes: Vec<String>,
    fields: HashMap<DescriptorField, Vec<String>>,
}

impl ScopeTable {
    pub fn standard() -> Self {
        use DescriptorField::*;
        let editor = || vec![SCOPE_API_CREATE.to_string(), SCOPE_API_PUBLISH.to_string()];
        let publisher = || vec![SCOPE_API_PUBLISH.to_string()];
        let creator = || vec![SCOPE_API_CREATE.to_string()];
        let mut fields = HashMap::new();
        fields.insert(Name, editor());
        fields.insert(Description, editor());
        fields.insert(Tags, editor());
        fields.insert(Visibility, publisher());
        fields.insert(VisibleRoles, publisher());
        fields.insert(Categories, publisher());
        fields.insert(EndpointConfig, creator());
        fields.insert(Operations, creator());
        Self {
            class_scopes: vec![SCOPE_API_MANAGE.to_string()],
            fields,
        }
    }

    pub fn has_class_scope(&self, granted: &[String]) -> bool {
        self.class_scopes.iter().any(|s| granted.contains(s))
    }

    pub fn required_for(&self, field: DescriptorField) -> &[String] {
        self.fields.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    fn permits(&self, field: DescriptorField, granted: &[String]) -> bool {
        self.required_for(field).iter().any(|s| granted.contains(s))
    }
}

impl Default for ScopeTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Pure merge of a partial update over a stored descriptor under field-level
/// authorization. No side effects; the caller decides what to do with the
/// merged record.
#[derive(Debug, Clone, Default)]
pub struct FieldOverrideResolver {
    table: ScopeTable,
}

impl FieldOverrideResolver {
    pub fn new(table: ScopeTable) -> Self {
        Self { table }
    }

    pub fn merge(
        &self,
        stored: &Descriptor,
        update: &DescriptorUpdate,
        granted: &[String],
    ) -> Result<Descriptor> {
        let unrestricted = self.table.has_class_scope(granted);
        let mut merged = stored.clone();

        self.apply(
            DescriptorField::Name,
            unrestricted,
            granted,
            update.name.as_ref().filter(|v| **v != stored.name),
            |value| merged.name = value.clone(),
        )?;
        self.apply(
            DescriptorField::Description,
            unrestricted,
            granted,
            update
                .description
                .as_ref()
                .filter(|v| Some(*v) != stored.description.as_ref()),
            |value| merged.description = Some(value.clone()),
        )?;
        self.apply(
            DescriptorField::Tags,
            unrestricted,
            granted,
            update.tags.as_ref().filter(|v| **v != stored.tags),
            |value| merged.tags = value.clone(),
        )?;
        self.apply(
            DescriptorField::Visibility,
            unrestricted,
            granted,
            update.visibility.as_ref().filter(|v| **v != stored.visibility),
            |value| merged.visibility = *value,
        )?;
        self.apply(
            DescriptorField::VisibleRoles,
            unrestricted,
            granted,
            update
                .visible_roles
                .as_ref()
                .filter(|v| **v != stored.visible_roles),
            |value| merged.visible_roles = value.clone(),
        )?;
        self.apply(
            DescriptorField::Categories,
            unrestricted,
            granted,
            update
                .categories
                .as_ref()
                .filter(|v| **v != stored.categories),
            |value| merged.categories = value.clone(),
        )?;
        self.apply(
            DescriptorField::EndpointConfig,
            unrestricted,
            granted,
            update
                .endpoint_config
                .as_ref()
                .filter(|v| Some(*v) != stored.endpoint_config.as_ref()),
            |value| merged.endpoint_config = Some(value.clone()),
        )?;
        self.apply(
            DescriptorField::Operations,
            unrestricted,
            granted,
            update
                .operations
                .as_ref()
                .filter(|v| !same_operations(v, &stored.operations)),
            |value| merged.operations = value.clone(),
        )?;

        Ok(merged)
    }

    /// `changed` is Some only when the incoming value is present and differs
    /// structurally from the stored one; unchanged fields are never
    /// scope-checked.
    fn apply<T>(
        &self,
        field: DescriptorField,
        unrestricted: bool,
        granted: &[String],
        changed: Option<&T>,
        mut adopt: impl FnMut(&T),
    ) -> Result<()> {
        if let Some(value) = changed {
            if !unrestricted && !self.table.permits(field, granted) {
                return Err(EngineError::ScopeDenied {
                    field: field.as_str().to_string(),
                    required: self.table.required_for(field).to_vec(),
                });
            }
            adopt(value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DefinitionKind, ResourceTemplate, Visibility};

    fn stored() -> Descriptor {
        let mut d = Descriptor::new("Orders", "1.0.0", "/orders", "acme", DefinitionKind::Rest);
        d.tags = vec!["sales".to_string()];
        d.operations = vec![ResourceTemplate::new("GET", "/a")];
        d
    }

    fn scopes(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn changed_field_without_required_scope_is_denied() {
        let resolver = FieldOverrideResolver::default();
        let update = DescriptorUpdate {
            visibility: Some(Visibility::Private),
            ..Default::default()
        };
        let err = resolver
            .merge(&stored(), &update, &scopes(&[SCOPE_API_CREATE]))
            .unwrap_err();
        match err {
            EngineError::ScopeDenied { field, required } => {
                assert_eq!(field, "visibility");
                assert_eq!(required, vec![SCOPE_API_PUBLISH.to_string()]);
            }
            other => panic!("expected ScopeDenied, got {other:?}"),
        }
    }

    #[test]
    fn class_scope_bypasses_per_field_checks() {
        let resolver = FieldOverrideResolver::default();
        let update = DescriptorUpdate {
            visibility: Some(Visibility::Private),
            name: Some("Renamed".to_string()),
            ..Default::default()
        };
        let merged = resolver
            .merge(&stored(), &update, &scopes(&[SCOPE_API_MANAGE]))
            .unwrap();
        assert_eq!(merged.name, "Renamed");
        assert_eq!(merged.visibility, Visibility::Private);
    }

    #[test]
    fn unchanged_field_is_never_scope_checked() {
        let resolver = FieldOverrideResolver::default();
        // Echoes the stored visibility; no publish scope held, still fine.
        let update = DescriptorUpdate {
            visibility: Some(Visibility::Public),
            description: Some("about orders".to_string()),
            ..Default::default()
        };
        let merged = resolver
            .merge(&stored(), &update, &scopes(&[SCOPE_API_CREATE]))
            .unwrap();
        assert_eq!(merged.description.as_deref(), Some("about orders"));
        assert_eq!(merged.visibility, Visibility::Public);
    }

    #[test]
    fn absent_fields_keep_stored_values() {
        let resolver = FieldOverrideResolver::default();
        let stored = stored();
        let merged = resolver
            .merge(&stored, &DescriptorUpdate::default(), &scopes(&[]))
            .unwrap();
        assert_eq!(merged, stored);
    }

    #[test]
    fn echoed_update_is_idempotent_without_any_scopes() {
        let resolver = FieldOverrideResolver::default();
        let stored = stored();
        let echo = DescriptorUpdate::from_descriptor(&stored);
        let merged = resolver.merge(&stored, &echo, &scopes(&[])).unwrap();
        assert_eq!(merged, stored);
    }

    #[test]
    fn operations_change_requires_create_scope() {
        let resolver = FieldOverrideResolver::default();
        let update = DescriptorUpdate {
            operations: Some(vec![ResourceTemplate::new("POST", "/b")]),
            ..Default::default()
        };
        let err = resolver
            .merge(&stored(), &update, &scopes(&[SCOPE_API_PUBLISH]))
            .unwrap_err();
        assert_eq!(err.code(), "SCOPE_DENIED");

        let merged = resolver
            .merge(&stored(), &update, &scopes(&[SCOPE_API_CREATE]))
            .unwrap();
        assert_eq!(merged.operations[0].key(), "POST:/b");
    }
}
