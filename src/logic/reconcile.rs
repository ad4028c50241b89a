use crate::error::{EngineError, Result};
use crate::logic::credentials::CredentialMigrator;
use crate::logic::guard::ProductResourceGuard;
use crate::logic::regenerate::DefinitionRegenerator;
use crate::logic::scopes::FieldOverrideResolver;
use crate::model::{
    DefinitionKind, Descriptor, DescriptorUpdate, Id, NewDescriptor, Visibility,
};
use crate::schema::{parser_for, AsyncApiParser, OpenApiParser};
use crate::store::Store;
use crate::vault::CredentialVault;

/// Orchestrates a full descriptor update: scope-checked merge, definition
/// regeneration, product-resource guard, category validation and credential
/// migration, in that order, with nothing written until every stage has
/// passed. A failing persistence write after the checks surfaces as is (the
/// caller owns any retry).
pub struct Reconciler;

impl Reconciler {
    pub async fn reconcile<S: Store>(
        store: &S,
        vault: &dyn CredentialVault,
        resolver: &FieldOverrideResolver,
        id: &Id,
        organization: &str,
        update: &DescriptorUpdate,
        caller_scopes: &[String],
    ) -> Result<Descriptor> {
        let original = store
            .get_descriptor(id, organization)
            .await?
            .ok_or_else(|| EngineError::NotFound(id.clone()))?;

        let mut merged = resolver.merge(&original, update, caller_scopes)?;

        // Identity and lifecycle fields are pinned; an update can never move
        // a descriptor to another version, context, kind or state.
        merged.id = original.id.clone();
        merged.version = original.version.clone();
        merged.context = original.context.clone();
        merged.kind = original.kind;
        merged.organization = original.organization.clone();
        merged.status = original.status;
        merged.definition = original.definition.clone();

        if merged.visibility == Visibility::Public {
            merged.visible_roles.clear();
        }

        if merged.operations.is_empty() {
            return Err(EngineError::NoResourcesFound);
        }

        let regenerated = DefinitionRegenerator::regenerate(&original, &merged)?;
        ProductResourceGuard::check(&original, &regenerated.operations)?;
        Self::validate_categories(store, organization, &merged.categories).await?;

        merged.endpoint_config = CredentialMigrator::migrate(
            vault,
            merged.endpoint_config.take(),
            original.endpoint_config.as_ref(),
        )?;

        merged.definition = regenerated.definition;
        merged.operations = regenerated.operations;
        merged.ws_routing = regenerated.ws_routing;

        log::info!(
            "reconciled descriptor {} ({} operation(s))",
            merged.id,
            merged.operations.len()
        );
        store.save_descriptor(merged, &original).await
    }

    /// Replace a descriptor's definition with an externally validated
    /// document: re-extract templates, guard product-referenced resources and
    /// carry the stored per-operation policies onto matching templates.
    pub async fn regenerate_definition<S: Store>(
        store: &S,
        id: &Id,
        organization: &str,
        validated_definition: &str,
    ) -> Result<String> {
        let existing = store
            .get_descriptor(id, organization)
            .await?
            .ok_or_else(|| EngineError::NotFound(id.clone()))?;

        let parser = parser_for(existing.kind);
        let mut templates = parser.extract_templates(validated_definition)?;
        if templates.is_empty() {
            return Err(EngineError::NoResourcesFound);
        }
        ProductResourceGuard::check(&existing, &templates)?;
        DefinitionRegenerator::overlay_policies(&mut templates, &existing.operations);

        let mut updated = existing.clone();
        // Vendor-extension carry-forward only applies to the JSON grammars.
        updated.definition = match existing.kind {
            DefinitionKind::Rest | DefinitionKind::Soap
                if !existing.definition.trim().is_empty() =>
            {
                OpenApiParser::copy_vendor_extensions(&existing.definition, validated_definition)?
            }
            _ => validated_definition.to_string(),
        };
        updated.operations = templates;
        if existing.kind == DefinitionKind::WebSocket {
            updated.ws_routing = AsyncApiParser::build_routing_map(validated_definition)?;
        }

        let saved = store.save_descriptor(updated, &existing).await?;
        Ok(saved.definition)
    }

    /// Create a descriptor in the CREATED state, generating a definition from
    /// the supplied operations when the payload carries none.
    pub async fn create<S: Store>(
        store: &S,
        vault: &dyn CredentialVault,
        organization: &str,
        new: NewDescriptor,
    ) -> Result<Descriptor> {
        if new.operations.is_empty() {
            return Err(EngineError::NoResourcesFound);
        }
        Self::validate_categories(store, organization, &new.categories).await?;

        let mut descriptor = Descriptor::new(
            new.name,
            new.version,
            new.context,
            organization,
            new.kind,
        );
        descriptor.description = new.description;
        descriptor.operations = new.operations;
        descriptor.categories = new.categories;
        descriptor.visibility = new.visibility;
        descriptor.visible_roles = if new.visibility == Visibility::Public {
            Vec::new()
        } else {
            new.visible_roles
        };
        descriptor.tags = new.tags;
        descriptor.endpoint_config =
            CredentialMigrator::migrate(vault, new.endpoint_config, None)?;

        let parser = parser_for(descriptor.kind);
        descriptor.definition = match new.definition {
            Some(doc) => {
                parser.parse(&doc)?;
                doc
            }
            None => parser.generate(&descriptor, "")?,
        };
        if descriptor.kind == DefinitionKind::WebSocket {
            descriptor.ws_routing = AsyncApiParser::build_routing_map(&descriptor.definition)?;
        }

        store.insert_descriptor(descriptor).await
    }

    async fn validate_categories<S: Store>(
        store: &S,
        organization: &str,
        categories: &[String],
    ) -> Result<()> {
        if categories.is_empty() {
            return Ok(());
        }
        let known = store.list_categories(organization).await?;
        let unknown: Vec<String> = categories
            .iter()
            .filter(|c| !known.contains(c))
            .cloned()
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(EngineError::CategoryInvalid {
                names: unknown,
                organization: organization.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::scopes::SCOPE_API_MANAGE;
    use crate::model::{
        DefinitionKind, EndpointConfig, EndpointSecurity, ResourceTemplate, SecurityBlock,
        SecurityKind,
    };
    use crate::store::{DescriptorStore, MemoryStore};
    use crate::vault::Base64Vault;

    fn manage_scope() -> Vec<String> {
        vec![SCOPE_API_MANAGE.to_string()]
    }

    async fn seeded(store: &MemoryStore) -> Descriptor {
        let new = NewDescriptor {
            name: "Orders".to_string(),
            version: "1.0.0".to_string(),
            context: "/orders".to_string(),
            kind: DefinitionKind::Rest,
            description: None,
            definition: None,
            operations: vec![
                ResourceTemplate::new("GET", "/a"),
                ResourceTemplate::new("POST", "/b"),
            ],
            endpoint_config: None,
            categories: Vec::new(),
            visibility: Default::default(),
            visible_roles: Vec::new(),
            tags: Vec::new(),
        };
        Reconciler::create(store, &Base64Vault, "acme", new)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn echoed_update_is_idempotent() {
        let store = MemoryStore::new();
        let original = seeded(&store).await;
        let echo = DescriptorUpdate::from_descriptor(&original);
        let result = Reconciler::reconcile(
            &store,
            &Base64Vault,
            &FieldOverrideResolver::default(),
            &original.id,
            "acme",
            &echo,
            &[],
        )
        .await
        .unwrap();
        assert_eq!(result.name, original.name);
        assert_eq!(result.definition, original.definition);
        assert!(crate::model::same_operations(
            &result.operations,
            &original.operations
        ));
    }

    #[tokio::test]
    async fn scope_denied_update_leaves_the_stored_descriptor_unchanged() {
        let store = MemoryStore::new();
        let original = seeded(&store).await;
        let update = DescriptorUpdate {
            name: Some("Renamed".to_string()),
            ..Default::default()
        };
        let err = Reconciler::reconcile(
            &store,
            &Base64Vault,
            &FieldOverrideResolver::default(),
            &original.id,
            "acme",
            &update,
            &[],
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "SCOPE_DENIED");

        let stored = store
            .get_descriptor(&original.id, "acme")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, original);
    }

    #[tokio::test]
    async fn removing_a_product_used_template_fails_with_the_exact_list() {
        let store = MemoryStore::new();
        let original = seeded(&store).await;
        store.register_product_dependency(&original.id, "GET", "/a", &"product-p".to_string());

        let update = DescriptorUpdate {
            operations: Some(vec![ResourceTemplate::new("POST", "/b")]),
            ..Default::default()
        };
        let err = Reconciler::reconcile(
            &store,
            &Base64Vault,
            &FieldOverrideResolver::default(),
            &original.id,
            "acme",
            &update,
            &manage_scope(),
        )
        .await
        .unwrap_err();
        match err {
            EngineError::ResourceInUse { resources, .. } => {
                assert_eq!(resources, vec!["GET:/a".to_string()]);
            }
            other => panic!("expected ResourceInUse, got {other:?}"),
        }

        // Atomicity: nothing was persisted.
        let stored = store
            .get_descriptor(&original.id, "acme")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.operations.len(), 2);
    }

    #[tokio::test]
    async fn empty_operations_update_is_no_resources_found() {
        let store = MemoryStore::new();
        let original = seeded(&store).await;
        let update = DescriptorUpdate {
            operations: Some(Vec::new()),
            ..Default::default()
        };
        let err = Reconciler::reconcile(
            &store,
            &Base64Vault,
            &FieldOverrideResolver::default(),
            &original.id,
            "acme",
            &update,
            &manage_scope(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "NO_RESOURCES_FOUND");
    }

    #[tokio::test]
    async fn unknown_categories_are_rejected() {
        let store = MemoryStore::new();
        store.register_categories("acme", vec!["commerce".to_string()]);
        let original = seeded(&store).await;
        let update = DescriptorUpdate {
            categories: Some(vec!["commerce".to_string(), "weather".to_string()]),
            ..Default::default()
        };
        let err = Reconciler::reconcile(
            &store,
            &Base64Vault,
            &FieldOverrideResolver::default(),
            &original.id,
            "acme",
            &update,
            &manage_scope(),
        )
        .await
        .unwrap_err();
        match err {
            EngineError::CategoryInvalid { names, .. } => {
                assert_eq!(names, vec!["weather".to_string()]);
            }
            other => panic!("expected CategoryInvalid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn omitted_secret_keeps_the_stored_ciphertext() {
        let store = MemoryStore::new();
        let vault = Base64Vault;
        let mut new_payload = NewDescriptor {
            name: "Orders".to_string(),
            version: "1.0.0".to_string(),
            context: "/orders".to_string(),
            kind: DefinitionKind::Rest,
            description: None,
            definition: None,
            operations: vec![ResourceTemplate::new("GET", "/a")],
            endpoint_config: None,
            categories: Vec::new(),
            visibility: Default::default(),
            visible_roles: Vec::new(),
            tags: Vec::new(),
        };
        new_payload.endpoint_config = Some(EndpointConfig {
            endpoint_type: "http".to_string(),
            production_url: Some("https://backend".to_string()),
            sandbox_url: None,
            security: Some(EndpointSecurity {
                production: Some(SecurityBlock {
                    kind: SecurityKind::Oauth,
                    client_id: Some("client".to_string()),
                    client_secret: Some("initial-secret".to_string()),
                    token_url: None,
                    custom_parameters: None,
                }),
                sandbox: None,
            }),
        });
        let original = Reconciler::create(&store, &vault, "acme", new_payload)
            .await
            .unwrap();
        let stored_cipher = original
            .endpoint_config
            .as_ref()
            .unwrap()
            .security
            .as_ref()
            .unwrap()
            .production
            .as_ref()
            .unwrap()
            .client_secret
            .clone()
            .unwrap();
        assert_eq!(vault.decrypt(&stored_cipher).unwrap(), "initial-secret");

        // Update echoes the endpoint config but omits the secret.
        let mut echo = DescriptorUpdate::from_descriptor(&original);
        if let Some(config) = &mut echo.endpoint_config {
            if let Some(security) = &mut config.security {
                if let Some(production) = &mut security.production {
                    production.client_secret = None;
                }
            }
        }
        let result = Reconciler::reconcile(
            &store,
            &vault,
            &FieldOverrideResolver::default(),
            &original.id,
            "acme",
            &echo,
            &manage_scope(),
        )
        .await
        .unwrap();
        let carried = result
            .endpoint_config
            .unwrap()
            .security
            .unwrap()
            .production
            .unwrap()
            .client_secret
            .unwrap();
        assert_eq!(carried, stored_cipher);
    }

    #[tokio::test]
    async fn rename_only_update_keeps_the_stored_secret_decryptable() {
        let store = MemoryStore::new();
        let vault = Base64Vault;
        let mut payload = NewDescriptor {
            name: "Orders".to_string(),
            version: "1.0.0".to_string(),
            context: "/orders".to_string(),
            kind: DefinitionKind::Rest,
            description: None,
            definition: None,
            operations: vec![ResourceTemplate::new("GET", "/a")],
            endpoint_config: None,
            categories: Vec::new(),
            visibility: Default::default(),
            visible_roles: Vec::new(),
            tags: Vec::new(),
        };
        payload.endpoint_config = Some(EndpointConfig {
            endpoint_type: "http".to_string(),
            production_url: Some("https://backend".to_string()),
            sandbox_url: None,
            security: Some(EndpointSecurity {
                production: Some(SecurityBlock {
                    kind: SecurityKind::Oauth,
                    client_id: Some("client".to_string()),
                    client_secret: Some("initial-secret".to_string()),
                    token_url: None,
                    custom_parameters: None,
                }),
                sandbox: None,
            }),
        });
        let original = Reconciler::create(&store, &vault, "acme", payload)
            .await
            .unwrap();
        let cipher_of = |d: &Descriptor| {
            d.endpoint_config
                .as_ref()
                .unwrap()
                .security
                .as_ref()
                .unwrap()
                .production
                .as_ref()
                .unwrap()
                .client_secret
                .clone()
                .unwrap()
        };
        let stored_cipher = cipher_of(&original);

        // The update does not touch the endpoint config at all.
        let update = DescriptorUpdate {
            name: Some("Renamed".to_string()),
            ..Default::default()
        };
        let result = Reconciler::reconcile(
            &store,
            &vault,
            &FieldOverrideResolver::default(),
            &original.id,
            "acme",
            &update,
            &manage_scope(),
        )
        .await
        .unwrap();

        // The carried ciphertext is bit-identical and still decrypts to the
        // plaintext, even after a second unrelated update.
        assert_eq!(cipher_of(&result), stored_cipher);
        assert_eq!(vault.decrypt(&stored_cipher).unwrap(), "initial-secret");

        let again = Reconciler::reconcile(
            &store,
            &vault,
            &FieldOverrideResolver::default(),
            &result.id,
            "acme",
            &DescriptorUpdate {
                description: Some("about orders".to_string()),
                ..Default::default()
            },
            &manage_scope(),
        )
        .await
        .unwrap();
        assert_eq!(cipher_of(&again), stored_cipher);
    }

    #[tokio::test]
    async fn stale_revision_update_is_a_conflict() {
        let store = MemoryStore::new();
        let original = seeded(&store).await;
        let resolver = FieldOverrideResolver::default();

        let first = DescriptorUpdate {
            description: Some("first".to_string()),
            ..Default::default()
        };
        Reconciler::reconcile(
            &store,
            &Base64Vault,
            &resolver,
            &original.id,
            "acme",
            &first,
            &manage_scope(),
        )
        .await
        .unwrap();

        // Second caller still holds the original revision.
        let second = DescriptorUpdate {
            description: Some("second".to_string()),
            ..Default::default()
        };
        let err = {
            // Simulate a stale read by rebuilding the pipeline against the
            // captured original record.
            let merged = resolver.merge(&original, &second, &manage_scope()).unwrap();
            store.save_descriptor(merged, &original).await.unwrap_err()
        };
        assert_eq!(err.code(), "CONFLICTING_UPDATE");
    }

    #[tokio::test]
    async fn regenerate_definition_carries_stored_policies_forward() {
        let store = MemoryStore::new();
        let original = seeded(&store).await;

        // Attach a policy to POST:/b through a reconcile first.
        let mut ops = original.operations.clone();
        for op in &mut ops {
            if op.key() == "POST:/b" {
                op.policies.push(crate::model::OperationPolicy {
                    name: "rateLimit".to_string(),
                    version: "v1".to_string(),
                    direction: Default::default(),
                    parameters: Default::default(),
                });
            }
        }
        let update = DescriptorUpdate {
            operations: Some(ops),
            ..Default::default()
        };
        Reconciler::reconcile(
            &store,
            &Base64Vault,
            &FieldOverrideResolver::default(),
            &original.id,
            "acme",
            &update,
            &manage_scope(),
        )
        .await
        .unwrap();

        let validated = serde_json::to_string(&serde_json::json!({
            "openapi": "3.0.1",
            "info": { "title": "Orders", "version": "1.0.0" },
            "paths": { "/a": { "get": {} }, "/b": { "post": {} }, "/c": { "put": {} } }
        }))
        .unwrap();
        Reconciler::regenerate_definition(&store, &original.id, "acme", &validated)
            .await
            .unwrap();

        let stored = store
            .get_descriptor(&original.id, "acme")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.operations.len(), 3);
        let post_b = stored
            .operations
            .iter()
            .find(|t| t.key() == "POST:/b")
            .unwrap();
        assert_eq!(post_b.policies.len(), 1);
        let put_c = stored
            .operations
            .iter()
            .find(|t| t.key() == "PUT:/c")
            .unwrap();
        assert!(put_c.policies.is_empty());
    }

    #[tokio::test]
    async fn public_visibility_clears_visible_roles() {
        let store = MemoryStore::new();
        let original = seeded(&store).await;
        let update = DescriptorUpdate {
            visibility: Some(Visibility::Public),
            visible_roles: Some(vec!["internal".to_string()]),
            ..Default::default()
        };
        let result = Reconciler::reconcile(
            &store,
            &Base64Vault,
            &FieldOverrideResolver::default(),
            &original.id,
            "acme",
            &update,
            &manage_scope(),
        )
        .await
        .unwrap();
        assert!(result.visible_roles.is_empty());
    }
}
