use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::model::{policies_by_key, DefinitionKind, Descriptor, ResourceTemplate};
use crate::schema::{parser_for, AsyncApiParser};

/// Output of a definition regeneration: the new document, the resolved
/// template set and, for WebSocket-style kinds, the rebuilt routing map.
#[derive(Debug, Clone)]
pub struct RegeneratedDefinition {
    pub definition: String,
    pub operations: Vec<ResourceTemplate>,
    pub ws_routing: HashMap<String, String>,
}

/// Orchestrates schema regeneration for a merged descriptor: parse the old
/// document for context, generate a fresh one, re-extract templates and carry
/// operator-attached operation policies forward.
pub struct DefinitionRegenerator;

impl DefinitionRegenerator {
    pub fn regenerate(original: &Descriptor, merged: &Descriptor) -> Result<RegeneratedDefinition> {
        let parser = parser_for(merged.kind);

        if merged.kind.is_async() {
            // Async definitions are replaced wholesale; only templates and the
            // routing map are recomputed.
            let definition = parser.generate(merged, &original.definition)?;
            let operations = parser.extract_templates(&definition)?;
            if operations.is_empty() {
                return Err(EngineError::NoResourcesFound);
            }
            let ws_routing = if merged.kind == DefinitionKind::WebSocket {
                AsyncApiParser::build_routing_map(&definition)?
            } else {
                HashMap::new()
            };
            return Ok(RegeneratedDefinition {
                definition,
                operations,
                ws_routing,
            });
        }

        // Recover definition-type-specific context from the stored document
        // before generating; generate itself carries it into the new one.
        if !original.definition.trim().is_empty() {
            parser.parse(&original.definition)?;
        }
        let definition = parser.generate(merged, &original.definition)?;

        let operations = if merged.kind == DefinitionKind::GraphQl {
            // GraphQL keeps the payload templates; the SDL has no notion of
            // per-operation policies to re-extract.
            merged.operations.clone()
        } else {
            let mut extracted = parser.extract_templates(&definition)?;
            Self::overlay_policies(&mut extracted, &merged.operations);
            extracted
        };
        if operations.is_empty() {
            return Err(EngineError::NoResourcesFound);
        }

        Ok(RegeneratedDefinition {
            definition,
            operations,
            ws_routing: HashMap::new(),
        })
    }

    /// Attach payload-supplied policies to freshly extracted templates with a
    /// matching verb:path key. Templates without a match keep none; the
    /// regenerated document itself has no concept of policies.
    pub fn overlay_policies(extracted: &mut [ResourceTemplate], payload: &[ResourceTemplate]) {
        let by_key = policies_by_key(payload);
        for template in extracted {
            if let Some(policies) = by_key.get(&template.key()) {
                template.policies = policies.clone();
            }
        }
    }
}
