use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::model::{Descriptor, ResourceTemplate};
use crate::schema::{DefinitionParser, ParserContext};

pub const VERB_SUBSCRIBE: &str = "SUBSCRIBE";
pub const VERB_PUBLISH: &str = "PUBLISH";

/// AsyncAPI document handling for event-driven descriptors (WS, WebSub, SSE).
/// The document body is replaced wholesale on update; this parser only reads
/// channels to extract resource templates and the routing map.
pub struct AsyncApiParser;

impl AsyncApiParser {
    fn parse_root(doc: &str) -> Result<Map<String, Value>> {
        let value: Value = serde_json::from_str(doc)
            .map_err(|e| EngineError::DefinitionParse(e.to_string()))?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(EngineError::DefinitionParse(
                "definition root must be a JSON object".to_string(),
            )),
        }
    }

    /// Map each channel to its backend routing target, taken from the
    /// channel's `x-uri-mapping` extension when present. Channels without a
    /// mapping are routed by their own name.
    pub fn build_routing_map(doc: &str) -> Result<HashMap<String, String>> {
        let root = Self::parse_root(doc)?;
        let mut routing = HashMap::new();
        if let Some(Value::Object(channels)) = root.get("channels") {
            for (channel, item) in channels {
                let target = item
                    .get("x-uri-mapping")
                    .and_then(|v| v.as_str())
                    .unwrap_or(channel);
                routing.insert(channel.clone(), target.to_string());
            }
        }
        Ok(routing)
    }
}

impl DefinitionParser for AsyncApiParser {
    fn parse(&self, doc: &str) -> Result<ParserContext> {
        let root = Self::parse_root(doc)?;
        let vendor_extensions = root
            .into_iter()
            .filter(|(k, _)| k.starts_with("x-"))
            .collect();
        Ok(ParserContext {
            base_path: None,
            vendor_extensions,
        })
    }

    /// Refresh the info block of the old document from the merged record. The
    /// channel set itself comes from the caller-validated document and is not
    /// merged here.
    fn generate(&self, descriptor: &Descriptor, old_doc: &str) -> Result<String> {
        let mut root = if old_doc.trim().is_empty() {
            let mut fresh = Map::new();
            fresh.insert("asyncapi".to_string(), json!("2.6.0"));
            fresh.insert("channels".to_string(), Value::Object(Map::new()));
            fresh
        } else {
            Self::parse_root(old_doc)?
        };
        root.insert(
            "info".to_string(),
            json!({ "title": descriptor.name, "version": descriptor.version }),
        );
        serde_json::to_string(&Value::Object(root))
            .map_err(|e| EngineError::DefinitionParse(e.to_string()))
    }

    fn extract_templates(&self, doc: &str) -> Result<Vec<ResourceTemplate>> {
        let root = Self::parse_root(doc)?;
        let mut templates = Vec::new();
        if let Some(Value::Object(channels)) = root.get("channels") {
            for (channel, item) in channels {
                let Value::Object(item) = item else { continue };
                if item.contains_key("subscribe") {
                    templates.push(ResourceTemplate::new(VERB_SUBSCRIBE, channel.clone()));
                }
                if item.contains_key("publish") {
                    templates.push(ResourceTemplate::new(VERB_PUBLISH, channel.clone()));
                }
            }
        }
        Ok(templates)
    }
}
