use serde_json::{json, Map, Value};

use crate::error::{EngineError, Result};
use crate::model::{Descriptor, ResourceTemplate};
use crate::schema::{DefinitionParser, ParserContext};

const HTTP_VERBS: [&str; 7] = ["get", "put", "post", "delete", "patch", "head", "options"];

/// OpenAPI 3 document handling for REST and SOAP-fronting descriptors. Only
/// the management-relevant parts of the grammar are interpreted: info, paths,
/// servers and root vendor extensions.
pub struct OpenApiParser;

impl OpenApiParser {
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

    /// Copy root-level `x-` keys from `old_doc` into `new_doc`, keeping values
    /// already present in the new document. Used when a validated definition
    /// replaces the stored one.
    pub fn copy_vendor_extensions(old_doc: &str, new_doc: &str) -> Result<String> {
        let old = Self::parse_root(old_doc)?;
        let mut new = Self::parse_root(new_doc)?;
        for (key, value) in old {
            if key.starts_with("x-") && !new.contains_key(&key) {
                new.insert(key, value);
            }
        }
        serde_json::to_string(&Value::Object(new))
            .map_err(|e| EngineError::DefinitionParse(e.to_string()))
    }
}

impl DefinitionParser for OpenApiParser {
    fn parse(&self, doc: &str) -> Result<ParserContext> {
        let root = Self::parse_root(doc)?;
        let base_path = root
            .get("servers")
            .and_then(|s| s.as_array())
            .and_then(|servers| servers.first())
            .and_then(|server| server.get("url"))
            .and_then(|url| url.as_str())
            .map(ToString::to_string);
        let vendor_extensions = root
            .into_iter()
            .filter(|(k, _)| k.starts_with("x-"))
            .collect();
        Ok(ParserContext {
            base_path,
            vendor_extensions,
        })
    }

    fn generate(&self, descriptor: &Descriptor, old_doc: &str) -> Result<String> {
        let context = if old_doc.trim().is_empty() {
            ParserContext::default()
        } else {
            self.parse(old_doc)?
        };

        let mut paths = Map::new();
        for template in &descriptor.operations {
            let entry = paths
                .entry(template.path.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(path_item) = entry {
                path_item.insert(
                    template.verb.to_lowercase(),
                    json!({
                        "responses": { "200": { "description": "OK" } },
                        "x-auth-type": "Application & Application User"
                    }),
                );
            }
        }

        let mut info = Map::new();
        info.insert("title".to_string(), json!(descriptor.name));
        info.insert("version".to_string(), json!(descriptor.version));
        if let Some(description) = &descriptor.description {
            info.insert("description".to_string(), json!(description));
        }

        let mut root = Map::new();
        root.insert("openapi".to_string(), json!("3.0.1"));
        root.insert("info".to_string(), Value::Object(info));
        root.insert(
            "servers".to_string(),
            json!([{ "url": context.base_path.unwrap_or_else(|| descriptor.context.clone()) }]),
        );
        root.insert("paths".to_string(), Value::Object(paths));
        for (key, value) in context.vendor_extensions {
            root.insert(key, value);
        }

        serde_json::to_string(&Value::Object(root))
            .map_err(|e| EngineError::DefinitionParse(e.to_string()))
    }

    fn extract_templates(&self, doc: &str) -> Result<Vec<ResourceTemplate>> {
        let root = Self::parse_root(doc)?;
        let mut templates = Vec::new();
        if let Some(Value::Object(paths)) = root.get("paths") {
            for (path, item) in paths {
                let Value::Object(item) = item else { continue };
                for verb in HTTP_VERBS {
                    if item.contains_key(verb) {
                        templates.push(ResourceTemplate::new(verb.to_uppercase(), path.clone()));
                    }
                }
            }
        }
        Ok(templates)
    }
}
