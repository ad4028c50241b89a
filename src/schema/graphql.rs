use crate::error::{EngineError, Result};
use crate::model::{Descriptor, ResourceTemplate};
use crate::schema::{DefinitionParser, ParserContext};

const ROOT_TYPES: [&str; 3] = ["Query", "Mutation", "Subscription"];

/// GraphQL SDL handling. Operations are the fields of the three root types;
/// the verb is the root type name uppercased, the path is the field name.
pub struct GraphQlParser;

impl GraphQlParser {
    fn field_name(line: &str) -> Option<&str> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('}') {
            return None;
        }
        let name = trimmed
            .split(|c: char| c == '(' || c == ':' || c.is_whitespace())
            .next()?;
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }
        Some(name)
    }
}

impl DefinitionParser for GraphQlParser {
    fn parse(&self, doc: &str) -> Result<ParserContext> {
        if doc.trim().is_empty() {
            return Err(EngineError::DefinitionParse(
                "GraphQL schema cannot be empty".to_string(),
            ));
        }
        let opens = doc.matches('{').count();
        let closes = doc.matches('}').count();
        if opens != closes {
            return Err(EngineError::DefinitionParse(
                "unbalanced braces in GraphQL schema".to_string(),
            ));
        }
        Ok(ParserContext::default())
    }

    /// The SDL is operator-authored; regeneration keeps the stored schema
    /// text rather than synthesizing one from the record.
    fn generate(&self, descriptor: &Descriptor, old_doc: &str) -> Result<String> {
        let doc = if descriptor.definition.trim().is_empty() {
            old_doc
        } else {
            &descriptor.definition
        };
        self.parse(doc)?;
        Ok(doc.to_string())
    }

    fn extract_templates(&self, doc: &str) -> Result<Vec<ResourceTemplate>> {
        self.parse(doc)?;
        let mut templates = Vec::new();
        let mut current_root: Option<&str> = None;
        let mut depth = 0usize;
        for line in doc.lines() {
            let trimmed = line.trim();
            if current_root.is_none() {
                for root in ROOT_TYPES {
                    if trimmed.starts_with(&format!("type {root}"))
                        || trimmed.starts_with(&format!("extend type {root}"))
                    {
                        current_root = Some(root);
                        depth = trimmed.matches('{').count();
                        break;
                    }
                }
                continue;
            }
            depth += trimmed.matches('{').count();
            depth = depth.saturating_sub(trimmed.matches('}').count());
            if depth == 0 {
                current_root = None;
                continue;
            }
            if let (Some(root), Some(field)) = (current_root, Self::field_name(trimmed)) {
                templates.push(ResourceTemplate::new(root.to_uppercase(), field));
            }
        }
        Ok(templates)
    }
}
