pub mod asyncapi;
pub mod graphql;
pub mod openapi;

pub use asyncapi::AsyncApiParser;
pub use graphql::GraphQlParser;
pub use openapi::OpenApiParser;

use crate::error::Result;
use crate::model::{DefinitionKind, Descriptor, ResourceTemplate};

/// Definition-type-specific context recovered from an existing document,
/// carried into regeneration so operator-set metadata survives.
#[derive(Debug, Clone, Default)]
pub struct ParserContext {
    pub base_path: Option<String>,
    /// Root-level `x-` keys of the previous document.
    pub vendor_extensions: serde_json::Map<String, serde_json::Value>,
}

/// Parsing and regeneration capability for one definition grammar. The engine
/// never touches document internals directly; everything flows through this
/// seam.
pub trait DefinitionParser: Send + Sync {
    fn parse(&self, doc: &str) -> Result<ParserContext>;

    /// Produce a new definition document for the merged descriptor. `old_doc`
    /// supplies context to carry forward (vendor extensions, servers).
    fn generate(&self, descriptor: &Descriptor, old_doc: &str) -> Result<String>;

    fn extract_templates(&self, doc: &str) -> Result<Vec<ResourceTemplate>>;
}

pub fn parser_for(kind: DefinitionKind) -> Box<dyn DefinitionParser> {
    match kind {
        DefinitionKind::Rest | DefinitionKind::Soap => Box::new(OpenApiParser),
        DefinitionKind::GraphQl => Box::new(GraphQlParser),
        DefinitionKind::WebSocket
        | DefinitionKind::WebSub
        | DefinitionKind::Sse
        | DefinitionKind::Async => Box::new(AsyncApiParser),
    }
}
