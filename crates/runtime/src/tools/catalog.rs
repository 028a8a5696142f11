//! Combined tool catalog across all connected providers.
//!
//! Tools are advertised to the model under qualified names of the form
//! `provider__tool`, so two servers may expose tools with the same name.

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::errors::RouteError;
use super::registry::SessionRegistry;
use crate::model::ToolDescriptor;

/// Joins the provider and tool parts of a qualified name.
pub const SEPARATOR: &str = "__";

pub fn qualify(provider: &str, tool: &str) -> String {
    format!("{provider}{SEPARATOR}{tool}")
}

/// Split a qualified name into `(provider, tool)`.
///
/// The name must split into exactly two parts on [`SEPARATOR`].
pub fn parse_qualified(name: &str) -> Result<(&str, &str), RouteError> {
    let mut parts = name.split(SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(provider), Some(tool), None) => Ok((provider, tool)),
        _ => Err(RouteError::InvalidName(name.to_string())),
    }
}

/// Whether `provider` and `tool` survive a qualify/parse round trip.
///
/// Names containing [`SEPARATOR`], or a provider ending in `_`, produce
/// qualified names that route somewhere else or nowhere.
pub fn is_routable(provider: &str, tool: &str) -> bool {
    matches!(parse_qualified(&qualify(provider, tool)), Ok(parts) if parts == (provider, tool))
}

/// Query every provider and merge their tools.
///
/// A provider whose listing fails contributes nothing; the rest of the
/// catalog is still returned. Tools whose qualified name would not route
/// back to them are left out.
pub async fn list_tools(registry: &SessionRegistry) -> Vec<ToolDescriptor> {
    let mut catalog = Vec::new();
    for (provider, session) in registry.iter() {
        let tools = match session.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                warn!(server = provider, error = %e, "failed to list tools");
                continue;
            }
        };
        debug!(server = provider, count = tools.len(), "listed tools");

        for tool in tools {
            if !is_routable(provider, &tool.name) {
                warn!(server = provider, tool = %tool.name, "skipping tool with unroutable name");
                continue;
            }
            catalog.push(ToolDescriptor {
                qualified_name: qualify(provider, &tool.name),
                description: tool.description.unwrap_or_default(),
                parameters: object_schema(tool.input_schema),
            });
        }
    }
    catalog
}

/// Schemas handed to the model must describe an object.
fn object_schema(schema: Value) -> Value {
    match schema {
        Value::Object(map) if !map.is_empty() => Value::Object(map),
        _ => json!({"type": "object", "properties": Map::new()}),
    }
}
