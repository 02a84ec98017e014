//! Tool declaration and invocation types

use serde::{Deserialize, Serialize};

use crate::{BifrostError, Result};

/// Declaration of a tool the model may call.
///
/// The supported subset is deliberately small: a name, a free-form
/// description, and a JSON-schema-shaped parameter object. Adapters must
/// translate all three losslessly or reject the request with
/// [`BifrostError::UnsupportedCapability`] — never silently drop a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON-schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Validate that the declaration fits the supported subset.
    ///
    /// Rejected up front so a bad declaration fails at request-build time
    /// on every provider, not halfway through a failover chain.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(BifrostError::InvalidInput("tool name is empty".into()));
        }
        if !self.parameters.is_object() {
            return Err(BifrostError::UnsupportedCapability(format!(
                "tool '{}': parameters must be a JSON-schema object",
                self.name
            )));
        }
        Ok(())
    }
}

/// A tool invocation made by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Provider-assigned call id, echoed back in tool result messages.
    pub id: String,
    pub name: String,
    /// Parsed argument object.
    pub arguments: serde_json::Value,
}

impl ToolInvocation {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Deserialize the arguments into a concrete type.
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(
        &self,
    ) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_value(self.arguments.clone())
    }
}
