//! Property block codec
//!
//! Decodes the structured text blocks attached to a material: the tool
//! list, the composition list and the three `{name, value[, unit]}`
//! property domains. Absent or blank input decodes to an empty list;
//! anything that is present must match its shape exactly.
//!
//! Blocks are stored inline on the material row as JSON text and are
//! always replaced wholesale, never merged.

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

/// One `{element, quantity}` pair of a composition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Component {
    pub element: String,
    #[serde(deserialize_with = "text_or_number")]
    pub quantity: String,
}

/// One `{name, value[, unit]}` record of a property domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyEntry {
    pub name: String,
    #[serde(deserialize_with = "text_or_number")]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// The three semantic domains sharing the [`PropertyEntry`] shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyDomain {
    Mechanical,
    Perceptual,
    Emotional,
}

impl PropertyDomain {
    /// Request field carrying this domain
    pub fn field_name(&self) -> &'static str {
        match self {
            PropertyDomain::Mechanical => "mechanical_properties",
            PropertyDomain::Perceptual => "perceptual_properties",
            PropertyDomain::Emotional => "emotional_properties",
        }
    }
}

/// Accept `"12"` and `12` alike; quantities are free-form text
fn text_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Number(n) => n.to_string(),
    })
}

fn decode_list<T: for<'de> Deserialize<'de>>(field: &str, raw: &str) -> Result<Vec<T>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<T>>(trimmed).map_err(|e| Error::format(field, e.to_string()))
}

/// Decode the tool list (JSON array of strings)
pub fn decode_tools(raw: &str) -> Result<Vec<String>> {
    let tools: Vec<String> = decode_list("tools", raw)?;
    tools
        .into_iter()
        .enumerate()
        .map(|(i, tool)| {
            let tool = tool.trim().to_string();
            if tool.is_empty() {
                Err(Error::format("tools", format!("entry {} is empty", i)))
            } else {
                Ok(tool)
            }
        })
        .collect()
}

/// Decode the composition list (JSON array of `{element, quantity}`)
pub fn decode_composition(raw: &str) -> Result<Vec<Component>> {
    let components: Vec<Component> = decode_list("composition", raw)?;
    for (i, component) in components.iter().enumerate() {
        if component.element.trim().is_empty() {
            return Err(Error::format(
                "composition",
                format!("entry {} has an empty element", i),
            ));
        }
    }
    Ok(components)
}

/// Decode one property domain (JSON array of `{name, value[, unit]}`)
pub fn decode_properties(domain: PropertyDomain, raw: &str) -> Result<Vec<PropertyEntry>> {
    let field = domain.field_name();
    let entries: Vec<PropertyEntry> = decode_list(field, raw)?;
    entries
        .into_iter()
        .enumerate()
        .map(|(i, mut entry)| {
            if entry.name.trim().is_empty() {
                return Err(Error::format(field, format!("entry {} has an empty name", i)));
            }
            // Blank units carry no information
            if entry.unit.as_deref().map_or(false, |u| u.trim().is_empty()) {
                entry.unit = None;
            }
            Ok(entry)
        })
        .collect()
}

/// Encode a decoded block for inline storage
pub fn encode<T: Serialize + ?Sized>(block: &T) -> Result<String> {
    serde_json::to_string(block)
        .map_err(|e| Error::Internal(format!("Failed to encode property block: {}", e)))
}

/// Decode an inline column previously written by [`encode`]
pub fn decode_stored<T: for<'de> Deserialize<'de>>(column: &str, stored: &str) -> Result<Vec<T>> {
    if stored.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(stored)
        .map_err(|e| Error::Internal(format!("Corrupt {} column: {}", column, e)))
}
