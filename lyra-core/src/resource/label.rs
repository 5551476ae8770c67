//! Label resource model

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationDefect;
use crate::kind::Kind;
use crate::resource::display_name;

/// Declared label fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LabelSpec {
    pub fn validate(&self, meta_name: &str) -> Vec<ValidationDefect> {
        let mut defects = Vec::new();
        if let Some(color) = &self.color {
            let hex = color.strip_prefix('#').unwrap_or(color);
            if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                defects.push(
                    ValidationDefect::new("color", format!("\"{color}\" is not a hex color"))
                        .for_resource(Kind::Label, meta_name),
                );
            }
        }
        defects
    }

    /// Label properties compare as a map, never as a joined string
    pub fn values(&self, meta_name: &str) -> LabelValues {
        let mut properties = BTreeMap::new();
        if let Some(color) = &self.color {
            properties.insert("color".to_string(), color.clone());
        }
        if let Some(description) = &self.description {
            properties.insert("description".to_string(), description.clone());
        }
        LabelValues {
            name: display_name(self.name.as_deref(), meta_name).to_string(),
            properties,
        }
    }
}

/// Comparable label state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelValues {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl LabelValues {
    pub fn color(&self) -> Option<&str> {
        self.properties.get("color").map(String::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.properties.get("description").map(String::as_str)
    }

    pub fn to_spec(&self) -> LabelSpec {
        LabelSpec {
            name: Some(self.name.clone()),
            color: self.color().map(str::to_string),
            description: self.description().map(str::to_string),
        }
    }
}
