//! Telegraf configuration resource model

use serde::{Deserialize, Serialize};

use crate::error::ValidationDefect;
use crate::kind::Kind;
use crate::resource::display_name;

/// Declared telegraf configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegrafSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub config: String,
}

impl TelegrafSpec {
    pub fn validate(&self, meta_name: &str) -> Vec<ValidationDefect> {
        if self.config.trim().is_empty() {
            return vec![
                ValidationDefect::new("config", "telegraf config must not be empty")
                    .for_resource(Kind::Telegraf, meta_name),
            ];
        }
        Vec::new()
    }

    pub fn values(&self, meta_name: &str) -> TelegrafValues {
        TelegrafValues {
            name: display_name(self.name.as_deref(), meta_name).to_string(),
            description: self.description.clone().unwrap_or_default(),
            config: self.config.clone(),
        }
    }
}

/// Comparable telegraf state; comparison is on the raw config text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegrafValues {
    pub name: String,
    pub description: String,
    pub config: String,
}

impl TelegrafValues {
    pub fn to_spec(&self) -> TelegrafSpec {
        TelegrafSpec {
            name: Some(self.name.clone()),
            description: if self.description.is_empty() {
                None
            } else {
                Some(self.description.clone())
            },
            config: self.config.clone(),
        }
    }
}
