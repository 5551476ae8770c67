//! Variable resource model

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationDefect;
use crate::kind::Kind;
use crate::resource::display_name;

/// Declared variable fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: VariableArgs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected: Vec<String>,
}

/// Variable argument variants; the closed sum of supported shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VariableArgs {
    Constant { values: Vec<String> },
    Map { values: BTreeMap<String, String> },
    Query { query: String, language: String },
}

impl Default for VariableArgs {
    fn default() -> Self {
        VariableArgs::Constant { values: Vec::new() }
    }
}

const QUERY_LANGUAGES: [&str; 2] = ["flux", "influxql"];

impl VariableSpec {
    pub fn validate(&self, meta_name: &str) -> Vec<ValidationDefect> {
        let mut defects = Vec::new();
        match &self.arguments {
            VariableArgs::Constant { values } if values.is_empty() => defects.push(
                ValidationDefect::new("arguments.values", "constant variable needs values")
                    .for_resource(Kind::Variable, meta_name),
            ),
            VariableArgs::Map { values } if values.is_empty() => defects.push(
                ValidationDefect::new("arguments.values", "map variable needs entries")
                    .for_resource(Kind::Variable, meta_name),
            ),
            VariableArgs::Query { query, language } => {
                if query.trim().is_empty() {
                    defects.push(
                        ValidationDefect::new("arguments.query", "query must not be empty")
                            .for_resource(Kind::Variable, meta_name),
                    );
                }
                if !QUERY_LANGUAGES.contains(&language.as_str()) {
                    defects.push(
                        ValidationDefect::new(
                            "arguments.language",
                            format!("\"{language}\" is not one of flux, influxql"),
                        )
                        .for_resource(Kind::Variable, meta_name),
                    );
                }
            }
            _ => {}
        }
        defects
    }

    pub fn values(&self, meta_name: &str) -> VariableValues {
        VariableValues {
            name: display_name(self.name.as_deref(), meta_name).to_string(),
            description: self.description.clone().unwrap_or_default(),
            arguments: self.arguments.clone(),
        }
    }
}

/// Comparable variable state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableValues {
    pub name: String,
    pub description: String,
    pub arguments: VariableArgs,
}

impl VariableValues {
    pub fn to_spec(&self) -> VariableSpec {
        VariableSpec {
            name: Some(self.name.clone()),
            description: if self.description.is_empty() {
                None
            } else {
                Some(self.description.clone())
            },
            arguments: self.arguments.clone(),
            selected: Vec::new(),
        }
    }
}
