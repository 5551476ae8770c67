//! Task resource model

use serde::{Deserialize, Serialize};

use crate::error::ValidationDefect;
use crate::kind::Kind;
use crate::resource::{display_name, normalize_duration, Status};

/// Declared task fields
///
/// A task is scheduled by exactly one of `every` or `cron`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub status: Status,
}

impl TaskSpec {
    pub fn validate(&self, meta_name: &str) -> Vec<ValidationDefect> {
        let mut defects = Vec::new();
        match (&self.every, &self.cron) {
            (None, None) => defects.push(
                ValidationDefect::new("every", "one of every or cron must be provided")
                    .for_resource(Kind::Task, meta_name),
            ),
            (Some(_), Some(_)) => defects.push(
                ValidationDefect::new("every", "every and cron are mutually exclusive")
                    .for_resource(Kind::Task, meta_name),
            ),
            (Some(every), None) => {
                if normalize_duration(every).is_none() {
                    defects.push(
                        ValidationDefect::new("every", format!("\"{every}\" is not a duration"))
                            .for_resource(Kind::Task, meta_name),
                    );
                }
            }
            (None, Some(cron)) => {
                if cron.split_whitespace().count() != 5 {
                    defects.push(
                        ValidationDefect::new("cron", format!("\"{cron}\" is not a cron entry"))
                            .for_resource(Kind::Task, meta_name),
                    );
                }
            }
        }
        if let Some(offset) = &self.offset {
            if normalize_duration(offset).is_none() {
                defects.push(
                    ValidationDefect::new("offset", format!("\"{offset}\" is not a duration"))
                        .for_resource(Kind::Task, meta_name),
                );
            }
        }
        if self.query.trim().is_empty() {
            defects.push(
                ValidationDefect::new("query", "task query must not be empty")
                    .for_resource(Kind::Task, meta_name),
            );
        }
        defects
    }

    pub fn values(&self, meta_name: &str) -> TaskValues {
        TaskValues {
            name: display_name(self.name.as_deref(), meta_name).to_string(),
            description: self.description.clone().unwrap_or_default(),
            every: self
                .every
                .as_deref()
                .and_then(normalize_duration),
            cron: self.cron.clone(),
            offset: self
                .offset
                .as_deref()
                .and_then(normalize_duration),
            query: self.query.trim().to_string(),
            status: self.status,
        }
    }
}

/// Comparable task state; durations are normalized spellings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskValues {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    pub query: String,
    pub status: Status,
}

impl TaskValues {
    pub fn to_spec(&self) -> TaskSpec {
        TaskSpec {
            name: Some(self.name.clone()),
            description: if self.description.is_empty() {
                None
            } else {
                Some(self.description.clone())
            },
            every: self.every.clone(),
            cron: self.cron.clone(),
            offset: self.offset.clone(),
            query: self.query.clone(),
            status: self.status,
        }
    }
}
