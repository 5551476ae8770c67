//! Bucket resource model

use serde::{Deserialize, Serialize};

use crate::error::ValidationDefect;
use crate::kind::Kind;
use crate::resource::{display_name, NANOS_IN_SECOND};

pub(crate) const RETENTION_RULE_EXPIRE: &str = "expire";

/// Declared bucket fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retention_rules: Vec<RetentionRule>,
}

/// A single retention rule; only the `expire` type is recognized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionRule {
    #[serde(rename = "type")]
    pub rule_type: String,
    pub every_seconds: u64,
}

impl RetentionRule {
    pub fn expire(every_seconds: u64) -> Self {
        Self {
            rule_type: RETENTION_RULE_EXPIRE.to_string(),
            every_seconds,
        }
    }
}

impl BucketSpec {
    pub fn validate(&self, meta_name: &str) -> Vec<ValidationDefect> {
        let mut defects = Vec::new();
        for (i, rule) in self.retention_rules.iter().enumerate() {
            if rule.rule_type != RETENTION_RULE_EXPIRE {
                defects.push(
                    ValidationDefect::new(
                        format!("retentionRules[{i}].type"),
                        format!("unknown rule type \"{}\"", rule.rule_type),
                    )
                    .for_resource(Kind::Bucket, meta_name),
                );
            }
            if rule.every_seconds == 0 {
                defects.push(
                    ValidationDefect::new(
                        format!("retentionRules[{i}].everySeconds"),
                        "must be greater than zero",
                    )
                    .for_resource(Kind::Bucket, meta_name),
                );
            }
        }
        defects
    }

    /// Normalized comparable snapshot; retention is summed whole nanoseconds
    pub fn values(&self, meta_name: &str) -> BucketValues {
        BucketValues {
            name: display_name(self.name.as_deref(), meta_name).to_string(),
            description: self.description.clone().unwrap_or_default(),
            retention_period: self
                .retention_rules
                .iter()
                .map(|r| r.every_seconds * NANOS_IN_SECOND)
                .sum(),
        }
    }
}

/// Comparable bucket state; zero retention means "never expire"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketValues {
    pub name: String,
    pub description: String,
    pub retention_period: u64,
}

impl BucketValues {
    /// Render back into declared form
    pub fn to_spec(&self) -> BucketSpec {
        let retention_rules = if self.retention_period == 0 {
            Vec::new()
        } else {
            vec![RetentionRule::expire(self.retention_period / NANOS_IN_SECOND)]
        };
        BucketSpec {
            name: Some(self.name.clone()),
            description: if self.description.is_empty() {
                None
            } else {
                Some(self.description.clone())
            },
            retention_rules,
        }
    }
}
