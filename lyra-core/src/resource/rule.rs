//! Notification rule resource model

use serde::{Deserialize, Serialize};

use crate::error::ValidationDefect;
use crate::ids::PlatformId;
use crate::kind::Kind;
use crate::resource::check::is_check_level;
use crate::resource::{display_name, normalize_duration, Status};

/// Declared notification rule fields
///
/// `endpoint_name` is a meta-name reference resolved against the template's
/// endpoints or the bound stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub endpoint_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message_template: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status_rules: Vec<StatusRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_rules: Vec<TagRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRule {
    pub current_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_level: Option<String>,
}

const TAG_OPERATORS: [&str; 4] = ["equal", "notequal", "equalregex", "notequalregex"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRule {
    pub key: String,
    pub value: String,
    #[serde(default = "default_tag_operator")]
    pub operator: String,
}

fn default_tag_operator() -> String {
    "equal".to_string()
}

/// Identity of the endpoint a rule was bound to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointBinding {
    pub id: PlatformId,
    pub name: String,
    pub endpoint_type: String,
}

impl RuleSpec {
    pub fn validate(&self, meta_name: &str) -> Vec<ValidationDefect> {
        let mut defects = Vec::new();
        if self.endpoint_name.is_empty() {
            defects.push(
                ValidationDefect::new("endpointName", "rule must reference an endpoint")
                    .for_resource(Kind::NotificationRule, meta_name),
            );
        }
        match self.every.as_deref() {
            None => defects.push(
                ValidationDefect::new("every", "rule every is required")
                    .for_resource(Kind::NotificationRule, meta_name),
            ),
            Some(every) if normalize_duration(every).is_none() => defects.push(
                ValidationDefect::new("every", format!("\"{every}\" is not a duration"))
                    .for_resource(Kind::NotificationRule, meta_name),
            ),
            _ => {}
        }
        if self.status_rules.is_empty() {
            defects.push(
                ValidationDefect::new("statusRules", "at least one status rule is required")
                    .for_resource(Kind::NotificationRule, meta_name),
            );
        }
        for (i, rule) in self.status_rules.iter().enumerate() {
            for level in std::iter::once(&rule.current_level).chain(rule.previous_level.iter()) {
                if !is_check_level(level) {
                    defects.push(
                        ValidationDefect::new(
                            format!("statusRules[{i}]"),
                            format!("\"{level}\" is not a level"),
                        )
                        .for_resource(Kind::NotificationRule, meta_name),
                    );
                }
            }
        }
        for (i, rule) in self.tag_rules.iter().enumerate() {
            if !TAG_OPERATORS.contains(&rule.operator.as_str()) {
                defects.push(
                    ValidationDefect::new(
                        format!("tagRules[{i}].operator"),
                        format!("\"{}\" is not a tag operator", rule.operator),
                    )
                    .for_resource(Kind::NotificationRule, meta_name),
                );
            }
        }
        defects
    }

    /// Normalized snapshot bound to a resolved endpoint
    pub fn values(&self, meta_name: &str, endpoint: &EndpointBinding) -> RuleValues {
        RuleValues {
            name: display_name(self.name.as_deref(), meta_name).to_string(),
            description: self.description.clone().unwrap_or_default(),
            endpoint_id: endpoint.id,
            endpoint_name: endpoint.name.clone(),
            endpoint_type: endpoint.endpoint_type.clone(),
            every: self.every.as_deref().and_then(normalize_duration),
            offset: self.offset.as_deref().and_then(normalize_duration),
            message_template: self.message_template.clone(),
            status: self.status,
            status_rules: self.status_rules.clone(),
            tag_rules: self.tag_rules.clone(),
        }
    }
}

/// Comparable rule state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleValues {
    pub name: String,
    pub description: String,
    pub endpoint_id: PlatformId,
    pub endpoint_name: String,
    pub endpoint_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message_template: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status_rules: Vec<StatusRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_rules: Vec<TagRule>,
}

impl RuleValues {
    /// Render back into declared form, referencing the endpoint meta name
    pub fn to_spec(&self, endpoint_meta_name: impl Into<String>) -> RuleSpec {
        RuleSpec {
            name: Some(self.name.clone()),
            description: if self.description.is_empty() {
                None
            } else {
                Some(self.description.clone())
            },
            endpoint_name: endpoint_meta_name.into(),
            every: self.every.clone(),
            offset: self.offset.clone(),
            message_template: self.message_template.clone(),
            status: self.status,
            status_rules: self.status_rules.clone(),
            tag_rules: self.tag_rules.clone(),
        }
    }
}
