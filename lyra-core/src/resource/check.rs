//! Check resource model
//!
//! Checks are a tagged sum: the deadman and threshold variants share a base
//! and carry their own alerting fields.

use serde::{Deserialize, Serialize};

use crate::error::ValidationDefect;
use crate::kind::Kind;
use crate::resource::{display_name, normalize_duration, Status};

pub(crate) const CHECK_LEVELS: [&str; 4] = ["CRIT", "WARN", "INFO", "OK"];

pub(crate) fn is_check_level(level: &str) -> bool {
    CHECK_LEVELS.contains(&level)
}

/// Fields shared by every check variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckBase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_message_template: String,
}

/// Deadman check: fires when a series goes quiet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadmanCheck {
    #[serde(flatten)]
    pub base: CheckBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_since: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_time: Option<String>,
    #[serde(default)]
    pub report_zero: bool,
    #[serde(default)]
    pub level: String,
}

/// Threshold check: fires when query values cross configured thresholds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdCheck {
    #[serde(flatten)]
    pub base: CheckBase,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thresholds: Vec<Threshold>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdType {
    Greater,
    Lesser,
    InsideRange,
    OutsideRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Threshold {
    #[serde(rename = "type")]
    pub threshold_type: ThresholdType,
    pub level: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default)]
    pub all_values: bool,
}

/// Check variants, selected by the declaring object's kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckSpec {
    Deadman(DeadmanCheck),
    Threshold(ThresholdCheck),
}

impl CheckSpec {
    pub fn base(&self) -> &CheckBase {
        match self {
            CheckSpec::Deadman(c) => &c.base,
            CheckSpec::Threshold(c) => &c.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut CheckBase {
        match self {
            CheckSpec::Deadman(c) => &mut c.base,
            CheckSpec::Threshold(c) => &mut c.base,
        }
    }

    /// Concrete kind of this variant
    pub fn kind(&self) -> Kind {
        match self {
            CheckSpec::Deadman(_) => Kind::CheckDeadman,
            CheckSpec::Threshold(_) => Kind::CheckThreshold,
        }
    }

    pub fn validate(&self, meta_name: &str) -> Vec<ValidationDefect> {
        let kind = self.kind();
        let mut defects = Vec::new();
        let base = self.base();
        if base.query.trim().is_empty() {
            defects.push(
                ValidationDefect::new("query", "check query must not be empty")
                    .for_resource(kind, meta_name),
            );
        }
        match base.every.as_deref() {
            None => defects.push(
                ValidationDefect::new("every", "check every is required")
                    .for_resource(kind, meta_name),
            ),
            Some(every) if normalize_duration(every).is_none() => defects.push(
                ValidationDefect::new("every", format!("\"{every}\" is not a duration"))
                    .for_resource(kind, meta_name),
            ),
            _ => {}
        }
        match self {
            CheckSpec::Deadman(c) => {
                if !is_check_level(&c.level) {
                    defects.push(
                        ValidationDefect::new("level", format!("\"{}\" is not a level", c.level))
                            .for_resource(kind, meta_name),
                    );
                }
            }
            CheckSpec::Threshold(c) => {
                if c.thresholds.is_empty() {
                    defects.push(
                        ValidationDefect::new("thresholds", "at least one threshold is required")
                            .for_resource(kind, meta_name),
                    );
                }
                for (i, t) in c.thresholds.iter().enumerate() {
                    if !is_check_level(&t.level) {
                        defects.push(
                            ValidationDefect::new(
                                format!("thresholds[{i}].level"),
                                format!("\"{}\" is not a level", t.level),
                            )
                            .for_resource(kind, meta_name),
                        );
                    }
                }
            }
        }
        defects
    }

    /// Normalized snapshot: display name resolved, duration spellings unified
    pub fn values(&self, meta_name: &str) -> CheckValues {
        let base = self.base();
        CheckValues {
            kind: self.kind(),
            name: display_name(base.name.as_deref(), meta_name).to_string(),
            description: base.description.clone().unwrap_or_default(),
            status: base.status,
            every: base.every.as_deref().and_then(normalize_duration),
            offset: base.offset.as_deref().and_then(normalize_duration),
            query: base.query.trim().to_string(),
            status_message_template: base.status_message_template.clone(),
            variant: match self {
                CheckSpec::Deadman(c) => CheckVariant::Deadman {
                    time_since: c.time_since.as_deref().and_then(normalize_duration),
                    stale_time: c.stale_time.as_deref().and_then(normalize_duration),
                    report_zero: c.report_zero,
                    level: c.level.clone(),
                },
                CheckSpec::Threshold(c) => CheckVariant::Threshold {
                    thresholds: c.thresholds.clone(),
                },
            },
        }
    }
}

/// Comparable check state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckValues {
    pub kind: Kind,
    pub name: String,
    pub description: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    pub query: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_message_template: String,
    pub variant: CheckVariant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckVariant {
    Deadman {
        time_since: Option<String>,
        stale_time: Option<String>,
        report_zero: bool,
        level: String,
    },
    Threshold {
        thresholds: Vec<Threshold>,
    },
}

impl CheckValues {
    pub fn to_spec(&self) -> CheckSpec {
        let base = CheckBase {
            name: Some(self.name.clone()),
            description: if self.description.is_empty() {
                None
            } else {
                Some(self.description.clone())
            },
            status: self.status,
            every: self.every.clone(),
            offset: self.offset.clone(),
            query: self.query.clone(),
            status_message_template: self.status_message_template.clone(),
        };
        match &self.variant {
            CheckVariant::Deadman {
                time_since,
                stale_time,
                report_zero,
                level,
            } => CheckSpec::Deadman(DeadmanCheck {
                base,
                time_since: time_since.clone(),
                stale_time: stale_time.clone(),
                report_zero: *report_zero,
                level: level.clone(),
            }),
            CheckVariant::Threshold { thresholds } => CheckSpec::Threshold(ThresholdCheck {
                base,
                thresholds: thresholds.clone(),
            }),
        }
    }
}
