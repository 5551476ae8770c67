//! Typed in-memory representation of each resource kind
//!
//! Every kind has a spec struct (the declared, template-side fields) and a
//! values struct (the normalized snapshot the differ compares and the summary
//! reports). Sum types cover the polymorphic kinds; see the check, endpoint,
//! and variable modules.

pub mod bucket;
pub mod check;
pub mod dashboard;
pub mod endpoint;
pub mod label;
pub mod rule;
pub mod task;
pub mod telegraf;
pub mod variable;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::PlatformId;
use crate::kind::Kind;

/// Association of a declared resource to a label, by meta name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Association {
    pub kind: Kind,
    pub name: String,
}

impl Association {
    pub fn label(name: impl Into<String>) -> Self {
        Self {
            kind: Kind::Label,
            name: name.into(),
        }
    }
}

/// Value bound to an environment reference at apply time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvRefValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl EnvRefValue {
    pub fn as_display_string(&self) -> String {
        match self {
            EnvRefValue::Bool(b) => b.to_string(),
            EnvRefValue::Number(n) => n.to_string(),
            EnvRefValue::String(s) => s.clone(),
        }
    }
}

/// Template placeholder bound from caller-provided values
///
/// `field` names the substitution target, e.g. `metadata.name` or
/// `spec.description`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvReference {
    pub key: String,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<EnvRefValue>,
}

/// Reference to a key held by the secret store
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretField {
    pub key: String,
}

impl SecretField {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Activity status shared by several kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Active,
    Inactive,
}

/// One realized resource recorded in a stack event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackResource {
    pub api_version: String,
    pub id: PlatformId,
    pub kind: Kind,
    pub meta_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associations: Vec<Association>,
}

/// Normalized comparable snapshot of a resource, tagged by kind family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resourceKind")]
pub enum ResourceValues {
    Bucket(bucket::BucketValues),
    Check(check::CheckValues),
    Dashboard(dashboard::DashboardValues),
    Label(label::LabelValues),
    NotificationEndpoint(endpoint::EndpointValues),
    NotificationRule(rule::RuleValues),
    Task(task::TaskValues),
    Telegraf(telegraf::TelegrafValues),
    Variable(variable::VariableValues),
}

impl ResourceValues {
    /// Display name of the underlying resource
    pub fn name(&self) -> &str {
        match self {
            ResourceValues::Bucket(v) => &v.name,
            ResourceValues::Check(v) => &v.name,
            ResourceValues::Dashboard(v) => &v.name,
            ResourceValues::Label(v) => &v.name,
            ResourceValues::NotificationEndpoint(v) => &v.name,
            ResourceValues::NotificationRule(v) => &v.name,
            ResourceValues::Task(v) => &v.name,
            ResourceValues::Telegraf(v) => &v.name,
            ResourceValues::Variable(v) => &v.name,
        }
    }
}

pub(crate) const NANOS_IN_SECOND: u64 = 1_000_000_000;

/// Parse a compound duration literal like `1h30m` or `90s` into whole
/// nanoseconds. Recognized units: `ns`, `us`, `ms`, `s`, `m`, `h`, `d`, `w`.
pub fn parse_duration(input: &str) -> Option<u64> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    let mut total: u64 = 0;
    let mut digits = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return None;
        }
        let magnitude: u64 = digits.parse().ok()?;
        digits.clear();
        let unit = match c {
            'n' if chars.peek() == Some(&'s') => {
                chars.next();
                1
            }
            'u' if chars.peek() == Some(&'s') => {
                chars.next();
                1_000
            }
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                1_000_000
            }
            's' => NANOS_IN_SECOND,
            'm' => 60 * NANOS_IN_SECOND,
            'h' => 3_600 * NANOS_IN_SECOND,
            'd' => 86_400 * NANOS_IN_SECOND,
            'w' => 7 * 86_400 * NANOS_IN_SECOND,
            _ => return None,
        };
        total = total.checked_add(magnitude.checked_mul(unit)?)?;
    }
    if digits.is_empty() {
        Some(total)
    } else {
        // trailing bare number with no unit
        None
    }
}

/// Render nanoseconds as the shortest compound duration literal
pub fn format_duration(mut nanos: u64) -> String {
    if nanos == 0 {
        return "0s".to_string();
    }
    let units: [(&str, u64); 5] = [
        ("w", 7 * 86_400 * NANOS_IN_SECOND),
        ("d", 86_400 * NANOS_IN_SECOND),
        ("h", 3_600 * NANOS_IN_SECOND),
        ("m", 60 * NANOS_IN_SECOND),
        ("s", NANOS_IN_SECOND),
    ];
    let mut out = String::new();
    for (suffix, unit) in units {
        if nanos >= unit {
            out.push_str(&format!("{}{}", nanos / unit, suffix));
            nanos %= unit;
        }
    }
    if nanos > 0 {
        out.push_str(&format!("{nanos}ns"));
    }
    out
}

/// Normalize a duration literal so textually different spellings of the same
/// span compare equal, e.g. `90m` and `1h30m`.
pub fn normalize_duration(input: &str) -> Option<String> {
    parse_duration(input).map(format_duration)
}

/// Resolve the display name of a declaration: explicit `name` falls back to
/// the meta name.
pub fn display_name<'a>(name: Option<&'a str>, meta_name: &'a str) -> &'a str {
    match name {
        Some(n) if !n.is_empty() => n,
        _ => meta_name,
    }
}

/// Map of secret keys pre-populated by the caller
pub type SecretValues = BTreeMap<String, String>;
