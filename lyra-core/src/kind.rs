//! Resource kinds - the closed set of orchestrated resource classes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Class of an orchestrated resource
///
/// `Check` and `NotificationEndpoint` are group kinds: they never appear on a
/// realized resource but match any of their concrete variants in skip filters
/// and stack records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Bucket,
    Check,
    CheckDeadman,
    CheckThreshold,
    Dashboard,
    Label,
    NotificationEndpoint,
    #[serde(rename = "NotificationEndpointHTTP")]
    NotificationEndpointHttp,
    NotificationEndpointSlack,
    NotificationEndpointPagerDuty,
    NotificationRule,
    Task,
    Telegraf,
    Variable,
}

impl Kind {
    /// Every kind, in the deterministic order used for diff output
    pub const ALL: [Kind; 14] = [
        Kind::Bucket,
        Kind::Check,
        Kind::CheckDeadman,
        Kind::CheckThreshold,
        Kind::Dashboard,
        Kind::Label,
        Kind::NotificationEndpoint,
        Kind::NotificationEndpointHttp,
        Kind::NotificationEndpointSlack,
        Kind::NotificationEndpointPagerDuty,
        Kind::NotificationRule,
        Kind::Task,
        Kind::Telegraf,
        Kind::Variable,
    ];

    /// Whether this kind is an abstract group over concrete variants
    pub fn is_group(&self) -> bool {
        matches!(self, Kind::Check | Kind::NotificationEndpoint)
    }

    /// Group kind this concrete kind belongs to, or itself
    pub fn group(&self) -> Kind {
        match self {
            Kind::CheckDeadman | Kind::CheckThreshold => Kind::Check,
            Kind::NotificationEndpointHttp
            | Kind::NotificationEndpointSlack
            | Kind::NotificationEndpointPagerDuty => Kind::NotificationEndpoint,
            k => *k,
        }
    }

    /// Whether this kind matches `other`, expanding group kinds
    pub fn matches(&self, other: Kind) -> bool {
        *self == other || self.group() == other || *self == other.group()
    }

    /// Short lower-case slug used in generated meta names
    pub fn slug(&self) -> &'static str {
        match self {
            Kind::Bucket => "bucket",
            Kind::Check | Kind::CheckDeadman | Kind::CheckThreshold => "check",
            Kind::Dashboard => "dashboard",
            Kind::Label => "label",
            Kind::NotificationEndpoint
            | Kind::NotificationEndpointHttp
            | Kind::NotificationEndpointSlack
            | Kind::NotificationEndpointPagerDuty => "endpoint",
            Kind::NotificationRule => "rule",
            Kind::Task => "task",
            Kind::Telegraf => "telegraf",
            Kind::Variable => "variable",
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Kind::Bucket => "Bucket",
            Kind::Check => "Check",
            Kind::CheckDeadman => "CheckDeadman",
            Kind::CheckThreshold => "CheckThreshold",
            Kind::Dashboard => "Dashboard",
            Kind::Label => "Label",
            Kind::NotificationEndpoint => "NotificationEndpoint",
            Kind::NotificationEndpointHttp => "NotificationEndpointHTTP",
            Kind::NotificationEndpointSlack => "NotificationEndpointSlack",
            Kind::NotificationEndpointPagerDuty => "NotificationEndpointPagerDuty",
            Kind::NotificationRule => "NotificationRule",
            Kind::Task => "Task",
            Kind::Telegraf => "Telegraf",
            Kind::Variable => "Variable",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown kind: {s}"))
    }
}
