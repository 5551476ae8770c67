//! Live platform resource representations
//!
//! These are the shapes the resource services return. They carry realized
//! identities on top of the same value types the templates declare, so the
//! differ can compare desired and live state directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::PlatformId;
use crate::kind::Kind;
use crate::resource::check::CheckSpec;
use crate::resource::dashboard::Chart;
use crate::resource::endpoint::EndpointSpec;
use crate::resource::variable::VariableArgs;
use crate::resource::{display_name, Status};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: PlatformId,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: PlatformId,
    pub org_id: PlatformId,
    pub name: String,
    pub description: String,
    /// Whole nanoseconds; zero means "never expire"
    pub retention_period: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: PlatformId,
    pub org_id: PlatformId,
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub id: PlatformId,
    pub org_id: PlatformId,
    pub name: String,
    pub description: String,
    pub cells: Vec<Cell>,
}

/// Dashboard cell placement; the view content is stored apart from the
/// dashboard and fetched per cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: PlatformId,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    pub chart: Chart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: PlatformId,
    pub org_id: PlatformId,
    /// Task evaluating the check, owned by the check service
    pub task_id: PlatformId,
    pub spec: CheckSpec,
}

impl Check {
    pub fn name(&self) -> &str {
        display_name(self.spec.base().name.as_deref(), "")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEndpoint {
    pub id: PlatformId,
    pub org_id: PlatformId,
    pub spec: EndpointSpec,
}

impl NotificationEndpoint {
    pub fn name(&self) -> &str {
        display_name(self.spec.base().name.as_deref(), "")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationRule {
    pub id: PlatformId,
    pub org_id: PlatformId,
    pub endpoint_id: PlatformId,
    /// Task evaluating the rule, owned by the rule service
    pub task_id: PlatformId,
    pub name: String,
    pub description: String,
    pub every: Option<String>,
    pub offset: Option<String>,
    pub message_template: String,
    pub status: Status,
    pub status_rules: Vec<crate::resource::rule::StatusRule>,
    pub tag_rules: Vec<crate::resource::rule::TagRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: PlatformId,
    pub org_id: PlatformId,
    pub name: String,
    pub description: String,
    /// Full flux source, including the `option task = {…}` prelude
    pub flux: String,
    pub every: Option<String>,
    pub cron: Option<String>,
    pub offset: Option<String>,
    pub status: Status,
    /// System tasks are exportable; user tasks owned by checks and rules
    /// are not.
    pub is_system: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelegrafConfig {
    pub id: PlatformId,
    pub org_id: PlatformId,
    pub name: String,
    pub description: String,
    pub config: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: PlatformId,
    pub org_id: PlatformId,
    pub name: String,
    pub description: String,
    pub arguments: VariableArgs,
}

/// Association between a realized label and a realized resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMapping {
    pub label_id: PlatformId,
    pub resource_id: PlatformId,
    pub resource_kind: Kind,
}

/// Strip the leading `option task = { … }` block from a task's flux source,
/// leaving the query body.
pub fn strip_task_option(flux: &str) -> String {
    let trimmed = flux.trim_start();
    let Some(rest) = trimmed.strip_prefix("option task") else {
        return flux.trim().to_string();
    };
    let Some(brace) = rest.find('{') else {
        return flux.trim().to_string();
    };
    let mut depth = 0usize;
    for (i, c) in rest[brace..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return rest[brace + i + 1..].trim().to_string();
                }
            }
            _ => {}
        }
    }
    flux.trim().to_string()
}
