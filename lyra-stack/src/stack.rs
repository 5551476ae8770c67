//! Stack model - persistent binding of a template instance to realized
//! resources
//!
//! A stack is an append-only event log. Prior events are never rewritten;
//! `latest_event` is the tail and defines the stack's current resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lyra_core::ids::{IdGenerator, PlatformId};
use lyra_core::resource::StackResource;
use lyra_core::Kind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackEventType {
    Create,
    Update,
    Uninstall,
}

/// Lifecycle position derived from the event log tail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackStatus {
    Created,
    Active,
    Uninstalled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackEvent {
    pub event_type: StackEventType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<StackResource>,
    pub updated_at: DateTime<Utc>,
}

impl StackEvent {
    pub fn new(event_type: StackEventType, updated_at: DateTime<Utc>) -> Self {
        Self {
            event_type,
            name: String::new(),
            description: String::new(),
            template_urls: Vec::new(),
            resources: Vec::new(),
            updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    pub id: PlatformId,
    pub org_id: PlatformId,
    pub created_at: DateTime<Utc>,
    pub events: Vec<StackEvent>,
}

impl Stack {
    /// The tail of the event log
    pub fn latest_event(&self) -> Option<&StackEvent> {
        self.events.last()
    }

    /// Resources owned by the stack as of its latest event
    pub fn resources(&self) -> &[StackResource] {
        self.latest_event()
            .map(|e| e.resources.as_slice())
            .unwrap_or(&[])
    }

    pub fn status(&self) -> StackStatus {
        match self.latest_event().map(|e| e.event_type) {
            None | Some(StackEventType::Create) => StackStatus::Created,
            Some(StackEventType::Update) => StackStatus::Active,
            Some(StackEventType::Uninstall) => StackStatus::Uninstalled,
        }
    }

    pub fn is_uninstalled(&self) -> bool {
        self.status() == StackStatus::Uninstalled
    }

    /// Append an event; the log grows monotonically
    pub fn push_event(&mut self, event: StackEvent) {
        self.events.push(event);
    }
}

/// Partial update applied by `update_stack`
#[derive(Debug, Clone, Default)]
pub struct StackUpdate {
    pub id: PlatformId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub template_urls: Option<Vec<String>>,
    pub additional_resources: Vec<StackAdditionalResource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackAdditionalResource {
    pub api_version: String,
    pub id: PlatformId,
    pub kind: Kind,
    pub meta_name: String,
}

/// Merge a stack update into a new `Update` event.
///
/// Resources already present keep their entries; an additional resource whose
/// id is already recorded is the same resource and is dropped. A meta-name
/// collision within a kind renames the incoming entry to
/// `collision-<ordinal>-<last 6 hex chars of a generated id>`. The resulting
/// resource list sorts by (meta name, kind, id) so snapshots are stable.
pub fn merge_stack_update(
    stack: &Stack,
    update: &StackUpdate,
    id_gen: &dyn IdGenerator,
    now: DateTime<Utc>,
) -> StackEvent {
    let mut event = stack
        .latest_event()
        .cloned()
        .unwrap_or_else(|| StackEvent::new(StackEventType::Update, now));
    event.event_type = StackEventType::Update;
    event.updated_at = now;

    if let Some(name) = &update.name {
        event.name = name.clone();
    }
    if let Some(description) = &update.description {
        event.description = description.clone();
    }
    if let Some(urls) = &update.template_urls {
        event.template_urls = urls.clone();
    }

    let mut collisions = 0usize;
    for add in &update.additional_resources {
        if event
            .resources
            .iter()
            .any(|r| r.kind.matches(add.kind) && r.id == add.id)
        {
            continue;
        }
        let mut meta_name = add.meta_name.clone();
        if event
            .resources
            .iter()
            .any(|r| r.kind.matches(add.kind) && r.meta_name == meta_name)
        {
            collisions += 1;
            let suffix = id_gen.next_id().to_string();
            meta_name = format!("collision-{}-{}", collisions, &suffix[suffix.len() - 6..]);
        }
        event.resources.push(StackResource {
            api_version: add.api_version.clone(),
            id: add.id,
            kind: add.kind,
            meta_name,
            associations: Vec::new(),
        });
    }

    event.resources.sort_by(|a, b| {
        (&a.meta_name, a.kind, a.id).cmp(&(&b.meta_name, b.kind, b.id))
    });
    event
}
