//! Diff model, impact summary, and the planning option surface
//!
//! The differ emits one entry per declared or removed resource; the planner
//! filters the set through skip actions and folds in missing secrets and
//! unbound environment references. No side effects occur until the plan is
//! applied.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::PlatformId;
use crate::kind::Kind;
use crate::resource::{EnvRefValue, ResourceValues, SecretField, SecretValues};
use crate::template::Template;

/// Lifecycle position of a diffed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateStatus {
    New,
    Exists,
    Remove,
}

/// Identity of one diff entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffIdentifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PlatformId>,
    pub meta_name: String,
    pub kind: Kind,
    pub state_status: StateStatus,
}

/// Desired vs live state of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDiff {
    pub identifier: DiffIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<ResourceValues>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<ResourceValues>,
}

impl ResourceDiff {
    pub fn kind(&self) -> Kind {
        self.identifier.kind
    }

    pub fn status(&self) -> StateStatus {
        self.identifier.state_status
    }

    /// An existing resource whose desired state equals live state; no write
    /// will be issued for it.
    pub fn is_noop(&self) -> bool {
        self.status() == StateStatus::Exists && self.old == self.new
    }

    /// Whether applying this diff issues any write
    pub fn is_change(&self) -> bool {
        !self.is_noop()
    }
}

/// Ordered collection of diffs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiffSet {
    diffs: Vec<ResourceDiff>,
}

impl DiffSet {
    pub fn push(&mut self, diff: ResourceDiff) {
        self.diffs.push(diff);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDiff> {
        self.diffs.iter()
    }

    pub fn of_kind(&self, kind: Kind) -> impl Iterator<Item = &ResourceDiff> {
        self.diffs.iter().filter(move |d| d.kind().matches(kind))
    }

    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    pub fn retain(&mut self, keep: impl FnMut(&ResourceDiff) -> bool) {
        self.diffs.retain(keep);
    }

    /// Deterministic presentation order: kind, then meta name
    pub fn sort(&mut self) {
        self.diffs.sort_by(|a, b| {
            (a.kind(), &a.identifier.meta_name).cmp(&(b.kind(), &b.identifier.meta_name))
        });
    }

    /// Counts of (create, update, delete) writes this set implies
    pub fn change_counts(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for diff in &self.diffs {
            match diff.status() {
                StateStatus::New => counts.0 += 1,
                StateStatus::Exists if diff.is_change() => counts.1 += 1,
                StateStatus::Exists => {}
                StateStatus::Remove => counts.2 += 1,
            }
        }
        counts
    }
}

impl IntoIterator for DiffSet {
    type Item = ResourceDiff;
    type IntoIter = std::vec::IntoIter<ResourceDiff>;

    fn into_iter(self) -> Self::IntoIter {
        self.diffs.into_iter()
    }
}

/// Post-apply view of one realized resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEntry {
    pub kind: Kind,
    pub meta_name: String,
    pub id: PlatformId,
    pub org_id: PlatformId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_associations: Vec<String>,
    pub values: ResourceValues,
}

/// Post-apply view, filled after a successful apply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Summary {
    pub resources: Vec<SummaryEntry>,
}

impl Summary {
    pub fn of_kind(&self, kind: Kind) -> impl Iterator<Item = &SummaryEntry> {
        self.resources.iter().filter(move |e| e.kind.matches(kind))
    }
}

/// The planner's product: diffs plus everything a caller needs to judge an
/// apply before running it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactSummary {
    pub stack_id: PlatformId,
    pub diff: DiffSet,
    pub summary: Summary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_secrets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_env_refs: Vec<String>,
}

/// Apply-time options; the closed surface recognized by dry-run and apply
#[derive(Default)]
pub struct ApplyOpts {
    pub(crate) templates: Vec<Template>,
    pub(crate) kind_skips: Vec<Kind>,
    pub(crate) resource_skips: Vec<(Kind, String)>,
    pub(crate) env_refs: BTreeMap<String, EnvRefValue>,
    pub(crate) stack_id: Option<PlatformId>,
    pub(crate) secrets: SecretValues,
}

impl ApplyOpts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template to the merge set; later templates overlay earlier ones
    pub fn with_template(mut self, template: Template) -> Self {
        self.templates.push(template);
        self
    }

    /// Drop every diff of the given kind; group kinds expand
    pub fn with_kind_skip(mut self, kind: Kind) -> Self {
        self.kind_skips.push(kind);
        self
    }

    /// Drop the one diff identified by kind and meta name
    pub fn with_resource_skip(mut self, kind: Kind, meta_name: impl Into<String>) -> Self {
        self.resource_skips.push((kind, meta_name.into()));
        self
    }

    /// Bind environment references from caller-supplied values
    pub fn with_env_refs(mut self, refs: BTreeMap<String, EnvRefValue>) -> Self {
        self.env_refs.extend(refs);
        self
    }

    /// Bind an existing stack
    pub fn with_stack_id(mut self, id: PlatformId) -> Self {
        self.stack_id = Some(id);
        self
    }

    /// Treat these secret keys as already present in the secret store
    pub fn with_secrets(mut self, secrets: SecretValues) -> Self {
        self.secrets.extend(secrets);
        self
    }

    pub fn stack_id(&self) -> Option<PlatformId> {
        self.stack_id
    }

    pub fn env_refs(&self) -> &BTreeMap<String, EnvRefValue> {
        &self.env_refs
    }

    pub fn secrets(&self) -> &SecretValues {
        &self.secrets
    }

    /// Merge the submitted templates into the effective one
    pub fn merged_template(&self) -> crate::error::Result<Template> {
        Template::merge(self.templates.clone())
    }
}

/// Filter a diff set through the configured skip actions
pub fn apply_skips(diff: &mut DiffSet, opts: &ApplyOpts) {
    diff.retain(|d| {
        if opts.kind_skips.iter().any(|k| d.kind().matches(*k)) {
            return false;
        }
        !opts
            .resource_skips
            .iter()
            .any(|(kind, meta)| d.kind().matches(*kind) && d.identifier.meta_name == *meta)
    });
}

/// Secret keys the template references that neither the store nor the
/// caller-provided set covers.
pub fn missing_secrets(
    referenced: &[SecretField],
    store_keys: &[String],
    provided: &SecretValues,
) -> Vec<String> {
    let mut missing: Vec<String> = referenced
        .iter()
        .filter(|field| !store_keys.contains(&field.key) && !provided.contains_key(&field.key))
        .map(|field| field.key.clone())
        .collect();
    missing.sort();
    missing.dedup();
    missing
}
