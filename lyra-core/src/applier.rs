//! Applier - executes a planned diff set with per-invocation rollback
//!
//! Kinds run in dependency-stratum order; within a kind, creates run first,
//! then updates (journaling prior state), then deletes. Every write lands in
//! the rollback log, an append-only compensating journal drained in reverse
//! on failure. No underlying service is transactional; the journal is the
//! only undo mechanism.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::ids::PlatformId;
use crate::kind::Kind;
use crate::plan::{DiffSet, ResourceDiff, StateStatus, Summary, SummaryEntry};
use crate::platform::{
    Bucket, Cell, Check, Dashboard, Label, LabelMapping, NotificationEndpoint, NotificationRule,
    Task, TelegrafConfig, Variable, View,
};
use crate::resolver::ResolvedTemplate;
use crate::resource::{ResourceValues, StackResource};
use crate::service::Services;
use crate::template::{Template, API_VERSION};

/// Dependency strata, applied top to bottom. A notification rule is never
/// written before its endpoint; label mappings run after every resource is
/// realized.
const STRATA: [&[Kind]; 7] = [
    &[Kind::Label],
    &[Kind::Bucket, Kind::Variable, Kind::Telegraf],
    &[Kind::Check],
    &[Kind::NotificationEndpoint],
    &[Kind::NotificationRule],
    &[Kind::Task],
    &[Kind::Dashboard],
];

#[derive(Debug)]
enum RollbackEntry {
    Created { kind: Kind, id: PlatformId },
    Updated { id: PlatformId, prior: ResourceValues },
    Mapped(LabelMapping),
}

#[derive(Default)]
struct ApplyState {
    /// (group kind, meta name) -> realized platform id
    realized: HashMap<(Kind, String), PlatformId>,
    rollback: Vec<RollbackEntry>,
    summary: Vec<SummaryEntry>,
}

impl ApplyState {
    fn key(kind: Kind, meta_name: &str) -> (Kind, String) {
        (kind.group(), meta_name.to_string())
    }

    fn realized_id(&self, kind: Kind, meta_name: &str) -> Option<PlatformId> {
        self.realized.get(&Self::key(kind, meta_name)).copied()
    }

    fn record(&mut self, kind: Kind, meta_name: &str, id: PlatformId) {
        self.realized.insert(Self::key(kind, meta_name), id);
    }
}

/// Everything a successful apply produces
pub struct ApplyOutcome {
    pub summary: Summary,
    pub realized: Vec<StackResource>,
}

pub struct Applier<'a> {
    services: &'a Services,
    org_id: PlatformId,
    stack_resources: &'a [StackResource],
}

impl<'a> Applier<'a> {
    pub fn new(
        services: &'a Services,
        org_id: PlatformId,
        stack_resources: &'a [StackResource],
    ) -> Self {
        Self {
            services,
            org_id,
            stack_resources,
        }
    }

    /// Execute the diff set. Either every intended change takes effect, or
    /// the returned error guarantees that every resource created during this
    /// invocation has been deleted again.
    pub async fn apply(
        &self,
        cancel: &CancellationToken,
        resolved: &ResolvedTemplate,
        diffs: &DiffSet,
    ) -> Result<ApplyOutcome> {
        let mut state = ApplyState::default();
        for diff in diffs.iter() {
            if let Some(id) = diff.identifier.id {
                state.record(diff.kind(), &diff.identifier.meta_name, id);
            }
        }
        for owned in self.stack_resources {
            state
                .realized
                .entry(ApplyState::key(owned.kind, &owned.meta_name))
                .or_insert(owned.id);
        }

        match self.apply_inner(cancel, resolved, diffs, &mut state).await {
            Ok(()) => {
                info!(
                    resources = state.summary.len(),
                    "apply completed, all writes landed"
                );
                let realized = collect_stack_resources(&resolved.template, &state);
                Ok(ApplyOutcome {
                    summary: Summary {
                        resources: state.summary,
                    },
                    realized,
                })
            }
            Err(err) => {
                let diagnostics = self.rollback(state).await;
                Err(err.with_rollback_diagnostics(diagnostics))
            }
        }
    }

    async fn apply_inner(
        &self,
        cancel: &CancellationToken,
        resolved: &ResolvedTemplate,
        diffs: &DiffSet,
        state: &mut ApplyState,
    ) -> Result<()> {
        if !resolved.missing_env_refs.is_empty() {
            return Err(Error::Validation(
                resolved
                    .missing_env_refs
                    .iter()
                    .map(|key| {
                        crate::error::ValidationDefect::new(
                            "envRefs",
                            format!("environment reference \"{key}\" is unbound"),
                        )
                    })
                    .collect(),
            ));
        }

        let template = &resolved.template;
        for kinds in STRATA {
            for &kind in kinds {
                let mut to_create = Vec::new();
                let mut to_update = Vec::new();
                let mut to_delete = Vec::new();
                for diff in diffs.of_kind(kind) {
                    match diff.status() {
                        StateStatus::New => to_create.push(diff),
                        StateStatus::Exists if diff.is_change() => to_update.push(diff),
                        StateStatus::Exists => {
                            self.record_summary(template, diff, state);
                        }
                        StateStatus::Remove => to_delete.push(diff),
                    }
                }
                for diff in to_create {
                    self.create_one(cancel, template, diff, state).await?;
                }
                for diff in to_update {
                    self.update_one(cancel, template, diff, state).await?;
                }
                for diff in to_delete {
                    self.delete_one(cancel, diff).await?;
                }
            }
        }

        self.apply_label_mappings(cancel, template, state).await
    }

    fn ensure_live(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    fn record_summary(&self, template: &Template, diff: &ResourceDiff, state: &mut ApplyState) {
        let Some(values) = diff.new.clone() else {
            return;
        };
        let meta_name = diff.identifier.meta_name.clone();
        let label_associations = template
            .get(diff.kind(), &meta_name)
            .map(|o| o.associations.iter().map(|a| a.name.clone()).collect())
            .unwrap_or_default();
        state.summary.push(SummaryEntry {
            kind: diff.kind(),
            meta_name: meta_name.clone(),
            id: state
                .realized_id(diff.kind(), &meta_name)
                .unwrap_or(PlatformId::ZERO),
            org_id: self.org_id,
            label_associations,
            values,
        });
    }

    async fn create_one(
        &self,
        cancel: &CancellationToken,
        template: &Template,
        diff: &ResourceDiff,
        state: &mut ApplyState,
    ) -> Result<()> {
        self.ensure_live(cancel)?;
        let meta_name = diff.identifier.meta_name.clone();
        let mut values = diff
            .new
            .clone()
            .ok_or_else(|| Error::Internal(format!("create diff for {meta_name} has no state")))?;

        fill_rule_endpoint(template, &meta_name, &mut values, state)?;

        let id = self.create_by_values(cancel, &values).await?;
        state.rollback.push(RollbackEntry::Created {
            kind: diff.kind(),
            id,
        });
        state.record(diff.kind(), &meta_name, id);

        let label_associations = template
            .get(diff.kind(), &meta_name)
            .map(|o| o.associations.iter().map(|a| a.name.clone()).collect())
            .unwrap_or_default();
        state.summary.push(SummaryEntry {
            kind: diff.kind(),
            meta_name,
            id,
            org_id: self.org_id,
            label_associations,
            values,
        });
        Ok(())
    }

    async fn update_one(
        &self,
        cancel: &CancellationToken,
        template: &Template,
        diff: &ResourceDiff,
        state: &mut ApplyState,
    ) -> Result<()> {
        self.ensure_live(cancel)?;
        let meta_name = diff.identifier.meta_name.clone();
        let id = diff
            .identifier
            .id
            .ok_or_else(|| Error::Internal(format!("update diff for {meta_name} has no id")))?;
        let mut values = diff
            .new
            .clone()
            .ok_or_else(|| Error::Internal(format!("update diff for {meta_name} has no state")))?;
        fill_rule_endpoint(template, &meta_name, &mut values, state)?;

        self.update_by_values(cancel, id, &values).await?;

        // Updates are not reversible operations; journal the prior state so
        // rollback can attempt a restore.
        if let Some(prior) = diff.old.clone() {
            state.rollback.push(RollbackEntry::Updated { id, prior });
        }
        self.record_summary(template, diff, state);
        Ok(())
    }

    async fn delete_one(&self, cancel: &CancellationToken, diff: &ResourceDiff) -> Result<()> {
        self.ensure_live(cancel)?;
        let id = diff.identifier.id.ok_or_else(|| {
            Error::Internal(format!(
                "remove diff for {} has no id",
                diff.identifier.meta_name
            ))
        })?;
        self.delete_by_kind(cancel, diff.kind(), id).await
    }

    async fn apply_label_mappings(
        &self,
        cancel: &CancellationToken,
        template: &Template,
        state: &mut ApplyState,
    ) -> Result<()> {
        for object in template.objects() {
            if object.associations.is_empty() || object.kind() == Kind::Label {
                continue;
            }
            let Some(resource_id) = state.realized_id(object.kind(), &object.meta_name) else {
                // skipped or never realized; nothing to associate
                continue;
            };
            for association in &object.associations {
                let label_id = state
                    .realized_id(Kind::Label, &association.name)
                    .unwrap_or(PlatformId::ZERO);
                if resource_id.is_zero() || label_id.is_zero() {
                    return Err(Error::Internal(format!(
                        "label mapping for {}/{} has unrealized ids",
                        object.kind(),
                        object.meta_name
                    )));
                }
                self.ensure_live(cancel)?;
                let mapping = LabelMapping {
                    label_id,
                    resource_id,
                    resource_kind: object.kind().group(),
                };
                self.services
                    .labels
                    .create_label_mapping(cancel, &mapping)
                    .await?;
                state.rollback.push(RollbackEntry::Mapped(mapping));
            }
        }
        Ok(())
    }

    /// Drain the journal in reverse insertion order. Mappings were appended
    /// last, so they unmap before the resources they point at are deleted.
    /// Failures are collected as diagnostics, never raised.
    async fn rollback(&self, state: ApplyState) -> Vec<String> {
        // the triggering token may already be cancelled; compensating writes
        // run on a fresh handle from the same scope
        let cancel = CancellationToken::new();
        let mut diagnostics = Vec::new();
        warn!(entries = state.rollback.len(), "rolling back apply");
        for entry in state.rollback.into_iter().rev() {
            let outcome = match &entry {
                RollbackEntry::Mapped(mapping) => self
                    .services
                    .labels
                    .delete_label_mapping(&cancel, mapping)
                    .await
                    .map_err(Error::from),
                RollbackEntry::Created { kind, id } => {
                    self.delete_by_kind(&cancel, *kind, *id).await
                }
                RollbackEntry::Updated { id, prior } => {
                    self.update_by_values(&cancel, *id, prior).await
                }
            };
            if let Err(err) = outcome {
                let diagnostic = format!("rollback of {entry:?} failed: {err}");
                warn!("{diagnostic}");
                diagnostics.push(diagnostic);
            }
        }
        diagnostics
    }

    async fn create_by_values(
        &self,
        cancel: &CancellationToken,
        values: &ResourceValues,
    ) -> Result<PlatformId> {
        let id = match values {
            ResourceValues::Bucket(v) => {
                self.services
                    .buckets
                    .create_bucket(
                        cancel,
                        Bucket {
                            id: PlatformId::ZERO,
                            org_id: self.org_id,
                            name: v.name.clone(),
                            description: v.description.clone(),
                            retention_period: v.retention_period,
                        },
                    )
                    .await?
                    .id
            }
            ResourceValues::Label(v) => {
                self.services
                    .labels
                    .create_label(
                        cancel,
                        Label {
                            id: PlatformId::ZERO,
                            org_id: self.org_id,
                            name: v.name.clone(),
                            properties: v.properties.clone(),
                        },
                    )
                    .await?
                    .id
            }
            ResourceValues::Check(v) => {
                self.services
                    .checks
                    .create_check(
                        cancel,
                        Check {
                            id: PlatformId::ZERO,
                            org_id: self.org_id,
                            task_id: PlatformId::ZERO,
                            spec: v.to_spec(),
                        },
                    )
                    .await?
                    .id
            }
            ResourceValues::Dashboard(v) => {
                let cells = v
                    .charts
                    .iter()
                    .map(|c| Cell {
                        id: PlatformId::ZERO,
                        x: c.x_pos,
                        y: c.y_pos,
                        w: c.width,
                        h: c.height,
                    })
                    .collect();
                let views = v
                    .charts
                    .iter()
                    .map(|c| View {
                        name: c.name.clone(),
                        chart: c.clone(),
                    })
                    .collect();
                self.services
                    .dashboards
                    .create_dashboard(
                        cancel,
                        Dashboard {
                            id: PlatformId::ZERO,
                            org_id: self.org_id,
                            name: v.name.clone(),
                            description: v.description.clone(),
                            cells,
                        },
                        views,
                    )
                    .await?
                    .id
            }
            ResourceValues::NotificationEndpoint(v) => {
                self.services
                    .endpoints
                    .create_notification_endpoint(
                        cancel,
                        NotificationEndpoint {
                            id: PlatformId::ZERO,
                            org_id: self.org_id,
                            spec: v.to_spec(),
                        },
                    )
                    .await?
                    .id
            }
            ResourceValues::NotificationRule(v) => {
                self.services
                    .rules
                    .create_notification_rule(
                        cancel,
                        NotificationRule {
                            id: PlatformId::ZERO,
                            org_id: self.org_id,
                            endpoint_id: v.endpoint_id,
                            task_id: PlatformId::ZERO,
                            name: v.name.clone(),
                            description: v.description.clone(),
                            every: v.every.clone(),
                            offset: v.offset.clone(),
                            message_template: v.message_template.clone(),
                            status: v.status,
                            status_rules: v.status_rules.clone(),
                            tag_rules: v.tag_rules.clone(),
                        },
                    )
                    .await?
                    .id
            }
            ResourceValues::Task(v) => {
                self.services
                    .tasks
                    .create_task(
                        cancel,
                        Task {
                            id: PlatformId::ZERO,
                            org_id: self.org_id,
                            name: v.name.clone(),
                            description: v.description.clone(),
                            flux: v.query.clone(),
                            every: v.every.clone(),
                            cron: v.cron.clone(),
                            offset: v.offset.clone(),
                            status: v.status,
                            is_system: true,
                        },
                    )
                    .await?
                    .id
            }
            ResourceValues::Telegraf(v) => {
                self.services
                    .telegrafs
                    .create_telegraf_config(
                        cancel,
                        TelegrafConfig {
                            id: PlatformId::ZERO,
                            org_id: self.org_id,
                            name: v.name.clone(),
                            description: v.description.clone(),
                            config: v.config.clone(),
                        },
                    )
                    .await?
                    .id
            }
            ResourceValues::Variable(v) => {
                self.services
                    .variables
                    .create_variable(
                        cancel,
                        Variable {
                            id: PlatformId::ZERO,
                            org_id: self.org_id,
                            name: v.name.clone(),
                            description: v.description.clone(),
                            arguments: v.arguments.clone(),
                        },
                    )
                    .await?
                    .id
            }
        };
        Ok(id)
    }

    async fn update_by_values(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
        values: &ResourceValues,
    ) -> Result<()> {
        match values {
            ResourceValues::Bucket(v) => {
                self.services
                    .buckets
                    .update_bucket(
                        cancel,
                        Bucket {
                            id,
                            org_id: self.org_id,
                            name: v.name.clone(),
                            description: v.description.clone(),
                            retention_period: v.retention_period,
                        },
                    )
                    .await?;
            }
            ResourceValues::Label(v) => {
                self.services
                    .labels
                    .update_label(
                        cancel,
                        Label {
                            id,
                            org_id: self.org_id,
                            name: v.name.clone(),
                            properties: v.properties.clone(),
                        },
                    )
                    .await?;
            }
            ResourceValues::Check(v) => {
                self.services
                    .checks
                    .update_check(
                        cancel,
                        Check {
                            id,
                            org_id: self.org_id,
                            task_id: PlatformId::ZERO,
                            spec: v.to_spec(),
                        },
                    )
                    .await?;
            }
            ResourceValues::Dashboard(_) => {
                // dashboards have no in-place update path
                return Err(Error::Internal(
                    "dashboards are never updated in place".to_string(),
                ));
            }
            ResourceValues::NotificationEndpoint(v) => {
                self.services
                    .endpoints
                    .update_notification_endpoint(
                        cancel,
                        NotificationEndpoint {
                            id,
                            org_id: self.org_id,
                            spec: v.to_spec(),
                        },
                    )
                    .await?;
            }
            ResourceValues::NotificationRule(v) => {
                self.services
                    .rules
                    .update_notification_rule(
                        cancel,
                        NotificationRule {
                            id,
                            org_id: self.org_id,
                            endpoint_id: v.endpoint_id,
                            task_id: PlatformId::ZERO,
                            name: v.name.clone(),
                            description: v.description.clone(),
                            every: v.every.clone(),
                            offset: v.offset.clone(),
                            message_template: v.message_template.clone(),
                            status: v.status,
                            status_rules: v.status_rules.clone(),
                            tag_rules: v.tag_rules.clone(),
                        },
                    )
                    .await?;
            }
            ResourceValues::Task(v) => {
                self.services
                    .tasks
                    .update_task(
                        cancel,
                        Task {
                            id,
                            org_id: self.org_id,
                            name: v.name.clone(),
                            description: v.description.clone(),
                            flux: v.query.clone(),
                            every: v.every.clone(),
                            cron: v.cron.clone(),
                            offset: v.offset.clone(),
                            status: v.status,
                            is_system: true,
                        },
                    )
                    .await?;
            }
            ResourceValues::Telegraf(v) => {
                self.services
                    .telegrafs
                    .update_telegraf_config(
                        cancel,
                        TelegrafConfig {
                            id,
                            org_id: self.org_id,
                            name: v.name.clone(),
                            description: v.description.clone(),
                            config: v.config.clone(),
                        },
                    )
                    .await?;
            }
            ResourceValues::Variable(v) => {
                self.services
                    .variables
                    .update_variable(
                        cancel,
                        Variable {
                            id,
                            org_id: self.org_id,
                            name: v.name.clone(),
                            description: v.description.clone(),
                            arguments: v.arguments.clone(),
                        },
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn delete_by_kind(
        &self,
        cancel: &CancellationToken,
        kind: Kind,
        id: PlatformId,
    ) -> Result<()> {
        match kind.group() {
            Kind::Bucket => self.services.buckets.delete_bucket(cancel, id).await?,
            Kind::Label => self.services.labels.delete_label(cancel, id).await?,
            Kind::Check => self.services.checks.delete_check(cancel, id).await?,
            Kind::Dashboard => self.services.dashboards.delete_dashboard(cancel, id).await?,
            Kind::NotificationEndpoint => {
                self.services
                    .endpoints
                    .delete_notification_endpoint(cancel, id)
                    .await?
            }
            Kind::NotificationRule => {
                self.services
                    .rules
                    .delete_notification_rule(cancel, id)
                    .await?
            }
            Kind::Task => self.services.tasks.delete_task(cancel, id).await?,
            Kind::Telegraf => {
                self.services
                    .telegrafs
                    .delete_telegraf_config(cancel, id)
                    .await?
            }
            Kind::Variable => self.services.variables.delete_variable(cancel, id).await?,
            other => return Err(Error::Internal(format!("cannot delete kind {other}"))),
        }
        Ok(())
    }
}

/// A rule's endpoint may only have been realized moments before the rule is
/// written; resolve a still-zero endpoint id against the realized set.
fn fill_rule_endpoint(
    template: &Template,
    meta_name: &str,
    values: &mut ResourceValues,
    state: &ApplyState,
) -> Result<()> {
    let ResourceValues::NotificationRule(rule) = values else {
        return Ok(());
    };
    if rule.endpoint_id.is_zero() {
        if let Some(object) = template.get(Kind::NotificationRule, meta_name) {
            if let crate::template::ResourceSpec::NotificationRule(spec) = &object.spec {
                rule.endpoint_id = state
                    .realized_id(Kind::NotificationEndpoint, &spec.endpoint_name)
                    .unwrap_or(PlatformId::ZERO);
            }
        }
    }
    if rule.endpoint_id.is_zero() {
        return Err(Error::RefMissing {
            kind: Kind::NotificationEndpoint,
            meta_name: meta_name.to_string(),
        });
    }
    Ok(())
}

fn collect_stack_resources(template: &Template, state: &ApplyState) -> Vec<StackResource> {
    template
        .objects()
        .iter()
        .filter_map(|object| {
            let id = state.realized_id(object.kind(), &object.meta_name)?;
            Some(StackResource {
                api_version: API_VERSION.to_string(),
                id,
                kind: object.kind(),
                meta_name: object.meta_name.clone(),
                associations: object.associations.clone(),
            })
        })
        .collect()
}
