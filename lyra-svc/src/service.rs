//! The orchestrating service facade
//!
//! Wires the resolver, differ, planner, applier, and exporter to the stack
//! store. Dry-run stops after planning; apply drives the writes and appends
//! a stack event; export runs the pipeline in reverse.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use lyra_core::applier::Applier;
use lyra_core::differ::Differ;
use lyra_core::error::{Error, Result};
use lyra_core::exporter::{ExportOpts, Exporter, OrgExportFilter, ResourceToClone};
use lyra_core::ids::{IdGenerator, PlatformId, RandomIdGenerator, TimeSource, WallClock};
use lyra_core::plan::{self, ApplyOpts, DiffSet, ImpactSummary};
use lyra_core::resolver::{self, ResolvedTemplate};
use lyra_core::resource::StackResource;
use lyra_core::service::Services;
use lyra_core::template::Template;

use lyra_stack::stack::{
    merge_stack_update, Stack, StackEvent, StackEventType, StackStatus, StackUpdate,
};
use lyra_stack::store::{ListFilter, StackStore, StoreError};

use crate::sources::normalize_remote_sources;

/// Request to initialize a new stack
#[derive(Debug, Clone, Default)]
pub struct CreateStackRequest {
    pub org_id: PlatformId,
    pub name: String,
    pub description: String,
    pub template_urls: Vec<String>,
}

/// Export request; the closed option surface for exports
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    clones: Vec<ResourceToClone>,
    org_filters: Vec<OrgExportFilter>,
    stack_id: Option<PlatformId>,
}

impl ExportRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing_resources(mut self, clones: Vec<ResourceToClone>) -> Self {
        self.clones.extend(clones);
        self
    }

    pub fn with_all_org_resources(mut self, filter: OrgExportFilter) -> Self {
        self.org_filters.push(filter);
        self
    }

    /// Export everything the stack's latest event owns
    pub fn with_stack_id(mut self, id: PlatformId) -> Self {
        self.stack_id = Some(id);
        self
    }
}

/// The resource orchestrator
pub struct Service {
    services: Services,
    store: Arc<dyn StackStore>,
    id_gen: Arc<dyn IdGenerator>,
    time: Arc<dyn TimeSource>,
}

impl Service {
    pub fn new(services: Services, store: Arc<dyn StackStore>) -> Self {
        Self {
            services,
            store,
            id_gen: Arc::new(RandomIdGenerator),
            time: Arc::new(WallClock),
        }
    }

    /// Inject a deterministic id generator
    pub fn with_id_generator(mut self, id_gen: Arc<dyn IdGenerator>) -> Self {
        self.id_gen = id_gen;
        self
    }

    /// Inject a deterministic time source
    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    /// Plan a template against live state without writing anything. The
    /// impact summary is always returned, even when non-fatal diagnostics
    /// (missing secrets, unbound env refs) are present.
    pub async fn dry_run(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
        opts: ApplyOpts,
    ) -> Result<ImpactSummary> {
        let stack = self.read_bound_stack(&opts).await?;
        let (_, _, impact) = self.plan(cancel, org_id, &opts, stack.as_ref()).await?;
        Ok(impact)
    }

    /// Apply a template. Either every intended change lands and the stack
    /// gains a new event, or the error reports what was rolled back.
    pub async fn apply(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
        opts: ApplyOpts,
    ) -> Result<ImpactSummary> {
        let mut stack = match self.read_bound_stack(&opts).await? {
            Some(stack) => {
                if stack.is_uninstalled() {
                    return Err(Error::Conflict(format!(
                        "stack {} is uninstalled",
                        stack.id
                    )));
                }
                stack
            }
            // an unbound apply gets its own fresh stack
            None => {
                self.init_stack(
                    cancel,
                    CreateStackRequest {
                        org_id,
                        ..Default::default()
                    },
                )
                .await?
            }
        };

        let (resolved, diffs, mut impact) =
            self.plan(cancel, org_id, &opts, Some(&stack)).await?;
        impact.stack_id = stack.id;

        let stack_resources = stack.resources().to_vec();
        let applier = Applier::new(&self.services, org_id, &stack_resources);
        let outcome = applier.apply(cancel, &resolved, &diffs).await?;

        // the first apply is the one that first binds resources to the stack
        let is_first_apply = stack.status() == StackStatus::Created
            && stack.events.iter().all(|e| e.resources.is_empty());
        let event_type = if is_first_apply {
            StackEventType::Create
        } else {
            StackEventType::Update
        };
        let mut event = StackEvent::new(event_type, self.time.now());
        if let Some(latest) = stack.latest_event() {
            event.name = latest.name.clone();
            event.description = latest.description.clone();
            event.template_urls = latest.template_urls.clone();
        }
        event.resources = outcome.realized;
        stack.push_event(event);
        self.store
            .update_stack(stack.clone())
            .await
            .map_err(store_error)?;

        info!(stack = %stack.id, "template applied");
        impact.summary = outcome.summary;
        Ok(impact)
    }

    /// Emit a template reproducing existing resources
    pub async fn export(
        &self,
        cancel: &CancellationToken,
        request: ExportRequest,
    ) -> Result<Template> {
        let mut opts = ExportOpts::new().with_existing_resources(request.clones);
        for filter in request.org_filters {
            opts = opts.with_all_org_resources(filter);
        }
        if let Some(stack_id) = request.stack_id {
            let stack = self.read_stack(stack_id).await?;
            let clones = stack
                .resources()
                .iter()
                .map(|r| ResourceToClone {
                    kind: r.kind,
                    id: r.id,
                    name: None,
                })
                .collect();
            opts = opts.with_existing_resources(clones);
        }
        Exporter::new(&self.services).export(cancel, opts).await
    }

    /// Create a stack bound to an existing org
    pub async fn init_stack(
        &self,
        cancel: &CancellationToken,
        request: CreateStackRequest,
    ) -> Result<Stack> {
        self.services
            .orgs
            .find_organization_by_id(cancel, request.org_id)
            .await
            .map_err(|_| {
                Error::Conflict(format!(
                    "organization {} does not exist",
                    request.org_id
                ))
            })?;

        let now = self.time.now();
        let mut event = StackEvent::new(StackEventType::Create, now);
        event.name = request.name;
        event.description = request.description;
        event.template_urls = normalize_remote_sources(&request.template_urls);

        let stack = Stack {
            id: self.id_gen.next_id(),
            org_id: request.org_id,
            created_at: now,
            events: vec![event],
        };
        self.store
            .create_stack(stack.clone())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(stack)
    }

    pub async fn read_stack(&self, id: PlatformId) -> Result<Stack> {
        self.store.read_stack_by_id(id).await.map_err(store_error)
    }

    pub async fn list_stacks(
        &self,
        org_id: PlatformId,
        filter: ListFilter,
    ) -> Result<Vec<Stack>> {
        self.store
            .list_stacks(org_id, filter)
            .await
            .map_err(store_error)
    }

    /// Merge a partial update into a new stack event
    pub async fn update_stack(&self, update: StackUpdate) -> Result<Stack> {
        let mut stack = self.read_stack(update.id).await?;
        let mut update = update;
        if let Some(urls) = update.template_urls.take() {
            update.template_urls = Some(normalize_remote_sources(&urls));
        }
        let event = merge_stack_update(&stack, &update, self.id_gen.as_ref(), self.time.now());
        stack.push_event(event);
        self.store
            .update_stack(stack.clone())
            .await
            .map_err(store_error)?;
        Ok(stack)
    }

    pub async fn delete_stack(&self, id: PlatformId) -> Result<()> {
        self.store.delete_stack(id).await.map_err(store_error)
    }

    /// Delete every resource the stack owns and mark it uninstalled.
    /// Further applies against it fail with a conflict.
    pub async fn uninstall(
        &self,
        cancel: &CancellationToken,
        stack_id: PlatformId,
    ) -> Result<Stack> {
        let mut stack = self.read_stack(stack_id).await?;
        if stack.is_uninstalled() {
            return Err(Error::Conflict(format!(
                "stack {stack_id} is already uninstalled"
            )));
        }

        let stack_resources = stack.resources().to_vec();
        let empty = resolver::resolve(
            &Template::default(),
            &std::collections::BTreeMap::new(),
            &stack_resources,
        )?;
        let differ = Differ::new(&self.services, stack.org_id, &stack_resources);
        let diffs = differ.diff(cancel, &empty).await?;
        let applier = Applier::new(&self.services, stack.org_id, &stack_resources);
        applier.apply(cancel, &empty, &diffs).await?;

        stack.push_event(StackEvent::new(StackEventType::Uninstall, self.time.now()));
        self.store
            .update_stack(stack.clone())
            .await
            .map_err(store_error)?;
        Ok(stack)
    }

    async fn read_bound_stack(&self, opts: &ApplyOpts) -> Result<Option<Stack>> {
        match opts.stack_id() {
            Some(id) => Ok(Some(self.read_stack(id).await?)),
            None => Ok(None),
        }
    }

    /// Shared planning pipeline: merge, validate, resolve, diff, skip-filter,
    /// and surface missing secrets.
    async fn plan(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
        opts: &ApplyOpts,
        stack: Option<&Stack>,
    ) -> Result<(ResolvedTemplate, DiffSet, ImpactSummary)> {
        let template = opts.merged_template()?;
        let defects = template.validate();
        if !defects.is_empty() {
            return Err(Error::Validation(defects));
        }

        let stack_resources: Vec<StackResource> = stack
            .map(|s| s.resources().to_vec())
            .unwrap_or_default();
        let resolved = resolver::resolve(&template, opts.env_refs(), &stack_resources)?;

        let differ = Differ::new(&self.services, org_id, &stack_resources);
        let mut diffs = differ.diff(cancel, &resolved).await?;
        plan::apply_skips(&mut diffs, opts);

        let referenced = resolved.template.secret_fields();
        let missing_secrets = if referenced.is_empty() {
            Vec::new()
        } else {
            let store_keys = self
                .services
                .secrets
                .list_secret_keys(cancel, org_id)
                .await?;
            plan::missing_secrets(&referenced, &store_keys, opts.secrets())
        };

        let impact = ImpactSummary {
            stack_id: stack.map(|s| s.id).unwrap_or(PlatformId::ZERO),
            diff: diffs.clone(),
            summary: Default::default(),
            missing_secrets,
            missing_env_refs: resolved.missing_env_refs.clone(),
        };
        Ok((resolved, diffs, impact))
    }
}

fn store_error(err: StoreError) -> Error {
    match err {
        StoreError::NotFound(id) => Error::NotFound(format!("stack {id}")),
        StoreError::Conflict(msg) => Error::Conflict(msg),
        other => Error::Internal(other.to_string()),
    }
}
