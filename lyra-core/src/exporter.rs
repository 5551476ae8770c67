//! Exporter - reads existing resources and emits a normalized template
//!
//! The inverse of the applier: given explicit resources to clone or a whole
//! org, fetch live state and synthesize a template that reproduces it.
//! Associated labels ride along with their owners; rules pull their
//! endpoints; dashboards fetch each cell's view and embed it in the chart.

use std::collections::{HashMap, HashSet};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::differ::rule_values;
use crate::error::{Error, Result};
use crate::ids::PlatformId;
use crate::kind::Kind;
use crate::platform::{
    strip_task_option, Bucket, Check, Dashboard, Label, NotificationEndpoint, NotificationRule,
    Task, TelegrafConfig, Variable,
};
use crate::resource::bucket::BucketSpec;
use crate::resource::dashboard::{Chart, DashboardSpec};
use crate::resource::label::LabelValues;
use crate::resource::task::TaskSpec;
use crate::resource::telegraf::TelegrafSpec;
use crate::resource::variable::VariableSpec;
use crate::resource::Association;
use crate::service::{ServiceError, Services};
use crate::template::{ResourceSpec, Template, TemplateObject};

/// One resource requested for export
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceToClone {
    pub kind: Kind,
    pub id: PlatformId,
    /// Overrides both the exported name and meta name when set
    pub name: Option<String>,
}

/// Whole-org export request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrgExportFilter {
    pub org_id: PlatformId,
    /// Restrict to these kinds; empty means every kind
    pub resource_kinds: Vec<Kind>,
    /// Restrict labels to these names; empty means every label
    pub label_names: Vec<String>,
}

/// Export option surface
#[derive(Debug, Clone, Default)]
pub struct ExportOpts {
    pub(crate) clones: Vec<ResourceToClone>,
    pub(crate) org_filters: Vec<OrgExportFilter>,
}

impl ExportOpts {
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
}

/// Deterministic meta-name slug for a resource without a caller-chosen name.
/// Hash-derived from (kind, id) so resources sharing a display name cannot
/// collide.
fn meta_slug(kind: Kind, id: PlatformId) -> String {
    let digest = Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{}/{}", kind.group(), id).as_bytes(),
    );
    let hex = digest.simple().to_string();
    format!("{}-{}", kind.slug(), &hex[..8])
}

#[derive(Default)]
struct Fetched {
    buckets: Vec<(Bucket, Option<String>)>,
    checks: Vec<(Check, Option<String>)>,
    dashboards: Vec<(Dashboard, Vec<Chart>, Option<String>)>,
    labels: Vec<(Label, Option<String>)>,
    endpoints: Vec<(NotificationEndpoint, Option<String>)>,
    rules: Vec<(NotificationRule, Option<String>)>,
    tasks: Vec<(Task, Option<String>)>,
    telegrafs: Vec<(TelegrafConfig, Option<String>)>,
    variables: Vec<(Variable, Option<String>)>,
    /// (group kind, resource id) -> associated label ids
    associations: HashMap<(Kind, PlatformId), Vec<PlatformId>>,
}

pub struct Exporter<'a> {
    services: &'a Services,
}

impl<'a> Exporter<'a> {
    pub fn new(services: &'a Services) -> Self {
        Self { services }
    }

    /// Run the export and build the resulting template
    pub async fn export(&self, cancel: &CancellationToken, opts: ExportOpts) -> Result<Template> {
        let mut clones = opts.clones;
        for filter in &opts.org_filters {
            clones.extend(self.list_org_resources(cancel, filter).await?);
        }

        let mut fetched = Fetched::default();
        let mut seen: HashSet<(Kind, PlatformId)> = HashSet::new();
        for clone in clones {
            self.fetch_one(cancel, &clone, &mut fetched, &mut seen)
                .await?;
        }

        Ok(build_template(fetched))
    }

    async fn list_org_resources(
        &self,
        cancel: &CancellationToken,
        filter: &OrgExportFilter,
    ) -> Result<Vec<ResourceToClone>> {
        let org_id = filter.org_id;
        let wants = |kind: Kind| {
            filter.resource_kinds.is_empty()
                || filter.resource_kinds.iter().any(|k| k.matches(kind))
        };
        let mut clones = Vec::new();

        if wants(Kind::Label) {
            for label in self.services.labels.list_labels(cancel, org_id).await? {
                if filter.label_names.is_empty() || filter.label_names.contains(&label.name) {
                    clones.push(ResourceToClone {
                        kind: Kind::Label,
                        id: label.id,
                        name: None,
                    });
                }
            }
        }
        if wants(Kind::Bucket) {
            for bucket in self.services.buckets.list_buckets(cancel, org_id).await? {
                clones.push(ResourceToClone {
                    kind: Kind::Bucket,
                    id: bucket.id,
                    name: None,
                });
            }
        }

        // checks and rules own the tasks that evaluate them; remember those
        // task ids so the task listing can exclude them
        let mut owned_task_ids: HashSet<PlatformId> = HashSet::new();
        let checks = self.services.checks.find_checks(cancel, org_id, None).await?;
        for check in &checks {
            owned_task_ids.insert(check.task_id);
        }
        let rules = self
            .services
            .rules
            .list_notification_rules(cancel, org_id)
            .await?;
        for rule in &rules {
            owned_task_ids.insert(rule.task_id);
        }

        if wants(Kind::Check) {
            for check in &checks {
                clones.push(ResourceToClone {
                    kind: check.spec.kind(),
                    id: check.id,
                    name: None,
                });
            }
        }
        if wants(Kind::NotificationEndpoint) {
            for endpoint in self
                .services
                .endpoints
                .find_notification_endpoints(cancel, org_id, None)
                .await?
            {
                clones.push(ResourceToClone {
                    kind: endpoint.spec.kind(),
                    id: endpoint.id,
                    name: None,
                });
            }
        }
        if wants(Kind::NotificationRule) {
            for rule in &rules {
                clones.push(ResourceToClone {
                    kind: Kind::NotificationRule,
                    id: rule.id,
                    name: None,
                });
            }
        }
        if wants(Kind::Task) {
            for task in self.services.tasks.list_tasks(cancel, org_id).await? {
                if task.is_system && !owned_task_ids.contains(&task.id) {
                    clones.push(ResourceToClone {
                        kind: Kind::Task,
                        id: task.id,
                        name: None,
                    });
                }
            }
        }
        if wants(Kind::Telegraf) {
            for config in self
                .services
                .telegrafs
                .list_telegraf_configs(cancel, org_id)
                .await?
            {
                clones.push(ResourceToClone {
                    kind: Kind::Telegraf,
                    id: config.id,
                    name: None,
                });
            }
        }
        if wants(Kind::Variable) {
            for variable in self.services.variables.list_variables(cancel, org_id).await? {
                clones.push(ResourceToClone {
                    kind: Kind::Variable,
                    id: variable.id,
                    name: None,
                });
            }
        }
        if wants(Kind::Dashboard) {
            for dashboard in self
                .services
                .dashboards
                .list_dashboards(cancel, org_id)
                .await?
            {
                clones.push(ResourceToClone {
                    kind: Kind::Dashboard,
                    id: dashboard.id,
                    name: None,
                });
            }
        }

        Ok(clones)
    }

    async fn fetch_one(
        &self,
        cancel: &CancellationToken,
        clone: &ResourceToClone,
        fetched: &mut Fetched,
        seen: &mut HashSet<(Kind, PlatformId)>,
    ) -> Result<()> {
        let key = (clone.kind.group(), clone.id);
        if !seen.insert(key) {
            return Ok(());
        }

        match clone.kind.group() {
            Kind::Label => {
                let label = self
                    .services
                    .labels
                    .find_label_by_id(cancel, clone.id)
                    .await?;
                fetched.labels.push((label, clone.name.clone()));
            }
            Kind::Bucket => {
                let bucket = self
                    .services
                    .buckets
                    .find_bucket_by_id(cancel, clone.id)
                    .await?;
                self.pull_labels(cancel, Kind::Bucket, bucket.id, fetched, seen)
                    .await?;
                fetched.buckets.push((bucket, clone.name.clone()));
            }
            Kind::Check => {
                let check = self
                    .services
                    .checks
                    .find_check_by_id(cancel, clone.id)
                    .await?;
                self.pull_labels(cancel, Kind::Check, check.id, fetched, seen)
                    .await?;
                fetched.checks.push((check, clone.name.clone()));
            }
            Kind::Dashboard => {
                let dashboard = self
                    .services
                    .dashboards
                    .find_dashboard_by_id(cancel, clone.id)
                    .await?;
                // each cell's view is stored apart from the dashboard
                let mut charts = Vec::new();
                for cell in &dashboard.cells {
                    match self
                        .services
                        .dashboards
                        .find_view(cancel, dashboard.id, cell.id)
                        .await
                    {
                        Ok(view) => {
                            let mut chart = view.chart;
                            chart.x_pos = cell.x;
                            chart.y_pos = cell.y;
                            chart.width = cell.w;
                            chart.height = cell.h;
                            charts.push(chart);
                        }
                        Err(ServiceError::NotFound(_)) => continue,
                        Err(err) => return Err(err.into()),
                    }
                }
                self.pull_labels(cancel, Kind::Dashboard, dashboard.id, fetched, seen)
                    .await?;
                fetched.dashboards.push((dashboard, charts, clone.name.clone()));
            }
            Kind::NotificationEndpoint => {
                let endpoint = self
                    .services
                    .endpoints
                    .find_notification_endpoint_by_id(cancel, clone.id)
                    .await?;
                self.pull_labels(cancel, Kind::NotificationEndpoint, endpoint.id, fetched, seen)
                    .await?;
                fetched.endpoints.push((endpoint, clone.name.clone()));
            }
            Kind::NotificationRule => {
                let rule = self
                    .services
                    .rules
                    .find_notification_rule_by_id(cancel, clone.id)
                    .await?;
                // the rule's endpoint must ride along so the reference stays
                // resolvable inside the exported template
                if seen.insert((Kind::NotificationEndpoint, rule.endpoint_id)) {
                    let endpoint = self
                        .services
                        .endpoints
                        .find_notification_endpoint_by_id(cancel, rule.endpoint_id)
                        .await?;
                    self.pull_labels(
                        cancel,
                        Kind::NotificationEndpoint,
                        endpoint.id,
                        fetched,
                        seen,
                    )
                    .await?;
                    fetched.endpoints.push((endpoint, None));
                }
                self.pull_labels(cancel, Kind::NotificationRule, rule.id, fetched, seen)
                    .await?;
                fetched.rules.push((rule, clone.name.clone()));
            }
            Kind::Task => {
                let task = self
                    .services
                    .tasks
                    .find_task_by_id(cancel, clone.id)
                    .await?;
                self.pull_labels(cancel, Kind::Task, task.id, fetched, seen)
                    .await?;
                fetched.tasks.push((task, clone.name.clone()));
            }
            Kind::Telegraf => {
                let config = self
                    .services
                    .telegrafs
                    .find_telegraf_config_by_id(cancel, clone.id)
                    .await?;
                self.pull_labels(cancel, Kind::Telegraf, config.id, fetched, seen)
                    .await?;
                fetched.telegrafs.push((config, clone.name.clone()));
            }
            Kind::Variable => {
                let variable = self
                    .services
                    .variables
                    .find_variable_by_id(cancel, clone.id)
                    .await?;
                self.pull_labels(cancel, Kind::Variable, variable.id, fetched, seen)
                    .await?;
                fetched.variables.push((variable, clone.name.clone()));
            }
            other => {
                return Err(Error::Internal(format!(
                    "cannot export resources of kind {other}"
                )))
            }
        }
        Ok(())
    }

    /// Associated labels ride along as additional exports, deduped by id
    async fn pull_labels(
        &self,
        cancel: &CancellationToken,
        kind: Kind,
        resource_id: PlatformId,
        fetched: &mut Fetched,
        seen: &mut HashSet<(Kind, PlatformId)>,
    ) -> Result<()> {
        let labels = self
            .services
            .labels
            .find_resource_labels(cancel, resource_id, kind.group())
            .await?;
        let entry = fetched
            .associations
            .entry((kind.group(), resource_id))
            .or_default();
        for label in labels {
            entry.push(label.id);
            if seen.insert((Kind::Label, label.id)) {
                fetched.labels.push((label, None));
            }
        }
        Ok(())
    }
}

fn export_names(
    kind: Kind,
    id: PlatformId,
    live_name: &str,
    name_override: &Option<String>,
) -> (String, String) {
    match name_override {
        // caller-supplied name becomes both the name and the meta name
        Some(name) => (name.clone(), name.clone()),
        None => (live_name.to_string(), meta_slug(kind, id)),
    }
}

fn build_template(fetched: Fetched) -> Template {
    // labels and endpoints are assigned meta names first so every reference
    // to them reconciles to one canonical meta name per platform id
    let mut label_meta: HashMap<PlatformId, String> = HashMap::new();
    let mut endpoint_meta: HashMap<PlatformId, String> = HashMap::new();
    let mut objects = Vec::new();

    for (label, name_override) in &fetched.labels {
        let (name, meta) = export_names(Kind::Label, label.id, &label.name, name_override);
        label_meta.insert(label.id, meta.clone());
        let values = LabelValues {
            name,
            properties: label.properties.clone(),
        };
        objects.push(TemplateObject::new(
            meta,
            ResourceSpec::Label(values.to_spec()),
        ));
    }
    for (endpoint, name_override) in &fetched.endpoints {
        let (name, meta) = export_names(
            endpoint.spec.kind(),
            endpoint.id,
            endpoint.name(),
            name_override,
        );
        endpoint_meta.insert(endpoint.id, meta.clone());
        let mut spec = endpoint.spec.clone();
        spec.base_mut().name = Some(name);
        objects.push(TemplateObject::new(
            meta,
            ResourceSpec::NotificationEndpoint(spec),
        ));
    }

    let associations = |kind: Kind, id: PlatformId| -> Vec<Association> {
        let mut names: Vec<String> = fetched
            .associations
            .get(&(kind.group(), id))
            .into_iter()
            .flatten()
            .filter_map(|label_id| label_meta.get(label_id).cloned())
            .collect();
        names.sort();
        names.dedup();
        names.into_iter().map(Association::label).collect()
    };

    for (bucket, name_override) in &fetched.buckets {
        let (name, meta) = export_names(Kind::Bucket, bucket.id, &bucket.name, name_override);
        let spec = BucketSpec {
            name: Some(name),
            description: if bucket.description.is_empty() {
                None
            } else {
                Some(bucket.description.clone())
            },
            retention_rules: crate::resource::bucket::BucketValues {
                name: String::new(),
                description: String::new(),
                retention_period: bucket.retention_period,
            }
            .to_spec()
            .retention_rules,
        };
        objects.push(
            TemplateObject::new(meta, ResourceSpec::Bucket(spec))
                .with_associations(associations(Kind::Bucket, bucket.id)),
        );
    }
    for (check, name_override) in &fetched.checks {
        let (name, meta) = export_names(check.spec.kind(), check.id, check.name(), name_override);
        let mut spec = check.spec.clone();
        spec.base_mut().name = Some(name);
        objects.push(
            TemplateObject::new(meta, ResourceSpec::Check(spec))
                .with_associations(associations(Kind::Check, check.id)),
        );
    }
    for (dashboard, charts, name_override) in &fetched.dashboards {
        let (name, meta) =
            export_names(Kind::Dashboard, dashboard.id, &dashboard.name, name_override);
        let spec = DashboardSpec {
            name: Some(name),
            description: if dashboard.description.is_empty() {
                None
            } else {
                Some(dashboard.description.clone())
            },
            charts: charts.clone(),
        };
        objects.push(
            TemplateObject::new(meta, ResourceSpec::Dashboard(spec))
                .with_associations(associations(Kind::Dashboard, dashboard.id)),
        );
    }
    for (rule, name_override) in &fetched.rules {
        let (name, meta) = export_names(Kind::NotificationRule, rule.id, &rule.name, name_override);
        let endpoint_name = endpoint_meta
            .get(&rule.endpoint_id)
            .cloned()
            .unwrap_or_default();
        let mut values = rule_values(rule, String::new(), String::new());
        values.name = name;
        objects.push(
            TemplateObject::new(meta, ResourceSpec::NotificationRule(values.to_spec(endpoint_name)))
                .with_associations(associations(Kind::NotificationRule, rule.id)),
        );
    }
    for (task, name_override) in &fetched.tasks {
        let (name, meta) = export_names(Kind::Task, task.id, &task.name, name_override);
        // schedule fields re-synthesize from the task struct, not the flux
        // text; the option prelude is stripped from the query
        let spec = TaskSpec {
            name: Some(name),
            description: if task.description.is_empty() {
                None
            } else {
                Some(task.description.clone())
            },
            every: task.every.clone(),
            cron: task.cron.clone(),
            offset: task.offset.clone(),
            query: strip_task_option(&task.flux),
            status: task.status,
        };
        objects.push(
            TemplateObject::new(meta, ResourceSpec::Task(spec))
                .with_associations(associations(Kind::Task, task.id)),
        );
    }
    for (config, name_override) in &fetched.telegrafs {
        let (name, meta) = export_names(Kind::Telegraf, config.id, &config.name, name_override);
        let spec = TelegrafSpec {
            name: Some(name),
            description: if config.description.is_empty() {
                None
            } else {
                Some(config.description.clone())
            },
            config: config.config.clone(),
        };
        objects.push(
            TemplateObject::new(meta, ResourceSpec::Telegraf(spec))
                .with_associations(associations(Kind::Telegraf, config.id)),
        );
    }
    for (variable, name_override) in &fetched.variables {
        let (name, meta) = export_names(Kind::Variable, variable.id, &variable.name, name_override);
        let spec = VariableSpec {
            name: Some(name),
            description: if variable.description.is_empty() {
                None
            } else {
                Some(variable.description.clone())
            },
            arguments: variable.arguments.clone(),
            selected: Vec::new(),
        };
        objects.push(
            TemplateObject::new(meta, ResourceSpec::Variable(spec))
                .with_associations(associations(Kind::Variable, variable.id)),
        );
    }

    objects.sort_by(|a, b| (a.kind(), a.meta_name.clone()).cmp(&(b.kind(), b.meta_name.clone())));
    Template::new(objects)
}
