//! State differ - compares desired template state with live platform state
//!
//! For each declared resource the differ queries the owning service by name
//! within the org and emits a diff entry. Resources owned by the bound stack
//! but absent from the template become removals. Dashboards and notification
//! rules are never name-matched; they stay new unless the stack owns them.

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::ids::PlatformId;
use crate::kind::Kind;
use crate::plan::{DiffIdentifier, DiffSet, ResourceDiff, StateStatus};
use crate::platform::{strip_task_option, NotificationRule, Task};
use crate::resolver::ResolvedTemplate;
use crate::resource::bucket::BucketValues;
use crate::resource::label::LabelValues;
use crate::resource::rule::{EndpointBinding, RuleSpec, RuleValues};
use crate::resource::task::TaskValues;
use crate::resource::telegraf::TelegrafValues;
use crate::resource::variable::VariableValues;
use crate::resource::{normalize_duration, ResourceValues, StackResource};
use crate::service::{ServiceError, Services};
use crate::template::{ResourceSpec, Template, TemplateObject};

pub struct Differ<'a> {
    services: &'a Services,
    org_id: PlatformId,
    stack_resources: &'a [StackResource],
}

impl<'a> Differ<'a> {
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

    /// Produce the full diff set for a resolved template
    pub async fn diff(
        &self,
        cancel: &CancellationToken,
        resolved: &ResolvedTemplate,
    ) -> Result<DiffSet> {
        let template = &resolved.template;
        let mut diffs = DiffSet::default();
        for object in template.objects() {
            diffs.push(self.diff_object(cancel, template, object).await?);
        }
        self.diff_removals(cancel, template, &mut diffs).await?;
        diffs.sort();
        Ok(diffs)
    }

    fn stack_entry(&self, kind: Kind, meta_name: &str) -> Option<&StackResource> {
        self.stack_resources
            .iter()
            .find(|r| r.kind.matches(kind) && r.meta_name == meta_name)
    }

    async fn diff_object(
        &self,
        cancel: &CancellationToken,
        template: &Template,
        object: &TemplateObject,
    ) -> Result<ResourceDiff> {
        let meta = object.meta_name.as_str();
        let (old, new, id) = match &object.spec {
            ResourceSpec::Bucket(spec) => {
                let new = spec.values(meta);
                let live = self
                    .services
                    .buckets
                    .find_bucket_by_name(cancel, self.org_id, &new.name)
                    .await?;
                (
                    live.as_ref().map(|b| {
                        ResourceValues::Bucket(BucketValues {
                            name: b.name.clone(),
                            description: b.description.clone(),
                            retention_period: b.retention_period,
                        })
                    }),
                    ResourceValues::Bucket(new),
                    live.map(|b| b.id),
                )
            }
            ResourceSpec::Label(spec) => {
                let new = spec.values(meta);
                let live = self
                    .services
                    .labels
                    .find_label_by_name(cancel, self.org_id, &new.name)
                    .await?;
                (
                    live.as_ref().map(|l| {
                        ResourceValues::Label(LabelValues {
                            name: l.name.clone(),
                            properties: l.properties.clone(),
                        })
                    }),
                    ResourceValues::Label(new),
                    live.map(|l| l.id),
                )
            }
            ResourceSpec::Variable(spec) => {
                let new = spec.values(meta);
                let live = self
                    .services
                    .variables
                    .find_variable_by_name(cancel, self.org_id, &new.name)
                    .await?;
                (
                    live.as_ref().map(|v| {
                        ResourceValues::Variable(VariableValues {
                            name: v.name.clone(),
                            description: v.description.clone(),
                            arguments: v.arguments.clone(),
                        })
                    }),
                    ResourceValues::Variable(new),
                    live.map(|v| v.id),
                )
            }
            ResourceSpec::Telegraf(spec) => {
                let new = spec.values(meta);
                let live = self
                    .services
                    .telegrafs
                    .find_telegraf_config_by_name(cancel, self.org_id, &new.name)
                    .await?;
                (
                    live.as_ref().map(|t| {
                        ResourceValues::Telegraf(TelegrafValues {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            config: t.config.clone(),
                        })
                    }),
                    ResourceValues::Telegraf(new),
                    live.map(|t| t.id),
                )
            }
            ResourceSpec::Task(spec) => {
                let new = spec.values(meta);
                let live = self
                    .services
                    .tasks
                    .find_task_by_name(cancel, self.org_id, &new.name)
                    .await?;
                (
                    live.as_ref().map(|t| ResourceValues::Task(task_values(t))),
                    ResourceValues::Task(new),
                    live.map(|t| t.id),
                )
            }
            ResourceSpec::Check(spec) => {
                let new = spec.values(meta);
                // filter lookup; first exact-name match wins
                let live = self
                    .services
                    .checks
                    .find_checks(cancel, self.org_id, Some(&new.name))
                    .await?
                    .into_iter()
                    .find(|c| c.name() == new.name);
                (
                    live.as_ref()
                        .map(|c| ResourceValues::Check(c.spec.values(meta))),
                    ResourceValues::Check(new),
                    live.map(|c| c.id),
                )
            }
            ResourceSpec::NotificationEndpoint(spec) => {
                let new = spec.values(meta);
                let live = self
                    .services
                    .endpoints
                    .find_notification_endpoints(cancel, self.org_id, Some(&new.name))
                    .await?
                    .into_iter()
                    .find(|e| e.name() == new.name);
                (
                    live.as_ref()
                        .map(|e| ResourceValues::NotificationEndpoint(e.spec.values(meta))),
                    ResourceValues::NotificationEndpoint(new),
                    live.map(|e| e.id),
                )
            }
            ResourceSpec::NotificationRule(spec) => {
                let binding = self.bind_endpoint(cancel, template, spec).await?;
                let new = ResourceValues::NotificationRule(spec.values(meta, &binding));
                match self.stack_entry(Kind::NotificationRule, meta) {
                    Some(owned) => {
                        // a stack-owned rule deleted out-of-band is recreated
                        let live = self.find_live_rule(cancel, owned.id).await?;
                        let id = live.as_ref().map(|_| owned.id);
                        (live, new, id)
                    }
                    None => (None, new, None),
                }
            }
            ResourceSpec::Dashboard(spec) => {
                let new = ResourceValues::Dashboard(spec.values(meta));
                // Dashboards are never name-matched. A stack-owned dashboard
                // still present live is presumed current; everything else is
                // created anew.
                match self.stack_entry(Kind::Dashboard, meta) {
                    Some(owned) => match self
                        .services
                        .dashboards
                        .find_dashboard_by_id(cancel, owned.id)
                        .await
                    {
                        Ok(_) => (Some(new.clone()), new, Some(owned.id)),
                        Err(ServiceError::NotFound(_)) => (None, new, None),
                        Err(err) => return Err(err.into()),
                    },
                    None => (None, new, None),
                }
            }
        };

        let state_status = if old.is_some() || id.is_some() {
            StateStatus::Exists
        } else {
            StateStatus::New
        };
        Ok(ResourceDiff {
            identifier: DiffIdentifier {
                id,
                meta_name: meta.to_string(),
                kind: object.kind(),
                state_status,
            },
            old,
            new: Some(new),
        })
    }

    /// Resolve a rule's endpoint to a realized or pending identity
    async fn bind_endpoint(
        &self,
        cancel: &CancellationToken,
        template: &Template,
        rule: &RuleSpec,
    ) -> Result<EndpointBinding> {
        if let Some(endpoint_object) = template.get(Kind::NotificationEndpoint, &rule.endpoint_name)
        {
            let ResourceSpec::NotificationEndpoint(spec) = &endpoint_object.spec else {
                return Err(Error::RefMissing {
                    kind: Kind::NotificationEndpoint,
                    meta_name: rule.endpoint_name.clone(),
                });
            };
            let values = spec.values(&endpoint_object.meta_name);
            let live = self
                .services
                .endpoints
                .find_notification_endpoints(cancel, self.org_id, Some(&values.name))
                .await?
                .into_iter()
                .find(|e| e.name() == values.name);
            return Ok(EndpointBinding {
                // zero until the endpoint itself is realized
                id: live.map(|e| e.id).unwrap_or(PlatformId::ZERO),
                name: values.name,
                endpoint_type: spec.type_label().to_string(),
            });
        }
        let owned = self
            .stack_entry(Kind::NotificationEndpoint, &rule.endpoint_name)
            .ok_or_else(|| Error::RefMissing {
                kind: Kind::NotificationEndpoint,
                meta_name: rule.endpoint_name.clone(),
            })?;
        match self
            .services
            .endpoints
            .find_notification_endpoint_by_id(cancel, owned.id)
            .await
        {
            Ok(endpoint) => Ok(EndpointBinding {
                id: endpoint.id,
                name: endpoint.name().to_string(),
                endpoint_type: endpoint.spec.type_label().to_string(),
            }),
            Err(ServiceError::NotFound(_)) => Err(Error::RefMissing {
                kind: Kind::NotificationEndpoint,
                meta_name: rule.endpoint_name.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_live_rule(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
    ) -> Result<Option<ResourceValues>> {
        match self
            .services
            .rules
            .find_notification_rule_by_id(cancel, id)
            .await
        {
            Ok(rule) => {
                let (endpoint_name, endpoint_type) = match self
                    .services
                    .endpoints
                    .find_notification_endpoint_by_id(cancel, rule.endpoint_id)
                    .await
                {
                    Ok(e) => (e.name().to_string(), e.spec.type_label().to_string()),
                    Err(ServiceError::NotFound(_)) => (String::new(), String::new()),
                    Err(err) => return Err(err.into()),
                };
                Ok(Some(ResourceValues::NotificationRule(rule_values(
                    &rule,
                    endpoint_name,
                    endpoint_type,
                ))))
            }
            Err(ServiceError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Stack-owned resources missing from the template become removals
    async fn diff_removals(
        &self,
        cancel: &CancellationToken,
        template: &Template,
        diffs: &mut DiffSet,
    ) -> Result<()> {
        for owned in self.stack_resources {
            if template.contains(owned.kind, &owned.meta_name) {
                continue;
            }
            let old = self.live_values_by_id(cancel, owned.kind, owned.id).await?;
            let Some(old) = old else {
                // already gone from the platform; nothing to remove
                continue;
            };
            diffs.push(ResourceDiff {
                identifier: DiffIdentifier {
                    id: Some(owned.id),
                    meta_name: owned.meta_name.clone(),
                    kind: owned.kind,
                    state_status: StateStatus::Remove,
                },
                old: Some(old),
                new: None,
            });
        }
        Ok(())
    }

    async fn live_values_by_id(
        &self,
        cancel: &CancellationToken,
        kind: Kind,
        id: PlatformId,
    ) -> Result<Option<ResourceValues>> {
        let values = match kind.group() {
            Kind::Bucket => match self.services.buckets.find_bucket_by_id(cancel, id).await {
                Ok(b) => Some(ResourceValues::Bucket(BucketValues {
                    name: b.name,
                    description: b.description,
                    retention_period: b.retention_period,
                })),
                Err(ServiceError::NotFound(_)) => None,
                Err(err) => return Err(err.into()),
            },
            Kind::Label => match self.services.labels.find_label_by_id(cancel, id).await {
                Ok(l) => Some(ResourceValues::Label(LabelValues {
                    name: l.name,
                    properties: l.properties,
                })),
                Err(ServiceError::NotFound(_)) => None,
                Err(err) => return Err(err.into()),
            },
            Kind::Check => match self.services.checks.find_check_by_id(cancel, id).await {
                Ok(c) => Some(ResourceValues::Check(c.spec.values(""))),
                Err(ServiceError::NotFound(_)) => None,
                Err(err) => return Err(err.into()),
            },
            Kind::Dashboard => match self
                .services
                .dashboards
                .find_dashboard_by_id(cancel, id)
                .await
            {
                Ok(d) => Some(ResourceValues::Dashboard(
                    crate::resource::dashboard::DashboardValues {
                        name: d.name,
                        description: d.description,
                        charts: Vec::new(),
                    },
                )),
                Err(ServiceError::NotFound(_)) => None,
                Err(err) => return Err(err.into()),
            },
            Kind::NotificationEndpoint => match self
                .services
                .endpoints
                .find_notification_endpoint_by_id(cancel, id)
                .await
            {
                Ok(e) => Some(ResourceValues::NotificationEndpoint(e.spec.values(""))),
                Err(ServiceError::NotFound(_)) => None,
                Err(err) => return Err(err.into()),
            },
            Kind::NotificationRule => self.find_live_rule(cancel, id).await?,
            Kind::Task => match self.services.tasks.find_task_by_id(cancel, id).await {
                Ok(t) => Some(ResourceValues::Task(task_values(&t))),
                Err(ServiceError::NotFound(_)) => None,
                Err(err) => return Err(err.into()),
            },
            Kind::Telegraf => match self
                .services
                .telegrafs
                .find_telegraf_config_by_id(cancel, id)
                .await
            {
                Ok(t) => Some(ResourceValues::Telegraf(TelegrafValues {
                    name: t.name,
                    description: t.description,
                    config: t.config,
                })),
                Err(ServiceError::NotFound(_)) => None,
                Err(err) => return Err(err.into()),
            },
            Kind::Variable => match self
                .services
                .variables
                .find_variable_by_id(cancel, id)
                .await
            {
                Ok(v) => Some(ResourceValues::Variable(VariableValues {
                    name: v.name,
                    description: v.description,
                    arguments: v.arguments,
                })),
                Err(ServiceError::NotFound(_)) => None,
                Err(err) => return Err(err.into()),
            },
            other => {
                return Err(Error::Internal(format!(
                    "stack records unexpected kind {other}"
                )))
            }
        };
        Ok(values)
    }
}

/// Normalized snapshot of a live task; the flux option prelude is stripped so
/// schedule fields come from the task struct, not the source text.
pub(crate) fn task_values(task: &Task) -> TaskValues {
    TaskValues {
        name: task.name.clone(),
        description: task.description.clone(),
        every: task.every.as_deref().and_then(normalize_duration),
        cron: task.cron.clone(),
        offset: task.offset.as_deref().and_then(normalize_duration),
        query: strip_task_option(&task.flux),
        status: task.status,
    }
}

/// Normalized snapshot of a live notification rule
pub(crate) fn rule_values(
    rule: &NotificationRule,
    endpoint_name: String,
    endpoint_type: String,
) -> RuleValues {
    RuleValues {
        name: rule.name.clone(),
        description: rule.description.clone(),
        endpoint_id: rule.endpoint_id,
        endpoint_name,
        endpoint_type,
        every: rule.every.as_deref().and_then(normalize_duration),
        offset: rule.offset.as_deref().and_then(normalize_duration),
        message_template: rule.message_template.clone(),
        status: rule.status,
        status_rules: rule.status_rules.clone(),
        tag_rules: rule.tag_rules.clone(),
    }
}
