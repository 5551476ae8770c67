//! Service trait seams consumed by the reconciliation engine
//!
//! Each platform resource service is abstracted behind a narrow async trait.
//! Every call is a blocking I/O point and takes the caller's cancellation
//! token; implementations are expected to observe it at their own
//! granularity.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::ids::PlatformId;
use crate::kind::Kind;
use crate::platform::{
    Bucket, Check, Dashboard, Label, LabelMapping, NotificationEndpoint, NotificationRule,
    Organization, Task, TelegrafConfig, Variable, View,
};

/// Upstream service failure
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[async_trait]
pub trait BucketService: Send + Sync {
    async fn create_bucket(
        &self,
        cancel: &CancellationToken,
        bucket: Bucket,
    ) -> ServiceResult<Bucket>;

    async fn update_bucket(
        &self,
        cancel: &CancellationToken,
        bucket: Bucket,
    ) -> ServiceResult<Bucket>;

    async fn delete_bucket(&self, cancel: &CancellationToken, id: PlatformId) -> ServiceResult<()>;

    async fn find_bucket_by_name(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
        name: &str,
    ) -> ServiceResult<Option<Bucket>>;

    async fn find_bucket_by_id(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<Bucket>;

    async fn list_buckets(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
    ) -> ServiceResult<Vec<Bucket>>;
}

#[async_trait]
pub trait CheckService: Send + Sync {
    async fn create_check(&self, cancel: &CancellationToken, check: Check) -> ServiceResult<Check>;

    async fn update_check(&self, cancel: &CancellationToken, check: Check) -> ServiceResult<Check>;

    async fn delete_check(&self, cancel: &CancellationToken, id: PlatformId) -> ServiceResult<()>;

    async fn find_check_by_id(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<Check>;

    /// Filter lookup; `name` narrows the result but implementations may
    /// still return several candidates.
    async fn find_checks(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
        name: Option<&str>,
    ) -> ServiceResult<Vec<Check>>;
}

#[async_trait]
pub trait DashboardService: Send + Sync {
    // Dashboards are re-created, never updated in place. Views are stored
    // apart from the dashboard and handed over alongside it, one per cell.
    async fn create_dashboard(
        &self,
        cancel: &CancellationToken,
        dashboard: Dashboard,
        views: Vec<View>,
    ) -> ServiceResult<Dashboard>;

    async fn delete_dashboard(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<()>;

    async fn find_dashboard_by_id(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<Dashboard>;

    async fn list_dashboards(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
    ) -> ServiceResult<Vec<Dashboard>>;

    /// The view content of one cell, stored apart from the dashboard
    async fn find_view(
        &self,
        cancel: &CancellationToken,
        dashboard_id: PlatformId,
        cell_id: PlatformId,
    ) -> ServiceResult<View>;
}

#[async_trait]
pub trait LabelService: Send + Sync {
    async fn create_label(&self, cancel: &CancellationToken, label: Label) -> ServiceResult<Label>;

    async fn update_label(&self, cancel: &CancellationToken, label: Label) -> ServiceResult<Label>;

    async fn delete_label(&self, cancel: &CancellationToken, id: PlatformId) -> ServiceResult<()>;

    async fn find_label_by_name(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
        name: &str,
    ) -> ServiceResult<Option<Label>>;

    async fn find_label_by_id(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<Label>;

    async fn list_labels(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
    ) -> ServiceResult<Vec<Label>>;

    async fn create_label_mapping(
        &self,
        cancel: &CancellationToken,
        mapping: &LabelMapping,
    ) -> ServiceResult<()>;

    async fn delete_label_mapping(
        &self,
        cancel: &CancellationToken,
        mapping: &LabelMapping,
    ) -> ServiceResult<()>;

    /// Labels currently associated with a resource
    async fn find_resource_labels(
        &self,
        cancel: &CancellationToken,
        resource_id: PlatformId,
        resource_kind: Kind,
    ) -> ServiceResult<Vec<Label>>;
}

#[async_trait]
pub trait NotificationEndpointService: Send + Sync {
    async fn create_notification_endpoint(
        &self,
        cancel: &CancellationToken,
        endpoint: NotificationEndpoint,
    ) -> ServiceResult<NotificationEndpoint>;

    async fn update_notification_endpoint(
        &self,
        cancel: &CancellationToken,
        endpoint: NotificationEndpoint,
    ) -> ServiceResult<NotificationEndpoint>;

    async fn delete_notification_endpoint(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<()>;

    async fn find_notification_endpoint_by_id(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<NotificationEndpoint>;

    /// Filter lookup; `name` narrows the result but implementations may
    /// still return several candidates.
    async fn find_notification_endpoints(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
        name: Option<&str>,
    ) -> ServiceResult<Vec<NotificationEndpoint>>;
}

#[async_trait]
pub trait NotificationRuleService: Send + Sync {
    async fn create_notification_rule(
        &self,
        cancel: &CancellationToken,
        rule: NotificationRule,
    ) -> ServiceResult<NotificationRule>;

    async fn update_notification_rule(
        &self,
        cancel: &CancellationToken,
        rule: NotificationRule,
    ) -> ServiceResult<NotificationRule>;

    async fn delete_notification_rule(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<()>;

    async fn find_notification_rule_by_id(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<NotificationRule>;

    async fn list_notification_rules(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
    ) -> ServiceResult<Vec<NotificationRule>>;
}

#[async_trait]
pub trait TaskService: Send + Sync {
    async fn create_task(&self, cancel: &CancellationToken, task: Task) -> ServiceResult<Task>;

    async fn update_task(&self, cancel: &CancellationToken, task: Task) -> ServiceResult<Task>;

    async fn delete_task(&self, cancel: &CancellationToken, id: PlatformId) -> ServiceResult<()>;

    async fn find_task_by_name(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
        name: &str,
    ) -> ServiceResult<Option<Task>>;

    async fn find_task_by_id(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<Task>;

    async fn list_tasks(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
    ) -> ServiceResult<Vec<Task>>;
}

#[async_trait]
pub trait TelegrafService: Send + Sync {
    async fn create_telegraf_config(
        &self,
        cancel: &CancellationToken,
        config: TelegrafConfig,
    ) -> ServiceResult<TelegrafConfig>;

    async fn update_telegraf_config(
        &self,
        cancel: &CancellationToken,
        config: TelegrafConfig,
    ) -> ServiceResult<TelegrafConfig>;

    async fn delete_telegraf_config(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<()>;

    async fn find_telegraf_config_by_name(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
        name: &str,
    ) -> ServiceResult<Option<TelegrafConfig>>;

    async fn find_telegraf_config_by_id(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<TelegrafConfig>;

    async fn list_telegraf_configs(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
    ) -> ServiceResult<Vec<TelegrafConfig>>;
}

#[async_trait]
pub trait VariableService: Send + Sync {
    async fn create_variable(
        &self,
        cancel: &CancellationToken,
        variable: Variable,
    ) -> ServiceResult<Variable>;

    async fn update_variable(
        &self,
        cancel: &CancellationToken,
        variable: Variable,
    ) -> ServiceResult<Variable>;

    async fn delete_variable(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<()>;

    async fn find_variable_by_name(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
        name: &str,
    ) -> ServiceResult<Option<Variable>>;

    async fn find_variable_by_id(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<Variable>;

    async fn list_variables(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
    ) -> ServiceResult<Vec<Variable>>;
}

#[async_trait]
pub trait SecretService: Send + Sync {
    /// Keys currently present in the org's secret store
    async fn list_secret_keys(
        &self,
        cancel: &CancellationToken,
        org_id: PlatformId,
    ) -> ServiceResult<Vec<String>>;
}

#[async_trait]
pub trait OrganizationService: Send + Sync {
    async fn find_organization_by_id(
        &self,
        cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<Organization>;
}

/// The full set of service seams the engine drives
#[derive(Clone)]
pub struct Services {
    pub buckets: Arc<dyn BucketService>,
    pub checks: Arc<dyn CheckService>,
    pub dashboards: Arc<dyn DashboardService>,
    pub labels: Arc<dyn LabelService>,
    pub endpoints: Arc<dyn NotificationEndpointService>,
    pub rules: Arc<dyn NotificationRuleService>,
    pub tasks: Arc<dyn TaskService>,
    pub telegrafs: Arc<dyn TelegrafService>,
    pub variables: Arc<dyn VariableService>,
    pub secrets: Arc<dyn SecretService>,
    pub orgs: Arc<dyn OrganizationService>,
}
