//! Stateful fakes backing the service tests
//!
//! One fake platform implements every service seam over shared in-memory
//! state, counts calls per operation, and can fail the n-th call of any
//! operation for rollback tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use lyra_core::ids::PlatformId;
use lyra_core::platform::{
    Bucket, Check, Dashboard, Label, LabelMapping, NotificationEndpoint, NotificationRule,
    Organization, Task, TelegrafConfig, Variable, View,
};
use lyra_core::service::{
    BucketService, CheckService, DashboardService, LabelService, NotificationEndpointService,
    NotificationRuleService, OrganizationService, SecretService, ServiceError, ServiceResult,
    Services, TaskService, TelegrafService, VariableService,
};
use lyra_core::Kind;

use lyra_stack::stack::Stack;
use lyra_stack::store::{ListFilter, StackStore, StoreError, StoreResult};

#[derive(Default)]
pub struct PlatformState {
    next_id: u64,
    pub buckets: Vec<Bucket>,
    pub labels: Vec<Label>,
    pub checks: Vec<Check>,
    pub dashboards: Vec<(Dashboard, Vec<View>)>,
    pub endpoints: Vec<NotificationEndpoint>,
    pub rules: Vec<NotificationRule>,
    pub tasks: Vec<Task>,
    pub telegrafs: Vec<TelegrafConfig>,
    pub variables: Vec<Variable>,
    pub mappings: Vec<LabelMapping>,
    pub secret_keys: Vec<String>,
    pub orgs: Vec<Organization>,
    counters: HashMap<String, usize>,
    fail_at: HashMap<String, usize>,
}

impl PlatformState {
    fn alloc_id(&mut self) -> PlatformId {
        self.next_id += 1;
        PlatformId::new(self.next_id)
    }
}

pub struct FakePlatform {
    state: Mutex<PlatformState>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PlatformState {
                next_id: 100,
                ..Default::default()
            }),
        })
    }

    /// Bump the call counter for `key`, failing if an injected failure is
    /// armed for this ordinal.
    fn op(&self, key: &str) -> ServiceResult<MutexGuard<'_, PlatformState>> {
        let mut state = self.state.lock().unwrap();
        let count = {
            let slot = state.counters.entry(key.to_string()).or_insert(0);
            *slot += 1;
            *slot
        };
        if state.fail_at.get(key) == Some(&count) {
            return Err(ServiceError::upstream(format!(
                "injected failure on {key} call {count}"
            )));
        }
        Ok(state)
    }

    /// Fail the `ordinal`-th (1-based) call of the given operation
    pub fn fail_on(&self, key: &str, ordinal: usize) {
        self.state
            .lock()
            .unwrap()
            .fail_at
            .insert(key.to_string(), ordinal);
    }

    pub fn calls(&self, key: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .counters
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Count of live resources the platform currently holds
    pub fn total_resources(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.buckets.len()
            + state.labels.len()
            + state.checks.len()
            + state.dashboards.len()
            + state.endpoints.len()
            + state.rules.len()
            + state.tasks.len()
            + state.telegrafs.len()
            + state.variables.len()
    }

    pub fn with_state<T>(&self, f: impl FnOnce(&PlatformState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }

    pub fn seed<T>(&self, f: impl FnOnce(&mut PlatformState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn services(self: &Arc<Self>) -> Services {
        Services {
            buckets: self.clone(),
            checks: self.clone(),
            dashboards: self.clone(),
            labels: self.clone(),
            endpoints: self.clone(),
            rules: self.clone(),
            tasks: self.clone(),
            telegrafs: self.clone(),
            variables: self.clone(),
            secrets: self.clone(),
            orgs: self.clone(),
        }
    }
}

#[async_trait]
impl BucketService for FakePlatform {
    async fn create_bucket(
        &self,
        _cancel: &CancellationToken,
        mut bucket: Bucket,
    ) -> ServiceResult<Bucket> {
        let mut state = self.op("bucket.create")?;
        bucket.id = state.alloc_id();
        state.buckets.push(bucket.clone());
        Ok(bucket)
    }

    async fn update_bucket(
        &self,
        _cancel: &CancellationToken,
        bucket: Bucket,
    ) -> ServiceResult<Bucket> {
        let mut state = self.op("bucket.update")?;
        let slot = state
            .buckets
            .iter_mut()
            .find(|b| b.id == bucket.id)
            .ok_or_else(|| ServiceError::not_found(format!("bucket {}", bucket.id)))?;
        *slot = bucket.clone();
        Ok(bucket)
    }

    async fn delete_bucket(
        &self,
        _cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<()> {
        let mut state = self.op("bucket.delete")?;
        let before = state.buckets.len();
        state.buckets.retain(|b| b.id != id);
        if state.buckets.len() == before {
            return Err(ServiceError::not_found(format!("bucket {id}")));
        }
        Ok(())
    }

    async fn find_bucket_by_name(
        &self,
        _cancel: &CancellationToken,
        org_id: PlatformId,
        name: &str,
    ) -> ServiceResult<Option<Bucket>> {
        let state = self.op("bucket.find")?;
        Ok(state
            .buckets
            .iter()
            .find(|b| b.org_id == org_id && b.name == name)
            .cloned())
    }

    async fn find_bucket_by_id(
        &self,
        _cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<Bucket> {
        let state = self.op("bucket.find_by_id")?;
        state
            .buckets
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("bucket {id}")))
    }

    async fn list_buckets(
        &self,
        _cancel: &CancellationToken,
        org_id: PlatformId,
    ) -> ServiceResult<Vec<Bucket>> {
        let state = self.op("bucket.list")?;
        Ok(state
            .buckets
            .iter()
            .filter(|b| b.org_id == org_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LabelService for FakePlatform {
    async fn create_label(
        &self,
        _cancel: &CancellationToken,
        mut label: Label,
    ) -> ServiceResult<Label> {
        let mut state = self.op("label.create")?;
        label.id = state.alloc_id();
        state.labels.push(label.clone());
        Ok(label)
    }

    async fn update_label(
        &self,
        _cancel: &CancellationToken,
        label: Label,
    ) -> ServiceResult<Label> {
        let mut state = self.op("label.update")?;
        let slot = state
            .labels
            .iter_mut()
            .find(|l| l.id == label.id)
            .ok_or_else(|| ServiceError::not_found(format!("label {}", label.id)))?;
        *slot = label.clone();
        Ok(label)
    }

    async fn delete_label(&self, _cancel: &CancellationToken, id: PlatformId) -> ServiceResult<()> {
        let mut state = self.op("label.delete")?;
        let before = state.labels.len();
        state.labels.retain(|l| l.id != id);
        if state.labels.len() == before {
            return Err(ServiceError::not_found(format!("label {id}")));
        }
        Ok(())
    }

    async fn find_label_by_name(
        &self,
        _cancel: &CancellationToken,
        org_id: PlatformId,
        name: &str,
    ) -> ServiceResult<Option<Label>> {
        let state = self.op("label.find")?;
        Ok(state
            .labels
            .iter()
            .find(|l| l.org_id == org_id && l.name == name)
            .cloned())
    }

    async fn find_label_by_id(
        &self,
        _cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<Label> {
        let state = self.op("label.find_by_id")?;
        state
            .labels
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("label {id}")))
    }

    async fn list_labels(
        &self,
        _cancel: &CancellationToken,
        org_id: PlatformId,
    ) -> ServiceResult<Vec<Label>> {
        let state = self.op("label.list")?;
        Ok(state
            .labels
            .iter()
            .filter(|l| l.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn create_label_mapping(
        &self,
        _cancel: &CancellationToken,
        mapping: &LabelMapping,
    ) -> ServiceResult<()> {
        let mut state = self.op("label.mapping.create")?;
        state.mappings.push(*mapping);
        Ok(())
    }

    async fn delete_label_mapping(
        &self,
        _cancel: &CancellationToken,
        mapping: &LabelMapping,
    ) -> ServiceResult<()> {
        let mut state = self.op("label.mapping.delete")?;
        state.mappings.retain(|m| m != mapping);
        Ok(())
    }

    async fn find_resource_labels(
        &self,
        _cancel: &CancellationToken,
        resource_id: PlatformId,
        resource_kind: Kind,
    ) -> ServiceResult<Vec<Label>> {
        let state = self.op("label.find_for_resource")?;
        let label_ids: Vec<PlatformId> = state
            .mappings
            .iter()
            .filter(|m| m.resource_id == resource_id && m.resource_kind == resource_kind)
            .map(|m| m.label_id)
            .collect();
        Ok(state
            .labels
            .iter()
            .filter(|l| label_ids.contains(&l.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CheckService for FakePlatform {
    async fn create_check(
        &self,
        _cancel: &CancellationToken,
        mut check: Check,
    ) -> ServiceResult<Check> {
        let mut state = self.op("check.create")?;
        check.id = state.alloc_id();
        check.task_id = state.alloc_id();
        state.checks.push(check.clone());
        Ok(check)
    }

    async fn update_check(
        &self,
        _cancel: &CancellationToken,
        check: Check,
    ) -> ServiceResult<Check> {
        let mut state = self.op("check.update")?;
        let slot = state
            .checks
            .iter_mut()
            .find(|c| c.id == check.id)
            .ok_or_else(|| ServiceError::not_found(format!("check {}", check.id)))?;
        let task_id = slot.task_id;
        *slot = check.clone();
        slot.task_id = task_id;
        Ok(slot.clone())
    }

    async fn delete_check(&self, _cancel: &CancellationToken, id: PlatformId) -> ServiceResult<()> {
        let mut state = self.op("check.delete")?;
        let before = state.checks.len();
        state.checks.retain(|c| c.id != id);
        if state.checks.len() == before {
            return Err(ServiceError::not_found(format!("check {id}")));
        }
        Ok(())
    }

    async fn find_check_by_id(
        &self,
        _cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<Check> {
        let state = self.op("check.find_by_id")?;
        state
            .checks
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("check {id}")))
    }

    async fn find_checks(
        &self,
        _cancel: &CancellationToken,
        org_id: PlatformId,
        name: Option<&str>,
    ) -> ServiceResult<Vec<Check>> {
        let state = self.op("check.find")?;
        Ok(state
            .checks
            .iter()
            .filter(|c| c.org_id == org_id)
            .filter(|c| name.map(|n| c.name() == n).unwrap_or(true))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DashboardService for FakePlatform {
    async fn create_dashboard(
        &self,
        _cancel: &CancellationToken,
        mut dashboard: Dashboard,
        views: Vec<View>,
    ) -> ServiceResult<Dashboard> {
        let mut state = self.op("dashboard.create")?;
        dashboard.id = state.alloc_id();
        for cell in &mut dashboard.cells {
            cell.id = state.alloc_id();
        }
        state.dashboards.push((dashboard.clone(), views));
        Ok(dashboard)
    }

    async fn delete_dashboard(
        &self,
        _cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<()> {
        let mut state = self.op("dashboard.delete")?;
        let before = state.dashboards.len();
        state.dashboards.retain(|(d, _)| d.id != id);
        if state.dashboards.len() == before {
            return Err(ServiceError::not_found(format!("dashboard {id}")));
        }
        Ok(())
    }

    async fn find_dashboard_by_id(
        &self,
        _cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<Dashboard> {
        let state = self.op("dashboard.find_by_id")?;
        state
            .dashboards
            .iter()
            .find(|(d, _)| d.id == id)
            .map(|(d, _)| d.clone())
            .ok_or_else(|| ServiceError::not_found(format!("dashboard {id}")))
    }

    async fn list_dashboards(
        &self,
        _cancel: &CancellationToken,
        org_id: PlatformId,
    ) -> ServiceResult<Vec<Dashboard>> {
        let state = self.op("dashboard.list")?;
        Ok(state
            .dashboards
            .iter()
            .filter(|(d, _)| d.org_id == org_id)
            .map(|(d, _)| d.clone())
            .collect())
    }

    async fn find_view(
        &self,
        _cancel: &CancellationToken,
        dashboard_id: PlatformId,
        cell_id: PlatformId,
    ) -> ServiceResult<View> {
        let state = self.op("dashboard.view")?;
        let (dashboard, views) = state
            .dashboards
            .iter()
            .find(|(d, _)| d.id == dashboard_id)
            .ok_or_else(|| ServiceError::not_found(format!("dashboard {dashboard_id}")))?;
        let position = dashboard
            .cells
            .iter()
            .position(|c| c.id == cell_id)
            .ok_or_else(|| ServiceError::not_found(format!("cell {cell_id}")))?;
        views
            .get(position)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("view for cell {cell_id}")))
    }
}

#[async_trait]
impl NotificationEndpointService for FakePlatform {
    async fn create_notification_endpoint(
        &self,
        _cancel: &CancellationToken,
        mut endpoint: NotificationEndpoint,
    ) -> ServiceResult<NotificationEndpoint> {
        let mut state = self.op("endpoint.create")?;
        endpoint.id = state.alloc_id();
        state.endpoints.push(endpoint.clone());
        Ok(endpoint)
    }

    async fn update_notification_endpoint(
        &self,
        _cancel: &CancellationToken,
        endpoint: NotificationEndpoint,
    ) -> ServiceResult<NotificationEndpoint> {
        let mut state = self.op("endpoint.update")?;
        let slot = state
            .endpoints
            .iter_mut()
            .find(|e| e.id == endpoint.id)
            .ok_or_else(|| ServiceError::not_found(format!("endpoint {}", endpoint.id)))?;
        *slot = endpoint.clone();
        Ok(endpoint)
    }

    async fn delete_notification_endpoint(
        &self,
        _cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<()> {
        let mut state = self.op("endpoint.delete")?;
        let before = state.endpoints.len();
        state.endpoints.retain(|e| e.id != id);
        if state.endpoints.len() == before {
            return Err(ServiceError::not_found(format!("endpoint {id}")));
        }
        Ok(())
    }

    async fn find_notification_endpoint_by_id(
        &self,
        _cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<NotificationEndpoint> {
        let state = self.op("endpoint.find_by_id")?;
        state
            .endpoints
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("endpoint {id}")))
    }

    async fn find_notification_endpoints(
        &self,
        _cancel: &CancellationToken,
        org_id: PlatformId,
        name: Option<&str>,
    ) -> ServiceResult<Vec<NotificationEndpoint>> {
        let state = self.op("endpoint.find")?;
        Ok(state
            .endpoints
            .iter()
            .filter(|e| e.org_id == org_id)
            .filter(|e| name.map(|n| e.name() == n).unwrap_or(true))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationRuleService for FakePlatform {
    async fn create_notification_rule(
        &self,
        _cancel: &CancellationToken,
        mut rule: NotificationRule,
    ) -> ServiceResult<NotificationRule> {
        let mut state = self.op("rule.create")?;
        rule.id = state.alloc_id();
        rule.task_id = state.alloc_id();
        state.rules.push(rule.clone());
        Ok(rule)
    }

    async fn update_notification_rule(
        &self,
        _cancel: &CancellationToken,
        rule: NotificationRule,
    ) -> ServiceResult<NotificationRule> {
        let mut state = self.op("rule.update")?;
        let slot = state
            .rules
            .iter_mut()
            .find(|r| r.id == rule.id)
            .ok_or_else(|| ServiceError::not_found(format!("rule {}", rule.id)))?;
        *slot = rule.clone();
        Ok(rule)
    }

    async fn delete_notification_rule(
        &self,
        _cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<()> {
        let mut state = self.op("rule.delete")?;
        let before = state.rules.len();
        state.rules.retain(|r| r.id != id);
        if state.rules.len() == before {
            return Err(ServiceError::not_found(format!("rule {id}")));
        }
        Ok(())
    }

    async fn find_notification_rule_by_id(
        &self,
        _cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<NotificationRule> {
        let state = self.op("rule.find_by_id")?;
        state
            .rules
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("rule {id}")))
    }

    async fn list_notification_rules(
        &self,
        _cancel: &CancellationToken,
        org_id: PlatformId,
    ) -> ServiceResult<Vec<NotificationRule>> {
        let state = self.op("rule.list")?;
        Ok(state
            .rules
            .iter()
            .filter(|r| r.org_id == org_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TaskService for FakePlatform {
    async fn create_task(&self, _cancel: &CancellationToken, mut task: Task) -> ServiceResult<Task> {
        let mut state = self.op("task.create")?;
        task.id = state.alloc_id();
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task(&self, _cancel: &CancellationToken, task: Task) -> ServiceResult<Task> {
        let mut state = self.op("task.update")?;
        let slot = state
            .tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or_else(|| ServiceError::not_found(format!("task {}", task.id)))?;
        *slot = task.clone();
        Ok(task)
    }

    async fn delete_task(&self, _cancel: &CancellationToken, id: PlatformId) -> ServiceResult<()> {
        let mut state = self.op("task.delete")?;
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != id);
        if state.tasks.len() == before {
            return Err(ServiceError::not_found(format!("task {id}")));
        }
        Ok(())
    }

    async fn find_task_by_name(
        &self,
        _cancel: &CancellationToken,
        org_id: PlatformId,
        name: &str,
    ) -> ServiceResult<Option<Task>> {
        let state = self.op("task.find")?;
        Ok(state
            .tasks
            .iter()
            .find(|t| t.org_id == org_id && t.name == name)
            .cloned())
    }

    async fn find_task_by_id(
        &self,
        _cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<Task> {
        let state = self.op("task.find_by_id")?;
        state
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("task {id}")))
    }

    async fn list_tasks(
        &self,
        _cancel: &CancellationToken,
        org_id: PlatformId,
    ) -> ServiceResult<Vec<Task>> {
        let state = self.op("task.list")?;
        Ok(state
            .tasks
            .iter()
            .filter(|t| t.org_id == org_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TelegrafService for FakePlatform {
    async fn create_telegraf_config(
        &self,
        _cancel: &CancellationToken,
        mut config: TelegrafConfig,
    ) -> ServiceResult<TelegrafConfig> {
        let mut state = self.op("telegraf.create")?;
        config.id = state.alloc_id();
        state.telegrafs.push(config.clone());
        Ok(config)
    }

    async fn update_telegraf_config(
        &self,
        _cancel: &CancellationToken,
        config: TelegrafConfig,
    ) -> ServiceResult<TelegrafConfig> {
        let mut state = self.op("telegraf.update")?;
        let slot = state
            .telegrafs
            .iter_mut()
            .find(|t| t.id == config.id)
            .ok_or_else(|| ServiceError::not_found(format!("telegraf {}", config.id)))?;
        *slot = config.clone();
        Ok(config)
    }

    async fn delete_telegraf_config(
        &self,
        _cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<()> {
        let mut state = self.op("telegraf.delete")?;
        let before = state.telegrafs.len();
        state.telegrafs.retain(|t| t.id != id);
        if state.telegrafs.len() == before {
            return Err(ServiceError::not_found(format!("telegraf {id}")));
        }
        Ok(())
    }

    async fn find_telegraf_config_by_name(
        &self,
        _cancel: &CancellationToken,
        org_id: PlatformId,
        name: &str,
    ) -> ServiceResult<Option<TelegrafConfig>> {
        let state = self.op("telegraf.find")?;
        Ok(state
            .telegrafs
            .iter()
            .find(|t| t.org_id == org_id && t.name == name)
            .cloned())
    }

    async fn find_telegraf_config_by_id(
        &self,
        _cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<TelegrafConfig> {
        let state = self.op("telegraf.find_by_id")?;
        state
            .telegrafs
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("telegraf {id}")))
    }

    async fn list_telegraf_configs(
        &self,
        _cancel: &CancellationToken,
        org_id: PlatformId,
    ) -> ServiceResult<Vec<TelegrafConfig>> {
        let state = self.op("telegraf.list")?;
        Ok(state
            .telegrafs
            .iter()
            .filter(|t| t.org_id == org_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl VariableService for FakePlatform {
    async fn create_variable(
        &self,
        _cancel: &CancellationToken,
        mut variable: Variable,
    ) -> ServiceResult<Variable> {
        let mut state = self.op("variable.create")?;
        variable.id = state.alloc_id();
        state.variables.push(variable.clone());
        Ok(variable)
    }

    async fn update_variable(
        &self,
        _cancel: &CancellationToken,
        variable: Variable,
    ) -> ServiceResult<Variable> {
        let mut state = self.op("variable.update")?;
        let slot = state
            .variables
            .iter_mut()
            .find(|v| v.id == variable.id)
            .ok_or_else(|| ServiceError::not_found(format!("variable {}", variable.id)))?;
        *slot = variable.clone();
        Ok(variable)
    }

    async fn delete_variable(
        &self,
        _cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<()> {
        let mut state = self.op("variable.delete")?;
        let before = state.variables.len();
        state.variables.retain(|v| v.id != id);
        if state.variables.len() == before {
            return Err(ServiceError::not_found(format!("variable {id}")));
        }
        Ok(())
    }

    async fn find_variable_by_name(
        &self,
        _cancel: &CancellationToken,
        org_id: PlatformId,
        name: &str,
    ) -> ServiceResult<Option<Variable>> {
        let state = self.op("variable.find")?;
        Ok(state
            .variables
            .iter()
            .find(|v| v.org_id == org_id && v.name == name)
            .cloned())
    }

    async fn find_variable_by_id(
        &self,
        _cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<Variable> {
        let state = self.op("variable.find_by_id")?;
        state
            .variables
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("variable {id}")))
    }

    async fn list_variables(
        &self,
        _cancel: &CancellationToken,
        org_id: PlatformId,
    ) -> ServiceResult<Vec<Variable>> {
        let state = self.op("variable.list")?;
        Ok(state
            .variables
            .iter()
            .filter(|v| v.org_id == org_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SecretService for FakePlatform {
    async fn list_secret_keys(
        &self,
        _cancel: &CancellationToken,
        _org_id: PlatformId,
    ) -> ServiceResult<Vec<String>> {
        let state = self.op("secret.list")?;
        Ok(state.secret_keys.clone())
    }
}

#[async_trait]
impl OrganizationService for FakePlatform {
    async fn find_organization_by_id(
        &self,
        _cancel: &CancellationToken,
        id: PlatformId,
    ) -> ServiceResult<Organization> {
        let state = self.op("org.find")?;
        state
            .orgs
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("org {id}")))
    }
}

/// In-memory stack store
#[derive(Default)]
pub struct FakeStore {
    stacks: Mutex<Vec<Stack>>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl StackStore for FakeStore {
    async fn create_stack(&self, stack: Stack) -> StoreResult<()> {
        let mut stacks = self.stacks.lock().unwrap();
        if stacks.iter().any(|s| s.id == stack.id) {
            return Err(StoreError::Conflict(format!(
                "stack {} already exists",
                stack.id
            )));
        }
        stacks.push(stack);
        Ok(())
    }

    async fn read_stack_by_id(&self, id: PlatformId) -> StoreResult<Stack> {
        self.stacks
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_stacks(&self, org_id: PlatformId, filter: ListFilter) -> StoreResult<Vec<Stack>> {
        let stacks: Vec<Stack> = self
            .stacks
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.org_id == org_id)
            .cloned()
            .collect();
        Ok(filter.filter(stacks))
    }

    async fn update_stack(&self, stack: Stack) -> StoreResult<()> {
        let mut stacks = self.stacks.lock().unwrap();
        let slot = stacks
            .iter_mut()
            .find(|s| s.id == stack.id)
            .ok_or(StoreError::NotFound(stack.id))?;
        *slot = stack;
        Ok(())
    }

    async fn delete_stack(&self, id: PlatformId) -> StoreResult<()> {
        let mut stacks = self.stacks.lock().unwrap();
        let before = stacks.len();
        stacks.retain(|s| s.id != id);
        if stacks.len() == before {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
