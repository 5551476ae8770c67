//! End-to-end service tests over stateful fakes

mod support;

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use lyra_core::error::Error;
use lyra_core::exporter::{OrgExportFilter, ResourceToClone};
use lyra_core::ids::{IdGenerator, PlatformId, TimeSource};
use lyra_core::plan::{ApplyOpts, StateStatus};
use lyra_core::platform::{Bucket, NotificationEndpoint, Organization, Task};
use lyra_core::resource::endpoint::{EndpointBase, EndpointSpec, SlackEndpoint};
use lyra_core::resource::{ResourceValues, Status};
use lyra_core::template::{ResourceSpec, Template, TemplateFormat};
use lyra_core::Kind;

use lyra_stack::stack::{StackAdditionalResource, StackStatus, StackUpdate};
use lyra_stack::store::ListFilter;

use lyra_svc::{CreateStackRequest, ExportRequest, Service};

use support::{FakePlatform, FakeStore};

const HOUR_NANOS: u64 = 3_600 * 1_000_000_000;

fn org() -> PlatformId {
    PlatformId::new(9000)
}

fn decode(yaml: &str) -> Template {
    Template::decode(TemplateFormat::Yaml, yaml.as_bytes()).unwrap()
}

fn new_service(platform: &Arc<FakePlatform>, store: &Arc<FakeStore>) -> Service {
    platform.seed(|s| {
        s.orgs.push(Organization {
            id: org(),
            name: "org".to_string(),
        })
    });
    Service::new(platform.services(), store.clone())
}

struct FixedIdGen(u64);

impl IdGenerator for FixedIdGen {
    fn next_id(&self) -> PlatformId {
        PlatformId::new(self.0)
    }
}

struct FixedTime(DateTime<Utc>);

impl TimeSource for FixedTime {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

const BUCKET_TEMPLATE: &str = r##"---
apiVersion: lyra/v1
kind: Bucket
metadata:
  name: rucket-11
spec:
  description: bucket 1 description
  retentionRules:
    - type: expire
      everySeconds: 3600
---
apiVersion: lyra/v1
kind: Bucket
metadata:
  name: rucket-22
spec:
  description: bucket 2 description
"##;

const BUCKET_ONE: &str = r##"---
apiVersion: lyra/v1
kind: Bucket
metadata:
  name: rucket-11
spec:
  description: bucket 1 description
  retentionRules:
    - type: expire
      everySeconds: 3600
"##;

const LABELS_TEMPLATE: &str = r##"---
apiVersion: lyra/v1
kind: Label
metadata:
  name: label-1
spec:
  color: "#FFFFFF"
  description: label 1 description
---
apiVersion: lyra/v1
kind: Label
metadata:
  name: label-2
spec:
  color: "#000000"
  description: label 2 description
---
apiVersion: lyra/v1
kind: Label
metadata:
  name: label-3
spec:
  color: "#AA0000"
"##;

const RULE_TEMPLATE: &str = r##"---
apiVersion: lyra/v1
kind: NotificationEndpointSlack
metadata:
  name: endpoint-0
spec:
  url: https://hooks.slack.com/services/x
---
apiVersion: lyra/v1
kind: NotificationRule
metadata:
  name: rule-0
spec:
  name: rule_0
  description: desc_0
  endpointName: endpoint-0
  every: 10m
  offset: 30s
  messageTemplate: "notification message"
  statusRules:
    - currentLevel: CRIT
      previousLevel: OK
    - currentLevel: WARN
  tagRules:
    - key: k1
      value: v1
      operator: equal
"##;

const SECRET_TEMPLATE: &str = r##"---
apiVersion: lyra/v1
kind: NotificationEndpointPagerDuty
metadata:
  name: pager
spec:
  clientUrl: https://events.pagerduty.com
  routingKey: routing-key
"##;

const MIXED_TEMPLATE: &str = r##"---
apiVersion: lyra/v1
kind: Label
metadata:
  name: label-1
spec:
  color: "#FFFFFF"
---
apiVersion: lyra/v1
kind: Bucket
metadata:
  name: rucket-11
spec:
  description: bucket 1 description
  retentionRules:
    - type: expire
      everySeconds: 3600
  associations:
    - kind: Label
      name: label-1
---
apiVersion: lyra/v1
kind: Variable
metadata:
  name: var-const-3
spec:
  description: var description
  arguments:
    type: constant
    values:
      - "a"
      - "b"
"##;

fn seed_live_bucket(platform: &Arc<FakePlatform>) {
    platform.seed(|s| {
        s.buckets.push(Bucket {
            id: PlatformId::new(1),
            org_id: org(),
            name: "rucket-11".to_string(),
            description: "old desc".to_string(),
            retention_period: 30 * HOUR_NANOS,
        })
    });
}

#[tokio::test]
async fn dry_run_reports_bucket_update() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);
    seed_live_bucket(&platform);

    let cancel = CancellationToken::new();
    let opts = ApplyOpts::new().with_template(decode(BUCKET_TEMPLATE));
    let impact = svc.dry_run(&cancel, org(), opts).await.unwrap();

    let buckets: Vec<_> = impact.diff.of_kind(Kind::Bucket).collect();
    assert_eq!(buckets.len(), 2);

    let existing = buckets
        .iter()
        .find(|d| d.identifier.meta_name == "rucket-11")
        .unwrap();
    assert_eq!(existing.status(), StateStatus::Exists);
    assert_eq!(existing.identifier.id, Some(PlatformId::new(1)));
    assert!(existing.is_change());
    match (&existing.old, &existing.new) {
        (Some(ResourceValues::Bucket(old)), Some(ResourceValues::Bucket(new))) => {
            assert_eq!(old.description, "old desc");
            assert_eq!(old.retention_period, 30 * HOUR_NANOS);
            assert_eq!(new.description, "bucket 1 description");
            assert_eq!(new.retention_period, HOUR_NANOS);
        }
        other => panic!("expected bucket values, got {other:?}"),
    }

    let fresh = buckets
        .iter()
        .find(|d| d.identifier.meta_name == "rucket-22")
        .unwrap();
    assert_eq!(fresh.status(), StateStatus::New);
    assert_eq!(fresh.identifier.id, None);

    // nothing was written
    assert_eq!(platform.calls("bucket.create"), 0);
    assert_eq!(platform.calls("bucket.update"), 0);
}

#[tokio::test]
async fn dry_run_honors_skip_actions() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);

    let cancel = CancellationToken::new();
    let by_kind = ApplyOpts::new()
        .with_template(decode(BUCKET_TEMPLATE))
        .with_kind_skip(Kind::Bucket);
    let impact = svc.dry_run(&cancel, org(), by_kind).await.unwrap();
    assert_eq!(impact.diff.of_kind(Kind::Bucket).count(), 0);

    let by_resource = ApplyOpts::new()
        .with_template(decode(BUCKET_TEMPLATE))
        .with_resource_skip(Kind::Bucket, "rucket-11")
        .with_resource_skip(Kind::Bucket, "rucket-22");
    let impact = svc.dry_run(&cancel, org(), by_resource).await.unwrap();
    assert_eq!(impact.diff.of_kind(Kind::Bucket).count(), 0);
}

#[tokio::test]
async fn apply_updates_existing_bucket_without_creates() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);
    seed_live_bucket(&platform);

    let cancel = CancellationToken::new();
    let opts = ApplyOpts::new().with_template(decode(BUCKET_ONE));
    let impact = svc.apply(&cancel, org(), opts).await.unwrap();

    assert_eq!(platform.calls("bucket.update"), 1);
    assert_eq!(platform.calls("bucket.create"), 0);

    let entry = impact.summary.of_kind(Kind::Bucket).next().unwrap();
    assert_eq!(entry.meta_name, "rucket-11");
    assert_eq!(entry.id, PlatformId::new(1));
    let updated = platform.with_state(|s| s.buckets[0].clone());
    assert_eq!(updated.description, "bucket 1 description");
    assert_eq!(updated.retention_period, HOUR_NANOS);
}

#[tokio::test]
async fn apply_rolls_back_created_labels_on_error() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);
    platform.fail_on("label.create", 3);

    let cancel = CancellationToken::new();
    let opts = ApplyOpts::new().with_template(decode(LABELS_TEMPLATE));
    let err = svc.apply(&cancel, org(), opts).await.unwrap_err();
    assert!(matches!(err.root_cause(), Error::Remote(_)));

    // the two labels created before the failure are deleted again
    assert!(platform.calls("label.delete") >= 2);
    assert_eq!(platform.total_resources(), 0);
}

#[tokio::test]
async fn apply_binds_rule_to_existing_endpoint() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);
    platform.seed(|s| {
        s.endpoints.push(NotificationEndpoint {
            id: PlatformId::new(1),
            org_id: org(),
            spec: EndpointSpec::Slack(SlackEndpoint {
                base: EndpointBase {
                    name: Some("endpoint-0".to_string()),
                    description: None,
                    status: Status::Active,
                },
                url: "https://hooks.slack.com/services/x".to_string(),
                token: None,
            }),
        })
    });

    let cancel = CancellationToken::new();
    let opts = ApplyOpts::new().with_template(decode(RULE_TEMPLATE));
    let impact = svc.apply(&cancel, org(), opts).await.unwrap();

    // no new endpoint; the rule landed on the live one
    assert_eq!(platform.calls("endpoint.create"), 0);
    assert_eq!(platform.calls("rule.create"), 1);
    let rule = platform.with_state(|s| s.rules[0].clone());
    assert_eq!(rule.endpoint_id, PlatformId::new(1));
    assert_eq!(rule.name, "rule_0");

    let entry = impact
        .summary
        .of_kind(Kind::NotificationRule)
        .next()
        .unwrap();
    match &entry.values {
        ResourceValues::NotificationRule(v) => {
            assert_eq!(v.endpoint_id, PlatformId::new(1));
            assert_eq!(v.endpoint_type, "slack");
            assert_eq!(v.every.as_deref(), Some("10m"));
            assert_eq!(v.offset.as_deref(), Some("30s"));
        }
        other => panic!("expected rule values, got {other:?}"),
    }
}

#[tokio::test]
async fn dry_run_reports_missing_secrets() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);
    platform.seed(|s| {
        s.secret_keys = vec!["rando-1".to_string(), "rando-2".to_string()];
    });

    let cancel = CancellationToken::new();
    let opts = ApplyOpts::new().with_template(decode(SECRET_TEMPLATE));
    let impact = svc.dry_run(&cancel, org(), opts).await.unwrap();
    assert_eq!(impact.missing_secrets, vec!["routing-key".to_string()]);

    // caller-provided secrets count as present
    let mut provided = std::collections::BTreeMap::new();
    provided.insert("routing-key".to_string(), "shh".to_string());
    let opts = ApplyOpts::new()
        .with_template(decode(SECRET_TEMPLATE))
        .with_secrets(provided);
    let impact = svc.dry_run(&cancel, org(), opts).await.unwrap();
    assert!(impact.missing_secrets.is_empty());
}

#[tokio::test]
async fn apply_then_dry_run_reports_no_changes() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);

    let cancel = CancellationToken::new();
    let opts = ApplyOpts::new().with_template(decode(MIXED_TEMPLATE));
    let impact = svc.apply(&cancel, org(), opts).await.unwrap();
    let stack_id = impact.stack_id;
    assert!(!stack_id.is_zero());

    let opts = ApplyOpts::new()
        .with_template(decode(MIXED_TEMPLATE))
        .with_stack_id(stack_id);
    let impact = svc.dry_run(&cancel, org(), opts).await.unwrap();
    for diff in impact.diff.iter() {
        assert_eq!(diff.status(), StateStatus::Exists, "{diff:?}");
        assert!(diff.is_noop(), "unexpected change: {diff:?}");
    }
}

#[tokio::test]
async fn failed_apply_leaves_no_resources_behind() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);
    // rules are the last resource stratum; everything before is rolled back
    platform.fail_on("rule.create", 1);

    let cancel = CancellationToken::new();
    let template = format!("{RULE_TEMPLATE}{LABELS_TEMPLATE}");
    let opts = ApplyOpts::new().with_template(decode(&template));
    let err = svc.apply(&cancel, org(), opts).await.unwrap_err();
    assert!(matches!(err.root_cause(), Error::Remote(_)));

    assert_eq!(platform.total_resources(), 0);
    assert!(platform.calls("label.delete") >= 3);
    assert!(platform.calls("endpoint.delete") >= 1);
}

#[tokio::test]
async fn failed_mapping_rolls_back_mappings_and_resources() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);
    platform.fail_on("label.mapping.create", 2);

    let template = r##"---
apiVersion: lyra/v1
kind: Label
metadata:
  name: label-1
spec: {}
---
apiVersion: lyra/v1
kind: Bucket
metadata:
  name: b1
spec:
  associations:
    - kind: Label
      name: label-1
---
apiVersion: lyra/v1
kind: Bucket
metadata:
  name: b2
spec:
  associations:
    - kind: Label
      name: label-1
"##;
    let cancel = CancellationToken::new();
    let opts = ApplyOpts::new().with_template(decode(template));
    let err = svc.apply(&cancel, org(), opts).await.unwrap_err();
    assert!(matches!(err.root_cause(), Error::Remote(_)));

    assert!(platform.calls("label.mapping.delete") >= 1);
    assert_eq!(platform.total_resources(), 0);
    assert!(platform.with_state(|s| s.mappings.is_empty()));
}

#[tokio::test]
async fn stack_lifecycle_follows_event_log() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);
    let cancel = CancellationToken::new();

    let stack = svc
        .init_stack(
            &cancel,
            CreateStackRequest {
                org_id: org(),
                name: "stack name".to_string(),
                description: "stack desc".to_string(),
                template_urls: vec![
                    "file:///dropped".to_string(),
                    "https://example.com/t.yml".to_string(),
                ],
            },
        )
        .await
        .unwrap();
    assert_eq!(stack.status(), StackStatus::Created);
    assert_eq!(
        stack.latest_event().unwrap().template_urls,
        vec!["https://example.com/t.yml".to_string()]
    );

    // first apply records a create event with the realized resources
    let opts = ApplyOpts::new()
        .with_template(decode(MIXED_TEMPLATE))
        .with_stack_id(stack.id);
    svc.apply(&cancel, org(), opts).await.unwrap();
    let stack = svc.read_stack(stack.id).await.unwrap();
    assert_eq!(stack.events.len(), 2);
    assert_eq!(stack.resources().len(), 3);
    for resource in stack.resources() {
        assert!(!resource.id.is_zero());
    }

    // second apply is an update event
    let opts = ApplyOpts::new()
        .with_template(decode(MIXED_TEMPLATE))
        .with_stack_id(stack.id);
    svc.apply(&cancel, org(), opts).await.unwrap();
    let stack = svc.read_stack(stack.id).await.unwrap();
    assert_eq!(stack.status(), StackStatus::Active);
    assert_eq!(stack.events.len(), 3);

    // uninstall deletes everything the stack owns
    let stack = svc.uninstall(&cancel, stack.id).await.unwrap();
    assert!(stack.is_uninstalled());
    assert_eq!(platform.total_resources(), 0);

    // an uninstalled stack refuses further applies
    let opts = ApplyOpts::new()
        .with_template(decode(MIXED_TEMPLATE))
        .with_stack_id(stack.id);
    let err = svc.apply(&cancel, org(), opts).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    svc.delete_stack(stack.id).await.unwrap();
    assert!(matches!(
        svc.read_stack(stack.id).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn apply_removes_resources_dropped_from_template() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);
    let cancel = CancellationToken::new();

    let both = r##"---
apiVersion: lyra/v1
kind: Label
metadata:
  name: label-1
spec: {}
---
apiVersion: lyra/v1
kind: Bucket
metadata:
  name: rucket-11
spec: {}
"##;
    let impact = svc
        .apply(&cancel, org(), ApplyOpts::new().with_template(decode(both)))
        .await
        .unwrap();
    let stack_id = impact.stack_id;
    assert_eq!(platform.total_resources(), 2);

    let bucket_only = r##"---
apiVersion: lyra/v1
kind: Bucket
metadata:
  name: rucket-11
spec: {}
"##;
    svc.apply(
        &cancel,
        org(),
        ApplyOpts::new()
            .with_template(decode(bucket_only))
            .with_stack_id(stack_id),
    )
    .await
    .unwrap();

    assert_eq!(platform.calls("label.delete"), 1);
    assert!(platform.with_state(|s| s.labels.is_empty()));
    let stack = svc.read_stack(stack_id).await.unwrap();
    assert_eq!(stack.resources().len(), 1);
    assert_eq!(stack.resources()[0].kind, Kind::Bucket);
}

#[tokio::test]
async fn update_stack_renames_meta_name_collisions() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let now = Utc.with_ymd_and_hms(2020, 3, 1, 12, 0, 0).unwrap();
    let svc = new_service(&platform, &store)
        .with_id_generator(Arc::new(FixedIdGen(333)))
        .with_time_source(Arc::new(FixedTime(now)));
    let cancel = CancellationToken::new();

    let stack = svc
        .init_stack(
            &cancel,
            CreateStackRequest {
                org_id: org(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let update = StackUpdate {
        id: stack.id,
        name: Some("name".to_string()),
        description: Some("desc".to_string()),
        additional_resources: vec![
            StackAdditionalResource {
                api_version: lyra_core::API_VERSION.to_string(),
                id: PlatformId::new(1),
                kind: Kind::Label,
                meta_name: "meta-label".to_string(),
            },
            StackAdditionalResource {
                api_version: lyra_core::API_VERSION.to_string(),
                id: PlatformId::new(2),
                kind: Kind::Label,
                meta_name: "meta-label".to_string(),
            },
        ],
        ..Default::default()
    };
    let stack = svc.update_stack(update).await.unwrap();

    let event = stack.latest_event().unwrap();
    assert_eq!(event.name, "name");
    assert_eq!(event.updated_at, now);
    assert_eq!(event.resources.len(), 2);

    let suffix = &PlatformId::new(333).to_string()[10..];
    assert_eq!(
        event.resources[0].meta_name,
        format!("collision-1-{suffix}")
    );
    assert_eq!(event.resources[0].id, PlatformId::new(2));
    assert_eq!(event.resources[1].meta_name, "meta-label");
    assert_eq!(event.resources[1].id, PlatformId::new(1));

    let listed = svc
        .list_stacks(
            org(),
            ListFilter {
                names: vec!["name".to_string()],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn export_round_trips_into_a_stable_template() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);
    let cancel = CancellationToken::new();

    svc.apply(
        &cancel,
        org(),
        ApplyOpts::new().with_template(decode(MIXED_TEMPLATE)),
    )
    .await
    .unwrap();

    let exported = svc
        .export(
            &cancel,
            ExportRequest::new().with_all_org_resources(OrgExportFilter {
                org_id: org(),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
    assert_eq!(exported.objects().len(), 3);

    // the exported bucket carries its label association
    let bucket = exported
        .objects()
        .iter()
        .find(|o| o.kind() == Kind::Bucket)
        .unwrap();
    assert_eq!(bucket.associations.len(), 1);
    assert!(exported.contains(Kind::Label, &bucket.associations[0].name));

    // the export round-trips through encoding
    for format in [TemplateFormat::Yaml, TemplateFormat::Json] {
        let encoded = exported.encode(format).unwrap();
        let back = Template::decode(format, encoded.as_bytes()).unwrap();
        assert_eq!(&back, &exported);
    }

    // re-planning the exported template against the same org is a no-op
    let impact = svc
        .dry_run(&cancel, org(), ApplyOpts::new().with_template(exported))
        .await
        .unwrap();
    for diff in impact.diff.iter() {
        assert!(diff.is_noop(), "unexpected change: {diff:?}");
    }
}

#[tokio::test]
async fn export_strips_task_option_and_uses_struct_schedule() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);
    platform.seed(|s| {
        s.tasks.push(Task {
            id: PlatformId::new(31),
            org_id: org(),
            name: "larry".to_string(),
            description: String::new(),
            flux: "option task = { name: \"larry\", every: 30m } from(bucket: \"rucket\") |> yield()"
                .to_string(),
            every: Some("30m".to_string()),
            cron: None,
            offset: Some("1m".to_string()),
            status: Status::Active,
            is_system: true,
        })
    });

    let cancel = CancellationToken::new();
    let exported = svc
        .export(
            &cancel,
            ExportRequest::new().with_existing_resources(vec![ResourceToClone {
                kind: Kind::Task,
                id: PlatformId::new(31),
                name: None,
            }]),
        )
        .await
        .unwrap();

    let task = exported
        .objects()
        .iter()
        .find(|o| o.kind() == Kind::Task)
        .unwrap();
    match &task.spec {
        ResourceSpec::Task(spec) => {
            assert_eq!(spec.query, "from(bucket: \"rucket\") |> yield()");
            assert_eq!(spec.every.as_deref(), Some("30m"));
            assert_eq!(spec.offset.as_deref(), Some("1m"));
            assert_eq!(spec.name.as_deref(), Some("larry"));
        }
        other => panic!("expected task spec, got {other:?}"),
    }
}

#[tokio::test]
async fn export_name_override_sets_both_names() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);
    seed_live_bucket(&platform);

    let cancel = CancellationToken::new();
    let exported = svc
        .export(
            &cancel,
            ExportRequest::new().with_existing_resources(vec![ResourceToClone {
                kind: Kind::Bucket,
                id: PlatformId::new(1),
                name: Some("chosen-name".to_string()),
            }]),
        )
        .await
        .unwrap();

    let bucket = exported.get(Kind::Bucket, "chosen-name").unwrap();
    match &bucket.spec {
        ResourceSpec::Bucket(spec) => assert_eq!(spec.name.as_deref(), Some("chosen-name")),
        other => panic!("expected bucket spec, got {other:?}"),
    }
}

#[tokio::test]
async fn export_by_stack_id_clones_owned_resources() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);
    let cancel = CancellationToken::new();

    let impact = svc
        .apply(
            &cancel,
            org(),
            ApplyOpts::new().with_template(decode(BUCKET_ONE)),
        )
        .await
        .unwrap();

    let exported = svc
        .export(&cancel, ExportRequest::new().with_stack_id(impact.stack_id))
        .await
        .unwrap();
    assert_eq!(exported.objects().len(), 1);
    assert_eq!(exported.objects()[0].kind(), Kind::Bucket);
}

#[tokio::test]
async fn init_stack_requires_an_existing_org() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);
    let cancel = CancellationToken::new();

    let err = svc
        .init_stack(
            &cancel,
            CreateStackRequest {
                org_id: PlatformId::new(404),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn validation_defects_are_reported_together() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);
    let cancel = CancellationToken::new();

    // two tasks, each with two defects
    let template = r##"---
apiVersion: lyra/v1
kind: Task
metadata:
  name: task-1
spec: {}
---
apiVersion: lyra/v1
kind: Task
metadata:
  name: task-2
spec: {}
"##;
    let err = svc
        .dry_run(
            &cancel,
            org(),
            ApplyOpts::new().with_template(decode(template)),
        )
        .await
        .unwrap_err();
    match err {
        Error::Validation(defects) => assert_eq!(defects.len(), 4),
        other => panic!("expected validation error, got {other}"),
    }
}

#[tokio::test]
async fn cancelled_apply_creates_nothing() {
    let platform = FakePlatform::new();
    let store = FakeStore::new();
    let svc = new_service(&platform, &store);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = svc
        .apply(
            &cancel,
            org(),
            ApplyOpts::new().with_template(decode(LABELS_TEMPLATE)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err.root_cause(), Error::Cancelled));
    assert_eq!(platform.total_resources(), 0);
}
