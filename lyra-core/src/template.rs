//! Template - an immutable bundle of resource declarations
//!
//! The interchange surface is a stream of objects with `apiVersion`, `kind`,
//! `metadata.name`, and a kind-specific `spec`, in either JSON or YAML. The
//! decoded form is fully typed; encode/decode round-trips are lossless.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result, ValidationDefect};
use crate::kind::Kind;
use crate::resource::bucket::BucketSpec;
use crate::resource::check::{CheckSpec, DeadmanCheck, ThresholdCheck};
use crate::resource::dashboard::DashboardSpec;
use crate::resource::endpoint::{EndpointSpec, HttpEndpoint, PagerDutyEndpoint, SlackEndpoint};
use crate::resource::label::LabelSpec;
use crate::resource::rule::RuleSpec;
use crate::resource::task::TaskSpec;
use crate::resource::telegraf::TelegrafSpec;
use crate::resource::variable::VariableSpec;
use crate::resource::{Association, EnvReference, SecretField};

/// API version stamped on every template object and stack resource
pub const API_VERSION: &str = "lyra/v1";

/// Interchange format discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    Json,
    Yaml,
}

/// Kind-specific declaration payload
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSpec {
    Bucket(BucketSpec),
    Check(CheckSpec),
    Dashboard(DashboardSpec),
    Label(LabelSpec),
    NotificationEndpoint(EndpointSpec),
    NotificationRule(RuleSpec),
    Task(TaskSpec),
    Telegraf(TelegrafSpec),
    Variable(VariableSpec),
}

impl ResourceSpec {
    /// Concrete kind of this declaration
    pub fn kind(&self) -> Kind {
        match self {
            ResourceSpec::Bucket(_) => Kind::Bucket,
            ResourceSpec::Check(c) => c.kind(),
            ResourceSpec::Dashboard(_) => Kind::Dashboard,
            ResourceSpec::Label(_) => Kind::Label,
            ResourceSpec::NotificationEndpoint(e) => e.kind(),
            ResourceSpec::NotificationRule(_) => Kind::NotificationRule,
            ResourceSpec::Task(_) => Kind::Task,
            ResourceSpec::Telegraf(_) => Kind::Telegraf,
            ResourceSpec::Variable(_) => Kind::Variable,
        }
    }

    pub fn validate(&self, meta_name: &str) -> Vec<ValidationDefect> {
        match self {
            ResourceSpec::Bucket(s) => s.validate(meta_name),
            ResourceSpec::Check(s) => s.validate(meta_name),
            ResourceSpec::Dashboard(s) => s.validate(meta_name),
            ResourceSpec::Label(s) => s.validate(meta_name),
            ResourceSpec::NotificationEndpoint(s) => s.validate(meta_name),
            ResourceSpec::NotificationRule(s) => s.validate(meta_name),
            ResourceSpec::Task(s) => s.validate(meta_name),
            ResourceSpec::Telegraf(s) => s.validate(meta_name),
            ResourceSpec::Variable(s) => s.validate(meta_name),
        }
    }

    fn from_json(kind: Kind, value: Value) -> Result<Self> {
        let invalid = |e: serde_json::Error| {
            Error::Validation(vec![ValidationDefect::new("spec", e.to_string())])
        };
        let spec = match kind {
            Kind::Bucket => ResourceSpec::Bucket(serde_json::from_value(value).map_err(invalid)?),
            Kind::CheckDeadman => ResourceSpec::Check(CheckSpec::Deadman(
                serde_json::from_value::<DeadmanCheck>(value).map_err(invalid)?,
            )),
            Kind::CheckThreshold => ResourceSpec::Check(CheckSpec::Threshold(
                serde_json::from_value::<ThresholdCheck>(value).map_err(invalid)?,
            )),
            Kind::Dashboard => {
                ResourceSpec::Dashboard(serde_json::from_value(value).map_err(invalid)?)
            }
            Kind::Label => ResourceSpec::Label(serde_json::from_value(value).map_err(invalid)?),
            Kind::NotificationEndpointHttp => ResourceSpec::NotificationEndpoint(
                EndpointSpec::Http(serde_json::from_value::<HttpEndpoint>(value).map_err(invalid)?),
            ),
            Kind::NotificationEndpointSlack => {
                ResourceSpec::NotificationEndpoint(EndpointSpec::Slack(
                    serde_json::from_value::<SlackEndpoint>(value).map_err(invalid)?,
                ))
            }
            Kind::NotificationEndpointPagerDuty => {
                ResourceSpec::NotificationEndpoint(EndpointSpec::PagerDuty(
                    serde_json::from_value::<PagerDutyEndpoint>(value).map_err(invalid)?,
                ))
            }
            Kind::NotificationRule => {
                ResourceSpec::NotificationRule(serde_json::from_value(value).map_err(invalid)?)
            }
            Kind::Task => ResourceSpec::Task(serde_json::from_value(value).map_err(invalid)?),
            Kind::Telegraf => {
                ResourceSpec::Telegraf(serde_json::from_value(value).map_err(invalid)?)
            }
            Kind::Variable => {
                ResourceSpec::Variable(serde_json::from_value(value).map_err(invalid)?)
            }
            Kind::Check | Kind::NotificationEndpoint => {
                return Err(Error::Validation(vec![ValidationDefect::new(
                    "kind",
                    format!("{kind} is an abstract kind; declare a concrete variant"),
                )]));
            }
        };
        Ok(spec)
    }

    fn to_json(&self) -> Value {
        match self {
            ResourceSpec::Bucket(s) => serde_json::to_value(s),
            ResourceSpec::Check(CheckSpec::Deadman(s)) => serde_json::to_value(s),
            ResourceSpec::Check(CheckSpec::Threshold(s)) => serde_json::to_value(s),
            ResourceSpec::Dashboard(s) => serde_json::to_value(s),
            ResourceSpec::Label(s) => serde_json::to_value(s),
            ResourceSpec::NotificationEndpoint(EndpointSpec::Http(s)) => serde_json::to_value(s),
            ResourceSpec::NotificationEndpoint(EndpointSpec::Slack(s)) => serde_json::to_value(s),
            ResourceSpec::NotificationEndpoint(EndpointSpec::PagerDuty(s)) => {
                serde_json::to_value(s)
            }
            ResourceSpec::NotificationRule(s) => serde_json::to_value(s),
            ResourceSpec::Task(s) => serde_json::to_value(s),
            ResourceSpec::Telegraf(s) => serde_json::to_value(s),
            ResourceSpec::Variable(s) => serde_json::to_value(s),
        }
        // serializing fully typed specs cannot fail
        .unwrap_or(Value::Null)
    }
}

/// One declared resource
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateObject {
    pub api_version: String,
    pub meta_name: String,
    pub spec: ResourceSpec,
    pub associations: Vec<Association>,
    pub env_refs: Vec<EnvReference>,
}

impl TemplateObject {
    pub fn new(meta_name: impl Into<String>, spec: ResourceSpec) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            meta_name: meta_name.into(),
            spec,
            associations: Vec::new(),
            env_refs: Vec::new(),
        }
    }

    pub fn with_associations(mut self, associations: Vec<Association>) -> Self {
        self.associations = associations;
        self
    }

    pub fn kind(&self) -> Kind {
        self.spec.kind()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawObject {
    api_version: String,
    kind: Kind,
    metadata: RawMetadata,
    #[serde(default)]
    spec: Value,
}

const ASSOCIATIONS_FIELD: &str = "associations";
const ENV_REFS_FIELD: &str = "envRefs";

impl RawObject {
    fn into_object(self) -> Result<TemplateObject> {
        let mut spec = self.spec;
        let mut associations = Vec::new();
        let mut env_refs = Vec::new();
        if let Value::Object(map) = &mut spec {
            if let Some(raw) = map.remove(ASSOCIATIONS_FIELD) {
                associations = serde_json::from_value(raw).map_err(|e| {
                    Error::Validation(vec![ValidationDefect::new(ASSOCIATIONS_FIELD, e.to_string())])
                })?;
            }
            if let Some(raw) = map.remove(ENV_REFS_FIELD) {
                env_refs = serde_json::from_value(raw).map_err(|e| {
                    Error::Validation(vec![ValidationDefect::new(ENV_REFS_FIELD, e.to_string())])
                })?;
            }
        }
        Ok(TemplateObject {
            api_version: self.api_version,
            meta_name: self.metadata.name,
            spec: ResourceSpec::from_json(self.kind, spec)?,
            associations,
            env_refs,
        })
    }

    fn from_object(object: &TemplateObject) -> Self {
        let mut spec = object.spec.to_json();
        if let Value::Object(map) = &mut spec {
            if !object.associations.is_empty() {
                map.insert(
                    ASSOCIATIONS_FIELD.to_string(),
                    serde_json::to_value(&object.associations).unwrap_or(Value::Null),
                );
            }
            if !object.env_refs.is_empty() {
                map.insert(
                    ENV_REFS_FIELD.to_string(),
                    serde_json::to_value(&object.env_refs).unwrap_or(Value::Null),
                );
            }
        }
        RawObject {
            api_version: object.api_version.clone(),
            kind: object.kind(),
            metadata: RawMetadata {
                name: object.meta_name.clone(),
            },
            spec,
        }
    }
}

/// Immutable bundle of declarations, keyed by `(Kind, MetaName)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Template {
    objects: Vec<TemplateObject>,
}

impl Template {
    pub fn new(objects: Vec<TemplateObject>) -> Self {
        Self { objects }
    }

    pub fn objects(&self) -> &[TemplateObject] {
        &self.objects
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Look up a declaration; group kinds match their concrete variants
    pub fn get(&self, kind: Kind, meta_name: &str) -> Option<&TemplateObject> {
        self.objects
            .iter()
            .find(|o| o.kind().matches(kind) && o.meta_name == meta_name)
    }

    pub fn contains(&self, kind: Kind, meta_name: &str) -> bool {
        self.get(kind, meta_name).is_some()
    }

    /// Secret keys referenced anywhere in the bundle
    pub fn secret_fields(&self) -> Vec<SecretField> {
        let mut fields: Vec<SecretField> = self
            .objects
            .iter()
            .filter_map(|o| match &o.spec {
                ResourceSpec::NotificationEndpoint(e) => Some(e.secret_fields()),
                _ => None,
            })
            .flatten()
            .collect();
        fields.sort();
        fields.dedup();
        fields
    }

    /// Structural validation: per-spec field checks plus key uniqueness.
    /// Defects are collected, never short-circuited.
    pub fn validate(&self) -> Vec<ValidationDefect> {
        let mut defects = Vec::new();
        let mut seen: Vec<(Kind, &str)> = Vec::new();
        for object in &self.objects {
            let key = (object.kind().group(), object.meta_name.as_str());
            if seen.contains(&key) {
                defects.push(
                    ValidationDefect::new("metadata.name", "duplicate declaration")
                        .for_resource(object.kind(), &object.meta_name),
                );
            } else {
                seen.push(key);
            }
            if object.meta_name.is_empty() {
                defects.push(
                    ValidationDefect::new("metadata.name", "meta name is required")
                        .for_resource(object.kind(), "?"),
                );
            }
            defects.extend(object.spec.validate(&object.meta_name));
        }
        defects
    }

    /// Decode a stream of template objects in the given format
    pub fn decode(format: TemplateFormat, data: &[u8]) -> Result<Template> {
        let raws: Vec<RawObject> = match format {
            TemplateFormat::Json => {
                if data.iter().copied().find(|b| !b.is_ascii_whitespace()) == Some(b'[') {
                    serde_json::from_slice(data).map_err(|e| {
                        Error::Validation(vec![ValidationDefect::new("template", e.to_string())])
                    })?
                } else {
                    vec![serde_json::from_slice(data).map_err(|e| {
                        Error::Validation(vec![ValidationDefect::new("template", e.to_string())])
                    })?]
                }
            }
            TemplateFormat::Yaml => {
                let mut raws = Vec::new();
                for document in serde_yaml::Deserializer::from_slice(data) {
                    let raw = RawObject::deserialize(document).map_err(|e| {
                        Error::Validation(vec![ValidationDefect::new("template", e.to_string())])
                    })?;
                    raws.push(raw);
                }
                raws
            }
        };
        let objects = raws
            .into_iter()
            .map(RawObject::into_object)
            .collect::<Result<Vec<_>>>()?;
        Ok(Template::new(objects))
    }

    /// Encode back into the given format
    pub fn encode(&self, format: TemplateFormat) -> Result<String> {
        let raws: Vec<RawObject> = self.objects.iter().map(RawObject::from_object).collect();
        match format {
            TemplateFormat::Json => serde_json::to_string_pretty(&raws)
                .map_err(|e| Error::Internal(format!("encoding template: {e}"))),
            TemplateFormat::Yaml => {
                let mut out = String::new();
                for raw in &raws {
                    let doc = serde_yaml::to_string(raw)
                        .map_err(|e| Error::Internal(format!("encoding template: {e}")))?;
                    out.push_str("---\n");
                    out.push_str(&doc);
                }
                Ok(out)
            }
        }
    }

    /// Merge templates in submission order: later declarations overlay
    /// earlier ones with the same `(Kind, MetaName)`, last write wins per
    /// top-level spec field.
    pub fn merge(templates: Vec<Template>) -> Result<Template> {
        let mut raws: Vec<RawObject> = Vec::new();
        for template in templates {
            for object in &template.objects {
                let raw = RawObject::from_object(object);
                let existing = raws.iter().position(|r| {
                    r.kind.matches(raw.kind) && r.metadata.name == raw.metadata.name
                });
                match existing {
                    Some(i) => {
                        let prior = &mut raws[i];
                        if let (Value::Object(base), Value::Object(overlay)) =
                            (&mut prior.spec, raw.spec)
                        {
                            for (field, value) in overlay {
                                base.insert(field, value);
                            }
                        }
                        prior.kind = raw.kind;
                        prior.api_version = raw.api_version;
                    }
                    None => raws.push(raw),
                }
            }
        }
        let objects = raws
            .into_iter()
            .map(RawObject::into_object)
            .collect::<Result<Vec<_>>>()?;
        Ok(Template::new(objects))
    }
}
