//! Notification endpoint resource model

use serde::{Deserialize, Serialize};

use crate::error::ValidationDefect;
use crate::kind::Kind;
use crate::resource::{display_name, SecretField, Status};

/// Fields shared by every endpoint variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointBase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Status,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpEndpoint {
    #[serde(flatten)]
    pub base: EndpointBase,
    pub url: String,
    #[serde(default = "default_http_method")]
    pub method: String,
    #[serde(default = "default_auth_method")]
    pub auth_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<SecretField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<SecretField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<SecretField>,
}

fn default_http_method() -> String {
    "POST".to_string()
}

fn default_auth_method() -> String {
    "none".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackEndpoint {
    #[serde(flatten)]
    pub base: EndpointBase,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<SecretField>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagerDutyEndpoint {
    #[serde(flatten)]
    pub base: EndpointBase,
    #[serde(default)]
    pub client_url: String,
    pub routing_key: SecretField,
}

/// Endpoint variants, selected by the declaring object's kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EndpointSpec {
    Http(HttpEndpoint),
    Slack(SlackEndpoint),
    PagerDuty(PagerDutyEndpoint),
}

const HTTP_METHODS: [&str; 3] = ["GET", "POST", "PUT"];
const HTTP_AUTH_METHODS: [&str; 3] = ["none", "basic", "bearer"];

fn is_valid_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.contains(char::is_whitespace))
}

impl EndpointSpec {
    pub fn base(&self) -> &EndpointBase {
        match self {
            EndpointSpec::Http(e) => &e.base,
            EndpointSpec::Slack(e) => &e.base,
            EndpointSpec::PagerDuty(e) => &e.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut EndpointBase {
        match self {
            EndpointSpec::Http(e) => &mut e.base,
            EndpointSpec::Slack(e) => &mut e.base,
            EndpointSpec::PagerDuty(e) => &mut e.base,
        }
    }

    /// Concrete kind of this variant
    pub fn kind(&self) -> Kind {
        match self {
            EndpointSpec::Http(_) => Kind::NotificationEndpointHttp,
            EndpointSpec::Slack(_) => Kind::NotificationEndpointSlack,
            EndpointSpec::PagerDuty(_) => Kind::NotificationEndpointPagerDuty,
        }
    }

    /// Short type label surfaced on rule summaries
    pub fn type_label(&self) -> &'static str {
        match self {
            EndpointSpec::Http(_) => "http",
            EndpointSpec::Slack(_) => "slack",
            EndpointSpec::PagerDuty(_) => "pagerduty",
        }
    }

    /// Secret keys this endpoint references
    pub fn secret_fields(&self) -> Vec<SecretField> {
        match self {
            EndpointSpec::Http(e) => [&e.username, &e.password, &e.token]
                .into_iter()
                .flatten()
                .cloned()
                .collect(),
            EndpointSpec::Slack(e) => e.token.iter().cloned().collect(),
            EndpointSpec::PagerDuty(e) => vec![e.routing_key.clone()],
        }
    }

    pub fn validate(&self, meta_name: &str) -> Vec<ValidationDefect> {
        let kind = self.kind();
        let mut defects = Vec::new();
        match self {
            EndpointSpec::Http(e) => {
                if !is_valid_url(&e.url) {
                    defects.push(
                        ValidationDefect::new("url", format!("\"{}\" does not parse", e.url))
                            .for_resource(kind, meta_name),
                    );
                }
                if !HTTP_METHODS.contains(&e.method.as_str()) {
                    defects.push(
                        ValidationDefect::new(
                            "method",
                            format!("\"{}\" is not one of GET, POST, PUT", e.method),
                        )
                        .for_resource(kind, meta_name),
                    );
                }
                match e.auth_method.as_str() {
                    "none" => {}
                    "basic" => {
                        if e.username.is_none() || e.password.is_none() {
                            defects.push(
                                ValidationDefect::new(
                                    "authMethod",
                                    "basic auth requires username and password",
                                )
                                .for_resource(kind, meta_name),
                            );
                        }
                    }
                    "bearer" => {
                        if e.token.is_none() {
                            defects.push(
                                ValidationDefect::new("authMethod", "bearer auth requires a token")
                                    .for_resource(kind, meta_name),
                            );
                        }
                    }
                    other => defects.push(
                        ValidationDefect::new(
                            "authMethod",
                            format!(
                                "\"{other}\" is not one of {}",
                                HTTP_AUTH_METHODS.join(", ")
                            ),
                        )
                        .for_resource(kind, meta_name),
                    ),
                }
            }
            EndpointSpec::Slack(e) => {
                if !is_valid_url(&e.url) {
                    defects.push(
                        ValidationDefect::new("url", format!("\"{}\" does not parse", e.url))
                            .for_resource(kind, meta_name),
                    );
                }
            }
            EndpointSpec::PagerDuty(e) => {
                if e.routing_key.key.is_empty() {
                    defects.push(
                        ValidationDefect::new("routingKey", "routing key is required")
                            .for_resource(kind, meta_name),
                    );
                }
            }
        }
        defects
    }

    /// Normalized snapshot; server-assigned timestamps have no counterpart
    /// here, so comparison naturally excludes them.
    pub fn values(&self, meta_name: &str) -> EndpointValues {
        let base = self.base();
        let mut spec = self.clone();
        spec.base_mut().name = Some(display_name(base.name.as_deref(), meta_name).to_string());
        if spec.base().description.is_none() {
            spec.base_mut().description = Some(String::new());
        }
        EndpointValues {
            kind: self.kind(),
            name: display_name(base.name.as_deref(), meta_name).to_string(),
            spec,
        }
    }
}

/// Comparable endpoint state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointValues {
    pub kind: Kind,
    pub name: String,
    pub spec: EndpointSpec,
}

impl EndpointValues {
    pub fn to_spec(&self) -> EndpointSpec {
        self.spec.clone()
    }
}
