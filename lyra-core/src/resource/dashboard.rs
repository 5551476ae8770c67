//! Dashboard resource model
//!
//! Dashboards are content-heavy and never matched against live state by
//! name; the differ treats them as new unless a bound stack owns them.

use serde::{Deserialize, Serialize};

use crate::error::ValidationDefect;
use crate::kind::Kind;
use crate::resource::display_name;

/// Declared dashboard fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<Chart>,
}

/// One chart cell: placement plus the embedded view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    #[serde(rename = "kind")]
    pub chart_kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
    #[serde(default)]
    pub x_pos: i32,
    #[serde(default)]
    pub y_pos: i32,
    pub height: i32,
    pub width: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<String>,
}

impl DashboardSpec {
    pub fn validate(&self, meta_name: &str) -> Vec<ValidationDefect> {
        let mut defects = Vec::new();
        for (i, chart) in self.charts.iter().enumerate() {
            if chart.chart_kind.is_empty() {
                defects.push(
                    ValidationDefect::new(format!("charts[{i}].kind"), "chart kind is required")
                        .for_resource(Kind::Dashboard, meta_name),
                );
            }
            if chart.height <= 0 || chart.width <= 0 {
                defects.push(
                    ValidationDefect::new(
                        format!("charts[{i}]"),
                        "chart height and width must be positive",
                    )
                    .for_resource(Kind::Dashboard, meta_name),
                );
            }
        }
        defects
    }

    pub fn values(&self, meta_name: &str) -> DashboardValues {
        DashboardValues {
            name: display_name(self.name.as_deref(), meta_name).to_string(),
            description: self.description.clone().unwrap_or_default(),
            charts: self.charts.clone(),
        }
    }
}

/// Comparable dashboard state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardValues {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<Chart>,
}

impl DashboardValues {
    pub fn to_spec(&self) -> DashboardSpec {
        DashboardSpec {
            name: Some(self.name.clone()),
            description: if self.description.is_empty() {
                None
            } else {
                Some(self.description.clone())
            },
            charts: self.charts.clone(),
        }
    }
}
