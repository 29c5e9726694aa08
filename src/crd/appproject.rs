//! Typed view of the Argo CD `AppProject` resource
//!
//! Only `spec.destinations` is modelled explicitly. Every other spec and
//! status field is carried through untouched so that a full replace does not
//! drop anything Argo CD or its users wrote. AppProject has no status
//! subresource, so a replace that omitted `status` would clear it.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification of an Argo CD AppProject (subset)
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "argoproj.io",
    version = "v1alpha1",
    kind = "AppProject",
    plural = "appprojects",
    namespaced,
    status = "AppProjectStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct AppProjectSpec {
    /// Clusters and namespaces applications in this project may deploy to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<ApplicationDestination>,

    /// Remaining spec fields, preserved verbatim
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Status of an AppProject, preserved verbatim (`jwtTokensByRole`...)
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct AppProjectStatus {
    /// All status fields
    #[serde(flatten)]
    #[schemars(skip)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// A deployment destination of an AppProject
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ApplicationDestination {
    /// Argo CD cluster name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// API server URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Target namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ApplicationDestination {
    /// Destination referencing a cluster by its Argo CD name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

impl AppProjectSpec {
    /// Whether any destination refers to the cluster by name
    pub fn has_destination_named(&self, name: &str) -> bool {
        self.destinations
            .iter()
            .any(|d| d.name.as_deref() == Some(name))
    }
}
