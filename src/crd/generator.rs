//! Generator Custom Resource Definition
//!
//! A Generator asks the operator to register every CAPI cluster it can see
//! with Argo CD and, optionally, to add each one as a destination of an
//! AppProject.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification for a Generator
///
/// Example:
/// ```yaml
/// apiVersion: cluster.argoproj.io/v1alpha1
/// kind: Generator
/// metadata:
///   name: platform
///   namespace: argocd
/// spec:
///   appProjectName: platform
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "cluster.argoproj.io",
    version = "v1alpha1",
    kind = "Generator",
    plural = "generators",
    namespaced,
    status = "GeneratorStatus",
    printcolumn = r#"{"name":"Project","type":"string","jsonPath":".spec.appProjectName"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.message"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorSpec {
    /// AppProject each registered cluster is added to as a destination.
    /// When unset, clusters are registered but no project is touched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_project_name: Option<String>,
}

impl GeneratorSpec {
    /// Target AppProject, treating an empty name as unset
    pub fn target_project(&self) -> Option<&str> {
        self.app_project_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Outcome of the most recent successful or partially failed pass
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorStatus {
    /// Clusters with an up-to-date Argo CD Secret
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registered_clusters: Vec<String>,

    /// Clusters whose Argo CD Secret was removed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deregistered_clusters: Vec<String>,

    /// Deleting clusters whose kubeconfig Secret was already gone
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_clusters: Vec<String>,

    /// Clusters that failed to reconcile
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_clusters: Vec<String>,

    /// Human-readable summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Generation of the Generator spec this status was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
