//! Typed view of the Cluster API `Cluster` resource
//!
//! Only the fields the operator reads are modelled; everything else in the
//! object is ignored on deserialization. Clusters are owned by CAPI and are
//! never written by this operator.

use std::fmt;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification of a CAPI Cluster (subset)
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Cluster",
    root = "CapiCluster",
    plural = "clusters",
    namespaced,
    status = "CapiClusterStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CapiClusterSpec {
    /// Whether CAPI reconciliation of this cluster is paused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
}

/// Observed state of a CAPI Cluster (subset)
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapiClusterStatus {
    /// Lifecycle phase as reported by CAPI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Whether the control plane is ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_ready: Option<bool>,
}

/// CAPI cluster phase
///
/// CAPI reports the phase as a free-form string; values this operator does
/// not know about map to [`ClusterPhase::Unknown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterPhase {
    /// Cluster object created, infrastructure not requested yet
    Pending,
    /// Infrastructure is being created
    Provisioning,
    /// Infrastructure and control plane exist
    Provisioned,
    /// Cluster is being torn down
    Deleting,
    /// CAPI gave up on the cluster
    Failed,
    /// Phase missing or not recognised
    Unknown,
}

impl ClusterPhase {
    /// Parse the phase string reported in `status.phase`
    pub fn parse(phase: &str) -> Self {
        match phase {
            "Pending" => Self::Pending,
            "Provisioning" => Self::Provisioning,
            "Provisioned" => Self::Provisioned,
            "Deleting" => Self::Deleting,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Which branch of the reconcile pass this phase takes
    pub fn lifecycle(self) -> ClusterLifecycle {
        match self {
            Self::Deleting => ClusterLifecycle::Deleting,
            _ => ClusterLifecycle::Active,
        }
    }
}

impl fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Provisioning => "Provisioning",
            Self::Provisioned => "Provisioned",
            Self::Deleting => "Deleting",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Per-pass classification of a cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterLifecycle {
    /// Cluster is going away; its Argo CD record must be removed
    Deleting,
    /// Any other phase; the cluster must be registered and bound
    Active,
}

impl CapiCluster {
    /// Current phase, [`ClusterPhase::Unknown`] if no status was reported
    pub fn phase(&self) -> ClusterPhase {
        self.status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .map(ClusterPhase::parse)
            .unwrap_or(ClusterPhase::Unknown)
    }

    /// Lifecycle branch for this pass
    pub fn lifecycle(&self) -> ClusterLifecycle {
        self.phase().lifecycle()
    }

    /// Revision token recorded on the Argo CD Secret
    ///
    /// This is the object's resourceVersion; empty if the object was never persisted.
    pub fn revision(&self) -> String {
        self.resource_version().unwrap_or_default()
    }

    /// Namespace of the cluster, `default` if unset
    pub fn namespace_or_default(&self) -> String {
        self.namespace().unwrap_or_else(|| "default".to_string())
    }

    /// Whether CAPI reports the control plane as ready
    pub fn control_plane_ready(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.control_plane_ready)
            .unwrap_or(false)
    }
}
