//! cluster-register - keeps Argo CD in sync with Cluster API clusters
//!
//! The operator watches `Generator` resources and, on every pass, walks all
//! Cluster API `Cluster` objects visible to it. Each ready cluster gets an
//! Argo CD cluster Secret built from its kubeconfig and is added as a
//! destination of the Generator's AppProject; each deleting cluster has its
//! Secret removed.
//!
//! # Architecture
//!
//! Reconciliation is level-triggered and holds no state between passes:
//! every pass recomputes the desired records from the live cluster list and
//! converges Argo CD using idempotent create-or-replace and delete calls.
//! Re-invocation (on change and on a fixed timer) is owned by the
//! `kube::runtime` controller.
//!
//! # Modules
//!
//! - [`crd`] - Generator CRD plus typed views of CAPI Clusters and Argo CD AppProjects
//! - [`credentials`] - Kubeconfig Secret lookup and decoding
//! - [`membership`] - Argo CD cluster Secret registration and deregistration
//! - [`project`] - AppProject destination binding
//! - [`controller`] - The reconciliation pass and controller context
//! - [`config`] - Controller configuration (flags and environment)
//! - [`telemetry`] - Tracing subscriber setup
//! - [`retry`] - Backoff helper for startup operations
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod credentials;
pub mod error;
pub mod membership;
pub mod project;
pub mod retry;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Naming Conventions and Defaults
// =============================================================================

/// Default namespace Argo CD is installed into
pub const DEFAULT_ARGOCD_NAMESPACE: &str = "argocd";

/// Suffix CAPI appends to a cluster name for its kubeconfig Secret
pub const KUBECONFIG_SECRET_SUFFIX: &str = "-kubeconfig";

/// Key inside the kubeconfig Secret holding the kubeconfig document
pub const KUBECONFIG_SECRET_KEY: &str = "value";

/// Suffix appended to a cluster name for its Argo CD cluster Secret
pub const CLUSTER_SECRET_SUFFIX: &str = "-cluster-secret";

/// Field manager used for server-side apply and status patches
pub const FIELD_MANAGER: &str = "cluster-register";

/// Delay before the next pass after a successful one
pub const DEFAULT_REQUEUE_SECS: u64 = 60;

/// Delay before retrying a failed pass
pub const DEFAULT_ERROR_REQUEUE_SECS: u64 = 5;

/// Watcher timeout (seconds) - must be less than the client read timeout (30s)
pub const DEFAULT_WATCH_TIMEOUT_SECS: u32 = 25;

/// Name of the Argo CD cluster Secret for a cluster
pub fn cluster_secret_name(cluster_name: &str) -> String {
    format!("{}{}", cluster_name, CLUSTER_SECRET_SUFFIX)
}

/// Name of the CAPI kubeconfig Secret for a cluster
pub fn kubeconfig_secret_name(cluster_name: &str) -> String {
    format!("{}{}", cluster_name, KUBECONFIG_SECRET_SUFFIX)
}
