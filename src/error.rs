//! Error types for the cluster-register operator
//!
//! Errors carry the cluster or object they concern so that a failed pass can
//! be diagnosed from log lines alone.

use std::fmt;

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for cluster-register operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// An object the pass depends on does not exist
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Resource kind (e.g. "Secret", "AppProject")
        kind: String,
        /// Object name
        name: String,
        /// Object namespace
        namespace: String,
    },

    /// Kubeconfig payload could not be turned into a credential bundle
    #[error("invalid credentials for {cluster}: {message}")]
    Credentials {
        /// Name of the cluster whose kubeconfig is malformed
        cluster: String,
        /// Description of what's invalid
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// Configuration rejected at startup
    #[error("configuration error: {message}")]
    Config {
        /// Description of what's invalid
        message: String,
    },

    /// One or more clusters failed during a pass
    #[error("{} cluster(s) failed: {}", .failures.len(), FailureList(.failures))]
    PassFailed {
        /// Per-cluster failures, in processing order
        failures: Vec<ClusterFailure>,
    },
}

/// A single cluster's failure within a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterFailure {
    /// Cluster name
    pub cluster: String,
    /// Cluster namespace
    pub namespace: String,
    /// Rendered error
    pub message: String,
}

impl fmt::Display for ClusterFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.namespace, self.cluster, self.message)
    }
}

struct FailureList<'a>(&'a [ClusterFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

impl Error {
    /// Create a not-found error for the given object
    pub fn not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Create a credentials error with cluster context
    pub fn credentials(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Credentials {
            cluster: cluster.into(),
            message: msg.into(),
        }
    }

    /// Create a credentials error without cluster context
    pub fn credentials_unknown(msg: impl Into<String>) -> Self {
        Self::credentials(UNKNOWN_CONTEXT, msg)
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// True if this error means the object is simply absent
    ///
    /// Covers both our own [`Error::NotFound`] and a raw 404 from the API server.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 404,
            _ => false,
        }
    }

    /// Whether retrying the pass later could succeed without a config change
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Kube { .. } | Self::NotFound { .. } => true,
            Self::PassFailed { .. } => true,
            Self::Credentials { .. } | Self::Serialization { .. } | Self::Config { .. } => false,
        }
    }

    /// Get the cluster name associated with this error, if any
    pub fn cluster(&self) -> Option<&str> {
        match self {
            Self::Credentials { cluster, .. } if cluster != UNKNOWN_CONTEXT => Some(cluster.as_str()),
            _ => None,
        }
    }

    /// Attach cluster context to a credentials error raised without it
    pub fn with_cluster(self, name: &str) -> Self {
        match self {
            Self::Credentials { cluster, message } if cluster == UNKNOWN_CONTEXT => {
                Self::credentials(name, message)
            }
            other => other,
        }
    }
}
