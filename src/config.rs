//! Controller configuration
//!
//! Every setting can be given as a flag or through the environment, so the
//! same binary runs unchanged from a Deployment manifest or a shell.

use std::time::Duration;

use clap::{Args, ValueEnum};

use crate::{
    Error, DEFAULT_ARGOCD_NAMESPACE, DEFAULT_ERROR_REQUEUE_SECS, DEFAULT_REQUEUE_SECS,
    DEFAULT_WATCH_TIMEOUT_SECS,
};

/// Kube client read timeout; watches must be closed by the server before this
const CLIENT_READ_TIMEOUT_SECS: u32 = 30;

/// How a pass treats a cluster that fails to reconcile
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum FailurePolicy {
    /// Keep reconciling the remaining clusters and report all failures at the end
    #[default]
    Isolate,
    /// Abort the pass at the first failing cluster
    FailFast,
}

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Settings for the Generator controller
#[derive(Args, Clone, Debug)]
pub struct ControllerConfig {
    /// Namespace Argo CD runs in; cluster Secrets and AppProjects live here
    #[arg(long, env = "ARGOCD_NAMESPACE", default_value = DEFAULT_ARGOCD_NAMESPACE)]
    pub argocd_namespace: String,

    /// Seconds to wait before the next pass after a successful one
    #[arg(long, env = "REQUEUE_INTERVAL_SECS", default_value_t = DEFAULT_REQUEUE_SECS)]
    pub requeue_interval_secs: u64,

    /// Seconds to wait before retrying a failed pass
    #[arg(long, env = "ERROR_REQUEUE_SECS", default_value_t = DEFAULT_ERROR_REQUEUE_SECS)]
    pub error_requeue_secs: u64,

    /// Whether one broken cluster stops the rest of the pass
    #[arg(long, env = "FAILURE_POLICY", value_enum, default_value_t = FailurePolicy::Isolate)]
    pub failure_policy: FailurePolicy,

    /// Server-side watch timeout in seconds
    #[arg(long, env = "WATCH_TIMEOUT_SECS", default_value_t = DEFAULT_WATCH_TIMEOUT_SECS)]
    pub watch_timeout_secs: u32,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            argocd_namespace: DEFAULT_ARGOCD_NAMESPACE.to_string(),
            requeue_interval_secs: DEFAULT_REQUEUE_SECS,
            error_requeue_secs: DEFAULT_ERROR_REQUEUE_SECS,
            failure_policy: FailurePolicy::default(),
            watch_timeout_secs: DEFAULT_WATCH_TIMEOUT_SECS,
            log_format: LogFormat::default(),
        }
    }
}

impl ControllerConfig {
    /// Reject settings the controller cannot run with
    pub fn validate(&self) -> Result<(), Error> {
        if self.argocd_namespace.trim().is_empty() {
            return Err(Error::config("argocd namespace must not be empty"));
        }
        if self.requeue_interval_secs == 0 {
            return Err(Error::config("requeue interval must be at least 1 second"));
        }
        if self.error_requeue_secs == 0 {
            return Err(Error::config(
                "error requeue interval must be at least 1 second",
            ));
        }
        if self.watch_timeout_secs == 0 || self.watch_timeout_secs >= CLIENT_READ_TIMEOUT_SECS {
            return Err(Error::config(format!(
                "watch timeout must be between 1 and {} seconds",
                CLIENT_READ_TIMEOUT_SECS - 1
            )));
        }
        Ok(())
    }

    /// Delay before the next pass after success
    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_interval_secs)
    }

    /// Delay before retrying a failed pass
    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }
}
