//! Generator controller implementation
//!
//! One reconcile call is one pass: list every CAPI Cluster, register the live
//! ones with Argo CD (and bind them to the Generator's AppProject), and remove
//! the records of clusters being deleted. Nothing is cached between passes;
//! the runtime re-invokes the pass on change and on a fixed interval.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ControllerConfig, FailurePolicy};
use crate::credentials;
use crate::crd::{CapiCluster, ClusterLifecycle, Generator, GeneratorStatus};
use crate::error::ClusterFailure;
use crate::membership::{self, DeregisterOutcome, RegisterOutcome};
use crate::project::{self, BindOutcome};
use crate::Error;

use super::client::{KubeClient, KubeClientImpl};

/// Controller context containing shared state and clients
///
/// Use [`ContextBuilder`] to construct instances:
///
/// ```ignore
/// let ctx = Context::builder(client)
///     .config(config)
///     .build();
/// ```
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Controller settings
    pub config: ControllerConfig,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Create a context for testing with a mock client
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KubeClient>, config: ControllerConfig) -> Self {
        Self { kube, config }
    }
}

/// Builder for constructing [`Context`] instances
pub struct ContextBuilder {
    client: Client,
    kube: Option<Arc<dyn KubeClient>>,
    config: ControllerConfig,
}

impl ContextBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            kube: None,
            config: ControllerConfig::default(),
        }
    }

    /// Set the controller settings
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the Kubernetes client (primarily for testing)
    pub fn kube_client(mut self, kube: Arc<dyn KubeClient>) -> Self {
        self.kube = Some(kube);
        self
    }

    /// Build the Context
    pub fn build(self) -> Context {
        Context {
            kube: self
                .kube
                .unwrap_or_else(|| Arc::new(KubeClientImpl::new(self.client.clone()))),
            config: self.config,
        }
    }
}

/// What a pass did with one cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterOutcome {
    /// Cluster Secret written; project binding attempted
    Registered(RegisterOutcome, BindOutcome),
    /// Cluster Secret removed (or already absent)
    Deregistered(DeregisterOutcome),
    /// Cluster is being deleted and its kubeconfig is already gone
    Skipped,
}

/// Accumulated per-cluster results of one pass
#[derive(Debug, Default)]
pub struct PassReport {
    registered: Vec<String>,
    deregistered: Vec<String>,
    skipped: Vec<String>,
    failures: Vec<ClusterFailure>,
}

impl PassReport {
    fn record(&mut self, key: String, outcome: ClusterOutcome) {
        match outcome {
            ClusterOutcome::Registered(..) => self.registered.push(key),
            ClusterOutcome::Deregistered(_) => self.deregistered.push(key),
            ClusterOutcome::Skipped => self.skipped.push(key),
        }
    }

    fn fail(&mut self, failure: ClusterFailure) {
        self.failures.push(failure);
    }

    /// Failures recorded so far, in processing order
    pub fn failures(&self) -> &[ClusterFailure] {
        &self.failures
    }

    /// Render the report as a Generator status
    pub fn to_status(&self, observed_generation: Option<i64>) -> GeneratorStatus {
        let sorted = |names: &[String]| {
            let mut names = names.to_vec();
            names.sort();
            names
        };
        let mut failed: Vec<String> = self
            .failures
            .iter()
            .map(|f| format!("{}/{}", f.namespace, f.cluster))
            .collect();
        failed.sort();

        let message = format!(
            "{} registered, {} deregistered, {} skipped, {} failed",
            self.registered.len(),
            self.deregistered.len(),
            self.skipped.len(),
            self.failures.len()
        );

        GeneratorStatus {
            registered_clusters: sorted(&self.registered),
            deregistered_clusters: sorted(&self.deregistered),
            skipped_clusters: sorted(&self.skipped),
            failed_clusters: failed,
            message: Some(message),
            observed_generation,
        }
    }

    /// Aggregate error if any cluster failed
    pub fn into_error(self) -> Option<Error> {
        if self.failures.is_empty() {
            None
        } else {
            Some(Error::PassFailed {
                failures: self.failures,
            })
        }
    }
}

/// Reconcile a Generator
///
/// Walks every CAPI Cluster in list order. With [`FailurePolicy::Isolate`]
/// each cluster is attempted and failures are reported together as
/// [`Error::PassFailed`]. With [`FailurePolicy::FailFast`] the pass stops at
/// the first failing cluster and returns that cluster's error.
///
/// # Returns
///
/// `Action::requeue(requeue_interval)` after a pass without failures.
#[instrument(
    skip(generator, ctx),
    fields(generator = %generator.name_any(), namespace = %generator.namespace().unwrap_or_default())
)]
pub async fn reconcile(generator: Arc<Generator>, ctx: Arc<Context>) -> Result<Action, Error> {
    info!("reconciling generator");

    let clusters = ctx.kube.list_clusters().await?;
    debug!(count = clusters.len(), "listed clusters");

    let mut report = PassReport::default();

    for cluster in &clusters {
        let key = format!("{}/{}", cluster.namespace_or_default(), cluster.name_any());
        match reconcile_cluster(&generator, cluster, &ctx).await {
            Ok(outcome) => report.record(key, outcome),
            Err(e) => {
                warn!(
                    cluster = %cluster.name_any(),
                    namespace = %cluster.namespace_or_default(),
                    phase = %cluster.phase(),
                    control_plane_ready = cluster.control_plane_ready(),
                    error = %e,
                    "cluster reconciliation failed"
                );
                report.fail(ClusterFailure {
                    cluster: cluster.name_any(),
                    namespace: cluster.namespace_or_default(),
                    message: e.to_string(),
                });

                if ctx.config.failure_policy == FailurePolicy::FailFast {
                    if let Err(status_err) = publish_status(&generator, &ctx, &report).await {
                        warn!(error = %status_err, "failed to update generator status");
                    }
                    return Err(e);
                }
            }
        }
    }

    if let Err(status_err) = publish_status(&generator, &ctx, &report).await {
        warn!(error = %status_err, "failed to update generator status");
    }

    if let Some(err) = report.into_error() {
        return Err(err);
    }

    info!(count = clusters.len(), "pass complete");
    Ok(Action::requeue(ctx.config.requeue_interval()))
}

/// Reconcile a single cluster for a Generator
async fn reconcile_cluster(
    generator: &Generator,
    cluster: &CapiCluster,
    ctx: &Context,
) -> Result<ClusterOutcome, Error> {
    let kube = ctx.kube.as_ref();
    let namespace = ctx.config.argocd_namespace.as_str();
    let lifecycle = cluster.lifecycle();
    debug!(
        cluster = %cluster.name_any(),
        phase = %cluster.phase(),
        control_plane_ready = cluster.control_plane_ready(),
        "reconciling cluster"
    );

    // Only a cluster on its way out may have lost its kubeconfig
    let bundle = match credentials::resolve(kube, cluster).await {
        Ok(bundle) => bundle,
        Err(e) if e.is_not_found() && lifecycle == ClusterLifecycle::Deleting => {
            debug!(cluster = %cluster.name_any(), "kubeconfig gone, nothing to clean up");
            return Ok(ClusterOutcome::Skipped);
        }
        Err(e) => return Err(e),
    };

    match lifecycle {
        ClusterLifecycle::Deleting => {
            let outcome = membership::deregister(kube, &bundle, namespace).await?;
            Ok(ClusterOutcome::Deregistered(outcome))
        }
        ClusterLifecycle::Active => {
            let registered = membership::register(kube, &bundle, cluster, namespace).await?;
            let bound = project::bind(kube, &bundle, generator, namespace).await?;
            Ok(ClusterOutcome::Registered(registered, bound))
        }
    }
}

/// Write the pass summary to the Generator, skipping unchanged statuses
async fn publish_status(
    generator: &Generator,
    ctx: &Context,
    report: &PassReport,
) -> Result<(), Error> {
    let status = report.to_status(generator.metadata.generation);
    if generator.status.as_ref() == Some(&status) {
        debug!("status unchanged, skipping update");
        return Ok(());
    }

    let name = generator.name_any();
    let namespace = generator.namespace().unwrap_or_default();
    ctx.kube
        .patch_generator_status(&name, &namespace, &status)
        .await
}

/// Error policy for the controller
///
/// Failed passes are retried after the configured error interval; the next
/// pass recomputes everything from scratch.
pub fn error_policy(generator: Arc<Generator>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        %error,
        generator = %generator.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    Action::requeue(ctx.config.error_requeue())
}
