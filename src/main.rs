//! cluster-register - registers Cluster API clusters with Argo CD

use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};

use cluster_register::config::ControllerConfig;
use cluster_register::controller::{error_policy, reconcile, Context};
use cluster_register::crd::{CapiCluster, Generator};
use cluster_register::retry::{retry_with_backoff, RetryConfig};
use cluster_register::telemetry::init_tracing;
use cluster_register::FIELD_MANAGER;

/// cluster-register - keeps Argo CD cluster Secrets in sync with Cluster API
#[derive(Parser, Debug)]
#[command(name = "cluster-register", version, about, long_about = None)]
struct Cli {
    /// Print the Generator CRD manifest and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    config: ControllerConfig,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the Generator controller (default mode)
    ///
    /// Installs the Generator CRD, then reconciles every Generator on change,
    /// on every CAPI Cluster change, and on a fixed interval.
    Controller,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&Generator::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    let config = match cli.command {
        Some(Commands::Controller) | None => cli.config,
    };

    init_tracing(config.log_format)?;
    config.validate()?;

    run_controller(config).await
}

/// Ensure the Generator CRD is installed
///
/// The operator installs its own CRD on startup using server-side apply so
/// the schema always matches the running binary.
async fn ensure_crd_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();
    let crd = Generator::crd();
    let name = crd.metadata.name.clone().unwrap_or_default();

    tracing::info!(crd = %name, "Installing Generator CRD...");
    let (crds, name, params, crd) = (&crds, name.as_str(), &params, &crd);
    retry_with_backoff(
        &RetryConfig::with_max_attempts(10),
        "install_crd",
        move || async move { crds.patch(name, params, &Patch::Apply(crd)).await },
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install Generator CRD: {}", e))?;

    tracing::info!("Generator CRD installed/updated");
    Ok(())
}

/// Run the Generator controller until SIGTERM/SIGINT
async fn run_controller(config: ControllerConfig) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crd_installed(&client).await?;

    let watcher_config = WatcherConfig::default().timeout(config.watch_timeout_secs);
    tracing::info!(
        argocd_namespace = %config.argocd_namespace,
        requeue_secs = config.requeue_interval_secs,
        failure_policy = ?config.failure_policy,
        "Starting Generator controller"
    );

    let ctx = Arc::new(Context::builder(client.clone()).config(config).build());
    let generators: Api<Generator> = Api::all(client.clone());
    let clusters: Api<CapiCluster> = Api::all(client);

    let controller = Controller::new(generators, watcher_config.clone());
    let generator_store = controller.store();

    controller
        // Any CAPI Cluster change is relevant to every Generator
        .watches(clusters, watcher_config, move |cluster| {
            tracing::debug!(
                cluster = %cluster.metadata.name.as_deref().unwrap_or_default(),
                "Cluster changed, triggering generators"
            );
            generator_store
                .state()
                .iter()
                .map(|generator| ObjectRef::from_obj(generator.as_ref()))
                .collect::<Vec<_>>()
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    tracing::debug!(generator = %obj.name, ?action, "Reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("Controller shut down");
    Ok(())
}
