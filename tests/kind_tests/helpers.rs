//! Test helpers for integration tests
//!
//! Provides utilities for managing the kind cluster and seeding the objects
//! CAPI and Argo CD would normally own.

use std::collections::BTreeMap;
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, ObjectMeta, Patch, PatchParams, PostParams};
use kube::{Client, Config, CustomResourceExt};
use tokio::time::sleep;

use cluster_register::crd::{AppProject, AppProjectSpec, CapiCluster, Generator};

/// Name of the kind cluster used for integration tests
pub const TEST_CLUSTER_NAME: &str = "cluster-register-test";

/// Namespace standing in for the Argo CD installation
pub const ARGOCD_NAMESPACE: &str = "argocd";

/// Field manager for fixtures
const TEST_MANAGER: &str = "cluster-register-tests";

/// Global lock to ensure cluster is created only once
static CLUSTER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Check if a kind cluster with the given name exists
pub fn kind_cluster_exists(name: &str) -> bool {
    let output = Command::new("kind")
        .args(["get", "clusters"])
        .output()
        .expect("failed to run kind");

    let clusters = String::from_utf8_lossy(&output.stdout);
    clusters.lines().any(|line| line.trim() == name)
}

/// Create a kind cluster for testing
pub fn create_kind_cluster(name: &str) -> Result<(), String> {
    if kind_cluster_exists(name) {
        println!("Kind cluster '{name}' already exists, reusing it");
        return Ok(());
    }

    println!("Creating kind cluster '{name}'...");
    let output = Command::new("kind")
        .args(["create", "cluster", "--name", name, "--wait", "60s"])
        .output()
        .map_err(|e| format!("failed to run kind: {e}"))?;

    if !output.status.success() {
        return Err(format!(
            "failed to create kind cluster: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    println!("Kind cluster '{name}' created successfully");
    Ok(())
}

/// Install the Generator CRD plus stand-ins for the CAPI and Argo CD CRDs
///
/// Server-side apply makes this safe to call from every test.
pub async fn install_crds(client: &Client) -> Result<(), kube::Error> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(TEST_MANAGER).force();

    crds.patch(
        "generators.cluster.argoproj.io",
        &params,
        &Patch::Apply(&Generator::crd()),
    )
    .await?;

    // A real CAPI or Argo CD installation wins over the stand-ins
    for crd in [CapiCluster::crd(), AppProject::crd()] {
        let name = crd.metadata.name.clone().unwrap_or_default();
        match crds.get(&name).await {
            Ok(_) => continue,
            Err(kube::Error::Api(e)) if e.code == 404 => {}
            Err(e) => return Err(e),
        }
        crds.patch(&name, &params, &Patch::Apply(&crd)).await?;
    }

    // Wait for CRDs to be established
    sleep(Duration::from_secs(2)).await;
    Ok(())
}

/// Create a Kubernetes client connected to the test cluster
pub async fn create_test_client() -> Result<Client, String> {
    let context_name = format!("kind-{TEST_CLUSTER_NAME}");

    let config = Config::from_kubeconfig(&kube::config::KubeConfigOptions {
        context: Some(context_name),
        ..Default::default()
    })
    .await
    .map_err(|e| format!("failed to load kubeconfig: {e}"))?;

    Client::try_from(config).map_err(|e| format!("failed to create client: {e}"))
}

/// Ensure the test cluster is ready with CRDs and the argocd namespace
///
/// Returns a fresh Client for each call.
pub async fn ensure_test_cluster() -> Result<Client, String> {
    let cluster_result = CLUSTER_INIT.get_or_init(|| create_kind_cluster(TEST_CLUSTER_NAME));
    cluster_result.clone()?;

    let client = create_test_client().await?;
    install_crds(&client)
        .await
        .map_err(|e| format!("failed to install CRDs: {e}"))?;

    let namespaces: Api<Namespace> = Api::all(client.clone());
    let ns = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": { "name": ARGOCD_NAMESPACE }
    });
    namespaces
        .patch(
            ARGOCD_NAMESPACE,
            &PatchParams::apply(TEST_MANAGER).force(),
            &Patch::Apply(&ns),
        )
        .await
        .map_err(|e| format!("failed to create argocd namespace: {e}"))?;

    Ok(client)
}

/// Kubeconfig in the shape CAPI generates for a workload cluster
pub fn capi_kubeconfig(cluster: &str, server: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: Config
clusters:
- name: {cluster}
  cluster:
    server: {server}
    certificate-authority-data: Q0EtREFUQQ==
contexts:
- name: {cluster}-admin@{cluster}
  context:
    cluster: {cluster}
    user: {cluster}-admin
current-context: {cluster}-admin@{cluster}
users:
- name: {cluster}-admin
  user:
    client-certificate-data: Q0VSVC1EQVRB
    client-key-data: S0VZLURBVEE=
"#
    )
}

/// Create a CAPI Cluster with the given phase and its kubeconfig Secret
pub async fn seed_capi_cluster(
    client: &Client,
    name: &str,
    namespace: &str,
    phase: &str,
) -> Result<CapiCluster, kube::Error> {
    let clusters: Api<CapiCluster> = Api::namespaced(client.clone(), namespace);
    let cluster = CapiCluster::new(name, Default::default());
    clusters.create(&PostParams::default(), &cluster).await?;
    let cluster = set_phase(client, name, namespace, phase).await?;

    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(format!("{name}-kubeconfig")),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            "value".to_string(),
            ByteString(capi_kubeconfig(name, &format!("https://{name}.example:6443")).into_bytes()),
        )])),
        ..Default::default()
    };
    secrets.create(&PostParams::default(), &secret).await?;

    Ok(cluster)
}

/// Move a CAPI Cluster to a new phase through its status subresource
pub async fn set_phase(
    client: &Client,
    name: &str,
    namespace: &str,
    phase: &str,
) -> Result<CapiCluster, kube::Error> {
    let clusters: Api<CapiCluster> = Api::namespaced(client.clone(), namespace);
    clusters
        .patch_status(
            name,
            &PatchParams::default(),
            &Patch::Merge(serde_json::json!({ "status": { "phase": phase } })),
        )
        .await
}

/// Create an empty AppProject in the argocd namespace
pub async fn seed_app_project(client: &Client, name: &str) -> Result<AppProject, kube::Error> {
    let projects: Api<AppProject> = Api::namespaced(client.clone(), ARGOCD_NAMESPACE);
    let mut project = AppProject::new(name, AppProjectSpec::default());
    project.metadata.namespace = Some(ARGOCD_NAMESPACE.to_string());
    projects.create(&PostParams::default(), &project).await
}

/// Best-effort removal of everything a registration story created
pub async fn cleanup(client: &Client, cluster: &str, namespace: &str, project: &str) {
    let clusters: Api<CapiCluster> = Api::namespaced(client.clone(), namespace);
    let _ = clusters.delete(cluster, &DeleteParams::default()).await;

    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let _ = secrets
        .delete(&format!("{cluster}-kubeconfig"), &DeleteParams::default())
        .await;

    let argocd_secrets: Api<Secret> = Api::namespaced(client.clone(), ARGOCD_NAMESPACE);
    let _ = argocd_secrets
        .delete(&format!("{cluster}-cluster-secret"), &DeleteParams::default())
        .await;

    let projects: Api<AppProject> = Api::namespaced(client.clone(), ARGOCD_NAMESPACE);
    let _ = projects.delete(project, &DeleteParams::default()).await;
}
