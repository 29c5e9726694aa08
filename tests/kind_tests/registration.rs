//! Integration tests for registration passes
//!
//! A pass sees every CAPI Cluster in the test cluster, so the whole
//! provision-bind-delete journey is told as a single story to keep
//! concurrently running tests from observing each other's clusters.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, PostParams};
use kube::runtime::controller::Action;

use cluster_register::config::ControllerConfig;
use cluster_register::controller::{reconcile, Context};
use cluster_register::crd::{AppProject, ApplicationDestination, Generator, GeneratorSpec};

use super::helpers::{
    cleanup, ensure_test_cluster, seed_app_project, seed_capi_cluster, set_phase,
    ARGOCD_NAMESPACE,
};

const CLUSTER: &str = "kind-workload";
const CLUSTER_NAMESPACE: &str = "default";
const PROJECT: &str = "kind-platform";

/// Story: a workload cluster is registered, bound once, and removed on deletion
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_cluster_registration_lifecycle() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    cleanup(&client, CLUSTER, CLUSTER_NAMESPACE, PROJECT).await;

    seed_capi_cluster(&client, CLUSTER, CLUSTER_NAMESPACE, "Provisioned")
        .await
        .expect("failed to seed CAPI cluster");
    seed_app_project(&client, PROJECT)
        .await
        .expect("failed to seed AppProject");

    let generators: Api<Generator> = Api::namespaced(client.clone(), ARGOCD_NAMESPACE);
    let _ = generators
        .delete("kind-generator", &DeleteParams::default())
        .await;
    let generator = generators
        .create(
            &PostParams::default(),
            &Generator::new(
                "kind-generator",
                GeneratorSpec {
                    app_project_name: Some(PROJECT.to_string()),
                },
            ),
        )
        .await
        .expect("failed to create generator");
    let generator = Arc::new(generator);

    let config = ControllerConfig {
        argocd_namespace: ARGOCD_NAMESPACE.to_string(),
        ..Default::default()
    };
    let ctx = Arc::new(Context::builder(client.clone()).config(config).build());

    // Two passes: the record is created once and the project bound once
    for _ in 0..2 {
        let action = reconcile(generator.clone(), ctx.clone())
            .await
            .expect("pass should succeed");
        assert_eq!(action, Action::requeue(Duration::from_secs(60)));
    }

    let secrets: Api<Secret> = Api::namespaced(client.clone(), ARGOCD_NAMESPACE);
    let record = secrets
        .get(&format!("{CLUSTER}-cluster-secret"))
        .await
        .expect("cluster secret should exist");
    let labels = record.metadata.labels.clone().unwrap_or_default();
    assert_eq!(
        labels.get("argocd.argoproj.io/secret-type").map(String::as_str),
        Some("cluster")
    );
    let server = record
        .data
        .as_ref()
        .and_then(|d| d.get("server"))
        .map(|b| String::from_utf8_lossy(&b.0).to_string());
    assert_eq!(
        server.as_deref(),
        Some("https://kind-workload.example:6443")
    );

    let projects: Api<AppProject> = Api::namespaced(client.clone(), ARGOCD_NAMESPACE);
    let project = projects.get(PROJECT).await.expect("project exists");
    assert_eq!(
        project.spec.destinations,
        vec![ApplicationDestination::named(CLUSTER)]
    );

    let status = generators
        .get("kind-generator")
        .await
        .expect("generator exists")
        .status
        .expect("status written");
    assert!(status
        .registered_clusters
        .contains(&format!("{CLUSTER_NAMESPACE}/{CLUSTER}")));

    // Deletion removes the record
    set_phase(&client, CLUSTER, CLUSTER_NAMESPACE, "Deleting")
        .await
        .expect("failed to mark cluster deleting");
    reconcile(generator.clone(), ctx.clone())
        .await
        .expect("deregister pass should succeed");

    let gone = secrets.get_opt(&format!("{CLUSTER}-cluster-secret")).await;
    assert!(matches!(gone, Ok(None)), "cluster secret should be deleted");

    cleanup(&client, CLUSTER, CLUSTER_NAMESPACE, PROJECT).await;
    let _ = generators
        .delete("kind-generator", &DeleteParams::default())
        .await;
}
