//! Integration tests for the Generator CRD
//!
//! These tests check that the schema generated by the operator is accepted
//! by a real API server and that status writes land on the subresource.

use kube::api::{Api, DeleteParams, PostParams};

use cluster_register::controller::{KubeClient, KubeClientImpl};
use cluster_register::crd::{Generator, GeneratorSpec, GeneratorStatus};

use super::helpers::{ensure_test_cluster, ARGOCD_NAMESPACE};

/// Story: a platform team declares a Generator bound to their project
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_generator_round_trips_through_api_server() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<Generator> = Api::namespaced(client.clone(), ARGOCD_NAMESPACE);
    let name = "test-generator-crd";
    let _ = api.delete(name, &DeleteParams::default()).await;

    let generator = Generator::new(
        name,
        GeneratorSpec {
            app_project_name: Some("platform".to_string()),
        },
    );
    api.create(&PostParams::default(), &generator)
        .await
        .expect("failed to create generator");

    let fetched = api.get(name).await.expect("failed to get generator");
    assert_eq!(fetched.spec.target_project(), Some("platform"));
    assert!(fetched.status.is_none());

    let _ = api.delete(name, &DeleteParams::default()).await;
}

/// Story: the status written after a pass replaces the previous one entirely
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_status_patch_drops_stale_entries() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<Generator> = Api::namespaced(client.clone(), ARGOCD_NAMESPACE);
    let name = "test-generator-status";
    let _ = api.delete(name, &DeleteParams::default()).await;

    api.create(
        &PostParams::default(),
        &Generator::new(name, GeneratorSpec::default()),
    )
    .await
    .expect("failed to create generator");

    let kube = KubeClientImpl::new(client.clone());
    let first = GeneratorStatus {
        registered_clusters: vec!["default/a".to_string()],
        failed_clusters: vec!["default/b".to_string()],
        message: Some("1 registered, 0 deregistered, 0 skipped, 1 failed".to_string()),
        ..Default::default()
    };
    kube.patch_generator_status(name, ARGOCD_NAMESPACE, &first)
        .await
        .expect("first status patch");

    let second = GeneratorStatus {
        registered_clusters: vec!["default/a".to_string(), "default/b".to_string()],
        message: Some("2 registered, 0 deregistered, 0 skipped, 0 failed".to_string()),
        ..Default::default()
    };
    kube.patch_generator_status(name, ARGOCD_NAMESPACE, &second)
        .await
        .expect("second status patch");

    let status = api
        .get(name)
        .await
        .expect("failed to get generator")
        .status
        .expect("status present");
    assert_eq!(status, second);

    let _ = api.delete(name, &DeleteParams::default()).await;
}
