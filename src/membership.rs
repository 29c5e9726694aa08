//! Argo CD cluster membership records
//!
//! Argo CD discovers clusters through Secrets labelled
//! `argocd.argoproj.io/secret-type: cluster` in its own namespace. This module
//! builds that Secret from a [`CredentialBundle`] and keeps it in place with
//! create-or-replace and delete calls that are safe to repeat.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::controller::KubeClient;
use crate::credentials::CredentialBundle;
use crate::crd::CapiCluster;
use crate::{cluster_secret_name, Error};

/// Label marking the Secret as part of the Argo CD installation
pub const PART_OF_LABEL: &str = "app.kubernetes.io/part-of";

/// Label Argo CD uses to discover cluster Secrets
pub const SECRET_TYPE_LABEL: &str = "argocd.argoproj.io/secret-type";

/// Label carrying the registered cluster's name
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Annotation recording the CAPI Cluster revision the record was built from
pub const REVISION_ANNOTATION: &str = "cluster.x-k8s.io/revision";

/// Argo CD cluster connection settings stored under the `config` key
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    /// TLS client settings
    pub tls_client_config: TlsClientConfig,
}

/// TLS client settings of an Argo CD cluster
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TlsClientConfig {
    /// Skip server certificate verification
    pub insecure: bool,
    /// Base64-encoded CA bundle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_data: Option<String>,
    /// Base64-encoded client certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_data: Option<String>,
    /// Base64-encoded client key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_data: Option<String>,
}

impl std::fmt::Debug for TlsClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsClientConfig")
            .field("insecure", &self.insecure)
            .field("ca_data", &self.ca_data.is_some())
            .field("cert_data", &self.cert_data.is_some())
            .field("key_data", &self.key_data.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl From<&CredentialBundle> for ClusterConfig {
    fn from(bundle: &CredentialBundle) -> Self {
        Self {
            tls_client_config: TlsClientConfig {
                insecure: false,
                ca_data: bundle.ca_data.clone(),
                cert_data: bundle.cert_data.clone(),
                key_data: bundle.key_data.clone(),
            },
        }
    }
}

/// Result of [`register`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The record did not exist and was created
    Created,
    /// The record existed and was fully replaced
    Replaced,
}

/// Result of [`deregister`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeregisterOutcome {
    /// The record existed and was deleted
    Deleted,
    /// There was nothing to delete
    AlreadyAbsent,
}

// =============================================================================
// Pure Functions (unit-testable)
// =============================================================================

/// Labels carried by every cluster Secret
pub fn record_labels(cluster_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (PART_OF_LABEL.to_string(), "argocd".to_string()),
        (SECRET_TYPE_LABEL.to_string(), "cluster".to_string()),
        (CLUSTER_NAME_LABEL.to_string(), cluster_name.to_string()),
    ])
}

/// Build the desired Argo CD cluster Secret
///
/// The output depends only on its inputs, so two passes over an unchanged
/// cluster produce identical records.
pub fn build_cluster_secret(
    bundle: &CredentialBundle,
    revision: &str,
    namespace: &str,
) -> Result<Secret, Error> {
    let config = serde_json::to_string(&ClusterConfig::from(bundle)).map_err(|e| {
        Error::serialization(format!(
            "failed to encode tlsClientConfig for {}: {}",
            bundle.cluster_name, e
        ))
    })?;

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(cluster_secret_name(&bundle.cluster_name)),
            namespace: Some(namespace.to_string()),
            labels: Some(record_labels(&bundle.cluster_name)),
            annotations: Some(BTreeMap::from([(
                REVISION_ANNOTATION.to_string(),
                revision.to_string(),
            )])),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        string_data: Some(BTreeMap::from([
            ("name".to_string(), bundle.cluster_name.clone()),
            ("server".to_string(), bundle.server.clone()),
            ("config".to_string(), config),
        ])),
        ..Default::default()
    })
}

// =============================================================================
// K8s API Operations
// =============================================================================

/// Create or fully replace the Argo CD cluster Secret for a cluster
///
/// Replace carries no resourceVersion precondition: when two passes race,
/// the last writer wins and the next pass converges both to the same record.
pub async fn register(
    client: &dyn KubeClient,
    bundle: &CredentialBundle,
    cluster: &CapiCluster,
    namespace: &str,
) -> Result<RegisterOutcome, Error> {
    let revision = cluster.revision();
    let secret = build_cluster_secret(bundle, &revision, namespace)?;

    if client.create_secret(&secret).await? {
        info!(
            cluster = %bundle.cluster_name,
            namespace = %namespace,
            revision = %revision,
            "created cluster secret"
        );
        return Ok(RegisterOutcome::Created);
    }

    client.replace_secret(&secret).await?;
    debug!(
        cluster = %bundle.cluster_name,
        namespace = %namespace,
        revision = %revision,
        "replaced cluster secret"
    );
    Ok(RegisterOutcome::Replaced)
}

/// Delete the Argo CD cluster Secret for a cluster
///
/// An already absent Secret is not an error.
pub async fn deregister(
    client: &dyn KubeClient,
    bundle: &CredentialBundle,
    namespace: &str,
) -> Result<DeregisterOutcome, Error> {
    let name = cluster_secret_name(&bundle.cluster_name);

    if client.delete_secret(&name, namespace).await? {
        info!(cluster = %bundle.cluster_name, namespace = %namespace, "deleted cluster secret");
        Ok(DeregisterOutcome::Deleted)
    } else {
        debug!(cluster = %bundle.cluster_name, "cluster secret already absent");
        Ok(DeregisterOutcome::AlreadyAbsent)
    }
}
