//! Credential resolution for CAPI clusters
//!
//! CAPI writes an admin kubeconfig for every workload cluster into a Secret
//! named `<cluster>-kubeconfig` (key `value`) next to the Cluster object.
//! This module reads that Secret and reduces the kubeconfig to the
//! credentials of its current context.

use std::fmt;

use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use serde::Deserialize;
use tracing::debug;

use crate::controller::KubeClient;
use crate::crd::CapiCluster;
use crate::{kubeconfig_secret_name, Error, KUBECONFIG_SECRET_KEY};

// =============================================================================
// Kubeconfig Document
// =============================================================================

/// Kubeconfig document (the subset needed to build Argo CD credentials)
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Kubeconfig {
    /// Named clusters
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    /// Named users
    #[serde(default)]
    pub users: Vec<NamedUser>,
    /// Named contexts
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    /// Context used when none is given explicitly
    #[serde(default)]
    pub current_context: Option<String>,
}

/// Cluster entry in a kubeconfig
#[derive(Debug, Deserialize)]
pub struct NamedCluster {
    /// Entry name
    pub name: String,
    /// Cluster connection details
    #[serde(default)]
    pub cluster: Option<ClusterEntry>,
}

/// Cluster connection details
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterEntry {
    /// API server URL
    #[serde(default)]
    pub server: Option<String>,
    /// Base64-encoded CA bundle
    #[serde(default)]
    pub certificate_authority_data: Option<String>,
}

/// User entry in a kubeconfig
#[derive(Debug, Deserialize)]
pub struct NamedUser {
    /// Entry name
    pub name: String,
    /// User credentials
    #[serde(default)]
    pub user: Option<UserEntry>,
}

/// User credentials
#[derive(Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserEntry {
    /// Base64-encoded client certificate
    #[serde(default)]
    pub client_certificate_data: Option<String>,
    /// Base64-encoded client key
    #[serde(default)]
    pub client_key_data: Option<String>,
}

impl fmt::Debug for UserEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserEntry")
            .field("client_certificate_data", &self.client_certificate_data)
            .field(
                "client_key_data",
                &self.client_key_data.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Context entry in a kubeconfig
#[derive(Debug, Deserialize)]
pub struct NamedContext {
    /// Entry name
    pub name: String,
    /// Cluster/user pairing
    #[serde(default)]
    pub context: Option<ContextEntry>,
}

/// Cluster/user pairing of a context
#[derive(Debug, Default, Deserialize)]
pub struct ContextEntry {
    /// Name of the cluster entry
    pub cluster: String,
    /// Name of the user entry
    #[serde(default)]
    pub user: Option<String>,
}

// =============================================================================
// Credential Bundle
// =============================================================================

/// Credentials of a kubeconfig's current context
///
/// This is everything Argo CD needs to reach the cluster. It is derived fresh
/// on every pass and never persisted by the operator itself.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    /// Name of the current context
    pub context_name: String,
    /// Cluster referenced by the current context; used as the Argo CD cluster name
    pub cluster_name: String,
    /// User referenced by the current context
    pub auth_name: String,
    /// API server URL
    pub server: String,
    /// Base64-encoded CA bundle
    pub ca_data: Option<String>,
    /// Base64-encoded client certificate
    pub cert_data: Option<String>,
    /// Base64-encoded client key
    pub key_data: Option<String>,
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("context_name", &self.context_name)
            .field("cluster_name", &self.cluster_name)
            .field("auth_name", &self.auth_name)
            .field("server", &self.server)
            .field("ca_data", &self.ca_data.is_some())
            .field("cert_data", &self.cert_data.is_some())
            .field("key_data", &self.key_data.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Kubeconfig {
    /// Parse a kubeconfig document (YAML or JSON)
    pub fn parse(payload: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| Error::credentials_unknown(format!("kubeconfig is not UTF-8: {}", e)))?;
        serde_yaml::from_str(text)
            .map_err(|e| Error::credentials_unknown(format!("failed to parse kubeconfig: {}", e)))
    }

    /// Reduce the kubeconfig to the credentials of its current context
    pub fn active_credentials(&self) -> Result<CredentialBundle, Error> {
        let context_name = self
            .current_context
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::credentials_unknown("kubeconfig has no current-context"))?;

        let context = self
            .contexts
            .iter()
            .find(|c| c.name == context_name)
            .and_then(|c| c.context.as_ref())
            .ok_or_else(|| {
                Error::credentials_unknown(format!("context {} not found", context_name))
            })?;

        let cluster_name = context.cluster.as_str();
        if cluster_name.is_empty() {
            return Err(Error::credentials_unknown(format!(
                "context {} has no cluster",
                context_name
            )));
        }
        let auth_name = context.user.as_deref().unwrap_or_default();

        let cluster = self
            .clusters
            .iter()
            .find(|c| c.name == cluster_name)
            .and_then(|c| c.cluster.as_ref())
            .ok_or_else(|| {
                Error::credentials_unknown(format!("cluster {} not found", cluster_name))
            })?;

        let server = cluster
            .server
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::credentials_unknown(format!("cluster {} has no server", cluster_name))
            })?;

        let user = self
            .users
            .iter()
            .find(|u| u.name == auth_name)
            .and_then(|u| u.user.as_ref())
            .ok_or_else(|| Error::credentials_unknown(format!("user {} not found", auth_name)))?;

        Ok(CredentialBundle {
            context_name: context_name.to_string(),
            cluster_name: cluster_name.to_string(),
            auth_name: auth_name.to_string(),
            server: server.to_string(),
            ca_data: cluster.certificate_authority_data.clone(),
            cert_data: user.client_certificate_data.clone(),
            key_data: user.client_key_data.clone(),
        })
    }
}

// =============================================================================
// Pure Functions (unit-testable)
// =============================================================================

/// Decode a kubeconfig payload into the credentials of its current context
pub fn decode_kubeconfig(payload: &[u8]) -> Result<CredentialBundle, Error> {
    Kubeconfig::parse(payload)?.active_credentials()
}

/// Extract and decode the kubeconfig held by a CAPI kubeconfig Secret
pub fn bundle_from_secret(secret: &Secret) -> Result<CredentialBundle, Error> {
    let name = secret.name_any();
    let payload = secret
        .data
        .as_ref()
        .and_then(|d| d.get(KUBECONFIG_SECRET_KEY))
        .ok_or_else(|| {
            Error::credentials_unknown(format!(
                "secret {} has no '{}' key",
                name, KUBECONFIG_SECRET_KEY
            ))
        })?;
    decode_kubeconfig(&payload.0)
}

// =============================================================================
// K8s API Operations
// =============================================================================

/// Resolve the credential bundle of a CAPI cluster
///
/// # Returns
///
/// * `Ok(bundle)` - credentials of the kubeconfig's current context
/// * `Err(Error::NotFound)` - the kubeconfig Secret does not exist (yet, or any more)
/// * `Err(Error::Credentials)` - the Secret exists but its payload is unusable
/// * `Err(Error::Kube)` - the API call failed
pub async fn resolve(
    client: &dyn KubeClient,
    cluster: &CapiCluster,
) -> Result<CredentialBundle, Error> {
    let cluster_name = cluster.name_any();
    let namespace = cluster.namespace_or_default();
    let secret_name = kubeconfig_secret_name(&cluster_name);

    let secret = client
        .get_secret(&secret_name, &namespace)
        .await?
        .ok_or_else(|| Error::not_found("Secret", &namespace, &secret_name))?;

    let bundle = bundle_from_secret(&secret).map_err(|e| e.with_cluster(&cluster_name))?;

    debug!(
        cluster = %cluster_name,
        context = %bundle.context_name,
        server = %bundle.server,
        "resolved cluster credentials"
    );

    Ok(bundle)
}
