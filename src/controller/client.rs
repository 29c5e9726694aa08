//! Kubernetes access used by a reconciliation pass
//!
//! Every read and write the operator performs goes through [`KubeClient`] so
//! that passes can be exercised against mocks.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource};

#[cfg(test)]
use mockall::automock;

use crate::crd::{AppProject, CapiCluster, Generator, GeneratorStatus};
use crate::{Error, FIELD_MANAGER};

/// Trait abstracting Kubernetes client operations for a Generator pass
///
/// Absence is reported in-band (`Option`/`bool`) rather than as an error so
/// callers decide what "not found" means in their context.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// List CAPI Clusters in all namespaces
    async fn list_clusters(&self) -> Result<Vec<CapiCluster>, Error>;

    /// Get a Secret, `None` if it does not exist
    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<Secret>, Error>;

    /// Create a Secret
    ///
    /// # Returns
    ///
    /// `true` if created, `false` if a Secret with that name already exists
    async fn create_secret(&self, secret: &Secret) -> Result<bool, Error>;

    /// Replace an existing Secret with the given object
    async fn replace_secret(&self, secret: &Secret) -> Result<(), Error>;

    /// Delete a Secret
    ///
    /// # Returns
    ///
    /// `true` if deleted, `false` if it did not exist
    async fn delete_secret(&self, name: &str, namespace: &str) -> Result<bool, Error>;

    /// Get an AppProject, `None` if it does not exist
    async fn get_app_project(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<AppProject>, Error>;

    /// Replace an AppProject with the given object
    async fn replace_app_project(&self, project: &AppProject) -> Result<(), Error>;

    /// Write the status of a Generator
    async fn patch_generator_status(
        &self,
        name: &str,
        namespace: &str,
        status: &GeneratorStatus,
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn object_name<K: Resource>(obj: &K, kind: &str) -> Result<(String, String), Error> {
    let meta = obj.meta();
    match (meta.name.clone(), meta.namespace.clone()) {
        (Some(name), Some(namespace)) => Ok((name, namespace)),
        _ => Err(Error::serialization(format!(
            "{} is missing metadata.name or metadata.namespace",
            kind
        ))),
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn list_clusters(&self) -> Result<Vec<CapiCluster>, Error> {
        let api: Api<CapiCluster> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<Secret>, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(secret) => Ok(Some(secret)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_secret(&self, secret: &Secret) -> Result<bool, Error> {
        let (_, namespace) = object_name(secret, "Secret")?;
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        match api.create(&PostParams::default(), secret).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<(), Error> {
        let (name, namespace) = object_name(secret, "Secret")?;
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&name, &PostParams::default(), secret).await?;
        Ok(())
    }

    async fn delete_secret(&self, name: &str, namespace: &str) -> Result<bool, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_app_project(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<AppProject>, Error> {
        let api: Api<AppProject> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(project) => Ok(Some(project)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn replace_app_project(&self, project: &AppProject) -> Result<(), Error> {
        let (name, namespace) = object_name(project, "AppProject")?;
        let api: Api<AppProject> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&name, &PostParams::default(), project).await?;
        Ok(())
    }

    async fn patch_generator_status(
        &self,
        name: &str,
        namespace: &str,
        status: &GeneratorStatus,
    ) -> Result<(), Error> {
        let api: Api<Generator> = Api::namespaced(self.client.clone(), namespace);

        // Apply (rather than merge) so list entries dropped since the last
        // pass are removed from the stored status.
        let status_patch = serde_json::json!({
            "apiVersion": Generator::api_version(&()),
            "kind": Generator::kind(&()),
            "metadata": { "name": name, "namespace": namespace },
            "status": status
        });

        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&status_patch),
        )
        .await?;

        Ok(())
    }
}
