//! AppProject destination binding
//!
//! A Generator may name an Argo CD AppProject. Every cluster registered on
//! its behalf is added to that project's destination list by name, once.

use kube::ResourceExt;
use tracing::{debug, info};

use crate::controller::KubeClient;
use crate::credentials::CredentialBundle;
use crate::crd::{AppProject, ApplicationDestination, Generator};
use crate::Error;

/// Result of [`bind`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindOutcome {
    /// The Generator names no AppProject
    Skipped,
    /// The cluster already was a destination; nothing was written
    AlreadyBound,
    /// The cluster was appended and the AppProject replaced
    Bound,
}

/// Add a named destination unless one with that name already exists
///
/// Returns true if the destination list changed.
pub fn add_destination(project: &mut AppProject, cluster_name: &str) -> bool {
    if project.spec.has_destination_named(cluster_name) {
        return false;
    }
    project
        .spec
        .destinations
        .push(ApplicationDestination::named(cluster_name));
    true
}

/// Ensure the Generator's AppProject lists the cluster as a destination
///
/// The AppProject is looked up by the Generator's `appProjectName` in the
/// Argo CD namespace. A missing AppProject is an error; the operator never
/// creates projects. The replace carries the resourceVersion that was read,
/// so a concurrent writer makes it fail with a conflict and the cluster is
/// bound again on the next pass.
pub async fn bind(
    client: &dyn KubeClient,
    bundle: &CredentialBundle,
    generator: &Generator,
    namespace: &str,
) -> Result<BindOutcome, Error> {
    let Some(project_name) = generator.spec.target_project() else {
        debug!(generator = %generator.name_any(), "no appProjectName, skipping binding");
        return Ok(BindOutcome::Skipped);
    };

    let mut project = client
        .get_app_project(project_name, namespace)
        .await?
        .ok_or_else(|| Error::not_found("AppProject", namespace, project_name))?;

    if !add_destination(&mut project, &bundle.cluster_name) {
        debug!(
            cluster = %bundle.cluster_name,
            project = %project_name,
            "cluster already a project destination"
        );
        return Ok(BindOutcome::AlreadyBound);
    }

    client.replace_app_project(&project).await?;
    info!(
        cluster = %bundle.cluster_name,
        project = %project_name,
        "added cluster to project destinations"
    );
    Ok(BindOutcome::Bound)
}
