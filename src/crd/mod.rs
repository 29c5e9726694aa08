//! Custom Resource Definitions used by the operator
//!
//! [`Generator`] is owned by this operator. [`CapiCluster`] and [`AppProject`]
//! are typed views of resources owned by Cluster API and Argo CD.

mod appproject;
mod cluster;
mod generator;

pub use appproject::{AppProject, AppProjectSpec, AppProjectStatus, ApplicationDestination};
pub use cluster::{CapiCluster, CapiClusterSpec, CapiClusterStatus, ClusterLifecycle, ClusterPhase};
pub use generator::{Generator, GeneratorSpec, GeneratorStatus};
