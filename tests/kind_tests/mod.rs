//! Integration tests for cluster-register
//!
//! # Test Organization
//!
//! - `crd_operations`: the Generator CRD as served by a real API server
//! - `registration`: full passes against real Secrets and AppProjects
//!
//! CAPI and Argo CD are not installed; their CRDs are stood in for by the
//! typed views the operator uses, which is enough for the API server to store
//! Clusters and AppProjects.

mod crd_operations;
mod helpers;
mod registration;
