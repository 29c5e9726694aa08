//! Generator controller
//!
//! [`reconcile`] runs one pass for a Generator; [`KubeClient`] is the seam
//! through which every pass talks to the API server.

mod client;
mod generator;

pub use client::{KubeClient, KubeClientImpl};
pub use generator::{
    error_policy, reconcile, ClusterOutcome, Context, ContextBuilder, PassReport,
};

#[cfg(test)]
pub(crate) use client::MockKubeClient;
