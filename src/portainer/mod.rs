//! Portainer control-plane collaborator.
//!
//! - `client` - HTTP client for the Portainer REST API
//! - `types` - Wire types for stacks and stack files
//!
//! Tools only see the [`ControlPlane`] trait, so tests can swap in stubs.

pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use client::PortainerClient;
pub use types::{Stack, StackFile};

/// The narrow interface tool handlers use to reach the control plane.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// List every stack.
    async fn list_stacks(&self) -> Result<Vec<Stack>>;

    /// Fetch the compose file of one stack. `None` when there is no content.
    async fn get_stack_file(&self, stack_id: i64) -> Result<Option<String>>;
}
