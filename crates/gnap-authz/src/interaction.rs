//! The login and consent collaborator.

use async_trait::async_trait;
use gnap_authz_core::{ConsentResult, InteractRequest, InteractResponse};

use crate::error::InteractionError;

/// Drives resource-owner login and consent outside the protocol core.
#[async_trait]
pub trait InteractionHandler: Send + Sync {
    /// Describe how the client should start the interaction.
    async fn prepare_interaction(
        &self,
        request: &InteractRequest,
    ) -> Result<InteractResponse, InteractionError>;

    /// Fetch the outcome of a finished interaction by its reference.
    async fn query_interaction(&self, interact_ref: &str) -> Result<ConsentResult, InteractionError>;
}
