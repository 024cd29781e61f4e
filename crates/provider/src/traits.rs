//! The `ProviderClient` trait — the contract the engine executes against.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{Invitation, Post, ProviderProfile, ReactionType};

/// Everything the campaign engine needs from the messaging provider.
///
/// `account_id` is always the provider-side id of the sender account the
/// call is made on behalf of. Implementations are stateless per call; the
/// engine never holds a lock across an invocation.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Open the profile identified by its public identifier, optionally
    /// notifying the member of the visit.
    async fn visit_profile(
        &self,
        account_id: &str,
        identifier: &str,
        notify: bool,
    ) -> Result<ProviderProfile, ProviderError>;

    /// Send a connection request with an attached note.
    async fn send_invitation(
        &self,
        account_id: &str,
        provider_id: &str,
        message: &str,
    ) -> Result<(), ProviderError>;

    /// Send a direct message, creating the chat if none exists yet.
    async fn start_or_continue_chat(
        &self,
        account_id: &str,
        provider_ids: &[String],
        text: &str,
    ) -> Result<(), ProviderError>;

    /// React to a feed post.
    async fn react_to_post(
        &self,
        account_id: &str,
        post_id: &str,
        reaction: ReactionType,
    ) -> Result<(), ProviderError>;

    /// Comment under a feed post.
    async fn comment_post(
        &self,
        account_id: &str,
        post_id: &str,
        text: &str,
    ) -> Result<(), ProviderError>;

    /// List a profile's posts from the last `last_days` days, newest first.
    async fn list_recent_posts(
        &self,
        account_id: &str,
        identifier: &str,
        last_days: u32,
        limit: u32,
    ) -> Result<Vec<Post>, ProviderError>;

    /// List connection requests the sender account has outstanding.
    async fn list_invitations_sent(
        &self,
        account_id: &str,
    ) -> Result<Vec<Invitation>, ProviderError>;

    /// Withdraw a previously sent connection request.
    async fn cancel_invitation(
        &self,
        account_id: &str,
        invitation_id: &str,
    ) -> Result<(), ProviderError>;

    /// Whether the sender and the profile are first-degree connections.
    async fn is_connected(
        &self,
        account_id: &str,
        identifier: &str,
    ) -> Result<bool, ProviderError>;
}
