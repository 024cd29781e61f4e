//! `MockProvider` — a scripted test double for [`ProviderClient`].
//!
//! Records every call it receives and answers from in-memory fixtures, so
//! engine tests run without a live provider session.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ErrorCode, ProviderError};
use crate::traits::ProviderClient;
use crate::types::{Invitation, Post, ProviderProfile, ReactionType};

/// One recorded provider call, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    VisitProfile { identifier: String },
    SendInvitation { provider_id: String, message: String },
    Chat { provider_ids: Vec<String>, text: String },
    ReactToPost { post_id: String, reaction: ReactionType },
    CommentPost { post_id: String, text: String },
    ListRecentPosts { identifier: String, last_days: u32 },
    ListInvitationsSent,
    CancelInvitation { invitation_id: String },
    IsConnected { identifier: String },
}

#[derive(Default)]
struct State {
    profiles: HashMap<String, ProviderProfile>,
    connected: HashSet<String>,
    posts: Vec<Post>,
    invitations: Vec<Invitation>,
    invitation_error: Option<ProviderError>,
}

/// Scripted provider double.
#[derive(Default)]
pub struct MockProvider {
    state: Mutex<State>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canned profile for `visit_profile(identifier)`.
    pub fn with_profile(self, identifier: &str, profile: ProviderProfile) -> Self {
        self.state.lock().unwrap().profiles.insert(identifier.to_owned(), profile);
        self
    }

    /// Make `is_connected(identifier)` answer `true`.
    pub fn set_connected(&self, identifier: &str) {
        self.state.lock().unwrap().connected.insert(identifier.to_owned());
    }

    pub fn with_posts(self, posts: Vec<Post>) -> Self {
        self.state.lock().unwrap().posts = posts;
        self
    }

    pub fn with_invitations(self, invitations: Vec<Invitation>) -> Self {
        self.state.lock().unwrap().invitations = invitations;
        self
    }

    /// Make every `send_invitation` fail with the given code.
    pub fn failing_invitations(self, code: ErrorCode, detail: &str) -> Self {
        self.state.lock().unwrap().invitation_error =
            Some(ProviderError::new(code, detail));
        self
    }

    /// All calls seen so far, in order.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&ProviderCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// Profile returned when no fixture was registered: derived from the
    /// identifier so tests don't need to script every lead.
    fn synthetic_profile(identifier: &str) -> ProviderProfile {
        ProviderProfile {
            provider_id: format!("urn:member:{identifier}"),
            public_identifier: Some(identifier.to_owned()),
            ..ProviderProfile::default()
        }
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    async fn visit_profile(
        &self,
        _account_id: &str,
        identifier: &str,
        _notify: bool,
    ) -> Result<ProviderProfile, ProviderError> {
        self.record(ProviderCall::VisitProfile { identifier: identifier.to_owned() });
        let state = self.state.lock().unwrap();
        Ok(state
            .profiles
            .get(identifier)
            .cloned()
            .unwrap_or_else(|| Self::synthetic_profile(identifier)))
    }

    async fn send_invitation(
        &self,
        _account_id: &str,
        provider_id: &str,
        message: &str,
    ) -> Result<(), ProviderError> {
        self.record(ProviderCall::SendInvitation {
            provider_id: provider_id.to_owned(),
            message: message.to_owned(),
        });
        let state = self.state.lock().unwrap();
        match &state.invitation_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn start_or_continue_chat(
        &self,
        _account_id: &str,
        provider_ids: &[String],
        text: &str,
    ) -> Result<(), ProviderError> {
        self.record(ProviderCall::Chat {
            provider_ids: provider_ids.to_vec(),
            text: text.to_owned(),
        });
        Ok(())
    }

    async fn react_to_post(
        &self,
        _account_id: &str,
        post_id: &str,
        reaction: ReactionType,
    ) -> Result<(), ProviderError> {
        self.record(ProviderCall::ReactToPost { post_id: post_id.to_owned(), reaction });
        Ok(())
    }

    async fn comment_post(
        &self,
        _account_id: &str,
        post_id: &str,
        text: &str,
    ) -> Result<(), ProviderError> {
        self.record(ProviderCall::CommentPost {
            post_id: post_id.to_owned(),
            text: text.to_owned(),
        });
        Ok(())
    }

    async fn list_recent_posts(
        &self,
        _account_id: &str,
        identifier: &str,
        last_days: u32,
        limit: u32,
    ) -> Result<Vec<Post>, ProviderError> {
        self.record(ProviderCall::ListRecentPosts {
            identifier: identifier.to_owned(),
            last_days,
        });
        let state = self.state.lock().unwrap();
        Ok(state.posts.iter().take(limit as usize).cloned().collect())
    }

    async fn list_invitations_sent(
        &self,
        _account_id: &str,
    ) -> Result<Vec<Invitation>, ProviderError> {
        self.record(ProviderCall::ListInvitationsSent);
        Ok(self.state.lock().unwrap().invitations.clone())
    }

    async fn cancel_invitation(
        &self,
        _account_id: &str,
        invitation_id: &str,
    ) -> Result<(), ProviderError> {
        self.record(ProviderCall::CancelInvitation {
            invitation_id: invitation_id.to_owned(),
        });
        let mut state = self.state.lock().unwrap();
        state.invitations.retain(|inv| inv.id != invitation_id);
        Ok(())
    }

    async fn is_connected(
        &self,
        _account_id: &str,
        identifier: &str,
    ) -> Result<bool, ProviderError> {
        self.record(ProviderCall::IsConnected { identifier: identifier.to_owned() });
        Ok(self.state.lock().unwrap().connected.contains(identifier))
    }
}
