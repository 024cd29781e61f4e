//! Message composition seam.
//!
//! Nodes can ask for AI-generated copy; text generation itself is an
//! external collaborator, so the executor goes through this trait. The
//! default implementation personalizes fixed templates from the lead's
//! attributes, which is also the fallback wiring when no generation
//! service is configured.

use async_trait::async_trait;
use provider::Post;

use crate::error::EngineError;
use crate::models::Lead;
use crate::template;

/// Fixed copy used when a node carries neither AI config nor a custom
/// message.
pub const DEFAULT_CONNECTION_MESSAGE: &str =
    "Hi, I came across your profile and would love to connect.";
pub const DEFAULT_FOLLOWUP_MESSAGE: &str =
    "Hi {{first_name}}, thanks for connecting! I'd love to hear what you're working on at {{company}}.";
pub const DEFAULT_COMMENT: &str = "Great insights, {{first_name}} — thanks for sharing!";

/// Produces outreach copy for a lead.
#[async_trait]
pub trait MessageComposer: Send + Sync {
    async fn connection_message(&self, lead: &Lead) -> Result<String, EngineError>;

    async fn followup_message(&self, lead: &Lead) -> Result<String, EngineError>;

    async fn post_comment(&self, lead: &Lead, post: &Post) -> Result<String, EngineError>;
}

/// Template-backed composer: the default templates rendered with the
/// lead's attributes.
#[derive(Debug, Default, Clone)]
pub struct TemplateComposer;

fn lead_vars(lead: &Lead) -> [(&'static str, Option<&str>); 3] {
    [
        ("first_name", lead.first_name.as_deref()),
        ("last_name", lead.last_name.as_deref()),
        ("company", lead.company.as_deref()),
    ]
}

#[async_trait]
impl MessageComposer for TemplateComposer {
    async fn connection_message(&self, _lead: &Lead) -> Result<String, EngineError> {
        Ok(DEFAULT_CONNECTION_MESSAGE.to_owned())
    }

    async fn followup_message(&self, lead: &Lead) -> Result<String, EngineError> {
        Ok(template::render(DEFAULT_FOLLOWUP_MESSAGE, &lead_vars(lead)))
    }

    async fn post_comment(&self, _lead: &Lead, post: &Post) -> Result<String, EngineError> {
        let vars = [("first_name", post.author_first_name.as_deref())];
        Ok(template::render(DEFAULT_COMMENT, &vars))
    }
}
