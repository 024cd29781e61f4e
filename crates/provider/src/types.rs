//! Wire types exchanged with the messaging provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How far the viewed profile sits from the sender in the provider's
/// social graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkDistance {
    FirstDegree,
    SecondDegree,
    ThirdDegree,
    OutOfNetwork,
}

/// A profile as returned by `visit_profile`.
///
/// Optional fields are genuinely optional on the wire; the engine copies
/// whatever is present into the lead's enriched attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// The provider's internal id for this member.
    pub provider_id: String,
    /// The public URL slug of the profile.
    pub public_identifier: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub headline: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    pub network_distance: Option<NetworkDistance>,
}

/// A feed post authored by a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_first_name: Option<String>,
    pub author_last_name: Option<String>,
    pub text: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
}

/// A connection request previously sent by the sender account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub id: String,
    /// Provider id of the invited member.
    pub invited_provider_id: String,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Reaction kinds accepted by `react_to_post`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionType {
    #[default]
    Like,
    Celebrate,
    Support,
    Love,
    Insightful,
    Funny,
}

impl ReactionType {
    /// Parse a node-config value, falling back to `Like` for anything
    /// unrecognised.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value {
            Some("celebrate") => Self::Celebrate,
            Some("support") => Self::Support,
            Some("love") => Self::Love,
            Some("insightful") => Self::Insightful,
            Some("funny") => Self::Funny,
            _ => Self::Like,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Celebrate => "celebrate",
            Self::Support => "support",
            Self::Love => "love",
            Self::Insightful => "insightful",
            Self::Funny => "funny",
        }
    }
}
