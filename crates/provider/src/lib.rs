//! `provider` crate — the messaging-provider client seam.
//!
//! The engine talks to LinkedIn through a third-party API; everything it
//! needs is captured by the [`ProviderClient`] trait. A thin REST
//! implementation lives in [`rest`]; tests use the scripted [`mock`].

pub mod error;
pub mod mock;
pub mod rest;
pub mod traits;
pub mod types;

pub use error::{ErrorCode, ProviderError};
pub use rest::RestProvider;
pub use traits::ProviderClient;
pub use types::{Invitation, NetworkDistance, Post, ProviderProfile, ReactionType};
