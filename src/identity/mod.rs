pub mod session;
pub mod token;

use thiserror::Error;

pub use session::{Identity, SessionStore, SubscriptionId};
pub use token::{IdToken, TokenProvider};

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("No practitioner is signed in")]
    SignedOut,
    #[error("Identity provider returned an expired token")]
    TokenExpired,
    #[error("Identity provider error: {0}")]
    Provider(String),
    #[error("Session state lock poisoned")]
    Poisoned,
}
