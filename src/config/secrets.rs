//! Secret handling utilities.
//!
//! Re-exports the secrecy types used for the cluster API key.

pub use secrecy::{ExposeSecret, SecretString};
