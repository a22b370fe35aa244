//! # parley-shared
//!
//! Value types shared by the Parley log store and the logger service:
//! account and chat identities, date tokens, log entries and search hits.

pub mod constants;
pub mod error;
pub mod types;

pub use error::TypeError;
pub use types::*;
