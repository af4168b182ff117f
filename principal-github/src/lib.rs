//! `gh`-backed implementation of the Principal decision engine's platform
//! trait.
//!
//! Everything here is a thin, typed wrapper over the host's authenticated
//! `gh` CLI -- there is no library HTTP client and no token handling; auth
//! portability comes from delegating entirely to whatever session `gh`
//! already has.

mod client;
mod error;

pub use client::GhClient;
pub use error::{Error, Result};
