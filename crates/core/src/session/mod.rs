//! Session module.
//!
//! Provides the key-value store trait the host persists its session in, the
//! credential snapshot read once per acquisition run, and whole-bundle
//! import/export of the session keys.

mod bundle;
mod credentials;
mod store;

pub use bundle::*;
pub use credentials::*;
pub use store::*;
