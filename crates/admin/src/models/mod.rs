//! Back-office-only types. Shared records live in `desguace_core::models`.

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
