//! Utils Module - Helper Functions & Shared Utilities
//!
//! Constants, retry, time and hashing helpers shared across the crate.

pub mod clock;
pub mod constants;
pub mod hashing;
pub mod retry;

pub use clock::*;
pub use constants::*;
pub use hashing::*;
pub use retry::*;
