//! I/O helpers used by rule implementations.

pub mod fetch;
pub mod unpack;

pub use fetch::{fetch_url, fetch_url_verified};
pub use unpack::unpack;
