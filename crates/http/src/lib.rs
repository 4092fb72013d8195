pub mod client;
pub mod wire;

pub use client::{DEFAULT_TIMEOUT, HttpBackend};
