pub mod store;
pub mod subscription;

pub use store::{CacheStore, Listener};
pub use subscription::Subscription;
