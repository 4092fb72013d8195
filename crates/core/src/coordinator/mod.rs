pub mod mutation;
pub mod request;

pub use mutation::MutationCoordinator;
pub use request::{FetchHandle, FetchOutput, RequestCoordinator};
