pub mod backend;
pub mod cache;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod monitor;
pub mod pipeline;
pub mod types;
pub mod validation;

pub use backend::*;
pub use cache::*;
pub use client::*;
pub use coordinator::*;
pub use error::*;
pub use monitor::*;
pub use pipeline::{AnalysisPipeline, Submission};
pub use types::*;
pub use validation::*;
