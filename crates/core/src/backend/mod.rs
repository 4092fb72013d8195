pub mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub use traits::{AnalysisBackend, Backend, DatasetBackend};
