pub mod core;
pub mod submission;

pub use self::core::AnalysisPipeline;
pub use submission::Submission;
