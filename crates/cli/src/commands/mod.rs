pub mod analyze;
pub mod datasets;
pub mod kaggle;
pub mod usage;
