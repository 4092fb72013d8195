pub mod analysis;
pub mod config;
pub mod dataset;
pub mod entry;
pub mod key;
pub mod resource;
pub mod state;
pub mod usage;

pub use analysis::*;
pub use config::*;
pub use dataset::*;
pub use entry::*;
pub use key::*;
pub use resource::*;
pub use state::*;
pub use usage::*;
