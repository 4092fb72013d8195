pub mod budget;
pub mod ticks;

pub use budget::{DEFAULT_WARNING_THRESHOLD, TokenBudgetMonitor, UsageReport};
pub use ticks::{BoxTickStream, TickStream, interval_ticks};
