use std::time::Duration;

use futures::{Stream, StreamExt, stream::BoxStream};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;

pub trait TickStream: Stream<Item = Instant> + Send + Unpin {}

impl<T> TickStream for T where T: Stream<Item = Instant> + Send + Unpin {}

pub type BoxTickStream = BoxStream<'static, Instant>;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Ticks every `period`, the first one immediately. A slow poll delays the
/// following ticks instead of bunching them up.
pub fn interval_ticks(period: Duration) -> BoxTickStream {
    let mut interval = time::interval(period.max(MIN_PERIOD));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    IntervalStream::new(interval).boxed()
}
