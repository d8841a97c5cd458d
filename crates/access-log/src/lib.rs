//! Access log: a pluggable sink for structured decision events.
//! `submit` is non-blocking on every implementation; the bounded-channel
//! sink drops (incrementing a counter) rather than ever making a request
//! wait on the log.

pub mod bounded;
pub mod record;
pub mod stream;

pub use bounded::BoundedChannelSink;
pub use record::{AccessRecord, PolicyOutcome};
pub use stream::StreamSink;

/// `{submit(AccessRecord)}`: a single-method capability
/// so the sink can be a channel, a file, a test probe, or a no-op.
pub trait AccessLogSink: Send + Sync {
    fn submit(&self, record: AccessRecord);
}
