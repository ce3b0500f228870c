pub mod logger;
pub mod pool;
pub mod udp;
pub mod wire;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use vmu_product::Channel;

pub use logger::LogNotifier;
pub use pool::{Item, Pool};
pub use udp::UdpNotifier;
pub use wire::{decode_message, encode_message};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("truncated message while reading {0}")]
    Truncated(&'static str),
    #[error("unknown channel {0}")]
    UnknownChannel(u8),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Aggregate activity report for one (origin, instance, mode) stream over a
/// pool interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub origin: String,
    pub sequence: u32,
    pub instance: i32,
    pub channel: Channel,
    pub realtime: bool,
    pub count: u32,
    pub elapsed: Duration,
    /// Acquisition time of the batch head, unix seconds on the VMU scale.
    pub generated: i64,
    /// Generation time of the batch head, unix seconds.
    pub acquired: i64,
    /// Archive filename of the batch head.
    pub reference: String,
    pub upi: String,
}

/// Filter applied by every notifier before emission. Unaccepted messages are
/// dropped silently.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// `realtime`, `playback`, or empty for both.
    pub source: String,
    /// Negative admits every instance.
    pub instance: i32,
    pub channels: Vec<Channel>,
}

impl Options {
    pub fn accept(&self, msg: &Message) -> bool {
        if self.instance >= 0 && self.instance != msg.instance {
            return false;
        }
        if !self.channels.is_empty() && !self.channels.contains(&msg.channel) {
            return false;
        }
        match self.source.as_str() {
            "realtime" => msg.realtime,
            "playback" => !msg.realtime,
            "" => true,
            _ => false,
        }
    }
}

/// A subscriber of pool messages. Dispatch is fire-and-forget: errors are
/// logged by the pool and never back-pressure the coordinator.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn accept(&self, msg: &Message) -> bool;
    async fn notify(&self, msg: &Message) -> Result<(), NotifyError>;
}

pub type SharedNotifier = Arc<dyn Notifier>;

#[cfg(test)]
mod tests {
    use super::*;

    fn message(instance: i32, channel: Channel, realtime: bool) -> Message {
        Message {
            origin: "51".into(),
            sequence: 1,
            instance,
            channel,
            realtime,
            count: 1,
            elapsed: Duration::ZERO,
            generated: 0,
            acquired: 0,
            reference: String::new(),
            upi: String::new(),
        }
    }

    #[test]
    fn default_options_accept_everything() {
        let o = Options { instance: -1, ..Options::default() };
        assert!(o.accept(&message(0, Channel::Video1, true)));
        assert!(o.accept(&message(12, Channel::Science, false)));
    }

    #[test]
    fn filters_compose() {
        let o = Options { source: "realtime".into(), instance: 3, channels: vec![Channel::Science] };
        assert!(o.accept(&message(3, Channel::Science, true)));
        assert!(!o.accept(&message(3, Channel::Science, false)));
        assert!(!o.accept(&message(4, Channel::Science, true)));
        assert!(!o.accept(&message(3, Channel::Video1, true)));
    }
}
