use crate::{Message, Notifier, NotifyError, Options};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use log::info;
use vmu_product::time::adjust_generation_time;

/// Notifier that renders every accepted message as one structured log line.
pub struct LogNotifier {
    options: Options,
}

impl LogNotifier {
    pub fn new(options: Options) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn accept(&self, msg: &Message) -> bool {
        self.options.accept(msg)
    }

    async fn notify(&self, msg: &Message) -> Result<(), NotifyError> {
        let secs = msg.elapsed.as_secs_f64();
        let rate = if secs > 0.0 { msg.count as f64 / secs } else { msg.count as f64 };
        let generated = adjust_generation_time(msg.generated).to_rfc3339_opts(SecondsFormat::Secs, true);
        let acquired = DateTime::from_timestamp(msg.acquired, 0)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| "-".to_string());
        info!(
            "| {:3} | {:6} | {:6} | {:3} | {:6} | {:?} | {:6.3} | {} | {} | {:32} | {}",
            msg.instance,
            msg.origin,
            msg.sequence,
            msg.channel as u8,
            msg.count,
            msg.elapsed,
            rate,
            generated,
            acquired,
            msg.upi,
            msg.reference,
        );
        Ok(())
    }
}
