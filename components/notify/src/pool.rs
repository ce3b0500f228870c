use crate::{Message, SharedNotifier};
use log::warn;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use vmu_product::Product;

const POOL_QUEUE_DEPTH: usize = 1000;

/// One decoded product entering the pool.
#[derive(Debug, Clone)]
pub struct Item {
    pub instance: u8,
    pub product: Arc<Product>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BatchKey {
    realtime: bool,
    origin: String,
    instance: u8,
}

/// Aggregating notifier pool. A single coordinator task owns the batch
/// cache; producers hand items over a bounded channel, and a ticker flushes
/// every non-empty batch as one message per key, dispatched concurrently to
/// all registered notifiers.
#[derive(Clone)]
pub struct Pool {
    tx: mpsc::Sender<Item>,
}

impl Pool {
    pub fn start(notifiers: Vec<SharedNotifier>, interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel(POOL_QUEUE_DEPTH);
        tokio::spawn(run(rx, notifiers, interval));
        Self { tx }
    }

    pub async fn notify(&self, item: Item) {
        if self.tx.send(item).await.is_err() {
            warn!("notifier pool is gone, item dropped");
        }
    }

    /// Producer-side entry for the synchronous pipeline thread.
    pub fn blocking_notify(&self, item: Item) {
        if self.tx.blocking_send(item).is_err() {
            warn!("notifier pool is gone, item dropped");
        }
    }
}

async fn run(mut rx: mpsc::Receiver<Item>, notifiers: Vec<SharedNotifier>, interval: Duration) {
    let mut cache: HashMap<BatchKey, Vec<Arc<Product>>> = HashMap::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            item = rx.recv() => {
                match item {
                    Some(item) => {
                        let key = BatchKey {
                            realtime: item.product.is_realtime(),
                            origin: item.product.origin(),
                            instance: item.instance,
                        };
                        cache.entry(key).or_default().push(item.product);
                    }
                    None => break,
                }
            }
            _ = ticker.tick() => {
                flush(&mut cache, &notifiers);
            }
        }
    }
    flush(&mut cache, &notifiers);
}

fn flush(cache: &mut HashMap<BatchKey, Vec<Arc<Product>>>, notifiers: &[SharedNotifier]) {
    for (key, mut batch) in cache.drain() {
        if batch.is_empty() {
            continue;
        }
        batch.sort_by_key(|p| p.sequence());
        let msg = build_message(&key, &batch);
        for notifier in notifiers {
            let notifier = notifier.clone();
            let msg = msg.clone();
            tokio::spawn(async move {
                if !notifier.accept(&msg) {
                    return;
                }
                if let Err(e) = notifier.notify(&msg).await {
                    warn!("notifier dispatch failed: {e}");
                }
            });
        }
    }
}

fn build_message(key: &BatchKey, batch: &[Arc<Product>]) -> Message {
    let first = &batch[0];
    let last = &batch[batch.len() - 1];
    let elapsed = (last.timestamp() - first.timestamp()).to_std().unwrap_or(Duration::ZERO);
    Message {
        origin: key.origin.clone(),
        sequence: first.sequence(),
        instance: key.instance as i32,
        channel: first.stream(),
        realtime: key.realtime,
        count: batch.len() as u32,
        elapsed,
        generated: first.generated().timestamp(),
        acquired: first.timestamp().timestamp(),
        reference: first.filename(),
        upi: first.upi().unwrap_or_default(),
    }
}
