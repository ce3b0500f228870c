use std::sync::atomic::{AtomicU64, Ordering};

/// In-process ingest counters, shared between the accept loop and the
/// pipeline worker.
#[derive(Debug, Default)]
pub struct IngestMetrics {
    connections_total: AtomicU64,
    packets_total: AtomicU64,
    products_total: AtomicU64,
    bytes_total: AtomicU64,
    decode_errors: AtomicU64,
    storage_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub packets_total: u64,
    pub products_total: u64,
    pub bytes_total: u64,
    pub decode_errors: u64,
    pub storage_errors: u64,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connection(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_packet(&self, bytes: usize) {
        self.packets_total.fetch_add(1, Ordering::Relaxed);
        self.bytes_total.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_product(&self) {
        self.products_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_storage_error(&self) {
        self.storage_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            packets_total: self.packets_total.load(Ordering::Relaxed),
            products_total: self.products_total.load(Ordering::Relaxed),
            bytes_total: self.bytes_total.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
        }
    }
}
