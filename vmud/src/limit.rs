use log::debug;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

const BURST: f64 = 10.0;
const SWEEP_PERIOD: Duration = Duration::from_secs(10);
const IDLE_LIMIT: Duration = Duration::from_secs(120);

/// Per-remote-address token bucket guarding the serving ingress. Lookups run
/// under shared access; insertions and purges take the map exclusively. A
/// denied request maps to HTTP 429 at the caller.
pub struct RateLimiter {
    fill_rate: f64,
    visitors: RwLock<HashMap<String, Arc<Mutex<Visitor>>>>,
}

struct Visitor {
    seen: Instant,
    tokens: f64,
    last: Instant,
}

impl Visitor {
    fn new(now: Instant) -> Self {
        Self { seen: now, tokens: BURST, last: now }
    }

    fn allow(&mut self, fill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        self.tokens = (self.tokens + elapsed * fill_rate).min(BURST);
        self.last = now;
        self.seen = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl RateLimiter {
    pub fn new(per_second: u32) -> Arc<Self> {
        Arc::new(Self { fill_rate: per_second as f64, visitors: RwLock::new(HashMap::new()) })
    }

    pub fn allow(&self, addr: &str) -> bool {
        let now = Instant::now();
        let visitor = {
            let visitors = self.visitors.read();
            visitors.get(addr).cloned()
        };
        let visitor = match visitor {
            Some(v) => v,
            None => {
                let mut visitors = self.visitors.write();
                visitors.entry(addr.to_string()).or_insert_with(|| Arc::new(Mutex::new(Visitor::new(now)))).clone()
            }
        };
        let allowed = visitor.lock().allow(self.fill_rate, now);
        allowed
    }

    /// Drops every visitor idle for longer than `idle`.
    pub fn purge(&self, idle: Duration) {
        let now = Instant::now();
        let stale: Vec<String> = {
            let visitors = self.visitors.read();
            visitors
                .iter()
                .filter(|(_, v)| now.saturating_duration_since(v.lock().seen) >= idle)
                .map(|(addr, _)| addr.clone())
                .collect()
        };
        if stale.is_empty() {
            return;
        }
        let mut visitors = self.visitors.write();
        for addr in stale {
            visitors.remove(&addr);
        }
        debug!("limit.event=purged visitors={}", visitors.len());
    }

    pub fn tracked(&self) -> usize {
        self.visitors.read().len()
    }

    /// Background sweeper purging idle visitors every ten seconds. Lives for
    /// the rest of the process.
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_PERIOD);
            loop {
                ticker.tick().await;
                limiter.purge(IDLE_LIMIT);
            }
        });
    }
}
