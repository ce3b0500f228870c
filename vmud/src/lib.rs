pub mod config;
pub mod inspect;
pub mod limit;
pub mod listen;
pub mod metrics;
pub mod module;
pub mod monitor;
pub mod replay;
pub mod task;

pub use config::{Config, ConfigError, Mode};
pub use limit::RateLimiter;
pub use listen::{Daemon, DaemonError};
pub use metrics::{IngestMetrics, MetricsSnapshot};
pub use module::{new_module, Module, ModuleError, MultiModule};
pub use replay::{ReplayOptions, ReplayWriter};
