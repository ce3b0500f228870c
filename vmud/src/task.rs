use std::thread::{Builder, JoinHandle};

/// Spawns a named worker thread for the blocking stages of the pipeline.
pub fn spawn_worker<F>(name: &str, f: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    Builder::new().name(format!("vmud-{name}")).spawn(f).expect("spawn worker thread")
}
