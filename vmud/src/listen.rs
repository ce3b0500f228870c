use crate::config::{Config, Mode, ModuleConfig, NotifierConfig, NotifierKind, PoolConfig, StoreConfig, StoreKind};
use crate::metrics::IngestMetrics;
use crate::module::{new_module, Module, ModuleError, MultiModule};
use crate::task::spawn_worker;
use chrono::Utc;
use flate2::read::GzDecoder;
use log::{info, warn};
use socket2::{SockRef, TcpKeepalive};
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use vmu_archive::{FileStore, HrdpStore, HttpStore, Multistore, Storage, StorageError};
use vmu_framing::{
    FrameReader, FramingError, GzipFrameReader, InstanceFilter, MirrorLevel, MirrorWriter, Packet, TeeReader,
};
use vmu_notify::{Item, LogNotifier, NotifyError, Options, Pool, SharedNotifier, UdpNotifier};
use vmu_product::decode;

const PIPELINE_QUEUE_DEPTH: usize = 100;
const KEEPALIVE_PERIOD: Duration = Duration::from_secs(90);
/// HRDP payload identifier assigned to this acquisition chain.
const HRDP_PAYLOAD_ID: u8 = 2;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("no storage defined")]
    NoStorage,
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A running acquisition daemon: accept loop, per-connection reader threads,
/// the decode/store pipeline, module worker and notifier pool.
pub struct Daemon {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
}

impl Daemon {
    pub async fn start(config: Config, metrics: Arc<IngestMetrics>) -> Result<Self, DaemonError> {
        // sink construction touches the filesystem and builds a blocking
        // http client, so it runs off the async workers
        let stores = config.stores.clone();
        let store = tokio::task::spawn_blocking(move || setup_storage(&stores)).await.expect("storage setup task")?;
        let pool = setup_pool(&config.pool).await?;
        let modules = setup_modules(&config.modules)?;

        let listener = TcpListener::bind(&config.address).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);

        let (packet_tx, packet_rx) = mpsc::channel::<Packet>(PIPELINE_QUEUE_DEPTH);
        let (module_tx, module_rx) = mpsc::channel::<Item>(PIPELINE_QUEUE_DEPTH);

        spawn_worker("modules", move || module_loop(module_rx, modules));
        {
            let metrics = metrics.clone();
            let age = config.age;
            spawn_worker("pipeline", move || pipeline_loop(packet_rx, store, pool, module_tx, age, metrics));
        }

        let link = LinkOptions {
            mode: config.mode,
            proxy: config.proxy.as_ref().map(|p| (p.address.clone(), MirrorLevel::parse(&p.level))),
            filter: InstanceFilter::new(config.instances.clone()),
        };
        tokio::spawn(accept_loop(listener, link, packet_tx, shutdown_rx, metrics));
        info!("listen.event=started addr={local_addr} mode={:?}", config.mode);
        Ok(Self { local_addr, shutdown })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the accept loop; connection threads drain with their peers and
    /// the pipeline flushes once every producer is gone.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

#[derive(Clone)]
struct LinkOptions {
    mode: Mode,
    proxy: Option<(String, MirrorLevel)>,
    filter: InstanceFilter,
}

async fn accept_loop(
    listener: TcpListener,
    link: LinkOptions,
    packet_tx: mpsc::Sender<Packet>,
    mut shutdown_rx: watch::Receiver<bool>,
    metrics: Arc<IngestMetrics>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        metrics.record_connection();
                        let stream = match stream.into_std() {
                            Ok(stream) => stream,
                            Err(e) => {
                                warn!("listen.event=accept_fail peer={peer} reason={e}");
                                continue;
                            }
                        };
                        let link = link.clone();
                        let packet_tx = packet_tx.clone();
                        let metrics = metrics.clone();
                        spawn_worker("conn", move || connection_loop(stream, peer, link, packet_tx, metrics));
                    }
                    Err(e) => {
                        warn!("listen.event=accept_fail reason={e}");
                        break;
                    }
                }
            }
        }
    }
    info!("listen.event=stopped");
}

enum LinkReader<R: Read> {
    Binary(FrameReader<R>),
    Gzip(GzipFrameReader<R>),
    BinaryGzip(FrameReader<GzDecoder<R>>),
}

impl<R: Read> LinkReader<R> {
    fn next_packet(&mut self) -> Result<Option<Packet>, FramingError> {
        match self {
            LinkReader::Binary(r) => r.next_packet(),
            LinkReader::Gzip(r) => r.next_packet(),
            LinkReader::BinaryGzip(r) => r.next_packet(),
        }
    }
}

fn connection_loop(
    stream: std::net::TcpStream,
    peer: SocketAddr,
    link: LinkOptions,
    packet_tx: mpsc::Sender<Packet>,
    metrics: Arc<IngestMetrics>,
) {
    if let Err(e) = stream.set_nonblocking(false) {
        warn!("listen.event=conn_fail peer={peer} reason={e}");
        return;
    }
    let keepalive = TcpKeepalive::new().with_time(KEEPALIVE_PERIOD);
    if let Err(e) = SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
        warn!("listen.event=keepalive_fail peer={peer} reason={e}");
    }

    let source: Box<dyn Read + Send> = match &link.proxy {
        Some((addr, level)) => match MirrorWriter::dial(addr, *level) {
            Ok(mirror) => Box::new(TeeReader::new(stream, mirror)),
            Err(e) => {
                warn!("mirror.event=dial_fail remote={addr} reason={e}");
                Box::new(stream)
            }
        },
        None => Box::new(stream),
    };
    let mut reader = match link.mode {
        Mode::Binary => LinkReader::Binary(FrameReader::new(source, link.filter)),
        Mode::Gzip => LinkReader::Gzip(GzipFrameReader::new(source, link.filter)),
        Mode::BinaryGzip => LinkReader::BinaryGzip(FrameReader::new(GzDecoder::new(source), link.filter)),
    };

    loop {
        match reader.next_packet() {
            Ok(Some(packet)) => {
                metrics.record_packet(packet.payload.len());
                if packet_tx.blocking_send(packet).is_err() {
                    // pipeline is gone, the daemon is shutting down
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("listen.event=framing_fail peer={peer} reason={e}");
                break;
            }
        }
    }
    info!("listen.event=closed peer={peer}");
}

fn pipeline_loop(
    mut packet_rx: mpsc::Receiver<Packet>,
    mut store: Multistore,
    pool: Pool,
    module_tx: mpsc::Sender<Item>,
    age_secs: u64,
    metrics: Arc<IngestMetrics>,
) {
    let age = chrono::Duration::seconds(age_secs as i64);
    while let Some(packet) = packet_rx.blocking_recv() {
        let product = match decode(packet.version, &packet.payload) {
            Ok(product) => Arc::new(product),
            Err(e) => {
                metrics.record_decode_error();
                warn!("decode failed (instance {}): {e}", packet.instance);
                continue;
            }
        };
        metrics.record_product();

        if store.store(packet.instance, &product).is_err() {
            // per-sink failures were already logged by the multistore
            metrics.record_storage_error();
        }

        if age_secs == 0 || Utc::now() - product.timestamp() <= age {
            pool.blocking_notify(Item { instance: packet.instance, product: product.clone() });
        }
        if module_tx.blocking_send(Item { instance: packet.instance, product }).is_err() {
            warn!("module worker is gone, product skipped");
        }
    }
    if let Err(e) = store.flush() {
        warn!("flush on shutdown failed: {e}");
    }
}

fn module_loop(mut rx: mpsc::Receiver<Item>, mut modules: MultiModule) {
    if modules.is_empty() {
        // drain so producers never block on a dead stage
        while rx.blocking_recv().is_some() {}
        return;
    }
    while let Some(item) = rx.blocking_recv() {
        if let Err(e) = modules.process(item.instance, &item.product) {
            warn!("module error: {e}");
        }
    }
}

fn setup_storage(stores: &[StoreConfig]) -> Result<Multistore, DaemonError> {
    let mut sinks: Vec<Box<dyn Storage>> = Vec::new();
    for cfg in stores.iter().filter(|s| !s.disabled) {
        let sink: Box<dyn Storage> = match cfg.kind {
            StoreKind::File => Box::new(FileStore::new(
                PathBuf::from(&cfg.location),
                cfg.mirror.clone(),
                cfg.interval,
                cfg.raw,
            )?),
            StoreKind::Http => Box::new(HttpStore::new(&cfg.location, cfg.interval)?),
            StoreKind::Hrdp => Box::new(HrdpStore::new(PathBuf::from(&cfg.location), HRDP_PAYLOAD_ID)?),
        };
        sinks.push(sink);
    }
    if sinks.is_empty() {
        return Err(DaemonError::NoStorage);
    }
    Ok(Multistore::new(sinks))
}

async fn setup_pool(config: &PoolConfig) -> Result<Pool, DaemonError> {
    let mut notifiers: Vec<SharedNotifier> = Vec::new();
    for cfg in &config.notifiers {
        notifiers.push(build_notifier(cfg).await?);
    }
    Ok(Pool::start(notifiers, Duration::from_secs(config.interval.max(1))))
}

async fn build_notifier(cfg: &NotifierConfig) -> Result<SharedNotifier, DaemonError> {
    let options = Options { source: cfg.source.clone(), instance: cfg.instance, channels: cfg.channel_set()? };
    Ok(match cfg.kind {
        NotifierKind::Udp => Arc::new(UdpNotifier::dial(&cfg.location, options).await?),
        NotifierKind::Logger => Arc::new(LogNotifier::new(options)),
    })
}

fn setup_modules(configs: &[ModuleConfig]) -> Result<MultiModule, DaemonError> {
    let mut modules: Vec<Box<dyn Module>> = Vec::new();
    for cfg in configs {
        modules.push(new_module(&cfg.kind, cfg.config.as_deref())?);
    }
    Ok(MultiModule::new(modules))
}
