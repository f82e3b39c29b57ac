use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dotpace::config::load_from_toml;
use dotpace::control::ControlPlane;
use dotpace::engine::{Dispatcher, EngineShared};
use dotpace::hal::Transport;
use dotpace::ingest::{Forwarder, ProducerRegistry};
use dotpace::mapper::Bitmap;
use dotpace::protocol::RbmFrame;
use dotpace::resilience::{Supervisor, SupervisorPolicy, Worker};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/display.toml".to_string());
    let config = load_from_toml(&config_path)
        .with_context(|| format!("loading display config from {config_path}"))?;

    info!(
        canvas = format!("{}x{}", config.canvas.width, config.canvas.height),
        panels = config.panels.len(),
        fps = config.runtime.fps,
        mock = config.serial.mock,
        "starting dotpace"
    );

    let transport = Transport::from_config(&config.serial);
    let shared = EngineShared::new(config);
    let registry = Arc::new(ProducerRegistry::new());
    let forwarder = Arc::new(Forwarder::new(Arc::clone(&shared), Arc::clone(&registry)));
    let control = ControlPlane::new(Arc::clone(&shared), Arc::clone(&registry));

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    // built-in demo producer so a bare server shows something moving
    let mut supervisor = Supervisor::new(
        Arc::clone(&shared),
        Arc::clone(&registry),
        SupervisorPolicy::default(),
    );
    supervisor.register(Box::new(BouncingDot::new(
        "bouncing-dot",
        Arc::clone(&forwarder),
        Arc::clone(&shared),
    )));
    control.set_active_source(Some("bouncing-dot".to_string()));

    let dispatcher = Dispatcher::new(Arc::clone(&shared), transport);
    let dispatcher_task = tokio::spawn(dispatcher.run(shutdown_tx.subscribe()));
    let supervisor_task = tokio::spawn(supervisor.run(shutdown_tx.subscribe()));
    let stats_task = tokio::spawn(control.clone().run_stats_stream(shutdown_tx.subscribe()));

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(());

    dispatcher_task.await??;
    supervisor_task.await??;
    stats_task.await?;

    info!("bye");
    Ok(())
}

/// Minimal local producer: a single dot bouncing around the canvas,
/// submitted through the normal ingest path at the target cadence.
struct BouncingDot {
    id: String,
    forwarder: Arc<Forwarder>,
    shared: Arc<EngineShared>,
    handle: Option<JoinHandle<()>>,
    stop_tx: Option<broadcast::Sender<()>>,
}

impl BouncingDot {
    fn new(id: &str, forwarder: Arc<Forwarder>, shared: Arc<EngineShared>) -> Self {
        Self {
            id: id.to_string(),
            forwarder,
            shared,
            handle: None,
            stop_tx: None,
        }
    }
}

#[async_trait]
impl Worker for BouncingDot {
    fn id(&self) -> &str {
        &self.id
    }

    async fn start(&mut self) -> Result<()> {
        let (stop_tx, mut stop_rx) = broadcast::channel::<()>(1);
        let forwarder = Arc::clone(&self.forwarder);
        let shared = Arc::clone(&self.shared);
        let id = self.id.clone();

        let handle = tokio::spawn(async move {
            let (mut x, mut y) = (0i32, 0i32);
            let (mut dx, mut dy) = (1i32, 1i32);
            let mut seq = 0u32;

            loop {
                let config = shared.config();
                let (w, h) = (
                    config.canvas.width as i32,
                    config.canvas.height as i32,
                );

                let mut bitmap = Bitmap::zeroed(w as usize, h as usize);
                bitmap.set(x as usize, y as usize, true);
                x += dx;
                y += dy;
                if x <= 0 || x >= w - 1 {
                    dx = -dx;
                    x = x.clamp(0, w - 1);
                }
                if y <= 0 || y >= h - 1 {
                    dy = -dy;
                    y = y.clamp(0, h - 1);
                }

                let frame = RbmFrame {
                    seq,
                    ..RbmFrame::zeroed(config.canvas.width, config.canvas.height)
                };
                let frame = RbmFrame {
                    payload: bitmap.to_packed(),
                    ..frame
                };
                seq = seq.wrapping_add(1);
                let _ = forwarder.submit(&id, &frame.encode());

                let interval =
                    std::time::Duration::from_millis(config.runtime.interval_ms() as u64);
                tokio::select! {
                    _ = stop_rx.recv() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });

        self.handle = Some(handle);
        self.stop_tx = Some(stop_tx);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        Ok(())
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
