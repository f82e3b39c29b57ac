//! Control surface behavior: cadence changes, capabilities and the
//! stats stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;

use dotpace::config::{CanvasSize, DisplayConfig, RuntimeConfig, SerialConfig};
use dotpace::control::ControlPlane;
use dotpace::engine::EngineShared;
use dotpace::ingest::{Forwarder, ProducerRegistry};
use dotpace::protocol::RbmFrame;

fn setup(fps: u32) -> (ControlPlane, Arc<EngineShared>, Arc<ProducerRegistry>) {
    let shared = EngineShared::new(DisplayConfig {
        canvas: CanvasSize {
            width: 28,
            height: 7,
        },
        panels: vec![],
        serial: SerialConfig::default(),
        runtime: RuntimeConfig {
            fps,
            buffer_ms: 500,
            ..Default::default()
        },
    });
    let registry = Arc::new(ProducerRegistry::new());
    let control = ControlPlane::new(Arc::clone(&shared), Arc::clone(&registry));
    (control, shared, registry)
}

#[tokio::test]
async fn test_stats_stream_reports_on_fps_change() {
    let (control, _, _) = setup(10);

    let (shutdown, _) = broadcast::channel(1);
    let mut stream = control.subscribe();
    let task = tokio::spawn(control.clone().run_stats_stream(shutdown.subscribe()));

    control.set_fps(20).unwrap();

    let report = timeout(Duration::from_millis(500), stream.recv())
        .await
        .expect("report within half a second")
        .unwrap();
    assert_eq!(report.fps, 20);

    let _ = shutdown.send(());
    task.await.unwrap();
}

#[tokio::test]
async fn test_stats_stream_periodic_snapshot() {
    let (control, _, _) = setup(10);

    let (shutdown, _) = broadcast::channel(1);
    let mut stream = control.subscribe();
    let task = tokio::spawn(control.clone().run_stats_stream(shutdown.subscribe()));

    // no events at all: the one-per-second cadence still reports
    let report = timeout(Duration::from_millis(1500), stream.recv())
        .await
        .expect("periodic report")
        .unwrap();
    assert_eq!(report.fps, 10);
    assert!(!report.stats.degraded);

    let _ = shutdown.send(());
    task.await.unwrap();
}

#[tokio::test]
async fn test_stats_stream_reports_on_source_switch() {
    let (control, _, _) = setup(10);

    let (shutdown, _) = broadcast::channel(1);
    let mut stream = control.subscribe();
    let task = tokio::spawn(control.clone().run_stats_stream(shutdown.subscribe()));

    control.set_active_source(Some("worker-2".to_string()));

    let report = timeout(Duration::from_millis(500), stream.recv())
        .await
        .expect("report after source switch")
        .unwrap();
    assert_eq!(report.active_source.as_deref(), Some("worker-2"));

    let _ = shutdown.send(());
    task.await.unwrap();
}

#[test]
fn test_capabilities_declare_invert_support() {
    let (control, _, _) = setup(10);
    let caps = control.capabilities();
    assert!(caps.invert_flag);
    assert!(caps.buffered_mode);
    assert_eq!(caps.fps_max, 30);
}

#[test]
fn test_stats_snapshot_reflects_ingest_counters() {
    let (control, shared, registry) = setup(30);
    shared.set_active_source(Some("p".to_string()));
    let forwarder = Forwarder::new(Arc::clone(&shared), registry);

    let bytes = RbmFrame::new(28, 7, 0, 0, vec![0x0F; 28]).unwrap().encode();
    forwarder.submit("p", &bytes).unwrap();
    forwarder.submit("p", &bytes).unwrap(); // duplicate

    let stats = control.stats();
    assert_eq!(stats.received, 2);
    assert_eq!(stats.forwarded, 1);
    assert_eq!(stats.duplicates_suppressed, 1);
    assert_eq!(stats.buffer_level, 1);
}

#[test]
fn test_fps_change_reconfigures_rate_bucket() {
    let (control, shared, registry) = setup(30);
    shared.set_active_source(Some("p".to_string()));
    let forwarder = Forwarder::new(Arc::clone(&shared), registry);

    control.set_fps(2).unwrap();

    // bucket now holds at most 2 tokens
    let mut queued = 0;
    for seq in 0..5u32 {
        let bytes = RbmFrame::new(28, 7, seq, 0, vec![seq as u8 + 1; 28])
            .unwrap()
            .encode();
        let resp = forwarder.submit("p", &bytes).unwrap();
        if resp.outcome == dotpace::ingest::IngestOutcome::Queued {
            queued += 1;
        }
    }
    assert_eq!(queued, 2);
}
