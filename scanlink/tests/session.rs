//! End-to-end sessions over loopback TCP

use std::path::{Path, PathBuf};
use std::time::Duration;

use pretty_assertions::assert_eq;
use scanlink::{
    FeedSide, ProgressEvent, ScanClient, ScanOutcome, ScanServer, ServerConfig, SessionResult,
    SessionSummary, Sheet, SimulatedScanner,
};
use scanlink_transport::{TcpTransport, Transport};
use scanlink_types::PREVIEW_LEN;
use serde_json::{json, Map, Value};
use tempfile::TempDir;
use tokio::task::JoinHandle;

const JAM: &str = "Document feeder jammed";

type ServerHandle = JoinHandle<(Vec<SessionSummary>, ScanServer<SimulatedScanner>)>;

fn config(output_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        output_dir: output_dir.to_path_buf(),
        backside_threshold_secs: 0.15,
        idle_timeout_secs: Some(5),
        ..ServerConfig::default()
    }
}

/// Fronts take well over the threshold, backs well under it
fn scripted(sheets: impl IntoIterator<Item = Sheet>) -> SimulatedScanner {
    SimulatedScanner::scripted(sheets)
        .with_front_delay(Duration::from_millis(300))
        .with_back_delay(Duration::ZERO)
        .with_page_size(300, 400)
}

async fn start(config: ServerConfig, device: SimulatedScanner, sessions: usize) -> (u16, ServerHandle) {
    let mut server = ScanServer::bind(config, device).await.unwrap();
    let port = server.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let mut summaries = Vec::new();
        for _ in 0..sessions {
            summaries.push(server.serve_one().await.unwrap());
        }
        (summaries, server)
    });

    (port, handle)
}

fn session_dirs(output_dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(output_dir) {
        Ok(entries) => entries.map(|entry| entry.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

fn options(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

async fn raw_connection(port: u16) -> TcpTransport {
    let mut transport = TcpTransport::new("127.0.0.1", port);
    transport.connect().await.unwrap();
    transport
}

#[tokio::test]
async fn test_completed_scan_and_previews() {
    let out = TempDir::new().unwrap();
    let device = scripted([Sheet::Front, Sheet::Back, Sheet::Front]);
    let (port, server) = start(config(out.path()), device, 1).await;

    let mut client = ScanClient::connect("127.0.0.1", port).await.unwrap();
    let mut events = Vec::new();
    let result = client
        .scan_with(options(json!({"mode": "Color"})), |event| events.push(event.clone()))
        .await
        .unwrap();

    assert_eq!(result, SessionResult::Finished(ScanOutcome::Completed));
    assert_eq!(
        events,
        vec![
            ProgressEvent::FeedStart,
            ProgressEvent::PageFed,
            ProgressEvent::PageSaved(1),
            ProgressEvent::FeedStart,
            ProgressEvent::Backside,
            ProgressEvent::PageSaved(2),
            ProgressEvent::FeedStart,
            ProgressEvent::PageFed,
            ProgressEvent::PageSaved(3),
            ProgressEvent::FeedStart,
            ProgressEvent::PagesEnd,
            ProgressEvent::Complete,
        ]
    );

    let progress = client.progress();
    assert_eq!(
        progress.markers(),
        vec![FeedSide::Front, FeedSide::Back, FeedSide::Front]
    );
    assert!(progress.is_complete());

    let first = client.request_page(0).await.unwrap().unwrap();
    let second = client.request_page(0).await.unwrap().unwrap();
    assert_eq!(first.as_bytes().len(), PREVIEW_LEN);
    assert_eq!(second.as_bytes().len(), PREVIEW_LEN);
    assert_ne!(first.as_bytes(), second.as_bytes());

    // Out of range: no reply, and the stream stays in sync
    assert!(client.request_page(5).await.unwrap().is_none());
    let other = client.request_page(1).await.unwrap().unwrap();
    assert_eq!(other.as_bytes().len(), PREVIEW_LEN);

    client.finish().await.unwrap();

    let (summaries, server) = server.await.unwrap();
    assert_eq!(summaries[0].outcome, Some(ScanOutcome::Completed));
    assert_eq!(summaries[0].pages, 3);
    assert_eq!(summaries[0].requests_served, 3);
    assert!(!summaries[0].broken);
    assert_eq!(server.device().cancel_count(), 1);

    let dirs = session_dirs(out.path());
    assert_eq!(dirs.len(), 1);
    assert_eq!(std::fs::read_dir(&dirs[0]).unwrap().count(), 3);
}

#[tokio::test]
async fn test_empty_feeder() {
    let out = TempDir::new().unwrap();
    let (port, server) = start(config(out.path()), scripted([]), 1).await;

    let mut client = ScanClient::connect("127.0.0.1", port).await.unwrap();
    let mut events = Vec::new();
    let result = client
        .scan_with(Map::new(), |event| events.push(event.clone()))
        .await
        .unwrap();

    assert_eq!(result, SessionResult::Finished(ScanOutcome::Empty));
    assert_eq!(
        events,
        vec![
            ProgressEvent::FeedStart,
            ProgressEvent::PagesEnd,
            ProgressEvent::EmptyScan,
        ]
    );

    let (summaries, _server) = server.await.unwrap();
    assert_eq!(summaries[0].outcome, Some(ScanOutcome::Empty));
    assert!(session_dirs(out.path()).is_empty());
}

#[tokio::test]
async fn test_fault_on_second_feed() {
    let out = TempDir::new().unwrap();
    let device = scripted([Sheet::Front, Sheet::Jam(JAM.to_string()), Sheet::Front]);
    let (port, server) = start(config(out.path()), device, 1).await;

    let mut client = ScanClient::connect("127.0.0.1", port).await.unwrap();
    let mut events = Vec::new();
    let result = client
        .scan_with(Map::new(), |event| events.push(event.clone()))
        .await
        .unwrap();

    assert_eq!(
        result,
        SessionResult::Finished(ScanOutcome::Faulted(JAM.to_string()))
    );
    assert_eq!(
        events,
        vec![
            ProgressEvent::FeedStart,
            ProgressEvent::PageFed,
            ProgressEvent::PageSaved(1),
            ProgressEvent::FeedStart,
            ProgressEvent::Error(JAM.to_string()),
        ]
    );

    let (summaries, server) = server.await.unwrap();
    assert_eq!(summaries[0].outcome, Some(ScanOutcome::Faulted(JAM.to_string())));
    assert_eq!(server.device().cancel_count(), 1);
    assert!(session_dirs(out.path()).is_empty());
}

#[tokio::test]
async fn test_rejected_commands_close_silently() {
    let out = TempDir::new().unwrap();
    let device = scripted([Sheet::Front]);
    let (port, server) = start(config(out.path()), device, 4).await;

    let rejected: [&[u8]; 3] = [
        b"{not json",
        br#"{"scan": false, "options": {}}"#,
        br#"{"scan": true, "options": {"resolution": 5000}}"#,
    ];

    for payload in rejected {
        let mut transport = raw_connection(port).await;
        transport.send_message(payload).await.unwrap();

        // Closed without a single event
        assert!(transport.receive_message().await.unwrap().is_none());
        transport.shutdown().await.unwrap();
    }

    // The server is still up for the next controller
    let mut client = ScanClient::connect("127.0.0.1", port).await.unwrap();
    let result = client.scan(Map::new()).await.unwrap();
    assert_eq!(result, SessionResult::Finished(ScanOutcome::Completed));
    client.finish().await.unwrap();

    let (summaries, server) = server.await.unwrap();
    assert!(summaries[..3].iter().all(|summary| summary.outcome.is_none()));
    assert_eq!(summaries[3].pages, 1);

    // Rejected sessions never touched the device
    assert_eq!(server.device().cancel_count(), 1);
}

#[tokio::test]
async fn test_client_leaves_mid_scan() {
    let out = TempDir::new().unwrap();
    let device = scripted([Sheet::Front, Sheet::Front, Sheet::Front, Sheet::Front]);
    let (port, server) = start(config(out.path()), device, 1).await;

    let mut transport = raw_connection(port).await;
    let command = scanlink::ScanCommand::scan(Map::new()).to_payload().unwrap();
    transport.send_message(&command).await.unwrap();

    let first = transport.receive_message().await.unwrap().unwrap();
    assert_eq!(first.as_ref(), b"feed start");
    transport.shutdown().await.unwrap();
    drop(transport);

    let (summaries, server) = server.await.unwrap();
    assert!(summaries[0].broken);
    assert_eq!(summaries[0].outcome, None);
    assert_eq!(server.device().cancel_count(), 1);
    assert!(session_dirs(out.path()).is_empty());
}

#[tokio::test]
async fn test_idle_client_is_dropped() {
    let out = TempDir::new().unwrap();
    let mut config = config(out.path());
    config.idle_timeout_secs = Some(1);
    let (port, server) = start(config, scripted([Sheet::Front]), 1).await;

    let mut transport = raw_connection(port).await;
    let command = scanlink::ScanCommand::scan(Map::new()).to_payload().unwrap();
    transport.send_message(&command).await.unwrap();

    loop {
        let event = transport.receive_message().await.unwrap().unwrap();
        if event.as_ref() == b"complete" {
            break;
        }
    }

    // No requests: the server hangs up on its own
    let closed = transport
        .receive_message_within(Duration::from_secs(10))
        .await
        .unwrap();
    assert!(closed.is_none());

    let (summaries, _server) = server.await.unwrap();
    assert_eq!(summaries[0].outcome, Some(ScanOutcome::Completed));
    assert_eq!(summaries[0].requests_served, 0);

    // Completed output is kept
    assert_eq!(session_dirs(out.path()).len(), 1);
}

#[tokio::test]
async fn test_mode_driven_simulator() {
    let out = TempDir::new().unwrap();
    let device = SimulatedScanner::new()
        .with_front_delay(Duration::ZERO)
        .with_back_delay(Duration::ZERO);
    let (port, server) = start(config(out.path()), device, 2).await;

    let mut client = ScanClient::connect("127.0.0.1", port).await.unwrap();
    let result = client.scan(options(json!({"mode": "Gray"}))).await.unwrap();
    assert_eq!(result, SessionResult::Finished(ScanOutcome::Empty));
    client.finish().await.unwrap();

    let mut client = ScanClient::connect("127.0.0.1", port).await.unwrap();
    let result = client.scan(options(json!({"mode": "B/W"}))).await.unwrap();
    assert_eq!(
        result,
        SessionResult::Finished(ScanOutcome::Faulted(JAM.to_string()))
    );
    client.finish().await.unwrap();

    server.await.unwrap();
}

#[tokio::test]
async fn test_silent_client_does_not_block_others() {
    let out = TempDir::new().unwrap();
    let mut config = config(out.path());
    config.idle_timeout_secs = Some(1);
    let (port, server) = start(config, scripted([Sheet::Front]), 2).await;

    // Connects but never sends a command
    let mut silent = raw_connection(port).await;

    // Queued behind the silent one until the server gives up on it
    let mut client = ScanClient::connect("127.0.0.1", port).await.unwrap();
    let result = client.scan(Map::new()).await.unwrap();
    assert_eq!(result, SessionResult::Finished(ScanOutcome::Completed));
    client.finish().await.unwrap();

    let closed = silent
        .receive_message_within(Duration::from_secs(10))
        .await
        .unwrap();
    assert!(closed.is_none());

    let (summaries, server) = server.await.unwrap();
    assert_eq!(summaries[0].outcome, None);
    assert!(!summaries[0].broken);
    assert_eq!(summaries[1].outcome, Some(ScanOutcome::Completed));
    assert_eq!(server.device().cancel_count(), 1);
}
