//! End-to-end playback against the synthetic engine
//!
//! The engine runs its own worker thread, so these tests exercise real
//! cross-thread delivery of frames and samples.

mod helpers;

use helpers::{bridge_with, test_config, wait_until, EventStream};
use std::sync::Arc;
use std::time::Duration;
use videokit_bridge::engine::SyntheticEngine;
use videokit_bridge::video::CpuTexture;
use videokit_bridge::{BridgeEvent, Error, SessionState};
use videokit_common::events::EndReason;

const WAIT: Duration = Duration::from_secs(3);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_synthetic_playback_reaches_first_frame() {
    let (mut bridge, _tap) = bridge_with(Arc::new(SyntheticEngine::new()), test_config());
    let mut texture = CpuTexture::new(&bridge.initialize());

    bridge.start("synthetic://clip?duration_ms=2000&fps=10").unwrap();
    assert_eq!(bridge.length(), 2000);
    bridge.play();

    let mut first = None;
    let deadline = tokio::time::Instant::now() + WAIT;
    while first.is_none() && tokio::time::Instant::now() < deadline {
        if let Some(view) = bridge.step() {
            first = Some((view.session, view.generation));
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    // The tick runs far faster than the 100ms frame period, so no frame is
    // coalesced before the first one is seen
    assert_eq!(first, Some((1, 1)));

    assert!(wait_until(WAIT, || bridge.step_into(&mut texture)).await);
    // Visible pixels are opaque, padding stays transparent
    assert_eq!(texture.pixel(0, 0).map(|p| p[3]), Some(255));
    assert_eq!(texture.pixel(0, 31).map(|p| p[3]), Some(0));

    assert!(wait_until(WAIT, || bridge.stats().samples_written > 0).await);
    assert!(bridge.is_playing());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_synthetic_end_of_stream_returns_to_idle() {
    let (bridge, _tap) = bridge_with(Arc::new(SyntheticEngine::new()), test_config());
    let mut events = EventStream::new(bridge.subscribe());

    bridge.start("synthetic://short?duration_ms=200&fps=50").unwrap();

    let ended = events
        .wait_for(WAIT, |e| matches!(e, BridgeEvent::SessionEnded { .. }))
        .await
        .expect("session should end at end of stream");
    assert!(matches!(
        ended,
        BridgeEvent::SessionEnded {
            session: 1,
            reason: EndReason::EngineStopped,
            ..
        }
    ));
    assert!(wait_until(WAIT, || bridge.state() == SessionState::Idle).await);
    assert_eq!(bridge.time(), 0);
    assert_eq!(bridge.length(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_synthetic_rejects_unreachable_sources() {
    let engine = Arc::new(SyntheticEngine::new());
    let (bridge, _tap) = bridge_with(engine.clone(), test_config());

    assert!(matches!(bridge.start("synthetic://unreachable"), Err(Error::Open(_))));
    assert!(matches!(bridge.start("https://example.com/movie.mp4"), Err(Error::Open(_))));
    assert_eq!(bridge.state(), SessionState::Idle);
    assert_eq!(engine.opened(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_synthetic_seek_flushes_audio() {
    let (bridge, _tap) = bridge_with(Arc::new(SyntheticEngine::new()), test_config());
    let mut events = EventStream::new(bridge.subscribe());

    bridge.start("synthetic://long?duration_ms=60000&fps=50").unwrap();
    assert!(wait_until(WAIT, || bridge.stats().samples_written > 0).await);

    assert!(bridge.seek_to(30_000));
    assert!(bridge.time() >= 30_000);

    let flushed = events
        .wait_for(WAIT, |e| matches!(e, BridgeEvent::AudioFlushed { .. }))
        .await;
    assert!(flushed.is_some());
    assert!(bridge.stats().audio_flushes >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_synthetic_pause_and_resume_drive_sound_state() {
    let (bridge, _tap) = bridge_with(Arc::new(SyntheticEngine::new()), test_config());

    bridge.start("synthetic://long?duration_ms=60000&fps=50").unwrap();
    assert!(wait_until(WAIT, || bridge.stats().samples_written > 0).await);

    bridge.pause();
    assert!(!bridge.is_playing());
    assert!(wait_until(WAIT, || !bridge.sound_playing()).await);

    let paused_at = bridge.time();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(bridge.time(), paused_at);

    bridge.play();
    assert!(bridge.is_playing());
    assert!(wait_until(WAIT, || bridge.time() > paused_at).await);
    assert!(bridge.sound_playing());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_synthetic_restart_supersedes_running_session() {
    let engine = Arc::new(SyntheticEngine::new());
    let (mut bridge, _tap) = bridge_with(engine.clone(), test_config());
    let mut events = EventStream::new(bridge.subscribe());

    let first = bridge.start("synthetic://a?duration_ms=60000&fps=50").unwrap();
    assert!(wait_until(WAIT, || bridge.step().is_some()).await);

    let second = bridge.start("synthetic://b?duration_ms=60000&fps=50").unwrap();
    assert!(
        wait_until(WAIT, || matches!(bridge.step(), Some(v) if v.session == second && v.generation >= 1)).await
    );

    let ended = events
        .wait_for(WAIT, |e| matches!(e, BridgeEvent::SessionEnded { .. }))
        .await
        .unwrap();
    assert!(matches!(
        ended,
        BridgeEvent::SessionEnded {
            reason: EndReason::Superseded,
            ..
        } if ended.session() == first
    ));
    assert_eq!(engine.opened(), 2);
    assert_eq!(bridge.state(), SessionState::Active);
}
