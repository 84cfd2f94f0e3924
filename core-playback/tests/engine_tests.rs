//! Playback engine state machine and resource lifecycle.

mod support;

use std::sync::Arc;
use std::time::Duration;

use core_async::time::sleep;
use core_playback::{
    LoadOutcome, PlaybackConfig, PlaybackEngine, PlaybackError, PlaybackState,
    LOAD_FAILURE_MESSAGE, PLAYBACK_FAILURE_MESSAGE,
};
use core_runtime::events::{EventBus, PlaybackEvent};
use support::{audio_url, drain_playback_events, CountingAdapter, TrackSpec};

const TEN_SECONDS: Duration = Duration::from_secs(10);

fn engine_with(adapter: Arc<CountingAdapter>, config: PlaybackConfig) -> PlaybackEngine {
    PlaybackEngine::new(adapter, config, None).unwrap()
}

fn engine(adapter: Arc<CountingAdapter>) -> PlaybackEngine {
    engine_with(adapter, PlaybackConfig::default())
}

#[core_async::test(start_paused)]
async fn test_load_reaches_ready() {
    let url = audio_url("a.mp3");
    let adapter = CountingAdapter::new().with_track(&url, TrackSpec::new(TEN_SECONDS));
    let engine = engine(adapter.clone());

    assert_eq!(engine.state(), PlaybackState::Idle);
    let outcome = engine.load(&url).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Ready);
    assert_eq!(engine.state(), PlaybackState::Ready);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.position_ms, 0);
    assert_eq!(snapshot.duration_ms, Some(10_000));
    assert!(!snapshot.is_playing);
    assert_eq!(engine.current_url(), Some(url));
    assert_eq!(adapter.open(), 1);
}

#[core_async::test]
async fn test_empty_url_is_invalid() {
    let engine = engine(CountingAdapter::new());
    let result = engine.load("   ").await;
    assert!(matches!(result, Err(PlaybackError::InvalidOperation(_))));
    assert_eq!(engine.state(), PlaybackState::Idle);
}

#[core_async::test(start_paused)]
async fn test_loading_again_releases_previous_resource() {
    let a = audio_url("a.mp3");
    let b = audio_url("b.mp3");
    let adapter = CountingAdapter::new()
        .with_track(&a, TrackSpec::new(TEN_SECONDS))
        .with_track(&b, TrackSpec::new(TEN_SECONDS));
    let engine = engine(adapter.clone());

    engine.load(&a).await.unwrap();
    engine.load(&b).await.unwrap();

    assert_eq!(adapter.acquired(), 2);
    assert_eq!(adapter.released(), 1);
    assert_eq!(adapter.max_open(), 1);
    assert_eq!(adapter.open_urls(), vec![b]);
}

#[core_async::test(start_paused)]
async fn test_unload_is_idempotent() {
    let url = audio_url("a.mp3");
    let adapter = CountingAdapter::new().with_track(&url, TrackSpec::new(TEN_SECONDS));
    let engine = engine(adapter.clone());

    engine.unload().await;
    engine.load(&url).await.unwrap();
    engine.unload().await;
    engine.unload().await;

    assert_eq!(engine.state(), PlaybackState::Idle);
    assert!(!engine.is_loaded());
    assert_eq!(adapter.acquired(), 1);
    assert_eq!(adapter.released(), 1);
}

#[core_async::test(start_paused)]
async fn test_stop_rewinds_and_keeps_resource() {
    let url = audio_url("a.mp3");
    let adapter = CountingAdapter::new().with_track(&url, TrackSpec::new(TEN_SECONDS));
    let engine = engine(adapter.clone());

    engine.load(&url).await.unwrap();
    engine.play().await.unwrap();
    sleep(Duration::from_secs(3)).await;
    assert_eq!(engine.refresh_status().await.unwrap().position_ms, 3_000);

    engine.stop().await.unwrap();

    assert_eq!(engine.state(), PlaybackState::Ready);
    assert_eq!(engine.snapshot().position_ms, 0);
    assert!(!engine.snapshot().is_playing);
    assert_eq!(adapter.open(), 1);
}

#[core_async::test(start_paused)]
async fn test_pause_freezes_position() {
    let url = audio_url("a.mp3");
    let adapter = CountingAdapter::new().with_track(&url, TrackSpec::new(TEN_SECONDS));
    let engine = engine(adapter);

    engine.load(&url).await.unwrap();
    engine.pause().await.unwrap();
    assert_eq!(engine.state(), PlaybackState::Ready);

    engine.play().await.unwrap();
    sleep(Duration::from_secs(2)).await;
    engine.pause().await.unwrap();
    sleep(Duration::from_secs(5)).await;

    assert_eq!(engine.state(), PlaybackState::Paused);
    assert_eq!(engine.refresh_status().await.unwrap().position_ms, 2_000);
}

#[core_async::test(start_paused)]
async fn test_play_after_finish_replays_from_start() {
    let url = audio_url("a.mp3");
    let adapter = CountingAdapter::new().with_track(&url, TrackSpec::new(TEN_SECONDS));
    let engine = engine(adapter);

    engine.load(&url).await.unwrap();
    engine.play().await.unwrap();
    sleep(Duration::from_secs(12)).await;

    let finished = engine.refresh_status().await.unwrap();
    assert_eq!(finished.position_ms, 10_000);
    assert!(!finished.is_playing);
    assert_eq!(engine.state(), PlaybackState::Paused);

    engine.play().await.unwrap();

    let replay = engine.snapshot();
    assert_eq!(replay.position_ms, 0);
    assert!(replay.is_playing);
    assert_eq!(engine.state(), PlaybackState::Playing);
}

#[core_async::test(start_paused)]
async fn test_end_tolerance_halts_output_still_rendering() {
    let url = audio_url("a.mp3");
    let adapter = CountingAdapter::new().with_track(&url, TrackSpec::new(TEN_SECONDS));
    let config = PlaybackConfig::default().with_end_of_track_tolerance(Duration::from_millis(1_500));
    let engine = engine_with(adapter.clone(), config);

    engine.load(&url).await.unwrap();
    engine.play().await.unwrap();
    sleep(Duration::from_secs(9)).await;

    let finished = engine.refresh_status().await.unwrap();
    assert_eq!(engine.state(), PlaybackState::Paused);
    assert_eq!(finished.position_ms, 10_000);
    assert!(!finished.is_playing);
    assert_eq!(adapter.rendering(), 0);

    sleep(Duration::from_secs(5)).await;
    let later = engine.refresh_status().await.unwrap();
    assert_eq!(later.position_ms, 10_000);
    assert!(!later.is_playing);

    engine.pause().await.unwrap();
    assert_eq!(adapter.rendering(), 0);

    engine.play().await.unwrap();
    assert_eq!(engine.state(), PlaybackState::Playing);
    assert_eq!(engine.snapshot().position_ms, 0);
    assert_eq!(adapter.rendering(), 1);
}

#[core_async::test(start_paused)]
async fn test_native_finish_callback_completes_once() {
    let url = audio_url("a.mp3");
    let adapter = CountingAdapter::new().with_track(&url, TrackSpec::new(TEN_SECONDS));
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let engine = PlaybackEngine::new(adapter.clone(), PlaybackConfig::default(), Some(bus)).unwrap();

    engine.load(&url).await.unwrap();
    engine.play().await.unwrap();
    sleep(Duration::from_secs(4)).await;

    adapter.finish_all();
    adapter.finish_all();

    assert_eq!(engine.state(), PlaybackState::Paused);
    assert_eq!(engine.snapshot().position_ms, 10_000);

    let completed = drain_playback_events(&mut rx)
        .into_iter()
        .filter(|event| matches!(event, PlaybackEvent::Completed { .. }))
        .count();
    assert_eq!(completed, 1);
}

#[core_async::test(start_paused)]
async fn test_restart_from_beginning_starts_playback() {
    let url = audio_url("a.mp3");
    let adapter = CountingAdapter::new().with_track(&url, TrackSpec::new(TEN_SECONDS));
    let engine = engine(adapter);

    engine.load(&url).await.unwrap();
    engine.play().await.unwrap();
    sleep(Duration::from_secs(4)).await;
    engine.pause().await.unwrap();

    engine.restart_from_beginning().await.unwrap();

    assert_eq!(engine.state(), PlaybackState::Playing);
    assert_eq!(engine.snapshot().position_ms, 0);

    sleep(Duration::from_secs(1)).await;
    engine.restart_from_beginning().await.unwrap();
    assert_eq!(engine.state(), PlaybackState::Playing);
    assert_eq!(engine.refresh_status().await.unwrap().position_ms, 0);
}

#[core_async::test(start_paused)]
async fn test_bad_url_fails_and_play_is_rejected() {
    let adapter = CountingAdapter::new();
    let engine = engine(adapter.clone());

    let outcome = engine.load("bad-url").await.unwrap();

    assert_eq!(outcome, LoadOutcome::Failed);
    assert_eq!(
        engine.state(),
        PlaybackState::Error(LOAD_FAILURE_MESSAGE.to_string())
    );
    assert!(engine.last_error().is_some());

    let before = engine.status();
    let result = engine.play().await;
    assert!(matches!(result, Err(PlaybackError::InvalidOperation(_))));
    assert_eq!(engine.status(), before);
    assert_eq!(adapter.acquired(), 0);
}

#[core_async::test(start_paused)]
async fn test_load_failure_emits_recoverable_error() {
    let url = audio_url("flaky.mp3");
    let adapter = CountingAdapter::new().with_track(&url, TrackSpec::new(TEN_SECONDS).failing());
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let engine = PlaybackEngine::new(adapter, PlaybackConfig::default(), Some(bus)).unwrap();

    engine.load(&url).await.unwrap();

    let events = drain_playback_events(&mut rx);
    assert!(matches!(events.first(), Some(PlaybackEvent::Loading { .. })));
    assert!(matches!(
        events.last(),
        Some(PlaybackEvent::Error { recoverable: true, message, .. }) if message == LOAD_FAILURE_MESSAGE
    ));
}

#[core_async::test(start_paused)]
async fn test_play_failure_sets_error_state() {
    let url = audio_url("a.mp3");
    let adapter =
        CountingAdapter::new().with_track(&url, TrackSpec::new(TEN_SECONDS).failing_play());
    let engine = engine(adapter.clone());

    engine.load(&url).await.unwrap();
    engine.play().await.unwrap();

    assert_eq!(
        engine.state(),
        PlaybackState::Error(PLAYBACK_FAILURE_MESSAGE.to_string())
    );
    // Resource stays loaded so stop can recover.
    engine.stop().await.unwrap();
    assert_eq!(engine.state(), PlaybackState::Ready);
    assert_eq!(adapter.open(), 1);
}

#[core_async::test(start_paused)]
async fn test_newer_load_supersedes_in_flight_load() {
    let a = audio_url("a.mp3");
    let b = audio_url("b.mp3");
    let adapter = CountingAdapter::new()
        .with_track(&a, TrackSpec::new(TEN_SECONDS).with_delay(Duration::from_secs(5)))
        .with_track(&b, TrackSpec::new(Duration::from_secs(20)).with_delay(Duration::from_secs(1)));
    let engine = engine(adapter.clone());

    let (first, second) = tokio::join!(engine.load(&a), engine.load(&b));

    assert_eq!(first.unwrap(), LoadOutcome::Superseded);
    assert_eq!(second.unwrap(), LoadOutcome::Ready);
    assert_eq!(engine.state(), PlaybackState::Ready);
    assert_eq!(engine.current_url(), Some(b.clone()));
    assert_eq!(engine.snapshot().duration_ms, Some(20_000));
    assert_eq!(adapter.open_urls(), vec![b]);

    engine.unload().await;
    assert_eq!(adapter.acquired(), adapter.released());
    assert_eq!(adapter.open(), 0);
}

#[core_async::test(start_paused)]
async fn test_unload_supersedes_in_flight_load() {
    let url = audio_url("slow.mp3");
    let adapter = CountingAdapter::new()
        .with_track(&url, TrackSpec::new(TEN_SECONDS).with_delay(Duration::from_secs(3)));
    let engine = engine(adapter.clone());

    let (outcome, ()) = tokio::join!(engine.load(&url), async {
        sleep(Duration::from_secs(1)).await;
        engine.unload().await;
    });

    assert_eq!(outcome.unwrap(), LoadOutcome::Superseded);
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert_eq!(adapter.open(), 0);
}

#[core_async::test(start_paused)]
async fn test_load_timeout_fails_load() {
    let url = audio_url("hung.mp3");
    let adapter = CountingAdapter::new()
        .with_track(&url, TrackSpec::new(TEN_SECONDS).with_delay(Duration::from_secs(60)));
    let config = PlaybackConfig::default().with_load_timeout(Duration::from_secs(5));
    let engine = engine_with(adapter.clone(), config);

    let outcome = engine.load(&url).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Failed);
    assert!(engine.last_error().unwrap().contains("timed out"));
    assert_eq!(adapter.open(), 0);
}

#[core_async::test(start_paused)]
async fn test_dropping_engine_releases_resource() {
    let url = audio_url("a.mp3");
    let adapter = CountingAdapter::new().with_track(&url, TrackSpec::new(TEN_SECONDS));
    let engine = engine(adapter.clone());

    engine.load(&url).await.unwrap();
    drop(engine);
    sleep(Duration::from_millis(10)).await;

    assert_eq!(adapter.open(), 0);
    assert_eq!(adapter.released(), 1);
}

#[core_async::test]
async fn test_invalid_config_is_rejected() {
    let config = PlaybackConfig::default().with_poll_interval(Duration::ZERO);
    let result = PlaybackEngine::new(CountingAdapter::new(), config, None);
    assert!(matches!(result, Err(PlaybackError::Config(_))));
}
