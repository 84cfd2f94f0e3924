//! Session controller: selection lifecycle and progress polling.

mod support;

use std::sync::Arc;
use std::time::Duration;

use core_async::time::sleep;
use core_playback::{
    LoadOutcome, MediaReference, MediaResolver, PlaybackConfig, PlaybackEngine, PlaybackSession,
    PlaybackState, SelectOutcome, LOAD_FAILURE_MESSAGE,
};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, SessionEvent};
use support::{audio_url, drain_playback_events, endpoints, CountingAdapter, TrackSpec};

fn session_with(adapter: Arc<CountingAdapter>, bus: Option<EventBus>) -> PlaybackSession {
    session_with_config(adapter, PlaybackConfig::default(), bus)
}

fn session_with_config(
    adapter: Arc<CountingAdapter>,
    config: PlaybackConfig,
    bus: Option<EventBus>,
) -> PlaybackSession {
    let resolver = Arc::new(MediaResolver::new(endpoints()).unwrap());
    let engine = PlaybackEngine::new(adapter, config, bus.clone()).unwrap();
    PlaybackSession::new(engine, resolver, bus)
}

fn reference(value: &str) -> Option<MediaReference> {
    MediaReference::parse(Some(value))
}

#[core_async::test(start_paused)]
async fn test_select_resolves_and_loads() {
    let adapter = CountingAdapter::new()
        .with_track(audio_url("ch1.mp3"), TrackSpec::new(Duration::from_secs(10)));
    let session = session_with(adapter.clone(), None);

    let outcome = session.select(reference("ch1.mp3")).await.unwrap();

    assert_eq!(outcome, SelectOutcome::Loaded(LoadOutcome::Ready));
    assert_eq!(session.state(), PlaybackState::Ready);
    assert_eq!(session.selection(), reference("ch1.mp3"));
    assert_eq!(adapter.open_urls(), vec![audio_url("ch1.mp3")]);
}

#[core_async::test(start_paused)]
async fn test_select_absolute_reference_is_used_verbatim() {
    let url = "https://other.example.org/media/ch1.mp3";
    let adapter = CountingAdapter::new().with_track(url, TrackSpec::new(Duration::from_secs(3)));
    let session = session_with(adapter.clone(), None);

    session.select(reference(url)).await.unwrap();

    assert_eq!(session.engine().current_url(), Some(url.to_string()));
}

#[core_async::test(start_paused)]
async fn test_select_nothing_leaves_engine_idle() {
    let adapter = CountingAdapter::new()
        .with_track(audio_url("ch1.mp3"), TrackSpec::new(Duration::from_secs(10)));
    let session = session_with(adapter.clone(), None);

    session.select(reference("ch1.mp3")).await.unwrap();
    let outcome = session.select(MediaReference::parse(Some("  "))).await.unwrap();

    assert_eq!(outcome, SelectOutcome::NothingToPlay);
    assert_eq!(session.state(), PlaybackState::Idle);
    assert_eq!(session.selection(), None);
    assert_eq!(adapter.open(), 0);
}

#[core_async::test(start_paused)]
async fn test_poller_runs_only_while_playing() {
    let adapter = CountingAdapter::new()
        .with_track(audio_url("ch1.mp3"), TrackSpec::new(Duration::from_secs(60)));
    let session = session_with(adapter, None);

    assert!(!session.is_polling());
    session.select(reference("ch1.mp3")).await.unwrap();
    assert!(!session.is_polling());

    session.play().await;
    assert!(session.is_polling());

    session.pause().await;
    assert_eq!(session.state(), PlaybackState::Paused);
    assert!(!session.is_polling());

    session.play().await;
    assert!(session.is_polling());
    session.stop().await;
    assert_eq!(session.state(), PlaybackState::Ready);
    assert!(!session.is_polling());

    session.restart_from_beginning().await;
    assert!(session.is_polling());
    session.close().await;
    assert_eq!(session.state(), PlaybackState::Idle);
    assert!(!session.is_polling());
}

#[core_async::test(start_paused)]
async fn test_progress_advances_each_interval() {
    let adapter = CountingAdapter::new()
        .with_track(audio_url("ch1.mp3"), TrackSpec::new(Duration::from_secs(10)));
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let session = session_with(adapter, Some(bus));

    session.select(reference("ch1.mp3")).await.unwrap();
    session.play().await;

    let mut positions = Vec::new();
    while positions.len() < 3 {
        if let CoreEvent::Playback(PlaybackEvent::PositionChanged { position_ms, .. }) =
            rx.recv().await.unwrap()
        {
            positions.push(position_ms);
        }
    }

    assert_eq!(positions, vec![1_000, 2_000, 3_000]);
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(positions.iter().all(|&position| position <= 10_000));
    assert_eq!(session.snapshot().position_ms, 3_000);
}

#[core_async::test(start_paused)]
async fn test_end_of_track_stops_polling() {
    let adapter = CountingAdapter::new()
        .with_track(audio_url("short.mp3"), TrackSpec::new(Duration::from_secs(2)));
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let session = session_with(adapter, Some(bus));

    session.select(reference("short.mp3")).await.unwrap();
    session.play().await;
    sleep(Duration::from_secs(5)).await;

    assert_eq!(session.state(), PlaybackState::Paused);
    assert!(!session.is_polling());
    let snapshot = session.snapshot();
    assert_eq!(snapshot.position_ms, 2_000);
    assert!(!snapshot.is_playing);
    assert!(drain_playback_events(&mut rx)
        .iter()
        .any(|event| matches!(event, PlaybackEvent::Completed { .. })));

    session.play().await;
    assert_eq!(session.state(), PlaybackState::Playing);
    assert_eq!(session.snapshot().position_ms, 0);
    assert!(session.is_polling());
}

#[core_async::test(start_paused)]
async fn test_poll_within_end_tolerance_halts_output() {
    let adapter = CountingAdapter::new()
        .with_track(audio_url("ch1.mp3"), TrackSpec::new(Duration::from_secs(10)));
    let config = PlaybackConfig::default().with_end_of_track_tolerance(Duration::from_millis(1_500));
    let session = session_with_config(adapter.clone(), config, None);

    session.select(reference("ch1.mp3")).await.unwrap();
    session.play().await;
    sleep(Duration::from_millis(9_500)).await;

    assert_eq!(session.state(), PlaybackState::Paused);
    assert!(!session.is_polling());
    assert_eq!(adapter.rendering(), 0);

    sleep(Duration::from_secs(3)).await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.position_ms, 10_000);
    assert!(!snapshot.is_playing);
}

#[core_async::test(start_paused)]
async fn test_bad_reference_reports_error_and_ignores_play() {
    let adapter = CountingAdapter::new();
    let session = session_with(adapter.clone(), None);

    let outcome = session.select(reference("bad-url")).await.unwrap();
    assert_eq!(outcome, SelectOutcome::Loaded(LoadOutcome::Failed));

    let failed = PlaybackState::Error(LOAD_FAILURE_MESSAGE.to_string());
    assert_eq!(session.state(), failed);

    session.play().await;
    assert_eq!(session.state(), failed);
    assert!(!session.is_polling());
    assert_eq!(adapter.acquired(), 0);
}

#[core_async::test(start_paused)]
async fn test_retry_reloads_same_url() {
    let url = audio_url("flaky.mp3");
    let adapter = CountingAdapter::new()
        .with_track(&url, TrackSpec::new(Duration::from_secs(10)).failing());
    let session = session_with(adapter.clone(), None);

    session.select(reference("flaky.mp3")).await.unwrap();
    assert!(matches!(session.state(), PlaybackState::Error(_)));

    adapter.set_track(&url, TrackSpec::new(Duration::from_secs(10)));
    let outcome = session.retry().await.unwrap();

    assert_eq!(outcome, SelectOutcome::Loaded(LoadOutcome::Ready));
    assert_eq!(session.state(), PlaybackState::Ready);
    assert_eq!(adapter.open_urls(), vec![url]);
}

#[core_async::test]
async fn test_retry_without_selection_is_nothing_to_play() {
    let session = session_with(CountingAdapter::new(), None);
    assert_eq!(session.retry().await.unwrap(), SelectOutcome::NothingToPlay);
}

#[core_async::test(start_paused)]
async fn test_rapid_selection_keeps_only_latest() {
    let adapter = CountingAdapter::new()
        .with_track(
            audio_url("a.mp3"),
            TrackSpec::new(Duration::from_secs(10)).with_delay(Duration::from_secs(3)),
        )
        .with_track(
            audio_url("b.mp3"),
            TrackSpec::new(Duration::from_secs(20)).with_delay(Duration::from_secs(1)),
        );
    let session = session_with(adapter.clone(), None);

    let (first, second) = tokio::join!(
        session.select(reference("a.mp3")),
        session.select(reference("b.mp3"))
    );

    assert_eq!(first.unwrap(), SelectOutcome::Loaded(LoadOutcome::Superseded));
    assert_eq!(second.unwrap(), SelectOutcome::Loaded(LoadOutcome::Ready));
    assert_eq!(session.state(), PlaybackState::Ready);
    assert_eq!(session.selection(), reference("b.mp3"));
    assert_eq!(session.snapshot().duration_ms, Some(20_000));
    assert_eq!(adapter.max_open(), 1);

    session.close().await;
    assert_eq!(adapter.acquired(), adapter.released());
    assert_eq!(adapter.open(), 0);
}

#[core_async::test(start_paused)]
async fn test_selecting_while_playing_stops_polling_first() {
    let adapter = CountingAdapter::new()
        .with_track(audio_url("a.mp3"), TrackSpec::new(Duration::from_secs(10)))
        .with_track(audio_url("b.mp3"), TrackSpec::new(Duration::from_secs(10)));
    let session = session_with(adapter.clone(), None);

    session.select(reference("a.mp3")).await.unwrap();
    session.play().await;
    assert!(session.is_polling());

    session.select(reference("b.mp3")).await.unwrap();

    assert!(!session.is_polling());
    assert_eq!(session.state(), PlaybackState::Ready);
    assert_eq!(adapter.open_urls(), vec![audio_url("b.mp3")]);
}

#[core_async::test(start_paused)]
async fn test_close_emits_cleared_and_releases() {
    let adapter = CountingAdapter::new()
        .with_track(audio_url("ch1.mp3"), TrackSpec::new(Duration::from_secs(10)));
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let session = session_with(adapter.clone(), Some(bus));

    session.select(reference("ch1.mp3")).await.unwrap();
    session.play().await;
    session.close().await;

    let mut saw_changed = false;
    let mut saw_closed = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            CoreEvent::Session(SessionEvent::SelectionChanged { reference, url }) => {
                assert_eq!(reference, "ch1.mp3");
                assert_eq!(url, Some(audio_url("ch1.mp3")));
                saw_changed = true;
            }
            CoreEvent::Session(SessionEvent::SelectionCleared { reason }) => {
                assert_eq!(reason, "closed");
                saw_closed = true;
            }
            _ => {}
        }
    }
    assert!(saw_changed && saw_closed);
    assert_eq!(session.selection(), None);
    assert_eq!(adapter.open(), 0);
}

#[core_async::test(start_paused)]
async fn test_dropping_session_releases_everything() {
    let adapter = CountingAdapter::new()
        .with_track(audio_url("ch1.mp3"), TrackSpec::new(Duration::from_secs(10)));
    let session = session_with(adapter.clone(), None);

    session.select(reference("ch1.mp3")).await.unwrap();
    session.play().await;
    drop(session);
    sleep(Duration::from_millis(10)).await;

    assert_eq!(adapter.open(), 0);
    assert_eq!(adapter.acquired(), adapter.released());
}

#[core_async::test(start_paused)]
async fn test_subscribers_observe_state_changes() {
    let adapter = CountingAdapter::new()
        .with_track(audio_url("ch1.mp3"), TrackSpec::new(Duration::from_secs(10)));
    let session = session_with(adapter, None);
    let mut status = session.subscribe();

    session.select(reference("ch1.mp3")).await.unwrap();
    assert!(status.has_changed().unwrap());
    assert_eq!(status.borrow_and_update().state, PlaybackState::Ready);

    session.play().await;
    assert!(status.borrow_and_update().snapshot.is_playing);
}
