use std::sync::Arc;

use lidar_replay::{MemorySource, PlaybackConfig, Player, ReplayError};

fn camera_pose(x: f64) -> serde_json::Value {
    serde_json::json!({
        "position": { "x": x, "y": 0.0, "z": 0.0 },
        "heading": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 },
    })
}

/// Two datasets with different durations, point buffers omitted (each frame
/// degrades to empty, which playback does not care about).
fn two_dataset_source() -> MemorySource {
    MemorySource::builder()
        .json("a/meta/timestamps.json", &serde_json::json!([0.0, 2.0, 4.0]))
        .json(
            "a/camera/front_camera/poses.json",
            &serde_json::json!([camera_pose(0.0), camera_pose(1.0), camera_pose(2.0)]),
        )
        .json("b/meta/timestamps.json", &serde_json::json!([100.0, 100.5]))
        .json(
            "b/camera/front_camera/poses.json",
            &serde_json::json!([camera_pose(0.0), camera_pose(5.0)]),
        )
        .build()
}

fn player() -> Player {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    // time_scale 1.0 keeps the arithmetic in the tests readable.
    Player::new(
        Arc::new(two_dataset_source()),
        PlaybackConfig::default().with_time_scale(1.0),
    )
    .unwrap()
}

#[tokio::test]
async fn load_binds_and_autoplays() {
    let mut player = player();
    player.load_scene("a").await.unwrap();

    let status = player.state().get();
    assert_eq!(status.dataset.as_deref(), Some("a"));
    assert_eq!(status.duration, 4.0);
    assert_eq!(status.scrub_time, 0.0);
    assert!(status.playing);
}

#[tokio::test]
async fn failed_load_keeps_the_previous_scene() {
    let mut player = player();
    player.load_scene("a").await.unwrap();
    player.seek(1.0).unwrap();

    let err = player.load_scene("missing").await.unwrap_err();
    assert!(matches!(err, ReplayError::DataUnavailable(_)));

    let status = player.state().get();
    assert_eq!(status.dataset.as_deref(), Some("a"));
    assert_eq!(status.scrub_time, 1.0);
    assert_eq!(player.binder().bound().unwrap().timeline.name(), "a");
}

#[tokio::test]
async fn rebind_round_trip_resets_every_time() {
    let mut player = player();

    player.load_scene("a").await.unwrap();
    assert_eq!(player.state().get().duration, 4.0);

    player.tick(1.5).unwrap();
    player.load_scene("b").await.unwrap();
    let status = player.state().get();
    assert_eq!(status.duration, 0.5);
    assert_eq!(status.scrub_time, 0.0);

    player.tick(0.2).unwrap();
    player.load_scene("a").await.unwrap();
    let status = player.state().get();
    assert_eq!(status.duration, 4.0);
    assert_eq!(status.scrub_time, 0.0);
}

#[tokio::test]
async fn tick_advances_and_yields_interpolated_samples() {
    let mut player = player();
    player.load_scene("a").await.unwrap();

    let sample = player.tick(1.0).unwrap().unwrap();
    assert_eq!(sample.time, 1.0);
    assert_eq!(sample.pose.position.x, 0.5);

    player.pause();
    let sample = player.tick(1.0).unwrap().unwrap();
    assert_eq!(sample.time, 1.0, "paused playback must not advance");
}

#[tokio::test]
async fn tick_without_a_scene_is_a_quiet_none() {
    let mut player = player();
    assert!(player.tick(0.016).unwrap().is_none());
}

#[tokio::test]
async fn scrub_wraps_at_the_duration() {
    let mut player = player();
    player.load_scene("b").await.unwrap();

    // duration 0.5: 0.3 + 0.3 wraps to 0.1.
    player.tick(0.3).unwrap();
    let sample = player.tick(0.3).unwrap().unwrap();
    assert!((sample.time - 0.1).abs() < 1e-9);
}

#[tokio::test]
async fn seek_clamps_into_range() {
    let mut player = player();
    player.load_scene("a").await.unwrap();

    player.seek(99.0).unwrap();
    assert_eq!(player.state().get().scrub_time, 0.0, "duration seeks wrap to origin");
    player.seek(-5.0).unwrap();
    assert_eq!(player.state().get().scrub_time, 0.0);
    player.seek(2.5).unwrap();
    assert_eq!(player.state().get().scrub_time, 2.5);
}

#[tokio::test]
async fn unload_returns_to_idle() {
    let mut player = player();
    player.load_scene("a").await.unwrap();
    player.unload_scene().unwrap();

    let status = player.state().get();
    assert!(status.dataset.is_none());
    assert!(!status.playing);
    assert!(matches!(
        player.play(),
        Err(ReplayError::NoActiveScene(_))
    ));
}

#[tokio::test]
async fn subscribers_see_load_and_tick_updates() {
    let mut player = player();
    let mut rx = player.state().subscribe();

    player.load_scene("a").await.unwrap();
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().dataset.as_deref(), Some("a"));

    player.tick(1.0).unwrap();
    assert!(rx.has_changed().unwrap());
}
