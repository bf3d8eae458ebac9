//! Playback engine integration tests
//!
//! All tests run on a paused clock: sleeps advance virtual time and every
//! engine timer due before the sleep's deadline fires first. Sleeps land
//! 100ms past the deadline of interest so ordering never depends on ties.

mod helpers;

use helpers::{advance_ms, drain, image, video, CarouselCall, Harness, MockLoader};
use kiosk_common::events::{AdvanceReason, KioskEvent};
use kiosk_common::models::{Slide, SlideType, TransitionEffect};
use kiosk_common::Error;
use kiosk_display::playback::{EnginePhase, TimerKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_round_trip_with_video_end_and_safety_timeout() {
    let h = Harness::new();
    assert!(h.cache.preload("https://cdn/b.mp4").await);
    let mut rx = h.events.subscribe();

    h.engine
        .set_rotation_set(vec![
            image("a", 5),
            video("b", "https://cdn/b.mp4", 20),
            image("c", 3),
        ])
        .unwrap();

    let status = h.engine.status().await.unwrap();
    assert_eq!(status.phase, EnginePhase::Showing);
    assert_eq!(status.current_slide_id.as_deref(), Some("a"));
    assert_eq!(status.timer_kind, Some(TimerKind::Countdown));
    assert_eq!(status.remaining_seconds, 5);
    assert_eq!(status.rotation_len, 3);

    // A's countdown expires into the video
    advance_ms(5_100).await;
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.current_slide_id.as_deref(), Some("b"));
    assert!(status.is_video_gating);
    assert_eq!(status.armed_timers, 1);

    // Video end moves on immediately
    h.engine.on_video_ended().unwrap();
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.current_slide_id.as_deref(), Some("c"));
    assert!(!status.is_video_gating);

    // C wraps back to A, then A into B again
    advance_ms(3_100).await;
    assert_eq!(h.engine.status().await.unwrap().current_index, Some(0));
    advance_ms(5_100).await;
    assert_eq!(
        h.engine.status().await.unwrap().current_slide_id.as_deref(),
        Some("b")
    );

    // No end signal: B holds for duration + 10s safety buffer
    advance_ms(29_000).await;
    assert_eq!(
        h.engine.status().await.unwrap().current_slide_id.as_deref(),
        Some("b")
    );
    advance_ms(1_100).await;
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.current_slide_id.as_deref(), Some("c"));

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        KioskEvent::TimingAnomaly { slide_id: Some(id), .. } if id == "b"
    )));
    let reasons: Vec<AdvanceReason> = events
        .iter()
        .filter_map(|e| match e {
            KioskEvent::SlideChanged { reason, .. } => Some(*reason),
            _ => None,
        })
        .collect();
    assert_eq!(
        reasons,
        vec![
            AdvanceReason::Reset,
            AdvanceReason::Timer,
            AdvanceReason::VideoEnded,
            AdvanceReason::Timer,
            AdvanceReason::Timer,
            AdvanceReason::SafetyTimeout,
        ]
    );

    let slide_tos: Vec<CarouselCall> = h
        .carousel
        .calls()
        .into_iter()
        .filter(|c| matches!(c, CarouselCall::SlideTo(_)))
        .collect();
    assert_eq!(
        slide_tos,
        vec![
            CarouselCall::SlideTo(1),
            CarouselCall::SlideTo(2),
            CarouselCall::SlideTo(0),
            CarouselCall::SlideTo(1),
            CarouselCall::SlideTo(2),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_video_end_ignored_when_not_gating() {
    let h = Harness::new();
    h.engine
        .set_rotation_set(vec![image("a", 5), image("b", 5)])
        .unwrap();

    h.engine.on_video_ended().unwrap();
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.current_index, Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_single_slide_loops_in_place() {
    let h = Harness::new();
    let mut rx = h.events.subscribe();
    h.engine.set_rotation_set(vec![image("only", 5)]).unwrap();
    let generation = h.engine.status().await.unwrap().generation;

    advance_ms(5_100).await;
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.phase, EnginePhase::Showing);
    assert_eq!(status.current_index, Some(0));
    assert_eq!(status.armed_timers, 1);
    assert_eq!(status.remaining_seconds, 5);
    assert_eq!(status.generation, generation);
    assert_eq!(h.carousel.restarts("only"), 1);
    assert_eq!(h.carousel.count(|c| matches!(c, CarouselCall::SlideTo(_))), 0);

    advance_ms(5_000).await;
    assert_eq!(h.carousel.restarts("only"), 2);

    let changes = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, KioskEvent::SlideChanged { .. }))
        .count();
    assert_eq!(changes, 3);
}

#[tokio::test(start_paused = true)]
async fn test_empty_rotation_goes_idle() {
    let h = Harness::new();
    let mut rx = h.events.subscribe();

    h.engine.set_rotation_set(vec![image("a", 5)]).unwrap();
    assert_eq!(h.engine.status().await.unwrap().phase, EnginePhase::Showing);

    let mut inactive = image("a", 5);
    inactive.active = Some(false);
    h.engine
        .set_rotation_set(vec![inactive, image("zero", 0)])
        .unwrap();

    let status = h.engine.status().await.unwrap();
    assert_eq!(status.phase, EnginePhase::Idle);
    assert_eq!(status.armed_timers, 0);
    assert_eq!(status.current_index, None);
    assert_eq!(status.rotation_len, 0);
    assert_eq!(status.source_len, 2);

    // Nothing fires while idle
    advance_ms(60_000).await;
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.phase, EnginePhase::Idle);
    assert_eq!(h.carousel.count(|c| *c == CarouselCall::ShowIdle), 1);

    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, KioskEvent::RotationIdle { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_identical_update_is_idempotent() {
    let h = Harness::new();
    let slides = vec![image("a", 5), image("b", 5), image("c", 5)];
    h.engine.set_rotation_set(slides.clone()).unwrap();

    advance_ms(2_000).await;
    let before = h.engine.status().await.unwrap();

    h.engine.set_rotation_set(slides).unwrap();
    let after = h.engine.status().await.unwrap();

    assert_eq!(after.current_index, before.current_index);
    assert_eq!(after.remaining_seconds, 3);
    assert_eq!(after.generation, before.generation);
    assert_eq!(h.carousel.renders(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_inactive_caption_change_leaves_playback_undisturbed() {
    let h = Harness::new();
    let mut hidden = Slide::new("x", SlideType::Text, 5);
    hidden.active = Some(false);
    hidden.data = serde_json::json!({ "caption": "old" });

    h.engine
        .set_rotation_set(vec![image("a", 10), hidden.clone(), image("c", 5)])
        .unwrap();
    advance_ms(4_000).await;
    let before = h.engine.status().await.unwrap();

    hidden.data = serde_json::json!({ "caption": "new" });
    h.engine
        .set_rotation_set(vec![image("a", 10), hidden, image("c", 5)])
        .unwrap();
    let after = h.engine.status().await.unwrap();

    assert_eq!(after.current_index, Some(0));
    assert_eq!(after.remaining_seconds, before.remaining_seconds);
    assert_eq!(after.generation, before.generation);
    assert_eq!(h.carousel.renders(), 1);

    // The original countdown still fires on schedule
    advance_ms(6_100).await;
    assert_eq!(
        h.engine.status().await.unwrap().current_slide_id.as_deref(),
        Some("c")
    );
}

#[tokio::test(start_paused = true)]
async fn test_content_change_rerenders_without_resetting_timer() {
    let h = Harness::new();
    h.engine
        .set_rotation_set(vec![image("a", 10), image("b", 5)])
        .unwrap();
    advance_ms(3_000).await;

    let mut renamed = image("a", 10);
    renamed.name = Some("Welcome".to_string());
    h.engine
        .set_rotation_set(vec![renamed, image("b", 5)])
        .unwrap();

    let status = h.engine.status().await.unwrap();
    assert_eq!(status.current_index, Some(0));
    assert_eq!(status.remaining_seconds, 7);
    assert_eq!(h.carousel.renders(), 2);
    assert_eq!(
        h.carousel.calls().last(),
        Some(&CarouselCall::Render {
            ids: vec!["a".to_string(), "b".to_string()],
            start_index: 0,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_membership_change_restarts_from_first_slide() {
    let h = Harness::new();
    h.engine
        .set_rotation_set(vec![image("a", 5), image("b", 5)])
        .unwrap();
    advance_ms(5_100).await;
    let before = h.engine.status().await.unwrap();
    assert_eq!(before.current_index, Some(1));

    h.engine
        .set_rotation_set(vec![image("b", 5), image("a", 5)])
        .unwrap();
    let after = h.engine.status().await.unwrap();
    assert_eq!(after.current_index, Some(0));
    assert_eq!(after.current_slide_id.as_deref(), Some("b"));
    assert_eq!(after.generation, before.generation + 1);
}

#[tokio::test(start_paused = true)]
async fn test_manual_skip_cancels_countdown() {
    let h = Harness::new();
    h.engine
        .set_rotation_set(vec![image("a", 5), image("b", 5), image("c", 5)])
        .unwrap();

    advance_ms(3_000).await;
    h.engine.next().unwrap();
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.current_index, Some(1));
    assert_eq!(status.remaining_seconds, 5);
    assert_eq!(status.armed_timers, 1);

    // A's old deadline (t=5s) must not fire
    advance_ms(3_000).await;
    assert_eq!(h.engine.status().await.unwrap().current_index, Some(1));

    advance_ms(2_100).await;
    assert_eq!(h.engine.status().await.unwrap().current_index, Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_renderer_index_reports() {
    let h = Harness::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    h.engine
        .on_slide_change(move |change| sink.lock().unwrap().push(change.clone()))
        .unwrap();

    h.engine
        .set_rotation_set(vec![image("a", 5), image("b", 5), image("c", 5)])
        .unwrap();

    h.engine.report_real_index(2).unwrap();
    h.engine.report_real_index(2).unwrap();
    h.engine.report_real_index(7).unwrap();
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.current_index, Some(2));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].slide_id, "c");
    assert_eq!(seen[1].reason, AdvanceReason::Manual);
    assert!(!seen[1].is_video);
}

#[tokio::test(start_paused = true)]
async fn test_video_waits_for_preload_and_keeps_current_slide() {
    let loader = MockLoader::new().with_delay("https://cdn/slow.mp4", Duration::from_secs(2));
    let h = Harness::with_loader(loader);

    h.engine
        .set_rotation_set(vec![image("a", 10), video("v", "https://cdn/slow.mp4", 20)])
        .unwrap();
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.rotation_len, 1);
    assert_eq!(status.pending_video_ids, vec!["v".to_string()]);

    advance_ms(2_100).await;
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.rotation_len, 2);
    assert!(status.pending_video_ids.is_empty());
    assert_eq!(status.current_slide_id.as_deref(), Some("a"));
    assert_eq!(status.remaining_seconds, 8);
    assert_eq!(h.loader.loads(), 1);

    advance_ms(8_000).await;
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.current_slide_id.as_deref(), Some("v"));
    assert!(status.is_video_gating);
}

#[tokio::test(start_paused = true)]
async fn test_failed_video_is_excluded() {
    let h = Harness::new();
    let mut rx = h.events.subscribe();

    h.engine
        .set_rotation_set(vec![image("a", 5), video("v", "https://cdn/broken.mp4", 20)])
        .unwrap();
    advance_ms(100).await;

    let status = h.engine.status().await.unwrap();
    assert_eq!(status.rotation_len, 1);
    assert_eq!(status.phase, EnginePhase::Showing);

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        KioskEvent::VideoExcluded { slide_id, .. } if slide_id == "v"
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, KioskEvent::PreloadFailed { .. })));

    // No automatic retry on later health checks
    advance_ms(20_000).await;
    assert_eq!(h.loader.loads(), 1);
}

fn shown_ids(events: &[KioskEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            KioskEvent::SlideChanged { slide_id, .. } => Some(slide_id.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_evicted_video_leaves_rotation_until_reloaded() {
    let url = "https://cdn/v.mp4";
    let h = Harness::with_loader(MockLoader::new().with_delay(url, Duration::from_secs(30)));
    assert!(h.cache.preload(url).await);

    h.engine
        .set_rotation_set(vec![video("v", url, 5), image("a", 20)])
        .unwrap();
    h.engine.on_video_ended().unwrap();
    assert_eq!(
        h.engine.status().await.unwrap().current_slide_id.as_deref(),
        Some("a")
    );

    // Sweeper drops the entry while the image is on screen
    advance_ms(1_000).await;
    assert_eq!(h.cache.evict_stale(Duration::from_millis(500)), 1);
    let mut rx = h.events.subscribe();

    // A's countdown runs out while the reload is still in flight
    advance_ms(25_000).await;
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.current_slide_id.as_deref(), Some("a"));
    assert_eq!(status.rotation_len, 1);
    assert_eq!(status.pending_video_ids, vec!["v".to_string()]);
    assert!(!shown_ids(&drain(&mut rx)).contains(&"v".to_string()));

    // Reload lands; the image keeps its slot and the video follows it
    advance_ms(7_000).await;
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.rotation_len, 2);
    assert_eq!(status.current_slide_id.as_deref(), Some("a"));
    assert_eq!(h.loader.loads(), 2);

    advance_ms(7_100).await;
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.current_slide_id.as_deref(), Some("v"));
    assert!(status.is_video_gating);
}

#[tokio::test(start_paused = true)]
async fn test_failed_reload_removes_video_from_rotation() {
    let url = "https://cdn/v.mp4";
    let h = Harness::new();
    assert!(h.cache.preload(url).await);

    h.engine
        .set_rotation_set(vec![image("a", 20), video("v", url, 10)])
        .unwrap();
    assert_eq!(h.engine.status().await.unwrap().rotation_len, 2);

    h.loader.fail(url);
    h.cache.clear();
    let mut rx = h.events.subscribe();

    // Next health check reloads, the reload fails, the video drops out
    advance_ms(8_100).await;
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.rotation_len, 1);
    assert_eq!(status.current_slide_id.as_deref(), Some("a"));
    assert!(h.cache.entry(url).unwrap().error.is_some());

    // A loops in place instead of handing over to the video
    advance_ms(20_000).await;
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.current_slide_id.as_deref(), Some("a"));

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        KioskEvent::VideoExcluded { slide_id, .. } if slide_id == "v"
    )));
    assert!(!shown_ids(&events).contains(&"v".to_string()));
    assert_eq!(h.loader.loads(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_health_check_restarts_stuck_video() {
    let h = Harness::new();
    assert!(h.cache.preload("https://cdn/v.mp4").await);
    let mut rx = h.events.subscribe();

    h.engine
        .set_rotation_set(vec![video("v", "https://cdn/v.mp4", 60)])
        .unwrap();
    h.carousel.set_playing("v", false);

    // First check notices, second check restarts
    advance_ms(8_100).await;
    assert_eq!(h.carousel.restarts("v"), 0);
    advance_ms(8_000).await;
    assert_eq!(h.carousel.restarts("v"), 1);

    let status = h.engine.status().await.unwrap();
    assert!(status.is_video_gating);
    assert_eq!(status.current_slide_id.as_deref(), Some("v"));

    assert!(drain(&mut rx).iter().any(|e| matches!(
        e,
        KioskEvent::VideoStuckRecovered { slide_id, .. } if slide_id == "v"
    )));
}

#[tokio::test(start_paused = true)]
async fn test_transition_effect_does_not_touch_timing() {
    let h = Harness::new();
    h.engine
        .set_rotation_set(vec![image("a", 10), image("b", 5)])
        .unwrap();
    advance_ms(4_000).await;

    h.engine.set_transition_effect(TransitionEffect::Cube).unwrap();
    let status = h.engine.status().await.unwrap();
    assert_eq!(status.transition_effect, TransitionEffect::Cube);
    assert_eq!(status.remaining_seconds, 6);
    assert_eq!(status.current_index, Some(0));
    assert!(h
        .carousel
        .calls()
        .contains(&CarouselCall::SetEffect(TransitionEffect::Cube)));
    assert_eq!(h.carousel.renders(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_engine() {
    let h = Harness::new();
    h.engine.set_rotation_set(vec![image("a", 5)]).unwrap();
    h.engine.shutdown().unwrap();

    assert!(matches!(h.engine.status().await, Err(Error::EngineStopped)));
    advance_ms(100).await;
    assert!(h.engine.is_stopped());
    assert!(matches!(h.engine.next(), Err(Error::EngineStopped)));
}

#[tokio::test(start_paused = true)]
async fn test_random_mutations_never_arm_two_timers() {
    let h = Harness::new();
    for url in ["https://cdn/v1.mp4", "https://cdn/v2.mp4"] {
        assert!(h.cache.preload(url).await);
    }

    let pool = vec![
        image("a", 3),
        image("b", 7),
        video("v1", "https://cdn/v1.mp4", 4),
        video("v2", "https://cdn/v2.mp4", 6),
        video("v3", "https://cdn/v3.mp4", 5),
        image("c", 0),
    ];
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..100 {
        match rng.gen_range(0..7) {
            0 | 1 => {
                let slides: Vec<Slide> = pool
                    .iter()
                    .filter(|_| rng.gen_bool(0.6))
                    .cloned()
                    .collect();
                h.engine.set_rotation_set(slides).unwrap();
            }
            2 => h.engine.next().unwrap(),
            3 => h.engine.report_real_index(rng.gen_range(0..6)).unwrap(),
            4 => h.engine.on_video_ended().unwrap(),
            5 => h.engine.reset().unwrap(),
            _ => advance_ms(rng.gen_range(0..12_000)).await,
        }

        let status = h.engine.status().await.unwrap();
        assert!(status.armed_timers <= 1);
        match status.phase {
            EnginePhase::Showing => {
                assert_eq!(status.armed_timers, 1);
                assert!(status.current_index.unwrap() < status.rotation_len);
            }
            EnginePhase::Idle => {
                assert_eq!(status.armed_timers, 0);
                assert_eq!(status.rotation_len, 0);
            }
        }
    }
}
