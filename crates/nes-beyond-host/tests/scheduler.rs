use std::time::{Duration, Instant};

use nes_beyond_host::scheduler::{FrameScheduler, Speed, Tick};

/// Tick every `step` for `window`, returning the offsets of each advance.
fn run(
    sched: &mut FrameScheduler,
    start: Instant,
    speed: Speed,
    step: Duration,
    window: Duration,
) -> Vec<Duration> {
    let mut advances = Vec::new();
    let mut t = Duration::ZERO;
    while t <= window {
        if sched.tick(start + t, speed) == Tick::Advance {
            advances.push(t);
        }
        t += step;
    }
    advances
}

#[test]
fn frame_count_converges_to_target_rate() {
    let window = Duration::from_secs(10);
    for speed in Speed::PRESETS {
        let start = Instant::now();
        let mut sched = FrameScheduler::new();
        sched.start(start);
        let advances = run(&mut sched, start, speed, Duration::from_millis(1), window);

        let expected = window.as_secs_f64() * 60.0 * speed.factor();
        let diff = (advances.len() as f64 - expected).abs();
        assert!(
            diff <= 1.0,
            "speed {speed}: {} frames, expected {expected}",
            advances.len()
        );
        assert_eq!(sched.frames(), advances.len() as u64);
    }
}

#[test]
fn doubling_speed_halves_the_gap_between_frames() {
    let window = Duration::from_secs(4);
    let step = Duration::from_micros(100);

    let mean_gap = |speed: Speed| {
        let start = Instant::now();
        let mut sched = FrameScheduler::new();
        sched.start(start);
        let adv = run(&mut sched, start, speed, step, window);
        let span = *adv.last().unwrap() - adv[0];
        span.as_secs_f64() / (adv.len() - 1) as f64
    };

    let normal = mean_gap(Speed::NORMAL);
    let double = mean_gap(Speed::new(2.0).unwrap());
    assert!((normal / double - 2.0).abs() < 0.01, "{normal} vs {double}");
}

#[test]
fn at_most_one_frame_per_tick() {
    let start = Instant::now();
    let mut sched = FrameScheduler::new();
    sched.start(start);
    // A long stall only yields a single frame.
    let late = start + Duration::from_millis(500);
    assert_eq!(sched.tick(late, Speed::NORMAL), Tick::Advance);
    assert!(matches!(sched.tick(late, Speed::NORMAL), Tick::Wait(_)));
    assert_eq!(sched.frames(), 1);
}

#[test]
fn stopped_scheduler_is_idle_and_stop_is_idempotent() {
    let start = Instant::now();
    let mut sched = FrameScheduler::new();
    assert_eq!(sched.tick(start, Speed::NORMAL), Tick::Idle);

    sched.start(start);
    sched.stop();
    sched.stop();
    assert!(!sched.is_running());
    assert_eq!(
        sched.tick(start + Duration::from_secs(1), Speed::NORMAL),
        Tick::Idle
    );
}

#[test]
fn restarting_replaces_the_previous_run() {
    let start = Instant::now();
    let interval = Speed::NORMAL.frame_interval();
    let mut sched = FrameScheduler::new();
    sched.start(start);
    assert_eq!(sched.tick(start + interval, Speed::NORMAL), Tick::Advance);

    let restart = start + Duration::from_secs(5);
    sched.start(restart);
    assert_eq!(sched.frames(), 0);
    assert!(matches!(
        sched.tick(restart + interval / 2, Speed::NORMAL),
        Tick::Wait(_)
    ));
    assert_eq!(sched.tick(restart + interval, Speed::NORMAL), Tick::Advance);
}

#[test]
fn speed_change_applies_from_the_last_frame() {
    let start = Instant::now();
    let normal = Speed::NORMAL.frame_interval();
    let fast_speed = Speed::new(2.0).unwrap();
    let fast = fast_speed.frame_interval();

    let mut sched = FrameScheduler::new();
    sched.start(start);
    assert_eq!(sched.tick(start + normal, Speed::NORMAL), Tick::Advance);

    let almost = start + normal + fast - Duration::from_micros(10);
    assert!(matches!(sched.tick(almost, fast_speed), Tick::Wait(_)));
    assert_eq!(sched.tick(start + normal + fast, fast_speed), Tick::Advance);
}
