use std::thread;

use nes_beyond_host::audio_ring::{DEFAULT_BLOCK, audio_ring, audio_ring_for_block};

#[test]
fn pulls_return_pushed_samples_in_order() {
    let (tx, rx) = audio_ring_for_block(256);
    let mut expected = Vec::new();
    let mut got_left = Vec::new();
    let mut got_right = Vec::new();

    for round in 0..20 {
        for i in 0..300 {
            let v = (round * 300 + i) as f32;
            tx.push(v, -v);
            expected.push(v);
        }
        // Drain in device-sized blocks; the ring never holds more than 300.
        while !rx.is_empty() {
            let (l, r) = rx.pull(256.min(rx.len()));
            got_left.extend(l);
            got_right.extend(r);
        }
    }

    assert_eq!(got_left, expected);
    assert_eq!(
        got_right,
        expected.iter().map(|v| -v).collect::<Vec<_>>()
    );
    assert_eq!(tx.overruns(), 0);
}

#[test]
fn underrun_fills_with_silence() {
    let (tx, rx) = audio_ring(16);
    tx.push(0.5, -0.5);
    tx.push(0.25, -0.25);

    let mut left = [9.0f32; 6];
    let mut right = [9.0f32; 6];
    assert_eq!(rx.pull_into(&mut left, &mut right), 2);
    assert_eq!(left, [0.5, 0.25, 0.0, 0.0, 0.0, 0.0]);
    assert_eq!(right, [-0.5, -0.25, 0.0, 0.0, 0.0, 0.0]);
}

#[test]
fn empty_pull_does_not_move_the_read_cursor() {
    let (tx, rx) = audio_ring(8);
    let (l, r) = rx.pull(20);
    assert!(l.iter().chain(r.iter()).all(|&s| s == 0.0));

    tx.push(1.0, 2.0);
    assert_eq!(rx.len(), 1);
    assert_eq!(rx.pop_stereo(), Some((1.0, 2.0)));
    assert_eq!(rx.pop_stereo(), None);
}

#[test]
fn lapping_the_consumer_is_counted_not_prevented() {
    let (tx, rx) = audio_ring(8);
    for i in 0..7 {
        tx.push(i as f32, 0.0);
    }
    assert_eq!(rx.len(), 7);
    assert_eq!(tx.overruns(), 0);

    // The eighth push wraps onto the read cursor: the unread data is lost.
    tx.push(7.0, 0.0);
    assert_eq!(tx.overruns(), 1);
    assert_eq!(rx.overruns(), 1);
    assert!(rx.is_empty());

    // Producing continues regardless.
    tx.push(8.0, 0.0);
    assert_eq!(rx.pop_stereo(), Some((8.0, 0.0)));
}

#[test]
fn ring_is_sized_above_one_device_pull() {
    let (tx, _rx) = audio_ring_for_block(DEFAULT_BLOCK);
    assert!(tx.capacity() >= 2 * DEFAULT_BLOCK);
}

#[test]
fn producer_and_consumer_on_separate_threads() {
    const TOTAL: usize = 50_000;
    let (tx, rx) = audio_ring(TOTAL + 1);

    let producer = thread::spawn(move || {
        for i in 0..TOTAL {
            tx.push(i as f32, i as f32 * 2.0);
        }
    });

    let mut received = Vec::with_capacity(TOTAL);
    while received.len() < TOTAL {
        match rx.pop_stereo() {
            Some(pair) => received.push(pair),
            None => thread::yield_now(),
        }
    }
    producer.join().unwrap();

    for (i, (l, r)) in received.into_iter().enumerate() {
        assert_eq!(l, i as f32);
        assert_eq!(r, i as f32 * 2.0);
    }
    assert_eq!(rx.overruns(), 0);
}
