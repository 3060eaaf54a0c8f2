#![no_main]

use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tunelist::model::TrackRef;
use tunelist::queue::{PlayQueue, Removal};

fn track(idx: u8) -> TrackRef {
    TrackRef {
        name: format!("track_{idx:03}.mp3"),
        size_bytes: u64::from(idx),
        mime_type: String::from("audio/mpeg"),
        last_modified: 0,
        handle: None,
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((seed, ops)) = data.split_first() else {
        return;
    };
    let mut queue = PlayQueue::with_rng(SmallRng::seed_from_u64(u64::from(*seed)));
    queue.replace_tracks((0..seed % 16).map(track).collect());

    for pair in ops.chunks(2) {
        let arg = pair.get(1).copied().unwrap_or_default();
        match pair[0] % 8 {
            0 => {
                queue.select(usize::from(arg));
            }
            1 => {
                queue.advance_next();
            }
            2 => {
                queue.advance_previous();
            }
            3 => {
                queue.toggle_shuffle();
            }
            4 => {
                queue.toggle_repeat_one();
            }
            5 => {
                let before = queue.len();
                let outcome = queue.remove_at(usize::from(arg));
                if outcome == Removal::OutOfRange {
                    assert_eq!(queue.len(), before);
                } else {
                    assert_eq!(queue.len() + 1, before);
                }
            }
            6 => queue.add_tracks(vec![track(arg % 32)]),
            _ => {
                let mut order: Vec<usize> = (0..queue.len()).collect();
                order.rotate_left(usize::from(arg) % order.len().max(1));
                queue.set_shuffle_order(order);
            }
        }

        if let Some(current) = queue.current_index() {
            assert!(current < queue.len());
        }
        if queue.is_shuffled() && !queue.shuffle_order().is_empty() {
            let mut sorted = queue.shuffle_order().to_vec();
            sorted.sort_unstable();
            assert!(sorted.into_iter().eq(0..queue.len()));
        }
    }
});
