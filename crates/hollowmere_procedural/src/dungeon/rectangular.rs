//! Rectangular room placement.
//!
//! Random non-overlapping rectangles are proposed until the target count is
//! reached or the placement retries run out. Each new room is joined to its
//! nearest earlier room, which yields a spanning tree; a few extra random
//! links then add loops.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use hollowmere_shared::Rect;

use super::corridor::l_path;
use super::{Layout, LayoutParams};

pub(super) fn layout(params: &LayoutParams, rng: &mut ChaCha8Rng) -> Layout {
    let mut layout = Layout::default();

    for _ in 0..params.placement_retries {
        if layout.rooms.len() >= params.target_rooms {
            break;
        }
        let width = rng.gen_range(params.room_min..=params.room_max);
        let height = rng.gen_range(params.room_min..=params.room_max);
        let x = rng.gen_range(1..=params.width - width - 1);
        let y = rng.gen_range(1..=params.height - height - 1);
        let candidate = Rect::new(x, y, width, height);

        if layout
            .rooms
            .iter()
            .all(|room| !room.intersects_padded(&candidate, params.padding))
        {
            layout.rooms.push(candidate);
        }
    }

    for i in 1..layout.rooms.len() {
        let center = layout.rooms[i].center();
        let nearest = (0..i)
            .min_by_key(|&j| (layout.rooms[j].center().distance_squared(center), j))
            .unwrap_or(0);
        let path = l_path(layout.rooms[nearest].center(), center, rng.gen_bool(0.5));
        layout.connect(nearest, i, path);
    }

    let count = layout.rooms.len();
    if count >= 3 {
        for _ in 0..params.extra_connections {
            let a = rng.gen_range(0..count);
            let b = rng.gen_range(0..count);
            if a != b && !layout.is_linked(a, b) {
                let path = l_path(layout.rooms[a].center(), layout.rooms[b].center(), rng.gen_bool(0.5));
                layout.connect(a, b, path);
            }
        }
    }

    layout
}
