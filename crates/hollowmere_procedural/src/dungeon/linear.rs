//! Linear chain fallback.
//!
//! `min_rooms` minimum-size rooms in a horizontal row, each joined to the
//! next through a one-tile doorway. Connected by construction; config
//! validation guarantees the row fits the floor.

use hollowmere_shared::{Rect, TilePos};

use super::{Layout, LayoutParams};

pub(super) fn layout(params: &LayoutParams) -> Layout {
    let size = params.room_min;
    let y = (params.height - size) / 2;
    let mut layout = Layout::default();

    for i in 0..params.min_rooms {
        let x = 1 + i as i32 * (size + 1);
        layout.rooms.push(Rect::new(x, y, size, size));
        if i > 0 {
            let door = TilePos::new(x - 1, y + size / 2);
            let path = vec![door.offset(-1, 0), door, door.offset(1, 0)];
            layout.connect(i - 1, i, path);
        }
    }

    layout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DungeonConfig;

    #[test]
    fn test_chain_fits_and_links_neighbors() {
        let config = DungeonConfig::default();
        let params = LayoutParams::for_attempt(&config, 0);
        let layout = layout(&params);

        assert_eq!(layout.rooms.len(), config.min_rooms);
        assert_eq!(layout.links, (1..config.min_rooms).map(|i| (i - 1, i)).collect::<Vec<_>>());
        let last = layout.rooms.last().expect("rooms");
        assert!(last.right() < params.width);
        for (a, b) in layout.rooms.iter().zip(layout.rooms.iter().skip(1)) {
            assert_eq!(b.x - a.right(), 1, "one wall tile between neighbors");
        }
    }
}
