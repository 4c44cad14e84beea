//! Axis-aligned tile rectangles (room bounds, floor bounds, regions).

use serde::{Deserialize, Serialize};

use crate::tile::TilePos;

/// An axis-aligned rectangle of tiles. `x`/`y` is the top-left corner,
/// `right()`/`bottom()` are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in tiles.
    pub width: i32,
    /// Height in tiles.
    pub height: i32,
}

impl Rect {
    /// Creates a new rectangle.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    #[inline]
    #[must_use]
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    #[inline]
    #[must_use]
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Number of tiles covered.
    #[inline]
    #[must_use]
    pub const fn area(&self) -> i32 {
        self.width * self.height
    }

    /// Center tile (rounded toward the top-left).
    #[inline]
    #[must_use]
    pub const fn center(&self) -> TilePos {
        TilePos::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Returns true if the tile lies inside.
    #[inline]
    #[must_use]
    pub const fn contains(&self, pos: TilePos) -> bool {
        pos.x >= self.x && pos.x < self.right() && pos.y >= self.y && pos.y < self.bottom()
    }

    /// Returns true if `other` comes within `padding` tiles of this rectangle.
    ///
    /// With `padding = 0` this is plain overlap; with `padding = 1` rooms
    /// also may not share a wall.
    #[must_use]
    pub const fn intersects_padded(&self, other: &Self, padding: i32) -> bool {
        self.x - padding < other.right()
            && other.x < self.right() + padding
            && self.y - padding < other.bottom()
            && other.y < self.bottom() + padding
    }

    /// The tile inside this rectangle closest to `pos`.
    #[must_use]
    pub fn clamp(&self, pos: TilePos) -> TilePos {
        TilePos::new(
            pos.x.clamp(self.x, self.right() - 1),
            pos.y.clamp(self.y, self.bottom() - 1),
        )
    }

    /// Iterates every tile, row by row.
    pub fn positions(&self) -> impl Iterator<Item = TilePos> {
        let rect = *self;
        (rect.y..rect.bottom()).flat_map(move |y| (rect.x..rect.right()).map(move |x| TilePos::new(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_rejects_shared_walls() {
        let a = Rect::new(0, 0, 4, 4);
        let touching = Rect::new(4, 0, 3, 3);
        let apart = Rect::new(6, 0, 3, 3);

        assert!(!a.intersects_padded(&touching, 0));
        assert!(a.intersects_padded(&touching, 1));
        assert!(!a.intersects_padded(&apart, 1));
    }

    #[test]
    fn test_clamp_and_contains() {
        let r = Rect::new(2, 3, 5, 4);
        assert_eq!(r.clamp(TilePos::new(-10, 100)), TilePos::new(2, 6));
        assert!(r.contains(r.center()));
        assert!(!r.contains(TilePos::new(r.right(), r.y)));
        assert_eq!(r.positions().count(), 20);
    }
}
