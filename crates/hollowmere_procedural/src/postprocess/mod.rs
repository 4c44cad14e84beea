//! # River and Road Post-Processing
//!
//! Runs once over a grid whose elevation field already exists and rewrites
//! tiles in place. Both passes work on anything implementing [`TileGrid`]:
//! a dense [`Region`] snapshot of the overworld, or a sparse dungeon floor
//! (where uncarved rock is simply absent).

mod rivers;
mod roads;

use hollowmere_shared::{Rect, Tile, TilePos};

pub use rivers::{carve_rivers, RiverEnd, RiverPath};
pub use roads::{carve_road, edge_cost, find_road, RoadPath};

/// A rewritable grid of tiles.
pub trait TileGrid {
    /// Rectangle every present tile lies in.
    fn bounds(&self) -> Rect;

    /// Tile at `pos`, if the grid has one there.
    fn get(&self, pos: TilePos) -> Option<&Tile>;

    /// Mutable tile at `pos`.
    fn get_mut(&mut self, pos: TilePos) -> Option<&mut Tile>;

    /// Positions that hold a tile, row by row.
    fn present(&self) -> Vec<TilePos> {
        self.bounds()
            .positions()
            .filter(|p| self.get(*p).is_some())
            .collect()
    }
}

/// Dense row-major tile rectangle.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    bounds: Rect,
    tiles: Vec<Tile>,
}

impl Region {
    /// Wraps row-major tiles. Missing tiles are filled with the last one
    /// given (or a default tile), extra ones dropped.
    #[must_use]
    pub fn from_tiles(bounds: Rect, mut tiles: Vec<Tile>) -> Self {
        let len = bounds.area().max(0) as usize;
        let fill = tiles.last().copied().unwrap_or_default();
        tiles.resize(len, fill);
        Self { bounds, tiles }
    }

    /// Builds every tile from its position.
    #[must_use]
    pub fn from_fn(bounds: Rect, f: impl FnMut(TilePos) -> Tile) -> Self {
        Self {
            bounds,
            tiles: bounds.positions().map(f).collect(),
        }
    }

    /// All tiles, row-major.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    fn index(&self, pos: TilePos) -> Option<usize> {
        self.bounds.contains(pos).then(|| {
            ((pos.y - self.bounds.y) * self.bounds.width + (pos.x - self.bounds.x)) as usize
        })
    }
}

impl TileGrid for Region {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn get(&self, pos: TilePos) -> Option<&Tile> {
        self.index(pos).and_then(|i| self.tiles.get(i))
    }

    fn get_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        self.index(pos).and_then(|i| self.tiles.get_mut(i))
    }
}

/// Overwrites a tile with `terrain`, keeping its elevation.
pub(crate) fn paint(tile: &mut Tile, terrain: Tile) {
    *tile = Tile {
        elevation: tile.elevation,
        ..terrain
    };
}

/// Offsets covering a `width x width` brush centred on a point.
pub(crate) fn brush(width: u32) -> impl Iterator<Item = (i32, i32)> {
    let w = width.max(1) as i32;
    let lo = -(w - 1) / 2;
    let hi = w / 2;
    (lo..=hi).flat_map(move |dy| (lo..=hi).map(move |dx| (dx, dy)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hollowmere_shared::TerrainId;

    #[test]
    fn test_region_indexing() {
        let bounds = Rect::new(-3, 5, 4, 2);
        let region = Region::from_fn(bounds, |p| Tile {
            terrain: TerrainId((p.x + 10) as u16),
            elevation: p.y as f32,
            ..Tile::default()
        });
        assert_eq!(region.tiles().len(), 8);
        assert_eq!(region.get(TilePos::new(-3, 5)).map(|t| t.terrain), Some(TerrainId(7)));
        assert_eq!(region.get(TilePos::new(0, 6)).map(|t| t.elevation), Some(6.0));
        assert!(region.get(TilePos::new(1, 6)).is_none());
        assert!(region.get(TilePos::new(-3, 7)).is_none());
        assert_eq!(region.present().len(), 8);
    }

    #[test]
    fn test_brush_sizes() {
        assert_eq!(brush(1).collect::<Vec<_>>(), vec![(0, 0)]);
        assert_eq!(brush(2).count(), 4);
        let three: Vec<_> = brush(3).collect();
        assert_eq!(three.len(), 9);
        assert!(three.contains(&(-1, -1)) && three.contains(&(1, 1)));
    }
}
