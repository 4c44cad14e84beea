//! Corridor geometry shared by the layout strategies.

use hollowmere_shared::{Rect, TilePos};

/// Straight or L-shaped path from `from` to `to`, both ends included.
///
/// With `horizontal_first` the path walks along `from.y` before turning.
pub(super) fn l_path(from: TilePos, to: TilePos, horizontal_first: bool) -> Vec<TilePos> {
    let corner = if horizontal_first {
        TilePos::new(to.x, from.y)
    } else {
        TilePos::new(from.x, to.y)
    };
    let mut path = Vec::with_capacity(from.manhattan(to) as usize + 1);
    walk(&mut path, from, corner);
    walk(&mut path, corner, to);
    if path.last() != Some(&to) {
        path.push(to);
    }
    path
}

/// Appends the axis-aligned segment `[from, to)`.
fn walk(path: &mut Vec<TilePos>, from: TilePos, to: TilePos) {
    let (dx, dy) = ((to.x - from.x).signum(), (to.y - from.y).signum());
    let mut cur = from;
    while cur != to {
        path.push(cur);
        cur = cur.offset(dx, dy);
    }
}

/// The closest pair of tiles, one inside each rectangle.
pub(super) fn facing_points(a: &Rect, b: &Rect) -> (TilePos, TilePos) {
    let on_b = b.clamp(a.center());
    let on_a = a.clamp(on_b);
    (on_a, b.clamp(on_a))
}

/// Squared distance between the facing points of two rectangles.
pub(super) fn gap(a: &Rect, b: &Rect) -> i64 {
    let (pa, pb) = facing_points(a, b);
    pa.distance_squared(pb)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_contiguous(path: &[TilePos]) -> bool {
        path.windows(2).all(|w| w[0].manhattan(w[1]) == 1)
    }

    #[test]
    fn test_l_path_endpoints_and_contiguity() {
        let from = TilePos::new(2, 3);
        let to = TilePos::new(9, -4);
        for horizontal_first in [true, false] {
            let path = l_path(from, to, horizontal_first);
            assert_eq!(path.first(), Some(&from));
            assert_eq!(path.last(), Some(&to));
            assert!(is_contiguous(&path));
            assert_eq!(path.len(), from.manhattan(to) as usize + 1);
        }
        assert_eq!(l_path(from, from, true), vec![from]);
    }

    #[test]
    fn test_straight_path_has_no_corner() {
        let path = l_path(TilePos::new(0, 5), TilePos::new(6, 5), false);
        assert!(path.iter().all(|p| p.y == 5));
        assert_eq!(path.len(), 7);
    }

    #[test]
    fn test_facing_points() {
        let a = Rect::new(1, 1, 4, 4);
        let b = Rect::new(10, 2, 3, 3);
        let (pa, pb) = facing_points(&a, &b);
        assert!(a.contains(pa) && b.contains(pb));
        assert_eq!(pa.x, 4);
        assert_eq!(pb.x, 10);
        assert_eq!(pa.y, pb.y);
        assert_eq!(gap(&a, &b), 36);
    }
}
