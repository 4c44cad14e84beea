//! # Coherent Noise
//!
//! Two deterministic noise families:
//!
//! - [`SimplexNoise`]: smooth 2D simplex noise, octaved for climate fields
//!   (elevation, moisture).
//! - [`CellularNoise`]: Worley F1 noise with one jittered feature point per
//!   cell, used as the clustering field for spawns.
//!
//! ## Determinism Guarantee
//!
//! Both are built from a [`SubSeed`] and read no other state. The same
//! sub-seed produces **exactly** the same values on any platform, any time.

use rand::seq::SliceRandom;

use crate::seed::SubSeed;

/// Pre-computed permutation table for simplex noise.
struct PermutationTable {
    /// 512-entry permutation table (256 entries, doubled for overflow handling).
    perm: [u8; 512],
}

/// 12 gradient vectors for 2D simplex (edges of a cube, projected).
const GRADIENTS: [[i8; 2]; 12] = [
    [1, 0], [1, 1], [0, 1], [-1, 1],
    [-1, 0], [-1, -1], [0, -1], [1, -1],
    [1, 0], [0, 1], [-1, 0], [0, -1],
];

impl PermutationTable {
    fn new(seed: SubSeed) -> Self {
        let mut base: [u8; 256] = std::array::from_fn(|i| i as u8);
        base.shuffle(&mut seed.rng());

        let mut perm = [0u8; 512];
        perm[..256].copy_from_slice(&base);
        perm[256..].copy_from_slice(&base);
        Self { perm }
    }

    #[inline]
    fn get(&self, index: usize) -> u8 {
        self.perm[index & 511]
    }

    #[inline]
    fn gradient(hash: u8) -> [i8; 2] {
        GRADIENTS[(hash % 12) as usize]
    }
}

/// 2D Simplex noise generator.
///
/// Produces smooth, continuous noise values in the range [-1, 1].
///
/// # Example
///
/// ```rust,ignore
/// let noise = SimplexNoise::new(seed.purpose(SeedTag::Elevation));
/// let value = noise.sample(100.5, 200.3);
/// assert!((-1.0..=1.0).contains(&value));
/// ```
pub struct SimplexNoise {
    perm_table: PermutationTable,
}

impl SimplexNoise {
    /// Skewing factor for 2D simplex grid.
    const F2: f64 = 0.366_025_403_784_439; // (sqrt(3) - 1) / 2
    /// Unskewing factor for 2D simplex grid.
    const G2: f64 = 0.211_324_865_405_187; // (3 - sqrt(3)) / 6

    /// Creates a new simplex noise generator from a sub-seed.
    #[must_use]
    pub fn new(seed: SubSeed) -> Self {
        Self {
            perm_table: PermutationTable::new(seed),
        }
    }

    /// Samples 2D simplex noise at the given coordinates.
    ///
    /// # Returns
    ///
    /// A value in the range [-1, 1].
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let skew = (x + y) * Self::F2;
        let i = fast_floor(x + skew);
        let j = fast_floor(y + skew);

        let unskew = f64::from(i + j) * Self::G2;
        let x0 = x - (f64::from(i) - unskew);
        let y0 = y - (f64::from(j) - unskew);

        // Upper or lower triangle
        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - i1 as f64 + Self::G2;
        let y1 = y0 - j1 as f64 + Self::G2;
        let x2 = x0 - 1.0 + 2.0 * Self::G2;
        let y2 = y0 - 1.0 + 2.0 * Self::G2;

        let ii = (i & 255) as usize;
        let jj = (j & 255) as usize;

        let table = &self.perm_table;
        let gi0 = table.get(ii + table.get(jj) as usize);
        let gi1 = table.get(ii + i1 + table.get(jj + j1) as usize);
        let gi2 = table.get(ii + 1 + table.get(jj + 1) as usize);

        let n0 = corner(x0, y0, gi0);
        let n1 = corner(x1, y1, gi1);
        let n2 = corner(x2, y2, gi2);

        // 70.0 normalizes the sum to [-1, 1]
        (70.0 * (n0 + n1 + n2)).clamp(-1.0, 1.0)
    }

    /// Octaved (fractal) noise in roughly [-1, 1].
    ///
    /// * `octaves` - Number of noise layers (typically 4-8)
    /// * `persistence` - Amplitude decay per octave (typically 0.5)
    /// * `lacunarity` - Frequency increase per octave (typically 2.0)
    #[must_use]
    pub fn octaved(&self, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_amplitude = 0.0;

        for _ in 0..octaves.max(1) {
            total += self.sample(x * frequency, y * frequency) * amplitude;
            max_amplitude += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }

        total / max_amplitude
    }

    /// Octaved noise remapped to `[0, 1]`.
    #[inline]
    #[must_use]
    pub fn normalized(&self, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
        ((self.octaved(x, y, octaves, persistence, lacunarity) + 1.0) * 0.5).clamp(0.0, 1.0)
    }
}

#[inline]
fn corner(x: f64, y: f64, gradient_index: u8) -> f64 {
    let t = 0.5 - x * x - y * y;
    if t < 0.0 {
        0.0
    } else {
        let grad = PermutationTable::gradient(gradient_index);
        let t2 = t * t;
        t2 * t2 * (x * f64::from(grad[0]) + y * f64::from(grad[1]))
    }
}

/// Cellular (Worley F1) noise.
///
/// The plane is cut into square cells of `cell_size` world units; each cell
/// holds one feature point at a hashed offset. A sample is `1` on a feature
/// point and falls toward `0` with distance to the nearest one.
#[derive(Clone, Copy, Debug)]
pub struct CellularNoise {
    seed: SubSeed,
    inv_cell_size: f64,
}

impl CellularNoise {
    /// Largest possible F1 distance (in cell units) with a 3x3 search.
    const MAX_F1: f64 = std::f64::consts::SQRT_2;

    /// Creates a cellular field. `cell_size` is clamped to at least one unit.
    #[must_use]
    pub fn new(seed: SubSeed, cell_size: f64) -> Self {
        Self {
            seed,
            inv_cell_size: 1.0 / cell_size.max(1.0),
        }
    }

    /// Feature point of a cell, in cell units.
    #[inline]
    fn feature_point(&self, cx: i32, cy: i32) -> (f64, f64) {
        let cell = self.seed.derive(&[i64::from(cx), i64::from(cy)]);
        let jx = cell.derive(&[0]).unit();
        let jy = cell.derive(&[1]).unit();
        (f64::from(cx) + jx, f64::from(cy) + jy)
    }

    /// Samples the field. Output in `[0, 1]`.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let px = x * self.inv_cell_size;
        let py = y * self.inv_cell_size;
        let cx = fast_floor(px);
        let cy = fast_floor(py);

        let mut best = f64::INFINITY;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (fx, fy) = self.feature_point(cx + dx, cy + dy);
                let d2 = (fx - px) * (fx - px) + (fy - py) * (fy - py);
                if d2 < best {
                    best = d2;
                }
            }
        }

        (1.0 - best.sqrt() / Self::MAX_F1).clamp(0.0, 1.0)
    }
}

/// Faster than `f64::floor()` for in-range values.
#[inline]
fn fast_floor(x: f64) -> i32 {
    let xi = x as i32;
    if x < f64::from(xi) {
        xi - 1
    } else {
        xi
    }
}
