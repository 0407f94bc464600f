//! HEALPix NESTED geometry and cone coverage.
//!
//! The sky is split into 12 base cells; at order `o` every base cell is a
//! `2^o x 2^o` grid, and NESTED indices place the four children of cell `p`
//! at `4p..4p+3`. Cone coverage walks that hierarchy on unit vectors, so the
//! ra = 0/360 seam and the poles need no special casing.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Deepest order whose indices fit the bit interleaving below.
pub const MAX_DEPTH: u8 = 29;

/// Boundary samples per cell edge used for pruning.
const BOUNDARY_STEP: usize = 8;

/// Leaf outlines at orders up to this one are sampled more densely, so the
/// sampling tolerance of the final test stays near that of an order-8 cell.
const FINE_ORDER: u8 = 8;

/// Ring offset of each base cell's southern corner.
const JRLL: [i64; 12] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
/// Longitude offset of each base cell, in units of pi/4.
const JPLL: [i64; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

/// A point on the unit sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl SkyVector {
    pub fn from_radec(ra_deg: f64, dec_deg: f64) -> Self {
        let (ra, dec) = (ra_deg.to_radians(), dec_deg.to_radians());
        let cos_dec = dec.cos();
        Self {
            x: cos_dec * ra.cos(),
            y: cos_dec * ra.sin(),
            z: dec.sin(),
        }
    }

    fn from_z_phi(z: f64, phi: f64, sin_theta: Option<f64>) -> Self {
        let sin_theta = sin_theta.unwrap_or_else(|| ((1.0 - z) * (1.0 + z)).max(0.0).sqrt());
        Self {
            x: sin_theta * phi.cos(),
            y: sin_theta * phi.sin(),
            z,
        }
    }

    /// (ra, dec) in degrees, ra in [0, 360).
    pub fn to_radec(self) -> (f64, f64) {
        let mut ra = self.y.atan2(self.x).to_degrees().rem_euclid(360.0);
        if ra >= 360.0 {
            ra = 0.0;
        }
        let dec = self.z.atan2(self.x.hypot(self.y)).to_degrees();
        (ra, dec)
    }

    fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    fn cross_norm(self, other: Self) -> f64 {
        let cx = self.y * other.z - self.z * other.y;
        let cy = self.z * other.x - self.x * other.z;
        let cz = self.x * other.y - self.y * other.x;
        (cx * cx + cy * cy + cz * cz).sqrt()
    }

    /// Great-circle distance in radians, accurate at both small and large
    /// separations.
    pub fn angular_distance(self, other: Self) -> f64 {
        self.cross_norm(other).atan2(self.dot(other))
    }
}

pub fn nside(order: u8) -> u64 {
    1u64 << order
}

/// Number of cells covering the sphere at `order`.
pub fn cell_count(order: u8) -> u64 {
    12 * nside(order) * nside(order)
}

/// NESTED index of the cell containing (ra, dec) at `order`.
pub fn cell_at(ra_deg: f64, dec_deg: f64, order: u8) -> u64 {
    cell_of(SkyVector::from_radec(ra_deg, dec_deg), order)
}

pub fn cell_of(v: SkyVector, order: u8) -> u64 {
    debug_assert!(order <= MAX_DEPTH);
    let nside = nside(order) as i64;
    let z = v.z.clamp(-1.0, 1.0);
    let za = z.abs();
    let mut tt = v.y.atan2(v.x).rem_euclid(TAU) / FRAC_PI_2;
    if tt >= 4.0 {
        tt = 0.0;
    }

    let (face, ix, iy) = if za <= 2.0 / 3.0 {
        // equatorial belt: locate the ascending and descending edge lines
        let temp1 = nside as f64 * (0.5 + tt);
        let temp2 = nside as f64 * (z * 0.75);
        let jp = (temp1 - temp2) as i64;
        let jm = (temp1 + temp2) as i64;
        let ifp = jp >> order;
        let ifm = jm >> order;
        let face = if ifp == ifm {
            ifp | 4
        } else if ifp < ifm {
            ifp
        } else {
            ifm + 8
        };
        (face, jm & (nside - 1), nside - (jp & (nside - 1)) - 1)
    } else {
        let ntt = (tt as i64).min(3);
        let tp = tt - ntt as f64;
        let tmp = nside as f64 * (3.0 * (1.0 - za)).sqrt();
        let jp = ((tp * tmp) as i64).min(nside - 1);
        let jm = (((1.0 - tp) * tmp) as i64).min(nside - 1);
        if z > 0.0 {
            (ntt, nside - jm - 1, nside - jp - 1)
        } else {
            (ntt + 8, jp, jm)
        }
    };

    xyf_to_cell(order, ix as u64, iy as u64, face as u64)
}

/// Center of a cell.
pub fn cell_center(order: u8, index: u64) -> SkyVector {
    let (face, ix, iy) = cell_to_xyf(order, index);
    let n = nside(order) as f64;
    face_point((ix as f64 + 0.5) / n, (iy as f64 + 0.5) / n, face)
}

/// Points along the cell outline, `step` per edge, counter-clockwise from
/// the north corner.
pub fn cell_boundary(order: u8, index: u64, step: usize) -> Vec<SkyVector> {
    let (face, ix, iy) = cell_to_xyf(order, index);
    let n = nside(order) as f64;
    let half = 0.5 / n;
    let xc = (ix as f64 + 0.5) / n;
    let yc = (iy as f64 + 0.5) / n;
    let d = 1.0 / (step as f64 * n);

    let mut points = Vec::with_capacity(4 * step);
    for i in 0..step {
        points.push(face_point(xc + half - i as f64 * d, yc + half, face));
    }
    for i in 0..step {
        points.push(face_point(xc - half, yc + half - i as f64 * d, face));
    }
    for i in 0..step {
        points.push(face_point(xc - half + i as f64 * d, yc - half, face));
    }
    for i in 0..step {
        points.push(face_point(xc + half, yc - half + i as f64 * d, face));
    }
    points
}

/// Cells at `order` whose area intersects the cone of `radius_deg` around
/// (ra, dec), sorted ascending.
pub fn query_cone(ra_deg: f64, dec_deg: f64, radius_deg: f64, order: u8) -> Vec<u64> {
    debug_assert!(order <= MAX_DEPTH);
    let radius = radius_deg.to_radians();
    if radius >= PI {
        return (0..cell_count(order)).collect();
    }
    let axis = SkyVector::from_radec(ra_deg, dec_deg);
    let home = cell_of(axis, order);

    let mut found = Vec::new();
    let mut stack: Vec<(u8, u64)> = (0..12).rev().map(|base| (0, base)).collect();
    while let Some((depth, index)) = stack.pop() {
        if !CellShape::new(depth, index, BOUNDARY_STEP).may_intersect(axis, radius) {
            continue;
        }
        if depth == order {
            if index == home
                || CellShape::new(depth, index, leaf_step(depth)).reaches(axis, radius)
            {
                found.push(index);
            }
        } else {
            for child in (0..4).rev() {
                stack.push((depth + 1, index * 4 + child));
            }
        }
    }
    found.sort_unstable();
    found
}

/// Independent cone coverage for every order in `0..=max_order`.
pub fn query_cone_per_order(
    ra_deg: f64,
    dec_deg: f64,
    radius_deg: f64,
    max_order: u8,
) -> Vec<Vec<u64>> {
    (0..=max_order)
        .map(|order| query_cone(ra_deg, dec_deg, radius_deg, order))
        .collect()
}

struct CellShape {
    center: SkyVector,
    boundary: Vec<SkyVector>,
    /// Largest gap between consecutive boundary samples, radians.
    spacing: f64,
}

fn leaf_step(order: u8) -> usize {
    BOUNDARY_STEP << FINE_ORDER.saturating_sub(order)
}

impl CellShape {
    fn new(order: u8, index: u64, step: usize) -> Self {
        let boundary = cell_boundary(order, index, step);
        let spacing = boundary
            .iter()
            .zip(boundary.iter().cycle().skip(1))
            .map(|(a, b)| a.angular_distance(*b))
            .fold(0.0, f64::max);
        Self {
            center: cell_center(order, index),
            boundary,
            spacing,
        }
    }

    /// Upper bound on the distance from the center to any point of the cell.
    fn bounding_radius(&self) -> f64 {
        self.boundary
            .iter()
            .map(|point| self.center.angular_distance(*point))
            .fold(0.0, f64::max)
            + self.spacing
    }

    /// Conservative test used to prune whole subtrees.
    fn may_intersect(&self, axis: SkyVector, radius: f64) -> bool {
        axis.angular_distance(self.center) <= radius + self.bounding_radius()
    }

    /// Whether the cone reaches the sampled outline. Together with the
    /// containing cell this decides intersection.
    fn reaches(&self, axis: SkyVector, radius: f64) -> bool {
        self.boundary
            .iter()
            .any(|point| axis.angular_distance(*point) <= radius + self.spacing)
    }
}

/// Position on base cell `face` at local coordinates `x`, `y` in [0, 1].
fn face_point(x: f64, y: f64, face: usize) -> SkyVector {
    let jr = JRLL[face] as f64 - x - y;
    let (nr, z, sin_theta) = if jr < 1.0 {
        let tmp = jr * jr / 3.0;
        (jr, 1.0 - tmp, Some((tmp * (2.0 - tmp)).sqrt()))
    } else if jr > 3.0 {
        let nr = 4.0 - jr;
        let tmp = nr * nr / 3.0;
        (nr, tmp - 1.0, Some((tmp * (2.0 - tmp)).sqrt()))
    } else {
        (1.0, (2.0 - jr) * 2.0 / 3.0, None)
    };

    let mut tmp = JPLL[face] as f64 * nr + x - y;
    if tmp < 0.0 {
        tmp += 8.0;
    }
    if tmp >= 8.0 {
        tmp -= 8.0;
    }
    let phi = if nr < 1e-15 {
        0.0
    } else {
        0.5 * FRAC_PI_2 * tmp / nr
    };
    SkyVector::from_z_phi(z, phi, sin_theta)
}

fn xyf_to_cell(order: u8, ix: u64, iy: u64, face: u64) -> u64 {
    (face << (2 * order as u32)) + spread_bits(ix) + (spread_bits(iy) << 1)
}

fn cell_to_xyf(order: u8, index: u64) -> (usize, u64, u64) {
    let shift = 2 * order as u32;
    let face = (index >> shift) as usize;
    let local = index & ((1u64 << shift) - 1);
    (face, compress_bits(local), compress_bits(local >> 1))
}

/// Moves bit `i` of `value` to bit `2i`.
fn spread_bits(value: u64) -> u64 {
    (0..32).fold(0, |acc, bit| acc | (((value >> bit) & 1) << (2 * bit)))
}

/// Collects the even bits of `value`.
fn compress_bits(value: u64) -> u64 {
    (0..32).fold(0, |acc, bit| acc | (((value >> (2 * bit)) & 1) << bit))
}
