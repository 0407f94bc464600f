//! Field of view to pyramid depth policy.

/// Deepest order any object is provisioned to.
pub const MAX_ORDER_CAP: u8 = 7;

/// (minimum fov in degrees, order), widest first.
const THRESHOLDS: &[(f64, u8)] = &[(10.0, 2), (6.0, 3), (3.0, 4), (1.5, 5), (0.8, 6)];

/// Maximum pyramid order for an object spanning `fov_deg` degrees.
///
/// Wide objects only need coarse tiles; narrow ones go deeper, up to
/// [`MAX_ORDER_CAP`]. The first threshold the field of view reaches wins.
pub fn max_order(fov_deg: f64) -> u8 {
    THRESHOLDS
        .iter()
        .find(|(min_fov, _)| fov_deg >= *min_fov)
        .map(|(_, order)| *order)
        .unwrap_or(MAX_ORDER_CAP)
}
