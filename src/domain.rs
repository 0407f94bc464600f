use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::HipsError;

static DSO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("valid object id pattern"));

/// Stable slug naming an object; doubles as its output directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DsoId(String);

impl DsoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Built-in ids are lowercase slugs already.
    pub(crate) fn from_static(value: &'static str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for DsoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DsoId {
    type Err = HipsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        if !DSO_ID_RE.is_match(&normalized) {
            return Err(HipsError::InvalidDsoId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

impl TryFrom<String> for DsoId {
    type Error = HipsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DsoId> for String {
    fn from(value: DsoId) -> Self {
        value.0
    }
}

/// A deep-sky object with its catalog position and apparent size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DsoRecord {
    pub id: DsoId,
    pub name: String,
    /// Right ascension, degrees.
    pub ra: f64,
    /// Declination, degrees.
    pub dec: f64,
    /// Desired field of view, degrees.
    pub fov: f64,
    /// Viewer field of view below which the overlay is shown.
    #[serde(
        default,
        rename = "showAtFov",
        alias = "show_at_fov",
        skip_serializing_if = "Option::is_none"
    )]
    pub show_at_fov: Option<f64>,
}

impl DsoRecord {
    pub fn validate(&self) -> Result<(), HipsError> {
        let invalid = |reason: &str| HipsError::InvalidRecord {
            id: self.id.to_string(),
            reason: reason.to_string(),
        };
        if !(0.0..360.0).contains(&self.ra) {
            return Err(invalid("ra must be in [0, 360)"));
        }
        if !(-90.0..=90.0).contains(&self.dec) {
            return Err(invalid("dec must be in [-90, 90]"));
        }
        if !(self.fov.is_finite() && self.fov > 0.0) {
            return Err(invalid("fov must be positive"));
        }
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        Ok(())
    }

    /// Cone radius used for tile selection: half the field of view,
    /// widened by [`CONE_SAFETY_FACTOR`].
    pub fn search_radius(&self) -> f64 {
        self.fov / 2.0 * CONE_SAFETY_FACTOR
    }
}

/// Widening applied to the half field of view so tile edges are never clipped.
pub const CONE_SAFETY_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    #[default]
    Jpg,
    Png,
    Fits,
}

impl TileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TileFormat::Jpg => "jpg",
            TileFormat::Png => "png",
            TileFormat::Fits => "fits",
        }
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Directory naming convention for the tile tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TileLayout {
    /// `Order<o>/Dir<bucket>/Index<cell>.<ext>`
    #[default]
    Plain,
    /// IVOA HiPS naming: `Norder<o>/Dir<bucket>/Npix<cell>.<ext>`
    Hips,
}

impl fmt::Display for TileLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileLayout::Plain => write!(f, "plain"),
            TileLayout::Hips => write!(f, "hips"),
        }
    }
}

/// A cell of the hierarchical grid at a given order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCell {
    pub order: u8,
    pub index: u64,
}

impl TileCell {
    pub fn new(order: u8, index: u64) -> Self {
        Self { order, index }
    }
}
