//! Sharded tile addressing shared by the remote survey and the local mirror.

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{TileCell, TileFormat, TileLayout};

/// Cells per `Dir<bucket>` directory.
pub const DIR_FAN_OUT: u64 = 10_000;

pub fn bucket(index: u64) -> u64 {
    index / DIR_FAN_OUT * DIR_FAN_OUT
}

impl TileLayout {
    fn prefixes(self) -> (&'static str, &'static str) {
        match self {
            TileLayout::Plain => ("Order", "Index"),
            TileLayout::Hips => ("Norder", "Npix"),
        }
    }

    /// Relative path of a tile, e.g. `Order3/Dir0/Index512.jpg`.
    pub fn relative_path(self, cell: TileCell, format: TileFormat) -> Utf8PathBuf {
        let (order_prefix, index_prefix) = self.prefixes();
        Utf8PathBuf::from(format!(
            "{order_prefix}{}/Dir{}/{index_prefix}{}.{}",
            cell.order,
            bucket(cell.index),
            cell.index,
            format.extension()
        ))
    }
}

/// Resolves tile cells to remote URLs and local files for one object.
#[derive(Debug, Clone)]
pub struct TileAddressing {
    base_url: String,
    layout: TileLayout,
    format: TileFormat,
}

impl TileAddressing {
    pub fn new(base_url: &str, layout: TileLayout, format: TileFormat) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            layout,
            format,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn format(&self) -> TileFormat {
        self.format
    }

    pub fn relative_path(&self, cell: TileCell) -> Utf8PathBuf {
        self.layout.relative_path(cell, self.format)
    }

    pub fn url(&self, cell: TileCell) -> String {
        format!("{}/{}", self.base_url, self.relative_path(cell))
    }

    pub fn local_path(&self, object_dir: &Utf8Path, cell: TileCell) -> Utf8PathBuf {
        object_dir.join(self.relative_path(cell))
    }

    pub fn properties_url(&self) -> String {
        format!("{}/properties", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_layout_path() {
        let path = TileLayout::Plain.relative_path(TileCell::new(7, 123_456), TileFormat::Jpg);
        assert_eq!(path.as_str(), "Order7/Dir120000/Index123456.jpg");
    }

    #[test]
    fn hips_layout_path() {
        let path = TileLayout::Hips.relative_path(TileCell::new(3, 42), TileFormat::Png);
        assert_eq!(path.as_str(), "Norder3/Dir0/Npix42.png");
    }

    #[test]
    fn url_and_local_share_relative_path() {
        let addressing = TileAddressing::new("http://example.org/DSS/", TileLayout::Plain, TileFormat::Jpg);
        let cell = TileCell::new(0, 5);
        assert_eq!(addressing.url(cell), "http://example.org/DSS/Order0/Dir0/Index5.jpg");
        let local = addressing.local_path(Utf8Path::new("out/m57"), cell);
        assert_eq!(local.as_str(), "out/m57/Order0/Dir0/Index5.jpg");
        assert_eq!(addressing.properties_url(), "http://example.org/DSS/properties");
    }
}
