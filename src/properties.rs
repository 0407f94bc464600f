//! HiPS `properties` descriptors: the shared survey descriptor layered under
//! per-object keys.

use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{DsoRecord, TileFormat};
use crate::fetch::{HttpReply, TileSource};

/// Ordered `key = value` record. Replacing a key keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyRecord {
    entries: Vec<(String, String)>,
}

impl PropertyRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_text(&self) -> String {
        self.iter()
            .map(|(key, value)| format!("{key} = {value}\n"))
            .collect()
    }
}

/// Parse `key = value` lines. Splits at the first `=`; comments, lines
/// without `=` and blank keys are skipped.
pub fn parse_properties(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Decimal rendering that always carries a fractional part (`10.0`, `0.3`).
pub fn format_degrees(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') || !value.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}

/// Survey-wide descriptor, fetched at most once per run.
///
/// The lock is held across the request so concurrent callers wait for the
/// first fetch instead of issuing their own. Failures are not cached.
pub struct BaseProperties {
    url: String,
    timeout: Duration,
    cached: Mutex<Option<String>>,
}

impl BaseProperties {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            cached: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Cached descriptor text, or an empty string when the survey could
    /// not be reached.
    pub fn get<S: TileSource + ?Sized>(&self, source: &S) -> String {
        let mut cached = match self.cached.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(text) = cached.as_ref() {
            return text.clone();
        }
        match source.get(&self.url, self.timeout) {
            Ok(HttpReply::Body(body)) => {
                let text = String::from_utf8_lossy(&body).into_owned();
                debug!(url = %self.url, bytes = body.len(), "cached base properties");
                *cached = Some(text.clone());
                text
            }
            Ok(HttpReply::NotFound) => {
                warn!(url = %self.url, "base properties not found; using defaults");
                String::new()
            }
            Ok(HttpReply::Status(status)) => {
                warn!(url = %self.url, status, "failed to fetch base properties; using defaults");
                String::new()
            }
            Err(err) => {
                warn!(url = %self.url, error = %err, "failed to fetch base properties; using defaults");
                String::new()
            }
        }
    }

    pub fn is_cached(&self) -> bool {
        match self.cached.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }
}

/// Layer defaults, the base descriptor and the object keys, in that order
/// of increasing precedence.
pub fn synthesize(
    record: &DsoRecord,
    max_order: u8,
    base_text: &str,
    did_prefix: &str,
    format: TileFormat,
) -> PropertyRecord {
    let mut props = PropertyRecord::new();
    props.set("hips_tile_format", format.extension());
    props.set("hips_frame", "equatorial");
    props.set("hips_order", max_order.to_string());
    props.set("hips_pixel_scale", "0.01");

    for (key, value) in parse_properties(base_text) {
        props.set(key, value);
    }

    props.set(
        "creator_did",
        format!("{}/{}", did_prefix.trim_end_matches('/'), record.id),
    );
    props.set("obs_title", record.name.clone());
    props.set("hips_initial_ra", format_degrees(record.ra));
    props.set("hips_initial_dec", format_degrees(record.dec));
    props.set("hips_initial_fov", format_degrees(record.fov));
    props.set("hips_order", max_order.to_string());
    props
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring() -> DsoRecord {
        DsoRecord {
            id: "m57".parse().unwrap(),
            name: "Ring Nebula".to_string(),
            ra: 283.4,
            dec: 33.0,
            fov: 0.3,
            show_at_fov: None,
        }
    }

    #[test]
    fn replacing_keeps_position() {
        let mut record = PropertyRecord::new();
        record.set("a", "1");
        record.set("b", "2");
        record.set("a", "3");
        assert_eq!(record.to_text(), "a = 3\nb = 2\n");
    }

    #[test]
    fn parse_splits_on_first_equals() {
        let parsed = parse_properties("# comment\nobs_copyright = a=b \n\n = orphan\nnoequals\n");
        assert_eq!(
            parsed,
            vec![("obs_copyright".to_string(), "a=b".to_string())]
        );
    }

    #[test]
    fn degrees_always_have_fraction() {
        assert_eq!(format_degrees(10.0), "10.0");
        assert_eq!(format_degrees(0.3), "0.3");
        assert_eq!(format_degrees(-5.0), "-5.0");
        assert_eq!(format_degrees(283.4), "283.4");
    }

    #[test]
    fn synthesize_without_base() {
        let props = synthesize(&ring(), 7, "", "ivo://CDS/P/DSS2/color", TileFormat::Jpg);
        let expected = "hips_tile_format = jpg\n\
                        hips_frame = equatorial\n\
                        hips_order = 7\n\
                        hips_pixel_scale = 0.01\n\
                        creator_did = ivo://CDS/P/DSS2/color/m57\n\
                        obs_title = Ring Nebula\n\
                        hips_initial_ra = 283.4\n\
                        hips_initial_dec = 33.0\n\
                        hips_initial_fov = 0.3\n";
        assert_eq!(props.to_text(), expected);
    }

    #[test]
    fn base_overrides_defaults_but_not_object_keys() {
        let base = "hips_order = 11\nhips_frame = galactic\nobs_title = DSS colored\nhips_tile_width = 512\n";
        let props = synthesize(&ring(), 7, base, "ivo://x", TileFormat::Jpg);
        assert_eq!(props.get("hips_frame"), Some("galactic"));
        assert_eq!(props.get("hips_tile_width"), Some("512"));
        assert_eq!(props.get("hips_order"), Some("7"));
        assert_eq!(props.get("obs_title"), Some("Ring Nebula"));
    }
}
