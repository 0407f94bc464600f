use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use hips_provisioner::domain::{DsoRecord, TileFormat};
use hips_provisioner::error::HipsError;
use hips_provisioner::fetch::{HttpReply, TileSource};
use hips_provisioner::properties::{BaseProperties, format_degrees, parse_properties, synthesize};

struct SlowSurvey {
    reply: HttpReply,
    calls: Mutex<usize>,
}

impl TileSource for SlowSurvey {
    fn get(&self, _url: &str, _timeout: Duration) -> Result<HttpReply, HipsError> {
        *self.calls.lock().unwrap() += 1;
        thread::sleep(Duration::from_millis(20));
        Ok(self.reply.clone())
    }
}

fn crab() -> DsoRecord {
    DsoRecord {
        id: "m1".parse().unwrap(),
        name: "Crab Nebula".to_string(),
        ra: 83.6,
        dec: 22.0,
        fov: 10.0,
        show_at_fov: None,
    }
}

#[test]
fn object_keys_override_base_and_defaults() {
    let base = "hips_frame = galactic\nhips_initial_fov = 180\ncreator_did = ivo://CDS/P/DSS2/color\nhips_pixel_scale = 1.0\n";
    let props = synthesize(&crab(), 2, base, "ivo://CDS/P/DSS2/color", TileFormat::Jpg);
    assert_eq!(props.get("creator_did"), Some("ivo://CDS/P/DSS2/color/m1"));
    assert_eq!(props.get("hips_initial_fov"), Some("10.0"));
    assert_eq!(props.get("hips_initial_ra"), Some("83.6"));
    assert_eq!(props.get("hips_initial_dec"), Some("22.0"));
    assert_eq!(props.get("hips_order"), Some("2"));
    assert_eq!(props.get("hips_frame"), Some("galactic"));
    assert_eq!(props.get("hips_pixel_scale"), Some("1.0"));

    let keys: Vec<&str> = props.iter().map(|(key, _)| key).collect();
    assert_eq!(
        &keys[..4],
        &["hips_tile_format", "hips_frame", "hips_order", "hips_pixel_scale"]
    );
}

#[test]
fn tile_format_default_follows_configuration() {
    let props = synthesize(&crab(), 2, "", "ivo://x", TileFormat::Png);
    assert_eq!(props.get("hips_tile_format"), Some("png"));
}

#[test]
fn parse_trims_keys_and_values() {
    let parsed = parse_properties("  hips_order=9  \r\nobs_regime = Optical\n");
    assert_eq!(parsed[0], ("hips_order".to_string(), "9".to_string()));
    assert_eq!(parsed[1], ("obs_regime".to_string(), "Optical".to_string()));
}

#[test]
fn degrees_render_with_fraction() {
    assert_eq!(format_degrees(0.0), "0.0");
    assert_eq!(format_degrees(-69.8), "-69.8");
    assert_eq!(format_degrees(180.0), "180.0");
}

#[test]
fn base_fetched_once_under_concurrency() {
    let survey = SlowSurvey {
        reply: HttpReply::Body(b"hips_order = 9\n".to_vec()),
        calls: Mutex::new(0),
    };
    let base = BaseProperties::new("http://mock.test/properties", Duration::from_secs(10));
    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| assert_eq!(base.get(&survey), "hips_order = 9\n"));
        }
    });
    assert_eq!(*survey.calls.lock().unwrap(), 1);
    assert!(base.is_cached());
}

#[test]
fn failed_base_is_not_cached() {
    let survey = SlowSurvey {
        reply: HttpReply::Status(502),
        calls: Mutex::new(0),
    };
    let base = BaseProperties::new("http://mock.test/properties", Duration::from_secs(10));
    assert_eq!(base.get(&survey), "");
    assert_eq!(base.get(&survey), "");
    assert_eq!(*survey.calls.lock().unwrap(), 2);
    assert!(!base.is_cached());
}
