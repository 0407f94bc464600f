//! Curated deep-sky object catalog and viewer overlay export.

use std::collections::HashSet;
use std::fs;

use camino::Utf8Path;
use serde::Serialize;

use crate::domain::{DsoId, DsoRecord};
use crate::error::HipsError;

/// (id, name, ra, dec, fov, show_at_fov), ordered by right ascension band.
const BUILTIN: &[(&str, &str, f64, f64, f64, f64)] = &[
    ("m31", "Andromeda Galaxy", 10.7, 41.3, 5.0, 50.0),
    ("m32", "M32 Satellite", 10.7, 40.9, 0.5, 8.0),
    ("m110", "M110 Galaxy", 10.1, 41.7, 0.8, 12.0),
    ("m33", "Triangulum Galaxy", 23.4, 30.6, 2.0, 25.0),
    ("ngc253", "Sculptor Galaxy", 11.9, -25.3, 1.5, 20.0),
    ("ngc246", "Skull Nebula", 11.8, -11.9, 0.4, 6.0),
    ("ngc288", "NGC 288 Cluster", 13.2, -26.6, 0.5, 8.0),
    ("ngc55", "NGC 55 Galaxy", 3.7, -39.2, 1.5, 20.0),
    ("smc", "Small Magellanic Cloud", 13.2, -72.8, 5.0, 50.0),
    ("ngc346", "NGC 346 in SMC", 14.8, -72.2, 0.5, 10.0),
    ("ngc362", "NGC 362 Cluster", 15.8, -70.8, 0.5, 8.0),
    ("47tuc", "47 Tucanae", 6.0, -72.1, 0.8, 12.0),
    ("ngc281", "Pacman Nebula", 13.5, 56.6, 1.5, 20.0),
    ("m74", "Phantom Galaxy", 24.2, 15.8, 0.6, 10.0),
    ("ngc869", "Double Cluster h", 34.8, 57.1, 1.0, 15.0),
    ("ngc884", "Double Cluster Chi", 35.1, 57.1, 1.0, 15.0),
    ("ngc1275", "Perseus A", 49.9, 41.5, 0.3, 5.0),
    ("ic1805", "Heart Nebula", 38.2, 61.5, 3.5, 40.0),
    ("ic1848", "Soul Nebula", 43.0, 60.4, 3.0, 35.0),
    ("ngc1499", "California Nebula", 60.2, 36.4, 4.0, 45.0),
    ("ngc1333", "NGC 1333 Nebula", 52.3, 31.3, 0.8, 12.0),
    ("m76", "Little Dumbbell", 25.6, 51.6, 0.3, 5.0),
    ("arp273", "Rose Galaxies", 39.2, 39.4, 0.3, 5.0),
    ("ngc1097", "NGC 1097 Galaxy", 41.6, -30.3, 0.8, 12.0),
    ("fornax_cluster", "Fornax Cluster", 54.6, -35.5, 3.0, 35.0),
    ("ngc1365", "Great Barred Spiral", 53.4, -36.1, 0.8, 12.0),
    ("m45", "Pleiades", 56.7, 24.1, 3.0, 35.0),
    ("m1", "Crab Nebula", 83.6, 22.0, 0.3, 6.0),
    ("m42", "Orion Nebula", 83.8, -5.4, 2.0, 45.0),
    ("ic434", "Horsehead Nebula", 85.2, -2.5, 1.5, 20.0),
    ("ngc2024", "Flame Nebula", 85.4, -1.9, 1.0, 15.0),
    ("ic2118", "Witch Head Nebula", 81.0, -7.2, 4.0, 45.0),
    ("ic405", "Flaming Star Nebula", 81.5, 34.3, 1.5, 20.0),
    ("lmc", "Large Magellanic Cloud", 80.9, -69.8, 10.0, 70.0),
    ("ngc2070", "Tarantula Nebula", 84.7, -69.1, 1.5, 20.0),
    ("sim147", "Simeis 147 SNR", 84.0, 28.0, 4.0, 45.0),
    ("rosette", "Rosette Nebula", 98.0, 5.0, 3.0, 35.0),
    ("ngc2264", "Cone Nebula", 100.2, 9.9, 1.5, 20.0),
    ("ic443", "Jellyfish Nebula", 94.2, 22.7, 1.5, 20.0),
    ("ngc2359", "Thors Helmet", 109.6, -13.2, 0.5, 10.0),
    ("m35", "M35 Cluster", 92.2, 24.3, 0.8, 12.0),
    ("gum12", "Gum 12 Nebula", 121.2, -44.6, 3.0, 35.0),
    ("puppisa", "Puppis A SNR", 125.5, -43.0, 1.5, 20.0),
    ("vela_snr", "Vela SNR", 128.8, -45.2, 8.0, 60.0),
    ("ngc2736", "Pencil Nebula", 136.4, -45.9, 0.8, 12.0),
    ("m44", "Beehive Cluster", 130.1, 19.7, 2.0, 25.0),
    ("m81", "Bodes Galaxy", 148.9, 69.1, 1.5, 20.0),
    ("m82", "Cigar Galaxy", 148.9, 69.7, 0.8, 12.0),
    ("ngc2903", "NGC 2903 Galaxy", 143.0, 21.5, 0.8, 12.0),
    ("m65", "Leo Triplet M65", 169.7, 13.1, 0.6, 10.0),
    ("m66", "Leo Triplet M66", 170.1, 12.9, 0.6, 10.0),
    ("ngc3628", "Hamburger Galaxy", 170.1, 13.6, 0.8, 12.0),
    ("ngc3372", "Eta Carinae Nebula", 161.2, -59.7, 3.0, 35.0),
    ("ngc3576", "Statue of Liberty", 168.1, -61.3, 1.0, 15.0),
    ("ic2944", "Running Chicken", 176.0, -63.0, 2.0, 25.0),
    ("ngc3132", "Eight-Burst Nebula", 151.8, -40.4, 0.3, 5.0),
    ("ngc4038", "Antennae Galaxies", 180.5, -18.9, 0.5, 8.0),
    ("m104", "Sombrero Galaxy", 190.0, -11.6, 0.6, 10.0),
    ("ngc4565", "Needle Galaxy", 189.1, 25.9, 1.0, 15.0),
    ("m64", "Black Eye Galaxy", 194.2, 21.7, 0.6, 10.0),
    ("m51", "Whirlpool Galaxy", 202.5, 47.2, 0.8, 12.0),
    ("ngc5139", "Omega Centauri", 201.7, -47.5, 1.0, 15.0),
    ("ngc5128", "Centaurus A", 201.4, -43.0, 1.0, 15.0),
    ("coalsack", "Coalsack Nebula", 192.0, -64.0, 7.0, 60.0),
    ("m101", "Pinwheel Galaxy", 210.8, 54.3, 1.5, 20.0),
    ("m3", "M3 Cluster", 205.5, 28.4, 0.5, 8.0),
    ("m5", "M5 Cluster", 229.6, 2.1, 0.5, 8.0),
    ("m106", "M106 Galaxy", 184.7, 47.3, 1.0, 15.0),
    ("ngc5822", "NGC 5822 Cluster", 226.0, -54.3, 0.5, 8.0),
    ("ngc6334", "Cats Paw Nebula", 260.8, -36.0, 1.5, 20.0),
    ("ngc6357", "Lobster Nebula", 262.0, -34.2, 2.0, 25.0),
    ("ic4628", "Prawn Nebula", 254.0, -40.4, 2.0, 25.0),
    ("ngc6188", "Fighting Dragons", 250.5, -48.8, 2.0, 25.0),
    ("m13", "Hercules Cluster", 250.4, 36.5, 0.5, 10.0),
    ("ngc6543", "Cats Eye Nebula", 269.6, 66.6, 0.2, 4.0),
    ("rho_oph", "Rho Ophiuchi Cloud", 247.0, -24.0, 5.0, 50.0),
    ("m4", "M4 Cluster", 245.9, -26.5, 0.5, 8.0),
    ("m8", "Lagoon Nebula", 271.1, -24.4, 2.5, 40.0),
    ("m20", "Trifid Nebula", 270.6, -23.0, 1.5, 20.0),
    ("m16", "Eagle Nebula", 274.7, -13.8, 2.0, 25.0),
    ("m17", "Omega Nebula", 275.2, -16.1, 2.0, 25.0),
    ("m57", "Ring Nebula", 283.4, 33.0, 0.3, 5.0),
    ("m27", "Dumbbell Nebula", 299.9, 22.7, 0.5, 8.0),
    ("ngc6726", "Corona Australis", 285.3, -36.9, 1.5, 20.0),
    ("m22", "M22 Cluster", 279.1, -23.9, 0.5, 8.0),
    ("ngc7000", "North America Nebula", 314.8, 44.3, 4.0, 45.0),
    ("ic5070", "Pelican Nebula", 312.8, 44.4, 2.5, 30.0),
    ("ngc6960", "Western Veil Nebula", 311.4, 30.7, 4.0, 45.0),
    ("ngc6992", "Eastern Veil Nebula", 314.5, 31.7, 3.0, 35.0),
    ("ngc6888", "Crescent Nebula", 303.1, 38.4, 0.5, 10.0),
    ("ic1318", "Gamma Cygni Nebula", 305.3, 40.2, 4.0, 45.0),
    ("ic1396", "Elephant Trunk", 324.7, 57.5, 4.0, 45.0),
    ("sh2_129", "Flying Bat Nebula", 315.5, 60.5, 4.0, 45.0),
    ("ngc7023", "Iris Nebula", 315.6, 68.2, 0.5, 10.0),
    ("ngc6946", "Fireworks Galaxy", 308.7, 60.2, 0.8, 12.0),
    ("ngc7293", "Helix Nebula", 337.4, -20.8, 1.0, 15.0),
    ("ngc7635", "Bubble Nebula", 350.2, 61.2, 0.5, 10.0),
    ("ngc7380", "Wizard Nebula", 341.8, 58.1, 1.0, 15.0),
    ("sh2_155", "Cave Nebula", 343.0, 62.6, 1.5, 20.0),
    ("ngc7331", "NGC 7331 Galaxy", 339.3, 34.4, 0.7, 10.0),
    ("stephans_quintet", "Stephans Quintet", 339.0, 33.9, 0.3, 5.0),
];

/// The built-in catalog, in provisioning order.
pub fn builtin() -> Vec<DsoRecord> {
    BUILTIN
        .iter()
        .map(|&(id, name, ra, dec, fov, show_at_fov)| DsoRecord {
            id: DsoId::from_static(id),
            name: name.to_string(),
            ra,
            dec,
            fov,
            show_at_fov: Some(show_at_fov),
        })
        .collect()
}

/// Load a JSON array of records, falling back to the built-in catalog when
/// no path is given. The result is validated.
pub fn load(path: Option<&Utf8Path>) -> Result<Vec<DsoRecord>, HipsError> {
    let records = match path {
        None => builtin(),
        Some(path) => {
            let content = fs::read_to_string(path.as_std_path())
                .map_err(|_| HipsError::CatalogRead(path.as_std_path().to_path_buf()))?;
            serde_json::from_str::<Vec<DsoRecord>>(&content)
                .map_err(|err| HipsError::CatalogParse(err.to_string()))?
        }
    };
    validate(&records)?;
    Ok(records)
}

pub fn validate(records: &[DsoRecord]) -> Result<(), HipsError> {
    if records.is_empty() {
        return Err(HipsError::EmptyCatalog);
    }
    let mut seen = HashSet::new();
    for record in records {
        record.validate()?;
        if !seen.insert(record.id.as_str()) {
            return Err(HipsError::DuplicateId(record.id.to_string()));
        }
    }
    Ok(())
}

/// Restrict the catalog to `only`, keeping catalog order. An empty filter
/// selects everything.
pub fn select(records: Vec<DsoRecord>, only: &[DsoId]) -> Result<Vec<DsoRecord>, HipsError> {
    if only.is_empty() {
        return Ok(records);
    }
    if let Some(unknown) = only
        .iter()
        .find(|id| !records.iter().any(|record| &record.id == *id))
    {
        return Err(HipsError::UnknownDso(unknown.to_string()));
    }
    Ok(records
        .into_iter()
        .filter(|record| only.contains(&record.id))
        .collect())
}

/// Entry consumed by the sky viewer to place a local pyramid as an overlay.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverlayEntry {
    pub id: String,
    pub name: String,
    pub path: String,
    pub show_at_fov: Option<f64>,
}

pub fn overlay_list(records: &[DsoRecord], prefix: &str) -> Vec<OverlayEntry> {
    let prefix = prefix.trim_end_matches('/');
    records
        .iter()
        .map(|record| OverlayEntry {
            id: record.id.to_string(),
            name: record.name.clone(),
            path: if prefix.is_empty() {
                format!("{}/", record.id)
            } else {
                format!("{prefix}/{}/", record.id)
            },
            show_at_fov: record.show_at_fov,
        })
        .collect()
}
