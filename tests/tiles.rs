use camino::Utf8Path;

use hips_provisioner::domain::{TileCell, TileFormat, TileLayout};
use hips_provisioner::tiles::{TileAddressing, bucket};

#[test]
fn bucket_is_stable_within_a_block() {
    for k in [0u64, 1, 7, 19] {
        for index in [10_000 * k, 10_000 * k + 1, 10_000 * k + 9_999] {
            assert_eq!(bucket(index), 10_000 * k);
        }
    }
}

#[test]
fn plain_paths() {
    let cases = [
        (TileCell::new(0, 3), "Order0/Dir0/Index3.jpg"),
        (TileCell::new(7, 9_999), "Order7/Dir0/Index9999.jpg"),
        (TileCell::new(7, 10_000), "Order7/Dir10000/Index10000.jpg"),
        (TileCell::new(7, 196_607), "Order7/Dir190000/Index196607.jpg"),
    ];
    for (cell, expected) in cases {
        assert_eq!(
            TileLayout::Plain.relative_path(cell, TileFormat::Jpg).as_str(),
            expected
        );
    }
}

#[test]
fn standard_layout_for_remote_servers() {
    let addressing = TileAddressing::new(
        "http://alasky.u-strasbg.fr/DSS/DSSColor",
        TileLayout::Hips,
        TileFormat::Jpg,
    );
    let cell = TileCell::new(6, 45_123);
    assert_eq!(
        addressing.url(cell),
        "http://alasky.u-strasbg.fr/DSS/DSSColor/Norder6/Dir40000/Npix45123.jpg"
    );
    assert_eq!(
        addressing.local_path(Utf8Path::new("public/hips/m42"), cell).as_str(),
        "public/hips/m42/Norder6/Dir40000/Npix45123.jpg"
    );
}
