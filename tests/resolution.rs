use hips_provisioner::resolution::{MAX_ORDER_CAP, max_order};

#[test]
fn boundaries_at_each_threshold() {
    let cases = [
        (10.0, 2),
        (9.999, 3),
        (6.0, 3),
        (5.999, 4),
        (3.0, 4),
        (2.999, 5),
        (1.5, 5),
        (1.499, 6),
        (0.8, 6),
        (0.799, 7),
    ];
    for (fov, order) in cases {
        assert_eq!(max_order(fov), order, "fov {fov}");
    }
}

#[test]
fn order_never_increases_with_fov() {
    let mut previous = MAX_ORDER_CAP;
    for step in 1..=4000 {
        let fov = step as f64 * 0.005;
        let order = max_order(fov);
        assert!((2..=MAX_ORDER_CAP).contains(&order));
        assert!(order <= previous, "fov {fov}");
        previous = order;
    }
    assert_eq!(max_order(0.3), 7);
    assert_eq!(max_order(120.0), 2);
}
