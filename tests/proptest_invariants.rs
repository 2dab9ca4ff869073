//! Property tests for the deterministic primitives and world invariants.

use alice_physics2d::{Aabb, BodyType, Fix128, Vec2Fix, World};
use proptest::prelude::*;

fn fix() -> impl Strategy<Value = Fix128> {
    (-1_000_000i64..1_000_000, 1i64..1_000).prop_map(|(n, d)| Fix128::from_ratio(n, d))
}

fn vec2() -> impl Strategy<Value = Vec2Fix> {
    (fix(), fix()).prop_map(|(x, y)| Vec2Fix::new(x, y))
}

fn aabb() -> impl Strategy<Value = Aabb> {
    (fix(), fix(), fix(), fix()).prop_map(|(t, b, l, r)| Aabb::new(t, b, l, r))
}

// ============================================================================
// Fixed-point algebra
// ============================================================================

proptest! {
    #[test]
    fn prop_add_sub_inverse(a in fix(), b in fix()) {
        prop_assert_eq!((a + b) - b, a);
    }

    #[test]
    fn prop_mul_commutes(a in fix(), b in fix()) {
        prop_assert_eq!(a * b, b * a);
    }

    #[test]
    fn prop_mul_sign_symmetric(a in fix(), b in fix()) {
        // Sign-magnitude product: negating an operand negates the result exactly
        prop_assert_eq!((-a) * b, -(a * b));
        prop_assert_eq!(a * (-b), -(a * b));
    }

    #[test]
    fn prop_div_by_zero_is_zero(a in fix()) {
        prop_assert_eq!(a / Fix128::ZERO, Fix128::ZERO);
    }

    #[test]
    fn prop_sqrt_of_square(a in -10_000i64..10_000, d in 1i64..100) {
        let x = Fix128::from_ratio(a, d);
        let root = (x * x).sqrt();
        prop_assert!((root.to_f64() - x.abs().to_f64()).abs() < 1e-9);
        // Negative input is clamped, not propagated
        prop_assert_eq!((-(x * x)).sqrt(), Fix128::ZERO);
    }

    #[test]
    fn prop_polar_is_unit(angle in fix()) {
        let v = Vec2Fix::polar(angle);
        prop_assert!((v.length().to_f64() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn prop_rotation_round_trip(v in vec2(), angle in -7i64..7) {
        let facing = Vec2Fix::polar(Fix128::from_int(angle));
        let back = v.rotate_by(facing).inv_rotate_by(facing);
        prop_assert!((back.x - v.x).abs().to_f64() < 1e-6);
        prop_assert!((back.y - v.y).abs().to_f64() < 1e-6);
    }

    #[test]
    fn prop_cross_antisymmetric(a in vec2(), b in vec2()) {
        prop_assert_eq!(a.cross(b), -b.cross(a));
    }
}

// ============================================================================
// AABB
// ============================================================================

proptest! {
    #[test]
    fn prop_aabb_ordered(b in aabb()) {
        prop_assert!(b.left() <= b.right());
        prop_assert!(b.bottom() <= b.top());
    }

    #[test]
    fn prop_aabb_corners_commute(p in vec2(), q in vec2()) {
        prop_assert_eq!(Aabb::from_corners(p, q), Aabb::from_corners(q, p));
    }

    #[test]
    fn prop_merged_contains_both(a in aabb(), b in aabb()) {
        let m = a.merged(&b);
        prop_assert!(m.contains(&a));
        prop_assert!(m.contains(&b));
    }

    #[test]
    fn prop_swept_contains_endpoints(a in aabb(), delta in vec2()) {
        let s = a.swept(delta);
        prop_assert!(s.contains(&a));
        prop_assert!(s.contains(&a.translated(delta)));
    }

    #[test]
    fn prop_intersects_symmetric(a in aabb(), b in aabb()) {
        prop_assert_eq!(a.intersects(&b), b.intersects(&a));
    }
}

// ============================================================================
// World
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_static_bodies_never_move(
        xs in prop::collection::vec(-20i64..20, 1..6),
        vx in -30i64..30,
    ) {
        let mut world = World::default();
        let wall_shape = world.create_circle_body_space(Vec2Fix::ZERO, Fix128::ONE).unwrap();
        let wall = world
            .create_static_body(Vec2Fix::ZERO, Fix128::ZERO, vec![wall_shape])
            .unwrap();
        for (i, x) in xs.iter().enumerate() {
            let shape = world.create_circle_body_space(Vec2Fix::ZERO, Fix128::HALF).unwrap();
            let body = world
                .create_dynamic_body(Vec2Fix::from_int(*x, i as i64), Fix128::ZERO, vec![shape])
                .unwrap();
            world.set_linear_velocity(body, Vec2Fix::from_int(vx, 0)).unwrap();
        }

        let before = world.snapshot(wall).unwrap();
        for _ in 0..20 {
            world.update();
        }
        prop_assert_eq!(world.snapshot(wall).unwrap(), before);
        prop_assert_eq!(world.body(wall).unwrap().body_type(), BodyType::Static);
    }
}
