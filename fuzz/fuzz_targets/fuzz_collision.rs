#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use alice_physics2d::collision::collide;
use alice_physics2d::config::MAX_CONTACTS;
use alice_physics2d::{Fix128, ShapeMaterial, Shape, ShapeSpace, Vec2Fix};

#[derive(Debug, Arbitrary)]
struct CollisionInput {
    /// Polygon vertices for shape A (raw integer grid)
    a: Vec<(i8, i8)>,
    /// Circle center and radius for shape B
    center: (i8, i8),
    radius: u8,
    /// Polygon vertices for shape C
    c: Vec<(i8, i8)>,
}

fn polygon(points: &[(i8, i8)]) -> Option<Shape> {
    let verts: Vec<Vec2Fix> = points
        .iter()
        .take(8)
        .map(|&(x, y)| Vec2Fix::from_int(x as i64, y as i64))
        .collect();
    Shape::polygon(&verts, ShapeSpace::Body, ShapeMaterial::default()).ok()
}

// Arbitrary (possibly degenerate or non-convex) geometry through every
// narrow-phase pairing. Must never panic and never exceed the contact cap.
fuzz_target!(|input: CollisionInput| {
    let circle = Shape::circle(
        Vec2Fix::from_int(input.center.0 as i64, input.center.1 as i64),
        Fix128::from_ratio(input.radius as i64, 8),
        ShapeSpace::Body,
        ShapeMaterial::default(),
    )
    .ok();
    let shapes: Vec<Shape> = [polygon(&input.a), circle, polygon(&input.c)]
        .into_iter()
        .flatten()
        .collect();

    for a in &shapes {
        for b in &shapes {
            if let Some(set) = collide(a, b) {
                assert!(set.len() <= MAX_CONTACTS);
            }
        }
    }
});
