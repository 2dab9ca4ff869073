#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use alice_physics2d::{Fix128, Vec2Fix, World, WorldConfig};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    /// Bodies as (x, y, radius or half-extent, is_box, is_static)
    bodies: Vec<(i16, i16, u8, bool, bool)>,
    /// Per-body initial velocity
    velocities: Vec<(i8, i8)>,
    /// Bodies with CCD turned on
    ccd_mask: u16,
    /// Ticks to run (capped)
    ticks: u8,
    history: u8,
}

// Random scenes: creation may be rejected, but nothing may panic.
fuzz_target!(|input: FuzzInput| {
    let config = WorldConfig::with_history((input.history % 16) as usize);
    let Ok(mut world) = World::new(config) else {
        return;
    };

    let mut handles = Vec::new();
    for (i, &(x, y, size, is_box, is_static)) in input.bodies.iter().take(16).enumerate() {
        let size = Fix128::from_ratio(size as i64, 16);
        let shape = if is_box {
            let verts = [
                Vec2Fix::new(-size, -size),
                Vec2Fix::new(size, -size),
                Vec2Fix::new(size, size),
                Vec2Fix::new(-size, size),
            ];
            world.create_polygon_body_space(&verts)
        } else {
            world.create_circle_body_space(Vec2Fix::ZERO, size)
        };
        let Ok(shape) = shape else {
            continue;
        };
        let position = Vec2Fix::from_int(x as i64, y as i64);
        let created = if is_static {
            world.create_static_body(position, Fix128::ZERO, vec![shape])
        } else {
            world.create_dynamic_body(position, Fix128::ZERO, vec![shape])
        };
        let Ok(handle) = created else {
            continue;
        };
        let (vx, vy) = input.velocities.get(i).copied().unwrap_or((0, 0));
        let _ = world.set_linear_velocity(handle, Vec2Fix::from_int(vx as i64, vy as i64));
        if input.ccd_mask & (1 << i) != 0 {
            let _ = world.enable_ccd(handle, Some(Fix128::ONE));
        }
        handles.push(handle);
    }

    for tick in 0..(input.ticks as usize).min(64) {
        world.update();
        if tick % 7 == 3 {
            if let Some(&h) = handles.first() {
                let _ = world.remove_body(h);
                let _ = world.add_body(h, Vec2Fix::ZERO, Fix128::ZERO);
            }
        }
    }
});
