use std::cmp::Ordering;

use gridrally_core::geometry::{Orientation, Vector};
use gridrally_core::player::PlayerId;

/// Computes the activation order for one register: closest to the
/// antenna first, ties broken by a beam sweeping clockwise from the
/// antenna's facing direction.
pub fn priority_order(
    robots: &[(PlayerId, Vector)],
    antenna: Vector,
    facing: Orientation,
) -> Vec<PlayerId> {
    let mut order: Vec<(PlayerId, Vector)> = robots.to_vec();
    order.sort_by(|a, b| {
        let da = a.1.manhattan_distance(antenna);
        let db = b.1.manhattan_distance(antenna);
        da.cmp(&db).then_with(|| {
            sweep_ordering(delta(a.1, antenna, facing), delta(b.1, antenna, facing))
        })
    });
    order.into_iter().map(|(id, _)| id).collect()
}

/// Promotes players who claimed priority for this register to the front,
/// in claim order, ahead of the antenna ordering.
pub fn apply_priority_claims(order: Vec<PlayerId>, claims: &[PlayerId]) -> Vec<PlayerId> {
    let mut result: Vec<PlayerId> = claims
        .iter()
        .copied()
        .filter(|id| order.contains(id))
        .collect();
    result.extend(order.into_iter().filter(|id| !claims.contains(id)));
    result
}

/// Offset from the antenna, rotated so the antenna's facing becomes the
/// positive x axis. The sweep then always starts at angle zero.
fn delta(position: Vector, antenna: Vector, facing: Orientation) -> Vector {
    let mut d = Vector::new(position.x - antenna.x, position.y - antenna.y);
    for _ in 0..facing.rotation_steps_to(Orientation::Right) {
        d = Vector::new(-d.y, d.x);
    }
    d
}

/// Compares two non-zero offsets by clockwise angle from the positive
/// x axis. Integer-only: quadrant class first, cross product within.
fn sweep_ordering(a: Vector, b: Vector) -> Ordering {
    fn class(v: Vector) -> u8 {
        match (v.x, v.y) {
            (x, 0) if x > 0 => 0,
            (_, y) if y > 0 => 1,
            (x, 0) if x < 0 => 2,
            _ => 3,
        }
    }
    class(a).cmp(&class(b)).then_with(|| {
        let cross = a.x * b.y - a.y * b.x;
        // Positive cross: b lies clockwise of a, so a sweeps first.
        cross.cmp(&0).reverse()
    })
}
