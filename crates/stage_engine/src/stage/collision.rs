use serde::Serialize;
use tracing::info;

use super::actor::{Actor, ActorId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwapEvent {
    pub first: ActorId,
    pub second: ActorId,
}

/// Returns true when two positions are strictly closer than
/// `collision_distance`. Actors exactly at the threshold do not collide.
pub fn in_collision_range(a: &Actor, b: &Actor, collision_distance: f64) -> bool {
    a.position.distance(b.position) < collision_distance
}

/// One collision pass over the whole stage.
///
/// Pairs are visited `i` ascending then `j > i` ascending, and swaps land in
/// place, so a later pair in the same pass sees scripts already exchanged by
/// an earlier pair. Only scripts move; positions, headings and visibility stay
/// with their actors.
pub fn detect_and_swap(actors: &mut [Actor], collision_distance: f64) -> Vec<SwapEvent> {
    let mut swaps = Vec::new();
    for i in 0..actors.len() {
        for j in (i + 1)..actors.len() {
            if !in_collision_range(&actors[i], &actors[j], collision_distance) {
                continue;
            }
            let (head, tail) = actors.split_at_mut(j);
            let (first, second) = (&mut head[i], &mut tail[0]);
            std::mem::swap(&mut first.script, &mut second.script);
            info!(
                first = first.id.0,
                first_name = first.name.as_str(),
                second = second.id.0,
                second_name = second.name.as_str(),
                "scripts_swapped"
            );
            swaps.push(SwapEvent {
                first: first.id,
                second: second.id,
            });
        }
    }
    swaps
}
