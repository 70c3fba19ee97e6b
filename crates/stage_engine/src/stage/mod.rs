mod actor;
mod collision;
mod handle;
mod world;

pub use actor::{Actor, ActorId, ActorSnapshot, MotionState, Speech, SpeechKind, Vec2};
pub use collision::{detect_and_swap, in_collision_range, SwapEvent};
pub use handle::{NullObserver, StageHandle, StageObserver};
pub use world::{ActorIdAllocator, StageError, StageWorld};

#[cfg(test)]
pub(crate) use handle::testing;
