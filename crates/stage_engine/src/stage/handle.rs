use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use super::actor::{ActorId, ActorSnapshot, MotionState, Speech, Vec2};
use super::collision::SwapEvent;
use super::world::{StageError, StageWorld};
use crate::script::Command;

static STAGE_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_stage_lock_poison_once() {
    if STAGE_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!("stage lock poisoned; recovered inner value");
    }
}

/// Renderer-side consumer of stage changes. Called outside the stage lock.
pub trait StageObserver: Send + Sync {
    fn actor_published(&self, snapshot: &ActorSnapshot);

    fn scripts_swapped(&self, _swap: SwapEvent) {}
}

#[derive(Debug, Default)]
pub struct NullObserver;

impl StageObserver for NullObserver {
    fn actor_published(&self, _snapshot: &ActorSnapshot) {}
}

/// Shared access to the actor collection. Every method is one exclusive
/// section; no guard escapes, so callers can hold a handle across `.await`.
#[derive(Clone)]
pub struct StageHandle {
    world: Arc<Mutex<StageWorld>>,
    observer: Arc<dyn StageObserver>,
}

impl Default for StageHandle {
    fn default() -> Self {
        Self::new(StageWorld::default(), Arc::new(NullObserver))
    }
}

impl StageHandle {
    pub fn new(world: StageWorld, observer: Arc<dyn StageObserver>) -> Self {
        Self {
            world: Arc::new(Mutex::new(world)),
            observer,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StageWorld> {
        match self.world.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn_stage_lock_poison_once();
                poisoned.into_inner()
            }
        }
    }

    /// Runs `f` with exclusive access to the world.
    pub fn with_world<R>(&self, f: impl FnOnce(&mut StageWorld) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    pub fn spawn_actor(&self, name: Option<String>) -> ActorId {
        self.with_world(|world| world.spawn_actor(name))
    }

    pub fn remove_actor(&self, id: ActorId) -> bool {
        self.with_world(|world| world.remove_actor(id))
    }

    pub fn contains(&self, id: ActorId) -> bool {
        self.with_world(|world| world.contains(id))
    }

    pub fn first_actor_id(&self) -> Option<ActorId> {
        self.with_world(|world| world.first_actor_id())
    }

    pub fn assign_script(&self, id: ActorId, script: Vec<Command>) -> Result<(), StageError> {
        self.with_world(|world| world.assign_script(id, script))
    }

    pub fn append_block(&self, id: ActorId, command: Command) -> Result<usize, StageError> {
        self.with_world(|world| world.append_block(id, command))
    }

    pub fn remove_block(&self, id: ActorId, index: usize) -> Result<Command, StageError> {
        self.with_world(|world| world.remove_block(id, index))
    }

    pub fn set_block_field(
        &self,
        id: ActorId,
        index: usize,
        field: &str,
        raw: &str,
    ) -> Result<(), StageError> {
        self.with_world(|world| world.set_block_field(id, index, field, raw))
    }

    pub fn place_actor(&self, id: ActorId, position: Vec2) -> Result<(), StageError> {
        let snapshot = self.with_world(|world| {
            world.place_actor(id, position)?;
            Ok::<_, StageError>(world.snapshot(id))
        })?;
        if let Some(snapshot) = snapshot {
            self.observer.actor_published(&snapshot);
        }
        Ok(())
    }

    pub fn script(&self, id: ActorId) -> Option<Vec<Command>> {
        self.with_world(|world| world.find_actor(id).map(|actor| actor.script.clone()))
    }

    /// Position/heading snapshot plus a private copy of the script, taken in
    /// one section so a concurrent swap cannot split them.
    pub fn prepare_run(&self, id: ActorId) -> Option<(MotionState, Vec<Command>)> {
        self.with_world(|world| {
            world
                .find_actor(id)
                .map(|actor| (actor.motion_state(), actor.script.clone()))
        })
    }

    pub fn snapshot(&self, id: ActorId) -> Option<ActorSnapshot> {
        self.with_world(|world| world.snapshot(id))
    }

    pub fn snapshots(&self) -> Vec<ActorSnapshot> {
        self.with_world(|world| world.snapshots())
    }

    pub fn publish_motion(&self, id: ActorId, state: &MotionState) -> bool {
        let snapshot = self.with_world(|world| world.publish_motion(id, state));
        self.notify(snapshot)
    }

    pub fn set_visible(&self, id: ActorId, visible: bool) -> bool {
        let snapshot = self.with_world(|world| world.set_visible(id, visible));
        self.notify(snapshot)
    }

    pub fn set_speech(&self, id: ActorId, speech: Option<Speech>) -> bool {
        let snapshot = self.with_world(|world| world.set_speech(id, speech));
        self.notify(snapshot)
    }

    pub fn detect_and_swap(&self, collision_distance: f64) -> Vec<SwapEvent> {
        let swaps = self.with_world(|world| world.detect_and_swap(collision_distance));
        for swap in &swaps {
            self.observer.scripts_swapped(*swap);
        }
        swaps
    }

    fn notify(&self, snapshot: Option<ActorSnapshot>) -> bool {
        match snapshot {
            Some(snapshot) => {
                self.observer.actor_published(&snapshot);
                true
            }
            None => false,
        }
    }
}
