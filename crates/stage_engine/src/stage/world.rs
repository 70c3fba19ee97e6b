use thiserror::Error;

use super::actor::{Actor, ActorId, ActorSnapshot, MotionState, Speech, Vec2};
use super::collision::{detect_and_swap, SwapEvent};
use crate::config::DEFAULT_SPAWN_POSITION;
use crate::script::{Command, FieldError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("actor {0} not found")]
    ActorNotFound(ActorId),
    #[error("actor {actor} has no block at index {index} (script length {len})")]
    BlockIndexOutOfRange {
        actor: ActorId,
        index: usize,
        len: usize,
    },
    #[error(transparent)]
    Field(#[from] FieldError),
}

#[derive(Debug, Default)]
pub struct ActorIdAllocator {
    next: u64,
}

impl ActorIdAllocator {
    pub fn allocate(&mut self) -> ActorId {
        self.next = self.next.saturating_add(1);
        ActorId(self.next)
    }
}

/// The authoritative actor collection. Insertion order is the stable order
/// collision passes iterate in.
#[derive(Debug)]
pub struct StageWorld {
    allocator: ActorIdAllocator,
    actors: Vec<Actor>,
    spawn_position: Vec2,
}

impl Default for StageWorld {
    fn default() -> Self {
        Self::new(DEFAULT_SPAWN_POSITION)
    }
}

impl StageWorld {
    pub fn new(spawn_position: Vec2) -> Self {
        Self {
            allocator: ActorIdAllocator::default(),
            actors: Vec::new(),
            spawn_position,
        }
    }

    pub fn spawn_actor(&mut self, name: Option<String>) -> ActorId {
        let id = self.allocator.allocate();
        let name = name.unwrap_or_else(|| format!("Sprite {}", self.actors.len() + 1));
        self.actors.push(Actor::new(id, name, self.spawn_position));
        id
    }

    pub fn remove_actor(&mut self, id: ActorId) -> bool {
        let before = self.actors.len();
        self.actors.retain(|actor| actor.id != id);
        self.actors.len() != before
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn contains(&self, id: ActorId) -> bool {
        self.find_actor(id).is_some()
    }

    pub fn find_actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.iter().find(|actor| actor.id == id)
    }

    pub fn find_actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.iter_mut().find(|actor| actor.id == id)
    }

    pub fn first_actor_id(&self) -> Option<ActorId> {
        self.actors.first().map(|actor| actor.id)
    }

    fn actor_mut_or_err(&mut self, id: ActorId) -> Result<&mut Actor, StageError> {
        self.find_actor_mut(id).ok_or(StageError::ActorNotFound(id))
    }

    pub fn assign_script(&mut self, id: ActorId, script: Vec<Command>) -> Result<(), StageError> {
        self.actor_mut_or_err(id)?.script = script;
        Ok(())
    }

    pub fn append_block(&mut self, id: ActorId, command: Command) -> Result<usize, StageError> {
        let actor = self.actor_mut_or_err(id)?;
        actor.script.push(command);
        Ok(actor.script.len() - 1)
    }

    pub fn remove_block(&mut self, id: ActorId, index: usize) -> Result<Command, StageError> {
        let actor = self.actor_mut_or_err(id)?;
        let len = actor.script.len();
        if index >= len {
            return Err(StageError::BlockIndexOutOfRange {
                actor: id,
                index,
                len,
            });
        }
        Ok(actor.script.remove(index))
    }

    pub fn set_block_field(
        &mut self,
        id: ActorId,
        index: usize,
        field: &str,
        raw: &str,
    ) -> Result<(), StageError> {
        let actor = self.actor_mut_or_err(id)?;
        let len = actor.script.len();
        let block = actor
            .script
            .get_mut(index)
            .ok_or(StageError::BlockIndexOutOfRange {
                actor: id,
                index,
                len,
            })?;
        block.set_field(field, raw)?;
        Ok(())
    }

    pub fn place_actor(&mut self, id: ActorId, position: Vec2) -> Result<(), StageError> {
        self.actor_mut_or_err(id)?.position = position;
        Ok(())
    }

    /// Writes the interpreter's working state into the actor. Returns `None`
    /// when the actor has been removed.
    pub fn publish_motion(&mut self, id: ActorId, state: &MotionState) -> Option<ActorSnapshot> {
        let actor = self.find_actor_mut(id)?;
        actor.apply_motion(state);
        Some(actor.snapshot())
    }

    pub fn set_visible(&mut self, id: ActorId, visible: bool) -> Option<ActorSnapshot> {
        let actor = self.find_actor_mut(id)?;
        actor.visible = visible;
        Some(actor.snapshot())
    }

    pub fn set_speech(&mut self, id: ActorId, speech: Option<Speech>) -> Option<ActorSnapshot> {
        let actor = self.find_actor_mut(id)?;
        actor.speech = speech;
        Some(actor.snapshot())
    }

    pub fn detect_and_swap(&mut self, collision_distance: f64) -> Vec<SwapEvent> {
        detect_and_swap(&mut self.actors, collision_distance)
    }

    pub fn snapshot(&self, id: ActorId) -> Option<ActorSnapshot> {
        self.find_actor(id).map(Actor::snapshot)
    }

    pub fn snapshots(&self) -> Vec<ActorSnapshot> {
        self.actors.iter().map(Actor::snapshot).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_uses_default_position_and_sequential_names() {
        let mut world = StageWorld::default();
        let first = world.spawn_actor(None);
        let second = world.spawn_actor(None);
        let named = world.spawn_actor(Some("Cat".to_string()));

        let first_actor = world.find_actor(first).expect("first");
        assert_eq!(first_actor.name, "Sprite 1");
        assert_eq!(first_actor.position, Vec2::new(50.0, 50.0));
        assert!(first_actor.script.is_empty());
        assert!(first_actor.visible);
        assert_eq!(world.find_actor(second).expect("second").name, "Sprite 2");
        assert_eq!(world.find_actor(named).expect("named").name, "Cat");
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut world = StageWorld::default();
        let first = world.spawn_actor(None);
        assert!(world.remove_actor(first));
        assert!(!world.remove_actor(first));
        let second = world.spawn_actor(None);
        assert_ne!(first, second);
        assert_eq!(world.actor_count(), 1);
    }

    #[test]
    fn block_editing_round_trips_through_script() {
        let mut world = StageWorld::default();
        let id = world.spawn_actor(None);
        world
            .append_block(id, Command::move_steps(10.0))
            .expect("append move");
        let index = world
            .append_block(id, Command::turn_degrees(15.0))
            .expect("append turn");
        assert_eq!(index, 1);

        world
            .set_block_field(id, 0, "value", "25")
            .expect("edit move");
        let removed = world.remove_block(id, 1).expect("remove turn");
        assert_eq!(removed, Command::turn_degrees(15.0));
        assert_eq!(
            world.find_actor(id).expect("actor").script,
            vec![Command::move_steps(25.0)]
        );
    }

    #[test]
    fn editing_errors_are_reported() {
        let mut world = StageWorld::default();
        let id = world.spawn_actor(None);
        assert_eq!(
            world.remove_block(id, 0),
            Err(StageError::BlockIndexOutOfRange {
                actor: id,
                index: 0,
                len: 0,
            })
        );
        assert_eq!(
            world.assign_script(ActorId(999), Vec::new()),
            Err(StageError::ActorNotFound(ActorId(999)))
        );
        world.append_block(id, Command::Show).expect("append");
        assert!(matches!(
            world.set_block_field(id, 0, "value", "1"),
            Err(StageError::Field(_))
        ));
    }

    #[test]
    fn publish_to_missing_actor_is_none() {
        let mut world = StageWorld::default();
        assert!(world
            .publish_motion(ActorId(3), &MotionState::default())
            .is_none());
    }
}
