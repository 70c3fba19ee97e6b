use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::script::{Interpreter, RunError};
use crate::stage::{ActorId, MotionState, StageHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("actor {active} is already playing; wait for it to finish")]
    Busy { active: ActorId },
    #[error("actor {0} not found")]
    ActorNotFound(ActorId),
    #[error("no actor is selected")]
    NoActorSelected,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackOutcome {
    Completed(MotionState),
    /// The actor was removed before its script finished.
    Cancelled,
}

#[derive(Debug, Default)]
struct PlaybackState {
    active: Option<ActorId>,
    selected: Option<ActorId>,
}

/// Owns the busy flag and the selected actor. One run at a time: a second
/// `play` while a run is active is rejected with [`PlaybackError::Busy`].
pub struct PlaybackController {
    interpreter: Interpreter,
    state: Mutex<PlaybackState>,
}

/// Clears the busy flag however the run ends, including when the future is
/// dropped mid-await.
struct ActiveRunGuard<'a> {
    controller: &'a PlaybackController,
}

impl Drop for ActiveRunGuard<'_> {
    fn drop(&mut self) {
        self.controller.lock_state().active = None;
    }
}

impl PlaybackController {
    pub fn new(stage: StageHandle, config: EngineConfig) -> Self {
        Self {
            interpreter: Interpreter::new(stage, config),
            state: Mutex::new(PlaybackState::default()),
        }
    }

    pub fn stage(&self) -> &StageHandle {
        self.interpreter.stage()
    }

    fn lock_state(&self) -> MutexGuard<'_, PlaybackState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.lock_state().active.is_some()
    }

    pub fn active_actor(&self) -> Option<ActorId> {
        self.lock_state().active
    }

    pub fn selected(&self) -> Option<ActorId> {
        self.lock_state().selected
    }

    pub fn select(&self, id: ActorId) -> Result<(), PlaybackError> {
        if !self.stage().contains(id) {
            return Err(PlaybackError::ActorNotFound(id));
        }
        self.lock_state().selected = Some(id);
        Ok(())
    }

    /// Spawns an actor and makes it the selection.
    pub fn add_actor(&self, name: Option<String>) -> ActorId {
        let id = self.stage().spawn_actor(name);
        self.lock_state().selected = Some(id);
        info!(actor = id.0, "actor_added");
        id
    }

    /// Removes an actor. If it was selected, the first remaining actor is
    /// selected instead. A run in flight for it ends as cancelled.
    pub fn remove_actor(&self, id: ActorId) -> bool {
        if !self.stage().remove_actor(id) {
            return false;
        }
        let replacement = self.stage().first_actor_id();
        let mut state = self.lock_state();
        if state.selected == Some(id) {
            state.selected = replacement;
        }
        info!(actor = id.0, "actor_removed");
        true
    }

    fn begin_run(&self, actor: ActorId) -> Result<ActiveRunGuard<'_>, PlaybackError> {
        let mut state = self.lock_state();
        if let Some(active) = state.active {
            return Err(PlaybackError::Busy { active });
        }
        state.active = Some(actor);
        Ok(ActiveRunGuard { controller: self })
    }

    /// Runs the actor's current script to completion.
    pub async fn play(&self, actor: ActorId) -> Result<PlaybackOutcome, PlaybackError> {
        let _guard = self.begin_run(actor)?;
        let Some((initial, script)) = self.stage().prepare_run(actor) else {
            return Err(PlaybackError::ActorNotFound(actor));
        };

        info!(actor = actor.0, blocks = script.len(), "run_started");
        match self.interpreter.run(actor, &script, initial).await {
            Ok(state) => {
                info!(
                    actor = actor.0,
                    x = state.x,
                    y = state.y,
                    heading = state.heading,
                    "run_finished"
                );
                Ok(PlaybackOutcome::Completed(state))
            }
            Err(RunError::ActorRemoved(_)) => {
                warn!(actor = actor.0, "run_cancelled_actor_removed");
                Ok(PlaybackOutcome::Cancelled)
            }
        }
    }

    pub async fn play_selected(&self) -> Result<PlaybackOutcome, PlaybackError> {
        let actor = self.selected().ok_or(PlaybackError::NoActorSelected)?;
        self.play(actor).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;
    use crate::script::Command;
    use crate::stage::testing::recording_stage;
    use crate::stage::Vec2;

    fn controller() -> (Arc<PlaybackController>, StageHandle) {
        let (stage, _observer) = recording_stage();
        let controller = Arc::new(PlaybackController::new(
            stage.clone(),
            EngineConfig::default(),
        ));
        (controller, stage)
    }

    #[tokio::test(start_paused = true)]
    async fn play_runs_script_from_persisted_position() {
        let (controller, stage) = controller();
        let id = controller.add_actor(None);
        stage
            .assign_script(id, vec![Command::move_steps(10.0)])
            .expect("assign");

        let outcome = controller.play(id).await.expect("play");

        assert_eq!(
            outcome,
            PlaybackOutcome::Completed(MotionState::new(60.0, 50.0, 0.0))
        );
        assert!(!controller.is_playing());
        assert_eq!(
            stage.snapshot(id).expect("actor").position,
            Vec2::new(60.0, 50.0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_actor_is_reported_and_leaves_controller_idle() {
        let (controller, _stage) = controller();

        let result = controller.play(ActorId(42)).await;

        assert_eq!(result, Err(PlaybackError::ActorNotFound(ActorId(42))));
        assert!(!controller.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn second_play_while_busy_is_rejected() {
        let (controller, stage) = controller();
        let first = controller.add_actor(None);
        let second = controller.add_actor(None);
        stage
            .assign_script(first, vec![Command::wait(1.0)])
            .expect("assign");

        let running = Arc::clone(&controller);
        let task = tokio::spawn(async move { running.play(first).await });
        sleep(Duration::from_millis(10)).await;

        assert!(controller.is_playing());
        assert_eq!(controller.active_actor(), Some(first));
        assert_eq!(
            controller.play(second).await,
            Err(PlaybackError::Busy { active: first })
        );

        let outcome = task.await.expect("play task").expect("first play");
        assert!(matches!(outcome, PlaybackOutcome::Completed(_)));
        assert!(!controller.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn removing_running_actor_cancels_and_returns_to_idle() {
        let (controller, stage) = controller();
        let id = controller.add_actor(None);
        stage
            .assign_script(
                id,
                vec![Command::repeat(10, vec![Command::move_steps(1.0)])],
            )
            .expect("assign");

        let running = Arc::clone(&controller);
        let task = tokio::spawn(async move { running.play(id).await });
        sleep(Duration::from_millis(1200)).await;
        assert!(controller.remove_actor(id));

        let outcome = task.await.expect("play task").expect("play");
        assert_eq!(outcome, PlaybackOutcome::Cancelled);
        assert!(!controller.is_playing());
        assert_eq!(controller.selected(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn swapped_scripts_take_effect_on_the_next_play() {
        let (controller, stage) = controller();
        let a = controller.add_actor(None);
        let b = controller.add_actor(None);
        stage.place_actor(a, Vec2::new(0.0, 0.0)).expect("place a");
        stage.place_actor(b, Vec2::new(30.0, 0.0)).expect("place b");
        let script_a = vec![Command::turn_degrees(90.0)];
        let script_b = vec![Command::goto(500.0, 500.0)];
        stage.assign_script(a, script_a.clone()).expect("assign a");
        stage.assign_script(b, script_b.clone()).expect("assign b");

        controller.play(a).await.expect("first play");
        assert_eq!(stage.script(a).expect("a"), script_b);
        assert_eq!(stage.script(b).expect("b"), script_a);
        assert_eq!(stage.snapshot(a).expect("a").position, Vec2::new(0.0, 0.0));

        // A now runs B's old script and leaves the band, so no swap back.
        let outcome = controller.play(a).await.expect("second play");
        assert_eq!(
            outcome,
            PlaybackOutcome::Completed(MotionState::new(500.0, 500.0, 90.0))
        );
        assert_eq!(stage.script(a).expect("a"), script_b);
    }

    #[test]
    fn selection_follows_add_and_remove() {
        let (controller, _stage) = controller();
        let first = controller.add_actor(None);
        let second = controller.add_actor(None);
        assert_eq!(controller.selected(), Some(second));

        controller.select(first).expect("select first");
        assert!(controller.remove_actor(first));
        assert_eq!(controller.selected(), Some(second));

        assert!(!controller.remove_actor(first));
        assert_eq!(
            controller.select(ActorId(77)),
            Err(PlaybackError::ActorNotFound(ActorId(77)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn play_selected_without_selection_is_an_error() {
        let (controller, _stage) = controller();
        assert_eq!(
            controller.play_selected().await,
            Err(PlaybackError::NoActorSelected)
        );
    }
}
