use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tokio::task::yield_now;
use tokio::time::sleep;
use tracing::debug;

use super::Command;
use crate::config::EngineConfig;
use crate::stage::{ActorId, MotionState, Speech, SpeechKind, StageHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("actor {0} was removed while its script was running")]
    ActorRemoved(ActorId),
}

pub type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<MotionState, RunError>> + Send + 'a>>;

/// Walks a command tree against one actor.
///
/// Timed suspension happens only at the step delay, at `wait`, and while a
/// speech bubble is shown; each `repeat` iteration also yields to the
/// scheduler without advancing time. The interpreter never re-reads the
/// actor's stored script: it iterates the slice it was handed, so a collision
/// swap mid-run only changes what the next run will use.
pub struct Interpreter {
    stage: StageHandle,
    config: EngineConfig,
}

impl Interpreter {
    pub fn new(stage: StageHandle, config: EngineConfig) -> Self {
        Self { stage, config }
    }

    pub fn stage(&self) -> &StageHandle {
        &self.stage
    }

    /// Runs `commands` in order starting from `state` and returns the state
    /// after the last command. `repeat` bodies recurse with the state threaded
    /// through each iteration.
    pub fn run<'a>(
        &'a self,
        actor: ActorId,
        commands: &'a [Command],
        state: MotionState,
    ) -> RunFuture<'a> {
        Box::pin(async move {
            let mut state = state;
            for command in commands {
                match command {
                    Command::Move { value } => {
                        state.advance(*value);
                        self.step(actor, command, &state).await?;
                    }
                    Command::Turn { value } => {
                        state.turn(*value);
                        self.step(actor, command, &state).await?;
                    }
                    Command::Goto { x, y } => {
                        state.go_to(*x, *y);
                        self.step(actor, command, &state).await?;
                    }
                    Command::Repeat { times, commands: body } => {
                        for _ in 0..*times {
                            state = self.run(actor, body, state).await?;
                            // Bodies without a timed block never suspend otherwise.
                            yield_now().await;
                            self.ensure_present(actor)?;
                        }
                    }
                    Command::Wait { seconds } => {
                        sleep(seconds_to_duration(*seconds)).await;
                        self.ensure_present(actor)?;
                    }
                    Command::Say { text } => self.speak(actor, SpeechKind::Say, text).await?,
                    Command::Think { text } => self.speak(actor, SpeechKind::Think, text).await?,
                    Command::Show => self.set_visible(actor, true).await?,
                    Command::Hide => self.set_visible(actor, false).await?,
                    Command::Unknown => {
                        debug!(actor = actor.0, "unknown_command_skipped");
                    }
                }
            }
            Ok(state)
        })
    }

    async fn step(
        &self,
        actor: ActorId,
        command: &Command,
        state: &MotionState,
    ) -> Result<(), RunError> {
        if !self.stage.publish_motion(actor, state) {
            return Err(RunError::ActorRemoved(actor));
        }
        debug!(
            actor = actor.0,
            command = command.kind_name(),
            x = state.x,
            y = state.y,
            heading = state.heading,
            "step_published"
        );
        self.settle(actor).await
    }

    async fn set_visible(&self, actor: ActorId, visible: bool) -> Result<(), RunError> {
        if !self.stage.set_visible(actor, visible) {
            return Err(RunError::ActorRemoved(actor));
        }
        self.settle(actor).await
    }

    /// Pause for the step delay, then run one collision pass.
    async fn settle(&self, actor: ActorId) -> Result<(), RunError> {
        sleep(self.config.step_delay).await;
        self.stage.detect_and_swap(self.config.collision_distance);
        self.ensure_present(actor)
    }

    async fn speak(&self, actor: ActorId, kind: SpeechKind, text: &str) -> Result<(), RunError> {
        let speech = Speech {
            kind,
            text: text.to_string(),
        };
        if !self.stage.set_speech(actor, Some(speech)) {
            return Err(RunError::ActorRemoved(actor));
        }
        sleep(self.config.speech_duration).await;
        if !self.stage.set_speech(actor, None) {
            return Err(RunError::ActorRemoved(actor));
        }
        Ok(())
    }

    fn ensure_present(&self, actor: ActorId) -> Result<(), RunError> {
        if self.stage.contains(actor) {
            Ok(())
        } else {
            Err(RunError::ActorRemoved(actor))
        }
    }
}

fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::ZERO)
}
