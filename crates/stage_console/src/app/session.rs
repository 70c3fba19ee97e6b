use std::path::Path;
use std::sync::Arc;

use stage_engine::{
    parse_script_json, read_script_file, script_to_json, ActorId, Command, Palette,
    PlaybackController, PlaybackError, PlaybackOutcome, Vec2,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::bootstrap::AppWiring;
use super::console_commands::{
    ConsoleCommandRegistry, EditorCommand, LineResult, LocalAction, ParsedCommand,
};
use super::renderer::{describe_actor, format_number};

type RunHandle = JoinHandle<Result<PlaybackOutcome, PlaybackError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionFlow {
    Continue,
    Quit,
}

struct ActiveRun {
    actor: ActorId,
    handle: RunHandle,
}

/// Editor state behind the console: the palette, the playback controller and
/// the run task currently in flight.
pub(crate) struct ConsoleSession {
    registry: ConsoleCommandRegistry,
    controller: Arc<PlaybackController>,
    palette: Palette,
    active_run: Option<ActiveRun>,
}

impl ConsoleSession {
    pub(crate) fn new(app: AppWiring) -> Self {
        Self {
            registry: ConsoleCommandRegistry::with_builtins(),
            controller: app.controller,
            palette: app.palette,
            active_run: None,
        }
    }

    pub(crate) async fn handle_line(&mut self, line: &str, out: &mut Vec<String>) -> SessionFlow {
        self.reap_finished_run(out).await;

        match self.registry.parse_line(line) {
            LineResult::Empty => SessionFlow::Continue,
            LineResult::Error(message) => {
                out.push(message);
                SessionFlow::Continue
            }
            LineResult::Parsed(ParsedCommand::Local(action)) => self.apply_local(action, out),
            LineResult::Parsed(ParsedCommand::Editor(command)) => {
                if let Err(message) = self.apply_editor(command, out).await {
                    out.push(format!("error: {message}"));
                }
                SessionFlow::Continue
            }
        }
    }

    /// Waits for the run in flight, if any. Called before the console exits.
    pub(crate) async fn finish(&mut self, out: &mut Vec<String>) {
        if let Some(run) = self.active_run.take() {
            out.push(settle_run(run).await);
        }
    }

    fn apply_local(&self, action: LocalAction, out: &mut Vec<String>) -> SessionFlow {
        match action {
            LocalAction::Help => {
                out.extend(self.registry.help_lines());
                SessionFlow::Continue
            }
            LocalAction::Echo { text } => {
                out.push(text);
                SessionFlow::Continue
            }
            LocalAction::Quit => SessionFlow::Quit,
        }
    }

    async fn apply_editor(
        &mut self,
        command: EditorCommand,
        out: &mut Vec<String>,
    ) -> Result<(), String> {
        let stage = self.controller.stage().clone();
        match command {
            EditorCommand::ListActors => {
                let snapshots = stage.snapshots();
                if snapshots.is_empty() {
                    out.push("no actors".to_string());
                }
                let selected = self.controller.selected();
                for snapshot in snapshots {
                    let marker = if Some(snapshot.id) == selected { "*" } else { " " };
                    out.push(format!("{marker} {}", describe_actor(&snapshot)));
                }
            }
            EditorCommand::AddActor { name } => {
                let id = self.controller.add_actor(name);
                out.push(format!("added actor {id} (selected)"));
            }
            EditorCommand::RemoveActor { actor_id } => {
                let id = ActorId(actor_id);
                if !self.controller.remove_actor(id) {
                    return Err(PlaybackError::ActorNotFound(id).to_string());
                }
                out.push(format!("removed actor {id}"));
            }
            EditorCommand::Select { actor_id } => {
                let id = ActorId(actor_id);
                self.controller.select(id).map_err(|err| err.to_string())?;
                out.push(format!("selected actor {id}"));
            }
            EditorCommand::Place { actor_id, x, y } => {
                let id = ActorId(actor_id);
                stage
                    .place_actor(id, Vec2::new(x, y))
                    .map_err(|err| err.to_string())?;
                out.push(format!(
                    "placed actor {id} at ({}, {})",
                    format_number(x),
                    format_number(y)
                ));
            }
            EditorCommand::ShowPalette => {
                for block in self.palette.blocks() {
                    out.push(format!("{}: {}", block.slot, block.command.label()));
                }
            }
            EditorCommand::SetPaletteField { slot, field, value } => {
                self.palette
                    .set_field(slot, &field, &value)
                    .map_err(|err| err.to_string())?;
                let block = self.palette.block(slot).map_err(|err| err.to_string())?;
                out.push(format!("{}: {}", slot, block.command.label()));
            }
            EditorCommand::DragFromPalette { slot } => {
                let id = self.selected()?;
                let command = self.palette.instantiate(slot).map_err(|err| err.to_string())?;
                let label = command.label();
                let index = stage
                    .append_block(id, command)
                    .map_err(|err| err.to_string())?;
                out.push(format!("added '{label}' to actor {id} at index {index}"));
            }
            EditorCommand::DropToPalette { index } => {
                let id = self.selected()?;
                let removed = stage
                    .remove_block(id, index)
                    .map_err(|err| err.to_string())?;
                out.push(format!("removed '{}' from actor {id}", removed.label()));
            }
            EditorCommand::SetBlockField {
                index,
                field,
                value,
            } => {
                let id = self.selected()?;
                stage
                    .set_block_field(id, index, &field, &value)
                    .map_err(|err| err.to_string())?;
                let script = stage.script(id).unwrap_or_default();
                if let Some(block) = script.get(index) {
                    out.push(format!("{index}: {}", block.label()));
                }
            }
            EditorCommand::ShowScript => {
                let id = self.selected()?;
                let script = stage
                    .script(id)
                    .ok_or_else(|| PlaybackError::ActorNotFound(id).to_string())?;
                if script.is_empty() {
                    out.push(format!("actor {id} has an empty script"));
                }
                for (index, command) in script.iter().enumerate() {
                    out.push(format!("{index}: {}", command.label()));
                    push_nested(command, 1, out);
                }
                out.push(format!("json: {}", script_to_json(&script)));
            }
            EditorCommand::AssignScript { json } => {
                let script = parse_script_json(&json).map_err(|err| err.to_string())?;
                self.assign(script, out)?;
            }
            EditorCommand::LoadScript { path } => {
                let script = read_script_file(Path::new(&path)).map_err(|err| err.to_string())?;
                self.assign(script, out)?;
            }
            EditorCommand::Play => self.start_run(out)?,
            EditorCommand::Wait => match self.active_run.take() {
                Some(run) => out.push(settle_run(run).await),
                None => out.push("nothing is playing".to_string()),
            },
            EditorCommand::Status => {
                match self.busy_actor() {
                    Some(active) => out.push(format!("playing actor {active}")),
                    None => out.push("idle".to_string()),
                }
                match self.controller.selected() {
                    Some(selected) => out.push(format!("selected actor {selected}")),
                    None => out.push("no actor selected".to_string()),
                }
            }
        }
        Ok(())
    }

    fn selected(&self) -> Result<ActorId, String> {
        self.controller
            .selected()
            .ok_or_else(|| PlaybackError::NoActorSelected.to_string())
    }

    fn assign(&self, script: Vec<Command>, out: &mut Vec<String>) -> Result<(), String> {
        let id = self.selected()?;
        let count = script.len();
        self.controller
            .stage()
            .assign_script(id, script)
            .map_err(|err| err.to_string())?;
        out.push(format!("assigned {count} blocks to actor {id}"));
        Ok(())
    }

    /// The spawned task only marks the controller busy once it is polled, so
    /// an unfinished handle counts as busy too.
    fn busy_actor(&self) -> Option<ActorId> {
        self.controller.active_actor().or_else(|| {
            self.active_run
                .as_ref()
                .filter(|run| !run.handle.is_finished())
                .map(|run| run.actor)
        })
    }

    /// Captures the selection now rather than through `play_selected`, so a
    /// `select` typed before the task is first polled cannot retarget the run.
    fn start_run(&mut self, out: &mut Vec<String>) -> Result<(), String> {
        if let Some(active) = self.busy_actor() {
            warn!(active = active.0, "play_rejected_busy");
            return Err(PlaybackError::Busy { active }.to_string());
        }
        let actor = self.selected()?;
        if !self.controller.stage().contains(actor) {
            return Err(PlaybackError::ActorNotFound(actor).to_string());
        }

        let controller = Arc::clone(&self.controller);
        let handle = tokio::spawn(async move { controller.play(actor).await });
        self.active_run = Some(ActiveRun { actor, handle });
        info!(actor = actor.0, "play_requested");
        out.push(format!("playing actor {actor}"));
        Ok(())
    }

    async fn reap_finished_run(&mut self, out: &mut Vec<String>) {
        let finished = self
            .active_run
            .as_ref()
            .is_some_and(|run| run.handle.is_finished());
        if finished {
            if let Some(run) = self.active_run.take() {
                out.push(settle_run(run).await);
            }
        }
    }
}

fn push_nested(command: &Command, depth: usize, out: &mut Vec<String>) {
    if let Command::Repeat { commands, .. } = command {
        for child in commands {
            out.push(format!("{}{}", "    ".repeat(depth), child.label()));
            push_nested(child, depth + 1, out);
        }
    }
}

async fn settle_run(run: ActiveRun) -> String {
    let actor = run.actor;
    match run.handle.await {
        Ok(Ok(PlaybackOutcome::Completed(state))) => format!(
            "actor {actor} finished at ({}, {}) heading {}°",
            format_number(state.x),
            format_number(state.y),
            format_number(state.heading)
        ),
        Ok(Ok(PlaybackOutcome::Cancelled)) => {
            format!("actor {actor} was removed; run cancelled")
        }
        Ok(Err(err)) => format!("error: {err}"),
        Err(err) => format!("error: run for actor {actor} did not complete: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use stage_engine::EngineConfig;
    use tokio::time::sleep;

    use super::*;
    use crate::app::bootstrap::wire;

    fn session() -> ConsoleSession {
        ConsoleSession::new(wire(EngineConfig::default()))
    }

    async fn run_lines(session: &mut ConsoleSession, lines: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        for line in lines {
            session.handle_line(line, &mut out).await;
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn drag_play_and_wait_reports_final_position() {
        let mut session = session();

        let out = run_lines(&mut session, &["drag 1", "script", "play", "wait"]).await;

        assert_eq!(
            out,
            vec![
                "added 'Move 10 steps' to actor 1 at index 0",
                "0: Move 10 steps",
                r#"json: [{"type":"move","value":10.0}]"#,
                "playing actor 1",
                "actor 1 finished at (60, 50) heading 0°",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn second_play_is_rejected_while_running() {
        let mut session = session();

        let out = run_lines(&mut session, &["drag 5", "play", "play", "status"]).await;

        assert_eq!(out[1], "playing actor 1");
        assert_eq!(
            out[2],
            "error: actor 1 is already playing; wait for it to finish"
        );
        assert_eq!(out[3], "playing actor 1");

        let out = run_lines(&mut session, &["wait", "status"]).await;
        assert_eq!(out[0], "actor 1 finished at (50, 50) heading 0°");
        assert_eq!(out[1], "idle");
    }

    #[tokio::test(start_paused = true)]
    async fn play_runs_the_actor_selected_when_the_command_was_issued() {
        let mut session = session();

        let out = run_lines(
            &mut session,
            &["drag 1", "add_actor", "select 1", "play", "select 2", "wait"],
        )
        .await;

        assert_eq!(out[3], "playing actor 1");
        assert_eq!(out[4], "selected actor 2");
        assert_eq!(out[5], "actor 1 finished at (60, 50) heading 0°");
    }

    #[tokio::test(start_paused = true)]
    async fn edited_palette_block_is_copied_into_script() {
        let mut session = session();

        let out = run_lines(
            &mut session,
            &["palette_set 1 value 30", "drag 1", "set_block 0 value 5"],
        )
        .await;

        assert_eq!(
            out,
            vec![
                "1: Move 30 steps",
                "added 'Move 30 steps' to actor 1 at index 0",
                "0: Move 5 steps",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn assigned_json_script_lists_nested_blocks() {
        let mut session = session();
        let json = r#"[{"type":"repeat","times":"3","commands":[{"type":"turn"}]},{"type":"say"}]"#;

        let out = run_lines(&mut session, &[&format!("assign {json}"), "script"]).await;

        assert_eq!(out[0], "assigned 2 blocks to actor 1");
        assert_eq!(out[1], "0: Repeat 3 times");
        assert_eq!(out[2], "    Turn 15°");
        assert_eq!(out[3], "1: Say Hello!");
    }

    #[tokio::test(start_paused = true)]
    async fn removing_the_running_actor_cancels_its_run() {
        let mut session = session();
        let mut out = Vec::new();
        session
            .handle_line("assign [{\"type\":\"wait\",\"seconds\":5}]", &mut out)
            .await;
        session.handle_line("play", &mut out).await;
        sleep(Duration::from_millis(100)).await;
        session.handle_line("remove_actor 1", &mut out).await;
        session.handle_line("wait", &mut out).await;

        assert_eq!(out[2], "removed actor 1");
        assert_eq!(out[3], "actor 1 was removed; run cancelled");
    }

    #[tokio::test(start_paused = true)]
    async fn finished_run_is_reported_on_next_line() {
        let mut session = session();
        let mut out = Vec::new();
        session.handle_line("play", &mut out).await;
        sleep(Duration::from_millis(10)).await;

        session.handle_line("echo hi", &mut out).await;

        assert_eq!(
            out,
            vec!["playing actor 1", "actor 1 finished at (50, 50) heading 0°", "hi"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn load_reads_script_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("script.json");
        fs::write(&path, r#"[{"type":"goto","x":5,"y":"7"}]"#).expect("write script");
        let mut session = session();

        let out = run_lines(
            &mut session,
            &[&format!("load \"{}\"", path.display()), "play", "wait"],
        )
        .await;

        assert_eq!(out[0], "assigned 1 blocks to actor 1");
        assert_eq!(out[2], "actor 1 finished at (5, 7) heading 0°");
    }

    #[tokio::test(start_paused = true)]
    async fn errors_are_reported_without_ending_the_session() {
        let mut session = session();
        let mut out = Vec::new();

        assert_eq!(
            session.handle_line("drop 3", &mut out).await,
            SessionFlow::Continue
        );
        session.handle_line("select 9", &mut out).await;
        session.handle_line("assign [oops", &mut out).await;
        session.handle_line("drag 42", &mut out).await;

        assert!(out[0].starts_with("error: "), "{out:?}");
        assert_eq!(out[1], "error: actor 9 not found");
        assert!(out[2].starts_with("error: parse script json"), "{out:?}");
        assert_eq!(out[3], "error: palette has no block in slot 42");
    }

    #[tokio::test(start_paused = true)]
    async fn play_without_actors_reports_no_selection() {
        let mut session = session();

        let out = run_lines(&mut session, &["remove_actor 1", "play", "actors"]).await;

        assert_eq!(
            out,
            vec!["removed actor 1", "error: no actor is selected", "no actors"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn quit_waits_for_nothing_and_ends_session() {
        let mut session = session();
        let mut out = Vec::new();

        assert_eq!(session.handle_line("quit", &mut out).await, SessionFlow::Quit);
        session.finish(&mut out).await;
        assert!(out.is_empty());
    }
}
