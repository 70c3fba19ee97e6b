use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EditorCommand {
    ListActors,
    AddActor { name: Option<String> },
    RemoveActor { actor_id: u64 },
    Select { actor_id: u64 },
    Place { actor_id: u64, x: f64, y: f64 },
    ShowPalette,
    SetPaletteField { slot: u32, field: String, value: String },
    DragFromPalette { slot: u32 },
    DropToPalette { index: usize },
    SetBlockField { index: usize, field: String, value: String },
    ShowScript,
    AssignScript { json: String },
    LoadScript { path: String },
    Play,
    Wait,
    Status,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LocalAction {
    Help,
    Quit,
    Echo { text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParsedCommand {
    Local(LocalAction),
    Editor(EditorCommand),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandParseError {
    reason: String,
    usage: String,
}

/// Outcome of one console line before it reaches the session.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LineResult {
    Empty,
    Parsed(ParsedCommand),
    Error(String),
}

type ParseFn = dyn Fn(&[String]) -> Result<ParsedCommand, CommandParseError> + Send + Sync;

pub(crate) struct CommandSpec {
    name: String,
    help: String,
    arg_schema: String,
    /// Receives the untokenized rest of the line as its single argument.
    raw_tail: bool,
    parse: Box<ParseFn>,
}

pub(crate) struct ConsoleCommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl ConsoleCommandRegistry {
    pub(crate) fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub(crate) fn with_builtins() -> Self {
        let builtins: [(&str, &str, &str, bool, fn(&[String]) -> _); 19] = [
            ("help", "List commands", "", false, parse_help_command),
            ("echo", "Print text", "<text...>", false, parse_echo_command),
            ("quit", "Quit after the current run", "", false, parse_quit_command),
            ("actors", "List actors", "", false, parse_actors_command),
            (
                "add_actor",
                "Create an actor and select it",
                "[name:string]",
                false,
                parse_add_actor_command,
            ),
            (
                "remove_actor",
                "Remove an actor",
                "<actor_id:u64>",
                false,
                parse_remove_actor_command,
            ),
            (
                "select",
                "Select the actor scripts are edited and played on",
                "<actor_id:u64>",
                false,
                parse_select_command,
            ),
            (
                "place",
                "Move an actor on the stage",
                "<actor_id:u64> <x:f64> <y:f64>",
                false,
                parse_place_command,
            ),
            ("palette", "List palette blocks", "", false, parse_palette_command),
            (
                "palette_set",
                "Edit a palette block field",
                "<slot:u32> <field> <value>",
                false,
                parse_palette_set_command,
            ),
            (
                "drag",
                "Append a palette block to the selected script",
                "<slot:u32>",
                false,
                parse_drag_command,
            ),
            (
                "drop",
                "Remove a block from the selected script",
                "<index:usize>",
                false,
                parse_drop_command,
            ),
            (
                "set_block",
                "Edit a field of a script block",
                "<index:usize> <field> <value>",
                false,
                parse_set_block_command,
            ),
            ("script", "Show the selected script", "", false, parse_script_command),
            (
                "assign",
                "Replace the selected script with JSON",
                "<json...>",
                true,
                parse_assign_command,
            ),
            (
                "load",
                "Replace the selected script from a JSON file",
                "<path>",
                false,
                parse_load_command,
            ),
            ("play", "Run the selected actor's script", "", false, parse_play_command),
            ("wait", "Wait for the current run to finish", "", false, parse_wait_command),
            ("status", "Show playback state", "", false, parse_status_command),
        ];

        let mut registry = Self::new();
        for (name, help, arg_schema, raw_tail, parse) in builtins {
            registry
                .register(name, help, arg_schema, raw_tail, parse)
                .expect("built-in command registration should not fail");
        }
        registry
    }

    pub(crate) fn register<F>(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        arg_schema: impl Into<String>,
        raw_tail: bool,
        parse: F,
    ) -> Result<(), String>
    where
        F: Fn(&[String]) -> Result<ParsedCommand, CommandParseError> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("command name cannot be empty".to_string());
        }
        let lower = name.to_ascii_lowercase();
        if self.lookup_by_lower_name.contains_key(&lower) {
            return Err(format!("duplicate command registration: {name}"));
        }

        self.specs.push(CommandSpec {
            name,
            help: help.into(),
            arg_schema: arg_schema.into(),
            raw_tail,
            parse: Box::new(parse),
        });
        self.lookup_by_lower_name
            .insert(lower, self.specs.len() - 1);
        Ok(())
    }

    pub(crate) fn lookup(&self, input_name: &str) -> Option<&CommandSpec> {
        let lower = input_name.to_ascii_lowercase();
        let index = self.lookup_by_lower_name.get(&lower)?;
        self.specs.get(*index)
    }

    pub(crate) fn help_lines(&self) -> Vec<String> {
        // Registration order.
        self.specs
            .iter()
            .map(|spec| {
                if spec.arg_schema.is_empty() {
                    format!("{} - {}", spec.name, spec.help)
                } else {
                    format!("{} {} - {}", spec.name, spec.arg_schema, spec.help)
                }
            })
            .collect()
    }

    pub(crate) fn parse_line(&self, raw_line: &str) -> LineResult {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return LineResult::Empty;
        }

        let (head, tail) = match trimmed.split_once(char::is_whitespace) {
            Some((head, tail)) => (head, tail.trim()),
            None => (trimmed, ""),
        };
        let Some(spec) = self.lookup(head) else {
            return LineResult::Error(format!("error: unknown command '{head}'. try: help"));
        };

        let args = if spec.raw_tail {
            if tail.is_empty() {
                Vec::new()
            } else {
                vec![tail.to_string()]
            }
        } else {
            match tokenize_line(tail) {
                Ok(tokens) => tokens,
                Err(reason) => return LineResult::Error(format!("error: {reason}. usage: help")),
            }
        };

        match (spec.parse)(&args) {
            Ok(parsed) => LineResult::Parsed(parsed),
            Err(error) => {
                LineResult::Error(format!("error: {}. usage: {}", error.reason, error.usage))
            }
        }
    }
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut seen_token_content = false;
    let mut just_closed_quote = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                seen_token_content = true;
                if !in_quotes {
                    just_closed_quote = true;
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if seen_token_content || just_closed_quote || !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                    seen_token_content = false;
                    just_closed_quote = false;
                }
            }
            _ => {
                current.push(ch);
                seen_token_content = true;
                just_closed_quote = false;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }

    if seen_token_content || just_closed_quote || !current.is_empty() {
        tokens.push(current);
    }

    Ok(tokens)
}

fn usage_error(reason: impl Into<String>, usage: &str) -> CommandParseError {
    CommandParseError {
        reason: reason.into(),
        usage: usage.to_string(),
    }
}

fn require_no_args(args: &[String], usage: &str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(usage_error("unexpected extra arguments", usage))
    }
}

fn require_exact<'a>(
    args: &'a [String],
    count: usize,
    usage: &str,
) -> Result<&'a [String], CommandParseError> {
    if args.len() == count {
        Ok(args)
    } else {
        let noun = if count == 1 { "argument" } else { "arguments" };
        Err(usage_error(format!("expected {count} {noun}"), usage))
    }
}

fn parse_number<T: std::str::FromStr>(
    raw: &str,
    what: &str,
    type_name: &str,
    usage: &str,
) -> Result<T, CommandParseError> {
    raw.parse::<T>()
        .map_err(|_| usage_error(format!("invalid {what} '{raw}' (expected {type_name})"), usage))
}

fn parse_help_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "help")?;
    Ok(ParsedCommand::Local(LocalAction::Help))
}

fn parse_echo_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    Ok(ParsedCommand::Local(LocalAction::Echo {
        text: args.join(" "),
    }))
}

fn parse_quit_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "quit")?;
    Ok(ParsedCommand::Local(LocalAction::Quit))
}

fn parse_actors_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "actors")?;
    Ok(ParsedCommand::Editor(EditorCommand::ListActors))
}

fn parse_add_actor_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    if args.len() > 1 {
        return Err(usage_error(
            "expected at most one argument [name]",
            "add_actor [name]",
        ));
    }
    Ok(ParsedCommand::Editor(EditorCommand::AddActor {
        name: args.first().cloned(),
    }))
}

fn parse_remove_actor_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "remove_actor <actor_id>";
    let args = require_exact(args, 1, USAGE)?;
    let actor_id = parse_number(&args[0], "actor id", "u64", USAGE)?;
    Ok(ParsedCommand::Editor(EditorCommand::RemoveActor { actor_id }))
}

fn parse_select_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "select <actor_id>";
    let args = require_exact(args, 1, USAGE)?;
    let actor_id = parse_number(&args[0], "actor id", "u64", USAGE)?;
    Ok(ParsedCommand::Editor(EditorCommand::Select { actor_id }))
}

fn parse_place_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "place <actor_id> <x> <y>";
    let args = require_exact(args, 3, USAGE)?;
    let actor_id = parse_number(&args[0], "actor id", "u64", USAGE)?;
    let x = parse_number(&args[1], "x coordinate", "f64", USAGE)?;
    let y = parse_number(&args[2], "y coordinate", "f64", USAGE)?;
    Ok(ParsedCommand::Editor(EditorCommand::Place { actor_id, x, y }))
}

fn parse_palette_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "palette")?;
    Ok(ParsedCommand::Editor(EditorCommand::ShowPalette))
}

fn parse_palette_set_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "palette_set <slot> <field> <value>";
    let args = require_exact(args, 3, USAGE)?;
    let slot = parse_number(&args[0], "slot", "u32", USAGE)?;
    Ok(ParsedCommand::Editor(EditorCommand::SetPaletteField {
        slot,
        field: args[1].clone(),
        value: args[2].clone(),
    }))
}

fn parse_drag_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "drag <slot>";
    let args = require_exact(args, 1, USAGE)?;
    let slot = parse_number(&args[0], "slot", "u32", USAGE)?;
    Ok(ParsedCommand::Editor(EditorCommand::DragFromPalette { slot }))
}

fn parse_drop_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "drop <index>";
    let args = require_exact(args, 1, USAGE)?;
    let index = parse_number(&args[0], "block index", "usize", USAGE)?;
    Ok(ParsedCommand::Editor(EditorCommand::DropToPalette { index }))
}

fn parse_set_block_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "set_block <index> <field> <value>";
    let args = require_exact(args, 3, USAGE)?;
    let index = parse_number(&args[0], "block index", "usize", USAGE)?;
    Ok(ParsedCommand::Editor(EditorCommand::SetBlockField {
        index,
        field: args[1].clone(),
        value: args[2].clone(),
    }))
}

fn parse_script_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "script")?;
    Ok(ParsedCommand::Editor(EditorCommand::ShowScript))
}

fn parse_assign_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let args = require_exact(args, 1, "assign <json>")?;
    Ok(ParsedCommand::Editor(EditorCommand::AssignScript {
        json: args[0].clone(),
    }))
}

fn parse_load_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let args = require_exact(args, 1, "load <path>")?;
    Ok(ParsedCommand::Editor(EditorCommand::LoadScript {
        path: args[0].clone(),
    }))
}

fn parse_play_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "play")?;
    Ok(ParsedCommand::Editor(EditorCommand::Play))
}

fn parse_wait_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "wait")?;
    Ok(ParsedCommand::Editor(EditorCommand::Wait))
}

fn parse_status_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "status")?;
    Ok(ParsedCommand::Editor(EditorCommand::Status))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> LineResult {
        ConsoleCommandRegistry::with_builtins().parse_line(line)
    }

    #[test]
    fn help_lists_commands_in_registration_order() {
        let lines = ConsoleCommandRegistry::with_builtins().help_lines();

        assert_eq!(lines[0], "help - List commands");
        assert_eq!(lines[1], "echo <text...> - Print text");
        assert_eq!(lines[3], "actors - List actors");
        assert_eq!(
            lines[7],
            "place <actor_id:u64> <x:f64> <y:f64> - Move an actor on the stage"
        );
        assert_eq!(lines.len(), 19);
    }

    #[test]
    fn unknown_command_reports_clear_error() {
        assert_eq!(
            parse("nope"),
            LineResult::Error("error: unknown command 'nope'. try: help".to_string())
        );
    }

    #[test]
    fn bad_args_report_usage_hint() {
        assert_eq!(
            parse("select foo"),
            LineResult::Error(
                "error: invalid actor id 'foo' (expected u64). usage: select <actor_id>"
                    .to_string()
            )
        );
        assert_eq!(
            parse("place 1 2"),
            LineResult::Error(
                "error: expected 3 arguments. usage: place <actor_id> <x> <y>".to_string()
            )
        );
    }

    #[test]
    fn blank_and_comment_lines_are_ignored() {
        assert_eq!(parse("   "), LineResult::Empty);
        assert_eq!(parse("# setup"), LineResult::Empty);
    }

    #[test]
    fn editor_commands_parse_arguments() {
        assert_eq!(
            parse("PLACE 2 -10.5 30"),
            LineResult::Parsed(ParsedCommand::Editor(EditorCommand::Place {
                actor_id: 2,
                x: -10.5,
                y: 30.0,
            }))
        );
        assert_eq!(
            parse("add_actor \"Big Cat\""),
            LineResult::Parsed(ParsedCommand::Editor(EditorCommand::AddActor {
                name: Some("Big Cat".to_string()),
            }))
        );
        assert_eq!(
            parse("set_block 0 value 25"),
            LineResult::Parsed(ParsedCommand::Editor(EditorCommand::SetBlockField {
                index: 0,
                field: "value".to_string(),
                value: "25".to_string(),
            }))
        );
    }

    #[test]
    fn assign_keeps_json_untokenized() {
        let json = r#"[{"type":"say","text":"hi there"}]"#;
        assert_eq!(
            parse(&format!("assign   {json}")),
            LineResult::Parsed(ParsedCommand::Editor(EditorCommand::AssignScript {
                json: json.to_string(),
            }))
        );
        assert_eq!(
            parse("assign"),
            LineResult::Error("error: expected 1 argument. usage: assign <json>".to_string())
        );
    }

    #[test]
    fn tokenizer_handles_quotes_and_errors() {
        assert_eq!(
            tokenize_line("\"big cat\" 1 2").expect("tokens"),
            vec!["big cat", "1", "2"]
        );
        assert!(tokenize_line("\"oops").is_err());
        assert_eq!(
            parse("echo \"oops"),
            LineResult::Error("error: unterminated quoted string. usage: help".to_string())
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ConsoleCommandRegistry::with_builtins();
        let error = registry
            .register("Play", "again", "", false, parse_play_command)
            .expect_err("duplicate");
        assert_eq!(error, "duplicate command registration: Play");
    }
}
