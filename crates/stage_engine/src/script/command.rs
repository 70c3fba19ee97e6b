use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const DEFAULT_MOVE_STEPS: f64 = 10.0;
pub const DEFAULT_TURN_DEGREES: f64 = 15.0;
pub const DEFAULT_GOTO_COORD: f64 = 0.0;
pub const DEFAULT_REPEAT_TIMES: u32 = 2;
pub const DEFAULT_WAIT_SECONDS: f64 = 1.0;
pub const DEFAULT_SAY_TEXT: &str = "Hello!";
pub const DEFAULT_THINK_TEXT: &str = "Hmm...";

/// One executable block. Numeric fields are coerced once, when the command is
/// built or deserialized, so evaluation never has to re-check them.
///
/// The derived (de)serializers are inherent (`remote = "Self"`); the trait
/// impls below wrap them so a block without a string `type` decodes as
/// [`Command::Unknown`] instead of failing the whole script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", tag = "type", rename_all = "snake_case")]
pub enum Command {
    Move {
        #[serde(default = "default_move_steps", deserialize_with = "move_steps")]
        value: f64,
    },
    Turn {
        #[serde(default = "default_turn_degrees", deserialize_with = "turn_degrees")]
        value: f64,
    },
    Goto {
        #[serde(default = "default_goto_coord", deserialize_with = "goto_coord")]
        x: f64,
        #[serde(default = "default_goto_coord", deserialize_with = "goto_coord")]
        y: f64,
    },
    Repeat {
        #[serde(default = "default_repeat_times", deserialize_with = "repeat_times")]
        times: u32,
        #[serde(default, alias = "body", deserialize_with = "nested_commands")]
        commands: Vec<Command>,
    },
    Wait {
        #[serde(default = "default_wait_seconds", deserialize_with = "wait_seconds")]
        seconds: f64,
    },
    Say {
        #[serde(default = "default_say_text", deserialize_with = "say_text")]
        text: String,
    },
    Think {
        #[serde(default = "default_think_text", deserialize_with = "think_text")]
        text: String,
    },
    Show,
    Hide,
    #[serde(other)]
    Unknown,
}

impl Serialize for Command {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Command::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        if !value.get("type").is_some_and(serde_json::Value::is_string) {
            return Ok(Self::Unknown);
        }
        Command::deserialize(value).map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("block '{block}' has no field '{field}'")]
    UnknownField { block: &'static str, field: String },
}

impl Command {
    pub fn move_steps(value: f64) -> Self {
        Self::Move {
            value: finite_or(value, DEFAULT_MOVE_STEPS),
        }
    }

    pub fn turn_degrees(value: f64) -> Self {
        Self::Turn {
            value: finite_or(value, DEFAULT_TURN_DEGREES),
        }
    }

    pub fn goto(x: f64, y: f64) -> Self {
        Self::Goto {
            x: finite_or(x, DEFAULT_GOTO_COORD),
            y: finite_or(y, DEFAULT_GOTO_COORD),
        }
    }

    pub fn repeat(times: u32, commands: Vec<Command>) -> Self {
        Self::Repeat { times, commands }
    }

    pub fn wait(seconds: f64) -> Self {
        Self::Wait {
            seconds: finite_or(seconds, DEFAULT_WAIT_SECONDS).max(0.0),
        }
    }

    pub fn say(text: impl Into<String>) -> Self {
        Self::Say { text: text.into() }
    }

    pub fn think(text: impl Into<String>) -> Self {
        Self::Think { text: text.into() }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Turn { .. } => "turn",
            Self::Goto { .. } => "goto",
            Self::Repeat { .. } => "repeat",
            Self::Wait { .. } => "wait",
            Self::Say { .. } => "say",
            Self::Think { .. } => "think",
            Self::Show => "show",
            Self::Hide => "hide",
            Self::Unknown => "unknown",
        }
    }

    /// Editor display text.
    pub fn label(&self) -> String {
        match self {
            Self::Move { value } => format!("Move {} steps", format_number(*value)),
            Self::Turn { value } => format!("Turn {}°", format_number(*value)),
            Self::Goto { x, y } => {
                format!("Go to x:{} y:{}", format_number(*x), format_number(*y))
            }
            Self::Repeat { times, .. } => format!("Repeat {times} times"),
            Self::Wait { seconds } => format!("Wait {} seconds", format_number(*seconds)),
            Self::Say { text } => format!("Say {text}"),
            Self::Think { text } => format!("Think {text}"),
            Self::Show => "Show".to_string(),
            Self::Hide => "Hide".to_string(),
            Self::Unknown => "Unknown block".to_string(),
        }
    }

    /// Applies one editor input to a field. Raw input goes through the same
    /// coercion as deserialization: unparseable numbers fall back to defaults.
    pub fn set_field(&mut self, field: &str, raw: &str) -> Result<(), FieldError> {
        let block = self.kind_name();
        match (self, field) {
            (Self::Move { value }, "value") => *value = parse_number(raw, DEFAULT_MOVE_STEPS),
            (Self::Turn { value }, "value") => *value = parse_number(raw, DEFAULT_TURN_DEGREES),
            (Self::Goto { x, .. }, "x") => *x = parse_number(raw, DEFAULT_GOTO_COORD),
            (Self::Goto { y, .. }, "y") => *y = parse_number(raw, DEFAULT_GOTO_COORD),
            (Self::Repeat { times, .. }, "times") => {
                *times = repeat_count(parse_number(raw, f64::from(DEFAULT_REPEAT_TIMES)));
            }
            (Self::Wait { seconds }, "seconds") => {
                *seconds = parse_number(raw, DEFAULT_WAIT_SECONDS).max(0.0);
            }
            (Self::Say { text } | Self::Think { text }, "text") => *text = raw.to_string(),
            (_, field) => {
                return Err(FieldError::UnknownField {
                    block,
                    field: field.to_string(),
                })
            }
        }
        Ok(())
    }
}

fn finite_or(value: f64, default: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        default
    }
}

fn parse_number(raw: &str, default: f64) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(default)
}

fn repeat_count(value: f64) -> u32 {
    if value <= 0.0 {
        return 0;
    }
    // A loop of `i < 2.5` iterations runs three times.
    value.ceil().min(f64::from(u32::MAX)) as u32
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Any JSON shape an editor field can produce. Anything that is not a number
/// or a numeric string coerces to the field default.
#[derive(Deserialize)]
#[serde(untagged)]
enum LenientValue {
    Number(f64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

fn lenient_number<'de, D>(deserializer: D, default: f64) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<LenientValue>::deserialize(deserializer)? {
        Some(LenientValue::Number(number)) => finite_or(number, default),
        Some(LenientValue::Text(text)) => parse_number(&text, default),
        Some(LenientValue::Other(_)) | None => default,
    };
    Ok(value)
}

fn lenient_text<'de, D>(deserializer: D, default: &str) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match Option::<LenientValue>::deserialize(deserializer)? {
        Some(LenientValue::Text(text)) => text,
        Some(LenientValue::Number(number)) => format_number(number),
        Some(LenientValue::Other(_)) | None => default.to_string(),
    };
    Ok(text)
}

fn move_steps<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    lenient_number(deserializer, DEFAULT_MOVE_STEPS)
}

fn turn_degrees<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    lenient_number(deserializer, DEFAULT_TURN_DEGREES)
}

fn goto_coord<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    lenient_number(deserializer, DEFAULT_GOTO_COORD)
}

fn repeat_times<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    lenient_number(deserializer, f64::from(DEFAULT_REPEAT_TIMES)).map(repeat_count)
}

fn wait_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    lenient_number(deserializer, DEFAULT_WAIT_SECONDS).map(|seconds| seconds.max(0.0))
}

fn say_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    lenient_text(deserializer, DEFAULT_SAY_TEXT)
}

fn think_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    lenient_text(deserializer, DEFAULT_THINK_TEXT)
}

fn nested_commands<'de, D>(deserializer: D) -> Result<Vec<Command>, D::Error>
where
    D: Deserializer<'de>,
{
    let commands = match Option::<LenientList>::deserialize(deserializer)? {
        Some(LenientList::Commands(commands)) => commands,
        Some(LenientList::Other(_)) | None => Vec::new(),
    };
    Ok(commands)
}

/// A `repeat` body; anything that is not an array is an empty body.
#[derive(Deserialize)]
#[serde(untagged)]
enum LenientList {
    Commands(Vec<Command>),
    Other(serde::de::IgnoredAny),
}

fn default_move_steps() -> f64 {
    DEFAULT_MOVE_STEPS
}

fn default_turn_degrees() -> f64 {
    DEFAULT_TURN_DEGREES
}

fn default_goto_coord() -> f64 {
    DEFAULT_GOTO_COORD
}

fn default_repeat_times() -> u32 {
    DEFAULT_REPEAT_TIMES
}

fn default_wait_seconds() -> f64 {
    DEFAULT_WAIT_SECONDS
}

fn default_say_text() -> String {
    DEFAULT_SAY_TEXT.to_string()
}

fn default_think_text() -> String {
    DEFAULT_THINK_TEXT.to_string()
}
