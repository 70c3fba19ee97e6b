mod command;
mod interpreter;
mod palette;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use command::{
    Command, FieldError, DEFAULT_GOTO_COORD, DEFAULT_MOVE_STEPS, DEFAULT_REPEAT_TIMES,
    DEFAULT_SAY_TEXT, DEFAULT_THINK_TEXT, DEFAULT_TURN_DEGREES, DEFAULT_WAIT_SECONDS,
};
pub use interpreter::{Interpreter, RunError, RunFuture};
pub use palette::{Palette, PaletteBlock, PaletteError};

#[derive(Debug, Error)]
pub enum ScriptParseError {
    #[error("failed to read script file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse script json: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },
    #[error("parse script json at {path}: {source}")]
    JsonAt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parses a script (a JSON array of blocks). Malformed fields inside a block
/// coerce to defaults and blocks without a string `type` become
/// [`Command::Unknown`]; only invalid JSON or a non-array root is an error.
pub fn parse_script_json(raw: &str) -> Result<Vec<Command>, ScriptParseError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, Vec<Command>>(&mut deserializer) {
        Ok(script) => Ok(script),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(ScriptParseError::Json { source })
            } else {
                Err(ScriptParseError::JsonAt { path, source })
            }
        }
    }
}

pub fn read_script_file(path: &Path) -> Result<Vec<Command>, ScriptParseError> {
    let raw = fs::read_to_string(path).map_err(|source| ScriptParseError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script_json(&raw)
}

pub fn script_to_json(script: &[Command]) -> String {
    // Commands hold only strings, numbers and nested commands.
    serde_json::to_string(script).unwrap_or_else(|_| "[]".to_string())
}
