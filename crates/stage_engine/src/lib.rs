//! Script execution engine for the block stage: command trees, the actor
//! store, the paced interpreter, collision-driven script swaps and playback.

pub mod config;
pub mod playback;
pub mod script;
pub mod stage;

pub use config::{
    EngineConfig, DEFAULT_COLLISION_DISTANCE, DEFAULT_SPAWN_POSITION, DEFAULT_SPEECH_DURATION,
    DEFAULT_STEP_DELAY,
};
pub use playback::{PlaybackController, PlaybackError, PlaybackOutcome};
pub use script::{
    parse_script_json, read_script_file, script_to_json, Command, FieldError, Interpreter,
    Palette, PaletteBlock, PaletteError, RunError, ScriptParseError,
};
pub use stage::{
    Actor, ActorId, ActorSnapshot, MotionState, NullObserver, Speech, SpeechKind, StageError,
    StageHandle, StageObserver, StageWorld, SwapEvent, Vec2,
};
