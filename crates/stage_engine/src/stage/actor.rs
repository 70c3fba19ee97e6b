use std::fmt;

use serde::Serialize;

use crate::script::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Working position and heading carried through one interpretation. Headings
/// are degrees; 0 faces +x and 90 faces +y.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MotionState {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl MotionState {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn advance(&mut self, steps: f64) {
        let radians = self.heading.to_radians();
        self.x += radians.cos() * steps;
        self.y += radians.sin() * steps;
    }

    pub fn turn(&mut self, degrees: f64) {
        self.heading += degrees;
    }

    pub fn go_to(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechKind {
    Say,
    Think,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Speech {
    pub kind: SpeechKind,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub script: Vec<Command>,
    pub position: Vec2,
    pub heading: f64,
    pub visible: bool,
    pub speech: Option<Speech>,
}

impl Actor {
    pub(crate) fn new(id: ActorId, name: String, position: Vec2) -> Self {
        Self {
            id,
            name,
            script: Vec::new(),
            position,
            heading: 0.0,
            visible: true,
            speech: None,
        }
    }

    pub fn motion_state(&self) -> MotionState {
        MotionState::new(self.position.x, self.position.y, self.heading)
    }

    pub(crate) fn apply_motion(&mut self, state: &MotionState) {
        self.position = state.position();
        self.heading = state.heading;
    }

    pub fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            id: self.id,
            name: self.name.clone(),
            position: self.position,
            heading: self.heading,
            visible: self.visible,
            speech: self.speech.clone(),
        }
    }
}

/// Read model handed to renderers after every observable change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub name: String,
    pub position: Vec2,
    pub heading: f64,
    pub visible: bool,
    pub speech: Option<Speech>,
}
