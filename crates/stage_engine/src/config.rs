use std::time::Duration;

use crate::stage::Vec2;

pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_SPEECH_DURATION: Duration = Duration::from_millis(2000);
pub const DEFAULT_COLLISION_DISTANCE: f64 = 50.0;
pub const DEFAULT_SPAWN_POSITION: Vec2 = Vec2 { x: 50.0, y: 50.0 };

/// Pacing and collision constants. Renderers are expected to animate over
/// `step_delay` so visuals and logic move together.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub step_delay: Duration,
    pub speech_duration: Duration,
    pub collision_distance: f64,
    pub spawn_position: Vec2,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_delay: DEFAULT_STEP_DELAY,
            speech_duration: DEFAULT_SPEECH_DURATION,
            collision_distance: DEFAULT_COLLISION_DISTANCE,
            spawn_position: DEFAULT_SPAWN_POSITION,
        }
    }
}

impl EngineConfig {
    /// Clamps values that would break pacing or the collision predicate.
    pub fn normalized(mut self) -> Self {
        if !self.collision_distance.is_finite() || self.collision_distance < 0.0 {
            self.collision_distance = DEFAULT_COLLISION_DISTANCE;
        }
        if !self.spawn_position.x.is_finite() || !self.spawn_position.y.is_finite() {
            self.spawn_position = DEFAULT_SPAWN_POSITION;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_pacing() {
        let config = EngineConfig::default();
        assert_eq!(config.step_delay, Duration::from_millis(500));
        assert_eq!(config.speech_duration, Duration::from_secs(2));
        assert_eq!(config.collision_distance, 50.0);
        assert_eq!(config.spawn_position, Vec2::new(50.0, 50.0));
    }

    #[test]
    fn normalized_replaces_invalid_distances() {
        let config = EngineConfig {
            collision_distance: f64::NAN,
            ..EngineConfig::default()
        }
        .normalized();
        assert_eq!(config.collision_distance, DEFAULT_COLLISION_DISTANCE);

        let config = EngineConfig {
            collision_distance: -1.0,
            ..EngineConfig::default()
        }
        .normalized();
        assert_eq!(config.collision_distance, DEFAULT_COLLISION_DISTANCE);
    }
}
