use std::sync::atomic::{AtomicU64, Ordering};

use stage_engine::{ActorSnapshot, SpeechKind, StageObserver, SwapEvent};
use tracing::{debug, info, warn};

/// Headless stage renderer: every published actor state becomes one log
/// frame carrying the snapshot as JSON.
#[derive(Debug, Default)]
pub(crate) struct LogRenderer {
    frames: AtomicU64,
}

impl LogRenderer {
    #[cfg(test)]
    pub(crate) fn frame_count(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl StageObserver for LogRenderer {
    fn actor_published(&self, snapshot: &ActorSnapshot) {
        let frame = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        match serde_json::to_string(snapshot) {
            Ok(json) => info!(frame, actor = snapshot.id.0, snapshot = %json, "stage_frame"),
            Err(err) => warn!(frame, actor = snapshot.id.0, error = %err, "stage_frame_encode_failed"),
        }
    }

    fn scripts_swapped(&self, swap: SwapEvent) {
        debug!(first = swap.first.0, second = swap.second.0, "stage_swap_frame");
    }
}

/// One-line description used by the console's `actors` listing.
pub(crate) fn describe_actor(snapshot: &ActorSnapshot) -> String {
    let mut line = format!(
        "#{} {} at ({}, {}) heading {}°",
        snapshot.id,
        snapshot.name,
        format_number(snapshot.position.x),
        format_number(snapshot.position.y),
        format_number(snapshot.heading)
    );
    if !snapshot.visible {
        line.push_str(" hidden");
    }
    if let Some(speech) = &snapshot.speech {
        let verb = match speech.kind {
            SpeechKind::Say => "says",
            SpeechKind::Think => "thinks",
        };
        line.push_str(&format!(" {verb} \"{}\"", speech.text));
    }
    line
}

pub(crate) fn format_number(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        // Avoid printing "-0".
        return "0".to_string();
    }
    format!("{rounded}")
}
