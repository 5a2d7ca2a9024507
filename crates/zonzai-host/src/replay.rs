//! Timed input script replayed against the bridge.
//!
//! A script is a JSON array of entries, each with a time offset from the start of the run:
//!
//! ```json
//! [
//!   {"at_ms": 0,   "action": "pattern", "name": "Glider"},
//!   {"at_ms": 20,  "action": "pointer", "event": {"kind": "down", "x": 10, "y": 10}},
//!   {"at_ms": 30,  "action": "pointer", "event": {"kind": "up", "x": 10, "y": 10}},
//!   {"at_ms": 50,  "action": "resize", "width": 640, "height": 480},
//!   {"at_ms": 80,  "action": "pause"},
//!   {"at_ms": 120, "action": "clear"}
//! ]
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use zonzai_bridge::DevicePointerEvent;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Pointer { event: DevicePointerEvent },
    Resize { width: u32, height: u32 },
    Pattern { name: String },
    Pause,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptEntry {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Sorted by `at_ms`; entries with equal times keep file order.
    entries: Vec<ScriptEntry>,
    cursor: usize,
}

impl Script {
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut entries: Vec<ScriptEntry> =
            serde_json::from_str(raw).context("failed to parse input script")?;
        entries.sort_by_key(|e| e.at_ms);
        Ok(Self { entries, cursor: 0 })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read input script: {}", path.display()))?;
        Self::from_json(&raw)
    }

    /// Removes and returns every action scheduled at or before `now`.
    pub fn take_due(&mut self, now: Duration) -> Vec<Action> {
        let start = self.cursor;
        while self
            .entries
            .get(self.cursor)
            .is_some_and(|e| Duration::from_millis(e.at_ms) <= now)
        {
            self.cursor += 1;
        }
        self.entries[start..self.cursor]
            .iter()
            .map(|e| e.action.clone())
            .collect()
    }

    pub fn next_at(&self) -> Option<Duration> {
        self.entries
            .get(self.cursor)
            .map(|e| Duration::from_millis(e.at_ms))
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_action_kind() {
        let script = Script::from_json(
            r#"[
                {"at_ms": 0, "action": "pattern", "name": "Glider"},
                {"at_ms": 5, "action": "pointer", "event": {"kind": "down", "x": 1, "y": 2}},
                {"at_ms": 6, "action": "pointer", "event": {"kind": "leave"}},
                {"at_ms": 7, "action": "resize", "width": 640, "height": 480},
                {"at_ms": 8, "action": "pause"},
                {"at_ms": 9, "action": "clear"}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            script.entries.iter().map(|e| e.action.clone()).collect::<Vec<_>>(),
            vec![
                Action::Pattern {
                    name: "Glider".into()
                },
                Action::Pointer {
                    event: DevicePointerEvent::Down { x: 1, y: 2 }
                },
                Action::Pointer {
                    event: DevicePointerEvent::Leave
                },
                Action::Resize {
                    width: 640,
                    height: 480
                },
                Action::Pause,
                Action::Clear,
            ]
        );
    }

    #[test]
    fn actions_are_released_in_time_order() {
        let mut script = Script::from_json(
            r#"[
                {"at_ms": 30, "action": "clear"},
                {"at_ms": 10, "action": "pause"},
                {"at_ms": 10, "action": "resize", "width": 1, "height": 1}
            ]"#,
        )
        .unwrap();

        assert!(script.take_due(Duration::from_millis(9)).is_empty());
        assert_eq!(script.next_at(), Some(Duration::from_millis(10)));
        assert_eq!(
            script.take_due(Duration::from_millis(29)),
            vec![
                Action::Pause,
                Action::Resize {
                    width: 1,
                    height: 1
                }
            ]
        );
        assert!(!script.is_finished());
        assert_eq!(script.take_due(Duration::from_secs(1)), vec![Action::Clear]);
        assert!(script.is_finished());
        assert_eq!(script.next_at(), None);
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(Script::from_json(r#"[{"at_ms": 0, "action": "explode"}]"#).is_err());
    }
}
