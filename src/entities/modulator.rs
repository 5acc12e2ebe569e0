//! Modulator edges: object output -> parameter.
//!
//! A modulator references its source object by id, not by pointer; the
//! reference is resolved against the live tree by the resolution pass
//! (`ObjectTree::collect_modulators`). States:
//!
//! - `Unresolved`: just added or just deserialized, source not looked up yet
//! - `Resolved`: source found in the tree
//! - `Dangling`: previously resolved source was deleted; pruned on the next
//!   resolution pass
//!
//! A resolved modulator never outlives its source object.

use serde::{Deserialize, Serialize};

/// Resolution state of a modulator edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModulatorState {
    #[default]
    Unresolved,
    Resolved,
    Dangling,
}

/// Directed edge from a source object output to the owning parameter.
///
/// The source is addressed by the structured triple
/// `(source_id, output_id, channel)`. `output_id` stays a free-form label
/// ("" for the default output); the channel is an explicit field and is not
/// encoded in the label.
#[derive(Debug, Clone, PartialEq)]
pub struct Modulator {
    source_id: String,
    output_id: String,
    channel: u32,
    /// Scale applied to the source signal.
    pub amplitude: f64,
    /// Shift applied to the sample time, seconds.
    pub time_offset: f64,
    state: ModulatorState,
}

impl Modulator {
    pub fn new(source_id: impl Into<String>, output_id: impl Into<String>, channel: u32) -> Self {
        Self {
            source_id: source_id.into(),
            output_id: output_id.into(),
            channel,
            amplitude: 1.0,
            time_offset: 0.0,
            state: ModulatorState::Unresolved,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn output_id(&self) -> &str {
        &self.output_id
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    pub fn state(&self) -> ModulatorState {
        self.state
    }

    pub fn is_resolved(&self) -> bool {
        self.state == ModulatorState::Resolved
    }

    /// Identity check used for duplicate detection and removal.
    pub fn matches(&self, source_id: &str, output_id: &str) -> bool {
        self.source_id == source_id && self.output_id == output_id
    }

    pub(crate) fn mark_resolved(&mut self) {
        self.state = ModulatorState::Resolved;
    }

    pub(crate) fn mark_unresolved(&mut self) {
        self.state = ModulatorState::Unresolved;
    }

    pub(crate) fn mark_dangling(&mut self) {
        self.state = ModulatorState::Dangling;
    }
}

/// Split a legacy output label with an encoded trailing channel number,
/// e.g. `"out2"` -> `("out", 2)`. Only used when reading old records that
/// predate the structured channel field.
pub fn split_legacy_output(output_id: &str) -> (&str, u32) {
    let head = output_id.trim_end_matches(|c: char| c.is_ascii_digit());
    match output_id[head.len()..].parse() {
        Ok(ch) => (head, ch),
        Err(_) => (output_id, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_unresolved() {
        let m = Modulator::new("osc", "", 0);
        assert_eq!(m.state(), ModulatorState::Unresolved);
        assert!(!m.is_resolved());
        assert_eq!(m.amplitude, 1.0);
    }

    #[test]
    fn test_state_transitions() {
        let mut m = Modulator::new("osc", "", 0);
        m.mark_resolved();
        assert!(m.is_resolved());
        m.mark_dangling();
        assert_eq!(m.state(), ModulatorState::Dangling);
    }

    #[test]
    fn test_matches_ignores_channel() {
        let m = Modulator::new("osc", "out", 3);
        assert!(m.matches("osc", "out"));
        assert!(!m.matches("osc", ""));
        assert!(!m.matches("lfo", "out"));
    }

    #[test]
    fn test_split_legacy_output() {
        assert_eq!(split_legacy_output("out2"), ("out", 2));
        assert_eq!(split_legacy_output("out"), ("out", 0));
        assert_eq!(split_legacy_output(""), ("", 0));
        // an all-digit label parses as a bare channel
        assert_eq!(split_legacy_output("7"), ("", 7));
    }

    #[test]
    fn test_split_legacy_output_overflow_is_no_channel() {
        let label = "out99999999999999999999";
        assert_eq!(split_legacy_output(label), (label, 0));
    }
}
