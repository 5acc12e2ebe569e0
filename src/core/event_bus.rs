//! Change notifications from the scene facade.
//!
//! Events are emitted after each successful mutation, outside the tree
//! lock, and handled by external observers (editors, the render host) to
//! trigger side effects. One-way: the core never waits on receivers.

use crossbeam::channel::{unbounded, Receiver, Sender};

/// Structural/value changes observers can react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// An object was created and attached; `id` is final (de-duplicated).
    ObjectAdded { id: String },

    /// An object and its subtree were removed.
    ObjectDeleted { id: String },

    /// An object was reparented or reordered.
    ObjectMoved { id: String },

    /// A parameter changed value.
    ParameterChanged { object: String, param: String },

    /// A modulation edge was wired up.
    ModulatorAdded {
        object: String,
        param: String,
        source: String,
    },

    /// A modulation edge was removed.
    ModulatorRemoved {
        object: String,
        param: String,
        source: String,
    },

    /// The audio connection set changed.
    ConnectionsChanged,

    /// The scene time cursor moved.
    SceneTimeChanged { time: f64 },
}

/// Event sender held by the scene.
///
/// Scenes created without observers use `dummy()`: emitting is silent.
#[derive(Debug, Clone, Default)]
pub struct SceneEventSender {
    sender: Option<Sender<SceneEvent>>,
}

impl SceneEventSender {
    /// Sender connected to a channel.
    pub fn new(sender: Sender<SceneEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Disconnected sender (tests, headless use).
    pub fn dummy() -> Self {
        Self { sender: None }
    }

    /// Emit an event; silent when nobody listens or the receiver is gone.
    pub fn emit(&self, event: SceneEvent) {
        if let Some(tx) = &self.sender {
            let _ = tx.send(event);
        }
    }
}

/// Convenience: a connected sender/receiver pair.
pub fn channel() -> (SceneEventSender, Receiver<SceneEvent>) {
    let (tx, rx) = unbounded();
    (SceneEventSender::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_delivers() {
        let (tx, rx) = channel();
        tx.emit(SceneEvent::ConnectionsChanged);
        assert_eq!(rx.try_recv().unwrap(), SceneEvent::ConnectionsChanged);
    }

    #[test]
    fn test_dummy_is_silent() {
        let tx = SceneEventSender::dummy();
        tx.emit(SceneEvent::SceneTimeChanged { time: 1.0 });
    }

    #[test]
    fn test_dropped_receiver_does_not_error() {
        let (tx, rx) = channel();
        drop(rx);
        tx.emit(SceneEvent::ConnectionsChanged);
    }
}
