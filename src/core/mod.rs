//! Core engine: the mutation facade, its locking, change notifications
//! and the worker pool reading the tree at a fixed cadence.

pub mod event_bus;
pub mod scene;
pub mod workers;

pub use event_bus::{channel, SceneEvent, SceneEventSender};
pub use scene::{Scene, SceneGraph};
pub use workers::RenderWorkers;
