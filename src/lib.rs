//! scena — scene-graph and modulation-graph engine for audiovisual
//! synthesis editors.
//!
//! The model: a tree of polymorphic [`Object`]s (uniquely id'd, type-rule
//! checked), each carrying typed [`Parameter`]s; a modulation graph of
//! id-addressed [`Modulator`] edges overlaid on the tree; a separate
//! channel-counted audio routing graph; and a [`Scene`] facade that owns
//! the lot behind a reader/writer lock, refreshes cross-references after
//! every mutation and notifies observers through a channel.
//!
//! ```
//! use std::sync::Arc;
//! use scena::{ObjectRegistry, ParamValue, Scene};
//!
//! let scene = Scene::new(Arc::new(ObjectRegistry::with_builtins()));
//! let group = scene.add_object("Scene", "Group", None).unwrap();
//! let trans = scene.add_object(&group, "Translation", None).unwrap();
//! let lfo = scene.add_object("Scene", "ModulatorFloat", None).unwrap();
//! scene.set_parameter_value(&lfo, "value", ParamValue::Float(2.0)).unwrap();
//! scene.add_modulator(&trans, "x", &lfo, "", 0).unwrap();
//! assert_eq!(scene.param_float(&trans, "x"), 2.0);
//! ```

pub mod config;
pub mod core;
pub mod entities;
pub mod error;

// Re-export the commonly used types
pub use crate::core::event_bus::{channel, SceneEvent, SceneEventSender};
pub use crate::core::scene::{Scene, SceneGraph};
pub use crate::core::workers::RenderWorkers;
pub use crate::entities::{
    ActivityScope, AudioConnection, AudioConnections, LoadReport, Modulator, ModulatorState,
    Object, ObjectKind, ObjectRecord, ObjectRegistry, ObjectTree, ObjectType, ParamValue,
    Parameter, Parameters, SceneRecord, Timeline1d,
};
pub use crate::error::{LoadError, SceneError};
