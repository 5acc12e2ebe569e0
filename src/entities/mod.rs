//! Entities: the scene-graph data model.
//!
//! Objects, their parameters and modulator edges, the ownership tree,
//! the audio-connection graph and the serialization records. Everything
//! here is mutation-agnostic — locking, events and refresh coordination
//! live in [`core`](crate::core).

pub mod connections;
pub mod factory;
pub mod keys;
pub mod kind;
pub mod modulator;
pub mod nodes;
pub mod object;
pub mod params;
pub mod records;
pub mod timeline;
pub mod tree;

pub use connections::{AudioConnection, AudioConnections};
pub use factory::{ClassEntry, ObjectRegistry};
pub use kind::{NodeBehavior, ObjectKind};
pub use modulator::{Modulator, ModulatorState};
pub use object::{ActivityScope, Object, ObjectType};
pub use params::{ParamValue, Parameter, Parameters};
pub use records::{LoadReport, ObjectRecord, SceneRecord};
pub use timeline::{Timeline1d, TimelinePoint};
pub use tree::ObjectTree;
