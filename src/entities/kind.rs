//! ObjectKind: closed set of concrete node kinds.
//!
//! Kind-specific behavior is a trait dispatched over a tagged enum, so the
//! compiler sees the full set and callers match on variants where the trait
//! surface is not enough (transform math, unknown-class payloads).

use enum_dispatch::enum_dispatch;
use serde_json::Value;

use super::nodes::*;
use super::object::ObjectType;
use super::params::Parameters;

/// Behavior a concrete kind plugs into [`Object`](super::object::Object).
#[enum_dispatch]
pub trait NodeBehavior {
    /// Stable class name, used for serialization and factory lookup.
    /// Must never change once shipped.
    fn class_name(&self) -> &str;

    /// Type tag driving hierarchy rules and filters.
    fn object_type(&self) -> ObjectType;

    /// Create the kind's parameters. Called once at factory creation,
    /// before any deserialized values are applied.
    fn create_params(&self, _params: &mut Parameters) {}

    /// Kind-specific state for the object record payload.
    fn save_payload(&self) -> Value {
        Value::Null
    }

    /// Restore kind-specific state from a record payload.
    fn load_payload(&mut self, _payload: &Value) {}

    /// (inputs, outputs) for audio-capable kinds, `None` otherwise.
    fn audio_channels(&self) -> Option<(u32, u32)> {
        None
    }

    /// Local active window in scene seconds, for time-bounded kinds.
    fn time_range(&self, _params: &Parameters) -> Option<(f64, f64)> {
        None
    }

    /// Hook fired after one of the object's parameters changed value.
    fn on_parameter_changed(&mut self, _params: &Parameters, _param_id: &str) {}
}

/// All node kinds the engine ships. `Dummy` stands in for classes unknown
/// to the running factory and is never offered by object menus.
#[enum_dispatch(NodeBehavior)]
#[derive(Debug, Clone)]
pub enum ObjectKind {
    SceneRoot,
    Group,
    Dummy,
    Translation,
    AxisRotation,
    Scale,
    TransformMix,
    Camera,
    LightSource,
    SoundSource,
    Microphone,
    MicrophoneGroup,
    AudioOscillator,
    AudioFilter,
    AudioOut,
    TrackFloat,
    SequenceFloat,
    SequenceGroup,
    Clip,
    ClipContainer,
    ModulatorFloat,
}

impl ObjectKind {
    pub fn is_audio(&self) -> bool {
        self.audio_channels().is_some()
    }

    pub fn is_transformation(&self) -> bool {
        self.object_type()
            .intersects(ObjectType::ANY_TRANSFORMATION)
    }
}
