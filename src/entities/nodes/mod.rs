//! Concrete node kinds, grouped the way the object zoo splits:
//! basic containers, transformations, positional/visual objects, audio
//! processors, and control-rate sources.

pub mod audio;
pub mod basic;
pub mod control;
pub mod transform;
pub mod visual;

pub use audio::{AudioFilter, AudioOscillator, AudioOut};
pub use basic::{Dummy, Group, SceneRoot};
pub use control::{Clip, ClipContainer, ModulatorFloat, SequenceFloat, SequenceGroup, TrackFloat};
pub use transform::{AxisRotation, Scale, TransformMix, Translation};
pub use visual::{Camera, LightSource, Microphone, MicrophoneGroup, SoundSource};
