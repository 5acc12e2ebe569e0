//! Audio processor kinds. The engine only models their place in the
//! routing graph (channel counts, connections); block processing itself is
//! the audio engine's business.

use crate::entities::keys::*;
use crate::entities::kind::NodeBehavior;
use crate::entities::object::ObjectType;
use crate::entities::params::Parameters;

#[derive(Debug, Clone, Default)]
pub struct AudioOscillator;

impl NodeBehavior for AudioOscillator {
    fn class_name(&self) -> &str {
        "AudioOscillator"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::AUDIO_OBJECT
    }

    fn create_params(&self, params: &mut Parameters) {
        params.add_float(P_FREQ, "Frequency", 440.0).set_range(0.0001, 100_000.0);
    }

    fn audio_channels(&self) -> Option<(u32, u32)> {
        Some((0, 1))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AudioFilter;

impl NodeBehavior for AudioFilter {
    fn class_name(&self) -> &str {
        "AudioFilter"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::AUDIO_OBJECT
    }

    fn create_params(&self, params: &mut Parameters) {
        params.add_float(P_CUTOFF, "Cutoff", 1000.0).set_range(1.0, 24_000.0);
    }

    fn audio_channels(&self) -> Option<(u32, u32)> {
        Some((1, 1))
    }
}

/// Stereo sink at the end of a routing chain.
#[derive(Debug, Clone, Default)]
pub struct AudioOut;

impl NodeBehavior for AudioOut {
    fn class_name(&self) -> &str {
        "AudioOut"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::AUDIO_OBJECT
    }

    fn audio_channels(&self) -> Option<(u32, u32)> {
        Some((2, 0))
    }
}
