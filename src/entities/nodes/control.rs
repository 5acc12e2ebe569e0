//! Control-rate sources: tracks, sequences, clips and explicit float
//! modulator objects. These are the kinds parameters accept as modulation
//! sources.

use crate::entities::keys::*;
use crate::entities::kind::NodeBehavior;
use crate::entities::object::ObjectType;
use crate::entities::params::Parameters;
use crate::entities::timeline::Timeline1d;

/// Container track for float sequences.
#[derive(Debug, Clone, Default)]
pub struct TrackFloat;

impl NodeBehavior for TrackFloat {
    fn class_name(&self) -> &str {
        "TrackFloat"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::TRACK_FLOAT
    }
}

/// Time-bounded float curve.
#[derive(Debug, Clone, Default)]
pub struct SequenceFloat;

impl NodeBehavior for SequenceFloat {
    fn class_name(&self) -> &str {
        "SequenceFloat"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::SEQUENCE_FLOAT
    }

    fn create_params(&self, params: &mut Parameters) {
        params.add_float(P_START, "Start", 0.0).set_min(0.0);
        params.add_float(P_LENGTH, "Length", 60.0).set_min(0.0);
        params.add_float(P_SPEED, "Speed", 1.0).set_min(0.0);
        params.add_timeline(P_TIMELINE, "Curve", Timeline1d::new());
    }

    fn time_range(&self, params: &Parameters) -> Option<(f64, f64)> {
        let start = params.get(P_START)?.base_float();
        let length = params.get(P_LENGTH)?.base_float();
        Some((start, start + length.max(0.0)))
    }
}

/// Groups sequences; nests in itself and sits on tracks.
#[derive(Debug, Clone, Default)]
pub struct SequenceGroup;

impl NodeBehavior for SequenceGroup {
    fn class_name(&self) -> &str {
        "SequenceGroup"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::SEQUENCE_GROUP
    }
}

/// Launchable bundle of sequences inside a clip container.
#[derive(Debug, Clone, Default)]
pub struct Clip;

impl NodeBehavior for Clip {
    fn class_name(&self) -> &str {
        "Clip"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::CLIP
    }
}

/// Scene-level matrix of clips.
#[derive(Debug, Clone, Default)]
pub struct ClipContainer;

impl NodeBehavior for ClipContainer {
    fn class_name(&self) -> &str {
        "ClipContainer"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::CLIP_CONTAINER
    }
}

/// Explicit float output object; the simplest modulation source.
#[derive(Debug, Clone, Default)]
pub struct ModulatorFloat;

impl NodeBehavior for ModulatorFloat {
    fn class_name(&self) -> &str {
        "ModulatorFloat"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::MODULATOR_FLOAT
    }

    fn create_params(&self, params: &mut Parameters) {
        params.add_float(P_VALUE, "Value", 0.0);
        params.add_float(P_AMP, "Amplitude", 1.0);
    }
}
