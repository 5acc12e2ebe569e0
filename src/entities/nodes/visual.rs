//! Positional objects consumed by the render layer.

use crate::entities::keys::*;
use crate::entities::kind::NodeBehavior;
use crate::entities::object::ObjectType;
use crate::entities::params::Parameters;

#[derive(Debug, Clone, Default)]
pub struct Camera;

impl NodeBehavior for Camera {
    fn class_name(&self) -> &str {
        "Camera"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::CAMERA
    }

    fn create_params(&self, params: &mut Parameters) {
        params.add_float(P_FOV, "Field of view", 60.0).set_range(1.0, 179.0);
    }
}

#[derive(Debug, Clone, Default)]
pub struct LightSource;

impl NodeBehavior for LightSource {
    fn class_name(&self) -> &str {
        "LightSource"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::LIGHTSOURCE
    }

    fn create_params(&self, params: &mut Parameters) {
        params.add_float(P_INTENSITY, "Intensity", 1.0).set_min(0.0);
        params.add_float(P_RED, "Red", 1.0).set_min(0.0);
        params.add_float(P_GREEN, "Green", 1.0).set_min(0.0);
        params.add_float(P_BLUE, "Blue", 1.0).set_min(0.0);
    }
}

#[derive(Debug, Clone, Default)]
pub struct SoundSource;

impl NodeBehavior for SoundSource {
    fn class_name(&self) -> &str {
        "SoundSource"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::SOUNDSOURCE
    }
}

#[derive(Debug, Clone, Default)]
pub struct Microphone;

impl NodeBehavior for Microphone {
    fn class_name(&self) -> &str {
        "Microphone"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::MICROPHONE
    }
}

#[derive(Debug, Clone, Default)]
pub struct MicrophoneGroup;

impl NodeBehavior for MicrophoneGroup {
    fn class_name(&self) -> &str {
        "MicrophoneGroup"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::MICROPHONE_GROUP
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_source_params() {
        let mut params = Parameters::new();
        LightSource.create_params(&mut params);
        for key in [P_INTENSITY, P_RED, P_GREEN, P_BLUE] {
            let p = params.get(key).expect(key);
            assert_eq!(p.value().as_float(), Some(1.0));
            assert_eq!(p.min(), Some(0.0));
        }
    }
}
