//! Transformation kinds. Each contributes one matrix to the owning
//! object's transform; the tree multiplies them in child order.

use crate::entities::keys::*;
use crate::entities::kind::NodeBehavior;
use crate::entities::object::ObjectType;
use crate::entities::params::Parameters;

#[derive(Debug, Clone, Default)]
pub struct Translation;

impl NodeBehavior for Translation {
    fn class_name(&self) -> &str {
        "Translation"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::TRANSFORMATION
    }

    fn create_params(&self, params: &mut Parameters) {
        params.add_float(P_X, "X", 0.0);
        params.add_float(P_Y, "Y", 0.0);
        params.add_float(P_Z, "Z", 0.0);
    }
}

#[derive(Debug, Clone, Default)]
pub struct AxisRotation;

impl NodeBehavior for AxisRotation {
    fn class_name(&self) -> &str {
        "AxisRotation"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::TRANSFORMATION
    }

    fn create_params(&self, params: &mut Parameters) {
        params.add_float(P_ANGLE, "Angle", 0.0);
        params.add_float(P_X, "Axis X", 0.0);
        params.add_float(P_Y, "Axis Y", 1.0);
        params.add_float(P_Z, "Axis Z", 0.0);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scale;

impl NodeBehavior for Scale {
    fn class_name(&self) -> &str {
        "Scale"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::TRANSFORMATION
    }

    fn create_params(&self, params: &mut Parameters) {
        params.add_float(P_X, "X", 1.0);
        params.add_float(P_Y, "Y", 1.0);
        params.add_float(P_Z, "Z", 1.0);
    }
}

/// Blends the combined matrix of its transformation children against
/// identity by the `mix` factor.
#[derive(Debug, Clone, Default)]
pub struct TransformMix;

impl NodeBehavior for TransformMix {
    fn class_name(&self) -> &str {
        "TransformMix"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::TRANSFORMATION_MIX
    }

    fn create_params(&self, params: &mut Parameters) {
        params.add_float(P_MIX, "Mix", 1.0).set_range(0.0, 1.0);
    }
}
