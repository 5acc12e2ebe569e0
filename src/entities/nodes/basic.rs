//! Containers and the unknown-class placeholder.

use serde_json::Value;

use crate::entities::kind::NodeBehavior;
use crate::entities::object::ObjectType;

/// Tree root. Constructed once per scene, never offered by menus.
#[derive(Debug, Clone, Default)]
pub struct SceneRoot;

impl NodeBehavior for SceneRoot {
    fn class_name(&self) -> &str {
        "Scene"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::SCENE
    }
}

/// Generic positional container.
#[derive(Debug, Clone, Default)]
pub struct Group;

impl NodeBehavior for Group {
    fn class_name(&self) -> &str {
        "Group"
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::GROUP
    }
}

/// Placeholder for a class the running factory does not know.
///
/// Preserves the original class name and the record payload verbatim, so
/// the tree keeps its shape and a re-serialization loses nothing.
#[derive(Debug, Clone)]
pub struct Dummy {
    pub original_class: String,
    pub payload: Value,
}

impl Default for Dummy {
    fn default() -> Self {
        Self {
            original_class: "Dummy".to_string(),
            payload: Value::Null,
        }
    }
}

impl Dummy {
    pub fn carrying(original_class: impl Into<String>, payload: Value) -> Self {
        Self {
            original_class: original_class.into(),
            payload,
        }
    }
}

impl NodeBehavior for Dummy {
    /// The preserved class name, so the round-trip stays lossless.
    fn class_name(&self) -> &str {
        &self.original_class
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::DUMMY
    }

    fn save_payload(&self) -> Value {
        self.payload.clone()
    }

    fn load_payload(&mut self, payload: &Value) {
        self.payload = payload.clone();
    }
}
