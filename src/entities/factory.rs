//! Object factory: explicit class registry.
//!
//! The registry maps stable class names to kind constructors. It is built
//! once at startup (`ObjectRegistry::with_builtins()`), optionally extended,
//! and then passed by reference to whatever creates objects — no global
//! singleton, no hidden mutable state.
//!
//! ```
//! use scena::entities::factory::ObjectRegistry;
//!
//! let registry = ObjectRegistry::with_builtins();
//! let obj = registry.create_object("Translation").unwrap();
//! assert_eq!(obj.id(), "Translation");
//! ```

use indexmap::IndexMap;

use crate::error::SceneError;

use super::kind::{NodeBehavior, ObjectKind};
use super::object::{Object, ObjectType};
use super::nodes::*;

/// One registered class.
pub struct ClassEntry {
    class: &'static str,
    object_type: ObjectType,
    /// Hidden classes exist for the engine (root, placeholder) and are
    /// excluded from editor menus.
    hidden: bool,
    make: fn() -> ObjectKind,
}

impl ClassEntry {
    pub fn class(&self) -> &'static str {
        self.class
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}

/// Class-name → constructor registry. Registration order is stable and
/// drives menu order.
#[derive(Default)]
pub struct ObjectRegistry {
    classes: IndexMap<&'static str, ClassEntry>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every kind the engine ships.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        r.register_hidden("Scene", ObjectType::SCENE, || SceneRoot.into());
        r.register_hidden("Dummy", ObjectType::DUMMY, || Dummy::default().into());
        r.register("Group", ObjectType::GROUP, || Group.into());
        r.register("Translation", ObjectType::TRANSFORMATION, || {
            Translation.into()
        });
        r.register("AxisRotation", ObjectType::TRANSFORMATION, || {
            AxisRotation.into()
        });
        r.register("Scale", ObjectType::TRANSFORMATION, || Scale.into());
        r.register("TransformMix", ObjectType::TRANSFORMATION_MIX, || {
            TransformMix.into()
        });
        r.register("Camera", ObjectType::CAMERA, || Camera.into());
        r.register("LightSource", ObjectType::LIGHTSOURCE, || {
            LightSource.into()
        });
        r.register("SoundSource", ObjectType::SOUNDSOURCE, || {
            SoundSource.into()
        });
        r.register("Microphone", ObjectType::MICROPHONE, || Microphone.into());
        r.register("MicrophoneGroup", ObjectType::MICROPHONE_GROUP, || {
            MicrophoneGroup.into()
        });
        r.register("AudioOscillator", ObjectType::AUDIO_OBJECT, || {
            AudioOscillator.into()
        });
        r.register("AudioFilter", ObjectType::AUDIO_OBJECT, || {
            AudioFilter.into()
        });
        r.register("AudioOut", ObjectType::AUDIO_OBJECT, || AudioOut.into());
        r.register("TrackFloat", ObjectType::TRACK_FLOAT, || TrackFloat.into());
        r.register("SequenceFloat", ObjectType::SEQUENCE_FLOAT, || {
            SequenceFloat.into()
        });
        r.register("SequenceGroup", ObjectType::SEQUENCE_GROUP, || {
            SequenceGroup.into()
        });
        r.register("Clip", ObjectType::CLIP, || Clip.into());
        r.register("ClipContainer", ObjectType::CLIP_CONTAINER, || {
            ClipContainer.into()
        });
        r.register("ModulatorFloat", ObjectType::MODULATOR_FLOAT, || {
            ModulatorFloat.into()
        });
        r
    }

    /// Register a class. Returns false (and keeps the first registration)
    /// on a duplicate class name.
    pub fn register(
        &mut self,
        class: &'static str,
        object_type: ObjectType,
        make: fn() -> ObjectKind,
    ) -> bool {
        self.register_entry(ClassEntry {
            class,
            object_type,
            hidden: false,
            make,
        })
    }

    fn register_hidden(
        &mut self,
        class: &'static str,
        object_type: ObjectType,
        make: fn() -> ObjectKind,
    ) -> bool {
        self.register_entry(ClassEntry {
            class,
            object_type,
            hidden: true,
            make,
        })
    }

    fn register_entry(&mut self, entry: ClassEntry) -> bool {
        if self.classes.contains_key(entry.class) {
            log::error!("duplicate object class '{}' ignored", entry.class);
            return false;
        }
        self.classes.insert(entry.class, entry);
        true
    }

    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ClassEntry> {
        self.classes.values()
    }

    /// Create a fresh object of `class`: default id/name set to the class
    /// name, parameters created. The id is de-duplicated when the object is
    /// attached to a tree.
    pub fn create_object(&self, class: &str) -> Result<Object, SceneError> {
        let entry = self
            .classes
            .get(class)
            .ok_or_else(|| SceneError::UnknownClass {
                class: class.to_string(),
            })?;
        let kind = (entry.make)();
        debug_assert_eq!(kind.class_name(), class);
        Ok(Object::with_kind(kind))
    }

    /// Classes a child of `parent` may be created as; drives "add object"
    /// menus. Hidden classes are never offered.
    pub fn possible_child_classes(&self, parent: &Object) -> Vec<&'static str> {
        self.classes
            .values()
            .filter(|e| !e.hidden && parent.can_have_children(e.object_type))
            .map(|e| e.class)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_known_class() {
        let r = ObjectRegistry::with_builtins();
        let obj = r.create_object("Camera").unwrap();
        assert_eq!(obj.class_name(), "Camera");
        assert_eq!(obj.object_type(), ObjectType::CAMERA);
    }

    #[test]
    fn test_create_unknown_class() {
        let r = ObjectRegistry::with_builtins();
        assert!(matches!(
            r.create_object("Flux"),
            Err(SceneError::UnknownClass { .. })
        ));
    }

    #[test]
    fn test_possible_children_filtering() {
        let r = ObjectRegistry::with_builtins();
        let track = r.create_object("TrackFloat").unwrap();
        let classes = r.possible_child_classes(&track);
        assert!(classes.contains(&"SequenceFloat"));
        assert!(classes.contains(&"SequenceGroup"));
        assert!(!classes.contains(&"Camera"));
        assert!(!classes.contains(&"Dummy"));
        assert!(!classes.contains(&"Scene"));
    }

    #[test]
    fn test_duplicate_registration_ignored() {
        let mut r = ObjectRegistry::with_builtins();
        assert!(!r.register("Group", ObjectType::GROUP, || {
            crate::entities::nodes::Group.into()
        }));
    }
}
