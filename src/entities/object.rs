//! Object: the polymorphic scene-graph node.
//!
//! An `Object` carries the data every node shares (tree-unique id, display
//! name, parameters, children ids, activity scopes, per-thread transform
//! slots) and delegates kind-specific behavior to its [`ObjectKind`].
//! Objects live in the [`ObjectTree`](super::tree::ObjectTree) arena and
//! reference each other by id; the tree owns them exclusively.
//!
//! Objects are created through the factory
//! ([`ObjectRegistry`](super::factory::ObjectRegistry)), never assembled by
//! hand: the factory assigns default id/name and asks the kind to create
//! its parameters.

use std::sync::Mutex;

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_NUM_THREADS;
use crate::entities::keys::P_ACTIVE_SCOPE;

use super::kind::{NodeBehavior, ObjectKind};
use super::params::Parameters;

/// Bitmask identifying an object's concrete kind, plus group masks for
/// hierarchy rules, modulator acceptance sets and `find_children` filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObjectType(pub u32);

impl ObjectType {
    pub const NONE: Self = Self(0);
    pub const OBJECT: Self = Self(1 << 0);
    pub const GROUP: Self = Self(1 << 1);
    pub const TRANSFORMATION: Self = Self(1 << 2);
    pub const TRANSFORMATION_MIX: Self = Self(1 << 3);
    pub const SCENE: Self = Self(1 << 4);
    pub const MICROPHONE: Self = Self(1 << 5);
    pub const CAMERA: Self = Self(1 << 6);
    pub const SOUNDSOURCE: Self = Self(1 << 7);
    pub const SEQUENCE_GROUP: Self = Self(1 << 8);
    pub const SEQUENCE_FLOAT: Self = Self(1 << 9);
    pub const TRACK_FLOAT: Self = Self(1 << 10);
    pub const DUMMY: Self = Self(1 << 11);
    pub const LIGHTSOURCE: Self = Self(1 << 12);
    pub const AUDIO_OBJECT: Self = Self(1 << 13);
    pub const MODULATOR_FLOAT: Self = Self(1 << 14);
    pub const MICROPHONE_GROUP: Self = Self(1 << 15);
    pub const CLIP: Self = Self(1 << 16);
    pub const CLIP_CONTAINER: Self = Self(1 << 17);

    /// Objects with a definite spatial position.
    pub const REAL_OBJECT: Self = Self(
        Self::OBJECT.0
            | Self::GROUP.0
            | Self::MICROPHONE.0
            | Self::SOUNDSOURCE.0
            | Self::CAMERA.0
            | Self::LIGHTSOURCE.0
            | Self::MICROPHONE_GROUP.0,
    );
    pub const TRACK: Self = Self(Self::TRACK_FLOAT.0);
    pub const SEQUENCE: Self = Self(Self::SEQUENCE_FLOAT.0);
    /// Explicit modulator objects.
    pub const MODULATOR_OBJECT: Self = Self(Self::MODULATOR_FLOAT.0);
    /// Everything that can serve as a float modulation source.
    pub const MODULATOR_SOURCE: Self = Self(
        Self::MODULATOR_OBJECT.0 | Self::TRACK.0 | Self::SEQUENCE.0 | Self::SEQUENCE_GROUP.0,
    );
    pub const ANY_TRANSFORMATION: Self = Self(Self::TRANSFORMATION.0 | Self::TRANSFORMATION_MIX.0);
    pub const ALL: Self = Self(u32::MAX);

    /// Any bit in common.
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ObjectType {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for ObjectType {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Activity scope bitmask: under which preview/render modes an object is
/// considered active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityScope(pub u32);

impl ActivityScope {
    pub const OFF: Self = Self(0);
    pub const PREVIEW_1: Self = Self(1 << 0);
    pub const PREVIEW_2: Self = Self(1 << 1);
    pub const PREVIEW_3: Self = Self(1 << 2);
    pub const RENDER: Self = Self(1 << 3);
    pub const CLIENT_ONLY: Self = Self(1 << 4);
    pub const PREVIEW: Self = Self(Self::PREVIEW_1.0 | Self::PREVIEW_2.0 | Self::PREVIEW_3.0);
    pub const ON: Self = Self(Self::PREVIEW.0 | Self::RENDER.0);

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for ActivityScope {
    fn default() -> Self {
        Self::ON
    }
}

impl std::ops::BitAnd for ActivityScope {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl std::ops::BitOr for ActivityScope {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Parent/child compatibility rules. Pure function of the two type tags;
/// the tree re-validates on every insert regardless of editor-side menu
/// filtering.
pub fn can_contain(parent: ObjectType, child: ObjectType) -> bool {
    // dummies pair with everything, both ways
    if child == ObjectType::DUMMY || parent == ObjectType::DUMMY {
        return true;
    }
    // explicit modulator objects can sit anywhere
    if child.intersects(ObjectType::MODULATOR_OBJECT) {
        return true;
    }
    // clips belong into clip containers, and nothing else does
    if child == ObjectType::CLIP {
        return parent == ObjectType::CLIP_CONTAINER;
    }
    if parent == ObjectType::CLIP_CONTAINER {
        return child == ObjectType::CLIP;
    }
    // clip containers live at scene level
    if child == ObjectType::CLIP_CONTAINER {
        return parent == ObjectType::SCENE;
    }
    // clips hold sequences only
    if parent == ObjectType::CLIP {
        return child.intersects(ObjectType::SEQUENCE);
    }
    // microphone groups hold microphones only
    if parent == ObjectType::MICROPHONE_GROUP {
        return child == ObjectType::MICROPHONE;
    }
    // audio objects chain under audio objects
    if parent == ObjectType::AUDIO_OBJECT {
        return child == ObjectType::AUDIO_OBJECT;
    }
    // ...or attach to the scene and positional objects
    if child == ObjectType::AUDIO_OBJECT {
        return parent == ObjectType::SCENE || parent.intersects(ObjectType::REAL_OBJECT);
    }
    // plain transformations are child-less
    if parent == ObjectType::TRANSFORMATION {
        return false;
    }
    // the mix holds transformations, including other mixes
    if parent == ObjectType::TRANSFORMATION_MIX {
        return child.intersects(ObjectType::ANY_TRANSFORMATION);
    }
    // sequences belong on sequence groups, clips, or matching tracks
    if child.intersects(ObjectType::SEQUENCE) {
        return parent == ObjectType::SEQUENCE_GROUP
            || parent == ObjectType::CLIP
            || (child == ObjectType::SEQUENCE_FLOAT && parent == ObjectType::TRACK_FLOAT);
    }
    // sequence groups belong on tracks or nest in themselves
    if child == ObjectType::SEQUENCE_GROUP {
        return parent.intersects(ObjectType::TRACK) || parent == ObjectType::SEQUENCE_GROUP;
    }
    // tracks hold nothing else
    if parent.intersects(ObjectType::TRACK) {
        return false;
    }
    // sequences hold nothing
    if parent.intersects(ObjectType::SEQUENCE) {
        return false;
    }
    // the scene holds anything except raw transformations
    if parent == ObjectType::SCENE {
        return !child.intersects(ObjectType::ANY_TRANSFORMATION);
    }
    true
}

/// Sibling ordering priority: higher priorities are kept before lower ones
/// in a child list. Keeps all transformations in front of the siblings they
/// apply to.
pub fn object_priority(t: ObjectType) -> i32 {
    if t.intersects(ObjectType::ANY_TRANSFORMATION) {
        3
    } else if t.intersects(ObjectType::MODULATOR_OBJECT) {
        2
    } else if t.intersects(ObjectType::AUDIO_OBJECT) {
        1
    } else {
        0
    }
}

/// Scene-graph node. See module docs.
#[derive(Debug)]
pub struct Object {
    id: String,
    name: String,
    kind: ObjectKind,
    params: Parameters,
    children: Vec<String>,
    parent: Option<String>,
    /// Activity scope inherited from the parent chain.
    parent_scope: ActivityScope,
    /// Scope currently requested for the whole tree.
    current_scope: ActivityScope,
    /// One transform slot per render/audio thread. Each worker writes only
    /// its own slot, under the tree read lock.
    threads: Vec<Mutex<Mat4>>,
}

impl Object {
    /// Used by the factory and by the scene root constructor. Id and name
    /// default to the class name; the id is de-duplicated when the object
    /// is attached to a tree.
    pub(crate) fn with_kind(kind: ObjectKind) -> Self {
        let class = kind.class_name().to_string();
        let mut params = Parameters::new();
        create_builtin_params(&mut params);
        kind.create_params(&mut params);
        Self {
            id: class.clone(),
            name: class,
            kind,
            params,
            children: Vec::new(),
            parent: None,
            parent_scope: ActivityScope::ON,
            current_scope: ActivityScope::ON,
            threads: (0..DEFAULT_NUM_THREADS)
                .map(|_| Mutex::new(Mat4::IDENTITY))
                .collect(),
        }
    }

    // --- identity ---

    /// Tree-unique id. System-assigned; editors rename `name`, not this.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = id;
    }

    /// User-editable display label.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Stable class name used for serialization and factory lookup.
    pub fn class_name(&self) -> &str {
        self.kind.class_name()
    }

    pub fn object_type(&self) -> ObjectType {
        self.kind.object_type()
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut ObjectKind {
        &mut self.kind
    }

    // --- tree relations (ids; the arena owns the objects) ---

    pub fn children(&self) -> &[String] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<String> {
        &mut self.children
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub(crate) fn set_parent(&mut self, parent: Option<String>) {
        self.parent = parent;
    }

    pub fn can_have_children(&self, child: ObjectType) -> bool {
        can_contain(self.object_type(), child)
    }

    // --- parameters ---

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Parameters {
        &mut self.params
    }

    /// True when any parameter of this object is modulated.
    pub fn is_modulated(&self) -> bool {
        self.params.is_modulated()
    }

    /// Kind hook fired by the facade after a successful value change.
    pub(crate) fn on_parameter_changed(&mut self, param_id: &str) {
        let Self { kind, params, .. } = self;
        kind.on_parameter_changed(params, param_id);
    }

    // --- activity ---

    /// User-set scope masked by the scope inherited from the parents.
    pub fn activity_scope(&self) -> ActivityScope {
        let own = match self.params.get(P_ACTIVE_SCOPE) {
            Some(p) => ActivityScope(p.select_value() as u32),
            None => ActivityScope::ON,
        };
        own & self.parent_scope
    }

    pub(crate) fn set_parent_scope(&mut self, scope: ActivityScope) {
        self.parent_scope = scope;
    }

    pub(crate) fn set_current_scope(&mut self, scope: ActivityScope) {
        self.current_scope = scope;
    }

    /// Whether the object fits the current tree scope at all.
    pub fn active_at_all(&self) -> bool {
        self.activity_scope().intersects(self.current_scope)
    }

    /// Scope check plus the kind's local time window (sequences and clips
    /// are active only inside their range).
    pub fn active(&self, time: f64) -> bool {
        if !self.active_at_all() {
            return false;
        }
        match self.kind.time_range(&self.params) {
            Some((start, end)) => time >= start && time < end,
            None => true,
        }
    }

    // --- per-thread storage ---

    pub fn num_threads(&self) -> usize {
        self.threads.len()
    }

    pub(crate) fn set_num_threads(&mut self, num: usize) {
        self.threads
            .resize_with(num.max(1), || Mutex::new(Mat4::IDENTITY));
    }

    /// World transform computed by the worker for `thread`. Identity when
    /// the slot index is out of range (worker count changed mid-tick).
    pub fn transformation(&self, thread: usize) -> Mat4 {
        match self.threads.get(thread) {
            Some(slot) => *slot.lock().unwrap_or_else(|e| e.into_inner()),
            None => Mat4::IDENTITY,
        }
    }

    /// Store the transform for `thread`. Takes `&self`: workers write their
    /// slot while holding the tree read lock.
    pub fn set_transformation(&self, thread: usize, mat: Mat4) {
        if let Some(slot) = self.threads.get(thread) {
            *slot.lock().unwrap_or_else(|e| e.into_inner()) = mat;
        }
    }
}

/// Parameters every object carries, regardless of kind.
fn create_builtin_params(params: &mut Parameters) {
    params.add_select(
        P_ACTIVE_SCOPE,
        "Activity",
        &["off", "preview1", "preview2", "preview3", "preview", "render", "on"],
        &[
            ActivityScope::OFF.0 as i64,
            ActivityScope::PREVIEW_1.0 as i64,
            ActivityScope::PREVIEW_2.0 as i64,
            ActivityScope::PREVIEW_3.0 as i64,
            ActivityScope::PREVIEW.0 as i64,
            ActivityScope::RENDER.0 as i64,
            ActivityScope::ON.0 as i64,
        ],
        6,
    );
}
