//! ObjectTree: the ownership hierarchy of objects.
//!
//! Objects live in a flat id-keyed arena; each object holds the ids of its
//! children (ordered) and of its parent. The tree owns the objects
//! exclusively — removing a subtree drops its objects — while every
//! cross-reference (modulators, audio connections) addresses objects by id
//! and is re-resolved against the arena after structural changes, so
//! nothing dangles across moves or reloads.
//!
//! All structure ops validate before they mutate: an error return means the
//! tree is untouched.

use std::collections::{HashMap, HashSet};

use glam::{Mat4, Vec3};
use indexmap::IndexMap;

use crate::config::MAX_MODULATION_DEPTH;
use crate::entities::keys::*;
use crate::error::SceneError;

use super::kind::ObjectKind;
use super::modulator::{Modulator, ModulatorState};
use super::object::{object_priority, ActivityScope, Object, ObjectType};

/// Id-keyed object arena with a designated root.
#[derive(Debug)]
pub struct ObjectTree {
    objects: IndexMap<String, Object>,
    root: String,
    current_scope: ActivityScope,
}

impl ObjectTree {
    /// Build a tree around its root object. The root keeps its id verbatim.
    pub fn new(root: Object) -> Self {
        let root_id = root.id().to_string();
        let mut objects = IndexMap::new();
        objects.insert(root_id.clone(), root);
        Self {
            objects,
            root: root_id,
            current_scope: ActivityScope::ON,
        }
    }

    // ------------------------------------------------------- accessors ---

    pub fn root_id(&self) -> &str {
        &self.root
    }

    pub fn get(&self, id: &str) -> Option<&Object> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Object> {
        self.objects.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn current_scope(&self) -> ActivityScope {
        self.current_scope
    }

    // ------------------------------------------------------ uniqueness ---

    /// Return `candidate` unchanged when no other object carries it,
    /// otherwise bump a trailing counter until the id is free. Whitespace
    /// is replaced by underscores. Read-only and deterministic.
    pub fn unique_id(&self, candidate: &str, ignore: Option<&str>) -> String {
        let mut id = candidate.split_whitespace().collect::<Vec<_>>().join("_");
        if id.is_empty() {
            id = "Object".to_string();
        }
        while self
            .objects
            .keys()
            .any(|k| k == &id && Some(k.as_str()) != ignore)
        {
            id = increment_suffix(&id);
        }
        id
    }

    // ------------------------------------------------------- structure ---

    /// Attach a freshly created object under `parent_id`.
    ///
    /// Validates type compatibility, de-duplicates the object's id against
    /// the whole tree and clamps the insert index into the child's sibling
    /// priority band, keeping transformations in front. `None` appends at
    /// the band's end. Returns the final (possibly adjusted) id.
    pub fn add_child(
        &mut self,
        parent_id: &str,
        mut obj: Object,
        index: Option<usize>,
    ) -> Result<String, SceneError> {
        let child_type = obj.object_type();
        if child_type == ObjectType::SCENE {
            return Err(SceneError::InvalidHierarchy {
                parent: parent_id.to_string(),
                child: obj.class_name().to_string(),
            });
        }
        let parent = self
            .objects
            .get(parent_id)
            .ok_or_else(|| SceneError::UnknownObject {
                id: parent_id.to_string(),
            })?;
        if !parent.can_have_children(child_type) {
            return Err(SceneError::InvalidHierarchy {
                parent: parent_id.to_string(),
                child: obj.class_name().to_string(),
            });
        }
        let parent_scope = parent.activity_scope();

        let id = self.unique_id(obj.id(), None);
        obj.set_id(id.clone());
        obj.set_parent(Some(parent_id.to_string()));
        obj.set_parent_scope(parent_scope);
        obj.set_current_scope(self.current_scope);

        let pos = self.insert_position(parent_id, child_type, index);
        if let Some(p) = self.objects.get_mut(parent_id) {
            p.children_mut().insert(pos, id.clone());
        }
        self.objects.insert(id.clone(), obj);
        log::debug!("added '{}' under '{}' at {}", id, parent_id, pos);
        Ok(id)
    }

    /// Remove `id` and its whole subtree. Every modulator anywhere in the
    /// tree that references a removed object is marked dangling and pruned
    /// before the call returns. Returns the removed ids (subtree pre-order);
    /// the caller prunes audio connections with them.
    pub fn delete_child(&mut self, id: &str) -> Result<Vec<String>, SceneError> {
        if id == self.root {
            return Err(SceneError::RootImmutable);
        }
        if !self.objects.contains_key(id) {
            return Err(SceneError::UnknownObject { id: id.to_string() });
        }
        let removed = self.subtree_ids(id);
        let gone: HashSet<&str> = removed.iter().map(String::as_str).collect();

        let parent_id = self
            .objects
            .get(id)
            .and_then(|o| o.parent_id())
            .map(str::to_string);
        if let Some(pid) = parent_id {
            if let Some(p) = self.objects.get_mut(&pid) {
                p.children_mut().retain(|c| c != id);
            }
        }

        // flag edges into the dying subtree, then prune them
        let mut pruned = 0;
        for obj in self.objects.values_mut() {
            if gone.contains(obj.id()) {
                continue;
            }
            for param in obj.params_mut().iter_mut() {
                for m in param.modulators_mut().iter_mut() {
                    if gone.contains(m.source_id()) {
                        m.mark_dangling();
                    }
                }
                pruned += prune_dangling(param.modulators_mut());
            }
        }
        if pruned > 0 {
            log::info!("pruned {} dangling modulator(s) after deleting '{}'", pruned, id);
        }

        for rid in &removed {
            self.objects.shift_remove(rid);
        }
        log::debug!("deleted '{}' ({} object(s))", id, removed.len());
        Ok(removed)
    }

    /// Reparent `id` under `new_parent_id`. The object keeps its id, so
    /// modulators and connections referencing it stay valid — they are
    /// re-pointed, never recreated. Fails when the move would place the
    /// object inside its own subtree.
    pub fn move_child(
        &mut self,
        id: &str,
        new_parent_id: &str,
        index: Option<usize>,
    ) -> Result<(), SceneError> {
        if id == self.root {
            return Err(SceneError::RootImmutable);
        }
        let obj = self
            .objects
            .get(id)
            .ok_or_else(|| SceneError::UnknownObject { id: id.to_string() })?;
        let child_type = obj.object_type();
        let child_class = obj.class_name().to_string();
        let new_parent =
            self.objects
                .get(new_parent_id)
                .ok_or_else(|| SceneError::UnknownObject {
                    id: new_parent_id.to_string(),
                })?;
        if new_parent_id == id || self.is_descendant(new_parent_id, id) {
            return Err(SceneError::CyclicHierarchy { id: id.to_string() });
        }
        if !new_parent.can_have_children(child_type) {
            return Err(SceneError::InvalidHierarchy {
                parent: new_parent_id.to_string(),
                child: child_class,
            });
        }

        // detach, then compute the slot — same-parent moves shift indices
        let old_parent = self
            .objects
            .get(id)
            .and_then(|o| o.parent_id())
            .map(str::to_string);
        if let Some(pid) = &old_parent {
            if let Some(p) = self.objects.get_mut(pid) {
                p.children_mut().retain(|c| c != id);
            }
        }
        let pos = self.insert_position(new_parent_id, child_type, index);
        if let Some(p) = self.objects.get_mut(new_parent_id) {
            p.children_mut().insert(pos, id.to_string());
        }
        if let Some(o) = self.objects.get_mut(id) {
            o.set_parent(Some(new_parent_id.to_string()));
        }
        self.propagate_activity();
        log::debug!("moved '{}' under '{}' at {}", id, new_parent_id, pos);
        Ok(())
    }

    /// Slot for a child of priority `object_priority(t)` inside `parent`'s
    /// list: requested indices are clamped into the contiguous band of
    /// equal-priority siblings, so transformations always precede the
    /// objects they apply to.
    fn insert_position(&self, parent_id: &str, t: ObjectType, requested: Option<usize>) -> usize {
        let prio = object_priority(t);
        let Some(parent) = self.objects.get(parent_id) else {
            return 0;
        };
        let prio_of = |cid: &String| {
            self.objects
                .get(cid)
                .map(|c| object_priority(c.object_type()))
                .unwrap_or(0)
        };
        let lo = parent.children().iter().filter(|c| prio_of(c) > prio).count();
        let hi = parent.children().iter().filter(|c| prio_of(c) >= prio).count();
        match requested {
            None => hi,
            Some(i) => i.clamp(lo, hi),
        }
    }

    /// True when `id` lies anywhere below `ancestor`.
    pub fn is_descendant(&self, id: &str, ancestor: &str) -> bool {
        let mut cur = self.objects.get(id).and_then(|o| o.parent_id());
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.objects.get(p).and_then(|o| o.parent_id());
        }
        false
    }

    /// Ids of `id` and everything below it, pre-order.
    pub fn subtree_ids(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(cur) = stack.pop() {
            if let Some(o) = self.objects.get(&cur) {
                for c in o.children().iter().rev() {
                    stack.push(c.clone());
                }
                out.push(cur);
            }
        }
        out
    }

    /// Child of `from` with the given id; `recursive` searches the whole
    /// subtree.
    pub fn find_child(&self, from: &str, id: &str, recursive: bool) -> Option<&Object> {
        let obj = self.objects.get(from)?;
        for c in obj.children() {
            if c == id {
                return self.objects.get(c);
            }
        }
        if recursive {
            for c in obj.children() {
                if let Some(found) = self.find_child(c, id, true) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Children of `from` whose type intersects `mask`, in tree order.
    pub fn find_children(&self, from: &str, mask: ObjectType, recursive: bool) -> Vec<&Object> {
        let mut out = Vec::new();
        let Some(obj) = self.objects.get(from) else {
            return out;
        };
        for c in obj.children() {
            if let Some(co) = self.objects.get(c) {
                if co.object_type().intersects(mask) {
                    out.push(co);
                }
                if recursive {
                    out.extend(self.find_children(c, mask, true));
                }
            }
        }
        out
    }

    // ------------------------------------------------------ modulators ---

    /// Wire `source_id` into a parameter. Validation order: parameter
    /// policy, source existence, accepted source types, duplicate
    /// (idempotent success), modulation-cycle safety. The new edge is
    /// resolved immediately.
    ///
    /// Returns whether an edge was actually added.
    pub fn add_modulator(
        &mut self,
        object_id: &str,
        param_id: &str,
        source_id: &str,
        output_id: &str,
        channel: u32,
    ) -> Result<bool, SceneError> {
        let obj = self
            .objects
            .get(object_id)
            .ok_or_else(|| SceneError::UnknownObject {
                id: object_id.to_string(),
            })?;
        let param = obj
            .params()
            .get(param_id)
            .ok_or_else(|| SceneError::UnknownParameter {
                object: object_id.to_string(),
                param: param_id.to_string(),
            })?;
        if !param.is_modulateable() {
            return Err(SceneError::NotModulateable {
                param: param_id.to_string(),
            });
        }
        let source = self
            .objects
            .get(source_id)
            .ok_or_else(|| SceneError::UnknownObject {
                id: source_id.to_string(),
            })?;
        if !param.accepted_sources().intersects(source.object_type()) {
            return Err(SceneError::IncompatibleSource {
                source_id: source_id.to_string(),
                param: param_id.to_string(),
            });
        }
        if param.find_modulator(source_id, output_id).is_some() {
            log::debug!(
                "modulator '{}' -> '{}':'{}' already present",
                source_id,
                object_id,
                param_id
            );
            return Ok(false);
        }
        if !self.is_safe_modulator_source(source_id, object_id) {
            return Err(SceneError::CyclicModulation {
                source_id: source_id.to_string(),
                target: object_id.to_string(),
            });
        }

        let mut modulator = Modulator::new(source_id, output_id, channel);
        modulator.mark_resolved();
        if let Some(p) = self
            .objects
            .get_mut(object_id)
            .and_then(|o| o.params_mut().get_mut(param_id))
        {
            p.add_modulator(modulator)?;
        }
        log::debug!(
            "modulator '{}' -> '{}':'{}' added",
            source_id,
            object_id,
            param_id
        );
        Ok(true)
    }

    /// Remove the matching edge. Idempotent; `Ok(false)` when absent.
    pub fn remove_modulator(
        &mut self,
        object_id: &str,
        param_id: &str,
        source_id: &str,
        output_id: &str,
    ) -> Result<bool, SceneError> {
        let obj = self
            .objects
            .get_mut(object_id)
            .ok_or_else(|| SceneError::UnknownObject {
                id: object_id.to_string(),
            })?;
        let param =
            obj.params_mut()
                .get_mut(param_id)
                .ok_or_else(|| SceneError::UnknownParameter {
                    object: object_id.to_string(),
                    param: param_id.to_string(),
                })?;
        Ok(param.remove_modulator(source_id, output_id))
    }

    /// Whether `source_id` may feed a parameter owned by `target_id`
    /// without closing a loop: traces everything `source_id`'s evaluation
    /// pulls from (its parameters' modulator sources, and — for
    /// container-valued sources — its children) and rejects when the trace
    /// reaches `target_id`.
    pub fn is_safe_modulator_source(&self, source_id: &str, target_id: &str) -> bool {
        if source_id == target_id {
            return false;
        }
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![source_id];
        while let Some(cur) = stack.pop() {
            if cur == target_id {
                return false;
            }
            if !visited.insert(cur) {
                continue;
            }
            let Some(obj) = self.objects.get(cur) else {
                continue;
            };
            for param in obj.params().iter() {
                for m in param.modulators() {
                    stack.push(m.source_id());
                }
            }
            // a track/group/clip output pulls its children
            if obj.object_type().intersects(ObjectType::MODULATOR_SOURCE) {
                for c in obj.children() {
                    stack.push(c);
                }
            }
        }
        true
    }

    /// Resolution pass: re-validate every modulator edge against the
    /// current arena. Edges whose source exists (with a compatible type)
    /// become Resolved; previously resolved edges whose source vanished or
    /// degraded become Dangling and are pruned; never-resolved edges stay
    /// Unresolved (expected mid-reconstruction) and are logged.
    ///
    /// Returns (unresolved, pruned).
    pub fn collect_modulators(&mut self) -> (usize, usize) {
        let types: HashMap<String, ObjectType> = self
            .objects
            .iter()
            .map(|(k, v)| (k.clone(), v.object_type()))
            .collect();
        let mut unresolved = 0;
        let mut pruned = 0;
        for obj in self.objects.values_mut() {
            for param in obj.params_mut().iter_mut() {
                let accepted = param.accepted_sources();
                for m in param.modulators_mut().iter_mut() {
                    match types.get(m.source_id()) {
                        Some(t) if accepted.intersects(*t) => m.mark_resolved(),
                        Some(_) => {
                            log::warn!(
                                "modulator source '{}' has an incompatible type, dropping",
                                m.source_id()
                            );
                            m.mark_dangling();
                        }
                        None => {
                            if m.is_resolved() {
                                m.mark_dangling();
                            } else {
                                log::warn!("modulator source '{}' not found yet", m.source_id());
                                m.mark_unresolved();
                                unresolved += 1;
                            }
                        }
                    }
                }
                pruned += prune_dangling(param.modulators_mut());
            }
        }
        (unresolved, pruned)
    }

    /// Single-parameter variant of the resolution pass, for modulator
    /// edits that cannot invalidate anything else.
    pub fn collect_modulators_for(&mut self, object_id: &str, param_id: &str) {
        let ids: HashSet<String> = self.objects.keys().cloned().collect();
        if let Some(p) = self
            .objects
            .get_mut(object_id)
            .and_then(|o| o.params_mut().get_mut(param_id))
        {
            for m in p.modulators_mut().iter_mut() {
                if ids.contains(m.source_id()) {
                    m.mark_resolved();
                } else if m.is_resolved() {
                    m.mark_dangling();
                }
            }
            prune_dangling(p.modulators_mut());
        }
    }

    /// Ids of the objects feeding any parameter of `id` (direct edges).
    pub fn modulating_objects(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(obj) = self.objects.get(id) {
            for param in obj.params().iter() {
                for m in param.modulators() {
                    if !out.iter().any(|s| s == m.source_id()) {
                        out.push(m.source_id().to_string());
                    }
                }
            }
        }
        out
    }

    // ------------------------------------------------------ evaluation ---

    /// Effective float value of a parameter at scene time `time`:
    /// base value plus the sum of all resolved modulator contributions.
    pub fn param_float(&self, object_id: &str, param_id: &str, time: f64) -> f64 {
        self.param_float_depth(object_id, param_id, time, 0)
    }

    fn param_float_depth(&self, object_id: &str, param_id: &str, time: f64, depth: u32) -> f64 {
        let Some(param) = self.objects.get(object_id).and_then(|o| o.params().get(param_id))
        else {
            return 0.0;
        };
        let mut v = param.base_float();
        if depth >= MAX_MODULATION_DEPTH {
            log::warn!("modulation depth cap hit at '{}':'{}'", object_id, param_id);
            return v;
        }
        for m in param.modulators() {
            if !m.is_resolved() {
                continue;
            }
            v += m.amplitude
                * self.source_value_depth(m.source_id(), m.channel(), time + m.time_offset, depth + 1);
        }
        v
    }

    /// Float output of a modulation source object at `time`. Inactive
    /// objects read as 0.
    pub fn source_value(&self, id: &str, channel: u32, time: f64) -> f64 {
        self.source_value_depth(id, channel, time, 0)
    }

    fn source_value_depth(&self, id: &str, channel: u32, time: f64, depth: u32) -> f64 {
        if depth >= MAX_MODULATION_DEPTH {
            return 0.0;
        }
        let Some(obj) = self.objects.get(id) else {
            return 0.0;
        };
        if !obj.active(time) {
            return 0.0;
        }
        match obj.kind() {
            ObjectKind::ModulatorFloat(_) => {
                self.param_float_depth(id, P_VALUE, time, depth + 1)
                    * self.param_float_depth(id, P_AMP, time, depth + 1)
            }
            ObjectKind::SequenceFloat(_) => {
                let params = obj.params();
                let start = params.get(P_START).map(|p| p.base_float()).unwrap_or(0.0);
                let speed = params.get(P_SPEED).map(|p| p.base_float()).unwrap_or(1.0);
                params
                    .get(P_TIMELINE)
                    .and_then(|p| p.value().as_timeline())
                    .map(|tl| tl.value((time - start) * speed))
                    .unwrap_or(0.0)
            }
            ObjectKind::TrackFloat(_) | ObjectKind::SequenceGroup(_) | ObjectKind::Clip(_) => {
                for c in obj.children() {
                    if let Some(co) = self.objects.get(c) {
                        if co.object_type().intersects(ObjectType::MODULATOR_SOURCE)
                            && co.active(time)
                        {
                            return self.source_value_depth(c, channel, time, depth + 1);
                        }
                    }
                }
                0.0
            }
            _ => {
                log::debug!("object '{}' has no float output", id);
                0.0
            }
        }
    }

    /// Local transform of `id` at `time`: the product of its active
    /// transformation children, in child order.
    pub fn calculate_transformation(&self, id: &str, time: f64) -> Mat4 {
        let Some(obj) = self.objects.get(id) else {
            return Mat4::IDENTITY;
        };
        let mut mat = Mat4::IDENTITY;
        for c in obj.children() {
            let Some(t) = self.objects.get(c) else {
                continue;
            };
            if !t.object_type().intersects(ObjectType::ANY_TRANSFORMATION) {
                // transformations lead the child list; nothing past here
                break;
            }
            if !t.active(time) {
                continue;
            }
            mat *= self.transform_matrix(t, time);
        }
        mat
    }

    fn transform_matrix(&self, t: &Object, time: f64) -> Mat4 {
        let f = |pid: &str| self.param_float(t.id(), pid, time) as f32;
        match t.kind() {
            ObjectKind::Translation(_) => {
                Mat4::from_translation(Vec3::new(f(P_X), f(P_Y), f(P_Z)))
            }
            ObjectKind::AxisRotation(_) => {
                let axis = Vec3::new(f(P_X), f(P_Y), f(P_Z))
                    .try_normalize()
                    .unwrap_or(Vec3::Y);
                Mat4::from_axis_angle(axis, f(P_ANGLE).to_radians())
            }
            ObjectKind::Scale(_) => Mat4::from_scale(Vec3::new(f(P_X), f(P_Y), f(P_Z))),
            ObjectKind::TransformMix(_) => {
                let mix = self.param_float(t.id(), P_MIX, time).clamp(0.0, 1.0) as f32;
                let sub = self.calculate_transformation(t.id(), time);
                Mat4::IDENTITY * (1.0 - mix) + sub * mix
            }
            _ => Mat4::IDENTITY,
        }
    }

    // -------------------------------------------------------- tree-wide ---

    /// Requested activity scope for the whole tree; re-derives every
    /// object's inherited scope.
    pub fn set_current_scope(&mut self, scope: ActivityScope) {
        self.current_scope = scope;
        self.propagate_activity();
    }

    /// Re-derive inherited activity scopes along the parent chains.
    pub fn propagate_activity(&mut self) {
        let mut stack = vec![(self.root.clone(), ActivityScope::ON)];
        while let Some((id, parent_scope)) = stack.pop() {
            let scope = self.current_scope;
            if let Some(obj) = self.objects.get_mut(&id) {
                obj.set_parent_scope(parent_scope);
                obj.set_current_scope(scope);
                let own = obj.activity_scope();
                for c in obj.children() {
                    stack.push((c.clone(), own));
                }
            }
        }
    }

    /// Size every object's per-thread storage for `num` worker threads.
    pub fn set_num_threads(&mut self, num: usize) {
        for obj in self.objects.values_mut() {
            obj.set_num_threads(num);
        }
    }
}

fn prune_dangling(modulators: &mut Vec<Modulator>) -> usize {
    let before = modulators.len();
    modulators.retain(|m| m.state() != ModulatorState::Dangling);
    before - modulators.len()
}

fn increment_suffix(id: &str) -> String {
    let head = id.trim_end_matches(|c: char| c.is_ascii_digit());
    match id[head.len()..].parse::<u64>() {
        Ok(n) => format!("{}{}", head, n + 1),
        Err(_) => format!("{}1", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::factory::ObjectRegistry;
    use crate::entities::nodes::SceneRoot;
    use crate::entities::params::ParamValue;
    use crate::entities::timeline::Timeline1d;

    fn scene_tree() -> (ObjectTree, ObjectRegistry) {
        let registry = ObjectRegistry::with_builtins();
        let tree = ObjectTree::new(Object::with_kind(SceneRoot.into()));
        (tree, registry)
    }

    fn add(tree: &mut ObjectTree, reg: &ObjectRegistry, parent: &str, class: &str) -> String {
        tree.add_child(parent, reg.create_object(class).unwrap(), None)
            .unwrap()
    }

    #[test]
    fn test_unique_id_suffixing() {
        let (mut tree, reg) = scene_tree();
        let g = add(&mut tree, &reg, "Scene", "Group");
        assert_eq!(g, "Group");
        let t1 = add(&mut tree, &reg, &g, "Translation");
        let t2 = add(&mut tree, &reg, &g, "Translation");
        let t3 = add(&mut tree, &reg, &g, "Translation");
        assert_eq!(t1, "Translation");
        assert_eq!(t2, "Translation1");
        assert_eq!(t3, "Translation2");
    }

    #[test]
    fn test_unique_id_is_read_only() {
        let (mut tree, reg) = scene_tree();
        add(&mut tree, &reg, "Scene", "Group");
        assert_eq!(tree.unique_id("Group", None), "Group1");
        assert_eq!(tree.unique_id("Group", None), "Group1");
        assert_eq!(tree.unique_id("Group", Some("Group")), "Group");
        assert_eq!(tree.unique_id("a b c", None), "a_b_c");
    }

    #[test]
    fn test_add_child_rejects_bad_hierarchy() {
        let (mut tree, reg) = scene_tree();
        // raw transformations don't attach to the scene root
        let err = tree
            .add_child("Scene", reg.create_object("Translation").unwrap(), None)
            .unwrap_err();
        assert!(matches!(err, SceneError::InvalidHierarchy { .. }));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_transformations_kept_first() {
        let (mut tree, reg) = scene_tree();
        let g = add(&mut tree, &reg, "Scene", "Group");
        add(&mut tree, &reg, &g, "Camera");
        // appending a transformation lands before the camera
        let t = add(&mut tree, &reg, &g, "Translation");
        let children = tree.get(&g).unwrap().children().to_vec();
        assert_eq!(children, vec![t.clone(), "Camera".to_string()]);
        // an explicit index past the band is clamped back into it
        let s = tree
            .add_child(&g, reg.create_object("Scale").unwrap(), Some(5))
            .unwrap();
        let children = tree.get(&g).unwrap().children().to_vec();
        assert_eq!(children, vec![t, s, "Camera".to_string()]);
    }

    #[test]
    fn test_move_child_cycle_rejected() {
        let (mut tree, reg) = scene_tree();
        let a = add(&mut tree, &reg, "Scene", "Group");
        let b = add(&mut tree, &reg, &a, "Group");
        let c = add(&mut tree, &reg, &b, "Group");
        // a under c would nest a inside its own subtree
        let err = tree.move_child(&a, &c, None).unwrap_err();
        assert!(matches!(err, SceneError::CyclicHierarchy { .. }));
        let err = tree.move_child(&a, &a, None).unwrap_err();
        assert!(matches!(err, SceneError::CyclicHierarchy { .. }));
        // legal move keeps the id
        tree.move_child(&c, "Scene", None).unwrap();
        assert_eq!(tree.get(&c).unwrap().parent_id(), Some("Scene"));
    }

    #[test]
    fn test_delete_prunes_modulators() {
        let (mut tree, reg) = scene_tree();
        let g = add(&mut tree, &reg, "Scene", "Group");
        let m = add(&mut tree, &reg, "Scene", "ModulatorFloat");
        let t = add(&mut tree, &reg, &g, "Translation");
        tree.add_modulator(&t, P_X, &m, "", 0).unwrap();
        assert!(tree.get(&t).unwrap().params().get(P_X).unwrap().is_modulated());

        tree.delete_child(&m).unwrap();
        let p = tree.get(&t).unwrap().params().get(P_X).unwrap();
        assert!(!p.is_modulated());
        assert!(p.modulator_ids().is_empty());
    }

    #[test]
    fn test_delete_subtree_prunes_deep_sources() {
        let (mut tree, reg) = scene_tree();
        let g = add(&mut tree, &reg, "Scene", "Group");
        let inner = add(&mut tree, &reg, &g, "Group");
        let m = add(&mut tree, &reg, &inner, "ModulatorFloat");
        let cam = add(&mut tree, &reg, "Scene", "Camera");
        tree.add_modulator(&cam, P_FOV, &m, "", 0).unwrap();

        // deleting the outer group removes the source deep inside it
        let removed = tree.delete_child(&g).unwrap();
        assert_eq!(removed.len(), 3);
        assert!(!tree.get(&cam).unwrap().params().get(P_FOV).unwrap().is_modulated());
    }

    #[test]
    fn test_add_modulator_policies() {
        let (mut tree, reg) = scene_tree();
        let g = add(&mut tree, &reg, "Scene", "Group");
        let t = add(&mut tree, &reg, &g, "Translation");
        let m = add(&mut tree, &reg, "Scene", "ModulatorFloat");
        let cam = add(&mut tree, &reg, &g, "Camera");

        // duplicate add is an idempotent no-op
        assert!(tree.add_modulator(&t, P_X, &m, "", 0).unwrap());
        assert!(!tree.add_modulator(&t, P_X, &m, "", 0).unwrap());
        let ids = tree.get(&t).unwrap().params().get(P_X).unwrap().modulator_ids();
        assert_eq!(ids, vec![(m.clone(), String::new())]);

        // a camera is not an acceptable float source
        assert!(matches!(
            tree.add_modulator(&t, P_Y, &cam, "", 0),
            Err(SceneError::IncompatibleSource { .. })
        ));
        // select params refuse modulation outright
        assert!(matches!(
            tree.add_modulator(&t, P_ACTIVE_SCOPE, &m, "", 0),
            Err(SceneError::NotModulateable { .. })
        ));
    }

    #[test]
    fn test_modulation_cycle_rejected() {
        let (mut tree, reg) = scene_tree();
        let m1 = add(&mut tree, &reg, "Scene", "ModulatorFloat");
        let m2 = add(&mut tree, &reg, "Scene", "ModulatorFloat");
        assert_ne!(m1, m2);
        tree.add_modulator(&m2, P_VALUE, &m1, "", 0).unwrap();
        // m1 depends on m2? no — m2 pulls m1; feeding m2 back into m1 loops
        let err = tree.add_modulator(&m1, P_VALUE, &m2, "", 0).unwrap_err();
        assert!(matches!(err, SceneError::CyclicModulation { .. }));
        // self-modulation is the smallest loop
        let err = tree.add_modulator(&m1, P_AMP, &m1, "", 0).unwrap_err();
        assert!(matches!(err, SceneError::CyclicModulation { .. }));
    }

    #[test]
    fn test_remove_modulator_idempotent() {
        let (mut tree, reg) = scene_tree();
        let g = add(&mut tree, &reg, "Scene", "Group");
        let t = add(&mut tree, &reg, &g, "Translation");
        let m = add(&mut tree, &reg, "Scene", "ModulatorFloat");
        tree.add_modulator(&t, P_X, &m, "", 0).unwrap();
        assert!(tree.remove_modulator(&t, P_X, &m, "").unwrap());
        assert!(!tree.remove_modulator(&t, P_X, &m, "").unwrap());
    }

    #[test]
    fn test_find_children_by_mask() {
        let (mut tree, reg) = scene_tree();
        let g = add(&mut tree, &reg, "Scene", "Group");
        add(&mut tree, &reg, &g, "Translation");
        add(&mut tree, &reg, &g, "Scale");
        let inner = add(&mut tree, &reg, &g, "Group");
        add(&mut tree, &reg, &inner, "AxisRotation");

        let direct = tree.find_children(&g, ObjectType::ANY_TRANSFORMATION, false);
        assert_eq!(direct.len(), 2);
        let all = tree.find_children(&g, ObjectType::ANY_TRANSFORMATION, true);
        assert_eq!(all.len(), 3);
        assert!(tree.find_child(&g, "AxisRotation", true).is_some());
        assert!(tree.find_child(&g, "AxisRotation", false).is_none());
    }

    #[test]
    fn test_modulated_param_evaluation() {
        let (mut tree, reg) = scene_tree();
        let g = add(&mut tree, &reg, "Scene", "Group");
        let t = add(&mut tree, &reg, &g, "Translation");
        let m = add(&mut tree, &reg, "Scene", "ModulatorFloat");
        tree.get_mut(&m)
            .unwrap()
            .params_mut()
            .get_mut(P_VALUE)
            .unwrap()
            .set_value(ParamValue::Float(2.0))
            .unwrap();
        tree.get_mut(&t)
            .unwrap()
            .params_mut()
            .get_mut(P_X)
            .unwrap()
            .set_value(ParamValue::Float(1.0))
            .unwrap();
        tree.add_modulator(&t, P_X, &m, "", 0).unwrap();
        // base 1.0 + 1.0 * (value 2.0 * amp 1.0)
        assert_eq!(tree.param_float(&t, P_X, 0.0), 3.0);

        // an inactive source reads as zero
        tree.get_mut(&m)
            .unwrap()
            .params_mut()
            .get_mut(P_ACTIVE_SCOPE)
            .unwrap()
            .set_select_by_id("off")
            .unwrap();
        tree.propagate_activity();
        assert_eq!(tree.param_float(&t, P_X, 0.0), 1.0);
    }

    #[test]
    fn test_sequence_source_window() {
        let (mut tree, reg) = scene_tree();
        let track = add(&mut tree, &reg, "Scene", "TrackFloat");
        let seq = add(&mut tree, &reg, &track, "SequenceFloat");
        {
            let params = tree.get_mut(&seq).unwrap().params_mut();
            params
                .get_mut(P_START)
                .unwrap()
                .set_value(ParamValue::Float(10.0))
                .unwrap();
            params
                .get_mut(P_LENGTH)
                .unwrap()
                .set_value(ParamValue::Float(5.0))
                .unwrap();
            params
                .get_mut(P_TIMELINE)
                .unwrap()
                .set_value(ParamValue::Timeline(Timeline1d::from_points([
                    (0.0, 0.0),
                    (4.0, 4.0),
                ])))
                .unwrap();
        }
        // outside the window the sequence (and thus the track) is silent
        assert_eq!(tree.source_value(&track, 0, 0.0), 0.0);
        assert_eq!(tree.source_value(&track, 0, 16.0), 0.0);
        // inside, the curve is sampled in local time
        assert_eq!(tree.source_value(&track, 0, 12.0), 2.0);
        assert_eq!(tree.source_value(&seq, 0, 12.0), 2.0);
    }

    #[test]
    fn test_transformation_chain() {
        let (mut tree, reg) = scene_tree();
        let g = add(&mut tree, &reg, "Scene", "Group");
        let t = add(&mut tree, &reg, &g, "Translation");
        tree.get_mut(&t)
            .unwrap()
            .params_mut()
            .get_mut(P_X)
            .unwrap()
            .set_value(ParamValue::Float(5.0))
            .unwrap();
        let mat = tree.calculate_transformation(&g, 0.0);
        let p = mat.transform_point3(Vec3::ZERO);
        assert!((p.x - 5.0).abs() < 1e-6);

        // disabling the transformation removes its contribution
        tree.get_mut(&t)
            .unwrap()
            .params_mut()
            .get_mut(P_ACTIVE_SCOPE)
            .unwrap()
            .set_select_by_id("off")
            .unwrap();
        tree.propagate_activity();
        assert_eq!(tree.calculate_transformation(&g, 0.0), Mat4::IDENTITY);
    }

    #[test]
    fn test_collect_modulators_after_manual_edit() {
        let (mut tree, reg) = scene_tree();
        let g = add(&mut tree, &reg, "Scene", "Group");
        let t = add(&mut tree, &reg, &g, "Translation");
        // simulate a deserialized edge whose source is not there yet
        tree.get_mut(&t)
            .unwrap()
            .params_mut()
            .get_mut(P_X)
            .unwrap()
            .add_modulator(Modulator::new("Missing", "", 0))
            .unwrap();
        let (unresolved, pruned) = tree.collect_modulators();
        assert_eq!((unresolved, pruned), (1, 0));
        // the source appears later; the next pass resolves the edge
        let mut mf = reg.create_object("ModulatorFloat").unwrap();
        mf.set_id("Missing".to_string());
        tree.add_child("Scene", mf, None).unwrap();
        let (unresolved, _) = tree.collect_modulators();
        assert_eq!(unresolved, 0);
        assert!(tree
            .get(&t)
            .unwrap()
            .params()
            .get(P_X)
            .unwrap()
            .find_modulator("Missing", "")
            .unwrap()
            .is_resolved());
    }

    #[test]
    fn test_activity_propagation_masks_children() {
        let (mut tree, reg) = scene_tree();
        let g = add(&mut tree, &reg, "Scene", "Group");
        let inner = add(&mut tree, &reg, &g, "Group");
        tree.get_mut(&g)
            .unwrap()
            .params_mut()
            .get_mut(P_ACTIVE_SCOPE)
            .unwrap()
            .set_select_by_id("render")
            .unwrap();
        tree.propagate_activity();
        // preview scope: the subtree is dark
        tree.set_current_scope(ActivityScope::PREVIEW);
        assert!(!tree.get(&inner).unwrap().active(0.0));
        tree.set_current_scope(ActivityScope::RENDER);
        assert!(tree.get(&inner).unwrap().active(0.0));
    }
}
