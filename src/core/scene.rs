//! Scene: the mutation facade over the object tree.
//!
//! The scene owns the tree, the audio connection set, the time cursor and
//! the thread count, all behind one `RwLock`. Worker threads take the read
//! side once per tick; every mutation entry point takes the write side,
//! validates, mutates, runs the refresh pass and only then — outside the
//! lock — notifies observers and requests a re-render. An error return
//! means nothing changed.
//!
//! ## Locking
//!
//! The lock maps onto a counting semaphore sized to the reader count: each
//! worker's tick holds one permit (read guard), a structural mutation takes
//! all of them (write guard). Parameter value writes conservatively take
//! the write side too, trading reader overlap for correctness simplicity;
//! they are therefore serialized against each other as well. No acquisition
//! is held across a tick, and nothing blocking runs under a guard.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use glam::Mat4;

use crate::config::DEFAULT_NUM_THREADS;
use crate::entities::connections::{AudioConnection, AudioConnections};
use crate::entities::factory::ObjectRegistry;
use crate::entities::keys::P_ACTIVE_SCOPE;
use crate::entities::nodes::SceneRoot;
use crate::entities::object::{ActivityScope, Object, ObjectType};
use crate::entities::params::ParamValue;
use crate::entities::records::{self, LoadReport, SceneRecord};
use crate::entities::tree::ObjectTree;
use crate::error::{LoadError, SceneError};

use super::event_bus::{SceneEvent, SceneEventSender};

/// Everything guarded by the scene lock.
#[derive(Debug)]
pub struct SceneGraph {
    pub tree: ObjectTree,
    pub connections: AudioConnections,
    pub scene_time: f64,
    pub num_threads: usize,
}

/// Cheaply clonable facade; worker threads hold clones.
#[derive(Clone)]
pub struct Scene {
    graph: Arc<RwLock<SceneGraph>>,
    registry: Arc<ObjectRegistry>,
    events: SceneEventSender,
    render_requested: Arc<AtomicBool>,
}

impl Scene {
    /// Empty scene: a root object and no connections.
    pub fn new(registry: Arc<ObjectRegistry>) -> Self {
        Self::from_parts(
            ObjectTree::new(Object::with_kind(SceneRoot.into())),
            AudioConnections::new(),
            registry,
        )
    }

    fn from_parts(
        tree: ObjectTree,
        connections: AudioConnections,
        registry: Arc<ObjectRegistry>,
    ) -> Self {
        let mut graph = SceneGraph {
            tree,
            connections,
            scene_time: 0.0,
            num_threads: DEFAULT_NUM_THREADS,
        };
        refresh(&mut graph);
        Self {
            graph: Arc::new(RwLock::new(graph)),
            registry,
            events: SceneEventSender::dummy(),
            render_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Connect the notification channel. Call before handing clones out.
    pub fn set_event_sender(&mut self, sender: SceneEventSender) {
        self.events = sender;
    }

    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    fn read(&self) -> RwLockReadGuard<'_, SceneGraph> {
        self.graph.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SceneGraph> {
        self.graph.write().unwrap_or_else(|e| e.into_inner())
    }

    // ------------------------------------------------------- structure ---

    /// Create an object of `class` and attach it under `parent_id`.
    /// Returns the final (de-duplicated) id of the new object.
    pub fn add_object(
        &self,
        parent_id: &str,
        class: &str,
        index: Option<usize>,
    ) -> Result<String, SceneError> {
        let obj = self.registry.create_object(class)?;
        let id = {
            let mut g = self.write();
            let id = g.tree.add_child(parent_id, obj, index)?;
            refresh(&mut g);
            id
        };
        self.events.emit(SceneEvent::ObjectAdded { id: id.clone() });
        self.request_render();
        Ok(id)
    }

    /// Remove `id` and its subtree; prunes modulators and audio
    /// connections referencing anything inside it.
    pub fn delete_object(&self, id: &str) -> Result<(), SceneError> {
        let dropped_connections = {
            let mut g = self.write();
            let removed = g.tree.delete_child(id)?;
            let gone: HashSet<String> = removed.into_iter().collect();
            let dropped = g.connections.remove_objects(&gone);
            refresh(&mut g);
            dropped
        };
        self.events.emit(SceneEvent::ObjectDeleted { id: id.to_string() });
        if dropped_connections > 0 {
            self.events.emit(SceneEvent::ConnectionsChanged);
        }
        self.request_render();
        Ok(())
    }

    /// Reparent `id` under `new_parent_id`, keeping its id and every
    /// reference to it intact.
    pub fn move_object(
        &self,
        id: &str,
        new_parent_id: &str,
        index: Option<usize>,
    ) -> Result<(), SceneError> {
        {
            let mut g = self.write();
            g.tree.move_child(id, new_parent_id, index)?;
            refresh(&mut g);
        }
        self.events.emit(SceneEvent::ObjectMoved { id: id.to_string() });
        self.request_render();
        Ok(())
    }

    /// Classes offered for "add object" menus under `parent_id`.
    pub fn possible_child_classes(&self, parent_id: &str) -> Result<Vec<&'static str>, SceneError> {
        let g = self.read();
        let parent = g
            .tree
            .get(parent_id)
            .ok_or_else(|| SceneError::UnknownObject {
                id: parent_id.to_string(),
            })?;
        Ok(self.registry.possible_child_classes(parent))
    }

    // ------------------------------------------------------- parameters ---

    /// Store a parameter value and fire the owning kind's hook.
    pub fn set_parameter_value(
        &self,
        object_id: &str,
        param_id: &str,
        value: ParamValue,
    ) -> Result<(), SceneError> {
        {
            let mut g = self.write();
            let obj = g
                .tree
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
            param.set_value(value)?;
            obj.on_parameter_changed(param_id);
            if param_id == P_ACTIVE_SCOPE {
                g.tree.propagate_activity();
            }
        }
        self.events.emit(SceneEvent::ParameterChanged {
            object: object_id.to_string(),
            param: param_id.to_string(),
        });
        self.request_render();
        Ok(())
    }

    /// Wire a modulation edge. `Ok(false)` for an already-present edge.
    pub fn add_modulator(
        &self,
        object_id: &str,
        param_id: &str,
        source_id: &str,
        output_id: &str,
        channel: u32,
    ) -> Result<bool, SceneError> {
        let added = {
            let mut g = self.write();
            let added = g
                .tree
                .add_modulator(object_id, param_id, source_id, output_id, channel)?;
            if added {
                // only the touched parameter needs re-resolving
                g.tree.collect_modulators_for(object_id, param_id);
            }
            added
        };
        if added {
            self.events.emit(SceneEvent::ModulatorAdded {
                object: object_id.to_string(),
                param: param_id.to_string(),
                source: source_id.to_string(),
            });
            self.request_render();
        }
        Ok(added)
    }

    /// Remove a modulation edge; idempotent.
    pub fn remove_modulator(
        &self,
        object_id: &str,
        param_id: &str,
        source_id: &str,
        output_id: &str,
    ) -> Result<bool, SceneError> {
        let removed = {
            let mut g = self.write();
            g.tree
                .remove_modulator(object_id, param_id, source_id, output_id)?
        };
        if removed {
            self.events.emit(SceneEvent::ModulatorRemoved {
                object: object_id.to_string(),
                param: param_id.to_string(),
                source: source_id.to_string(),
            });
            self.request_render();
        }
        Ok(removed)
    }

    /// Drop every modulator of one parameter. Returns the removed sources.
    pub fn remove_all_modulators(
        &self,
        object_id: &str,
        param_id: &str,
    ) -> Result<Vec<String>, SceneError> {
        let removed = {
            let mut g = self.write();
            let obj = g
                .tree
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
            let sources: Vec<String> = param
                .modulator_ids()
                .into_iter()
                .map(|(s, _)| s)
                .collect();
            param.remove_all_modulators();
            sources
        };
        for source in &removed {
            self.events.emit(SceneEvent::ModulatorRemoved {
                object: object_id.to_string(),
                param: param_id.to_string(),
                source: source.clone(),
            });
        }
        if !removed.is_empty() {
            self.request_render();
        }
        Ok(removed)
    }

    // ------------------------------------------------------ audio graph ---

    /// Connect two audio objects. Validated per the connection-set rules;
    /// re-connecting an existing edge is an idempotent success.
    pub fn connect_audio(
        &self,
        from: &str,
        to: &str,
        output_channel: u32,
        input_channel: u32,
        num_channels: u32,
    ) -> Result<(), SceneError> {
        {
            let mut g = self.write();
            let g = &mut *g;
            g.connections
                .connect(&g.tree, from, to, output_channel, input_channel, num_channels)?;
        }
        self.events.emit(SceneEvent::ConnectionsChanged);
        self.request_render();
        Ok(())
    }

    /// Remove an audio connection; idempotent.
    pub fn disconnect_audio(&self, connection: &AudioConnection) -> bool {
        let removed = {
            let mut g = self.write();
            g.connections.disconnect(connection)
        };
        if removed {
            self.events.emit(SceneEvent::ConnectionsChanged);
            self.request_render();
        }
        removed
    }

    // ------------------------------------------------------ scene state ---

    pub fn scene_time(&self) -> f64 {
        self.read().scene_time
    }

    pub fn set_scene_time(&self, time: f64) {
        {
            let mut g = self.write();
            g.scene_time = time;
        }
        self.events.emit(SceneEvent::SceneTimeChanged { time });
        self.request_render();
    }

    pub fn num_threads(&self) -> usize {
        self.read().num_threads
    }

    /// Size every object's per-thread storage for `num` workers.
    pub fn set_number_threads(&self, num: usize) {
        let mut g = self.write();
        g.num_threads = num.max(1);
        let n = g.num_threads;
        g.tree.set_num_threads(n);
    }

    /// Tree-wide activity scope (preview/render switch).
    pub fn set_activity_scope(&self, scope: ActivityScope) {
        {
            let mut g = self.write();
            g.tree.set_current_scope(scope);
        }
        self.request_render();
    }

    // -------------------------------------------------------- render API ---

    pub fn request_render(&self) {
        self.render_requested.store(true, Ordering::Release);
    }

    /// Swap out the render-request flag; the host render loop polls this.
    pub fn take_render_request(&self) -> bool {
        self.render_requested.swap(false, Ordering::AcqRel)
    }

    /// Read access for render/audio code; holds the read side for the
    /// duration of `f`.
    pub fn with_graph<R>(&self, f: impl FnOnce(&SceneGraph) -> R) -> R {
        f(&self.read())
    }

    /// One worker tick: compute world transforms for the whole tree into
    /// this thread's slots. Transformation objects contribute to their
    /// parents and keep identity slots themselves.
    pub fn render_pass(&self, thread: usize) {
        let g = self.read();
        let time = g.scene_time;
        let mut stack = vec![(g.tree.root_id().to_string(), Mat4::IDENTITY)];
        while let Some((id, parent_world)) = stack.pop() {
            let Some(obj) = g.tree.get(&id) else {
                continue;
            };
            let world = parent_world * g.tree.calculate_transformation(&id, time);
            obj.set_transformation(thread, world);
            for c in obj.children() {
                if let Some(co) = g.tree.get(c) {
                    if !co.object_type().intersects(ObjectType::ANY_TRANSFORMATION) {
                        stack.push((c.clone(), world));
                    }
                }
            }
        }
    }

    /// World transform of `id` as last computed for `thread`.
    pub fn transformation(&self, id: &str, thread: usize) -> Option<Mat4> {
        self.read().tree.get(id).map(|o| o.transformation(thread))
    }

    /// Activity of `id` at the current scene time.
    pub fn active(&self, id: &str) -> Option<bool> {
        let g = self.read();
        g.tree.get(id).map(|o| o.active(g.scene_time))
    }

    /// Effective (modulated) float value at the current scene time.
    pub fn param_float(&self, object_id: &str, param_id: &str) -> f64 {
        let g = self.read();
        g.tree.param_float(object_id, param_id, g.scene_time)
    }

    // ------------------------------------------------------ persistence ---

    /// Snapshot the scene as a record (tree first, connections after).
    pub fn to_record(&self) -> SceneRecord {
        let g = self.read();
        records::scene_record(&g.tree, &g.connections)
    }

    /// Write the scene to a file. Returns the final path (`.scn` enforced).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<PathBuf> {
        let g = self.read();
        records::save_scene(path, &g.tree, &g.connections)
    }

    /// Load a scene file. Unknown classes come back as placeholders with
    /// warnings in the report; corrupt streams fail hard.
    pub fn load<P: AsRef<Path>>(
        path: P,
        registry: Arc<ObjectRegistry>,
    ) -> Result<(Self, LoadReport), LoadError> {
        let (tree, connections, report) = records::load_scene(path, &registry)?;
        Ok((Self::from_parts(tree, connections, registry), report))
    }

    /// Build a scene from an in-memory record.
    pub fn from_record(
        record: &SceneRecord,
        registry: Arc<ObjectRegistry>,
    ) -> Result<(Self, LoadReport), LoadError> {
        let (tree, connections, report) = records::deserialize_scene(record, &registry)?;
        Ok((Self::from_parts(tree, connections, registry), report))
    }
}

/// Post-mutation refresh: per-thread storage sized to the scene's thread
/// count, inherited scopes re-derived, every modulator and connection
/// either resolved or flagged — never a stale reference to a freed object.
fn refresh(g: &mut SceneGraph) {
    g.tree.set_num_threads(g.num_threads);
    g.tree.propagate_activity();
    let (unresolved, pruned) = g.tree.collect_modulators();
    if unresolved > 0 {
        log::debug!("{} modulator(s) awaiting sources after refresh", unresolved);
    }
    if pruned > 0 {
        log::info!("{} dangling modulator(s) pruned during refresh", pruned);
    }
    g.connections.assign_pointers(&g.tree);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event_bus;
    use crate::entities::keys::*;

    fn scene_with_events() -> (Scene, crossbeam::channel::Receiver<SceneEvent>) {
        let mut scene = Scene::new(Arc::new(ObjectRegistry::with_builtins()));
        let (tx, rx) = event_bus::channel();
        scene.set_event_sender(tx);
        (scene, rx)
    }

    fn drain(rx: &crossbeam::channel::Receiver<SceneEvent>) -> Vec<SceneEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_add_object_emits_and_requests_render() {
        let (scene, rx) = scene_with_events();
        let g = scene.add_object("Scene", "Group", None).unwrap();
        assert_eq!(g, "Group");
        let t1 = scene.add_object(&g, "Translation", None).unwrap();
        let t2 = scene.add_object(&g, "Translation", None).unwrap();
        assert_eq!((t1.as_str(), t2.as_str()), ("Translation", "Translation1"));

        let events = drain(&rx);
        assert!(events.contains(&SceneEvent::ObjectAdded { id: g.clone() }));
        assert!(events.contains(&SceneEvent::ObjectAdded { id: t2.clone() }));
        assert!(scene.take_render_request());
        assert!(!scene.take_render_request());
    }

    #[test]
    fn test_failed_add_changes_nothing() {
        let (scene, rx) = scene_with_events();
        assert!(scene.add_object("Scene", "Translation", None).is_err());
        assert!(scene.add_object("Scene", "NoSuchClass", None).is_err());
        assert!(drain(&rx).is_empty());
        assert!(!scene.take_render_request());
        scene.with_graph(|g| assert_eq!(g.tree.len(), 1));
    }

    #[test]
    fn test_delete_object_prunes_everything() {
        let (scene, rx) = scene_with_events();
        let g = scene.add_object("Scene", "Group", None).unwrap();
        let t = scene.add_object(&g, "Translation", None).unwrap();
        let m = scene.add_object("Scene", "ModulatorFloat", None).unwrap();
        scene.add_modulator(&t, P_X, &m, "", 0).unwrap();
        let a = scene.add_object("Scene", "AudioOscillator", None).unwrap();
        let b = scene.add_object("Scene", "AudioOut", None).unwrap();
        scene.connect_audio(&a, &b, 0, 0, 1).unwrap();
        drain(&rx);

        scene.delete_object(&m).unwrap();
        scene.delete_object(&a).unwrap();

        scene.with_graph(|g2| {
            let p = g2.tree.get(&t).unwrap().params().get(P_X).unwrap();
            assert!(!p.is_modulated());
            assert!(g2.connections.is_empty());
        });
        let events = drain(&rx);
        assert!(events.contains(&SceneEvent::ObjectDeleted { id: m }));
        assert!(events.contains(&SceneEvent::ConnectionsChanged));
    }

    #[test]
    fn test_set_parameter_value_policy() {
        let (scene, rx) = scene_with_events();
        let g = scene.add_object("Scene", "Group", None).unwrap();
        let t = scene.add_object(&g, "Translation", None).unwrap();
        drain(&rx);
        scene.take_render_request();

        scene
            .set_parameter_value(&t, P_X, ParamValue::Float(2.0))
            .unwrap();
        assert_eq!(scene.param_float(&t, P_X), 2.0);
        assert!(drain(&rx).contains(&SceneEvent::ParameterChanged {
            object: t.clone(),
            param: P_X.to_string(),
        }));
        assert!(scene.take_render_request());

        // a rejected write leaves no trace
        assert!(scene
            .set_parameter_value(&t, P_X, ParamValue::Text("x".into()))
            .is_err());
        assert!(drain(&rx).is_empty());
        assert!(!scene.take_render_request());
    }

    #[test]
    fn test_scope_param_repropagates() {
        let (scene, _rx) = scene_with_events();
        let g = scene.add_object("Scene", "Group", None).unwrap();
        let inner = scene.add_object(&g, "Group", None).unwrap();
        scene
            .set_parameter_value(&g, P_ACTIVE_SCOPE, ParamValue::Select(0))
            .unwrap();
        assert_eq!(scene.active(&inner), Some(false));
    }

    #[test]
    fn test_modulator_roundtrip_via_facade() {
        let (scene, rx) = scene_with_events();
        let g = scene.add_object("Scene", "Group", None).unwrap();
        let t = scene.add_object(&g, "Translation", None).unwrap();
        let m = scene.add_object("Scene", "ModulatorFloat", None).unwrap();
        drain(&rx);

        assert!(scene.add_modulator(&t, P_X, &m, "", 0).unwrap());
        assert!(!scene.add_modulator(&t, P_X, &m, "", 0).unwrap());
        scene
            .set_parameter_value(&m, P_VALUE, ParamValue::Float(1.5))
            .unwrap();
        assert_eq!(scene.param_float(&t, P_X), 1.5);

        assert!(scene.remove_modulator(&t, P_X, &m, "").unwrap());
        assert!(!scene.remove_modulator(&t, P_X, &m, "").unwrap());
        let events = drain(&rx);
        assert!(events.iter().any(|e| matches!(e, SceneEvent::ModulatorAdded { .. })));
        assert!(events.iter().any(|e| matches!(e, SceneEvent::ModulatorRemoved { .. })));
    }

    #[test]
    fn test_audio_cycle_rejected_through_facade() {
        let (scene, _rx) = scene_with_events();
        let a = scene.add_object("Scene", "AudioOscillator", None).unwrap();
        let b = scene.add_object("Scene", "AudioFilter", None).unwrap();
        let c = scene.add_object("Scene", "AudioFilter", None).unwrap();
        scene.connect_audio(&a, &b, 0, 0, 1).unwrap();
        scene.connect_audio(&b, &c, 0, 0, 1).unwrap();
        assert!(matches!(
            scene.connect_audio(&c, &a, 0, 0, 1),
            Err(SceneError::CyclicConnection { .. })
        ));
        scene.with_graph(|g| assert_eq!(g.connections.len(), 2));
    }

    #[test]
    fn test_thread_count_uniform_after_mutations() {
        let (scene, _rx) = scene_with_events();
        scene.set_number_threads(3);
        let g = scene.add_object("Scene", "Group", None).unwrap();
        scene.add_object(&g, "Camera", None).unwrap();
        scene.with_graph(|graph| {
            assert_eq!(graph.num_threads, 3);
            for obj in graph.tree.objects() {
                assert_eq!(obj.num_threads(), 3);
            }
        });
    }

    #[test]
    fn test_render_pass_stores_world_transform() {
        let (scene, _rx) = scene_with_events();
        let g = scene.add_object("Scene", "Group", None).unwrap();
        let inner = scene.add_object(&g, "Group", None).unwrap();
        let t = scene.add_object(&g, "Translation", None).unwrap();
        scene
            .set_parameter_value(&t, P_X, ParamValue::Float(2.0))
            .unwrap();
        let t2 = scene.add_object(&inner, "Translation", None).unwrap();
        scene
            .set_parameter_value(&t2, P_X, ParamValue::Float(3.0))
            .unwrap();

        scene.render_pass(0);
        let p = scene
            .transformation(&inner, 0)
            .unwrap()
            .transform_point3(glam::Vec3::ZERO);
        // group translates by 2, inner group by another 3
        assert!((p.x - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_scene_file_round_trip() {
        let (scene, _rx) = scene_with_events();
        let g = scene.add_object("Scene", "Group", None).unwrap();
        let t = scene.add_object(&g, "Translation", None).unwrap();
        scene
            .set_parameter_value(&t, P_X, ParamValue::Float(7.0))
            .unwrap();

        let record = scene.to_record();
        let (scene2, report) =
            Scene::from_record(&record, Arc::clone(scene.registry())).unwrap();
        assert!(report.is_clean());
        assert_eq!(scene2.param_float(&t, P_X), 7.0);
        scene2.with_graph(|g2| assert_eq!(g2.tree.len(), 3));
    }
}
