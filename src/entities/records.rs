//! Serialization of trees and scenes.
//!
//! The on-disk shape is a nested, self-describing record per object:
//! `(format, version, class, id, name, payload, children)`. The payload is
//! an opaque JSON value from the record's point of view, so a reader can
//! carry a payload it does not understand: when `class` is unknown to the
//! running factory, a placeholder object preserves class and payload
//! verbatim and the tree keeps its shape — a later save loses nothing.
//!
//! A scene file holds the tree followed by the audio connections, so the
//! connection endpoints can be resolved against a complete arena on load.
//!
//! Unknown classes and dropped edges are collected as warnings
//! ([`LoadReport`]); the load itself still succeeds. Corrupt or truncated
//! streams fail hard with [`LoadError`] and return nothing.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{OBJECT_FORMAT, OBJECT_VERSION, SCENE_FORMAT, SCENE_VERSION};
use crate::error::LoadError;

use super::connections::{AudioConnection, AudioConnections};
use super::factory::ObjectRegistry;
use super::kind::{NodeBehavior, ObjectKind};
use super::modulator::{split_legacy_output, Modulator};
use super::nodes::Dummy;
use super::object::Object;
use super::params::ParamValue;
use super::tree::ObjectTree;

/// Stored modulator edge. `channel` is the structured field; records
/// written before it existed encode the channel as trailing digits of
/// `output`, split off on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulatorRecord {
    pub source: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub channel: Option<u32>,
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
    #[serde(default)]
    pub time_offset: f64,
}

fn default_amplitude() -> f64 {
    1.0
}

/// Stored parameter state: current value plus modulator edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamRecord {
    pub value: ParamValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modulators: Vec<ModulatorRecord>,
}

/// Payload of a known class: kind state plus parameter states.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PayloadRecord {
    #[serde(default, skip_serializing_if = "Value::is_null")]
    kind: Value,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    params: IndexMap<String, ParamRecord>,
}

/// One object, nested with its children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub format: String,
    pub version: u32,
    pub class: String,
    pub id: String,
    pub name: String,
    pub payload: Value,
    #[serde(default)]
    pub children: Vec<ObjectRecord>,
}

/// Full scene file: tree first, connections after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRecord {
    pub format: String,
    pub version: u32,
    pub tree: ObjectRecord,
    #[serde(default)]
    pub connections: Vec<AudioConnection>,
}

/// Warnings recovered during a load. The load succeeded; these tell the
/// user what was substituted or dropped along the way.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub warnings: Vec<String>,
}

impl LoadReport {
    fn warn(&mut self, msg: String) {
        log::warn!("{}", msg);
        self.warnings.push(msg);
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

// ---------------------------------------------------------------- write ---

/// Record for one object and its subtree.
pub fn serialize_object(tree: &ObjectTree, id: &str) -> Option<ObjectRecord> {
    let obj = tree.get(id)?;
    let payload = match obj.kind() {
        // placeholders re-emit what they carried in
        ObjectKind::Dummy(d) => d.payload.clone(),
        _ => object_payload(obj),
    };
    let children = obj
        .children()
        .iter()
        .filter_map(|c| serialize_object(tree, c))
        .collect();
    Some(ObjectRecord {
        format: OBJECT_FORMAT.to_string(),
        version: OBJECT_VERSION,
        class: obj.class_name().to_string(),
        id: obj.id().to_string(),
        name: obj.name().to_string(),
        payload,
        children,
    })
}

/// Record for the whole tree.
pub fn serialize_tree(tree: &ObjectTree) -> ObjectRecord {
    serialize_object(tree, tree.root_id()).unwrap_or_else(|| ObjectRecord {
        format: OBJECT_FORMAT.to_string(),
        version: OBJECT_VERSION,
        class: "Scene".to_string(),
        id: "Scene".to_string(),
        name: "Scene".to_string(),
        payload: Value::Null,
        children: Vec::new(),
    })
}

fn object_payload(obj: &Object) -> Value {
    let mut params = IndexMap::new();
    for p in obj.params().iter() {
        let modulators = p
            .modulators()
            .iter()
            .map(|m| ModulatorRecord {
                source: m.source_id().to_string(),
                output: m.output_id().to_string(),
                channel: Some(m.channel()),
                amplitude: m.amplitude,
                time_offset: m.time_offset,
            })
            .collect();
        params.insert(
            p.id().to_string(),
            ParamRecord {
                value: p.value().clone(),
                modulators,
            },
        );
    }
    let record = PayloadRecord {
        kind: obj.kind().save_payload(),
        params,
    };
    serde_json::to_value(record).unwrap_or_else(|e| {
        log::error!("payload serialization failed for '{}': {}", obj.id(), e);
        Value::Null
    })
}

/// Record for a scene: tree plus connection tuples.
pub fn scene_record(tree: &ObjectTree, connections: &AudioConnections) -> SceneRecord {
    SceneRecord {
        format: SCENE_FORMAT.to_string(),
        version: SCENE_VERSION,
        tree: serialize_tree(tree),
        connections: connections.iter().cloned().collect(),
    }
}

// ----------------------------------------------------------------- read ---

/// Rebuild a tree from its record. Unknown classes become placeholders and
/// are reported; malformed records fail the whole load.
pub fn deserialize_tree(
    record: &ObjectRecord,
    registry: &ObjectRegistry,
) -> Result<(ObjectTree, LoadReport), LoadError> {
    let mut report = LoadReport::default();
    let root = build_object(record, registry, &mut report)?;
    let mut tree = ObjectTree::new(root);
    let root_id = tree.root_id().to_string();
    for child in &record.children {
        attach(&mut tree, &root_id, child, registry, &mut report)?;
    }
    let (unresolved, pruned) = tree.collect_modulators();
    if unresolved > 0 {
        report.warn(format!("{} modulator source(s) missing after load", unresolved));
    }
    if pruned > 0 {
        report.warn(format!("{} incompatible modulator(s) dropped", pruned));
    }
    Ok((tree, report))
}

/// Rebuild a scene: tree first, then connections resolved against it.
pub fn deserialize_scene(
    record: &SceneRecord,
    registry: &ObjectRegistry,
) -> Result<(ObjectTree, AudioConnections, LoadReport), LoadError> {
    if record.format != SCENE_FORMAT {
        return Err(LoadError::BadFormat {
            expected: SCENE_FORMAT,
            found: record.format.clone(),
        });
    }
    if record.version > SCENE_VERSION {
        return Err(LoadError::BadVersion {
            found: record.version,
            supported: SCENE_VERSION,
        });
    }
    let (tree, mut report) = deserialize_tree(&record.tree, registry)?;
    let mut connections = AudioConnections::new();
    for c in &record.connections {
        if let Err(e) = connections.connect(
            &tree,
            &c.from,
            &c.to,
            c.output_channel,
            c.input_channel,
            c.num_channels,
        ) {
            report.warn(format!("dropping audio connection '{}' -> '{}': {}", c.from, c.to, e));
        }
    }
    connections.assign_pointers(&tree);
    if connections.is_unassigned() {
        report.warn("audio connections with unassigned endpoints after load".to_string());
    }
    if connections.has_loop() {
        report.warn("loaded audio graph contains a loop".to_string());
    }
    Ok((tree, connections, report))
}

fn attach(
    tree: &mut ObjectTree,
    parent_id: &str,
    record: &ObjectRecord,
    registry: &ObjectRegistry,
    report: &mut LoadReport,
) -> Result<(), LoadError> {
    let obj = build_object(record, registry, report)?;
    match tree.add_child(parent_id, obj, None) {
        Ok(id) => {
            if id != record.id {
                report.warn(format!("stored id '{}' collided, renamed to '{}'", record.id, id));
            }
            for child in &record.children {
                attach(tree, &id, child, registry, report)?;
            }
        }
        Err(e) => {
            report.warn(format!("dropping stored subtree '{}': {}", record.id, e));
        }
    }
    Ok(())
}

fn build_object(
    record: &ObjectRecord,
    registry: &ObjectRegistry,
    report: &mut LoadReport,
) -> Result<Object, LoadError> {
    if record.format != OBJECT_FORMAT {
        return Err(LoadError::BadFormat {
            expected: OBJECT_FORMAT,
            found: record.format.clone(),
        });
    }
    if record.version > OBJECT_VERSION {
        return Err(LoadError::BadVersion {
            found: record.version,
            supported: OBJECT_VERSION,
        });
    }

    let mut obj = match registry.create_object(&record.class) {
        Ok(obj) => obj,
        Err(_) => {
            report.warn(format!(
                "unknown object class '{}', substituting placeholder",
                record.class
            ));
            Object::with_kind(Dummy::carrying(&record.class, record.payload.clone()).into())
        }
    };
    obj.set_id(record.id.clone());
    obj.set_name(record.name.clone());

    if let ObjectKind::Dummy(d) = obj.kind_mut() {
        // placeholders carry class and payload verbatim, however they
        // were constructed
        d.original_class = record.class.clone();
        d.payload = record.payload.clone();
    } else if !record.payload.is_null() {
        let payload: PayloadRecord = serde_json::from_value(record.payload.clone())?;
        obj.kind_mut().load_payload(&payload.kind);
        apply_params(&mut obj, payload, report);
    }
    Ok(obj)
}

fn apply_params(obj: &mut Object, payload: PayloadRecord, report: &mut LoadReport) {
    let owner = obj.id().to_string();
    for (pid, prec) in payload.params {
        let Some(param) = obj.params_mut().get_mut(&pid) else {
            report.warn(format!("object '{}' has no parameter '{}', skipping", owner, pid));
            continue;
        };
        if let Err(e) = param.set_value_unchecked(prec.value) {
            report.warn(format!("stored value for '{}':'{}' rejected: {}", owner, pid, e));
        }
        for mrec in prec.modulators {
            let (output, channel) = match mrec.channel {
                Some(ch) => (mrec.output.clone(), ch),
                // legacy records encode the channel in the output label
                None => {
                    let (head, ch) = split_legacy_output(&mrec.output);
                    (head.to_string(), ch)
                }
            };
            let mut m = Modulator::new(mrec.source, output, channel);
            m.amplitude = mrec.amplitude;
            m.time_offset = mrec.time_offset;
            if let Err(e) = param.add_modulator(m) {
                report.warn(format!("stored modulator on '{}':'{}' rejected: {}", owner, pid, e));
            }
        }
    }
}

// ---------------------------------------------------------------- files ---

/// Write a scene file (pretty JSON, `.scn` extension enforced).
pub fn save_scene<P: AsRef<Path>>(
    path: P,
    tree: &ObjectTree,
    connections: &AudioConnections,
) -> anyhow::Result<std::path::PathBuf> {
    let record = scene_record(tree, connections);
    let json = serde_json::to_string_pretty(&record)?;
    let path = path.as_ref();
    let path = if path.extension().and_then(|s| s.to_str()) != Some("scn") {
        path.with_extension("scn")
    } else {
        path.to_path_buf()
    };
    fs::write(&path, json)?;
    log::info!("scene saved to {}", path.display());
    Ok(path)
}

/// Read a scene file back. Hard error on unreadable/corrupt streams.
pub fn load_scene<P: AsRef<Path>>(
    path: P,
    registry: &ObjectRegistry,
) -> Result<(ObjectTree, AudioConnections, LoadReport), LoadError> {
    let json = fs::read_to_string(path.as_ref())?;
    let record: SceneRecord = serde_json::from_str(&json)?;
    deserialize_scene(&record, registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::keys::*;
    use crate::entities::nodes::SceneRoot;
    use crate::entities::params::ParamValue;

    fn sample_scene() -> (ObjectTree, AudioConnections, ObjectRegistry) {
        let reg = ObjectRegistry::with_builtins();
        let mut tree = ObjectTree::new(Object::with_kind(SceneRoot.into()));
        let g = tree
            .add_child("Scene", reg.create_object("Group").unwrap(), None)
            .unwrap();
        let t = tree
            .add_child(&g, reg.create_object("Translation").unwrap(), None)
            .unwrap();
        let m = tree
            .add_child("Scene", reg.create_object("ModulatorFloat").unwrap(), None)
            .unwrap();
        tree.get_mut(&t)
            .unwrap()
            .params_mut()
            .get_mut(P_X)
            .unwrap()
            .set_value(ParamValue::Float(4.5))
            .unwrap();
        tree.add_modulator(&t, P_X, &m, "", 0).unwrap();

        let a = tree
            .add_child("Scene", reg.create_object("AudioOscillator").unwrap(), None)
            .unwrap();
        let b = tree
            .add_child("Scene", reg.create_object("AudioOut").unwrap(), None)
            .unwrap();
        let mut cons = AudioConnections::new();
        cons.connect(&tree, &a, &b, 0, 0, 1).unwrap();
        (tree, cons, reg)
    }

    #[test]
    fn test_round_trip_preserves_shape_and_values() {
        let (tree, cons, reg) = sample_scene();
        let record = scene_record(&tree, &cons);
        let json = serde_json::to_string(&record).unwrap();
        let parsed: SceneRecord = serde_json::from_str(&json).unwrap();
        let (tree2, cons2, report) = deserialize_scene(&parsed, &reg).unwrap();

        assert!(report.is_clean(), "unexpected warnings: {:?}", report.warnings);
        assert_eq!(tree2.len(), tree.len());
        for obj in tree.objects() {
            let other = tree2.get(obj.id()).expect("object missing after round trip");
            assert_eq!(other.class_name(), obj.class_name());
            assert_eq!(other.name(), obj.name());
            assert_eq!(other.parent_id(), obj.parent_id());
            assert_eq!(other.children(), obj.children());
        }
        let p = tree2.get("Translation").unwrap().params().get(P_X).unwrap();
        assert_eq!(p.value().as_float(), Some(4.5));
        assert_eq!(p.modulator_ids(), vec![("ModulatorFloat".to_string(), String::new())]);
        assert!(p.find_modulator("ModulatorFloat", "").unwrap().is_resolved());
        assert_eq!(cons2.len(), 1);
        assert!(!cons2.is_unassigned());
    }

    fn child_index(record: &ObjectRecord, class: &str) -> usize {
        record
            .children
            .iter()
            .position(|c| c.class == class)
            .expect("child record")
    }

    #[test]
    fn test_unknown_class_substitutes_placeholder_losslessly() {
        let (tree, cons, reg) = sample_scene();
        let mut record = scene_record(&tree, &cons);
        // pretend the group was written by a newer build
        let gi = child_index(&record.tree, "Group");
        record.tree.children[gi].class = "WarpField".to_string();
        record.tree.children[gi].payload = serde_json::json!({"strength": 3});

        let (tree2, _, report) = deserialize_scene(&record, &reg).unwrap();
        assert!(!report.is_clean());
        let obj = tree2.get("Group").unwrap();
        assert_eq!(obj.class_name(), "WarpField");
        assert_eq!(obj.object_type(), crate::entities::object::ObjectType::DUMMY);
        // tree shape below the placeholder survives
        assert!(tree2.get("Translation").is_some());

        // a second save emits class and payload unchanged
        let again = serialize_tree(&tree2);
        let wi = child_index(&again, "WarpField");
        assert_eq!(again.children[wi].payload, serde_json::json!({"strength": 3}));
    }

    #[test]
    fn test_bad_format_is_fatal() {
        let (tree, cons, reg) = sample_scene();
        let mut record = scene_record(&tree, &cons);
        record.format = "something-else".to_string();
        assert!(matches!(
            deserialize_scene(&record, &reg),
            Err(LoadError::BadFormat { .. })
        ));

        let mut record = scene_record(&tree, &cons);
        record.tree.version = SCENE_VERSION + 10;
        assert!(matches!(
            deserialize_scene(&record, &reg),
            Err(LoadError::BadVersion { .. })
        ));
    }

    #[test]
    fn test_legacy_output_channel_split() {
        let (tree, cons, reg) = sample_scene();
        let mut record = scene_record(&tree, &cons);
        // rewrite the stored modulator the way old files encoded channels
        let gi = child_index(&record.tree, "Group");
        let payload = record.tree.children[gi].children[0].payload.as_object_mut().unwrap();
        let params = payload.get_mut("params").unwrap().as_object_mut().unwrap();
        let x = params.get_mut("x").unwrap().as_object_mut().unwrap();
        x.insert(
            "modulators".to_string(),
            serde_json::json!([{ "source": "ModulatorFloat", "output": "out2" }]),
        );

        let (tree2, _, _) = deserialize_scene(&record, &reg).unwrap();
        let p = tree2.get("Translation").unwrap().params().get(P_X).unwrap();
        let m = p.find_modulator("ModulatorFloat", "out").unwrap();
        assert_eq!(m.channel(), 2);
        assert_eq!(m.amplitude, 1.0);
    }

    #[test]
    fn test_stored_connection_into_missing_object_is_dropped() {
        let (tree, cons, reg) = sample_scene();
        let mut record = scene_record(&tree, &cons);
        record.connections.push(AudioConnection::new("Ghost", "AudioOut", 0, 0, 1));
        let (_, cons2, report) = deserialize_scene(&record, &reg).unwrap();
        assert_eq!(cons2.len(), 1);
        assert!(report.warnings.iter().any(|w| w.contains("Ghost")));
    }

    #[test]
    fn test_file_round_trip() {
        let (tree, cons, reg) = sample_scene();
        let dir = std::env::temp_dir();
        let path = dir.join(format!("scena-test-{}", std::process::id()));
        let written = save_scene(&path, &tree, &cons).unwrap();
        assert_eq!(written.extension().and_then(|e| e.to_str()), Some("scn"));

        let (tree2, cons2, report) = load_scene(&written, &reg).unwrap();
        assert!(report.is_clean());
        assert_eq!(tree2.len(), tree.len());
        assert_eq!(cons2.len(), cons.len());
        let _ = fs::remove_file(&written);
    }
}
