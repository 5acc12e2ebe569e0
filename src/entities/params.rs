//! Typed parameter storage for objects.
//!
//! A `Parameter` is a named value slot owned by an object: current value,
//! default, edit/modulation policy and the list of modulator edges feeding
//! it. `Parameters` is the insertion-ordered collection an object's kind
//! fills in during creation; parameter order is user-visible in editors, so
//! it is preserved.
//!
//! Value changes from editors go through the scene facade, which applies
//! locking and change notification uniformly; `set_value` itself only
//! enforces parameter policy.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::SceneError;

use super::modulator::Modulator;
use super::object::ObjectType;
use super::timeline::Timeline1d;

/// Parameter value. The variant is fixed at creation; `set_value` rejects a
/// value of a different variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    /// Index into the parameter's declared select options.
    Select(usize),
    Text(String),
    Filename(String),
    Timeline(Timeline1d),
}

impl ParamValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ParamValue::Float(_) => "float",
            ParamValue::Int(_) => "int",
            ParamValue::Select(_) => "select",
            ParamValue::Text(_) => "text",
            ParamValue::Filename(_) => "filename",
            ParamValue::Timeline(_) => "timeline",
        }
    }

    pub fn same_kind(&self, other: &ParamValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_select(&self) -> Option<usize> {
        match self {
            ParamValue::Select(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) | ParamValue::Filename(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timeline(&self) -> Option<&Timeline1d> {
        match self {
            ParamValue::Timeline(t) => Some(t),
            _ => None,
        }
    }
}

/// Named, typed value slot owned by an object.
#[derive(Debug, Clone)]
pub struct Parameter {
    id: String,
    name: String,
    value: ParamValue,
    default: ParamValue,
    /// Clamp range for float/int values.
    min: Option<f64>,
    max: Option<f64>,
    editable: bool,
    modulateable: bool,
    /// Object types accepted as modulation sources.
    accepted_sources: ObjectType,
    /// Option ids/values, only for select parameters.
    select_ids: Vec<String>,
    select_values: Vec<i64>,
    modulators: Vec<Modulator>,
}

impl Parameter {
    fn new(id: impl Into<String>, name: impl Into<String>, default: ParamValue) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value: default.clone(),
            default,
            min: None,
            max: None,
            editable: true,
            modulateable: true,
            accepted_sources: ObjectType::MODULATOR_SOURCE,
            select_ids: Vec::new(),
            select_values: Vec::new(),
            modulators: Vec::new(),
        }
    }

    // --- getters ---

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    pub fn default(&self) -> &ParamValue {
        &self.default
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn is_modulateable(&self) -> bool {
        self.modulateable
    }

    pub fn accepted_sources(&self) -> ObjectType {
        self.accepted_sources
    }

    pub fn is_modulated(&self) -> bool {
        !self.modulators.is_empty()
    }

    pub fn modulators(&self) -> &[Modulator] {
        &self.modulators
    }

    pub(crate) fn modulators_mut(&mut self) -> &mut Vec<Modulator> {
        &mut self.modulators
    }

    /// Base value as float (float, int and select-mapped values).
    pub fn base_float(&self) -> f64 {
        match &self.value {
            ParamValue::Float(v) => *v,
            ParamValue::Int(v) => *v as f64,
            ParamValue::Select(_) => self.select_value() as f64,
            _ => 0.0,
        }
    }

    /// Mapped int value of the selected option (select parameters).
    pub fn select_value(&self) -> i64 {
        match self.value.as_select() {
            Some(i) => self.select_values.get(i).copied().unwrap_or(0),
            None => 0,
        }
    }

    pub fn select_ids(&self) -> &[String] {
        &self.select_ids
    }

    // --- setters ---

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_editable(&mut self, editable: bool) -> &mut Self {
        self.editable = editable;
        self
    }

    pub fn set_modulateable(&mut self, modulateable: bool) -> &mut Self {
        self.modulateable = modulateable;
        self
    }

    pub fn set_accepted_sources(&mut self, mask: ObjectType) -> &mut Self {
        self.accepted_sources = mask;
        self
    }

    pub fn set_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn set_min(&mut self, min: f64) -> &mut Self {
        self.min = Some(min);
        self
    }

    pub fn set_max(&mut self, max: f64) -> &mut Self {
        self.max = Some(max);
        self
    }

    /// Store a new value. Fails when the parameter is not editable or the
    /// value variant does not match; float/int values are clamped into the
    /// declared range, select indices into the option list.
    pub fn set_value(&mut self, value: ParamValue) -> Result<(), SceneError> {
        if !self.editable {
            return Err(SceneError::NotEditable {
                param: self.id.clone(),
            });
        }
        self.set_value_unchecked(value)
    }

    /// Same as `set_value` but bypasses the editable flag. Used when
    /// restoring stored values during deserialization.
    pub(crate) fn set_value_unchecked(&mut self, value: ParamValue) -> Result<(), SceneError> {
        if !self.value.same_kind(&value) {
            return Err(SceneError::WrongValueType {
                param: self.id.clone(),
            });
        }
        self.value = match value {
            ParamValue::Float(v) => ParamValue::Float(self.clamp(v)),
            ParamValue::Int(v) => ParamValue::Int(self.clamp(v as f64) as i64),
            ParamValue::Select(i) => {
                ParamValue::Select(i.min(self.select_ids.len().saturating_sub(1)))
            }
            other => other,
        };
        Ok(())
    }

    fn clamp(&self, v: f64) -> f64 {
        let v = match self.min {
            Some(lo) => v.max(lo),
            None => v,
        };
        match self.max {
            Some(hi) => v.min(hi),
            None => v,
        }
    }

    /// Reset to the default value, ignoring the editable flag.
    pub fn reset(&mut self) {
        self.value = self.default.clone();
    }

    /// Select an option by its id. No-op error when the id is unknown.
    pub fn set_select_by_id(&mut self, option: &str) -> Result<(), SceneError> {
        match self.select_ids.iter().position(|s| s == option) {
            Some(i) => self.set_value(ParamValue::Select(i)),
            None => Err(SceneError::WrongValueType {
                param: self.id.clone(),
            }),
        }
    }

    // --- modulators ---

    /// Append a modulator edge. Policy checked here is parameter-local
    /// (modulateable flag, duplicates); source-type compatibility and cycle
    /// safety are validated by the tree, which sees both endpoints.
    ///
    /// Returns `Ok(false)` without change for a duplicate
    /// (source, output) pair: re-adding an existing link is a common,
    /// harmless editor action.
    pub fn add_modulator(&mut self, modulator: Modulator) -> Result<bool, SceneError> {
        if !self.modulateable {
            return Err(SceneError::NotModulateable {
                param: self.id.clone(),
            });
        }
        if self
            .find_modulator(modulator.source_id(), modulator.output_id())
            .is_some()
        {
            log::debug!(
                "duplicate modulator '{}':'{}' on '{}' ignored",
                modulator.source_id(),
                modulator.output_id(),
                self.id
            );
            return Ok(false);
        }
        self.modulators.push(modulator);
        Ok(true)
    }

    /// Remove the edge matching (source, output). Idempotent: removing a
    /// nonexistent modulator is a no-op.
    pub fn remove_modulator(&mut self, source_id: &str, output_id: &str) -> bool {
        let before = self.modulators.len();
        self.modulators.retain(|m| !m.matches(source_id, output_id));
        self.modulators.len() != before
    }

    /// Remove every edge coming from `source_id`, any output.
    pub fn remove_modulators_from(&mut self, source_id: &str) -> usize {
        let before = self.modulators.len();
        self.modulators.retain(|m| m.source_id() != source_id);
        before - self.modulators.len()
    }

    pub fn remove_all_modulators(&mut self) -> usize {
        let n = self.modulators.len();
        self.modulators.clear();
        n
    }

    pub fn find_modulator(&self, source_id: &str, output_id: &str) -> Option<&Modulator> {
        self.modulators
            .iter()
            .find(|m| m.matches(source_id, output_id))
    }

    /// (source, output) pairs of all edges, in insertion order.
    pub fn modulator_ids(&self) -> Vec<(String, String)> {
        self.modulators
            .iter()
            .map(|m| (m.source_id().to_string(), m.output_id().to_string()))
            .collect()
    }
}

/// Insertion-ordered parameter collection of one object.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    map: IndexMap<String, Parameter>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, param: Parameter) -> &mut Parameter {
        let id = param.id.clone();
        if self.map.contains_key(&id) {
            log::warn!("parameter '{}' created twice, overwriting", id);
        }
        self.map.insert(id.clone(), param);
        &mut self.map[&id]
    }

    pub fn add_float(
        &mut self,
        id: &str,
        name: &str,
        default: f64,
    ) -> &mut Parameter {
        self.insert(Parameter::new(id, name, ParamValue::Float(default)))
    }

    pub fn add_int(&mut self, id: &str, name: &str, default: i64) -> &mut Parameter {
        self.insert(Parameter::new(id, name, ParamValue::Int(default)))
    }

    /// Select parameter: parallel option id / mapped value lists.
    pub fn add_select(
        &mut self,
        id: &str,
        name: &str,
        option_ids: &[&str],
        option_values: &[i64],
        default_index: usize,
    ) -> &mut Parameter {
        debug_assert_eq!(option_ids.len(), option_values.len());
        let mut p = Parameter::new(id, name, ParamValue::Select(default_index));
        p.select_ids = option_ids.iter().map(|s| s.to_string()).collect();
        p.select_values = option_values.to_vec();
        // select states are discrete; modulation is meaningless here
        p.modulateable = false;
        self.insert(p)
    }

    pub fn add_text(&mut self, id: &str, name: &str, default: &str) -> &mut Parameter {
        let mut p = Parameter::new(id, name, ParamValue::Text(default.to_string()));
        p.modulateable = false;
        self.insert(p)
    }

    pub fn add_filename(&mut self, id: &str, name: &str, default: &str) -> &mut Parameter {
        let mut p = Parameter::new(id, name, ParamValue::Filename(default.to_string()));
        p.modulateable = false;
        self.insert(p)
    }

    pub fn add_timeline(&mut self, id: &str, name: &str, default: Timeline1d) -> &mut Parameter {
        let mut p = Parameter::new(id, name, ParamValue::Timeline(default));
        p.modulateable = false;
        self.insert(p)
    }

    pub fn get(&self, id: &str) -> Option<&Parameter> {
        self.map.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Parameter> {
        self.map.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.map.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.map.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Parameter> {
        self.map.values_mut()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// True when any parameter has at least one modulator.
    pub fn is_modulated(&self) -> bool {
        self.map.values().any(|p| p.is_modulated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::keys::*;

    #[test]
    fn test_set_value_respects_editable() {
        let mut params = Parameters::new();
        params.add_float(P_X, "X", 1.0).set_editable(false);
        let p = params.get_mut(P_X).unwrap();
        assert!(matches!(
            p.set_value(ParamValue::Float(2.0)),
            Err(SceneError::NotEditable { .. })
        ));
        assert_eq!(p.value().as_float(), Some(1.0));
    }

    #[test]
    fn test_set_value_rejects_wrong_kind() {
        let mut params = Parameters::new();
        params.add_float(P_X, "X", 0.0);
        let p = params.get_mut(P_X).unwrap();
        assert!(matches!(
            p.set_value(ParamValue::Text("nope".into())),
            Err(SceneError::WrongValueType { .. })
        ));
    }

    #[test]
    fn test_float_clamps_to_range() {
        let mut params = Parameters::new();
        params.add_float(P_FREQ, "Frequency", 440.0).set_range(0.01, 20000.0);
        let p = params.get_mut(P_FREQ).unwrap();
        p.set_value(ParamValue::Float(99999.0)).unwrap();
        assert_eq!(p.value().as_float(), Some(20000.0));
        p.set_value(ParamValue::Float(-3.0)).unwrap();
        assert_eq!(p.value().as_float(), Some(0.01));
    }

    #[test]
    fn test_select_mapping() {
        let mut params = Parameters::new();
        params.add_select("mode", "Mode", &["off", "on"], &[0, 17], 1);
        let p = params.get_mut("mode").unwrap();
        assert_eq!(p.select_value(), 17);
        p.set_select_by_id("off").unwrap();
        assert_eq!(p.select_value(), 0);
        assert!(p.set_select_by_id("bogus").is_err());
    }

    #[test]
    fn test_add_modulator_policy() {
        use crate::entities::modulator::Modulator;
        let mut params = Parameters::new();
        params.add_float(P_X, "X", 0.0);
        params.add_text("label", "Label", "");

        let p = params.get_mut(P_X).unwrap();
        assert!(p.add_modulator(Modulator::new("lfo", "", 0)).unwrap());
        // duplicate is a silent no-op
        assert!(!p.add_modulator(Modulator::new("lfo", "", 0)).unwrap());
        assert_eq!(p.modulators().len(), 1);

        let t = params.get_mut("label").unwrap();
        assert!(matches!(
            t.add_modulator(Modulator::new("lfo", "", 0)),
            Err(SceneError::NotModulateable { .. })
        ));
    }

    #[test]
    fn test_remove_modulator_idempotent() {
        use crate::entities::modulator::Modulator;
        let mut params = Parameters::new();
        params.add_float(P_X, "X", 0.0);
        let p = params.get_mut(P_X).unwrap();
        p.add_modulator(Modulator::new("lfo", "", 0)).unwrap();
        assert!(p.remove_modulator("lfo", ""));
        assert!(!p.remove_modulator("lfo", ""));
        assert!(p.modulators().is_empty());
    }
}
