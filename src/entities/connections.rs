//! Audio routing edges between audio objects.
//!
//! A separate edge set from parameter modulation: connections are
//! channel-counted, directed, and indexed per endpoint for O(degree)
//! lookups. Endpoints are addressed by object id; `assign_pointers`
//! re-validates the ids against a freshly loaded tree, the same second-pass
//! resolution the modulator system uses.

use std::collections::{HashMap, HashSet};

use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};

use crate::error::SceneError;

use super::kind::NodeBehavior;
use super::tree::ObjectTree;

/// One directed, channel-counted edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConnection {
    pub from: String,
    pub to: String,
    pub output_channel: u32,
    pub input_channel: u32,
    pub num_channels: u32,
    /// Endpoints verified against the live tree. Runtime-only.
    #[serde(skip)]
    resolved: bool,
}

impl AudioConnection {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        output_channel: u32,
        input_channel: u32,
        num_channels: u32,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            output_channel,
            input_channel,
            num_channels,
            resolved: false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    fn same_edge(&self, other: &AudioConnection) -> bool {
        self.from == other.from
            && self.to == other.to
            && self.output_channel == other.output_channel
            && self.input_channel == other.input_channel
            && self.num_channels == other.num_channels
    }
}

/// The scene's audio-connection set.
#[derive(Debug, Default)]
pub struct AudioConnections {
    cons: Vec<AudioConnection>,
    from_index: HashMap<String, Vec<usize>>,
    to_index: HashMap<String, Vec<usize>>,
}

impl AudioConnections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cons.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AudioConnection> {
        self.cons.iter()
    }

    pub fn clear(&mut self) {
        self.cons.clear();
        self.from_index.clear();
        self.to_index.clear();
    }

    fn rebuild_index(&mut self) {
        self.from_index.clear();
        self.to_index.clear();
        for (i, c) in self.cons.iter().enumerate() {
            self.from_index.entry(c.from.clone()).or_default().push(i);
            self.to_index.entry(c.to.clone()).or_default().push(i);
        }
    }

    pub fn contains(&self, con: &AudioConnection) -> bool {
        self.find(con).is_some()
    }

    fn find(&self, con: &AudioConnection) -> Option<usize> {
        self.to_index
            .get(&con.to)?
            .iter()
            .copied()
            .find(|&i| self.cons[i].same_edge(con))
    }

    /// Wire `from`'s outputs into `to`'s inputs.
    ///
    /// Checks, in order: both endpoints exist and are audio objects, the
    /// channel window fits both ends, the connection is not already present
    /// (idempotent success), and closing it would not create a loop.
    pub fn connect(
        &mut self,
        tree: &ObjectTree,
        from: &str,
        to: &str,
        output_channel: u32,
        input_channel: u32,
        num_channels: u32,
    ) -> Result<&AudioConnection, SceneError> {
        let outs = audio_outputs(tree, from)?;
        let ins = audio_inputs(tree, to)?;
        if output_channel + num_channels > outs {
            return Err(SceneError::ChannelOutOfRange {
                id: from.to_string(),
                first: output_channel,
                last: output_channel + num_channels,
                available: outs,
            });
        }
        if input_channel + num_channels > ins {
            return Err(SceneError::ChannelOutOfRange {
                id: to.to_string(),
                first: input_channel,
                last: input_channel + num_channels,
                available: ins,
            });
        }

        let mut con = AudioConnection::new(from, to, output_channel, input_channel, num_channels);
        con.resolved = true;
        if let Some(i) = self.find(&con) {
            return Ok(&self.cons[i]);
        }
        if !self.is_safe_to_add(from, to) {
            return Err(SceneError::CyclicConnection {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        self.cons.push(con);
        self.rebuild_index();
        log::debug!("audio connect '{}' -> '{}'", from, to);
        let i = self.cons.len() - 1;
        Ok(&self.cons[i])
    }

    /// Remove the matching edge. Idempotent: absent edges are a no-op.
    pub fn disconnect(&mut self, con: &AudioConnection) -> bool {
        match self.find(con) {
            Some(i) => {
                self.cons.remove(i);
                self.rebuild_index();
                log::debug!("audio disconnect '{}' -> '{}'", con.from, con.to);
                true
            }
            None => false,
        }
    }

    /// Edges ending at `id`, O(in-degree).
    pub fn get_inputs(&self, id: &str) -> Vec<&AudioConnection> {
        self.to_index
            .get(id)
            .map(|v| v.iter().map(|&i| &self.cons[i]).collect())
            .unwrap_or_default()
    }

    /// Edges starting at `id`, O(out-degree).
    pub fn get_outputs(&self, id: &str) -> Vec<&AudioConnection> {
        self.from_index
            .get(id)
            .map(|v| v.iter().map(|&i| &self.cons[i]).collect())
            .unwrap_or_default()
    }

    /// Drop every edge touching any of `ids` — called with the subtree id
    /// list of a deleted object.
    pub fn remove_objects(&mut self, ids: &HashSet<String>) -> usize {
        let before = self.cons.len();
        self.cons
            .retain(|c| !ids.contains(&c.from) && !ids.contains(&c.to));
        let dropped = before - self.cons.len();
        if dropped > 0 {
            self.rebuild_index();
            log::info!("dropped {} audio connection(s) into deleted objects", dropped);
        }
        dropped
    }

    /// False when a path `to` → … → `from` already exists (adding the edge
    /// would close a loop). DFS over the from-indexed edges.
    pub fn is_safe_to_add(&self, from: &str, to: &str) -> bool {
        if from == to {
            return false;
        }
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![to];
        while let Some(cur) = stack.pop() {
            if cur == from {
                return false;
            }
            if !visited.insert(cur) {
                continue;
            }
            if let Some(edges) = self.from_index.get(cur) {
                for &i in edges {
                    stack.push(&self.cons[i].to);
                }
            }
        }
        true
    }

    /// Full-graph cycle check. `connect` prevents cycles one edge at a
    /// time; this runs as a defensive assertion after bulk deserialization.
    pub fn has_loop(&self) -> bool {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for c in &self.cons {
            graph.add_edge(c.from.as_str(), c.to.as_str(), ());
        }
        is_cyclic_directed(&graph)
    }

    /// Second-pass resolution against a (re)built tree: flags every
    /// connection whose endpoints exist as audio objects.
    pub fn assign_pointers(&mut self, tree: &ObjectTree) {
        for c in &mut self.cons {
            let from_ok = tree.get(&c.from).is_some_and(|o| o.kind().is_audio());
            let to_ok = tree.get(&c.to).is_some_and(|o| o.kind().is_audio());
            c.resolved = from_ok && to_ok;
            if !c.resolved {
                log::warn!("audio connection '{}' -> '{}' has missing endpoints", c.from, c.to);
            }
        }
    }

    /// True when any connection failed `assign_pointers` — a load-error
    /// indicator.
    pub fn is_unassigned(&self) -> bool {
        self.cons.iter().any(|c| !c.resolved)
    }
}

fn audio_outputs(tree: &ObjectTree, id: &str) -> Result<u32, SceneError> {
    let obj = tree
        .get(id)
        .ok_or_else(|| SceneError::UnknownObject { id: id.to_string() })?;
    match obj.kind().audio_channels() {
        Some((_, outs)) => Ok(outs),
        None => Err(SceneError::NotAudioObject { id: id.to_string() }),
    }
}

fn audio_inputs(tree: &ObjectTree, id: &str) -> Result<u32, SceneError> {
    let obj = tree
        .get(id)
        .ok_or_else(|| SceneError::UnknownObject { id: id.to_string() })?;
    match obj.kind().audio_channels() {
        Some((ins, _)) => Ok(ins),
        None => Err(SceneError::NotAudioObject { id: id.to_string() }),
    }
}
