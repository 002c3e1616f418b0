//! Runtime signal graph: node storage, wiring and block rendering.

use ce_ir::AudioBlock;
use slotmap::{new_key_type, SecondaryMap, SlotMap};

use crate::context::LayerKey;
use crate::nodes::{Modulation, ProcessContext, Processor};
use crate::param::{Param, ParamId};

new_key_type! {
    /// Handle to a node in a [`SignalGraph`].
    pub struct NodeKey;
}

/// Where a connection lands on its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Port {
    /// Summed into the node's audio input.
    Audio,
    /// Added to an automatable parameter at audio rate.
    Param(ParamId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Input {
    pub from: NodeKey,
    pub port: Port,
}

struct NodeSlot {
    processor: Processor,
    inputs: Vec<Input>,
    output: AudioBlock,
    owner: Option<LayerKey>,
    expires: Option<u64>,
}

pub struct SignalGraph {
    nodes: SlotMap<NodeKey, NodeSlot>,
    destination: NodeKey,
    /// Traversal order, sources first.
    order: Vec<NodeKey>,
    deferred: Vec<NodeKey>,
    dirty: bool,
    scratch: AudioBlock,
    mods: Modulation,
}

impl Default for SignalGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalGraph {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let destination = nodes.insert(NodeSlot {
            processor: Processor::Destination,
            inputs: Vec::new(),
            output: AudioBlock::new(),
            owner: None,
            expires: None,
        });
        Self {
            nodes,
            destination,
            order: Vec::new(),
            deferred: Vec::new(),
            dirty: true,
            scratch: AudioBlock::new(),
            mods: Modulation::new(),
        }
    }

    pub fn destination(&self) -> NodeKey {
        self.destination
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn add(&mut self, processor: Processor, owner: Option<LayerKey>) -> NodeKey {
        self.dirty = true;
        self.nodes.insert(NodeSlot {
            processor,
            inputs: Vec::new(),
            output: AudioBlock::new(),
            owner,
            expires: None,
        })
    }

    /// Route `from`'s output into `to`'s audio input.
    pub fn connect(&mut self, from: NodeKey, to: NodeKey) -> bool {
        self.link(from, to, Port::Audio)
    }

    /// Route `from`'s output onto one of `to`'s parameters.
    pub fn connect_param(&mut self, from: NodeKey, to: NodeKey, id: ParamId) -> bool {
        let has_param = self
            .nodes
            .get(to)
            .is_some_and(|slot| slot.processor.param(id).is_some());
        has_param && self.link(from, to, Port::Param(id))
    }

    fn link(&mut self, from: NodeKey, to: NodeKey, port: Port) -> bool {
        if from == to || !self.nodes.contains_key(from) {
            return false;
        }
        let Some(slot) = self.nodes.get_mut(to) else {
            return false;
        };
        let input = Input { from, port };
        if !slot.inputs.contains(&input) {
            slot.inputs.push(input);
            self.dirty = true;
        }
        true
    }

    /// Drop every connection leaving `from`.
    pub fn disconnect(&mut self, from: NodeKey) {
        for slot in self.nodes.values_mut() {
            slot.inputs.retain(|i| i.from != from);
        }
        self.dirty = true;
    }

    pub fn inputs(&self, key: NodeKey) -> &[Input] {
        self.nodes.get(key).map_or(&[][..], |slot| slot.inputs.as_slice())
    }

    pub fn remove(&mut self, key: NodeKey) -> bool {
        if key == self.destination {
            return false;
        }
        let removed = self.nodes.remove(key).is_some();
        self.dirty |= removed;
        removed
    }

    /// Remove every node created on behalf of `owner`.
    pub fn remove_owned_by(&mut self, owner: LayerKey) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|_, slot| slot.owner != Some(owner));
        let removed = before - self.nodes.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    pub fn owned_by(&self, owner: LayerKey) -> usize {
        self.nodes.values().filter(|s| s.owner == Some(owner)).count()
    }

    /// Mark a node for removal once the clock reaches `frame`.
    pub fn set_expiry(&mut self, key: NodeKey, frame: u64) {
        if let Some(slot) = self.nodes.get_mut(key) {
            slot.expires = Some(slot.expires.map_or(frame, |f| f.max(frame)));
        }
    }

    /// Remove nodes whose expiry has passed.
    pub fn reap(&mut self, frame: u64) -> usize {
        let destination = self.destination;
        let before = self.nodes.len();
        self.nodes
            .retain(|key, slot| key == destination || slot.expires.map_or(true, |f| f > frame));
        let removed = before - self.nodes.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    pub fn processor(&self, key: NodeKey) -> Option<&Processor> {
        self.nodes.get(key).map(|slot| &slot.processor)
    }

    pub fn processor_mut(&mut self, key: NodeKey) -> Option<&mut Processor> {
        self.nodes.get_mut(key).map(|slot| &mut slot.processor)
    }

    pub fn param(&self, key: NodeKey, id: ParamId) -> Option<&Param> {
        self.nodes.get(key)?.processor.param(id)
    }

    pub fn param_mut(&mut self, key: NodeKey, id: ParamId) -> Option<&mut Param> {
        self.nodes.get_mut(key)?.processor.param_mut(id)
    }

    /// Last rendered block of a node.
    pub fn output(&self, key: NodeKey) -> Option<&AudioBlock> {
        self.nodes.get(key).map(|slot| &slot.output)
    }

    /// Rebuild the traversal order if the topology changed.
    ///
    /// May allocate; rendering afterwards does not.
    pub fn prepare(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;

        let keys: Vec<NodeKey> = self.nodes.keys().collect();
        for &key in &keys {
            let inputs = std::mem::take(&mut self.nodes[key].inputs);
            let kept: Vec<Input> = inputs
                .into_iter()
                .filter(|i| self.nodes.contains_key(i.from))
                .collect();
            self.nodes[key].inputs = kept;
        }

        self.order = topological_sort(&self.nodes);
        self.deferred = self
            .order
            .iter()
            .copied()
            .filter(|&k| self.nodes[k].processor.is_deferred())
            .collect();

        if self.order.len() < self.nodes.len() {
            log::warn!(
                "signal graph has {} node(s) in an undelayed cycle; they are muted",
                self.nodes.len() - self.order.len()
            );
            let mut sorted = SecondaryMap::new();
            for &k in &self.order {
                sorted.insert(k, ());
            }
            for (key, slot) in self.nodes.iter_mut() {
                if !sorted.contains_key(key) {
                    slot.output.silence();
                }
            }
        }
    }

    /// Render one block and return the destination's output.
    pub fn process(&mut self, frame: u64, sample_rate: f32) -> &AudioBlock {
        self.prepare();
        let cx = ProcessContext { frame, sample_rate };

        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| self.run(&cx));
        #[cfg(not(feature = "alloc_check"))]
        self.run(&cx);

        &self.nodes[self.destination].output
    }

    fn run(&mut self, cx: &ProcessContext) {
        for idx in 0..self.order.len() {
            let key = self.order[idx];
            self.gather(key, false);
            let slot = &mut self.nodes[key];
            slot.processor.process(cx, &self.scratch, &self.mods, &mut slot.output);
        }
        for idx in 0..self.deferred.len() {
            let key = self.deferred[idx];
            self.gather(key, true);
            self.nodes[key].processor.commit(cx, &self.scratch);
        }
    }

    /// Sum a node's inputs into `scratch` and its param modulation into `mods`.
    fn gather(&mut self, key: NodeKey, committing: bool) {
        self.scratch.silence();
        self.mods.reset();
        let slot = &self.nodes[key];
        let deferred = slot.processor.is_deferred();
        for input in &slot.inputs {
            let Some(src) = self.nodes.get(input.from) else {
                continue;
            };
            match input.port {
                Port::Audio if committing || !deferred => self.scratch.mix_from(&src.output),
                Port::Audio => {}
                Port::Param(id) => self.mods.add(id, &src.output),
            }
        }
    }
}

/// Kahn's algorithm over the graph's edges.
///
/// Audio edges into deferred nodes don't count: those nodes only need their
/// input after the whole block has rendered.
fn topological_sort(nodes: &SlotMap<NodeKey, NodeSlot>) -> Vec<NodeKey> {
    let mut in_degree: SecondaryMap<NodeKey, u32> = SecondaryMap::new();
    let mut successors: SecondaryMap<NodeKey, Vec<NodeKey>> = SecondaryMap::new();
    for key in nodes.keys() {
        in_degree.insert(key, 0);
        successors.insert(key, Vec::new());
    }
    for (to, slot) in nodes.iter() {
        let deferred = slot.processor.is_deferred();
        for input in &slot.inputs {
            if deferred && input.port == Port::Audio {
                continue;
            }
            if let Some(list) = successors.get_mut(input.from) {
                list.push(to);
                in_degree[to] += 1;
            }
        }
    }

    let mut queue: Vec<NodeKey> = nodes.keys().filter(|&k| in_degree[k] == 0).collect();
    let mut result = Vec::with_capacity(nodes.len());
    while let Some(key) = queue.pop() {
        result.push(key);
        for &next in &successors[key] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push(next);
            }
        }
    }
    result
}
