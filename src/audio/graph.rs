//! Audio Graph - DAG-based routing with topological sort

use super::edge::{Edge, EdgeId};
use super::node::{AudioNode, NodeHandle, NodeType};
use std::collections::{HashMap, HashSet, VecDeque};

/// オーディオグラフ
///
/// ノードとエッジを管理し、トポロジカルソートで処理順序を決定
pub struct AudioGraph {
    nodes: HashMap<NodeHandle, Box<dyn AudioNode>>,
    edges: Vec<Edge>,
    /// 処理順序（トポロジカルソート済み）
    processing_order: Vec<NodeHandle>,
    next_handle: u32,
    next_edge_id: u32,
    /// グラフが変更されたかどうか (rebuild needed)
    dirty: bool,
}

impl AudioGraph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: Vec::new(),
            processing_order: Vec::new(),
            next_handle: 1, // Start from 1 (0 is reserved)
            next_edge_id: 1,
            dirty: false,
        }
    }

    /// ノードを追加
    pub fn add_node(&mut self, node: Box<dyn AudioNode>) -> NodeHandle {
        let handle = NodeHandle::new(self.next_handle);
        self.next_handle += 1;
        self.nodes.insert(handle, node);
        self.dirty = true;
        handle
    }

    /// ノードを削除（関連エッジも自動削除）
    pub fn remove_node(&mut self, handle: NodeHandle) -> bool {
        if self.nodes.remove(&handle).is_some() {
            self.edges.retain(|e| !e.touches(handle));
            self.dirty = true;
            true
        } else {
            false
        }
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains_key(&handle)
    }

    pub fn get_node(&self, handle: NodeHandle) -> Option<&dyn AudioNode> {
        self.nodes.get(&handle).map(|n| n.as_ref())
    }

    pub fn get_node_mut(&mut self, handle: NodeHandle) -> Option<&mut (dyn AudioNode + '_)> {
        match self.nodes.get_mut(&handle) {
            Some(boxed) => Some(&mut **boxed),
            None => None,
        }
    }

    /// Downcast a node to its concrete type
    pub fn node_as<T: 'static>(&self, handle: NodeHandle) -> Option<&T> {
        self.get_node(handle)?.as_any().downcast_ref::<T>()
    }

    pub fn node_as_mut<T: 'static>(&mut self, handle: NodeHandle) -> Option<&mut T> {
        self.get_node_mut(handle)?.as_any_mut().downcast_mut::<T>()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// エッジを追加
    ///
    /// Source への入力、自己ループ、循環を作る接続、重複は拒否する。
    pub fn add_edge(&mut self, source: NodeHandle, target: NodeHandle) -> Option<EdgeId> {
        let target_node = self.nodes.get(&target)?;
        if !self.nodes.contains_key(&source) || target_node.node_type() == NodeType::Source {
            return None;
        }
        if source == target || self.reaches(target, source) {
            tracing::warn!(
                source = self.nodes.get(&source).map_or("?", |n| n.label()),
                target = target_node.label(),
                "rejecting edge that would create a cycle"
            );
            return None;
        }
        if self.edges.iter().any(|e| e.source == source && e.target == target) {
            return None;
        }

        let id = EdgeId::new(self.next_edge_id);
        self.next_edge_id += 1;
        self.edges.push(Edge::new(id, source, target));
        self.dirty = true;
        Some(id)
    }

    /// Whether a connection from `from` to `to` already exists
    pub fn is_connected(&self, from: NodeHandle, to: NodeHandle) -> bool {
        self.edges.iter().any(|e| e.source == from && e.target == to)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges_to(&self, target: NodeHandle) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.target == target)
    }

    pub fn edges_from(&self, source: NodeHandle) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.source == source)
    }

    /// `from` から `to` へ到達可能か
    fn reaches(&self, from: NodeHandle, to: NodeHandle) -> bool {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(handle) = queue.pop_front() {
            if handle == to {
                return true;
            }
            if !seen.insert(handle) {
                continue;
            }
            queue.extend(self.edges_from(handle).map(|e| e.target));
        }
        false
    }

    pub fn processing_order(&self) -> &[NodeHandle] {
        &self.processing_order
    }

    pub fn rebuild_order_if_needed(&mut self) {
        if self.dirty {
            self.rebuild_order();
        }
    }

    pub fn rebuild_order(&mut self) {
        self.processing_order = self.topological_sort();
        self.dirty = false;
    }

    /// トポロジカルソート (Kahn's algorithm)
    fn topological_sort(&self) -> Vec<NodeHandle> {
        let mut in_degree: HashMap<NodeHandle, usize> =
            self.nodes.keys().map(|&h| (h, 0)).collect();
        for edge in &self.edges {
            if let Some(deg) = in_degree.get_mut(&edge.target) {
                *deg += 1;
            }
        }

        // Source first, then Gain, then Destination; handle order as tiebreak
        let mut roots: Vec<NodeHandle> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&h, _)| h)
            .collect();
        roots.sort_by_key(|h| {
            let rank = match self.nodes.get(h).map(|n| n.node_type()) {
                Some(NodeType::Source) => 0,
                Some(NodeType::Gain) => 1,
                Some(NodeType::Destination) => 2,
                None => 3,
            };
            (rank, h.raw())
        });
        let mut queue: VecDeque<NodeHandle> = roots.into();

        let mut result = Vec::with_capacity(self.nodes.len());
        while let Some(handle) = queue.pop_front() {
            result.push(handle);
            for edge in self.edges_from(handle) {
                if let Some(deg) = in_degree.get_mut(&edge.target) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        queue.push_back(edge.target);
                    }
                }
            }
        }

        if result.len() != self.nodes.len() {
            tracing::warn!(
                processed = result.len(),
                total = self.nodes.len(),
                "cycle detected in audio graph"
            );
        }

        result
    }

    /// グラフ全体を処理順に1回レンダリング
    pub fn render(&mut self, frames: usize) {
        self.rebuild_order_if_needed();
        for node in self.nodes.values_mut() {
            node.clear_buffers(frames);
        }

        let order = self.processing_order.clone();
        for handle in order {
            let upstream: Vec<NodeHandle> = self.edges_to(handle).map(|e| e.source).collect();
            let Some(mut node) = self.nodes.remove(&handle) else {
                continue;
            };
            if let Some(input) = node.input_buffer_mut() {
                for source in &upstream {
                    if let Some(src) = self.nodes.get(source) {
                        input.mix_from(src.output_buffer());
                    }
                }
            }
            node.process(frames);
            self.nodes.insert(handle, node);
        }
    }
}

impl Default for AudioGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::gain::GainNode;
    use crate::audio::sink::DestinationNode;
    use crate::audio::source::SourceNode;

    #[test]
    fn test_add_remove_node() {
        let mut graph = AudioGraph::new();

        let handle = graph.add_node(Box::new(SourceNode::new_generator(1.0, "Test")));
        assert_eq!(graph.node_count(), 1);
        assert!(graph.get_node(handle).is_some());

        graph.remove_node(handle);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_topological_sort() {
        let mut graph = AudioGraph::new();

        // Source -> Gain -> Destination
        let sink = graph.add_node(Box::new(DestinationNode::new("Out")));
        let gain = graph.add_node(Box::new(GainNode::new("Gain")));
        let src = graph.add_node(Box::new(SourceNode::new_generator(1.0, "Src")));

        graph.add_edge(src, gain).unwrap();
        graph.add_edge(gain, sink).unwrap();
        graph.rebuild_order();

        assert_eq!(graph.processing_order(), &[src, gain, sink]);
    }

    #[test]
    fn test_rejects_invalid_edges() {
        let mut graph = AudioGraph::new();
        let src = graph.add_node(Box::new(SourceNode::new_generator(1.0, "Src")));
        let a = graph.add_node(Box::new(GainNode::new("a")));
        let b = graph.add_node(Box::new(GainNode::new("b")));

        assert!(graph.add_edge(a, src).is_none(), "sources take no input");
        assert!(graph.add_edge(a, a).is_none());
        assert!(graph.add_edge(a, b).is_some());
        assert!(graph.add_edge(a, b).is_none(), "duplicate");
        assert!(graph.add_edge(b, a).is_none(), "cycle");
    }

    #[test]
    fn test_render_applies_chained_gain() {
        let mut graph = AudioGraph::new();
        let src = graph.add_node(Box::new(SourceNode::new_generator(0.5, "Src")));
        let stage = graph.add_node(Box::new(GainNode::new("stage")));
        let master = graph.add_node(Box::new(GainNode::new("master")));
        let out = graph.add_node(Box::new(DestinationNode::new("Out")));
        graph.add_edge(src, stage);
        graph.add_edge(stage, master);
        graph.add_edge(master, out);

        graph.node_as_mut::<GainNode>(stage).unwrap().set_gain(2.0);
        graph.node_as_mut::<GainNode>(master).unwrap().set_gain(3.0);
        graph.render(64);

        let level = graph.node_as::<DestinationNode>(out).unwrap().level();
        assert_eq!(level, 3.0);
    }

    #[test]
    fn test_remove_node_drops_edges() {
        let mut graph = AudioGraph::new();
        let src = graph.add_node(Box::new(SourceNode::new_generator(1.0, "Src")));
        let out = graph.add_node(Box::new(DestinationNode::new("Out")));
        graph.add_edge(src, out);
        assert_eq!(graph.edge_count(), 1);

        graph.remove_node(src);
        assert_eq!(graph.edge_count(), 0);
    }
}
