//! Data association: detections → track identities.
//!
//! # Algorithm pipeline
//! 1. For each (track, detection) pair whose IoU reaches `min_iou`, add an
//!    edge with cost `1 − IoU` to the sparse bipartite graph. Tracks are
//!    compared through their one-step predicted box.
//! 2. Partition the graph into **connected components** (disjoint sets).
//!    Components are independent and solved separately.
//! 3. Solve each component with the **Hungarian algorithm** (O(n³)
//!    Kuhn-Munkres with potentials).
//! 4. Detections left without a partner become [`Assignment::New`].
//!
//! The [`Associator`] trait is the seam for external associators
//! (appearance re-id, ground-truth replay); the pipeline only needs
//! one [`Assignment`] per detection.

use crate::{
    bbox::iou,
    error::{require_positive, ConfigError, ConfigResult},
    track::Track,
    track_manager::Assignment,
    types::Detection,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Produces one [`Assignment`] per detection for the current live tracks.
pub trait Associator {
    fn associate(&mut self, detections: &[Detection], tracks: &[&Track]) -> Vec<Assignment>;
}

// ---------------------------------------------------------------------------
// Bipartite graph
// ---------------------------------------------------------------------------

/// A candidate pairing in the sparse cost graph.
#[derive(Clone, Debug)]
pub struct AssignEdge {
    pub track_idx: usize,
    pub det_idx: usize,
    /// 1 − IoU
    pub cost: f64,
}

/// Sparse bipartite graph: edges between track indices and detection indices.
#[derive(Clone, Debug, Default)]
pub struct BipartiteGraph {
    pub edges: Vec<AssignEdge>,
    pub n_tracks: usize,
    pub n_dets: usize,
}

impl BipartiteGraph {
    pub fn new(n_tracks: usize, n_dets: usize) -> Self {
        Self {
            edges: Vec::new(),
            n_tracks,
            n_dets,
        }
    }

    pub fn add_edge(&mut self, track_idx: usize, det_idx: usize, cost: f64) {
        self.edges.push(AssignEdge {
            track_idx,
            det_idx,
            cost,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// Disjoint sets over graph nodes, merged by size with full path compression.
struct DisjointSets {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn root(&mut self, node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = node;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn merge(&mut self, a: usize, b: usize) {
        let (mut big, mut small) = (self.root(a), self.root(b));
        if big == small {
            return;
        }
        if self.size[big] < self.size[small] {
            std::mem::swap(&mut big, &mut small);
        }
        self.parent[small] = big;
        self.size[big] += self.size[small];
    }
}

/// Tracks and detections that compete for each other, with the edges
/// between them. Indices are sorted and unique.
#[derive(Clone, Debug, Default)]
pub struct Component {
    pub track_indices: Vec<usize>,
    pub det_indices: Vec<usize>,
    pub edges: Vec<AssignEdge>,
}

/// Split the graph into connected components, ordered by their lowest node.
///
/// Track `i` is node `i`, detection `j` is node `n_tracks + j`. Tracks and
/// detections without any edge belong to no component.
pub fn partition_components(graph: &BipartiteGraph) -> Vec<Component> {
    let mut sets = DisjointSets::new(graph.n_tracks + graph.n_dets);
    for e in &graph.edges {
        sets.merge(e.track_idx, graph.n_tracks + e.det_idx);
    }

    let mut groups: BTreeMap<usize, Component> = BTreeMap::new();
    for e in &graph.edges {
        let comp = groups.entry(sets.root(e.track_idx)).or_default();
        comp.track_indices.push(e.track_idx);
        comp.det_indices.push(e.det_idx);
        comp.edges.push(e.clone());
    }

    let mut components: Vec<Component> = groups
        .into_values()
        .map(|mut comp| {
            comp.track_indices.sort_unstable();
            comp.track_indices.dedup();
            comp.det_indices.sort_unstable();
            comp.det_indices.dedup();
            comp
        })
        .collect();
    components.sort_by_key(|c| c.track_indices.first().copied());
    components
}

// ---------------------------------------------------------------------------
// Assignment solver
// ---------------------------------------------------------------------------

/// Solution of one component: matched (track_idx, det_idx) pairs.
#[derive(Clone, Debug, Default)]
pub struct ComponentSolution {
    pub pairs: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_dets: Vec<usize>,
}

/// Minimum-cost matching inside one component.
///
/// The local cost matrix is square, sized to the larger side, and every cell
/// without an edge costs `dummy_cost`. A track whose optimal column is such a
/// cell stays unmatched.
pub fn hungarian_solve(component: &Component, dummy_cost: f64) -> ComponentSolution {
    let nt = component.track_indices.len();
    let nd = component.det_indices.len();
    if nt == 0 || nd == 0 {
        return ComponentSolution {
            pairs: vec![],
            unmatched_tracks: component.track_indices.clone(),
            unmatched_dets: component.det_indices.clone(),
        };
    }

    let n = nt.max(nd);
    let mut cost = vec![dummy_cost; n * n];
    let mut is_edge = vec![false; n * n];
    for e in &component.edges {
        let row = component.track_indices.binary_search(&e.track_idx);
        let col = component.det_indices.binary_search(&e.det_idx);
        if let (Ok(row), Ok(col)) = (row, col) {
            cost[row * n + col] = e.cost;
            is_edge[row * n + col] = true;
        }
    }

    let mut solution = ComponentSolution::default();
    let mut det_taken = vec![false; nd];
    for (row, col) in min_cost_assignment(&cost, n).into_iter().enumerate().take(nt) {
        let track = component.track_indices[row];
        if col < nd && is_edge[row * n + col] {
            solution.pairs.push((track, component.det_indices[col]));
            det_taken[col] = true;
        } else {
            solution.unmatched_tracks.push(track);
        }
    }
    solution.unmatched_dets = component
        .det_indices
        .iter()
        .zip(&det_taken)
        .filter(|(_, taken)| !**taken)
        .map(|(&det, _)| det)
        .collect();
    solution
}

/// Kuhn-Munkres with row/column potentials on a square `n × n` row-major
/// matrix, O(n³). Returns the column chosen for each row.
///
/// Rows are inserted one at a time; each insertion grows a shortest
/// augmenting path from the virtual column `n` until it reaches a free
/// column, then flips the path.
fn min_cost_assignment(cost: &[f64], n: usize) -> Vec<usize> {
    let virtual_col = n;
    let mut row_pot = vec![0.0f64; n];
    let mut col_pot = vec![0.0f64; n + 1];
    let mut owner: Vec<Option<usize>> = vec![None; n + 1];
    let mut prev_col = vec![virtual_col; n + 1];

    for row in 0..n {
        owner[virtual_col] = Some(row);
        let mut col = virtual_col;
        let mut slack = vec![f64::INFINITY; n + 1];
        let mut visited = vec![false; n + 1];

        loop {
            visited[col] = true;
            let Some(r) = owner[col] else { break };
            let mut delta = f64::INFINITY;
            let mut next = virtual_col;
            for c in (0..n).filter(|&c| !visited[c]) {
                let reduced = cost[r * n + c] - row_pot[r] - col_pot[c];
                if reduced < slack[c] {
                    slack[c] = reduced;
                    prev_col[c] = col;
                }
                if slack[c] < delta {
                    delta = slack[c];
                    next = c;
                }
            }
            for c in 0..=n {
                if visited[c] {
                    if let Some(owned) = owner[c] {
                        row_pot[owned] += delta;
                    }
                    col_pot[c] -= delta;
                } else {
                    slack[c] -= delta;
                }
            }
            col = next;
            if owner[col].is_none() {
                break;
            }
        }

        while col != virtual_col {
            let back = prev_col[col];
            owner[col] = owner[back];
            col = back;
        }
    }

    let mut assignment = vec![0usize; n];
    for (col, row) in owner.iter().take(n).enumerate() {
        if let Some(row) = row {
            assignment[*row] = col;
        }
    }
    assignment
}

// ---------------------------------------------------------------------------
// IoU associator
// ---------------------------------------------------------------------------

/// Configuration for [`IouAssociator`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssociatorConfig {
    /// Pairs below this IoU are never matched
    pub min_iou: f64,
    /// Padding cost for matrix cells without an edge. Must be at least the
    /// costliest edge, `1 − min_iou`, or the solver may prefer padding over
    /// a valid pair.
    pub dummy_cost: f64,
}

impl Default for AssociatorConfig {
    fn default() -> Self {
        Self {
            min_iou: 0.1,
            dummy_cost: 1.0,
        }
    }
}

impl AssociatorConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.min_iou) {
            return Err(ConfigError::invalid(
                "associator",
                "min_iou",
                self.min_iou,
                "must be within [0, 1]",
            ));
        }
        require_positive("associator", "dummy_cost", self.dummy_cost)?;
        if self.dummy_cost < 1.0 - self.min_iou {
            return Err(ConfigError::invalid(
                "associator",
                "dummy_cost",
                self.dummy_cost,
                "must be at least 1 - min_iou",
            ));
        }
        Ok(())
    }
}

/// Built-in associator: IoU cost, union-find partitioning, Hungarian solve.
#[derive(Clone, Debug)]
pub struct IouAssociator {
    config: AssociatorConfig,
}

impl IouAssociator {
    pub fn new(config: AssociatorConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AssociatorConfig {
        &self.config
    }

    fn build_graph(&self, detections: &[Detection], tracks: &[&Track]) -> BipartiteGraph {
        let mut graph = BipartiteGraph::new(tracks.len(), detections.len());
        for (ti, track) in tracks.iter().enumerate() {
            let predicted = track.predicted_bbox_xyxy();
            for (di, det) in detections.iter().enumerate() {
                let overlap = iou(&predicted, &det.bbox_xyxy);
                if overlap > 0.0 && overlap >= self.config.min_iou {
                    graph.add_edge(ti, di, 1.0 - overlap);
                }
            }
        }
        graph
    }
}

impl Default for IouAssociator {
    fn default() -> Self {
        Self {
            config: AssociatorConfig::default(),
        }
    }
}

impl Associator for IouAssociator {
    fn associate(&mut self, detections: &[Detection], tracks: &[&Track]) -> Vec<Assignment> {
        let mut out = vec![Assignment::New; detections.len()];
        if detections.is_empty() || tracks.is_empty() {
            return out;
        }

        let graph = self.build_graph(detections, tracks);
        let components = partition_components(&graph);
        let mut matched = 0usize;
        for comp in &components {
            let solution = hungarian_solve(comp, self.config.dummy_cost);
            for &(ti, di) in &solution.pairs {
                out[di] = Assignment::Existing(tracks[ti].id());
                matched += 1;
            }
        }

        debug!(
            tracks = tracks.len(),
            detections = detections.len(),
            edges = graph.edges.len(),
            components = components.len(),
            matched,
            "association"
        );
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
