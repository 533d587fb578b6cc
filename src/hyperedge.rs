//! Hyperedge engine (spec §4.9): minimum-terminal-spanning-tree
//! construction over the orthogonal visibility graph, and a scoped-down
//! local-improvement pass.
//!
//! Grounded on `original_source/cola/libavoid/mtst.cpp`'s two-phase
//! structure (extended Prim's simultaneous-source Dijkstra, then extended
//! Kruskal's over the resulting bridging-edge heap); `petgraph::unionfind`
//! is reused for the Kruskal union the way the teacher's
//! `algorithm/make_biconnected.rs` reuses `petgraph` graph algorithms
//! rather than hand-rolling one.

use crate::geometry::{turn, Point};
use crate::ids::ConnectorId;
use crate::store::VertexEdgeStore;
use crate::vertex::VertexHandle;
use petgraph::unionfind::UnionFind;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapEntry {
    dist: f64,
    vertex: VertexHandle,
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.dist.partial_cmp(&self.dist).unwrap_or(Ordering::Equal).then_with(|| self.vertex.0.cmp(&other.vertex.0))
    }
}

#[derive(Debug, Default, Clone)]
pub struct HyperEdgeTree {
    pub nodes: Vec<Point>,
    pub edges: Vec<(usize, usize, ConnectorId)>,
}

impl HyperEdgeTree {
    pub fn total_length(&self) -> f64 {
        self.edges.iter().map(|&(a, b, _)| self.nodes[a].distance(&self.nodes[b])).sum()
    }

    fn degree(&self, node: usize) -> usize {
        self.edges.iter().filter(|&&(a, b, _)| a == node || b == node).count()
    }

    fn neighbors(&self, node: usize) -> Vec<usize> {
        self.edges
            .iter()
            .filter_map(|&(a, b, _)| if a == node { Some(b) } else if b == node { Some(a) } else { None })
            .collect()
    }
}

/// Extended Prim's: Dijkstra simultaneously from every terminal, recording
/// each vertex's owning tree (`sptf_root`, the terminal's own handle) and
/// predecessor (`path_next`). Returns candidate bridging edges (cost, u, v)
/// found whenever a relaxation attempt reaches a vertex already claimed by
/// a different tree, sorted by ascending cost for the Kruskal phase.
fn terminal_forest(store: &mut VertexEdgeStore, terminals: &[VertexHandle]) -> Vec<(f64, VertexHandle, VertexHandle)> {
    store.reset_all_search_scratch();
    let mut heap = BinaryHeap::new();
    for &t in terminals {
        if let Some(v) = store.get_mut(t) {
            v.sptf_dist = 0.0;
            v.sptf_root = Some(t);
        }
        heap.push(HeapEntry { dist: 0.0, vertex: t });
    }

    let mut bridges = Vec::new();
    while let Some(HeapEntry { dist, vertex: u }) = heap.pop() {
        let Some(uv) = store.get(u) else { continue };
        if dist > uv.sptf_dist + 1e-12 {
            continue;
        }
        let root_u = uv.sptf_root;
        let edges: Vec<_> = uv.visibility.to_vec();

        for eh in edges {
            let Some(edge) = store.edge(eh) else { continue };
            if edge.cycle_blocker {
                continue;
            }
            let v = edge.other(u);
            if store.is_marked_invisible(u, v) {
                continue;
            }
            let new_dist = dist + edge.distance;
            let (v_dist, v_root) = store.get(v).map(|vv| (vv.sptf_dist, vv.sptf_root)).unwrap_or((f64::INFINITY, None));

            if new_dist < v_dist - 1e-9 {
                if let Some(vv) = store.get_mut(v) {
                    vv.sptf_dist = new_dist;
                    vv.sptf_root = root_u;
                    vv.path_next = Some(u);
                }
                heap.push(HeapEntry { dist: new_dist, vertex: v });
            } else if let (Some(ru), Some(rv)) = (root_u, v_root) {
                if ru != rv {
                    bridges.push((new_dist, u, v));
                }
            }
        }
    }

    bridges.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    bridges
}

fn node_index(tree: &mut HyperEdgeTree, seen: &mut HashMap<VertexHandle, usize>, store: &VertexEdgeStore, v: VertexHandle) -> usize {
    if let Some(&idx) = seen.get(&v) {
        return idx;
    }
    let idx = tree.nodes.len();
    tree.nodes.push(store.get(v).map(|vv| vv.point).unwrap_or(Point::zero()));
    seen.insert(v, idx);
    idx
}

fn materialize_path(
    store: &VertexEdgeStore,
    tree: &mut HyperEdgeTree,
    seen: &mut HashMap<VertexHandle, usize>,
    connector: ConnectorId,
    mut cur: VertexHandle,
) {
    while let Some(prev) = store.get(cur).and_then(|v| v.path_next) {
        let a = node_index(tree, seen, store, cur);
        let b = node_index(tree, seen, store, prev);
        if !tree.edges.iter().any(|&(x, y, _)| (x == a && y == b) || (x == b && y == a)) {
            tree.edges.push((a, b, connector));
        }
        cur = prev;
    }
}

/// Builds the minimum-terminal-spanning tree over `terminals` (spec §4.9
/// MTST construction). Two leaves that land on the very same
/// [`VertexHandle`] collapse into one tree node (modelling a junction);
/// leaves at the same point but different handles do not, a narrower but
/// simpler rule than the spec's point-based merge.
pub fn build_mtst(store: &mut VertexEdgeStore, terminals: &[VertexHandle], connector: ConnectorId) -> HyperEdgeTree {
    let bridges = terminal_forest(store, terminals);
    let mut uf: UnionFind<usize> = UnionFind::new(terminals.len().max(1));
    let mut tree = HyperEdgeTree::default();
    let mut seen = HashMap::new();

    for &t in terminals {
        node_index(&mut tree, &mut seen, store, t);
    }

    for (_cost, u, v) in bridges {
        let ru = store.get(u).and_then(|vv| vv.sptf_root);
        let rv = store.get(v).and_then(|vv| vv.sptf_root);
        let (Some(ru), Some(rv)) = (ru, rv) else { continue };
        if uf.find_mut(ru) == uf.find_mut(rv) {
            continue;
        }
        uf.union(ru, rv);

        materialize_path(store, &mut tree, &mut seen, connector, u);
        materialize_path(store, &mut tree, &mut seen, connector, v);
        let au = node_index(&mut tree, &mut seen, store, u);
        let av = node_index(&mut tree, &mut seen, store, v);
        if au != av && !tree.edges.iter().any(|&(x, y, _)| (x == au && y == av) || (x == av && y == au)) {
            tree.edges.push((au, av, connector));
        }
    }

    tree
}

fn remove_zero_length_edges(tree: &mut HyperEdgeTree) {
    tree.edges.retain(|&(a, b, _)| tree.nodes[a].distance(&tree.nodes[b]) > 1e-9);
}

/// Merges any degree-2 node whose two incident edges are collinear,
/// replacing both with a single direct edge (spec §4.9 "merge those
/// colinear and overlapping"). Runs to a fixed point.
fn merge_colinear(tree: &mut HyperEdgeTree) {
    loop {
        let mut merged_any = false;
        for n in 0..tree.nodes.len() {
            let neigh = tree.neighbors(n);
            if neigh.len() != 2 {
                continue;
            }
            let (a, b) = (neigh[0], neigh[1]);
            if a == b {
                continue;
            }
            let (pa, pn, pb) = (tree.nodes[a], tree.nodes[n], tree.nodes[b]);
            if turn(&pa, &pn, &pb) != 0 {
                continue;
            }
            let connector = tree
                .edges
                .iter()
                .find(|&&(x, y, _)| (x == a && y == n) || (x == n && y == a))
                .map(|&(_, _, c)| c);
            let Some(connector) = connector else { continue };
            tree.edges.retain(|&(x, y, _)| !((x == a && y == n) || (x == n && y == a) || (x == n && y == b) || (x == b && y == n)));
            if !tree.edges.iter().any(|&(x, y, _)| (x == a && y == b) || (x == b && y == a)) {
                tree.edges.push((a, b, connector));
            }
            merged_any = true;
            break;
        }
        if !merged_any {
            break;
        }
    }
}

/// Local improvement (spec §4.9), scoped down to collinear-edge merging
/// and zero-length-edge removal run to a fixed point. The full
/// branch-balance settling pass (moving an unsettled segment to the
/// nearest diverging-branch position on the majority side) needs the same
/// per-dimension limit bookkeeping `nudging.rs` already performs for
/// ordinary routes and is not duplicated here; `router.rs` runs nudging
/// over hyperedge routes after this pass for that reason.
pub fn improve(tree: &mut HyperEdgeTree, passes: usize) {
    for _ in 0..passes {
        merge_colinear(tree);
        remove_zero_length_edges(tree);
    }
}

/// Rebuilds one connector's point sequence by walking tree edges tagged
/// with its id starting from `start` (spec §4.9 "two-pass: clear then
/// rebuild" write-back).
pub fn route_for_connector(tree: &HyperEdgeTree, connector: ConnectorId, start: usize) -> Vec<Point> {
    let mut route = vec![tree.nodes[start]];
    let mut visited: HashSet<usize> = HashSet::new();
    visited.insert(start);
    let mut cur = start;
    loop {
        let next = tree.edges.iter().find_map(|&(a, b, c)| {
            if c != connector {
                return None;
            }
            if a == cur && !visited.contains(&b) {
                Some(b)
            } else if b == cur && !visited.contains(&a) {
                Some(a)
            } else {
                None
            }
        });
        match next {
            Some(n) => {
                route.push(tree.nodes[n]);
                visited.insert(n);
                cur = n;
            }
            None => break,
        }
    }
    route
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{VertexId, VertexNumber};

    fn id(n: u32) -> VertexId {
        VertexId { object: crate::ids::ObjectId(0), is_shape: false, kind: crate::ids::VertexKind::ConnectorEndpoint, vn: VertexNumber::Unassigned, disambiguator: n }
    }

    #[test]
    fn three_terminals_form_a_connected_tree() {
        let mut store = VertexEdgeStore::new();
        let t0 = store.insert_vertex(id(0), Point::new(0.0, 0.0)).unwrap();
        let t1 = store.insert_vertex(id(1), Point::new(100.0, 0.0)).unwrap();
        let t2 = store.insert_vertex(id(2), Point::new(50.0, 100.0)).unwrap();
        let hub = store.insert_vertex(id(3), Point::new(50.0, 0.0)).unwrap();

        store.insert_edge(t0, hub, 50.0, false);
        store.insert_edge(hub, t1, 50.0, false);
        store.insert_edge(hub, t2, 100.0, false);

        let tree = build_mtst(&mut store, &[t0, t1, t2], ConnectorId(1));
        assert!(tree.total_length() > 0.0);
        assert_eq!(tree.nodes.len(), 4);
        assert_eq!(tree.edges.len(), 3);
    }

    #[test]
    fn merge_colinear_collapses_a_straight_pass_through_node() {
        let mut tree = HyperEdgeTree {
            nodes: vec![Point::new(0.0, 0.0), Point::new(50.0, 0.0), Point::new(100.0, 0.0)],
            edges: vec![(0, 1, ConnectorId(1)), (1, 2, ConnectorId(1))],
        };
        merge_colinear(&mut tree);
        assert_eq!(tree.edges.len(), 1);
        assert!(tree.edges.iter().any(|&(a, b, _)| (a == 0 && b == 2) || (a == 2 && b == 0)));
    }

    #[test]
    fn remove_zero_length_edges_drops_degenerate_edges() {
        let mut tree = HyperEdgeTree {
            nodes: vec![Point::new(0.0, 0.0), Point::new(0.0, 0.0)],
            edges: vec![(0, 1, ConnectorId(1))],
        };
        remove_zero_length_edges(&mut tree);
        assert!(tree.edges.is_empty());
    }
}
