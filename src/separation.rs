//! The 1-D separation solver (spec §6 collaborator interface): given
//! `Variable`s (id, desired position, weight) and pairwise `Constraint`s
//! (leftVar, rightVar, gap, equality-bit), returns final positions that
//! satisfy every gap while minimising Σ wᵢ(xᵢ − dᵢ)².
//!
//! The real solver is explicitly out of scope (spec §1) and is treated as
//! an external collaborator behind the [`SeparationSolver`] trait; the
//! `nudging` module depends only on the trait. [`BlockSolver`] is a minimal
//! default implementation so the crate is runnable standalone, grounded in
//! `original_source/cola/libcola/straightener.cpp`'s variable/gap
//! vocabulary but not its actual numerics.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Variable {
    pub id: usize,
    pub desired_position: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraint {
    pub left: usize,
    pub right: usize,
    pub gap: f64,
    pub equality: bool,
}

pub trait SeparationSolver {
    fn solve(&self, variables: &[Variable], constraints: &[Constraint]) -> HashMap<usize, f64>;
}

/// Solves a single left-to-right chain of gap constraints by reduction to
/// weighted isotonic regression: subtracting each variable's cumulative
/// required gap turns "x[right] − x[left] ≥ gap" into "y[left] ≤
/// y[right]", solved by the classic pool-adjacent-violators algorithm.
/// Equality constraints are folded into a single point before the PAV pass
/// so their two variables can never end up apart.
///
/// Assumes `constraints` links `variables` into one chain (each variable is
/// `right` in at most one constraint) — which is how `nudging.rs` builds
/// them: segments within a region are ordered once by the crossing
/// analyser's partial order, and each consecutive pair gets one gap
/// constraint.
pub struct BlockSolver;

impl SeparationSolver for BlockSolver {
    fn solve(&self, variables: &[Variable], constraints: &[Constraint]) -> HashMap<usize, f64> {
        if variables.is_empty() {
            return HashMap::new();
        }

        let by_id: HashMap<usize, Variable> = variables.iter().map(|v| (v.id, *v)).collect();
        let by_right: HashMap<usize, &Constraint> = constraints.iter().map(|c| (c.right, c)).collect();
        let by_left: HashMap<usize, &Constraint> = constraints.iter().map(|c| (c.left, c)).collect();

        // Walk each chain from its root (a variable that is never a `right`)
        // via `by_left`, in the order the constraints actually link them --
        // not by numeric id, which callers are free to assign arbitrarily.
        let mut ordered: Vec<Variable> = Vec::with_capacity(variables.len());
        let mut offset: HashMap<usize, f64> = HashMap::new();
        let mut visited = std::collections::HashSet::new();
        let mut roots: Vec<usize> = variables.iter().map(|v| v.id).filter(|id| !by_right.contains_key(id)).collect();
        roots.sort_unstable();
        for root in roots {
            if !visited.insert(root) {
                continue;
            }
            offset.insert(root, 0.0);
            ordered.push(by_id[&root]);
            let mut cur = root;
            while let Some(c) = by_left.get(&cur) {
                if !visited.insert(c.right) {
                    break;
                }
                let off = offset[&cur] + c.gap;
                offset.insert(c.right, off);
                ordered.push(by_id[&c.right]);
                cur = c.right;
            }
        }

        let mut points: Vec<(f64, f64, Vec<usize>)> = ordered
            .iter()
            .map(|v| (v.weight, v.weight * (v.desired_position - offset[&v.id]), vec![v.id]))
            .collect();

        for c in constraints.iter().filter(|c| c.equality) {
            let left_idx = points.iter().position(|(_, _, ids)| ids.contains(&c.left));
            let right_idx = points.iter().position(|(_, _, ids)| ids.contains(&c.right));
            if let (Some(li), Some(ri)) = (left_idx, right_idx) {
                if li == ri {
                    continue;
                }
                let (hi, lo) = if li > ri { (li, ri) } else { (ri, li) };
                let (w2, s2, ids2) = points.remove(hi);
                let (w1, s1, mut ids1) = points.remove(lo);
                ids1.extend(ids2);
                points.insert(lo, (w1 + w2, s1 + s2, ids1));
            }
        }

        // Weighted pool-adjacent-violators: merge any block whose average
        // exceeds the next block's average, maintaining non-decreasing y.
        let mut stack: Vec<(f64, f64, Vec<usize>)> = Vec::new();
        for (mut w, mut s, mut ids) in points {
            while let Some(&(tw, ts, _)) = stack.last() {
                if ts / tw > s / w {
                    let (tw2, ts2, mut tids2) = stack.pop().unwrap();
                    w += tw2;
                    s += ts2;
                    tids2.extend(ids);
                    ids = tids2;
                } else {
                    break;
                }
            }
            stack.push((w, s, ids));
        }

        let mut result = HashMap::new();
        for (w, s, ids) in stack {
            let y = s / w;
            for id in ids {
                result.insert(id, y + offset[&id]);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_minimum_gap_between_two_free_variables() {
        let vars = [
            Variable { id: 0, desired_position: 0.0, weight: 1.0 },
            Variable { id: 1, desired_position: 0.0, weight: 1.0 },
        ];
        let constraints = [Constraint { left: 0, right: 1, gap: 4.0, equality: false }];
        let pos = BlockSolver.solve(&vars, &constraints);
        assert!((pos[&1] - pos[&0] - 4.0).abs() < 1e-9);
        assert!((pos[&0] + 2.0).abs() < 1e-9);
    }

    #[test]
    fn already_feasible_gap_is_left_untouched() {
        let vars = [
            Variable { id: 0, desired_position: 0.0, weight: 1.0 },
            Variable { id: 1, desired_position: 10.0, weight: 1.0 },
        ];
        let constraints = [Constraint { left: 0, right: 1, gap: 4.0, equality: false }];
        let pos = BlockSolver.solve(&vars, &constraints);
        assert!((pos[&0] - 0.0).abs() < 1e-9);
        assert!((pos[&1] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn equality_constraint_forces_exact_gap() {
        let vars = [
            Variable { id: 0, desired_position: 0.0, weight: 1.0 },
            Variable { id: 1, desired_position: 10.0, weight: 1.0 },
        ];
        let constraints = [Constraint { left: 0, right: 1, gap: 4.0, equality: true }];
        let pos = BlockSolver.solve(&vars, &constraints);
        assert!((pos[&1] - pos[&0] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn three_variable_chain_merges_correctly() {
        let vars = [
            Variable { id: 0, desired_position: 0.0, weight: 1.0 },
            Variable { id: 1, desired_position: 0.0, weight: 1.0 },
            Variable { id: 2, desired_position: 0.0, weight: 1.0 },
        ];
        let constraints = [
            Constraint { left: 0, right: 1, gap: 2.0, equality: false },
            Constraint { left: 1, right: 2, gap: 2.0, equality: false },
        ];
        let pos = BlockSolver.solve(&vars, &constraints);
        assert!((pos[&1] - pos[&0] - 2.0).abs() < 1e-9);
        assert!((pos[&2] - pos[&1] - 2.0).abs() < 1e-9);
    }
}
