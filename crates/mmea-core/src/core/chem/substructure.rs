//! Substructure search via VF2-style backtracking.

use super::smarts::SmartsPattern;
use crate::core::models::structure::Structure;
use std::collections::HashSet;

/// Finds every occurrence of `pattern` in `target`.
///
/// Each match lists target atom indices in pattern atom order. Matches are
/// ordered by the target atom mapped to the first pattern atom, and a match
/// covering the same set of atoms as an earlier one is dropped.
pub fn find_matches(pattern: &SmartsPattern, target: &Structure) -> Vec<Vec<usize>> {
    let mut state = Vf2State::new(pattern, target);
    state.search();

    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    state
        .matches
        .into_iter()
        .filter(|mapping| {
            let mut key = mapping.clone();
            key.sort_unstable();
            seen.insert(key)
        })
        .collect()
}

struct Vf2State<'a> {
    pattern: &'a SmartsPattern,
    target: &'a Structure,
    // core_pattern[p] = Some(t): pattern atom p is mapped to target atom t
    core_pattern: Vec<Option<usize>>,
    core_target: Vec<Option<usize>>,
    matches: Vec<Vec<usize>>,
}

impl<'a> Vf2State<'a> {
    fn new(pattern: &'a SmartsPattern, target: &'a Structure) -> Self {
        Self {
            pattern,
            target,
            core_pattern: vec![None; pattern.atom_count()],
            core_target: vec![None; target.atom_count()],
            matches: Vec::new(),
        }
    }

    fn search(&mut self) {
        if self.pattern.atom_count() > self.target.atom_count()
            || self.pattern.bonds().len() > self.target.bond_count()
        {
            return;
        }
        self.match_recursive(0);
    }

    fn match_recursive(&mut self, depth: usize) {
        if depth == self.pattern.atom_count() {
            let mapping = self.core_pattern.iter().flatten().copied().collect();
            self.matches.push(mapping);
            return;
        }

        let pattern_atom = depth;
        for target_atom in self.find_candidates(pattern_atom) {
            if self.is_feasible(pattern_atom, target_atom) {
                self.core_pattern[pattern_atom] = Some(target_atom);
                self.core_target[target_atom] = Some(pattern_atom);

                self.match_recursive(depth + 1);

                self.core_pattern[pattern_atom] = None;
                self.core_target[target_atom] = None;
            }
        }
    }

    /// Unmapped target atoms adjacent to the images of every mapped pattern
    /// neighbor, or all unmapped atoms when no neighbor is mapped yet.
    fn find_candidates(&self, pattern_atom: usize) -> Vec<usize> {
        let mut candidates: Option<Vec<usize>> = None;

        for &(p_neighbor, _) in self.pattern.neighbors(pattern_atom) {
            if let Some(t_mapped) = self.core_pattern[p_neighbor] {
                let t_neighbors: Vec<usize> = self
                    .target
                    .neighbors(t_mapped)
                    .iter()
                    .copied()
                    .filter(|&n| self.core_target[n].is_none())
                    .collect();

                candidates = Some(match candidates {
                    None => t_neighbors,
                    Some(existing) => existing
                        .into_iter()
                        .filter(|n| t_neighbors.contains(n))
                        .collect(),
                });
            }
        }

        match candidates {
            Some(mut c) => {
                c.sort_unstable();
                c
            }
            None => (0..self.target.atom_count())
                .filter(|&i| self.core_target[i].is_none())
                .collect(),
        }
    }

    fn is_feasible(&self, pattern_atom: usize, target_atom: usize) -> bool {
        if !self.pattern.atoms()[pattern_atom].matches(self.target, target_atom) {
            return false;
        }

        for &(p_neighbor, p_bond_idx) in self.pattern.neighbors(pattern_atom) {
            if let Some(t_mapped) = self.core_pattern[p_neighbor] {
                match self.target.bond_between(target_atom, t_mapped) {
                    None => return false,
                    Some(bond) => {
                        if !self.pattern.bonds()[p_bond_idx].expr.matches(bond.order) {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }
}
