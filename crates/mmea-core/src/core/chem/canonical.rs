//! Canonical string form of a [`Structure`].
//!
//! The canonical string is a SMILES-like serialization in which every atom is
//! bracketed and every hydrogen appears as its own atom. Each connected
//! fragment is canonicalized on its own and the fragment strings are joined
//! with `.` in sorted order.
//!
//! Within a fragment, atoms are ranked by iterative refinement of their
//! invariants (element, isotope, charge, degree) with neighbour ranks and bond
//! orders. When refinement leaves a class of tied atoms, each member of the
//! smallest class is individualized in turn and the lexicographically smallest
//! resulting string is kept. The ranked graph is written by depth-first
//! traversal from the lowest ranked atom.
//!
//! Coordinates and stereochemistry do not contribute, so two conformers of the
//! same molecule share a canonical string.

use crate::core::models::structure::Structure;
use crate::core::models::topology::{Bond, BondOrder};
use std::collections::{HashSet, VecDeque};
use std::fmt::Write;

/// Computes the canonical string of `structure`.
pub fn canonical_string(structure: &Structure) -> String {
    let mut parts: Vec<String> = fragments(structure)
        .iter()
        .map(|fragment| canonical_fragment(&fragment_structure(structure, fragment)))
        .collect();
    parts.sort();
    parts.join(".")
}

/// Connected components as sorted atom index lists.
fn fragments(structure: &Structure) -> Vec<Vec<usize>> {
    let n = structure.atom_count();
    let mut seen = vec![false; n];
    let mut out = Vec::new();
    for start in 0..n {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mut members = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(atom) = queue.pop_front() {
            for &nb in structure.neighbors(atom) {
                if !seen[nb] {
                    seen[nb] = true;
                    members.push(nb);
                    queue.push_back(nb);
                }
            }
        }
        members.sort_unstable();
        out.push(members);
    }
    out
}

fn fragment_structure(structure: &Structure, members: &[usize]) -> Structure {
    if members.len() == structure.atom_count() {
        return structure.clone();
    }
    let mut local = vec![usize::MAX; structure.atom_count()];
    for (i, &atom) in members.iter().enumerate() {
        local[atom] = i;
    }
    let atoms = members
        .iter()
        .filter_map(|&atom| structure.atom(atom).cloned())
        .collect();
    let bonds = structure
        .bonds()
        .iter()
        .filter(|b| local[b.atom1] != usize::MAX)
        .map(|b| Bond::new(local[b.atom1], local[b.atom2], b.order))
        .collect();
    // Bonds never cross fragments, so the remapped parts are always valid.
    Structure::from_parts(atoms, bonds).unwrap_or_default()
}

/// Canonical string of a single connected fragment.
fn canonical_fragment(structure: &Structure) -> String {
    let mut best = None;
    search(structure, initial_ranks(structure), &mut best);
    best.unwrap_or_default()
}

fn search(structure: &Structure, ranks: Vec<usize>, best: &mut Option<String>) {
    let Some(rank) = smallest_tied_class(&ranks) else {
        let text = emit(structure, &ranks);
        if best.as_ref().is_none_or(|current| text < *current) {
            *best = Some(text);
        }
        return;
    };
    for atom in branch_atoms(structure, &ranks, rank) {
        let broken: Vec<(usize, bool)> = ranks
            .iter()
            .enumerate()
            .map(|(i, &r)| (r, i != atom))
            .collect();
        search(structure, refine(structure, dense_ranks(&broken)), best);
    }
}

/// Members of the tied class worth individualizing. Terminal atoms hanging
/// off the same neighbour are interchangeable, so only one of them is tried.
fn branch_atoms(structure: &Structure, ranks: &[usize], rank: usize) -> Vec<usize> {
    let mut anchors = HashSet::new();
    (0..ranks.len())
        .filter(|&i| ranks[i] == rank)
        .filter(|&i| match structure.neighbors(i) {
            [anchor] => anchors.insert(*anchor),
            _ => true,
        })
        .collect()
}

fn initial_ranks(structure: &Structure) -> Vec<usize> {
    let initial: Vec<(u8, u16, i8, usize)> = structure
        .atoms()
        .iter()
        .enumerate()
        .map(|(i, atom)| {
            (
                atom.element.atomic_number(),
                atom.isotope.unwrap_or(0),
                atom.charge,
                structure.degree(i),
            )
        })
        .collect();
    refine(structure, dense_ranks(&initial))
}

fn emit(structure: &Structure, ranks: &[usize]) -> String {
    let forest = SpanningForest::build(structure, ranks);
    let mut out = String::new();
    for (i, &root) in forest.roots.iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        write_atom(structure, &forest, root, &mut out);
    }
    out
}

fn bond_code(order: BondOrder) -> u8 {
    order.molfile_code()
}

fn refine(structure: &Structure, mut ranks: Vec<usize>) -> Vec<usize> {
    let mut classes = count_distinct(&ranks);
    loop {
        let keys: Vec<(usize, Vec<(usize, u8)>)> = (0..structure.atom_count())
            .map(|i| {
                let mut env: Vec<(usize, u8)> = structure
                    .neighbors(i)
                    .iter()
                    .map(|&nb| {
                        let order = structure
                            .bond_between(i, nb)
                            .map(|b| bond_code(b.order))
                            .unwrap_or(0);
                        (ranks[nb], order)
                    })
                    .collect();
                env.sort_unstable();
                (ranks[i], env)
            })
            .collect();
        let next = dense_ranks(&keys);
        let next_classes = count_distinct(&next);
        if next_classes == classes {
            return ranks;
        }
        ranks = next;
        classes = next_classes;
    }
}

/// Maps each key to the index of its value in the sorted, deduplicated key set.
fn dense_ranks<K: Ord + Clone>(keys: &[K]) -> Vec<usize> {
    let mut sorted = keys.to_vec();
    sorted.sort();
    sorted.dedup();
    keys.iter()
        .map(|k| sorted.binary_search(k).unwrap_or(0))
        .collect()
}

fn count_distinct(ranks: &[usize]) -> usize {
    ranks.iter().collect::<HashSet<_>>().len()
}

/// The lowest rank shared by more than one atom.
fn smallest_tied_class(ranks: &[usize]) -> Option<usize> {
    let mut counts = vec![0usize; ranks.len()];
    for &r in ranks {
        counts[r] += 1;
    }
    counts.iter().position(|&c| c > 1)
}

struct SpanningForest {
    roots: Vec<usize>,
    children: Vec<Vec<usize>>,
    /// Ring closure digits written after each atom. The bond order is only
    /// carried on the opening side.
    ring_marks: Vec<Vec<(usize, Option<BondOrder>)>>,
}

impl SpanningForest {
    fn build(structure: &Structure, ranks: &[usize]) -> Self {
        let n = structure.atom_count();
        let mut forest = Self {
            roots: Vec::new(),
            children: vec![Vec::new(); n],
            ring_marks: vec![Vec::new(); n],
        };
        let mut visited = vec![false; n];
        let mut closed: HashSet<(usize, usize)> = HashSet::new();
        let mut next_ring = 1usize;

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| ranks[i]);
        for start in order {
            if visited[start] {
                continue;
            }
            forest.roots.push(start);
            forest.visit(
                structure,
                ranks,
                start,
                None,
                &mut visited,
                &mut closed,
                &mut next_ring,
            );
        }
        forest
    }

    #[allow(clippy::too_many_arguments)]
    fn visit(
        &mut self,
        structure: &Structure,
        ranks: &[usize],
        atom: usize,
        parent: Option<usize>,
        visited: &mut [bool],
        closed: &mut HashSet<(usize, usize)>,
        next_ring: &mut usize,
    ) {
        visited[atom] = true;
        let mut neighbors: Vec<usize> = structure
            .neighbors(atom)
            .iter()
            .copied()
            .filter(|&nb| Some(nb) != parent)
            .collect();
        neighbors.sort_by_key(|&nb| ranks[nb]);

        for nb in neighbors {
            let edge = (atom.min(nb), atom.max(nb));
            if visited[nb] {
                if closed.insert(edge) {
                    let order = structure
                        .bond_between(atom, nb)
                        .map(|b| b.order)
                        .unwrap_or_default();
                    let ring = *next_ring;
                    *next_ring += 1;
                    self.ring_marks[nb].push((ring, Some(order)));
                    self.ring_marks[atom].push((ring, None));
                }
            } else {
                closed.insert(edge);
                self.children[atom].push(nb);
                self.visit(structure, ranks, nb, Some(atom), visited, closed, next_ring);
            }
        }
    }
}

fn bond_symbol(order: BondOrder) -> &'static str {
    match order {
        BondOrder::Single => "",
        BondOrder::Double => "=",
        BondOrder::Triple => "#",
        BondOrder::Aromatic => ":",
    }
}

fn write_atom(structure: &Structure, forest: &SpanningForest, atom: usize, out: &mut String) {
    let Some(data) = structure.atom(atom) else {
        return;
    };
    out.push('[');
    if let Some(mass) = data.isotope {
        let _ = write!(out, "{}", mass);
    }
    out.push_str(data.element.symbol());
    match data.charge {
        0 => {}
        1 => out.push('+'),
        -1 => out.push('-'),
        c if c > 0 => {
            let _ = write!(out, "+{}", c);
        }
        c => {
            let _ = write!(out, "-{}", -i16::from(c));
        }
    }
    out.push(']');

    for &(ring, order) in &forest.ring_marks[atom] {
        if let Some(order) = order {
            out.push_str(bond_symbol(order));
        }
        if ring < 10 {
            let _ = write!(out, "{}", ring);
        } else if ring < 100 {
            let _ = write!(out, "%{}", ring);
        } else {
            let _ = write!(out, "%({})", ring);
        }
    }

    let children = &forest.children[atom];
    for (i, &child) in children.iter().enumerate() {
        let order = structure
            .bond_between(atom, child)
            .map(|b| b.order)
            .unwrap_or_default();
        let last = i + 1 == children.len();
        if !last {
            out.push('(');
        }
        out.push_str(bond_symbol(order));
        write_atom(structure, forest, child, out);
        if !last {
            out.push(')');
        }
    }
}
