use super::config::AssemblyConfig;
use super::error::AssemblyError;
use crate::core::groups::GroupResolver;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::{
    centroid, max_distance_from, rotation_about_axis, rotation_to_align,
};
use itertools::Itertools;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Isometry3, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, instrument};

/// Clearance added between a building block and a linker, in Angstroms.
const BOND_GAP: f64 = 1.5;

/// Cage topologies: a polyhedron whose vertices hold building blocks and
/// whose edges hold linkers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TopologyKind {
    /// Tetrahedron: 4 building blocks, 6 linkers.
    FourPlusSix,
    /// Cube: 8 building blocks, 12 linkers.
    EightPlusTwelve,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown topology '{0}' (expected FourPlusSix or EightPlusTwelve)")]
pub struct ParseTopologyError(String);

impl fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TopologyKind {
    type Err = ParseTopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "FourPlusSix" | "4+6" => Ok(Self::FourPlusSix),
            "EightPlusTwelve" | "8+12" => Ok(Self::EightPlusTwelve),
            other => Err(ParseTopologyError(other.to_string())),
        }
    }
}

/// One unit type taking part in an assembly.
#[derive(Debug, Clone, Copy)]
pub struct Component<'a> {
    /// Identity used to count how often the unit is placed.
    pub label: &'a str,
    /// The substituted structure that gets placed.
    pub heavy: &'a Structure,
    /// Indices of the placeholder atoms inside `heavy`.
    pub bonders: &'a [usize],
}

/// Output of a topology build.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub heavy: Structure,
    /// `heavy` with every placeholder element restored to its target element.
    pub pristine: Structure,
    /// Ascending indices of all placeholder atoms in the combined structure.
    pub bonder_ids: Vec<usize>,
    pub bonds_made: usize,
    /// How many copies of each unit were placed, keyed by unit label.
    pub unit_counts: BTreeMap<String, usize>,
}

impl Assembly {
    /// Rebuilds an assembly from its heavy structure, deriving the pristine
    /// form by mapping each bonder's placeholder element back to its target.
    pub fn from_heavy(
        heavy: Structure,
        bonder_ids: Vec<usize>,
        bonds_made: usize,
        unit_counts: BTreeMap<String, usize>,
        resolver: &dyn GroupResolver,
    ) -> Self {
        let mut pristine = heavy.clone();
        for &id in &bonder_ids {
            let target = heavy
                .atom(id)
                .and_then(|atom| resolver.by_heavy(atom.element))
                .map(|group| group.target());
            if let Some(target) = target {
                pristine.set_element(id, target);
            }
        }
        Self {
            heavy,
            pristine,
            bonder_ids,
            bonds_made,
            unit_counts,
        }
    }
}

impl TopologyKind {
    pub const ALL: [TopologyKind; 2] = [Self::FourPlusSix, Self::EightPlusTwelve];

    pub fn name(self) -> &'static str {
        match self {
            Self::FourPlusSix => "FourPlusSix",
            Self::EightPlusTwelve => "EightPlusTwelve",
        }
    }

    /// Unit-length vertex directions of the polyhedron.
    pub fn vertices(self) -> Vec<Vector3<f64>> {
        let corners: Vec<Vector3<f64>> = match self {
            Self::FourPlusSix => vec![
                Vector3::new(1.0, 1.0, 1.0),
                Vector3::new(1.0, -1.0, -1.0),
                Vector3::new(-1.0, 1.0, -1.0),
                Vector3::new(-1.0, -1.0, 1.0),
            ],
            Self::EightPlusTwelve => [-1.0, 1.0]
                .into_iter()
                .cartesian_product([-1.0, 1.0])
                .cartesian_product([-1.0, 1.0])
                .map(|((x, y), z)| Vector3::new(x, y, z))
                .collect(),
        };
        corners.into_iter().map(|v| v.normalize()).collect()
    }

    /// Vertex index pairs joined by an edge, in lexicographic order.
    pub fn edges(self) -> Vec<(usize, usize)> {
        let vertices = self.vertices();
        let shortest = vertices
            .iter()
            .tuple_combinations()
            .map(|(a, b)| (a - b).norm())
            .fold(f64::INFINITY, f64::min);
        (0..vertices.len())
            .tuple_combinations()
            .filter(|&(a, b)| ((vertices[a] - vertices[b]).norm() - shortest).abs() < 1e-9)
            .collect()
    }

    /// Number of edges meeting at every vertex.
    pub fn vertex_degree(self) -> usize {
        3
    }

    pub fn building_block_count(self) -> usize {
        self.vertices().len()
    }

    pub fn linker_count(self) -> usize {
        self.edges().len()
    }

    /// Places one building block per vertex and one linker per edge, then
    /// bonds each linker bonder to the nearest free building block bonder of
    /// the edge's end vertices.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::ConnectivityMismatch`] if a unit has the wrong
    /// number of bonders, and [`AssemblyError::UnpairedBonder`] if a linker
    /// bonder finds no free partner.
    #[instrument(skip_all, name = "topology_build", fields(topology = %self))]
    pub fn build(
        self,
        building_block: Component<'_>,
        linker: Component<'_>,
        resolver: &dyn GroupResolver,
        config: &AssemblyConfig,
    ) -> Result<Assembly, AssemblyError> {
        self.check_connectivity("building block", &building_block, self.vertex_degree())?;
        self.check_connectivity("linker", &linker, 2)?;

        let vertices = self.vertices();
        let edges = self.edges();

        let (bb_center, bb_radius) = extent(building_block.heavy);
        let (lk_center, lk_radius) = extent(linker.heavy);
        let half_edge = edges
            .first()
            .map(|&(a, b)| (vertices[a] - vertices[b]).norm() / 2.0)
            .unwrap_or(1.0);
        let scale = (bb_radius + lk_radius + BOND_GAP) * config.topology_scale / half_edge;
        debug!(bb_radius, lk_radius, scale, "Scaling topology template.");

        let mut heavy = Structure::new();
        let mut bonder_ids = Vec::new();
        let mut unit_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut free: Vec<Vec<usize>> = Vec::with_capacity(vertices.len());

        for (index, vertex) in vertices.iter().enumerate() {
            let toward = edges
                .iter()
                .find_map(|&(a, b)| match index {
                    i if i == a => Some(vertices[b] - vertices[a]),
                    i if i == b => Some(vertices[a] - vertices[b]),
                    _ => None,
                })
                .unwrap_or_else(|| -vertex);
            let rotation = orient_building_block(&building_block, &bb_center, vertex, &toward);
            let placed = building_block
                .heavy
                .transformed(&placement(&bb_center, &rotation, &(vertex * scale)));
            let offset = heavy.extend_from(&placed);
            let bonders: Vec<usize> = building_block.bonders.iter().map(|b| b + offset).collect();
            bonder_ids.extend(&bonders);
            free.push(bonders);
            *unit_counts.entry(building_block.label.to_string()).or_default() += 1;
        }

        let mut bonds_made = 0;
        for (edge, &(a, b)) in edges.iter().enumerate() {
            let axis = vertices[a] - vertices[b];
            let rotation = orient_linker(&linker, &lk_center, &axis);
            let midpoint = (vertices[a] + vertices[b]) / 2.0 * scale;
            let placed = linker
                .heavy
                .transformed(&placement(&lk_center, &rotation, &midpoint));
            let offset = heavy.extend_from(&placed);
            *unit_counts.entry(linker.label.to_string()).or_default() += 1;

            let mut ends = vec![a, b];
            for &bonder in linker.bonders {
                let atom = bonder + offset;
                bonder_ids.push(atom);
                let (vertex, partner) = nearest_free(&heavy, &free, &ends, atom)
                    .ok_or(AssemblyError::UnpairedBonder { edge, atom })?;
                free[vertex].retain(|&f| f != partner);
                // The other linker bonder must pair with the opposite end.
                ends.retain(|&v| v != vertex);

                let order = match (heavy.atom(atom), heavy.atom(partner)) {
                    (Some(x), Some(y)) => resolver.bond_order(x.element, y.element),
                    _ => {
                        return Err(AssemblyError::Internal(format!(
                            "bonder {atom} or {partner} missing from combined structure"
                        )));
                    }
                };
                heavy.add_bond(atom, partner, order)?;
                bonds_made += 1;
            }
        }

        bonder_ids.sort_unstable();
        debug!(
            atoms = heavy.atom_count(),
            bonds_made,
            bonders = bonder_ids.len(),
            "Topology build complete."
        );
        Ok(Assembly::from_heavy(
            heavy,
            bonder_ids,
            bonds_made,
            unit_counts,
            resolver,
        ))
    }

    fn check_connectivity(
        self,
        role: &'static str,
        component: &Component<'_>,
        expected: usize,
    ) -> Result<(), AssemblyError> {
        if component.bonders.len() == expected {
            Ok(())
        } else {
            Err(AssemblyError::ConnectivityMismatch {
                topology: self.name(),
                role,
                unit: component.label.to_string(),
                expected,
                found: component.bonders.len(),
            })
        }
    }
}

fn extent(structure: &Structure) -> (Point3<f64>, f64) {
    let center = centroid(structure.positions()).unwrap_or_else(Point3::origin);
    (center, max_distance_from(structure.positions(), &center))
}

/// Maps `center` onto `target` after rotating about it.
fn placement(
    center: &Point3<f64>,
    rotation: &Rotation3<f64>,
    target: &Vector3<f64>,
) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::from(target - rotation * center.coords),
        UnitQuaternion::from_rotation_matrix(rotation),
    )
}

fn bonder_offsets(component: &Component<'_>, center: &Point3<f64>) -> Vec<Vector3<f64>> {
    component
        .bonders
        .iter()
        .filter_map(|&i| component.heavy.atom(i))
        .map(|atom| atom.position - center)
        .collect()
}

/// Lays the bonder plane flat against the sphere at `vertex`, then spins the
/// first bonder toward the first edge leaving the vertex.
fn orient_building_block(
    component: &Component<'_>,
    center: &Point3<f64>,
    vertex: &Vector3<f64>,
    toward: &Vector3<f64>,
) -> Rotation3<f64> {
    let offsets = bonder_offsets(component, center);
    let [first, second, third, ..] = offsets.as_slice() else {
        return Rotation3::identity();
    };
    let normal = (second - first).cross(&(third - first));
    let tilt = rotation_to_align(&normal, vertex);
    let spin = rotation_about_axis(vertex, &(tilt * first), toward);
    spin * tilt
}

/// Points the bonder-to-bonder axis of a linker along its edge.
fn orient_linker(
    component: &Component<'_>,
    center: &Point3<f64>,
    edge: &Vector3<f64>,
) -> Rotation3<f64> {
    match bonder_offsets(component, center).as_slice() {
        [first, second, ..] => rotation_to_align(&(second - first), edge),
        _ => Rotation3::identity(),
    }
}

/// The closest free building block bonder at one of `ends`, with its vertex.
fn nearest_free(
    structure: &Structure,
    free: &[Vec<usize>],
    ends: &[usize],
    atom: usize,
) -> Option<(usize, usize)> {
    let query = structure.atom(atom)?.position;
    let candidates: Vec<(usize, usize, [f64; 3])> = ends
        .iter()
        .flat_map(|&vertex| {
            free[vertex].iter().filter_map(move |&bonder| {
                structure
                    .atom(bonder)
                    .map(|a| (vertex, bonder, [a.position.x, a.position.y, a.position.z]))
            })
        })
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let mut tree: KdTree<f64, 3> = KdTree::with_capacity(candidates.len());
    for (item, (_, _, position)) in candidates.iter().enumerate() {
        tree.add(position, item as u64);
    }
    let nearest = tree.nearest_one::<SquaredEuclidean>(&[query.x, query.y, query.z]);
    candidates
        .get(nearest.item as usize)
        .map(|&(vertex, bonder, _)| (vertex, bonder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::groups::FunctionalGroupRegistry;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;
    use crate::core::models::topology::{Bond, BondOrder};

    fn el(symbol: &str) -> Element {
        Element::from_symbol(symbol).unwrap()
    }

    /// A flat three-armed unit: a carbon hub with three Rh bonders.
    fn tripod() -> Structure {
        let mut atoms = vec![Atom::new(Element::C, Point3::origin())];
        for k in 0..3 {
            let angle = k as f64 * 2.0 * std::f64::consts::PI / 3.0;
            atoms.push(Atom::new(
                el("Rh"),
                Point3::new(1.5 * angle.cos(), 1.5 * angle.sin(), 0.0),
            ));
        }
        let bonds = (1..4).map(|i| Bond::new(0, i, BondOrder::Single)).collect();
        Structure::from_parts(atoms, bonds).unwrap()
    }

    /// Y-C-C-Y rod.
    fn rod() -> Structure {
        let atoms = vec![
            Atom::new(el("Y"), Point3::new(-2.25, 0.0, 0.0)),
            Atom::new(Element::C, Point3::new(-0.75, 0.0, 0.0)),
            Atom::new(Element::C, Point3::new(0.75, 0.0, 0.0)),
            Atom::new(el("Y"), Point3::new(2.25, 0.0, 0.0)),
        ];
        let bonds = vec![
            Bond::new(0, 1, BondOrder::Single),
            Bond::new(1, 2, BondOrder::Single),
            Bond::new(2, 3, BondOrder::Single),
        ];
        Structure::from_parts(atoms, bonds).unwrap()
    }

    fn build(kind: TopologyKind) -> Result<Assembly, AssemblyError> {
        let bb = tripod();
        let lk = rod();
        kind.build(
            Component {
                label: "bb",
                heavy: &bb,
                bonders: &[1, 2, 3],
            },
            Component {
                label: "lk",
                heavy: &lk,
                bonders: &[0, 3],
            },
            FunctionalGroupRegistry::default_registry(),
            &AssemblyConfig::default(),
        )
    }

    #[test]
    fn templates_have_expected_shape() {
        assert_eq!(TopologyKind::FourPlusSix.building_block_count(), 4);
        assert_eq!(TopologyKind::FourPlusSix.linker_count(), 6);
        assert_eq!(TopologyKind::EightPlusTwelve.building_block_count(), 8);
        assert_eq!(TopologyKind::EightPlusTwelve.linker_count(), 12);

        for kind in TopologyKind::ALL {
            let mut degree = vec![0; kind.building_block_count()];
            for (a, b) in kind.edges() {
                degree[a] += 1;
                degree[b] += 1;
            }
            assert!(degree.iter().all(|&d| d == kind.vertex_degree()));
        }
    }

    #[test]
    fn parses_names_and_shorthand() {
        assert_eq!("FourPlusSix".parse(), Ok(TopologyKind::FourPlusSix));
        assert_eq!("8+12".parse(), Ok(TopologyKind::EightPlusTwelve));
        assert!("Tetrahedron".parse::<TopologyKind>().is_err());
        assert_eq!(TopologyKind::EightPlusTwelve.to_string(), "EightPlusTwelve");
    }

    #[test]
    fn four_plus_six_bonds_every_bonder() {
        let assembly = build(TopologyKind::FourPlusSix).unwrap();
        assert_eq!(assembly.heavy.atom_count(), 4 * 4 + 6 * 4);
        assert_eq!(assembly.bonds_made, 12);
        assert_eq!(assembly.bonder_ids.len(), 24);
        assert!(assembly.bonder_ids.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(assembly.unit_counts["bb"], 4);
        assert_eq!(assembly.unit_counts["lk"], 6);
        assert_eq!(assembly.heavy.bond_count(), 4 * 3 + 6 * 3 + 12);

        // Every bonder is used exactly once.
        for &id in &assembly.bonder_ids {
            let inter_unit = assembly
                .heavy
                .neighbors(id)
                .iter()
                .filter(|&&n| assembly.bonder_ids.contains(&n))
                .count();
            assert_eq!(inter_unit, 1, "bonder {id}");
        }
    }

    #[test]
    fn double_bond_rules_apply_to_new_bonds() {
        let assembly = build(TopologyKind::FourPlusSix).unwrap();
        let rh = el("Rh");
        let joined: Vec<&Bond> = assembly
            .heavy
            .bonds()
            .iter()
            .filter(|b| {
                let e1 = assembly.heavy.atom(b.atom1).unwrap().element;
                let e2 = assembly.heavy.atom(b.atom2).unwrap().element;
                (e1 == rh) != (e2 == rh) && (e1 == el("Y") || e2 == el("Y"))
            })
            .collect();
        assert_eq!(joined.len(), 12);
        assert!(joined.iter().all(|b| b.order == BondOrder::Double));
    }

    #[test]
    fn pristine_form_restores_target_elements() {
        let assembly = build(TopologyKind::EightPlusTwelve).unwrap();
        assert_eq!(assembly.bonds_made, 24);
        for &id in &assembly.bonder_ids {
            let heavy = assembly.heavy.atom(id).unwrap().element;
            let pristine = assembly.pristine.atom(id).unwrap().element;
            match heavy.symbol() {
                "Rh" => assert_eq!(pristine, Element::N),
                "Y" => assert_eq!(pristine, Element::C),
                other => panic!("unexpected bonder element {other}"),
            }
        }
        assert_eq!(assembly.pristine.bonds(), assembly.heavy.bonds());
    }

    #[test]
    fn wrong_connectivity_is_rejected() {
        let bb = tripod();
        let lk = rod();
        let err = TopologyKind::FourPlusSix
            .build(
                Component {
                    label: "lk",
                    heavy: &lk,
                    bonders: &[0, 3],
                },
                Component {
                    label: "bb",
                    heavy: &bb,
                    bonders: &[1, 2, 3],
                },
                FunctionalGroupRegistry::default_registry(),
                &AssemblyConfig::default(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::ConnectivityMismatch {
                role: "building block",
                expected: 3,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn topology_scale_spreads_units() {
        let spread = |scale: f64| {
            let bb = tripod();
            let lk = rod();
            let config = AssemblyConfig::builder().topology_scale(scale).build().unwrap();
            let assembly = TopologyKind::FourPlusSix
                .build(
                    Component {
                        label: "bb",
                        heavy: &bb,
                        bonders: &[1, 2, 3],
                    },
                    Component {
                        label: "lk",
                        heavy: &lk,
                        bonders: &[0, 3],
                    },
                    FunctionalGroupRegistry::default_registry(),
                    &config,
                )
                .unwrap();
            // Hub carbon of the first building block sits on vertex 0.
            assembly.heavy.atom(0).unwrap().position.coords.norm()
        };
        assert!(spread(2.0) > spread(1.0));
    }
}
