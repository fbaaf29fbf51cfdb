//! Built-in descriptor engine computing constitutional, topological and
//! polarity descriptors from the hydrogen-suppressed molecular graph.

use super::DescriptorSource;
use super::smiles::{BondOrder, MolecularGraph, parse_smiles};
use crate::types::{ColumnSpec, DescriptorType, DescriptorVector, InvalidReason};
use std::collections::VecDeque;

const SOURCE_NAME: &str = "GraphDescriptors";
const VALIDITY_FLAG: &str = "GraphDescriptors_calculated";

/// Feature columns, in output order.
pub const FEATURE_NAMES: [&str; 20] = [
    "MolWt",
    "HeavyAtomMolWt",
    "HeavyAtomCount",
    "NumHeteroatoms",
    "NHOHCount",
    "NOCount",
    "NumHDonors",
    "NumHAcceptors",
    "NumValenceElectrons",
    "FormalCharge",
    "RingCount",
    "NumAromaticAtoms",
    "NumRotatableBonds",
    "FractionCSP3",
    "TPSA",
    "Chi0",
    "Chi1",
    "BalabanJ",
    "WienerIndex",
    "Zagreb1",
];

const HYDROGEN_MASS: f64 = 1.008;

/// Descriptor source backed by the SMILES parser in this crate.
///
/// Identifiers that fail to parse are rejected with the parser's message.
#[derive(Debug, Default, Clone)]
pub struct GraphDescriptorSource;

impl GraphDescriptorSource {
    pub fn new() -> Self {
        Self
    }
}

impl DescriptorSource for GraphDescriptorSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn schema(&self) -> Vec<ColumnSpec> {
        std::iter::once(ColumnSpec::new(VALIDITY_FLAG, DescriptorType::Bool))
            .chain(FEATURE_NAMES.iter().map(|name| match *name {
                "HeavyAtomCount" | "NumHeteroatoms" | "NHOHCount" | "NOCount" | "NumHDonors"
                | "NumHAcceptors" | "NumValenceElectrons" | "FormalCharge" | "RingCount"
                | "NumAromaticAtoms" | "NumRotatableBonds" | "WienerIndex" | "Zagreb1" => {
                    ColumnSpec::new(*name, DescriptorType::Int)
                }
                _ => ColumnSpec::float(*name),
            }))
            .collect()
    }

    fn process(&self, smiles: &str) -> DescriptorVector {
        match parse_smiles(smiles) {
            Ok(graph) => DescriptorVector::Valid(compute_descriptors(&graph)),
            Err(e) => DescriptorVector::Invalid(InvalidReason::rejected(e.to_string())),
        }
    }
}

/// Heavy atoms of a graph with their local adjacency.
struct HeavyView<'a> {
    graph: &'a MolecularGraph,
    /// graph index of each heavy atom
    atoms: Vec<usize>,
    neighbors: Vec<Vec<usize>>,
    /// `(local a, local b, order)` for bonds between heavy atoms
    edges: Vec<(usize, usize, BondOrder)>,
}

impl<'a> HeavyView<'a> {
    fn new(graph: &'a MolecularGraph) -> Self {
        let atoms: Vec<usize> = (0..graph.atom_count())
            .filter(|&i| !graph.atoms[i].is_hydrogen())
            .collect();
        let mut local = vec![usize::MAX; graph.atom_count()];
        for (l, &g) in atoms.iter().enumerate() {
            local[g] = l;
        }

        let mut neighbors = vec![Vec::new(); atoms.len()];
        let mut edges = Vec::new();
        for bond in &graph.bonds {
            let (a, b) = (local[bond.atom1], local[bond.atom2]);
            if a == usize::MAX || b == usize::MAX {
                continue;
            }
            neighbors[a].push(b);
            neighbors[b].push(a);
            edges.push((a, b, bond.order));
        }

        Self {
            graph,
            atoms,
            neighbors,
            edges,
        }
    }

    fn len(&self) -> usize {
        self.atoms.len()
    }

    fn degree(&self, l: usize) -> usize {
        self.neighbors[l].len()
    }

    fn atomic_number(&self, l: usize) -> u8 {
        self.graph.atoms[self.atoms[l]].atomic_number()
    }

    fn hydrogens(&self, l: usize) -> usize {
        self.graph.total_hydrogens(self.atoms[l])
    }

    fn shortest_paths(&self) -> Vec<Vec<usize>> {
        let n = self.len();
        let mut dist = vec![vec![usize::MAX; n]; n];
        for start in 0..n {
            dist[start][start] = 0;
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                for &next in &self.neighbors[current] {
                    if dist[start][next] == usize::MAX {
                        dist[start][next] = dist[start][current] + 1;
                        queue.push_back(next);
                    }
                }
            }
        }
        dist
    }

    fn components(&self) -> usize {
        let mut seen = vec![false; self.len()];
        let mut count = 0;
        for start in 0..self.len() {
            if seen[start] {
                continue;
            }
            count += 1;
            seen[start] = true;
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                for &next in &self.neighbors[current] {
                    if !seen[next] {
                        seen[next] = true;
                        queue.push_back(next);
                    }
                }
            }
        }
        count
    }

    /// Cyclomatic number: bonds - atoms + components.
    fn ring_count(&self) -> usize {
        (self.edges.len() + self.components()).saturating_sub(self.len())
    }

    /// Whether an edge lies on a cycle, i.e. its endpoints stay connected
    /// without it.
    fn in_ring(&self, edge: usize) -> bool {
        let (a, b, _) = self.edges[edge];
        let mut seen = vec![false; self.len()];
        seen[a] = true;
        let mut queue = VecDeque::from([a]);
        while let Some(current) = queue.pop_front() {
            for &next in &self.neighbors[current] {
                let skipped = (current == a && next == b) || (current == b && next == a);
                if skipped || seen[next] {
                    continue;
                }
                if next == b {
                    return true;
                }
                seen[next] = true;
                queue.push_back(next);
            }
        }
        false
    }

    fn has_order(&self, l: usize, order: BondOrder) -> bool {
        self.graph
            .bond_orders(self.atoms[l])
            .any(|o| o == order)
    }
}

/// Compute all feature values in [`FEATURE_NAMES`] order.
fn compute_descriptors(graph: &MolecularGraph) -> Vec<f64> {
    let view = HeavyView::new(graph);
    let n = view.len();

    let hydrogen_total: usize = (0..n).map(|l| view.hydrogens(l)).sum();
    let heavy_mass: f64 = view
        .atoms
        .iter()
        .map(|&g| graph.atoms[g].element.mass)
        .sum();
    let mol_wt = heavy_mass + hydrogen_total as f64 * HYDROGEN_MASS;

    let heteroatoms = (0..n).filter(|&l| view.atomic_number(l) != 6).count();
    let is_n_or_o = |l: usize| matches!(view.atomic_number(l), 7 | 8);
    let nhoh: usize = (0..n).filter(|&l| is_n_or_o(l)).map(|l| view.hydrogens(l)).sum();
    let no_count = (0..n).filter(|&l| is_n_or_o(l)).count();
    let donors = (0..n)
        .filter(|&l| is_n_or_o(l) && view.hydrogens(l) > 0)
        .count();
    let acceptors = (0..n)
        .filter(|&l| is_n_or_o(l) && graph.atoms[view.atoms[l]].charge <= 0)
        .count();

    let formal_charge: i64 = graph.atoms.iter().map(|a| a.charge as i64).sum();
    let valence_electrons: i64 = view
        .atoms
        .iter()
        .map(|&g| graph.atoms[g].element.valence_electrons as i64)
        .sum::<i64>()
        + hydrogen_total as i64
        - formal_charge;

    let aromatic_atoms = view
        .atoms
        .iter()
        .filter(|&&g| graph.atoms[g].aromatic)
        .count();

    let rotatable = (0..view.edges.len())
        .filter(|&e| {
            let (a, b, order) = view.edges[e];
            order == BondOrder::Single
                && view.degree(a) > 1
                && view.degree(b) > 1
                && !view.has_order(a, BondOrder::Triple)
                && !view.has_order(b, BondOrder::Triple)
                && !view.in_ring(e)
        })
        .count();

    let carbons: Vec<usize> = (0..n).filter(|&l| view.atomic_number(l) == 6).collect();
    let sp3_carbons = carbons
        .iter()
        .filter(|&&l| {
            !graph.atoms[view.atoms[l]].aromatic
                && graph
                    .bond_orders(view.atoms[l])
                    .all(|o| o == BondOrder::Single)
        })
        .count();
    let fraction_csp3 = if carbons.is_empty() {
        0.0
    } else {
        sp3_carbons as f64 / carbons.len() as f64
    };

    let tpsa: f64 = (0..n).map(|l| tpsa_contribution(&view, l)).sum();

    let degrees: Vec<f64> = (0..n).map(|l| view.degree(l) as f64).collect();
    let chi0: f64 = degrees.iter().filter(|&&d| d > 0.0).map(|d| 1.0 / d.sqrt()).sum();
    let chi1: f64 = view
        .edges
        .iter()
        .map(|&(a, b, _)| 1.0 / (degrees[a] * degrees[b]).sqrt())
        .sum();
    let zagreb1: f64 = degrees.iter().map(|d| d * d).sum();

    let dist = view.shortest_paths();
    let wiener = wiener_index(&dist);
    let balaban = balaban_j(&view, &dist);

    vec![
        mol_wt,
        heavy_mass,
        n as f64,
        heteroatoms as f64,
        nhoh as f64,
        no_count as f64,
        donors as f64,
        acceptors as f64,
        valence_electrons as f64,
        formal_charge as f64,
        view.ring_count() as f64,
        aromatic_atoms as f64,
        rotatable as f64,
        fraction_csp3,
        tpsa,
        chi0,
        chi1,
        balaban,
        wiener,
        zagreb1,
    ]
}

/// Sum of shortest path lengths over connected atom pairs.
fn wiener_index(dist: &[Vec<usize>]) -> f64 {
    let mut sum = 0u64;
    for (i, row) in dist.iter().enumerate() {
        for &d in &row[i + 1..] {
            if d != usize::MAX {
                sum += d as u64;
            }
        }
    }
    sum as f64
}

/// Balaban J = m / (mu + 1) * sum over bonds of (s_i * s_j)^-1/2.
fn balaban_j(view: &HeavyView<'_>, dist: &[Vec<usize>]) -> f64 {
    let m = view.edges.len();
    if view.len() < 2 || m == 0 {
        return 0.0;
    }

    let sums: Vec<f64> = dist
        .iter()
        .map(|row| {
            row.iter()
                .filter(|&&d| d != usize::MAX)
                .map(|&d| d as f64)
                .sum()
        })
        .collect();
    let mu = view.ring_count() as f64;

    let edge_sum: f64 = view
        .edges
        .iter()
        .filter(|&&(a, b, _)| sums[a] > 0.0 && sums[b] > 0.0)
        .map(|&(a, b, _)| (sums[a] * sums[b]).powf(-0.5))
        .sum();

    m as f64 / (mu + 1.0) * edge_sum
}

/// Polar surface contribution of N and O atoms.
fn tpsa_contribution(view: &HeavyView<'_>, l: usize) -> f64 {
    let atom = &view.graph.atoms[view.atoms[l]];
    let hydrogens = view.hydrogens(l);
    let degree = view.degree(l);
    let double = view.has_order(l, BondOrder::Double);
    let triple = view.has_order(l, BondOrder::Triple);

    match atom.atomic_number() {
        7 => {
            if atom.charge > 0 {
                return match hydrogens {
                    0 => 0.0,
                    1 => 23.47,
                    2 => 25.59,
                    _ => 27.64,
                };
            }
            if atom.aromatic {
                return if hydrogens > 0 { 15.79 } else { 12.89 };
            }
            match (hydrogens, double, triple) {
                (_, _, true) => 23.79,
                (h, _, _) if h >= 2 => 26.02,
                (1, true, _) => 23.85,
                (1, false, _) => 12.03,
                (0, true, _) => 12.36,
                _ if degree >= 3 => 3.24,
                _ => 3.01,
            }
        }
        8 => {
            if atom.charge < 0 {
                23.06
            } else if atom.aromatic {
                13.14
            } else if hydrogens > 0 {
                20.23
            } else if double {
                17.07
            } else {
                9.23
            }
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors(smiles: &str) -> Vec<f64> {
        match GraphDescriptorSource::new().process(smiles) {
            DescriptorVector::Valid(values) => values,
            DescriptorVector::Invalid(reason) => panic!("{} rejected: {}", smiles, reason),
        }
    }

    fn value(values: &[f64], name: &str) -> f64 {
        let idx = FEATURE_NAMES.iter().position(|n| *n == name).unwrap();
        values[idx]
    }

    #[test]
    fn test_schema_starts_with_flag() {
        let schema = GraphDescriptorSource::new().schema();
        assert_eq!(schema[0].name, "GraphDescriptors_calculated");
        assert_eq!(schema[0].dtype, DescriptorType::Bool);
        assert_eq!(schema.len(), FEATURE_NAMES.len() + 1);
        assert_eq!(schema[1].name, "MolWt");
    }

    #[test]
    fn test_vector_width_matches_schema() {
        for smiles in ["C", "CCO", "c1ccccc1", "[Na+].[Cl-]", "CC(=O)Oc1ccccc1C(=O)O"] {
            assert_eq!(descriptors(smiles).len(), FEATURE_NAMES.len());
        }
    }

    #[test]
    fn test_ethanol() {
        let values = descriptors("CCO");
        assert!((value(&values, "MolWt") - 46.069).abs() < 0.01);
        assert_eq!(value(&values, "HeavyAtomCount"), 3.0);
        assert_eq!(value(&values, "NumHeteroatoms"), 1.0);
        assert_eq!(value(&values, "NumHDonors"), 1.0);
        assert_eq!(value(&values, "NHOHCount"), 1.0);
        assert_eq!(value(&values, "NumValenceElectrons"), 20.0);
        assert_eq!(value(&values, "RingCount"), 0.0);
        assert_eq!(value(&values, "NumRotatableBonds"), 0.0);
        assert_eq!(value(&values, "FractionCSP3"), 1.0);
        assert!((value(&values, "TPSA") - 20.23).abs() < 1e-9);
        assert_eq!(value(&values, "WienerIndex"), 4.0);
        assert_eq!(value(&values, "Zagreb1"), 6.0);
    }

    #[test]
    fn test_benzene() {
        let values = descriptors("c1ccccc1");
        assert!((value(&values, "MolWt") - 78.114).abs() < 0.01);
        assert_eq!(value(&values, "RingCount"), 1.0);
        assert_eq!(value(&values, "NumAromaticAtoms"), 6.0);
        assert_eq!(value(&values, "FractionCSP3"), 0.0);
        assert_eq!(value(&values, "TPSA"), 0.0);
        assert_eq!(value(&values, "NumRotatableBonds"), 0.0);
        // 6 pairs at 1, 6 at 2, 3 at 3
        assert_eq!(value(&values, "WienerIndex"), 27.0);
        assert!((value(&values, "Chi1") - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_butane_rotatable_bond() {
        let values = descriptors("CCCC");
        assert_eq!(value(&values, "NumRotatableBonds"), 1.0);
        // distance sums 6, 4, 4, 6
        let expected = 3.0 * (2.0 / 24f64.sqrt() + 0.25);
        assert!((value(&values, "BalabanJ") - expected).abs() < 1e-9);
    }

    #[test]
    fn test_ring_bonds_are_not_rotatable() {
        let values = descriptors("C1CCCCC1");
        assert_eq!(value(&values, "NumRotatableBonds"), 0.0);
        assert_eq!(value(&values, "RingCount"), 1.0);
    }

    #[test]
    fn test_charged_fragments() {
        let values = descriptors("[Na+].[Cl-]");
        assert_eq!(value(&values, "FormalCharge"), 0.0);
        assert_eq!(value(&values, "HeavyAtomCount"), 2.0);
        assert_eq!(value(&values, "WienerIndex"), 0.0);
        assert_eq!(value(&values, "BalabanJ"), 0.0);
    }

    #[test]
    fn test_explicit_hydrogens_fold_into_parent() {
        let implicit = descriptors("C");
        let explicit = descriptors("[H]C([H])([H])[H]");
        assert_eq!(implicit, explicit);
    }

    #[test]
    fn test_invalid_smiles_is_rejected() {
        let result = GraphDescriptorSource::new().process("not_a_molecule!!");
        assert!(matches!(
            result,
            DescriptorVector::Invalid(InvalidReason::Rejected { .. })
        ));
    }
}
