//! Morgan (ECFP-style) circular fingerprints.

use std::collections::{BTreeSet, HashSet, VecDeque};

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::*;

use crate::{parse_smiles, MoleculeGraph, SmilesError};

pub const FINGERPRINT_RADIUS: usize = 2;
pub const FINGERPRINT_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintParams {
    pub radius: usize,
    pub size: usize,
}

impl Default for FingerprintParams {
    fn default() -> Self {
        Self {
            radius: FINGERPRINT_RADIUS,
            size: FINGERPRINT_SIZE,
        }
    }
}

/// A fixed-length presence vector. Every entry is `0` or `1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    pub fn zeros(size: usize) -> Self {
        Fingerprint(vec![0; size])
    }

    fn set(&mut self, position: usize) {
        let size = self.0.len();
        self.0[position % size] = 1;
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<u8> {
        self.0.get(position).copied()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn count_ones(&self) -> usize {
        self.0.iter().filter(|&&bit| bit != 0).count()
    }

    /// True for the all-zero vector produced for unparseable input.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&bit| bit == 0)
    }
}

pub trait MorganFingerprint {
    fn morgan_fingerprint(&self, params: &FingerprintParams) -> Fingerprint;
}

impl MorganFingerprint for MoleculeGraph {
    fn morgan_fingerprint(&self, params: &FingerprintParams) -> Fingerprint {
        let mut fingerprint = Fingerprint::zeros(params.size);
        if params.size == 0 {
            return fingerprint;
        }
        for identifier in morgan_identifiers(self, params.radius) {
            fingerprint.set(identifier as usize);
        }
        fingerprint
    }
}

/// Turns SMILES strings into fingerprints with fixed parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MorganEncoder {
    params: FingerprintParams,
}

impl MorganEncoder {
    pub fn new(params: FingerprintParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &FingerprintParams {
        &self.params
    }

    pub fn width(&self) -> usize {
        self.params.size
    }

    /// Fingerprint a SMILES string, or report why it could not be parsed.
    pub fn try_encode(&self, smiles: &str) -> Result<Fingerprint, SmilesError> {
        let molecule = parse_smiles(smiles)?;
        Ok(molecule.morgan_fingerprint(&self.params))
    }

    /// Fingerprint a SMILES string. Unparseable input yields the all-zero
    /// vector, which downstream code cannot tell apart from a featureless molecule.
    pub fn encode(&self, smiles: &str) -> Fingerprint {
        self.try_encode(smiles).unwrap_or_else(|e| {
            debug!("Zero-filling fingerprint for {smiles:?}: {e}");
            Fingerprint::zeros(self.params.size)
        })
    }
}

/// Encode with the default radius-2, 1024-bit parameters.
pub fn encode(smiles: &str) -> Fingerprint {
    MorganEncoder::default().encode(smiles)
}

/// 32-bit hash combine, stable across platforms and builds.
fn hash_combine(seed: u32, value: u32) -> u32 {
    seed ^ value
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}

fn hash_values(values: &[u32]) -> u32 {
    values
        .iter()
        .fold(values.len() as u32, |seed, &value| hash_combine(seed, value))
}

/// Whether each bond lies on a cycle: its ends stay connected without it.
fn ring_bonds(graph: &MoleculeGraph) -> Vec<bool> {
    graph
        .edge_indices()
        .map(|edge| {
            let Some((a, b)) = graph.edge_endpoints(edge) else {
                return false;
            };
            let mut visited = vec![false; graph.node_count()];
            let mut queue = VecDeque::from([a]);
            visited[a.index()] = true;
            while let Some(node) = queue.pop_front() {
                for next in graph.edges(node) {
                    if next.id() == edge {
                        continue;
                    }
                    let other = if next.source() == node { next.target() } else { next.source() };
                    if other == b {
                        return true;
                    }
                    if !visited[other.index()] {
                        visited[other.index()] = true;
                        queue.push_back(other);
                    }
                }
            }
            false
        })
        .collect()
}

/// Atom invariants: atomic number, total degree, hydrogens, charge, isotope, ring membership.
fn initial_identifier(graph: &MoleculeGraph, node: NodeIndex, in_ring: bool) -> u32 {
    let atom = &graph[node];
    let heavy_degree = graph.neighbors(node).count() as u32;
    hash_values(&[
        atom.atomic_number() as u32,
        heavy_degree + atom.hydrogens as u32,
        atom.hydrogens as u32,
        atom.charge as i32 as u32,
        atom.isotope as u32,
        in_ring as u32,
    ])
}

/// Every environment identifier produced up to `radius`, after dropping
/// environments that cover a bond set already seen.
pub fn morgan_identifiers(graph: &MoleculeGraph, radius: usize) -> Vec<u32> {
    let n = graph.node_count();
    let rings = ring_bonds(graph);

    let mut identifiers: Vec<u32> = graph
        .node_indices()
        .map(|node| {
            let in_ring = graph.edges(node).any(|edge| rings[edge.id().index()]);
            initial_identifier(graph, node, in_ring)
        })
        .collect();
    let mut produced = identifiers.clone();

    let mut neighborhoods: Vec<BTreeSet<EdgeIndex>> = vec![BTreeSet::new(); n];
    // Isolated atoms have nothing more to describe after layer 0.
    let mut dead: Vec<bool> = graph
        .node_indices()
        .map(|node| graph.neighbors(node).next().is_none())
        .collect();
    let mut seen: HashSet<BTreeSet<EdgeIndex>> = HashSet::new();

    for layer in 1..=radius {
        let mut round: Vec<(BTreeSet<EdgeIndex>, u32, usize)> = Vec::new();
        let mut next_identifiers = identifiers.clone();

        for node in graph.node_indices() {
            let index = node.index();
            if dead[index] {
                continue;
            }
            let mut neighbors: Vec<(u32, u32)> = Vec::new();
            let mut neighborhood = neighborhoods[index].clone();
            for edge in graph.edges(node) {
                let other = if edge.source() == node { edge.target() } else { edge.source() };
                neighbors.push((edge.weight().code(), identifiers[other.index()]));
                neighborhood.insert(edge.id());
                neighborhood.extend(neighborhoods[other.index()].iter().copied());
            }
            neighbors.sort_unstable();

            let mut values = vec![layer as u32, identifiers[index]];
            for (bond, neighbor) in neighbors {
                values.push(bond);
                values.push(neighbor);
            }
            let identifier = hash_values(&values);
            next_identifiers[index] = identifier;
            round.push((neighborhood, identifier, index));
        }

        round.sort();
        for (neighborhood, identifier, index) in round {
            if seen.contains(&neighborhood) {
                dead[index] = true;
            } else {
                produced.push(identifier);
                seen.insert(neighborhood.clone());
            }
            neighborhoods[index] = neighborhood;
        }
        identifiers = next_identifiers;
    }

    trace!("Produced {} environment identifiers for {n} atoms", produced.len());
    produced
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLES: [&str; 5] = ["CCO", "CCCC", "CC(=O)O", "CCN(CC)CC", "CC(C)O"];

    #[test]
    fn test_fixed_width_binary() {
        for smiles in EXAMPLES.iter().chain(["c1ccccc1O", "C1CNCCN1c(c2)c(F)cc3c2N(C4CC4)C=C(C3=O)C(=O)O"].iter()) {
            let fingerprint = encode(smiles);
            assert_eq!(fingerprint.len(), FINGERPRINT_SIZE);
            assert!(fingerprint.as_slice().iter().all(|&bit| bit <= 1));
            assert!(!fingerprint.is_zero(), "{smiles} produced no bits");
        }
    }

    #[test]
    fn test_invalid_smiles_zero_fill() {
        for smiles in ["", "C1CC", "CXC", "not a molecule", "C(("] {
            let fingerprint = encode(smiles);
            assert_eq!(fingerprint.len(), FINGERPRINT_SIZE);
            assert!(fingerprint.is_zero());
            assert!(MorganEncoder::default().try_encode(smiles).is_err());
        }
    }

    #[test]
    fn test_extreme_input_zero_fills() {
        let crowded = format!("C{}", "(C)".repeat(300));
        let charged = format!("[C{}]", "+".repeat(128));
        for smiles in [crowded.as_str(), charged.as_str(), "C(C)(C)(C)(C)C"] {
            assert!(encode(smiles).is_zero());
            assert!(MorganEncoder::default().try_encode(smiles).is_err());
        }
    }

    #[test]
    fn test_deterministic() {
        for smiles in EXAMPLES {
            let first = encode(smiles);
            for _ in 0..3 {
                assert_eq!(encode(smiles), first);
            }
        }
    }

    #[test]
    fn test_atom_order_does_not_matter() {
        assert_eq!(encode("OCC"), encode("CCO"));
        assert_eq!(encode("C(C)(C)O"), encode("CC(C)O"));
        assert_eq!(encode("c1ccccc1C"), encode("Cc1ccccc1"));
    }

    #[test]
    fn test_different_molecules_differ() {
        let fingerprints: Vec<Fingerprint> = EXAMPLES.iter().map(|s| encode(s)).collect();
        for i in 0..fingerprints.len() {
            for j in i + 1..fingerprints.len() {
                assert_ne!(fingerprints[i], fingerprints[j], "{} vs {}", EXAMPLES[i], EXAMPLES[j]);
            }
        }
    }

    #[test]
    fn test_radius_zero_counts_atom_types() {
        let encoder = MorganEncoder::new(FingerprintParams { radius: 0, size: FINGERPRINT_SIZE });
        // Ethanol has three distinct atom environments at radius 0.
        let fingerprint = encoder.encode("CCO");
        assert!(fingerprint.count_ones() <= 3);
        assert!(fingerprint.count_ones() >= 1);
        // Bits only grow with the radius.
        let wider = encode("CCO");
        for i in 0..FINGERPRINT_SIZE {
            if fingerprint.get(i) == Some(1) {
                assert_eq!(wider.get(i), Some(1));
            }
        }
    }

    #[test]
    fn test_custom_size() {
        let encoder = MorganEncoder::new(FingerprintParams { radius: 2, size: 64 });
        assert_eq!(encoder.encode("CCN(CC)CC").len(), 64);
        assert_eq!(encoder.encode("???").len(), 64);
    }

    #[test]
    fn test_ring_bonds() {
        let molecule = parse_smiles("CC1CC1").unwrap();
        let rings = ring_bonds(&molecule);
        assert_eq!(rings.iter().filter(|&&r| r).count(), 3);
        assert!(!rings[0]);
    }

    #[test]
    fn test_duplicate_environments_dropped() {
        // Ethane: both carbons see the same single bond at radius 1,
        // so only one radius-1 environment survives.
        let molecule = parse_smiles("CC").unwrap();
        let identifiers = morgan_identifiers(&molecule, 2);
        assert_eq!(identifiers.len(), 3);
    }
}
