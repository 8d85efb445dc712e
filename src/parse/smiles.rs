use std::collections::BTreeMap;

use petgraph::graph::NodeIndex;
use thiserror::Error;

use super::bracket::parse_bracket_atom;
use crate::{Atom, Bond, Element, MoleculeGraph};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmilesError {
    #[error("Empty SMILES string")]
    EmptyInput,
    #[error("Unknown element '{symbol}' at position {position}")]
    UnknownElement { symbol: String, position: usize },
    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedCharacter(char, usize),
    #[error("Branch start '(' at position {0} without a current atom")]
    BranchNoCurrentAtom(usize),
    #[error("Branch end ')' at position {0} without a matching '('")]
    BranchEndNoStart(usize),
    #[error("Branch opened at position {0} is never closed")]
    UnclosedBranch(usize),
    #[error("Ring closure {0} at position {1} without a current atom")]
    RingClosureNoCurrentAtom(u16, usize),
    #[error("Ring closure {0} is never closed")]
    UnclosedRing(u16),
    #[error("Ring closure {0} at position {1} bonds an atom to itself or duplicates a bond")]
    InvalidRingBond(u16, usize),
    #[error("Unclosed bracket '[' at position {0}")]
    UnclosedBracket(usize),
    #[error("Invalid bracket atom '[{content}]' at position {position}")]
    InvalidBracketAtom { content: String, position: usize },
    #[error("Bond symbol at position {0} is not followed by an atom")]
    DanglingBond(usize),
    #[error("Atom {atom} ({symbol}) has bond order {bonded}, above the allowed valence")]
    InvalidValence {
        atom: usize,
        symbol: String,
        bonded: u32,
    },
}

/// Parses a SMILES string into a MoleculeGraph.
///
/// Supports the organic subset, bracket atoms, branches, ring closures
/// (`0-9` and `%nn`), explicit bonds and dot-disconnected fragments.
/// Stereo markers are accepted and dropped. Implicit hydrogens are
/// assigned to organic-subset atoms once the whole graph is built.
pub fn parse_smiles(smiles: &str) -> Result<MoleculeGraph, SmilesError> {
    let smiles = smiles.trim();
    if smiles.is_empty() {
        return Err(SmilesError::EmptyInput);
    }

    let mut graph = MoleculeGraph::new_undirected();
    let mut current_atom: Option<NodeIndex> = None;
    // Explicit bond waiting for its second atom, with the position it was written at.
    let mut pending_bond: Option<(Bond, usize)> = None;
    let mut branch_stack: Vec<(NodeIndex, usize)> = Vec::new();
    let mut ring_map: BTreeMap<u16, (NodeIndex, Option<Bond>)> = BTreeMap::new();

    let chars: Vec<char> = smiles.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' => {
                let atom = current_atom.ok_or(SmilesError::BranchNoCurrentAtom(i))?;
                branch_stack.push((atom, i));
                i += 1;
            }
            ')' => {
                if let Some((_, position)) = pending_bond {
                    return Err(SmilesError::DanglingBond(position));
                }
                let (atom, _) = branch_stack
                    .pop()
                    .ok_or(SmilesError::BranchEndNoStart(i))?;
                current_atom = Some(atom);
                i += 1;
            }
            '-' | '=' | '#' | ':' | '/' | '\\' => {
                if current_atom.is_none() {
                    return Err(SmilesError::DanglingBond(i));
                }
                let bond = match c {
                    '=' => Bond::Double,
                    '#' => Bond::Triple,
                    ':' => Bond::Aromatic,
                    // Directional bonds only carry stereo information.
                    _ => Bond::Single,
                };
                pending_bond = Some((bond, i));
                i += 1;
            }
            '%' | '0'..='9' => {
                let (ring_number, width) = if c == '%' {
                    let digits: String = chars.iter().skip(i + 1).take(2).collect();
                    if digits.len() != 2 || !digits.chars().all(|d| d.is_ascii_digit()) {
                        return Err(SmilesError::UnexpectedCharacter(c, i));
                    }
                    // Two ASCII digits always fit in a u16.
                    (digits.parse::<u16>().unwrap_or_default(), 3)
                } else {
                    (c.to_digit(10).unwrap_or_default() as u16, 1)
                };
                let current = current_atom
                    .ok_or(SmilesError::RingClosureNoCurrentAtom(ring_number, i))?;
                let written = pending_bond.take().map(|(bond, _)| bond);

                if let Some((start_atom, opening_bond)) = ring_map.remove(&ring_number) {
                    if start_atom == current || graph.find_edge(start_atom, current).is_some() {
                        return Err(SmilesError::InvalidRingBond(ring_number, i));
                    }
                    let bond = written
                        .or(opening_bond)
                        .unwrap_or_else(|| default_bond(&graph, start_atom, current));
                    graph.add_edge(current, start_atom, bond);
                } else {
                    ring_map.insert(ring_number, (current, written));
                }
                i += width;
            }
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|&x| x == ']')
                    .map(|relative| i + relative)
                    .ok_or(SmilesError::UnclosedBracket(i))?;
                let content: String = chars[i + 1..end].iter().collect();
                let atom = parse_bracket_atom(&content).ok_or_else(|| {
                    SmilesError::InvalidBracketAtom {
                        content: content.clone(),
                        position: i,
                    }
                })?;
                let new_atom = graph.add_node(atom);
                connect(&mut graph, current_atom, new_atom, pending_bond.take());
                current_atom = Some(new_atom);
                i = end + 1;
            }
            '.' => {
                if let Some((_, position)) = pending_bond {
                    return Err(SmilesError::DanglingBond(position));
                }
                // The next atom starts a new, disconnected component.
                current_atom = None;
                i += 1;
            }
            _ if c.is_ascii_alphabetic() => {
                let (atom, width) = organic_atom(&chars, i)?;
                let new_atom = graph.add_node(atom);
                connect(&mut graph, current_atom, new_atom, pending_bond.take());
                current_atom = Some(new_atom);
                i += width;
            }
            _ => return Err(SmilesError::UnexpectedCharacter(c, i)),
        }
    }

    if let Some((_, position)) = pending_bond {
        return Err(SmilesError::DanglingBond(position));
    }
    if let Some((_, position)) = branch_stack.pop() {
        return Err(SmilesError::UnclosedBranch(position));
    }
    if let Some((&ring_number, _)) = ring_map.iter().next() {
        return Err(SmilesError::UnclosedRing(ring_number));
    }

    assign_implicit_hydrogens(&mut graph)?;
    Ok(graph)
}

/// Read an organic-subset atom starting at `i`, returning it and the number of characters used.
fn organic_atom(chars: &[char], i: usize) -> Result<(Atom, usize), SmilesError> {
    let c = chars[i];
    // Two-letter symbols first, so "Cl" is chlorine and not carbon followed by "l".
    if let Some(&next) = chars.get(i + 1) {
        if c.is_ascii_uppercase() && next.is_ascii_lowercase() {
            let candidate: String = [c, next].iter().collect();
            if let Some(element) = Element::from_organic_subset(&candidate) {
                return Ok((Atom::organic(element, false), 2));
            }
        }
    }

    let symbol = c.to_string();
    if let Some(element) = Element::from_organic_subset(&symbol) {
        Ok((Atom::organic(element, false), 1))
    } else if let Some(element) = Element::from_aromatic_subset(&symbol) {
        Ok((Atom::organic(element, true), 1))
    } else {
        Err(SmilesError::UnknownElement {
            symbol,
            position: i,
        })
    }
}

/// Implicit bond between two atoms: aromatic when both ends are aromatic.
fn default_bond(graph: &MoleculeGraph, a: NodeIndex, b: NodeIndex) -> Bond {
    if graph[a].is_aromatic() && graph[b].is_aromatic() {
        Bond::Aromatic
    } else {
        Bond::Single
    }
}

fn connect(
    graph: &mut MoleculeGraph,
    previous: Option<NodeIndex>,
    new_atom: NodeIndex,
    written: Option<(Bond, usize)>,
) {
    if let Some(prev_atom) = previous {
        let bond = written
            .map(|(bond, _)| bond)
            .unwrap_or_else(|| default_bond(graph, prev_atom, new_atom));
        graph.add_edge(prev_atom, new_atom, bond);
    }
}

/// Fill in hydrogens for atoms written outside brackets, using the lowest
/// default valence that accommodates the bonds already present. An atom
/// bonded beyond its highest valence makes the molecule invalid; aromatic
/// atoms get one extra unit for the delocalised bond.
fn assign_implicit_hydrogens(graph: &mut MoleculeGraph) -> Result<(), SmilesError> {
    let nodes: Vec<NodeIndex> = graph.node_indices().collect();
    for node in nodes {
        let atom = graph[node];
        if atom.bracket {
            continue;
        }
        let valences = atom.element.default_valences();
        let bonded: u32 = graph
            .edges(node)
            .map(|edge| u32::from(edge.weight().valence()))
            .sum::<u32>()
            + u32::from(atom.aromatic);

        let Some(&highest) = valences.last() else {
            continue;
        };
        if bonded > u32::from(highest) + u32::from(atom.aromatic) {
            return Err(SmilesError::InvalidValence {
                atom: node.index(),
                symbol: atom.element.symbol().to_string(),
                bonded,
            });
        }

        let hydrogens = if atom.aromatic {
            u32::from(valences[0]).saturating_sub(bonded)
        } else {
            valences
                .iter()
                .map(|&valence| u32::from(valence))
                .find(|&valence| valence >= bonded)
                .map_or(0, |valence| valence - bonded)
        };
        // Bounded by the largest default valence.
        graph[node].hydrogens = hydrogens as u8;
    }
    Ok(())
}
