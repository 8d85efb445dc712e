use petgraph::graph::UnGraph;

mod element;
pub use element::*;

mod parse;
pub use parse::*;

mod fingerprint;
pub use fingerprint::*;

mod features;
pub use features::*;

mod model;
pub use model::*;

mod table;
pub use table::*;

mod batch;
pub use batch::*;

mod session;
pub use session::*;

mod report;
pub use report::*;

mod config;
pub use config::*;

/// One atom of a parsed molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom {
    pub element: Element,
    pub aromatic: bool,
    pub charge: i8,
    /// Mass number, `0` when none was written.
    pub isotope: u16,
    /// Total attached hydrogens (explicit bracket count or implicit from valence).
    pub hydrogens: u8,
    /// Whether the atom was written in brackets; bracket atoms never get implicit hydrogens.
    pub bracket: bool,
}

impl Atom {
    pub fn organic(element: Element, aromatic: bool) -> Self {
        Self {
            element,
            aromatic,
            charge: 0,
            isotope: 0,
            hydrogens: 0,
            bracket: false,
        }
    }

    pub fn is_aromatic(&self) -> bool {
        self.aromatic
    }

    pub fn atomic_number(&self) -> u8 {
        self.element.atomic_number()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bond {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl Bond {
    /// Valence units the bond consumes on each end. Aromatic bonds count as one;
    /// the extra delocalised unit is added per atom.
    pub fn valence(&self) -> u8 {
        match self {
            Bond::Single | Bond::Aromatic => 1,
            Bond::Double => 2,
            Bond::Triple => 3,
        }
    }

    /// Stable small code used when hashing atom environments.
    pub fn code(&self) -> u32 {
        match self {
            Bond::Single => 1,
            Bond::Double => 2,
            Bond::Triple => 3,
            Bond::Aromatic => 12,
        }
    }
}

pub type MoleculeGraph = UnGraph<Atom, Bond>;

/// Install the global `tracing` subscriber. Safe to call more than once.
pub fn init_logging(level: &str) {
    let level = level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}
