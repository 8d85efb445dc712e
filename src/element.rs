use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

const SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

lazy_static! {
    static ref BY_SYMBOL: HashMap<&'static str, Element> = SYMBOLS
        .iter()
        .enumerate()
        .map(|(i, symbol)| (*symbol, Element(i as u8 + 1)))
        .collect();
}

/// A chemical element, stored as its atomic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u8);

impl Element {
    pub const H: Element = Element(1);
    pub const B: Element = Element(5);
    pub const C: Element = Element(6);
    pub const N: Element = Element(7);
    pub const O: Element = Element(8);
    pub const F: Element = Element(9);
    pub const P: Element = Element(15);
    pub const S: Element = Element(16);
    pub const CL: Element = Element(17);
    pub const BR: Element = Element(35);
    pub const I: Element = Element(53);

    /// Look up an element by its capitalised symbol (`"Cl"`, not `"cl"`).
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        BY_SYMBOL.get(symbol).copied()
    }

    /// Elements that may be written without brackets in SMILES.
    pub fn from_organic_subset(symbol: &str) -> Option<Self> {
        match symbol {
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            "N" => Some(Self::N),
            "O" => Some(Self::O),
            "P" => Some(Self::P),
            "S" => Some(Self::S),
            "F" => Some(Self::F),
            "Cl" => Some(Self::CL),
            "Br" => Some(Self::BR),
            "I" => Some(Self::I),
            _ => None,
        }
    }

    /// Aromatic (lowercase) symbols allowed outside brackets.
    pub fn from_aromatic_subset(symbol: &str) -> Option<Self> {
        match symbol {
            "b" => Some(Self::B),
            "c" => Some(Self::C),
            "n" => Some(Self::N),
            "o" => Some(Self::O),
            "p" => Some(Self::P),
            "s" => Some(Self::S),
            _ => None,
        }
    }

    pub fn atomic_number(&self) -> u8 {
        self.0
    }

    pub fn symbol(&self) -> &'static str {
        SYMBOLS[self.0 as usize - 1]
    }

    /// Allowed valences for implicit hydrogen assignment, lowest first.
    /// Empty for elements outside the organic subset.
    pub fn default_valences(&self) -> &'static [u8] {
        match self.0 {
            5 => &[3],
            6 => &[4],
            7 => &[3, 5],
            8 => &[2],
            15 => &[3, 5],
            16 => &[2, 4, 6],
            9 | 17 | 35 | 53 => &[1],
            _ => &[],
        }
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.symbol())
    }
}
