mod smiles;
pub use smiles::*;

mod bracket;
