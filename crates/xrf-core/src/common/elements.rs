//! Periodic-table lookup helpers.
//!
//! Elements are addressed by atomic number; the symbol table covers H through Cf,
//! which spans every element with XRF lines reachable by laboratory sources.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};

pub const MAX_ATOMIC_NUMBER: u8 = 98;

const ELEMENT_SYMBOLS: [&str; MAX_ATOMIC_NUMBER as usize] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf",
];

/// A chemical element, ordered by atomic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u8);

impl Element {
    pub const fn from_atomic_number(atomic_number: u8) -> Option<Self> {
        if atomic_number == 0 || atomic_number > MAX_ATOMIC_NUMBER {
            None
        } else {
            Some(Self(atomic_number))
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let normalized = symbol.trim();
        if normalized.is_empty() {
            return None;
        }

        ELEMENT_SYMBOLS
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(normalized))
            .map(|index| Self(index as u8 + 1))
    }

    pub const fn atomic_number(self) -> u8 {
        self.0
    }

    pub const fn symbol(self) -> &'static str {
        ELEMENT_SYMBOLS[self.0 as usize - 1]
    }

    /// Every element strictly between `self` and `other`, in ascending order.
    pub fn between(self, other: Self) -> impl Iterator<Item = Element> {
        let (low, high) = if self <= other {
            (self.0, other.0)
        } else {
            (other.0, self.0)
        };
        ((low + 1)..high).map(Element)
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let symbol = String::deserialize(deserializer)?;
        Element::from_symbol(&symbol)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown element symbol '{symbol}'")))
    }
}
