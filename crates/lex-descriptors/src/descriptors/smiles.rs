//! SMILES parsing into a molecular graph.
//!
//! Supports the organic subset, bracket atoms (isotope, chirality, hydrogen
//! count, charge, atom class), aromatic atoms, explicit bonds, branches,
//! ring closures (`1`-`9` and `%nn`) and disconnected fragments (`.`).
//! Stereo markers are accepted and ignored. Implicit hydrogens follow the
//! default valences of the organic subset.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

/// SMILES token pattern. Alternation is leftmost-first, so two-letter
/// halogens win over `B`/`C`. The trailing `(?s:.)` catches anything else,
/// line breaks included, so that every character ends up in some token.
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[[^\]]*\]|Br|Cl|[BCNOPSFI]|[bcnops]|%[0-9]{2}|[0-9]|[()=#\-:/\\.]|(?s:.)")
        .expect("SMILES token pattern is valid")
});

/// Bracket atom contents: isotope, symbol, chirality, hydrogens, charge, class.
static BRACKET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<isotope>\d+)?(?P<symbol>[A-Z][a-z]?|se|as|te|[bcnops])(?P<chiral>@@?|@[A-Z]{2}\d*)?(?P<hcount>H\d*)?(?P<charge>[+-]+\d*)?(?P<class>:\d+)?$",
    )
    .expect("bracket atom pattern is valid")
});

/// Errors produced while parsing a SMILES string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmilesError {
    #[error("empty SMILES string")]
    Empty,

    #[error("unexpected '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },

    #[error("unknown element '{0}'")]
    UnknownElement(String),

    #[error("malformed bracket atom '{0}'")]
    MalformedBracket(String),

    #[error("unbalanced parentheses")]
    UnbalancedBranch,

    #[error("bond at position {0} is not between two atoms")]
    DanglingBond(usize),

    #[error("ring closure {0} is never closed")]
    UnclosedRing(u32),

    #[error("ring closure {0} bonds an atom to itself or duplicates a bond")]
    InvalidRingBond(u32),
}

/// Static element data.
#[derive(Debug, PartialEq)]
pub struct Element {
    pub symbol: &'static str,
    pub atomic_number: u8,
    /// Standard atomic weight
    pub mass: f64,
    pub valence_electrons: u8,
    /// Allowed valences for implicit hydrogen assignment, ascending
    pub default_valences: &'static [u8],
}

macro_rules! element {
    ($sym:expr, $z:expr, $mass:expr, $ve:expr, $val:expr) => {
        Element {
            symbol: $sym,
            atomic_number: $z,
            mass: $mass,
            valence_electrons: $ve,
            default_valences: $val,
        }
    };
}

static ELEMENTS: &[Element] = &[
    element!("H", 1, 1.008, 1, &[1]),
    element!("Li", 3, 6.94, 1, &[]),
    element!("B", 5, 10.81, 3, &[3]),
    element!("C", 6, 12.011, 4, &[4]),
    element!("N", 7, 14.007, 5, &[3, 5]),
    element!("O", 8, 15.999, 6, &[2]),
    element!("F", 9, 18.998, 7, &[1]),
    element!("Na", 11, 22.990, 1, &[]),
    element!("Mg", 12, 24.305, 2, &[]),
    element!("Al", 13, 26.982, 3, &[]),
    element!("Si", 14, 28.085, 4, &[4]),
    element!("P", 15, 30.974, 5, &[3, 5]),
    element!("S", 16, 32.06, 6, &[2, 4, 6]),
    element!("Cl", 17, 35.45, 7, &[1]),
    element!("K", 19, 39.098, 1, &[]),
    element!("Ca", 20, 40.078, 2, &[]),
    element!("Ti", 22, 47.867, 4, &[]),
    element!("Cr", 24, 51.996, 6, &[]),
    element!("Mn", 25, 54.938, 7, &[]),
    element!("Fe", 26, 55.845, 8, &[]),
    element!("Co", 27, 58.933, 9, &[]),
    element!("Ni", 28, 58.693, 10, &[]),
    element!("Cu", 29, 63.546, 11, &[]),
    element!("Zn", 30, 65.38, 12, &[]),
    element!("Ge", 32, 72.630, 4, &[4]),
    element!("As", 33, 74.922, 5, &[3, 5]),
    element!("Se", 34, 78.971, 6, &[2]),
    element!("Br", 35, 79.904, 7, &[1]),
    element!("Rb", 37, 85.468, 1, &[]),
    element!("Sr", 38, 87.62, 2, &[]),
    element!("Ag", 47, 107.868, 11, &[]),
    element!("Sn", 50, 118.710, 4, &[]),
    element!("Te", 52, 127.60, 6, &[2]),
    element!("I", 53, 126.904, 7, &[1]),
    element!("Cs", 55, 132.905, 1, &[]),
    element!("Ba", 56, 137.327, 2, &[]),
    element!("Pt", 78, 195.084, 10, &[]),
    element!("Au", 79, 196.967, 11, &[]),
    element!("Hg", 80, 200.592, 12, &[]),
];

/// Look up an element by its capitalized symbol.
pub fn element_by_symbol(symbol: &str) -> Option<&'static Element> {
    ELEMENTS.iter().find(|e| e.symbol == symbol)
}

/// Bond multiplicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Contribution to an atom's valence; aromatic bonds count as one and
    /// the extra pi electron is accounted for per atom.
    fn valence(&self) -> u32 {
        match self {
            Self::Single | Self::Aromatic => 1,
            Self::Double => 2,
            Self::Triple => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Atom {
    pub element: &'static Element,
    pub aromatic: bool,
    pub charge: i8,
    pub isotope: Option<u16>,
    /// Attached hydrogens not present as graph atoms
    pub hydrogens: u8,
    bracket: bool,
}

impl Atom {
    pub fn atomic_number(&self) -> u8 {
        self.element.atomic_number
    }

    pub fn is_hydrogen(&self) -> bool {
        self.element.atomic_number == 1
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Bond {
    pub atom1: usize,
    pub atom2: usize,
    pub order: BondOrder,
}

/// Atoms, bonds and adjacency of a parsed molecule.
#[derive(Debug, Clone, Default)]
pub struct MolecularGraph {
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
    /// `(neighbor, bond index)` per atom
    pub adjacency: Vec<Vec<(usize, usize)>>,
}

impl MolecularGraph {
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    /// Hydrogens on an atom, implicit and explicit graph hydrogens together.
    pub fn total_hydrogens(&self, idx: usize) -> usize {
        let explicit = self.adjacency[idx]
            .iter()
            .filter(|&&(n, _)| self.atoms[n].is_hydrogen())
            .count();
        self.atoms[idx].hydrogens as usize + explicit
    }

    /// Bond orders of all bonds on an atom.
    pub fn bond_orders(&self, idx: usize) -> impl Iterator<Item = BondOrder> + '_ {
        self.adjacency[idx].iter().map(|&(_, b)| self.bonds[b].order)
    }

    fn has_bond(&self, a: usize, b: usize) -> bool {
        self.adjacency[a].iter().any(|&(n, _)| n == b)
    }

    fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    fn add_bond(&mut self, atom1: usize, atom2: usize, order: BondOrder) {
        let idx = self.bonds.len();
        self.bonds.push(Bond {
            atom1,
            atom2,
            order,
        });
        self.adjacency[atom1].push((atom2, idx));
        self.adjacency[atom2].push((atom1, idx));
    }

    fn default_order(&self, a: usize, b: usize) -> BondOrder {
        if self.atoms[a].aromatic && self.atoms[b].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    /// Fill in implicit hydrogens for organic-subset atoms.
    fn assign_implicit_hydrogens(&mut self) {
        for idx in 0..self.atoms.len() {
            if self.atoms[idx].bracket {
                continue;
            }
            let bond_sum: u32 = self.bond_orders(idx).map(|o| o.valence()).sum();
            let atom = &self.atoms[idx];
            let valences = atom.element.default_valences;

            let mut used = bond_sum;
            if atom.aromatic && valences.first().is_some_and(|&v| bond_sum + 1 <= v as u32) {
                used += 1;
            }

            let hydrogens = valences
                .iter()
                .map(|&v| v as u32)
                .find(|&v| v >= used)
                .map(|v| v - used)
                .unwrap_or(0);
            self.atoms[idx].hydrogens = hydrogens as u8;
        }
    }
}

/// Parse a SMILES string into a [`MolecularGraph`].
pub fn parse_smiles(smiles: &str) -> Result<MolecularGraph, SmilesError> {
    let smiles = smiles.trim();
    if smiles.is_empty() {
        return Err(SmilesError::Empty);
    }

    let mut graph = MolecularGraph::default();
    let mut previous: Option<usize> = None;
    let mut pending_bond: Option<(BondOrder, usize)> = None;
    let mut branches: Vec<usize> = Vec::new();
    let mut open_rings: HashMap<u32, (usize, Option<BondOrder>)> = HashMap::new();

    for token in TOKEN_PATTERN.find_iter(smiles) {
        let text = token.as_str();
        let position = token.start();

        match text {
            "(" => {
                let atom = previous.ok_or(SmilesError::UnbalancedBranch)?;
                branches.push(atom);
            }
            ")" => {
                if pending_bond.is_some() {
                    return Err(SmilesError::DanglingBond(position));
                }
                previous = Some(branches.pop().ok_or(SmilesError::UnbalancedBranch)?);
            }
            "-" | "=" | "#" | ":" | "/" | "\\" => {
                if previous.is_none() || pending_bond.is_some() {
                    return Err(SmilesError::DanglingBond(position));
                }
                let order = match text {
                    "=" => BondOrder::Double,
                    "#" => BondOrder::Triple,
                    ":" => BondOrder::Aromatic,
                    _ => BondOrder::Single,
                };
                pending_bond = Some((order, position));
            }
            "." => {
                if let Some((_, bond_position)) = pending_bond {
                    return Err(SmilesError::DanglingBond(bond_position));
                }
                previous = None;
            }
            _ if text.starts_with('%') || text.as_bytes()[0].is_ascii_digit() => {
                let atom = previous.ok_or_else(|| SmilesError::UnexpectedToken {
                    token: text.to_string(),
                    position,
                })?;
                let label: u32 = text.trim_start_matches('%').parse().map_err(|_| {
                    SmilesError::UnexpectedToken {
                        token: text.to_string(),
                        position,
                    }
                })?;
                let bond = pending_bond.take().map(|(order, _)| order);

                match open_rings.remove(&label) {
                    Some((opener, opener_bond)) => {
                        if opener == atom || graph.has_bond(opener, atom) {
                            return Err(SmilesError::InvalidRingBond(label));
                        }
                        let order = bond
                            .or(opener_bond)
                            .unwrap_or_else(|| graph.default_order(opener, atom));
                        graph.add_bond(opener, atom, order);
                    }
                    None => {
                        open_rings.insert(label, (atom, bond));
                    }
                }
            }
            _ => {
                let atom = parse_atom(text, position)?;
                let idx = graph.add_atom(atom);
                if let Some(prev) = previous {
                    let order = pending_bond
                        .take()
                        .map(|(order, _)| order)
                        .unwrap_or_else(|| graph.default_order(prev, idx));
                    graph.add_bond(prev, idx, order);
                }
                previous = Some(idx);
            }
        }
    }

    if let Some((_, position)) = pending_bond {
        return Err(SmilesError::DanglingBond(position));
    }
    if !branches.is_empty() {
        return Err(SmilesError::UnbalancedBranch);
    }
    if let Some(&label) = open_rings.keys().min() {
        return Err(SmilesError::UnclosedRing(label));
    }

    graph.assign_implicit_hydrogens();
    Ok(graph)
}

/// Parse an organic-subset or bracket atom token.
fn parse_atom(token: &str, position: usize) -> Result<Atom, SmilesError> {
    if let Some(inner) = token
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return parse_bracket_atom(inner);
    }

    let aromatic = token.chars().all(|c| c.is_ascii_lowercase());
    let element = organic_element(token).ok_or_else(|| SmilesError::UnexpectedToken {
        token: token.to_string(),
        position,
    })?;

    Ok(Atom {
        element,
        aromatic,
        charge: 0,
        isotope: None,
        hydrogens: 0,
        bracket: false,
    })
}

fn organic_element(token: &str) -> Option<&'static Element> {
    let symbol = match token {
        "B" | "C" | "N" | "O" | "P" | "S" | "F" | "I" | "Br" | "Cl" => token,
        "b" => "B",
        "c" => "C",
        "n" => "N",
        "o" => "O",
        "p" => "P",
        "s" => "S",
        _ => return None,
    };
    element_by_symbol(symbol)
}

fn parse_bracket_atom(inner: &str) -> Result<Atom, SmilesError> {
    let caps = BRACKET_PATTERN
        .captures(inner)
        .ok_or_else(|| SmilesError::MalformedBracket(inner.to_string()))?;

    let raw_symbol = &caps["symbol"];
    let aromatic = raw_symbol.chars().all(|c| c.is_ascii_lowercase());
    let symbol = capitalize(raw_symbol);
    let element =
        element_by_symbol(&symbol).ok_or_else(|| SmilesError::UnknownElement(symbol.clone()))?;

    let isotope = caps
        .name("isotope")
        .map(|m| m.as_str().parse::<u16>())
        .transpose()
        .map_err(|_| SmilesError::MalformedBracket(inner.to_string()))?;

    let hydrogens = match caps.name("hcount").map(|m| &m.as_str()[1..]) {
        None => 0,
        Some("") => 1,
        Some(digits) => digits
            .parse::<u8>()
            .map_err(|_| SmilesError::MalformedBracket(inner.to_string()))?,
    };

    let charge = match caps.name("charge").map(|m| m.as_str()) {
        None => 0,
        Some(text) => parse_charge(text).ok_or_else(|| SmilesError::MalformedBracket(inner.to_string()))?,
    };

    Ok(Atom {
        element,
        aromatic,
        charge,
        isotope,
        hydrogens,
        bracket: true,
    })
}

/// `+`, `++`, `+2`, `-`, `--`, `-3`.
fn parse_charge(text: &str) -> Option<i8> {
    let signs: String = text.chars().take_while(|c| *c == '+' || *c == '-').collect();
    let digits = &text[signs.len()..];
    let negative = signs.starts_with('-');
    if signs.chars().any(|c| c != signs.chars().next().unwrap_or('+')) {
        return None;
    }

    let magnitude: i8 = if digits.is_empty() {
        i8::try_from(signs.len()).ok()?
    } else {
        if signs.len() != 1 {
            return None;
        }
        digits.parse().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn capitalize(symbol: &str) -> String {
    let mut chars = symbol.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
