//! Molecular graph with perceived rings.

use std::collections::{BTreeSet, VecDeque};

/// Element symbols indexed by `atomic_number - 1`.
pub const ELEMENTS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm",
    "Bk", "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn",
    "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Atomic number of an element symbol (`"*"` is 0).
pub fn atomic_number(symbol: &str) -> Option<u8> {
    if symbol == "*" {
        return Some(0);
    }
    ELEMENTS
        .iter()
        .position(|&e| e == symbol)
        .map(|i| (i + 1) as u8)
}

/// Normal valences used to derive implicit hydrogens of unbracketed atoms.
fn default_valences(atomic_number: u8) -> &'static [u8] {
    match atomic_number {
        5 => &[3],
        6 => &[4],
        7 | 15 => &[3, 5],
        8 => &[2],
        16 => &[2, 4, 6],
        9 | 17 | 35 | 53 => &[1],
        _ => &[],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl BondOrder {
    /// Stable numeric code used in fingerprint hashes.
    pub fn code(self) -> u64 {
        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Quadruple => 4,
            BondOrder::Aromatic => 12,
        }
    }

    fn valence(self) -> u8 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Quadruple => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub atomic_number: u8,
    pub aromatic: bool,
    pub charge: i8,
    /// Mass number, 0 when unspecified.
    pub isotope: u16,
    /// Explicit (bracket) or implicit hydrogen count.
    pub hydrogens: u8,
    /// Written in brackets; bracket atoms carry their hydrogens explicitly.
    pub bracket: bool,
}

impl Atom {
    pub fn organic(atomic_number: u8, aromatic: bool) -> Self {
        Self {
            atomic_number,
            aromatic,
            charge: 0,
            isotope: 0,
            hydrogens: 0,
            bracket: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bond {
    pub begin: usize,
    pub end: usize,
    pub order: BondOrder,
}

#[derive(Debug, Clone)]
pub struct Molecule {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    /// `(neighbor, bond index)` per atom.
    neighbors: Vec<Vec<(usize, usize)>>,
    /// Size of the smallest ring through each bond.
    bond_ring_size: Vec<Option<usize>>,
    /// Distinct smallest rings, as atom cycles.
    rings: Vec<Vec<usize>>,
}

impl Molecule {
    pub fn new(mut atoms: Vec<Atom>, bonds: Vec<Bond>) -> Self {
        let mut neighbors = vec![Vec::new(); atoms.len()];
        for (index, bond) in bonds.iter().enumerate() {
            neighbors[bond.begin].push((bond.end, index));
            neighbors[bond.end].push((bond.begin, index));
        }

        for (index, atom) in atoms.iter_mut().enumerate() {
            if atom.bracket {
                continue;
            }
            let bonded: u8 = neighbors[index]
                .iter()
                .map(|&(_, b)| bonds[b].order.valence())
                .sum();
            atom.hydrogens = implicit_hydrogens(atom, bonded);
        }

        let mut molecule = Self {
            atoms,
            bonds,
            neighbors,
            bond_ring_size: Vec::new(),
            rings: Vec::new(),
        };
        molecule.perceive_rings();
        molecule
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn neighbors(&self, atom: usize) -> &[(usize, usize)] {
        &self.neighbors[atom]
    }

    pub fn degree(&self, atom: usize) -> usize {
        self.neighbors[atom].len()
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<usize> {
        self.neighbors[a]
            .iter()
            .find(|&&(neighbor, _)| neighbor == b)
            .map(|&(_, bond)| bond)
    }

    pub fn bond_ring_size(&self, bond: usize) -> Option<usize> {
        self.bond_ring_size[bond]
    }

    pub fn bond_in_ring(&self, bond: usize) -> bool {
        self.bond_ring_size[bond].is_some()
    }

    pub fn atom_in_ring(&self, atom: usize) -> bool {
        self.neighbors[atom]
            .iter()
            .any(|&(_, bond)| self.bond_in_ring(bond))
    }

    pub fn rings(&self) -> &[Vec<usize>] {
        &self.rings
    }

    /// For every bond, the shortest path between its ends that avoids the
    /// bond itself closes its smallest ring.
    fn perceive_rings(&mut self) {
        let mut seen = BTreeSet::new();
        self.bond_ring_size = vec![None; self.bonds.len()];
        for index in 0..self.bonds.len() {
            let Bond { begin, end, .. } = self.bonds[index];
            if let Some(path) = self.shortest_path_avoiding(begin, end, index) {
                self.bond_ring_size[index] = Some(path.len());
                let mut key = path.clone();
                key.sort_unstable();
                if seen.insert(key) {
                    self.rings.push(path);
                }
            }
        }
    }

    /// Atoms on a shortest `from -> to` path not using bond `skip`.
    fn shortest_path_avoiding(&self, from: usize, to: usize, skip: usize) -> Option<Vec<usize>> {
        let mut parent = vec![usize::MAX; self.atoms.len()];
        parent[from] = from;
        let mut queue = VecDeque::from([from]);
        while let Some(atom) = queue.pop_front() {
            if atom == to {
                let mut path = vec![to];
                let mut current = to;
                while current != from {
                    current = parent[current];
                    path.push(current);
                }
                path.reverse();
                return Some(path);
            }
            for &(next, bond) in &self.neighbors[atom] {
                if bond != skip && parent[next] == usize::MAX {
                    parent[next] = atom;
                    queue.push_back(next);
                }
            }
        }
        None
    }
}

fn implicit_hydrogens(atom: &Atom, bonded: u8) -> u8 {
    let valences = default_valences(atom.atomic_number);
    if atom.aromatic {
        // One valence goes to the delocalized system.
        return valences
            .first()
            .map_or(0, |&v| v.saturating_sub(bonded.saturating_add(1)));
    }
    valences
        .iter()
        .find(|&&v| v >= bonded)
        .map_or(0, |&v| v - bonded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: usize, ring: bool) -> Molecule {
        let atoms = vec![Atom::organic(6, false); n];
        let mut bonds: Vec<Bond> = (1..n)
            .map(|i| Bond {
                begin: i - 1,
                end: i,
                order: BondOrder::Single,
            })
            .collect();
        if ring {
            bonds.push(Bond {
                begin: n - 1,
                end: 0,
                order: BondOrder::Single,
            });
        }
        Molecule::new(atoms, bonds)
    }

    #[test]
    fn element_lookup() {
        assert_eq!(atomic_number("C"), Some(6));
        assert_eq!(atomic_number("Cl"), Some(17));
        assert_eq!(atomic_number("U"), Some(92));
        assert_eq!(atomic_number("Og"), Some(118));
        assert_eq!(atomic_number("Xx"), None);
    }

    #[test]
    fn implicit_hydrogens_of_alkanes() {
        let propane = chain(3, false);
        let hs: Vec<u8> = propane.atoms().iter().map(|a| a.hydrogens).collect();
        assert_eq!(hs, vec![3, 2, 3]);
    }

    #[test]
    fn cyclohexane_ring() {
        let mol = chain(6, true);
        assert_eq!(mol.rings().len(), 1);
        assert_eq!(mol.rings()[0].len(), 6);
        assert!((0..6).all(|b| mol.bond_ring_size(b) == Some(6)));
        assert!(mol.atoms().iter().all(|a| a.hydrogens == 2));
    }

    #[test]
    fn acyclic_bonds_have_no_ring() {
        let mol = chain(4, false);
        assert!(mol.rings().is_empty());
        assert!(!mol.atom_in_ring(0));
    }
}
