//! Linear-path features: the `Path` fingerprint and the `Layered`
//! fingerprint.
//!
//! Paths are simple (no repeated atom) and run over 1 to [`MAX_PATH_BONDS`]
//! bonds. A path is hashed over its interleaved atom and bond tokens in the
//! lexicographically smaller of its two directions, so it hashes the same
//! from either end.

use super::molecule::{BondOrder, Molecule};
use super::{hash_combine, hash_sequence};

pub const MAX_PATH_BONDS: usize = 7;

/// Salt deriving the second bit of a path.
const SECOND_BIT: u64 = 0x5bd1_e995;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearPath {
    pub atoms: Vec<usize>,
    pub bonds: Vec<usize>,
}

/// Every simple path with `1..=max_bonds` bonds, each reported once.
pub fn linear_paths(molecule: &Molecule, max_bonds: usize) -> Vec<LinearPath> {
    fn extend(
        molecule: &Molecule,
        max_bonds: usize,
        current: &mut LinearPath,
        paths: &mut Vec<LinearPath>,
    ) {
        let (Some(&first), Some(&last)) = (current.atoms.first(), current.atoms.last()) else {
            return;
        };
        if !current.bonds.is_empty() && first < last {
            paths.push(current.clone());
        }
        if current.bonds.len() == max_bonds {
            return;
        }
        for &(next, bond) in molecule.neighbors(last) {
            if current.atoms.contains(&next) {
                continue;
            }
            current.atoms.push(next);
            current.bonds.push(bond);
            extend(molecule, max_bonds, current, paths);
            current.atoms.pop();
            current.bonds.pop();
        }
    }

    let mut paths = Vec::new();
    for start in 0..molecule.atoms().len() {
        let mut current = LinearPath {
            atoms: vec![start],
            bonds: Vec::new(),
        };
        extend(molecule, max_bonds, &mut current, &mut paths);
    }
    paths
}

/// Hash of `path` under the given tokenization, independent of direction.
fn oriented_hash(
    path: &LinearPath,
    salt: u64,
    atom_token: impl Fn(usize) -> u64,
    bond_token: impl Fn(usize) -> u64,
) -> u64 {
    let mut forward = Vec::with_capacity(path.atoms.len() + path.bonds.len());
    for (i, &atom) in path.atoms.iter().enumerate() {
        if i > 0 {
            forward.push(bond_token(path.bonds[i - 1]));
        }
        forward.push(atom_token(atom));
    }
    let backward: Vec<u64> = forward.iter().rev().copied().collect();
    let tokens = forward.min(backward);
    hash_sequence([salt, path.bonds.len() as u64].into_iter().chain(tokens))
}

fn atom_type(molecule: &Molecule, atom: usize) -> u64 {
    let a = &molecule.atoms()[atom];
    u64::from(a.atomic_number) * 2 + u64::from(a.aromatic)
}

/// Two features per path over element, aromaticity and bond order.
pub fn path_features(molecule: &Molecule) -> Vec<u64> {
    let bonds = molecule.bonds();
    linear_paths(molecule, MAX_PATH_BONDS)
        .iter()
        .flat_map(|path| {
            let h = oriented_hash(
                path,
                0,
                |atom| atom_type(molecule, atom),
                |bond| bonds[bond].order.code(),
            );
            [h, hash_combine(h, SECOND_BIT)]
        })
        .collect()
}

/// Property layers hashed separately for every path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    Topology = 1,
    BondOrder = 2,
    AtomType = 3,
    RingMembership = 4,
    RingSize = 5,
    Aromaticity = 6,
}

const LAYERS: [Layer; 6] = [
    Layer::Topology,
    Layer::BondOrder,
    Layer::AtomType,
    Layer::RingMembership,
    Layer::RingSize,
    Layer::Aromaticity,
];

fn layer_hash(molecule: &Molecule, path: &LinearPath, layer: Layer) -> u64 {
    let bonds = molecule.bonds();
    let atoms = molecule.atoms();
    let salt = 0x100 + layer as u64;
    match layer {
        Layer::Topology => oriented_hash(path, salt, |a| molecule.degree(a) as u64, |_| 0),
        Layer::BondOrder => oriented_hash(path, salt, |_| 0, |b| bonds[b].order.code()),
        Layer::AtomType => oriented_hash(path, salt, |a| atom_type(molecule, a), |_| 0),
        Layer::RingMembership => {
            oriented_hash(path, salt, |_| 0, |b| u64::from(molecule.bond_in_ring(b)))
        }
        Layer::RingSize => oriented_hash(
            path,
            salt,
            |_| 0,
            |b| molecule.bond_ring_size(b).unwrap_or(0) as u64,
        ),
        Layer::Aromaticity => oriented_hash(
            path,
            salt,
            |a| u64::from(atoms[a].aromatic),
            |b| u64::from(bonds[b].order == BondOrder::Aromatic),
        ),
    }
}

/// One feature per path and layer.
pub fn layered_features(molecule: &Molecule) -> Vec<u64> {
    linear_paths(molecule, MAX_PATH_BONDS)
        .iter()
        .flat_map(|path| LAYERS.map(|layer| layer_hash(molecule, path, layer)))
        .collect()
}
