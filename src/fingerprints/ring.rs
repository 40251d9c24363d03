//! Ring-system features.
//!
//! Each perceived ring contributes its size, aromaticity, heteroatom count
//! and element composition. Rings sharing atoms contribute a fusion feature,
//! and every connected ring system contributes its overall shape.

use super::hash_sequence;
use super::molecule::{BondOrder, Molecule};

const RING: u64 = 1;
const RING_ELEMENTS: u64 = 2;
const FUSION: u64 = 3;
const SYSTEM: u64 = 4;

fn ring_is_aromatic(molecule: &Molecule, ring: &[usize]) -> bool {
    ring.iter().enumerate().all(|(i, &atom)| {
        let next = ring[(i + 1) % ring.len()];
        molecule
            .bond_between(atom, next)
            .is_some_and(|bond| molecule.bonds()[bond].order == BondOrder::Aromatic)
    })
}

fn shared_atoms(a: &[usize], b: &[usize]) -> usize {
    a.iter().filter(|atom| b.contains(atom)).count()
}

/// Index of the ring system each ring belongs to.
fn ring_systems(rings: &[Vec<usize>]) -> Vec<usize> {
    let mut system: Vec<usize> = (0..rings.len()).collect();
    fn root(system: &mut [usize], mut i: usize) -> usize {
        while system[i] != i {
            system[i] = system[system[i]];
            i = system[i];
        }
        i
    }
    for i in 0..rings.len() {
        for j in i + 1..rings.len() {
            if shared_atoms(&rings[i], &rings[j]) > 0 {
                let (a, b) = (root(&mut system, i), root(&mut system, j));
                system[a.max(b)] = a.min(b);
            }
        }
    }
    (0..rings.len()).map(|i| root(&mut system, i)).collect()
}

pub fn ring_features(molecule: &Molecule) -> Vec<u64> {
    let rings = molecule.rings();
    let aromatic: Vec<bool> = rings.iter().map(|r| ring_is_aromatic(molecule, r)).collect();
    let mut features = Vec::new();

    for (ring, &is_aromatic) in rings.iter().zip(&aromatic) {
        let mut elements: Vec<u64> = ring
            .iter()
            .map(|&atom| u64::from(molecule.atoms()[atom].atomic_number))
            .collect();
        elements.sort_unstable();
        let heteroatoms = elements.iter().filter(|&&z| z != 6).count() as u64;
        features.push(hash_sequence([
            RING,
            ring.len() as u64,
            u64::from(is_aromatic),
            heteroatoms,
        ]));
        features.push(hash_sequence(
            [RING_ELEMENTS, ring.len() as u64].into_iter().chain(elements),
        ));
    }

    for i in 0..rings.len() {
        for j in i + 1..rings.len() {
            let shared = shared_atoms(&rings[i], &rings[j]);
            if shared > 0 {
                let (small, large) = if rings[i].len() <= rings[j].len() {
                    (rings[i].len(), rings[j].len())
                } else {
                    (rings[j].len(), rings[i].len())
                };
                features.push(hash_sequence([
                    FUSION,
                    small as u64,
                    large as u64,
                    shared.min(3) as u64,
                    u64::from(aromatic[i] && aromatic[j]),
                ]));
            }
        }
    }

    let systems = ring_systems(rings);
    let mut roots: Vec<usize> = systems.clone();
    roots.sort_unstable();
    roots.dedup();
    for root in roots {
        let members: Vec<usize> = (0..rings.len()).filter(|&i| systems[i] == root).collect();
        let mut atoms: Vec<usize> = members.iter().flat_map(|&i| rings[i].iter().copied()).collect();
        atoms.sort_unstable();
        atoms.dedup();
        let aromatic_rings = members.iter().filter(|&&i| aromatic[i]).count();
        features.push(hash_sequence([
            SYSTEM,
            members.len() as u64,
            atoms.len() as u64,
            aromatic_rings as u64,
        ]));
    }
    features
}
