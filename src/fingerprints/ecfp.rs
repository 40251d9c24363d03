//! Extended-connectivity (Morgan) features.

use super::molecule::Molecule;
use super::{hash_combine, hash_sequence};

/// Radius of the circular environments.
pub const ECFP_RADIUS: usize = 2;

/// Atom invariant: element, heavy degree, hydrogens, charge, isotope, ring
/// membership and aromaticity.
fn initial_invariant(molecule: &Molecule, atom: usize) -> u64 {
    let a = &molecule.atoms()[atom];
    hash_sequence([
        u64::from(a.atomic_number),
        molecule.degree(atom) as u64,
        u64::from(a.hydrogens),
        i64::from(a.charge) as u64,
        u64::from(a.isotope),
        u64::from(molecule.atom_in_ring(atom)),
        u64::from(a.aromatic),
    ])
}

/// Identifiers of every atom environment of radius `0..=radius`.
pub fn ecfp_features(molecule: &Molecule, radius: usize) -> Vec<u64> {
    let n_atoms = molecule.atoms().len();
    let mut identifiers: Vec<u64> = (0..n_atoms)
        .map(|atom| initial_invariant(molecule, atom))
        .collect();
    let mut features = identifiers.clone();

    for iteration in 1..=radius {
        let next: Vec<u64> = (0..n_atoms)
            .map(|atom| {
                let mut environment: Vec<(u64, u64)> = molecule
                    .neighbors(atom)
                    .iter()
                    .map(|&(neighbor, bond)| {
                        (molecule.bonds()[bond].order.code(), identifiers[neighbor])
                    })
                    .collect();
                environment.sort_unstable();
                environment.into_iter().fold(
                    hash_combine(iteration as u64, identifiers[atom]),
                    |seed, (order, id)| hash_combine(hash_combine(seed, order), id),
                )
            })
            .collect();
        features.extend_from_slice(&next);
        identifiers = next;
    }
    features
}
