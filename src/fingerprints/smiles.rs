//! SMILES reader.
//!
//! Supports the organic subset, aromatic atoms, bracket atoms (isotope,
//! element, chirality, hydrogen count, charge, atom class), explicit bonds,
//! branches, ring closures (`1`..`9` and `%nn`) and `.` separated components.
//! Stereo marks are read and dropped.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::CharIndices;

use super::molecule::{atomic_number, Atom, Bond, BondOrder, Molecule};
use crate::error::{Error, Result};

/// Parse `smiles` into a molecular graph.
pub fn parse_smiles(smiles: &str) -> Result<Molecule> {
    Parser::new(smiles)
        .parse()
        .map_err(|reason| Error::Smiles {
            smiles: smiles.to_string(),
            reason,
        })
}

type ParseResult<T> = std::result::Result<T, String>;

struct Parser<'a> {
    chars: Peekable<CharIndices<'a>>,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    previous: Option<usize>,
    branches: Vec<Option<usize>>,
    pending_bond: Option<BondOrder>,
    open_rings: BTreeMap<u32, (usize, Option<BondOrder>)>,
}

impl<'a> Parser<'a> {
    fn new(smiles: &'a str) -> Self {
        Self {
            chars: smiles.char_indices().peekable(),
            atoms: Vec::new(),
            bonds: Vec::new(),
            previous: None,
            branches: Vec::new(),
            pending_bond: None,
            open_rings: BTreeMap::new(),
        }
    }

    fn parse(mut self) -> ParseResult<Molecule> {
        while let Some((position, c)) = self.chars.next() {
            match c {
                '(' => {
                    let previous = self
                        .previous
                        .ok_or_else(|| format!("branch without atom at {position}"))?;
                    self.branches.push(Some(previous));
                }
                ')' => {
                    let restored = self
                        .branches
                        .pop()
                        .ok_or_else(|| format!("unbalanced ')' at {position}"))?;
                    self.ensure_no_pending_bond(position)?;
                    self.previous = restored;
                }
                '.' => {
                    self.ensure_no_pending_bond(position)?;
                    self.previous = None;
                }
                '-' | '/' | '\\' => self.set_bond(BondOrder::Single, position)?,
                '=' => self.set_bond(BondOrder::Double, position)?,
                '#' => self.set_bond(BondOrder::Triple, position)?,
                '$' => self.set_bond(BondOrder::Quadruple, position)?,
                ':' => self.set_bond(BondOrder::Aromatic, position)?,
                '0'..='9' => {
                    let label = c.to_digit(10).unwrap_or_default();
                    self.ring_closure(label, position)?;
                }
                '%' => {
                    let label = self.two_digit_label(position)?;
                    self.ring_closure(label, position)?;
                }
                '[' => {
                    let atom = self.bracket_atom(position)?;
                    self.add_atom(atom, position)?;
                }
                _ => {
                    let atom = self.organic_atom(c, position)?;
                    self.add_atom(atom, position)?;
                }
            }
        }

        if !self.branches.is_empty() {
            return Err("unclosed branch".to_string());
        }
        if let Some(label) = self.open_rings.keys().next() {
            return Err(format!("unclosed ring {label}"));
        }
        if self.pending_bond.is_some() {
            return Err("dangling bond at end of input".to_string());
        }
        if self.atoms.is_empty() {
            return Err("no atoms".to_string());
        }
        Ok(Molecule::new(self.atoms, self.bonds))
    }

    fn ensure_no_pending_bond(&self, position: usize) -> ParseResult<()> {
        match self.pending_bond {
            Some(_) => Err(format!("bond without a following atom at {position}")),
            None => Ok(()),
        }
    }

    fn set_bond(&mut self, order: BondOrder, position: usize) -> ParseResult<()> {
        if self.pending_bond.is_some() {
            return Err(format!("two consecutive bonds at {position}"));
        }
        self.pending_bond = Some(order);
        Ok(())
    }

    fn default_order(&self, a: usize, b: usize) -> BondOrder {
        if self.atoms[a].aromatic && self.atoms[b].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn connect(
        &mut self,
        a: usize,
        b: usize,
        order: Option<BondOrder>,
        position: usize,
    ) -> ParseResult<()> {
        if a == b {
            return Err(format!("atom bonded to itself at {position}"));
        }
        let duplicate = self
            .bonds
            .iter()
            .any(|bond| (bond.begin, bond.end) == (a, b) || (bond.begin, bond.end) == (b, a));
        if duplicate {
            return Err(format!("duplicate bond at {position}"));
        }
        let order = order.unwrap_or_else(|| self.default_order(a, b));
        self.bonds.push(Bond {
            begin: a,
            end: b,
            order,
        });
        Ok(())
    }

    fn add_atom(&mut self, atom: Atom, position: usize) -> ParseResult<()> {
        let index = self.atoms.len();
        self.atoms.push(atom);
        let order = self.pending_bond.take();
        match self.previous {
            Some(previous) => self.connect(previous, index, order, position)?,
            None if order.is_some() => {
                return Err(format!("bond without a preceding atom at {position}"))
            }
            None => {}
        }
        self.previous = Some(index);
        Ok(())
    }

    fn ring_closure(&mut self, label: u32, position: usize) -> ParseResult<()> {
        let atom = self
            .previous
            .ok_or_else(|| format!("ring closure without atom at {position}"))?;
        let order = self.pending_bond.take();
        match self.open_rings.remove(&label) {
            Some((opening, opening_order)) => {
                let order = match (opening_order, order) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(format!("conflicting ring bond {label} at {position}"))
                    }
                    (a, b) => a.or(b),
                };
                self.connect(opening, atom, order, position)
            }
            None => {
                self.open_rings.insert(label, (atom, order));
                Ok(())
            }
        }
    }

    fn two_digit_label(&mut self, position: usize) -> ParseResult<u32> {
        let mut label = 0;
        for _ in 0..2 {
            let digit = self
                .chars
                .next()
                .and_then(|(_, c)| c.to_digit(10))
                .ok_or_else(|| format!("'%' needs two digits at {position}"))?;
            label = label * 10 + digit;
        }
        Ok(label)
    }

    fn next_if(&mut self, predicate: impl Fn(char) -> bool) -> Option<char> {
        self.chars.next_if(|&(_, c)| predicate(c)).map(|(_, c)| c)
    }

    fn organic_atom(&mut self, c: char, position: usize) -> ParseResult<Atom> {
        let (symbol, aromatic) = match c {
            'B' if self.next_if(|n| n == 'r').is_some() => ("Br", false),
            'C' if self.next_if(|n| n == 'l').is_some() => ("Cl", false),
            'B' => ("B", false),
            'C' => ("C", false),
            'N' => ("N", false),
            'O' => ("O", false),
            'P' => ("P", false),
            'S' => ("S", false),
            'F' => ("F", false),
            'I' => ("I", false),
            'b' => ("B", true),
            'c' => ("C", true),
            'n' => ("N", true),
            'o' => ("O", true),
            'p' => ("P", true),
            's' => ("S", true),
            '*' => ("*", false),
            other => return Err(format!("unexpected character '{other}' at {position}")),
        };
        let number = atomic_number(symbol).unwrap_or_default();
        Ok(Atom::organic(number, aromatic))
    }

    fn read_number(&mut self) -> Option<u32> {
        let mut value: Option<u32> = None;
        while let Some(c) = self.next_if(|c| c.is_ascii_digit()) {
            let digit = c.to_digit(10).unwrap_or_default();
            value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(digit));
        }
        value
    }

    fn bracket_atom(&mut self, position: usize) -> ParseResult<Atom> {
        let isotope = self.read_number().unwrap_or(0);

        let first = self
            .chars
            .next()
            .map(|(_, c)| c)
            .ok_or_else(|| format!("unterminated bracket atom at {position}"))?;
        let (number, aromatic) = if first == '*' {
            (0, false)
        } else if first.is_ascii_lowercase() {
            // Aromatic: b c n o p s se as te
            let mut symbol = first.to_ascii_uppercase().to_string();
            if let Some(second) = self.next_if(|n| matches!((first, n), ('s', 'e') | ('a', 's') | ('t', 'e'))) {
                symbol.push(second);
            }
            let number = atomic_number(&symbol)
                .ok_or_else(|| format!("unknown aromatic element '{symbol}' at {position}"))?;
            (number, true)
        } else if first.is_ascii_uppercase() {
            let one = first.to_string();
            let lookahead = self.chars.peek().map(|&(_, c)| c);
            let two = lookahead
                .filter(char::is_ascii_lowercase)
                .map(|second| format!("{first}{second}"))
                .and_then(|s| atomic_number(&s).map(|n| (s, n)));
            match two {
                Some((_, number)) => {
                    self.chars.next();
                    (number, false)
                }
                None => {
                    let number = atomic_number(&one)
                        .ok_or_else(|| format!("unknown element '{one}' at {position}"))?;
                    (number, false)
                }
            }
        } else {
            return Err(format!("expected element in bracket atom at {position}"));
        };

        // Chirality: @, @@, @TH1, @SP2, @OH12 ...
        while self.next_if(|c| c == '@').is_some() {
            if self.next_if(|c| matches!(c, 'T' | 'S' | 'O' | 'A')).is_some() {
                self.next_if(|c| c.is_ascii_uppercase());
                self.read_number();
            }
        }

        let hydrogens = if self.next_if(|c| c == 'H').is_some() {
            self.read_number().unwrap_or(1)
        } else {
            0
        };

        let mut charge: i32 = 0;
        if let Some(sign) = self.next_if(|c| c == '+' || c == '-') {
            let unit = if sign == '+' { 1 } else { -1 };
            let magnitude = match self.read_number() {
                Some(n) => n as i32,
                None => {
                    let mut repeats = 1;
                    while self.next_if(|c| c == sign).is_some() {
                        repeats += 1;
                    }
                    repeats
                }
            };
            charge = unit * magnitude;
        }

        if self.next_if(|c| c == ':').is_some() && self.read_number().is_none() {
            return Err(format!("atom class without number at {position}"));
        }
        if self.next_if(|c| c == ']').is_none() {
            return Err(format!("unterminated bracket atom at {position}"));
        }

        Ok(Atom {
            atomic_number: number,
            aromatic,
            charge: charge.clamp(i8::MIN as i32, i8::MAX as i32) as i8,
            isotope: isotope.min(u16::MAX as u32) as u16,
            hydrogens: hydrogens.min(u8::MAX as u32) as u8,
            bracket: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ethanol() {
        let mol = parse_smiles("CCO").unwrap();
        assert_eq!(mol.atoms().len(), 3);
        assert_eq!(mol.bonds().len(), 2);
        let hs: Vec<u8> = mol.atoms().iter().map(|a| a.hydrogens).collect();
        assert_eq!(hs, vec![3, 2, 1]);
    }

    #[test]
    fn benzene_is_aromatic() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        assert_eq!(mol.bonds().len(), 6);
        assert!(mol.bonds().iter().all(|b| b.order == BondOrder::Aromatic));
        assert!(mol.atoms().iter().all(|a| a.hydrogens == 1));
        assert_eq!(mol.rings().len(), 1);
    }

    #[test]
    fn branches_and_double_bonds() {
        // Acetic acid
        let mol = parse_smiles("CC(=O)O").unwrap();
        assert_eq!(mol.degree(1), 3);
        assert_eq!(mol.bonds()[1].order, BondOrder::Double);
        assert_eq!(mol.atoms()[2].hydrogens, 0);
        assert_eq!(mol.atoms()[3].hydrogens, 1);
    }

    #[test]
    fn bracket_atoms() {
        let mol = parse_smiles("[13CH3][N+](C)(C)C.[Cl-]").unwrap();
        let carbon = &mol.atoms()[0];
        assert_eq!((carbon.isotope, carbon.hydrogens), (13, 3));
        assert_eq!(mol.atoms()[1].charge, 1);
        assert_eq!(mol.atoms()[5].atomic_number, 17);
        assert_eq!(mol.atoms()[5].charge, -1);
        assert_eq!(mol.bonds().len(), 4);
    }

    #[test]
    fn chirality_and_stereo_bonds_are_ignored() {
        let mol = parse_smiles("N[C@@H](C)C(=O)O").unwrap();
        assert_eq!(mol.atoms()[1].hydrogens, 1);
        let alkene = parse_smiles("F/C=C/F").unwrap();
        assert_eq!(alkene.bonds().len(), 3);
    }

    #[test]
    fn percent_ring_labels() {
        let mol = parse_smiles("C%10CCCC%10").unwrap();
        assert_eq!(mol.rings().len(), 1);
        assert_eq!(mol.rings()[0].len(), 5);
    }

    #[test]
    fn two_letter_elements() {
        let mol = parse_smiles("ClCBr").unwrap();
        let numbers: Vec<u8> = mol.atoms().iter().map(|a| a.atomic_number).collect();
        assert_eq!(numbers, vec![17, 6, 35]);
        assert_eq!(parse_smiles("[Na+].[Cl-]").unwrap().atoms()[0].atomic_number, 11);
    }

    #[test]
    fn transuranic_bracket_atoms() {
        let numbers: Vec<u8> = parse_smiles("[Am].[Cf+3].[Og]")
            .unwrap()
            .atoms()
            .iter()
            .map(|a| a.atomic_number)
            .collect();
        assert_eq!(numbers, vec![95, 98, 118]);
    }

    #[test]
    fn malformed_inputs() {
        for smiles in ["", "C(C", "C)C", "C1CC", "C==C", "[C", "X", "C1C1", "=C"] {
            let err = parse_smiles(smiles).unwrap_err();
            assert!(matches!(err, Error::Smiles { .. }), "{smiles}");
        }
    }
}
