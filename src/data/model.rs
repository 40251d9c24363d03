use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// MetadataValue – a single metadata field of a spectrum
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value as found in MGF headers or archive
/// columns. Filters keep these in `BTreeSet`s, so the type is `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use MetadataValue::*;
        fn rank(v: &MetadataValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl MetadataValue {
    /// Interpret the value as an `f64`, parsing numeric strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            MetadataValue::String(s) => s.split_whitespace().next()?.parse().ok(),
            _ => None,
        }
    }

    /// Borrow the text of a string value, treating blank strings as absent.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Spectrum – peaks plus chemical metadata
// ---------------------------------------------------------------------------

/// Metadata keys understood by the datasets and measures.
pub mod keys {
    pub const SMILES: &str = "smiles";
    pub const INCHIKEY: &str = "inchikey";
    pub const IONMODE: &str = "ionmode";
    pub const MASS_ANALYZER: &str = "ms_mass_analyzer";
    pub const PRECURSOR_MZ: &str = "precursor_mz";
}

/// A single MS/MS spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// Fragment m/z values, ascending after cleanup.
    pub mz: Vec<f64>,
    /// Fragment intensities – same length as `mz`.
    pub intensities: Vec<f64>,
    /// Metadata fields keyed by lowercase name.
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Spectrum {
    pub fn new(mz: Vec<f64>, intensities: Vec<f64>) -> Self {
        Spectrum {
            mz,
            intensities,
            metadata: BTreeMap::new(),
        }
    }

    /// Builder-style metadata insertion.
    pub fn with(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    pub fn smiles(&self) -> Option<&str> {
        self.get(keys::SMILES).and_then(MetadataValue::as_str)
    }

    pub fn precursor_mz(&self) -> Option<f64> {
        self.get(keys::PRECURSOR_MZ)
            .and_then(MetadataValue::as_f64)
            .filter(|mz| mz.is_finite() && *mz > 0.0)
    }

    pub fn len(&self) -> usize {
        self.mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_metadata_counts_as_missing() {
        let spectrum = Spectrum::new(vec![100.0], vec![1.0])
            .with(keys::SMILES, "  ")
            .with(keys::INCHIKEY, "AAAAAAAAAAAAAA-BBBBBBBBBB-N");
        assert_eq!(spectrum.smiles(), None);
        assert!(spectrum
            .get(keys::INCHIKEY)
            .and_then(MetadataValue::as_str)
            .is_some());
    }

    #[test]
    fn precursor_parsed_from_pepmass_text() {
        let spectrum = Spectrum::new(vec![], vec![]).with(keys::PRECURSOR_MZ, "301.14 1200.0");
        assert_eq!(spectrum.precursor_mz(), Some(301.14));
    }

    #[test]
    fn mixed_variants_order_by_kind() {
        let mut values = vec![
            MetadataValue::from("b"),
            MetadataValue::Null,
            MetadataValue::Integer(3),
            MetadataValue::from("a"),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                MetadataValue::Null,
                MetadataValue::Integer(3),
                MetadataValue::from("a"),
                MetadataValue::from("b"),
            ]
        );
    }
}
