/// Data layer: spectrum types, loading, filtering and artifact downloads.
///
/// Architecture:
/// ```text
///  remote artifact ──► download  (fetch once, skip if present)
///        │
///        ▼
///  .mgf / .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  parse file → Vec<Spectrum>
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter  │  metadata predicates, cleanup, normalization
///   └──────────┘
/// ```

pub mod download;
pub mod filter;
pub mod loader;
pub mod model;

pub use model::{MetadataValue, Spectrum};
