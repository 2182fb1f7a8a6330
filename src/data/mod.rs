/// Data layer: core types, decoding, alignment and resampling.
///
/// Architecture:
/// ```text
///  spectrum file   metadata CSV      ZIP archive
///        │              │                 │
///        ▼              ▼                 ▼
///   ┌────────┐     ┌──────────┐     ┌─────────┐
///   │ parser │     │ metadata │     │ archive │   bytes → typed values
///   └────────┘     └──────────┘     └─────────┘
///        │              │
///        ▼              ▼
///   ┌─────────────────────────┐
///   │  align                  │  metadata keys × spectrum keys → row order
///   └─────────────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ resample │  crop, or interpolate onto one uniform axis
///   └──────────┘
/// ```

pub mod align;
pub mod archive;
pub mod metadata;
pub mod model;
pub mod parser;
pub mod resample;
