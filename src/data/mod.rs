/// Ingestion layer: segments in, datasets out.
///
/// Architecture:
/// ```text
///   Container (Vec<Segment>)
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  drop excluded / empty segments
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  merge    │  (kind, shape) → ordered groups
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  group → Dataset of zero-copy components
///   └──────────┘
///
///   convention ── Stokes cube detection for `read_as_cube`
/// ```

pub mod convention;
pub mod filter;
pub mod loader;
pub mod merge;
pub mod model;
