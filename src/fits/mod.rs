/// Segment decoder: container bytes in, ordered segments out.
///
/// ```text
///  path (.fits / .fits.gz)        Vec<u8>
///        │                           │
///        ▼                           │
///   ┌────────────┐                   │
///   │ decompress │  mmap or inflate  │
///   └────────────┘                   │
///        │                           │
///        ▼                           ▼
///   ┌──────────────────────────────────┐
///   │ Storage  (Arc, shared by views)  │
///   └──────────────────────────────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ container │  header cards + table columns → Vec<Segment>
///   └───────────┘
/// ```
pub(crate) mod compressed;
pub mod container;
pub mod decompress;
#[doc(hidden)]
pub mod fixture;
pub mod header;
pub mod storage;
pub mod table;
