//! Ingestion of FITS containers into named, zero-copy datasets.
//!
//! ```no_run
//! use rusty_fits::{load_file, IngestOptions};
//!
//! let options = IngestOptions::default().with_auto_merge(true);
//! for dataset in load_file("image.fits.gz".as_ref(), &options)? {
//!     println!("{} {:?} {:?}", dataset.label(), dataset.shape(), dataset.component_names());
//! }
//! # Ok::<(), rusty_fits::FitsError>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod fits;

pub use config::IngestOptions;
pub use data::convention::{classify, detect, is_cube_convention, Convention, ContainerSummary};
pub use data::loader::{ingest, load_cube, load_file, read_as_cube, read_as_cube_labelled};
pub use data::model::{ArrayView, Cell, ColumnView, Component, ComponentData, Dataset};
pub use error::{FitsError, Result};
pub use fits::container::{Container, Segment, SegmentKind};
pub use fits::decompress::is_fits;
