// src/output/mod.rs
//! Export output: directory layout, asset discovery, index documents and
//! the file writer.
//!
//! Path and index calculations are pure; `writer` is the only place that
//! performs filesystem I/O.

pub mod assets;
pub mod index;
pub mod paths;
pub mod writer;

pub use assets::{extract_assets, AssetKind, AssetReference, AssetSelection};
pub use index::{IndexEntry, SpaceIndexEntry};
pub use paths::{page_directory, relative_link, sanitize_path_segment, space_directory};
pub use writer::{create_directory, write_file};
