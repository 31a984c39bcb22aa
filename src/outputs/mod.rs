//! Derived artifacts written next to the shards.
//!
//! # Submodules
//!
//! - [`latest`]: the top-K most recent rumors across all shards
//! - [`metadata`]: the `rumors_index.json` summary object
//!
//! # Output Structure
//!
//! ```text
//! data_dir/
//! ├── hoopshype_rumors_part1.json    # shards (owned by `store`)
//! ├── ...
//! ├── hoopshype_rumors_latest.json   # latest projection
//! └── rumors_index.json              # summary metadata
//! ```
//!
//! Both artifacts are fully rebuilt from the shards on every run, so a failed
//! write is repaired by the next successful one.

pub mod latest;
pub mod metadata;
