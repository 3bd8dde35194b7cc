//! Read, edit and atomically rewrite DBPF package archives
//!
//! An [`Archive`] parses a package's header and index, hands out decoded
//! resources through a per-archive cache, stages edits, and writes the
//! result either to any [`Write`](std::io::Write) sink or back over its
//! own file.
//!
//! # Example
//!
//! ```rust,no_run
//! use dbpf_archive::{Archive, Fetched};
//! use dbpf_formats::resource::Payload;
//! use dbpf_formats::ResourceKey;
//!
//! # fn example() -> Result<(), dbpf_archive::ArchiveError> {
//! let mut archive = Archive::open("objects.package")?;
//! let key: ResourceKey = "EBCF3E27-7FD46CD0-00001234-00000000".parse().expect("valid key");
//!
//! if let Some(Fetched::Payload(Payload::PropertySet(set))) = archive.get(&key)? {
//!     set.set_u32("cost", 750)?;
//! }
//! archive.commit_cached(&key, false)?;
//!
//! let outcome = archive.update(true)?;
//! if let Some(err) = &outcome.replace_error {
//!     eprintln!("package left unchanged: {err}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::cast_possible_truncation)] // Sizes are checked before narrowing
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::missing_errors_doc)]

mod archive;
/// Resource cache
pub mod cache;
/// Configuration
pub mod config;
mod error;
mod update;

pub use archive::{Archive, Fetched, RewriteSummary};
pub use cache::{CachedRef, ResourceCache};
pub use config::ArchiveConfig;
pub use error::{ArchiveError, ArchiveResult};
pub use update::{UpdateOutcome, sibling_path};
