//! Parsers and builders for DBPF package files
//!
//! A DBPF package is a 96-byte header, a resource index and the resource
//! payloads themselves. Payloads may be stored RefPack-compressed; the
//! decompressed sizes live in a special directory resource (`CLST`).
//!
//! # Modules
//!
//! - **header**: the fixed package header
//! - **index**: resource index and compression directory
//! - **refpack**: the RefPack (QFS) LZ77 codec
//! - **resource**: typed codecs for property sets, object definitions,
//!   behaviour programs, string tables and scene graphs
//! - **types**: the resource type table
//!
//! Every codec is symmetric: a decoded resource that has not been changed
//! encodes back to the exact bytes it came from.
//!
//! # Example
//!
//! ```
//! use dbpf_formats::refpack;
//!
//! let data = b"abcabcabcabcabcabcabcabc".repeat(8);
//! let packed = refpack::compress(&data).expect("compressible input");
//! let unpacked = refpack::decompress(&packed, data.len() as u32).expect("valid stream");
//! assert_eq!(unpacked, data);
//! ```

#![warn(missing_docs)]
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Four-character type codes don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::float_cmp)] // Binary format requirements
#![allow(clippy::needless_pass_by_value)] // Configuration types
#![allow(clippy::redundant_clone)] // Binary format handling
#![allow(clippy::map_unwrap_or)] // Binary format patterns
#![allow(clippy::redundant_closure)] // Test setup
#![allow(clippy::cast_precision_loss)] // Size ratios
#![allow(clippy::derive_partial_eq_without_eq)] // Binary format structs
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::use_self)] // Type clarity
#![allow(clippy::match_same_arms)] // Per-variant dispatch

/// Bounds-checked little/big endian reader and writer
pub mod cursor;
/// Package header
pub mod header;
pub mod index;
/// Resource keys
pub mod key;
pub mod refpack;
pub mod resource;
/// Resource type table
///
/// Maps numeric type ids to short and descriptive names and back.
pub mod types;

pub use header::{HEADER_SIZE, PackageHeader};
pub use index::{
    CompressionDirectory, DIRECTORY_KEY, IndexError, IndexResult, ResourceEntry, ResourceIndex,
    SizeInfo, is_directory_key,
};
pub use key::{ParseKeyError, ResourceKey};
pub use refpack::{RefPackError, RefPackResult};
pub use resource::{
    CodecRegistry, DecodeOptions, Payload, Resource, ResourceError, ResourceResult,
};
