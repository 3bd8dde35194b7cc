//! Archive orchestrator
//!
//! An [`Archive`] owns one package stream, its parsed header and index, and
//! a [`ResourceCache`]. Reads go index → cache → stored bytes → codec.
//! Edits are staged in the cache and only reach disk through
//! [`Archive::rewrite`] or [`Archive::update`](crate::Archive::update).

use crate::cache::ResourceCache;
use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, ArchiveResult};
use dbpf_formats::cursor::ByteWriter;
use dbpf_formats::header::HEADER_SIZE;
use dbpf_formats::index::{CompressionDirectory, DIRECTORY_KEY, ResourceEntry, ResourceIndex, SizeInfo};
use dbpf_formats::refpack::{self, REFPACK_HEADER_SIZE, RefPackHeader};
use dbpf_formats::resource::{CodecRegistry, Payload, Resource};
use dbpf_formats::{PackageHeader, ResourceKey};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub(crate) enum Source<R> {
    /// Created in memory, nothing to read from
    Detached,
    Stream(R),
    Closed,
}

impl<R> Source<R> {
    fn reader_mut(&mut self) -> ArchiveResult<&mut R> {
        match self {
            Self::Stream(reader) => Ok(reader),
            Self::Detached | Self::Closed => Err(ArchiveError::Closed),
        }
    }
}

/// Result of [`Archive::get`]
#[derive(Debug)]
pub enum Fetched<'a> {
    /// Decoded payload, owned by the archive's cache
    Payload(&'a mut Payload),
    /// Raw bytes staged for the next rewrite
    Staged(&'a [u8]),
    /// Decompressed bytes of a type without a codec
    Opaque(Vec<u8>),
}

/// What a rewrite produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Index entries as written, with their new offsets and sizes
    pub entries: Vec<ResourceEntry>,
    /// Total bytes written
    pub bytes_written: u64,
    /// Payloads encoded from the cache
    pub encoded: usize,
    /// Raw byte blocks written from the cache, the directory included
    pub staged: usize,
    /// Resources copied verbatim from the source
    pub copied: usize,
}

enum Chunk {
    Owned(Vec<u8>),
    Raw,
    Copy { offset: u64 },
}

/// An open package
#[derive(Debug)]
pub struct Archive<R = BufReader<File>> {
    pub(crate) path: Option<PathBuf>,
    pub(crate) source: Source<R>,
    pub(crate) header: PackageHeader,
    pub(crate) index: ResourceIndex,
    pub(crate) cache: ResourceCache,
    pub(crate) registry: Arc<CodecRegistry>,
    pub(crate) config: ArchiveConfig,
}

impl Archive<BufReader<File>> {
    /// Open a package file with the default configuration
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        Self::open_with(path, ArchiveConfig::default())
    }

    /// Open a package file
    pub fn open_with(path: impl AsRef<Path>, config: ArchiveConfig) -> ArchiveResult<Self> {
        let path = path.as_ref();
        config.validate()?;
        let file = File::open(path)?;
        let mut archive = Self::load(BufReader::new(file), config)?;
        archive.path = Some(path.to_path_buf());
        info!(
            "Opened {} ({} resources)",
            path.display(),
            archive.resource_count()
        );
        Ok(archive)
    }

    /// Start an empty package that will be written to `path`
    ///
    /// Nothing touches the disk until the first update.
    pub fn create(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        Self::create_with(path, ArchiveConfig::default())
    }

    /// Start an empty package with a custom configuration
    pub fn create_with(path: impl AsRef<Path>, config: ArchiveConfig) -> ArchiveResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(ArchiveError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            )));
        }
        let mut archive = Self::new_with(config)?;
        archive.path = Some(path.to_path_buf());
        debug!("Created empty archive for {}", path.display());
        Ok(archive)
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Empty package with no backing stream
    pub fn new() -> Self {
        Self {
            path: None,
            source: Source::Detached,
            header: PackageHeader::default(),
            index: ResourceIndex::new(),
            cache: ResourceCache::new(),
            registry: CodecRegistry::standard(),
            config: ArchiveConfig::default(),
        }
    }

    /// Empty package with a custom configuration
    pub fn new_with(config: ArchiveConfig) -> ArchiveResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Read a package from any seekable stream
    pub fn from_reader(reader: R) -> ArchiveResult<Self> {
        Self::from_reader_with(reader, ArchiveConfig::default())
    }

    /// Read a package from any seekable stream with a custom configuration
    pub fn from_reader_with(reader: R, config: ArchiveConfig) -> ArchiveResult<Self> {
        config.validate()?;
        Self::load(reader, config)
    }

    fn load(mut reader: R, config: ArchiveConfig) -> ArchiveResult<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let mut head = Vec::with_capacity(HEADER_SIZE);
        (&mut reader).take(HEADER_SIZE as u64).read_to_end(&mut head)?;
        let header = PackageHeader::parse(&head)?;

        reader.seek(SeekFrom::Start(u64::from(header.index_offset)))?;
        let mut raw_index = Vec::new();
        (&mut reader)
            .take(u64::from(header.index_size))
            .read_to_end(&mut raw_index)?;
        let mut index = ResourceIndex::parse(&raw_index, &header)?;

        if let Some(entry) = index.directory_entry().copied() {
            let bytes = read_at(&mut reader, entry.file_offset, entry.stored_size)?;
            let directory = CompressionDirectory::parse(&bytes, header.has_resource_ids())?;
            let applied = index.apply_directory(&directory);
            debug!(
                "Compression directory lists {} resources, {} present in the index",
                directory.len(),
                applied
            );
        }

        Ok(Self {
            path: None,
            source: Source::Stream(reader),
            header,
            index,
            cache: ResourceCache::new(),
            registry: CodecRegistry::standard(),
            config,
        })
    }

    /// File the archive was opened from or will be written to
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Package header as read
    pub fn header(&self) -> &PackageHeader {
        &self.header
    }

    /// Active configuration
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Codec table used by [`Archive::get`]
    pub fn registry(&self) -> &Arc<CodecRegistry> {
        &self.registry
    }

    /// Replace the codec table; already cached payloads are kept
    pub fn set_registry(&mut self, registry: Arc<CodecRegistry>) {
        self.registry = registry;
    }

    /// The resource index
    pub fn index(&self) -> &ResourceIndex {
        &self.index
    }

    /// The resource cache
    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Every live entry in index order
    pub fn entries(&self) -> &[ResourceEntry] {
        self.index.entries()
    }

    /// Entry for a key
    pub fn entry(&self, key: &ResourceKey) -> Option<&ResourceEntry> {
        self.index.lookup(key)
    }

    /// Entries of one type, in index order
    pub fn entries_of_type(&self, type_id: u32) -> Vec<&ResourceEntry> {
        self.index.entries_of_type(type_id)
    }

    /// Entry whose key hashes to `hash`
    pub fn entry_by_hash(&self, hash: u64) -> Option<&ResourceEntry> {
        self.index.lookup_by_hash(hash)
    }

    /// Number of live entries
    pub fn resource_count(&self) -> usize {
        self.index.len()
    }

    /// Whether a rewrite would differ from the source
    pub fn is_dirty(&self) -> bool {
        self.index.is_dirty() || self.cache.has_staged()
    }

    /// Whether the source stream is still available
    pub fn is_open(&self) -> bool {
        !matches!(self.source, Source::Closed)
    }

    /// Look up and decode a resource
    ///
    /// Returns `Ok(None)` for keys not in the index. Types without a codec
    /// come back as [`Fetched::Opaque`]. A decode failure is returned for
    /// this resource only; the archive stays usable.
    pub fn get(&mut self, key: &ResourceKey) -> ArchiveResult<Option<Fetched<'_>>> {
        if !self.index.contains(key) {
            debug!("No entry for {}", key);
            return Ok(None);
        }
        if self.cache.is_staged_raw(key) {
            return Ok(self.cache.raw(key).map(Fetched::Staged));
        }

        if self.cache.payload(key).is_some() {
            debug!("Cache hit for {}", key);
        } else {
            let bytes = self.read_bytes(key)?;
            match self.registry.decode(*key, &bytes, &self.config.decode) {
                None => {
                    debug!("No codec for {}, returning {} opaque bytes", key, bytes.len());
                    return Ok(Some(Fetched::Opaque(bytes)));
                }
                Some(Ok(payload)) => {
                    debug!("Decoded {} as {}", key, payload.format_name());
                    self.cache.put(*key, payload);
                }
                Some(Err(err)) => {
                    warn!("Failed to decode {}: {}", key, err);
                    return Err(err.into());
                }
            }
        }
        Ok(self.cache.payload_mut(key).map(Fetched::Payload))
    }

    /// Look up a resource that has a codec
    ///
    /// `Ok(None)` when the key is missing, has no codec, or is staged as raw bytes.
    pub fn get_payload(&mut self, key: &ResourceKey) -> ArchiveResult<Option<&mut Payload>> {
        match self.get(key)? {
            Some(Fetched::Payload(payload)) => Ok(Some(payload)),
            _ => Ok(None),
        }
    }

    /// Decompressed bytes of a resource, bypassing codecs
    pub fn read_bytes(&mut self, key: &ResourceKey) -> ArchiveResult<Vec<u8>> {
        let entry = *self.index.lookup(key).ok_or(ArchiveError::NotFound(*key))?;
        if self.cache.is_staged_payload(key) {
            if let Some(payload) = self.cache.payload(key) {
                return Ok(payload.to_bytes());
            }
        }
        let stored = match self.cache.raw(key) {
            Some(raw) => raw.to_vec(),
            None => read_at(
                self.source.reader_mut()?,
                entry.file_offset,
                entry.stored_size,
            )?,
        };
        Ok(self.expand(&entry, stored))
    }

    /// Decompress stored bytes when the entry is, or looks, compressed.
    /// Falls back to the stored bytes when decompression fails.
    fn expand(&self, entry: &ResourceEntry, stored: Vec<u8>) -> Vec<u8> {
        let declared = if entry.is_compressed() {
            Some(entry.uncompressed_size)
        } else if self.config.detect_unflagged_compression
            && refpack::is_probably_compressed(
                entry.stored_size,
                &stored[..stored.len().min(REFPACK_HEADER_SIZE)],
            )
        {
            debug!("{} is not flagged compressed but carries a RefPack header", entry.key);
            RefPackHeader::parse(&stored)
                .ok()
                .map(|header| header.uncompressed_size)
        } else {
            None
        };

        let Some(declared) = declared else {
            return stored;
        };
        match refpack::decompress(&stored, declared) {
            Ok(data) => data,
            Err(err) => {
                warn!(
                    "Failed to decompress {}, using stored bytes: {}",
                    entry.key, err
                );
                stored
            }
        }
    }

    /// Name stored inside a resource, if its codec knows one
    pub fn display_name(&mut self, key: &ResourceKey) -> ArchiveResult<Option<String>> {
        match self.get(key)? {
            Some(Fetched::Payload(payload)) => Ok(payload.display_name()),
            _ => Ok(None),
        }
    }

    /// Cache `payload` and stage it for the next rewrite
    ///
    /// A clean payload for an existing entry is only cached unless
    /// `ignore_dirty` is set. Returns whether the payload was staged.
    pub fn commit(&mut self, payload: Payload, ignore_dirty: bool) -> ArchiveResult<bool> {
        let key = payload.key();
        let was_staged = self.cache.is_staged_payload(&key) || self.cache.is_staged_raw(&key);
        self.cache.put(key, payload);
        self.commit_cached(&key, ignore_dirty || was_staged)
    }

    /// Stage the payload already cached under `key`, typically one edited
    /// in place through [`Archive::get`]
    pub fn commit_cached(&mut self, key: &ResourceKey, ignore_dirty: bool) -> ArchiveResult<bool> {
        let payload = self.cache.payload(key).ok_or(ArchiveError::NotFound(*key))?;
        if !ignore_dirty
            && !payload.is_dirty()
            && !self.cache.is_staged_payload(key)
            && self.index.contains(key)
        {
            debug!("Skipping commit of unchanged {}", key);
            return Ok(false);
        }
        let size = stored_size(*key, payload.encoded_len())?;
        self.index.upsert(
            *key,
            SizeInfo {
                file_offset: 0,
                stored_size: size,
                uncompressed_size: 0,
            },
        );
        self.cache.stage(key);
        debug!("Staged {} ({} bytes encoded)", key, size);
        Ok(true)
    }

    /// Stage raw bytes to be written verbatim, bypassing codecs
    pub fn commit_raw(&mut self, key: ResourceKey, bytes: Vec<u8>) -> ArchiveResult<()> {
        let size = stored_size(key, bytes.len())?;
        self.index.upsert(
            key,
            SizeInfo {
                file_offset: 0,
                stored_size: size,
                uncompressed_size: 0,
            },
        );
        self.cache.put_raw(key, bytes);
        debug!("Staged {} raw bytes for {}", size, key);
        Ok(())
    }

    /// Compress `bytes` and stage the result; the directory will list it
    pub fn commit_compressed(&mut self, key: ResourceKey, bytes: &[u8]) -> ArchiveResult<()> {
        let packed = refpack::compress(bytes)?;
        let size = stored_size(key, packed.len())?;
        self.index.upsert(
            key,
            SizeInfo {
                file_offset: 0,
                stored_size: size,
                uncompressed_size: bytes.len() as u32,
            },
        );
        self.cache.put_raw(key, packed);
        debug!("Staged {} compressed to {} of {} bytes", key, size, bytes.len());
        Ok(())
    }

    /// Drop a resource; it is omitted from the next rewrite
    pub fn remove(&mut self, key: &ResourceKey) -> bool {
        self.cache.remove(key);
        let removed = self.index.remove(key);
        if removed {
            debug!("Removed {}", key);
        }
        removed
    }

    /// Release the source stream
    ///
    /// Lookups that need stored bytes fail with [`ArchiveError::Closed`]
    /// afterwards.
    pub fn close(&mut self) {
        if matches!(self.source, Source::Stream(_)) {
            match &self.path {
                Some(path) => info!("Closed {}", path.display()),
                None => info!("Closed archive stream"),
            }
        }
        self.source = Source::Closed;
    }

    /// Write the complete package to `out`
    ///
    /// Layout: header, index, then resources contiguously in index order.
    /// Staged payloads are encoded, staged raw bytes written as they are,
    /// everything else copied byte for byte from the source. A dirty index
    /// gets a regenerated compression directory.
    ///
    /// The archive itself is left unchanged; a failure before the first
    /// byte is written leaves `out` untouched.
    pub fn rewrite<W: Write>(&mut self, out: &mut W) -> ArchiveResult<RewriteSummary> {
        let with_ids = self.header.has_resource_ids();
        let mut index = self.index.clone();

        // Re-encoded payloads are written uncompressed
        for entry in self.index.entries() {
            if self.cache.is_staged_payload(&entry.key) {
                index.set_uncompressed_size(&entry.key, 0);
            }
        }

        let directory_key = index.directory_entry().map_or(DIRECTORY_KEY, |entry| entry.key);
        let mut directory_bytes = None;
        if index.is_dirty() {
            let directory = CompressionDirectory::from_entries(index.entries());
            if directory.is_empty() {
                if index.remove(&directory_key) {
                    debug!("Dropping empty compression directory");
                }
            } else {
                let bytes = directory.to_bytes(with_ids);
                let size = stored_size(directory_key, bytes.len())?;
                index.upsert(
                    directory_key,
                    SizeInfo {
                        file_offset: 0,
                        stored_size: size,
                        uncompressed_size: 0,
                    },
                );
                debug!("Regenerated compression directory ({} records)", directory.len());
                directory_bytes = Some(bytes);
            }
        }

        let (mut encoded, mut staged, mut copied) = (0, 0, 0);
        let mut plan = Vec::with_capacity(index.len());
        for entry in index.entries() {
            let key = entry.key;
            let chunk = if key == directory_key && directory_bytes.is_some() {
                staged += 1;
                Chunk::Owned(directory_bytes.take().unwrap_or_default())
            } else if self.cache.is_staged_payload(&key) {
                let payload = self.cache.payload(&key).ok_or(ArchiveError::NotFound(key))?;
                encoded += 1;
                Chunk::Owned(encode_checked(payload)?)
            } else if self.cache.is_staged_raw(&key) {
                staged += 1;
                Chunk::Raw
            } else {
                copied += 1;
                Chunk::Copy {
                    offset: entry.file_offset,
                }
            };
            let size = match &chunk {
                Chunk::Owned(bytes) => bytes.len(),
                Chunk::Raw => self.cache.raw(&key).map_or(0, <[u8]>::len),
                Chunk::Copy { .. } => entry.stored_size as usize,
            };
            plan.push((key, chunk, size));
        }

        if copied > 0 {
            self.source.reader_mut()?;
        }

        let index_size = index.serialized_size(with_ids);
        let mut offset = (HEADER_SIZE + index_size) as u64;
        for (key, _, size) in &plan {
            index.relocate(key, offset, stored_size(*key, *size)?);
            offset += *size as u64;
        }
        index.mark_clean();

        let mut header = self.header.clone();
        header.index_entry_count = index.len() as u32;
        header.index_offset = HEADER_SIZE as u32;
        header.index_size = index_size as u32;
        header.hole_count = 0;
        header.hole_offset = 0;
        header.hole_size = 0;

        let mut head = ByteWriter::with_capacity(HEADER_SIZE + index_size);
        head.write_bytes(&header.to_bytes()?);
        index.serialize(&mut head, with_ids)?;
        out.write_all(head.as_slice())?;

        for (key, chunk, size) in &plan {
            match chunk {
                Chunk::Owned(bytes) => out.write_all(bytes)?,
                Chunk::Raw => {
                    let raw = self.cache.raw(key).ok_or(ArchiveError::NotFound(*key))?;
                    out.write_all(raw)?;
                }
                Chunk::Copy { offset } => {
                    let reader = self.source.reader_mut()?;
                    reader.seek(SeekFrom::Start(*offset))?;
                    let copied = io::copy(&mut reader.take(*size as u64), out)?;
                    if copied != *size as u64 {
                        return Err(ArchiveError::Io(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("{key}: source holds {copied} of {size} bytes"),
                        )));
                    }
                }
            }
        }
        out.flush()?;

        info!(
            "Rewrote {} resources ({} bytes: {} encoded, {} staged, {} copied)",
            index.len(),
            offset,
            encoded,
            staged,
            copied
        );
        Ok(RewriteSummary {
            entries: index.entries().to_vec(),
            bytes_written: offset,
            encoded,
            staged,
            copied,
        })
    }

    /// Rewrite into memory
    pub fn rewrite_to_vec(&mut self) -> ArchiveResult<Vec<u8>> {
        let mut out = Vec::new();
        self.rewrite(&mut out)?;
        Ok(out)
    }
}

impl<R: Read + Seek> Default for Archive<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a staged payload, checking it against the size it announced
fn encode_checked<P: Resource + ?Sized>(payload: &P) -> ArchiveResult<Vec<u8>> {
    let recorded = payload.encoded_len();
    let bytes = payload.to_bytes();
    if bytes.len() != recorded {
        return Err(ArchiveError::SizeConsistency {
            key: payload.key(),
            recorded,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

fn stored_size(key: ResourceKey, size: usize) -> ArchiveResult<u32> {
    u32::try_from(size).map_err(|_| ArchiveError::TooLarge { key, size })
}

fn read_at<R: Read + Seek>(reader: &mut R, offset: u64, size: u32) -> ArchiveResult<Vec<u8>> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::new();
    reader.take(u64::from(size)).read_to_end(&mut buf)?;
    if buf.len() != size as usize {
        return Err(ArchiveError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("wanted {size} bytes at offset {offset}, found {}", buf.len()),
        )));
    }
    Ok(buf)
}
