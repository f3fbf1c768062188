//! Spill manager for external-memory operators.
//!
//! Orchestrates writing/reading chunk segments to/from storage with
//! checksums. The manager is pure I/O: memory and disk accounting is the
//! caller's responsibility (the row store owns both trackers).

pub mod codec;
pub mod segment;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use riffle_core::chunk::Chunk;
use riffle_core::id::SpillId;

use crate::error::{Error, Result};

pub use codec::Codec;
pub use segment::{SegmentHeader, SegmentMeta, SegmentName, HEADER_LEN};

/// Sanity bound applied to segment headers when reading back.
const MAX_SEGMENT_LEN: u64 = 256 * 1024 * 1024;

/// Abstract storage interface for spill segments.
///
/// Implemented by `riffle-io::FsStorage` for the local scratch directory and
/// by `riffle-io::MemoryStorage` for tests.
pub trait Storage: Send + Sync {
    /// Write bytes to a path. Creates parent directories if needed.
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Read a byte range from a path.
    fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Delete a path. Idempotent (no error if path doesn't exist).
    fn delete(&self, path: &str) -> Result<()>;

    /// List all paths under a prefix (for cleanup/debugging).
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Get size of a path in bytes.
    fn size(&self, path: &str) -> Result<u64>;
}

/// Writes chunks as checksummed segment files and reads them back.
pub struct SpillManager {
    storage: Box<dyn Storage>,
    codec: Codec,
    root_dir: String,
    next_seg: AtomicU32,
    segments: HashMap<SegmentName, SegmentMeta>,
}

impl SpillManager {
    pub fn new(storage: Box<dyn Storage>, codec: Codec, root_dir: String) -> Self {
        Self {
            storage,
            codec,
            root_dir,
            next_seg: AtomicU32::new(0),
            segments: HashMap::new(),
        }
    }

    /// Serialize, compress, checksum and persist one chunk.
    pub fn write_chunk(
        &mut self,
        chunk: &Chunk,
        spill_id: SpillId,
        seg_index: u32,
    ) -> Result<SegmentMeta> {
        let uncompressed = serde_json::to_vec(chunk)
            .map_err(|e| Error::Codec(format!("chunk serialize: {e}")))?;
        let uncompressed_len = uncompressed.len() as u64;

        let compressed = self.codec.compress(&uncompressed)?;
        let compressed_len = compressed.len() as u64;

        let header = SegmentHeader::new(self.codec, uncompressed_len, compressed_len);
        let header_bytes = header.to_bytes();

        let mut hasher = blake3::Hasher::new();
        hasher.update(&header_bytes);
        hasher.update(&compressed);
        let checksum: [u8; 32] = hasher.finalize().into();

        let name = SegmentName::new(spill_id, seg_index);
        let path = format!("{}/{}.seg", self.root_dir, name.0);

        let mut full_segment = Vec::with_capacity(header_bytes.len() + compressed.len());
        full_segment.extend_from_slice(&header_bytes);
        full_segment.extend_from_slice(&compressed);

        self.storage.write(&path, &full_segment)?;

        let meta = SegmentMeta {
            name: name.clone(),
            path,
            codec: self.codec,
            uncompressed_len,
            compressed_len,
            checksum,
        };
        self.segments.insert(name, meta.clone());

        Ok(meta)
    }

    /// Read a chunk back, verifying the end-to-end checksum.
    pub fn read_chunk(&self, meta: &SegmentMeta) -> Result<Chunk> {
        let total_len = HEADER_LEN + meta.compressed_len as usize;
        let full_segment = self.storage.read_range(&meta.path, 0, total_len)?;

        if full_segment.len() < HEADER_LEN {
            return Err(Error::Storage("segment too short".into()));
        }

        let mut hasher = blake3::Hasher::new();
        hasher.update(&full_segment);
        let computed: [u8; 32] = hasher.finalize().into();
        if computed != meta.checksum {
            return Err(Error::ChecksumMismatch);
        }

        let header = SegmentHeader::from_bytes(&full_segment[..HEADER_LEN])?;
        header.validate_sizes(MAX_SEGMENT_LEN, MAX_SEGMENT_LEN)?;

        let compressed = &full_segment[HEADER_LEN..];
        let uncompressed = header.codec.decompress(compressed)?;

        let chunk: Chunk = serde_json::from_slice(&uncompressed)
            .map_err(|e| Error::Codec(format!("chunk deserialize: {e}")))?;

        Ok(chunk)
    }

    /// Generate a unique segment index for this manager.
    pub fn next_seg_index(&self) -> u32 {
        self.next_seg.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get_segment(&self, name: &SegmentName) -> Option<&SegmentMeta> {
        self.segments.get(name)
    }

    /// Delete a segment from storage and drop its metadata.
    pub fn delete_segment(&mut self, name: &SegmentName) -> Result<()> {
        if let Some(meta) = self.segments.remove(name) {
            self.storage.delete(&meta.path)?;
        }
        Ok(())
    }

    pub fn list_segments(&self) -> Vec<SegmentName> {
        self.segments.keys().cloned().collect()
    }
}
