// packages/engine/src/recording/compressor.rs
//! zstd compression for replay segments
//!
//! [`Compressor`] handles whole buffers. [`StreamCompressor`] builds a
//! compressed JSON array one event at a time, so raw events do not have to
//! stay resident until the segment is finished.

use crate::utils::errors::BufferError;
use std::io::Write;
use tracing::debug;
use zstd::stream::write::Encoder;

/// Compression levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionLevel {
    /// Fast compression (level 1)
    Fast,

    /// Balanced (level 3)
    Balanced,

    /// Best compression (level 19)
    Best,
}

impl CompressionLevel {
    pub fn as_i32(&self) -> i32 {
        match self {
            CompressionLevel::Fast => 1,
            CompressionLevel::Balanced => 3,
            CompressionLevel::Best => 19,
        }
    }
}

/// One-shot compressor using zstd
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    level: CompressionLevel,
}

impl Compressor {
    pub fn new(level: CompressionLevel) -> Self {
        Self { level }
    }

    /// Compress data
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, BufferError> {
        let level = self.level.as_i32();

        debug!("Compressing {} bytes at level {}", data.len(), level);

        zstd::encode_all(data, level)
            .map_err(|e| BufferError::Compression(format!("Compression error: {}", e)))
    }

    /// Decompress data
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, BufferError> {
        zstd::decode_all(data)
            .map_err(|e| BufferError::Compression(format!("Decompression error: {}", e)))
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(CompressionLevel::Balanced)
    }
}

/// Incremental compressor producing a zstd-compressed JSON array
pub struct StreamCompressor {
    level: CompressionLevel,
    encoder: Encoder<'static, Vec<u8>>,
    added: usize,
}

impl StreamCompressor {
    pub fn new(level: CompressionLevel) -> Result<Self, BufferError> {
        Ok(Self {
            level,
            encoder: Self::open(level)?,
            added: 0,
        })
    }

    fn open(level: CompressionLevel) -> Result<Encoder<'static, Vec<u8>>, BufferError> {
        let mut encoder = Encoder::new(Vec::new(), level.as_i32())
            .map_err(|e| BufferError::Compression(format!("Encoder init error: {}", e)))?;
        encoder
            .write_all(b"[")
            .map_err(|e| BufferError::Compression(format!("Write error: {}", e)))?;
        Ok(encoder)
    }

    /// Append one serialized event to the array
    pub fn push(&mut self, json: &[u8]) -> Result<(), BufferError> {
        if self.added > 0 {
            self.encoder
                .write_all(b",")
                .map_err(|e| BufferError::Compression(format!("Write error: {}", e)))?;
        }

        self.encoder
            .write_all(json)
            .map_err(|e| BufferError::Compression(format!("Write error: {}", e)))?;
        self.added += 1;

        Ok(())
    }

    /// Number of events appended since the last finish
    pub fn len(&self) -> usize {
        self.added
    }

    pub fn is_empty(&self) -> bool {
        self.added == 0
    }

    /// Close the array, return the compressed frame and start a new one
    pub fn finish(&mut self) -> Result<Vec<u8>, BufferError> {
        let fresh = Self::open(self.level)?;
        let mut encoder = std::mem::replace(&mut self.encoder, fresh);
        let added = std::mem::take(&mut self.added);

        encoder
            .write_all(b"]")
            .map_err(|e| BufferError::Compression(format!("Write error: {}", e)))?;
        let compressed = encoder
            .finish()
            .map_err(|e| BufferError::Compression(format!("Finalize error: {}", e)))?;

        debug!("Finished compressed segment: {} events, {} bytes", added, compressed.len());

        Ok(compressed)
    }
}
