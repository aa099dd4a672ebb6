// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! On-disk model cache.
//!
//! A cache directory holds the exported chunks of one compiled artifact and a
//! manifest describing them:
//!
//! ```text
//! <dir>/cache_info.nncache   manifest
//! <dir>/0.nncache            chunk 0
//! <dir>/1.nncache            chunk 1
//! ...
//! ```
//!
//! # Manifest Format
//! A sequence of little-endian `u64` words:
//!
//! | word      | meaning                              |
//! |-----------|--------------------------------------|
//! | 0         | number of chunk files `n` (1..=1024) |
//! | 1         | artifact version                     |
//! | 2         | producing device id                  |
//! | 3 .. 3+n  | CRC-16 of chunk `i` (≤ `u16::MAX`)   |
//!
//! The file length must be exactly `(3 + n) * 8` bytes.

use crate::RuntimeError;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use std::fs::{self, File};
use std::io::{Cursor, ErrorKind as IoErrorKind};
use std::path::{Path, PathBuf};

/// File name of the manifest inside a cache directory.
pub const MANIFEST_FILE: &str = "cache_info.nncache";

/// Largest chunk file accepted on load or write (200 MiB).
pub const MAX_CHUNK_BYTES: u64 = 200 * 1024 * 1024;

/// Largest number of chunk files a manifest may describe.
pub const MAX_CACHE_FILES: u64 = 1024;

const HEADER_WORDS: usize = 3;
const WORD: usize = 8;

// ── CRC-16 ─────────────────────────────────────────────────────

const CRC16_POLY: u16 = 0x1021;

const fn build_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ CRC16_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC16_TABLE: [u16; 256] = build_crc16_table();

/// CRC-16/CCITT (polynomial `0x1021`, seed `0`, MSB first) over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |crc, &byte| {
        (crc << 8) ^ CRC16_TABLE[usize::from((crc >> 8) as u8 ^ byte)]
    })
}

/// Name of the file holding chunk `index`.
pub fn chunk_file_name(index: usize) -> String {
    format!("{index}.nncache")
}

// ── Manifest ───────────────────────────────────────────────────

/// Decoded contents of `cache_info.nncache`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheManifest {
    pub version: u64,
    pub device_id: u64,
    /// One checksum per chunk file, in chunk order.
    pub checksums: Vec<u16>,
}

impl CacheManifest {
    pub fn file_count(&self) -> usize {
        self.checksums.len()
    }

    /// Size in bytes of an encoded manifest describing `file_count` chunks.
    pub fn encoded_len(file_count: usize) -> usize {
        (HEADER_WORDS + file_count) * WORD
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut words = Vec::with_capacity(HEADER_WORDS + self.checksums.len());
        words.push(self.checksums.len() as u64);
        words.push(self.version);
        words.push(self.device_id);
        words.extend(self.checksums.iter().map(|&c| u64::from(c)));

        let mut bytes = vec![0u8; words.len() * WORD];
        LittleEndian::write_u64_into(&words, &mut bytes);
        bytes
    }

    /// Parses and validates a manifest.
    pub fn decode(bytes: &[u8]) -> Result<Self, RuntimeError> {
        if bytes.len() < Self::encoded_len(1) {
            return Err(RuntimeError::InvalidFile(format!(
                "manifest is truncated ({} bytes)",
                bytes.len()
            )));
        }
        let mut reader = Cursor::new(bytes);
        let mut word = || {
            reader
                .read_u64::<LittleEndian>()
                .map_err(|e| RuntimeError::InvalidFile(format!("manifest read failed: {e}")))
        };

        let file_count = word()?;
        if file_count == 0 || file_count > MAX_CACHE_FILES {
            return Err(RuntimeError::InvalidFile(format!(
                "manifest declares {file_count} chunk files, expected 1..={MAX_CACHE_FILES}"
            )));
        }
        let file_count = file_count as usize;
        let expected = Self::encoded_len(file_count);
        if bytes.len() != expected {
            return Err(RuntimeError::InvalidFile(format!(
                "manifest is {} bytes, {file_count} chunks need exactly {expected}",
                bytes.len()
            )));
        }

        let version = word()?;
        let device_id = word()?;
        let mut checksums = Vec::with_capacity(file_count);
        for index in 0..file_count {
            let raw = word()?;
            let checksum = u16::try_from(raw).map_err(|_| {
                RuntimeError::InvalidFile(format!(
                    "checksum of chunk {index} out of range: {raw:#x}"
                ))
            })?;
            checksums.push(checksum);
        }

        Ok(Self {
            version,
            device_id,
            checksums,
        })
    }
}

// ── Store ──────────────────────────────────────────────────────

/// Chunks of a cached artifact, memory-mapped and checksum-verified.
#[derive(Debug)]
pub struct CachedChunks {
    maps: Vec<Mmap>,
}

impl CachedChunks {
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn as_slices(&self) -> Vec<&[u8]> {
        self.maps.iter().map(|m| &m[..]).collect()
    }

    pub fn total_bytes(&self) -> usize {
        self.maps.iter().map(|m| m.len()).sum()
    }
}

/// A resolved cache directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Resolves `path` to a canonical existing directory.
    pub fn open(path: &Path) -> Result<Self, RuntimeError> {
        let dir = fs::canonicalize(path).map_err(|e| {
            RuntimeError::InvalidFile(format!(
                "cache directory '{}' cannot be resolved: {e}",
                path.display()
            ))
        })?;
        if !dir.is_dir() {
            return Err(RuntimeError::InvalidFile(format!(
                "cache path '{}' is not a directory",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub fn chunk_path(&self, index: usize) -> PathBuf {
        self.dir.join(chunk_file_name(index))
    }

    pub fn has_manifest(&self) -> bool {
        self.manifest_path().is_file()
    }

    /// Reads and decodes the manifest.
    pub fn read_manifest(&self) -> Result<CacheManifest, RuntimeError> {
        let path = self.manifest_path();
        let len = fs::metadata(&path)
            .map_err(|e| RuntimeError::io(&path, e))?
            .len();
        let max = CacheManifest::encoded_len(MAX_CACHE_FILES as usize) as u64;
        if len > max {
            return Err(RuntimeError::InvalidFile(format!(
                "manifest '{}' is {len} bytes, larger than any valid manifest",
                path.display()
            )));
        }
        let bytes = fs::read(&path).map_err(|e| RuntimeError::io(&path, e))?;
        CacheManifest::decode(&bytes)
    }

    /// Writes every chunk, then the manifest.
    ///
    /// A failure part-way leaves either no manifest (the next build
    /// regenerates) or a manifest whose checksums do not match.
    pub fn write(
        &self,
        chunks: &[Vec<u8>],
        version: u64,
        device_id: u64,
    ) -> Result<CacheManifest, RuntimeError> {
        if chunks.is_empty() || chunks.len() as u64 > MAX_CACHE_FILES {
            return Err(RuntimeError::InvalidParameter(format!(
                "cannot cache {} chunks, expected 1..={MAX_CACHE_FILES}",
                chunks.len()
            )));
        }
        for (index, chunk) in chunks.iter().enumerate() {
            check_chunk_size(index, chunk.len() as u64)?;
        }

        for (index, chunk) in chunks.iter().enumerate() {
            let path = self.chunk_path(index);
            fs::write(&path, chunk).map_err(|e| RuntimeError::io(&path, e))?;
        }

        let manifest = CacheManifest {
            version,
            device_id,
            checksums: chunks.iter().map(|c| crc16(c)).collect(),
        };
        let path = self.manifest_path();
        fs::write(&path, manifest.encode()).map_err(|e| RuntimeError::io(&path, e))?;

        tracing::info!(
            "cache: wrote {} chunks (version {version}) to {}",
            chunks.len(),
            self.dir.display()
        );
        Ok(manifest)
    }

    /// Maps every chunk named by `manifest` and verifies its checksum.
    pub fn load(&self, manifest: &CacheManifest) -> Result<CachedChunks, RuntimeError> {
        let mut maps = Vec::with_capacity(manifest.file_count());
        for (index, &expected) in manifest.checksums.iter().enumerate() {
            let path = self.chunk_path(index);
            let file = File::open(&path).map_err(|e| RuntimeError::io(&path, e))?;
            let len = file
                .metadata()
                .map_err(|e| RuntimeError::io(&path, e))?
                .len();
            check_chunk_size(index, len)?;

            // SAFETY: the mapping is read-only and dropped before the store
            // rewrites or removes any chunk file.
            let map = unsafe { Mmap::map(&file) }.map_err(|e| RuntimeError::io(&path, e))?;
            let actual = crc16(&map);
            if actual != expected {
                return Err(RuntimeError::InvalidFile(format!(
                    "checksum mismatch in '{}': manifest {expected:#06x}, file {actual:#06x}",
                    path.display()
                )));
            }
            maps.push(map);
        }
        tracing::debug!("cache: loaded {} chunks from {}", maps.len(), self.dir.display());
        Ok(CachedChunks { maps })
    }

    /// Deletes the manifest and every chunk it names. Missing files are
    /// ignored.
    pub fn remove(&self, manifest: &CacheManifest) -> Result<(), RuntimeError> {
        remove_if_present(&self.manifest_path())?;
        for index in 0..manifest.file_count() {
            remove_if_present(&self.chunk_path(index))?;
        }
        tracing::info!(
            "cache: removed version {} ({} chunks) from {}",
            manifest.version,
            manifest.file_count(),
            self.dir.display()
        );
        Ok(())
    }
}

fn check_chunk_size(index: usize, len: u64) -> Result<(), RuntimeError> {
    if len == 0 || len > MAX_CHUNK_BYTES {
        return Err(RuntimeError::InvalidFile(format!(
            "chunk {index} is {len} bytes, expected 1..={MAX_CHUNK_BYTES}"
        )));
    }
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<(), RuntimeError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
        Err(e) => Err(RuntimeError::io(path, e)),
    }
}
