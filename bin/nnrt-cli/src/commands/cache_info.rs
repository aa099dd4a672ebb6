// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `nnrt cache-info` command: decode a manifest and check each chunk.

use runtime::{crc16, CacheStore};
use std::path::PathBuf;

pub async fn execute(dir: PathBuf) -> anyhow::Result<()> {
    let store = CacheStore::open(&dir)?;
    if !store.has_manifest() {
        println!("  {}: no cache manifest", store.dir().display());
        return Ok(());
    }
    let manifest = store.read_manifest()?;

    println!("  Directory: {}", store.dir().display());
    println!("  Version:   {}", manifest.version);
    println!("  Device id: {:#018x}", manifest.device_id);
    println!("  Chunks:    {}", manifest.file_count());
    println!();
    println!("  {:<4} {:>12} {:>8} {:>8}  Status", "Idx", "Bytes", "Stored", "Actual");
    println!("  {}", "-".repeat(48));

    for (index, &stored) in manifest.checksums.iter().enumerate() {
        let path = store.chunk_path(index);
        match std::fs::read(&path) {
            Ok(bytes) => {
                let actual = crc16(&bytes);
                let status = if actual == stored { "ok" } else { "MISMATCH" };
                println!(
                    "  {index:<4} {:>12} {stored:>#8x} {actual:>#8x}  {status}",
                    bytes.len()
                );
            }
            Err(e) => println!("  {index:<4} {:>12} {stored:>#8x} {:>8}  {e}", "-", "-"),
        }
    }
    println!();

    // Full load applies the size limits as well as the checksums.
    match store.load(&manifest) {
        Ok(chunks) => println!("  Verdict:   loadable ({} bytes)", chunks.total_bytes()),
        Err(e) => println!("  Verdict:   rejected ({e})"),
    }
    Ok(())
}
