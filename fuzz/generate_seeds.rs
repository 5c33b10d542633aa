//! Generate seed corpus for fuzzing

use fpk_rs::hash::hash_name;
use fpk_rs::{ArchiveWriter, Generation};
use std::fs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let corpus_dir = "fuzz/corpus/fuzz_archive_parse";
    fs::create_dir_all(corpus_dir)?;

    println!("Generating seed corpus...");

    // Seed 1: Empty archives
    for generation in [Generation::Legacy, Generation::Ngs] {
        let path = format!("{}/seed_empty_{}.ice", corpus_dir, generation);
        ArchiveWriter::new(generation).finalize(&path)?;
        println!("Generated: {}", path);
    }

    // Seed 2: Legacy archive with unaligned payloads
    {
        let path = format!("{}/seed_legacy.ice", corpus_dir);
        let mut writer = ArchiveWriter::new(Generation::Legacy);
        writer.add_file(0x0080_0BCB, b"abc")?;
        writer.add_file(0x1234_5678, b"hello")?;
        writer.add_file(0xDEAD_BEEF, &[0u8; 17])?;
        writer.finalize(&path)?;
        println!("Generated: {}", path);
    }

    // Seed 3: NGS archive, stored payloads
    {
        let path = format!("{}/seed_ngs_stored.ice", corpus_dir);
        let mut writer = ArchiveWriter::new(Generation::Ngs);
        writer.add_file(hash_name("boot.lua"), b"print('boot')")?;
        writer.add_file(hash_name("menu.lua"), b"return {}")?;
        writer.finalize(&path)?;
        println!("Generated: {}", path);
    }

    // Seed 4: NGS archive, zstd payloads
    {
        let path = format!("{}/seed_ngs_zstd.ice", corpus_dir);
        let mut writer = ArchiveWriter::new(Generation::Ngs).with_compression(3);
        writer.add_file(hash_name("big.lua"), &b"local x = 1\n".repeat(200))?;
        writer.add_file(hash_name("small.lua"), b"x")?;
        writer.finalize(&path)?;
        println!("Generated: {}", path);
    }

    println!("\nSeed corpus generated in: {}", corpus_dir);
    Ok(())
}
