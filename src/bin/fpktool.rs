use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use fpk_rs::extract::output_paths;
use fpk_rs::hash::hash_name_hex;
use fpk_rs::pack::{default_manifest_path, default_output_path, pack_directory};
use fpk_rs::reconcile::{reconcile, write_associations};
use fpk_rs::rip::rip_directory;
use fpk_rs::{ArchiveReader, Extractor, Generation, NameDatabase, OutputLayout, ToolConfig};

/// Zstd level used by `pack --compress` when the config names none
const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

#[derive(Parser)]
#[command(name = "fpktool", version, about = "FPK/ICE archive tooling")]
struct Cli {
    /// TOML config file; missing keys and a missing file take defaults
    #[arg(long, global = true, default_value = "fpktool.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Unpack an archive next to itself, naming entries through the table
    Extract {
        archive: PathBuf,
        /// Table layout; detected from the file when omitted
        #[arg(long)]
        generation: Option<Generation>,
        /// Name table to use instead of the configured one
        #[arg(long)]
        names: Option<PathBuf>,
        /// Print the extraction report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Repack an extraction directory in manifest order
    Pack {
        dir: PathBuf,
        /// Table layout; taken from the manifest's key width when omitted
        #[arg(long)]
        generation: Option<Generation>,
        /// Defaults to the manifest written by `extract`
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Defaults to `<dir>new.ice` beside `dir`
        #[arg(long)]
        output: Option<PathBuf>,
        /// Zstd-compress NGS payloads
        #[arg(long)]
        compress: bool,
    },
    /// Pair unnamed files with named ones by content checksum
    Reconcile {
        unnamed_dir: PathBuf,
        named_dir: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the NGS table key of each name
    Hash {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Harvest script names from decompiled sources into the NGS table
    Rip {
        dir: PathBuf,
        #[arg(long)]
        names: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ToolConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    match cli.command {
        Commands::Extract {
            archive,
            generation,
            names,
            json,
        } => cmd_extract(&config, &archive, generation, names, json),
        Commands::Pack {
            dir,
            generation,
            manifest,
            output,
            compress,
        } => cmd_pack(&config, &dir, generation, manifest, output, compress),
        Commands::Reconcile {
            unnamed_dir,
            named_dir,
            output,
        } => cmd_reconcile(&config, &unnamed_dir, &named_dir, output),
        Commands::Hash { names } => {
            for name in names {
                println!("{} {}", hash_name_hex(&name), name);
            }
            Ok(())
        }
        Commands::Rip { dir, names } => cmd_rip(&config, &dir, names),
    }
}

fn cmd_extract(
    config: &ToolConfig,
    archive: &Path,
    generation: Option<Generation>,
    names: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let reader = ArchiveReader::open(archive, generation)
        .with_context(|| format!("reading {}", archive.display()))?;

    let table = names.unwrap_or_else(|| config.names_table_for(reader.generation()).to_path_buf());
    let names = NameDatabase::load_from_path(&table, reader.generation())
        .with_context(|| format!("loading name table {}", table.display()))?;

    let (output_dir, manifest_path) = output_paths(archive);
    let report = Extractor::new(&names, OutputLayout::from_config(config)).extract(
        &reader,
        &output_dir,
        &manifest_path,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{}: {} files ({} named, {} unnamed) -> {}",
            archive.display(),
            report.extracted,
            report.known,
            report.unknown,
            report.output_dir.display()
        );
        if !report.decompression_failures.is_empty() {
            println!(
                "  kept stored bytes for {} entries",
                report.decompression_failures.len()
            );
        }
    }
    Ok(())
}

fn cmd_pack(
    config: &ToolConfig,
    dir: &Path,
    generation: Option<Generation>,
    manifest: Option<PathBuf>,
    output: Option<PathBuf>,
    compress: bool,
) -> anyhow::Result<()> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }

    let manifest = manifest.unwrap_or_else(|| default_manifest_path(dir));
    let output = output.unwrap_or_else(|| default_output_path(dir));
    let compression = match (compress, config.ngs_compression_level) {
        (true, level) => Some(level.unwrap_or(DEFAULT_COMPRESSION_LEVEL)),
        (false, level) => level,
    };

    let writer = pack_directory(
        dir,
        &manifest,
        generation,
        &OutputLayout::from_config(config),
        compression,
    )
    .with_context(|| format!("packing {} from {}", dir.display(), manifest.display()))?;

    let entries = writer.entry_count();
    let generation = writer.generation();
    let written = writer.finalize(&output)?;
    println!(
        "{}: {} {} entries, {} bytes",
        output.display(),
        entries,
        generation,
        written
    );
    Ok(())
}

fn cmd_reconcile(
    config: &ToolConfig,
    unnamed_dir: &Path,
    named_dir: &Path,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let output = output.unwrap_or_else(|| config.reconcile_output.clone());
    let associations = reconcile(unnamed_dir, named_dir)?;
    write_associations(&output, &associations)?;
    println!("{}: {} associations", output.display(), associations.len());
    Ok(())
}

fn cmd_rip(config: &ToolConfig, dir: &Path, names: Option<PathBuf>) -> anyhow::Result<()> {
    let table = names.unwrap_or_else(|| config.names_table.clone());
    let mut names = NameDatabase::load_from_path(&table, Generation::Ngs)
        .with_context(|| format!("loading name table {}", table.display()))?;

    let added = rip_directory(dir, &config.rip_extension, &mut names)?;
    let saved = names.save_new(&table)?;
    println!("{}: {} new names", saved.display(), added);
    Ok(())
}
