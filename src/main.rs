//
// rustar - POSIX ustar archiver
//
// @license GNU General Public License v2.0
//
// This program is free software; you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the
// Free Software Foundation; either version 2 of the License, or (at your
// option) any later version.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rustar::Options;

// ===================================================================================
// CLI DEFINITION AND DISPATCH
// ===================================================================================

#[derive(Parser, Debug)]
#[command(
    author, version,
    about = "POSIX ustar archiver",
    long_about = "Creates, lists and extracts POSIX ustar tape archives."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an archive from one or more files or directories.
    #[command(alias = "c")]
    Create(CreateArgs),

    /// List the entries of an archive.
    #[command(alias = "t")]
    List(ListArgs),

    /// Extract an archive's entries to the filesystem.
    #[command(alias = "x")]
    Extract(ExtractArgs),
}

#[derive(Parser, Debug)]
struct CreateArgs {
    /// Path of the archive to write.
    #[arg(short = 'f', long = "file", required = true)]
    archive: PathBuf,

    /// Files or directories to archive.
    #[arg(required = true)]
    roots: Vec<PathBuf>,

    /// Print each path as it is archived.
    #[arg(short, long)]
    verbose: bool,

    /// Fail on values that exceed octal field capacity.
    #[arg(short = 'S', long)]
    strict: bool,
}

#[derive(Parser, Debug)]
struct ListArgs {
    /// Path of the archive to read.
    #[arg(short = 'f', long = "file", required = true)]
    archive: PathBuf,

    /// Only list entries under these path prefixes.
    paths: Vec<String>,

    /// Long listing: permissions, owner, size and time per entry.
    #[arg(short, long)]
    verbose: bool,

    /// Reject headers with an unsupported ustar version.
    #[arg(short = 'S', long)]
    strict: bool,
}

#[derive(Parser, Debug)]
struct ExtractArgs {
    /// Path of the archive to read.
    #[arg(short = 'f', long = "file", required = true)]
    archive: PathBuf,

    /// Only extract entries under these path prefixes.
    paths: Vec<String>,

    /// Destination directory.
    #[arg(short = 'C', long = "directory", default_value = ".")]
    directory: PathBuf,

    /// Print each path as it is extracted.
    #[arg(short, long)]
    verbose: bool,

    /// Reject headers with an unsupported ustar version.
    #[arg(short = 'S', long)]
    strict: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Create(args) => {
            let opts = Options {
                verbose: args.verbose,
                strict: args.strict,
            };
            let out = File::create(&args.archive)
                .with_context(|| format!("failed to create '{}'", args.archive.display()))?;
            let mut out = BufWriter::new(out);
            rustar::create(&args.roots, &mut out, &opts)
                .with_context(|| format!("failed to archive into '{}'", args.archive.display()))?;
        }
        Commands::List(args) => {
            let opts = Options {
                verbose: args.verbose,
                strict: args.strict,
            };
            let mut archive = open_archive(&args.archive)?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            rustar::list(&mut archive, &mut out, &args.paths, &opts)
                .with_context(|| format!("failed to list '{}'", args.archive.display()))?;
        }
        Commands::Extract(args) => {
            let opts = Options {
                verbose: args.verbose,
                strict: args.strict,
            };
            let mut archive = open_archive(&args.archive)?;
            rustar::extract(&mut archive, &args.directory, &args.paths, &opts)
                .with_context(|| format!("failed to extract '{}'", args.archive.display()))?;
        }
    }

    Ok(())
}

fn open_archive(path: &Path) -> Result<BufReader<File>> {
    let file =
        File::open(path).with_context(|| format!("failed to open '{}'", path.display()))?;
    Ok(BufReader::new(file))
}
