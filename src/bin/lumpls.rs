use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use lumpfs::{FileSystem, FsysConfig, Namespace};
use tracing::{error, metadata::LevelFilter};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Mount archives and list or extract their lumps.
#[derive(Parser)]
#[clap(name = "lumpls", version)]
struct Args {
    /// Archives (or directories) to mount, oldest first.
    #[clap(required = true)]
    archives: Vec<PathBuf>,

    /// Print every mounted lump.
    #[clap(long)]
    list: bool,

    /// Lump name or file path to extract.
    #[clap(long, requires = "out")]
    extract: Option<String>,

    /// Where to write the extracted lump.
    #[clap(long)]
    out: Option<PathBuf>,

    /// Optional TOML config file.
    #[clap(long)]
    config: Option<PathBuf>,
}

fn fallible_main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => FsysConfig::load(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => FsysConfig::default(),
    };
    let mut fs = FileSystem::new(config);

    for path in &args.archives {
        let mounted = if path.is_dir() {
            fs.mount_disk_dir(path)
        } else {
            fs.add_disk_file(path, false)
        };
        mounted.with_context(|| format!("cannot mount {}", path.display()))?;
    }

    if args.list {
        for handle in fs.iter_namespace(Namespace::Any) {
            println!(
                "{} {:>10} {:<14} {}",
                handle,
                fs.lump_length(handle)?,
                fs.lump_namespace(handle).unwrap_or(Namespace::Global),
                fs.full_lump_name(handle).unwrap_or_default(),
            );
        }
    }

    if let (Some(name), Some(out)) = (&args.extract, &args.out) {
        let handle = match fs.check_num_for_file_name(name) {
            Some(handle) => handle,
            None => match fs.check_num_for_name(name, Namespace::AnyNamed) {
                Some(handle) => handle,
                None => bail!("lump {} not found", name),
            },
        };
        let data = fs.load_lump(handle)?;
        std::fs::write(out, &data).with_context(|| format!("cannot write {}", out.display()))?;
        println!("{} -> {} ({} bytes)", fs.full_lump_name(handle).unwrap_or_default(), out.display(), data.len());
    }

    Ok(())
}

fn main() {
    let subscriber = tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().without_time());
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("cannot set default tracing subscriber");
    }

    if let Err(err) = fallible_main() {
        error!("{err:?}");
        std::process::exit(1);
    }
}
