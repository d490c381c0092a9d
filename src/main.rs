use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use unbundle::bundle::Bundle;
use unbundle::extract::{DirectorySink, ExtractOptions, Extractor};
use unbundle::manifest::Outcome;
use unbundle::object::EntryState;

#[derive(Parser)]
#[command(name = "unbundle", version, about = "Inspect and extract game asset bundles")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode every entry and write the results to a directory
    Extract {
        input: PathBuf,
        #[arg(short = 'o', long, default_value = "out")]
        output_dir: PathBuf,
        /// Worker threads (0 = one per core)
        #[arg(short = 'j', long, default_value = "0")]
        threads: usize,
        /// Sort outputs into textures/, audio/, text/, ... folders
        #[arg(short, long)]
        group: bool,
        /// Manifest path (default: <output_dir>/manifest.json)
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Do not write a manifest file
        #[arg(long, conflicts_with = "manifest")]
        no_manifest: bool,
        /// Also write a browsable HTML report to this path
        #[arg(long)]
        html: Option<PathBuf>,
        /// No progress line
        #[arg(short, long)]
        quiet: bool,
    },
    /// List directory entries
    List {
        input: PathBuf,
    },
    /// Show container metadata and resolution statistics
    Info {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { input, output_dir, threads, group, manifest, no_manifest, html, quiet } => {
            let bundle = Bundle::open(&input)?;
            let options = ExtractOptions { threads, group_by_kind: group };
            let mut extractor = Extractor::new(DirectorySink::new(&output_dir)?).with_options(options);
            if !quiet {
                extractor = extractor.on_progress(|done, total| {
                    eprint!("\r  {done}/{total}");
                    let _ = std::io::stderr().flush();
                });
            }
            let result = bundle.extract_with(&extractor);
            if !quiet {
                eprintln!();
            }

            for row in result.entries.iter().filter(|e| e.outcome == Outcome::Failed) {
                println!("  failed   {:<32} {}", row.source_name, row.reason.as_deref().unwrap_or(""));
            }
            println!("{}: {}", bundle.name(), result.summary());

            if !no_manifest {
                let path = manifest.unwrap_or_else(|| output_dir.join("manifest.json"));
                std::fs::write(&path, result.to_json()?)?;
                println!("Manifest: {}", path.display());
            }
            if let Some(path) = html {
                std::fs::write(&path, result.to_html())?;
                println!("Report:   {}", path.display());
            }
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input } => {
            let bundle = Bundle::open(&input)?;
            println!("Bundle: {} (v{})", input.display(), bundle.version());
            println!("{:>5}  {:<32} {:<16} {:>12} {:>6}  CRC", "#", "Name", "Type", "Stored", "Codec");
            for e in bundle.list() {
                println!(
                    "{:>5}  {:<32} {:<16} {:>12} {:>6}  {}",
                    e.index,
                    e.name,
                    format!("{}({})", e.type_name, e.type_tag),
                    e.stored_size,
                    e.compression.name(),
                    if e.has_checksum { "yes" } else { "-" },
                );
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let bytes = std::fs::read(&input)?;
            let hash = blake3::hash(&bytes);
            let bundle = Bundle::from_bytes(input.display().to_string(), bytes)?;
            let graph = bundle.resolve();
            let header = bundle.header();
            let failed = graph
                .entries
                .iter()
                .filter(|(_, s)| matches!(s, EntryState::Failed(_)))
                .count();

            println!("── Asset bundle ─────────────────────────────────────────");
            println!("  Path            {}", input.display());
            println!("  Size            {} B", bundle.container_size());
            println!("  BLAKE3          {}", hex::encode(hash.as_bytes()));
            println!("  Format version  {}", header.version);
            println!("  Object endian   {:?}", header.object_endian());
            println!("  Directory at    {} B", header.directory_offset);
            println!("  Entries         {}", header.entry_count);
            println!("  Objects         {}", graph.len());
            println!("  Unreadable      {}", failed);
            println!("  Cycles broken   {}", graph.broken_cycles);
            println!("  Dangling refs   {}", graph.dangling);
        }
    }
    Ok(())
}
