use clap::{ArgAction, ArgGroup, Parser};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::path::PathBuf;
use timestamp_channel::{CovertChannel, FsStore, Layout};
use tracing_subscriber::EnvFilter;

const ABOUT: &str = "\
Covert channel that hides a file in the timestamps of a directory of files.

Send data:
    tsc -p <storage_path> -i <input_path>

Receive data:
    tsc -p <storage_path> -o <output_path>";

#[derive(Parser)]
#[command(name = "tsc", version, about = ABOUT)]
#[command(group(ArgGroup::new("mode").required(true).args(["input", "output", "scan"])))]
struct Cli {
    /// Directory whose files carry the data
    #[arg(short = 'p', long = "path")]
    storage_path: PathBuf,
    /// File to hide
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Where to write the recovered file; its extension is appended
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Classify carriers without modifying them
    #[arg(long)]
    scan: bool,
    /// Seed for the placement offset (random when omitted)
    #[arg(long)]
    seed: Option<u64>,
    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
    /// Log verbosity: -v debug, -vv trace
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut channel = CovertChannel::new(FsStore::new())?;
    let dir = &cli.storage_path;

    // ── Hide ─────────────────────────────────────────────────────────────────
    if let Some(input) = &cli.input {
        print_capacity(channel.layout(), cli.json);
        let mut rng = match cli.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None       => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        let report = channel.hide_file(dir, input, &mut rng)?;
        if cli.json {
            print_json(&report)?;
        } else {
            println!("Data storage required {} files ({} data, {} index)",
                     report.records_written, report.data_chunks, report.index_records);
            println!("Successfully embedded data in {} of {} files",
                     report.records_written, report.carriers_available);
        }

    // ── Extract ──────────────────────────────────────────────────────────────
    } else if let Some(output) = &cli.output {
        let report = channel.extract_to(dir, output)?;
        if cli.json {
            print_json(&report)?;
        } else {
            println!("Scanned {} files", report.carriers_scanned);
            println!("Found data for {} files", report.records_used);
            println!("Recovered {} bytes -> {}", report.payload_bytes, report.output.display());
        }

    // ── Scan ─────────────────────────────────────────────────────────────────
    } else {
        let report = channel.scan(dir)?;
        if cli.json {
            print_json(&report)?;
        } else {
            println!("{}", report.summary());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_capacity(layout: &Layout, json: bool) {
    if json {
        return;
    }
    println!("Able to store {} bytes per file", layout.bytes_per_carrier());
    println!("Max able to store in {} files is {} bytes ({} after error correction)",
             layout.max_window_index(), layout.max_framed_bytes(), layout.max_message_bytes());
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
