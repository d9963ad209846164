//! Command line tool for building, checking and inspecting partitioned Psi vectors.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use simple_sds::int_vector::IntVector;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use psi_vector::{
    psi_from_text, BufferedSequence, CompressedVector, EliasDelta, EliasGamma, EncVector,
    EncVectorConfig, PartitionedVector, RunLengthVector, Sequence,
};

#[derive(Debug, Parser)]
#[command(name = "psi-vector")]
#[command(about = "Alphabet-partitioned compressed Psi vectors", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute the Psi array of an input and write the compressed vector
    Build(BuildArgs),
    /// Check a stored vector against the Psi array of its input
    Verify(VerifyArgs),
    /// Print the size of a stored vector
    Stats(StatsArgs),
}

#[derive(Debug, Args)]
struct EncodingArgs {
    /// Inner encoding of each partition; must match when reading a vector back
    #[arg(short, long, default_value = "rle")]
    encoding: Encoding,

    /// Sample density of the delta-coded encodings
    #[arg(long, default_value = "128")]
    sample_density: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Encoding {
    /// Bit-packed values
    Packed,
    /// Sampled Elias delta coded differences
    Enc,
    /// Sampled Elias gamma coded differences
    Gamma,
    /// Runs of consecutive values
    Rle,
}

#[derive(Debug, Args)]
struct InputArgs {
    /// Input file: a text, or raw little-endian u64 words with --words
    input: PathBuf,

    /// Treat the input as a precomputed sequence of u64 words
    #[arg(long)]
    words: bool,
}

#[derive(Debug, Args)]
struct BuildArgs {
    #[command(flatten)]
    encoding: EncodingArgs,

    #[command(flatten)]
    input: InputArgs,

    /// Output file for the serialized vector
    output: PathBuf,

    /// Build the partitions in parallel
    #[arg(long)]
    parallel: bool,
}

#[derive(Debug, Args)]
struct VerifyArgs {
    #[command(flatten)]
    encoding: EncodingArgs,

    #[command(flatten)]
    input: InputArgs,

    /// Serialized vector to check
    index: PathBuf,
}

#[derive(Debug, Args)]
struct StatsArgs {
    #[command(flatten)]
    encoding: EncodingArgs,

    /// Serialized vector to inspect
    index: PathBuf,
}

// Maps command line flags to the construction parameters of an encoding.
trait CliEncoding: CompressedVector + Send {
    fn config(args: &EncodingArgs) -> Self::Config;
}

impl CliEncoding for IntVector {
    fn config(_args: &EncodingArgs) {}
}

impl CliEncoding for RunLengthVector {
    fn config(_args: &EncodingArgs) {}
}

impl CliEncoding for EncVector<EliasDelta> {
    fn config(args: &EncodingArgs) -> EncVectorConfig {
        EncVectorConfig {
            sample_density: args.sample_density,
        }
    }
}

impl CliEncoding for EncVector<EliasGamma> {
    fn config(args: &EncodingArgs) -> EncVectorConfig {
        EncVectorConfig {
            sample_density: args.sample_density,
        }
    }
}

macro_rules! with_encoding {
    ($encoding:expr, $func:ident, $args:expr) => {
        match $encoding {
            Encoding::Packed => $func::<IntVector>($args),
            Encoding::Enc => $func::<EncVector<EliasDelta>>($args),
            Encoding::Gamma => $func::<EncVector<EliasGamma>>($args),
            Encoding::Rle => $func::<RunLengthVector>($args),
        }
    };
}

fn main() -> Result<()> {
    setup_logging("info");

    let cli = Cli::parse();
    match cli.command {
        Command::Build(args) => with_encoding!(args.encoding.encoding, build, &args),
        Command::Verify(args) => with_encoding!(args.encoding.encoding, verify, &args),
        Command::Stats(args) => with_encoding!(args.encoding.encoding, stats, &args),
    }
}

fn setup_logging(directives: &str) {
    let main_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives)))
        .with(main_layer)
        .init()
}

fn build<C: CliEncoding>(args: &BuildArgs) -> Result<()>
where
    C::Config: Sync,
{
    let config = C::config(&args.encoding);
    let input = &args.input;

    let pv = if input.words && !args.parallel {
        // Stream the words instead of reading the whole file.
        let seq = BufferedSequence::open(&input.input)
            .with_context(|| format!("failed to open {}", input.input.display()))?;
        PartitionedVector::<C>::build_with_config(seq, &config)
    } else {
        let values = read_input(input)?;
        if args.parallel {
            PartitionedVector::<C>::build_parallel(&values, &config)
        } else {
            PartitionedVector::<C>::build_with_config(&values, &config)
        }
    }
    .context("failed to build the partitioned vector")?;

    pv.save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(
        "wrote {}: {} elements, {} partitions, {} bytes, {:.3} bits per element",
        args.output.display(),
        pv.len(),
        pv.partition_count(),
        pv.size_in_bytes(),
        bits_per_element(pv.size_in_bytes(), pv.len())
    );
    Ok(())
}

fn verify<C: CliEncoding>(args: &VerifyArgs) -> Result<()> {
    let pv = open::<C>(&args.index)?;
    let values = read_input(&args.input)?;
    if pv.len() != values.len() {
        bail!(
            "{} holds {} elements, the input has {}",
            args.index.display(),
            pv.len(),
            values.len()
        );
    }

    let mut mismatches = 0;
    for (i, &expected) in values.iter().enumerate() {
        let value = pv.get(i)?;
        if value != expected {
            if mismatches == 0 {
                info!("first mismatch at {}: found {}, expected {}", i, value, expected);
            }
            mismatches += 1;
        }
    }
    if mismatches > 0 {
        bail!("{} of {} elements differ", mismatches, values.len());
    }
    info!("verified {} elements", values.len());
    Ok(())
}

fn stats<C: CliEncoding>(args: &StatsArgs) -> Result<()> {
    let pv = open::<C>(&args.index)?;
    println!("elements:         {}", pv.len());
    println!("partitions:       {}", pv.partition_count());
    println!("index bytes:      {}", pv.index().size_in_bytes());
    println!("total bytes:      {}", pv.size_in_bytes());
    println!(
        "bits per element: {:.3}",
        bits_per_element(pv.size_in_bytes(), pv.len())
    );
    Ok(())
}

fn open<C: CliEncoding>(path: &Path) -> Result<PartitionedVector<C>> {
    PartitionedVector::<C>::open(path).with_context(|| format!("failed to load {}", path.display()))
}

// The Psi array of a text, or the words of a precomputed sequence.
fn read_input(input: &InputArgs) -> Result<Vec<u64>> {
    let path = &input.input;
    if input.words {
        let mut seq = BufferedSequence::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let values = (0..seq.len())
            .map(|i| seq.value(i))
            .collect::<psi_vector::Result<Vec<u64>>>()
            .with_context(|| format!("failed to read {}", path.display()))?;
        return Ok(values);
    }
    let text = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    info!("computing Psi for {} bytes of text", text.len());
    Ok(psi_from_text(&text))
}

fn bits_per_element(bytes: usize, len: usize) -> f64 {
    (8 * bytes) as f64 / len.max(1) as f64
}
