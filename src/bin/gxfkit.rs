//! Command line front end for gxfkit.
//!
//! Every subcommand reads an annotation (and, where needed, a FASTA
//! reference), runs one library operation and writes plain text to stdout
//! or to `--output`. Logs go to stderr.

use std::error::Error;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, Level};

use gxfkit::convert::{convert, OutputDialect};
use gxfkit::coords::merge_gene_exons;
use gxfkit::fasta::FastaReader;
use gxfkit::writer::{create_sink, write_fasta};
use gxfkit::{
    Bed, ExtractOptions, Extractor, FeatureIndex, Flank, Gff, Gsds, Gtf, Nucleotide, Reader,
    ReaderOptions, RecordFormat, ReferenceStore,
};

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Parse, convert and extract BED/GFF/GTF annotations.
#[derive(Parser, Debug)]
#[command(name = "gxfkit")]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,

    /// Log debug messages
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a GFF/GTF gene model into GTF, BED or GSDS blocks
    Convert(ConvertArgs),

    /// Extract interval sequences from a FASTA reference
    Extract(ExtractArgs),

    /// Predict the longest ORF of every FASTA record
    Orf(OrfArgs),

    /// Merge the exons of every gene into a non-redundant set (BED output)
    Merge(MergeArgs),

    /// Print record counts per chromosome and feature type
    Stats(StatsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Dialect {
    Bed,
    Gff,
    Gtf,
}

impl Dialect {
    fn detect(path: &Path, explicit: Option<Dialect>) -> CliResult<Self> {
        if let Some(dialect) = explicit {
            return Ok(dialect);
        }

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let name = [".gz", ".zst", ".zstd", ".bz2"]
            .iter()
            .find_map(|ext| name.strip_suffix(ext))
            .unwrap_or(name.as_str());

        if name.ends_with(".bed") {
            Ok(Dialect::Bed)
        } else if name.ends_with(".gtf") {
            Ok(Dialect::Gtf)
        } else if name.ends_with(".gff") || name.ends_with(".gff3") {
            Ok(Dialect::Gff)
        } else {
            Err(format!(
                "cannot guess the format of {}; pass --format",
                path.display()
            )
            .into())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Target {
    Gtf,
    Bed,
    Gsds,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Annotation file (.bed/.gff/.gff3/.gtf, optionally compressed)
    #[arg(long, short)]
    annotation: PathBuf,

    /// Annotation format; guessed from the extension when omitted
    #[arg(long, short = 'f', value_enum)]
    format: Option<Dialect>,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Output dialect
    #[arg(long, short, value_enum, default_value_t = Target::Gtf)]
    to: Target,

    /// Output file; stdout when omitted
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Reference FASTA
    #[arg(long, short = 's')]
    fasta: PathBuf,

    /// Only extract records of this feature type
    #[arg(long, short = 't')]
    feature: Option<String>,

    /// Concatenate the `--feature` children of each parent instead
    #[arg(long, requires = "feature")]
    spliced: bool,

    /// Bases added upstream of each interval
    #[arg(long, short = 'u', default_value_t = 0)]
    upstream: u64,

    /// Bases added downstream of each interval
    #[arg(long, short = 'd', default_value_t = 0)]
    downstream: u64,

    /// Name outputs after the record id
    #[arg(long)]
    use_id: bool,

    /// Fail on intervals past the chromosome end instead of clamping
    #[arg(long)]
    strict_end: bool,

    /// FASTA line width (0 = no wrapping)
    #[arg(long, default_value_t = 60)]
    width: usize,

    /// Output file; stdout when omitted
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct OrfArgs {
    /// Input FASTA
    #[arg(long, short = 's')]
    fasta: PathBuf,

    /// Minimum peptide length
    #[arg(long, short, default_value_t = 30)]
    min_len: usize,

    /// Require ORFs to start with M and end with a stop
    #[arg(long)]
    complete: bool,

    /// Skip the reverse-complement frames
    #[arg(long)]
    forward_only: bool,

    /// Report every ATG-initiated ORF around a circular sequence
    #[arg(long, conflicts_with_all = ["complete", "forward_only"])]
    circular: bool,

    /// FASTA line width (0 = no wrapping)
    #[arg(long, default_value_t = 60)]
    width: usize,

    /// Output file; stdout when omitted
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct MergeArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Feature type holding the exons
    #[arg(long, short = 't', default_value = "exon")]
    feature: String,

    /// Output file; stdout when omitted
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct StatsArgs {
    #[command(flatten)]
    input: InputArgs,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::Debug
    } else if cli.quiet {
        Level::Error
    } else {
        Level::Info
    };
    if let Err(err) = simple_logger::init_with_level(level) {
        eprintln!("ERROR: cannot initialise logging: {err}");
    }

    let start = std::time::Instant::now();
    if let Err(err) = run(cli.cmd) {
        log::error!("{err}");
        std::process::exit(1);
    }
    info!("Elapsed time: {:.3?}", start.elapsed());
}

fn run(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Convert(args) => run_convert(args),
        Command::Extract(args) => run_extract(args),
        Command::Orf(args) => run_orf(args),
        Command::Merge(args) => run_merge(args),
        Command::Stats(args) => run_stats(args),
    }
}

fn open_output(path: Option<&Path>) -> CliResult<BufWriter<Box<dyn Write>>> {
    match path {
        Some(path) => Ok(create_sink(path)?),
        None => Ok(BufWriter::new(Box::new(io::stdout().lock()))),
    }
}

fn load_index(input: &InputArgs, options: ReaderOptions<'_>) -> CliResult<FeatureIndex> {
    let path = input.annotation.as_path();
    let index = match Dialect::detect(path, input.format)? {
        Dialect::Bed => FeatureIndex::from_path_with_options::<Bed, _>(path, options)?,
        Dialect::Gff => FeatureIndex::from_path_with_options::<Gff, _>(path, options)?,
        Dialect::Gtf => FeatureIndex::from_path_with_options::<Gtf, _>(path, options)?,
    };
    Ok(index)
}

fn run_convert(args: ConvertArgs) -> CliResult<()> {
    let path = args.input.annotation.as_path();
    let out = open_output(args.output.as_deref())?;

    match Dialect::detect(path, args.input.format)? {
        Dialect::Bed => Err("BED input has no gene hierarchy to convert".into()),
        Dialect::Gff => convert_to::<Gff>(path, args.to, out),
        Dialect::Gtf => convert_to::<Gtf>(path, args.to, out),
    }
}

fn convert_to<F: RecordFormat>(path: &Path, to: Target, out: impl Write) -> CliResult<()> {
    match to {
        Target::Gtf => convert_with::<F, Gtf>(path, out),
        Target::Bed => convert_with::<F, Bed>(path, out),
        Target::Gsds => convert_with::<F, Gsds>(path, out),
    }
}

fn convert_with<F: RecordFormat, D: OutputDialect>(path: &Path, out: impl Write) -> CliResult<()> {
    let reader = Reader::<F>::from_path(path)?;
    convert::<F, D, _>(reader, out)?;
    Ok(())
}

fn run_extract(args: ExtractArgs) -> CliResult<()> {
    let reference = ReferenceStore::from_path(&args.fasta)?;
    let options = extract_filter(args.feature.as_deref(), args.spliced);
    let index = load_index(&args.input, options)?;

    let extract_options = ExtractOptions::new()
        .flank(Flank {
            upstream: args.upstream,
            downstream: args.downstream,
        })
        .use_record_id(args.use_id)
        .clamp_end(!args.strict_end);
    let extractor = Extractor::new(&reference, extract_options);

    let mut out = open_output(args.output.as_deref())?;
    let mut written = 0usize;
    match (&args.feature, args.spliced) {
        (Some(feature), true) => {
            for sequence in extractor.extract_spliced(&index, feature)? {
                write_fasta(&mut out, &sequence?, args.width)?;
                written += 1;
            }
        }
        _ => {
            for sequence in extractor.extract(index.iter()) {
                write_fasta(&mut out, &sequence?, args.width)?;
                written += 1;
            }
        }
    }
    out.flush()?;

    info!("extracted {written} sequences");
    Ok(())
}

/// Reader options for `extract`: a plain `--feature` both filters and must
/// be present; spliced extraction reads everything.
fn extract_filter(feature: Option<&str>, spliced: bool) -> ReaderOptions<'_> {
    match (feature, spliced) {
        (Some(feature), false) => ReaderOptions::new()
            .feature_type(feature)
            .require_feature(feature),
        _ => ReaderOptions::new(),
    }
}

fn run_orf(args: OrfArgs) -> CliResult<()> {
    let reader: FastaReader = FastaReader::from_path(&args.fasta)?;
    let mut out = open_output(args.output.as_deref())?;
    let mut found = 0usize;

    for sequence in reader {
        let sequence: Nucleotide = sequence?;
        if args.circular {
            for (_, peptide) in sequence.circular_translate() {
                if peptide.len() >= args.min_len {
                    write_fasta(&mut out, &peptide, args.width)?;
                    found += 1;
                }
            }
        } else if let Some(peptide) =
            sequence.orf_predict(args.min_len, args.complete, args.forward_only)
        {
            write_fasta(&mut out, &peptide, args.width)?;
            found += 1;
        }
    }
    out.flush()?;

    info!("wrote {found} peptides");
    Ok(())
}

fn run_merge(args: MergeArgs) -> CliResult<()> {
    let index = load_index(&args.input, ReaderOptions::new())?;
    let genes = merge_gene_exons(&index, &args.feature)?;
    let mut out = open_output(args.output.as_deref())?;

    for (gene, chrom, exons) in &genes {
        for exon in exons.iter() {
            writeln!(out, "{chrom}\t{}\t{}\t{gene}", exon.start - 1, exon.end)?;
        }
    }
    out.flush()?;

    info!("merged exons of {} genes", genes.len());
    Ok(())
}

fn run_stats(args: StatsArgs) -> CliResult<()> {
    let index = load_index(&args.input, ReaderOptions::new())?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "records\t{}", index.len())?;
    for chrom in index.chromosomes() {
        let count = index.get(chrom).map_or(0, <[_]>::len);
        writeln!(out, "chrom\t{chrom}\t{count}")?;
    }
    for feature in index.feature_types() {
        let count = index.iter().filter(|record| record.is_feature(feature)).count();
        writeln!(out, "feature\t{feature}\t{count}")?;
    }
    Ok(())
}
