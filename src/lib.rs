//! # gxfkit
//!
//! A genomic feature model for BED, GFF3 and GTF annotations and the
//! nucleotide sequences they describe.
//!
//! ## Overview
//!
//! The crate parses flat, tab-delimited annotation files into
//! [`IntervalRecord`]s, collects them per chromosome in a [`FeatureIndex`],
//! moves coordinates between genomic and transcript-relative frames, merges
//! overlapping exons into non-redundant sets, converts gene models between
//! dialects with a small streaming state machine and extracts subsequences
//! from a FASTA reference.
//!
//! ## Features
//!
//! - **One record type for three dialects:** BED (0-based, half-open) is
//!   shifted on input so every record is 1-based and inclusive
//! - **Streaming readers:** buffered or memory-mapped, with transparent
//!   gzip/zstd/bzip2 decompression and optional feature-type filtering
//! - **Sequence values:** reverse complement, translation, six-frame ORF
//!   prediction and circular translation
//! - **Parallel work:** rayon-backed record parsing, ORF prediction and
//!   extraction behind the `rayon` feature
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! gxfkit = "0.1"
//!
//! # Optional features
//! gxfkit = { version = "0.1", features = ["compression", "mmap", "rayon"] }
//! ```
//!
//! ## Reading Annotations
//!
//! ```rust,no_run
//! use gxfkit::{Gff, Reader};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut reader = Reader::<Gff>::from_path("data/annotation.gff3.gz")?;
//!
//!     for record in reader.records() {
//!         let record = record?;
//!         println!("{} {} {}", record.feature_type, record.id, record.locus());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! Readers are configured through a builder, the same way for every dialect:
//!
//! ```rust,no_run
//! use gxfkit::{Gtf, Reader, ReaderMode, ReaderOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reader = Reader::<Gtf>::builder()
//!         .from_path("data/annotation.gtf")
//!         .mode(ReaderMode::Default)
//!         .buffer_capacity(128 * 1024)
//!         .options(ReaderOptions::new().feature_types(["exon", "CDS"]).require_feature("CDS"))
//!         .build()?;
//!
//!     let exons = reader.filter(|r| r.as_ref().map_or(true, |r| r.is_feature("exon"))).count();
//!     println!("{exons} exons");
//!     Ok(())
//! }
//! ```
//!
//! ## Indexing and Merging
//!
//! ```rust
//! use gxfkit::coords::merge_gene_exons;
//! use gxfkit::{FeatureIndex, Gtf, Reader};
//!
//! let gtf = "\
//! chr1\t.\texon\t1\t100\t.\t+\t.\tgene_id \"g1\"; transcript_id \"t1\";
//! chr1\t.\texon\t90\t150\t.\t+\t.\tgene_id \"g1\"; transcript_id \"t2\";
//! chr1\t.\texon\t400\t500\t.\t+\t.\tgene_id \"g1\"; transcript_id \"t2\";
//! ";
//! let reader = Reader::<Gtf>::from_reader(std::io::Cursor::new(gtf)).unwrap();
//! let index = FeatureIndex::from_reader(reader).unwrap();
//!
//! assert_eq!(index.overlapping("chr1", 120, 130).count(), 1);
//!
//! let genes = merge_gene_exons(&index, "exon").unwrap();
//! let (gene, chrom, exons) = &genes[0];
//! assert_eq!(gene, "g1");
//! assert_eq!(chrom, "chr1");
//! assert_eq!(exons.len(), 2);
//! assert_eq!(exons.total_length(), 251);
//! ```
//!
//! ## Extracting Sequences
//!
//! ```rust,no_run
//! use gxfkit::{Bed, ExtractOptions, Extractor, Flank, Reader, ReferenceStore};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reference = ReferenceStore::from_path("data/genome.fa.gz")?;
//!     let options = ExtractOptions::new().flank(Flank::up(500));
//!     let extractor = Extractor::new(&reference, options);
//!
//!     let reader = Reader::<Bed>::from_path("data/promoters.bed")?;
//!     for sequence in extractor.extract_reader(reader) {
//!         print!("{}", sequence?.to_fasta(60));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every layer has its own error enum ([`ReaderError`], [`WriterError`],
//! [`CoordError`], [`ConvertError`], [`ExtractError`]). Parse errors carry
//! the 1-based line number of the offending record.
//!
//! ## Feature Flags
//!
//! - `gzip` / `compression`: gzip support (adds `flate2`)
//! - `zstd`: zstd support (adds `zstd`)
//! - `bz2`: bzip2 support (adds `bzip2`)
//! - `mmap`: memory-mapped reading (adds `memmap2`)
//! - `rayon`: parallel parsing, ORF prediction and extraction (adds `rayon`)
//! - `cli`: the `gxfkit` binary (adds `clap` and `simple_logger`)
//!
//! ## Thread Safety
//!
//! `Reader` and `FastaReader` are `Send` but not `Sync`. `FeatureIndex` and
//! `ReferenceStore` are read-only once built and can be shared freely.

#![cfg_attr(doc, warn(missing_docs))]

pub mod bed;
pub mod convert;
pub mod coords;
pub mod extract;
pub mod fasta;
pub mod gxf;
pub mod index;
pub mod reader;
pub mod record;
pub mod sequence;
pub mod strand;
pub mod writer;

pub use bed::Bed;
pub use convert::{ConvertError, ConvertStats, Converter, Gsds};
pub use coords::{CoordError, ExonSet, Interval, TranscriptFrame, TranscriptModel};
pub use extract::{ExtractError, ExtractOptions, Extractor, Flank};
pub use fasta::{FastaReader, ReferenceStore};
pub use gxf::{Gff, Gtf};
pub use index::FeatureIndex;
pub use reader::{
    Compression, Reader, ReaderBuilder, ReaderError, ReaderMode, ReaderOptions, ReaderResult,
};
pub use record::{Attributes, IntervalRecord, RecordFormat};
pub use sequence::{Nucleotide, Protein, Sequence};
pub use strand::Strand;
pub use writer::{Writer, WriterError};
