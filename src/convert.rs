//! Streaming annotation dialect conversion.
//!
//! The converter walks records in file order, tracks the open gene and
//! transcript and coalesces contiguous `CDS`/`UTR` rows of one transcript
//! into a single block before writing it in the target dialect.

use std::fmt;
use std::io::{self, Write};
use std::marker::PhantomData;

use crate::bed::Bed;
use crate::coords::{CoordError, TranscriptFrame};
use crate::gxf::Gtf;
use crate::reader::{Reader, ReaderError};
use crate::record::{AttributeStyle, IntervalRecord, RecordFormat};
use crate::strand::Strand;
use crate::writer::{write_attributes, write_strand, write_u64, WriterError};

/// Result alias for conversion.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// An error raised while converting between dialects.
#[derive(Debug)]
pub enum ConvertError {
    /// Reading the input failed.
    Reader(ReaderError),
    /// Writing the output failed.
    Writer(WriterError),
    /// A block could not be placed in its transcript frame, or its strand
    /// differs from the transcript's.
    Coord(CoordError),
    /// A row names a parent other than the open gene or transcript.
    SortOrderViolation {
        /// 1-based input line.
        line: usize,
        /// Id of the open context.
        expected: String,
        /// Parent named by the row.
        found: String,
    },
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::Reader(err) => write!(f, "{err}"),
            ConvertError::Writer(err) => write!(f, "{err}"),
            ConvertError::Coord(err) => write!(f, "{err}"),
            ConvertError::SortOrderViolation {
                line,
                expected,
                found,
            } => write!(
                f,
                "ERROR: line {line} belongs to '{found}' but '{expected}' is open; input is not sorted by parent"
            ),
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConvertError::Reader(err) => Some(err),
            ConvertError::Writer(err) => Some(err),
            ConvertError::Coord(err) => Some(err),
            ConvertError::SortOrderViolation { .. } => None,
        }
    }
}

impl From<ReaderError> for ConvertError {
    fn from(err: ReaderError) -> Self {
        ConvertError::Reader(err)
    }
}

impl From<WriterError> for ConvertError {
    fn from(err: WriterError) -> Self {
        ConvertError::Writer(err)
    }
}

impl From<CoordError> for ConvertError {
    fn from(err: CoordError) -> Self {
        ConvertError::Coord(err)
    }
}

impl From<io::Error> for ConvertError {
    fn from(err: io::Error) -> Self {
        ConvertError::Writer(WriterError::Io(err))
    }
}

/// Coalescing class of a sub-feature row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubFeature {
    /// Coding sequence.
    Cds,
    /// Any untranslated region (`five_prime_UTR`, `3UTR`, ...).
    Utr,
}

impl SubFeature {
    /// Classifies a feature type; `None` for rows the converter skips.
    ///
    /// # Example
    ///
    /// ```
    /// use gxfkit::convert::SubFeature;
    ///
    /// assert_eq!(SubFeature::classify("cds"), Some(SubFeature::Cds));
    /// assert_eq!(SubFeature::classify("five_prime_UTR"), Some(SubFeature::Utr));
    /// assert_eq!(SubFeature::classify("3UTR"), Some(SubFeature::Utr));
    /// assert_eq!(SubFeature::classify("exon"), None);
    /// ```
    pub fn classify(feature_type: &str) -> Option<Self> {
        if feature_type.eq_ignore_ascii_case("cds") {
            Some(SubFeature::Cds)
        } else if feature_type.to_ascii_lowercase().contains("utr") {
            Some(SubFeature::Utr)
        } else {
            None
        }
    }

    /// Label used in GSDS output.
    pub fn as_str(self) -> &'static str {
        match self {
            SubFeature::Cds => "CDS",
            SubFeature::Utr => "UTR",
        }
    }
}

/// A coalesced run of sub-features, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Chromosome.
    pub chrom: String,
    /// Source column of the first row.
    pub source: String,
    /// 1-based inclusive start.
    pub start: u64,
    /// 1-based inclusive end.
    pub end: u64,
    /// Strand of the rows.
    pub strand: Strand,
    /// Class of the first row.
    pub class: SubFeature,
    /// Phase of the first row.
    pub phase: Option<u8>,
    /// Gene of the open transcript.
    pub gene_id: String,
    /// Open transcript.
    pub transcript_id: String,
    /// Frame of the open transcript.
    pub frame: TranscriptFrame,
}

/// Outcome of [`coalesce`].
#[derive(Debug, Clone, PartialEq)]
pub enum Coalesced {
    /// Nothing was pending; the incoming block is now pending.
    Buffered(Block),
    /// The incoming block extended the pending one.
    Merged(Block),
    /// The pending block must be written; the incoming one replaces it.
    Flushed {
        /// Block to write now.
        emit: Block,
        /// New pending block.
        pending: Block,
    },
}

/// Decides whether `incoming` extends `pending`.
///
/// Blocks merge when they share a transcript, are directly contiguous
/// (`prev.end + 1 == curr.start`) and, with `separate_classes`, have the same
/// class.
///
/// # Example
///
/// ```
/// use gxfkit::convert::{coalesce, Block, Coalesced, SubFeature};
/// use gxfkit::coords::TranscriptFrame;
/// use gxfkit::strand::Strand;
///
/// let block = |start, end, class| Block {
///     chrom: "chr1".into(),
///     source: ".".into(),
///     start,
///     end,
///     strand: Strand::Forward,
///     class,
///     phase: None,
///     gene_id: "g1".into(),
///     transcript_id: "t1".into(),
///     frame: TranscriptFrame::new(1, 100, Strand::Forward),
/// };
///
/// let first = block(1, 50, SubFeature::Utr);
/// match coalesce(Some(first.clone()), block(51, 100, SubFeature::Cds), false) {
///     Coalesced::Merged(merged) => assert_eq!((merged.start, merged.end), (1, 100)),
///     other => panic!("unexpected {other:?}"),
/// }
/// assert!(matches!(
///     coalesce(Some(first), block(51, 100, SubFeature::Cds), true),
///     Coalesced::Flushed { .. }
/// ));
/// ```
pub fn coalesce(pending: Option<Block>, incoming: Block, separate_classes: bool) -> Coalesced {
    match pending {
        None => Coalesced::Buffered(incoming),
        Some(mut prev)
            if prev.transcript_id == incoming.transcript_id
                && (!separate_classes || prev.class == incoming.class)
                && prev.end + 1 == incoming.start =>
        {
            prev.end = incoming.end;
            Coalesced::Merged(prev)
        }
        Some(prev) => Coalesced::Flushed {
            emit: prev,
            pending: incoming,
        },
    }
}

/// A target dialect of the converter.
pub trait OutputDialect {
    /// Human readable name (for logs).
    const NAME: &'static str;
    /// Keep `CDS` and `UTR` runs apart when coalescing.
    const SEPARATE_CLASSES: bool;
    /// Parent mismatches abort the conversion instead of dropping the row.
    const STRICT_ORDER: bool;

    /// Writes one coalesced block.
    fn write_block<W: Write>(block: &Block, writer: &mut W) -> ConvertResult<()>;
}

/// Marker type for GSDS (Gene Structure Display Server) output.
///
/// Each line is `transcript_id  local_start  local_end  feature  phase`
/// with 0-based start and exclusive end relative to the transcript 5' end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gsds;

impl OutputDialect for Gtf {
    const NAME: &'static str = "GTF";
    const SEPARATE_CLASSES: bool = false;
    const STRICT_ORDER: bool = true;

    fn write_block<W: Write>(block: &Block, writer: &mut W) -> ConvertResult<()> {
        writer.write_all(block.chrom.as_bytes())?;
        writer.write_all(b"\t")?;
        writer.write_all(block.source.as_bytes())?;
        writer.write_all(b"\texon\t")?;
        write_u64(writer, block.start)?;
        writer.write_all(b"\t")?;
        write_u64(writer, block.end)?;
        writer.write_all(b"\t.\t")?;
        write_strand(writer, block.strand)?;
        writer.write_all(b"\t.\t")?;
        write_attributes(
            writer,
            [
                ("gene_id", block.gene_id.as_str()),
                ("transcript_id", block.transcript_id.as_str()),
            ]
            .into_iter(),
            b' ',
            true,
        )?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl OutputDialect for Bed {
    const NAME: &'static str = "BED";
    const SEPARATE_CLASSES: bool = false;
    const STRICT_ORDER: bool = true;

    fn write_block<W: Write>(block: &Block, writer: &mut W) -> ConvertResult<()> {
        writer.write_all(block.chrom.as_bytes())?;
        writer.write_all(b"\t")?;
        write_u64(writer, block.start - 1)?;
        writer.write_all(b"\t")?;
        write_u64(writer, block.end)?;
        writer.write_all(b"\t")?;
        writer.write_all(block.transcript_id.as_bytes())?;
        writer.write_all(b"\t0\t")?;
        write_strand(writer, block.strand)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl OutputDialect for Gsds {
    const NAME: &'static str = "GSDS";
    const SEPARATE_CLASSES: bool = true;
    const STRICT_ORDER: bool = false;

    fn write_block<W: Write>(block: &Block, writer: &mut W) -> ConvertResult<()> {
        let (start, end) = block.frame.to_local(block.start, block.end)?;
        writer.write_all(block.transcript_id.as_bytes())?;
        writer.write_all(b"\t")?;
        write_u64(writer, start)?;
        writer.write_all(b"\t")?;
        write_u64(writer, end + 1)?;
        writer.write_all(b"\t")?;
        writer.write_all(block.class.as_str().as_bytes())?;
        writer.write_all(b"\t")?;
        match block.phase {
            Some(phase) => write_u64(writer, u64::from(phase))?,
            None => writer.write_all(b".")?,
        }
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Where the converter is in the gene/transcript hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConverterState {
    /// No gene or transcript seen yet.
    NoContext,
    /// A gene row is open.
    InGene {
        /// Id of the open gene.
        gene_id: String,
    },
    /// A transcript row is open.
    InTranscript {
        /// Gene of the open transcript.
        gene_id: String,
        /// Id of the open transcript.
        transcript_id: String,
        /// Genomic frame of the open transcript.
        frame: TranscriptFrame,
    },
}

impl ConverterState {
    /// Id of the open gene, if any.
    pub fn gene_id(&self) -> Option<&str> {
        match self {
            ConverterState::NoContext => None,
            ConverterState::InGene { gene_id } | ConverterState::InTranscript { gene_id, .. } => {
                Some(gene_id)
            }
        }
    }

    /// Id of the open transcript, if any.
    pub fn transcript_id(&self) -> Option<&str> {
        match self {
            ConverterState::InTranscript { transcript_id, .. } => Some(transcript_id),
            _ => None,
        }
    }
}

/// Counters reported at the end of a conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertStats {
    /// Records fed to the converter.
    pub records: usize,
    /// Blocks written.
    pub emitted: usize,
    /// Rows folded into a pending block.
    pub merged: usize,
    /// Rows of types the converter does not emit.
    pub skipped: usize,
    /// Rows dropped after a parent mismatch.
    pub dropped: usize,
}

/// The streaming converter.
///
/// Feed records in file order with [`Converter::feed`] and call
/// [`Converter::finish`] to flush the last pending block.
///
/// # Example
///
/// ```
/// use gxfkit::convert::Converter;
/// use gxfkit::{Gff, Gtf, Reader};
///
/// let gff = "\
/// chr1\t.\tgene\t1\t100\t.\t+\t.\tID=g1
/// chr1\t.\tmRNA\t1\t100\t.\t+\t.\tID=t1;Parent=g1
/// chr1\t.\tCDS\t1\t50\t.\t+\t0\tParent=t1
/// chr1\t.\tCDS\t51\t100\t.\t+\t2\tParent=t1
/// ";
/// let mut out = Vec::new();
/// let mut converter = Converter::<Gtf, _>::new(&mut out);
/// for record in Reader::<Gff>::from_reader(std::io::Cursor::new(gff)).unwrap() {
///     converter.feed(&record.unwrap(), 0).unwrap();
/// }
/// let stats = converter.finish().unwrap();
///
/// assert_eq!(stats.emitted, 1);
/// assert_eq!(
///     String::from_utf8(out).unwrap(),
///     "chr1\t.\texon\t1\t100\t.\t+\t.\tgene_id \"g1\"; transcript_id \"t1\";\n"
/// );
/// ```
pub struct Converter<D: OutputDialect, W: Write> {
    writer: W,
    state: ConverterState,
    pending: Option<Block>,
    hierarchical: bool,
    stats: ConvertStats,
    _marker: PhantomData<D>,
}

impl<D: OutputDialect, W: Write> Converter<D, W> {
    /// Creates a converter writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            state: ConverterState::NoContext,
            pending: None,
            hierarchical: false,
            stats: ConvertStats::default(),
            _marker: PhantomData,
        }
    }

    /// Current state.
    pub fn state(&self) -> &ConverterState {
        &self.state
    }

    /// Counters so far.
    pub fn stats(&self) -> &ConvertStats {
        &self.stats
    }

    /// Consumes one record; `line` is only used in error reports.
    ///
    /// A `CDS`/`UTR` row must belong to the open transcript; one arriving
    /// before any transcript is a parent mismatch. A row on the other strand
    /// of its transcript is a `Coord(StrandMismatch)` for every dialect.
    pub fn feed(&mut self, record: &IntervalRecord, line: usize) -> ConvertResult<()> {
        self.stats.records += 1;

        if record.is_feature("gene") {
            self.flush()?;
            self.hierarchical = true;
            self.state = ConverterState::InGene {
                gene_id: record.id.clone(),
            };
            return Ok(());
        }

        if record.is_transcript() {
            self.flush()?;
            return self.open_transcript(record, line);
        }

        let Some(class) = SubFeature::classify(&record.feature_type) else {
            log::debug!(
                "skipping {} row '{}' at line {line}",
                record.feature_type,
                record.id
            );
            self.stats.skipped += 1;
            return Ok(());
        };

        let open = match &self.state {
            ConverterState::InTranscript {
                gene_id,
                transcript_id,
                frame,
            } if has_parent(record, transcript_id) => {
                Some((gene_id.clone(), transcript_id.clone(), *frame))
            }
            _ => None,
        };
        let Some((gene_id, transcript_id, frame)) = open else {
            let expected = self.state.transcript_id().unwrap_or("<none>").to_string();
            let found = record.parent().unwrap_or(".").to_string();
            return self.violation(line, expected, found);
        };
        if record.strand != frame.strand {
            return Err(CoordError::StrandMismatch {
                feature: record.id.clone(),
                expected: frame.strand,
                found: record.strand,
            }
            .into());
        }

        let block = Block {
            chrom: record.chrom.clone(),
            source: record.source.clone(),
            start: record.start,
            end: record.end,
            strand: record.strand,
            class,
            phase: record.phase,
            gene_id,
            transcript_id,
            frame,
        };

        match coalesce(self.pending.take(), block, D::SEPARATE_CLASSES) {
            Coalesced::Buffered(block) => self.pending = Some(block),
            Coalesced::Merged(block) => {
                self.stats.merged += 1;
                self.pending = Some(block);
            }
            Coalesced::Flushed { emit, pending } => {
                self.emit(&emit)?;
                self.pending = Some(pending);
            }
        }
        Ok(())
    }

    /// Flushes the pending block and the writer.
    pub fn finish(mut self) -> ConvertResult<ConvertStats> {
        self.flush()?;
        self.writer.flush()?;
        Ok(self.stats)
    }

    fn open_transcript(&mut self, record: &IntervalRecord, line: usize) -> ConvertResult<()> {
        let parent = record.parent();
        let open_gene = self
            .state
            .gene_id()
            .filter(|_| self.hierarchical)
            .map(str::to_string);

        let gene_id = match (open_gene, parent) {
            (Some(open), Some(_)) if has_parent(record, &open) => open,
            (Some(open), Some(found)) => {
                let found = found.to_string();
                self.violation(line, open, found.clone())?;
                found
            }
            (Some(open), None) => open,
            (None, Some(found)) => found.to_string(),
            (None, None) => record.id.clone(),
        };

        self.state = ConverterState::InTranscript {
            gene_id,
            transcript_id: record.id.clone(),
            frame: TranscriptFrame::from_record(record),
        };
        Ok(())
    }

    fn violation(&mut self, line: usize, expected: String, found: String) -> ConvertResult<()> {
        if D::STRICT_ORDER {
            return Err(ConvertError::SortOrderViolation {
                line,
                expected,
                found,
            });
        }
        log::warn!(
            "line {line}: row of '{found}' while '{expected}' is open, dropped from {} output",
            D::NAME
        );
        self.stats.dropped += 1;
        Ok(())
    }

    fn flush(&mut self) -> ConvertResult<()> {
        match self.pending.take() {
            Some(block) => self.emit(&block),
            None => Ok(()),
        }
    }

    fn emit(&mut self, block: &Block) -> ConvertResult<()> {
        D::write_block(block, &mut self.writer)?;
        self.stats.emitted += 1;
        Ok(())
    }
}

/// Converts every record of `reader` into dialect `D`.
///
/// # Example
///
/// ```rust,no_run
/// use gxfkit::convert::{convert, Gsds};
/// use gxfkit::{Gff, Reader};
///
/// let reader = Reader::<Gff>::from_path("annotation.gff3").unwrap();
/// let stats = convert::<Gff, Gsds, _>(reader, std::io::stdout().lock()).unwrap();
/// eprintln!("{} blocks", stats.emitted);
/// ```
pub fn convert<F, D, W>(mut reader: Reader<F>, writer: W) -> ConvertResult<ConvertStats>
where
    F: RecordFormat,
    D: OutputDialect,
    W: Write,
{
    let mut converter = Converter::<D, W>::new(writer);
    while let Some(record) = reader.next() {
        let record = record?;
        converter.feed(&record, reader.current_line())?;
    }
    let stats = converter.finish()?;
    log::info!(
        "converted {} {} records into {} {} lines ({} merged, {} skipped, {} dropped)",
        stats.records,
        F::TYPE_NAME,
        stats.emitted,
        D::NAME,
        stats.merged,
        stats.skipped,
        stats.dropped
    );
    Ok(stats)
}

/// Returns `true` if `parent_id` is among the record's parents.
fn has_parent(record: &IntervalRecord, parent_id: &str) -> bool {
    match record.attributes.style() {
        AttributeStyle::Gff => record.attributes.parents().any(|p| p == parent_id),
        _ => record.parent() == Some(parent_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(start: u64, end: u64, transcript: &str) -> Block {
        Block {
            chrom: "chr1".into(),
            source: ".".into(),
            start,
            end,
            strand: Strand::Forward,
            class: SubFeature::Cds,
            phase: Some(0),
            gene_id: "g1".into(),
            transcript_id: transcript.into(),
            frame: TranscriptFrame::new(1, 1000, Strand::Forward),
        }
    }

    #[test]
    fn gap_flushes_pending() {
        match coalesce(Some(block(1, 10, "t1")), block(12, 20, "t1"), false) {
            Coalesced::Flushed { emit, pending } => {
                assert_eq!(emit.end, 10);
                assert_eq!(pending.start, 12);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_transcript_flushes_pending() {
        assert!(matches!(
            coalesce(Some(block(1, 10, "t1")), block(11, 20, "t2"), false),
            Coalesced::Flushed { .. }
        ));
    }

    #[test]
    fn merged_block_keeps_first_phase() {
        let mut second = block(11, 20, "t1");
        second.phase = Some(2);
        match coalesce(Some(block(1, 10, "t1")), second, false) {
            Coalesced::Merged(merged) => assert_eq!(merged.phase, Some(0)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn state_accessors() {
        let state = ConverterState::InTranscript {
            gene_id: "g1".into(),
            transcript_id: "t1".into(),
            frame: TranscriptFrame::new(1, 10, Strand::Forward),
        };
        assert_eq!(state.gene_id(), Some("g1"));
        assert_eq!(state.transcript_id(), Some("t1"));
        assert_eq!(ConverterState::NoContext.gene_id(), None);
    }
}
