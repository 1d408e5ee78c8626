//! Strand-aware subsequence extraction.
//!
//! Intervals are joined against a [`ReferenceStore`] by chromosome name. The
//! window `[start - 1, end)` is widened by the configured flanks, clamped,
//! sliced and reverse-complemented for `-` strand features.

use std::borrow::Borrow;
use std::fmt;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::coords::CoordError;
use crate::fasta::ReferenceStore;
use crate::index::FeatureIndex;
use crate::reader::{Reader, ReaderError};
use crate::record::{locus, IntervalRecord, RecordFormat};
use crate::sequence::Nucleotide;
use crate::strand::Strand;

/// Result alias for extraction.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// An error raised while extracting a subsequence.
#[derive(Debug)]
pub enum ExtractError {
    /// Reading or indexing the annotation failed.
    Reader(ReaderError),
    /// The record's chromosome is not in the reference.
    MissingSequence {
        /// Chromosome name.
        chrom: String,
        /// Record id.
        id: String,
    },
    /// The window ends past the chromosome and clamping is disabled.
    CoordinateOutOfRange {
        /// Record id.
        id: String,
        /// 0-based exclusive end of the window.
        end: u64,
        /// Chromosome length.
        chrom_len: u64,
    },
    /// Spliced parts disagree on chromosome or strand.
    Coord(CoordError),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::Reader(err) => write!(f, "{err}"),
            ExtractError::MissingSequence { chrom, id } => {
                write!(f, "ERROR: sequence '{chrom}' of record '{id}' not in reference")
            }
            ExtractError::CoordinateOutOfRange { id, end, chrom_len } => write!(
                f,
                "ERROR: window of '{id}' ends at {end}, past chromosome length {chrom_len}"
            ),
            ExtractError::Coord(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::Reader(err) => Some(err),
            ExtractError::Coord(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ReaderError> for ExtractError {
    fn from(err: ReaderError) -> Self {
        ExtractError::Reader(err)
    }
}

impl From<CoordError> for ExtractError {
    fn from(err: CoordError) -> Self {
        ExtractError::Coord(err)
    }
}

/// Extra bases added around each interval, relative to the feature strand.
///
/// On the `-` strand upstream means increasing genomic coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flank {
    /// Bases added on the 5' side.
    pub upstream: u64,
    /// Bases added on the 3' side.
    pub downstream: u64,
}

impl Flank {
    /// Same extension on both sides.
    pub fn both(n: u64) -> Self {
        Self {
            upstream: n,
            downstream: n,
        }
    }

    /// Upstream-only extension.
    pub fn up(n: u64) -> Self {
        Self {
            upstream: n,
            downstream: 0,
        }
    }

    /// Downstream-only extension.
    pub fn down(n: u64) -> Self {
        Self {
            upstream: 0,
            downstream: n,
        }
    }
}

/// Extraction settings.
///
/// # Example
///
/// ```
/// use gxfkit::extract::{ExtractOptions, Flank};
///
/// let options = ExtractOptions::new()
///     .flank(Flank::up(500))
///     .use_record_id(true)
///     .clamp_end(false);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    flank: Flank,
    use_record_id: bool,
    clamp_end: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            flank: Flank::default(),
            use_record_id: false,
            clamp_end: true,
        }
    }
}

impl ExtractOptions {
    /// Defaults: no flank, locus ids, end clamped to the chromosome.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flank extension.
    pub fn flank(mut self, flank: Flank) -> Self {
        self.flank = flank;
        self
    }

    /// Name outputs after the record id instead of `chrom:start-end(strand)`.
    pub fn use_record_id(mut self, yes: bool) -> Self {
        self.use_record_id = yes;
        self
    }

    /// Clamp window ends to the chromosome length (default `true`).
    ///
    /// When disabled an overhanging window is `CoordinateOutOfRange`.
    pub fn clamp_end(mut self, yes: bool) -> Self {
        self.clamp_end = yes;
        self
    }
}

/// Widens a 0-based half-open window by `flank` on the strand's 5'/3' sides.
///
/// The start never drops below zero; the end is left unclamped.
///
/// # Example
///
/// ```
/// use gxfkit::extract::{extend_window, Flank};
/// use gxfkit::strand::Strand;
///
/// assert_eq!(extend_window(100, 200, Strand::Forward, Flank::up(10)), (90, 200));
/// assert_eq!(extend_window(100, 200, Strand::Reverse, Flank::up(10)), (100, 210));
/// assert_eq!(extend_window(5, 20, Strand::Forward, Flank::both(10)), (0, 30));
/// ```
pub fn extend_window(start: u64, end: u64, strand: Strand, flank: Flank) -> (u64, u64) {
    let (left, right) = strand.orient(flank.upstream, flank.downstream);
    (start.saturating_sub(left), end + right)
}

/// Joins intervals against reference sequences.
///
/// # Example
///
/// ```
/// use gxfkit::extract::{ExtractOptions, Extractor};
/// use gxfkit::fasta::ReferenceStore;
/// use gxfkit::{Bed, Reader};
///
/// let reference = ReferenceStore::from_reader(std::io::Cursor::new(">chr1\nAAAACCCCGGGG\n")).unwrap();
/// let bed = Reader::<Bed>::from_reader(std::io::Cursor::new("chr1\t4\t8\tr1\t0\t-\n")).unwrap();
///
/// let extractor = Extractor::new(&reference, ExtractOptions::new());
/// let seqs: Vec<_> = extractor.extract_reader(bed).collect::<Result<_, _>>().unwrap();
///
/// assert_eq!(seqs[0].id(), "chr1:5-8(-)");
/// assert_eq!(seqs[0].residues(), b"GGGG");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'a> {
    reference: &'a ReferenceStore,
    options: ExtractOptions,
}

impl<'a> Extractor<'a> {
    /// Creates an extractor over `reference`.
    pub fn new(reference: &'a ReferenceStore, options: ExtractOptions) -> Self {
        Self { reference, options }
    }

    /// Options in use.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extracts the (flanked) window of one record.
    pub fn extract_one(&self, record: &IntervalRecord) -> ExtractResult<Nucleotide> {
        let chrom = self.chromosome(record)?;
        let chrom_len = chrom.residues().len() as u64;

        let (start, end) = extend_window(
            record.start - 1,
            record.end,
            record.strand,
            self.options.flank,
        );
        let end = self.bounded_end(record, end, chrom_len)?;
        let start = start.min(end);

        let id = if self.options.use_record_id {
            record.id.clone()
        } else {
            locus(&record.chrom, start + 1, end, record.strand)
        };
        let window = Nucleotide::new(id, &chrom.residues()[start as usize..end as usize]);

        Ok(match record.strand {
            Strand::Reverse => window.reverse_complement(),
            Strand::Forward | Strand::Unknown => window,
        })
    }

    /// Lazily extracts every record, one result per record.
    pub fn extract<'r, I, R>(
        &self,
        records: I,
    ) -> impl Iterator<Item = ExtractResult<Nucleotide>> + 'r
    where
        'a: 'r,
        I: IntoIterator<Item = R>,
        I::IntoIter: 'r,
        R: Borrow<IntervalRecord> + 'r,
    {
        let extractor: Extractor<'r> = Extractor {
            reference: self.reference,
            options: self.options,
        };
        records
            .into_iter()
            .map(move |record| extractor.extract_one(record.borrow()))
    }

    /// Lazily extracts every record of an annotation reader.
    pub fn extract_reader<F: RecordFormat>(
        &self,
        reader: Reader<F>,
    ) -> impl Iterator<Item = ExtractResult<Nucleotide>> + 'a {
        let extractor = *self;
        reader.map(move |record| extractor.extract_one(&record?))
    }

    /// Extracts every record of `feature_type` in the index.
    ///
    /// # Errors
    ///
    /// `Reader(MissingFeatureType)` before any extraction starts.
    pub fn extract_index<'i>(
        &self,
        index: &'i FeatureIndex,
        feature_type: &str,
    ) -> ExtractResult<impl Iterator<Item = ExtractResult<Nucleotide>> + 'i>
    where
        'a: 'i,
    {
        let records = index.features_of(feature_type)?;
        Ok(self.extract(records))
    }

    /// Concatenates the `child_feature` parts of each parent in
    /// transcript order, e.g. the CDS of every mRNA.
    ///
    /// Each output is named after the parent id. Flanks do not apply.
    ///
    /// # Errors
    ///
    /// `Reader(MissingFeatureType)` before any extraction starts; per
    /// parent, `Coord` when parts disagree on chromosome or strand.
    pub fn extract_spliced(
        &self,
        index: &FeatureIndex,
        child_feature: &str,
    ) -> ExtractResult<Vec<ExtractResult<Nucleotide>>> {
        let groups = index.group_by_parent(child_feature)?;
        Ok(groups
            .into_iter()
            .map(|(parent, parts)| self.splice(parent, parts))
            .collect())
    }

    fn splice(&self, parent: &str, mut parts: Vec<&IntervalRecord>) -> ExtractResult<Nucleotide> {
        parts.sort_by_key(|part| part.start);
        let first = parts[0];
        for part in &parts[1..] {
            if part.chrom != first.chrom {
                return Err(CoordError::ChromMismatch {
                    feature: part.id.clone(),
                    expected: first.chrom.clone(),
                    found: part.chrom.clone(),
                }
                .into());
            }
            if part.strand != first.strand {
                return Err(CoordError::StrandMismatch {
                    feature: part.id.clone(),
                    expected: first.strand,
                    found: part.strand,
                }
                .into());
            }
        }

        let chrom = self.chromosome(first)?;
        let chrom_len = chrom.residues().len() as u64;
        let mut spliced = Nucleotide::new(parent, Vec::new());
        for part in &parts {
            let end = self.bounded_end(part, part.end, chrom_len)?;
            let start = (part.start - 1).min(end);
            spliced.extend(&chrom.residues()[start as usize..end as usize]);
        }

        Ok(match first.strand {
            Strand::Reverse => spliced.reverse_complement(),
            Strand::Forward | Strand::Unknown => spliced,
        })
    }

    /// Extracts on the rayon pool, one job per record.
    ///
    /// Results come back in input order; a failed record does not affect the
    /// others.
    #[cfg(feature = "rayon")]
    pub fn par_extract(&self, records: &[IntervalRecord]) -> Vec<ExtractResult<Nucleotide>> {
        records
            .par_iter()
            .map(|record| self.extract_one(record))
            .collect()
    }

    fn chromosome(&self, record: &IntervalRecord) -> ExtractResult<&'a Nucleotide> {
        self.reference
            .get(&record.chrom)
            .ok_or_else(|| ExtractError::MissingSequence {
                chrom: record.chrom.clone(),
                id: record.id.clone(),
            })
    }

    fn bounded_end(&self, record: &IntervalRecord, end: u64, chrom_len: u64) -> ExtractResult<u64> {
        if end <= chrom_len {
            return Ok(end);
        }
        if self.options.clamp_end {
            log::debug!(
                "clamping window of '{}' from {end} to {chrom_len}",
                record.id
            );
            return Ok(chrom_len);
        }
        Err(ExtractError::CoordinateOutOfRange {
            id: record.id.clone(),
            end,
            chrom_len,
        })
    }
}
