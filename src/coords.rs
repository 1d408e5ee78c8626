//! Transcript-relative coordinates and non-redundant exon sets.
//!
//! Genomic spans are 1-based inclusive. Transcript-local positions are
//! 0-based inclusive offsets from the transcript's 5' end, so on the `-`
//! strand the highest genomic coordinate maps to local `0`.

use std::collections::HashMap;
use std::fmt;

use crate::index::FeatureIndex;
use crate::reader::ReaderError;
use crate::record::IntervalRecord;
use crate::strand::Strand;

/// Result alias for coordinate operations.
pub type CoordResult<T> = Result<T, CoordError>;

/// An error raised while mapping or merging coordinates.
#[derive(Debug)]
pub enum CoordError {
    /// A sub-feature lies on a different strand than its transcript.
    StrandMismatch {
        /// Id of the offending sub-feature.
        feature: String,
        /// Strand of the transcript.
        expected: Strand,
        /// Strand of the sub-feature.
        found: Strand,
    },
    /// A sub-feature lies on a different chromosome than its transcript or gene.
    ChromMismatch {
        /// Id of the offending feature.
        feature: String,
        /// Chromosome of the enclosing feature.
        expected: String,
        /// Chromosome of the sub-feature.
        found: String,
    },
    /// A span falls outside the transcript frame.
    OutOfBounds {
        /// Start of the span.
        start: u64,
        /// End of the span.
        end: u64,
        /// Length of the frame the span was mapped against.
        frame_len: u64,
    },
    /// No `transcript`/`mRNA` record carries the requested id.
    MissingTranscript(String),
    /// The index could not serve the request.
    Reader(ReaderError),
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::StrandMismatch {
                feature,
                expected,
                found,
            } => write!(
                f,
                "ERROR: feature '{feature}' is on strand {found} but its transcript is on {expected}"
            ),
            CoordError::ChromMismatch {
                feature,
                expected,
                found,
            } => write!(
                f,
                "ERROR: feature '{feature}' is on {found} but its parent is on {expected}"
            ),
            CoordError::OutOfBounds {
                start,
                end,
                frame_len,
            } => write!(
                f,
                "ERROR: span {start}-{end} lies outside a frame of length {frame_len}"
            ),
            CoordError::MissingTranscript(id) => write!(f, "ERROR: transcript '{id}' not found"),
            CoordError::Reader(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for CoordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoordError::Reader(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ReaderError> for CoordError {
    fn from(err: ReaderError) -> Self {
        CoordError::Reader(err)
    }
}

/// A closed genomic interval.
///
/// Ordering is by start, then end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    /// 1-based inclusive start.
    pub start: u64,
    /// 1-based inclusive end.
    pub end: u64,
}

impl Interval {
    /// Creates an interval, swapping the bounds if given in reverse.
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// Number of bases covered.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always `false`; an interval covers at least one base.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl From<&IntervalRecord> for Interval {
    fn from(record: &IntervalRecord) -> Self {
        Interval::new(record.start, record.end)
    }
}

impl From<(u64, u64)> for Interval {
    fn from((start, end): (u64, u64)) -> Self {
        Interval::new(start, end)
    }
}

/// The genomic span and strand of one transcript.
///
/// # Example
///
/// ```
/// use gxfkit::coords::TranscriptFrame;
/// use gxfkit::strand::Strand;
///
/// let frame = TranscriptFrame::new(101, 200, Strand::Reverse);
/// assert_eq!(frame.to_local(191, 200).unwrap(), (0, 9));
/// assert_eq!(frame.to_genomic(0, 9).unwrap(), (191, 200));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptFrame {
    /// 1-based inclusive start.
    pub start: u64,
    /// 1-based inclusive end.
    pub end: u64,
    /// Transcript strand; `Unknown` is mapped as `+`.
    pub strand: Strand,
}

impl TranscriptFrame {
    /// Creates a frame over `start..=end`.
    pub fn new(start: u64, end: u64, strand: Strand) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
            strand,
        }
    }

    /// Frame spanning a transcript record.
    pub fn from_record(record: &IntervalRecord) -> Self {
        Self::new(record.start, record.end, record.strand)
    }

    /// Transcript length in bases.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always `false`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Maps a genomic span to 0-based local offsets from the 5' end.
    pub fn to_local(&self, start: u64, end: u64) -> CoordResult<(u64, u64)> {
        if start > end || start < self.start || end > self.end {
            return Err(CoordError::OutOfBounds {
                start,
                end,
                frame_len: self.len(),
            });
        }
        Ok(match self.strand {
            Strand::Reverse => (self.end - end, self.end - start),
            Strand::Forward | Strand::Unknown => (start - self.start, end - self.start),
        })
    }

    /// Maps local offsets back to the genomic span.
    pub fn to_genomic(&self, local_start: u64, local_end: u64) -> CoordResult<(u64, u64)> {
        if local_start > local_end || local_end >= self.len() {
            return Err(CoordError::OutOfBounds {
                start: local_start,
                end: local_end,
                frame_len: self.len(),
            });
        }
        Ok(match self.strand {
            Strand::Reverse => (self.end - local_end, self.end - local_start),
            Strand::Forward | Strand::Unknown => {
                (self.start + local_start, self.start + local_end)
            }
        })
    }
}

/// A sub-feature in transcript-local coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFeature {
    /// Feature type copied from the genomic record.
    pub feature_type: String,
    /// 0-based inclusive offset from the 5' end.
    pub start: u64,
    /// 0-based inclusive offset from the 5' end.
    pub end: u64,
    /// Strand of the genomic record.
    pub strand: Strand,
}

/// Maps every sub-feature of one transcript into its frame.
///
/// The result is ordered by local start, so the first entry is the
/// feature closest to the 5' end.
///
/// # Errors
///
/// `StrandMismatch` if a sub-feature strand differs from the frame strand,
/// `OutOfBounds` if it spills out of the frame.
pub fn to_transcript_relative<'a, I>(
    features: I,
    frame: &TranscriptFrame,
) -> CoordResult<Vec<LocalFeature>>
where
    I: IntoIterator<Item = &'a IntervalRecord>,
{
    let mut local = Vec::new();
    for record in features {
        if record.strand != frame.strand {
            return Err(CoordError::StrandMismatch {
                feature: record.id.clone(),
                expected: frame.strand,
                found: record.strand,
            });
        }
        let (start, end) = frame.to_local(record.start, record.end)?;
        local.push(LocalFeature {
            feature_type: record.feature_type.clone(),
            start,
            end,
            strand: record.strand,
        });
    }
    local.sort_by_key(|feature| (feature.start, feature.end));
    Ok(local)
}

/// One transcript with its children in local coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptModel {
    /// Transcript id.
    pub transcript_id: String,
    /// Chromosome of the transcript.
    pub chrom: String,
    /// Genomic frame.
    pub frame: TranscriptFrame,
    /// Children ordered from the 5' end.
    pub features: Vec<LocalFeature>,
}

impl TranscriptModel {
    /// Builds the model of `transcript_id` from an index.
    ///
    /// # Example
    ///
    /// ```
    /// use gxfkit::coords::TranscriptModel;
    /// use gxfkit::{FeatureIndex, Gff, Reader};
    ///
    /// let gff = "\
    /// chr1\t.\tmRNA\t101\t200\t.\t-\t.\tID=t1
    /// chr1\t.\texon\t101\t120\t.\t-\t.\tParent=t1
    /// chr1\t.\texon\t181\t200\t.\t-\t.\tParent=t1
    /// ";
    /// let reader = Reader::<Gff>::from_reader(std::io::Cursor::new(gff)).unwrap();
    /// let index = FeatureIndex::from_reader(reader).unwrap();
    /// let model = TranscriptModel::from_index(&index, "t1").unwrap();
    ///
    /// assert_eq!((model.features[0].start, model.features[0].end), (0, 19));
    /// assert_eq!((model.features[1].start, model.features[1].end), (80, 99));
    /// ```
    pub fn from_index(index: &FeatureIndex, transcript_id: &str) -> CoordResult<Self> {
        let transcript = index
            .find_transcript(transcript_id)
            .ok_or_else(|| CoordError::MissingTranscript(transcript_id.to_string()))?;
        let children = index.children_of(transcript_id);

        if let Some(stray) = children.iter().find(|child| child.chrom != transcript.chrom) {
            return Err(CoordError::ChromMismatch {
                feature: stray.id.clone(),
                expected: transcript.chrom.clone(),
                found: stray.chrom.clone(),
            });
        }

        let frame = TranscriptFrame::from_record(transcript);
        let features = to_transcript_relative(children, &frame)?;

        Ok(Self {
            transcript_id: transcript_id.to_string(),
            chrom: transcript.chrom.clone(),
            frame,
            features,
        })
    }

    /// Children of one type, still ordered from the 5' end.
    pub fn features_of<'a>(
        &'a self,
        feature_type: &'a str,
    ) -> impl Iterator<Item = &'a LocalFeature> {
        self.features
            .iter()
            .filter(move |feature| feature.feature_type.eq_ignore_ascii_case(feature_type))
    }
}

/// Sorted, non-overlapping, non-abutting genomic intervals.
///
/// # Example
///
/// ```
/// use gxfkit::coords::{merge_exons, Interval};
///
/// let raw: [(u64, u64); 4] = [(30, 40), (1, 10), (11, 15), (35, 50)];
/// let set = merge_exons(raw);
/// assert_eq!(set.as_slice(), &[Interval::new(1, 15), Interval::new(30, 50)]);
/// assert_eq!(set.total_length(), 36);
/// assert_eq!(set.introns(), vec![Interval::new(16, 29)]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExonSet {
    intervals: Vec<Interval>,
}

impl ExonSet {
    /// Merged intervals in ascending order.
    pub fn as_slice(&self) -> &[Interval] {
        &self.intervals
    }

    /// Iterates over the merged intervals.
    pub fn iter(&self) -> std::slice::Iter<'_, Interval> {
        self.intervals.iter()
    }

    /// Number of merged intervals.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Bases covered by the set.
    pub fn total_length(&self) -> u64 {
        self.intervals.iter().map(Interval::len).sum()
    }

    /// Gaps between consecutive intervals.
    pub fn introns(&self) -> Vec<Interval> {
        self.intervals
            .windows(2)
            .map(|pair| Interval::new(pair[0].end + 1, pair[1].start - 1))
            .collect()
    }

    /// Returns `true` if the 1-based position is covered.
    pub fn contains(&self, pos: u64) -> bool {
        let idx = self.intervals.partition_point(|interval| interval.end < pos);
        self.intervals
            .get(idx)
            .is_some_and(|interval| interval.start <= pos)
    }

    /// Outer bounds of the set.
    pub fn span(&self) -> Option<Interval> {
        let first = self.intervals.first()?;
        let last = self.intervals.last()?;
        Some(Interval::new(first.start, last.end))
    }
}

impl<'a> IntoIterator for &'a ExonSet {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}

/// Merges overlapping or directly adjacent intervals.
///
/// Intervals are sorted by `(start, end)` and merged in one sweep whenever
/// `end_i >= start_{i+1} - 1`. The result does not depend on input order and
/// merging a merged set returns it unchanged.
pub fn merge_exons<I, T>(intervals: I) -> ExonSet
where
    I: IntoIterator<Item = T>,
    T: Into<Interval>,
{
    let mut sorted: Vec<Interval> = intervals.into_iter().map(Into::into).collect();
    sorted.sort_unstable();

    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
    for interval in sorted {
        match merged.last_mut() {
            Some(last) if last.end.saturating_add(1) >= interval.start => {
                last.end = last.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }
    ExonSet { intervals: merged }
}

/// Builds one `ExonSet` per gene from every `exon_feature` record.
///
/// Each entry is `(gene, chromosome, exons)`. An exon belongs to its `gene_id` attribute when present, otherwise to the
/// gene of each parent transcript, otherwise to the parent itself. Genes are
/// returned in order of first appearance.
///
/// # Errors
///
/// `Reader(MissingFeatureType)` when no record has `exon_feature`, and
/// `ChromMismatch` when a gene spans several chromosomes.
pub fn merge_gene_exons(
    index: &FeatureIndex,
    exon_feature: &str,
) -> CoordResult<Vec<(String, String, ExonSet)>> {
    let groups = index.group_by_parent(exon_feature)?;
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut genes: Vec<(String, String, Vec<Interval>)> = Vec::new();

    for (parent, exons) in groups {
        for exon in exons {
            let gene = exon
                .attributes
                .gene_id()
                .or_else(|| index.gene_of_transcript(parent))
                .unwrap_or(parent);

            let slot = match slots.get(gene) {
                Some(&slot) => slot,
                None => {
                    slots.insert(gene.to_string(), genes.len());
                    genes.push((gene.to_string(), exon.chrom.clone(), Vec::new()));
                    genes.len() - 1
                }
            };

            let (gene_id, chrom, intervals) = &mut genes[slot];
            if *chrom != exon.chrom {
                return Err(CoordError::ChromMismatch {
                    feature: gene_id.clone(),
                    expected: chrom.clone(),
                    found: exon.chrom.clone(),
                });
            }
            intervals.push(Interval::from(exon));
        }
    }

    log::debug!("merged exons of {} genes", genes.len());
    Ok(genes
        .into_iter()
        .map(|(gene, chrom, intervals)| (gene, chrom, merge_exons(intervals)))
        .collect())
}
