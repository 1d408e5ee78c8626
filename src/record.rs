use std::fmt;

use crate::reader::{ReaderError, ReaderResult};
use crate::strand::Strand;

/// Describes how a dialect turns tab-separated columns into an
/// [`IntervalRecord`].
///
/// Implemented by the marker types [`crate::Bed`], [`crate::Gff`] and
/// [`crate::Gtf`]. Custom dialects can implement it to plug into
/// [`crate::Reader`].
///
/// # Example
///
/// ```
/// use gxfkit::record::{AttributeStyle, Attributes, IntervalRecord, RecordFormat};
/// use gxfkit::reader::ReaderResult;
/// use gxfkit::strand::Strand;
///
/// // chrom, 1-based position
/// #[derive(Debug)]
/// struct Snp;
///
/// impl RecordFormat for Snp {
///     const TYPE_NAME: &'static str = "SNP";
///     const MIN_FIELDS: usize = 2;
///
///     fn from_fields(fields: &[&str], line: usize) -> ReaderResult<IntervalRecord> {
///         let pos = gxfkit::record::parse_coordinate(fields[1], line, "pos")?;
///         Ok(IntervalRecord::new(fields[0], pos, pos, Strand::Unknown, "snp", ".")
///             .with_attributes(Attributes::new(AttributeStyle::Bed)))
///     }
/// }
/// ```
pub trait RecordFormat: fmt::Debug + Send + Sync + 'static {
    /// Human readable format name (for error messages).
    const TYPE_NAME: &'static str;
    /// Minimum number of tab-separated columns in a data line.
    const MIN_FIELDS: usize;

    /// Builds a record from the columns of one data line.
    fn from_fields(fields: &[&str], line: usize) -> ReaderResult<IntervalRecord>;
}

/// The attribute grammar a record was read with.
///
/// It decides which keys back the typed accessors on [`Attributes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeStyle {
    /// Positional BED columns stored under their index.
    #[default]
    Bed,
    /// GFF3 `key=value;` pairs.
    Gff,
    /// GTF `key "value";` pairs.
    Gtf,
}

/// Ordered attribute map of a record.
///
/// Insertion order is preserved so records round-trip through the writers.
/// Repeated keys are folded into one entry with values joined by `,`.
///
/// # Example
///
/// ```
/// use gxfkit::record::{AttributeStyle, Attributes};
///
/// let mut attrs = Attributes::new(AttributeStyle::Gff);
/// attrs.insert("ID", "tx1");
/// attrs.insert("Parent", "g1");
/// attrs.insert("Parent", "g2");
///
/// assert_eq!(attrs.id(), Some("tx1"));
/// assert_eq!(attrs.get("Parent"), Some("g1,g2"));
/// assert_eq!(attrs.parents().collect::<Vec<_>>(), vec!["g1", "g2"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    style: AttributeStyle,
    entries: Vec<(String, String)>,
}

impl Attributes {
    /// Creates an empty attribute map.
    pub fn new(style: AttributeStyle) -> Self {
        Self {
            style,
            entries: Vec::new(),
        }
    }

    /// Creates an empty attribute map with room for `capacity` keys.
    pub fn with_capacity(style: AttributeStyle, capacity: usize) -> Self {
        Self {
            style,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Returns the grammar these attributes were read with.
    pub fn style(&self) -> AttributeStyle {
        self.style
    }

    /// Returns the raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Adds a value; a repeated key appends `,value` to the existing entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => {
                if !value.is_empty() {
                    if !existing.is_empty() {
                        existing.push(',');
                    }
                    existing.push_str(&value);
                }
            }
            None => self.entries.push((key, value)),
        }
    }

    /// Sets `key` to `value`, replacing any previous value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// GFF `ID`; for GTF the transcript id, else the gene id.
    pub fn id(&self) -> Option<&str> {
        match self.style {
            AttributeStyle::Gff => self.get("ID"),
            AttributeStyle::Gtf => self.transcript_id().or_else(|| self.gene_id()),
            AttributeStyle::Bed => self.get("name"),
        }
    }

    /// GFF `Parent` (possibly a `,`-joined list); GTF `transcript_id`.
    pub fn parent(&self) -> Option<&str> {
        match self.style {
            AttributeStyle::Gff => self.get("Parent"),
            AttributeStyle::Gtf => self.transcript_id(),
            AttributeStyle::Bed => None,
        }
    }

    /// Iterates over each parent id of a multi-parent feature.
    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.parent()
            .into_iter()
            .flat_map(|value| value.split(','))
            .filter(|value| !value.is_empty())
    }

    /// GTF `gene_id`.
    pub fn gene_id(&self) -> Option<&str> {
        self.get("gene_id")
    }

    /// GTF `transcript_id`.
    pub fn transcript_id(&self) -> Option<&str> {
        self.get("transcript_id")
    }

    /// Human readable name: `Name`, `transcript_name` or `gene_name`.
    pub fn name(&self) -> Option<&str> {
        ["Name", "transcript_name", "gene_name"]
            .iter()
            .find_map(|key| self.get(key))
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// One genomic interval read from BED, GFF or GTF.
///
/// Coordinates are 1-based and inclusive on both ends whatever the source
/// dialect; BED starts are shifted on input and shifted back on output.
///
/// # Example
///
/// ```
/// use gxfkit::record::IntervalRecord;
/// use gxfkit::strand::Strand;
///
/// let record = IntervalRecord::new("chr1", 11, 20, Strand::Forward, "exon", "e1");
/// assert_eq!(record.len(), 10);
/// assert_eq!(record.bed_start(), 10);
/// assert!(record.overlaps(20, 30));
/// assert!(!record.overlaps(21, 30));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalRecord {
    /// Reference sequence name.
    pub chrom: String,
    /// Source column (`.` when absent).
    pub source: String,
    /// Feature type such as `gene`, `mRNA`, `CDS` or `region`.
    pub feature_type: String,
    /// 1-based inclusive start.
    pub start: u64,
    /// 1-based inclusive end.
    pub end: u64,
    /// Score column, `None` for `.`.
    pub score: Option<f64>,
    /// Feature strand.
    pub strand: Strand,
    /// CDS phase, `None` for `.`.
    pub phase: Option<u8>,
    /// Record identifier (`.` when none could be derived).
    pub id: String,
    /// Remaining attributes.
    pub attributes: Attributes,
}

impl IntervalRecord {
    /// Creates a record with empty optional columns.
    pub fn new(
        chrom: impl Into<String>,
        start: u64,
        end: u64,
        strand: Strand,
        feature_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            chrom: chrom.into(),
            source: ".".into(),
            feature_type: feature_type.into(),
            start,
            end,
            score: None,
            strand,
            phase: None,
            id: id.into(),
            attributes: Attributes::default(),
        }
    }

    /// Replaces the attributes.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Replaces the source column.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Number of bases covered.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end + 1 - self.start
    }

    /// Always `false`: records span at least one base.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// 0-based start, as written in BED.
    #[inline]
    pub fn bed_start(&self) -> u64 {
        self.start - 1
    }

    /// Returns `true` if the record overlaps the 1-based inclusive span.
    #[inline]
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        self.start <= end && start <= self.end
    }

    /// Case-insensitive feature type comparison.
    #[inline]
    pub fn is_feature(&self, feature_type: &str) -> bool {
        self.feature_type.eq_ignore_ascii_case(feature_type)
    }

    /// Returns `true` for `transcript` and `mRNA` rows.
    pub fn is_transcript(&self) -> bool {
        self.is_feature("transcript") || self.is_feature("mrna")
    }

    /// Id of the enclosing feature.
    ///
    /// GFF rows use `Parent`. GTF has no explicit hierarchy, so a
    /// transcript row points at its `gene_id`, gene rows have no parent and
    /// every other row points at its `transcript_id`.
    pub fn parent(&self) -> Option<&str> {
        match self.attributes.style() {
            AttributeStyle::Gtf => {
                if self.is_feature("gene") {
                    None
                } else if self.is_transcript() {
                    self.attributes.gene_id()
                } else {
                    self.attributes.transcript_id()
                }
            }
            _ => self.attributes.parent(),
        }
    }

    /// Locus string `chrom:start-end(strand)`.
    pub fn locus(&self) -> String {
        locus(&self.chrom, self.start, self.end, self.strand)
    }
}

impl fmt::Display for IntervalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}:{}-{}({})",
            self.feature_type, self.id, self.chrom, self.chrom, self.start, self.end, self.strand
        )
    }
}

/// Formats a 1-based inclusive span as `chrom:start-end(strand)`.
pub fn locus(chrom: &str, start: u64, end: u64, strand: Strand) -> String {
    format!("{chrom}:{start}-{end}({strand})")
}

/// Parses an unsigned coordinate column.
pub fn parse_coordinate(field: &str, line: usize, label: &'static str) -> ReaderResult<u64> {
    field.parse::<u64>().map_err(|_| {
        ReaderError::invalid_field(
            line,
            label,
            format!("ERROR: expected unsigned integer, got '{field}' in {line}:{label}"),
        )
    })
}

/// Parses a score column; `.` means no score.
pub(crate) fn parse_score(field: &str, line: usize) -> ReaderResult<Option<f64>> {
    if field == "." || field.is_empty() {
        return Ok(None);
    }
    field.parse::<f64>().map(Some).map_err(|_| {
        ReaderError::invalid_field(
            line,
            "score",
            format!("ERROR: expected number or '.', got '{field}' in {line}:score"),
        )
    })
}

/// Rejects spans whose start lies after their end.
pub(crate) fn check_span(start: u64, end: u64, line: usize) -> ReaderResult<()> {
    if start == 0 || start > end {
        return Err(ReaderError::invalid_field(
            line,
            "coordinates",
            format!("ERROR: invalid span {start}-{end}, expected 1 <= start <= end"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_keys_are_joined() {
        let mut attrs = Attributes::new(AttributeStyle::Gtf);
        attrs.insert("tag", "basic");
        attrs.insert("tag", "CCDS");
        attrs.insert("gene_id", "g1");
        assert_eq!(attrs.get("tag"), Some("basic,CCDS"));
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.iter().next(), Some(("tag", "basic,CCDS")));
    }

    #[test]
    fn gtf_parent_depends_on_feature() {
        let mut attrs = Attributes::new(AttributeStyle::Gtf);
        attrs.insert("gene_id", "g1");
        attrs.insert("transcript_id", "t1");

        let mut record = IntervalRecord::new("chr1", 1, 10, Strand::Forward, "gene", "g1")
            .with_attributes(attrs);
        assert_eq!(record.parent(), None);
        record.feature_type = "transcript".into();
        assert_eq!(record.parent(), Some("g1"));
        record.feature_type = "CDS".into();
        assert_eq!(record.parent(), Some("t1"));
    }

    #[test]
    fn span_check_rejects_inverted_and_zero() {
        assert!(check_span(5, 4, 1).is_err());
        assert!(check_span(0, 4, 1).is_err());
        assert!(check_span(4, 4, 1).is_ok());
    }

    #[test]
    fn score_accepts_dot() {
        assert_eq!(parse_score(".", 1).unwrap(), None);
        assert_eq!(parse_score("12.5", 1).unwrap(), Some(12.5));
        assert!(parse_score("x", 1).is_err());
    }
}
