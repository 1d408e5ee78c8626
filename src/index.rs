use std::collections::HashMap;
use std::path::Path;

use crate::reader::{Reader, ReaderError, ReaderOptions, ReaderResult};
use crate::record::{AttributeStyle, IntervalRecord, RecordFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Loc {
    bucket: usize,
    offset: usize,
}

/// Per-chromosome interval collection.
///
/// Records are bucketed by chromosome and sorted by ascending start; ties
/// keep file order. Chromosomes iterate in order of first appearance. The
/// index is read-only once built.
///
/// # Example
///
/// ```
/// use gxfkit::{Bed, FeatureIndex, Reader};
///
/// let data = "chr1\t50\t60\tb\nchr2\t0\t5\tc\nchr1\t10\t20\ta\n";
/// let reader = Reader::<Bed>::from_reader(std::io::Cursor::new(data)).unwrap();
/// let index = FeatureIndex::from_reader(reader).unwrap();
///
/// assert_eq!(index.chromosomes().collect::<Vec<_>>(), vec!["chr1", "chr2"]);
/// let ids: Vec<_> = index.get("chr1").unwrap().iter().map(|r| r.id.as_str()).collect();
/// assert_eq!(ids, vec!["a", "b"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FeatureIndex {
    buckets: Vec<(String, Vec<IntervalRecord>)>,
    chroms: HashMap<String, usize>,
    by_id: HashMap<String, Vec<Loc>>,
    by_parent: HashMap<String, Vec<Loc>>,
    feature_types: Vec<String>,
    len: usize,
}

impl FeatureIndex {
    /// Builds an index from any iterator of records.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = IntervalRecord>,
    {
        let mut index = Self::default();
        for record in records {
            index.push(record);
        }
        index.finish();
        index
    }

    /// Drains a reader into an index, stopping at the first error.
    pub fn from_reader<F: RecordFormat>(reader: Reader<F>) -> ReaderResult<Self> {
        let mut index = Self::default();
        for record in reader {
            index.push(record?);
        }
        index.finish();
        log::info!(
            "indexed {} {} records on {} chromosomes",
            index.len,
            F::TYPE_NAME,
            index.buckets.len()
        );
        Ok(index)
    }

    /// Reads and indexes an annotation file.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use gxfkit::{FeatureIndex, Gtf};
    ///
    /// let index = FeatureIndex::from_path::<Gtf, _>("annotation.gtf.gz").unwrap();
    /// println!("{} records", index.len());
    /// ```
    pub fn from_path<F: RecordFormat, P: AsRef<Path>>(path: P) -> ReaderResult<Self> {
        Self::from_reader(Reader::<F>::from_path(path)?)
    }

    /// Reads and indexes an annotation file with custom reader options.
    pub fn from_path_with_options<F: RecordFormat, P: AsRef<Path>>(
        path: P,
        options: ReaderOptions<'_>,
    ) -> ReaderResult<Self> {
        Self::from_reader(Reader::<F>::from_path_with_options(path, options)?)
    }

    fn push(&mut self, record: IntervalRecord) {
        if !self
            .feature_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&record.feature_type))
        {
            self.feature_types.push(record.feature_type.clone());
        }

        let bucket = match self.chroms.get(&record.chrom) {
            Some(&bucket) => bucket,
            None => {
                self.chroms
                    .insert(record.chrom.clone(), self.buckets.len());
                self.buckets.push((record.chrom.clone(), Vec::new()));
                self.buckets.len() - 1
            }
        };
        self.buckets[bucket].1.push(record);
        self.len += 1;
    }

    fn finish(&mut self) {
        for (_, records) in &mut self.buckets {
            records.sort_by_key(|record| record.start);
        }

        for (bucket, (_, records)) in self.buckets.iter().enumerate() {
            for (offset, record) in records.iter().enumerate() {
                let loc = Loc { bucket, offset };
                if record.id != "." {
                    self.by_id.entry(record.id.clone()).or_default().push(loc);
                }
                for parent in parents(record) {
                    self.by_parent
                        .entry(parent.to_string())
                        .or_default()
                        .push(loc);
                }
            }
        }
    }

    fn at(&self, loc: Loc) -> &IntervalRecord {
        &self.buckets[loc.bucket].1[loc.offset]
    }

    /// Chromosome names in order of first appearance.
    pub fn chromosomes(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|(chrom, _)| chrom.as_str())
    }

    /// Records of one chromosome, sorted by start.
    pub fn get(&self, chrom: &str) -> Option<&[IntervalRecord]> {
        self.chroms
            .get(chrom)
            .map(|&bucket| self.buckets[bucket].1.as_slice())
    }

    /// Every record, chromosome by chromosome.
    pub fn iter(&self) -> impl Iterator<Item = &IntervalRecord> {
        self.buckets.iter().flat_map(|(_, records)| records.iter())
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no record was indexed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Distinct feature types in order of first appearance.
    pub fn feature_types(&self) -> impl Iterator<Item = &str> {
        self.feature_types.iter().map(String::as_str)
    }

    /// Returns `true` if any record has `feature_type` (case-insensitive).
    pub fn has_feature(&self, feature_type: &str) -> bool {
        self.feature_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(feature_type))
    }

    /// Every record of `feature_type`.
    ///
    /// # Errors
    ///
    /// `MissingFeatureType` when the type never appeared in the input.
    pub fn features_of(&self, feature_type: &str) -> ReaderResult<Vec<&IntervalRecord>> {
        if !self.has_feature(feature_type) {
            return Err(ReaderError::missing_feature(feature_type));
        }
        Ok(self
            .iter()
            .filter(|record| record.is_feature(feature_type))
            .collect())
    }

    /// Records overlapping the 1-based inclusive span on `chrom`.
    pub fn overlapping<'a>(
        &'a self,
        chrom: &str,
        start: u64,
        end: u64,
    ) -> impl Iterator<Item = &'a IntervalRecord> + 'a {
        let records = self.get(chrom).unwrap_or(&[]);
        let upper = records.partition_point(|record| record.start <= end);
        records[..upper]
            .iter()
            .filter(move |record| record.end >= start)
    }

    /// Direct children of `parent_id`, in index order.
    pub fn children_of(&self, parent_id: &str) -> Vec<&IntervalRecord> {
        self.by_parent
            .get(parent_id)
            .map(|locs| locs.iter().map(|&loc| self.at(loc)).collect())
            .unwrap_or_default()
    }

    /// First record with the given type and id.
    pub fn find(&self, feature_type: &str, id: &str) -> Option<&IntervalRecord> {
        self.by_id
            .get(id)?
            .iter()
            .map(|&loc| self.at(loc))
            .find(|record| record.is_feature(feature_type))
    }

    /// First transcript (`transcript` or `mRNA`) with the given id.
    pub fn find_transcript(&self, transcript_id: &str) -> Option<&IntervalRecord> {
        self.by_id
            .get(transcript_id)?
            .iter()
            .map(|&loc| self.at(loc))
            .find(|record| record.is_transcript())
    }

    /// Gene id of a transcript.
    pub fn gene_of_transcript(&self, transcript_id: &str) -> Option<&str> {
        self.find_transcript(transcript_id)
            .and_then(IntervalRecord::parent)
    }

    /// `transcript id -> gene id` for every transcript in the index.
    pub fn gene_of_transcript_map(&self) -> HashMap<&str, &str> {
        self.iter()
            .filter(|record| record.is_transcript())
            .filter_map(|record| record.parent().map(|gene| (record.id.as_str(), gene)))
            .collect()
    }

    /// Records of `feature_type` grouped by parent id.
    ///
    /// Groups appear in order of their first member; members keep index
    /// order. Multi-parent features join every group they name.
    ///
    /// # Errors
    ///
    /// `MissingFeatureType` before any grouping happens.
    pub fn group_by_parent(
        &self,
        feature_type: &str,
    ) -> ReaderResult<Vec<(&str, Vec<&IntervalRecord>)>> {
        let features = self.features_of(feature_type)?;
        let mut slots: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<(&str, Vec<&IntervalRecord>)> = Vec::new();

        for record in features {
            for parent in parents(record) {
                let slot = *slots.entry(parent).or_insert_with(|| {
                    groups.push((parent, Vec::new()));
                    groups.len() - 1
                });
                groups[slot].1.push(record);
            }
        }
        Ok(groups)
    }
}

impl<'a> IntoIterator for &'a FeatureIndex {
    type Item = &'a IntervalRecord;
    type IntoIter = Box<dyn Iterator<Item = &'a IntervalRecord> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl FromIterator<IntervalRecord> for FeatureIndex {
    fn from_iter<I: IntoIterator<Item = IntervalRecord>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}

/// Parent ids of a record; GFF allows a `,`-separated list.
fn parents(record: &IntervalRecord) -> Vec<&str> {
    match record.attributes.style() {
        AttributeStyle::Gff => record.attributes.parents().collect(),
        _ => record.parent().into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Attributes;
    use crate::strand::Strand;

    fn gff(feature: &str, start: u64, end: u64, id: &str, parent: Option<&str>) -> IntervalRecord {
        let mut attrs = Attributes::new(AttributeStyle::Gff);
        attrs.insert("ID", id);
        if let Some(parent) = parent {
            attrs.insert("Parent", parent);
        }
        IntervalRecord::new("chr1", start, end, Strand::Forward, feature, id).with_attributes(attrs)
    }

    #[test]
    fn ties_keep_file_order() {
        let index = FeatureIndex::from_records(vec![
            gff("exon", 10, 20, "b", None),
            gff("exon", 10, 15, "a", None),
            gff("exon", 5, 8, "c", None),
        ]);
        let ids: Vec<_> = index.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn multi_parent_features_join_each_group() {
        let index = FeatureIndex::from_records(vec![
            gff("mRNA", 1, 100, "t1", Some("g1")),
            gff("mRNA", 1, 100, "t2", Some("g1")),
            gff("exon", 1, 50, "e1", Some("t1,t2")),
        ]);
        let groups = index.group_by_parent("exon").unwrap();
        let names: Vec<_> = groups.iter().map(|(parent, _)| *parent).collect();
        assert_eq!(names, vec!["t1", "t2"]);
        assert_eq!(index.children_of("t2").len(), 1);
        assert_eq!(index.gene_of_transcript("t2"), Some("g1"));
    }

    #[test]
    fn missing_feature_fails_before_grouping() {
        let index = FeatureIndex::from_records(vec![gff("gene", 1, 10, "g1", None)]);
        assert!(matches!(
            index.group_by_parent("CDS"),
            Err(ReaderError::MissingFeatureType { .. })
        ));
    }
}
