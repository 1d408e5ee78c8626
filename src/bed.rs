use crate::reader::ReaderResult;
use crate::record::{
    check_span, parse_coordinate, parse_score, AttributeStyle, Attributes, IntervalRecord,
    RecordFormat,
};
use crate::strand::Strand;

const CHROM_START: &str = "chromStart";
const CHROM_END: &str = "chromEnd";

/// Feature type given to every BED interval.
pub const BED_FEATURE: &str = "region";

/// Marker type for BED readers.
///
/// Accepts BED3 and wider. Columns past the sixth are kept as attributes
/// keyed by their 1-based column number (`"7"`, `"8"`, ...), the name and
/// score as `name` and `score`.
///
/// # Example
///
/// ```
/// use gxfkit::{Bed, Reader};
///
/// let data = "Chr01\t99\t199\tgeneA\t.\t+\n";
/// let mut reader = Reader::<Bed>::from_reader(std::io::Cursor::new(data)).unwrap();
/// let record = reader.next().unwrap().unwrap();
///
/// assert_eq!(record.start, 100);
/// assert_eq!(record.end, 199);
/// assert_eq!(record.id, "geneA");
/// assert_eq!(record.score, None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bed;

impl RecordFormat for Bed {
    const TYPE_NAME: &'static str = "BED";
    const MIN_FIELDS: usize = 3;

    fn from_fields(fields: &[&str], line: usize) -> ReaderResult<IntervalRecord> {
        let chrom = fields[0];
        let bed_start = parse_coordinate(fields[1], line, CHROM_START)?;
        let end = parse_coordinate(fields[2], line, CHROM_END)?;
        let start = bed_start + 1;
        check_span(start, end, line)?;

        let mut attributes = Attributes::with_capacity(AttributeStyle::Bed, fields.len());
        let id = match fields.get(3).filter(|name| !name.is_empty() && **name != ".") {
            Some(name) => {
                attributes.insert("name", *name);
                name.to_string()
            }
            None => format!("{chrom}:{bed_start}-{end}"),
        };

        let score = match fields.get(4) {
            Some(raw) => {
                let score = parse_score(raw, line)?;
                attributes.insert("score", *raw);
                score
            }
            None => None,
        };

        let strand = match fields.get(5) {
            Some(raw) if !raw.is_empty() => Strand::parse(raw, line)?,
            _ => Strand::Unknown,
        };

        for (idx, extra) in fields.iter().enumerate().skip(6) {
            attributes.insert((idx + 1).to_string(), *extra);
        }

        Ok(IntervalRecord {
            chrom: chrom.to_string(),
            source: ".".into(),
            feature_type: BED_FEATURE.into(),
            start,
            end,
            score,
            strand,
            phase: None,
            id,
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ReaderError;

    #[test]
    fn bed3_gets_synthetic_name() {
        let record = Bed::from_fields(&["chr2", "0", "10"], 1).unwrap();
        assert_eq!(record.id, "chr2:0-10");
        assert_eq!(record.start, 1);
        assert_eq!(record.strand, Strand::Unknown);
        assert_eq!(record.feature_type, BED_FEATURE);
        assert!(record.attributes.is_empty());
    }

    #[test]
    fn extra_columns_become_attributes() {
        let fields = ["chr1", "5", "50", "r1", "3", "-", "5", "50", "255,0,0"];
        let record = Bed::from_fields(&fields, 4).unwrap();
        assert_eq!(record.score, Some(3.0));
        assert_eq!(record.strand, Strand::Reverse);
        assert_eq!(record.attributes.get("7"), Some("5"));
        assert_eq!(record.attributes.get("9"), Some("255,0,0"));
    }

    #[test]
    fn empty_interval_is_rejected() {
        let err = Bed::from_fields(&["chr1", "10", "10"], 7).unwrap_err();
        match err {
            ReaderError::InvalidField { line, field, .. } => {
                assert_eq!(line, 7);
                assert_eq!(field, "coordinates");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bad_start_reports_column() {
        let err = Bed::from_fields(&["chr1", "x", "10"], 2).unwrap_err();
        assert!(matches!(
            err,
            ReaderError::InvalidField {
                field: CHROM_START,
                ..
            }
        ));
    }
}
