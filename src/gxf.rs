use std::fmt;

use memchr::memchr;

use crate::reader::{ReaderError, ReaderResult};
use crate::record::{
    check_span, parse_coordinate, parse_score, AttributeStyle, Attributes, IntervalRecord,
    RecordFormat,
};
use crate::strand::Strand;

/// Marker type for GTF readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gtf;

/// Marker type for GFF/GFF3 readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gff;

/// Describes parsing behaviour for a GXF-like format.
///
/// This trait is implemented by the built-in GXF format types (`Gtf`, `Gff`).
pub trait GxfFormat {
    /// Separator used between keys and values within the attribute column.
    const ATTR_SEPARATOR: u8;
    /// Grammar recorded on the parsed attributes.
    const STYLE: AttributeStyle;
    /// Human readable format name (for error messages).
    const TYPE_NAME: &'static str;
}

impl GxfFormat for Gtf {
    const ATTR_SEPARATOR: u8 = b' ';
    const STYLE: AttributeStyle = AttributeStyle::Gtf;
    const TYPE_NAME: &'static str = "GTF";
}

impl GxfFormat for Gff {
    const ATTR_SEPARATOR: u8 = b'=';
    const STYLE: AttributeStyle = AttributeStyle::Gff;
    const TYPE_NAME: &'static str = "GFF";
}

impl RecordFormat for Gtf {
    const TYPE_NAME: &'static str = <Gtf as GxfFormat>::TYPE_NAME;
    const MIN_FIELDS: usize = 9;

    fn from_fields(fields: &[&str], line: usize) -> ReaderResult<IntervalRecord> {
        parse_gxf_fields::<Gtf>(fields, line)
    }
}

impl RecordFormat for Gff {
    const TYPE_NAME: &'static str = <Gff as GxfFormat>::TYPE_NAME;
    const MIN_FIELDS: usize = 9;

    fn from_fields(fields: &[&str], line: usize) -> ReaderResult<IntervalRecord> {
        parse_gxf_fields::<Gff>(fields, line)
    }
}

/// Parses the nine GXF columns into an `IntervalRecord`.
///
/// Coordinates are kept 1-based inclusive. Columns past the ninth are
/// ignored.
fn parse_gxf_fields<F: GxfFormat>(fields: &[&str], line: usize) -> ReaderResult<IntervalRecord> {
    let chrom = fields[0];
    let source = fields[1];
    let feature_type = fields[2];
    if feature_type.is_empty() {
        return Err(ReaderError::invalid_field(
            line,
            "feature",
            format!("ERROR: empty feature column in {} record", F::TYPE_NAME),
        ));
    }

    let start = parse_coordinate(fields[3], line, "start")?;
    let end = parse_coordinate(fields[4], line, "end")?;
    check_span(start, end, line)?;

    let score = parse_score(fields[5], line)?;
    let strand = Strand::parse(fields[6], line)?;
    let phase = parse_phase(fields[7], line)?;

    let attributes = parse_attributes(fields[8], F::ATTR_SEPARATOR, F::STYLE)
        .map_err(|err| ReaderError::invalid_field(line, "attributes", err.to_string()))?;
    let id = record_id(feature_type, &attributes).unwrap_or(".").to_string();

    Ok(IntervalRecord {
        chrom: chrom.to_string(),
        source: source.to_string(),
        feature_type: feature_type.to_string(),
        start,
        end,
        score,
        strand,
        phase,
        id,
        attributes,
    })
}

/// Derives the record id from its attributes.
///
/// GFF: `ID`, else `Parent`, else `Name`. GTF: `transcript_id` for anything
/// but a gene, else `gene_id`.
fn record_id<'a>(feature_type: &str, attributes: &'a Attributes) -> Option<&'a str> {
    match attributes.style() {
        AttributeStyle::Gff => attributes
            .get("ID")
            .or_else(|| attributes.get("Parent"))
            .or_else(|| attributes.get("Name")),
        AttributeStyle::Gtf => {
            if feature_type.eq_ignore_ascii_case("gene") {
                attributes.gene_id()
            } else {
                attributes.transcript_id().or_else(|| attributes.gene_id())
            }
        }
        AttributeStyle::Bed => None,
    }
}

fn parse_phase(field: &str, line: usize) -> ReaderResult<Option<u8>> {
    match field {
        "." | "" => Ok(None),
        "0" => Ok(Some(0)),
        "1" => Ok(Some(1)),
        "2" => Ok(Some(2)),
        other => Err(ReaderError::invalid_field(
            line,
            "phase",
            format!("ERROR: expected '0', '1', '2' or '.', got '{other}' in {line}:phase"),
        )),
    }
}

/// Fast attribute parser that extracts key/value pairs into [`Attributes`].
///
/// Handles both separators (space for GTF, `=` for GFF) and quoted values.
/// A lone `.` is the GFF placeholder for "no attributes".
///
/// # Examples
///
/// ```
/// use gxfkit::gxf::parse_attributes;
/// use gxfkit::record::AttributeStyle;
///
/// let raw_gtf = "gene_id \"ENSG00000223972\"; gene_name \"DDX11L1\";";
/// let attrs_gtf = parse_attributes(raw_gtf, b' ', AttributeStyle::Gtf).unwrap();
/// assert_eq!(attrs_gtf.gene_id(), Some("ENSG00000223972"));
///
/// let raw_gff = "ID=tx1;Name=Example;";
/// let attrs_gff = parse_attributes(raw_gff, b'=', AttributeStyle::Gff).unwrap();
/// assert_eq!(attrs_gff.id(), Some("tx1"));
/// ```
pub fn parse_attributes(
    line: &str,
    sep: u8,
    style: AttributeStyle,
) -> Result<Attributes, ParseError> {
    let bytes = line.as_bytes();
    let mut attributes = Attributes::with_capacity(style, 8);

    // Trim trailing whitespace
    let mut trimmed_len = bytes.len();
    while trimmed_len > 0 && bytes[trimmed_len - 1].is_ascii_whitespace() {
        trimmed_len -= 1;
    }
    if trimmed_len == 0 {
        return Err(ParseError::Empty);
    }
    if &line[..trimmed_len] == "." {
        return Ok(attributes);
    }

    let mut pos = 0usize;
    while pos < trimmed_len {
        while pos < trimmed_len && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b';') {
            pos += 1;
        }
        if pos >= trimmed_len {
            break;
        }

        let key_start = pos;
        let key_end = match memchr(sep, &bytes[pos..trimmed_len]) {
            Some(sep_pos) => pos + sep_pos,
            None => {
                // flag attribute
                let key = line[key_start..trimmed_len].trim_end_matches(';');
                if !key.is_empty() {
                    attributes.insert(key, "");
                }
                break;
            }
        };

        // A ';' before the separator closes a flag attribute.
        if let Some(semi) = memchr(b';', &bytes[key_start..key_end]) {
            let key = line[key_start..key_start + semi].trim_end();
            if !key.is_empty() {
                attributes.insert(key, "");
            }
            pos = key_start + semi + 1;
            continue;
        }

        let key = line[key_start..key_end].trim_end();
        pos = key_end + 1;
        while pos < trimmed_len && bytes[pos] == b' ' {
            pos += 1;
        }
        if pos >= trimmed_len {
            attributes.insert(key, "");
            break;
        }

        let value;
        if bytes[pos] == b'"' {
            pos += 1;
            match memchr(b'"', &bytes[pos..trimmed_len]) {
                Some(close) => {
                    value = &line[pos..pos + close];
                    pos += close + 1;
                }
                None => {
                    return Err(ParseError::UnterminatedQuote(key.to_string()));
                }
            }
        } else {
            match memchr(b';', &bytes[pos..trimmed_len]) {
                Some(semi) => {
                    value = line[pos..pos + semi].trim_end();
                    pos += semi;
                }
                None => {
                    value = &line[pos..trimmed_len];
                    pos = trimmed_len;
                }
            }
        }
        attributes.insert(key, value);

        match memchr(b';', &bytes[pos..trimmed_len]) {
            Some(semi) => pos += semi + 1,
            None => break,
        }
    }

    Ok(attributes)
}

/// Attribute parser error kinds.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Indicates that the attribute string was empty.
    Empty,
    /// A quoted value was never closed.
    UnterminatedQuote(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "ERROR: empty attribute field"),
            ParseError::UnterminatedQuote(key) => {
                write!(f, "ERROR: unterminated quoted value for '{key}'")
            }
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_gtf_attributes() {
        let raw = "gene_id \"ENSG00000223972\"; gene_name \"DDX11L1\"; tag \"basic\"; tag \"appris\"";
        let attrs = parse_attributes(raw, b' ', AttributeStyle::Gtf).unwrap();
        assert_eq!(attrs.gene_id(), Some("ENSG00000223972"));
        assert_eq!(attrs.get("gene_name"), Some("DDX11L1"));
        assert_eq!(attrs.get("tag"), Some("basic,appris"));
        assert_eq!(attrs.len(), 3);
    }

    #[test]
    fn parse_gff_attributes() {
        let raw = "ID=tx1;Parent=g1;biotype=protein_coding";
        let attrs = parse_attributes(raw, b'=', AttributeStyle::Gff).unwrap();
        assert_eq!(attrs.id(), Some("tx1"));
        assert_eq!(attrs.parent(), Some("g1"));
        assert_eq!(attrs.get("biotype"), Some("protein_coding"));
    }

    #[test]
    fn parse_empty_attributes() {
        assert_eq!(
            parse_attributes("", b' ', AttributeStyle::Gtf),
            Err(ParseError::Empty)
        );
        assert!(parse_attributes(".", b'=', AttributeStyle::Gff)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert_eq!(
            parse_attributes("gene_id \"g1", b' ', AttributeStyle::Gtf),
            Err(ParseError::UnterminatedQuote("gene_id".into()))
        );
    }

    #[test]
    fn flag_attributes_have_empty_values() {
        let attrs = parse_attributes("ID=e1;Is_circular", b'=', AttributeStyle::Gff).unwrap();
        assert_eq!(attrs.get("Is_circular"), Some(""));
    }

    #[test]
    fn gff_id_falls_back_to_parent() {
        let fields = [
            "chr1", "src", "CDS", "10", "20", ".", "+", "0", "Parent=tx1",
        ];
        let record = Gff::from_fields(&fields, 3).unwrap();
        assert_eq!(record.id, "tx1");
        assert_eq!(record.phase, Some(0));
        assert_eq!(record.parent(), Some("tx1"));
    }

    #[test]
    fn gtf_gene_row_uses_gene_id() {
        let fields = [
            "chr1",
            "src",
            "gene",
            "10",
            "20",
            ".",
            "-",
            ".",
            "gene_id \"g1\"; transcript_id \"t1\";",
        ];
        let record = Gtf::from_fields(&fields, 1).unwrap();
        assert_eq!(record.id, "g1");
        assert_eq!(record.strand, Strand::Reverse);
    }

    #[test]
    fn invalid_phase_is_rejected() {
        let fields = ["chr1", "src", "CDS", "10", "20", ".", "+", "3", "ID=c1"];
        assert!(Gff::from_fields(&fields, 1).is_err());
    }
}
