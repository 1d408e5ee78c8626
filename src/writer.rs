use std::fmt;
use std::io::{self, BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;

#[cfg(feature = "gzip")]
use flate2::write::GzEncoder;
#[cfg(feature = "gzip")]
use flate2::Compression as GzCompression;

use crate::bed::Bed;
use crate::gxf::{Gff, Gtf};
use crate::record::{AttributeStyle, IntervalRecord};
use crate::sequence::{Alphabet, Sequence};
use crate::strand::Strand;

/// Result alias for writer operations.
pub type WriterResult<T> = Result<T, WriterError>;

/// Errors that can occur while writing records.
#[derive(Debug)]
pub enum WriterError {
    /// An I/O error occurred while writing.
    Io(io::Error),
    /// Missing data required to materialize the requested format.
    MissingField(&'static str),
    /// The requested operation cannot be performed with the current feature set.
    Unsupported(String),
}

impl fmt::Display for WriterError {
    /// Formats the writer error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterError::Io(err) => write!(f, "write error: {err}"),
            WriterError::MissingField(field) => write!(f, "missing required field: {field}"),
            WriterError::Unsupported(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for WriterError {
    /// Returns the source error, if any.
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriterError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for WriterError {
    /// Creates a new `WriterError` from an `io::Error`.
    fn from(err: io::Error) -> Self {
        WriterError::Io(err)
    }
}

/// A generic writer for emitting `IntervalRecord`s into various formats.
///
/// # Example
///
/// ```
/// use gxfkit::record::IntervalRecord;
/// use gxfkit::strand::Strand;
/// use gxfkit::{Bed, Writer};
///
/// let record = IntervalRecord::new("chr1", 100, 199, Strand::Reverse, "region", "r1");
/// let mut buf = Vec::new();
/// Writer::<Bed>::from_record(&record, &mut buf).unwrap();
/// assert_eq!(buf, b"chr1\t99\t199\tr1\t0\t-\n");
/// ```
pub struct Writer<F> {
    _marker: PhantomData<F>,
}

impl<F> Writer<F>
where
    F: TargetFormat,
{
    /// Writes a single record into the target format.
    pub fn from_record<W: Write>(record: &IntervalRecord, writer: &mut W) -> WriterResult<()> {
        F::write_record(record, writer)
    }

    /// Writes all provided records into the target format.
    pub fn from_records<'a, W, I>(records: I, writer: &mut W) -> WriterResult<()>
    where
        W: Write,
        I: IntoIterator<Item = &'a IntervalRecord>,
    {
        for record in records {
            F::write_record(record, writer)?;
        }
        Ok(())
    }

    /// Opens a path and writes all records, auto-detecting gzip output from
    /// the `.gz` extension when the `gzip` feature is enabled.
    pub fn to_path<'a, P, I>(path: P, records: I) -> WriterResult<()>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = &'a IntervalRecord>,
    {
        let mut writer = create_sink(path.as_ref())?;
        Self::from_records(records, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Creates a buffered file sink, gzip-compressed for `.gz` paths.
pub fn create_sink(path: &Path) -> WriterResult<BufWriter<Box<dyn Write>>> {
    let file = std::fs::File::create(path)?;

    #[cfg(feature = "gzip")]
    let sink: Box<dyn Write> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzEncoder::new(file, GzCompression::fast()))
    } else {
        Box::new(file)
    };

    #[cfg(not(feature = "gzip"))]
    let sink: Box<dyn Write> = {
        if path.extension().is_some_and(|ext| ext == "gz") {
            return Err(WriterError::Unsupported(
                "enable the `gzip` feature to write gzip outputs".into(),
            ));
        }
        Box::new(file)
    };

    Ok(BufWriter::with_capacity(64 * 1024, sink))
}

/// Trait implemented by all supported output formats.
pub trait TargetFormat {
    /// Writes a single record to the writer in the target format.
    fn write_record<W: Write>(record: &IntervalRecord, writer: &mut W) -> WriterResult<()>;
}

impl TargetFormat for Bed {
    /// Writes BED6 plus any extra columns the record was read with.
    ///
    /// The start is shifted back to 0-based. A missing score is written as `0`.
    fn write_record<W: Write>(record: &IntervalRecord, writer: &mut W) -> WriterResult<()> {
        writer.write_all(record.chrom.as_bytes())?;
        writer.write_all(b"\t")?;
        write_u64(writer, record.bed_start())?;
        writer.write_all(b"\t")?;
        write_u64(writer, record.end)?;
        writer.write_all(b"\t")?;
        writer.write_all(record.id.as_bytes())?;
        writer.write_all(b"\t")?;
        match record.attributes.get("score") {
            Some(raw) if record.attributes.style() == AttributeStyle::Bed => {
                writer.write_all(raw.as_bytes())?
            }
            _ => write_score(writer, record.score, b"0")?,
        }
        writer.write_all(b"\t")?;
        writer.write_all(&[record.strand.as_byte()])?;

        if record.attributes.style() == AttributeStyle::Bed {
            for (key, value) in record.attributes.iter() {
                if key.bytes().all(|b| b.is_ascii_digit()) {
                    writer.write_all(b"\t")?;
                    writer.write_all(value.as_bytes())?;
                }
            }
        }
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl TargetFormat for Gff {
    /// Writes a GFF3 line.
    ///
    /// GFF attributes are written back unchanged. Records from other
    /// dialects get `ID` and `Parent` from their id and parent.
    fn write_record<W: Write>(record: &IntervalRecord, writer: &mut W) -> WriterResult<()> {
        write_gxf_columns(record, writer)?;
        match record.attributes.style() {
            AttributeStyle::Gff if !record.attributes.is_empty() => {
                write_attributes(writer, record.attributes.iter(), b'=', false)?
            }
            _ => {
                let mut pairs = Vec::with_capacity(2);
                if record.id != "." {
                    pairs.push(("ID", record.id.as_str()));
                }
                if let Some(parent) = record.parent() {
                    pairs.push(("Parent", parent));
                }
                if pairs.is_empty() {
                    writer.write_all(b".")?;
                } else {
                    write_attributes(writer, pairs.into_iter(), b'=', false)?;
                }
            }
        }
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl TargetFormat for Gtf {
    /// Writes a GTF line.
    ///
    /// GTF attributes are written back unchanged. Other dialects get
    /// `gene_id` from their parent (or id) and `transcript_id` from their id.
    fn write_record<W: Write>(record: &IntervalRecord, writer: &mut W) -> WriterResult<()> {
        let native = record.attributes.style() == AttributeStyle::Gtf
            && !record.attributes.is_empty();
        if !native && record.id == "." {
            return Err(WriterError::MissingField("transcript_id"));
        }

        write_gxf_columns(record, writer)?;
        if native {
            write_attributes(writer, record.attributes.iter(), b' ', true)?;
        } else {
            let gene_id = record.parent().unwrap_or(record.id.as_str());
            write_attributes(
                writer,
                [("gene_id", gene_id), ("transcript_id", record.id.as_str())].into_iter(),
                b' ',
                true,
            )?;
        }
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Writes the first eight GFF/GTF columns and the trailing tab.
fn write_gxf_columns<W: Write>(record: &IntervalRecord, writer: &mut W) -> io::Result<()> {
    writer.write_all(record.chrom.as_bytes())?;
    writer.write_all(b"\t")?;
    writer.write_all(record.source.as_bytes())?;
    writer.write_all(b"\t")?;
    writer.write_all(record.feature_type.as_bytes())?;
    writer.write_all(b"\t")?;
    write_u64(writer, record.start)?;
    writer.write_all(b"\t")?;
    write_u64(writer, record.end)?;
    writer.write_all(b"\t")?;
    write_score(writer, record.score, b".")?;
    writer.write_all(b"\t")?;
    writer.write_all(&[record.strand.as_byte()])?;
    writer.write_all(b"\t")?;
    match record.phase {
        Some(phase) => write_u64(writer, u64::from(phase))?,
        None => writer.write_all(b".")?,
    }
    writer.write_all(b"\t")
}

/// Writes `key=value;key=value` (GFF) or `key "value"; key "value";` (GTF).
pub(crate) fn write_attributes<'a, W, I>(
    writer: &mut W,
    pairs: I,
    sep: u8,
    quoted: bool,
) -> io::Result<()>
where
    W: Write,
    I: Iterator<Item = (&'a str, &'a str)>,
{
    let mut first = true;
    for (key, value) in pairs {
        if quoted {
            if !first {
                writer.write_all(b" ")?;
            }
            writer.write_all(key.as_bytes())?;
            writer.write_all(&[sep, b'"'])?;
            writer.write_all(value.as_bytes())?;
            writer.write_all(b"\";")?;
        } else {
            if !first {
                writer.write_all(b";")?;
            }
            writer.write_all(key.as_bytes())?;
            if !value.is_empty() {
                writer.write_all(&[sep])?;
                writer.write_all(value.as_bytes())?;
            }
        }
        first = false;
    }
    Ok(())
}

fn write_score<W: Write>(writer: &mut W, score: Option<f64>, missing: &[u8]) -> io::Result<()> {
    match score {
        Some(score) => write!(writer, "{score}"),
        None => writer.write_all(missing),
    }
}

/// Writes one sequence as FASTA, wrapping residues at `width` (0 = no wrap).
///
/// # Example
///
/// ```
/// use gxfkit::sequence::Nucleotide;
/// use gxfkit::writer::write_fasta;
///
/// let mut buf = Vec::new();
/// write_fasta(&mut buf, &Nucleotide::new("s1", "ACGTA"), 2).unwrap();
/// assert_eq!(buf, b">s1\nAC\nGT\nA\n");
/// ```
pub fn write_fasta<W: Write, K: Alphabet>(
    writer: &mut W,
    sequence: &Sequence<K>,
    width: usize,
) -> WriterResult<()> {
    writer.write_all(b">")?;
    writer.write_all(sequence.id().as_bytes())?;
    if let Some(description) = sequence.description() {
        writer.write_all(b" ")?;
        writer.write_all(description.as_bytes())?;
    }
    writer.write_all(b"\n")?;

    let residues = sequence.residues();
    if residues.is_empty() {
        return Ok(());
    }
    let width = if width == 0 { residues.len() } else { width };
    for chunk in residues.chunks(width) {
        writer.write_all(chunk)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Writes the strand character.
pub(crate) fn write_strand<W: Write>(writer: &mut W, strand: Strand) -> io::Result<()> {
    writer.write_all(&[strand.as_byte()])
}

/// Writes a u64 value to the writer as decimal text.
///
/// This is a fast implementation that avoids allocations by using
/// a stack buffer and writing digits from right to left.
pub(crate) fn write_u64<W: Write>(writer: &mut W, mut value: u64) -> io::Result<()> {
    let mut buf = [0u8; 20];
    let mut idx = buf.len();
    if value == 0 {
        return writer.write_all(b"0");
    }
    while value > 0 {
        idx -= 1;
        buf[idx] = b'0' + (value % 10) as u8;
        value /= 10;
    }
    writer.write_all(&buf[idx..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_u64_renders_digits() {
        for value in [0u64, 7, 10, 123_456_789, u64::MAX] {
            let mut buf = Vec::new();
            write_u64(&mut buf, value).unwrap();
            assert_eq!(String::from_utf8(buf).unwrap(), value.to_string());
        }
    }

    #[test]
    fn gtf_attributes_are_quoted() {
        let mut buf = Vec::new();
        write_attributes(
            &mut buf,
            [("gene_id", "g1"), ("transcript_id", "t1")].into_iter(),
            b' ',
            true,
        )
        .unwrap();
        assert_eq!(buf, b"gene_id \"g1\"; transcript_id \"t1\";");
    }
}
