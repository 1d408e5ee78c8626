//! FASTA input and the in-memory reference store.
//!
//! ```text
//! >Chr01 assembled chromosome
//! ACGTACGT
//! ACGT
//! ```

use std::collections::hash_map::{Entry, HashMap};
use std::io::{BufRead, BufReader, Read};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use memchr::memchr;

use crate::reader::{open_path_stream, Compression, ReaderError, ReaderResult};
use crate::sequence::{Alphabet, Nucleic, Nucleotide, Sequence};

/// Truncates a header at the first tab, else the first `|`, else the first
/// space. Returns `(id, description)`.
///
/// # Example
///
/// ```
/// use gxfkit::fasta::split_header;
///
/// assert_eq!(split_header("Chr01\tlength=100"), ("Chr01", "length=100"));
/// assert_eq!(split_header("sp|P12345|X"), ("sp", "P12345|X"));
/// assert_eq!(split_header("tx1 some gene"), ("tx1", "some gene"));
/// assert_eq!(split_header("plain"), ("plain", ""));
/// ```
pub fn split_header(header: &str) -> (&str, &str) {
    let bytes = header.as_bytes();
    let cut = memchr(b'\t', bytes)
        .or_else(|| memchr(b'|', bytes))
        .or_else(|| memchr(b' ', bytes));
    match cut {
        Some(pos) => (&header[..pos], header[pos + 1..].trim()),
        None => (header, ""),
    }
}

/// Builder for [`FastaReader`].
pub struct FastaReaderBuilder<K: Alphabet = Nucleic> {
    source: Option<FastaSource>,
    parse_id: bool,
    compression: Compression,
    buffer_capacity: usize,
    _marker: PhantomData<K>,
}

enum FastaSource {
    Path(PathBuf),
    Reader(Box<dyn Read + Send>),
}

impl<K: Alphabet> Default for FastaReaderBuilder<K> {
    fn default() -> Self {
        Self {
            source: None,
            parse_id: true,
            compression: Compression::default(),
            buffer_capacity: 64 * 1024,
            _marker: PhantomData,
        }
    }
}

impl<K: Alphabet> FastaReaderBuilder<K> {
    /// Reads from a filesystem path.
    pub fn from_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source = Some(FastaSource::Path(path.as_ref().into()));
        self
    }

    /// Reads from an arbitrary byte stream.
    pub fn from_reader<T>(mut self, reader: T) -> Self
    where
        T: Read + Send + 'static,
    {
        self.source = Some(FastaSource::Reader(Box::new(reader)));
        self
    }

    /// Truncate ids at the first tab, `|` or space (default `true`).
    ///
    /// When disabled the whole header line becomes the id.
    pub fn parse_id(mut self, parse_id: bool) -> Self {
        self.parse_id = parse_id;
        self
    }

    /// Sets the compression format of the input.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the buffer capacity for the reader.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(8 * 1024);
        self
    }

    /// Builds the `FastaReader`.
    pub fn build(self) -> ReaderResult<FastaReader<K>> {
        let stream = match self.source {
            Some(FastaSource::Path(path)) => open_path_stream(&path, self.compression)?,
            Some(FastaSource::Reader(reader)) => reader,
            None => {
                return Err(ReaderError::Builder(
                    "ERROR: no input source configured".into(),
                ))
            }
        };

        Ok(FastaReader {
            reader: BufReader::with_capacity(self.buffer_capacity, stream),
            line: String::with_capacity(256),
            line_number: 0,
            header_line: 0,
            next_header: None,
            parse_id: self.parse_id,
            finished: false,
            _marker: PhantomData,
        })
    }
}

/// Lazy, single-pass FASTA record iterator.
///
/// Multi-line sequences are joined and blank lines skipped. Sequence data
/// before the first header is a malformed record.
///
/// # Example
///
/// ```
/// use gxfkit::fasta::FastaReader;
/// use gxfkit::sequence::Nucleotide;
///
/// let data = ">s1 first\nACGT\nAC\n\n>s2\nGG\n";
/// let records: Vec<Nucleotide> = FastaReader::from_reader(std::io::Cursor::new(data))
///     .unwrap()
///     .collect::<Result<_, _>>()
///     .unwrap();
///
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[0].id(), "s1");
/// assert_eq!(records[0].description(), Some("first"));
/// assert_eq!(records[0].residues(), b"ACGTAC");
/// ```
pub struct FastaReader<K: Alphabet = Nucleic> {
    reader: BufReader<Box<dyn Read + Send>>,
    line: String,
    line_number: usize,
    header_line: usize,
    next_header: Option<String>,
    parse_id: bool,
    finished: bool,
    _marker: PhantomData<K>,
}

impl<K: Alphabet> FastaReader<K> {
    /// Creates a new builder.
    pub fn builder() -> FastaReaderBuilder<K> {
        FastaReaderBuilder::default()
    }

    /// Opens a (possibly compressed) FASTA file with default options.
    pub fn from_path<P: AsRef<Path>>(path: P) -> ReaderResult<Self> {
        Self::builder().from_path(path).build()
    }

    /// Reads FASTA from a byte stream with default options.
    pub fn from_reader<T>(reader: T) -> ReaderResult<Self>
    where
        T: Read + Send + 'static,
    {
        Self::builder().from_reader(reader).build()
    }

    /// Line number of the header of the last yielded record.
    pub fn header_line(&self) -> usize {
        self.header_line
    }

    fn read_line(&mut self) -> ReaderResult<Option<&str>> {
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        Ok(Some(self.line.trim()))
    }

    fn read_record(&mut self) -> ReaderResult<Option<Sequence<K>>> {
        if self.finished {
            return Ok(None);
        }

        let header = match self.next_header.take() {
            Some(header) => header,
            None => loop {
                let line_number = self.line_number + 1;
                match self.read_line()? {
                    None => {
                        self.finished = true;
                        return Ok(None);
                    }
                    Some("") => continue,
                    Some(line) if line.starts_with('>') => break line.to_string(),
                    Some(_) => {
                        self.finished = true;
                        return Err(ReaderError::invalid_field(
                            line_number,
                            "header",
                            "ERROR: sequence data found before the first '>' header".into(),
                        ));
                    }
                }
            },
        };
        self.header_line = self.line_number;

        let mut residues = Vec::new();
        loop {
            match self.read_line()? {
                None => {
                    self.finished = true;
                    break;
                }
                Some("") => continue,
                Some(line) if line.starts_with('>') => {
                    let next = line.to_string();
                    self.next_header = Some(next);
                    break;
                }
                Some(line) => residues.extend_from_slice(line.as_bytes()),
            }
        }

        let raw = header[1..].trim();
        let record = if self.parse_id {
            let (id, description) = split_header(raw);
            Sequence::new(id, residues).with_description(description)
        } else {
            Sequence::new(raw, residues)
        };
        Ok(Some(record))
    }
}

impl<K: Alphabet> Iterator for FastaReader<K> {
    type Item = ReaderResult<Sequence<K>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// Reference sequences keyed by id, loaded whole into memory.
///
/// # Example
///
/// ```
/// use gxfkit::fasta::ReferenceStore;
///
/// let data = ">Chr01\nACGTACGTAC\n>Chr02\nTTTT\n";
/// let store = ReferenceStore::from_reader(std::io::Cursor::new(data)).unwrap();
///
/// assert_eq!(store.len(), 2);
/// assert_eq!(store.chrom_len("Chr01"), Some(10));
/// assert!(store.get("Chr03").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReferenceStore {
    sequences: HashMap<String, Nucleotide>,
    order: Vec<String>,
}

impl ReferenceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every record of a FASTA file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> ReaderResult<Self> {
        Self::from_fasta(FastaReader::from_path(path)?)
    }

    /// Loads every record of a FASTA stream.
    pub fn from_reader<T>(reader: T) -> ReaderResult<Self>
    where
        T: Read + Send + 'static,
    {
        Self::from_fasta(FastaReader::from_reader(reader)?)
    }

    /// Drains a configured reader into a store.
    ///
    /// # Errors
    ///
    /// Fails on the first malformed record or on a duplicated id.
    pub fn from_fasta(mut reader: FastaReader<Nucleic>) -> ReaderResult<Self> {
        let mut store = Self::new();
        while let Some(record) = reader.next() {
            let record = record?;
            let line = reader.header_line();
            store.insert(record).map_err(|id| {
                ReaderError::invalid_field(
                    line,
                    "id",
                    format!("ERROR: duplicated sequence id '{id}'"),
                )
            })?;
        }
        log::info!("loaded {} reference sequences", store.len());
        Ok(store)
    }

    /// Adds a sequence; returns the id back as the error if already present.
    pub fn insert(&mut self, sequence: Nucleotide) -> Result<(), String> {
        match self.sequences.entry(sequence.id().to_string()) {
            Entry::Occupied(slot) => Err(slot.key().clone()),
            Entry::Vacant(slot) => {
                self.order.push(slot.key().clone());
                slot.insert(sequence);
                Ok(())
            }
        }
    }

    /// Looks up a sequence by id.
    pub fn get(&self, id: &str) -> Option<&Nucleotide> {
        self.sequences.get(id)
    }

    /// Length of a sequence in residues.
    pub fn chrom_len(&self, id: &str) -> Option<usize> {
        self.sequences.get(id).map(|seq| seq.residues().len())
    }

    /// Returns `true` if `id` is loaded.
    pub fn contains(&self, id: &str) -> bool {
        self.sequences.contains_key(id)
    }

    /// Number of sequences.
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Returns `true` if the store holds no sequences.
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Sequence ids in load order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

impl FromIterator<Nucleotide> for ReferenceStore {
    /// Collects sequences; later duplicates are dropped.
    fn from_iter<I: IntoIterator<Item = Nucleotide>>(iter: I) -> Self {
        let mut store = Self::new();
        for sequence in iter {
            if let Err(id) = store.insert(sequence) {
                log::warn!("ignoring duplicated sequence id '{id}'");
            }
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn data_before_header_is_malformed() {
        let mut reader = FastaReader::<Nucleic>::from_reader(Cursor::new("ACGT\n>s1\nAC\n")).unwrap();
        assert!(matches!(
            reader.next(),
            Some(Err(ReaderError::InvalidField { line: 1, .. }))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn raw_ids_keep_whole_header() {
        let reader = FastaReader::<Nucleic>::builder()
            .from_reader(Cursor::new(">tx1 gene=A\nAC\n"))
            .parse_id(false)
            .build()
            .unwrap();
        let records: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(records[0].id(), "tx1 gene=A");
        assert_eq!(records[0].description(), None);
    }

    #[test]
    fn duplicated_ids_are_rejected() {
        let err = ReferenceStore::from_reader(Cursor::new(">a\nAC\n>b\nGG\n>a\nTT\n")).unwrap_err();
        match err {
            ReaderError::InvalidField { line, field, .. } => {
                assert_eq!(line, 5);
                assert_eq!(field, "id");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_records_are_kept() {
        let data = ">a\n>b\nAC\n";
        let records: Vec<Nucleotide> = FastaReader::from_reader(Cursor::new(data))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_empty());
    }
}
