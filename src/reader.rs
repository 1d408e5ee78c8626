use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

#[cfg(feature = "bz2")]
use bzip2::read::BzDecoder;
#[cfg(feature = "gzip")]
use flate2::read::MultiGzDecoder;
#[cfg(any(feature = "rayon", feature = "mmap"))]
use memchr::memchr;
#[cfg(feature = "rayon")]
use memchr::memchr_iter;
#[cfg(feature = "mmap")]
use memmap2::MmapOptions;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(any(feature = "mmap", feature = "rayon"))]
use std::sync::Arc;
#[cfg(feature = "zstd")]
use zstd::stream::read::Decoder as ZstdDecoder;

use crate::record::{IntervalRecord, RecordFormat};

/// Result alias for reader operations.
pub type ReaderResult<T> = Result<T, ReaderError>;

/// An error that can occur when reading an annotation or FASTA file.
#[derive(Debug)]
pub enum ReaderError {
    /// An I/O error.
    Io(io::Error),
    /// An error that occurred when memory-mapping a file.
    #[cfg(feature = "mmap")]
    Mmap(io::Error),
    /// An error that occurred when decoding a line.
    InvalidEncoding {
        /// The line number where the error occurred.
        line: usize,
        /// The error message.
        message: String,
    },
    /// An error that occurred when parsing a field.
    InvalidField {
        /// The line number where the error occurred.
        line: usize,
        /// The name of the field that could not be parsed.
        field: &'static str,
        /// The error message.
        message: String,
    },
    /// An error that occurred when a record has an unexpected number of fields.
    UnexpectedFieldCount {
        /// The line number where the error occurred.
        line: usize,
        /// The expected number of fields.
        expected: usize,
        /// The actual number of fields.
        actual: usize,
    },
    /// A feature type required by the caller never appeared in the input.
    MissingFeatureType {
        /// The requested feature type.
        feature: String,
    },
    /// An error that occurred when building a reader.
    Builder(String),
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderError::Io(err) => write!(f, "I/O error: {err}"),
            #[cfg(feature = "mmap")]
            ReaderError::Mmap(err) => write!(f, "mmap error: {err}"),
            ReaderError::InvalidEncoding { line, message } => {
                write!(f, "invalid UTF-8 at line {line}: {message}")
            }
            ReaderError::InvalidField {
                line,
                field,
                message,
            } => write!(f, "invalid {field} at line {line}: {message}"),
            ReaderError::UnexpectedFieldCount {
                line,
                expected,
                actual,
            } => write!(
                f,
                "line {line} had {actual} fields, expected at least {expected}"
            ),
            ReaderError::MissingFeatureType { feature } => {
                write!(f, "feature type '{feature}' not found in input")
            }
            ReaderError::Builder(msg) => write!(f, "builder error: {msg}"),
        }
    }
}

impl std::error::Error for ReaderError {
    /// Returns the source error, if any.
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReaderError::Io(err) => Some(err),
            #[cfg(feature = "mmap")]
            ReaderError::Mmap(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ReaderError {
    /// Creates a new `ReaderError` from an `io::Error`.
    fn from(err: io::Error) -> Self {
        ReaderError::Io(err)
    }
}

impl ReaderError {
    /// Creates a new `ReaderError` for an invalid field.
    pub(crate) fn invalid_field(line: usize, field: &'static str, message: String) -> ReaderError {
        ReaderError::InvalidField {
            line,
            field,
            message,
        }
    }

    /// Creates a new `ReaderError` for an unexpected field count.
    pub(crate) fn unexpected_field_count(
        line: usize,
        expected: usize,
        actual: usize,
    ) -> ReaderError {
        ReaderError::UnexpectedFieldCount {
            line,
            expected,
            actual,
        }
    }

    /// Creates a new `ReaderError` for an invalid encoding.
    pub(crate) fn invalid_encoding(line: usize, message: impl Into<String>) -> ReaderError {
        ReaderError::InvalidEncoding {
            line,
            message: message.into(),
        }
    }

    /// Creates a new `ReaderError` for a feature type absent from the input.
    pub(crate) fn missing_feature(feature: impl Into<String>) -> ReaderError {
        ReaderError::MissingFeatureType {
            feature: feature.into(),
        }
    }
}

/// Configuration for reader behaviour across formats.
///
/// By default every record is yielded. `feature_types` restricts the output
/// to the given feature names (case-insensitive) and `require_feature`
/// makes the reader fail at end of input when a feature never appeared.
#[derive(Clone, Debug, Default)]
pub struct ReaderOptions<'a> {
    feature_types: Option<Vec<Cow<'a, str>>>,
    required_features: Vec<Cow<'a, str>>,
}

impl<'a> ReaderOptions<'a> {
    /// Creates a new options builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the yielded records to a single feature type.
    pub fn feature_type<F>(mut self, feature: F) -> Self
    where
        F: Into<Cow<'a, str>>,
    {
        self.feature_types = Some(vec![feature.into()]);
        self
    }

    /// Limits the yielded records to the provided feature types.
    pub fn feature_types<I, F>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Cow<'a, str>>,
    {
        self.feature_types = Some(features.into_iter().map(Into::into).collect());
        self
    }

    /// Removes any feature filter.
    pub fn clear_feature_types(mut self) -> Self {
        self.feature_types = None;
        self
    }

    /// Requires `feature` to appear at least once in the input.
    pub fn require_feature<F>(mut self, feature: F) -> Self
    where
        F: Into<Cow<'a, str>>,
    {
        self.required_features.push(feature.into());
        self
    }

    /// Returns `true` if records of `feature` pass the filter.
    pub(crate) fn accepts(&self, feature: &str) -> bool {
        match &self.feature_types {
            Some(types) => types.iter().any(|t| t.eq_ignore_ascii_case(feature)),
            None => true,
        }
    }

    /// Returns the required feature names.
    pub(crate) fn required(&self) -> &[Cow<'a, str>] {
        &self.required_features
    }

    /// Converts the options into owned values.
    pub(crate) fn into_owned(self) -> ReaderOptions<'static> {
        ReaderOptions {
            feature_types: self.feature_types.map(|types| {
                types
                    .into_iter()
                    .map(|t| Cow::Owned(t.into_owned()))
                    .collect()
            }),
            required_features: self
                .required_features
                .into_iter()
                .map(|t| Cow::Owned(t.into_owned()))
                .collect(),
        }
    }
}

/// The mode to use when reading a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderMode {
    /// Read the file line by line. This is the default.
    Default,
    /// Memory-map the file. This can be faster for large files, but requires
    /// the `mmap` feature.
    Mmap,
}

/// The compression format of the input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Automatically detect the compression format from the file extension.
    ///
    /// This is the default.
    #[default]
    Auto,
    /// No compression.
    None,
    /// Gzip compression.
    Gzip,
    /// Zstandard compression.
    Zstd,
    /// Bzip2 compression.
    Bzip2,
}

/// Detect compression from file extension
fn detect_compression_from_extension(path: &Path) -> Compression {
    let ext = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    match ext {
        "gz" => Compression::Gzip,
        "zst" | "zstd" => Compression::Zstd,
        "bz2" | "bzip2" => Compression::Bzip2,
        _ => Compression::None,
    }
}

/// Opens a path as a (possibly decompressing) stream.
///
/// Shared by the annotation and FASTA readers.
pub(crate) fn open_path_stream(
    path: &Path,
    compression: Compression,
) -> ReaderResult<Box<dyn Read + Send>> {
    let compression = match compression {
        Compression::Auto => detect_compression_from_extension(path),
        other => other,
    };
    let file = File::open(path)?;

    match compression {
        Compression::None | Compression::Auto => Ok(Box::new(file)),
        Compression::Gzip => {
            #[cfg(feature = "gzip")]
            {
                Ok(Box::new(MultiGzDecoder::new(file)))
            }
            #[cfg(not(feature = "gzip"))]
            {
                drop(file);
                Err(ReaderError::Builder(
                    "gzip compression requested but the `gzip` feature is disabled".into(),
                ))
            }
        }
        Compression::Zstd => {
            #[cfg(feature = "zstd")]
            {
                Ok(Box::new(ZstdDecoder::new(file)?))
            }
            #[cfg(not(feature = "zstd"))]
            {
                drop(file);
                Err(ReaderError::Builder(
                    "zstd compression requested but the `zstd` feature is disabled".into(),
                ))
            }
        }
        Compression::Bzip2 => {
            #[cfg(feature = "bz2")]
            {
                Ok(Box::new(BzDecoder::new(file)))
            }
            #[cfg(not(feature = "bz2"))]
            {
                drop(file);
                Err(ReaderError::Builder(
                    "bzip2 compression requested but the `bz2` feature is disabled".into(),
                ))
            }
        }
    }
}

/// A builder for creating a `Reader`.
///
/// # Example
///
/// ```rust,no_run
/// use gxfkit::{Gff, Reader, ReaderMode};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let reader = Reader::<Gff>::builder()
///         .from_path("annotation.gff3")
///         .mode(ReaderMode::Default)
///         .buffer_capacity(128 * 1024)
///         .build()?;
///
///     for record in reader {
///         let record = record?;
///         println!("{}", record.id);
///     }
///
///     Ok(())
/// }
/// ```
pub struct ReaderBuilder<F: RecordFormat> {
    source: Option<ReaderSource>,
    options: ReaderOptions<'static>,
    mode: ReaderMode,
    buffer_capacity: usize,
    compression: Compression,
    _marker: PhantomData<F>,
}

impl<F: RecordFormat> Default for ReaderBuilder<F> {
    fn default() -> Self {
        Self {
            source: None,
            options: ReaderOptions::default(),
            mode: ReaderMode::Default,
            buffer_capacity: 64 * 1024,
            compression: Compression::default(),
            _marker: PhantomData,
        }
    }
}

impl<F: RecordFormat> ReaderBuilder<F> {
    /// Reads from a filesystem path.
    pub fn from_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source = Some(ReaderSource::Path(path.as_ref().into()));
        self
    }

    /// Reads from an arbitrary byte stream.
    pub fn from_reader<T>(mut self, reader: T) -> Self
    where
        T: Read + Send + 'static,
    {
        self.source = Some(ReaderSource::Reader(Box::new(reader)));
        self
    }

    /// Replaces the reader options.
    pub fn options(mut self, options: ReaderOptions<'_>) -> Self {
        self.options = options.into_owned();
        self
    }

    /// Sets the reading mode.
    pub fn mode(mut self, mode: ReaderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the buffer capacity for the reader.
    ///
    /// The default is 64 KB.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(8 * 1024);
        self
    }

    /// Sets the compression format of the input.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Builds the `Reader`.
    pub fn build(mut self) -> ReaderResult<Reader<F>> {
        let source = self
            .source
            .take()
            .ok_or_else(|| ReaderError::Builder("ERROR: no input source configured".into()))?;

        match (source, self.mode) {
            (ReaderSource::Path(path), ReaderMode::Default) => {
                let stream = open_path_stream(&path, self.compression)?;
                Ok(Reader::from_stream(stream, self.buffer_capacity, self.options))
            }
            (ReaderSource::Path(path), ReaderMode::Mmap) => self.build_mmap(path),
            (ReaderSource::Reader(stream), ReaderMode::Default) => {
                Ok(Reader::from_stream(stream, self.buffer_capacity, self.options))
            }
            (ReaderSource::Reader(_), ReaderMode::Mmap) => Err(ReaderError::Builder(
                "ERROR: mmap mode requires a filesystem path".into(),
            )),
        }
    }

    /// Builds a `Reader` from a memory-mapped file.
    #[cfg(feature = "mmap")]
    fn build_mmap(self, path: PathBuf) -> ReaderResult<Reader<F>> {
        let compression = match self.compression {
            Compression::Auto => detect_compression_from_extension(&path),
            other => other,
        };
        if compression != Compression::None {
            return Err(ReaderError::Builder(
                "ERROR: compression is only supported in buffered mode".into(),
            ));
        }

        let file = File::open(&path)?;
        let map = unsafe { MmapOptions::new().map(&file) }.map_err(ReaderError::Mmap)?;
        Ok(Reader::with_inner(
            InnerSource::Mmap(MmapInner {
                data: Arc::new(map),
                cursor: 0,
            }),
            self.options,
        ))
    }

    #[cfg(not(feature = "mmap"))]
    fn build_mmap(self, _path: PathBuf) -> ReaderResult<Reader<F>> {
        Err(ReaderError::Builder(
            "ERROR: enable the `mmap` feature to use mmap mode".into(),
        ))
    }
}

/// Reader source
enum ReaderSource {
    Path(PathBuf),
    Reader(Box<dyn Read + Send>),
}

/// Inner reader source
enum InnerSource {
    Buffered(BufReader<Box<dyn Read + Send>>),
    #[cfg(feature = "mmap")]
    Mmap(MmapInner),
}

/// Inner mmap reader source
#[cfg(feature = "mmap")]
struct MmapInner {
    data: Arc<memmap2::Mmap>,
    cursor: usize,
}

/// A lazy, single-pass reader of annotation records.
///
/// The dialect is chosen with the type parameter ([`crate::Bed`],
/// [`crate::Gff`] or [`crate::Gtf`]). The underlying file is owned by the
/// reader and closed when it is dropped.
///
/// # Example
///
/// ```rust,no_run
/// use gxfkit::{Bed, Reader};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut reader = Reader::<Bed>::from_path("regions.bed")?;
///
///     for record in reader.records() {
///         let record = record?;
///         println!("{}:{}-{}", record.chrom, record.start, record.end);
///     }
///
///     Ok(())
/// }
/// ```
pub struct Reader<F: RecordFormat> {
    inner: InnerSource,
    buffer: String,
    line_number: usize,
    options: ReaderOptions<'static>,
    seen: HashSet<String>,
    finished: bool,
    _marker: PhantomData<F>,
}

impl<F: RecordFormat> std::fmt::Debug for Reader<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("line_number", &self.line_number)
            .field("options", &self.options)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<F: RecordFormat> Reader<F> {
    /// Creates a new `ReaderBuilder` to configure a `Reader`.
    pub fn builder() -> ReaderBuilder<F> {
        ReaderBuilder::default()
    }

    /// Creates a new `Reader` from a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> ReaderResult<Self> {
        Self::builder().from_path(path).build()
    }

    /// Creates a new `Reader` from a path with custom reader options.
    pub fn from_path_with_options<P: AsRef<Path>>(
        path: P,
        options: ReaderOptions<'_>,
    ) -> ReaderResult<Self> {
        Self::builder().from_path(path).options(options).build()
    }

    /// Creates a new `Reader` from a byte stream.
    ///
    /// # Example
    ///
    /// ```
    /// use gxfkit::{Bed, Reader};
    ///
    /// let data = "chr1\t10\t20\tr1\t0\t+\n";
    /// let reader = Reader::<Bed>::from_reader(std::io::Cursor::new(data)).unwrap();
    /// assert_eq!(reader.count(), 1);
    /// ```
    pub fn from_reader<T>(reader: T) -> ReaderResult<Self>
    where
        T: Read + Send + 'static,
    {
        Self::builder().from_reader(reader).build()
    }

    /// Creates a new `Reader` backed by a memory-mapped file.
    #[cfg(feature = "mmap")]
    pub fn from_mmap<P: AsRef<Path>>(path: P) -> ReaderResult<Self> {
        Self::builder()
            .from_path(path)
            .mode(ReaderMode::Mmap)
            .build()
    }

    pub(crate) fn from_stream(
        reader: Box<dyn Read + Send>,
        buffer_capacity: usize,
        options: ReaderOptions<'static>,
    ) -> Self {
        Self::with_inner(
            InnerSource::Buffered(BufReader::with_capacity(buffer_capacity, reader)),
            options,
        )
    }

    fn with_inner(inner: InnerSource, options: ReaderOptions<'static>) -> Self {
        Self {
            inner,
            buffer: String::with_capacity(1024),
            line_number: 0,
            options,
            seen: HashSet::new(),
            finished: false,
            _marker: PhantomData,
        }
    }

    /// Returns the current line number of the reader.
    pub fn current_line(&self) -> usize {
        self.line_number
    }

    /// Returns an iterator over the records in the reader.
    pub fn records(&mut self) -> Records<'_, F> {
        Records { reader: self }
    }

    /// Returns a parallel iterator over the remaining records.
    ///
    /// The rest of the input is loaded into memory, split into lines and
    /// parsed on the rayon pool. Each line reports its own result; the
    /// feature filter applies, required features are not checked.
    #[cfg(feature = "rayon")]
    pub fn par_records(
        self,
    ) -> ReaderResult<impl ParallelIterator<Item = ReaderResult<IntervalRecord>>> {
        let (data, base) = match self.inner {
            InnerSource::Buffered(mut reader) => {
                let mut data = Vec::new();
                reader.read_to_end(&mut data)?;
                (SharedBytes::Owned(Arc::new(data)), 0)
            }
            #[cfg(feature = "mmap")]
            InnerSource::Mmap(inner) => (SharedBytes::Mmap(inner.data), inner.cursor),
        };
        let spans = build_line_spans(&data.as_slice()[base..], base, self.line_number);
        let options = self.options;

        Ok(spans
            .into_par_iter()
            .map(move |span| parse_line::<F>(data.slice(span.start, span.end), span.line_no))
            .filter(move |parsed| match parsed {
                Ok(record) => options.accepts(&record.feature_type),
                Err(_) => true,
            }))
    }

    /// Returns the next record in the reader.
    fn next_record(&mut self) -> Option<ReaderResult<IntervalRecord>> {
        if self.finished {
            return None;
        }

        loop {
            let parsed = match self.next_line() {
                Ok(Some(parsed)) => parsed,
                Ok(None) => {
                    self.finished = true;
                    return self.check_required().err().map(Err);
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            };

            match parsed {
                Ok(record) => {
                    if !self.options.required().is_empty() {
                        self.seen.insert(record.feature_type.to_ascii_lowercase());
                    }
                    if self.options.accepts(&record.feature_type) {
                        return Some(Ok(record));
                    }
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
    }

    /// Reads and parses the next non-skipped line.
    ///
    /// The outer result reports I/O failures, the inner one parse failures.
    fn next_line(&mut self) -> ReaderResult<Option<ReaderResult<IntervalRecord>>> {
        loop {
            match &mut self.inner {
                InnerSource::Buffered(reader) => {
                    self.buffer.clear();
                    if reader.read_line(&mut self.buffer)? == 0 {
                        return Ok(None);
                    }
                    trim_line(&mut self.buffer);
                    self.line_number += 1;
                    if should_skip(&self.buffer) {
                        continue;
                    }
                    return Ok(Some(parse_line::<F>(
                        self.buffer.as_bytes(),
                        self.line_number,
                    )));
                }
                #[cfg(feature = "mmap")]
                InnerSource::Mmap(inner) => {
                    if inner.cursor >= inner.data.len() {
                        return Ok(None);
                    }

                    let data = &inner.data;
                    let start = inner.cursor;
                    let rel_end = memchr(b'\n', &data[start..]).map(|idx| start + idx);
                    let mut end = rel_end.unwrap_or(data.len());
                    if end > start && data[end - 1] == b'\r' {
                        end -= 1;
                    }
                    inner.cursor = rel_end.map(|pos| pos + 1).unwrap_or(data.len());
                    self.line_number += 1;

                    let line_bytes = &data[start..end];
                    if should_skip_bytes(line_bytes) {
                        continue;
                    }
                    return Ok(Some(parse_line::<F>(line_bytes, self.line_number)));
                }
            }
        }
    }

    /// Fails if a required feature type was never seen.
    fn check_required(&self) -> ReaderResult<()> {
        for feature in self.options.required() {
            if !self.seen.contains(&feature.to_ascii_lowercase()) {
                return Err(ReaderError::missing_feature(feature.as_ref()));
            }
        }
        Ok(())
    }
}

impl<F: RecordFormat> Iterator for Reader<F> {
    type Item = ReaderResult<IntervalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}

/// An iterator over the records in a `Reader`.
///
/// This struct is created by the `records` method on `Reader`.
pub struct Records<'a, F: RecordFormat> {
    reader: &'a mut Reader<F>,
}

impl<'a, F: RecordFormat> Iterator for Records<'a, F> {
    type Item = ReaderResult<IntervalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_record()
    }
}

/// Line span for parallel parsing
#[cfg(feature = "rayon")]
#[derive(Clone)]
struct LineSpan {
    line_no: usize,
    start: usize,
    end: usize,
}

/// Shared bytes
#[cfg(feature = "rayon")]
#[derive(Clone)]
enum SharedBytes {
    #[cfg(feature = "mmap")]
    Mmap(Arc<memmap2::Mmap>),
    Owned(Arc<Vec<u8>>),
}

#[cfg(feature = "rayon")]
impl SharedBytes {
    /// Get bytes as slice
    fn as_slice(&self) -> &[u8] {
        match self {
            #[cfg(feature = "mmap")]
            SharedBytes::Mmap(map) => map.as_ref(),
            SharedBytes::Owned(bytes) => bytes.as_slice(),
        }
    }

    /// Get the slice of the bytes
    fn slice(&self, start: usize, end: usize) -> &[u8] {
        &self.as_slice()[start..end]
    }
}

/// Parses a single annotation line in dialect `F`.
///
/// Fields are split on tabs; empty fields are kept so column positions stay
/// fixed.
pub(crate) fn parse_line<F: RecordFormat>(line: &[u8], line_number: usize) -> ReaderResult<IntervalRecord> {
    let text = std::str::from_utf8(line)
        .map_err(|err| ReaderError::invalid_encoding(line_number, err.to_string()))?;
    let text = text.trim_end_matches(['\r', '\n']);

    if text.is_empty() {
        return Err(ReaderError::invalid_field(
            line_number,
            "line",
            "ERROR: encountered empty record".into(),
        ));
    }

    let fields: Vec<&str> = text.split('\t').collect();
    if fields.len() < F::MIN_FIELDS {
        return Err(ReaderError::unexpected_field_count(
            line_number,
            F::MIN_FIELDS,
            fields.len(),
        ));
    }

    F::from_fields(&fields, line_number)
}

/// Trim the line terminator.
fn trim_line(line: &mut String) {
    while line.ends_with(['\n', '\r']) {
        line.pop();
    }
}

/// Returns `true` if the line should be skipped.
pub(crate) fn should_skip(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || trimmed.starts_with('#')
        || trimmed.starts_with("track ")
        || trimmed.starts_with("browser ")
}

/// Returns `true` if the line should be skipped.
#[cfg(any(feature = "rayon", feature = "mmap"))]
fn should_skip_bytes(line: &[u8]) -> bool {
    let mut start = 0usize;
    let mut end = line.len();

    while start < end && line[start].is_ascii_whitespace() {
        start += 1;
    }
    while start < end && line[end - 1].is_ascii_whitespace() {
        end -= 1;
    }

    if start == end {
        return true;
    }

    let trimmed = &line[start..end];
    trimmed.starts_with(b"#") || trimmed.starts_with(b"track ") || trimmed.starts_with(b"browser ")
}

/// Build line spans for parallel parsing
#[cfg(feature = "rayon")]
fn build_line_spans(data: &[u8], base_offset: usize, starting_line: usize) -> Vec<LineSpan> {
    let mut spans = Vec::with_capacity(memchr_iter(b'\n', data).count() + 1);
    let mut offset = 0usize;
    let mut line_no = starting_line;

    while offset < data.len() {
        let line_start = offset;
        let rel_end = memchr(b'\n', &data[line_start..]).map(|idx| line_start + idx);
        let line_end = rel_end.unwrap_or(data.len());
        let mut end = line_end;
        if end > line_start && data[end - 1] == b'\r' {
            end -= 1;
        }

        line_no += 1;
        let next_offset = rel_end.map(|pos| pos + 1).unwrap_or(data.len());

        if !should_skip_bytes(&data[line_start..end]) {
            spans.push(LineSpan {
                line_no,
                start: base_offset + line_start,
                end: base_offset + end,
            });
        }

        offset = next_offset;
    }

    spans
}
