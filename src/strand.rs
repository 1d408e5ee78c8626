use std::fmt;

use crate::reader::{ReaderError, ReaderResult};

/// Represents the strand of a genomic feature.
///
/// This enum is used to indicate the orientation of a feature on a reference sequence.
///
/// # Example
///
/// ```
/// use gxfkit::strand::Strand;
///
/// let strand = Strand::Forward;
/// assert_eq!(strand, Strand::Forward);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    /// Positive strand (`+`).
    Forward,
    /// Negative strand (`-`).
    Reverse,
    /// Unknown strand (`.` or `?`).
    Unknown,
}

impl Strand {
    /// Parses a string into a `Strand`.
    ///
    /// # Errors
    ///
    /// This function returns an error if the string is not a valid strand.
    pub(crate) fn parse(raw: &str, line: usize) -> ReaderResult<Self> {
        match raw {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            "." | "?" => Ok(Strand::Unknown),
            other => Err(ReaderError::invalid_field(
                line,
                "strand",
                format!("ERROR: expected '+', '-', '.', or '?', got '{other}' in {line}:strand"),
            )),
        }
    }

    /// Returns `true` for the `-` strand.
    #[inline]
    pub fn is_reverse(self) -> bool {
        matches!(self, Strand::Reverse)
    }

    /// Returns the single-byte representation (`+`, `-` or `.`).
    #[inline]
    pub fn as_byte(self) -> u8 {
        match self {
            Strand::Forward => b'+',
            Strand::Reverse => b'-',
            Strand::Unknown => b'.',
        }
    }

    /// Orders a genomic span as `(five_prime, three_prime)` ends.
    ///
    /// On the `-` strand the 5' end of a feature is its highest coordinate,
    /// so the pair comes back swapped. Features without a strand are read
    /// as forward.
    ///
    /// # Example
    ///
    /// ```
    /// use gxfkit::strand::Strand;
    ///
    /// assert_eq!(Strand::Forward.orient(10, 20), (10, 20));
    /// assert_eq!(Strand::Reverse.orient(10, 20), (20, 10));
    /// ```
    #[inline]
    pub fn orient(self, start: u64, end: u64) -> (u64, u64) {
        match self {
            Strand::Reverse => (end, start),
            Strand::Forward | Strand::Unknown => (start, end),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => f.write_str("+"),
            Strand::Reverse => f.write_str("-"),
            Strand::Unknown => f.write_str("."),
        }
    }
}
