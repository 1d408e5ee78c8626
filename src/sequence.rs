use std::fmt;
use std::marker::PhantomData;
use std::ops::Neg;

use memchr::memchr;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Standard genetic code indexed by `b1 * 16 + b2 * 4 + b3` with A=0, C=1, G=2, T/U=3.
const CODON_TABLE: &[u8; 64] = b"KNKNTTTTRSRSIIMIQHQHPPPPRRRRLLLLEDEDAAAAGGGGVVVV*Y*YSSSS*CWCLFLF";

/// Residue emitted for codons containing ambiguous or non-nucleotide bytes.
pub const UNKNOWN_RESIDUE: u8 = b'-';

/// Residue marking a stop codon.
pub const STOP_RESIDUE: u8 = b'*';

const START_CODON: [u8; 3] = *b"ATG";

/// Describes the residue alphabet of a [`Sequence`].
///
/// Implemented by the [`Nucleic`] and [`Amino`] marker types.
pub trait Alphabet: fmt::Debug + Clone + Copy + PartialEq + Eq + Send + Sync + 'static {
    /// Human readable alphabet name (for error messages).
    const TYPE_NAME: &'static str;

    /// Returns `true` if `byte` belongs to the alphabet (case-insensitive).
    fn is_valid(byte: u8) -> bool;
}

/// Marker type for nucleotide sequences (DNA or RNA).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nucleic;

/// Marker type for protein sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amino;

impl Alphabet for Nucleic {
    const TYPE_NAME: &'static str = "nucleotide";

    fn is_valid(byte: u8) -> bool {
        matches!(
            byte.to_ascii_uppercase(),
            b'A' | b'C'
                | b'G'
                | b'T'
                | b'U'
                | b'N'
                | b'R'
                | b'Y'
                | b'K'
                | b'M'
                | b'S'
                | b'W'
                | b'B'
                | b'D'
                | b'H'
                | b'V'
        )
    }
}

impl Alphabet for Amino {
    const TYPE_NAME: &'static str = "protein";

    fn is_valid(byte: u8) -> bool {
        byte.is_ascii_alphabetic() || byte == STOP_RESIDUE || byte == UNKNOWN_RESIDUE
    }
}

/// A biological sequence with an identifier.
///
/// Values are treated as immutable: slicing, reverse complementing and
/// translating all produce a new `Sequence`. The only in-place mutation is
/// [`Sequence::extend`].
///
/// The reported length excludes a single trailing stop marker (`*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence<K: Alphabet> {
    id: String,
    description: Option<String>,
    residues: Vec<u8>,
    _kind: PhantomData<K>,
}

/// A DNA or RNA sequence.
pub type Nucleotide = Sequence<Nucleic>;

/// An amino-acid sequence, possibly terminated by `*`.
pub type Protein = Sequence<Amino>;

impl<K: Alphabet> Sequence<K> {
    /// Creates a new sequence from an id and its residues.
    ///
    /// # Example
    ///
    /// ```
    /// use gxfkit::sequence::Protein;
    ///
    /// let protein = Protein::new("p1", "MK*");
    /// assert_eq!(protein.len(), 2);
    /// ```
    pub fn new<I, R>(id: I, residues: R) -> Self
    where
        I: Into<String>,
        R: Into<Vec<u8>>,
    {
        Self {
            id: id.into(),
            description: None,
            residues: residues.into(),
            _kind: PhantomData,
        }
    }

    /// Attaches a free-text description (the FASTA header after the id).
    pub fn with_description<D: Into<String>>(mut self, description: D) -> Self {
        let description = description.into();
        self.description = (!description.is_empty()).then_some(description);
        self
    }

    /// Returns the sequence identifier.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replaces the sequence identifier.
    pub fn set_id<I: Into<String>>(&mut self, id: I) {
        self.id = id.into();
    }

    /// Returns the description, if any.
    #[inline]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the raw residues, including any trailing stop marker.
    #[inline]
    pub fn residues(&self) -> &[u8] {
        &self.residues
    }

    /// Consumes the sequence and returns its residues.
    pub fn into_residues(self) -> Vec<u8> {
        self.residues
    }

    /// Returns the number of residues, not counting a trailing `*`.
    #[inline]
    pub fn len(&self) -> usize {
        self.residues.len() - usize::from(self.has_stop())
    }

    /// Returns `true` if the sequence has no residues besides a stop marker.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the last residue is a stop marker.
    #[inline]
    pub fn has_stop(&self) -> bool {
        self.residues.last() == Some(&STOP_RESIDUE)
    }

    /// Returns `true` if every residue belongs to the alphabet.
    pub fn is_valid(&self) -> bool {
        self.residues.iter().all(|&b| K::is_valid(b))
    }

    /// Returns the residues as text, replacing invalid UTF-8.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.residues).into_owned()
    }

    /// Returns the 0-based half-open range `[start, end)` as a new sequence.
    ///
    /// Bounds past the end are clamped, and `start > end` yields an empty
    /// sequence. The id is kept.
    ///
    /// # Example
    ///
    /// ```
    /// use gxfkit::sequence::Nucleotide;
    ///
    /// let seq = Nucleotide::new("s", "ACGTACGT");
    /// assert_eq!(seq.slice(2, 5).residues(), b"GTA");
    /// assert!(seq.slice(3, 3).is_empty());
    /// ```
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.residues.len());
        let start = start.min(end);
        self.derive(self.residues[start..end].to_vec())
    }

    /// Like [`Sequence::slice`] but keeps every `step`-th residue.
    ///
    /// Returns `None` when `step` is zero.
    pub fn slice_by(&self, start: usize, end: usize, step: usize) -> Option<Self> {
        if step == 0 {
            return None;
        }
        let end = end.min(self.residues.len());
        let start = start.min(end);
        let residues = self.residues[start..end]
            .iter()
            .step_by(step)
            .copied()
            .collect::<Vec<_>>();
        Some(self.derive(residues))
    }

    /// Returns residues `start..=end` using 1-based inclusive coordinates.
    ///
    /// # Example
    ///
    /// ```
    /// use gxfkit::sequence::Nucleotide;
    ///
    /// let seq = Nucleotide::new("s", "ACGTACGT");
    /// assert_eq!(seq.subseq(1, 3).residues(), b"ACG");
    /// ```
    pub fn subseq(&self, start: usize, end: usize) -> Self {
        self.slice(start.saturating_sub(1), end)
    }

    /// Appends residues in place.
    pub fn extend(&mut self, residues: &[u8]) {
        self.residues.extend_from_slice(residues);
    }

    /// Renders the sequence as a FASTA record wrapped at `width` columns.
    ///
    /// A `width` of zero writes the sequence on a single line.
    pub fn to_fasta(&self, width: usize) -> String {
        let mut out = String::with_capacity(self.residues.len() + self.id.len() + 8);
        out.push('>');
        out.push_str(&self.id);
        if let Some(description) = &self.description {
            out.push(' ');
            out.push_str(description);
        }
        out.push('\n');
        let width = if width == 0 {
            self.residues.len().max(1)
        } else {
            width
        };
        for chunk in self.residues.chunks(width) {
            out.push_str(&String::from_utf8_lossy(chunk));
            out.push('\n');
        }
        out
    }

    fn derive(&self, residues: Vec<u8>) -> Self {
        Self {
            id: self.id.clone(),
            description: self.description.clone(),
            residues,
            _kind: PhantomData,
        }
    }
}

impl<K: Alphabet> fmt::Display for Sequence<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fasta(60))
    }
}

impl Sequence<Nucleic> {
    /// Returns `true` if the sequence looks like RNA (has `U` and no `T`).
    pub fn is_rna(&self) -> bool {
        let has_u = memchr::memchr2(b'U', b'u', &self.residues).is_some();
        has_u && memchr::memchr2(b'T', b't', &self.residues).is_none()
    }

    /// Returns the reverse complement.
    ///
    /// The RNA table (`A`↔`U`) is used when [`Sequence::is_rna`] holds,
    /// otherwise the DNA table. Case and IUPAC ambiguity codes are kept.
    ///
    /// # Example
    ///
    /// ```
    /// use gxfkit::sequence::Nucleotide;
    ///
    /// let seq = Nucleotide::new("s", "AACGn");
    /// assert_eq!(seq.reverse_complement().residues(), b"nCGTT");
    /// assert_eq!((-Nucleotide::new("r", "AUGC")).residues(), b"GCAU");
    /// ```
    pub fn reverse_complement(&self) -> Nucleotide {
        let rna = self.is_rna();
        let residues = self
            .residues
            .iter()
            .rev()
            .map(|&b| complement(b, rna))
            .collect::<Vec<_>>();
        self.derive(residues)
    }

    /// Returns the fraction of `G`/`C` residues.
    pub fn gc_content(&self) -> f64 {
        if self.residues.is_empty() {
            return 0.0;
        }
        let gc = self
            .residues
            .iter()
            .filter(|b| matches!(b.to_ascii_uppercase(), b'G' | b'C'))
            .count();
        gc as f64 / self.residues.len() as f64
    }

    /// Translates the sequence from its first base.
    ///
    /// Codons with bytes outside `ACGTU` become `-`; an incomplete trailing
    /// codon is dropped. With `complete`, the result is the longest stretch
    /// matching `M[A-Z]*\*` (stop included), or an empty protein if there is
    /// none. Otherwise the longest stretch matching `M?[A-Z]+\*?` is kept.
    ///
    /// # Example
    ///
    /// ```
    /// use gxfkit::sequence::Nucleotide;
    ///
    /// let protein = Nucleotide::new("x", "ATGAAATAA").translate(true);
    /// assert_eq!(protein.residues(), b"MK*");
    /// assert_eq!(protein.len(), 2);
    /// ```
    pub fn translate(&self, complete: bool) -> Protein {
        Protein::new(self.id.clone(), translate_orf(&self.residues, complete))
    }

    /// Translates every codon without any ORF trimming.
    pub fn translate_raw(&self) -> Protein {
        Protein::new(self.id.clone(), translate_bytes(&self.residues))
    }

    /// Returns the longest ORF translation across the reading frames.
    ///
    /// Frames 0, 1 and 2 of the sequence are scanned and, unless
    /// `only_forward`, the three frames of its reverse complement. The
    /// winner is tagged with this sequence's id. Returns `None` when no
    /// frame yields a protein of at least `min_len` residues.
    pub fn orf_predict(&self, min_len: usize, complete: bool, only_forward: bool) -> Option<Protein> {
        let mut best: Vec<u8> = Vec::new();
        let mut best_len = 0usize;

        let reverse = (!only_forward).then(|| self.reverse_complement());
        let strands = std::iter::once(&self.residues)
            .chain(reverse.as_ref().map(|seq| &seq.residues));

        for residues in strands {
            for frame in 0..3 {
                if frame >= residues.len() {
                    break;
                }
                let candidate = translate_orf(&residues[frame..], complete);
                let len = candidate.len() - usize::from(candidate.last() == Some(&STOP_RESIDUE));
                if len > best_len {
                    best_len = len;
                    best = candidate;
                }
            }
        }

        if best_len == 0 || best_len < min_len {
            return None;
        }
        Some(Protein::new(self.id.clone(), best))
    }

    /// Translates a circular molecule, reading through the 3'-5' junction.
    ///
    /// Every offset holding an `ATG` (possibly split across the junction) is
    /// extended codon by codon until the first in-frame stop. The frame
    /// pattern repeats after `lcm(len, 3)` bases, so a start that has not
    /// met a stop by then is abandoned. Each hit is returned as a
    /// `(cds, peptide)` pair with id `{id}:{offset + 1}`; the CDS includes
    /// the stop codon.
    pub fn circular_translate(&self) -> Vec<(Nucleotide, Protein)> {
        let n = self.residues.len();
        if n < 3 {
            return Vec::new();
        }

        let normalized = self
            .residues
            .iter()
            .map(|b| match b.to_ascii_uppercase() {
                b'U' => b'T',
                other => other,
            })
            .collect::<Vec<_>>();
        let wrapped = |pos: usize| {
            [
                normalized[pos % n],
                normalized[(pos + 1) % n],
                normalized[(pos + 2) % n],
            ]
        };
        let limit = lcm(n, 3);

        let mut hits = Vec::new();
        for start in 0..n {
            if wrapped(start) != START_CODON {
                continue;
            }

            let mut cds = Vec::new();
            let mut peptide = Vec::new();
            let mut scanned = 0usize;
            let mut closed = false;
            while scanned < limit {
                let pos = start + scanned;
                let residue = translate_codon(&wrapped(pos));
                cds.extend((0..3).map(|k| self.residues[(pos + k) % n]));
                peptide.push(residue);
                scanned += 3;
                if residue == STOP_RESIDUE {
                    closed = true;
                    break;
                }
            }

            if closed {
                let id = format!("{}:{}", self.id, start + 1);
                hits.push((Nucleotide::new(id.clone(), cds), Protein::new(id, peptide)));
            }
        }
        hits
    }
}

impl Neg for Sequence<Nucleic> {
    type Output = Nucleotide;

    fn neg(self) -> Self::Output {
        self.reverse_complement()
    }
}

impl Neg for &Sequence<Nucleic> {
    type Output = Nucleotide;

    fn neg(self) -> Self::Output {
        self.reverse_complement()
    }
}

/// Runs [`Sequence::orf_predict`] over many sequences on the rayon pool.
///
/// Results are returned in input order, one per sequence.
#[cfg(feature = "rayon")]
pub fn par_orf_predict(
    sequences: &[Nucleotide],
    min_len: usize,
    complete: bool,
    only_forward: bool,
) -> Vec<Option<Protein>> {
    sequences
        .par_iter()
        .map(|seq| seq.orf_predict(min_len, complete, only_forward))
        .collect()
}

fn base_index(b: u8) -> Option<usize> {
    match b.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' | b'U' => Some(3),
        _ => None,
    }
}

/// Translates a single codon, returning `-` for anything non-standard.
pub fn translate_codon(codon: &[u8]) -> u8 {
    if codon.len() != 3 {
        return UNKNOWN_RESIDUE;
    }
    match (base_index(codon[0]), base_index(codon[1]), base_index(codon[2])) {
        (Some(b1), Some(b2), Some(b3)) => CODON_TABLE[b1 * 16 + b2 * 4 + b3],
        _ => UNKNOWN_RESIDUE,
    }
}

fn translate_bytes(residues: &[u8]) -> Vec<u8> {
    residues.chunks_exact(3).map(translate_codon).collect()
}

fn translate_orf(residues: &[u8], complete: bool) -> Vec<u8> {
    let protein = translate_bytes(residues);
    let span = if complete {
        longest_complete(&protein)
    } else {
        longest_partial(&protein)
    };
    protein[span.0..span.1].to_vec()
}

/// Longest `M[A-Z]*\*` stretch as a `[start, end)` span.
fn longest_complete(protein: &[u8]) -> (usize, usize) {
    let mut best = (0, 0);
    let mut run_start = 0usize;
    for (pos, &aa) in protein.iter().enumerate() {
        if aa == STOP_RESIDUE {
            if let Some(m) = memchr(b'M', &protein[run_start..pos]) {
                let candidate = (run_start + m, pos + 1);
                if candidate.1 - candidate.0 > best.1 - best.0 {
                    best = candidate;
                }
            }
            run_start = pos + 1;
        } else if !aa.is_ascii_uppercase() {
            run_start = pos + 1;
        }
    }
    best
}

/// Longest `M?[A-Z]+\*?` stretch as a `[start, end)` span.
fn longest_partial(protein: &[u8]) -> (usize, usize) {
    let mut best = (0, 0);
    let mut run_start = 0usize;
    for pos in 0..=protein.len() {
        let boundary = protein.get(pos).map_or(true, |aa| !aa.is_ascii_uppercase());
        if !boundary {
            continue;
        }
        if pos > run_start {
            let end = if protein.get(pos) == Some(&STOP_RESIDUE) {
                pos + 1
            } else {
                pos
            };
            if end - run_start > best.1 - best.0 {
                best = (run_start, end);
            }
        }
        run_start = pos + 1;
    }
    best
}

fn complement(base: u8, rna: bool) -> u8 {
    let upper = match base.to_ascii_uppercase() {
        b'A' if rna => b'U',
        b'A' => b'T',
        b'T' | b'U' => b'A',
        b'G' => b'C',
        b'C' => b'G',
        b'R' => b'Y',
        b'Y' => b'R',
        b'K' => b'M',
        b'M' => b'K',
        b'B' => b'V',
        b'V' => b'B',
        b'D' => b'H',
        b'H' => b'D',
        other => other,
    };
    if base.is_ascii_lowercase() {
        upper.to_ascii_lowercase()
    } else {
        upper
    }
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

fn lcm(a: usize, b: usize) -> usize {
    a / gcd(a, b) * b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codon_table_covers_standard_code() {
        assert_eq!(translate_codon(b"ATG"), b'M');
        assert_eq!(translate_codon(b"TGG"), b'W');
        assert_eq!(translate_codon(b"TAA"), b'*');
        assert_eq!(translate_codon(b"TAG"), b'*');
        assert_eq!(translate_codon(b"TGA"), b'*');
        assert_eq!(translate_codon(b"uuu"), b'F');
        assert_eq!(translate_codon(b"ANG"), UNKNOWN_RESIDUE);
    }

    #[test]
    fn longest_complete_prefers_first_methionine() {
        let protein = b"AMKMLL*GG";
        assert_eq!(longest_complete(protein), (1, 7));
        assert_eq!(longest_complete(b"MA-MB*"), (3, 6));
        assert_eq!(longest_complete(b"AAA*"), (0, 0));
    }

    #[test]
    fn longest_partial_keeps_trailing_stop() {
        assert_eq!(longest_partial(b"AB*CDEF"), (3, 7));
        assert_eq!(longest_partial(b"ABCD*EF"), (0, 5));
        assert_eq!(longest_partial(b"*-*"), (0, 0));
    }

    #[test]
    fn scan_limit_is_one_turn_for_codon_multiples() {
        assert_eq!(lcm(9, 3), 9);
        assert_eq!(lcm(10, 3), 30);
    }

    #[test]
    fn complement_preserves_case() {
        assert_eq!(complement(b'a', false), b't');
        assert_eq!(complement(b'a', true), b'u');
        assert_eq!(complement(b'N', false), b'N');
    }
}
