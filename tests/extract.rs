use std::io::Cursor;

use gxfkit::coords::CoordError;
use gxfkit::extract::{ExtractError, ExtractOptions, Extractor, Flank};
use gxfkit::fasta::ReferenceStore;
use gxfkit::reader::ReaderError;
use gxfkit::record::IntervalRecord;
use gxfkit::sequence::Nucleotide;
use gxfkit::strand::Strand;
use gxfkit::{Bed, FeatureIndex, Gff, Reader};

const CHR1: &str = "AAAACCCCGGGGTTTT";

fn reference() -> ReferenceStore {
    let fasta = format!(">chr1 test chromosome\n{CHR1}\n>Chr01\n{}\n", "ACGTTGCA".repeat(30));
    ReferenceStore::from_reader(Cursor::new(fasta.into_bytes())).unwrap()
}

fn record(start: u64, end: u64, strand: Strand) -> IntervalRecord {
    IntervalRecord::new("chr1", start, end, strand, "region", "r1")
}

#[test]
fn test_bed_interval_is_one_based_inclusive_after_shift() {
    let reference = reference();
    let bed = Reader::<Bed>::from_reader(Cursor::new("Chr01\t99\t199\tgeneA\t.\t+\n")).unwrap();
    let extractor = Extractor::new(&reference, ExtractOptions::new());

    let seqs: Vec<Nucleotide> = extractor
        .extract_reader(bed)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(seqs.len(), 1);

    let chrom = reference.get("Chr01").unwrap();
    assert_eq!(seqs[0].len(), 100);
    assert_eq!(seqs[0].residues()[0], chrom.residues()[99]);
    assert_eq!(seqs[0].residues(), chrom.subseq(100, 199).residues());
    assert_eq!(seqs[0].id(), "Chr01:100-199(+)");
    assert_eq!(seqs[0].description(), None);
}

#[test]
fn test_reverse_strand_is_reverse_complemented() {
    let reference = reference();
    let extractor = Extractor::new(&reference, ExtractOptions::new());
    let seq = extractor.extract_one(&record(5, 8, Strand::Reverse)).unwrap();
    assert_eq!(seq.residues(), b"GGGG");
    assert_eq!(seq.id(), "chr1:5-8(-)");
}

#[test]
fn test_upstream_flank_follows_strand() {
    let reference = reference();
    let extractor = Extractor::new(&reference, ExtractOptions::new().flank(Flank::up(2)));

    let forward = extractor.extract_one(&record(5, 8, Strand::Forward)).unwrap();
    assert_eq!(forward.residues(), b"AACCCC");
    assert_eq!(forward.id(), "chr1:3-8(+)");

    let reverse = extractor.extract_one(&record(5, 8, Strand::Reverse)).unwrap();
    assert_eq!(reverse.residues(), b"CCGGGG");
    assert_eq!(reverse.id(), "chr1:5-10(-)");
}

#[test]
fn test_window_is_clamped_to_chromosome() {
    let reference = reference();
    let extractor = Extractor::new(&reference, ExtractOptions::new().flank(Flank::both(3)));

    let head = extractor.extract_one(&record(1, 4, Strand::Forward)).unwrap();
    assert_eq!(head.residues(), b"AAAACCC");
    assert_eq!(head.id(), "chr1:1-7(+)");

    let tail = extractor.extract_one(&record(13, 16, Strand::Forward)).unwrap();
    assert_eq!(tail.residues(), b"GGGTTTT");
    assert_eq!(tail.id(), "chr1:10-16(+)");
}

#[test]
fn test_overhanging_end_fails_when_clamping_is_off() {
    let reference = reference();
    let options = ExtractOptions::new().flank(Flank::down(5)).clamp_end(false);
    let extractor = Extractor::new(&reference, options);

    match extractor.extract_one(&record(13, 16, Strand::Forward)) {
        Err(ExtractError::CoordinateOutOfRange { id, end, chrom_len }) => {
            assert_eq!(id, "r1");
            assert_eq!(end, 21);
            assert_eq!(chrom_len, 16);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(extractor.extract_one(&record(1, 16, Strand::Forward)).is_ok());
}

#[test]
fn test_record_ids_and_missing_sequences() {
    let reference = reference();
    let extractor = Extractor::new(&reference, ExtractOptions::new().use_record_id(true));

    let seq = extractor.extract_one(&record(1, 4, Strand::Unknown)).unwrap();
    assert_eq!(seq.id(), "r1");
    assert_eq!(seq.residues(), b"AAAA");

    let stray = IntervalRecord::new("chrUn", 1, 4, Strand::Forward, "region", "x1");
    assert!(matches!(
        extractor.extract_one(&stray),
        Err(ExtractError::MissingSequence { chrom, id }) if chrom == "chrUn" && id == "x1"
    ));
}

#[test]
fn test_extract_is_lazy_and_per_record() {
    let reference = reference();
    let extractor = Extractor::new(&reference, ExtractOptions::new());
    let records = vec![
        record(1, 4, Strand::Forward),
        IntervalRecord::new("chrUn", 1, 4, Strand::Forward, "region", "x1"),
        record(13, 16, Strand::Reverse),
    ];

    {
        let mut iter = extractor.extract(&records);
        assert_eq!(iter.next().unwrap().unwrap().residues(), b"AAAA");
        assert!(iter.next().unwrap().is_err());
        assert_eq!(iter.next().unwrap().unwrap().residues(), b"AAAA");
        assert!(iter.next().is_none());
    }

    let owned: Vec<_> = extractor.extract(records).collect();
    assert_eq!(owned.len(), 3);
}

const GFF: &str = "\
chr1\t.\tmRNA\t1\t16\t.\t-\t.\tID=t1
chr1\t.\tCDS\t9\t12\t.\t-\t0\tParent=t1
chr1\t.\tCDS\t1\t4\t.\t-\t0\tParent=t1
chr1\t.\tmRNA\t1\t16\t.\t+\t.\tID=t2
chr1\t.\tCDS\t1\t4\t.\t+\t0\tParent=t2
chr1\t.\tCDS\t13\t16\t.\t-\t0\tParent=t2
";

fn index() -> FeatureIndex {
    let reader = Reader::<Gff>::from_reader(Cursor::new(GFF)).unwrap();
    FeatureIndex::from_reader(reader).unwrap()
}

#[test]
fn test_extract_index_by_feature_type() {
    let reference = reference();
    let index = index();
    let extractor = Extractor::new(&reference, ExtractOptions::new().use_record_id(true));

    let seqs: Vec<_> = extractor
        .extract_index(&index, "mrna")
        .unwrap()
        .map(|s| s.unwrap())
        .collect();
    assert_eq!(seqs.len(), 2);
    assert_eq!(seqs[0].id(), "t1");
    assert_eq!(seqs[0].residues(), b"AAAACCCCGGGGTTTT");

    assert!(matches!(
        extractor.extract_index(&index, "exon"),
        Err(ExtractError::Reader(ReaderError::MissingFeatureType { .. }))
    ));
}

#[test]
fn test_spliced_parts_join_in_transcript_order() {
    let reference = reference();
    let index = index();
    let extractor = Extractor::new(&reference, ExtractOptions::new().flank(Flank::both(100)));

    let spliced = extractor.extract_spliced(&index, "CDS").unwrap();
    assert_eq!(spliced.len(), 2);

    let t1 = spliced[0].as_ref().unwrap();
    assert_eq!(t1.id(), "t1");
    assert_eq!(t1.residues(), b"CCCCTTTT");

    assert!(matches!(
        spliced[1],
        Err(ExtractError::Coord(CoordError::StrandMismatch { .. }))
    ));
}

#[cfg(feature = "rayon")]
#[test]
fn test_par_extract_keeps_input_order() {
    let reference = reference();
    let extractor = Extractor::new(&reference, ExtractOptions::new());
    let records: Vec<_> = (1..=13)
        .map(|start| record(start, start + 3, Strand::Forward))
        .collect();

    let results = extractor.par_extract(&records);
    assert_eq!(results.len(), 13);
    for (record, result) in records.iter().zip(&results) {
        let seq = result.as_ref().unwrap();
        let start = record.start as usize - 1;
        assert_eq!(seq.residues(), &CHR1.as_bytes()[start..start + 4]);
    }
}
