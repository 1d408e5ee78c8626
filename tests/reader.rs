use std::io::Cursor;

use gxfkit::reader::{Reader, ReaderError, ReaderOptions};
use gxfkit::strand::Strand;
use gxfkit::{Bed, FeatureIndex, Gff, Gtf};

const GFF: &str = "\
##gff-version 3
chr1\tsrc\tgene\t1\t1000\t.\t+\t.\tID=g1;Name=alpha
chr1\tsrc\tmRNA\t1\t1000\t.\t+\t.\tID=t1;Parent=g1
chr1\tsrc\texon\t1\t200\t.\t+\t.\tID=e1;Parent=t1
chr1\tsrc\tCDS\t50\t200\t.\t+\t0\tParent=t1
chr1\tsrc\texon\t801\t1000\t.\t+\t.\tID=e2;Parent=t1
chr2\tsrc\tgene\t10\t90\t.\t-\t.\tID=g2
";

const GTF: &str = "\
chr1\thavana\tgene\t11\t500\t.\t-\t.\tgene_id \"G1\"; gene_name \"DDX\";
chr1\thavana\ttranscript\t11\t500\t.\t-\t.\tgene_id \"G1\"; transcript_id \"T1\";
chr1\thavana\texon\t11\t100\t.\t-\t.\tgene_id \"G1\"; transcript_id \"T1\"; exon_number \"2\";
chr1\thavana\texon\t401\t500\t.\t-\t.\tgene_id \"G1\"; transcript_id \"T1\"; exon_number \"1\";
";

#[test]
fn test_reader_bed_is_shifted_to_one_based() {
    let data = "Chr01\t99\t199\tgeneA\t.\t+\nChr01\t0\t10";
    let mut reader: Reader<Bed> = Reader::from_reader(Cursor::new(data.as_bytes())).unwrap();
    let records: Vec<_> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2);

    let first = &records[0];
    assert_eq!(first.chrom, "Chr01");
    assert_eq!(first.start, 100);
    assert_eq!(first.end, 199);
    assert_eq!(first.len(), 100);
    assert_eq!(first.bed_start(), 99);
    assert_eq!(first.id, "geneA");
    assert_eq!(first.score, None);
    assert_eq!(first.strand, Strand::Forward);
    assert_eq!(first.feature_type, "region");

    let second = &records[1];
    assert_eq!(second.start, 1);
    assert_eq!(second.id, "Chr01:0-10");
    assert_eq!(second.strand, Strand::Unknown);
}

#[test]
fn test_reader_skips_headers_and_comments() {
    let data = "track name=x\nbrowser position chr1\n# comment\n\nchr1\t10\t20\tr1\n";
    let mut reader: Reader<Bed> = Reader::from_reader(Cursor::new(data.as_bytes())).unwrap();
    let records: Vec<_> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 1);
    assert_eq!(reader.current_line(), 5);
}

#[test]
fn test_reader_invalid_line_reports_line_and_stops() {
    let data = "chr1\t10\t20\nmalformed_line\nchr2\t50\t60";
    let mut reader: Reader<Bed> = Reader::from_reader(Cursor::new(data.as_bytes())).unwrap();
    let records: Vec<_> = reader.records().collect();
    assert_eq!(records.len(), 2);

    assert!(records[0].is_ok());
    match &records[1] {
        Err(ReaderError::UnexpectedFieldCount {
            line,
            expected,
            actual,
        }) => {
            assert_eq!(*line, 2);
            assert_eq!(*expected, 3);
            assert_eq!(*actual, 1);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(reader.next().is_none());
}

#[test]
fn test_reader_bad_coordinate_ends_the_parse() {
    let data = "chr1\t10\t20\nchr1\tx\t5\nchr2\t50\t60\n";
    let reader: Reader<Bed> = Reader::from_reader(Cursor::new(data.as_bytes())).unwrap();
    let records: Vec<_> = reader.collect();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].as_ref().unwrap().id, "chr1:10-20");
    assert!(matches!(
        records[1],
        Err(ReaderError::InvalidField { line: 2, .. })
    ));
}

#[test]
fn test_reader_error_skips_required_feature_check() {
    let data = "chr1\t.\tgene\t1\t10\t.\t+\t.\tID=g1\nchr1\t.\tgene\t9\t1\t.\t+\t.\tID=g2\n";
    let reader = Reader::<Gff>::builder()
        .from_reader(Cursor::new(data.as_bytes()))
        .options(ReaderOptions::new().require_feature("CDS"))
        .build()
        .unwrap();
    let records: Vec<_> = reader.collect();

    assert_eq!(records.len(), 2);
    assert!(matches!(
        records[1],
        Err(ReaderError::InvalidField { line: 2, .. })
    ));
}

#[test]
fn test_reader_rejects_inverted_span() {
    let data = "chr1\t.\texon\t200\t100\t.\t+\t.\tID=e1\n";
    let mut reader: Reader<Gff> = Reader::from_reader(Cursor::new(data.as_bytes())).unwrap();
    let err = reader.next().unwrap().unwrap_err();
    assert!(matches!(err, ReaderError::InvalidField { line: 1, .. }));
}

#[test]
fn test_reader_rejects_bad_strand_and_phase() {
    let strand = "chr1\t.\texon\t1\t10\t.\tx\t.\tID=e1\n";
    let mut reader: Reader<Gff> = Reader::from_reader(Cursor::new(strand.as_bytes())).unwrap();
    assert!(matches!(
        reader.next(),
        Some(Err(ReaderError::InvalidField { line: 1, .. }))
    ));

    let phase = "chr1\t.\texon\t1\t10\t.\t+\t.\tID=e1\nchr1\t.\tCDS\t1\t10\t.\t+\t3\tID=c1\n";
    let mut reader: Reader<Gff> = Reader::from_reader(Cursor::new(phase.as_bytes())).unwrap();
    assert!(reader.next().unwrap().is_ok());
    assert!(matches!(
        reader.next(),
        Some(Err(ReaderError::InvalidField {
            line: 2,
            field: "phase",
            ..
        }))
    ));
}

#[test]
fn test_reader_trailing_tabs_keep_empty_columns() {
    let short = "chr1\t.\tgene\t1\t10\t.\t+\t\n";
    let mut reader: Reader<Gff> = Reader::from_reader(Cursor::new(short.as_bytes())).unwrap();
    assert!(matches!(
        reader.next(),
        Some(Err(ReaderError::UnexpectedFieldCount {
            line: 1,
            expected: 9,
            actual: 8,
        }))
    ));

    let empty_attributes = "chr1\t.\tgene\t1\t10\t.\t+\t.\t\n";
    let mut reader: Reader<Gff> =
        Reader::from_reader(Cursor::new(empty_attributes.as_bytes())).unwrap();
    assert!(matches!(
        reader.next(),
        Some(Err(ReaderError::InvalidField {
            line: 1,
            field: "attributes",
            ..
        }))
    ));
}

#[test]
fn test_reader_empty_input() {
    let mut reader: Reader<Bed> = Reader::from_reader(Cursor::new("".as_bytes())).unwrap();
    assert!(reader.records().next().is_none());
}

#[test]
fn test_reader_gff_ids_and_attributes() {
    let mut reader: Reader<Gff> = Reader::from_reader(Cursor::new(GFF.as_bytes())).unwrap();
    let records: Vec<_> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 6);

    let gene = &records[0];
    assert_eq!(gene.id, "g1");
    assert_eq!(gene.source, "src");
    assert_eq!(gene.attributes.name(), Some("alpha"));
    assert_eq!(gene.parent(), None);

    let cds = &records[3];
    assert_eq!(cds.feature_type, "CDS");
    assert_eq!(cds.id, "t1");
    assert_eq!(cds.phase, Some(0));
    assert_eq!(cds.parent(), Some("t1"));
    assert_eq!(cds.locus(), "chr1:50-200(+)");
}

#[test]
fn test_reader_gtf_ids_follow_hierarchy() {
    let mut reader: Reader<Gtf> = Reader::from_reader(Cursor::new(GTF.as_bytes())).unwrap();
    let records: Vec<_> = reader.records().map(|r| r.unwrap()).collect();

    assert_eq!(records[0].id, "G1");
    assert_eq!(records[0].parent(), None);
    assert_eq!(records[1].id, "T1");
    assert_eq!(records[1].parent(), Some("G1"));
    assert_eq!(records[2].id, "T1");
    assert_eq!(records[2].parent(), Some("T1"));
    assert_eq!(records[2].attributes.get("exon_number"), Some("2"));
    assert_eq!(records[3].strand, Strand::Reverse);
}

#[test]
fn test_reader_feature_filter() {
    let reader = Reader::<Gff>::builder()
        .from_reader(Cursor::new(GFF.as_bytes()))
        .options(ReaderOptions::new().feature_types(["EXON", "cds"]))
        .build()
        .unwrap();
    let kinds: Vec<String> = reader.map(|r| r.unwrap().feature_type).collect();
    assert_eq!(kinds, vec!["exon", "CDS", "exon"]);
}

#[test]
fn test_reader_required_feature_missing() {
    let reader = Reader::<Gff>::builder()
        .from_reader(Cursor::new(GFF.as_bytes()))
        .options(ReaderOptions::new().require_feature("five_prime_UTR"))
        .build()
        .unwrap();
    let records: Vec<_> = reader.collect();
    assert_eq!(records.len(), 7);
    assert!(records[..6].iter().all(Result::is_ok));
    match records.last() {
        Some(Err(ReaderError::MissingFeatureType { feature })) => {
            assert_eq!(feature, "five_prime_UTR")
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_reader_required_feature_present_even_when_filtered() {
    let reader = Reader::<Gff>::builder()
        .from_reader(Cursor::new(GFF.as_bytes()))
        .options(
            ReaderOptions::new()
                .feature_type("exon")
                .require_feature("cds"),
        )
        .build()
        .unwrap();
    let records: Vec<_> = reader.map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2);
}

#[test]
fn test_reader_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("annotation.gtf");
    std::fs::write(&path, GTF).unwrap();

    let reader = Reader::<Gtf>::from_path(&path).unwrap();
    assert_eq!(reader.filter_map(Result::ok).count(), 4);
}

#[test]
fn test_reader_missing_path_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Reader::<Bed>::from_path(dir.path().join("absent.bed")).unwrap_err();
    assert!(matches!(err, ReaderError::Io(_)));
}

#[cfg(feature = "gzip")]
#[test]
fn test_reader_gzip_auto_detect() {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("regions.bed.gz");
    let mut encoder = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
    encoder.write_all(b"chr1\t10\t20\ta\nchr1\t30\t40\tb\n").unwrap();
    encoder.finish().unwrap();

    let reader = Reader::<Bed>::from_path(&path).unwrap();
    let ids: Vec<String> = reader.map(|r| r.unwrap().id).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[cfg(feature = "mmap")]
#[test]
fn test_reader_mmap_matches_buffered() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("annotation.gff3");
    std::fs::write(&path, GFF).unwrap();

    let buffered: Vec<_> = Reader::<Gff>::from_path(&path)
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    let mapped: Vec<_> = Reader::<Gff>::from_mmap(&path)
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(buffered, mapped);
}

#[cfg(feature = "rayon")]
#[test]
fn test_reader_par_records_keeps_every_record() {
    use rayon::prelude::*;

    let reader: Reader<Gff> = Reader::from_reader(Cursor::new(GFF.as_bytes())).unwrap();
    let mut ids: Vec<String> = reader
        .par_records()
        .unwrap()
        .map(|r| r.unwrap().id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["e1", "e2", "g1", "g2", "t1", "t1"]);
}

#[test]
fn test_index_buckets_and_queries() {
    let reader: Reader<Gff> = Reader::from_reader(Cursor::new(GFF.as_bytes())).unwrap();
    let index = FeatureIndex::from_reader(reader).unwrap();

    assert_eq!(index.len(), 6);
    assert_eq!(index.chromosomes().collect::<Vec<_>>(), vec!["chr1", "chr2"]);
    assert!(index.get("chr3").is_none());
    assert!(index
        .iter()
        .zip(index.iter().skip(1))
        .filter(|(a, b)| a.chrom == b.chrom)
        .all(|(a, b)| a.start <= b.start));

    let hits: Vec<_> = index
        .overlapping("chr1", 190, 300)
        .map(|r| r.feature_type.as_str())
        .collect();
    assert_eq!(hits, vec!["gene", "mRNA", "exon", "CDS"]);

    assert_eq!(index.children_of("t1").len(), 3);
    assert_eq!(index.find("exon", "e2").map(|r| r.start), Some(801));
    assert_eq!(index.gene_of_transcript("t1"), Some("g1"));
    assert_eq!(index.gene_of_transcript_map().get("t1"), Some(&"g1"));
    assert!(index.has_feature("mrna"));
    assert_eq!(index.features_of("exon").unwrap().len(), 2);
}

#[test]
fn test_index_missing_feature_type() {
    let reader: Reader<Gtf> = Reader::from_reader(Cursor::new(GTF.as_bytes())).unwrap();
    let index = FeatureIndex::from_reader(reader).unwrap();
    assert!(matches!(
        index.features_of("CDS"),
        Err(ReaderError::MissingFeatureType { .. })
    ));

    let groups = index.group_by_parent("exon").unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].0, "T1");
    assert_eq!(groups[0].1.len(), 2);
}

#[test]
fn test_index_filtered_feature_must_be_present() {
    let reader = Reader::<Gff>::builder()
        .from_reader(Cursor::new(GFF.as_bytes()))
        .options(
            ReaderOptions::new()
                .feature_type("five_prime_UTR")
                .require_feature("five_prime_UTR"),
        )
        .build()
        .unwrap();
    assert!(matches!(
        FeatureIndex::from_reader(reader),
        Err(ReaderError::MissingFeatureType { feature }) if feature == "five_prime_UTR"
    ));
}

#[test]
fn test_index_from_path_with_filter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("annotation.gff3");
    std::fs::write(&path, GFF).unwrap();

    let index = FeatureIndex::from_path_with_options::<Gff, _>(
        &path,
        ReaderOptions::new().feature_type("gene"),
    )
    .unwrap();
    assert_eq!(index.len(), 2);
    assert_eq!(index.feature_types().collect::<Vec<_>>(), vec!["gene"]);
}
