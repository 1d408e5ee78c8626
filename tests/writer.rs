use std::io::Cursor;

use gxfkit::record::IntervalRecord;
use gxfkit::sequence::{Nucleotide, Protein};
use gxfkit::strand::Strand;
use gxfkit::writer::write_fasta;
use gxfkit::{Bed, Gff, Gtf, Reader, Writer, WriterError};

fn read<F: gxfkit::RecordFormat>(data: &str) -> Vec<IntervalRecord> {
    Reader::<F>::from_reader(Cursor::new(data.to_string().into_bytes()))
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
}

fn write_all<F: gxfkit::writer::TargetFormat>(records: &[IntervalRecord]) -> String {
    let mut buf = Vec::new();
    Writer::<F>::from_records(records, &mut buf).unwrap();
    String::from_utf8(buf).unwrap()
}

#[test]
fn write_bed_preserves_extra_columns() {
    let data = "chr1\t5\t50\tr1\t3\t-\t5\t50\t255,0,0\nchr2\t0\t10\n";
    let records = read::<Bed>(data);
    assert_eq!(
        write_all::<Bed>(&records),
        "chr1\t5\t50\tr1\t3\t-\t5\t50\t255,0,0\nchr2\t0\t10\tchr2:0-10\t0\t.\n"
    );
}

#[test]
fn write_gff_round_trips_native_attributes() {
    let data = "\
chr1\tsrc\tgene\t1\t1000\t.\t+\t.\tID=g1;Name=alpha
chr1\tsrc\tCDS\t50\t200\t0.5\t+\t2\tParent=t1;Note=partial
";
    let records = read::<Gff>(data);
    assert_eq!(write_all::<Gff>(&records), data);
}

#[test]
fn write_gtf_round_trips_native_attributes() {
    let data = "chr1\thavana\texon\t11\t100\t.\t-\t.\tgene_id \"G1\"; transcript_id \"T1\"; exon_number \"2\";\n";
    let records = read::<Gtf>(data);
    assert_eq!(write_all::<Gtf>(&records), data);
}

#[test]
fn write_gtf_from_gff_records() {
    let records = read::<Gff>("chr1\tsrc\tmRNA\t1\t1000\t.\t+\t.\tID=t1;Parent=g1\n");
    assert_eq!(
        write_all::<Gtf>(&records),
        "chr1\tsrc\tmRNA\t1\t1000\t.\t+\t.\tgene_id \"g1\"; transcript_id \"t1\";\n"
    );
}

#[test]
fn write_gff_from_bed_records() {
    let records = read::<Bed>("chr1\t5\t50\tr1\t3\t-\n");
    assert_eq!(
        write_all::<Gff>(&records),
        "chr1\t.\tregion\t6\t50\t3\t-\t.\tID=r1\n"
    );
}

#[test]
fn write_bed_from_gtf_records() {
    let records = read::<Gtf>(
        "chr1\thavana\ttranscript\t11\t500\t7\t-\t.\tgene_id \"G1\"; transcript_id \"T1\";\n",
    );
    assert_eq!(write_all::<Bed>(&records), "chr1\t10\t500\tT1\t7\t-\n");
}

#[test]
fn write_gtf_requires_an_identifier() {
    let record = IntervalRecord::new("chr1", 1, 10, Strand::Forward, "region", ".");
    let mut buf = Vec::new();
    let err = Writer::<Gtf>::from_record(&record, &mut buf).unwrap_err();
    assert!(matches!(err, WriterError::MissingField("transcript_id")));
    assert!(buf.is_empty());
}

#[test]
fn write_gff_without_identifiers_uses_placeholder() {
    let record = IntervalRecord::new("chr1", 1, 10, Strand::Unknown, "region", ".");
    let mut buf = Vec::new();
    Writer::<Gff>::from_record(&record, &mut buf).unwrap();
    assert_eq!(buf, b"chr1\t.\tregion\t1\t10\t.\t.\t.\t.\n");
}

#[test]
fn write_to_path_and_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.gff3");
    let records = read::<Gff>("chr1\tsrc\tgene\t1\t1000\t.\t+\t.\tID=g1\n");

    Writer::<Gff>::to_path(&path, &records).unwrap();
    let back: Vec<_> = Reader::<Gff>::from_path(&path)
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(back, records);
}

#[cfg(feature = "gzip")]
#[test]
fn write_gzip_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bed.gz");
    let records = read::<Bed>("chr1\t5\t50\tr1\t3\t-\n");

    Writer::<Bed>::to_path(&path, &records).unwrap();
    let raw = std::fs::read(&path).unwrap();
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);

    let back: Vec<_> = Reader::<Bed>::from_path(&path)
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(back, records);
}

#[test]
fn write_fasta_wraps_and_keeps_description() {
    let seq = Nucleotide::new("s1", "ACGTACGTAC").with_description("chr test");
    let mut buf = Vec::new();
    write_fasta(&mut buf, &seq, 4).unwrap();
    assert_eq!(buf, b">s1 chr test\nACGT\nACGT\nAC\n");

    let mut buf = Vec::new();
    write_fasta(&mut buf, &Protein::new("p1", "MK*"), 0).unwrap();
    assert_eq!(buf, b">p1\nMK*\n");
}
