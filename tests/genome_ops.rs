//! End-to-end scenarios for the genome store

use mcclintock::script::{parse_edit_script, EditOp};
use mcclintock::{GenomeError, GenomeStore};
use std::io::Cursor;
use test_case::test_case;

mod common;
use common::NaiveGenome;

fn indexed(text: &[u8], k: usize) -> GenomeStore {
    let mut store = GenomeStore::with_seed(text.to_vec(), k, 1234).expect("valid k");
    store.construct_hash();
    store
}

fn full_text(store: &GenomeStore) -> Vec<u8> {
    store.read_at(0, store.len()).expect("full read").0
}

#[test]
fn worked_example_end_to_end() {
    let mut store = indexed(b"ACGTACGT", 4);
    assert_eq!(store.search(b"ACGT").unwrap(), vec![0, 4]);

    store.insert_at(b"TT", 4).unwrap();
    assert_eq!(store.len(), 10);
    assert_eq!(store.search(b"ACGT").unwrap(), vec![0, 6]);

    assert!(store.delete_at(0, 1).unwrap());
    let (prefix, _) = store.read_at(0, 3).unwrap();
    assert_eq!(prefix, b"CGT");
}

#[test]
fn edit_story_tracks_the_naive_rewrite() {
    let reference = b"ACGTACGTACGTACGTACGTACGT".to_vec();
    let mut store = indexed(&reference, 4);
    let mut naive = NaiveGenome::new(reference);

    store.insert_at(b"GGG", 8).unwrap();
    naive.insert_at(b"GGG", 8);

    store.snp_at(2, b"A").unwrap();
    naive.snp_at(2, b"A");

    assert!(store.delete_at(16, 3).unwrap());
    naive.delete_at(16, 3);

    store.insert_at(b"TA", 0).unwrap();
    naive.insert_at(b"TA", 0);

    store.snp_at(10, b"CC").unwrap();
    naive.snp_at(10, b"CC");

    assert_eq!(store.len(), naive.len());
    assert_eq!(full_text(&store), naive.text());
    assert!(store.check_hash());

    for pattern in [&b"ACGT"[..], b"TA", b"GGGA", b"CCGT", b"ACGTAC"] {
        assert_eq!(
            store.search(pattern).unwrap(),
            naive.find_all(pattern),
            "pattern {:?} diverged",
            String::from_utf8_lossy(pattern)
        );
    }
}

#[test_case(b"GG", 0; "at the very start")]
#[test_case(b"GG", 2; "inside the left window margin")]
#[test_case(b"GG", 8; "appended at the end")]
#[test_case(b"GGCCGGCC", 4; "longer than one window")]
fn inserts_near_boundaries_repair_correctly(content: &[u8], position: usize) {
    let mut store = indexed(b"ACGTACGT", 4);
    let mut naive = NaiveGenome::new(b"ACGTACGT".to_vec());

    store.insert_at(content, position).unwrap();
    naive.insert_at(content, position);

    assert_eq!(store.len(), naive.len());
    assert_eq!(full_text(&store), naive.text());
    assert!(store.check_hash());
    assert_eq!(store.search(b"ACGT").unwrap(), naive.find_all(b"ACGT"));
}

#[test_case(0, 1; "first character")]
#[test_case(0, 3; "head range")]
#[test_case(5, 3; "tail range")]
#[test_case(2, 4; "middle range")]
fn deletes_on_a_fresh_store_repair_correctly(start: usize, length: usize) {
    let mut store = indexed(b"ACGTACGT", 4);
    let mut naive = NaiveGenome::new(b"ACGTACGT".to_vec());

    assert!(store.delete_at(start, length).unwrap());
    naive.delete_at(start, length);

    assert_eq!(store.len(), naive.len());
    assert_eq!(full_text(&store), naive.text());
    assert!(store.check_hash());
}

#[test]
fn substitutions_at_both_ends() {
    let mut store = indexed(b"ACGTACGT", 4);
    let mut naive = NaiveGenome::new(b"ACGTACGT".to_vec());

    store.snp_at(0, b"T").unwrap();
    naive.snp_at(0, b"T");
    store.snp_at(7, b"A").unwrap();
    naive.snp_at(7, b"A");

    assert_eq!(full_text(&store), naive.text());
    assert!(store.check_hash());
    assert_eq!(store.search(b"TCGT").unwrap(), naive.find_all(b"TCGT"));
}

#[test]
fn whole_payload_delete_flush_against_next_breakpoint_is_rejected() {
    let mut store = indexed(b"ACGTACGT", 4);
    store.insert_at(b"TT", 4).unwrap();
    store.insert_at(b"CC", 6).unwrap();
    assert_eq!(full_text(&store), b"ACGTTTCCACGT");

    // Removing all of "TT" would land the "CC" breakpoint on the same
    // key; the store refuses rather than corrupt the ordering.
    let before = full_text(&store);
    assert!(!store.delete_at(4, 2).unwrap());
    assert_eq!(full_text(&store), before);
    assert!(store.check_hash());

    // A delete kept inside the payload still works.
    assert!(store.delete_at(4, 1).unwrap());
    assert_eq!(full_text(&store), b"ACGTTCCACGT");
    assert!(store.check_hash());
}

#[test]
fn growing_from_below_window_length() {
    let mut store = indexed(b"ACG", 4);
    assert_eq!(store.search(b"ACGT").unwrap(), Vec::<usize>::new());

    store.insert_at(b"T", 3).unwrap();
    assert_eq!(store.len(), 4);
    assert_eq!(store.search(b"ACGT").unwrap(), vec![0]);
    assert!(store.check_hash());
}

#[test]
fn rejected_edits_do_not_disturb_later_queries() {
    let mut store = indexed(b"ACGTACGTACGT", 4);
    store.insert_at(b"TT", 4).unwrap();

    let text = full_text(&store);
    let hits = store.search(b"ACGT").unwrap();

    assert_eq!(
        store.insert_at(b"A", store.len() + 1).unwrap_err(),
        GenomeError::PositionOutOfBounds {
            position: 15,
            length: 14
        }
    );
    assert!(matches!(
        store.delete_at(10, 10).unwrap_err(),
        GenomeError::RangeOutOfBounds { .. }
    ));
    assert!(!store.delete_at(3, 2).unwrap(), "range crosses the insert");

    assert_eq!(full_text(&store), text);
    assert_eq!(store.search(b"ACGT").unwrap(), hits);
    assert!(store.check_hash());
}

#[test]
fn parsed_edit_script_drives_the_store() {
    let script = "I 4 TT\nS 1 G\nD 0 1\nI 8 ACGT\n";
    let edits = parse_edit_script(Cursor::new(script)).unwrap();

    let mut store = indexed(b"ACGTACGT", 4);
    let mut naive = NaiveGenome::new(b"ACGTACGT".to_vec());

    for edit in &edits {
        match edit {
            EditOp::Insert { position, text } => {
                store.insert_at(text, *position).unwrap();
                naive.insert_at(text, *position);
            }
            EditOp::Delete { start, end } => {
                let length = EditOp::delete_len(*start, *end);
                if store.delete_at(*start, length).unwrap() {
                    naive.delete_at(*start, length);
                }
            }
            EditOp::Substitute { position, text } => {
                store.snp_at(*position, text).unwrap();
                naive.snp_at(*position, text);
            }
        }
    }

    assert_eq!(store.len(), naive.len());
    assert_eq!(full_text(&store), naive.text());
    assert!(store.check_hash());
}

#[test]
fn diagnostics_render_the_live_structures() {
    let mut store = indexed(b"ACGTACGT", 4);
    store.insert_at(b"TT", 4).unwrap();

    assert_eq!(store.dump_sequence(), "ACGTTTACGT");
    let skiplist = format!("{}", store.skip_list());
    assert!(skiplist.contains("4(+2)"), "breakpoint missing: {skiplist}");
    let index = format!("{}", store.kmer_index().unwrap());
    assert!(index.contains("ACGT"), "entry missing: {index}");
    assert!(store.load_factor().is_some());
}

#[test]
fn every_position_reads_like_the_naive_model() {
    let mut store = indexed(b"ACGTACGTACGTACGT", 4);
    let mut naive = NaiveGenome::new(b"ACGTACGTACGTACGT".to_vec());

    store.insert_at(b"CCC", 5).unwrap();
    naive.insert_at(b"CCC", 5);
    assert!(store.delete_at(1, 2).unwrap());
    naive.delete_at(1, 2);
    store.snp_at(9, b"A").unwrap();
    naive.snp_at(9, b"A");

    for position in 0..naive.len() {
        let (byte, _) = store.read_at(position, 1).unwrap();
        assert_eq!(byte, naive.read(position, 1), "mismatch at {position}");
    }
}
