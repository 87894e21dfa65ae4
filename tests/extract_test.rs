//! MIDI pack extraction tests

use std::fs;
use std::path::Path;

use groove_sweep::extract::extract_midi_pack;
use groove_sweep::Error;

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"MThd").unwrap();
}

fn names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn sample_pack(root: &Path) -> std::path::PathBuf {
    let pack = root.join("toontrack_pack");
    touch(&pack.join("02@Salsa/01@Verse A/groove 1.mid"));
    touch(&pack.join("02@Salsa/01@Verse A/notes.txt"));
    touch(&pack.join("02@Salsa/02@FILL-IN 1/fill 1.mid"));
    touch(&pack.join("20@Timba/01@Chorus/groove 2.mid"));
    touch(&pack.join("readme.pdf"));
    pack
}

#[test]
fn test_extracts_selected_genres_only() {
    let root = tempfile::tempdir().unwrap();
    let pack = sample_pack(root.path());
    let out = root.path().join("extracted");

    let report = extract_midi_pack(&pack, &out, false).unwrap();

    assert_eq!(names(&out), ["SALSA_Verse A_groove 1.mid"]);
    assert_eq!(report.copied, vec![out.join("SALSA_Verse A_groove 1.mid")]);
    assert_eq!(report.skipped_genres, vec![pack.join("20@Timba")]);
    assert_eq!(report.total_midi_files, 1);
}

#[test]
fn test_all_genres_includes_unselected() {
    let root = tempfile::tempdir().unwrap();
    let pack = sample_pack(root.path());
    let out = root.path().join("extracted");

    let report = extract_midi_pack(&pack, &out, true).unwrap();

    assert_eq!(
        names(&out),
        ["SALSA_Verse A_groove 1.mid", "TIMBA_Chorus_groove 2.mid"]
    );
    assert!(report.skipped_genres.is_empty());
    assert_eq!(report.total_midi_files, 2);
}

#[test]
fn test_total_counts_files_already_in_output() {
    let root = tempfile::tempdir().unwrap();
    let pack = sample_pack(root.path());
    let out = root.path().join("extracted");
    touch(&out.join("earlier.mid"));

    let report = extract_midi_pack(&pack, &out, false).unwrap();

    assert_eq!(report.copied.len(), 1);
    assert_eq!(report.total_midi_files, 2);
}

#[test]
fn test_unknown_genre_id_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    let pack = root.path().join("pack");
    touch(&pack.join("99@Mystery/01@Verse/groove.mid"));

    let result = extract_midi_pack(&pack, root.path().join("out"), true);
    match result {
        Err(Error::UnknownGenre { dir }) => assert_eq!(dir, pack.join("99@Mystery")),
        other => panic!("expected unknown genre, got {other:?}"),
    }
}
