use assert_cmd::Command;
use lopdf::{dictionary, Document, Object};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Build a minimal valid PDF with the given number of US Letter pages.
fn sample_pdf_bytes(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(page_count);
    for _ in 0..page_count {
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(Object::Reference(page_id));
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count as i64,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save should succeed");
    bytes
}

fn write_sample_pdf(dir: &Path, page_count: usize) -> std::path::PathBuf {
    let path = dir.join("sample.pdf");
    fs::write(&path, sample_pdf_bytes(page_count)).expect("fixture should be written");
    path
}

fn pagedeck() -> Command {
    Command::cargo_bin("pagedeck").expect("binary should build")
}

#[test]
fn renders_every_page_at_first_pass_quality() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let input = write_sample_pdf(temp.path(), 2);
    let out_dir = temp.path().join("out");

    pagedeck()
        .arg(&input)
        .arg("--out")
        .arg(&out_dir)
        .arg("--width")
        .arg("200")
        .assert()
        .success();

    for name in ["page-001.png", "page-002.png"] {
        let path = out_dir.join(name);
        assert!(path.exists(), "{name} should exist");

        let image = image::open(&path).expect("output should be a readable image");
        // First-pass render is quality-reduced: 200 * 0.75.
        assert_eq!(image.width(), 150);
    }
}

#[test]
fn high_flag_waits_for_full_quality() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let input = write_sample_pdf(temp.path(), 1);
    let out_dir = temp.path().join("out");

    pagedeck()
        .arg(&input)
        .arg("--out")
        .arg(&out_dir)
        .arg("--width")
        .arg("200")
        .arg("--high")
        .assert()
        .success();

    let image = image::open(out_dir.join("page-001.png")).expect("output should be readable");
    assert_eq!(image.width(), 200);
}

#[test]
fn stats_flag_emits_json_report() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let input = write_sample_pdf(temp.path(), 3);
    let out_dir = temp.path().join("out");

    let output = pagedeck()
        .arg(&input)
        .arg("--out")
        .arg(&out_dir)
        .arg("--stats")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).expect("stdout should be utf-8");
    let json_start = stdout.find('{').expect("stdout should contain a json report");
    let report: Value =
        serde_json::from_str(&stdout[json_start..]).expect("report should be valid json");

    assert_eq!(report["pages"], 3);
    assert_eq!(report["decode_attempts"], 3);
    assert_eq!(report["documents_loaded"], 1);
    assert_eq!(report["terminal_errors"], 0);
    assert_eq!(report["cache_entries"], 3);
}

#[test]
fn fails_for_missing_file() {
    pagedeck()
        .arg("no-such-file.pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn fails_for_garbage_input() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let input = temp.path().join("garbage.pdf");
    fs::write(&input, b"this is not a pdf").expect("fixture should be written");

    pagedeck()
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open PDF"));
}

#[test]
fn fails_for_encrypted_marker_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let input = temp.path().join("encrypted.pdf");
    let mut bytes = sample_pdf_bytes(1);
    bytes.extend_from_slice(b"/Encrypt 5 0 R");
    fs::write(&input, bytes).expect("fixture should be written");

    pagedeck()
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("password protected"));
}

#[test]
fn rejects_unsupported_rotation() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let input = write_sample_pdf(temp.path(), 1);

    pagedeck()
        .arg(&input)
        .arg("--rotate")
        .arg("45")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--rotate must be 0, 90, 180 or 270"));
}
