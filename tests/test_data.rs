// CSV ingestion and config loading from files.

use std::io::Write;

use tempfile::NamedTempFile;

use ff_classifier::data::{load_csv, one_hot};
use ff_classifier::{Error, TrainConfig};

fn csv_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_normalizes_and_encodes() {
    let file = csv_file("7,0,255,51,0\n0,102,0,0,255\n3,0,0,0,0\n");
    let set = load_csv(file.path(), 10).unwrap();

    assert_eq!(set.x.dim(), (3, 4));
    assert_eq!(set.y.dim(), (3, 10));
    assert_eq!(set.x[[0, 1]], 1.0);
    assert!((set.x[[1, 0]] - 0.4).abs() < 1e-12);
    assert_eq!(set.labels(), vec![7, 0, 3]);
    assert_eq!(set.y, one_hot(&[7, 0, 3], 10).unwrap());
}

#[test]
fn ragged_rows_are_invalid() {
    let file = csv_file("1,0,0,0\n2,0,0\n");
    assert!(matches!(load_csv(file.path(), 10), Err(Error::InvalidData(_))));
}

#[test]
fn unparsable_pixels_are_invalid() {
    let file = csv_file("1,0,x,0\n");
    assert!(matches!(load_csv(file.path(), 10), Err(Error::InvalidData(_))));
}

#[test]
fn out_of_range_pixels_are_invalid() {
    for row in ["1,nan,0,255\n", "2,300,0,0\n", "3,0,-5,0\n", "4,0,0,inf\n"] {
        let file = csv_file(row);
        assert!(
            matches!(load_csv(file.path(), 10), Err(Error::InvalidData(_))),
            "{:?}",
            row
        );
    }
}

#[test]
fn label_out_of_range_is_invalid() {
    let file = csv_file("12,0,1,0\n");
    assert!(matches!(load_csv(file.path(), 10), Err(Error::InvalidData(_))));
}

#[test]
fn config_file_round_trip() {
    let file = csv_file(r#"{ "hidden_layers": [32], "cycles": 2, "learning_rate": 0.01 }"#);
    let config = TrainConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.hidden_layers, vec![32]);
    assert_eq!(config.cycles, 2);
    assert_eq!(config.batch_size, 64);
}

#[test]
fn missing_config_is_unavailable() {
    assert!(matches!(
        TrainConfig::from_json_file("no/such/config.json"),
        Err(Error::DataUnavailable(_))
    ));
}
