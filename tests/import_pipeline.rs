use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use spectral_import::data::model::{Dataset, MetadataValue};
use spectral_import::error::{MismatchError, ResampleError};
use spectral_import::{
    DatasetRegistry, ImportConfig, ImportError, ImportRequest, Importer, LoadStatus,
    ResampleBounds,
};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn scratch_dir(test: &str) -> PathBuf {
    std::env::temp_dir().join(format!("spectral-import-{test}-{}", std::process::id()))
}

fn importer(test: &str) -> Importer {
    let config = ImportConfig {
        bad_upload_dir: scratch_dir(test),
        ..ImportConfig::default()
    };
    Importer::new(config, Arc::new(DatasetRegistry::new()))
}

fn request(kind: &str, name: &str, spectra: &str, metadata: Option<&str>) -> ImportRequest {
    ImportRequest {
        kind: kind.into(),
        name: name.into(),
        description: "integration".into(),
        spectra: Some(spectra.as_bytes().to_vec()),
        metadata: metadata.map(|m| m.as_bytes().to_vec()),
        bounds: None,
    }
}

fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, body) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Matrix CSV with `n` axis points (1, 2, ..) and one column per key.
fn matrix(keys: &[&str], n: usize) -> String {
    let mut out = format!("x,{}\n", keys.join(","));
    for i in 1..=n {
        let cells: Vec<String> = (0..keys.len()).map(|k| format!("{}", i * 10 + k)).collect();
        out.push_str(&format!("{i},{}\n", cells.join(",")));
    }
    out
}

#[test]
fn test_metadata_order_wins() {
    let importer = importer("order");
    let handle = importer
        .import(request(
            "NIR",
            "ordered",
            &matrix(&["a", "b"], 3),
            Some("pkey,group\nb,g1\na,g2\n"),
        ))
        .unwrap();
    assert_eq!(handle.status(), LoadStatus::Pending);
    assert_eq!(handle.navigation_path(), "/explorer?ds_kind=NIR&ds_name=ordered");

    let ds = handle.load().unwrap();
    let Dataset::Vector(ds) = ds.as_ref() else {
        panic!("expected a vector dataset");
    };
    assert_eq!(ds.keys.as_slice(), &["b", "a"]);
    assert_eq!(ds.row("b"), Some(&[11.0, 21.0, 31.0][..]));
    assert_eq!(ds.metadata["k0"].value(0), Some(MetadataValue::Label("g1".into())));
    assert!(ds.provenance.user_added);
    assert!(!ds.provenance.is_public);
    assert_eq!(ds.provenance.description, "integration");
}

#[test]
fn test_duplicate_metadata_keys_register_nothing() {
    let importer = importer("dupkeys");
    let err = importer
        .import(request("NIR", "dup", &matrix(&["a", "b"], 2), Some("pkey\na\na\n")))
        .unwrap_err();
    assert!(matches!(err, ImportError::DuplicateKey(_)));
    assert_eq!(err.status(), 415);
    assert!(!importer.registry().contains("NIR", "dup"));
}

#[test]
fn test_trajectories_cropped_to_common_range() {
    let importer = importer("crop");
    let spectra = zip_of(&[
        ("one.csv", "1,1\n2,2\n3,3\n4,4\n"),
        ("two.csv", "2,20\n3,30\n4,40\n5,50\n"),
    ]);
    let handle = importer
        .import(ImportRequest {
            kind: "Raman".into(),
            name: "cropped".into(),
            spectra: Some(spectra),
            bounds: ResampleBounds::from_strings("", "", ""),
            ..Default::default()
        })
        .unwrap();
    let ds = handle.load().unwrap();
    // no bounds given: per-sample axes survive
    let Dataset::Trajectory(ds) = ds.as_ref() else {
        panic!("expected trajectories");
    };
    assert_eq!(ds.keys.as_slice(), &["one.csv", "two.csv"]);

    let spectra = zip_of(&[
        ("one.csv", "1,1\n2,2\n3,3\n4,4\n"),
        ("two.csv", "2,20\n3,30\n4,40\n5,50\n"),
    ]);
    let handle = importer
        .import(ImportRequest {
            kind: "Raman".into(),
            name: "resampled".into(),
            spectra: Some(spectra),
            bounds: Some(ResampleBounds::default()),
            ..Default::default()
        })
        .unwrap();
    let ds = handle.load().unwrap();
    let Dataset::Vector(ds) = ds.as_ref() else {
        panic!("expected a vector dataset");
    };
    assert_eq!(ds.axis, vec![2.0, 3.0, 4.0]);
    assert_eq!(ds.row("two.csv"), Some(&[20.0, 30.0, 40.0][..]));
}

#[test]
fn test_reserved_kind_channel_count() {
    let importer = importer("channels");
    let err = importer
        .import(request("LIBS", "short", &matrix(&["s1"], 100), None))
        .unwrap_err();
    assert!(matches!(err, ImportError::ChannelCount { actual: 100, .. }));
    assert_eq!(err.user_message(), "Wrong number of channels for LIBS data: 100.");
    assert!(importer.registry().names("LIBS").is_empty());
}

#[test]
fn test_inverted_bounds_rejected() {
    let importer = importer("overlap");
    let mut req = request("NIR", "inverted", &matrix(&["s1", "s2"], 20), None);
    req.bounds = ResampleBounds::from_strings("10", "5", "");
    let err = importer.import(req).unwrap_err();
    assert!(matches!(
        err,
        ImportError::Resample(ResampleError::Overlap { lower, upper }) if lower == 10.0 && upper == 5.0
    ));
}

#[test]
fn test_name_collision_checked_before_parsing() {
    let importer = importer("collision");
    importer
        .import(request("NIR", "taken", &matrix(&["a"], 2), None))
        .unwrap();

    // garbage spectra: the collision must be reported, not a parse failure
    let mut req = request("NIR", "taken", "", None);
    req.spectra = Some(vec![0xff, 0xfe, 0x00]);
    let err = importer.import(req).unwrap_err();
    assert!(matches!(err, ImportError::DuplicateName(_)));
    assert_eq!(err.status(), 403);

    // other kinds have their own namespace
    assert!(importer
        .import(request("Raman", "taken", &matrix(&["a"], 2), None))
        .is_ok());
}

#[test]
fn test_unknown_kind() {
    let config = ImportConfig {
        kinds: vec!["NIR".into()],
        bad_upload_dir: scratch_dir("kind"),
        ..ImportConfig::default()
    };
    let importer = Importer::new(config, Arc::new(DatasetRegistry::new()));
    let err = importer
        .import(request("XRD", "x", &matrix(&["a"], 2), None))
        .unwrap_err();
    assert!(matches!(err, ImportError::InvalidKind(ref k) if k == "XRD"));
    assert_eq!(err.status(), 400);
}

#[test]
fn test_metadata_naming_missing_spectrum() {
    let importer = importer("mismatch");
    let err = importer
        .import(request("NIR", "m", &matrix(&["a", "b"], 2), Some("pkey\na\nc\n")))
        .unwrap_err();
    assert!(matches!(err, ImportError::Mismatch(MismatchError::KeySets { .. })));
    assert_eq!(err.user_message(), "Spectrum and metadata names mismatch.");
}

#[test]
fn test_metadata_without_pkey() {
    let importer = importer("pkey");
    let err = importer
        .import(request("NIR", "p", &matrix(&["a"], 2), Some("id,group\na,x\n")))
        .unwrap_err();
    assert!(matches!(err, ImportError::MetadataFormat(_)));
    assert_eq!(err.user_message(), "Metadata CSV must start with \"pkey\" column.");
}

#[test]
fn test_bad_archive_entry_is_kept() {
    let importer = importer("badentry");
    let spectra = zip_of(&[("good.txt", "1,1\n2,2\n"), ("broken.txt", "no numbers here")]);
    let err = importer
        .import(ImportRequest {
            kind: "Raman".into(),
            name: "bad".into(),
            spectra: Some(spectra),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err.user_message(), "Unable to parse spectrum file: broken.txt");

    let kept = scratch_dir("badentry").join("badupload-broken.txt");
    assert_eq!(std::fs::read(&kept).unwrap(), b"no numbers here");
    std::fs::remove_dir_all(scratch_dir("badentry")).unwrap();
}

#[test]
fn test_single_upload() {
    let importer = importer("upload");
    let spectrum = importer
        .parse_upload("scan.txt", b"# wavelength intensity\n3 30\n1 10\n2 20\n")
        .unwrap();
    assert_eq!(spectrum.axis(), &[1.0, 2.0, 3.0]);
    assert_eq!(spectrum.intensity(), &[10.0, 20.0, 30.0]);

    let err = importer.parse_upload("junk.bin", b"\x01\x02").unwrap_err();
    assert_eq!(err.status(), 415);
    let _ = std::fs::remove_dir_all(scratch_dir("upload"));
}

#[test]
fn test_oversized_resample_request() {
    let importer = importer("gridlimit");
    let mut req = request("NIR", "huge", &matrix(&["s1", "s2"], 5), None);
    req.bounds = ResampleBounds::from_strings("0", "1e300", "1e-300");
    let err = importer.import(req).unwrap_err();
    assert!(matches!(
        err,
        ImportError::Resample(ResampleError::TooManyPoints { .. })
    ));
    assert_eq!(err.status(), 415);
    assert_eq!(
        err.user_message(),
        "Resampling step too small for the requested range."
    );
    assert!(!importer.registry().contains("NIR", "huge"));

    let config = ImportConfig {
        max_grid_points: 4,
        bad_upload_dir: scratch_dir("gridlimit"),
        ..ImportConfig::default()
    };
    let importer = Importer::new(config, Arc::new(DatasetRegistry::new()));
    let mut req = request("NIR", "capped", &matrix(&["s1"], 5), None);
    req.bounds = ResampleBounds::from_strings("1", "5", "1");
    assert!(matches!(
        importer.import(req).unwrap_err(),
        ImportError::Resample(ResampleError::TooManyPoints { limit: 4, .. })
    ));
}

#[test]
fn test_resampled_axis_stays_inside_bounds() {
    let importer = importer("inside");
    let mut req = request("NIR", "fractional", &matrix(&["s1"], 4), None);
    req.bounds = ResampleBounds::from_strings("1", "3.7", "1");
    let ds = importer.import(req).unwrap().load().unwrap();
    let Dataset::Vector(ds) = ds.as_ref() else {
        panic!("expected a vector dataset");
    };
    assert_eq!(ds.axis, vec![1.0, 2.0, 3.0]);
    assert_eq!(ds.row("s1"), Some(&[10.0, 20.0, 30.0][..]));
}

#[test]
fn test_archive_names_with_stray_whitespace() {
    let importer = importer("trimnames");
    let spectra = zip_of(&[("a.txt ", "1,1\n2,2\n"), ("b.txt", "1,3\n2,4\n")]);
    let handle = importer
        .import(ImportRequest {
            kind: "Raman".into(),
            name: "trimmed".into(),
            spectra: Some(spectra),
            metadata: Some(b"pkey\nb.txt\na.txt\n".to_vec()),
            ..Default::default()
        })
        .unwrap();
    let ds = handle.load().unwrap();
    assert_eq!(ds.keys().as_slice(), &["b.txt", "a.txt"]);
}
