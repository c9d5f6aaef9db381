use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use ndarray::arr2;
use rusty_fits::fits::fixture::{Col, FitsBuilder, ImageSpec, TableSpec};
use rusty_fits::{
    ingest, is_cube_convention, is_fits, load_cube, load_file, read_as_cube_labelled, Cell,
    Container, Dataset, FitsError, IngestOptions,
};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn ramp(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64).collect()
}

/// `[PRIMARY(empty), ATAB(20 rows), TWOD(4x5), ONED(20), THREED(2x2x5)]`
fn generic() -> FitsBuilder {
    FitsBuilder::new()
        .empty_primary()
        .table(
            TableSpec::new("ATAB")
                .column(Col::int("a", (0..20).collect()))
                .column(Col::double("b", ramp(20))),
        )
        .image(ImageSpec::new(vec![4, 5], ramp(20)).named("TWOD"))
        .image(ImageSpec::new(vec![20], ramp(20)).named("ONED"))
        .image(ImageSpec::new(vec![2, 2, 5], ramp(20)).named("THREED"))
}

fn same_shape_pair() -> Container {
    let bytes = FitsBuilder::new()
        .image(ImageSpec::new(vec![3, 4], ramp(12)).named("A"))
        .image(ImageSpec::new(vec![3, 4], vec![1.0; 12]).named("B"))
        .to_bytes();
    Container::from_bytes(bytes).unwrap()
}

fn stokes_cube() -> FitsBuilder {
    FitsBuilder::new().primary(
        ImageSpec::new(vec![4, 2, 2, 2], ramp(32))
            .card("CTYPE1", "RA---SIN")
            .card("CTYPE2", "DEC--SIN")
            .card("CTYPE3", "FREQ")
            .card("CTYPE4", "STOKES"),
    )
}

fn write(dir: &TempDir, name: &str, builder: &FitsBuilder) -> PathBuf {
    let path = dir.path().join(name);
    if name.ends_with(".gz") {
        builder.write_gz(&path).unwrap();
    } else {
        builder.write(&path).unwrap();
    }
    path
}

fn labels(datasets: &[Dataset]) -> Vec<&str> {
    datasets.iter().map(Dataset::label).collect()
}

fn shapes(datasets: &[Dataset]) -> Vec<Vec<usize>> {
    datasets.iter().map(|d| d.shape().to_vec()).collect()
}

fn load(path: &Path, options: &IngestOptions) -> Vec<Dataset> {
    load_file(path, options).unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_one_dataset_per_non_empty_segment() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "generic.fits", &generic());
    let ds = load(&path, &IngestOptions::default());

    assert_eq!(
        labels(&ds),
        [
            "generic[ATAB]",
            "generic[TWOD]",
            "generic[ONED]",
            "generic[THREED]"
        ]
    );
    assert_eq!(shapes(&ds), [vec![20], vec![4, 5], vec![20], vec![2, 2, 5]]);
    assert_eq!(ds[0].component_names(), ["a", "b"]);
    assert_eq!(ds[2].ndim(), 1);
    assert_eq!(ds[3].ndim(), 3);
}

#[test]
fn scenario_b_excluded_segment_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "generic.fits", &generic());
    let ds = load(&path, &IngestOptions::default().with_exclude(["TWOD"]));

    assert_eq!(
        labels(&ds),
        ["generic[ATAB]", "generic[ONED]", "generic[THREED]"]
    );
}

#[test]
fn scenario_c_auto_merge_groups_same_shape_arrays() {
    let ds = ingest(&same_shape_pair(), &IngestOptions::default().with_auto_merge(true)).unwrap();

    assert_eq!(labels(&ds), ["HDUList[A]"]);
    assert_eq!(ds[0].shape(), &[3, 4]);
    assert_eq!(ds[0].component_names(), ["A", "B"]);
    let b = ds[0].get_component("B").unwrap().as_array().unwrap();
    assert_eq!(b.get(&[2, 3]), Some(1.0));
    let a = ds[0].get_component("A").unwrap().as_array().unwrap();
    assert_eq!(a.get(&[2, 3]), Some(11.0));
}

#[test]
fn scenario_d_without_auto_merge_segments_stay_apart() {
    let ds = ingest(&same_shape_pair(), &IngestOptions::default()).unwrap();

    assert_eq!(labels(&ds), ["HDUList[A]", "HDUList[B]"]);
    assert!(ds.iter().all(|d| d.components().len() == 1));
}

#[test]
fn scenario_e_stokes_cube_is_split_into_planes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "cube.fits", &stokes_cube());
    assert!(is_cube_convention(&Container::open(&path).unwrap()));

    let d = load_cube(&path).unwrap();
    assert_eq!(d.shape(), &[1, 2, 2, 2]);
    assert_eq!(
        d.component_names(),
        ["STOKES 0", "STOKES 1", "STOKES 2", "STOKES 3"]
    );
    for (i, name) in d.component_names().iter().enumerate() {
        let plane = d[*name].as_array().unwrap();
        assert_eq!(plane.shape(), &[1, 2, 2, 2]);
        assert_eq!(plane.get(&[0, 0, 0, 0]), Some((i * 8) as f64));
        assert!(!plane.owns_data());
    }
}

#[test]
fn scenario_f_gzip_input_is_transparent() {
    let dir = tempfile::tempdir().unwrap();
    let builder = FitsBuilder::new().primary(ImageSpec::new(vec![2, 2], vec![0.0; 4]));
    let path = write(&dir, "test.fits.gz", &builder);
    assert!(is_fits(&path).unwrap());

    let ds = load(&path, &IngestOptions::default());
    assert_eq!(labels(&ds), ["test[PRIMARY]"]);
    let primary = ds[0]["PRIMARY"].as_array().unwrap();
    assert_eq!(primary.to_ndarray().unwrap(), arr2(&[[0.0, 0.0], [0.0, 0.0]]).into_dyn());
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn auto_merge_yields_one_dataset_per_kind_and_shape() {
    let builder = generic()
        .image(ImageSpec::new(vec![4, 5], vec![0.0; 20]).named("TWOD_B"))
        .image(ImageSpec::new(vec![20, 2], vec![0.0; 40]).named("PAIRS"))
        .table(TableSpec::new("NARROW").column(Col::int("a", (0..20).collect())));
    let c = Container::from_bytes(builder.to_bytes()).unwrap();
    let ds = ingest(&c, &IngestOptions::default().with_auto_merge(true)).unwrap();

    // ATAB (table, 20 x 2) and PAIRS (array, 20 x 2) share a shape but not a
    // kind; NARROW has the rows of ATAB but one column fewer.
    assert_eq!(
        labels(&ds),
        [
            "HDUList[ATAB]",
            "HDUList[TWOD]",
            "HDUList[ONED]",
            "HDUList[THREED]",
            "HDUList[PAIRS]",
            "HDUList[NARROW]"
        ]
    );
    assert_eq!(ds[1].component_names(), ["TWOD", "TWOD_B"]);
    assert_eq!(ds[1].segments(), ["TWOD", "TWOD_B"]);
    assert_eq!(ds[5].shape(), &[20]);
}

#[test]
fn excluded_segments_never_appear_as_components() {
    let c = same_shape_pair();
    let opts = IngestOptions::default()
        .with_auto_merge(true)
        .with_exclude(["A"]);
    let ds = ingest(&c, &opts).unwrap();

    assert_eq!(labels(&ds), ["HDUList[B]"]);
    assert_eq!(ds[0].component_names(), ["B"]);
    assert!(matches!(
        ds[0].get_component("A"),
        Err(FitsError::NoSuchComponent(_))
    ));
}

#[test]
fn ingestion_is_idempotent() {
    let c = Container::from_bytes(generic().to_bytes()).unwrap();
    for auto_merge in [false, true] {
        let opts = IngestOptions::default().with_auto_merge(auto_merge);
        let first: Vec<_> = ingest(&c, &opts).unwrap().iter().map(Dataset::summary).collect();
        let second: Vec<_> = ingest(&c, &opts).unwrap().iter().map(Dataset::summary).collect();
        assert_eq!(first, second);
    }
}

#[test]
fn views_over_plain_files_borrow_the_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "generic.fits", &generic());
    let ds = load(&path, &IngestOptions::default());

    for dataset in &ds {
        for component in dataset.components() {
            assert!(!component.owns_data());
            assert!(component.storage().is_mapped());
        }
    }
    let twod = ds[1]["TWOD"].as_array().unwrap();
    let mapped = twod.storage().bytes().as_ptr_range();
    assert!(mapped.contains(&twod.raw_bytes().as_ptr()));
}

#[test]
fn datasets_keep_the_buffer_alive_after_the_container_is_gone() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        "single.fits",
        &FitsBuilder::new().primary(ImageSpec::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0])),
    );
    let ds = load(&path, &IngestOptions::default());
    let storage = ds[0]["PRIMARY"].storage();
    assert_eq!(storage.holder_count(), 1);

    let copy = ds[0].clone();
    assert_eq!(storage.holder_count(), 2);
    drop(ds);
    assert_eq!(copy["PRIMARY"].as_array().unwrap().to_vec(), [1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn datasets_can_move_across_threads() {
    let c = same_shape_pair();
    let ds = ingest(&c, &IngestOptions::default()).unwrap();
    drop(c);

    let handles: Vec<_> = ds
        .into_iter()
        .map(|d| std::thread::spawn(move || d.components()[0].as_array().unwrap().values().sum::<f64>()))
        .collect();
    let sums: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(sums, [66.0, 12.0]);
}

#[test]
fn independent_ingestions_run_concurrently() {
    let bytes = generic().to_bytes();
    let threads: Vec<_> = (0..4)
        .map(|_| {
            let bytes = bytes.clone();
            std::thread::spawn(move || {
                let c = Container::from_bytes(bytes).unwrap();
                ingest(&c, &IngestOptions::default()).unwrap().len()
            })
        })
        .collect();
    for t in threads {
        assert_eq!(t.join().unwrap(), 4);
    }
}

#[test]
fn unsupported_segment_kind_aborts_ingestion() {
    let c = Container::from_bytes(generic().extension("FOREIGN", "BLOB", 16).to_bytes()).unwrap();
    let err = ingest(&c, &IngestOptions::default()).unwrap_err();
    assert!(matches!(err, FitsError::UnsupportedSegmentKind { .. }));
    assert!(!err.is_recoverable());
}

#[test]
fn corrupt_inputs_fail_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = generic().to_bytes();
    bytes.truncate(bytes.len() - 2880);
    let path = dir.path().join("cut.fits");
    std::fs::write(&path, &bytes).unwrap();
    assert!(matches!(
        load_file(&path, &IngestOptions::default()),
        Err(FitsError::Decode { .. })
    ));

    let fake = dir.path().join("fake.fits.gz");
    std::fs::write(&fake, generic().to_bytes()).unwrap();
    assert!(matches!(
        load_file(&fake, &IngestOptions::default()),
        Err(FitsError::CorruptArchive { .. })
    ));
}

#[test]
fn cube_reader_rejects_generic_containers() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "generic.fits", &generic());
    assert!(matches!(
        load_cube(&path),
        Err(FitsError::NotCubeConvention(_))
    ));
}

#[test]
fn cube_label_can_be_chosen() {
    let c = Container::from_bytes(stokes_cube().to_bytes()).unwrap();
    let d = read_as_cube_labelled(&c, "obs42").unwrap();
    assert_eq!(d.label(), "obs42[PRIMARY]");
    assert_eq!(d.component_names().len(), 4);
}

#[test]
fn random_groups_primary_is_unsupported() {
    let c = Container::from_bytes(FitsBuilder::new().random_groups(&[3, 2], 1, 5).to_bytes())
        .unwrap();
    match ingest(&c, &IngestOptions::default()) {
        Err(FitsError::UnsupportedSegmentKind { kind, .. }) => assert_eq!(kind, "GROUPS"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn gzip_wrapped_tile_compressed_images_are_read() {
    let dir = tempfile::tempdir().unwrap();
    let builder = FitsBuilder::new().compressed(
        ImageSpec::new(vec![6, 7], ramp(42)).named("SCI").bitpix(16),
        &[3, 4],
        "GZIP_1",
    );
    let path = write(&dir, "tiles.fits.gz", &builder);
    let ds = load(&path, &IngestOptions::default());
    assert_eq!(labels(&ds), ["tiles[SCI]"]);
    assert_eq!(ds[0].shape(), &[6, 7]);
    assert_eq!(ds[0]["SCI"].as_array().unwrap().to_vec(), ramp(42));
}

#[test]
fn scaled_integer_images_are_physical_values() {
    let c = Container::from_bytes(
        FitsBuilder::new()
            .primary(
                ImageSpec::new(vec![3], vec![0.0, 1.0, 2.0])
                    .bitpix(16)
                    .card("BSCALE", 0.5)
                    .card("BZERO", 100.0),
            )
            .to_bytes(),
    )
    .unwrap();
    let ds = ingest(&c, &IngestOptions::default()).unwrap();
    let values = ds[0]["PRIMARY"].as_array().unwrap().to_vec();
    assert_eq!(values, [100.0, 100.5, 101.0]);
}

#[test]
fn ascii_tables_ingest_like_binary_tables() {
    let c = Container::from_bytes(
        FitsBuilder::new()
            .table(
                TableSpec::ascii("ASC")
                    .column(Col::long("n", vec![1, 2, 3]))
                    .column(Col::text("tag", 3, &["x", "yy", "zzz"])),
            )
            .to_bytes(),
    )
    .unwrap();
    let ds = ingest(&c, &IngestOptions::default()).unwrap();
    assert_eq!(labels(&ds), ["HDUList[ASC]"]);
    assert_eq!(ds[0].shape(), &[3]);
    let tags: Vec<Cell> = ds[0]["tag"].as_column().unwrap().cells().collect();
    assert_eq!(tags[2], Cell::Text("zzz".into()));

    let batch = ds[0].to_record_batch().unwrap();
    assert_eq!(batch.num_rows(), 3);
    let names: BTreeSet<_> = batch.schema().fields().iter().map(|f| f.name().clone()).collect();
    assert_eq!(names, BTreeSet::from(["n".to_string(), "tag".to_string()]));
}
