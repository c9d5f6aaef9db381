use std::path::Path;

use log::{debug, info, warn};

use super::convention::{classify, Convention, ContainerSummary};
use super::filter;
use super::merge::{self, KindClass, MergeCandidate};
use super::model::{unique_name, ArrayView, ColumnView, ComponentData, Dataset};
use crate::config::IngestOptions;
use crate::error::{FitsError, Result};
use crate::fits::container::{Container, Layout, Segment, SegmentKind};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Open a container (plain or gzip-wrapped) and ingest it.
///
/// The returned datasets keep the decoded bytes alive on their own; the
/// container handle is dropped before returning.
pub fn load_file(path: &Path, options: &IngestOptions) -> Result<Vec<Dataset>> {
    let container = Container::open(path)?;
    ingest(&container, options)
}

/// Open a container and restructure it as a Stokes cube.
pub fn load_cube(path: &Path) -> Result<Dataset> {
    let container = Container::open(path)?;
    read_as_cube(&container)
}

// ---------------------------------------------------------------------------
// Ingestion – segments → datasets
// ---------------------------------------------------------------------------

/// Turn the segments of `container` into datasets.
///
/// Steps, in order:
/// * drop excluded and empty segments
/// * reject segments that are neither arrays nor tables
/// * group the rest (singletons unless `auto_merge`)
/// * build one dataset per group, labelled `"{prefix}[{first segment}]"`
///
/// Either every dataset is returned or the whole call fails.
pub fn ingest(container: &Container, options: &IngestOptions) -> Result<Vec<Dataset>> {
    let segments = container.segments();
    let retained = filter::retained_indices(segments, options);

    let candidates = retained
        .iter()
        .map(|&i| -> Result<MergeCandidate> {
            let seg = &segments[i];
            Ok(MergeCandidate {
                index: i,
                class: kind_class(seg)?,
                shape: seg.shape().to_vec(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let groups = merge::resolve(&candidates, options.auto_merge);
    let prefix = options
        .label
        .clone()
        .unwrap_or_else(|| container.label_prefix());

    let mut datasets: Vec<Dataset> = Vec::with_capacity(groups.len());
    for group in &groups {
        let first = &segments[group.first()];
        let label = unique_name(&format!("{prefix}[{}]", first.display_name()), |l| {
            datasets.iter().any(|d| d.label() == l)
        });
        let mut dataset = Dataset::new(label, dataset_shape(first));
        for &i in &group.members {
            add_segment(&mut dataset, &segments[i]);
        }
        if !group.is_singleton() {
            debug!(
                "merged {} segments into '{}'",
                group.members.len(),
                dataset.label()
            );
        }
        debug!(
            "dataset '{}' shape {:?} components {:?}",
            dataset.label(),
            dataset.shape(),
            dataset.component_names()
        );
        datasets.push(dataset);
    }

    info!(
        "ingested {prefix}: {} segments, {} skipped, {} datasets",
        segments.len(),
        segments.len() - retained.len(),
        datasets.len()
    );
    Ok(datasets)
}

fn kind_class(seg: &Segment) -> Result<KindClass> {
    match seg.kind() {
        SegmentKind::Unknown(kind) => Err(FitsError::UnsupportedSegmentKind {
            index: seg.index(),
            name: seg.display_name(),
            kind: kind.clone(),
        }),
        kind => Ok(KindClass::from(kind)),
    }
}

/// Arrays keep their shape; a table is one-dimensional over its rows.
fn dataset_shape(seg: &Segment) -> Vec<usize> {
    match seg.layout() {
        Layout::Table { rows, .. } => vec![*rows],
        _ => seg.shape().to_vec(),
    }
}

fn add_segment(dataset: &mut Dataset, seg: &Segment) {
    let name = seg.display_name();
    match seg.layout() {
        Layout::Array { .. } => {
            if let Some(view) = ArrayView::of_segment(seg) {
                dataset.add_component(&name, ComponentData::Array(view));
            }
        }
        Layout::Table { columns, .. } => {
            let mut exposed = 0;
            for col in columns {
                if col.repeat == 0 {
                    continue;
                }
                if !col.is_supported() || !col.is_scalar() {
                    warn!(
                        "skipping column '{}' of '{name}': only 1-D columns of numeric, \
                         logical or text type are exposed",
                        col.name
                    );
                    continue;
                }
                if let Some(view) = ColumnView::new(seg, col) {
                    dataset.add_component(&col.name, ComponentData::Column(view));
                    exposed += 1;
                }
            }
            if exposed == 0 {
                warn!("table '{name}' has no exposable columns");
            }
        }
        // Rejected by `kind_class` before grouping.
        Layout::Opaque => {}
    }
    dataset.add_segment(name);
}

// ---------------------------------------------------------------------------
// Stokes cube restructuring
// ---------------------------------------------------------------------------

/// Split a Stokes cube into one component per plane.
///
/// The outermost axis of the `(planes, f, y, x)` array is replaced by a unit
/// axis, so the dataset has shape `(1, f, y, x)` and `STOKES i` is a zero-copy
/// view of plane `i`.
pub fn read_as_cube(container: &Container) -> Result<Dataset> {
    read_as_cube_labelled(container, &container.label_prefix())
}

/// [`read_as_cube`] with an explicit label prefix instead of the file name.
pub fn read_as_cube_labelled(container: &Container, prefix: &str) -> Result<Dataset> {
    let summary = ContainerSummary::from_container(container);
    let planes = match classify(&summary) {
        Convention::StokesCube { planes } => planes,
        Convention::Generic => return Err(FitsError::NotCubeConvention(mismatch(&summary))),
    };

    let seg = &container.segments()[0];
    let view = ArrayView::of_segment(seg).ok_or_else(|| {
        FitsError::NotCubeConvention(format!("'{}' is not an array", seg.display_name()))
    })?;
    let mut shape = vec![1];
    shape.extend_from_slice(&view.shape()[1..]);

    let mut dataset = Dataset::new(format!("{prefix}[{}]", seg.display_name()), shape);
    for i in 0..planes {
        if let Some(plane) = view.slice_plane(i) {
            dataset.add_component(&format!("STOKES {i}"), ComponentData::Array(plane));
        }
    }
    dataset.add_segment(seg.display_name());
    info!("read {} as a {planes}-plane Stokes cube", dataset.label());
    Ok(dataset)
}

fn mismatch(summary: &ContainerSummary) -> String {
    match summary.segments.as_slice() {
        [seg] => format!(
            "segment '{}' has axes {:?} of types {:?}",
            seg.name, seg.axes, seg.axis_types
        ),
        segs => format!("expected one segment, found {}", segs.len()),
    }
}
