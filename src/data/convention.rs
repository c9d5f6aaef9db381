//! Stokes cube detection.
//!
//! A container is treated as a Stokes cube when it holds exactly one array
//! segment with four axes whose `CTYPEn` keywords read, in header order,
//! celestial, celestial, spectral, Stokes. The check is a heuristic over a
//! [`ContainerSummary`] and never fails: anything ambiguous is
//! [`Convention::Generic`].

use serde::Serialize;

use crate::fits::container::{Container, SegmentKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AxisType {
    Celestial,
    Spectral,
    Stokes,
    Other,
}

impl AxisType {
    /// Classify a `CTYPEn` value by its coordinate part (`RA---SIN` → `RA`).
    pub fn from_ctype(ctype: &str) -> Self {
        let upper = ctype.trim().to_ascii_uppercase();
        let head = upper.split('-').next().unwrap_or("");
        match head {
            "RA" | "DEC" | "GLON" | "GLAT" | "ELON" | "ELAT" | "SLON" | "SLAT" | "HPLN"
            | "HPLT" => AxisType::Celestial,
            "FREQ" | "ENER" | "WAVN" | "VRAD" | "WAVE" | "VOPT" | "ZOPT" | "AWAV" | "VELO"
            | "BETA" | "FELO" | "VELOCITY" => AxisType::Spectral,
            "STOKES" => AxisType::Stokes,
            _ => AxisType::Other,
        }
    }
}

/// Header facts of one segment, axes in header order (`NAXIS1` first).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub name: String,
    pub is_array: bool,
    pub axes: Vec<usize>,
    pub axis_types: Vec<AxisType>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerSummary {
    pub segments: Vec<SegmentSummary>,
}

impl ContainerSummary {
    pub fn from_container(container: &Container) -> Self {
        let segments = container
            .segments()
            .iter()
            .map(|seg| {
                let axes: Vec<usize> = seg.shape().iter().rev().copied().collect();
                let axis_types = (1..=axes.len())
                    .map(|n| {
                        seg.header()
                            .get_str(&format!("CTYPE{n}"))
                            .map(AxisType::from_ctype)
                            .unwrap_or(AxisType::Other)
                    })
                    .collect();
                SegmentSummary {
                    name: seg.display_name(),
                    is_array: *seg.kind() == SegmentKind::Array,
                    axes,
                    axis_types,
                }
            })
            .collect();
        ContainerSummary { segments }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Convention {
    /// One 4-D array whose last header axis enumerates `planes` Stokes planes.
    StokesCube { planes: usize },
    Generic,
}

const CUBE_AXES: [AxisType; 4] = [
    AxisType::Celestial,
    AxisType::Celestial,
    AxisType::Spectral,
    AxisType::Stokes,
];

pub fn classify(summary: &ContainerSummary) -> Convention {
    let [seg] = summary.segments.as_slice() else {
        return Convention::Generic;
    };
    if !seg.is_array || seg.axes.len() != 4 || seg.axis_types != CUBE_AXES {
        return Convention::Generic;
    }
    match seg.axes[3] {
        0 => Convention::Generic,
        planes => Convention::StokesCube { planes },
    }
}

pub fn detect(summary: &ContainerSummary) -> bool {
    matches!(classify(summary), Convention::StokesCube { .. })
}

pub fn is_cube_convention(container: &Container) -> bool {
    detect(&ContainerSummary::from_container(container))
}
