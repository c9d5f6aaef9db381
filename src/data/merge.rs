//! Merge resolver: partitions retained segments into dataset groups.
//!
//! Grouping is a single forward pass over an ordered list of open groups.
//! A segment joins the first open group with the same key, otherwise it opens
//! a new one. Output order is the order in which groups were opened.

use crate::fits::container::SegmentKind;

/// Segments only merge within the same class; binary and ASCII tables are
/// both tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindClass {
    Array,
    Table,
    Other,
}

impl From<&SegmentKind> for KindClass {
    fn from(kind: &SegmentKind) -> Self {
        match kind {
            SegmentKind::Array => KindClass::Array,
            SegmentKind::Table(_) => KindClass::Table,
            SegmentKind::Unknown(_) => KindClass::Other,
        }
    }
}

/// What the resolver needs to know about one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCandidate {
    /// Position of the segment in the container.
    pub index: usize,
    pub class: KindClass,
    /// Segment shape: row-major axes for arrays, `[rows, columns]` for tables.
    pub shape: Vec<usize>,
}

/// Segment indices that become one dataset; the first member names it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeGroup {
    pub members: Vec<usize>,
}

impl MergeGroup {
    pub fn first(&self) -> usize {
        self.members[0]
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

pub fn resolve(candidates: &[MergeCandidate], auto_merge: bool) -> Vec<MergeGroup> {
    if !auto_merge {
        return candidates
            .iter()
            .map(|c| MergeGroup {
                members: vec![c.index],
            })
            .collect();
    }

    let mut open: Vec<(KindClass, &[usize], MergeGroup)> = Vec::new();
    for c in candidates {
        match open
            .iter_mut()
            .find(|(class, shape, _)| *class == c.class && *shape == c.shape.as_slice())
        {
            Some((_, _, group)) => group.members.push(c.index),
            None => open.push((
                c.class,
                c.shape.as_slice(),
                MergeGroup {
                    members: vec![c.index],
                },
            )),
        }
    }
    open.into_iter().map(|(_, _, group)| group).collect()
}
