use log::debug;

use crate::config::IngestOptions;
use crate::fits::container::Segment;

// ---------------------------------------------------------------------------
// Segment filter: exclusion list, then emptiness
// ---------------------------------------------------------------------------

/// Why a segment contributes no dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Excluded,
    Empty,
}

/// Decide whether one segment is skipped.
///
/// Exclusion is checked first so an excluded empty segment reports
/// [`SkipReason::Excluded`]. Emptiness is position-independent.
pub fn skip_reason(segment: &Segment, options: &IngestOptions) -> Option<SkipReason> {
    if options.is_excluded(&segment.display_name()) {
        Some(SkipReason::Excluded)
    } else if segment.is_empty() {
        Some(SkipReason::Empty)
    } else {
        None
    }
}

/// Return indices of segments that survive filtering, in file order.
pub fn retained_indices(segments: &[Segment], options: &IngestOptions) -> Vec<usize> {
    segments
        .iter()
        .enumerate()
        .filter(|(i, seg)| match skip_reason(seg, options) {
            Some(reason) => {
                debug!("skipping segment {i} '{}': {reason:?}", seg.display_name());
                false
            }
            None => true,
        })
        .map(|(i, _)| i)
        .collect()
}
