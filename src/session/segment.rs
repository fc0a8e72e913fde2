//! Backing store abstraction for the telemetry segments.

use crate::Result;
use crate::telemetry::SegmentKind;

/// An open, readable telemetry segment.
///
/// Implementations must tolerate concurrent reads: each call copies a
/// transient, independent view of the segment's current bytes.
pub trait Segment: Send + Sync + 'static {
    /// Copy the segment's current bytes into `buf`.
    ///
    /// Returns how many bytes were copied, which is less than `buf.len()` when
    /// the segment is smaller than the requested region.
    fn read_into(&self, buf: &mut [u8]) -> Result<usize>;
}

/// Opens telemetry segments by kind.
pub trait SegmentOpener: Send + Sync + 'static {
    type Segment: Segment;

    /// Open the named segment, failing when the simulator has not created it.
    fn open(&self, kind: SegmentKind) -> Result<Self::Segment>;
}
