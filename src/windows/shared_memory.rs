//! Read-only views over the simulator's named file mappings.

use crate::session::{Segment, SegmentOpener};
use crate::telemetry::SegmentKind;
use crate::{Result, SyncError};
use std::ptr::NonNull;
use tracing::{debug, trace};
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::Memory::{
    FILE_MAP_READ, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile,
};
use windows::core::PCWSTR;

/// One mapped telemetry segment.
pub struct SharedMemorySegment {
    mapping: HANDLE,
    base: NonNull<u8>,
    len: usize,
    name: &'static str,
}

impl SharedMemorySegment {
    /// Open and map the segment, failing if the simulator has not created it.
    pub fn open(kind: SegmentKind) -> Result<Self> {
        let name = kind.segment_name();
        trace!(segment = name, "Opening shared memory segment");

        let mapping = unsafe {
            let wide_name = wide_string(name);
            OpenFileMappingW(FILE_MAP_READ.0, false, PCWSTR::from_raw(wide_name.as_ptr()))
                .map_err(|e| SyncError::segment_unavailable_with_source(name, Box::new(e)))?
        };

        let len = kind.record_size();
        let view = unsafe { MapViewOfFile(mapping, FILE_MAP_READ, 0, 0, len) };
        let Some(base) = NonNull::new(view.Value as *mut u8) else {
            let win_err = windows::core::Error::from_thread();
            unsafe {
                let _ = CloseHandle(mapping);
            }
            return Err(SyncError::windows_api_error("MapViewOfFile", win_err));
        };

        debug!(segment = name, bytes = len, "Mapped shared memory segment");
        Ok(Self { mapping, base, len, name })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Segment for SharedMemorySegment {
    fn read_into(&self, buf: &mut [u8]) -> Result<usize> {
        let copied = buf.len().min(self.len);
        // SAFETY: the view spans `len` bytes for as long as `self` holds it
        unsafe {
            std::ptr::copy_nonoverlapping(self.base.as_ptr(), buf.as_mut_ptr(), copied);
        }
        Ok(copied)
    }
}

impl Drop for SharedMemorySegment {
    fn drop(&mut self) {
        trace!(segment = self.name, "Releasing shared memory segment");
        unsafe {
            let addr = MEMORY_MAPPED_VIEW_ADDRESS { Value: self.base.as_ptr() as *mut _ };
            let _ = UnmapViewOfFile(addr);
            let _ = CloseHandle(self.mapping);
        }
    }
}

// SAFETY: the segment only holds a mapping handle and a read-only view, both
// valid on any thread until drop
unsafe impl Send for SharedMemorySegment {}
unsafe impl Sync for SharedMemorySegment {}

/// Opens the simulator's segments through the Win32 file mapping API.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedMemoryOpener;

impl SegmentOpener for SharedMemoryOpener {
    type Segment = SharedMemorySegment;

    fn open(&self, kind: SegmentKind) -> Result<Self::Segment> {
        SharedMemorySegment::open(kind)
    }
}

/// Convert string to null-terminated wide string for Windows APIs
pub(crate) fn wide_string(s: &str) -> Vec<u16> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}
