//! Simulator telemetry records decoded from shared memory.
//!
//! The simulator publishes three pages, each in its own named segment:
//!
//! | Segment | Record | Refresh |
//! |---|---|---|
//! | `Local\acpmf_physics` | [`Physics`] | every physics step |
//! | `Local\acpmf_graphics` | [`Graphics`] | every rendered frame |
//! | `Local\acpmf_static` | [`StaticInfo`] | once per session |
//!
//! Each record implements [`SharedMemoryStruct`], which decodes it positionally
//! from a byte region and encodes it back without loss.
//!
//! ```rust
//! use racelight::telemetry::{Physics, SharedMemoryStruct};
//!
//! let physics = Physics { rpms: 7250, gear: 4, ..Default::default() };
//! let bytes = physics.encode();
//! assert_eq!(bytes.len(), Physics::SIZE);
//!
//! let decoded = Physics::decode(&bytes).unwrap();
//! assert_eq!(decoded.rpms, 7250);
//! ```

mod graphics;
pub mod layout;
mod physics;
mod static_info;
mod status;

pub use graphics::Graphics;
pub use layout::{FieldReader, FieldWriter, SharedMemoryStruct, WideString};
pub use physics::Physics;
pub use static_info::StaticInfo;
pub use status::{AcFlag, AcSessionType, AcStatus};

/// The three shared memory segments published by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Physics,
    Graphics,
    StaticInfo,
}

impl SegmentKind {
    pub const ALL: [SegmentKind; 3] =
        [SegmentKind::Physics, SegmentKind::Graphics, SegmentKind::StaticInfo];

    /// Kernel object name of the segment.
    pub fn segment_name(self) -> &'static str {
        match self {
            SegmentKind::Physics => "Local\\acpmf_physics",
            SegmentKind::Graphics => "Local\\acpmf_graphics",
            SegmentKind::StaticInfo => "Local\\acpmf_static",
        }
    }

    /// Size of the record published in the segment.
    pub fn record_size(self) -> usize {
        match self {
            SegmentKind::Physics => Physics::SIZE,
            SegmentKind::Graphics => Graphics::SIZE,
            SegmentKind::StaticInfo => StaticInfo::SIZE,
        }
    }
}
