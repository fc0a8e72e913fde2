//! Typed views over the enumerated integers in the graphics page.

use std::fmt;

/// Simulator run state (`AC_STATUS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AcStatus {
    #[default]
    Off,
    Replay,
    Live,
    Pause,
    Other(i32),
}

impl AcStatus {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => AcStatus::Off,
            1 => AcStatus::Replay,
            2 => AcStatus::Live,
            3 => AcStatus::Pause,
            other => AcStatus::Other(other),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            AcStatus::Off => 0,
            AcStatus::Replay => 1,
            AcStatus::Live => 2,
            AcStatus::Pause => 3,
            AcStatus::Other(raw) => raw,
        }
    }
}

impl fmt::Display for AcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcStatus::Off => f.write_str("Off"),
            AcStatus::Replay => f.write_str("Replay"),
            AcStatus::Live => f.write_str("Live"),
            AcStatus::Pause => f.write_str("Pause"),
            AcStatus::Other(raw) => write!(f, "Unknown({raw})"),
        }
    }
}

/// Flag currently shown to the player (`AC_FLAG_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AcFlag {
    #[default]
    NoFlag,
    Blue,
    Yellow,
    Black,
    White,
    Checkered,
    Penalty,
    Other(i32),
}

impl AcFlag {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => AcFlag::NoFlag,
            1 => AcFlag::Blue,
            2 => AcFlag::Yellow,
            3 => AcFlag::Black,
            4 => AcFlag::White,
            5 => AcFlag::Checkered,
            6 => AcFlag::Penalty,
            other => AcFlag::Other(other),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            AcFlag::NoFlag => 0,
            AcFlag::Blue => 1,
            AcFlag::Yellow => 2,
            AcFlag::Black => 3,
            AcFlag::White => 4,
            AcFlag::Checkered => 5,
            AcFlag::Penalty => 6,
            AcFlag::Other(raw) => raw,
        }
    }
}

/// Session kind (`AC_SESSION_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcSessionType {
    Unknown,
    Practice,
    Qualify,
    Race,
    Hotlap,
    TimeAttack,
    Drift,
    Drag,
    Other(i32),
}

impl AcSessionType {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            -1 => AcSessionType::Unknown,
            0 => AcSessionType::Practice,
            1 => AcSessionType::Qualify,
            2 => AcSessionType::Race,
            3 => AcSessionType::Hotlap,
            4 => AcSessionType::TimeAttack,
            5 => AcSessionType::Drift,
            6 => AcSessionType::Drag,
            other => AcSessionType::Other(other),
        }
    }
}
