pub mod errors;

pub use errors::{RsmError, RsmErrorCategory, RsmErrorKind, RsmResult};

use std::fmt::{Display, Formatter};

/// Reciprocal-space axis, in the order the coordinate triple is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HklAxis {
    H,
    K,
    L,
}

impl HklAxis {
    pub const ALL: [HklAxis; 3] = [HklAxis::H, HklAxis::K, HklAxis::L];

    pub const fn index(self) -> usize {
        match self {
            Self::H => 0,
            Self::K => 1,
            Self::L => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::H => "H",
            Self::K => "K",
            Self::L => "L",
        }
    }
}

impl Display for HklAxis {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Lifecycle stage of one scan's processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanStage {
    #[default]
    Unloaded,
    RawLoaded,
    Mapped,
    Gridded,
}

impl ScanStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unloaded => "UNLOADED",
            Self::RawLoaded => "RAW_LOADED",
            Self::Mapped => "MAPPED",
            Self::Gridded => "GRIDDED",
        }
    }
}

impl Display for ScanStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}
