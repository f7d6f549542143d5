use std::fmt;

use serde::{Deserialize, Serialize};

/// Bit recording that OUT relations are loaded.
pub const DIR_OUT_BIT: u8 = 0b01;
/// Bit recording that IN relations are loaded.
pub const DIR_IN_BIT: u8 = 0b10;

/// Direction of a relation relative to one of its vertices.
///
/// `Both` is the union of `Out` and `In`: a self-loop seen from its only
/// vertex, or a query that does not filter by direction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dir {
    /// The vertex is the start endpoint.
    Out,
    /// The vertex is the end endpoint.
    In,
    /// Either endpoint.
    Both,
}

impl Dir {
    /// True for `Out` and `Both`.
    pub fn includes_out(self) -> bool {
        matches!(self, Dir::Out | Dir::Both)
    }

    /// True for `In` and `Both`.
    pub fn includes_in(self) -> bool {
        matches!(self, Dir::In | Dir::Both)
    }

    /// Swaps `Out` and `In`.
    pub fn reverse(self) -> Dir {
        match self {
            Dir::Out => Dir::In,
            Dir::In => Dir::Out,
            Dir::Both => Dir::Both,
        }
    }

    /// True when a relation seen in direction `self` satisfies a request for `requested`.
    pub fn satisfies(self, requested: Dir) -> bool {
        match requested {
            Dir::Both => true,
            Dir::Out => self.includes_out(),
            Dir::In => self.includes_in(),
        }
    }

    /// Bitmask with the bits of every direction `self` spans.
    pub fn bits(self) -> u8 {
        match self {
            Dir::Out => DIR_OUT_BIT,
            Dir::In => DIR_IN_BIT,
            Dir::Both => DIR_OUT_BIT | DIR_IN_BIT,
        }
    }

    /// Lower-case label used by metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Dir::Out => "out",
            Dir::In => "in",
            Dir::Both => "both",
        }
    }
}

impl fmt::Display for Dir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when every direction bit `requested` needs is set in `code`.
pub fn covers(code: u8, requested: Dir) -> bool {
    let need = requested.bits();
    code & need == need
}

/// Returns `code` with the bits of `satisfied` set.
pub fn mark_dir(code: u8, satisfied: Dir) -> u8 {
    code | satisfied.bits()
}
