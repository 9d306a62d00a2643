/// Session ordering detector
///
/// Classifies the session by the relative ordering of the open price, VWAP
/// and the momentum key level:
/// - 6 strict orderings of {open, vwap, key level}
/// - a 7th case when VWAP sits inside (or on) the key level band
///
/// The open is placed with the zone score, so an open inside the band has not
/// yet broken out of it.
use serde::{Deserialize, Serialize};

use crate::models::KeyLevel;
use crate::signals::zone_score;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionOrdering {
    OpenKeyVwap, // O > K > V
    KeyOpenVwap, // K > O > V
    KeyVwapOpen, // K > V > O
    OpenVwapKey, // O > V > K
    VwapOpenKey, // V > O > K
    VwapKeyOpen, // V > K > O
    KeyAtVwap,   // V inside the key level band
}

impl SessionOrdering {
    pub const ALL: [SessionOrdering; 7] = [
        SessionOrdering::OpenKeyVwap,
        SessionOrdering::KeyOpenVwap,
        SessionOrdering::KeyVwapOpen,
        SessionOrdering::OpenVwapKey,
        SessionOrdering::VwapOpenKey,
        SessionOrdering::VwapKeyOpen,
        SessionOrdering::KeyAtVwap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOrdering::OpenKeyVwap => "open > key > vwap",
            SessionOrdering::KeyOpenVwap => "key > open > vwap",
            SessionOrdering::KeyVwapOpen => "key > vwap > open",
            SessionOrdering::OpenVwapKey => "open > vwap > key",
            SessionOrdering::VwapOpenKey => "vwap > open > key",
            SessionOrdering::VwapKeyOpen => "vwap > key > open",
            SessionOrdering::KeyAtVwap => "key at vwap",
        }
    }
}

impl std::fmt::Display for SessionOrdering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordering of open, vwap and key level. VWAP decides which side of the
/// band it sits on; the zone score of the open then picks the ordering.
pub fn detect_ordering(open: f64, vwap: f64, key_level: &KeyLevel) -> SessionOrdering {
    if key_level.contains(vwap) {
        return SessionOrdering::KeyAtVwap;
    }

    let score = zone_score(open, vwap, key_level);
    if key_level.low > vwap {
        match score {
            1 => SessionOrdering::OpenKeyVwap,
            0 => SessionOrdering::KeyOpenVwap,
            _ => SessionOrdering::KeyVwapOpen,
        }
    } else {
        match score {
            1 => SessionOrdering::OpenVwapKey,
            0 => SessionOrdering::VwapOpenKey,
            _ => SessionOrdering::VwapKeyOpen,
        }
    }
}
