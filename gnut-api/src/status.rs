use std::fmt;

/// Status code of an accepted handshake step.
pub const OK: u16 = 200;
pub const OK_MESSAGE: &str = "OK";

/// Status sent back to a crawler instead of a normal negotiation.
pub const CRAWLER_CODE: u16 = 593;
pub const CRAWLER_MESSAGE: &str = "Hi";

/// Given by a shielded leaf to incoming connections.
pub const SHIELDED: u16 = 503;
pub const SLOTS_FULL: u16 = 503;

pub const DEFAULT_BAD_STATUS_CODE: u16 = 503;
pub const DEFAULT_BAD_STATUS_MESSAGE: &str = "Service Not Available";

pub const LOCALE_NO_MATCH: u16 = 577;
pub const LOCALE_NO_MATCH_MESSAGE: &str = "Service Not Available";

/// Outcome of a slot or policy check. `Ok` is the only acceptable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeStatus {
    Ok,
    NoXUltrapeer,
    Disconnected,
    WeAreLeaves,
    NotGoodUltrapeer,
    IdleLimeWire,
    StartingLimeWire,
    TooManyUltrapeers,
    NotAllowedLeaf,
    NotGoodLeaf,
    TooManyLeaves,
    NotAllowedUltrapeer,
    NonLimeRatio,
    NoLimeSlots,
    Unknown,
}

impl HandshakeStatus {
    pub fn message(self) -> &'static str {
        match self {
            HandshakeStatus::Ok => OK_MESSAGE,
            HandshakeStatus::NoXUltrapeer => "No X-Ultrapeer",
            HandshakeStatus::Disconnected => "I'm Disconnected",
            HandshakeStatus::WeAreLeaves => "We're Leaves",
            HandshakeStatus::NotGoodUltrapeer => "Not Good Ultrapeer",
            HandshakeStatus::IdleLimeWire => "Idle LimeWire",
            HandshakeStatus::StartingLimeWire => "Starting LimeWire",
            HandshakeStatus::TooManyUltrapeers => "No Ultrapeer Slots",
            HandshakeStatus::NotAllowedLeaf => "Leaf Connection Failed",
            HandshakeStatus::NotGoodLeaf => "Not Good Leaf",
            HandshakeStatus::TooManyLeaves => "No Leaf Slots",
            HandshakeStatus::NotAllowedUltrapeer => "Ultrapeer Connection Failed",
            HandshakeStatus::NonLimeRatio => "Non-LimeWire Slots Full",
            HandshakeStatus::NoLimeSlots => "No LimeWire Slots",
            HandshakeStatus::Unknown => "Unknown Reason",
        }
    }

    pub fn is_acceptable(self) -> bool {
        matches!(self, HandshakeStatus::Ok)
    }
}

impl fmt::Display for HandshakeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
