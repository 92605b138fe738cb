//! Reply Parsers
//!
//! Turn raw member replies into structured records:
//! - Slot ownership into ordered slot ranges
//! - The node report into a roster keyed by host
//! - Info reports into a flat property bag

pub mod props;
pub mod roster;
pub mod slots;

pub use props::{build_stats, parse_properties};
pub use roster::{parse_roster, MIN_ROSTER_TOKENS};
pub use slots::{from_resp, parse_slot_ranges, RawSlotRange};
