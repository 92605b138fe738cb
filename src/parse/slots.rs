//! Slot ownership report parsing.

use crate::error::QueryError;
use crate::resp::RespValue;
use crate::types::{NodeRef, SlotRange};

const COMMAND: &str = "CLUSTER SLOTS";

/// One entry of the slot report before it becomes a [`SlotRange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSlotRange {
    pub start: u16,
    pub end: u16,
    pub owners: Vec<(String, u16)>,
}

/// Extracts `(start, end, [(host, port)..])` tuples from the slot report.
///
/// Fields after host and port (node id, hostname metadata) are ignored.
pub fn from_resp(reply: &RespValue) -> Result<Vec<RawSlotRange>, QueryError> {
    let entries = reply
        .as_array()
        .ok_or_else(|| QueryError::malformed(COMMAND, "reply is not an array"))?;

    entries
        .iter()
        .map(|entry| {
            let fields = entry
                .as_array()
                .ok_or_else(|| QueryError::malformed(COMMAND, "entry is not an array"))?;
            if fields.len() < 2 {
                return Err(QueryError::malformed(COMMAND, "entry lacks start/end"));
            }
            let start = slot_number(&fields[0])?;
            let end = slot_number(&fields[1])?;
            if start > end {
                return Err(QueryError::malformed(
                    COMMAND,
                    format!("range {}-{} is inverted", start, end),
                ));
            }

            let owners = fields[2..]
                .iter()
                .map(owner)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(RawSlotRange { start, end, owners })
        })
        .collect()
}

fn slot_number(value: &RespValue) -> Result<u16, QueryError> {
    value
        .as_integer()
        .and_then(|n| u16::try_from(n).ok())
        .ok_or_else(|| QueryError::malformed(COMMAND, format!("bad slot number {:?}", value)))
}

fn owner(value: &RespValue) -> Result<(String, u16), QueryError> {
    let fields = value
        .as_array()
        .filter(|fields| fields.len() >= 2)
        .ok_or_else(|| QueryError::malformed(COMMAND, "owner lacks host/port"))?;
    let host = fields[0]
        .as_text()
        .ok_or_else(|| QueryError::malformed(COMMAND, "owner host is not a string"))?;
    let port = fields[1]
        .as_integer()
        .and_then(|p| u16::try_from(p).ok())
        .ok_or_else(|| QueryError::malformed(COMMAND, "owner port is not a port number"))?;
    Ok((host, port))
}

/// Turns raw tuples into slot ranges ordered by start slot.
///
/// The sort is stable so equal starts keep report order. Gaps, overlaps and
/// duplicates are kept as reported.
pub fn parse_slot_ranges(raw: Vec<RawSlotRange>) -> Vec<SlotRange> {
    let mut ranges: Vec<SlotRange> = raw
        .into_iter()
        .map(|r| SlotRange {
            start: r.start,
            end: r.end,
            owners: r
                .owners
                .iter()
                .map(|(host, port)| NodeRef::new(host, *port))
                .collect(),
        })
        .collect();
    ranges.sort_by_key(|r| r.start);
    ranges
}
