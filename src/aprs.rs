//! Dispatch over the information field of a UI frame.
//!
//! Ported from the `aprs::parse` selector-byte switch in the original
//! mobilinkd sources, as a closed enum instead of a `std::list<boost::any>`.
//! The original's dispatch has no default case for an unrecognized
//! selector byte, which is undefined behavior in C++; [`DataItem::Unknown`]
//! is the well-defined replacement.
//!
//! Only the timestamp-bearing position report is actually parsed, matching
//! the original: `getCurrentMicE`, `getOldMicE`, `getPositionWithoutTimestamp`,
//! `getObject` and `getRawGPS` are stubs in the source that consume the
//! whole remaining info field without interpreting it, and are kept here as
//! stub variants rather than silently dropped.

use serde::{Deserialize, Serialize};

/// A parsed APRS timestamp.
///
/// The original only reads hour and minute out of the `z`/local forms
/// (the leading day-of-month digits are discarded), and reads full
/// hour:minute:second out of the `h` form. That asymmetry is preserved
/// here rather than "fixed", since this module exists to expose what the
/// frame said, not to second-guess the original parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timestamp {
    Utc { hour: u8, minute: u8, second: u8 },
    Local { hour: u8, minute: u8 },
}

fn two_digits(b: &[u8]) -> Option<u8> {
    if b.len() != 2 || !b.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some((b[0] - b'0') * 10 + (b[1] - b'0'))
}

/// Parse the 7-byte timestamp field (6 digits + a format byte) starting
/// at `info[0]`. Returns the timestamp and the number of bytes consumed.
fn parse_timestamp(info: &[u8]) -> Option<(Timestamp, usize)> {
    if info.len() < 7 {
        return None;
    }
    match info[6] {
        b'h' => {
            let hour = two_digits(&info[0..2])?;
            let minute = two_digits(&info[2..4])?;
            let second = two_digits(&info[4..6])?;
            Some((Timestamp::Utc { hour, minute, second }, 7))
        }
        b'z' => {
            let hour = two_digits(&info[2..4])?;
            let minute = two_digits(&info[4..6])?;
            Some((Timestamp::Utc { hour, minute, second: 0 }, 7))
        }
        _ => {
            let hour = two_digits(&info[2..4])?;
            let minute = two_digits(&info[4..6])?;
            Some((Timestamp::Local { hour, minute }, 7))
        }
    }
}

/// A single decoded entry from the information field of a UI frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataItem {
    /// `@` or `/`: a position report with a leading timestamp. `rest` is
    /// the (unparsed) position data following the timestamp field.
    PositionWithTimestamp { timestamp: Timestamp, rest: Vec<u8> },
    /// `!` or `=`: a position report with no timestamp. Position parsing
    /// itself is out of scope here, matching the original's stub.
    PositionWithoutTimestamp { rest: Vec<u8> },
    /// `;`: an object report. Stub, as in the original.
    Object { rest: Vec<u8> },
    /// `0x1c` or `` ` ``: current-generation Mic-E. Stub, as in the original.
    MicECurrent { rest: Vec<u8> },
    /// `0x1d` or `'`: older Mic-E. Stub, as in the original.
    MicEOld { rest: Vec<u8> },
    /// `$`: a raw NMEA sentence. Stub, as in the original.
    RawGps { rest: Vec<u8> },
    /// Anything else, an empty info field, or a timestamp field too short
    /// to read. Not an error: a well-defined catch-all where the original
    /// had an unhandled `switch` case.
    Unknown { selector: Option<u8>, rest: Vec<u8> },
}

/// Dispatch a single information field to the matching [`DataItem`].
///
/// This mirrors `aprs::parse(info, pos, result)` from the original for a
/// single entry; it does not loop over multiple data items the way the
/// original's frame-level `parse` does, since only one tagged value per
/// `Record` is in scope here.
#[must_use]
pub fn parse_info(info: &[u8]) -> DataItem {
    let Some((&selector, rest)) = info.split_first() else {
        return DataItem::Unknown { selector: None, rest: Vec::new() };
    };
    match selector {
        b'@' | b'/' => match parse_timestamp(rest) {
            Some((timestamp, consumed)) => DataItem::PositionWithTimestamp {
                timestamp,
                rest: rest[consumed..].to_vec(),
            },
            None => DataItem::Unknown { selector: Some(selector), rest: rest.to_vec() },
        },
        b'!' | b'=' => DataItem::PositionWithoutTimestamp { rest: rest.to_vec() },
        b';' => DataItem::Object { rest: rest.to_vec() },
        0x1c | b'`' => DataItem::MicECurrent { rest: rest.to_vec() },
        0x1d | b'\'' => DataItem::MicEOld { rest: rest.to_vec() },
        b'$' => DataItem::RawGps { rest: rest.to_vec() },
        other => DataItem::Unknown { selector: Some(other), rest: rest.to_vec() },
    }
}
