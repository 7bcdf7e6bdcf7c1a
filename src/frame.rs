//! AX.25 frame decoding: address field walk, control/PID/info
//! classification, CRC validation (spec.md §3 "AX.25 Frame Record", §4.2,
//! §4.3).

use std::fmt;

use crate::address::{self, Address};
use crate::crc;

/// Minimum legal frame length: 2x7 address + 1 control + 0 info + 2 FCS.
pub const MIN_FRAME_LEN: usize = 17;

/// Classification of a frame by its control field's low two bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Kind {
    /// `ctrl & 0x03` is `00` or `10`.
    Information,
    /// `ctrl & 0x03` is `01`.
    Supervisory,
    /// `ctrl & 0x03` is `11`; carries a PID byte.
    Unnumbered,
    /// Unreachable for a well-formed two-bit classification; kept for
    /// completeness rather than panicking on an impossible control byte.
    Undefined,
}

impl Kind {
    fn from_control(ctrl: u8) -> Self {
        match ctrl & 0x03 {
            0b00 | 0b10 => Kind::Information,
            0b01 => Kind::Supervisory,
            0b11 => Kind::Unnumbered,
            _ => Kind::Undefined,
        }
    }
}

/// A fully decoded AX.25 frame.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Record {
    /// Destination station address.
    pub destination: Address,
    /// Source station address.
    pub source: Address,
    /// Digipeater path, in transmission order.
    pub repeaters: Vec<Address>,
    /// Frame type, classified from the low two bits of `control_byte`.
    pub kind: Kind,
    /// Raw control field as it appeared on the wire.
    pub control_byte: u8,
    /// Protocol ID, present only for `Kind::Unnumbered` frames.
    pub pid: Option<u8>,
    /// Payload bytes; non-printable bytes are preserved as-is.
    pub info: Vec<u8>,
    /// The 16-bit FCS as transmitted, decoded per spec.md §4.1.
    pub received_fcs: u16,
    /// The FCS this decoder computed over the frame payload.
    pub computed_crc: u16,
    /// `received_fcs == computed_crc`.
    pub valid: bool,
}

/// Reasons a candidate frame fails to become a [`Record`] before any CRC
/// check is even possible. These never surface past the framer (spec.md
/// §7): they're recovered invisibly, matching `ShortFrame` and
/// `MalformedAddress` in the error taxonomy.
#[derive(Debug)]
pub(crate) enum DecodeError {
    TooShort,
    AddressRunsPastFrame,
    NonPrintableAddress,
}

fn take_address(bytes: &[u8], strict: bool) -> Result<(address::DecodedAddress, &[u8]), DecodeError> {
    if bytes.len() < 7 {
        return Err(DecodeError::AddressRunsPastFrame);
    }
    let mut raw = [0u8; 7];
    raw.copy_from_slice(&bytes[..7]);
    let decoded = address::decode(&raw, !strict);
    if strict && decoded.address.callsign.bytes().any(|b| !(0x20..0x7f).contains(&b)) {
        return Err(DecodeError::NonPrintableAddress);
    }
    Ok((decoded, &bytes[7..]))
}

/// Decode a complete candidate frame (as handed over by the HDLC framer,
/// with its trailing 2-byte FCS still attached) into a [`Record`].
///
/// `strict` controls address-decoding leniency (spec.md §4.2 step 5);
/// it does not affect whether CRC mismatches are surfaced — that's the
/// caller's job (spec.md §4.5), since the caller also knows whether
/// permissive mode is on.
pub(crate) fn decode(bytes: &[u8], strict: bool) -> Result<Record, DecodeError> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(DecodeError::TooShort);
    }

    let (destination, rest) = take_address(bytes, strict)?;
    let (source, mut rest) = take_address(rest, strict)?;

    let mut repeaters = Vec::new();
    let mut last = source.is_last;
    while !last {
        let (repeater, remainder) = take_address(rest, strict)?;
        last = repeater.is_last;
        repeaters.push(repeater.address);
        rest = remainder;
    }

    if rest.len() < 1 + 2 {
        return Err(DecodeError::TooShort);
    }
    let control_byte = rest[0];
    let kind = Kind::from_control(control_byte);
    rest = &rest[1..];

    let pid = if kind == Kind::Unnumbered {
        if rest.len() < 1 + 2 {
            return Err(DecodeError::TooShort);
        }
        let pid = rest[0];
        rest = &rest[1..];
        Some(pid)
    } else {
        None
    };

    if rest.len() < 2 {
        return Err(DecodeError::TooShort);
    }
    let info_len = rest.len() - 2;
    let info = rest[..info_len].to_vec();

    let payload = &bytes[..bytes.len() - 2];
    let computed_crc = crc::compute(payload);
    let received_fcs = crc::received_fcs(bytes);
    let valid = received_fcs == computed_crc;

    Ok(Record {
        destination: destination.address,
        source: source.address,
        repeaters,
        kind,
        control_byte,
        pid,
        info,
        received_fcs,
        computed_crc,
        valid,
    })
}

fn fmt_info(info: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for &b in info {
        if (0x20..0x7f).contains(&b) {
            write!(f, "{}", b as char)?;
        } else {
            write!(f, "0x{b:02X} ")?;
        }
    }
    Ok(())
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dest: {}", self.destination)?;
        writeln!(f, "Source: {}", self.source)?;
        if !self.repeaters.is_empty() {
            write!(f, "Via:")?;
            for repeater in &self.repeaters {
                write!(f, " {repeater}")?;
            }
            writeln!(f)?;
        }
        match self.pid {
            Some(pid) => writeln!(f, "PID: 0x{pid:02X}")?,
            None => writeln!(f, "PID: none")?,
        }
        writeln!(f, "Info:")?;
        fmt_info(&self.info, f)?;
        writeln!(f)?;
        writeln!(f, "FCS: {}", self.received_fcs)?;
        writeln!(f, "CRC: {}", self.computed_crc)?;
        Ok(())
    }
}
