//! AX.25 address field decoding (spec.md §4.2 / `ax25_frame.h`'s
//! `fixup_address`/`getSSID`/`removeAddressExtensionBit`).

use std::fmt;

/// A decoded station address: callsign plus SSID.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Address {
    /// Up to 6 characters, trimmed of trailing padding.
    pub callsign: String,
    /// Secondary Station Identifier, 0-15.
    pub ssid: u8,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid == 0 {
            write!(f, "{}", self.callsign)
        } else {
            write!(f, "{}-{}", self.callsign, self.ssid)
        }
    }
}

/// Result of decoding a single 7-byte address field.
pub(crate) struct DecodedAddress {
    pub address: Address,
    /// `true` if this was the last address in the address field (bit 0
    /// of the raw seventh byte was set).
    pub is_last: bool,
}

/// Decode one 7-byte address field per spec.md §4.2.
///
/// `raw` must be exactly 7 bytes. `permissive` controls whether
/// non-printable callsign characters are replaced with `?` (permissive)
/// or left intact (strict, where the CRC check is authoritative).
pub(crate) fn decode(raw: &[u8; 7], permissive: bool) -> DecodedAddress {
    let is_last = (raw[6] & 0x01) == 1;

    let mut shifted = [0u8; 7];
    for (dst, src) in shifted.iter_mut().zip(raw.iter()) {
        *dst = src >> 1;
    }

    let ssid = shifted[6] & 0x0f;

    let trimmed_len = shifted[..6].iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    let chars = &shifted[..trimmed_len];
    let callsign: String = chars
        .iter()
        .map(|&b| {
            if permissive && !(0x20..0x7f).contains(&b) {
                '?'
            } else {
                b as char
            }
        })
        .collect();

    DecodedAddress { address: Address { callsign, ssid }, is_last }
}
