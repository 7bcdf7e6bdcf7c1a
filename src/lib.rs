#![warn(missing_docs)]
/*! This crate decodes AFSK1200/AX.25 link-layer traffic, the kind used
by amateur packet radio and APRS.

It picks up one layer above a demodulator: feed it demodulated bits one
at a time, and it recovers HDLC-framed, CRC-checked AX.25 frames.

# Architecture overview

A handful of small, single-purpose modules, in dependency order:

```text
     [ crc: FCS compute/check ]     [ address: callsign/SSID decode ]
                   \                          /
                    [ frame: Record assembly ]
                                |
                 [ hdlc: bit-level state machine ]
                                |
                      HdlcFramer (the facade)
```

[`hdlc::HdlcFramer`] is the facade most callers want: push bits into
it, and drain [`frame::Record`]s out.

```
use ax25hdlc::hdlc::{FramerConfig, HdlcFramer};

let mut framer = HdlcFramer::new(FramerConfig::default());
for bit in [0u8, 1, 1, 1, 1, 1, 1, 0] {
    framer.push(bit);
}
assert!(!framer.ready());
```

[`aprs::parse_info`] is a small extra: once a [`frame::Record`]'s info
field looks like an APRS position report, it classifies the leading
selector byte and timestamp without attempting to parse positions,
Mic-E, or object reports.

This crate does not demodulate audio or deliver frames anywhere; that's
the job of a DSP front end and a downstream consumer respectively.

## Links

* The HDLC/CRC code here is adapted from the AFSK1200 deframer in
  <https://github.com/ThomasHabets/rustradio>
*/

pub mod address;
pub mod aprs;
pub mod crc;
pub mod error;
pub mod frame;
pub mod hdlc;

pub use address::Address;
pub use error::{Ax25Error, Result};
pub use frame::{Kind, Record};
pub use hdlc::{FramerConfig, HdlcFramer};
