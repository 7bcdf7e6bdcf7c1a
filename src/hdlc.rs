//! The HDLC bit-stream framer: flag detection, bit-destuffing, frame
//! boundary recognition, abort handling, and watchdog-driven
//! resynchronization (spec.md §4.4–§4.6).
//!
//! Ported from the three-state machine (`SEARCH`/`HUNT`/`FRAMING`) in
//! the original's `hdlc_state_machine`, generalized from a GNU Radio
//! block into a standalone facade, in the teacher's lower-level idiom:
//! `log` macros at the same granularity as `HdlcDeframer`, a `Drop` impl
//! reporting lifetime counters, and the same FCSTAB-driven CRC.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, trace};

use crate::error::{Ax25Error, Result};
use crate::frame::{self, DecodeError, Record};

const MAX_FRAME_BYTES: usize = 330;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Search,
    Hunt,
    Framing,
}

struct Shared {
    state: State,
    deadline: Option<Instant>,
    stop: bool,
}

/// Runtime configuration for [`HdlcFramer`] (spec.md §4.9).
#[derive(Debug, Clone, Copy)]
pub struct FramerConfig {
    /// When `true`, CRC-invalid frames are surfaced as `Record { valid:
    /// false, .. }` instead of being discarded, and non-printable
    /// callsign characters are rendered as `?` instead of rejecting the
    /// address outright.
    pub permissive: bool,
    /// How long the state machine may sit in HUNT or FRAMING without
    /// reaching a frame boundary before it is forced back to SEARCH.
    pub watchdog_timeout: Duration,
}

impl Default for FramerConfig {
    fn default() -> Self {
        FramerConfig { permissive: false, watchdog_timeout: Duration::from_secs(2) }
    }
}

fn spawn_watchdog(shared: Arc<(Mutex<Shared>, Condvar)>) -> JoinHandle<()> {
    thread::spawn(move || {
        let (mutex, condvar) = &*shared;
        let mut guard = mutex.lock().unwrap();
        loop {
            if guard.stop {
                return;
            }
            match guard.deadline {
                None => {
                    guard = condvar.wait(guard).unwrap();
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        if guard.state != State::Search {
                            trace!("hdlc watchdog: timeout expired, forcing SEARCH");
                            guard.state = State::Search;
                        }
                        guard.deadline = None;
                    } else {
                        guard = condvar.wait_timeout(guard, deadline - now).unwrap().0;
                    }
                }
            }
        }
    })
}

/// The HDLC bit-stream framer facade (spec.md §4.6).
///
/// `shift`, `bit_count`, `ones_run` and `frame_bytes` are touched only
/// by [`push`](Self::push), which is expected to be called from a
/// single producer thread; they carry no synchronization. `state` is
/// shared with a background watchdog thread and lives behind a mutex
/// (spec.md §5).
pub struct HdlcFramer {
    shift: u16,
    bit_count: u8,
    ones_run: u8,
    frame_bytes: Vec<u8>,
    local_state: State,
    shared: Arc<(Mutex<Shared>, Condvar)>,
    watchdog: Option<JoinHandle<()>>,
    config: FramerConfig,
    ready: VecDeque<Record>,
    decoded: usize,
    discarded_short: usize,
    discarded_malformed: usize,
    discarded_crc: usize,
    watchdog_resets: usize,
}

impl fmt::Debug for HdlcFramer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HdlcFramer")
            .field("config", &self.config)
            .field("decoded", &self.decoded)
            .field("pending", &self.ready.len())
            .finish()
    }
}

impl HdlcFramer {
    #[must_use]
    pub fn new(config: FramerConfig) -> Self {
        let shared =
            Arc::new((Mutex::new(Shared { state: State::Search, deadline: None, stop: false }), Condvar::new()));
        let watchdog = spawn_watchdog(Arc::clone(&shared));
        HdlcFramer {
            shift: 0,
            bit_count: 0,
            ones_run: 0,
            frame_bytes: Vec::new(),
            local_state: State::Search,
            shared,
            watchdog: Some(watchdog),
            config,
            ready: VecDeque::new(),
            decoded: 0,
            discarded_short: 0,
            discarded_malformed: 0,
            discarded_crc: 0,
            watchdog_resets: 0,
        }
    }

    /// Reconfigure permissiveness and watchdog timeout (spec.md §4.6
    /// `configure`). Takes effect on the next state transition.
    ///
    /// # Errors
    ///
    /// Returns [`Ax25Error::InvalidTimeout`] if `timeout` is zero, since the
    /// watchdog could never expire and SEARCH/HUNT/FRAMING could stall
    /// forever on silent input.
    pub fn configure(&mut self, permissive: bool, timeout: Duration) -> Result<()> {
        if timeout.is_zero() {
            return Err(Ax25Error::InvalidTimeout);
        }
        self.config.permissive = permissive;
        self.config.watchdog_timeout = timeout;
        Ok(())
    }

    fn state(&self) -> State {
        self.shared.0.lock().unwrap().state
    }

    fn set_state(&mut self, state: State) {
        let (mutex, condvar) = &*self.shared;
        {
            let mut shared = mutex.lock().unwrap();
            shared.state = state;
            shared.deadline = match state {
                State::Hunt | State::Framing => Some(Instant::now() + self.config.watchdog_timeout),
                State::Search => None,
            };
        }
        condvar.notify_all();
    }

    fn add_bit(&mut self, bit: u8) {
        self.shift = (self.shift >> 1) | (u16::from(bit) << 15);
        // Capped rather than incremented unconditionally: SEARCH/HUNT
        // never reset bit_count on their own transitions, and FRAMING's
        // run-of-ones handling can go two bits deep without an
        // intervening extraction check, so this is the one place that
        // must hold spec.md §8's "0 <= bit_count <= 16" invariant
        // regardless of which state or branch is doing the shifting.
        self.bit_count = (self.bit_count + 1).min(16);
    }

    fn enter_search(&mut self) {
        trace!("hdlc: -> SEARCH");
        self.set_state(State::Search);
    }

    fn enter_hunt(&mut self) {
        trace!("hdlc: -> HUNT");
        self.shift = 0;
        self.bit_count = 0;
        self.set_state(State::Hunt);
    }

    fn salvage_hunt(&mut self) {
        trace!("hdlc: salvaging alignment -> HUNT");
        self.bit_count -= 8;
        self.set_state(State::Hunt);
    }

    fn enter_framing(&mut self) {
        trace!("hdlc: -> FRAMING");
        self.shift &= 0xff00;
        self.bit_count = 8;
        self.ones_run = 0;
        self.frame_bytes.clear();
        self.set_state(State::Framing);
    }

    fn do_search(&mut self, bit: u8) {
        self.add_bit(bit);
        if (self.shift >> 8) as u8 == 0x7e {
            debug!("hdlc: flag found in SEARCH");
            self.enter_hunt();
        }
    }

    fn do_hunt(&mut self, bit: u8) {
        self.add_bit(bit);
        if self.bit_count != 8 {
            return;
        }
        let byte = (self.shift >> 8) as u8;
        match byte {
            0x7e => {
                trace!("hdlc: back-to-back flag in HUNT");
                self.enter_hunt();
            }
            0xff | 0xfe | 0x7f => {
                debug!("hdlc: bogon byte {byte:#04x} in HUNT, back to SEARCH");
                self.enter_search();
            }
            _ => {
                trace!("hdlc: frame start byte {byte:#04x}");
                self.enter_framing();
            }
        }
    }

    fn do_framing(&mut self, bit: u8) {
        self.add_bit(bit);

        if self.ones_run < 5 {
            self.ones_run = if bit == 1 { self.ones_run + 1 } else { 0 };

            if self.bit_count == 16 {
                let byte = (self.shift & 0xff) as u8;
                self.frame_bytes.push(byte);
                self.shift &= 0xff00;
                self.bit_count -= 8;

                if (self.shift >> 8) as u8 == 0x7e {
                    if self.frame_bytes.len() > frame::MIN_FRAME_LEN {
                        self.complete_frame();
                    } else {
                        trace!("hdlc: flag seen but frame too short, aborting attempt");
                    }
                    self.enter_hunt();
                } else if self.frame_bytes.len() > MAX_FRAME_BYTES {
                    debug!("hdlc: frame exceeded {MAX_FRAME_BYTES} bytes, runaway, back to SEARCH");
                    self.enter_search();
                }
            }
            return;
        }

        if self.ones_run == 5 {
            // This bit immediately follows a run of five consecutive
            // ones: either the zero the sender stuffed in, or the sixth
            // one of a flag/abort pattern. A `1` here doesn't yet tell
            // us which -- that needs the bit after this one as well --
            // so just advance ones_run and defer the decision.
            if bit == 0 {
                trace!("hdlc: discarding stuffed zero");
                let high = self.shift & 0xff00;
                let low7 = (self.shift & 0x7f) << 1;
                self.shift = high | low7;
                self.bit_count -= 1;
                self.ones_run = 0;
            } else {
                self.ones_run = 6;
            }
            return;
        }

        // ones_run == 6: last call shifted in a sixth consecutive one.
        // This bit resolves it. A zero makes the last 8 bits shifted in a
        // complete flag, which the bit_count-independent top-byte test
        // (the same one SEARCH/HUNT use for "most-recently-received 8
        // bits") recognizes; that can never also be true for a seventh
        // consecutive one, since the newest bit would be 1 rather than
        // the flag's trailing 0, so both outcomes fall through to the
        // same framing-error handling below without needing to special-
        // case the abort bit first.
        self.ones_run = 0;
        if bit == 1 {
            debug!("hdlc: seventh consecutive one, checking for a salvageable flag");
        }

        if (self.shift >> 8) as u8 == 0x7e {
            debug!("hdlc: end flag recognized after a run of ones");
            self.complete_frame();
            self.enter_hunt();
            return;
        }

        // Framing error: the run of ones wasn't a clean end flag. If a
        // flag byte still sits somewhere in the valid bits, salvage
        // alignment into HUNT instead of discarding everything.
        let window = ((self.shift >> (16 - self.bit_count)) & 0xff) as u8;
        if window == 0x7e {
            self.salvage_hunt();
        } else {
            debug!("hdlc: framing error with no recognizable flag, back to SEARCH");
            self.enter_search();
        }
    }

    fn complete_frame(&mut self) {
        match frame::decode(&self.frame_bytes, !self.config.permissive) {
            Ok(record) if record.valid => {
                debug!("hdlc: frame decoded: {} -> {}", record.source, record.destination);
                self.decoded += 1;
                self.ready.push_back(record);
            }
            Ok(record) => {
                self.discarded_crc += 1;
                if self.config.permissive {
                    debug!("hdlc: CRC mismatch, surfacing as invalid (permissive mode)");
                    self.ready.push_back(record);
                } else {
                    debug!("hdlc: CRC mismatch, discarding");
                }
            }
            Err(DecodeError::TooShort) => {
                self.discarded_short += 1;
                trace!("hdlc: candidate frame too short, discarding");
            }
            Err(_) => {
                self.discarded_malformed += 1;
                trace!("hdlc: malformed address field, discarding");
            }
        }
    }

    /// Push one bit (0 or 1 in the low bit; higher bits are masked off).
    /// Returns whether a decoded frame is now waiting in [`take`](Self::take).
    pub fn push(&mut self, bit: u8) -> bool {
        let bit = bit & 1;
        let current = self.state();
        if current == State::Search && self.local_state != State::Search {
            self.watchdog_resets += 1;
            debug!("hdlc: watchdog forced resync to SEARCH");
        }
        self.local_state = current;
        match current {
            State::Search => self.do_search(bit),
            State::Hunt => self.do_hunt(bit),
            State::Framing => self.do_framing(bit),
        }
        self.local_state = self.state();
        self.ready()
    }

    /// Whether a decoded frame is waiting.
    #[must_use]
    pub fn ready(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Retrieve and clear the oldest pending record, if any.
    pub fn take(&mut self) -> Option<Record> {
        self.ready.pop_front()
    }
}

impl Drop for HdlcFramer {
    fn drop(&mut self) {
        info!(
            "HdlcFramer: decoded {} ({} short, {} malformed, {} bad crc, {} watchdog resets)",
            self.decoded, self.discarded_short, self.discarded_malformed, self.discarded_crc, self.watchdog_resets
        );
        {
            let mut shared = self.shared.0.lock().unwrap();
            shared.stop = true;
        }
        self.shared.1.notify_all();
        if let Some(handle) = self.watchdog.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc;

    fn bits_lsb_first(byte: u8) -> [u8; 8] {
        std::array::from_fn(|i| (byte >> i) & 1)
    }

    fn stuff(bytes: &[u8]) -> Vec<u8> {
        let mut bits = Vec::new();
        let mut ones_run = 0u8;
        for &byte in bytes {
            for bit in bits_lsb_first(byte) {
                bits.push(bit);
                if bit == 1 {
                    ones_run += 1;
                    if ones_run == 5 {
                        bits.push(0);
                        ones_run = 0;
                    }
                } else {
                    ones_run = 0;
                }
            }
        }
        bits
    }

    fn flag_bits() -> [u8; 8] {
        bits_lsb_first(0x7e)
    }

    fn encode_stream(frame_bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&flag_bits());
        out.extend(stuff(frame_bytes));
        out.extend_from_slice(&flag_bits());
        out
    }

    fn shift_left_address(callsign: &[u8; 6], ssid: u8, last: bool) -> [u8; 7] {
        let mut out = [0u8; 7];
        for (i, &b) in callsign.iter().enumerate() {
            out[i] = b << 1;
        }
        out[6] = (ssid << 1) | u8::from(last);
        out
    }

    fn s1_payload() -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&shift_left_address(b"APRS  ", 0, false));
        payload.extend_from_slice(&shift_left_address(b"N0CALL", 0, true));
        payload.push(0x03);
        payload.push(0xf0);
        payload.extend_from_slice(b"Test");
        payload
    }

    fn s1_frame() -> Vec<u8> {
        let payload = s1_payload();
        let mut frame = payload.clone();
        frame.extend_from_slice(&crc::encode_trailer(&payload));
        frame
    }

    fn push_all(framer: &mut HdlcFramer, bits: &[u8]) -> Vec<Record> {
        let mut records = Vec::new();
        for &bit in bits {
            if framer.push(bit) {
                while let Some(record) = framer.take() {
                    records.push(record);
                }
            }
        }
        records
    }

    #[test]
    fn s1_minimal_valid_ui_frame() {
        let mut framer = HdlcFramer::new(FramerConfig::default());
        let records = push_all(&mut framer, &encode_stream(&s1_frame()));
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.destination.to_string(), "APRS");
        assert_eq!(record.source.to_string(), "N0CALL");
        assert!(record.repeaters.is_empty());
        assert_eq!(record.pid, Some(0xf0));
        assert_eq!(record.info, b"Test");
        assert!(record.valid);
    }

    #[test]
    fn closing_flag_decodes_regardless_of_byte_alignment() {
        // Varying the info length walks the closing flag through every
        // possible bit-count phase relative to the frame start, so this
        // is not tied to one lucky byte-aligned case.
        for info_len in 0..24 {
            let mut payload = Vec::new();
            payload.extend_from_slice(&shift_left_address(b"APRS  ", 0, false));
            payload.extend_from_slice(&shift_left_address(b"N0CALL", 0, true));
            payload.push(0x03);
            payload.push(0xf0);
            let info: Vec<u8> = (0..info_len).map(|i| (b'a' + (i % 26) as u8)).collect();
            payload.extend_from_slice(&info);
            let mut frame = payload.clone();
            frame.extend_from_slice(&crc::encode_trailer(&payload));

            let mut framer = HdlcFramer::new(FramerConfig::default());
            let records = push_all(&mut framer, &encode_stream(&frame));
            assert_eq!(records.len(), 1, "info_len={info_len}");
            assert!(records[0].valid, "info_len={info_len}");
            assert_eq!(records[0].info, info, "info_len={info_len}");
        }
    }

    #[test]
    fn s2_two_digipeaters() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&shift_left_address(b"APRS  ", 0, false));
        payload.extend_from_slice(&shift_left_address(b"N0CALL", 0, false));
        payload.extend_from_slice(&shift_left_address(b"WIDE1 ", 1, false));
        payload.extend_from_slice(&shift_left_address(b"WIDE2 ", 1, true));
        payload.push(0x03);
        payload.push(0xf0);
        payload.extend_from_slice(b"Test");
        let mut frame = payload.clone();
        frame.extend_from_slice(&crc::encode_trailer(&payload));

        let mut framer = HdlcFramer::new(FramerConfig::default());
        let records = push_all(&mut framer, &encode_stream(&frame));
        assert_eq!(records.len(), 1);
        let repeaters: Vec<String> = records[0].repeaters.iter().map(ToString::to_string).collect();
        assert_eq!(repeaters, vec!["WIDE1-1", "WIDE2-1"]);
    }

    #[test]
    fn s3_abort_mid_frame_then_valid_frame_follows() {
        let mut bits = vec![1u8; 0];
        bits.extend_from_slice(&flag_bits());
        let stuffed = stuff(&s1_frame());
        bits.extend_from_slice(&stuffed[..40.min(stuffed.len())]);
        bits.extend(std::iter::repeat_n(1u8, 7));
        bits.extend(encode_stream(&s1_frame()));

        let mut framer = HdlcFramer::new(FramerConfig::default());
        let records = push_all(&mut framer, &bits);
        assert_eq!(records.len(), 1);
        assert!(records[0].valid);
    }

    #[test]
    fn s4_back_to_back_flags_tolerated() {
        let mut bits = Vec::new();
        for _ in 0..5 {
            bits.extend_from_slice(&flag_bits());
        }
        bits.extend(encode_stream(&s1_frame()));

        let mut framer = HdlcFramer::new(FramerConfig::default());
        let records = push_all(&mut framer, &bits);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn s5_corrupted_crc_permissive_vs_strict() {
        let mut frame = s1_frame();
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        let bits = encode_stream(&frame);

        let mut permissive = HdlcFramer::new(FramerConfig { permissive: true, ..FramerConfig::default() });
        let records = push_all(&mut permissive, &bits);
        assert_eq!(records.len(), 1);
        assert!(!records[0].valid);

        let mut strict = HdlcFramer::new(FramerConfig::default());
        let records = push_all(&mut strict, &bits);
        assert!(records.is_empty());
    }

    #[test]
    fn s6_oversize_runaway_returns_to_search_without_emission() {
        let mut bits = Vec::new();
        bits.extend_from_slice(&flag_bits());
        // A run of alternating bits never spells a flag or an abort and
        // never completes a frame; it just grows frame_bytes until the
        // runaway bound trips.
        for i in 0..(MAX_FRAME_BYTES + 10) * 8 {
            bits.push((i % 2) as u8);
        }
        bits.extend_from_slice(&flag_bits());

        let mut framer = HdlcFramer::new(FramerConfig::default());
        let records = push_all(&mut framer, &bits);
        assert!(records.is_empty());
        assert_eq!(framer.state(), State::Search);
    }

    #[test]
    fn salvage_resyncs_to_hunt_on_misaligned_flag() {
        // Enter FRAMING on a non-flag start byte, take two harmless
        // zero bits, then a run of seven ones. That's neither a clean
        // end flag (the newest bit is 1, not the flag's trailing 0) nor
        // an abort that gives up outright: the still-valid bits happen
        // to contain a flag byte at a different alignment, so framing
        // should recover into HUNT rather than fall back to SEARCH.
        let mut framer = HdlcFramer::new(FramerConfig::default());
        let mut bits = Vec::new();
        bits.extend_from_slice(&flag_bits());
        bits.extend_from_slice(&bits_lsb_first(0xfc));
        bits.extend_from_slice(&[0, 0]);
        bits.extend(std::iter::repeat_n(1u8, 7));
        push_all(&mut framer, &bits);
        assert_eq!(framer.state(), State::Hunt);
        assert!(framer.bit_count <= 16);
    }

    #[test]
    fn framing_error_with_no_flag_returns_to_search() {
        // Same shape of framing error, but this time nothing in the
        // valid bits spells a flag at any alignment, so there is
        // nothing to salvage and framing must give up to SEARCH.
        let mut framer = HdlcFramer::new(FramerConfig::default());
        let mut bits = Vec::new();
        bits.extend_from_slice(&flag_bits());
        bits.extend_from_slice(&bits_lsb_first(0x80));
        bits.extend_from_slice(&[1, 1, 1, 1, 1, 1, 0]);
        push_all(&mut framer, &bits);
        assert_eq!(framer.state(), State::Search);
        assert!(framer.bit_count <= 16);
    }

    #[test]
    fn configure_rejects_zero_timeout() {
        let mut framer = HdlcFramer::new(FramerConfig::default());
        assert!(matches!(framer.configure(true, Duration::ZERO), Err(Ax25Error::InvalidTimeout)));
        assert!(framer.configure(true, Duration::from_millis(50)).is_ok());
        assert!(framer.config.permissive);
    }

    #[test]
    fn bit_count_always_in_bounds() {
        let mut framer = HdlcFramer::new(FramerConfig::default());
        let bits = encode_stream(&s1_frame());
        for &bit in &bits {
            framer.push(bit);
            assert!(framer.bit_count <= 16);
        }
    }

    #[test]
    fn watchdog_resets_to_search_after_timeout() {
        let mut framer =
            HdlcFramer::new(FramerConfig { permissive: false, watchdog_timeout: Duration::from_millis(20) });
        for &bit in &flag_bits() {
            framer.push(bit);
        }
        assert_eq!(framer.state(), State::Hunt);
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(framer.state(), State::Search);
    }
}
