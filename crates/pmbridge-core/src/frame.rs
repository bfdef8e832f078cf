//! PM1006 frame grammar and the byte-at-a-time parser/relay state machine
//!
//! A particulate frame on the sensor link looks like:
//!
//! ```text
//! 0x16 0x11 0x0B DF1 DF2 DF3 DF4 ... DF16 CS
//! head len  cmd  \______ 17 bytes counted by `len` ______/
//! ```
//!
//! `DF3`/`DF4` carry the particulate count (big-endian). The parser never
//! buffers a frame: every byte is classified, possibly rewritten, and handed
//! back for relaying immediately. The last counted byte is replaced with a
//! freshly computed checksum so rewritten frames stay valid.

use crate::control::ControlValue;

/// Frame start marker.
pub const HEADER: u8 = 0x16;
/// The only accepted length byte (17 counted bytes after the command).
pub const LENGTH: u8 = 0x11;
/// Particulate reading command.
pub const COMMAND_PARTICLES: u8 = 0x0B;

/// 1-indexed data position of the high byte of the reading.
pub const VALUE_HIGH_POSITION: u8 = 3;
/// 1-indexed data position of the low byte of the reading.
pub const VALUE_LOW_POSITION: u8 = 4;

/// Header, length, command and the 17 counted bytes.
pub const FRAME_LEN: usize = 3 + LENGTH as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParserState {
    #[default]
    AwaitHeader,
    AwaitLength,
    AwaitCommand,
    InData,
}

/// Result of feeding one byte through the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Byte to write back onto the link.
    pub outgoing: u8,
    /// Particulate count, present only on the byte that completes a
    /// recognized frame.
    pub reading: Option<u16>,
}

/// Transient parser state. Never persisted, mutated once per byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameParser {
    state: ParserState,
    data_index: u8,
    length: u8,
    command: u8,
    value: u16,
    checksum: u8,
}

impl FrameParser {
    pub const fn new() -> Self {
        Self {
            state: ParserState::AwaitHeader,
            data_index: 0,
            length: 0,
            command: 0,
            value: 0,
            checksum: 0,
        }
    }

    pub const fn state(&self) -> ParserState {
        self.state
    }

    /// Position of the last data byte seen in the current frame (1-indexed).
    pub const fn data_index(&self) -> u8 {
        self.data_index
    }

    /// Value accumulated so far from positions 3 and 4.
    pub const fn value(&self) -> u16 {
        self.value
    }

    /// Running sum of the outgoing bytes of the current frame.
    pub const fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Pure transition: classify `byte` against the frame grammar given the
    /// current control value and return the next parser plus what to relay.
    pub fn step(self, byte: u8, control: ControlValue) -> (Self, Step) {
        let mut next = self;
        let mut outgoing = byte;
        let mut reading = None;

        match self.state {
            ParserState::AwaitHeader => {
                if byte == HEADER {
                    next.state = ParserState::AwaitLength;
                    next.data_index = 0;
                    next.value = 0;
                    next.checksum = 0;
                }
            }
            ParserState::AwaitLength => {
                if byte == LENGTH {
                    next.length = byte;
                    next.state = ParserState::AwaitCommand;
                } else {
                    next.state = ParserState::AwaitHeader;
                }
            }
            ParserState::AwaitCommand => {
                if byte == COMMAND_PARTICLES {
                    next.command = byte;
                    next.state = ParserState::InData;
                } else {
                    next.state = ParserState::AwaitHeader;
                }
            }
            ParserState::InData => {
                next.data_index = next.data_index.wrapping_add(1);

                if next.data_index == VALUE_HIGH_POSITION {
                    next.value = next.value.wrapping_add(u16::from(byte) << 8);
                    if control.is_override() {
                        outgoing = control.high_byte();
                    }
                }

                if next.data_index == VALUE_LOW_POSITION {
                    next.value = next.value.wrapping_add(u16::from(byte));
                    if control.is_override() {
                        outgoing = control.low_byte();
                    }
                }

                if next.data_index == next.length {
                    if next.command == COMMAND_PARTICLES {
                        reading = Some(next.value);
                    }
                    next.state = ParserState::AwaitHeader;
                    outgoing = (!next.checksum).wrapping_add(1);
                }
            }
        }

        next.checksum = next.checksum.wrapping_add(outgoing);

        (next, Step { outgoing, reading })
    }

    /// In-place variant of [`FrameParser::step`].
    pub fn feed(&mut self, byte: u8, control: ControlValue) -> Step {
        let (next, step) = self.step(byte, control);
        *self = next;
        step
    }
}

/// Build a particulate frame the way the sensor emits it, with every other
/// data byte zero and a valid trailing checksum.
pub fn particle_frame(value: u16) -> [u8; FRAME_LEN] {
    let mut frame = [0_u8; FRAME_LEN];
    frame[..3].copy_from_slice(&[HEADER, LENGTH, COMMAND_PARTICLES]);
    let [high, low] = value.to_be_bytes();
    frame[2 + VALUE_HIGH_POSITION as usize] = high;
    frame[2 + VALUE_LOW_POSITION as usize] = low;
    let sum = frame[..FRAME_LEN - 1]
        .iter()
        .fold(0_u8, |acc, b| acc.wrapping_add(*b));
    frame[FRAME_LEN - 1] = sum.wrapping_neg();
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::vec::Vec;

    fn relay(parser: &mut FrameParser, bytes: &[u8], control: ControlValue) -> (Vec<u8>, Vec<u16>) {
        let mut out = Vec::new();
        let mut readings = Vec::new();
        for &byte in bytes {
            let step = parser.feed(byte, control);
            out.push(step.outgoing);
            readings.extend(step.reading);
        }
        (out, readings)
    }

    #[test]
    fn test_noise_passes_through() {
        let mut parser = FrameParser::new();
        let noise = [0x00, 0x11, 0x0B, 0xFF, 0x42, 0x15, 0x17];

        let (out, readings) = relay(&mut parser, &noise, ControlValue::new(500));

        assert_eq!(out, noise);
        assert!(readings.is_empty());
        assert_eq!(parser.state(), ParserState::AwaitHeader);
    }

    #[test]
    fn test_header_transitions() {
        let parser = FrameParser::new();
        let (parser, _) = parser.step(HEADER, ControlValue::DISABLED);
        assert_eq!(parser.state(), ParserState::AwaitLength);
        let (parser, _) = parser.step(LENGTH, ControlValue::DISABLED);
        assert_eq!(parser.state(), ParserState::AwaitCommand);
        let (parser, _) = parser.step(COMMAND_PARTICLES, ControlValue::DISABLED);
        assert_eq!(parser.state(), ParserState::InData);
        assert_eq!(parser.data_index(), 0);
    }

    #[test]
    fn test_reading_extracted_once_at_last_byte() {
        let mut parser = FrameParser::new();
        let frame = particle_frame(291);

        for (i, &byte) in frame.iter().enumerate() {
            let step = parser.feed(byte, ControlValue::DISABLED);
            if i == frame.len() - 1 {
                assert_eq!(step.reading, Some(291));
            } else {
                assert_eq!(step.reading, None, "early reading at byte {}", i);
            }
            if i == 6 {
                // After data position 4
                assert_eq!(parser.value(), 291);
            }
        }

        assert_eq!(parser.state(), ParserState::AwaitHeader);
    }

    #[test]
    fn test_pure_relay_without_override() {
        let mut parser = FrameParser::new();
        let frame = particle_frame(0xBEEF);

        let (out, readings) = relay(&mut parser, &frame, ControlValue::DISABLED);

        // Sensor checksum is already valid, so the recomputed trailer matches
        assert_eq!(out, frame);
        assert_eq!(readings, [0xBEEF]);
    }

    #[test]
    fn test_override_rewrites_value_and_checksum() {
        let mut parser = FrameParser::new();
        let frame = particle_frame(35);
        let control = ControlValue::new(0x0196);

        let (out, readings) = relay(&mut parser, &frame, control);

        assert_eq!(out[5], 0x01);
        assert_eq!(out[6], 0x96);
        // Everything else untouched except the trailer
        assert_eq!(out[..5], frame[..5]);
        assert_eq!(out[7..19], frame[7..19]);
        let total = out.iter().fold(0_u8, |acc, b| acc.wrapping_add(*b));
        assert_eq!(total, 0, "outgoing frame must sum to zero");
        // The reading reflects what the sensor sent, not the override
        assert_eq!(readings, [35]);
    }

    #[test]
    fn test_trailer_is_twos_complement_of_outgoing_sum() {
        let mut parser = FrameParser::new();
        let mut frame = particle_frame(10);
        // Corrupt the incoming checksum; it is never verified
        frame[19] = 0xAA;

        let (out, _) = relay(&mut parser, &frame, ControlValue::DISABLED);

        let sum = out[..19].iter().fold(0_u8, |acc, b| acc.wrapping_add(*b));
        assert_eq!(out[19], (!sum).wrapping_add(1));
        assert_ne!(out[19], 0xAA);
    }

    #[test]
    fn test_wrong_length_resets() {
        let mut parser = FrameParser::new();
        let mut frame = particle_frame(99);
        frame[1] = 0x0D;

        let (out, readings) = relay(&mut parser, &frame, ControlValue::new(7));

        assert!(readings.is_empty());
        assert_eq!(out, frame);
        assert_eq!(parser.state(), ParserState::AwaitHeader);
    }

    #[test]
    fn test_wrong_command_resets() {
        let mut parser = FrameParser::new();
        let (_, _) = relay(&mut parser, &[HEADER, LENGTH], ControlValue::DISABLED);
        let step = parser.feed(0x01, ControlValue::DISABLED);

        assert_eq!(step, Step { outgoing: 0x01, reading: None });
        assert_eq!(parser.state(), ParserState::AwaitHeader);
    }

    #[test]
    fn test_header_inside_data_is_plain_data() {
        let mut parser = FrameParser::new();
        let mut frame = particle_frame(0);
        frame[8] = HEADER;

        let (_, readings) = relay(&mut parser, &frame, ControlValue::DISABLED);

        assert_eq!(readings, [0x0000]);
    }

    #[test]
    fn test_truncated_frame_stays_in_data() {
        let mut parser = FrameParser::new();
        let frame = particle_frame(5);

        let (_, readings) = relay(&mut parser, &frame[..12], ControlValue::DISABLED);

        assert!(readings.is_empty());
        assert_eq!(parser.state(), ParserState::InData);
        assert_eq!(parser.data_index(), 9);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut parser = FrameParser::new();
        let mut stream = Vec::new();
        stream.extend_from_slice(&particle_frame(12));
        stream.extend_from_slice(&[0x00, 0x00]);
        stream.extend_from_slice(&particle_frame(340));

        let (out, readings) = relay(&mut parser, &stream, ControlValue::DISABLED);

        assert_eq!(readings, [12, 340]);
        assert_eq!(out, stream);
    }

    #[test]
    fn test_value_resets_between_frames() {
        let mut parser = FrameParser::new();
        relay(&mut parser, &particle_frame(0xFFFF), ControlValue::DISABLED);
        let (_, readings) = relay(&mut parser, &particle_frame(1), ControlValue::DISABLED);
        assert_eq!(readings, [1]);
    }
}
