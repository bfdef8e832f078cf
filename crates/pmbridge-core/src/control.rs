//! Outbound control value mirrored into the sensor-bound frame stream

/// Network-settable value injected into data positions 3 and 4 of every
/// outgoing particulate frame.
///
/// Zero means "no override": frames are relayed untouched apart from the
/// checksum trailer. The value persists until the next control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlValue(u32);

impl ControlValue {
    pub const DISABLED: Self = Self(0);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Whether outgoing frames get rewritten.
    pub const fn is_override(self) -> bool {
        self.0 > 0
    }

    /// Byte substituted at data position 3.
    pub const fn high_byte(self) -> u8 {
        ((self.0 / 256) % 256) as u8
    }

    /// Byte substituted at data position 4.
    pub const fn low_byte(self) -> u8 {
        (self.0 % 256) as u8
    }

    /// Parse a control topic payload.
    ///
    /// Behaves like C `atoi` stored into an unsigned value: leading ASCII
    /// whitespace and one `+` or `-` sign are skipped, then the leading run
    /// of decimal digits is taken. No digits yields 0, which disables the
    /// override. A `-` wraps, so `"-5"` becomes `u32::MAX - 4` and keeps the
    /// override active. Magnitudes beyond `u32::MAX` saturate.
    pub fn parse(payload: &[u8]) -> Self {
        let mut bytes = payload
            .iter()
            .copied()
            .skip_while(|b| b.is_ascii_whitespace())
            .peekable();

        let negative = match bytes.peek() {
            Some(b'-') => {
                bytes.next();
                true
            }
            Some(b'+') => {
                bytes.next();
                false
            }
            _ => false,
        };

        let magnitude = bytes
            .take_while(u8::is_ascii_digit)
            .fold(0_u32, |acc, digit| {
                acc.saturating_mul(10).saturating_add(u32::from(digit - b'0'))
            });

        if negative {
            Self(0_u32.wrapping_sub(magnitude))
        } else {
            Self(magnitude)
        }
    }
}

impl From<u32> for ControlValue {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl core::fmt::Display for ControlValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
