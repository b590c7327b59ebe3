use core::fmt;

/// Number of bytes in one DHT11 transfer.
pub const FRAME_LEN: usize = 5;

/// The unvalidated 5-byte payload clocked out of the sensor, in wire order.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawFrame {
    /// Integer part of the relative humidity.
    pub humidity_integer: u8,
    /// Tenths of the relative humidity.
    pub humidity_decimal: u8,
    /// Integer part of the temperature.
    pub temperature_integer: u8,
    /// Tenths of the temperature.
    pub temperature_decimal: u8,
    /// Sum of the four bytes above, mod 256.
    pub checksum: u8,
}

/// Reading returned by the DHT11 sensor.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    /// Relative humidity in percent.
    pub humidity_percent: f32,
    /// Temperature in degrees Celsius.
    pub temperature_celsius: f32,
}

/// The frame's checksum byte disagrees with the sum of its data bytes.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChecksumMismatch {
    /// Sum of the four data bytes, mod 256.
    pub computed: u8,
    /// Checksum byte sent by the sensor.
    pub received: u8,
}

impl RawFrame {
    /// Builds a frame from the bytes in wire order.
    pub const fn from_bytes(bytes: [u8; FRAME_LEN]) -> Self {
        let [
            humidity_integer,
            humidity_decimal,
            temperature_integer,
            temperature_decimal,
            checksum,
        ] = bytes;
        RawFrame {
            humidity_integer,
            humidity_decimal,
            temperature_integer,
            temperature_decimal,
            checksum,
        }
    }

    /// The frame's bytes in wire order.
    pub const fn to_bytes(&self) -> [u8; FRAME_LEN] {
        [
            self.humidity_integer,
            self.humidity_decimal,
            self.temperature_integer,
            self.temperature_decimal,
            self.checksum,
        ]
    }

    /// Sum of the four data bytes, mod 256, the way the sensor computes it.
    pub const fn computed_checksum(&self) -> u8 {
        self.humidity_integer
            .wrapping_add(self.humidity_decimal)
            .wrapping_add(self.temperature_integer)
            .wrapping_add(self.temperature_decimal)
    }

    /// Validates the frame and converts it to physical units.
    pub fn validate(&self) -> Result<Reading, ChecksumMismatch> {
        validate(self)
    }
}

impl From<[u8; FRAME_LEN]> for RawFrame {
    fn from(bytes: [u8; FRAME_LEN]) -> Self {
        Self::from_bytes(bytes)
    }
}

/// Checks the frame's checksum and converts it into a [`Reading`].
///
/// Each value is `integer + decimal / 10`. The decimal byte is taken as-is
/// (0..=255); a decimal byte of 200 adds 20.0 to the value.
pub fn validate(frame: &RawFrame) -> Result<Reading, ChecksumMismatch> {
    let computed = frame.computed_checksum();
    if computed != frame.checksum {
        return Err(ChecksumMismatch {
            computed,
            received: frame.checksum,
        });
    }

    Ok(Reading {
        humidity_percent: join(frame.humidity_integer, frame.humidity_decimal),
        temperature_celsius: join(frame.temperature_integer, frame.temperature_decimal),
    })
}

fn join(integer: u8, decimal: u8) -> f32 {
    integer as f32 + decimal as f32 / 10.0
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Temp: {:.1} C | Hum: {:.1} %",
            self.temperature_celsius, self.humidity_percent
        )
    }
}
