use embedded_hal::digital::PinState;

use crate::error::DhtError;
use crate::frame::{FRAME_LEN, RawFrame, Reading};
use crate::line::{Direction, FlexPin, Line, Pull};
use crate::timing::{Timer, elapsed_ms};

/// Length of the host wake pulse (line held low), in milliseconds.
///
/// The DHT11 needs at least 18 ms to notice the start request.
pub const WAKE_PULSE_MS: u32 = 18;

/// How long the host drives the line high before releasing it.
pub const RELEASE_HOLD_US: u32 = 30;

/// Delay after releasing the line before checking for the sensor's low
/// acknowledgment.
pub const ACK_SETTLE_US: u32 = 40;

/// Delay between the low and the high acknowledgment checks.
pub const ACK_HIGH_US: u32 = 80;

/// Delay after a rising edge before sampling a data bit. A high level at this
/// point means the sensor is sending a long (`1`) pulse.
pub const BIT_SAMPLE_US: u32 = 40;

/// Maximum time to wait (in milliseconds) for the pin to change state.
pub const TIMEOUT_MS: u32 = 2;

/// Busy-wait between two polls of the line inside a bounded wait.
const POLL_INTERVAL_US: u32 = 1;

/// What a bounded wait does when its budget runs out.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// Abort the cycle with [`DhtError::Timeout`].
    #[default]
    Strict,
    /// Stop waiting and keep decoding with whatever level the line has.
    ///
    /// A stalled sensor then yields garbage bits, which are usually, but not
    /// always, caught by the checksum.
    Lenient,
}

/// Protocol timings for one read cycle.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// See [`WAKE_PULSE_MS`].
    pub wake_pulse_ms: u32,
    /// See [`RELEASE_HOLD_US`].
    pub release_hold_us: u32,
    /// See [`ACK_SETTLE_US`].
    pub ack_settle_us: u32,
    /// See [`ACK_HIGH_US`].
    pub ack_high_us: u32,
    /// See [`BIT_SAMPLE_US`].
    pub bit_sample_us: u32,
    /// Budget for every wait for an edge.
    pub timeout_ms: u32,
    pub timeout_policy: TimeoutPolicy,
}

impl Config {
    /// Default DHT11 timings with [`TimeoutPolicy::Strict`].
    pub const fn new() -> Self {
        Config {
            wake_pulse_ms: WAKE_PULSE_MS,
            release_hold_us: RELEASE_HOLD_US,
            ack_settle_us: ACK_SETTLE_US,
            ack_high_us: ACK_HIGH_US,
            bit_sample_us: BIT_SAMPLE_US,
            timeout_ms: TIMEOUT_MS,
            timeout_policy: TimeoutPolicy::Strict,
        }
    }

    /// Sets the length of the host wake pulse.
    pub const fn with_wake_pulse_ms(mut self, ms: u32) -> Self {
        self.wake_pulse_ms = ms;
        self
    }

    /// Sets the budget for every wait for an edge.
    pub const fn with_timeout_ms(mut self, ms: u32) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Sets what happens when an edge wait runs out of budget.
    pub const fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the decoder is within a read cycle.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No cycle has run yet.
    Idle,
    /// Host is holding the wake pulse.
    Requesting,
    /// Line released, waiting for the sensor to pull it low.
    AwaitingAck,
    /// Sensor acknowledged low.
    AckLow,
    /// Sensor acknowledged high.
    AckHigh,
    /// Reading data bit `bit` (0..40).
    Sampling { bit: u8 },
    /// Last cycle produced a frame.
    Done,
    /// Last cycle failed.
    Failed,
}

/// Driver for the DHT11 temperature and humidity sensor.
pub struct Dht11<PIN, T> {
    line: Line<PIN>,
    timer: T,
    config: Config,
    phase: Phase,
}

impl<PIN, T, E> Dht11<PIN, T>
where
    PIN: FlexPin<Error = E>,
    T: Timer,
{
    /// Creates a new instance of the DHT11 driver with the default timings.
    ///
    /// # Arguments
    ///
    /// * `pin` - The pin connected to the DHT11 data line. It is owned by the
    ///   driver for as long as the driver lives.
    /// * `timer` - Delay and millisecond tick provider.
    ///
    /// The line is not touched until [`park`](Self::park) or the first read.
    pub fn new(pin: PIN, timer: T) -> Self {
        Self::with_config(pin, timer, Config::new())
    }

    /// Creates a new instance of the DHT11 driver with custom timings.
    pub fn with_config(pin: PIN, timer: T, config: Config) -> Self {
        Dht11 {
            line: Line::new(pin),
            timer,
            config,
            phase: Phase::Idle,
        }
    }

    /// Timings used for every read cycle.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// State the last cycle ended in (or is in).
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Direction the data line is currently configured in.
    pub fn line_direction(&self) -> Option<Direction> {
        self.line.direction()
    }

    /// Mutable access to the timer, for delays between read cycles.
    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// Gives back the pin and the timer.
    pub fn release(self) -> (PIN, T) {
        (self.line.into_inner(), self.timer)
    }

    /// Reads a temperature and humidity measurement from the DHT11 sensor.
    ///
    /// This performs one complete read cycle and validates the checksum.
    /// Nothing is retried: on error the caller waits for its next scheduled
    /// cycle.
    ///
    /// # Returns
    ///
    /// * `Ok(Reading)` if the read is successful and the checksum is valid.
    /// * `Err(DhtError)` if a communication or checksum error occurs.
    pub fn read(&mut self) -> Result<Reading, DhtError<E>> {
        let frame = self.read_frame()?;

        frame.validate().map_err(|mismatch| {
            warn!(
                "dht11: checksum mismatch, computed {=u8:#x} received {=u8:#x}",
                mismatch.computed,
                mismatch.received
            );
            self.phase = Phase::Failed;
            DhtError::ChecksumMismatch
        })
    }

    /// Runs one read cycle and returns the raw, unvalidated frame.
    ///
    /// The line is parked as a high output afterwards, whether or not the
    /// cycle succeeded.
    pub fn read_frame(&mut self) -> Result<RawFrame, DhtError<E>> {
        let result = self.transfer();
        let parked = self.park();

        match result.and_then(|frame| parked.map(|()| frame)) {
            Ok(frame) => {
                self.phase = Phase::Done;
                trace!("dht11: frame {}", frame.to_bytes());
                Ok(frame)
            }
            Err(e) => {
                debug!("dht11: cycle failed: {=str}", e.as_str());
                self.phase = Phase::Failed;
                Err(e)
            }
        }
    }

    fn transfer(&mut self) -> Result<RawFrame, DhtError<E>> {
        self.start()?;

        let mut data = [0; FRAME_LEN];
        for (i, b) in data.iter_mut().enumerate() {
            *b = self.read_byte(i as u8)?;
        }

        Ok(RawFrame::from_bytes(data))
    }

    /// Sends the start signal to the DHT11 and checks its acknowledgment.
    ///
    /// The host holds the line low for the wake pulse, drives it high
    /// briefly and releases it. The sensor must then be low after
    /// `ack_settle_us` and high `ack_high_us` later.
    ///
    /// Each acknowledgment level is sampled once rather than waited for, so a
    /// sensor whose timing drifts far from the datasheet is reported as
    /// absent.
    fn start(&mut self) -> Result<(), DhtError<E>> {
        // MCU sends start request
        self.phase = Phase::Requesting;
        self.line.set_mode(Direction::Output, Pull::None)?;
        self.line.drive(PinState::Low)?;
        self.timer.delay_ms(self.config.wake_pulse_ms);
        self.line.drive(PinState::High)?;
        self.timer.delay_us(self.config.release_hold_us);
        self.line.set_mode(Direction::Input, Pull::Up)?;

        // Waiting for DHT11 Response
        self.phase = Phase::AwaitingAck;
        self.timer.delay_us(self.config.ack_settle_us);
        if self.line.sample()? != PinState::Low {
            return Err(DhtError::NoResponse);
        }

        self.phase = Phase::AckLow;
        self.timer.delay_us(self.config.ack_high_us);
        if self.line.sample()? != PinState::High {
            return Err(DhtError::NoResponse);
        }

        // Sensor ends its acknowledgment before the first bit
        self.phase = Phase::AckHigh;
        self.wait_for_low()
    }

    /// Reads one byte (8 bits, MSB first) from the sensor.
    fn read_byte(&mut self, index: u8) -> Result<u8, DhtError<E>> {
        let mut byte: u8 = 0;

        for i in 0..8 {
            self.phase = Phase::Sampling { bit: index * 8 + i };
            let bit_mask = 1 << (7 - i);
            if self.read_bit()? {
                byte |= bit_mask;
            }
        }

        Ok(byte)
    }

    /// Reads a single bit from the sensor.
    ///
    /// The bit is determined by the duration of the high pulse: still high
    /// `bit_sample_us` after the rising edge means `1`.
    fn read_bit(&mut self) -> Result<bool, DhtError<E>> {
        self.wait_for_high()?;

        self.timer.delay_us(self.config.bit_sample_us);
        let bit_is_one = self.line.sample()? == PinState::High;

        self.wait_for_low()?;

        Ok(bit_is_one)
    }

    /// Leaves the line as a driven-high output so that noise on a floating
    /// input cannot look like a start request before the next cycle.
    ///
    /// Every read does this on its way out. Call it once after creating the
    /// driver if the line must be held before the first read.
    pub fn park(&mut self) -> Result<(), DhtError<E>> {
        self.line.set_mode(Direction::Output, Pull::None)?;
        self.line.drive(PinState::High)
    }

    /// Waits until the data line goes high or times out.
    fn wait_for_high(&mut self) -> Result<(), DhtError<E>> {
        self.wait_for_state(PinState::High)
    }

    /// Waits until the data line goes low or times out.
    fn wait_for_low(&mut self) -> Result<(), DhtError<E>> {
        self.wait_for_state(PinState::Low)
    }

    /// Polls the line until it reaches `target` or the timeout budget runs
    /// out.
    ///
    /// The budget is enforced twice: by the millisecond tick and by a cap on
    /// the number of polls, so the wait still ends if the tick stops (for
    /// example with interrupts disabled during the read).
    ///
    /// # Errors
    ///
    /// Returns `DhtError::Timeout` if the budget is exceeded under
    /// [`TimeoutPolicy::Strict`]. Under [`TimeoutPolicy::Lenient`] an
    /// expired wait returns `Ok(())`.
    fn wait_for_state(&mut self, target: PinState) -> Result<(), DhtError<E>> {
        let start = self.timer.now_ms();
        let max_polls = self.config.timeout_ms.saturating_mul(1_000) / POLL_INTERVAL_US;
        let mut polls: u32 = 0;

        loop {
            if self.line.sample()? == target {
                return Ok(());
            }

            polls = polls.saturating_add(1);
            if polls > max_polls
                || elapsed_ms(start, self.timer.now_ms()) >= self.config.timeout_ms
            {
                return match self.config.timeout_policy {
                    TimeoutPolicy::Strict => Err(DhtError::Timeout),
                    TimeoutPolicy::Lenient => {
                        warn!("dht11: edge wait expired, continuing");
                        Ok(())
                    }
                };
            }

            self.timer.delay_us(POLL_INTERVAL_US);
        }
    }
}
