//! Virtual-time test doubles: a timer whose clock only moves when something
//! delays, and a DHT11 that replays a waveform against that clock.

use core::cell::Cell;
use core::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, PinState};

use crate::line::{Direction, FlexPin, Pull};
use crate::timing::Timer;

/// One stretch of the waveform: duration in microseconds and the level the
/// sensor holds for it.
pub type Segment = (u32, PinState);

#[derive(Clone, Default)]
pub struct VirtualTimer {
    now_ns: Rc<Cell<u64>>,
}

impl VirtualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_us(&self) -> u64 {
        self.now_ns.get() / 1_000
    }
}

impl DelayNs for VirtualTimer {
    fn delay_ns(&mut self, ns: u32) {
        self.now_ns.set(self.now_ns.get() + u64::from(ns));
    }
}

impl Timer for VirtualTimer {
    fn now_ms(&self) -> u32 {
        (self.now_ns.get() / 1_000_000) as u32
    }
}

/// Waveform of a well-behaved DHT11 sending `bytes`, starting at the moment
/// the host releases the line.
pub fn waveform(bytes: [u8; 5]) -> Vec<Segment> {
    let mut segments = vec![
        (20, PinState::High), // response delay
        (80, PinState::Low),  // ack low
        (80, PinState::High), // ack high
    ];
    for byte in bytes {
        for i in 0..8 {
            let bit = (byte >> (7 - i)) & 1;
            segments.push((50, PinState::Low));
            segments.push((if bit == 1 { 70 } else { 26 }, PinState::High));
        }
    }
    segments.push((50, PinState::Low));
    segments
}

/// Simulated sensor on the far end of the data line.
///
/// Every time the host releases the line the waveform restarts. Past its end
/// the line sits at the holding level (pulled up by default).
pub struct SimulatedSensor {
    clock: VirtualTimer,
    waveform: Vec<Segment>,
    holding: PinState,
    direction: Direction,
    last_written: Option<PinState>,
    low_since: Option<u64>,
    released_at: Option<u64>,
    last_wake_us: Option<u64>,
}

impl SimulatedSensor {
    pub fn new(clock: &VirtualTimer, waveform: Vec<Segment>) -> Self {
        SimulatedSensor {
            clock: clock.clone(),
            waveform,
            holding: PinState::High,
            direction: Direction::Input,
            last_written: None,
            low_since: None,
            released_at: None,
            last_wake_us: None,
        }
    }

    /// Level the sensor leaves the line at once the waveform is exhausted.
    pub fn holding(mut self, level: PinState) -> Self {
        self.holding = level;
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn last_written(&self) -> Option<PinState> {
        self.last_written
    }

    /// Time from the start of the last wake pulse to the release of the line.
    pub fn released_after_us(&self) -> Option<u64> {
        self.last_wake_us
    }
}

impl ErrorType for SimulatedSensor {
    type Error = Infallible;
}

impl FlexPin for SimulatedSensor {
    fn configure(&mut self, direction: Direction, _pull: Pull) -> Result<(), Self::Error> {
        let now = self.clock.now_us();
        match direction {
            Direction::Output => self.released_at = None,
            Direction::Input => {
                if let Some(low) = self.low_since.take() {
                    self.last_wake_us = Some(now - low);
                }
                self.released_at = Some(now);
            }
        }
        self.direction = direction;
        Ok(())
    }

    fn write(&mut self, level: PinState) -> Result<(), Self::Error> {
        if level == PinState::Low {
            self.low_since = Some(self.clock.now_us());
        }
        self.last_written = Some(level);
        Ok(())
    }

    fn read(&mut self) -> Result<PinState, Self::Error> {
        let Some(released_at) = self.released_at else {
            return Ok(self.last_written.unwrap_or(PinState::High));
        };

        let t = self.clock.now_us() - released_at;
        let mut end = 0u64;
        for &(duration, level) in &self.waveform {
            end += u64::from(duration);
            if t < end {
                return Ok(level);
            }
        }
        Ok(self.holding)
    }
}
