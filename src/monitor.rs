//! Periodic read-and-report loop.
//!
//! A [`Monitor`] owns a [`Dht11`] and a serial byte sink (for example a USB
//! CDC class wrapped in an [`embedded_io::Write`] adapter). Every cycle it
//! reads the sensor and, only if the reading is valid, writes one report line
//! to the sink. A failed cycle writes nothing.

use core::fmt;

use embedded_io::Write;

use crate::dht11::Dht11;
use crate::error::DhtError;
use crate::frame::Reading;
use crate::line::FlexPin;
use crate::report::format_reading;
use crate::timing::Timer;

/// Delay before the first read, giving the sensor time to settle after
/// power-up.
pub const STARTUP_DELAY_MS: u32 = 2_000;

/// Default spacing between two read cycles.
pub const INTERVAL_MS: u32 = 10_000;

/// Shortest spacing between two read cycles. Sampling the DHT11 faster than
/// once per second degrades its accuracy.
pub const MIN_INTERVAL_MS: u32 = 1_000;

/// Cadence of the read loop.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Delay before the first cycle.
    pub startup_delay_ms: u32,
    interval_ms: u32,
}

impl MonitorConfig {
    /// 2 s startup delay, one cycle every 10 s.
    pub const fn new() -> Self {
        MonitorConfig {
            startup_delay_ms: STARTUP_DELAY_MS,
            interval_ms: INTERVAL_MS,
        }
    }

    /// Sets the delay before the first cycle.
    pub const fn with_startup_delay_ms(mut self, ms: u32) -> Self {
        self.startup_delay_ms = ms;
        self
    }

    /// Sets the spacing between cycles, raised to [`MIN_INTERVAL_MS`] if
    /// shorter.
    pub const fn with_interval_ms(mut self, ms: u32) -> Self {
        self.interval_ms = if ms < MIN_INTERVAL_MS {
            MIN_INTERVAL_MS
        } else {
            ms
        };
        self
    }

    /// Spacing between cycles.
    pub const fn interval_ms(&self) -> u32 {
        self.interval_ms
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a cycle produced no output.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq)]
pub enum CycleError<PE, SE> {
    /// The sensor read failed; nothing was sent.
    Sensor(DhtError<PE>),
    /// The reading could not be formatted; nothing was sent.
    ///
    /// Only possible if a line outgrows [`REPORT_CAPACITY`], which already
    /// fits any pair of `f32` values.
    ///
    /// [`REPORT_CAPACITY`]: crate::report::REPORT_CAPACITY
    Format,
    /// The sink rejected the report line.
    Transport(SE),
}

impl<PE, SE> CycleError<PE, SE> {
    /// Short, static name of the error, suitable for log lines.
    pub const fn as_str(&self) -> &'static str {
        match self {
            CycleError::Sensor(e) => e.as_str(),
            CycleError::Format => "format error",
            CycleError::Transport(_) => "transport error",
        }
    }
}

impl<PE: fmt::Debug, SE: fmt::Debug> fmt::Display for CycleError<PE, SE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleError::Sensor(e) => write!(f, "sensor: {e}"),
            CycleError::Format => f.write_str(self.as_str()),
            CycleError::Transport(e) => write!(f, "{}: {:?}", self.as_str(), e),
        }
    }
}

/// Reads the sensor on a fixed cadence and reports each valid reading.
pub struct Monitor<PIN, T, W> {
    sensor: Dht11<PIN, T>,
    sink: W,
    config: MonitorConfig,
}

impl<PIN, T, W, E> Monitor<PIN, T, W>
where
    PIN: FlexPin<Error = E>,
    T: Timer,
    W: Write,
{
    /// Creates a monitor with the default cadence.
    pub fn new(sensor: Dht11<PIN, T>, sink: W) -> Self {
        Self::with_config(sensor, sink, MonitorConfig::new())
    }

    /// Creates a monitor with a custom cadence.
    pub fn with_config(sensor: Dht11<PIN, T>, sink: W, config: MonitorConfig) -> Self {
        Monitor {
            sensor,
            sink,
            config,
        }
    }

    /// Cadence of the loop.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// The sensor driver.
    pub fn sensor(&self) -> &Dht11<PIN, T> {
        &self.sensor
    }

    /// The report sink.
    pub fn sink(&self) -> &W {
        &self.sink
    }

    /// Gives back the sensor driver and the sink.
    pub fn release(self) -> (Dht11<PIN, T>, W) {
        (self.sensor, self.sink)
    }

    /// Runs one read cycle and reports the reading.
    ///
    /// The sink is only written to when the sensor returned a valid reading.
    pub fn cycle(&mut self) -> Result<Reading, CycleError<E, W::Error>> {
        let reading = self.sensor.read().map_err(CycleError::Sensor)?;
        let line = format_reading(&reading).map_err(|_| CycleError::Format)?;

        self.sink
            .write_all(line.as_bytes())
            .map_err(CycleError::Transport)?;
        self.sink.flush().map_err(CycleError::Transport)?;

        Ok(reading)
    }

    /// Parks the line, waits the startup delay, then runs cycles spaced by
    /// the configured interval until `stop` returns `true`.
    ///
    /// `stop` is only consulted between cycles, never during one. Failed
    /// cycles are logged and otherwise skipped.
    pub fn run_until<F>(&mut self, mut stop: F)
    where
        F: FnMut() -> bool,
    {
        if let Err(e) = self.sensor.park() {
            warn!("monitor: could not park line: {=str}", e.as_str());
        }
        self.sensor
            .timer_mut()
            .delay_ms(self.config.startup_delay_ms);

        while !stop() {
            match self.cycle() {
                Ok(reading) => {
                    debug!(
                        "monitor: {=f32} C, {=f32} %",
                        reading.temperature_celsius,
                        reading.humidity_percent
                    );
                }
                Err(e) => {
                    warn!("monitor: cycle skipped: {=str}", e.as_str());
                }
            }
            self.sensor.timer_mut().delay_ms(self.config.interval_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RawFrame;
    use crate::sim::{SimulatedSensor, VirtualTimer, waveform};
    use core::convert::Infallible;
    use embedded_io::{ErrorKind, ErrorType};

    #[derive(Default)]
    struct Capture {
        bytes: Vec<u8>,
        flushes: usize,
    }

    impl ErrorType for Capture {
        type Error = Infallible;
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.bytes.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[derive(Debug, PartialEq)]
    struct Unplugged;

    impl fmt::Display for Unplugged {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("unplugged")
        }
    }

    impl core::error::Error for Unplugged {}

    impl embedded_io::Error for Unplugged {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    struct Disconnected;

    impl ErrorType for Disconnected {
        type Error = Unplugged;
    }

    impl Write for Disconnected {
        fn write(&mut self, _buf: &[u8]) -> Result<usize, Self::Error> {
            Err(Unplugged)
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Err(Unplugged)
        }
    }

    const GOOD: [u8; 5] = [0x32, 0x00, 0x18, 0x05, 0x4F];
    const CORRUPTED: [u8; 5] = [0x32, 0x00, 0x18, 0x05, 0x00];

    #[test]
    fn test_cycle_reports_reading() {
        let timer = VirtualTimer::new();
        let mut sensor = SimulatedSensor::new(&timer, waveform(GOOD));
        let dht = Dht11::new(&mut sensor, timer.clone());

        let mut monitor = Monitor::new(dht, Capture::default());
        let reading = monitor.cycle().unwrap();

        assert_eq!(reading, RawFrame::from_bytes(GOOD).validate().unwrap());
        assert_eq!(monitor.sink().bytes, b"Temp: 24.5 C | Hum: 50.0 %\r\n");
        assert_eq!(monitor.sink().flushes, 1);
    }

    #[test]
    fn test_checksum_mismatch_sends_nothing() {
        let timer = VirtualTimer::new();
        let mut sensor = SimulatedSensor::new(&timer, waveform(CORRUPTED));
        let dht = Dht11::new(&mut sensor, timer.clone());

        let mut monitor = Monitor::new(dht, Capture::default());

        assert_eq!(
            monitor.cycle().unwrap_err(),
            CycleError::Sensor(DhtError::ChecksumMismatch)
        );
        assert!(monitor.sink().bytes.is_empty());
        assert_eq!(monitor.sink().flushes, 0);
    }

    #[test]
    fn test_absent_sensor_sends_nothing() {
        let timer = VirtualTimer::new();
        let mut sensor = SimulatedSensor::new(&timer, Vec::new());
        let dht = Dht11::new(&mut sensor, timer.clone());

        let mut monitor = Monitor::new(dht, Capture::default());

        assert_eq!(
            monitor.cycle().unwrap_err(),
            CycleError::Sensor(DhtError::NoResponse)
        );
        assert!(monitor.sink().bytes.is_empty());
    }

    #[test]
    fn test_transport_error_is_reported() {
        let timer = VirtualTimer::new();
        let mut sensor = SimulatedSensor::new(&timer, waveform(GOOD));
        let dht = Dht11::new(&mut sensor, timer.clone());

        let mut monitor = Monitor::new(dht, Disconnected);
        let err = monitor.cycle().unwrap_err();

        assert_eq!(err, CycleError::Transport(Unplugged));
        assert_eq!(format!("{err}"), "transport error: Unplugged");
    }

    #[test]
    fn test_run_until_keeps_cadence() {
        let timer = VirtualTimer::new();
        let mut sensor = SimulatedSensor::new(&timer, waveform(GOOD));
        let dht = Dht11::new(&mut sensor, timer.clone());

        let mut monitor = Monitor::new(dht, Capture::default());
        let mut cycles = 0;
        monitor.run_until(|| {
            cycles += 1;
            cycles > 3
        });

        let line = "Temp: 24.5 C | Hum: 50.0 %\r\n";
        assert_eq!(monitor.sink().bytes, line.repeat(3).as_bytes());

        // 2s startup plus three 10s intervals, each cycle adding a few ms
        let elapsed = timer.now_ms();
        assert!(elapsed >= 32_000);
        assert!(elapsed < 32_000 + 3 * 50);
    }

    #[test]
    fn test_run_until_skips_failed_cycles() {
        let timer = VirtualTimer::new();
        let mut sensor = SimulatedSensor::new(&timer, waveform(CORRUPTED));
        let dht = Dht11::new(&mut sensor, timer.clone());

        let mut monitor = Monitor::new(dht, Capture::default());
        let mut cycles = 0;
        monitor.run_until(|| {
            cycles += 1;
            cycles > 2
        });

        assert!(monitor.sink().bytes.is_empty());
        assert_eq!(monitor.sensor().phase(), crate::dht11::Phase::Failed);
    }

    #[test]
    fn test_run_until_stops_before_first_cycle() {
        let timer = VirtualTimer::new();
        let mut sensor = SimulatedSensor::new(&timer, waveform(GOOD));
        let dht = Dht11::new(&mut sensor, timer.clone());

        let config = MonitorConfig::new().with_startup_delay_ms(500);
        let mut monitor = Monitor::with_config(dht, Capture::default(), config);
        monitor.run_until(|| true);

        assert!(monitor.sink().bytes.is_empty());
        assert_eq!(timer.now_ms(), 500);
        drop(monitor);

        // line is held high during the startup delay, not left floating
        assert_eq!(sensor.direction(), crate::line::Direction::Output);
        assert_eq!(
            sensor.last_written(),
            Some(embedded_hal::digital::PinState::High)
        );
    }

    #[test]
    fn test_interval_is_clamped() {
        assert_eq!(MonitorConfig::new().interval_ms(), 10_000);
        assert_eq!(MonitorConfig::new().with_interval_ms(100).interval_ms(), 1_000);
        assert_eq!(MonitorConfig::new().with_interval_ms(5_000).interval_ms(), 5_000);
    }
}
