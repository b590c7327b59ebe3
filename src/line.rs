use embedded_hal::digital::{ErrorType, InputPin, OutputPin, PinState};

use crate::error::DhtError;

/// Electrical direction of the data line.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Push-pull output, driven by the host.
    Output,
    /// Input, driven by the sensor.
    Input,
}

/// Pull resistor configuration.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pull {
    /// No pull resistor.
    None,
    /// Pull-up resistor enabled.
    Up,
}

/// A bidirectional digital pin that can be switched between output and
/// input at runtime.
///
/// Reconfiguring may glitch the line; callers must not assume glitch-free
/// transitions.
pub trait FlexPin: ErrorType {
    /// Switches the pin direction and pull configuration.
    fn configure(&mut self, direction: Direction, pull: Pull) -> Result<(), Self::Error>;

    /// Drives the line. Only meaningful in [`Direction::Output`].
    fn write(&mut self, level: PinState) -> Result<(), Self::Error>;

    /// Reads the line. Only meaningful in [`Direction::Input`].
    fn read(&mut self) -> Result<PinState, Self::Error>;
}

impl<T: FlexPin + ?Sized> FlexPin for &mut T {
    #[inline]
    fn configure(&mut self, direction: Direction, pull: Pull) -> Result<(), Self::Error> {
        T::configure(self, direction, pull)
    }

    #[inline]
    fn write(&mut self, level: PinState) -> Result<(), Self::Error> {
        T::write(self, level)
    }

    #[inline]
    fn read(&mut self) -> Result<PinState, Self::Error> {
        T::read(self)
    }
}

/// Adapts an open-drain pin (one that implements both [`InputPin`] and
/// [`OutputPin`]) to [`FlexPin`].
///
/// An open-drain pin with an external or internal pull-up never needs a real
/// direction change: releasing it (driving it high) is what hands the line
/// over to the sensor.
pub struct OpenDrain<P> {
    pin: P,
}

impl<P> OpenDrain<P> {
    /// Wraps an open-drain pin.
    pub fn new(pin: P) -> Self {
        OpenDrain { pin }
    }

    /// Returns the wrapped pin.
    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P: ErrorType> ErrorType for OpenDrain<P> {
    type Error = P::Error;
}

impl<P: InputPin + OutputPin> FlexPin for OpenDrain<P> {
    fn configure(&mut self, direction: Direction, _pull: Pull) -> Result<(), Self::Error> {
        match direction {
            Direction::Output => Ok(()),
            Direction::Input => self.pin.set_high(),
        }
    }

    fn write(&mut self, level: PinState) -> Result<(), Self::Error> {
        match level {
            PinState::Low => self.pin.set_low(),
            PinState::High => self.pin.set_high(),
        }
    }

    fn read(&mut self) -> Result<PinState, Self::Error> {
        Ok(PinState::from(self.pin.is_high()?))
    }
}

/// Exclusively owned data line that tracks its own direction.
///
/// Writing while configured as input, or reading while configured as output
/// (or before any configuration), fails with [`DhtError::WrongDirection`].
pub struct Line<P> {
    pin: P,
    direction: Option<Direction>,
}

impl<P, E> Line<P>
where
    P: FlexPin<Error = E>,
{
    /// Takes ownership of the pin. The direction is unknown until the first
    /// [`set_mode`](Self::set_mode).
    pub fn new(pin: P) -> Self {
        Line {
            pin,
            direction: None,
        }
    }

    /// Current direction, or `None` if the line was never configured.
    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    /// Reconfigures the pin and records the new direction.
    pub fn set_mode(&mut self, direction: Direction, pull: Pull) -> Result<(), DhtError<E>> {
        self.pin.configure(direction, pull)?;
        self.direction = Some(direction);
        Ok(())
    }

    /// Drives the line. Fails unless configured as output.
    pub fn drive(&mut self, level: PinState) -> Result<(), DhtError<E>> {
        self.require(Direction::Output)?;
        self.pin.write(level)?;
        Ok(())
    }

    /// Reads the line. Fails unless configured as input.
    pub fn sample(&mut self) -> Result<PinState, DhtError<E>> {
        self.require(Direction::Input)?;
        Ok(self.pin.read()?)
    }

    /// Returns the owned pin.
    pub fn into_inner(self) -> P {
        self.pin
    }

    fn require(&self, direction: Direction) -> Result<(), DhtError<E>> {
        if self.direction == Some(direction) {
            Ok(())
        } else {
            Err(DhtError::WrongDirection(direction))
        }
    }
}
