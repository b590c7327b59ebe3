use embedded_hal::delay::DelayNs;

/// Timing source used by the driver.
///
/// Delays come from [`DelayNs`]: `delay_ms` for the wake pulse and
/// `delay_us` for the microsecond busy-waits while sampling. `now_ms` is a
/// monotonic millisecond tick used to bound every wait for an edge.
///
/// The tick may wrap; the driver only ever compares ticks through
/// [`elapsed_ms`].
pub trait Timer: DelayNs {
    /// Returns the current value of the millisecond tick.
    fn now_ms(&self) -> u32;
}

impl<T: Timer + ?Sized> Timer for &mut T {
    #[inline]
    fn now_ms(&self) -> u32 {
        T::now_ms(self)
    }
}

/// Milliseconds elapsed between two tick values, wrap-around safe.
#[inline]
pub const fn elapsed_ms(since: u32, now: u32) -> u32 {
    now.wrapping_sub(since)
}
