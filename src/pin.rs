//! GPIO lines whose direction changes during a transaction.
//!
//! The SHT1x DATA line is driven by the host while a command is clocked out and
//! sampled while the sensor answers, so the driver needs pins that can switch
//! direction at runtime. `embedded-hal` 1.0 has no trait for that, hence
//! [`IoPin`].

use embedded_hal::digital::{InputPin, OutputPin};

/// Direction of a GPIO line.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinMode {
    /// High impedance, sampled by the host.
    Input,
    /// Actively driven by the host.
    Output,
}

/// A GPIO pin that can be switched between input and output at runtime.
///
/// `set_mode` must take effect before it returns; the next level change or
/// sample relies on it.
pub trait IoPin: InputPin + OutputPin {
    /// Switches the pin direction.
    fn set_mode(&mut self, mode: PinMode) -> Result<(), Self::Error>;
}

/// Source of numbered GPIO lines, e.g. the header pins of a single board computer.
pub trait Gpio {
    /// Pin handle handed out by [`Gpio::open`].
    type Pin: IoPin;

    /// Acquires exclusive control of `line` and configures it in `mode`.
    fn open(
        &mut self,
        line: u8,
        mode: PinMode,
    ) -> Result<Self::Pin, <Self::Pin as embedded_hal::digital::ErrorType>::Error>;
}

/// A pin together with the direction it was last switched to.
///
/// Every direction change goes through [`Line::drive`] or [`Line::sense`], so
/// the mode is always known before the next level change or sample.
pub struct Line<P> {
    pin: P,
    mode: PinMode,
}

impl<P: IoPin> Line<P> {
    /// Switches `pin` to `mode` and starts tracking it.
    pub fn configure(mut pin: P, mode: PinMode) -> Result<Self, P::Error> {
        pin.set_mode(mode)?;
        Ok(Line { pin, mode })
    }

    /// Tracks a pin that is already in `mode`, such as one returned by [`Gpio::open`].
    pub fn opened(pin: P, mode: PinMode) -> Self {
        Line { pin, mode }
    }

    /// Current direction.
    pub fn mode(&self) -> PinMode {
        self.mode
    }

    /// Switches to output.
    pub fn drive(&mut self) -> Result<(), P::Error> {
        self.switch(PinMode::Output)
    }

    /// Switches to input.
    pub fn sense(&mut self) -> Result<(), P::Error> {
        self.switch(PinMode::Input)
    }

    fn switch(&mut self, mode: PinMode) -> Result<(), P::Error> {
        self.pin.set_mode(mode)?;
        self.mode = mode;
        Ok(())
    }

    /// Drives the line high. Only valid while driving.
    pub fn set_high(&mut self) -> Result<(), P::Error> {
        debug_assert_eq!(self.mode, PinMode::Output, "set_high on a sensing line");
        self.pin.set_high()
    }

    /// Drives the line low. Only valid while driving.
    pub fn set_low(&mut self) -> Result<(), P::Error> {
        debug_assert_eq!(self.mode, PinMode::Output, "set_low on a sensing line");
        self.pin.set_low()
    }

    /// Drives the line to `high`.
    pub fn set_level(&mut self, high: bool) -> Result<(), P::Error> {
        if high {
            self.set_high()
        } else {
            self.set_low()
        }
    }

    /// Samples the line. Only valid while sensing.
    pub fn is_high(&mut self) -> Result<bool, P::Error> {
        debug_assert_eq!(self.mode, PinMode::Input, "sampling a driven line");
        self.pin.is_high()
    }

    /// Stops tracking and hands the pin back.
    pub fn into_inner(self) -> P {
        self.pin
    }
}
