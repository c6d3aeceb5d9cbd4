use embedded_hal::delay::DelayNs;

use crate::calibration::{humidity_from_raw, temperature_from_raw};
use crate::error::{Error, Signal};
use crate::pin::{Gpio, IoPin, Line, PinMode};
use crate::protocol::{Command, Protocol, Timing};

/// Driver for the SHT1x/SHT7x temperature and humidity sensors.
///
/// Works with SHT10, SHT11, SHT15, SHT71 and SHT75. Only one transaction may
/// be in flight at a time; share a sensor between callers behind a mutex.
pub struct Sht1x<DATA, CLK, D> {
    protocol: Protocol<DATA, CLK, D>,
    state: State,
}

/// Lifecycle of a [`Sht1x`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Both lines are acquired and measurements can be taken.
    Ready,
    /// Both lines have been released to input. Terminal.
    Closed,
}

/// Reading returned by the SHT1x sensor.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    /// Temperature in degrees Celsius.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub relative_humidity: f32,
}

impl<DATA, CLK, D, E> Sht1x<DATA, CLK, D>
where
    DATA: IoPin<Error = E>,
    CLK: IoPin<Error = E>,
    D: DelayNs,
{
    /// Creates a new instance of the SHT1x driver with default bus timing.
    ///
    /// # Arguments
    ///
    /// * `data` - The GPIO pin connected to DATA. Must support switching direction.
    /// * `clock` - The GPIO pin connected to SCK.
    /// * `delay` - A delay provider implementing the `DelayNs` trait.
    ///
    /// Both pins are switched to output.
    pub fn new(data: DATA, clock: CLK, delay: D) -> Result<Self, Error<E>> {
        Self::with_timing(data, clock, delay, Timing::default())
    }

    /// Creates a new instance of the SHT1x driver with custom bus timing.
    pub fn with_timing(
        data: DATA,
        clock: CLK,
        delay: D,
        timing: Timing,
    ) -> Result<Self, Error<E>> {
        let mut data = Line::configure(data, PinMode::Output).map_err(|source| {
            Error::PinAcquisition {
                signal: Signal::Data,
                source,
            }
        })?;
        let clock = match Line::configure(clock, PinMode::Output) {
            Ok(clock) => clock,
            Err(source) => {
                // Best effort, the clock error is the one worth reporting
                let _ = data.sense();
                return Err(Error::PinAcquisition {
                    signal: Signal::Clock,
                    source,
                });
            }
        };

        Ok(Sht1x {
            protocol: Protocol::new(data, clock, delay, timing),
            state: State::Ready,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Reads the temperature in degrees Celsius.
    pub fn read_temperature(&mut self) -> Result<f32, Error<E>> {
        let raw = self.measure_raw(Command::Temperature)?;
        Ok(temperature_from_raw(raw))
    }

    /// Reads the relative humidity in percent.
    ///
    /// Humidity compensation needs the current temperature, so this takes a
    /// temperature measurement as well.
    pub fn read_humidity(&mut self) -> Result<f32, Error<E>> {
        self.read_temperature_and_humidity()
            .map(|reading| reading.relative_humidity)
    }

    /// Reads temperature and relative humidity.
    ///
    /// # Returns
    ///
    /// * `Ok(Reading)` if both measurements complete.
    /// * `Err(Error)` if either transaction fails. No partial reading is returned.
    pub fn read_temperature_and_humidity(&mut self) -> Result<Reading, Error<E>> {
        let temperature = self.read_temperature()?;
        let raw = self.measure_raw(Command::Humidity)?;

        Ok(Reading {
            temperature,
            relative_humidity: humidity_from_raw(raw, temperature),
        })
    }

    /// Runs one measurement and returns the uncalibrated 16-bit word.
    pub fn measure_raw(&mut self, command: Command) -> Result<u16, Error<E>> {
        self.ready()?.measure(command)
    }

    /// Resets the sensor's serial interface, e.g. after a failed transaction.
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.ready()?.reset()
    }

    /// Switches both lines back to input so they are no longer driven.
    ///
    /// Calling this on a closed sensor does nothing.
    pub fn close(&mut self) -> Result<(), Error<E>> {
        if self.state == State::Closed {
            return Ok(());
        }

        self.protocol.release_lines()?;
        self.state = State::Closed;

        #[cfg(feature = "defmt")]
        defmt::debug!("SHT1x: closed");
        Ok(())
    }

    /// Closes the sensor and returns the pins and the delay provider.
    pub fn release(mut self) -> Result<(DATA, CLK, D), Error<E>> {
        self.close()?;
        Ok(self.protocol.into_parts())
    }

    fn ready(&mut self) -> Result<&mut Protocol<DATA, CLK, D>, Error<E>> {
        match self.state {
            State::Ready => Ok(&mut self.protocol),
            State::Closed => Err(Error::Closed),
        }
    }
}

impl<P, D, E> Sht1x<P, P, D>
where
    P: IoPin<Error = E>,
    D: DelayNs,
{
    /// Acquires the DATA and SCK lines by number and creates the driver.
    ///
    /// If the clock line cannot be acquired the data line is switched back to
    /// input before the error is returned.
    pub fn open<G>(
        gpio: &mut G,
        data_line: u8,
        clock_line: u8,
        delay: D,
    ) -> Result<Self, Error<E>>
    where
        G: Gpio<Pin = P>,
    {
        let mut data = gpio
            .open(data_line, PinMode::Output)
            .map_err(|source| Error::PinAcquisition {
                signal: Signal::Data,
                source,
            })?;
        let clock = match gpio.open(clock_line, PinMode::Output) {
            Ok(clock) => clock,
            Err(source) => {
                let _ = data.set_mode(PinMode::Input);
                return Err(Error::PinAcquisition {
                    signal: Signal::Clock,
                    source,
                });
            }
        };

        Ok(Sht1x {
            protocol: Protocol::new(
                Line::opened(data, PinMode::Output),
                Line::opened(clock, PinMode::Output),
                delay,
                Timing::default(),
            ),
            state: State::Ready,
        })
    }
}
