use embedded_hal::delay::DelayNs;

use crate::error::{Ack, Error};
use crate::pin::{IoPin, Line, PinMode};

/// Number of clock pulses in the bus reset sequence.
const RESET_PULSES: u8 = 10;

/// Shortest SCK high or low time the sensor accepts, in nanoseconds.
pub const MIN_SETTLE_NS: u32 = 100;

/// Measurement commands understood by the sensor.
///
/// The three leading address bits are always `000`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Measure temperature, 0b0000_0011.
    Temperature = 0b0000_0011,
    /// Measure relative humidity, 0b0000_0101.
    Humidity = 0b0000_0101,
}

/// Timing of the bit-banged bus.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    /// Delay after every clock edge, in nanoseconds.
    ///
    /// This is what keeps SCK pulses above the sensor's minimum width. It is a
    /// lower bound: values below [`MIN_SETTLE_NS`] are raised to it. Raise it
    /// further if the GPIO backend switches faster than the wiring settles.
    pub settle_ns: u32,
    /// Interval between polls of DATA while waiting for a measurement, in milliseconds.
    pub poll_interval_ms: u32,
    /// Number of polls before giving up on a measurement.
    pub poll_attempts: u16,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            settle_ns: 100,
            poll_interval_ms: 10,
            poll_attempts: 100,
        }
    }
}

/// The SHT1x two-wire protocol over a DATA and a SCK line.
///
/// Each public method is one step of a transaction. A measurement is
/// [`send_command`](Self::send_command), [`wait_for_result`](Self::wait_for_result),
/// [`get_data16`](Self::get_data16) and [`skip_crc`](Self::skip_crc), in that
/// order; [`measure`](Self::measure) runs all four. A transaction that fails
/// half way leaves the sensor out of step; call [`reset`](Self::reset) before
/// the next one.
pub struct Protocol<DATA, CLK, D> {
    data: Line<DATA>,
    clock: Line<CLK>,
    delay: D,
    timing: Timing,
}

impl<DATA, CLK, D, E> Protocol<DATA, CLK, D>
where
    DATA: IoPin<Error = E>,
    CLK: IoPin<Error = E>,
    D: DelayNs,
{
    /// Creates the protocol engine over two tracked lines.
    ///
    /// `timing.settle_ns` is raised to [`MIN_SETTLE_NS`] if it is shorter.
    pub fn new(data: Line<DATA>, clock: Line<CLK>, delay: D, mut timing: Timing) -> Self {
        timing.settle_ns = timing.settle_ns.max(MIN_SETTLE_NS);
        Protocol {
            data,
            clock,
            delay,
            timing,
        }
    }

    /// Timing in use.
    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Current direction of the DATA line.
    pub fn data_mode(&self) -> PinMode {
        self.data.mode()
    }

    /// Current direction of the SCK line.
    pub fn clock_mode(&self) -> PinMode {
        self.clock.mode()
    }

    /// Resets the serial interface of the sensor.
    ///
    /// DATA is held high while SCK is pulsed ten times. No acknowledgement is
    /// involved; the sensor simply ends up idle.
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.data.drive()?;
        self.clock.drive()?;
        self.data.set_high()?;

        for _ in 0..RESET_PULSES {
            self.clock_tick(true)?;
            self.clock_tick(false)?;
        }

        #[cfg(feature = "defmt")]
        defmt::trace!("SHT1x: interface reset");
        Ok(())
    }

    /// Sends the transmission start sequence followed by `command`, MSB first,
    /// and checks the sensor's acknowledgement.
    ///
    /// The sensor pulls DATA low while SCK is high on the ninth pulse and
    /// releases it once SCK falls. Both samples are always taken so the edge
    /// sequence is identical whether or not the sensor answers.
    ///
    /// # Errors
    ///
    /// Returns `Error::Handshake` if either acknowledgement sample has the
    /// wrong level.
    pub fn send_command(&mut self, command: u8) -> Result<(), Error<E>> {
        self.data.drive()?;
        self.clock.drive()?;

        // Transmission start: DATA falls while SCK is high, rises while SCK is high again
        self.data.set_high()?;
        self.clock_tick(true)?;
        self.data.set_low()?;
        self.clock_tick(false)?;
        self.clock_tick(true)?;
        self.data.set_high()?;
        self.clock_tick(false)?;

        for i in 0..8 {
            let bit = command & (1 << (7 - i)) != 0;
            self.data.set_level(bit)?;
            self.clock_tick(true)?;
            self.clock_tick(false)?;
        }

        self.clock_tick(true)?;
        self.data.sense()?;
        let pulled = !self.data.is_high()?;
        self.clock_tick(false)?;
        let released = self.data.is_high()?;

        if !pulled {
            #[cfg(feature = "defmt")]
            defmt::warn!("SHT1x: command {=u8:#x} not acknowledged", command);
            return Err(Error::Handshake(Ack::Pulled));
        }
        if !released {
            #[cfg(feature = "defmt")]
            defmt::warn!("SHT1x: DATA still low after command {=u8:#x}", command);
            return Err(Error::Handshake(Ack::Released));
        }
        Ok(())
    }

    /// Waits for the sensor to pull DATA low, which marks the end of a measurement.
    ///
    /// DATA is polled every `poll_interval_ms`, at most `poll_attempts` times.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReadyTimeout` if DATA never goes low.
    pub fn wait_for_result(&mut self) -> Result<(), Error<E>> {
        self.data.sense()?;

        for _ in 0..self.timing.poll_attempts {
            self.delay.delay_ms(self.timing.poll_interval_ms);
            if !self.data.is_high()? {
                return Ok(());
            }
        }

        #[cfg(feature = "defmt")]
        defmt::warn!(
            "SHT1x: no result after {=u16} polls",
            self.timing.poll_attempts
        );
        Err(Error::ReadyTimeout)
    }

    /// Reads the two measurement bytes, MSB first, acknowledging the first one.
    pub fn get_data16(&mut self) -> Result<u16, Error<E>> {
        self.data.sense()?;
        self.clock.drive()?;

        let msb = self.shift_in()?;

        // Acknowledge the first byte so the sensor sends the second one
        self.data.drive()?;
        self.data.set_high()?;
        self.data.set_low()?;
        self.clock_tick(true)?;
        self.clock_tick(false)?;

        self.data.sense()?;
        let lsb = self.shift_in()?;

        let value = (u16::from(msb) * 256) | u16::from(lsb);
        #[cfg(feature = "defmt")]
        defmt::trace!("SHT1x: raw word {=u16:#x}", value);
        Ok(value)
    }

    /// Skips the CRC byte by leaving DATA high through one more clock pulse.
    ///
    /// The sensor treats the missing acknowledgement as the end of the
    /// transmission. The checksum itself is never read.
    pub fn skip_crc(&mut self) -> Result<(), Error<E>> {
        self.data.drive()?;
        self.clock.drive()?;

        self.data.set_high()?;
        self.clock_tick(true)?;
        self.clock_tick(false)?;
        Ok(())
    }

    /// Runs one complete measurement transaction and returns the raw word.
    pub fn measure(&mut self, command: Command) -> Result<u16, Error<E>> {
        self.send_command(command as u8)?;
        self.wait_for_result()?;
        let raw = self.get_data16()?;
        self.skip_crc()?;
        Ok(raw)
    }

    /// Switches both lines to input so neither is left driven.
    pub fn release_lines(&mut self) -> Result<(), Error<E>> {
        self.data.sense()?;
        self.clock.sense()?;
        Ok(())
    }

    /// Returns the pins and the delay provider.
    pub fn into_parts(self) -> (DATA, CLK, D) {
        (self.data.into_inner(), self.clock.into_inner(), self.delay)
    }

    /// Reads eight bits, MSB first, sampling DATA while SCK is high.
    fn shift_in(&mut self) -> Result<u8, E> {
        let mut value: u8 = 0;

        for _ in 0..8 {
            self.clock_tick(true)?;
            let bit = self.data.is_high()?;
            value = (value << 1) | u8::from(bit);
            self.clock_tick(false)?;
        }

        Ok(value)
    }

    /// Moves SCK to `high` and lets the edge settle.
    fn clock_tick(&mut self, high: bool) -> Result<(), E> {
        self.clock.set_level(high)?;
        self.delay.delay_ns(self.timing.settle_ns);
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::script::*;
    use super::*;
    use crate::error::Signal;
    use crate::pin::mock::{Event, Log, MockLine, log};
    use embedded_hal::digital::ErrorKind;
    use embedded_hal_mock::eh1::delay::CheckedDelay;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::delay::Transaction as DelayTx;
    use embedded_hal_mock::eh1::digital::{State as PinState, Transaction as PinTx};

    type TestProtocol<D> = Protocol<MockLine, MockLine, D>;

    fn setup<D: DelayNs>(
        data: &[PinTx],
        clock: &[PinTx],
        delay: D,
    ) -> (TestProtocol<D>, MockLine, MockLine, Log) {
        let events = log();
        let data = MockLine::new(Signal::Data, data, &events);
        let clock = MockLine::new(Signal::Clock, clock, &events);
        let protocol = Protocol::new(
            Line::opened(data.clone(), PinMode::Output),
            Line::opened(clock.clone(), PinMode::Output),
            delay,
            Timing::default(),
        );
        (protocol, data, clock, events)
    }

    #[test]
    fn test_reset() {
        let (mut sht, mut data, mut clock, events) =
            setup(&[PinTx::set(PinState::High)], &pulses(10), NoopDelay);

        sht.reset().unwrap();

        let events = events.borrow();
        assert_eq!(
            events[..3],
            [
                Event::Mode(Signal::Data, PinMode::Output),
                Event::Mode(Signal::Clock, PinMode::Output),
                Event::Level(Signal::Data, true),
            ]
        );
        assert_eq!(events.len(), 3 + 20);

        data.done();
        clock.done();
    }

    #[test]
    fn test_clock_edges_settle() {
        let delay_expects = vec![DelayTx::delay_ns(100); 20];
        let mut delay = CheckedDelay::new(&delay_expects);

        let (mut sht, mut data, mut clock, _) =
            setup(&[PinTx::set(PinState::High)], &pulses(10), &mut delay);
        sht.reset().unwrap();

        data.done();
        clock.done();
        delay.done();
    }

    #[test]
    fn test_settle_time_is_configurable() {
        let delay_expects = vec![DelayTx::delay_ns(1_000); 2];
        let mut delay = CheckedDelay::new(&delay_expects);

        let events = log();
        let mut data = MockLine::new(Signal::Data, &[PinTx::set(PinState::High)], &events);
        let mut clock = MockLine::new(Signal::Clock, &pulses(1), &events);
        let timing = Timing {
            settle_ns: 1_000,
            ..Timing::default()
        };
        let mut sht = Protocol::new(
            Line::opened(data.clone(), PinMode::Output),
            Line::opened(clock.clone(), PinMode::Output),
            &mut delay,
            timing,
        );
        assert_eq!(sht.timing(), timing);
        sht.skip_crc().unwrap();

        data.done();
        clock.done();
        delay.done();
    }

    #[test]
    fn test_settle_time_has_a_floor() {
        let delay_expects = vec![DelayTx::delay_ns(MIN_SETTLE_NS); 2];
        let mut delay = CheckedDelay::new(&delay_expects);

        let events = log();
        let mut data = MockLine::new(Signal::Data, &[PinTx::set(PinState::High)], &events);
        let mut clock = MockLine::new(Signal::Clock, &pulses(1), &events);
        let timing = Timing {
            settle_ns: 0,
            ..Timing::default()
        };
        let mut sht = Protocol::new(
            Line::opened(data.clone(), PinMode::Output),
            Line::opened(clock.clone(), PinMode::Output),
            &mut delay,
            timing,
        );
        assert_eq!(sht.timing().settle_ns, MIN_SETTLE_NS);
        sht.skip_crc().unwrap();

        data.done();
        clock.done();
        delay.done();
    }

    #[test]
    fn test_send_command_every_value() {
        for command in 0..=u8::MAX {
            let (mut sht, mut data, mut clock, events) =
                setup(&command_data(command), &command_clock(), NoopDelay);

            sht.send_command(command).unwrap();

            // The data levels set right after the start sequence are the command bits
            let driven = events
                .borrow()
                .iter()
                .filter_map(|e| match e {
                    Event::Level(Signal::Data, high) => Some(*high),
                    _ => None,
                })
                .skip(3)
                .fold(0u8, |acc, bit| (acc << 1) | u8::from(bit));
            assert_eq!(driven, command);
            assert_eq!(sht.data_mode(), PinMode::Input);

            data.done();
            clock.done();
        }
    }

    #[test]
    fn test_send_command_edge_order() {
        let (mut sht, mut data, mut clock, events) = setup(
            &command_data(Command::Temperature as u8),
            &command_clock(),
            NoopDelay,
        );

        sht.send_command(Command::Temperature as u8).unwrap();

        use Event::*;
        use Signal::*;
        let events = events.borrow();
        assert_eq!(
            events[..9],
            [
                Mode(Data, PinMode::Output),
                Mode(Clock, PinMode::Output),
                Level(Data, true),
                Level(Clock, true),
                Level(Data, false),
                Level(Clock, false),
                Level(Clock, true),
                Level(Data, true),
                Level(Clock, false),
            ]
        );
        // Ninth pulse: rise, release DATA, sample, fall, sample
        assert_eq!(
            events[events.len() - 5..],
            [
                Level(Clock, true),
                Mode(Data, PinMode::Input),
                Sample(Data, false),
                Level(Clock, false),
                Sample(Data, true),
            ]
        );

        data.done();
        clock.done();
    }

    #[test]
    fn test_send_command_missing_ack() {
        let mut data_tx = command_data(Command::Humidity as u8);
        let n = data_tx.len();
        data_tx[n - 2] = PinTx::get(PinState::High);

        let (mut sht, mut data, mut clock, _) = setup(&data_tx, &command_clock(), NoopDelay);

        assert_eq!(
            sht.send_command(Command::Humidity as u8).unwrap_err(),
            Error::Handshake(Ack::Pulled)
        );

        data.done();
        clock.done();
    }

    #[test]
    fn test_send_command_data_held_low() {
        let mut data_tx = command_data(Command::Humidity as u8);
        let n = data_tx.len();
        data_tx[n - 1] = PinTx::get(PinState::Low);

        let (mut sht, mut data, mut clock, _) = setup(&data_tx, &command_clock(), NoopDelay);

        assert_eq!(
            sht.send_command(Command::Humidity as u8).unwrap_err(),
            Error::Handshake(Ack::Released)
        );

        data.done();
        clock.done();
    }

    #[test]
    fn test_wait_for_result() {
        let data_tx = [
            PinTx::get(PinState::High),
            PinTx::get(PinState::High),
            PinTx::get(PinState::Low),
        ];
        let delay_expects = vec![DelayTx::delay_ms(10); 3];
        let mut delay = CheckedDelay::new(&delay_expects);

        let (mut sht, mut data, mut clock, _) = setup(&data_tx, &[], &mut delay);
        sht.wait_for_result().unwrap();
        assert_eq!(sht.data_mode(), PinMode::Input);

        data.done();
        clock.done();
        delay.done();
    }

    #[test]
    fn test_wait_for_result_timeout() {
        let data_tx: Vec<PinTx> = (0..100).map(|_| PinTx::get(PinState::High)).collect();
        let delay_expects = vec![DelayTx::delay_ms(10); 100];
        let mut delay = CheckedDelay::new(&delay_expects);

        let (mut sht, mut data, mut clock, _) = setup(&data_tx, &[], &mut delay);
        assert_eq!(sht.wait_for_result().unwrap_err(), Error::ReadyTimeout);

        // Exactly the bounded number of polls, no more
        data.done();
        clock.done();
        delay.done();
    }

    #[test]
    fn test_get_data16() {
        for value in [0x0000, 0xFFFF, 0x1A2B, 0x8001, 14500, 5000] {
            let (mut sht, mut data, mut clock, _) =
                setup(&word_data(value), &word_clock(), NoopDelay);

            assert_eq!(sht.get_data16().unwrap(), value);

            data.done();
            clock.done();
        }
    }

    #[test]
    fn test_get_data16_acknowledges_first_byte() {
        let (mut sht, mut data, mut clock, events) =
            setup(&word_data(0x00FF), &word_clock(), NoopDelay);

        sht.get_data16().unwrap();

        use Event::*;
        use Signal::*;
        let events = events.borrow();
        // 2 mode switches, then 8 bits of (rise, sample, fall)
        assert_eq!(
            events[2 + 24..2 + 24 + 6],
            [
                Mode(Data, PinMode::Output),
                Level(Data, true),
                Level(Data, false),
                Level(Clock, true),
                Level(Clock, false),
                Mode(Data, PinMode::Input),
            ]
        );

        data.done();
        clock.done();
    }

    #[test]
    fn test_skip_crc() {
        let (mut sht, mut data, mut clock, events) =
            setup(&[PinTx::set(PinState::High)], &pulses(1), NoopDelay);

        sht.skip_crc().unwrap();

        // No sample is ever taken
        assert!(
            !events
                .borrow()
                .iter()
                .any(|e| matches!(e, Event::Sample(..)))
        );

        data.done();
        clock.done();
    }

    #[test]
    fn test_measure() {
        let (data_tx, clock_tx) = measurement(Command::Temperature, 0x1A2B, 1);

        let (mut sht, mut data, mut clock, _) = setup(&data_tx, &clock_tx, NoopDelay);

        assert_eq!(sht.measure(Command::Temperature).unwrap(), 0x1A2B);

        data.done();
        clock.done();
    }

    #[test]
    fn test_measure_stops_after_handshake_error() {
        let mut data_tx = command_data(Command::Temperature as u8);
        let n = data_tx.len();
        data_tx[n - 2] = PinTx::get(PinState::High);

        let (mut sht, mut data, mut clock, _) = setup(&data_tx, &command_clock(), NoopDelay);

        let err: Error<ErrorKind> = sht.measure(Command::Temperature).unwrap_err();
        assert_eq!(err, Error::Handshake(Ack::Pulled));

        data.done();
        clock.done();
    }

    #[test]
    fn test_release_lines() {
        let (mut sht, mut data, mut clock, _) = setup(&[], &[], NoopDelay);

        sht.release_lines().unwrap();
        assert_eq!(sht.data_mode(), PinMode::Input);
        assert_eq!(sht.clock_mode(), PinMode::Input);
        assert_eq!(data.mode(), PinMode::Input);
        assert_eq!(clock.mode(), PinMode::Input);

        data.done();
        clock.done();
    }
}
