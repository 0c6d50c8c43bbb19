//! STM32F7 I2C (hardware-sequenced address phase)

use super::{Direction, I2cHardware, StartRequest};
use crate::constants::{
    I2C_T_AF_MAX, I2C_T_AF_MIN, I2C_T_FALL, I2C_T_HD_DAT, I2C_T_HIGH_MIN, I2C_T_LOW_MIN,
    I2C_T_RISE, I2C_T_SU_DAT, I2C_T_VD_DAT, NS_PER_SECOND,
};
use crate::driver::config::{AddressMode, DutyCycle, I2cConfig};
use crate::driver::error::{ConfigError, ConfigResult};
use crate::driver::interrupt::BusStatus;
use crate::register::RegisterAccess;
use crate::register::i2c::{
    F7_CR1, F7_CR1_ANFOFF, F7_CR1_DNF, F7_CR1_ERRIE, F7_CR1_NACKIE, F7_CR1_PE, F7_CR1_RXDMAEN,
    F7_CR1_STOPIE, F7_CR1_TCIE, F7_CR1_TXDMAEN, F7_CR2, F7_CR2_ADD10, F7_CR2_AUTOEND,
    F7_CR2_NBYTES, F7_CR2_RD_WRN, F7_CR2_SADD, F7_CR2_START, F7_CR2_STOP, F7_ICR, F7_ICR_MASK,
    F7_ISR, F7_RXDR, F7_TIMINGR, F7_TIMINGR_PRESC, F7_TIMINGR_SCLDEL, F7_TIMINGR_SCLH,
    F7_TIMINGR_SCLL, F7_TIMINGR_SDADEL, F7_TXDR,
};

/// Largest prescaler divisor (PRESC is 4 bits, divisor = PRESC + 1)
const PRESC_MAX: i64 = 16;
/// Largest SCLDEL/SDADEL value
const DELAY_MAX: i64 = 15;
/// Largest SCLH/SCLL value
const PERIOD_MAX: i64 = 255;

/// TIMINGR fields derived for one bus speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Prescaler divisor (register field holds `prescaler - 1`)
    pub prescaler: u32,
    /// Data setup time in prescaled cycles, minus one
    pub scldel: u32,
    /// Data hold time in prescaled cycles
    pub sdadel: u32,
    /// SCL high period in prescaled cycles, minus one
    pub sclh: u32,
    /// SCL low period in prescaled cycles, minus one
    pub scll: u32,
    /// Achieved SCL frequency (Hz)
    pub achieved: u32,
}

impl Timing {
    /// TIMINGR register value
    pub const fn register(&self) -> u32 {
        let mut value = F7_TIMINGR_PRESC.set(0, self.prescaler - 1);
        value = F7_TIMINGR_SCLDEL.set(value, self.scldel);
        value = F7_TIMINGR_SDADEL.set(value, self.sdadel);
        value = F7_TIMINGR_SCLH.set(value, self.sclh);
        F7_TIMINGR_SCLL.set(value, self.scll)
    }
}

/// Derive TIMINGR for `config` from an I2C kernel clock of `clock` Hz.
///
/// `digital_filter` is CR1.DNF and `analog_filter` is `!CR1.ANFOFF`; both
/// lengthen the effective SCL edges. All arithmetic is in nanoseconds.
///
/// # Errors
///
/// - `InvalidSpeed`: zero speed
/// - `ClockUnavailable`: zero clock
/// - `TimingOutOfRange`: no prescaler keeps SCLDEL, SCLH and SCLL in range
pub fn compute_timing(
    clock: u32,
    config: &I2cConfig,
    digital_filter: u32,
    analog_filter: bool,
) -> ConfigResult<Timing> {
    if config.max_speed == 0 {
        return Err(ConfigError::InvalidSpeed);
    }
    if clock == 0 {
        return Err(ConfigError::ClockUnavailable);
    }

    let row = config.duty_cycle.timing_index();
    let ns = i64::from(NS_PER_SECOND);
    let clk = i64::from(clock);
    let speed = i64::from(config.max_speed);
    let (high_share, low_share, max_cycles) = match config.duty_cycle {
        DutyCycle::Standard => (1, 1, 255),
        DutyCycle::FastDuty2 | DutyCycle::FastDuty16by9 => (1, 2, 127),
    };

    let period = ns + speed - 1;
    let t_high = (period * high_share / (high_share + low_share) / speed)
        .max(i64::from(I2C_T_HIGH_MIN[row]));
    let t_low = (period * low_share / (high_share + low_share) / speed)
        .max(i64::from(I2C_T_LOW_MIN[row]));
    let t_rise = i64::from(I2C_T_RISE[row]);
    let t_fall = i64::from(I2C_T_FALL[row]);
    let t_setup = i64::from(I2C_T_SU_DAT[row]);
    let t_valid = i64::from(I2C_T_VD_DAT[row]);
    let t_hold = i64::from(I2C_T_HD_DAT[row]);

    let t_clk = (ns + clk - 1) / clk;

    let mut prescaler = clk / (max_cycles * speed) + 1;
    let (t_presc, scldel) = loop {
        if prescaler > PRESC_MAX {
            return Err(ConfigError::TimingOutOfRange);
        }
        let t_presc = ns / (clk / prescaler);
        let scldel = (t_rise + t_setup) / t_presc - 1;
        if scldel <= DELAY_MAX {
            break (t_presc, scldel.max(0));
        }
        prescaler += 1;
    };

    let t_dnf = i64::from(digital_filter) * t_clk;
    let (af_min, af_max) = if analog_filter {
        (i64::from(I2C_T_AF_MIN), i64::from(I2C_T_AF_MAX))
    } else {
        (0, 0)
    };

    let sdadel_min = (t_fall + t_hold - af_min - t_dnf - 3 * t_clk + t_presc - 1) / t_presc;
    let sdadel_max = (t_valid - t_rise - af_max - t_dnf - 4 * t_clk) / t_presc;
    let sdadel = ((sdadel_min + sdadel_max) / 2).clamp(0, DELAY_MAX);

    let sclh = (t_high - af_min - t_dnf - 2 * t_clk + t_presc - 1) / t_presc - 1;
    let scll = (t_low - af_min - t_dnf - 2 * t_clk + t_presc - 1) / t_presc - 1;
    if !(0..=PERIOD_MAX).contains(&sclh) || !(0..=PERIOD_MAX).contains(&scll) {
        return Err(ConfigError::TimingOutOfRange);
    }

    let achieved = (clk / prescaler) / (sclh + 1 + scll + 1);

    Ok(Timing {
        prescaler: prescaler as u32,
        scldel: scldel as u32,
        sdadel: sdadel as u32,
        sclh: sclh as u32,
        scll: scll as u32,
        achieved: achieved as u32,
    })
}

/// F7 I2C peripheral.
#[derive(Debug)]
pub struct I2cF7<R> {
    regs: R,
}

impl<R: RegisterAccess> I2cF7<R> {
    /// Wrap the register block (const, suitable for static initialization).
    pub const fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Register block
    pub fn registers(&self) -> &R {
        &self.regs
    }
}

impl<R: RegisterAccess> I2cHardware for I2cF7<R> {
    const MAX_TRANSFER: usize = 255;
    const STOP_ON_READ_DMA_COMPLETE: bool = false;

    fn set_timing(&self, clock: u32, config: &I2cConfig) -> ConfigResult<u32> {
        let cr1 = self.regs.read(F7_CR1);
        let timing = compute_timing(
            clock,
            config,
            F7_CR1_DNF.get(cr1),
            cr1 & F7_CR1_ANFOFF == 0,
        )?;

        // TIMINGR is only writable with PE clear
        self.regs.clear_bits(F7_CR1, F7_CR1_PE);
        self.regs.write(F7_TIMINGR, timing.register());
        if cr1 & F7_CR1_PE != 0 {
            self.regs.set_bits(F7_CR1, F7_CR1_PE);
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("TIMINGR {=u32:#x}", timing.register());

        Ok(timing.achieved)
    }

    fn data_register_addresses(&self) -> (usize, usize) {
        (self.regs.address(F7_TXDR), self.regs.address(F7_RXDR))
    }

    fn enable(&self) {
        self.regs.set_bits(F7_CR1, F7_CR1_PE);
    }

    fn disable(&self) {
        self.regs.clear_bits(F7_CR1, F7_CR1_PE);
    }

    fn is_enabled(&self) -> bool {
        self.regs.read(F7_CR1) & F7_CR1_PE != 0
    }

    fn set_dma_requests(&self, enable: bool) {
        self.regs
            .change_bits(F7_CR1, F7_CR1_TXDMAEN | F7_CR1_RXDMAEN, enable);
    }

    fn set_interrupts(&self, event: bool, error: bool) {
        self.regs.change_bits(
            F7_CR1,
            F7_CR1_NACKIE | F7_CR1_STOPIE | F7_CR1_TCIE,
            event,
        );
        self.regs.change_bits(F7_CR1, F7_CR1_ERRIE, error);
    }

    fn start(&self, request: &StartRequest) {
        let address = match request.mode {
            AddressMode::SevenBit => u32::from(request.address & 0x7F) << 1,
            AddressMode::TenBit => u32::from(request.address & 0x3FF),
        };
        let mut cr2 = F7_CR2_SADD.set(0, address);
        if request.mode == AddressMode::TenBit {
            cr2 |= F7_CR2_ADD10;
        }
        if request.direction == Direction::Read {
            cr2 |= F7_CR2_RD_WRN;
        }
        cr2 = F7_CR2_NBYTES.set(cr2, request.count as u32);
        if request.auto_stop {
            cr2 |= F7_CR2_AUTOEND;
        }
        self.regs.write(F7_CR2, cr2 | F7_CR2_START);
    }

    fn stop(&self) {
        self.regs.set_bits(F7_CR2, F7_CR2_STOP);
    }

    fn status(&self) -> BusStatus {
        BusStatus::from_f7(self.regs.read(F7_ISR))
    }

    fn clear(&self, status: &BusStatus) {
        let flags = status.raw & F7_ICR_MASK;
        if flags != 0 {
            self.regs.write(F7_ICR, flags);
        }
    }
}
