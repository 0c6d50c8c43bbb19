//! STM32F4 I2C (software-sequenced address phase)

use super::{I2cHardware, StartRequest};
use crate::driver::config::{DutyCycle, I2cConfig};
use crate::driver::error::{ConfigError, ConfigResult};
use crate::driver::interrupt::BusStatus;
use crate::register::RegisterAccess;
use crate::register::i2c::{
    F4_CCR, F4_CCR_CCR, F4_CCR_DUTY, F4_CCR_FS, F4_CR1, F4_CR1_ACK, F4_CR1_PE, F4_CR1_START,
    F4_CR1_STOP, F4_CR2, F4_CR2_DMAEN, F4_CR2_FREQ, F4_CR2_ITERREN, F4_CR2_ITEVTEN, F4_CR2_LAST,
    F4_DR, F4_SR1, F4_SR1_ERRORS, F4_SR2, F4_TRISE, F4_TRISE_TRISE,
};

/// Register values derived for one bus speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// CR2.FREQ, peripheral clock in MHz
    pub freq: u32,
    /// CCR.CCR
    pub ccr: u32,
    /// TRISE
    pub trise: u32,
    /// Fast mode (CCR.FS)
    pub fast: bool,
    /// 16/9 duty (CCR.DUTY)
    pub duty_16by9: bool,
    /// Achieved SCL frequency (Hz)
    pub achieved: u32,
}

impl Timing {
    /// CCR register value
    pub const fn ccr_register(&self) -> u32 {
        let mut value = F4_CCR_CCR.set(0, self.ccr);
        if self.fast {
            value |= F4_CCR_FS;
        }
        if self.duty_16by9 {
            value |= F4_CCR_DUTY;
        }
        value
    }
}

/// Derive CCR, TRISE and FREQ for `config` from an APB1 clock of `clock` Hz.
///
/// # Errors
///
/// - `InvalidSpeed`: zero speed
/// - `TimingOutOfRange`: clock outside 2..=50 MHz, or CCR beyond 12 bits
pub fn compute_timing(clock: u32, config: &I2cConfig) -> ConfigResult<Timing> {
    let speed = config.max_speed;
    if speed == 0 {
        return Err(ConfigError::InvalidSpeed);
    }
    if clock == 0 {
        return Err(ConfigError::ClockUnavailable);
    }

    let freq = (clock / 500_000 + 1) / 2;
    if !(2..=50).contains(&freq) {
        return Err(ConfigError::TimingOutOfRange);
    }

    let ratio = clock / speed;
    let (ccr, cycles) = match config.duty_cycle {
        DutyCycle::Standard => (((ratio + 1) / 2).max(4), 2),
        DutyCycle::FastDuty2 => (((ratio + 2) / 3).max(1), 3),
        DutyCycle::FastDuty16by9 => (((ratio + 24) / 25).max(1), 25),
    };
    if ccr > F4_CCR_CCR.mask() {
        return Err(ConfigError::TimingOutOfRange);
    }

    let trise = match config.duty_cycle {
        DutyCycle::Standard => clock / 1_000_000 + 1,
        DutyCycle::FastDuty2 | DutyCycle::FastDuty16by9 => clock / 3_000_000 + 1,
    };

    Ok(Timing {
        freq,
        ccr,
        trise,
        fast: config.duty_cycle != DutyCycle::Standard,
        duty_16by9: config.duty_cycle == DutyCycle::FastDuty16by9,
        achieved: clock / (ccr * cycles),
    })
}

/// F4 I2C peripheral.
///
/// DMA requests are enabled together with LAST, so the final byte of a read
/// DMA is NACKed by hardware.
#[derive(Debug)]
pub struct I2cF4<R> {
    regs: R,
}

impl<R: RegisterAccess> I2cF4<R> {
    /// Wrap the register block (const, suitable for static initialization).
    pub const fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Register block
    pub fn registers(&self) -> &R {
        &self.regs
    }
}

impl<R: RegisterAccess> I2cHardware for I2cF4<R> {
    const MAX_TRANSFER: usize = 65_535;
    const STOP_ON_READ_DMA_COMPLETE: bool = true;

    fn set_timing(&self, clock: u32, config: &I2cConfig) -> ConfigResult<u32> {
        let timing = compute_timing(clock, config)?;

        // CCR and TRISE only take effect with PE clear
        let enabled = self.is_enabled();
        self.regs.clear_bits(F4_CR1, F4_CR1_PE);
        self.regs.set_field(F4_CR2, F4_CR2_FREQ, timing.freq);
        self.regs.write(F4_CCR, timing.ccr_register());
        self.regs
            .write(F4_TRISE, F4_TRISE_TRISE.set(0, timing.trise));
        if enabled {
            self.regs.set_bits(F4_CR1, F4_CR1_PE);
        }

        Ok(timing.achieved)
    }

    fn data_register_addresses(&self) -> (usize, usize) {
        let dr = self.regs.address(F4_DR);
        (dr, dr)
    }

    fn enable(&self) {
        self.regs.set_bits(F4_CR1, F4_CR1_PE | F4_CR1_ACK);
    }

    fn disable(&self) {
        self.regs.clear_bits(F4_CR1, F4_CR1_PE);
    }

    fn is_enabled(&self) -> bool {
        self.regs.read(F4_CR1) & F4_CR1_PE != 0
    }

    fn set_dma_requests(&self, enable: bool) {
        self.regs
            .change_bits(F4_CR2, F4_CR2_DMAEN | F4_CR2_LAST, enable);
    }

    fn set_interrupts(&self, event: bool, error: bool) {
        self.regs.change_bits(F4_CR2, F4_CR2_ITEVTEN, event);
        self.regs.change_bits(F4_CR2, F4_CR2_ITERREN, error);
    }

    fn start(&self, _request: &StartRequest) {
        // address and direction follow on the SB event
        self.regs
            .set_bits(F4_CR1, F4_CR1_START | F4_CR1_ACK);
    }

    fn stop(&self) {
        self.regs.set_bits(F4_CR1, F4_CR1_STOP);
    }

    fn status(&self) -> BusStatus {
        BusStatus::from_f4(self.regs.read(F4_SR1))
    }

    fn clear(&self, status: &BusStatus) {
        // error flags are rc_w0: write zero to the seen ones, one to the
        // rest. Event flags clear through the access sequence.
        let errors = status.raw & F4_SR1_ERRORS;
        if errors != 0 {
            self.regs.write(F4_SR1, F4_SR1_ERRORS & !errors);
        }
    }

    fn send_address(&self, byte: u8) {
        self.regs.write(F4_DR, u32::from(byte));
    }

    fn acknowledge_address(&self, single_byte_read: bool) {
        if single_byte_read {
            self.regs.clear_bits(F4_CR1, F4_CR1_ACK);
        }
        // reading SR2 after SR1 releases ADDR
        let _ = self.regs.read(F4_SR2);
        if single_byte_read {
            self.regs.set_bits(F4_CR1, F4_CR1_STOP);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::i2c::{F4_SR1_AF, F4_SR1_BTF, F4_SR1_SB};
    use crate::testing::MockRegisters;

    fn standard(speed: u32) -> I2cConfig {
        I2cConfig::new().with_max_speed(speed)
    }

    #[test]
    fn standard_mode_at_42_mhz() {
        let timing = compute_timing(42_000_000, &standard(100_000)).unwrap();
        assert_eq!(timing.freq, 42);
        assert_eq!(timing.ccr, 210);
        assert_eq!(timing.trise, 43);
        assert!(!timing.fast);
        assert_eq!(timing.achieved, 100_000);
    }

    #[test]
    fn fast_modes_select_fs_and_duty() {
        let duty2 = compute_timing(
            42_000_000,
            &standard(400_000).with_duty_cycle(DutyCycle::FastDuty2),
        )
        .unwrap();
        assert_eq!(duty2.ccr, 35);
        assert_eq!(duty2.trise, 15);
        assert_eq!(duty2.ccr_register(), 35 | F4_CCR_FS);
        assert_eq!(duty2.achieved, 400_000);

        let duty16 = compute_timing(
            42_000_000,
            &standard(400_000).with_duty_cycle(DutyCycle::FastDuty16by9),
        )
        .unwrap();
        assert_eq!(duty16.ccr, 5);
        assert_eq!(duty16.ccr_register(), 5 | F4_CCR_FS | F4_CCR_DUTY);
        assert_eq!(duty16.achieved, 336_000);
    }

    #[test]
    fn standard_mode_ccr_floor() {
        let timing = compute_timing(2_000_000, &standard(400_000)).unwrap();
        assert_eq!(timing.ccr, 4);
    }

    #[test]
    fn timing_errors() {
        assert_eq!(
            compute_timing(42_000_000, &standard(0)),
            Err(ConfigError::InvalidSpeed)
        );
        assert_eq!(
            compute_timing(1_000_000, &standard(100_000)),
            Err(ConfigError::TimingOutOfRange)
        );
        assert_eq!(
            compute_timing(84_000_000, &standard(100_000)),
            Err(ConfigError::TimingOutOfRange)
        );
        // CCR would need more than 12 bits
        assert_eq!(
            compute_timing(42_000_000, &standard(5_000)),
            Err(ConfigError::TimingOutOfRange)
        );
    }

    #[test]
    fn set_timing_restores_enable() {
        let i2c = I2cF4::new(MockRegisters::new());
        i2c.enable();
        assert_eq!(
            i2c.set_timing(42_000_000, &standard(100_000)),
            Ok(100_000)
        );

        let regs = i2c.registers();
        assert_eq!(regs.field(F4_CR2, F4_CR2_FREQ), 42);
        assert_eq!(regs.get(F4_CCR), 210);
        assert_eq!(regs.get(F4_TRISE), 43);
        assert!(i2c.is_enabled());
        // PE was dropped while timing was written
        assert!(regs.writes_to(F4_CR1).iter().any(|v| v & F4_CR1_PE == 0));
    }

    #[test]
    fn clear_writes_back_only_error_bits() {
        let i2c = I2cF4::new(MockRegisters::new());
        i2c.clear(&BusStatus::from_f4(F4_SR1_SB | F4_SR1_BTF));
        assert!(i2c.registers().writes_to(F4_SR1).is_empty());

        i2c.clear(&BusStatus::from_f4(F4_SR1_AF | F4_SR1_BTF));
        let written = i2c.registers().last_write(F4_SR1).unwrap();
        assert_eq!(written & F4_SR1_AF, 0);
        assert_eq!(written & F4_SR1_BTF, 0);
        assert_eq!(written, F4_SR1_ERRORS & !F4_SR1_AF);
    }

    #[test]
    fn address_phase_register_access() {
        let i2c = I2cF4::new(MockRegisters::new());
        i2c.send_address(0xA1);
        i2c.acknowledge_address(false);
        assert_eq!(i2c.registers().last_write(F4_DR), Some(0xA1));
        assert_eq!(i2c.registers().reads(F4_SR2), 1);
        assert!(i2c.registers().writes_to(F4_CR1).is_empty());
    }

    #[test]
    fn single_byte_read_nacks_before_releasing_address() {
        let i2c = I2cF4::new(MockRegisters::new());
        i2c.enable();
        i2c.registers().clear_writes();

        i2c.acknowledge_address(true);
        let regs = i2c.registers();
        assert_eq!(regs.reads(F4_SR2), 1);
        let cr1 = regs.writes_to(F4_CR1);
        assert_eq!(cr1.len(), 2);
        assert_eq!(cr1[0] & (F4_CR1_ACK | F4_CR1_STOP), 0);
        assert_ne!(cr1[1] & F4_CR1_STOP, 0);
    }

    #[test]
    fn dma_requests_set_last() {
        let i2c = I2cF4::new(MockRegisters::new());
        i2c.set_dma_requests(true);
        assert_eq!(i2c.registers().get(F4_CR2), F4_CR2_DMAEN | F4_CR2_LAST);
        i2c.set_dma_requests(false);
        assert_eq!(i2c.registers().get(F4_CR2), 0);
    }
}
