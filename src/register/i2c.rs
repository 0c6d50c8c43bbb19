//! I2C register definitions
//!
//! The F4 peripheral sequences the address phase in software (SB, ADD10, ADDR
//! events). The F7 peripheral does it in hardware from CR2 (SADD, NBYTES,
//! AUTOEND). Only offsets and bits live here; the sequencing strategies are in
//! [`crate::driver::i2c`].

use super::Field;

// =============================================================================
// STM32F4 Register Offsets
// =============================================================================

/// Control register 1
pub const F4_CR1: usize = 0x00;
/// Control register 2
pub const F4_CR2: usize = 0x04;
/// Data register
pub const F4_DR: usize = 0x10;
/// Status register 1
pub const F4_SR1: usize = 0x14;
/// Status register 2
pub const F4_SR2: usize = 0x18;
/// Clock control register
pub const F4_CCR: usize = 0x1C;
/// Rise time register
pub const F4_TRISE: usize = 0x20;

// =============================================================================
// STM32F4 Bits
// =============================================================================

/// Peripheral enable
pub const F4_CR1_PE: u32 = 1 << 0;
/// Start generation
pub const F4_CR1_START: u32 = 1 << 8;
/// Stop generation
pub const F4_CR1_STOP: u32 = 1 << 9;
/// Acknowledge enable
pub const F4_CR1_ACK: u32 = 1 << 10;

/// Peripheral clock frequency in MHz
pub const F4_CR2_FREQ: Field = Field::new(0, 6);
/// Error interrupt enable
pub const F4_CR2_ITERREN: u32 = 1 << 8;
/// Event interrupt enable
pub const F4_CR2_ITEVTEN: u32 = 1 << 9;
/// DMA requests enable
pub const F4_CR2_DMAEN: u32 = 1 << 11;
/// Next DMA EOT is the last transfer (NACK the final byte)
pub const F4_CR2_LAST: u32 = 1 << 12;

/// Clock control value
pub const F4_CCR_CCR: Field = Field::new(0, 12);
/// Fast mode duty cycle (1 = 16/9)
pub const F4_CCR_DUTY: u32 = 1 << 14;
/// Fast mode selection
pub const F4_CCR_FS: u32 = 1 << 15;

/// Maximum rise time in bus clock cycles plus one
pub const F4_TRISE_TRISE: Field = Field::new(0, 6);

/// Start bit generated
pub const F4_SR1_SB: u32 = 1 << 0;
/// Address sent and acknowledged
pub const F4_SR1_ADDR: u32 = 1 << 1;
/// Byte transfer finished
pub const F4_SR1_BTF: u32 = 1 << 2;
/// 10-bit header sent
pub const F4_SR1_ADD10: u32 = 1 << 3;
/// Stop detected (slave mode)
pub const F4_SR1_STOPF: u32 = 1 << 4;
/// Bus error
pub const F4_SR1_BERR: u32 = 1 << 8;
/// Arbitration lost
pub const F4_SR1_ARLO: u32 = 1 << 9;
/// Acknowledge failure
pub const F4_SR1_AF: u32 = 1 << 10;
/// Overrun/underrun
pub const F4_SR1_OVR: u32 = 1 << 11;
/// PEC error in reception
pub const F4_SR1_PECERR: u32 = 1 << 12;
/// Timeout or Tlow error
pub const F4_SR1_TIMEOUT: u32 = 1 << 14;
/// SMBus alert
pub const F4_SR1_SMBALERT: u32 = 1 << 15;

/// SR1 error flags; all are rc_w0
pub const F4_SR1_ERRORS: u32 = F4_SR1_BERR
    | F4_SR1_ARLO
    | F4_SR1_AF
    | F4_SR1_OVR
    | F4_SR1_PECERR
    | F4_SR1_TIMEOUT
    | F4_SR1_SMBALERT;

// =============================================================================
// STM32F7 Register Offsets
// =============================================================================

/// Control register 1
pub const F7_CR1: usize = 0x00;
/// Control register 2
pub const F7_CR2: usize = 0x04;
/// Timing register
pub const F7_TIMINGR: usize = 0x10;
/// Interrupt and status register
pub const F7_ISR: usize = 0x18;
/// Interrupt clear register
pub const F7_ICR: usize = 0x1C;
/// Receive data register
pub const F7_RXDR: usize = 0x24;
/// Transmit data register
pub const F7_TXDR: usize = 0x28;

// =============================================================================
// STM32F7 Bits
// =============================================================================

/// Peripheral enable
pub const F7_CR1_PE: u32 = 1 << 0;
/// NACK received interrupt enable
pub const F7_CR1_NACKIE: u32 = 1 << 4;
/// Stop detection interrupt enable
pub const F7_CR1_STOPIE: u32 = 1 << 5;
/// Transfer complete interrupt enable
pub const F7_CR1_TCIE: u32 = 1 << 6;
/// Error interrupts enable
pub const F7_CR1_ERRIE: u32 = 1 << 7;
/// Digital noise filter
pub const F7_CR1_DNF: Field = Field::new(8, 4);
/// Analog noise filter off
pub const F7_CR1_ANFOFF: u32 = 1 << 12;
/// DMA transmission requests enable
pub const F7_CR1_TXDMAEN: u32 = 1 << 14;
/// DMA reception requests enable
pub const F7_CR1_RXDMAEN: u32 = 1 << 15;

/// Slave address
pub const F7_CR2_SADD: Field = Field::new(0, 10);
/// Transfer direction (1 = read)
pub const F7_CR2_RD_WRN: u32 = 1 << 10;
/// 10-bit addressing mode
pub const F7_CR2_ADD10: u32 = 1 << 11;
/// 10-bit read sends only the header after a repeated start
pub const F7_CR2_HEAD10R: u32 = 1 << 12;
/// Start generation
pub const F7_CR2_START: u32 = 1 << 13;
/// Stop generation
pub const F7_CR2_STOP: u32 = 1 << 14;
/// Number of bytes
pub const F7_CR2_NBYTES: Field = Field::new(16, 8);
/// Automatic end mode
pub const F7_CR2_AUTOEND: u32 = 1 << 25;

/// Timing prescaler
pub const F7_TIMINGR_PRESC: Field = Field::new(28, 4);
/// Data setup time
pub const F7_TIMINGR_SCLDEL: Field = Field::new(20, 4);
/// Data hold time
pub const F7_TIMINGR_SDADEL: Field = Field::new(16, 4);
/// SCL high period
pub const F7_TIMINGR_SCLH: Field = Field::new(8, 8);
/// SCL low period
pub const F7_TIMINGR_SCLL: Field = Field::new(0, 8);

/// NACK received
pub const F7_ISR_NACKF: u32 = 1 << 4;
/// Stop detected
pub const F7_ISR_STOPF: u32 = 1 << 5;
/// Transfer complete (NBYTES sent, AUTOEND clear)
pub const F7_ISR_TC: u32 = 1 << 6;
/// Bus error
pub const F7_ISR_BERR: u32 = 1 << 8;
/// Arbitration lost
pub const F7_ISR_ARLO: u32 = 1 << 9;
/// Overrun/underrun
pub const F7_ISR_OVR: u32 = 1 << 10;
/// PEC error
pub const F7_ISR_PECERR: u32 = 1 << 11;
/// Timeout
pub const F7_ISR_TIMEOUT: u32 = 1 << 12;
/// SMBus alert
pub const F7_ISR_ALERT: u32 = 1 << 13;

/// Flags with a matching ICR clear bit
pub const F7_ICR_MASK: u32 = F7_ISR_NACKF
    | F7_ISR_STOPF
    | F7_ISR_BERR
    | F7_ISR_ARLO
    | F7_ISR_OVR
    | F7_ISR_PECERR
    | F7_ISR_TIMEOUT
    | F7_ISR_ALERT
    | (1 << 3);
