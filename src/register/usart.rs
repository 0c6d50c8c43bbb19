//! USART register layouts
//!
//! The F4 and F7 USARTs share their status and control bit positions but
//! differ in register offsets, the enable bit, the word-length encoding and
//! the way latched flags are cleared. Those differences live behind
//! [`UsartLayout`]; everything else uses the shared constants below.

use super::{Field, RegisterAccess};
use crate::driver::config::WordLength;

// =============================================================================
// Status Bits (F4 SR / F7 ISR)
// =============================================================================

/// Parity error
pub const STATUS_PE: u32 = 1 << 0;
/// Framing error
pub const STATUS_FE: u32 = 1 << 1;
/// Noise detected
pub const STATUS_NF: u32 = 1 << 2;
/// Overrun error
pub const STATUS_ORE: u32 = 1 << 3;
/// Idle line detected
pub const STATUS_IDLE: u32 = 1 << 4;
/// Receive data register not empty
pub const STATUS_RXNE: u32 = 1 << 5;
/// Transmission complete
pub const STATUS_TC: u32 = 1 << 6;
/// Transmit data register empty
pub const STATUS_TXE: u32 = 1 << 7;
/// LIN break detected
pub const STATUS_LBD: u32 = 1 << 8;

// =============================================================================
// Control Register 1 Bits (shared positions)
// =============================================================================

/// Receiver enable
pub const CR1_RE: u32 = 1 << 2;
/// Transmitter enable
pub const CR1_TE: u32 = 1 << 3;
/// Idle interrupt enable
pub const CR1_IDLEIE: u32 = 1 << 4;
/// RXNE interrupt enable
pub const CR1_RXNEIE: u32 = 1 << 5;
/// Transmission complete interrupt enable
pub const CR1_TCIE: u32 = 1 << 6;
/// TXE interrupt enable
pub const CR1_TXEIE: u32 = 1 << 7;
/// Parity error interrupt enable
pub const CR1_PEIE: u32 = 1 << 8;
/// Parity selection (1 = odd)
pub const CR1_PS: u32 = 1 << 9;
/// Parity control enable
pub const CR1_PCE: u32 = 1 << 10;
/// Oversampling by 8
pub const CR1_OVER8: u32 = 1 << 15;

// =============================================================================
// Control Register 2/3 Bits
// =============================================================================

/// LIN break detection interrupt enable
pub const CR2_LBDIE: u32 = 1 << 6;
/// Stop bits field (00 = 1, 01 = 0.5, 10 = 2, 11 = 1.5)
pub const CR2_STOP: Field = Field::new(12, 2);

/// Error interrupt enable (framing, overrun, noise in DMA mode)
pub const CR3_EIE: u32 = 1 << 0;
/// DMA enable receiver
pub const CR3_DMAR: u32 = 1 << 6;
/// DMA enable transmitter
pub const CR3_DMAT: u32 = 1 << 7;
/// RTS enable
pub const CR3_RTSE: u32 = 1 << 8;
/// CTS enable
pub const CR3_CTSE: u32 = 1 << 9;

// =============================================================================
// Baud Rate Register
// =============================================================================

/// Divisor fraction field
pub const BRR_FRACTION: Field = Field::new(0, 4);
/// Divisor mantissa field
pub const BRR_MANTISSA: Field = Field::new(4, 12);

// =============================================================================
// Layout Strategy
// =============================================================================

/// Register map of one USART silicon generation.
pub trait UsartLayout {
    /// Status register offset (SR / ISR)
    const STATUS: usize;
    /// Receive data register offset
    const RX_DATA: usize;
    /// Transmit data register offset
    const TX_DATA: usize;
    /// Baud rate register offset
    const BRR: usize;
    /// Control register 1 offset
    const CR1: usize;
    /// Control register 2 offset
    const CR2: usize;
    /// Control register 3 offset
    const CR3: usize;
    /// USART enable bit in CR1
    const CR1_UE: u32;
    /// All CR1 bits taking part in the word-length encoding
    const CR1_WORD_MASK: u32;

    /// CR1 bits selecting `length`, or `None` if the silicon lacks it.
    fn word_length_bits(length: WordLength) -> Option<u32>;

    /// Clear latched status `flags` that need an explicit write-back.
    ///
    /// Flags that clear themselves through the status-then-data read sequence
    /// are ignored.
    fn acknowledge<R: RegisterAccess>(regs: &R, flags: u32);
}

/// STM32F4 USART (SR/DR/BRR/CR1/CR2/CR3/GTPR).
#[derive(Debug, Clone, Copy, Default)]
pub struct UsartF4;

/// F4 status register offset
pub const F4_SR: usize = 0x00;
/// F4 data register offset
pub const F4_DR: usize = 0x04;
/// F4 baud rate register offset
pub const F4_BRR: usize = 0x08;
/// F4 control register 1 offset
pub const F4_CR1: usize = 0x0C;
/// F4 control register 2 offset
pub const F4_CR2: usize = 0x10;
/// F4 control register 3 offset
pub const F4_CR3: usize = 0x14;

impl UsartLayout for UsartF4 {
    const STATUS: usize = F4_SR;
    const RX_DATA: usize = F4_DR;
    const TX_DATA: usize = F4_DR;
    const BRR: usize = F4_BRR;
    const CR1: usize = F4_CR1;
    const CR2: usize = F4_CR2;
    const CR3: usize = F4_CR3;
    const CR1_UE: u32 = 1 << 13;
    const CR1_WORD_MASK: u32 = 1 << 12;

    fn word_length_bits(length: WordLength) -> Option<u32> {
        match length {
            WordLength::Eight => Some(0),
            WordLength::Nine => Some(1 << 12),
            WordLength::Seven => None,
        }
    }

    fn acknowledge<R: RegisterAccess>(regs: &R, flags: u32) {
        // LBD and TC are rc_w0: write zero to clear, one leaves them alone.
        let write_back = flags & (STATUS_LBD | STATUS_TC);
        if write_back != 0 {
            regs.write(F4_SR, !write_back & 0x3FF);
        }
        // IDLE clears on the SR-then-DR sequence.
        if flags & STATUS_IDLE != 0 {
            let _ = regs.read(F4_DR);
        }
    }
}

/// STM32F7 USART (CR1/CR2/CR3/BRR/GTPR/RTOR/RQR/ISR/ICR/RDR/TDR).
#[derive(Debug, Clone, Copy, Default)]
pub struct UsartF7;

/// F7 control register 1 offset
pub const F7_CR1: usize = 0x00;
/// F7 control register 2 offset
pub const F7_CR2: usize = 0x04;
/// F7 control register 3 offset
pub const F7_CR3: usize = 0x08;
/// F7 baud rate register offset
pub const F7_BRR: usize = 0x0C;
/// F7 interrupt and status register offset
pub const F7_ISR: usize = 0x1C;
/// F7 interrupt flag clear register offset
pub const F7_ICR: usize = 0x20;
/// F7 receive data register offset
pub const F7_RDR: usize = 0x24;
/// F7 transmit data register offset
pub const F7_TDR: usize = 0x28;

/// ICR bits share ISR positions for PE, FE, NF, ORE, IDLE, TC and LBD.
const F7_ICR_MASK: u32 =
    STATUS_PE | STATUS_FE | STATUS_NF | STATUS_ORE | STATUS_IDLE | STATUS_TC | STATUS_LBD;

impl UsartLayout for UsartF7 {
    const STATUS: usize = F7_ISR;
    const RX_DATA: usize = F7_RDR;
    const TX_DATA: usize = F7_TDR;
    const BRR: usize = F7_BRR;
    const CR1: usize = F7_CR1;
    const CR2: usize = F7_CR2;
    const CR3: usize = F7_CR3;
    const CR1_UE: u32 = 1 << 0;
    const CR1_WORD_MASK: u32 = (1 << 12) | (1 << 28);

    fn word_length_bits(length: WordLength) -> Option<u32> {
        match length {
            WordLength::Eight => Some(0),
            WordLength::Nine => Some(1 << 12),
            WordLength::Seven => Some(1 << 28),
        }
    }

    fn acknowledge<R: RegisterAccess>(regs: &R, flags: u32) {
        let clear = flags & F7_ICR_MASK;
        if clear != 0 {
            regs.write(F7_ICR, clear);
        }
    }
}
