//! Status word decoding for the USART and I2C peripherals.
//!
//! [`LineStatus`] decodes the USART status register (SR on F4, ISR on F7;
//! the bits used here sit at the same positions on both). [`BusStatus`]
//! decodes either I2C status register into one common shape so that the
//! transaction state machine never looks at raw bits.

use super::error::{BusError, SerialError};
use crate::register::i2c::{
    F4_SR1_ADD10, F4_SR1_ADDR, F4_SR1_AF, F4_SR1_ARLO, F4_SR1_BERR, F4_SR1_BTF, F4_SR1_OVR,
    F4_SR1_PECERR, F4_SR1_SB, F4_SR1_SMBALERT, F4_SR1_STOPF, F4_SR1_TIMEOUT, F7_ISR_ALERT,
    F7_ISR_ARLO, F7_ISR_BERR, F7_ISR_NACKF, F7_ISR_OVR, F7_ISR_PECERR, F7_ISR_STOPF, F7_ISR_TC,
    F7_ISR_TIMEOUT,
};
use crate::register::usart::{
    STATUS_FE, STATUS_IDLE, STATUS_LBD, STATUS_NF, STATUS_ORE, STATUS_PE, STATUS_RXNE, STATUS_TC,
    STATUS_TXE,
};

// =============================================================================
// Line Status
// =============================================================================

/// Serial status flags parsed from one read of the status register.
///
/// # Example
///
/// ```ignore
/// let status = LineStatus::from_raw(regs.read(V::STATUS));
/// for kind in status.errors() {
///     handler.error(kind);
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineStatus {
    /// Parity error
    pub parity_error: bool,
    /// Framing error
    pub framing_error: bool,
    /// Noise detected
    pub noise: bool,
    /// Overrun: a byte arrived before the previous one was read
    pub overrun: bool,
    /// Idle line detected
    pub idle: bool,
    /// Receive data register not empty
    pub rx_not_empty: bool,
    /// Transmission complete
    pub tx_complete: bool,
    /// Transmit data register empty
    pub tx_empty: bool,
    /// Line break detected
    pub line_break: bool,
}

impl LineStatus {
    /// Create from a raw status register value
    #[inline]
    pub fn from_raw(status: u32) -> Self {
        Self {
            parity_error: (status & STATUS_PE) != 0,
            framing_error: (status & STATUS_FE) != 0,
            noise: (status & STATUS_NF) != 0,
            overrun: (status & STATUS_ORE) != 0,
            idle: (status & STATUS_IDLE) != 0,
            rx_not_empty: (status & STATUS_RXNE) != 0,
            tx_complete: (status & STATUS_TC) != 0,
            tx_empty: (status & STATUS_TXE) != 0,
            line_break: (status & STATUS_LBD) != 0,
        }
    }

    /// Check if any error flag is set
    #[inline]
    pub fn has_error(&self) -> bool {
        self.parity_error || self.framing_error || self.noise || self.overrun || self.line_break
    }

    /// Error kinds present, in service order: overrun, framing, parity,
    /// noise, line break.
    pub fn errors(&self) -> impl Iterator<Item = SerialError> {
        [
            (self.overrun, SerialError::Overrun),
            (self.framing_error, SerialError::Framing),
            (self.parity_error, SerialError::Parity),
            (self.noise, SerialError::Noise),
            (self.line_break, SerialError::LineBreak),
        ]
        .into_iter()
        .filter_map(|(set, kind)| set.then_some(kind))
    }
}

// =============================================================================
// Bus Status
// =============================================================================

/// I2C status flags, common to both silicon generations.
///
/// Flags a generation does not have stay `false` (F4 has no transfer-complete
/// counter, F7 has no start-bit or address-sent events in master mode).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusStatus {
    /// Start condition generated (F4 SB)
    pub start_sent: bool,
    /// Address acknowledged (F4 ADDR)
    pub address_sent: bool,
    /// 10-bit header sent (F4 ADD10)
    pub header_sent: bool,
    /// Byte transfer finished (F4 BTF)
    pub byte_finished: bool,
    /// Byte counter reached zero without auto-end (F7 TC)
    pub transfer_complete: bool,
    /// Stop condition detected
    pub stop_detected: bool,
    /// NACK received
    pub nack: bool,
    /// Misplaced start or stop
    pub bus_error: bool,
    /// Arbitration lost
    pub arbitration_lost: bool,
    /// Overrun or underrun
    pub overrun: bool,
    /// PEC mismatch
    pub pec_error: bool,
    /// Timeout or tLOW violation
    pub timeout: bool,
    /// SMBus alert
    pub alert: bool,
    /// Register value the flags were decoded from
    pub raw: u32,
}

impl BusStatus {
    /// Decode an F4 SR1 value
    pub fn from_f4(sr1: u32) -> Self {
        Self {
            start_sent: (sr1 & F4_SR1_SB) != 0,
            address_sent: (sr1 & F4_SR1_ADDR) != 0,
            header_sent: (sr1 & F4_SR1_ADD10) != 0,
            byte_finished: (sr1 & F4_SR1_BTF) != 0,
            transfer_complete: false,
            stop_detected: (sr1 & F4_SR1_STOPF) != 0,
            nack: (sr1 & F4_SR1_AF) != 0,
            bus_error: (sr1 & F4_SR1_BERR) != 0,
            arbitration_lost: (sr1 & F4_SR1_ARLO) != 0,
            overrun: (sr1 & F4_SR1_OVR) != 0,
            pec_error: (sr1 & F4_SR1_PECERR) != 0,
            timeout: (sr1 & F4_SR1_TIMEOUT) != 0,
            alert: (sr1 & F4_SR1_SMBALERT) != 0,
            raw: sr1,
        }
    }

    /// Decode an F7 ISR value
    pub fn from_f7(isr: u32) -> Self {
        Self {
            start_sent: false,
            address_sent: false,
            header_sent: false,
            byte_finished: false,
            transfer_complete: (isr & F7_ISR_TC) != 0,
            stop_detected: (isr & F7_ISR_STOPF) != 0,
            nack: (isr & F7_ISR_NACKF) != 0,
            bus_error: (isr & F7_ISR_BERR) != 0,
            arbitration_lost: (isr & F7_ISR_ARLO) != 0,
            overrun: (isr & F7_ISR_OVR) != 0,
            pec_error: (isr & F7_ISR_PECERR) != 0,
            timeout: (isr & F7_ISR_TIMEOUT) != 0,
            alert: (isr & F7_ISR_ALERT) != 0,
            raw: isr,
        }
    }

    /// Check if any error flag is set (NACK included)
    #[inline]
    pub fn has_error(&self) -> bool {
        self.first_error().is_some()
    }

    /// Most significant error present.
    ///
    /// Priority: bus error, arbitration lost, NACK, overrun, timeout, alert,
    /// PEC.
    pub fn first_error(&self) -> Option<BusError> {
        if self.bus_error {
            Some(BusError::Bus)
        } else if self.arbitration_lost {
            Some(BusError::ArbitrationLost)
        } else if self.nack {
            Some(BusError::AcknowledgeFailure)
        } else if self.overrun {
            Some(BusError::OverrunUnderrun)
        } else if self.timeout {
            Some(BusError::Timing)
        } else if self.alert {
            Some(BusError::ProtocolAlert)
        } else if self.pec_error {
            Some(BusError::PacketErrorCheck)
        } else {
            None
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec::Vec;

    use super::*;

    #[test]
    fn line_status_from_raw_zero() {
        let status = LineStatus::from_raw(0);
        assert_eq!(status, LineStatus::default());
        assert!(!status.has_error());
        assert_eq!(status.errors().count(), 0);
    }

    #[test]
    fn line_status_data_flags() {
        let status = LineStatus::from_raw(STATUS_RXNE | STATUS_TXE | STATUS_IDLE);
        assert!(status.rx_not_empty);
        assert!(status.tx_empty);
        assert!(status.idle);
        assert!(!status.tx_complete);
        assert!(!status.has_error());
    }

    #[test]
    fn line_status_errors_in_service_order() {
        let raw = STATUS_PE | STATUS_FE | STATUS_NF | STATUS_ORE | STATUS_LBD;
        let errors: Vec<_> = LineStatus::from_raw(raw).errors().collect();
        assert_eq!(
            errors,
            [
                SerialError::Overrun,
                SerialError::Framing,
                SerialError::Parity,
                SerialError::Noise,
                SerialError::LineBreak,
            ]
        );
    }

    #[test]
    fn line_status_ignores_unknown_bits() {
        assert_eq!(LineStatus::from_raw(1 << 20), LineStatus::default());
    }

    #[test]
    fn bus_status_f4_events() {
        let status = BusStatus::from_f4(F4_SR1_SB | F4_SR1_BTF);
        assert!(status.start_sent);
        assert!(status.byte_finished);
        assert!(!status.transfer_complete);
        assert!(!status.has_error());
        assert_eq!(status.raw, F4_SR1_SB | F4_SR1_BTF);
    }

    #[test]
    fn bus_status_f7_events() {
        let status = BusStatus::from_f7(F7_ISR_TC | F7_ISR_STOPF);
        assert!(status.transfer_complete);
        assert!(status.stop_detected);
        assert!(!status.start_sent);
    }

    #[test]
    fn bus_status_nack_maps_to_acknowledge_failure() {
        assert_eq!(
            BusStatus::from_f7(F7_ISR_NACKF).first_error(),
            Some(BusError::AcknowledgeFailure)
        );
        assert_eq!(
            BusStatus::from_f4(F4_SR1_AF).first_error(),
            Some(BusError::AcknowledgeFailure)
        );
    }

    #[test]
    fn bus_status_error_priority() {
        let status = BusStatus::from_f7(F7_ISR_ARLO | F7_ISR_NACKF | F7_ISR_BERR);
        assert_eq!(status.first_error(), Some(BusError::Bus));

        let status = BusStatus::from_f4(F4_SR1_OVR | F4_SR1_TIMEOUT | F4_SR1_PECERR);
        assert_eq!(status.first_error(), Some(BusError::OverrunUnderrun));

        let status = BusStatus::from_f4(F4_SR1_SMBALERT | F4_SR1_PECERR);
        assert_eq!(status.first_error(), Some(BusError::ProtocolAlert));
    }
}
