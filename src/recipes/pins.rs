//! Probecard pinout and switch-matrix ports.
//!
//! The 4x2 probecard (240 um pitch) is wired to matrix pins of the same number.
//! Contacts are named by letter:
//!
//! ```text
//!   A   B   H   F        17  14  11   8
//!   D   C   G   E        20  23   2   5
//! ```
//!
//! Instruments enter the matrix on ports: the SMU channels on 1-5, SMU ground
//! on 7 and the multimeter high/low inputs on 8 and 9.

use std::fmt;

/// Probecard contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pin {
    /// Matrix pin 17
    A,
    /// Matrix pin 14
    B,
    /// Matrix pin 23
    C,
    /// Matrix pin 20
    D,
    /// Matrix pin 5
    E,
    /// Matrix pin 8
    F,
    /// Matrix pin 2
    G,
    /// Matrix pin 11
    H,
}

impl Pin {
    /// Every contact on the card.
    pub const ALL: [Pin; 8] = [
        Pin::A,
        Pin::B,
        Pin::C,
        Pin::D,
        Pin::E,
        Pin::F,
        Pin::G,
        Pin::H,
    ];

    /// Switch-matrix pin number.
    pub const fn number(self) -> u8 {
        match self {
            Pin::A => 17,
            Pin::B => 14,
            Pin::C => 23,
            Pin::D => 20,
            Pin::E => 5,
            Pin::F => 8,
            Pin::G => 2,
            Pin::H => 11,
        }
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.number())
    }
}

/// Switch-matrix instrument port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    /// 4142B ch 1, 40uV-100V 100mA
    Smu1,
    /// 4142B ch 3, 40uV-200V 1A
    Smu2,
    /// 4142B ch 4, 40uV-100V 100mA
    Smu3,
    /// 4142B ch 5, 40uV-100V 100mA
    Smu4,
    /// 4142B ch 6, +/-40V
    Smu5,
    /// 4142B ground unit
    Ground,
    /// 3458A HI input
    DmmHigh,
    /// 3458A LO input
    DmmLow,
}

impl Port {
    /// Switch-matrix port number.
    pub const fn number(self) -> u8 {
        match self {
            Port::Smu1 => 1,
            Port::Smu2 => 2,
            Port::Smu3 => 3,
            Port::Smu4 => 4,
            Port::Smu5 => 5,
            Port::Ground => 7,
            Port::DmmHigh => 8,
            Port::DmmLow => 9,
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_pin_numbers_are_unique() {
        let numbers: HashSet<u8> = Pin::ALL.iter().map(|p| p.number()).collect();
        assert_eq!(numbers.len(), Pin::ALL.len());
        assert_eq!(Pin::A.number(), 17);
        assert_eq!(Pin::H.number(), 11);
    }

    #[test]
    fn test_port_numbers() {
        assert_eq!(Port::Smu1.number(), 1);
        assert_eq!(Port::Ground.number(), 7);
        assert_eq!(Port::DmmHigh.number(), 8);
        assert_eq!(Port::DmmLow.number(), 9);
    }
}
