//! Four-terminal connection topologies.
//!
//! Each configuration forces current from SMU channel 1 through `source` to
//! `ground` and senses the voltage between `sense_high` and `sense_low` with
//! the multimeter. Positive and negative current variants swap both pairs.

use super::pins::{Pin, Port};

/// A named switch-matrix wiring pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Configuration {
    /// Name written to the `config` result column
    pub name: &'static str,
    /// Contact the current is forced into
    pub source: Pin,
    /// Contact returning the current to ground
    pub ground: Pin,
    /// Contact on the multimeter HI input
    pub sense_high: Pin,
    /// Contact on the multimeter LO input
    pub sense_low: Pin,
}

impl Configuration {
    /// Configuration from its four contacts.
    pub const fn new(
        name: &'static str,
        source: Pin,
        ground: Pin,
        sense_high: Pin,
        sense_low: Pin,
    ) -> Self {
        Self {
            name,
            source,
            ground,
            sense_high,
            sense_low,
        }
    }

    /// Matrix connections in the order they are issued.
    pub fn connections(&self) -> [(Port, Pin); 4] {
        [
            (Port::Smu1, self.source),
            (Port::Ground, self.ground),
            (Port::DmmHigh, self.sense_high),
            (Port::DmmLow, self.sense_low),
        ]
    }

    /// The four roles use four distinct contacts.
    pub fn is_well_formed(&self) -> bool {
        let pins = [self.source, self.ground, self.sense_high, self.sense_low];
        pins.iter()
            .enumerate()
            .all(|(i, p)| !pins[i + 1..].contains(p))
    }
}

use super::pins::Pin::{A, B, C, D, E, F, G, H};

/// 300 um linewidth, positive current.
pub const LW300_PLUS: Configuration = Configuration::new("LW300_plus", D, G, A, H);
/// 300 um linewidth, negative current.
pub const LW300_MINUS: Configuration = Configuration::new("LW300_minus", G, D, H, A);

/// 600 um linewidth, positive current.
pub const LW600_PLUS: Configuration = Configuration::new("LW600_plus", D, E, A, F);
/// 600 um linewidth, negative current.
pub const LW600_MINUS: Configuration = Configuration::new("LW600_minus", E, D, F, A);

/// 300 um semicircle, positive current.
pub const SC300_PLUS: Configuration = Configuration::new("SC300_plus", F, E, H, G);
/// 300 um semicircle, negative current.
pub const SC300_MINUS: Configuration = Configuration::new("SC300_minus", E, F, G, H);

/// Greek cross at 0 degrees, positive current.
pub const R_0_I_PLUS: Configuration = Configuration::new("R_0_I_plus", A, B, D, C);
/// Greek cross at 0 degrees, negative current.
pub const R_0_I_MINUS: Configuration = Configuration::new("R_0_I_minus", B, A, C, D);
/// Greek cross at 90 degrees, positive current.
pub const R_90_I_PLUS: Configuration = Configuration::new("R_90_I_plus", D, A, C, B);
/// Greek cross at 90 degrees, negative current.
pub const R_90_I_MINUS: Configuration = Configuration::new("R_90_I_minus", A, D, B, C);

/// Cross-bridge line segment, positive current.
pub const LINE_I_PLUS: Configuration = Configuration::new("LINE_I_plus", D, E, B, F);
/// Cross-bridge line segment, negative current.
pub const LINE_I_MINUS: Configuration = Configuration::new("LINE_I_minus", E, D, F, B);

/// Every predefined configuration.
pub const ALL: [Configuration; 12] = [
    LW300_PLUS,
    LW300_MINUS,
    LW600_PLUS,
    LW600_MINUS,
    SC300_PLUS,
    SC300_MINUS,
    R_0_I_PLUS,
    R_0_I_MINUS,
    R_90_I_PLUS,
    R_90_I_MINUS,
    LINE_I_PLUS,
    LINE_I_MINUS,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_configurations_use_distinct_pins() {
        for config in ALL {
            assert!(config.is_well_formed(), "{} reuses a contact", config.name);
        }
    }

    #[test]
    fn test_connection_order() {
        let connections = LW300_PLUS.connections();
        assert_eq!(connections[0], (Port::Smu1, Pin::D));
        assert_eq!(connections[1], (Port::Ground, Pin::G));
        assert_eq!(connections[2], (Port::DmmHigh, Pin::A));
        assert_eq!(connections[3], (Port::DmmLow, Pin::H));
    }

    #[test]
    fn test_minus_variants_reverse_both_pairs() {
        let pairs = [
            (LW300_PLUS, LW300_MINUS),
            (LW600_PLUS, LW600_MINUS),
            (SC300_PLUS, SC300_MINUS),
            (R_0_I_PLUS, R_0_I_MINUS),
            (LINE_I_PLUS, LINE_I_MINUS),
        ];
        for (plus, minus) in pairs {
            assert_eq!(plus.source, minus.ground, "{}", plus.name);
            assert_eq!(plus.ground, minus.source, "{}", plus.name);
            assert_eq!(plus.sense_high, minus.sense_low, "{}", plus.name);
            assert_eq!(plus.sense_low, minus.sense_high, "{}", plus.name);
        }
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<&str> = ALL.iter().map(|c| c.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL.len());
    }
}
