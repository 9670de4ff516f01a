//! Drive current tables.
//!
//! The forcing current depends on the current class of the measurement step
//! and on the structure material. Magnitudes are stored as plain numbers and
//! scaled by a decimal exponent shared by the whole table, so the SMU command
//! can carry them verbatim (`DI1,0,100E-6,10`).

use std::collections::HashMap;
use std::fmt;

/// Material key matching any material.
pub const ANY_MATERIAL: &str = "*";

/// Which current table a measurement step draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurrentClass {
    /// Greek cross 4-point rotations
    SheetResistance,
    /// Linewidth, semicircle and line segments
    Linewidth,
}

impl fmt::Display for CurrentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrentClass::SheetResistance => f.write_str("sheet resistance"),
            CurrentClass::Linewidth => f.write_str("linewidth"),
        }
    }
}

/// A forced current as `magnitude x 10^exponent` amps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveCurrent {
    /// Mantissa as sent to the SMU
    pub magnitude: f64,
    /// Decimal exponent
    pub exponent: i32,
}

impl DriveCurrent {
    /// `magnitude x 10^exponent` amps.
    pub fn new(magnitude: f64, exponent: i32) -> Self {
        Self {
            magnitude,
            exponent,
        }
    }

    /// Current in amps.
    pub fn amps(&self) -> f64 {
        // Divide for negative exponents: 100 / 1e6 rounds to exactly 100e-6
        if self.exponent < 0 {
            self.magnitude / 10f64.powi(-self.exponent)
        } else {
            self.magnitude * 10f64.powi(self.exponent)
        }
    }
}

impl fmt::Display for DriveCurrent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}E{}", self.magnitude, self.exponent)
    }
}

/// Per (class, material) current magnitudes.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentTable {
    exponent: i32,
    magnitudes: HashMap<(CurrentClass, String), f64>,
}

impl CurrentTable {
    /// Empty table scaled by `10^exponent`.
    pub fn new(exponent: i32) -> Self {
        Self {
            exponent,
            magnitudes: HashMap::new(),
        }
    }

    /// Set the magnitude for one class and material.
    pub fn with_current(mut self, class: CurrentClass, material: &str, magnitude: f64) -> Self {
        self.magnitudes
            .insert((class, material.to_string()), magnitude);
        self
    }

    /// Resolve the current for a material, falling back to [`ANY_MATERIAL`].
    pub fn current(&self, class: CurrentClass, material: &str) -> Option<DriveCurrent> {
        self.magnitudes
            .get(&(class, material.to_string()))
            .or_else(|| self.magnitudes.get(&(class, ANY_MATERIAL.to_string())))
            .map(|&magnitude| DriveCurrent::new(magnitude, self.exponent))
    }

    /// Ag/AgCl reference electrode test chip: 100 uA linewidth, 50 uA sheet.
    pub fn agcl() -> Self {
        const MATERIALS: [&str; 6] = ["Pt", "Pt_Cl", "Ag", "Ag_Cl", "Pt_Ag", "Pt_Ag_Cl"];
        MATERIALS.iter().fold(Self::new(-6), |table, material| {
            table
                .with_current(CurrentClass::Linewidth, material, 100.0)
                .with_current(CurrentClass::SheetResistance, material, 50.0)
        })
    }

    /// Cross-bridge chips: 100 mA sheet, 30 mA line, any material.
    pub fn crossbridge() -> Self {
        Self::new(-3)
            .with_current(CurrentClass::SheetResistance, ANY_MATERIAL, 100.0)
            .with_current(CurrentClass::Linewidth, ANY_MATERIAL, 30.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amps_is_exact_for_micro_amps() {
        let current = DriveCurrent::new(100.0, -6);
        assert_eq!(current.amps(), 100e-6);
        assert_eq!(DriveCurrent::new(50.0, -6).amps(), 50e-6);
        assert_eq!(DriveCurrent::new(30.0, -3).amps(), 30e-3);
        assert_eq!(DriveCurrent::new(2.0, 1).amps(), 20.0);
    }

    #[test]
    fn test_display_matches_smu_notation() {
        assert_eq!(DriveCurrent::new(100.0, -6).to_string(), "100E-6");
    }

    #[test]
    fn test_agcl_table() {
        let table = CurrentTable::agcl();
        assert_eq!(
            table.current(CurrentClass::Linewidth, "Pt"),
            Some(DriveCurrent::new(100.0, -6))
        );
        assert_eq!(
            table.current(CurrentClass::SheetResistance, "Ag_Cl"),
            Some(DriveCurrent::new(50.0, -6))
        );
        assert_eq!(table.current(CurrentClass::Linewidth, "Au"), None);
    }

    #[test]
    fn test_wildcard_material() {
        let table = CurrentTable::crossbridge();
        assert_eq!(
            table.current(CurrentClass::Linewidth, "anything"),
            Some(DriveCurrent::new(30.0, -3))
        );
        assert_eq!(
            table.current(CurrentClass::SheetResistance, ""),
            Some(DriveCurrent::new(100.0, -3))
        );
    }
}
