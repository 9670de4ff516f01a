//! Measurement recipes: probecard pinout, connection topologies, drive
//! currents and the structure type registry.

pub mod configuration;
pub mod currents;
pub mod pins;
pub mod registry;

pub use configuration::Configuration;
pub use currents::{CurrentClass, CurrentTable, DriveCurrent};
pub use pins::{Pin, Port};
pub use registry::{Recipe, RecipeRegistry, RecipeStep, StructureType, STANDARD_REGISTRY};
