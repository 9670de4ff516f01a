//! Structure coordinates: the loaded table and the home-relative stage transform.

pub mod table;
pub mod transform;

pub use table::{FieldValue, StructureRecord, StructureTable};
pub use transform::{relative_coordinates, HomeReference, RelativeCoordinate};
