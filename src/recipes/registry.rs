//! Structure type to measurement recipe lookup.
//!
//! The registry is plain data: adding a structure type means adding a
//! [`StructureType`] variant and registering its [`Recipe`]. The orchestrator
//! only ever walks the steps of whatever recipe it is handed.

use super::configuration::{self as cfg, Configuration};
use super::currents::{CurrentClass, CurrentTable, DriveCurrent};
use crate::coordinates::StructureRecord;
use crate::error::{AppResult, ProbeError};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

/// Structure types with a known measurement recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureType {
    /// 300 um linewidth
    Lw300,
    /// 600 um linewidth
    Lw600,
    /// Greek cross with 300 um semicircle
    Gc20Sc300,
    /// Greek cross with cross-bridge line segment
    Crossbridge,
}

impl StructureType {
    /// Every known type.
    pub const ALL: [StructureType; 4] = [
        StructureType::Lw300,
        StructureType::Lw600,
        StructureType::Gc20Sc300,
        StructureType::Crossbridge,
    ];

    /// Tag used in the coordinate table's `structure` column.
    pub const fn tag(self) -> &'static str {
        match self {
            StructureType::Lw300 => "LW300",
            StructureType::Lw600 => "LW600",
            StructureType::Gc20Sc300 => "GC20_SC300",
            StructureType::Crossbridge => "CROSSBRIDGE",
        }
    }

    /// Type for a table tag; tags are case sensitive.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }
}

impl fmt::Display for StructureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One measurement of a recipe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecipeStep {
    /// Matrix wiring for the step
    pub configuration: Configuration,
    /// Current table row the step draws from
    pub class: CurrentClass,
}

impl RecipeStep {
    /// Step forced with the sheet resistance current.
    pub const fn sheet(configuration: Configuration) -> Self {
        Self {
            configuration,
            class: CurrentClass::SheetResistance,
        }
    }

    /// Step forced with the linewidth current.
    pub const fn line(configuration: Configuration) -> Self {
        Self {
            configuration,
            class: CurrentClass::Linewidth,
        }
    }
}

/// Ordered measurements for one structure type plus the currents they use.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    structure: StructureType,
    steps: Vec<RecipeStep>,
    currents: CurrentTable,
}

impl Recipe {
    /// Recipe measuring `steps` in order.
    pub fn new(structure: StructureType, steps: Vec<RecipeStep>, currents: CurrentTable) -> Self {
        Self {
            structure,
            steps,
            currents,
        }
    }

    /// Structure type the recipe measures.
    pub fn structure(&self) -> StructureType {
        self.structure
    }

    /// Steps in measurement order.
    pub fn steps(&self) -> &[RecipeStep] {
        &self.steps
    }

    /// Drive current for one step on the given structure.
    pub fn drive_current(&self, step: &RecipeStep, record: &StructureRecord) -> AppResult<DriveCurrent> {
        let material = record.material();
        self.currents
            .current(step.class, &material)
            .ok_or_else(|| ProbeError::UnknownCurrent {
                index: record.index,
                material,
                class: step.class.to_string(),
            })
    }
}

/// Registry of recipes keyed by structure type. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct RecipeRegistry {
    recipes: HashMap<StructureType, Recipe>,
}

/// The recipes for the Ag/AgCl and cross-bridge test chips.
pub static STANDARD_REGISTRY: Lazy<RecipeRegistry> = Lazy::new(RecipeRegistry::standard);

impl RecipeRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recipe, replacing any previous one for the same structure type.
    pub fn register(&mut self, recipe: Recipe) -> AppResult<()> {
        if recipe.steps.is_empty() {
            return Err(ProbeError::Configuration(format!(
                "Recipe for '{}' has no measurement steps",
                recipe.structure
            )));
        }
        self.recipes.insert(recipe.structure, recipe);
        Ok(())
    }

    /// Recipe for a structure type.
    pub fn get(&self, structure: StructureType) -> Option<&Recipe> {
        self.recipes.get(&structure)
    }

    /// Recipe for a structure, by its type tag.
    pub fn resolve(&self, record: &StructureRecord) -> AppResult<&Recipe> {
        let tag = record.structure_tag();
        StructureType::from_tag(&tag)
            .and_then(|structure| self.get(structure))
            .ok_or(ProbeError::UnknownStructureType {
                index: record.index,
                tag,
            })
    }

    /// Number of registered recipes.
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Registry holding the recipes for every [`StructureType`].
    pub fn standard() -> Self {
        let agcl = CurrentTable::agcl();
        let recipes = [
            Recipe::new(
                StructureType::Lw300,
                vec![
                    RecipeStep::line(cfg::LW300_PLUS),
                    RecipeStep::line(cfg::LW300_MINUS),
                ],
                agcl.clone(),
            ),
            Recipe::new(
                StructureType::Lw600,
                vec![
                    RecipeStep::line(cfg::LW600_MINUS),
                    RecipeStep::line(cfg::LW600_PLUS),
                ],
                agcl.clone(),
            ),
            Recipe::new(
                StructureType::Gc20Sc300,
                vec![
                    RecipeStep::sheet(cfg::R_0_I_PLUS),
                    RecipeStep::sheet(cfg::R_0_I_MINUS),
                    RecipeStep::sheet(cfg::R_90_I_PLUS),
                    RecipeStep::sheet(cfg::R_90_I_MINUS),
                    RecipeStep::line(cfg::SC300_PLUS),
                    RecipeStep::line(cfg::SC300_MINUS),
                ],
                agcl,
            ),
            Recipe::new(
                StructureType::Crossbridge,
                vec![
                    RecipeStep::sheet(cfg::R_0_I_PLUS),
                    RecipeStep::sheet(cfg::R_0_I_MINUS),
                    RecipeStep::sheet(cfg::R_90_I_PLUS),
                    RecipeStep::sheet(cfg::R_90_I_MINUS),
                    RecipeStep::line(cfg::LINE_I_PLUS),
                    RecipeStep::line(cfg::LINE_I_MINUS),
                ],
                CurrentTable::crossbridge(),
            ),
        ];

        let recipes = recipes
            .into_iter()
            .map(|recipe| (recipe.structure, recipe))
            .collect();
        Self { recipes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn record(structure: &str, material: &str) -> StructureRecord {
        StructureRecord::new(3, 0.0, 0.0)
            .with_field("structure", structure)
            .with_field("material", material)
    }

    #[test]
    fn test_every_structure_type_has_a_recipe() {
        let registry = &*STANDARD_REGISTRY;
        assert_eq!(registry.len(), StructureType::ALL.len());
        for structure in StructureType::ALL {
            let recipe = registry.get(structure).unwrap();
            assert!(!recipe.steps().is_empty(), "{} has no steps", structure);
            assert_eq!(StructureType::from_tag(structure.tag()), Some(structure));
        }
    }

    #[test]
    fn test_resolve_lw300() {
        let recipe = STANDARD_REGISTRY.resolve(&record("LW300", "Pt")).unwrap();
        let names: Vec<&str> = recipe.steps().iter().map(|s| s.configuration.name).collect();
        assert_eq!(names, vec!["LW300_plus", "LW300_minus"]);
    }

    #[test]
    fn test_lw600_runs_minus_first() {
        let recipe = STANDARD_REGISTRY.get(StructureType::Lw600).unwrap();
        assert_eq!(recipe.steps()[0].configuration.name, "LW600_minus");
    }

    #[test]
    fn test_gc20_mixes_current_classes() {
        let registry = &*STANDARD_REGISTRY;
        let structure = record("GC20_SC300", "Ag");
        let recipe = registry.resolve(&structure).unwrap();
        let currents: Vec<f64> = recipe
            .steps()
            .iter()
            .map(|step| recipe.drive_current(step, &structure).unwrap().amps())
            .collect();
        assert_eq!(currents, vec![50e-6, 50e-6, 50e-6, 50e-6, 100e-6, 100e-6]);
    }

    #[test]
    fn test_unknown_structure_type() {
        let err = STANDARD_REGISTRY.resolve(&record("LW900", "Pt")).unwrap_err();
        assert!(matches!(
            err,
            ProbeError::UnknownStructureType { index: 3, ref tag } if tag == "LW900"
        ));
        assert_eq!(err.kind(), ErrorKind::RecipeLookup);
    }

    #[test]
    fn test_unknown_material_current() {
        let structure = record("LW300", "Au");
        let recipe = STANDARD_REGISTRY.resolve(&structure).unwrap();
        let err = recipe
            .drive_current(&recipe.steps()[0], &structure)
            .unwrap_err();
        assert!(matches!(err, ProbeError::UnknownCurrent { .. }));
        assert_eq!(err.kind(), ErrorKind::RecipeLookup);
    }

    #[test]
    fn test_empty_recipe_is_rejected() {
        let mut registry = RecipeRegistry::new();
        let err = registry
            .register(Recipe::new(StructureType::Lw300, vec![], CurrentTable::agcl()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_custom_registry() {
        let mut registry = RecipeRegistry::new();
        registry
            .register(Recipe::new(
                StructureType::Lw300,
                vec![RecipeStep::line(cfg::LW300_PLUS)],
                CurrentTable::new(-6).with_current(CurrentClass::Linewidth, "Pt", 10.0),
            ))
            .unwrap();
        let structure = record("LW300", "Pt");
        let recipe = registry.resolve(&structure).unwrap();
        assert_eq!(recipe.steps().len(), 1);
        assert_eq!(
            recipe.drive_current(&recipe.steps()[0], &structure).unwrap(),
            DriveCurrent::new(10.0, -6)
        );
        assert!(registry.resolve(&record("LW600", "Pt")).is_err());
    }
}
