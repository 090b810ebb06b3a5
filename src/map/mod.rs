use crate::components::{FloorId, ShapeId, ShapeProperties};
use crate::geometry::{Polygon, from_array_p};
use crate::navigation::TeleportTarget;
use crate::resources::VantageSettings;
use crate::scene::errors::{VantageError, VantageResult};
use crate::scene::{MutationCoordinator, Outline, SceneShape};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use validator::{Validate, ValidationError, ValidationErrors};

/// Scene description: floors, shapes with their blocking flags, and zones
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Resource)]
pub struct MapDefinition {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(length(min = 1), nested)]
    pub floors: Vec<FloorDefinition>,
    #[serde(default)]
    #[validate(nested)]
    pub shapes: Vec<ShapeDefinition>,
    #[serde(default)]
    #[validate(nested)]
    pub zones: Vec<ZoneDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FloorDefinition {
    pub id: FloorId,
    #[validate(length(min = 1, max = 64))]
    pub name: String,
}

/// A shape placed on a floor; `position` is its reference point
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ShapeDefinition {
    pub id: ShapeId,
    pub floor: FloorId,
    pub position: [f32; 2],
    #[serde(default)]
    pub blocks_movement: bool,
    #[serde(default)]
    pub blocks_vision: bool,
    #[serde(default)]
    pub prevent_sync: bool,
    #[validate(custom(function = "validate_outline"))]
    pub outline: Outline,
}

/// A teleport zone; moves committed into it are reported with its target
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ZoneDefinition {
    pub id: ShapeId,
    pub floor: FloorId,
    pub position: [f32; 2],
    #[validate(custom(function = "validate_outline"))]
    pub outline: Outline,
    pub target: Option<TeleportTarget>,
}

fn validate_outline(outline: &Outline) -> Result<(), ValidationError> {
    Polygon::new(outline.boundary(Vec2::ZERO))
        .map(|_| ())
        .map_err(|err| {
            let mut error = ValidationError::new("outline");
            error.message = Some(err.to_string().into());
            error
        })
}

fn describe(errors: &ValidationErrors) -> String {
    let error_details = errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            format!("{field}: {}", error_msgs.join(", "))
        })
        .collect::<Vec<String>>();

    // Errors inside floors, shapes or zones only show up in the nested report
    if error_details.is_empty() {
        errors.to_string()
    } else {
        error_details.join("; ")
    }
}

impl ShapeDefinition {
    pub fn to_scene_shape(&self) -> SceneShape {
        SceneShape::new(self.id, self.floor, from_array_p(self.position), self.outline.clone())
            .with_properties(ShapeProperties::new(self.blocks_movement, self.blocks_vision))
            .with_prevent_sync(self.prevent_sync)
    }
}

impl MapDefinition {
    pub fn from_toml_str(contents: &str) -> VantageResult<Self> {
        let map: MapDefinition = toml::from_str(contents)?;
        map.validate().map_err(|validation_errors| VantageError::MapValidationFailed {
            reason: describe(&validation_errors),
        })?;
        Ok(map)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> VantageResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VantageError::MapFileNotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> VantageResult<()> {
        self.validate().map_err(|validation_errors| VantageError::MapValidationFailed {
            reason: describe(&validation_errors),
        })?;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Checks every shape and zone against `coordinator` before anything is
    /// added: floors must be known, ids unused and footprints valid
    fn check_placement(&self, coordinator: &MutationCoordinator) -> VantageResult<()> {
        let floors: BTreeSet<FloorId> = self.floors.iter().map(|floor| floor.id).collect();
        let known = |floor: FloorId| floors.contains(&floor) || coordinator.obstructions().floor(floor).is_some();

        let mut ids = BTreeSet::new();
        for definition in &self.shapes {
            if !known(definition.floor) {
                return Err(VantageError::FloorNotLoaded { floor: definition.floor });
            }
            if !ids.insert(definition.id) || coordinator.shapes().contains(definition.id) {
                return Err(VantageError::DuplicateShape { shape: definition.id });
            }
            let shape = definition.to_scene_shape();
            if !shape.properties.blocked_kinds().is_empty() {
                shape.footprint()?;
            }
        }
        for zone in &self.zones {
            if !known(zone.floor) {
                return Err(VantageError::FloorNotLoaded { floor: zone.floor });
            }
            Polygon::new(zone.outline.boundary(from_array_p(zone.position)))?;
        }
        Ok(())
    }

    /// Loads every floor, then adds all shapes in one batch and the zones.
    /// Nothing is loaded when any shape or zone is rejected.
    pub fn populate(&self, coordinator: &mut MutationCoordinator) -> VantageResult<()> {
        self.check_placement(coordinator)?;
        for floor in &self.floors {
            coordinator.load_floor(floor.id);
        }

        let mut batch = coordinator.begin_batch();
        let added = self
            .shapes
            .iter()
            .try_for_each(|shape| batch.add_shape(shape.to_scene_shape()));
        batch.commit();
        added?;

        for zone in &self.zones {
            let points = zone.outline.boundary(from_array_p(zone.position));
            coordinator.add_teleport_zone(zone.floor, zone.id, &points, zone.target)?;
        }

        info!(
            "Loaded map '{}': {} floors, {} shapes, {} zones",
            self.name,
            self.floors.len(),
            self.shapes.len(),
            self.zones.len()
        );
        Ok(())
    }

    pub fn build_coordinator(&self, settings: VantageSettings) -> VantageResult<MutationCoordinator> {
        let mut coordinator = MutationCoordinator::new(settings);
        self.populate(&mut coordinator)?;
        Ok(coordinator)
    }
}
