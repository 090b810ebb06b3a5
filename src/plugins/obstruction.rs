use crate::components::FloorId;
use crate::map::MapDefinition;
use crate::obstruction::TargetKind;
use crate::resources::VantageConfig;
use crate::scene::{MutationCoordinator, ObstructionEvent};
use bevy::prelude::*;

/// Hosts a [`MutationCoordinator`] inside a Bevy app and re-emits its
/// notifications as Bevy events every frame
pub struct ObstructionPlugin;

#[derive(Resource, Debug, Clone)]
pub struct SceneObstructions(pub MutationCoordinator);

#[derive(Event, Debug, Clone, PartialEq)]
pub struct FloorInvalidated {
    pub floor: FloorId,
    pub full: bool,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct ObstructionRecalculated {
    pub floor: FloorId,
    pub kind: TargetKind,
    pub generation: u64,
}

impl Plugin for ObstructionPlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<VantageConfig>()
            .cloned()
            .unwrap_or_default();

        app.add_event::<FloorInvalidated>()
            .add_event::<ObstructionRecalculated>()
            .insert_resource(SceneObstructions(MutationCoordinator::new(config.settings)))
            .add_systems(Startup, populate_from_map)
            .add_systems(Update, forward_obstruction_events);
    }
}

/// Fills the coordinator from a [`MapDefinition`] resource, when one is present
pub fn populate_from_map(map: Option<Res<MapDefinition>>, mut scene: ResMut<SceneObstructions>) {
    let Some(map) = map else {
        return;
    };
    if let Err(err) = map.populate(&mut scene.0) {
        warn!("Failed to load map '{}' into obstruction indices: {err}", map.name);
    }
}

pub fn forward_obstruction_events(
    mut scene: ResMut<SceneObstructions>,
    mut invalidated: EventWriter<FloorInvalidated>,
    mut recalculated: EventWriter<ObstructionRecalculated>,
) {
    for event in scene.0.drain_events() {
        match event {
            ObstructionEvent::FloorInvalidated { floor, full } => {
                invalidated.write(FloorInvalidated { floor, full });
            }
            ObstructionEvent::Recalculated {
                floor,
                kind,
                generation,
            } => {
                recalculated.write(ObstructionRecalculated {
                    floor,
                    kind,
                    generation,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ShapeId, ShapeProperties};
    use crate::scene::SceneShape;

    fn read_all<E: Event + Clone>(app: &App) -> Vec<E> {
        let events = app.world().resource::<Events<E>>();
        let mut cursor = events.get_cursor();
        cursor.read(events).cloned().collect()
    }

    #[test]
    fn test_events_forwarded_after_update() {
        let mut app = App::new();
        app.add_plugins(ObstructionPlugin);

        {
            let mut scene = app.world_mut().resource_mut::<SceneObstructions>();
            scene.0.load_floor(FloorId(1));
            let mut batch = scene.0.begin_batch();
            batch
                .add_shape(
                    SceneShape::rect(ShapeId(1), FloorId(1), Vec2::ZERO, 5.0, 5.0)
                        .with_properties(ShapeProperties::wall()),
                )
                .unwrap();
            batch.commit();
        }
        app.update();

        let invalidated: Vec<FloorInvalidated> = read_all(&app);
        assert!(invalidated.contains(&FloorInvalidated {
            floor: FloorId(1),
            full: true,
        }));
        let recalculated: Vec<ObstructionRecalculated> = read_all(&app);
        assert_eq!(recalculated.len(), 2);
        assert!(recalculated.iter().all(|e| e.generation == 1));
    }

    #[test]
    fn test_map_resource_populates_on_startup() {
        let map = MapDefinition::from_toml_str(
            "name = \"cellar\"\n[[floors]]\nid = 3\nname = \"cellar\"\n",
        )
        .unwrap();
        let mut app = App::new();
        app.insert_resource(map);
        app.add_plugins(ObstructionPlugin);
        app.update();

        let scene = app.world().resource::<SceneObstructions>();
        assert!(scene.0.obstructions().floor(FloorId(3)).is_some());
    }
}
