//! Room tags and spawn points.

use std::collections::BTreeSet;

use hollowmere_shared::{Rect, SpawnKind, SpawnPoint, TilePos};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::DungeonFloor;
use crate::config::{DungeonConfig, ScheduledFeature};

/// Random draws per spawn point before the room counts as full.
const PLACEMENT_TRIES: u32 = 8;

/// Tags every room and scatters features, hazards and enemies.
pub(super) fn decorate(floor: &mut DungeonFloor, config: &DungeonConfig, rng: &mut ChaCha8Rng) {
    if !config.room_tags.is_empty() {
        for room in &mut floor.rooms {
            room.type_tag = config.room_tags[rng.gen_range(0..config.room_tags.len())].clone();
        }
    }

    let mut used = stairs_positions(floor);
    let kinds = [
        (SpawnKind::Feature, config.features_per_room, &config.feature_tags),
        (SpawnKind::Hazard, config.hazards_per_room, &config.hazard_tags),
        (SpawnKind::Enemy, config.enemies_per_room, &config.enemy_tags),
    ];

    for index in 0..floor.rooms.len() {
        let (room_id, bounds, is_entrance) = {
            let room = &floor.rooms[index];
            (room.id, room.bounds, room.is_entrance)
        };
        for (kind, [min, max], tags) in &kinds {
            if tags.is_empty() || (*kind == SpawnKind::Enemy && is_entrance) {
                continue;
            }
            let count = rng.gen_range(*min..=*max);
            for _ in 0..count {
                let Some(pos) = free_tile(bounds, &used, rng) else {
                    break;
                };
                used.insert(pos);
                floor.spawns.push(SpawnPoint {
                    kind: *kind,
                    tag: tags[rng.gen_range(0..tags.len())].clone(),
                    pos,
                    room: room_id,
                });
            }
        }
    }
}

fn stairs_positions(floor: &DungeonFloor) -> BTreeSet<TilePos> {
    floor
        .rooms
        .iter()
        .filter(|r| r.is_entrance || r.is_exit)
        .map(|r| r.bounds.center())
        .collect()
}

fn free_tile(bounds: Rect, used: &BTreeSet<TilePos>, rng: &mut ChaCha8Rng) -> Option<TilePos> {
    (0..PLACEMENT_TRIES)
        .map(|_| {
            TilePos::new(
                rng.gen_range(bounds.x..bounds.right()),
                rng.gen_range(bounds.y..bounds.bottom()),
            )
        })
        .find(|pos| !used.contains(pos))
}

/// Adds the spawn points of every rule that applies to this floor
/// (`floor % every == 0`), in the exit room.
///
/// Idempotent: a rule whose `(kind, tag)` is already present on the floor
/// adds nothing. Returns the number of points added.
pub fn annotate_scheduled_features(floor: &mut DungeonFloor, rules: &[ScheduledFeature]) -> usize {
    if floor.rooms.is_empty() {
        return 0;
    }
    let mut added = 0;
    for rule in rules {
        if rule.every == 0 || floor.id.floor % rule.every != 0 {
            continue;
        }
        if floor
            .spawns
            .iter()
            .any(|s| s.kind == rule.kind && s.tag == rule.tag)
        {
            continue;
        }

        let mut used = stairs_positions(floor);
        used.extend(floor.spawns.iter().map(|s| s.pos));
        let exit = floor.exit();
        let (room, bounds) = (exit.id, exit.bounds);
        let Some(pos) = bounds.positions().find(|p| !used.contains(p)) else {
            continue;
        };
        floor.spawns.push(SpawnPoint {
            kind: rule.kind,
            tag: rule.tag.clone(),
            pos,
            room,
        });
        added += 1;
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TerrainRegistry, WorldConfig};
    use crate::dungeon::DungeonGenerator;
    use crate::seed::{DungeonId, WorldSeed};

    #[test]
    fn test_annotation_is_idempotent() {
        let world = WorldConfig::standard();
        let gen = DungeonGenerator::new(
            WorldSeed::new(4),
            &world.dungeon,
            &TerrainRegistry::new(&world.terrain),
        );
        let mut floor = gen.generate_floor(DungeonId(1), 6);
        let rules = vec![
            ScheduledFeature {
                every: 3,
                tag: "shrine".to_string(),
                kind: SpawnKind::Feature,
            },
            ScheduledFeature {
                every: 4,
                tag: "boss".to_string(),
                kind: SpawnKind::Enemy,
            },
        ];

        assert_eq!(annotate_scheduled_features(&mut floor, &rules), 1);
        let snapshot = floor.spawn_points().to_vec();
        assert_eq!(annotate_scheduled_features(&mut floor, &rules), 0);
        assert_eq!(floor.spawn_points(), snapshot.as_slice());

        let shrine = snapshot.iter().find(|s| s.tag == "shrine").expect("shrine");
        assert_eq!(shrine.room, floor.exit().id);
        assert_ne!(shrine.pos, floor.exit().bounds.center(), "never on the stairs");
    }
}
