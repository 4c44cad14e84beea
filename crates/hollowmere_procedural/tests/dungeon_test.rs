//! # Dungeon and Post-Processing Integration Tests
//!
//! Connectivity across many seeds, floors and strategies; floor deltas
//! across sessions; rivers and roads on a streamed overworld region.

use std::collections::HashSet;
use std::sync::Arc;

use hollowmere_procedural::postprocess::{RiverEnd, TileGrid};
use hollowmere_procedural::{
    shared, DungeonGenerator, DungeonId, FloorId, GenerationContext, LayoutStrategy, MemoryDeltaStore,
    SharedDeltaStore, TerrainRegistry, WorldConfig, WorldSeed,
};
use hollowmere_shared::{SpawnKind, TilePos};

fn generator(seed: u64, strategy: LayoutStrategy) -> DungeonGenerator {
    let mut config = WorldConfig::standard();
    config.dungeon.strategy = strategy;
    DungeonGenerator::new(
        WorldSeed::new(seed),
        &config.dungeon,
        &TerrainRegistry::new(&config.terrain),
    )
}

/// Test: BFS from the entrance reaches every room, exit included.
#[test]
fn test_every_floor_fully_connected() {
    let mut floors = 0;
    for strategy in [LayoutStrategy::Rectangular, LayoutStrategy::Bsp, LayoutStrategy::Mixed] {
        for seed in 0..6 {
            let gen = generator(seed, strategy);
            for number in 1..=15 {
                let floor = gen.generate_floor(DungeonId::from_name("burial_barrow"), number);
                let reachable = floor.reachable_rooms();
                assert_eq!(
                    reachable.len(),
                    floor.rooms().len(),
                    "{strategy:?} seed {seed} floor {number}: unreachable rooms"
                );
                assert!(reachable.contains(&floor.exit().id));
                assert!(floor.is_fully_connected(), "{strategy:?} seed {seed} floor {number}");
                assert!(floor.rooms().len() >= gen.config().min_rooms);
                floors += 1;
            }
        }
    }
    println!("Verified {floors} floors");
}

/// Test: a floor regenerates bit-identically from a fresh generator.
#[test]
fn test_floor_regeneration_is_identical() {
    let id = DungeonId::from_name("sunken_keep");
    for number in [1, 2, 7, 40] {
        let a = generator(77, LayoutStrategy::Mixed).generate_floor(id, number);
        let b = generator(77, LayoutStrategy::Mixed).generate_floor(id, number);
        assert_eq!(a.to_bytes(), b.to_bytes(), "floor {number}");
        assert_eq!(a.spawn_points(), b.spawn_points());
    }
}

/// Test: different dungeons and floors do not share layouts.
#[test]
fn test_floors_are_distinct() {
    let gen = generator(5, LayoutStrategy::Mixed);
    let mut digests = HashSet::new();
    for name in ["burial_barrow", "sunken_keep", "ashen_mine"] {
        for number in 1..=5 {
            digests.insert(gen.generate_floor(DungeonId::from_name(name), number).to_bytes());
        }
    }
    assert_eq!(digests.len(), 15);
}

fn context(store: SharedDeltaStore) -> GenerationContext {
    let mut config = WorldConfig::standard();
    config.chunks.worker_threads = 0;
    GenerationContext::new(WorldSeed::new(31), config, store).expect("standard config")
}

/// Test: floor changes persist when leaving and come back in a new session.
#[test]
fn test_floor_delta_across_sessions() {
    let store = shared(MemoryDeltaStore::new());

    let mut ctx = context(Arc::clone(&store));
    let (id, enemy, feature) = (1..=20)
        .find_map(|n| {
            let id = FloorId::new(DungeonId::from_name("burial_barrow"), n);
            let floor = ctx.enter_floor(id).expect("enter");
            let enemy = floor.spawns_of(SpawnKind::Enemy).next()?.pos;
            let feature = floor.spawns_of(SpawnKind::Feature).next()?.pos;
            Some((id, enemy, feature))
        })
        .expect("a floor in 1..=20 with an enemy and a feature");
    ctx.floors().remove_entity(enemy).expect("remove");
    ctx.floors().deplete(feature).expect("deplete");
    ctx.leave_floor().expect("leave");
    drop(ctx);

    let mut ctx = context(store);
    let floor = ctx.enter_floor(id).expect("re-enter");
    for pos in [enemy, feature] {
        assert!(
            floor.active_spawn_points().all(|s| s.pos != pos),
            "spawn at {pos:?} should stay gone"
        );
    }
}

/// Test: rivers and a road on a streamed overworld region.
#[test]
fn test_rivers_and_roads_on_overworld() {
    let mut ctx = context(shared(MemoryDeltaStore::new()));
    let origin = TilePos::new(-32, -32);
    ctx.ensure_active(TilePos::new(0, 0));
    let mut region = ctx.snapshot_region(origin, 64, 64).expect("active area is loaded");

    let terrain = ctx.terrain().clone();
    let water_before: HashSet<TilePos> = region
        .present()
        .into_iter()
        .filter(|p| region.get(*p).is_some_and(|t| terrain.is_water(t.terrain)))
        .collect();

    let rivers = ctx.carve_rivers(&mut region, &[i64::from(origin.x), i64::from(origin.y)]);
    for river in &rivers {
        assert!(river.len() <= ctx.config().rivers.max_length);
        if river.end == RiverEnd::LocalMinimum {
            assert!(river.len() >= ctx.config().rivers.min_length, "short dead ends are discarded");
        }
        for pair in river.elevations.windows(2) {
            assert!(pair[1] <= pair[0], "rivers never climb");
        }
    }

    let water_after: HashSet<TilePos> = region
        .present()
        .into_iter()
        .filter(|p| region.get(*p).is_some_and(|t| terrain.is_water(t.terrain)))
        .collect();
    assert!(water_before.is_subset(&water_after), "carving only adds water");

    let dry: Vec<TilePos> = region
        .present()
        .into_iter()
        .filter(|p| !water_after.contains(p))
        .collect();
    let (Some(&from), Some(&to)) = (dry.first(), dry.last()) else {
        return;
    };
    let road = ctx.carve_road(&mut region, from, to).expect("region is connected");
    assert_eq!(road.points.first(), Some(&from));
    assert_eq!(road.points.last(), Some(&to));
    assert!(road.cost >= f64::from(from.manhattan(to)), "every step costs at least 1");
    for pos in &water_after {
        let tile = region.get(*pos).expect("in region");
        assert!(terrain.is_water(tile.terrain), "road overwrote water at {pos:?}");
    }
}
