//! # Infinite Walk Integration Test
//!
//! Streams the overworld along long walks and checks that the tile under the
//! player is always resident, the cache stays bounded, and player changes
//! survive eviction and a full restart.

use std::path::PathBuf;
use std::time::Instant;

use hollowmere_procedural::{
    shared, ChunkCoord, FileDeltaStore, GenerationContext, MemoryDeltaStore, SharedDeltaStore, WorldConfig,
    WorldSeed,
};
use hollowmere_shared::{OccupantId, TilePos};

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "hollowmere_{name}_{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    ))
}

fn context(seed: u64, workers: usize, store: SharedDeltaStore) -> GenerationContext {
    let mut config = WorldConfig::standard();
    config.chunks.worker_threads = workers;
    GenerationContext::new(WorldSeed::new(seed), config, store).expect("standard config")
}

/// Test: walk 4,000 tiles east and never step onto an unloaded tile.
#[test]
fn test_infinite_walk_4000_tiles() {
    let mut ctx = context(42, 2, shared(MemoryDeltaStore::new()));
    let max_loaded = ctx.config().chunks.max_loaded;

    let start = Instant::now();
    for x in 0..4_000 {
        let pos = TilePos::new(x, 7);
        ctx.ensure_active(pos);
        assert!(ctx.get_tile(pos).is_ok(), "unloaded tile under the player at x={x}");
        assert!(ctx.stats().loaded <= max_loaded, "cache grew past max_loaded at x={x}");
    }
    ctx.flush_generation_queue();

    let stats = ctx.stats();
    println!("Walked 4,000 tiles in {:?}", start.elapsed());
    println!("Generated: {}, unloaded: {}, discarded: {}", stats.generated_this_session, stats.unloaded_this_session, stats.discarded);
    assert!(stats.unloaded_this_session > 0, "chunks behind the player are evicted");
    assert_eq!(stats.pending, 0);
}

/// Test: zig-zag walk with inline generation hits the same tiles as with workers.
#[test]
fn test_workers_do_not_change_content() {
    let mut inline = context(7, 0, shared(MemoryDeltaStore::new()));
    let mut threaded = context(7, 3, shared(MemoryDeltaStore::new()));

    for step in 0..300 {
        let pos = TilePos::new(step * 5, if step % 40 < 20 { step * 3 } else { -step * 2 });
        inline.ensure_active(pos);
        threaded.ensure_active(pos);
        assert_eq!(
            inline.get_tile(pos).expect("inline"),
            threaded.get_tile(pos).expect("threaded"),
            "step {step}"
        );
    }
}

/// Finds any occupied tile in the active set around `center`.
fn find_occupant(ctx: &GenerationContext, center: TilePos) -> Option<(TilePos, OccupantId)> {
    ChunkCoord::from_tile(center)
        .within(ctx.config().chunks.active_radius)
        .into_iter()
        .filter_map(|coord| ctx.chunks().chunk(coord))
        .flat_map(|chunk| chunk.occupants())
        .next()
}

/// Test: a depleted resource and a placed structure survive eviction and a
/// process restart against the same store directory.
#[test]
fn test_deltas_survive_restart() {
    let dir = temp_dir("walk_restart");
    let store: SharedDeltaStore = shared(FileDeltaStore::open(&dir).expect("open store"));
    let mut ctx = context(2024, 0, store);

    let mut found = None;
    for attempt in 0..10 {
        let center = TilePos::new(attempt * 1_000, 0);
        ctx.ensure_active(center);
        if let Some(hit) = find_occupant(&ctx, center) {
            found = Some((center, hit));
            break;
        }
    }
    let (center, (resource, _)) = found.expect("some occupant near the walk");
    let site = if resource == center.offset(3, 3) { center.offset(4, 3) } else { center.offset(3, 3) };

    ctx.deplete(resource).expect("deplete");
    ctx.place_structure(site, OccupantId(400)).expect("place");
    assert_eq!(ctx.get_tile(resource).expect("loaded").occupant, None);

    // Walk far enough away that both chunks are evicted (and persisted)
    ctx.ensure_active(center.offset(50_000, 0));
    assert!(ctx.get_tile(resource).is_err(), "origin chunk was evicted");
    drop(ctx);

    let store: SharedDeltaStore = shared(FileDeltaStore::open(&dir).expect("reopen store"));
    let mut restarted = context(2024, 0, store);
    restarted.ensure_active(center);
    assert_eq!(restarted.get_tile(resource).expect("loaded").occupant, None, "depletion restored");
    let tile = restarted.get_tile(site).expect("loaded");
    assert_eq!(tile.occupant, Some(OccupantId(400)), "structure restored");
    assert!(!tile.walkable);
    assert!(restarted.stats().restored >= 1);

    let _ = std::fs::remove_dir_all(&dir);
}

/// Test: teleporting back and forth keeps the cache consistent.
#[test]
fn test_teleport_round_trip() {
    let mut ctx = context(99, 2, shared(MemoryDeltaStore::new()));
    let home = TilePos::new(-300, 420);
    ctx.ensure_active(home);
    let before = ctx.get_tile(home).expect("home");

    for i in 1..=5 {
        ctx.ensure_active(TilePos::new(i * 10_000, -i * 7_000));
    }
    ctx.ensure_active(home);
    assert_eq!(ctx.get_tile(home).expect("home again"), before, "regenerated chunk is identical");
}
