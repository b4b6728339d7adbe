mod support;

use tank_battle_server::game::{
    ControlUpdate, GameEventKind, GameSettings, GameStateManager, GameStatus, MapConfig,
    TerrainGenerator,
};

const DT: f32 = 1.0 / 30.0;

fn drive(forward: bool, fire: bool) -> ControlUpdate {
    ControlUpdate {
        forward: Some(forward),
        fire: Some(fire),
        ..ControlUpdate::default()
    }
}

#[test]
fn same_seed_and_inputs_replay_identically() {
    let run = || {
        let mut game = support::started_game(99, &["alpha", "bravo", "charlie"]);
        game.set_tank_controls("alpha", drive(true, true));
        game.set_tank_controls("bravo", drive(true, false));
        for _ in 0..90 {
            game.update(DT);
        }
        serde_json::to_string(&game.serialize()).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn small_arena_spawns_players_on_open_ground() {
    let config = MapConfig {
        width: 20,
        height: 15,
        seed: Some(2024),
        ..MapConfig::default()
    };
    let map = TerrainGenerator::generate(&config);
    assert!(map.is_fully_connected());

    let mut game = GameStateManager::new("small", GameSettings::default());
    game.initialize_game(&config);
    assert!(game.add_player("p1", "one"));
    assert!(game.add_player("p2", "two"));

    let size = game.map().unwrap().world_size();
    for id in ["p1", "p2"] {
        let tank = game.tank(id).unwrap();
        let tile = game.map().unwrap().tile_at(tank.position).unwrap();
        assert!(tile.passable, "{id} spawned inside a wall");
        assert!(tank.position.x > 0.0 && tank.position.x < size.x);
        assert!(tank.position.y > 0.0 && tank.position.y < size.y);
    }
}

#[test]
fn tanks_cannot_leave_the_arena() {
    let mut game = support::started_game(5, &["p1"]);
    game.set_tank_controls("p1", drive(true, false));
    for _ in 0..400 {
        game.update(DT);
    }

    let map = game.map().unwrap();
    let size = map.world_size();
    let inner = map.tile_size;
    let tank = game.tank("p1").unwrap();
    let margin = tank.collision_radius() - 2.0;
    assert!(tank.position.x >= inner + margin && tank.position.x <= size.x - inner - margin);
    assert!(tank.position.y >= inner + margin && tank.position.y <= size.y - inner - margin);
}

#[test]
fn snapshot_serializes_for_the_wire() {
    let mut game = support::started_game(3, &["p1"]);
    game.set_tank_controls("p1", drive(false, true));
    game.update(DT);

    let json = serde_json::to_value(game.serialize()).unwrap();
    assert_eq!(json["status"], "running");
    assert_eq!(json["mode"], "deathmatch");
    assert!(json["tanks"][0]["position"]["x"].is_number());
    assert!(json["tanks"][0]["position"]["y"].is_number());
    assert_eq!(json["projectiles"].as_array().unwrap().len(), 1);
    assert_eq!(json["projectiles"][0]["projectile_type"], "bullet");
    assert_eq!(json["map"]["width"], 30);

    let types: Vec<&str> = json["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["type"].as_str())
        .collect();
    assert!(types.contains(&"player_joined"));
    assert!(types.contains(&"game_started"));
    assert!(types.contains(&"projectile_fired"));
}

#[test]
fn snapshot_carries_only_recent_events() {
    let mut game = support::started_game(4, &[]);
    for i in 0..20 {
        game.add_player(&format!("p{i}"), "p");
    }
    assert_eq!(game.serialize().events.len(), 10);
}

#[test]
fn event_log_is_bounded() {
    let mut game = support::started_game(8, &[]);
    for i in 0..600 {
        let id = format!("p{i}");
        game.add_player(&id, "churn");
        game.remove_player(&id);
    }
    let events = &game.state().events;
    assert_eq!(events.len(), 1000);
    assert!(matches!(
        events.iter().last().map(|e| &e.kind),
        Some(GameEventKind::PlayerLeft { player_id }) if player_id == "p599"
    ));
}

#[test]
fn controls_for_unknown_players_are_ignored() {
    let mut game = support::started_game(6, &["p1"]);
    assert!(!game.set_tank_controls("ghost", drive(true, true)));
    assert!(game.fire_tank("ghost").is_none());
    assert!(!game.remove_player("ghost"));
    game.update(DT);
    assert_eq!(game.state().status, GameStatus::Running);
}

#[test]
fn fire_respects_reload_between_ticks() {
    let mut game = support::started_game(12, &["p1"]);
    assert!(game.fire_tank("p1").is_some());
    assert!(game.fire_tank("p1").is_none());
    // 500 ms reload at 30 ticks per second
    for _ in 0..15 {
        game.update(DT);
    }
    assert!(game.fire_tank("p1").is_some());
    assert_eq!(game.tank("p1").unwrap().ammo, game.tank("p1").unwrap().stats.starting_ammo - 2);
}

#[test]
fn ended_game_stops_ticking() {
    let mut game = support::started_game(10, &["p1"]);
    game.update(DT);
    game.end_game("manual");
    let frozen = game.state().current_time;
    game.update(DT);
    assert_eq!(game.state().current_time, frozen);
    assert_eq!(game.state().status, GameStatus::Finished);
    assert_eq!(game.state().winner.as_deref(), Some("p1"));
}
