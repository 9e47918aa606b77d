//! tilequad demo
//!
//! Plays a level with the keyboard:
//! - Arrows: walk, Shift: run
//! - Enter: activate the zone you stand in
//! - P: pause, F3: toggle hitbox overlay, R: restart after game over
//!
//! Usage: `tilequad [level.json|level.ron] [--config engine.ron]`. Without
//! a level a generated demo level is played.

use std::path::PathBuf;

use clap::Parser;
use macroquad::prelude::*;

use tilequad::config::EngineConfig;
use tilequad::game::components::Direction;
use tilequad::game::event::ZoneEventKind;
use tilequad::game::renderer::{draw_game, SpriteTextures};
use tilequad::game::runtime::GameStatus;
use tilequad::game::Game;
use tilequad::world::LevelDesc;
use tilequad::VERSION;

/// Character sheets looked up next to the tile sets
const SHEETS: &[&str] = &["player", "infected", "exclamation"];
const ASSET_DIR: &str = "assets";

/// Most frames simulated per rendered frame before time is dropped
const MAX_CATCH_UP_FRAMES: f64 = 5.0;

#[derive(Debug, Parser)]
#[command(name = "tilequad", version, about = "Play a tile level")]
struct Args {
    /// Level file (.json or .ron); a generated level when omitted
    level: Option<PathBuf>,
    /// Engine settings (RON)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn window_conf() -> Conf {
    Conf {
        window_title: format!("tilequad v{}", VERSION),
        window_width: 1024,
        window_height: 768,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    // Initialize crash logging FIRST (before any other code)
    #[cfg(not(target_arch = "wasm32"))]
    crashlog::setup!(crashlog::cargo_metadata!().capitalized(), false);

    #[cfg(not(target_arch = "wasm32"))]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };
    let desc = match &args.level {
        Some(path) => match LevelDesc::load(path) {
            Ok(desc) => desc,
            Err(e) => {
                log::error!("Failed to load level {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => LevelDesc::demo(60, 45),
    };

    let textures = SpriteTextures::load(&desc, ASSET_DIR, SHEETS).await;
    let mut game = Game::new(config, desc);
    let frame_secs = game.config.frame_ms() as f64 / 1000.0;
    let mut accumulator = 0.0f64;

    loop {
        handle_input(&mut game);

        // Fixed-rate simulation, independent of the display rate
        accumulator = (accumulator + get_frame_time() as f64).min(frame_secs * MAX_CATCH_UP_FRAMES);
        while accumulator >= frame_secs {
            if game.advance() {
                log_frame_events(&game);
            }
            accumulator -= frame_secs;
        }

        draw_game(&mut game, &textures);
        next_frame().await;
    }
}

fn handle_input(game: &mut Game) {
    if is_key_pressed(KeyCode::F3) {
        game.config.debug_rects = !game.config.debug_rects;
    }
    if is_key_pressed(KeyCode::P) {
        game.toggle_paused();
    }
    if game.status() == GameStatus::GameOver {
        if is_key_pressed(KeyCode::R) {
            *game = Game::new(game.config.clone(), game.level().clone());
        }
        return;
    }

    let Some(player) = game.player() else {
        return;
    };
    let keys = [
        (KeyCode::Left, Direction::Left),
        (KeyCode::Right, Direction::Right),
        (KeyCode::Up, Direction::Up),
        (KeyCode::Down, Direction::Down),
    ];
    for (key, direction) in keys {
        if is_key_pressed(key) {
            game.world.move_direction(player, direction);
        }
        if is_key_released(key) {
            game.world.stop_moving_direction(player, direction);
        }
    }

    for shift in [KeyCode::LeftShift, KeyCode::RightShift] {
        if is_key_pressed(shift) {
            game.world.set_running(player, true);
        }
        if is_key_released(shift) {
            game.world.set_running(player, false);
        }
    }

    if is_key_pressed(KeyCode::Enter) && game.activate_zones() > 0 {
        let activated = game.world.events.zone.iter().filter(|e| e.kind == ZoneEventKind::Activated);
        for event in activated {
            log::info!("Activated zone '{}'", event.zone);
        }
    }
}

fn log_frame_events(game: &Game) {
    let events = &game.world.events;
    for zone in events.zone.iter() {
        match zone.kind {
            ZoneEventKind::Entered => log::info!("Entered zone '{}'", zone.zone),
            ZoneEventKind::Exited => log::info!("Left zone '{}'", zone.zone),
            ZoneEventKind::MovedInside | ZoneEventKind::Activated => {}
        }
    }
    for death in events.death.iter() {
        log::info!("{:?} {} died at ({}, {})", death.kind, death.entity, death.position.x, death.position.y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_level_and_config_are_independent() {
        let args = Args::try_parse_from(["tilequad", "--config", "engine.ron"]).unwrap();
        assert_eq!(args.level, None);
        assert_eq!(args.config, Some(PathBuf::from("engine.ron")));

        let args = Args::try_parse_from(["tilequad", "caves.json"]).unwrap();
        assert_eq!(args.level, Some(PathBuf::from("caves.json")));
        assert_eq!(args.config, None);
    }

    #[test]
    fn test_args_help_is_not_a_level() {
        let err = Args::try_parse_from(["tilequad", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
