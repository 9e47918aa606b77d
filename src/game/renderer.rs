//! Game Renderer
//!
//! Draws the layers of a world through the camera with macroquad. Tiles
//! and character sheets use textures when they were loaded; anything
//! without one is drawn as a flat colored box so levels stay playable
//! without art.

use hashbrown::HashMap;
use macroquad::prelude::*;

use super::components::{EntityKind, Visual};
use super::runtime::{Game, GameStatus};
use super::sprite::Sprite;
use super::world::World;
use crate::world::{LevelDesc, Rect};

/// Textures referenced by a level, keyed the way visuals name them.
#[derive(Default)]
pub struct SpriteTextures {
    /// Indexed like `LevelDesc::files`
    tiles: Vec<Option<Texture2D>>,
    sheets: HashMap<String, Texture2D>,
}

impl SpriteTextures {
    /// Load tile sets and character sheets from `dir`. Missing files are
    /// logged and fall back to flat colors.
    pub async fn load(desc: &LevelDesc, dir: &str, sheets: &[&str]) -> Self {
        let mut textures = Self::default();
        for file in &desc.files {
            textures.tiles.push(load_or_warn(&format!("{}/{}", dir, file)).await);
        }
        for name in sheets {
            if let Some(texture) = load_or_warn(&format!("{}/{}.png", dir, name)).await {
                textures.sheets.insert((*name).to_string(), texture);
            }
        }
        textures
    }
}

async fn load_or_warn(path: &str) -> Option<Texture2D> {
    match load_texture(path).await {
        Ok(texture) => {
            texture.set_filter(FilterMode::Nearest);
            Some(texture)
        }
        Err(e) => {
            log::warn!("No texture at {}: {}", path, e);
            None
        }
    }
}

/// Draw one frame of the game: layers back to front, the optional debug
/// overlay, then the HUD.
pub fn draw_game(game: &mut Game, textures: &SpriteTextures) {
    clear_background(Color::from_rgba(20, 22, 28, 255));

    let view = game.camera.rect;
    let tile_size = (game.config.tile_width, game.config.tile_height);
    draw_world(&mut game.world, view, tile_size, textures);

    if game.config.debug_rects {
        draw_debug_rects(&mut game.world, view);
    }
    draw_hud(game);
}

pub fn draw_world(world: &mut World, view: Rect, tile_size: (i32, i32), textures: &SpriteTextures) {
    for layer in world.draw_order() {
        for entity in world.visible_in_rect(layer, view) {
            if let Some(sprite) = world.sprite(entity) {
                draw_sprite(sprite, view, tile_size, textures);
            }
        }
    }
}

fn draw_sprite(sprite: &Sprite, view: Rect, tile_size: (i32, i32), textures: &SpriteTextures) {
    let x = (sprite.rect.x - view.x) as f32;
    let y = (sprite.rect.y - view.y) as f32;
    let (w, h) = (sprite.rect.w as f32, sprite.rect.h as f32);

    let (texture, source) = match &sprite.visual {
        Visual::Tile(tile) => {
            let texture = textures.tiles.get(tile.file).and_then(Option::as_ref);
            let source = macroquad::math::Rect::new(
                (tile.offset.x * tile_size.0) as f32,
                (tile.offset.y * tile_size.1) as f32,
                tile_size.0 as f32,
                tile_size.1 as f32,
            );
            (texture, source)
        }
        Visual::Sheet(name) => {
            let frame = sprite.sheet_frame();
            let source = macroquad::math::Rect::new(frame.x as f32, frame.y as f32, w, h);
            (textures.sheets.get(name), source)
        }
    };

    match texture {
        Some(texture) => draw_texture_ex(
            texture,
            x,
            y,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(w, h)),
                source: Some(source),
                ..Default::default()
            },
        ),
        None => draw_rectangle(x, y, w, h, fallback_color(sprite)),
    }
}

fn fallback_color(sprite: &Sprite) -> Color {
    match (&sprite.visual, sprite.kind) {
        (Visual::Tile(tile), _) => match tile.file {
            0 => Color::from_rgba(40, 70, 45, 255),
            _ => Color::from_rgba(90, 85, 80, 255),
        },
        (_, EntityKind::Player) => Color::from_rgba(220, 200, 120, 255),
        (_, EntityKind::Enemy) => Color::from_rgba(160, 60, 60, 255),
        (_, EntityKind::Npc) => Color::from_rgba(80, 120, 180, 255),
        (_, EntityKind::Marker) => Color::from_rgba(255, 240, 80, 255),
        (_, EntityKind::Tile) => GRAY,
    }
}

/// Hitboxes of main-layer sprites in blue, trigger zones in red.
fn draw_debug_rects(world: &mut World, view: Rect) {
    let outline = |rect: Rect, color: Color| {
        draw_rectangle_lines(
            (rect.x - view.x) as f32,
            (rect.y - view.y) as f32,
            rect.w as f32,
            rect.h as f32,
            2.0,
            color,
        );
    };

    if let Some(main) = world.main_layer() {
        let found: Vec<_> = world.iterate_in_rect(main, view).collect();
        for entity in found {
            let Some(sprite) = world.sprite(entity) else {
                continue;
            };
            if !sprite.collidable {
                continue;
            }
            for rect in sprite.absolute_collision_rects() {
                outline(rect, BLUE);
            }
        }
    }
    for zone in world.zones.iter() {
        for &rect in zone.rects() {
            if rect.intersects(&view) {
                outline(rect, RED);
            }
        }
    }
}

fn draw_hud(game: &Game) {
    let text_color = Color::from_rgba(230, 230, 230, 255);
    if let Some(sprite) = game.player().and_then(|p| game.world.sprite(p)) {
        let health = sprite.health.map_or(0, |h| h.current);
        let lives = sprite.behaviors.player.map_or(0, |p| p.lives);
        draw_text(&format!("HP {}  Lives {}", health, lives), 12.0, 24.0, 24.0, text_color);
    }

    let banner = match (game.status(), game.paused) {
        (GameStatus::GameOver, _) => Some("GAME OVER"),
        (GameStatus::Playing, true) => Some("PAUSED"),
        _ => None,
    };
    if let Some(banner) = banner {
        let size = measure_text(banner, None, 48, 1.0);
        draw_text(
            banner,
            (screen_width() - size.width) / 2.0,
            screen_height() / 2.0,
            48.0,
            text_color,
        );
    }
}
