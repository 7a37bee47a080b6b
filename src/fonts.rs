//! Cached TTF loading for slip text.
//!
//! Fonts are resolved from `FONTS_DIR` when set, otherwise from the usual
//! DejaVu system locations. Parsed fonts are cached for the process lifetime.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rusttype::Font;
use std::{collections::HashMap, path::PathBuf, sync::Arc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FontError {
    #[error("font not found: {0}")]
    NotFound(String),
    #[error("failed to parse font: {0}")]
    Parse(String),
}

static FONT_CACHE: Lazy<Mutex<HashMap<String, Arc<Font<'static>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(d) = std::env::var("FONTS_DIR") {
        dirs.push(PathBuf::from(d));
    }
    dirs.push(PathBuf::from("/usr/share/fonts/truetype/dejavu"));
    dirs.push(PathBuf::from("/usr/share/fonts/dejavu"));
    dirs.push(PathBuf::from("/usr/share/fonts/TTF"));
    dirs
}

pub fn load_font_cached(name: &str) -> Result<Arc<Font<'static>>, FontError> {
    if let Some(f) = FONT_CACHE.lock().get(name) {
        return Ok(Arc::clone(f));
    }

    let bytes = search_dirs()
        .into_iter()
        .find_map(|dir| std::fs::read(dir.join(name)).ok())
        .ok_or_else(|| FontError::NotFound(name.to_string()))?;
    let font = Font::try_from_vec(bytes).ok_or_else(|| FontError::Parse(name.to_string()))?;

    let font = Arc::new(font);
    FONT_CACHE.lock().insert(name.to_string(), Arc::clone(&font));
    Ok(font)
}

/// Font for the shop-name line.
pub fn heading_font() -> Result<Arc<Font<'static>>, FontError> {
    load_font_cached("DejaVuSans-Bold.ttf")
}

/// Font for detail lines (phone, whatsapp, address).
pub fn body_font() -> Result<Arc<Font<'static>>, FontError> {
    load_font_cached("DejaVuSans.ttf")
}
