//! Brand-name overlay for text-free posters.
//!
//! With [`BrandPlacement::TextFree`](crate::config::BrandPlacement) the image
//! model is told to draw no lettering, so the brand name is stamped onto the
//! finished poster here: upper-cased, centred near the top edge, over a
//! translucent rounded panel with a one-step drop shadow.
//!
//! Text colour follows the brightness of the top fifth of the image. A dark
//! band gets white text on a smoked panel; a light band gets near-black text
//! on a frosted one.

use crate::error::PosterError;
use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use image::{Rgba, RgbImage};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Bold sans-serif faces tried when no overlay font is configured.
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSansBold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
];

/// Share of the image height sampled for the tone decision.
const TOP_BAND: f32 = 0.2;
/// Font size as a share of the image width.
const FONT_WIDTH_RATIO: f32 = 0.08;
/// Widest the text may get, as a share of the image width.
const MAX_TEXT_WIDTH: f32 = 0.9;
const MIN_FONT_PX: u32 = 12;
/// Distance of the text from the top edge, as a share of the image height.
const TOP_MARGIN: f32 = 0.05;
const PANEL_PAD_X: f32 = 0.12;
const PANEL_PAD_Y: f32 = 0.4;
const PANEL_RADIUS: i32 = 10;

/// A parsed TrueType/OpenType face used for the overlay.
pub struct BrandFont {
    font: FontVec,
    source: PathBuf,
}

impl fmt::Debug for BrandFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrandFont")
            .field("source", &self.source)
            .finish()
    }
}

impl BrandFont {
    /// # Errors
    /// [`PosterError::InvalidConfig`] when the file is unreadable or not a font.
    pub fn load(path: &Path) -> Result<Self, PosterError> {
        let bytes = std::fs::read(path).map_err(|e| {
            PosterError::InvalidConfig(format!("Cannot read overlay font {}: {e}", path.display()))
        })?;
        let font = FontVec::try_from_vec(bytes).map_err(|_| {
            PosterError::InvalidConfig(format!(
                "{} is not a TrueType/OpenType font",
                path.display()
            ))
        })?;
        Ok(Self {
            font,
            source: path.to_path_buf(),
        })
    }

    /// First loadable face from [`SYSTEM_FONT_CANDIDATES`].
    pub fn discover() -> Option<Self> {
        SYSTEM_FONT_CANDIDATES
            .iter()
            .map(Path::new)
            .filter(|p| p.is_file())
            .find_map(|p| match Self::load(p) {
                Ok(font) => Some(font),
                Err(e) => {
                    debug!("Skipping overlay font candidate: {}", e);
                    None
                }
            })
    }

    /// A configured path must load; without one, fall back to discovery.
    pub fn resolve(configured: Option<&Path>) -> Result<Option<Self>, PosterError> {
        if let Some(path) = configured {
            return Self::load(path).map(Some);
        }
        let found = Self::discover();
        match &found {
            Some(font) => debug!("Overlay font: {}", font.source.display()),
            None => warn!("No overlay font found; text-free posters will carry no brand name"),
        }
        Ok(found)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Advance width and line height of `text` at `px` pixels.
    pub fn measure(&self, text: &str, px: f32) -> (u32, u32) {
        let scaled = self.font.as_scaled(PxScale::from(px));
        let mut width = 0.0f32;
        let mut prev = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(p) = prev {
                width += scaled.kern(p, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        (width.ceil().max(0.0) as u32, scaled.height().ceil() as u32)
    }

    /// Rasterise `text` with its top-left corner at (`x`, `y`).
    fn draw(&self, img: &mut RgbImage, text: &str, px: f32, x: i32, y: i32, color: Rgba<u8>) {
        let scale = PxScale::from(px);
        let scaled = self.font.as_scaled(scale);
        let baseline = y as f32 + scaled.ascent();
        let mut caret = x as f32;
        let mut prev = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(p) = prev {
                caret += scaled.kern(p, id);
            }
            let glyph = id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(id);
            prev = Some(id);

            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            let (left, top) = (bounds.min.x as i32, bounds.min.y as i32);
            outlined.draw(|gx, gy, coverage| {
                blend(img, left + gx as i32, top + gy as i32, color, coverage);
            });
        }
    }
}

/// Colours for one overlay, picked from the background tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayStyle {
    pub text: Rgba<u8>,
    pub shadow: Rgba<u8>,
    pub panel: Rgba<u8>,
    pub border: Rgba<u8>,
}

impl OverlayStyle {
    /// `luminance` in 0.0–1.0; below 0.5 counts as a dark background.
    pub fn for_background(luminance: f32) -> Self {
        if luminance < 0.5 {
            Self {
                text: Rgba([255, 255, 255, 255]),
                shadow: Rgba([0, 0, 0, 200]),
                panel: Rgba([0, 0, 0, 80]),
                border: Rgba([255, 255, 255, 40]),
            }
        } else {
            Self {
                text: Rgba([20, 20, 30, 255]),
                shadow: Rgba([255, 255, 255, 200]),
                panel: Rgba([255, 255, 255, 120]),
                border: Rgba([20, 20, 30, 40]),
            }
        }
    }
}

/// Mean relative luminance (Rec. 601 weights) of the top band, 0.0–1.0.
pub fn top_band_luminance(img: &RgbImage) -> f32 {
    let band = ((img.height() as f32 * TOP_BAND) as u32).clamp(1, img.height().max(1));
    let mut sums = [0u64; 3];
    let mut count = 0u64;
    for row in img.rows().take(band as usize) {
        for pixel in row {
            for (sum, channel) in sums.iter_mut().zip(pixel.0) {
                *sum += u64::from(channel);
            }
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    let [r, g, b] = sums.map(|s| (s / count) as f32);
    (0.299 * r + 0.587 * g + 0.114 * b) / 255.0
}

/// Half-open pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Panel {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Where the text, its shadow and its panel go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayLayout {
    pub text_x: i32,
    pub text_y: i32,
    pub shadow_offset: i32,
    pub panel: Panel,
}

/// Font size for an image `width` pixels wide.
pub fn font_px_for(width: u32) -> u32 {
    ((width as f32 * FONT_WIDTH_RATIO) as u32).max(MIN_FONT_PX)
}

/// Centre a `text`-sized block horizontally near the top of `image`.
pub fn layout(image: (u32, u32), font_px: u32, text: (u32, u32)) -> OverlayLayout {
    let (width, height) = (image.0 as i32, image.1 as i32);
    let (text_w, text_h) = (text.0 as i32, text.1 as i32);
    let text_x = (width - text_w).div_euclid(2);
    let text_y = (height as f32 * TOP_MARGIN) as i32;
    let pad_x = (text_w as f32 * PANEL_PAD_X) as i32;
    let pad_y = (text_h as f32 * PANEL_PAD_Y) as i32;
    OverlayLayout {
        text_x,
        text_y,
        shadow_offset: (font_px / 50).max(1) as i32,
        panel: Panel {
            left: text_x - pad_x,
            top: text_y - pad_y,
            right: text_x + text_w + pad_x,
            bottom: text_y + text_h + pad_y,
        },
    }
}

/// Stamp `brand` onto the top of `img`. Blank names leave the image untouched.
pub fn apply_brand_overlay(img: &mut RgbImage, brand: &str, font: &BrandFont) {
    let text = brand.trim().to_uppercase();
    if text.is_empty() || img.width() == 0 || img.height() == 0 {
        return;
    }
    let style = OverlayStyle::for_background(top_band_luminance(img));

    let mut px = font_px_for(img.width());
    let mut size = font.measure(&text, px as f32);
    let max_width = (img.width() as f32 * MAX_TEXT_WIDTH) as u32;
    if size.0 > max_width {
        px = ((u64::from(px) * u64::from(max_width) / u64::from(size.0)) as u32).max(MIN_FONT_PX);
        size = font.measure(&text, px as f32);
    }

    let placed = layout(img.dimensions(), px, size);
    fill_panel(img, placed.panel, &style);
    let offset = placed.shadow_offset;
    font.draw(img, &text, px as f32, placed.text_x + offset, placed.text_y + offset, style.shadow);
    font.draw(img, &text, px as f32, placed.text_x, placed.text_y, style.text);
    debug!(
        "Overlaid \"{}\" at {}px ({}×{}) on {}×{}",
        text,
        px,
        size.0,
        size.1,
        img.width(),
        img.height()
    );
}

/// Rounded rectangle with a one-pixel border.
fn fill_panel(img: &mut RgbImage, panel: Panel, style: &OverlayStyle) {
    let radius = PANEL_RADIUS
        .min((panel.right - panel.left) / 2)
        .min((panel.bottom - panel.top) / 2)
        .max(0);
    for y in panel.top..panel.bottom {
        for x in panel.left..panel.right {
            let dx = corner_distance(x, panel.left, panel.right, radius);
            let dy = corner_distance(y, panel.top, panel.bottom, radius);
            if dx > 0 && dy > 0 && dx * dx + dy * dy > radius * radius {
                continue;
            }
            blend(img, x, y, style.panel, 1.0);
            let edge = x == panel.left
                || x == panel.right - 1
                || y == panel.top
                || y == panel.bottom - 1;
            if edge {
                blend(img, x, y, style.border, 1.0);
            }
        }
    }
}

/// How far `v` sits inside a corner zone of width `radius`; 0 outside it.
fn corner_distance(v: i32, start: i32, end: i32, radius: i32) -> i32 {
    if v < start + radius {
        start + radius - v
    } else if v >= end - radius {
        v - (end - radius - 1)
    } else {
        0
    }
}

/// Source-over blend of `color` at `coverage`; out-of-bounds pixels are ignored.
fn blend(img: &mut RgbImage, x: i32, y: i32, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x as u32 >= img.width() || y as u32 >= img.height() {
        return;
    }
    let alpha = coverage.clamp(0.0, 1.0) * f32::from(color[3]) / 255.0;
    let pixel = img.get_pixel_mut(x as u32, y as u32);
    for (dst, src) in pixel.0.iter_mut().zip(color.0) {
        *dst = (f32::from(*dst) * (1.0 - alpha) + f32::from(src) * alpha).round() as u8;
    }
}
