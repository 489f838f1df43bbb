//! Hex colour codes → descriptive phrases for the image prompt.
//!
//! Text-to-image models respond far better to "vibrant Spotify green" than
//! to `#1DB954`. Well-known brand colours are looked up exactly; anything
//! else is described from its dominant RGB channels.

/// Exact matches, keyed by upper-case `#RRGGBB`.
const KNOWN_COLORS: &[(&str, &str)] = &[
    ("#000000", "deep black"),
    ("#FFFFFF", "clean white"),
    ("#4285F4", "Google blue"),
    ("#EA4335", "Google red"),
    ("#FBBC05", "Google yellow"),
    ("#34A853", "Google green"),
    ("#1DB954", "vibrant Spotify green"),
    ("#FF9900", "Amazon orange"),
    ("#03C75A", "Naver green"),
    ("#E50914", "cinematic Netflix red"),
    ("#1877F2", "Facebook blue"),
    ("#FEE500", "Kakao yellow"),
    ("#5865F2", "Discord blurple"),
    ("#FF0000", "pure red"),
    ("#00FF00", "pure green"),
    ("#0000FF", "pure blue"),
    ("#808080", "neutral gray"),
];

/// Describe a colour for the image prompt.
///
/// Accepts `#RGB` and `#RRGGBB`, case-insensitive. Input that is not a hex
/// code is assumed to already be a colour name and is returned
/// trimmed.
pub fn describe_color(input: &str) -> String {
    let trimmed = input.trim();
    let Some((r, g, b)) = parse_hex(trimmed) else {
        return trimmed.to_string();
    };

    let canonical = format!("#{r:02X}{g:02X}{b:02X}");
    if let Some((_, name)) = KNOWN_COLORS.iter().find(|(hex, _)| *hex == canonical) {
        return (*name).to_string();
    }
    heuristic_name(r, g, b).to_string()
}

fn parse_hex(input: &str) -> Option<(u8, u8, u8)> {
    let hex = input.strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        6 => Some((channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
        3 => {
            let expand = |i: usize| channel(&hex[i..=i].repeat(2));
            Some((expand(0)?, expand(1)?, expand(2)?))
        }
        _ => None,
    }
}

const HIGH: u8 = 150;
const LOW: u8 = 100;

fn heuristic_name(r: u8, g: u8, b: u8) -> &'static str {
    match (r >= HIGH, g >= HIGH, b >= HIGH) {
        (true, true, false) if b < LOW => return "golden yellow tones",
        (true, false, true) if g < LOW => return "rich magenta tones",
        (false, true, true) if r < LOW => return "fresh cyan tones",
        _ => {}
    }
    if r > g && r > b {
        "warm red tones"
    } else if g > r && g > b {
        "vibrant green tones"
    } else if b > r && b > g {
        "cool blue tones"
    } else {
        "neutral harmonious tones"
    }
}
