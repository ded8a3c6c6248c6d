use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// A flat backdrop colour shown behind the object for one exposure.
///
/// The same value drives the display surface and labels the resulting image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackdropColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ColorParseError {
    #[error("empty colour string")]
    Empty,
    #[error("invalid hex colour `{0}`")]
    InvalidHex(String),
    #[error("unknown colour name `{0}`")]
    UnknownName(String),
}

const NAMED_COLORS: &[(&str, BackdropColor)] = &[
    ("black", BackdropColor::new(0, 0, 0)),
    ("white", BackdropColor::new(255, 255, 255)),
    ("red", BackdropColor::new(255, 0, 0)),
    ("green", BackdropColor::new(0, 128, 0)),
    ("lime", BackdropColor::new(0, 255, 0)),
    ("blue", BackdropColor::new(0, 0, 255)),
    ("yellow", BackdropColor::new(255, 255, 0)),
    ("cyan", BackdropColor::new(0, 255, 255)),
    ("magenta", BackdropColor::new(255, 0, 255)),
    ("gray", BackdropColor::new(128, 128, 128)),
    ("grey", BackdropColor::new(128, 128, 128)),
    ("orange", BackdropColor::new(255, 165, 0)),
    ("purple", BackdropColor::new(128, 0, 128)),
];

impl BackdropColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Lower-case `#rrggbb` form, used for file names and the palette file.
    pub fn name(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Channel values normalised to [0, 1].
    pub fn to_unit(&self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }

    fn parse_hex(digits: &str) -> Option<Self> {
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match digits.len() {
            6 => {
                let v = u32::from_str_radix(digits, 16).ok()?;
                Some(Self::new((v >> 16) as u8, (v >> 8) as u8, v as u8))
            }
            3 => {
                let v = u16::from_str_radix(digits, 16).ok()?;
                let expand = |n: u16| (n as u8 & 0xf) * 17;
                Some(Self::new(expand(v >> 8), expand(v >> 4), expand(v)))
            }
            _ => None,
        }
    }
}

impl FromStr for BackdropColor {
    type Err = ColorParseError;

    /// Accepts `#rrggbb`, `#rgb`, bare `rrggbb` and a small set of names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ColorParseError::Empty);
        }

        if let Some(digits) = s.strip_prefix('#') {
            return Self::parse_hex(digits)
                .ok_or_else(|| ColorParseError::InvalidHex(s.to_string()));
        }

        let lower = s.to_ascii_lowercase();
        if let Some((_, color)) = NAMED_COLORS.iter().find(|(name, _)| *name == lower) {
            return Ok(*color);
        }

        Self::parse_hex(s).ok_or_else(|| ColorParseError::UnknownName(s.to_string()))
    }
}

impl fmt::Display for BackdropColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Parse a palette: one colour per line, blank lines ignored.
///
/// Invalid lines are reported and skipped so a hand-edited file still loads.
pub fn parse_palette(text: &str) -> Vec<BackdropColor> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match line.parse() {
            Ok(color) => Some(color),
            Err(e) => {
                tracing::warn!("Skipping palette line {}: {}", index + 1, e);
                None
            }
        })
        .collect()
}

pub fn load_palette<P: AsRef<Path>>(path: P) -> Result<Vec<BackdropColor>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read palette from {}", path.display()))?;
    let colors = parse_palette(&text);
    tracing::info!("Loaded {} colours from {}", colors.len(), path.display());
    Ok(colors)
}

pub fn save_palette<P: AsRef<Path>>(path: P, colors: &[BackdropColor]) -> Result<()> {
    let path = path.as_ref();
    let mut text = colors.iter().map(BackdropColor::name).collect::<Vec<_>>().join("\n");
    text.push('\n');
    fs::write(path, text).with_context(|| format!("Failed to write palette to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_forms() {
        assert_eq!("#ff8000".parse(), Ok(BackdropColor::new(255, 128, 0)));
        assert_eq!("#F80".parse(), Ok(BackdropColor::new(255, 136, 0)));
        assert_eq!("00ff00".parse(), Ok(BackdropColor::new(0, 255, 0)));
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Blue".parse(), Ok(BackdropColor::new(0, 0, 255)));
        assert_eq!(" yellow ".parse(), Ok(BackdropColor::new(255, 255, 0)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!("".parse::<BackdropColor>(), Err(ColorParseError::Empty));
        assert!(matches!(
            "#12345".parse::<BackdropColor>(),
            Err(ColorParseError::InvalidHex(_))
        ));
        assert!(matches!(
            "chartreuse-ish".parse::<BackdropColor>(),
            Err(ColorParseError::UnknownName(_))
        ));
    }

    #[test]
    fn palette_skips_invalid_lines() {
        let colors = parse_palette("#000000\n\nnot-a-colour\nred\n");
        assert_eq!(colors, vec![BackdropColor::new(0, 0, 0), BackdropColor::new(255, 0, 0)]);
    }

    #[test]
    fn palette_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colours.txt");
        let colors = vec![BackdropColor::new(1, 2, 3), BackdropColor::new(250, 128, 0)];

        save_palette(&path, &colors).unwrap();
        assert_eq!(load_palette(&path).unwrap(), colors);
    }
}
