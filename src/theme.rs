use std::fs;
use std::path::Path;

use ratatui::style::Color;
use serde::Deserialize;

use crate::app::TranscriptKind;

#[derive(Debug, Clone)]
pub struct Theme {
    pub sidebar_bg: Color,
    pub conversation_bg: Color,
    pub logs_bg: Color,
    pub input_bg: Color,
    pub status_bg: Color,
    pub highlight_bg: Color,
    pub text_fg: Color,
    pub muted_fg: Color,
    pub active_fg: Color,
    pub user_fg: Color,
    pub reply_fg: Color,
    pub error_fg: Color,
    pub log_fg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            sidebar_bg: Color::Rgb(45, 45, 45),
            conversation_bg: Color::Rgb(25, 25, 25),
            logs_bg: Color::Rgb(32, 32, 32),
            input_bg: Color::Rgb(53, 53, 53),
            status_bg: Color::Rgb(36, 36, 36),
            highlight_bg: Color::Rgb(42, 130, 218),
            text_fg: Color::Rgb(235, 235, 235),
            muted_fg: Color::Rgb(169, 169, 169),
            active_fg: Color::Rgb(255, 255, 255),
            user_fg: Color::Rgb(0xaa, 0xde, 0xff),
            reply_fg: Color::Rgb(0xd0, 0xf0, 0xc0),
            error_fg: Color::Rgb(0xff, 0xb6, 0xc1),
            log_fg: Color::Rgb(0xa9, 0xa9, 0xa9),
        }
    }
}

impl Theme {
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path_ref = path.as_ref();
        match fs::read_to_string(path_ref) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(theme) => theme,
                Err(err) => {
                    tracing::warn!(path = %path_ref.display(), %err, "failed to parse theme, using defaults");
                    Self::default()
                }
            },
            Err(err) => {
                tracing::debug!(path = %path_ref.display(), %err, "no theme file, using defaults");
                Self::default()
            }
        }
    }

    /// Parses a theme file. Colors left out keep their default value.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        let cfg: ThemeToml = toml::from_str(s)?;
        let colors = cfg.colors;
        let mut theme = Self::default();
        for (slot, value) in [
            (&mut theme.sidebar_bg, colors.sidebar_bg),
            (&mut theme.conversation_bg, colors.conversation_bg),
            (&mut theme.logs_bg, colors.logs_bg),
            (&mut theme.input_bg, colors.input_bg),
            (&mut theme.status_bg, colors.status_bg),
            (&mut theme.highlight_bg, colors.highlight_bg),
            (&mut theme.text_fg, colors.text_fg),
            (&mut theme.muted_fg, colors.muted_fg),
            (&mut theme.active_fg, colors.active_fg),
            (&mut theme.user_fg, colors.user_fg),
            (&mut theme.reply_fg, colors.reply_fg),
            (&mut theme.error_fg, colors.error_fg),
            (&mut theme.log_fg, colors.log_fg),
        ] {
            if let Some(rgb) = value {
                *slot = rgb.to_color();
            }
        }
        Ok(theme)
    }

    pub fn transcript_fg(&self, kind: TranscriptKind) -> Color {
        match kind {
            TranscriptKind::User => self.user_fg,
            TranscriptKind::Reply => self.reply_fg,
            TranscriptKind::Error => self.error_fg,
            TranscriptKind::Log => self.log_fg,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ThemeToml {
    #[serde(default)]
    colors: ThemeColorsToml,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ThemeColorsToml {
    sidebar_bg: Option<RgbToml>,
    conversation_bg: Option<RgbToml>,
    logs_bg: Option<RgbToml>,
    input_bg: Option<RgbToml>,
    status_bg: Option<RgbToml>,
    highlight_bg: Option<RgbToml>,
    text_fg: Option<RgbToml>,
    muted_fg: Option<RgbToml>,
    active_fg: Option<RgbToml>,
    user_fg: Option<RgbToml>,
    reply_fg: Option<RgbToml>,
    error_fg: Option<RgbToml>,
    log_fg: Option<RgbToml>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct RgbToml {
    r: u8,
    g: u8,
    b: u8,
}

impl RgbToml {
    fn to_color(self) -> Color {
        Color::Rgb(self.r, self.g, self.b)
    }
}
