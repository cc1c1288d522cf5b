//! Reader style configuration rendered into injected CSS

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn background(&self) -> &'static str {
        match self {
            Theme::Light => "#ffffff",
            Theme::Dark => "#0b0220",
        }
    }

    pub fn foreground(&self) -> &'static str {
        match self {
            Theme::Light => "#1d1b1e",
            Theme::Dark => "#e5c3fc",
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme: {}", other)),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

/// Explicit reading style, passed to chapter preparation and the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleConfig {
    pub theme: Theme,
    /// Body font size in px
    pub font_size: f32,
    /// Paragraph line height multiplier
    pub line_height: f32,
    /// Body padding in px
    pub margin: u32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            font_size: 16.0,
            line_height: 1.45,
            margin: 16,
        }
    }
}

impl StyleConfig {
    /// Render the reader stylesheet
    pub fn to_css(&self) -> String {
        format!(
            "html, body {{ background: {bg}; color: {fg}; margin: 0; padding: 0; -webkit-text-size-adjust: none; }}\n\
             body {{ font-size: {size}px; padding: {margin}px; }}\n\
             p {{ line-height: {line}; }}\n\
             img, svg {{ max-width: 100%; height: auto; display: block; margin: 8px auto; }}\n\
             pre, code {{ white-space: pre-wrap; word-break: break-word; }}\n\
             a {{ color: inherit; font-weight: 600; cursor: pointer; }}\n",
            bg = self.theme.background(),
            fg = self.theme.foreground(),
            size = self.font_size,
            margin = self.margin,
            line = self.line_height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_reflects_config() {
        let style = StyleConfig {
            theme: Theme::Dark,
            font_size: 20.0,
            line_height: 1.6,
            margin: 24,
        };
        let css = style.to_css();
        assert!(css.contains("background: #0b0220"));
        assert!(css.contains("font-size: 20px"));
        assert!(css.contains("line-height: 1.6"));
        assert!(css.contains("padding: 24px"));
    }

    #[test]
    fn test_theme_parse() {
        assert_eq!("Dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert!("sepia".parse::<Theme>().is_err());
        assert_eq!(Theme::Light.to_string(), "light");
    }
}
