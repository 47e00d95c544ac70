//! Scene scripts for the simulated screen.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::SimulationError;
use crate::signature::Location;

/// What an on-screen element shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementLabel {
    /// Text as an OCR pass would read it.
    Text(String),
    /// A visual feature, by name.
    Feature(String),
}

impl ElementLabel {
    /// The text or feature name, used to address elements in reactions.
    pub fn key(&self) -> &str {
        match self {
            Self::Text(s) | Self::Feature(s) => s,
        }
    }
}

/// An element in a scene script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneElement {
    pub label: ElementLabel,
    pub location: Location,
    /// Delay before the element becomes visible. For reaction elements the
    /// delay counts from the moment the reaction fires.
    #[serde(default)]
    pub appear_after_ms: u64,
    /// Lifetime once visible. `None` keeps the element until hidden.
    #[serde(default)]
    pub vanish_after_ms: Option<u64>,
}

impl SceneElement {
    pub fn text(text: impl Into<String>, location: Location) -> Self {
        Self {
            label: ElementLabel::Text(text.into()),
            location,
            appear_after_ms: 0,
            vanish_after_ms: None,
        }
    }

    pub fn feature(name: impl Into<String>, location: Location) -> Self {
        Self {
            label: ElementLabel::Feature(name.into()),
            location,
            appear_after_ms: 0,
            vanish_after_ms: None,
        }
    }

    pub fn appearing_after(mut self, ms: u64) -> Self {
        self.appear_after_ms = ms;
        self
    }
}

/// A scripted change of the screen triggered by input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reaction {
    /// Fires when an element with this label key is clicked.
    #[serde(default)]
    pub on_click: Option<String>,
    /// Fires when this key is pressed.
    #[serde(default)]
    pub on_key: Option<String>,
    /// Only fires while an element with this label key is visible.
    #[serde(default)]
    pub when_visible: Option<String>,
    /// Delay between the trigger and the change.
    #[serde(default)]
    pub after_ms: u64,
    /// Label keys to hide.
    #[serde(default)]
    pub hide: Vec<String>,
    #[serde(default)]
    pub show: Vec<SceneElement>,
}

impl Reaction {
    pub fn on_click(key: impl Into<String>) -> Self {
        Self {
            on_click: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn on_key(key: impl Into<String>) -> Self {
        Self {
            on_key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn when_visible(mut self, key: impl Into<String>) -> Self {
        self.when_visible = Some(key.into());
        self
    }

    pub fn after(mut self, ms: u64) -> Self {
        self.after_ms = ms;
        self
    }

    pub fn hiding<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hide.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn showing(mut self, element: SceneElement) -> Self {
        self.show.push(element);
        self
    }
}

/// Screen size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// A complete scene script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub screen: ScreenSize,
    #[serde(default, rename = "element")]
    pub elements: Vec<SceneElement>,
    #[serde(default, rename = "reaction")]
    pub reactions: Vec<Reaction>,
}

impl Scene {
    pub fn from_toml_str(s: &str) -> Result<Self, SimulationError> {
        toml::from_str(s).map_err(|e| SimulationError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, SimulationError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SimulationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scene() {
        let toml = r#"
[screen]
width = 1280
height = 720

[[element]]
label = { text = "密函报酬选择" }
location = { x = 500, y = 100, width = 200, height = 40 }
appear_after_ms = 2000

[[reaction]]
on_click = "确认选择"
when_visible = "密函报酬选择"
after_ms = 500
hide = ["密函报酬选择", "确认选择"]

[[reaction.show]]
label = { feature = "lizibeier" }
location = { x = 300, y = 300, width = 80, height = 80 }
"#;
        let scene = Scene::from_toml_str(toml).unwrap();
        assert_eq!(scene.screen.width, 1280);
        assert_eq!(scene.elements.len(), 1);
        assert_eq!(scene.elements[0].appear_after_ms, 2000);
        assert_eq!(scene.elements[0].label.key(), "密函报酬选择");

        let reaction = &scene.reactions[0];
        assert_eq!(reaction.on_click.as_deref(), Some("确认选择"));
        assert_eq!(reaction.when_visible.as_deref(), Some("密函报酬选择"));
        assert_eq!(reaction.hide.len(), 2);
        assert_eq!(
            reaction.show[0].label,
            ElementLabel::Feature("lizibeier".to_string())
        );
    }

    #[test]
    fn test_parse_empty_scene_defaults() {
        let scene = Scene::from_toml_str("").unwrap();
        assert_eq!(scene.screen, ScreenSize::default());
        assert!(scene.elements.is_empty());
        assert!(scene.reactions.is_empty());
    }

    #[test]
    fn test_parse_error() {
        let result = Scene::from_toml_str("[[element]]\nlabel = 3");
        assert!(matches!(result, Err(SimulationError::Parse(_))));
    }
}
