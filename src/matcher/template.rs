//! Template images and the manifest that describes them.
//!
//! A template directory holds a `templates.json` manifest and the PNG files
//! it lists:
//!
//! ```json
//! [
//!   { "file": "points/purple/point_3_alt.png", "category": "points", "team": "purple", "value": 3 },
//!   { "file": "killed/killed_with_points.png", "category": "killed", "team": "game",
//!     "event": "killed_with_points" }
//! ]
//! ```

use image::GrayImage;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::TemplateError;
use crate::events::EventKind;
use crate::pieces::TemplateDescriptor;
use crate::team::TeamId;

pub const MANIFEST: &str = "templates.json";

/// Template groups, one per kind of on-screen element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Team score banners.
    Scored,
    /// Digit glyphs.
    Points,
    /// Clock digit glyphs.
    Time,
    /// Defeat banners.
    Killed,
    /// Match start and end banners.
    Game,
    /// Objective secured banners.
    Secure,
    Ko,
    ScoreOption,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Category::Scored => "scored",
            Category::Points => "points",
            Category::Time => "time",
            Category::Killed => "killed",
            Category::Game => "game",
            Category::Secure => "secure",
            Category::Ko => "ko",
            Category::ScoreOption => "score_option",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scored" => Ok(Category::Scored),
            "points" => Ok(Category::Points),
            "time" => Ok(Category::Time),
            "killed" => Ok(Category::Killed),
            "game" => Ok(Category::Game),
            "secure" => Ok(Category::Secure),
            "ko" => Ok(Category::Ko),
            "score_option" => Ok(Category::ScoreOption),
            other => Err(TemplateError::UnknownCategory(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub descriptor: TemplateDescriptor,
    pub gray: GrayImage,
    /// Event this template announces, for banner templates.
    pub event: Option<EventKind>,
}

impl Template {
    pub fn new(descriptor: TemplateDescriptor, gray: GrayImage, event: Option<EventKind>) -> Self {
        Self {
            descriptor,
            gray,
            event,
        }
    }

    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    file: PathBuf,
    category: String,
    team: TeamId,
    #[serde(default = "no_value")]
    value: i64,
    #[serde(default)]
    event: Option<String>,
}

fn no_value() -> i64 {
    -1
}

/// Every loaded template, grouped by category and team.
#[derive(Debug, Default)]
pub struct TemplateLibrary {
    groups: HashMap<(Category, TeamId), Vec<Template>>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `templates.json` and its images from `dir`.
    pub fn load(dir: &Path) -> Result<Self, TemplateError> {
        let manifest_path = dir.join(MANIFEST);
        let manifest_failed = |source: Box<dyn std::error::Error + Send + Sync>| {
            TemplateError::ManifestFailed {
                path: manifest_path.display().to_string(),
                source,
            }
        };

        let content = fs::read_to_string(&manifest_path).map_err(|e| manifest_failed(Box::new(e)))?;
        let entries: Vec<ManifestEntry> =
            serde_json::from_str(&content).map_err(|e| manifest_failed(Box::new(e)))?;

        let mut library = Self::new();
        for entry in entries {
            let category: Category = entry.category.parse()?;
            let path = dir.join(&entry.file);
            let file = path.display().to_string();

            let event = entry
                .event
                .as_deref()
                .map(|name| {
                    name.parse::<EventKind>().map_err(|_| TemplateError::UnknownEvent {
                        file: file.clone(),
                        name: name.to_string(),
                    })
                })
                .transpose()?;

            let gray = image::open(&path)
                .map_err(|source| TemplateError::ImageFailed {
                    path: file.clone(),
                    source,
                })?
                .to_luma8();

            let source_id = entry
                .file
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.clone());

            library.insert(
                category,
                entry.team,
                Template::new(
                    TemplateDescriptor::new(category.name(), source_id, entry.value),
                    gray,
                    event,
                ),
            );
        }

        tracing::info!(
            "Loaded {} templates in {} groups from {}",
            library.len(),
            library.groups.len(),
            dir.display()
        );

        Ok(library)
    }

    pub fn insert(&mut self, category: Category, team: TeamId, template: Template) {
        self.groups.entry((category, team)).or_default().push(template);
    }

    /// Templates of `category` for `team`; empty when none were loaded.
    pub fn group(&self, category: Category, team: TeamId) -> &[Template] {
        self.groups
            .get(&(category, team))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
