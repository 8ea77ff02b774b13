//! Activity and category descriptors.
//!
//! These are plain values owned by whoever manages the catalog. A recording
//! session keeps its own copy of the activity it was started with and refers
//! to the category by id only.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub name: String,
    pub category_id: i64,
    /// Lower bound shown when picking a repetition target.
    #[serde(default)]
    pub min_repeats: u32,
    /// Upper bound shown when picking a repetition target.
    #[serde(default)]
    pub max_repeats: u32,
    #[serde(default)]
    pub use_repeats: bool,
    #[serde(default)]
    pub use_distance: bool,
}

impl Activity {
    pub fn new(id: i64, name: impl Into<String>, category_id: i64) -> Self {
        Self {
            id,
            name: name.into(),
            category_id,
            min_repeats: 0,
            max_repeats: 0,
            use_repeats: false,
            use_distance: false,
        }
    }

    /// Enable repetition tracking with the given bounds.
    pub fn with_repeats(mut self, min: u32, max: u32) -> Self {
        self.use_repeats = true;
        self.min_repeats = min;
        self.max_repeats = max.max(min);
        self
    }

    pub fn with_distance(mut self) -> Self {
        self.use_distance = true;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.id > 0 && !self.name.trim().is_empty()
    }
}

/// Read-only catalog lookup, usually loaded from `catalog.toml`.
///
/// ```toml
/// [[categories]]
/// id = 1
/// name = "Sports"
///
/// [[activities]]
/// id = 3
/// name = "Squats"
/// category_id = 1
/// use_repeats = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    pub fn activity(&self, id: i64) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == id)
    }

    pub fn category(&self, id: i64) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn activities_in(&self, category_id: i64) -> impl Iterator<Item = &Activity> {
        self.activities
            .iter()
            .filter(move |a| a.category_id == category_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
        [[categories]]
        id = 1
        name = "Sports"
        color = "#ff0000"

        [[activities]]
        id = 3
        name = "Squats"
        category_id = 1
        use_repeats = true
        max_repeats = 20

        [[activities]]
        id = 4
        name = "Running"
        category_id = 1
        use_distance = true
    "##;

    #[test]
    fn parses_catalog_toml() {
        let catalog = Catalog::from_toml(SAMPLE).unwrap();
        assert_eq!(catalog.categories.len(), 1);

        let squats = catalog.activity(3).unwrap();
        assert!(squats.use_repeats);
        assert!(!squats.use_distance);
        assert_eq!(squats.max_repeats, 20);

        let running = catalog.activity(4).unwrap();
        assert!(running.use_distance);
        assert_eq!(catalog.activities_in(1).count(), 2);
        assert!(catalog.activity(99).is_none());
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = Catalog::from_toml("activities = 3").unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(_)));
    }

    #[test]
    fn builder_flags() {
        let a = Activity::new(1, "Push-ups", 2).with_repeats(5, 3);
        assert!(a.use_repeats);
        assert_eq!(a.max_repeats, 5);
        assert!(a.is_valid());
        assert!(!Activity::new(0, " ", 2).is_valid());
    }
}
