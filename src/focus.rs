//! Topic tags and the focus points they resolve to.
//!
//! Every interactive object in a dreamscape belongs to one of four narrative
//! topics. Clicking an object looks its topic up in the [`FocusTable`] and, if
//! an entry exists, the camera eases toward the entry's position while the
//! title/description slots switch to the entry's text.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Narrative category of a visual element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Graphics,
    Photography,
    Programming,
    Eating,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::Graphics,
        Topic::Photography,
        Topic::Programming,
        Topic::Eating,
    ];

    /// Stable string id, matches the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Graphics => "graphics",
            Topic::Photography => "photography",
            Topic::Programming => "programming",
            Topic::Eating => "eating",
        }
    }
}

impl FromStr for Topic {
    type Err = anyhow::Error;

    /// Parse a topic id. Case-insensitive.
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "graphics" => Ok(Topic::Graphics),
            "photography" => Ok(Topic::Photography),
            "programming" => Ok(Topic::Programming),
            "eating" => Ok(Topic::Eating),
            other => anyhow::bail!("Unknown topic '{}'", other),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Camera look-at target and narrative text for one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusPoint {
    /// World-space look-at position for the camera.
    pub position: [f32; 3],
    pub title: String,
    pub description: String,
    /// Bloom strength to ease toward while this topic is focused.
    #[serde(default)]
    pub bloom: Option<f32>,
}

impl FocusPoint {
    pub fn new(position: [f32; 3], title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            position,
            title: title.into(),
            description: description.into(),
            bloom: None,
        }
    }

    pub fn with_bloom(mut self, bloom: f32) -> Self {
        self.bloom = Some(bloom);
        self
    }

    pub fn position_vec3(&self) -> glam::Vec3 {
        glam::Vec3::from_array(self.position)
    }
}

/// Focus points keyed by topic. Immutable once the world is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FocusTable {
    points: HashMap<Topic, FocusPoint>,
}

impl FocusTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert used while assembling a world.
    pub fn with(mut self, topic: Topic, point: FocusPoint) -> Self {
        self.points.insert(topic, point);
        self
    }

    pub fn get(&self, topic: Topic) -> Option<&FocusPoint> {
        self.points.get(&topic)
    }

    pub fn contains(&self, topic: Topic) -> bool {
        self.points.contains_key(&topic)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_round_trip_names() {
        for topic in Topic::ALL {
            assert_eq!(topic.as_str().parse::<Topic>().unwrap(), topic);
        }
        assert_eq!("PHOTOGRAPHY".parse::<Topic>().unwrap(), Topic::Photography);
        assert!("cooking".parse::<Topic>().is_err());
    }

    #[test]
    fn test_topic_serde_snake_case() {
        let json = serde_json::to_string(&Topic::Programming).unwrap();
        assert_eq!(json, "\"programming\"");
    }

    #[test]
    fn test_focus_table_lookup() {
        let table = FocusTable::new().with(
            Topic::Graphics,
            FocusPoint::new([0.0, 1.0, 0.0], "Graphics", "Light and geometry"),
        );

        assert!(table.contains(Topic::Graphics));
        assert!(!table.contains(Topic::Eating));
        assert_eq!(table.get(Topic::Graphics).unwrap().title, "Graphics");
        assert_eq!(table.len(), 1);
    }
}
