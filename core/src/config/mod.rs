mod store;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub use store::{CONFIG_FILE, ConfigError, GuildConfigStore};


pub const DEFAULT_STREAK_THRESHOLD: i64 = 10;
pub const DEFAULT_XP_PER_MESSAGE: i64 = 10;
pub const DEFAULT_LEVEL_MULTIPLIER: f64 = 1.5;

// ? every field is optional so that hand-edited or older documents
// ? round-trip without gaining or losing keys

/// A field that can be missing, explicitly `null`, or set.
///
/// `None` is skipped on write, `Some(None)` is written back as `null`.
pub type Leaf<T> = Option<Option<T>>;

fn leaf<'de, D, T>(deserializer: D) -> Result<Leaf<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> {
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A subsection as stored. Anything that doesn't fit the expected shape is
/// kept verbatim instead of failing the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Section<T> {
    Typed(T),
    Raw(Value)
}

impl<T> Section<T> {
    pub fn typed(&self) -> Option<&T> {
        match self {
            Section::Typed(section) => Some(section),
            Section::Raw(_) => None
        }
    }

    pub fn typed_mut(&mut self) -> Option<&mut T> {
        match self {
            Section::Typed(section) => Some(section),
            Section::Raw(_) => None
        }
    }

    /// `false`, `0` and `""` stand in for a missing section, like `null`.
    pub fn is_falsy(&self) -> bool {
        match self {
            Section::Typed(_) => false,
            Section::Raw(Value::Null) => true,
            Section::Raw(Value::Bool(b)) => !b,
            Section::Raw(Value::Number(n)) => n.as_f64() == Some(0.0),
            Section::Raw(Value::String(s)) => s.is_empty(),
            Section::Raw(_) => false
        }
    }
}

impl<T> From<T> for Section<T> {
    fn from(section: T) -> Self {
        Section::Typed(section)
    }
}

/// Per-guild configuration document, stored as `<guild>/config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak_system:         Option<Section<StreakSystem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_leader_system: Option<Section<MessageLeaderSystem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_system:          Option<Section<LevelSystem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_settings:       Option<Section<ReportSettings>>,
    #[serde(flatten)]
    pub extra:                 Map<String, Value>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakSystem {
    #[serde(default, deserialize_with = "leaf", skip_serializing_if = "Option::is_none")]
    pub enabled:          Leaf<bool>,
    #[serde(default, deserialize_with = "leaf", skip_serializing_if = "Option::is_none")]
    pub streak_threshold: Leaf<i64>,
    #[serde(flatten)]
    pub extra:            Map<String, Value>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageLeaderSystem {
    #[serde(default, deserialize_with = "leaf", skip_serializing_if = "Option::is_none")]
    pub enabled: Leaf<bool>,
    #[serde(flatten)]
    pub extra:   Map<String, Value>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSystem {
    #[serde(default, deserialize_with = "leaf", skip_serializing_if = "Option::is_none")]
    pub enabled:          Leaf<bool>,
    #[serde(default, deserialize_with = "leaf", skip_serializing_if = "Option::is_none")]
    pub xp_per_message:   Leaf<i64>,
    #[serde(default, deserialize_with = "leaf", skip_serializing_if = "Option::is_none")]
    pub level_multiplier: Leaf<f64>,
    /// Level key to reward, usually a role id.
    #[serde(default, deserialize_with = "leaf", skip_serializing_if = "Option::is_none")]
    pub rewards:          Leaf<Map<String, Value>>,
    #[serde(flatten)]
    pub extra:            Map<String, Value>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSettings {
    #[serde(default, deserialize_with = "leaf", skip_serializing_if = "Option::is_none")]
    pub weekly_report_channel:  Leaf<String>,
    #[serde(default, deserialize_with = "leaf", skip_serializing_if = "Option::is_none")]
    pub monthly_report_channel: Leaf<String>,
    #[serde(flatten)]
    pub extra:                  Map<String, Value>
}

impl Default for StreakSystem {
    fn default() -> Self {
        Self {
            enabled:          Some(Some(false)),
            streak_threshold: Some(Some(DEFAULT_STREAK_THRESHOLD)),
            extra:            Map::new()
        }
    }
}

impl Default for MessageLeaderSystem {
    fn default() -> Self {
        Self {
            enabled: Some(Some(false)),
            extra:   Map::new()
        }
    }
}

impl Default for LevelSystem {
    fn default() -> Self {
        Self {
            enabled:          Some(Some(false)),
            xp_per_message:   Some(Some(DEFAULT_XP_PER_MESSAGE)),
            level_multiplier: Some(Some(DEFAULT_LEVEL_MULTIPLIER)),
            rewards:          Some(Some(Map::new())),
            extra:            Map::new()
        }
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            weekly_report_channel:  Some(Some(String::new())),
            monthly_report_channel: Some(Some(String::new())),
            extra:                  Map::new()
        }
    }
}

fn fill<T: Default>(section: &mut Option<Section<T>>) {
    if section.as_ref().is_none_or(Section::is_falsy) {
        *section = Some(Section::Typed(T::default()));
    }
}

impl GuildConfig {
    /// Adds every missing subsection with its defaults.
    ///
    /// A subsection that is present is left alone, even when it is only
    /// partially populated or not shaped as expected. `null`, `false`, `0`
    /// and `""` count as missing. Applying this more than once is a no-op.
    pub fn ensure_default_structure(&mut self) {
        fill(&mut self.streak_system);
        fill(&mut self.message_leader_system);
        fill(&mut self.level_system);
        fill(&mut self.report_settings);
    }

    pub fn with_default_structure(mut self) -> Self {
        self.ensure_default_structure();
        self
    }
}
