use crate::settings::LabelLevel;

pub const DEFAULT_LABEL_LEVEL: LabelLevel = LabelLevel::Brief;
pub const DEFAULT_LENIENT_ANCHORS: bool = false;
pub const DEFAULT_SHOW_UNORDERED: bool = false;
pub const DEFAULT_SHOW_SUPPLY_CENTERS: bool = true;

/// Engine options resolved once at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Substitute zeroed anchors for missing per-region points instead of failing.
    pub lenient_anchors: bool,
    pub label_level: LabelLevel,
    pub show_unordered: bool,
    pub show_supply_centers: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lenient_anchors: DEFAULT_LENIENT_ANCHORS,
            label_level: DEFAULT_LABEL_LEVEL,
            show_unordered: DEFAULT_SHOW_UNORDERED,
            show_supply_centers: DEFAULT_SHOW_SUPPLY_CENTERS,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            lenient_anchors: lenient_anchors_enabled(),
            label_level: label_level(),
            show_unordered: env_flag("MAP_SHOW_UNORDERED").unwrap_or(DEFAULT_SHOW_UNORDERED),
            show_supply_centers: env_flag("MAP_SHOW_SUPPLY_CENTERS")
                .unwrap_or(DEFAULT_SHOW_SUPPLY_CENTERS),
        }
    }
}

pub fn lenient_anchors_enabled() -> bool {
    env_flag("MAP_LENIENT_ANCHORS").unwrap_or(DEFAULT_LENIENT_ANCHORS)
}

pub fn label_level() -> LabelLevel {
    std::env::var("MAP_LABEL_LEVEL")
        .ok()
        .and_then(|value| value.parse::<LabelLevel>().ok())
        .unwrap_or(DEFAULT_LABEL_LEVEL)
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
