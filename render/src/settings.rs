use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use parley_shared::{FactionId, LabelSupport};
use serde::{Deserialize, Serialize};

/// Requested label verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelLevel {
    None,
    #[default]
    Brief,
    Full,
}

impl LabelLevel {
    pub const fn name(self) -> &'static str {
        match self {
            LabelLevel::None => "none",
            LabelLevel::Brief => "brief",
            LabelLevel::Full => "full",
        }
    }

    /// Step down to what the map can actually show: Full falls back to Brief,
    /// Brief falls back to None. At most two steps.
    pub fn degrade(self, support: LabelSupport) -> LabelLevel {
        let mut level = self;
        if level == LabelLevel::Full && !support.full {
            level = LabelLevel::Brief;
        }
        if level == LabelLevel::Brief && !support.brief {
            level = LabelLevel::None;
        }
        level
    }
}

impl fmt::Display for LabelLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LabelLevel {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(LabelLevel::None),
            "brief" | "short" => Ok(LabelLevel::Brief),
            "full" | "long" => Ok(LabelLevel::Full),
            other => Err(format!("unknown label level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    ShowMap,
    ShowSupplyCenters,
    ShowUnits,
    ShowDislodgedUnits,
    ShowUnordered,
    LabelLevel,
    VisibleFactions,
}

impl SettingKey {
    pub const fn name(self) -> &'static str {
        match self {
            SettingKey::ShowMap => "show_map",
            SettingKey::ShowSupplyCenters => "show_supply_centers",
            SettingKey::ShowUnits => "show_units",
            SettingKey::ShowDislodgedUnits => "show_dislodged_units",
            SettingKey::ShowUnordered => "show_unordered",
            SettingKey::LabelLevel => "label_level",
            SettingKey::VisibleFactions => "visible_factions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingValue {
    Flag(bool),
    Labels(LabelLevel),
    Factions(BTreeSet<FactionId>),
}

/// Named render options. Absent keys read as their caller-supplied default.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderSettings {
    values: BTreeMap<SettingKey, SettingValue>,
}

impl RenderSettings {
    pub fn get(&self, key: SettingKey) -> Option<&SettingValue> {
        self.values.get(&key)
    }

    pub fn set(&mut self, key: SettingKey, value: SettingValue) {
        self.values.insert(key, value);
    }

    pub fn set_flag(&mut self, key: SettingKey, value: bool) {
        self.set(key, SettingValue::Flag(value));
    }

    pub fn flag(&self, key: SettingKey, default: bool) -> bool {
        match self.values.get(&key) {
            Some(SettingValue::Flag(value)) => *value,
            _ => default,
        }
    }

    pub fn label_level(&self) -> Option<LabelLevel> {
        match self.values.get(&SettingKey::LabelLevel) {
            Some(SettingValue::Labels(level)) => Some(*level),
            _ => None,
        }
    }

    pub fn visible_factions(&self) -> Option<&BTreeSet<FactionId>> {
        match self.values.get(&SettingKey::VisibleFactions) {
            Some(SettingValue::Factions(factions)) => Some(factions),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Copy every entry of `saved` over the live values. Keys absent from
    /// `saved` are left alone.
    pub fn restore_from(&mut self, saved: &RenderSettings) {
        for (key, value) in &saved.values {
            self.values.insert(*key, value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SettingKey, &SettingValue)> + '_ {
        self.values.iter().map(|(key, value)| (*key, value))
    }
}

/// Settings map shared between the render consumer and query call sites.
/// Every read and write goes through one coarse lock.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<Mutex<RenderSettings>>,
}

impl SharedSettings {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(settings)),
        }
    }

    pub fn get(&self, key: SettingKey) -> Option<SettingValue> {
        self.with(|settings| settings.get(key).cloned())
    }

    pub fn snapshot(&self) -> RenderSettings {
        self.with(RenderSettings::clone)
    }

    pub fn with<R>(&self, f: impl FnOnce(&RenderSettings) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut RenderSettings) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
