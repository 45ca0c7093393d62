use std::collections::BTreeSet;
use std::mem;

use parley_shared::{RegionDef, TurnSnapshot};

use crate::error::RenderError;
use crate::settings::{RenderSettings, SettingKey, SettingValue};

/// Whether the map is in its normal display or the influence overlay.
///
/// The overlay owns the settings that were live when it was entered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DisplayMode {
    #[default]
    Normal,
    Influence { saved: RenderSettings },
}

impl DisplayMode {
    pub fn is_influence(&self) -> bool {
        matches!(self, DisplayMode::Influence { .. })
    }

    /// Save `live`, then reduce it to the overlay's settings: everything
    /// cleared except an empty visible-factions set.
    pub fn enter(&mut self, live: &mut RenderSettings) -> Result<(), RenderError> {
        if self.is_influence() {
            return Err(RenderError::InfluenceAlreadyActive);
        }
        let saved = live.clone();
        if live.flag(SettingKey::ShowUnordered, false) {
            live.set_flag(SettingKey::ShowUnordered, false);
        }
        live.clear();
        live.set(
            SettingKey::VisibleFactions,
            SettingValue::Factions(BTreeSet::new()),
        );
        *self = DisplayMode::Influence { saved };
        Ok(())
    }

    /// Copy every saved entry back into `live` and return to normal display.
    pub fn exit(&mut self, live: &mut RenderSettings) -> Result<(), RenderError> {
        match mem::take(self) {
            DisplayMode::Influence { saved } => {
                live.restore_from(&saved);
                Ok(())
            }
            DisplayMode::Normal => Err(RenderError::InfluenceNotActive),
        }
    }

    /// Drop any saved settings without restoring them.
    pub fn release(&mut self) {
        *self = DisplayMode::Normal;
    }
}

/// Overlay class for a region: land regions are colored by their last
/// occupier; everything else keeps its normal look.
pub fn influence_class(region: &RegionDef, snapshot: &TurnSnapshot) -> Option<String> {
    if !region.land {
        return None;
    }
    snapshot
        .last_occupier(&region.name)
        .map(|faction| format!("influence_{faction}"))
}
