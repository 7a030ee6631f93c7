//! Settings validation
//!
//! Every schema component checks itself; containers check their children and
//! the references between them.

use std::collections::HashSet;

use anyhow::Result;

use super::schema::{CursorConfig, CursorSettings, GlobalSettings, ThemeConfig};
use crate::theme::{Action, CursorAsset};

/// Validation trait for all settings components
pub trait SettingsValidation {
    /// Validate component settings
    fn validate(&self) -> Result<()>;
}

impl SettingsValidation for GlobalSettings {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl SettingsValidation for CursorAsset {
    fn validate(&self) -> Result<()> {
        if self.src.trim().is_empty() {
            anyhow::bail!("{:?} asset has an empty src", self.action);
        }
        if self.sound_enabled && self.sound_src.is_none() {
            anyhow::bail!(
                "{:?} asset '{}' enables sound without a sound_src",
                self.action,
                self.src
            );
        }
        if !(self.x.is_finite() && self.x > 0.0 && self.y.is_finite() && self.y > 0.0) {
            anyhow::bail!(
                "asset '{}' has invalid size {}x{}",
                self.src,
                self.x,
                self.y
            );
        }
        if self.animated && !(self.duration.is_finite() && self.duration > 0.0) {
            anyhow::bail!(
                "animated asset '{}' needs a positive duration, got {}",
                self.src,
                self.duration
            );
        }
        Ok(())
    }
}

impl SettingsValidation for ThemeConfig {
    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            anyhow::bail!("theme '{}' has an empty id", self.name);
        }
        let mut actions = HashSet::new();
        for asset in &self.assets {
            asset.validate()?;
            if !actions.insert(asset.action) {
                anyhow::bail!("theme '{}' defines {:?} twice", self.id, asset.action);
            }
        }
        if !actions.contains(&Action::Default) {
            anyhow::bail!("theme '{}' has no default asset", self.id);
        }
        Ok(())
    }
}

impl SettingsValidation for CursorConfig {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("cursor with an empty name");
        }
        let mut seen = HashSet::new();
        for entry in &self.io {
            if !seen.insert(entry.identity()) {
                anyhow::bail!(
                    "cursor '{}' lists device {} twice",
                    self.name,
                    entry.identity()
                );
            }
        }
        Ok(())
    }
}

impl SettingsValidation for CursorSettings {
    fn validate(&self) -> Result<()> {
        self.global.validate()?;

        let mut theme_ids = HashSet::new();
        for theme in &self.themes {
            theme.validate()?;
            if !theme_ids.insert(theme.id.as_str()) {
                anyhow::bail!("duplicate theme id '{}'", theme.id);
            }
        }

        let mut names = HashSet::new();
        for cursor in &self.cursors {
            cursor.validate()?;
            if !names.insert(cursor.name.as_str()) {
                anyhow::bail!("duplicate cursor name '{}'", cursor.name);
            }
            let Some(theme) = self.theme(&cursor.theme) else {
                anyhow::bail!(
                    "cursor '{}' uses unknown theme '{}'",
                    cursor.name,
                    cursor.theme
                );
            };
            if theme.kind != cursor.kind {
                anyhow::bail!(
                    "cursor '{}' is {:?} but theme '{}' is {:?}",
                    cursor.name,
                    cursor.kind,
                    theme.id,
                    theme.kind
                );
            }
        }
        Ok(())
    }
}
