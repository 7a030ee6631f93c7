//! Bevy integration
//!
//! [`CursorPlugin`] builds the [`CursorManager`] and runs one cursor frame
//! per `Update`. The events of the last frame are kept in
//! [`CursorFrameEvents`] for systems that prefer polling over listeners.

use bevy::prelude::*;
use tracing::error;

use crate::cursor::CursorEvent;
use crate::manager::{CursorManager, CursorManagerConfig};
use crate::settings::CursorSettings;

/// Events produced by the most recent cursor frame
#[derive(Resource, Debug, Default)]
pub struct CursorFrameEvents {
    pub events: Vec<CursorEvent>,
    pub frame: u64,
}

#[derive(Default)]
pub struct CursorPlugin {
    pub config: CursorManagerConfig,
    /// Use these settings instead of loading them from storage
    pub settings: Option<CursorSettings>,
}

impl CursorPlugin {
    pub fn new(config: CursorManagerConfig) -> Self {
        Self {
            config,
            settings: None,
        }
    }

    pub fn with_settings(mut self, settings: CursorSettings) -> Self {
        self.settings = Some(settings);
        self
    }
}

impl Plugin for CursorPlugin {
    fn build(&self, app: &mut App) {
        let manager = match &self.settings {
            Some(settings) => CursorManager::from_settings(self.config.clone(), settings.clone()),
            None => CursorManager::new(self.config.clone()),
        };
        match manager {
            Ok(manager) => {
                app.insert_resource(manager);
            }
            Err(e) => error!("❌ Cursor manager could not start: {}", e),
        }
        app.insert_resource(self.config.clone())
            .init_resource::<CursorFrameEvents>()
            .add_systems(Update, update_cursors);
    }
}

fn update_cursors(manager: Option<ResMut<CursorManager>>, mut frame: ResMut<CursorFrameEvents>) {
    let Some(mut manager) = manager else {
        return;
    };
    frame.events = manager.update();
    frame.frame += 1;
}
