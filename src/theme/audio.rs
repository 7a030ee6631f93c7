use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use super::CursorAsset;
use crate::settings::GlobalSettings;

/// Plays the sound attached to a cursor asset
pub trait AudioSink: Send + Sync {
    fn play(&self, src: &str) -> anyhow::Result<()>;
}

/// Sink that only records playback in the log
#[derive(Debug, Default)]
pub struct LogAudioSink;

impl AudioSink for LogAudioSink {
    fn play(&self, src: &str) -> anyhow::Result<()> {
        info!("🔊 Cursor sound: {}", src);
        Ok(())
    }
}

/// Process-wide cursor settings plus the audio output, owned by the manager
/// and handed to every cursor.
pub struct CursorContext {
    global: RwLock<GlobalSettings>,
    audio: Arc<dyn AudioSink>,
}

impl std::fmt::Debug for CursorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorContext")
            .field("global", &*self.global.read())
            .finish_non_exhaustive()
    }
}

impl Default for CursorContext {
    fn default() -> Self {
        Self::new(GlobalSettings::default(), Arc::new(LogAudioSink))
    }
}

impl CursorContext {
    pub fn new(global: GlobalSettings, audio: Arc<dyn AudioSink>) -> Self {
        Self {
            global: RwLock::new(global),
            audio,
        }
    }

    pub fn global(&self) -> GlobalSettings {
        self.global.read().clone()
    }

    pub fn set_global(&self, global: GlobalSettings) {
        *self.global.write() = global;
    }

    pub fn is_sound_enabled(&self) -> bool {
        self.global.read().sound_enabled
    }

    pub fn set_sound_enabled(&self, enabled: bool) {
        self.global.write().sound_enabled = enabled;
    }

    /// Play the asset sound if both the asset and the global switch allow it.
    /// Returns whether playback was attempted.
    pub fn play_asset_sound(&self, asset: &CursorAsset) -> bool {
        let Some(src) = asset.sound_src.as_deref() else {
            return false;
        };
        if !asset.sound_enabled || !self.is_sound_enabled() {
            return false;
        }
        if let Err(e) = self.audio.play(src) {
            warn!("Failed to play cursor sound {}: {}", src, e);
        }
        true
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::AudioSink;

    /// Sink that remembers every sound it was asked to play
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub played: Mutex<Vec<String>>,
    }

    impl AudioSink for RecordingSink {
        fn play(&self, src: &str) -> anyhow::Result<()> {
            self.played.lock().push(src.to_string());
            Ok(())
        }
    }
}
