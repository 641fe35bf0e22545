use crate::config::{ConfigError, TrackastraConfig};
use crate::raster::{Calibration, SourceStack};
use crate::settings::SettingsMap;
use crate::spot::SpotCollection;
use crate::tracker::TrackastraTracker;

pub const DOC_URL: &str = "https://imagej.net/plugins/trackmate/trackers/trackmate-trackastra";

/// Describes the Trackastra tracker to a host that picks trackers by key.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackastraTrackerFactory;

impl TrackastraTrackerFactory {
    pub const KEY: &'static str = "TRACKASTRA_TRACKER";
    pub const NAME: &'static str = "Trackastra tracker";
    pub const INFO_TEXT: &'static str = "Trackastra links segmented cells by predicting \
         associations with a transformer model trained on a diverse set of 2D and 3D \
         microscopy videos. It calls an external Trackastra installation, found through \
         a conda environment, a python interpreter or a trackastra executable.";

    pub fn key(&self) -> &'static str {
        Self::KEY
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn info_text(&self) -> &'static str {
        Self::INFO_TEXT
    }

    pub fn url(&self) -> &'static str {
        DOC_URL
    }

    /// Default configuration for a source image with `n_channels` channels.
    pub fn configurator(&self, n_channels: u32) -> TrackastraConfig {
        TrackastraConfig::new(n_channels)
    }

    pub fn default_settings(&self) -> SettingsMap {
        TrackastraConfig::default().to_settings_map()
    }

    /// Checks that every key is known and every value has the right type.
    /// Required settings filled in at run time are not checked here.
    pub fn check_settings_validity(&self, settings: &SettingsMap) -> Result<(), ConfigError> {
        for (key, value) in settings {
            let mut probe = TrackastraConfig::default();
            probe.set_value(key, value.clone())?;
        }
        Ok(())
    }

    pub fn create<'a>(
        &self,
        spots: &'a SpotCollection,
        settings: &SettingsMap,
        source: &'a SourceStack,
        calibration: Calibration,
    ) -> Result<TrackastraTracker<'a>, ConfigError> {
        let config = TrackastraConfig::from_settings_map(settings, source.channels() as u32)?;
        Ok(TrackastraTracker::new(config, spots, source, calibration))
    }
}
