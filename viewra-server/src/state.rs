//! Shared application state for the `/playback/*` HTTP surface.

use std::sync::Arc;

use viewra_core::config::TranscodingConfig;
use viewra_playback::PlaybackController;
use viewra_provider::ProviderPool;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<PlaybackController>,
    pub providers: Arc<ProviderPool>,
    pub transcoding: Arc<TranscodingConfig>,
}
