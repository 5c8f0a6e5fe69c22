//! Volume Coordinator
//!
//! Process-wide service that remembers each page's volume, answers pages
//! asking for their saved volume, and keeps the toolbar badge in sync with
//! the active page. Also hosts the operations behind the popup controls.
//!
//! Percentages are stored here; every message carries a linear gain.

use crate::config::BoosterConfig;
use crate::error::TransportError;
use crate::messaging::{
    AckResponse, CoordinatorEnvelope, CoordinatorRequest, CoordinatorResponse, MessageBus, PageId,
    PageRequest, SavedVolumeResponse,
};
use crate::volume::{
    self, clamp_percent, display_percent, gain_to_percent, percent_to_gain, Badge, ColorBand,
    DEFAULT_PERCENT,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

/// Load state reported by a tab update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Loading,
    Complete,
}

/// One row of the "pages playing sound" list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudiblePage {
    pub page: PageId,
    pub percent: u16,
    pub band: ColorBand,
    /// Draw the label in light text over the band color
    pub light_text: bool,
}

pub struct VolumeCoordinator {
    bus: MessageBus,
    config: BoosterConfig,
    /// page → saved percentage
    volumes: RwLock<HashMap<PageId, f32>>,
    badge: RwLock<Badge>,
}

impl VolumeCoordinator {
    pub fn new(bus: MessageBus, config: BoosterConfig) -> Self {
        Self {
            bus,
            config,
            volumes: RwLock::new(HashMap::new()),
            badge: RwLock::new(Badge::cleared()),
        }
    }

    pub fn config(&self) -> &BoosterConfig {
        &self.config
    }

    // =========================================================================
    // Saved volumes
    // =========================================================================

    /// Saved gain for `page`, unity when nothing was saved
    pub fn get_saved_volume(&self, page: PageId) -> SavedVolumeResponse {
        let percent = self
            .volumes
            .read()
            .get(&page)
            .copied()
            .unwrap_or(DEFAULT_PERCENT);
        SavedVolumeResponse {
            volume: percent_to_gain(percent),
        }
    }

    /// Remember `gain` for `page`. Last writer wins.
    pub fn save_volume(&self, page: PageId, gain: f32) -> AckResponse {
        let percent = gain_to_percent(gain);
        self.volumes.write().insert(page, percent);
        tracing::debug!(%page, percent, "saved volume");
        AckResponse { success: true }
    }

    pub fn saved_pages(&self) -> usize {
        self.volumes.read().len()
    }

    /// Answer one page request
    pub fn handle(&self, sender: PageId, request: CoordinatorRequest) -> CoordinatorResponse {
        match request {
            CoordinatorRequest::GetSavedVolume => {
                CoordinatorResponse::SavedVolume(self.get_saved_volume(sender))
            }
            CoordinatorRequest::SaveVolume { volume } => {
                CoordinatorResponse::Ack(self.save_volume(sender, volume))
            }
        }
    }

    /// Become the bus's coordinator endpoint and serve page requests
    pub fn serve(self: &Arc<Self>) -> JoinHandle<()> {
        let requests = self.bus.serve_coordinator();
        tokio::spawn(Arc::clone(self).serve_loop(requests))
    }

    async fn serve_loop(self: Arc<Self>, mut requests: mpsc::UnboundedReceiver<CoordinatorEnvelope>) {
        tracing::info!("volume coordinator serving");
        while let Some(envelope) = requests.recv().await {
            let response = self.handle(envelope.sender, envelope.request);
            let _ = envelope.reply.send(response);
        }
    }

    // =========================================================================
    // Badge
    // =========================================================================

    pub fn badge(&self) -> Badge {
        self.badge.read().clone()
    }

    fn set_badge(&self, badge: Badge) {
        *self.badge.write() = badge;
    }

    /// Live gain of a page: ask it first, then fall back to the probe
    async fn live_gain(&self, page: PageId) -> Option<f32> {
        let query = self.bus.send_to_page(page, PageRequest::GetVolume);
        match time::timeout(self.config.query_timeout(), query).await {
            Ok(Ok(response)) if response.success => return Some(response.volume),
            Ok(Ok(response)) => {
                tracing::debug!(%page, error = ?response.error, "page refused volume query, probing")
            }
            Ok(Err(e)) => tracing::debug!(%page, error = %e, "volume query failed, probing"),
            Err(_) => {
                tracing::debug!(%page, error = %TransportError::Timeout, "volume query failed, probing")
            }
        }

        match self.bus.execute_probe(page).await {
            Ok(gain) => gain,
            Err(e) => {
                tracing::debug!(%page, error = %e, "probe failed");
                None
            }
        }
    }

    /// Re-read the volume of `page` (the active tab) into the badge.
    /// No page or no data clears the badge.
    pub async fn refresh_badge(&self, page: Option<PageId>) -> Badge {
        let badge = match page {
            Some(page) => match self.live_gain(page).await {
                Some(gain) => Badge::for_percent(display_percent(gain)),
                None => Badge::cleared(),
            },
            None => Badge::cleared(),
        };
        self.set_badge(badge.clone());
        badge
    }

    // =========================================================================
    // Tab events
    // =========================================================================

    pub async fn on_tab_activated(&self, page: PageId) -> Badge {
        self.refresh_badge(Some(page)).await
    }

    pub async fn on_tab_updated(&self, page: PageId, status: TabStatus, active: bool) {
        if !active {
            return;
        }
        match status {
            TabStatus::Loading => self.set_badge(Badge::cleared()),
            TabStatus::Complete => {
                // Give the page agent time to come up
                time::sleep(self.config.badge_refresh_delay()).await;
                self.refresh_badge(Some(page)).await;
            }
        }
    }

    pub fn on_tab_removed(&self, page: PageId) {
        if self.volumes.write().remove(&page).is_some() {
            tracing::debug!(%page, "forgot saved volume");
        }
        self.set_badge(Badge::cleared());
    }

    // =========================================================================
    // Control surface
    // =========================================================================

    /// Integer percentage the page is playing at, 100 when unknown
    pub async fn current_volume(&self, page: PageId) -> u16 {
        match self.bus.execute_probe(page).await {
            Ok(Some(gain)) => display_percent(gain),
            Ok(None) => DEFAULT_PERCENT as u16,
            Err(e) => {
                tracing::debug!(%page, error = %e, "could not read page volume");
                DEFAULT_PERCENT as u16
            }
        }
    }

    /// Set the page to `percent` (clamped) and return the clamped value.
    ///
    /// The badge follows the requested value even if the page did not answer.
    pub async fn set_page_volume(&self, page: PageId, percent: f32) -> u16 {
        let percent = clamp_percent(percent);
        let request = PageRequest::SetVolume {
            volume: percent / 100.0,
        };
        let sent = self.bus.send_to_page(page, request);
        match time::timeout(self.config.query_timeout(), sent).await {
            Ok(Ok(response)) if response.success => {}
            Ok(Ok(response)) => {
                tracing::warn!(%page, error = ?response.error, "page rejected volume")
            }
            Ok(Err(e)) => tracing::warn!(%page, error = %e, "could not set page volume"),
            Err(_) => tracing::warn!(%page, "set volume timed out"),
        }

        let shown = percent.round() as u16;
        self.set_badge(Badge::for_percent(shown));
        shown
    }

    /// Step the page volume by `delta` percent
    pub async fn adjust_page_volume(&self, page: PageId, delta: i32) -> u16 {
        let current = self.current_volume(page).await;
        let target = volume::step_percent(current, delta);
        self.set_page_volume(page, target as f32).await
    }

    pub async fn step_up(&self, page: PageId) -> u16 {
        self.adjust_page_volume(page, self.config.step_percent as i32)
            .await
    }

    pub async fn step_down(&self, page: PageId) -> u16 {
        self.adjust_page_volume(page, -(self.config.step_percent as i32))
            .await
    }

    pub fn presets(&self) -> &[u16] {
        &self.config.presets
    }

    /// Every page currently producing sound, with its volume
    pub async fn audible_pages(&self) -> Vec<AudiblePage> {
        let mut rows = Vec::new();
        for page in self.bus.pages() {
            if !self.bus.is_audible(page) {
                continue;
            }
            let percent = self.current_volume(page).await;
            rows.push(AudiblePage {
                page,
                percent,
                band: ColorBand::for_percent(percent),
                light_text: volume::prefers_light_text(percent),
            });
        }
        rows
    }
}

impl std::fmt::Debug for VolumeCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeCoordinator")
            .field("saved_pages", &self.saved_pages())
            .field("badge", &self.badge())
            .finish()
    }
}
