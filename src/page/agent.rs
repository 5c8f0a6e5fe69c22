//! Page agent - runs a page's manager on the async runtime
//!
//! One agent per page. It owns the tasks that feed the manager: mutation
//! observation, the periodic sweep, message handling, restoring the saved
//! volume, and persisting new volumes.

use super::manager::GainGraphManager;
use crate::config::BoosterConfig;
use crate::error::TransportError;
use crate::messaging::{
    CoordinatorRequest, CoordinatorResponse, MessageBus, PageId, PageRequest, VolumeResponse,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

pub struct PageAgent {
    page: PageId,
    manager: GainGraphManager,
    tasks: Vec<JoinHandle<()>>,
}

impl PageAgent {
    /// Inject into `page` and start all tasks. Must run inside a tokio runtime.
    ///
    /// Fails when the page is unknown or refuses scripts.
    pub fn spawn(
        bus: &MessageBus,
        page: PageId,
        config: &BoosterConfig,
    ) -> Result<Self, TransportError> {
        let realm = bus.realm(page)?;
        let requests = bus.listen_page(page)?;
        let manager = GainGraphManager::new(realm.clone());

        // Subscribe before the initial scan so no insertion slips between them.
        let mutations = realm.document().observe();
        let wired = manager.scan_document();
        tracing::info!(%page, wired, "page agent started");

        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        manager.set_persist_sink(persist_tx);

        let tasks = vec![
            tokio::spawn(serve_requests(manager.clone(), requests)),
            tokio::spawn(observe_mutations(manager.clone(), mutations)),
            tokio::spawn(sweep_periodically(manager.clone(), config.sweep_interval())),
            tokio::spawn(persist_volumes(bus.clone(), page, persist_rx)),
            tokio::spawn(restore_saved_volume(
                bus.clone(),
                page,
                manager.clone(),
                config.restore_timeout(),
            )),
        ];

        Ok(Self {
            page,
            manager,
            tasks,
        })
    }

    pub fn page(&self) -> PageId {
        self.page
    }

    pub fn manager(&self) -> &GainGraphManager {
        &self.manager
    }

    /// Stop all tasks; the page stops answering messages.
    /// Dropping the agent does the same.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for PageAgent {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        tracing::debug!(page = %self.page, "page agent stopped");
    }
}

/// Answer one request against the manager
pub fn handle_request(manager: &GainGraphManager, request: PageRequest) -> VolumeResponse {
    match request {
        PageRequest::GetVolume => VolumeResponse::ok(manager.volume()),
        PageRequest::SetVolume { volume } if volume.is_nan() => {
            VolumeResponse::failed(manager.volume(), "volume must be a number")
        }
        PageRequest::SetVolume { volume } => VolumeResponse::ok(manager.set_volume(volume)),
    }
}

async fn serve_requests(
    manager: GainGraphManager,
    mut requests: mpsc::UnboundedReceiver<crate::messaging::PageEnvelope>,
) {
    while let Some(envelope) = requests.recv().await {
        let response = handle_request(&manager, envelope.request);
        // The sender may have given up waiting
        let _ = envelope.reply.send(response);
    }
}

async fn observe_mutations(
    manager: GainGraphManager,
    mut mutations: mpsc::UnboundedReceiver<crate::dom::MutationBatch>,
) {
    while let Some(batch) = mutations.recv().await {
        let wired = manager.handle_mutations(&batch);
        if wired > 0 {
            tracing::debug!(wired, "wired inserted media");
        }
    }
}

async fn sweep_periodically(manager: GainGraphManager, period: std::time::Duration) {
    let mut interval = time::interval_at(time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        manager.sweep();
    }
}

async fn persist_volumes(bus: MessageBus, page: PageId, mut volumes: mpsc::UnboundedReceiver<f32>) {
    while let Some(mut volume) = volumes.recv().await {
        // Only the latest pending value matters
        while let Ok(newer) = volumes.try_recv() {
            volume = newer;
        }
        if let Err(e) = bus
            .send_to_coordinator(page, CoordinatorRequest::SaveVolume { volume })
            .await
        {
            tracing::debug!(%page, error = %e, "could not persist volume");
        }
    }
}

async fn restore_saved_volume(
    bus: MessageBus,
    page: PageId,
    manager: GainGraphManager,
    deadline: std::time::Duration,
) {
    let request = bus.send_to_coordinator(page, CoordinatorRequest::GetSavedVolume);
    match time::timeout(deadline, request).await {
        Ok(Ok(CoordinatorResponse::SavedVolume(saved))) => {
            if manager.restore_volume(saved.volume) {
                tracing::debug!(%page, volume = saved.volume, "restored saved volume");
            }
        }
        Ok(Ok(other)) => tracing::debug!(%page, ?other, "unexpected saved volume response"),
        Ok(Err(e)) => tracing::debug!(%page, error = %e, "saved volume unavailable"),
        Err(_) => tracing::debug!(%page, "saved volume request timed out"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, Element};
    use crate::page::Realm;
    use std::sync::Arc;

    fn attach(bus: &MessageBus, id: u32) -> (PageId, Document) {
        let page = PageId::new(id);
        let doc = Document::new();
        bus.attach_page(page, Arc::new(Realm::with_audio(doc.clone())));
        (page, doc)
    }

    #[tokio::test]
    async fn test_set_and_get_over_bus() {
        let bus = MessageBus::new();
        let (page, _) = attach(&bus, 1);
        let _agent = PageAgent::spawn(&bus, page, &BoosterConfig::default()).unwrap();

        let set = bus
            .send_to_page(page, PageRequest::SetVolume { volume: 2.5 })
            .await
            .unwrap();
        assert_eq!(set, VolumeResponse::ok(2.5));
        let get = bus.send_to_page(page, PageRequest::GetVolume).await.unwrap();
        assert_eq!(get.volume, 2.5);
    }

    #[tokio::test]
    async fn test_nan_volume_rejected() {
        let bus = MessageBus::new();
        let (page, _) = attach(&bus, 1);
        let agent = PageAgent::spawn(&bus, page, &BoosterConfig::default()).unwrap();

        let response = handle_request(agent.manager(), PageRequest::SetVolume { volume: f32::NAN });
        assert!(!response.success);
        assert_eq!(response.volume, 1.0);
    }

    #[tokio::test]
    async fn test_observer_wires_inserted_media() {
        let bus = MessageBus::new();
        let (page, doc) = attach(&bus, 1);
        let agent = PageAgent::spawn(&bus, page, &BoosterConfig::default()).unwrap();

        let audio = Element::audio();
        doc.append_child(doc.body(), &audio);
        for _ in 0..10 {
            if agent.manager().is_tracked(&audio) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(agent.manager().is_tracked(&audio));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_sweep() {
        let bus = MessageBus::new();
        let (page, doc) = attach(&bus, 1);
        let video = Element::video();
        doc.append_child(doc.body(), &video);
        let config = BoosterConfig::default();
        let agent = PageAgent::spawn(&bus, page, &config).unwrap();
        assert!(agent.manager().is_tracked(&video));

        doc.remove(&video);
        time::sleep(config.sweep_interval() + std::time::Duration::from_millis(10)).await;
        assert!(!agent.manager().is_tracked(&video));
    }

    #[tokio::test]
    async fn test_shutdown_stops_answering() {
        let bus = MessageBus::new();
        let (page, _) = attach(&bus, 1);
        let agent = PageAgent::spawn(&bus, page, &BoosterConfig::default()).unwrap();
        agent.shutdown();
        tokio::task::yield_now().await;

        let err = bus.send_to_page(page, PageRequest::GetVolume).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::NoReceiver | TransportError::Disconnected
        ));
    }

    #[tokio::test]
    async fn test_restricted_page_cannot_host_agent() {
        let bus = MessageBus::new();
        let page = PageId::new(5);
        bus.attach_restricted_page(page, Arc::new(Realm::with_audio(Document::new())));
        assert!(matches!(
            PageAgent::spawn(&bus, page, &BoosterConfig::default()),
            Err(TransportError::Restricted(_))
        ));
    }
}
