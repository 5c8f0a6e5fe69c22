//! In-process message bus between the coordinator and page agents
//!
//! Requests are delivered over unbounded channels and answered through a
//! oneshot reply. There is no timeout at this layer; callers wrap requests
//! in `tokio::time::timeout` themselves.

use super::dto::{CoordinatorRequest, CoordinatorResponse, PageRequest, VolumeResponse};
use super::PageId;
use crate::error::TransportError;
use crate::page::Realm;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// A request delivered to a page
#[derive(Debug)]
pub struct PageEnvelope {
    pub request: PageRequest,
    pub reply: oneshot::Sender<VolumeResponse>,
}

/// A request delivered to the coordinator
#[derive(Debug)]
pub struct CoordinatorEnvelope {
    pub sender: PageId,
    pub request: CoordinatorRequest,
    pub reply: oneshot::Sender<CoordinatorResponse>,
}

struct PageSlot {
    realm: Arc<Realm>,
    /// Browser-internal pages take no scripts and no probes
    scriptable: bool,
    listener: Option<mpsc::UnboundedSender<PageEnvelope>>,
}

#[derive(Default)]
struct BusInner {
    pages: RwLock<HashMap<PageId, PageSlot>>,
    coordinator: RwLock<Option<mpsc::UnboundedSender<CoordinatorEnvelope>>>,
}

/// Cloning shares the same bus.
#[derive(Clone, Default)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach (or navigate) a page. Any previous listener is dropped.
    pub fn attach_page(&self, page: PageId, realm: Arc<Realm>) {
        self.insert_page(page, realm, true);
    }

    /// Attach a page that refuses content scripts and probes
    pub fn attach_restricted_page(&self, page: PageId, realm: Arc<Realm>) {
        self.insert_page(page, realm, false);
    }

    fn insert_page(&self, page: PageId, realm: Arc<Realm>, scriptable: bool) {
        self.inner.pages.write().insert(
            page,
            PageSlot {
                realm,
                scriptable,
                listener: None,
            },
        );
    }

    pub fn detach_page(&self, page: PageId) -> bool {
        self.inner.pages.write().remove(&page).is_some()
    }

    /// Attached pages in id order
    pub fn pages(&self) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self.inner.pages.read().keys().copied().collect();
        pages.sort();
        pages
    }

    /// The page's realm, for injecting scripts into it
    pub fn realm(&self, page: PageId) -> Result<Arc<Realm>, TransportError> {
        let pages = self.inner.pages.read();
        let slot = pages.get(&page).ok_or(TransportError::NoSuchPage(page))?;
        if !slot.scriptable {
            return Err(TransportError::Restricted(page));
        }
        Ok(slot.realm.clone())
    }

    /// Whether the page is currently producing sound
    pub fn is_audible(&self, page: PageId) -> bool {
        self.inner
            .pages
            .read()
            .get(&page)
            .is_some_and(|slot| slot.realm.document().is_audible())
    }

    /// Register the page's message listener, replacing any previous one
    pub fn listen_page(
        &self,
        page: PageId,
    ) -> Result<mpsc::UnboundedReceiver<PageEnvelope>, TransportError> {
        let mut pages = self.inner.pages.write();
        let slot = pages.get_mut(&page).ok_or(TransportError::NoSuchPage(page))?;
        if !slot.scriptable {
            return Err(TransportError::Restricted(page));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        slot.listener = Some(tx);
        Ok(rx)
    }

    pub async fn send_to_page(
        &self,
        page: PageId,
        request: PageRequest,
    ) -> Result<VolumeResponse, TransportError> {
        let listener = {
            let pages = self.inner.pages.read();
            let slot = pages.get(&page).ok_or(TransportError::NoSuchPage(page))?;
            slot.listener.clone().ok_or(TransportError::NoReceiver)?
        };
        let (reply, response) = oneshot::channel();
        listener
            .send(PageEnvelope { request, reply })
            .map_err(|_| TransportError::NoReceiver)?;
        response.await.map_err(|_| TransportError::Disconnected)
    }

    /// Evaluate the minimal in-page probe: the gain published on the page's
    /// global scope, `None` if nothing is published.
    pub async fn execute_probe(&self, page: PageId) -> Result<Option<f32>, TransportError> {
        let realm = self.realm(page)?;
        tokio::task::yield_now().await;
        Ok(realm.probe_gain())
    }

    /// Become the coordinator endpoint, replacing any previous one
    pub fn serve_coordinator(&self) -> mpsc::UnboundedReceiver<CoordinatorEnvelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.inner.coordinator.write() = Some(tx);
        rx
    }

    pub async fn send_to_coordinator(
        &self,
        sender: PageId,
        request: CoordinatorRequest,
    ) -> Result<CoordinatorResponse, TransportError> {
        let coordinator = self
            .inner
            .coordinator
            .read()
            .clone()
            .ok_or(TransportError::NoReceiver)?;
        let (reply, response) = oneshot::channel();
        coordinator
            .send(CoordinatorEnvelope {
                sender,
                request,
                reply,
            })
            .map_err(|_| TransportError::NoReceiver)?;
        response.await.map_err(|_| TransportError::Disconnected)
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("pages", &self.pages())
            .finish()
    }
}
