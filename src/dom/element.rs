//! Elements and media state

use crate::audio::ContextId;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one element object.
///
/// Ids are never reused, so a new element inserted where an old one used to
/// be is a different element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    fn next() -> Self {
        Self(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle returned by [`Element::on_volume_change`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Callback invoked with the new native volume
pub type VolumeListener = Arc<dyn Fn(f32) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

struct MediaState {
    kind: MediaKind,
    /// Native volume, 0.0 ~ 1.0
    volume: f32,
    playing: bool,
    /// Media is fetched from another origin
    cross_origin_source: bool,
    /// Context that owns this element's source node, if any
    captured_by: Option<ContextId>,
    listeners: Vec<(ListenerId, VolumeListener)>,
    next_listener: u64,
}

struct ElementInner {
    id: ElementId,
    tag: String,
    is_root: bool,
    parent: RwLock<Weak<ElementInner>>,
    children: RwLock<Vec<Element>>,
    attributes: RwLock<HashMap<String, String>>,
    media: Option<Mutex<MediaState>>,
}

/// A node in the page's document tree.
///
/// Cloning an `Element` clones the handle; equality is identity.
#[derive(Clone)]
pub struct Element(Arc<ElementInner>);

impl Element {
    /// Create a detached element. `audio` and `video` tags get media state.
    pub fn new(tag: &str) -> Self {
        let tag = tag.to_ascii_lowercase();
        let kind = match tag.as_str() {
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            _ => None,
        };
        Self::build(tag, kind, false)
    }

    pub fn audio() -> Self {
        Self::new("audio")
    }

    pub fn video() -> Self {
        Self::new("video")
    }

    pub(crate) fn root() -> Self {
        Self::build("html".to_string(), None, true)
    }

    fn build(tag: String, kind: Option<MediaKind>, is_root: bool) -> Self {
        let media = kind.map(|kind| {
            Mutex::new(MediaState {
                kind,
                volume: 1.0,
                playing: false,
                cross_origin_source: false,
                captured_by: None,
                listeners: Vec::new(),
                next_listener: 1,
            })
        });
        Self(Arc::new(ElementInner {
            id: ElementId::next(),
            tag,
            is_root,
            parent: RwLock::new(Weak::new()),
            children: RwLock::new(Vec::new()),
            attributes: RwLock::new(HashMap::new()),
            media,
        }))
    }

    pub fn id(&self) -> ElementId {
        self.0.id
    }

    pub fn tag(&self) -> &str {
        &self.0.tag
    }

    pub fn is_media(&self) -> bool {
        self.0.media.is_some()
    }

    pub fn media_kind(&self) -> Option<MediaKind> {
        self.0.media.as_ref().map(|m| m.lock().kind)
    }

    pub fn downgrade(&self) -> WeakElement {
        WeakElement {
            id: self.0.id,
            inner: Arc::downgrade(&self.0),
        }
    }

    // --- attributes ---
    // Names are ASCII case-insensitive, as in HTML.

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0
            .attributes
            .read()
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.0
            .attributes
            .write()
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    // --- tree ---

    pub fn parent(&self) -> Option<Element> {
        self.0.parent.read().upgrade().map(Element)
    }

    pub fn children(&self) -> Vec<Element> {
        self.0.children.read().clone()
    }

    /// Whether the element is attached to a document at any depth
    pub fn is_connected(&self) -> bool {
        let mut current = self.clone();
        loop {
            if current.0.is_root {
                return true;
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Whether `self` is `other` or one of its ancestors
    pub fn is_inclusive_ancestor_of(&self, other: &Element) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if node == *self {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Media elements below this one in tree order, excluding itself
    pub fn descendant_media(&self) -> Vec<Element> {
        let mut found = Vec::new();
        let mut stack: Vec<Element> = self.children().into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            if node.is_media() {
                found.push(node.clone());
            }
            stack.extend(node.children().into_iter().rev());
        }
        found
    }

    /// Move `child` under this element, detaching it from any previous parent.
    ///
    /// Refuses the document root and any insertion that would make `child`
    /// its own ancestor; returns false and leaves the tree untouched.
    pub(crate) fn attach_child(&self, child: &Element) -> bool {
        if child.0.is_root || child.is_inclusive_ancestor_of(self) {
            return false;
        }
        if let Some(old) = child.parent() {
            old.detach_child(child);
        }
        *child.0.parent.write() = Arc::downgrade(&self.0);
        self.0.children.write().push(child.clone());
        true
    }

    pub(crate) fn detach_child(&self, child: &Element) -> bool {
        let mut children = self.0.children.write();
        let before = children.len();
        children.retain(|c| c != child);
        let removed = children.len() < before;
        if removed {
            *child.0.parent.write() = Weak::new();
        }
        removed
    }

    // --- media ---

    /// Native volume; 1.0 for non-media elements
    pub fn volume(&self) -> f32 {
        self.0.media.as_ref().map_or(1.0, |m| m.lock().volume)
    }

    /// Set native volume (clamped to 0.0 ~ 1.0) and notify listeners on change.
    pub fn set_volume(&self, volume: f32) {
        let Some(media) = self.0.media.as_ref() else {
            return;
        };
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };

        // Listeners run on a snapshot with the media lock released, so they
        // are free to call back into this element.
        let listeners: Vec<VolumeListener> = {
            let mut state = media.lock();
            if state.volume == volume {
                return;
            }
            state.volume = volume;
            state.listeners.iter().map(|(_, l)| l.clone()).collect()
        };
        for listener in listeners {
            listener(volume);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.0.media.as_ref().is_some_and(|m| m.lock().playing)
    }

    pub fn play(&self) {
        if let Some(media) = self.0.media.as_ref() {
            media.lock().playing = true;
        }
    }

    pub fn pause(&self) {
        if let Some(media) = self.0.media.as_ref() {
            media.lock().playing = false;
        }
    }

    /// Mark the media as served from another origin
    pub fn set_cross_origin_source(&self, cross_origin: bool) {
        if let Some(media) = self.0.media.as_ref() {
            media.lock().cross_origin_source = cross_origin;
        }
    }

    /// Cross-origin media without a CORS request mode; a graph source
    /// attached to it outputs silence.
    pub fn is_cors_restricted(&self) -> bool {
        let cross_origin = self
            .0
            .media
            .as_ref()
            .is_some_and(|m| m.lock().cross_origin_source);
        cross_origin && self.attribute("crossorigin").is_none()
    }

    /// Subscribe to native volume changes. Returns `None` for non-media elements.
    pub fn on_volume_change(
        &self,
        listener: impl Fn(f32) + Send + Sync + 'static,
    ) -> Option<ListenerId> {
        let media = self.0.media.as_ref()?;
        let mut state = media.lock();
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.push((id, Arc::new(listener)));
        Some(id)
    }

    pub fn remove_volume_listener(&self, id: ListenerId) -> bool {
        let Some(media) = self.0.media.as_ref() else {
            return false;
        };
        let mut state = media.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(lid, _)| *lid != id);
        state.listeners.len() < before
    }

    pub fn volume_listener_count(&self) -> usize {
        self.0.media.as_ref().map_or(0, |m| m.lock().listeners.len())
    }

    /// Context currently routing this element's audio
    pub fn captured_by(&self) -> Option<ContextId> {
        self.0.media.as_ref().and_then(|m| m.lock().captured_by)
    }

    /// Claim the element for `context`. Fails with the current owner if taken.
    pub(crate) fn capture(&self, context: ContextId) -> Result<(), Option<ContextId>> {
        let media = self.0.media.as_ref().ok_or(None)?;
        let mut state = media.lock();
        match state.captured_by {
            Some(owner) => Err(Some(owner)),
            None => {
                state.captured_by = Some(context);
                Ok(())
            }
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}>", self.0.tag, self.0.id)
    }
}

/// Non-owning element handle; does not keep a discarded element alive.
#[derive(Clone)]
pub struct WeakElement {
    id: ElementId,
    inner: Weak<ElementInner>,
}

impl WeakElement {
    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Element> {
        self.inner.upgrade().map(Element)
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl fmt::Debug for WeakElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakElement({})", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_media_detection() {
        assert!(Element::new("VIDEO").is_media());
        assert_eq!(Element::audio().media_kind(), Some(MediaKind::Audio));
        assert!(!Element::new("div").is_media());
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(Element::audio().id(), Element::audio().id());
    }

    #[test]
    fn test_volume_listener_fires_on_change_only() {
        let el = Element::video();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let id = el
            .on_volume_change(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        el.set_volume(0.5);
        el.set_volume(0.5);
        el.set_volume(3.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(el.volume(), 1.0);

        assert!(el.remove_volume_listener(id));
        el.set_volume(0.1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_may_read_element() {
        let el = Element::audio();
        let handle = el.downgrade();
        let last = Arc::new(Mutex::new(0.0));
        let sink = last.clone();
        el.on_volume_change(move |_| {
            if let Some(el) = handle.upgrade() {
                *sink.lock() = el.volume();
            }
        });
        el.set_volume(0.25);
        assert_eq!(*last.lock(), 0.25);
    }

    #[test]
    fn test_cors_restriction_relaxed_by_attribute() {
        let el = Element::video();
        el.set_cross_origin_source(true);
        assert!(el.is_cors_restricted());
        el.set_attribute("crossorigin", "anonymous");
        assert!(!el.is_cors_restricted());
    }

    #[test]
    fn test_attribute_names_ignore_case() {
        let el = Element::video();
        el.set_attribute("crossOrigin", "use-credentials");
        assert_eq!(el.attribute("crossOrigin").as_deref(), Some("use-credentials"));
        assert_eq!(el.attribute("CROSSORIGIN").as_deref(), Some("use-credentials"));
        assert_eq!(el.attribute("crossorigin").as_deref(), Some("use-credentials"));
    }

    #[test]
    fn test_attach_refuses_ancestor_cycles() {
        let outer = Element::new("div");
        let inner = Element::new("section");
        assert!(outer.attach_child(&inner));

        assert!(!inner.attach_child(&outer));
        assert!(!outer.attach_child(&outer));
        assert_eq!(inner.parent(), Some(outer.clone()));
        assert!(outer.parent().is_none());
        assert!(inner.children().is_empty());

        assert!(!inner.attach_child(&Element::root()));
    }

    #[test]
    fn test_capture_is_exclusive() {
        let el = Element::audio();
        let a = ContextId::from_raw(1);
        let b = ContextId::from_raw(2);
        assert!(el.capture(a).is_ok());
        assert_eq!(el.capture(b), Err(Some(a)));
        assert_eq!(Element::new("p").capture(a), Err(None));
    }

    #[test]
    fn test_weak_element_does_not_keep_alive() {
        let el = Element::audio();
        let weak = el.downgrade();
        assert!(weak.is_alive());
        drop(el);
        assert!(weak.upgrade().is_none());
    }
}
