//! Document root and mutation delivery

use super::element::Element;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One tree change: nodes added to / removed from `target`
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub target: Element,
    pub added: Vec<Element>,
    pub removed: Vec<Element>,
}

/// Records delivered together to an observer
pub type MutationBatch = Vec<MutationRecord>;

struct DocumentInner {
    root: Element,
    body: Element,
    observers: Mutex<Vec<mpsc::UnboundedSender<MutationBatch>>>,
}

/// A page document.
///
/// Every tree change made through the document is delivered to all
/// observers as one batch, covering the whole subtree below the root.
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

impl Document {
    pub fn new() -> Self {
        let root = Element::root();
        let body = Element::new("body");
        root.attach_child(&body);
        Self {
            inner: Arc::new(DocumentInner {
                root,
                body,
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn body(&self) -> &Element {
        &self.inner.body
    }

    /// Whether `element` is attached to this document
    pub fn contains(&self, element: &Element) -> bool {
        element.is_connected()
    }

    /// All attached media elements in tree order
    pub fn query_media(&self) -> Vec<Element> {
        self.inner.root.descendant_media()
    }

    /// Whether any attached media is playing at a non-zero native volume
    pub fn is_audible(&self) -> bool {
        self.query_media()
            .iter()
            .any(|el| el.is_playing() && el.volume() > 0.0)
    }

    /// Observe insertions and removals anywhere in the document
    pub fn observe(&self) -> mpsc::UnboundedReceiver<MutationBatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.observers.lock().push(tx);
        rx
    }

    /// Append `child` to `parent`. Returns false when the insertion would
    /// break the tree (the child is `parent` or one of its ancestors).
    pub fn append_child(&self, parent: &Element, child: &Element) -> bool {
        self.append_children(parent, std::slice::from_ref(child))
    }

    /// Append several children in one mutation record.
    ///
    /// All or nothing: if any child would become its own ancestor, nothing
    /// is inserted and no record is delivered.
    pub fn append_children(&self, parent: &Element, children: &[Element]) -> bool {
        if children
            .iter()
            .any(|child| child.is_inclusive_ancestor_of(parent) || *child == self.inner.root)
        {
            tracing::debug!(parent = ?parent, "rejected hierarchy-breaking insertion");
            return false;
        }
        for child in children {
            parent.attach_child(child);
        }
        self.notify(vec![MutationRecord {
            target: parent.clone(),
            added: children.to_vec(),
            removed: Vec::new(),
        }]);
        true
    }

    /// Detach `element` from its parent. Returns false if it had none.
    pub fn remove(&self, element: &Element) -> bool {
        let Some(parent) = element.parent() else {
            return false;
        };
        if !parent.detach_child(element) {
            return false;
        }
        self.notify(vec![MutationRecord {
            target: parent,
            added: Vec::new(),
            removed: vec![element.clone()],
        }]);
        true
    }

    fn notify(&self, batch: MutationBatch) {
        if !self.inner.root.is_connected() {
            return;
        }
        let mut observers = self.inner.observers.lock();
        observers.retain(|tx| tx.send(batch.clone()).is_ok());
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("media", &self.query_media().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_at_depth() {
        let doc = Document::new();
        let wrapper = Element::new("div");
        let inner = Element::new("section");
        let video = Element::video();
        inner.attach_child(&video);
        wrapper.attach_child(&inner);
        assert!(!video.is_connected());

        doc.append_child(doc.body(), &wrapper);
        assert!(doc.contains(&video));
        assert_eq!(doc.query_media(), vec![video.clone()]);

        doc.remove(&wrapper);
        assert!(!doc.contains(&video));
        assert!(doc.query_media().is_empty());
    }

    #[test]
    fn test_batch_delivery() {
        let doc = Document::new();
        let mut rx = doc.observe();
        let tracks = [Element::audio(), Element::audio(), Element::audio()];
        doc.append_children(doc.body(), &tracks);

        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].added.len(), 3);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_insertion_under_own_descendant_rejected() {
        let doc = Document::new();
        let div = Element::new("div");
        let section = Element::new("section");
        assert!(doc.append_child(doc.body(), &div));
        assert!(doc.append_child(&div, &section));
        let mut rx = doc.observe();

        assert!(!doc.append_child(&section, &div));
        assert!(!doc.append_children(&section, &[Element::audio(), doc.body().clone()]));
        assert!(rx.try_recv().is_err(), "no record for a rejected insertion");

        assert_eq!(div.parent(), Some(doc.body().clone()));
        assert!(section.children().is_empty());
        assert!(section.is_connected());
        assert!(doc.query_media().is_empty());
    }

    #[test]
    fn test_dropped_observer_is_pruned() {
        let doc = Document::new();
        drop(doc.observe());
        doc.append_child(doc.body(), &Element::new("p"));
        assert!(doc.inner.observers.lock().is_empty());
    }

    #[test]
    fn test_audible() {
        let doc = Document::new();
        let audio = Element::audio();
        doc.append_child(doc.body(), &audio);
        assert!(!doc.is_audible());
        audio.play();
        assert!(doc.is_audible());
        audio.set_volume(0.0);
        assert!(!doc.is_audible());
    }
}
