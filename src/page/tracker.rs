//! Tracked element set
//!
//! Keyed by element identity and holding only weak element handles, so a
//! page discarding media never has it kept alive by the tracker.

use crate::audio::{GainStage, NodeRef};
use crate::dom::{Element, ElementId, ListenerId, WeakElement};
use std::collections::HashMap;

/// Graph resources owned for one wired element
pub(crate) struct WiredElement {
    pub element: WeakElement,
    pub source: NodeRef,
    pub stage: GainStage,
    pub listener: Option<ListenerId>,
}

/// An element that will never be wired (again)
struct Retired {
    element: WeakElement,
    /// Graph nodes still held for an untracked element; `None` when wiring failed
    nodes: Option<(NodeRef, GainStage)>,
}

/// Outcome of one cleanup sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Detached elements dropped from the tracked set
    pub untracked: usize,
    /// Discarded elements whose graph nodes were released
    pub released: usize,
}

#[derive(Default)]
pub(crate) struct ElementTracker {
    tracked: HashMap<ElementId, WiredElement>,
    retired: HashMap<ElementId, Retired>,
}

impl ElementTracker {
    /// Seen before, wired or not
    pub fn is_known(&self, id: ElementId) -> bool {
        self.tracked.contains_key(&id) || self.retired.contains_key(&id)
    }

    pub fn is_tracked(&self, id: ElementId) -> bool {
        self.tracked.contains_key(&id)
    }

    pub fn get(&self, id: ElementId) -> Option<&WiredElement> {
        self.tracked.get(&id)
    }

    pub fn track(&mut self, element: &Element, wired: WiredElement) {
        self.tracked.insert(element.id(), wired);
    }

    /// Remember an element that could not be wired so it is not retried
    pub fn reject(&mut self, element: &Element) {
        self.retired.insert(
            element.id(),
            Retired {
                element: element.downgrade(),
                nodes: None,
            },
        );
    }

    pub fn iter(&self) -> impl Iterator<Item = &WiredElement> {
        self.tracked.values()
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }

    /// Untrack detached elements, then release graph nodes of elements
    /// that no longer exist at all.
    pub fn sweep(&mut self) -> SweepReport {
        let mut report = SweepReport::default();

        let detached: Vec<ElementId> = self
            .tracked
            .iter()
            .filter(|(_, wired)| {
                wired
                    .element
                    .upgrade()
                    .map_or(true, |el| !el.is_connected())
            })
            .map(|(&id, _)| id)
            .collect();

        for id in detached {
            let Some(wired) = self.tracked.remove(&id) else {
                continue;
            };
            if let (Some(element), Some(listener)) = (wired.element.upgrade(), wired.listener) {
                element.remove_volume_listener(listener);
            }
            self.retired.insert(
                id,
                Retired {
                    element: wired.element,
                    nodes: Some((wired.source, wired.stage)),
                },
            );
            report.untracked += 1;
        }

        let discarded: Vec<ElementId> = self
            .retired
            .iter()
            .filter(|(_, retired)| !retired.element.is_alive())
            .map(|(&id, _)| id)
            .collect();

        for id in discarded {
            let Some(retired) = self.retired.remove(&id) else {
                continue;
            };
            if let Some((source, stage)) = retired.nodes {
                let context = stage.context();
                context.release(source);
                context.release(stage.node());
                report.released += 1;
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ContextFactory, NativeContextFactory};
    use crate::dom::Document;

    fn wire(tracker: &mut ElementTracker, ctx: &crate::audio::AudioContext, el: &Element) {
        let source = ctx.create_media_element_source(el).unwrap();
        let stage = ctx.create_gain().unwrap();
        ctx.connect(source, stage.node()).unwrap();
        tracker.track(
            el,
            WiredElement {
                element: el.downgrade(),
                source,
                stage,
                listener: el.on_volume_change(|_| {}),
            },
        );
    }

    #[test]
    fn test_sweep_untracks_detached_then_releases_discarded() {
        let doc = Document::new();
        let ctx = NativeContextFactory::new().construct().unwrap();
        let mut tracker = ElementTracker::default();

        let kept = Element::audio();
        let removed = Element::video();
        doc.append_children(doc.body(), &[kept.clone(), removed.clone()]);
        wire(&mut tracker, &ctx, &kept);
        wire(&mut tracker, &ctx, &removed);
        assert_eq!(ctx.node_count(), 5);

        doc.remove(&removed);
        let report = tracker.sweep();
        assert_eq!(report, SweepReport { untracked: 1, released: 0 });
        assert!(tracker.is_tracked(kept.id()));
        assert!(!tracker.is_tracked(removed.id()));
        assert!(tracker.is_known(removed.id()));
        assert_eq!(removed.volume_listener_count(), 0);

        drop(removed);
        let report = tracker.sweep();
        assert_eq!(report, SweepReport { untracked: 0, released: 1 });
        assert_eq!(tracker.retired_len(), 0);
        assert_eq!(ctx.node_count(), 3);
    }

    #[test]
    fn test_rejected_elements_stay_known_while_alive() {
        let mut tracker = ElementTracker::default();
        let el = Element::audio();
        tracker.reject(&el);
        assert!(tracker.is_known(el.id()));
        assert!(!tracker.is_tracked(el.id()));

        let id = el.id();
        drop(el);
        tracker.sweep();
        assert!(!tracker.is_known(id));
    }
}
