//! Window registry and a UI-less window

use super::{Window, WindowId};
use crate::downloader::progress::ProgressBar;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Windows known to the dispatcher, in creation order
#[derive(Default)]
pub struct WindowRegistry {
    windows: HashMap<WindowId, Arc<dyn Window>>,
    created: Vec<WindowId>,
    focused: Option<WindowId>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, window: Arc<dyn Window>) {
        let id = window.id();
        if self.windows.insert(id, window).is_none() {
            self.created.push(id);
        }
    }

    pub fn remove(&mut self, id: WindowId) -> Option<Arc<dyn Window>> {
        self.created.retain(|w| *w != id);
        if self.focused == Some(id) {
            self.focused = None;
        }
        self.windows.remove(&id)
    }

    /// Returns false for unknown windows
    pub fn focus(&mut self, id: WindowId) -> bool {
        if self.windows.contains_key(&id) {
            self.focused = Some(id);
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: WindowId) -> Option<&Arc<dyn Window>> {
        self.windows.get(&id)
    }

    /// Focused window if alive, otherwise the newest live window
    pub fn target(&self) -> Option<Arc<dyn Window>> {
        let focused = self
            .focused
            .and_then(|id| self.windows.get(&id))
            .filter(|w| !w.is_destroyed());
        if let Some(window) = focused {
            return Some(Arc::clone(window));
        }

        self.created
            .iter()
            .rev()
            .filter_map(|id| self.windows.get(id))
            .find(|w| !w.is_destroyed())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Window without UI; progress bar changes go to the log
pub struct HeadlessWindow {
    id: WindowId,
    destroyed: AtomicBool,
}

impl HeadlessWindow {
    pub fn new(id: WindowId) -> Self {
        Self {
            id,
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

impl Window for HeadlessWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn set_progress_bar(&self, progress: ProgressBar) {
        debug!("{} progress bar: {:?}", self.id, progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(id: u64) -> Arc<HeadlessWindow> {
        Arc::new(HeadlessWindow::new(WindowId(id)))
    }

    #[test]
    fn test_empty_registry_has_no_target() {
        assert!(WindowRegistry::new().target().is_none());
    }

    #[test]
    fn test_target_prefers_focused() {
        let mut registry = WindowRegistry::new();
        registry.insert(window(1));
        registry.insert(window(2));
        assert!(registry.focus(WindowId(1)));

        assert_eq!(registry.target().unwrap().id(), WindowId(1));
    }

    #[test]
    fn test_target_falls_back_to_newest() {
        let mut registry = WindowRegistry::new();
        registry.insert(window(1));
        registry.insert(window(2));

        assert_eq!(registry.target().unwrap().id(), WindowId(2));
    }

    #[test]
    fn test_target_skips_destroyed_windows() {
        let mut registry = WindowRegistry::new();
        let first = window(1);
        let second = window(2);
        registry.insert(first.clone());
        registry.insert(second.clone());
        registry.focus(WindowId(2));
        second.destroy();

        assert_eq!(registry.target().unwrap().id(), WindowId(1));
    }

    #[test]
    fn test_remove_clears_focus() {
        let mut registry = WindowRegistry::new();
        registry.insert(window(1));
        registry.focus(WindowId(1));
        assert!(registry.remove(WindowId(1)).is_some());

        assert!(registry.target().is_none());
        assert!(registry.is_empty());
        assert!(!registry.focus(WindowId(1)));
    }

    #[test]
    fn test_reinsert_keeps_single_entry() {
        let mut registry = WindowRegistry::new();
        registry.insert(window(1));
        registry.insert(window(1));
        assert_eq!(registry.len(), 1);
    }
}
