//! Finding the client's main window and keeping hold of it

use crate::config::WindowConfig;
use crate::locator::{first_existing, resolve_first, Matcher, Strategy};
use crate::platforms::AutomationBackend;
use crate::{BridgeError, ControlKind, UiNode};
use parking_lot::Mutex;
use std::cell::Cell;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Resolves the main window from scratch. Stateless apart from its query.
pub struct MainWindowLocator {
    backend: Arc<dyn AutomationBackend>,
    query: WindowConfig,
}

impl MainWindowLocator {
    pub fn new(backend: Arc<dyn AutomationBackend>, query: WindowConfig) -> Self {
        Self { backend, query }
    }

    pub fn query(&self) -> &WindowConfig {
        &self.query
    }

    /// Native lookup, then a shallow desktop search, then per-process search.
    ///
    /// Hung candidates are rejected. When nothing usable turns up but a hung
    /// candidate did, the error is `Unresponsive` rather than `NotFound`.
    #[instrument(level = "debug", skip(self))]
    pub fn locate(&self) -> Result<UiNode, BridgeError> {
        let backend = self.backend.as_ref();
        let query = &self.query;
        let saw_hung = Cell::new(false);

        let accept = |window: UiNode, via: &str| -> Option<UiNode> {
            if backend.is_hung(&window) {
                warn!("main window found via {} is not responding, skipping", via);
                saw_hung.set(true);
                return None;
            }
            if !window.exists() {
                debug!("main window found via {} failed the liveness check", via);
                return None;
            }
            Some(window)
        };

        let strategies = vec![
            Strategy::new("native handle", || {
                Ok(backend
                    .find_native_window(&query.class_name, &query.name)?
                    .and_then(|w| accept(w, "native handle")))
            }),
            Strategy::new("desktop search", || {
                let desktop = backend.desktop_root()?;
                let matcher = Matcher::new()
                    .kind(ControlKind::Window)
                    .class_name(&query.class_name)
                    .name(&query.name);
                Ok(first_existing(backend, &desktop, &matcher, 1)?
                    .and_then(|w| accept(w, "desktop search")))
            }),
            Strategy::new("process scan", || {
                let pids = backend.process_ids(&query.process_names);
                debug!("candidate client pids: {:?}", pids);
                if pids.is_empty() {
                    return Ok(None);
                }
                let desktop = backend.desktop_root()?;
                for pid in pids {
                    let strict = Matcher::new()
                        .process_id(pid)
                        .class_name(&query.class_name)
                        .name(&query.name);
                    let loose = Matcher::new().process_id(pid).name(&query.name);
                    for matcher in [strict, loose] {
                        match first_existing(backend, &desktop, &matcher, 1) {
                            Ok(Some(window)) => {
                                if let Some(window) = accept(window, "process scan") {
                                    return Ok(Some(window));
                                }
                            }
                            Ok(None) => {}
                            Err(e) => debug!("window lookup in pid {} failed: {}", pid, e),
                        }
                    }
                }
                Ok(None)
            }),
        ];

        match resolve_first("main window", strategies) {
            Some(resolution) => {
                info!(
                    "main window resolved via {} (pid {:?})",
                    resolution.strategy,
                    resolution.value.process_id()
                );
                Ok(resolution.value)
            }
            None if saw_hung.get() => Err(BridgeError::Unresponsive(format!(
                "'{}' ({}) is not responding",
                query.name, query.class_name
            ))),
            None => Err(BridgeError::NotFound(format!(
                "main window '{}' ({})",
                query.name, query.class_name
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowKey {
    Handle(isize),
    Object(usize),
}

fn window_key(window: &UiNode) -> WindowKey {
    window
        .native_handle()
        .map(WindowKey::Handle)
        .unwrap_or_else(|| WindowKey::Object(window.object_id()))
}

/// Holds the last resolved main window across scan cycles.
pub struct WindowHandleCache {
    locator: MainWindowLocator,
    backend: Arc<dyn AutomationBackend>,
    cached: Mutex<Option<UiNode>>,
    logged: Mutex<Option<WindowKey>>,
}

impl WindowHandleCache {
    pub fn new(locator: MainWindowLocator, backend: Arc<dyn AutomationBackend>) -> Self {
        Self {
            locator,
            backend,
            cached: Mutex::new(None),
            logged: Mutex::new(None),
        }
    }

    pub fn locator(&self) -> &MainWindowLocator {
        &self.locator
    }

    /// The main window, revalidated. A hung cached window is reported as
    /// `Unresponsive` without reading its tree and stays cached.
    pub fn get(&self) -> Result<UiNode, BridgeError> {
        let cached = self.cached.lock().clone();
        if let Some(window) = cached {
            if self.backend.is_hung(&window) {
                return Err(BridgeError::Unresponsive(
                    "cached main window is not responding".to_string(),
                ));
            }
            if window.exists() {
                return Ok(window);
            }
            debug!("cached main window is stale, resolving again");
            self.cached.lock().take();
        }

        let window = self.locator.locate()?;
        *self.cached.lock() = Some(window.clone());
        self.log_tree_once(&window);
        Ok(window)
    }

    pub fn cached(&self) -> Option<UiNode> {
        self.cached.lock().clone()
    }

    /// First two levels below a newly seen window, once per window.
    fn log_tree_once(&self, window: &UiNode) {
        let key = window_key(window);
        {
            let mut logged = self.logged.lock();
            if *logged == Some(key) {
                return;
            }
            *logged = Some(key);
        }

        let children = match window.children() {
            Ok(children) => children,
            Err(e) => {
                warn!("could not list main window children: {}", e);
                return;
            }
        };
        info!("main window has {} children", children.len());
        for child in children {
            info!("window child L1: {} | {}", child.kind(), child.name());
            for grand in child.children().unwrap_or_default() {
                info!("window child L2: {} | {}", grand.kind(), grand.name());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::memory::{MemoryBackend, MemoryNode, MemoryTree};

    const CLASS: &str = "mmui::MainWindow";
    const TITLE: &str = "微信";

    fn setup() -> (MemoryTree, MemoryNode, Arc<MemoryBackend>) {
        let tree = MemoryTree::new();
        let window = tree
            .node(ControlKind::Window, TITLE)
            .class_name(CLASS)
            .pid(4242)
            .bounds(0, 0, 1200, 800)
            .child(tree.node(ControlKind::Pane, "body"));
        tree.desktop().push_child(window.clone());
        let backend = Arc::new(MemoryBackend::new(tree.clone()));
        (tree, window, backend)
    }

    fn cache(backend: Arc<MemoryBackend>) -> WindowHandleCache {
        let backend: Arc<dyn AutomationBackend> = backend;
        WindowHandleCache::new(
            MainWindowLocator::new(Arc::clone(&backend), WindowConfig::default()),
            backend,
        )
    }

    #[test]
    fn test_native_lookup_first() {
        let (_tree, window, backend) = setup();
        let locator = MainWindowLocator::new(backend, WindowConfig::default());
        assert_eq!(locator.locate().unwrap(), window.to_node());
    }

    #[test]
    fn test_falls_back_to_desktop_search() {
        let (tree, window, backend) = setup();
        tree.disable_native_lookup();
        let locator = MainWindowLocator::new(backend, WindowConfig::default());
        assert_eq!(locator.locate().unwrap(), window.to_node());
    }

    #[test]
    fn test_process_scan_accepts_title_only_match() {
        let tree = MemoryTree::new();
        let window = tree
            .node(ControlKind::Window, TITLE)
            .class_name("mmui::SomethingNew")
            .pid(77);
        tree.desktop().push_child(window.clone());
        tree.add_process("weixin.exe", 77);
        tree.disable_native_lookup();
        let locator = MainWindowLocator::new(
            Arc::new(MemoryBackend::new(tree.clone())),
            WindowConfig::default(),
        );
        assert_eq!(locator.locate().unwrap(), window.to_node());
    }

    #[test]
    fn test_hung_window_is_unresponsive() {
        let (tree, _window, backend) = setup();
        tree.set_hung(true);
        let locator = MainWindowLocator::new(backend, WindowConfig::default());
        assert!(matches!(locator.locate(), Err(BridgeError::Unresponsive(_))));
    }

    #[test]
    fn test_missing_window_is_not_found() {
        let tree = MemoryTree::new();
        let locator = MainWindowLocator::new(
            Arc::new(MemoryBackend::new(tree)),
            WindowConfig::default(),
        );
        assert!(matches!(locator.locate(), Err(BridgeError::NotFound(_))));
    }

    #[test]
    fn test_cache_reuses_live_window_and_drops_stale_one() {
        let (tree, window, backend) = setup();
        let cache = cache(backend);
        assert_eq!(cache.get().unwrap(), window.to_node());

        tree.reset_reads();
        assert_eq!(cache.get().unwrap(), window.to_node());
        assert_eq!(tree.reads(), 0, "a cached live window needs no tree reads");

        window.remove();
        let replacement = tree
            .node(ControlKind::Window, TITLE)
            .class_name(CLASS);
        tree.desktop().push_child(replacement.clone());
        assert_eq!(cache.get().unwrap(), replacement.to_node());
    }

    #[test]
    fn test_hung_cached_window_stays_cached() {
        let (tree, window, backend) = setup();
        let cache = cache(backend);
        cache.get().unwrap();
        tree.set_hung(true);
        tree.reset_reads();
        assert!(matches!(cache.get(), Err(BridgeError::Unresponsive(_))));
        assert_eq!(tree.reads(), 0);
        assert_eq!(cache.cached(), Some(window.to_node()));
    }
}
