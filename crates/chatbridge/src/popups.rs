//! Dismissal of update, call and confirmation popups that steal focus

use crate::locator::{first_existing, Matcher};
use crate::platforms::AutomationBackend;
use crate::{BridgeError, ControlKind};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

static POPUP_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"语音|通话|更新|版本|升级|安装|提示|确认").expect("valid regex"));

/// Tried in order; the first that exists is clicked.
pub const DISMISS_BUTTONS: &[&str] = &["取消", "稍后", "关闭", "知道了", "忽略", "否", "不升级"];
const BUTTON_DEPTH: usize = 6;

/// Close interfering top-level windows. Returns how many were dismissed.
pub fn guard_popups(
    backend: &dyn AutomationBackend,
    main_window_class: &str,
) -> Result<usize, BridgeError> {
    let desktop = backend.desktop_root()?;
    let mut dismissed = 0;

    for window in desktop.children()? {
        if window.kind() != ControlKind::Window || window.class_name() == main_window_class {
            continue;
        }
        let title = window.label();
        if title.is_empty() || !POPUP_TITLE.is_match(&title) {
            continue;
        }
        info!("interfering popup detected: {}", title);

        for label in DISMISS_BUTTONS {
            let matcher = Matcher::new().kind(ControlKind::Button).name(*label);
            match first_existing(backend, &window, &matcher, BUTTON_DEPTH) {
                Ok(Some(button)) => match button.click() {
                    Ok(()) => {
                        info!("dismissed popup '{}' via '{}'", title, label);
                        dismissed += 1;
                        break;
                    }
                    Err(e) => debug!("clicking '{}' on '{}' failed: {}", label, title, e),
                },
                Ok(None) => {}
                Err(e) => debug!("button lookup in '{}' failed: {}", title, e),
            }
        }
    }
    Ok(dismissed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::memory::{MemoryBackend, MemoryTree};

    #[test]
    fn test_dismisses_matching_popups_only() {
        let tree = MemoryTree::new();
        let desktop = tree.desktop();
        desktop.push_child(
            tree.node(ControlKind::Window, "微信")
                .class_name("mmui::MainWindow")
                .child(tree.node(ControlKind::Button, "关闭")),
        );
        desktop.push_child(
            tree.node(ControlKind::Window, "微信更新")
                .class_name("UpdateDialog")
                .child(
                    tree.node(ControlKind::Pane, "")
                        .child(tree.node(ControlKind::Button, "立即更新"))
                        .child(tree.node(ControlKind::Button, "稍后")),
                ),
        );
        desktop.push_child(
            tree.node(ControlKind::Window, "Notepad")
                .class_name("Notepad")
                .child(tree.node(ControlKind::Button, "取消")),
        );

        let backend = MemoryBackend::new(tree.clone());
        assert_eq!(guard_popups(&backend, "mmui::MainWindow").unwrap(), 1);
        assert_eq!(tree.clicks(), vec!["稍后".to_string()]);
    }
}
