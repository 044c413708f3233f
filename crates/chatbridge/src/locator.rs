//! Bounded-depth traversal and multi-strategy control resolution
//!
//! Nothing in here holds state between calls. Every walk is breadth-first,
//! fetches children live, and never expands a node deeper than the caller's
//! bound, because the chat client's tree is deep and can stop answering at
//! any time.

use crate::{BridgeError, ControlKind, UiNode};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Lazy breadth-first walk below a root node. The root itself is not yielded.
///
/// Restartable only by constructing a new walk.
pub struct Descendants {
    frontier: VecDeque<(UiNode, usize)>,
    ready: VecDeque<(UiNode, usize)>,
    max_depth: usize,
}

impl Descendants {
    pub fn new(root: &UiNode, max_depth: usize) -> Self {
        let mut frontier = VecDeque::new();
        frontier.push_back((root.clone(), 0));
        Self {
            frontier,
            ready: VecDeque::new(),
            max_depth,
        }
    }
}

impl Iterator for Descendants {
    type Item = UiNode;

    fn next(&mut self) -> Option<UiNode> {
        loop {
            if let Some((node, depth)) = self.ready.pop_front() {
                self.frontier.push_back((node.clone(), depth));
                return Some(node);
            }

            let (node, depth) = self.frontier.pop_front()?;
            if depth >= self.max_depth {
                continue;
            }
            match node.children() {
                Ok(children) => {
                    self.ready
                        .extend(children.into_iter().map(|child| (child, depth + 1)));
                }
                Err(e) => {
                    // A node that vanished mid-walk is just a leaf.
                    trace!("children unavailable at depth {}: {}", depth, e);
                }
            }
        }
    }
}

pub fn find_descendants(root: &UiNode, max_depth: usize) -> Descendants {
    Descendants::new(root, max_depth)
}

/// Descendants satisfying `predicate`, capped at `max_results` when given.
pub fn find_matching<'a, P>(
    root: &UiNode,
    max_depth: usize,
    predicate: P,
    max_results: Option<usize>,
) -> impl Iterator<Item = UiNode> + 'a
where
    P: FnMut(&UiNode) -> bool + 'a,
{
    let mut predicate = predicate;
    Descendants::new(root, max_depth)
        .filter(move |node| predicate(node))
        .take(max_results.unwrap_or(usize::MAX))
}

/// Attribute search criteria. Unset fields match anything; set string fields
/// must match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matcher {
    pub kind: Option<ControlKind>,
    pub name: Option<String>,
    pub class_name: Option<String>,
    pub automation_id: Option<String>,
    pub process_id: Option<u32>,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: ControlKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn automation_id(mut self, automation_id: impl Into<String>) -> Self {
        self.automation_id = Some(automation_id.into());
        self
    }

    pub fn process_id(mut self, pid: u32) -> Self {
        self.process_id = Some(pid);
        self
    }

    pub fn matches(&self, node: &UiNode) -> bool {
        if let Some(kind) = self.kind {
            if node.kind() != kind {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if &node.name() != name {
                return false;
            }
        }
        if let Some(class_name) = &self.class_name {
            if &node.class_name() != class_name {
                return false;
            }
        }
        if let Some(automation_id) = &self.automation_id {
            if &node.automation_id() != automation_id {
                return false;
            }
        }
        if let Some(pid) = self.process_id {
            if node.process_id() != Some(pid) {
                return false;
            }
        }
        true
    }
}

type Probe<'a, T> = Box<dyn FnMut() -> Result<Option<T>, BridgeError> + 'a>;

/// One named way of finding something.
pub struct Strategy<'a, T> {
    name: &'static str,
    probe: Probe<'a, T>,
}

impl<'a, T> Strategy<'a, T> {
    pub fn new<F>(name: &'static str, probe: F) -> Self
    where
        F: FnMut() -> Result<Option<T>, BridgeError> + 'a,
    {
        Self {
            name,
            probe: Box::new(probe),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// The winning strategy and what it found.
#[derive(Debug)]
pub struct Resolution<T> {
    pub strategy: &'static str,
    pub value: T,
}

/// Run strategies in order and stop at the first hit. Strategy errors count
/// as misses.
pub fn resolve_first<T>(target: &str, strategies: Vec<Strategy<'_, T>>) -> Option<Resolution<T>> {
    for mut strategy in strategies {
        match (strategy.probe)() {
            Ok(Some(value)) => {
                debug!("{} resolved via '{}'", target, strategy.name);
                return Some(Resolution {
                    strategy: strategy.name,
                    value,
                });
            }
            Ok(None) => trace!("{}: strategy '{}' found nothing", target, strategy.name),
            Err(e) => debug!("{}: strategy '{}' failed: {}", target, strategy.name, e),
        }
    }
    debug!("{}: all strategies exhausted", target);
    None
}

/// `find_first` plus a liveness check, the shape most strategies need.
pub fn first_existing(
    backend: &dyn crate::platforms::AutomationBackend,
    root: &UiNode,
    matcher: &Matcher,
    depth: usize,
) -> Result<Option<UiNode>, BridgeError> {
    Ok(backend
        .find_first(root, matcher, depth)?
        .filter(|node| node.exists()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::memory::MemoryTree;

    fn sample() -> (MemoryTree, UiNode) {
        let tree = MemoryTree::new();
        let root = tree
            .node(ControlKind::Window, "root")
            .child(
                tree.node(ControlKind::Pane, "a")
                    .child(tree.node(ControlKind::Text, "a1").child(tree.node(ControlKind::Text, "deep")))
                    .child(tree.node(ControlKind::Button, "a2")),
            )
            .child(tree.node(ControlKind::List, "b").child(tree.node(ControlKind::ListItem, "b1")));
        let node = root.to_node();
        (tree, node)
    }

    fn names(nodes: impl Iterator<Item = UiNode>) -> Vec<String> {
        nodes.map(|n| n.name()).collect()
    }

    #[test]
    fn test_walk_is_breadth_first() {
        let (_tree, root) = sample();
        assert_eq!(
            names(find_descendants(&root, 10)),
            vec!["a", "b", "a1", "a2", "b1", "deep"]
        );
    }

    #[test]
    fn test_walk_respects_depth_bound() {
        let (_tree, root) = sample();
        assert_eq!(names(find_descendants(&root, 1)), vec!["a", "b"]);
        assert_eq!(
            names(find_descendants(&root, 2)),
            vec!["a", "b", "a1", "a2", "b1"]
        );
        assert_eq!(find_descendants(&root, 0).count(), 0);
    }

    #[test]
    fn test_walk_is_lazy() {
        let (tree, root) = sample();
        tree.reset_reads();
        let first = find_descendants(&root, 10).next().unwrap();
        assert_eq!(first.name(), "a");
        assert_eq!(tree.reads(), 1, "only the root should have been expanded");
    }

    #[test]
    fn test_find_matching_caps_results() {
        let (_tree, root) = sample();
        let texts: Vec<_> = find_matching(&root, 10, |n| n.kind() == ControlKind::Text, Some(1)).collect();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].name(), "a1");
    }

    #[test]
    fn test_matcher_requires_every_field() {
        let (_tree, root) = sample();
        let hit = find_descendants(&root, 10)
            .find(|n| Matcher::new().kind(ControlKind::ListItem).name("b1").matches(n));
        assert!(hit.is_some());
        let miss = find_descendants(&root, 10)
            .find(|n| Matcher::new().kind(ControlKind::Button).name("b1").matches(n));
        assert!(miss.is_none());
    }

    #[test]
    fn test_resolve_first_treats_errors_as_misses() {
        let strategies: Vec<Strategy<'_, u32>> = vec![
            Strategy::new("broken", || Err(BridgeError::NotFound("x".into()))),
            Strategy::new("empty", || Ok(None)),
            Strategy::new("hit", || Ok(Some(7))),
        ];
        let resolved = resolve_first("number", strategies).unwrap();
        assert_eq!(resolved.strategy, "hit");
        assert_eq!(resolved.value, 7);
    }

    #[test]
    fn test_resolve_first_exhausted() {
        let strategies: Vec<Strategy<'_, u32>> = vec![Strategy::new("empty", || Ok(None))];
        assert!(resolve_first("number", strategies).is_none());
    }

    #[test]
    fn test_resolve_first_stops_after_hit() {
        let mut later_ran = false;
        {
            let strategies: Vec<Strategy<'_, u32>> = vec![
                Strategy::new("first", || Ok(Some(1))),
                Strategy::new("second", || {
                    later_ran = true;
                    Ok(Some(2))
                }),
            ];
            assert_eq!(resolve_first("number", strategies).unwrap().value, 1);
        }
        assert!(!later_ran);
    }
}
