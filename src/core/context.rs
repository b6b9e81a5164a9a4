//! Per-thread logging context
//!
//! Each producing thread carries an explicit context record: a display name,
//! a stack of tags and a stack of named-tag maps. Event construction takes a
//! point-in-time snapshot; nothing outside this module mutates thread state.
//!
//! Scoped tags use RAII guards:
//!
//! ```
//! use fanlog::core::context;
//!
//! {
//!     let _guard = context::tagged(["billing", "retry"]);
//!     // events constructed here carry both tags
//! }
//! // tags are popped again here
//! ```

use serde_json::{Map, Value};
use std::cell::RefCell;

thread_local! {
    static CONTEXT: RefCell<ThreadContext> = RefCell::new(ThreadContext::new());
}

#[derive(Debug)]
struct ThreadContext {
    name: Option<String>,
    tags: Vec<String>,
    named_tags: Vec<Map<String, Value>>,
}

impl ThreadContext {
    fn new() -> Self {
        Self {
            name: None,
            tags: Vec::new(),
            named_tags: Vec::new(),
        }
    }
}

/// Set a display name for the current thread, used as `thread_name` on
/// events it produces. Overrides the OS-level thread name.
pub fn set_thread_name(name: impl Into<String>) {
    CONTEXT.with(|ctx| ctx.borrow_mut().name = Some(name.into()));
}

/// Name the current thread's events will carry: the explicit context name if
/// set, else the OS thread name, else the formatted thread id.
pub fn thread_name() -> String {
    CONTEXT.with(|ctx| {
        if let Some(name) = &ctx.borrow().name {
            return name.clone();
        }
        let current = std::thread::current();
        match current.name() {
            Some(name) => name.to_string(),
            None => format!("{:?}", current.id()),
        }
    })
}

/// Push tags onto the current thread's tag stack for the lifetime of the
/// returned guard. Empty tags are skipped.
#[must_use = "tags are popped when the guard drops"]
pub fn tagged<I, S>(tags: I) -> TagGuard
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let added: Vec<String> = tags
        .into_iter()
        .map(Into::into)
        .filter(|t| !t.is_empty())
        .collect();
    let count = added.len();
    CONTEXT.with(|ctx| ctx.borrow_mut().tags.extend(added));
    TagGuard { count }
}

/// Push a named-tag map for the lifetime of the returned guard. Later maps
/// shadow earlier keys in event snapshots.
#[must_use = "named tags are popped when the guard drops"]
pub fn named_tagged(tags: Map<String, Value>) -> NamedTagGuard {
    CONTEXT.with(|ctx| ctx.borrow_mut().named_tags.push(tags));
    NamedTagGuard { _private: () }
}

/// Current tag stack, outermost first.
pub fn tags() -> Vec<String> {
    CONTEXT.with(|ctx| ctx.borrow().tags.clone())
}

/// Current named tags, merged outermost-to-innermost.
pub fn named_tags() -> Map<String, Value> {
    CONTEXT.with(|ctx| {
        let ctx = ctx.borrow();
        let mut merged = Map::new();
        for map in &ctx.named_tags {
            for (key, value) in map {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    })
}

/// Snapshot of (thread name, tags, named tags) taken at event construction.
pub(crate) fn snapshot() -> (String, Vec<String>, Map<String, Value>) {
    (thread_name(), tags(), named_tags())
}

/// RAII guard created by [`tagged`]; pops its tags when dropped.
pub struct TagGuard {
    count: usize,
}

impl Drop for TagGuard {
    fn drop(&mut self) {
        CONTEXT.with(|ctx| {
            let mut ctx = ctx.borrow_mut();
            let len = ctx.tags.len();
            ctx.tags.truncate(len.saturating_sub(self.count));
        });
    }
}

/// RAII guard created by [`named_tagged`]; pops its map when dropped.
pub struct NamedTagGuard {
    _private: (),
}

impl Drop for NamedTagGuard {
    fn drop(&mut self) {
        CONTEXT.with(|ctx| {
            ctx.borrow_mut().named_tags.pop();
        });
    }
}
