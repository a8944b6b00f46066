use std::cell::RefCell;
use std::marker::PhantomData;

thread_local! {
    static SCOPES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Marker placed in front of every outer scope frame.
pub const FRAME_SEPARATOR: &str = "\n=> ";

/// Pops its scope frame when dropped.
///
/// Scopes are thread-local, so the guard is neither `Send` nor `Sync`.
#[must_use = "the scope is popped as soon as the guard is dropped"]
pub struct ScopeGuard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPES.with(|scopes| {
            scopes.borrow_mut().pop();
        });
    }
}

/// Push a text frame onto this thread's scope stack.
pub fn push_scope(text: impl Into<String>) -> ScopeGuard {
    let text = text.into();
    SCOPES.with(|scopes| scopes.borrow_mut().push(text));
    ScopeGuard { _not_send: PhantomData }
}

/// Render this thread's scope stack, innermost frame first.
pub fn current_scope() -> Option<String> {
    SCOPES.with(|scopes| {
        let scopes = scopes.borrow();
        render_scope(scopes.iter().rev().map(String::as_str))
    })
}

/// Join frames (innermost first) into the persisted scope text.
pub fn render_scope<'a>(frames: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut out: Option<String> = None;
    for frame in frames {
        match out.as_mut() {
            Some(text) => {
                text.push_str(FRAME_SEPARATOR);
                text.push_str(frame);
            }
            None => out = Some(frame.to_string()),
        }
    }
    out
}
