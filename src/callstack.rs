//! Stack of the instrumented functions being executed, for log attribution.

use parking_lot::Mutex;
use tracing::warn;

/// Deepest call chain kept, deeper calls are not recorded.
pub const CALL_STACK_CAPACITY: usize = 4096;

#[derive(Debug, Default)]
pub struct CallStack {
    frames: Mutex<Frames>,
}

#[derive(Debug, Default)]
struct Frames {
    sites: Vec<String>,
    /// Frames pushed past the capacity, popped before `sites`.
    dropped: usize,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, site: &str) {
        let mut frames = self.frames.lock();
        if frames.sites.len() >= CALL_STACK_CAPACITY {
            if frames.dropped == 0 {
                warn!("call stack deeper than {CALL_STACK_CAPACITY}, {site} is not recorded");
            }
            frames.dropped += 1;
        } else {
            frames.sites.push(site.to_string());
        }
    }

    pub fn pop(&self) -> Option<String> {
        let mut frames = self.frames.lock();
        if frames.dropped > 0 {
            frames.dropped -= 1;
            return None;
        }
        frames.sites.pop()
    }

    pub fn depth(&self) -> usize {
        let frames = self.frames.lock();
        frames.sites.len() + frames.dropped
    }

    /// Innermost recorded site.
    pub fn top(&self) -> Option<String> {
        self.frames.lock().sites.last().cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_push_pop() {
        let stack = CallStack::new();
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.pop(), None);

        stack.push("main");
        stack.push("solve");
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.top().as_deref(), Some("solve"));
        assert_eq!(stack.pop().as_deref(), Some("solve"));
        assert_eq!(stack.top().as_deref(), Some("main"));
    }

    #[test]
    fn test_overflow_is_not_recorded() {
        let stack = CallStack::new();
        for i in 0..CALL_STACK_CAPACITY + 2 {
            stack.push(&format!("f{i}"));
        }
        assert_eq!(stack.depth(), CALL_STACK_CAPACITY + 2);
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.pop(), Some(format!("f{}", CALL_STACK_CAPACITY - 1)));
    }

    #[test]
    fn test_shared_between_threads() {
        let stack = Arc::new(CallStack::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let stack = Arc::clone(&stack);
                thread::spawn(move || {
                    for _ in 0..100 {
                        stack.push(&format!("t{i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stack.depth(), 400);
    }
}
