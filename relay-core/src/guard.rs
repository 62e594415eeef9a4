use std::cell::Cell;

/// Reentrancy guard for programmatic writes into a component that also emits
/// change signals for user writes.
///
/// While a scope is open, change handlers that consult `is_active` treat the
/// signal as an echo of our own write and ignore it. Scopes nest and close on
/// drop, so a panicking write never leaves the guard stuck open.
#[derive(Debug, Default)]
pub struct EchoGuard {
    depth: Cell<u32>,
}

pub struct EchoScope<'a> {
    guard: &'a EchoGuard,
}

impl EchoGuard {
    pub fn new() -> Self {
        EchoGuard::default()
    }

    pub fn enter(&self) -> EchoScope<'_> {
        self.depth.set(self.depth.get() + 1);
        EchoScope { guard: self }
    }

    pub fn run<R>(&self, write: impl FnOnce() -> R) -> R {
        let _scope = self.enter();
        write()
    }

    pub fn is_active(&self) -> bool {
        self.depth.get() > 0
    }
}

impl Drop for EchoScope<'_> {
    fn drop(&mut self) {
        let depth = self.guard.depth.get();
        self.guard.depth.set(depth.saturating_sub(1));
    }
}
