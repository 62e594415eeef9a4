use std::future::Future;

use tokio::sync::OnceCell;

/// Process-wide one-time async initialization of a shared resource.
///
/// Concurrent callers wait on the same in-flight initialization. A failed
/// initialization leaves the cell empty, so the next caller tries again.
#[derive(Debug, Default)]
pub struct OnceInit {
    cell: OnceCell<()>,
}

impl OnceInit {
    pub fn new() -> Self {
        OnceInit {
            cell: OnceCell::new(),
        }
    }

    pub async fn ensure<F, Fut>(&self, init: F) -> Result<(), String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        self.cell.get_or_try_init(init).await.map(|_| ())
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}
