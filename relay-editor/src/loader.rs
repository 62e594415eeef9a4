use std::rc::Rc;

use relay_core::once::OnceInit;

use crate::host::{EditorHandle, EditorLibrary, NodeId};
use crate::protocol::{CreateOptions, LoaderConfig};

/// Shared bootstrap of the editor library.
///
/// The loader is configured and the library loaded at most once per page,
/// no matter how many adapters ask for it. A failed load is retried by the
/// next caller.
pub struct LibraryLoader {
    library: Rc<dyn EditorLibrary>,
    config: LoaderConfig,
    init: OnceInit,
}

impl LibraryLoader {
    pub fn new(library: Rc<dyn EditorLibrary>, config: LoaderConfig) -> Self {
        LibraryLoader {
            library,
            config,
            init: OnceInit::new(),
        }
    }

    pub async fn ensure_loaded(&self) -> Result<(), String> {
        self.init
            .ensure(|| {
                log::info!("Loading editor library from {}", self.config.vs_path());
                self.library.configure(&self.config);
                self.library.load()
            })
            .await
            .map_err(|e| format!("Failed to load editor library: {}", e))
    }

    pub fn is_loaded(&self) -> bool {
        self.init.is_initialized()
    }

    pub fn create(
        &self,
        container: NodeId,
        options: &CreateOptions,
    ) -> Result<Rc<dyn EditorHandle>, String> {
        self.library.create(container, options)
    }
}
