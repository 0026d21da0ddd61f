//! The anvil the operator is currently looking at.
//!
//! One [`SelectionContext`] owns the selection; everything else holds a
//! [`SelectionReader`] and derives its poll keys from it.

use tokio::sync::watch;

use striker_core::error::CoreError;
use striker_core::routes;

pub struct SelectionContext {
    tx: watch::Sender<Option<String>>,
}

impl Default for SelectionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionContext {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Select an anvil. Returns whether the selection changed.
    pub fn select(&self, anvil_uuid: &str) -> Result<bool, CoreError> {
        routes::validate_segment(anvil_uuid)?;
        Ok(self.tx.send_if_modified(|current| {
            if current.as_deref() == Some(anvil_uuid) {
                return false;
            }
            tracing::debug!(anvil_uuid, "Anvil selected");
            *current = Some(anvil_uuid.to_string());
            true
        }))
    }

    pub fn clear(&self) -> bool {
        self.tx.send_if_modified(|current| current.take().is_some())
    }

    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn reader(&self) -> SelectionReader {
        SelectionReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read-only view of the selection.
#[derive(Clone)]
pub struct SelectionReader {
    rx: watch::Receiver<Option<String>>,
}

impl SelectionReader {
    pub fn current(&self) -> Option<String> {
        self.rx.borrow().clone()
    }

    /// Poll key for the selected anvil's capacity.
    pub fn capacity_key(&self) -> Option<String> {
        let uuid = self.current()?;
        routes::anvil_capacity(&uuid).ok()
    }

    /// Wait for the next selection change. `None` once the owner is gone.
    pub async fn changed(&mut self) -> Option<Option<String>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
