// SPDX-License-Identifier: GPL-3.0-only

//! Preview surface ownership
//!
//! The UI layer owns the preview surface. The recorder is handed a
//! non-owning [`Weak`] reference to a [`PreviewSurfaceProvider`] and learns
//! about availability changes through [`SurfaceEvent`]s marshalled onto its
//! worker.

use crate::backends::camera::types::Surface;
use crate::utils::lock_or_recover;
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

/// Availability change of the preview surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Available,
    Destroyed,
}

/// Supplies the drawable preview target
pub trait PreviewSurfaceProvider: Send + Sync {
    /// The live surface, if one exists right now
    fn current_surface(&self) -> Option<Surface>;
}

/// Non-owning provider handle for the recorder
pub fn non_owning<P: PreviewSurfaceProvider + 'static>(
    provider: &Arc<P>,
) -> Weak<dyn PreviewSurfaceProvider> {
    let provider: Arc<dyn PreviewSurfaceProvider> = provider.clone();
    Arc::downgrade(&provider)
}

type SurfaceListener = Box<dyn Fn(SurfaceEvent) + Send + Sync>;

/// A provider owned by the UI layer that publishes and withdraws its surface
#[derive(Default)]
pub struct PreviewSlot {
    surface: Mutex<Option<Surface>>,
    listeners: Mutex<Vec<SurfaceListener>>,
}

impl PreviewSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register for availability changes
    pub fn subscribe(&self, listener: impl Fn(SurfaceEvent) + Send + Sync + 'static) {
        lock_or_recover(&self.listeners).push(Box::new(listener));
    }

    /// The surface is drawable; listeners are told it is available
    pub fn publish(&self, surface: Surface) {
        *lock_or_recover(&self.surface) = Some(surface);
        debug!(id = surface.id.0, width = surface.width, height = surface.height, "Preview surface published");
        self.notify(SurfaceEvent::Available);
    }

    /// The surface is gone; listeners are told it was destroyed
    pub fn withdraw(&self) {
        let had_surface = lock_or_recover(&self.surface).take().is_some();
        if had_surface {
            debug!("Preview surface withdrawn");
            self.notify(SurfaceEvent::Destroyed);
        }
    }

    fn notify(&self, event: SurfaceEvent) {
        for listener in lock_or_recover(&self.listeners).iter() {
            listener(event);
        }
    }
}

impl PreviewSurfaceProvider for PreviewSlot {
    fn current_surface(&self) -> Option<Surface> {
        *lock_or_recover(&self.surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_publish_and_withdraw_notify() {
        let slot = PreviewSlot::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        {
            let events = Arc::clone(&events);
            slot.subscribe(move |event| events.lock().unwrap().push(event));
        }

        assert!(slot.current_surface().is_none());
        let surface = Surface::preview(640, 480);
        slot.publish(surface);
        assert_eq!(slot.current_surface(), Some(surface));

        slot.withdraw();
        slot.withdraw();
        assert!(slot.current_surface().is_none());
        assert_eq!(
            *events.lock().unwrap(),
            vec![SurfaceEvent::Available, SurfaceEvent::Destroyed]
        );
    }

    #[test]
    fn test_non_owning_handle_does_not_keep_provider_alive() {
        let slot = Arc::new(PreviewSlot::new());
        let weak = non_owning(&slot);
        assert!(weak.upgrade().is_some());
        drop(slot);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_every_listener_notified() {
        let slot = PreviewSlot::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let count = Arc::clone(&count);
            slot.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        slot.publish(Surface::preview(1, 1));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
