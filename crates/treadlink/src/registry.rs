//! Listener registry: packet kind → ordered callbacks.
//!
//! Callbacks for a kind run in the order they were registered, each to
//! completion before the next starts. A panicking callback is caught and
//! counted; the rest of the list still runs.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use treadlink_protocol::{Packet, PacketKind};

/// A packet callback. Receives only the decoded value.
pub type Listener = Box<dyn FnMut(&Packet) + Send + 'static>;

/// Identifies one registration. Pass it back to
/// [`ListenerRegistry::deregister`] to remove exactly that callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use = "dropping the handle makes the listener impossible to remove"]
pub struct ListenerHandle {
    kind: PacketKind,
    id: u64,
}

impl ListenerHandle {
    /// The packet kind this registration listens for.
    pub fn kind(&self) -> PacketKind {
        self.kind
    }
}

/// Outcome of dispatching one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// Callbacks that were run, panicking ones included.
    pub invoked: usize,
    /// Callbacks that panicked.
    pub panicked: usize,
}

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    listeners: HashMap<PacketKind, Vec<(u64, Listener)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a callback for `kind`.
    ///
    /// Not idempotent: registering the same closure twice makes it fire
    /// twice.
    pub fn register<F>(&mut self, kind: PacketKind, listener: F) -> ListenerHandle
    where
        F: FnMut(&Packet) + Send + 'static,
    {
        self.register_boxed(kind, Box::new(listener))
    }

    pub fn register_boxed(
        &mut self,
        kind: PacketKind,
        listener: Listener,
    ) -> ListenerHandle {
        self.next_id += 1;
        let id = self.next_id;
        self.listeners.entry(kind).or_default().push((id, listener));
        ListenerHandle { kind, id }
    }

    /// Removes the registration behind `handle`. Returns `false` if it was
    /// already gone.
    pub fn deregister(&mut self, handle: ListenerHandle) -> bool {
        let Some(list) = self.listeners.get_mut(&handle.kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != handle.id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.listeners.remove(&handle.kind);
        }
        removed
    }

    /// Runs every callback registered for the packet's kind.
    pub fn dispatch(&mut self, packet: &Packet) -> DispatchReport {
        let kind = packet.kind();
        let mut report = DispatchReport::default();
        let Some(list) = self.listeners.get_mut(&kind) else {
            return report;
        };

        for (id, listener) in list.iter_mut() {
            report.invoked += 1;
            // The callback owns its state; after a panic it is simply
            // called again for the next packet.
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(packet))) {
                report.panicked += 1;
                let msg = panic
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| panic.downcast_ref::<&str>().copied())
                    .unwrap_or("unknown panic");
                tracing::error!(%kind, listener = *id, panic = msg, "listener panicked");
            }
        }
        report
    }

    /// Number of callbacks registered for `kind`.
    pub fn listener_count(&self, kind: PacketKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<PacketKind, usize> = self
            .listeners
            .iter()
            .map(|(kind, list)| (*kind, list.len()))
            .collect();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &counts)
            .finish()
    }
}
