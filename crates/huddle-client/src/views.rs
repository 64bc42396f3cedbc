//! Remote view registry: one rendered surface per remote peer.

use std::collections::HashMap;

use huddle_common::PeerId;
use huddle_media::RemoteStream;
use tracing::debug;

use crate::calls::CallRegistry;
use crate::relay::CallLeg;
use crate::surface::Surface;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteViewEntry {
    pub peer: PeerId,
    pub stream_id: String,
    pub label: String,
}

#[derive(Debug, Default)]
pub struct RemoteViewRegistry {
    entries: HashMap<PeerId, RemoteViewEntry>,
}

impl RemoteViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders `stream` for `peer` unless a view already exists.
    /// Returns whether a view was created.
    pub fn show<S: Surface>(&mut self, peer: &PeerId, stream: &RemoteStream, surface: &mut S) -> bool {
        if self.entries.contains_key(peer) {
            debug!("view for {} already present, ignoring stream {}", peer, stream.id);
            return false;
        }

        let entry = RemoteViewEntry {
            peer: peer.clone(),
            stream_id: stream.id.clone(),
            label: peer.label(),
        };
        surface.create_remote_view(peer, &entry.label, stream);
        self.entries.insert(peer.clone(), entry);
        true
    }

    /// Removes the view for `peer` and hangs up its call if still open.
    /// Calling it for an unknown peer is a no-op.
    pub fn hide<S: Surface, C: CallLeg>(
        &mut self,
        peer: &PeerId,
        calls: &mut CallRegistry<C>,
        surface: &mut S,
    ) -> bool {
        let removed = self.entries.remove(peer).is_some();
        if removed {
            surface.destroy_remote_view(peer);
        }
        let closed = calls.remove(peer);
        removed || closed
    }

    /// Destroys every view. Returns how many there were.
    pub fn clear<S: Surface>(&mut self, surface: &mut S) -> usize {
        let count = self.entries.len();
        for peer in self.entries.keys() {
            surface.destroy_remote_view(peer);
        }
        self.entries.clear();
        count
    }

    pub fn get(&self, peer: &PeerId) -> Option<&RemoteViewEntry> {
        self.entries.get(peer)
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.entries.contains_key(peer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
