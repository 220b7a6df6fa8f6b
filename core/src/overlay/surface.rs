//! Detached render targets
//!
//! Overlays render into a surface that lives outside the normal node tree
//! (a portal), so they escape ancestor clipping. The host creates and
//! releases surfaces; the manager only tracks handles.

use hashbrown::HashSet;

use super::OverlayKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

/// The host refused to create a surface (retried on the next pass)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct MountError(pub String);

pub trait SurfaceHost {
    fn create_surface(&mut self, key: &OverlayKey) -> Result<SurfaceHandle, MountError>;

    fn release_surface(&mut self, key: &OverlayKey, handle: SurfaceHandle);
}

/// Surface host without a display. Hands out ids and tracks which are live.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    next_id: u64,
    live: HashSet<SurfaceHandle>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl SurfaceHost for HeadlessHost {
    fn create_surface(&mut self, _key: &OverlayKey) -> Result<SurfaceHandle, MountError> {
        let handle = SurfaceHandle(self.next_id);
        self.next_id += 1;
        self.live.insert(handle);
        Ok(handle)
    }

    fn release_surface(&mut self, _key: &OverlayKey, handle: SurfaceHandle) {
        self.live.remove(&handle);
    }
}
