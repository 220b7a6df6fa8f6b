use serde::Serialize;

/// Identity of one mounted container (card, dashboard view, ...).
///
/// Containers are torn down and recreated by the host, so this may be an
/// ephemeral instance id. Never use it alone as a listener key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Namespaced overlay key: `container:overlay`.
///
/// Every write to overlay runtime state is scoped by this key so two
/// containers declaring the same overlay id never share state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OverlayKey {
    pub container: ContainerId,
    pub overlay: String,
}

impl OverlayKey {
    pub fn new(container: impl Into<ContainerId>, overlay: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            overlay: overlay.into(),
        }
    }
}

impl std::fmt::Display for OverlayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.container, self.overlay)
    }
}
