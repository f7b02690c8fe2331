//! Condensation configuration.

use crate::region::Permissions;

/// Configuration for a condensation run.
#[derive(Debug, Clone)]
pub struct CondenseConfig {
    /// Whether to sync the receiving artifact after every append, before the
    /// absorbed artifact is deleted.
    pub sync_writes: bool,

    /// Permissions given to segments that have no entry in the segment table.
    pub default_permissions: Permissions,

    /// Maximum number of merges in one run (`None` = run to the fixed point).
    pub max_merges: Option<usize>,
}

impl Default for CondenseConfig {
    fn default() -> Self {
        Self {
            sync_writes: true,
            default_permissions: Permissions::ALL,
            max_merges: None,
        }
    }
}

impl CondenseConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether appends are synced before the absorbed artifact is deleted.
    #[must_use]
    pub const fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Sets the permissions used for segments missing from the table.
    #[must_use]
    pub const fn default_permissions(mut self, permissions: Permissions) -> Self {
        self.default_permissions = permissions;
        self
    }

    /// Caps the number of merges performed in one run.
    #[must_use]
    pub const fn max_merges(mut self, limit: usize) -> Self {
        self.max_merges = Some(limit);
        self
    }
}
