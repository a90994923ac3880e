/// What to do with a file already sitting at an install destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Keep the old file as `<name>.old`.
    #[default]
    Rename,
    /// Delete the old file.
    Overwrite,
}

/// Whether installer primitives touch the filesystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecMode {
    #[default]
    Apply,
    /// Record the manifest without mutating anything.
    DryRun,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    pub policy: ConflictPolicy,
    pub mode: ExecMode,
}

impl InstallOptions {
    pub fn new(policy: ConflictPolicy, mode: ExecMode) -> Self {
        Self { policy, mode }
    }

    pub fn is_dry_run(&self) -> bool {
        self.mode == ExecMode::DryRun
    }
}
