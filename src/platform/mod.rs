//! Host platform detection and the name aliases release assets use for it.

use std::fmt;

/// Operating system and CPU architecture of a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into().to_lowercase(),
            arch: arch.into().to_lowercase(),
        }
    }

    /// Detect the current platform
    pub fn detect() -> Self {
        Self::new(Self::detect_os(), Self::detect_arch())
    }

    fn detect_os() -> &'static str {
        #[cfg(target_os = "macos")]
        {
            "darwin"
        }
        #[cfg(not(target_os = "macos"))]
        {
            std::env::consts::OS
        }
    }

    fn detect_arch() -> &'static str {
        #[cfg(target_arch = "x86")]
        {
            "i686"
        }
        #[cfg(not(target_arch = "x86"))]
        {
            std::env::consts::ARCH
        }
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    /// Tokens that identify this OS inside an asset name.
    pub fn os_aliases(&self) -> Vec<&str> {
        match self.os.as_str() {
            "darwin" | "macos" => vec!["darwin", "macos", "apple"],
            "windows" => vec!["windows", "win32", "win64", ".exe"],
            os => vec![os],
        }
    }

    /// Tokens that identify this CPU architecture inside an asset name.
    pub fn arch_aliases(&self) -> Vec<&str> {
        let mut aliases = match self.arch.as_str() {
            "x86_64" | "amd64" | "x64" => vec!["x86_64", "amd64", "x64"],
            "aarch64" | "arm64" | "armv8" => vec!["aarch64", "arm64", "armv8"],
            "i686" | "i386" | "x86" => vec!["i686", "i386"],
            arch => vec![arch],
        };
        // Fat binaries run on every mac.
        if matches!(self.os.as_str(), "darwin" | "macos") {
            aliases.push("universal");
        }
        aliases
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}
