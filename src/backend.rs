//! Capture backend resolution.
//!
//! Maps the running host to the capture backend every worker opens its device with.
//! Resolution never fails: an unrecognised host gets `BackendId::Any` and any real
//! incompatibility surfaces later as an open failure.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Capture backend identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    /// Video4Linux2 (Linux, including embedded ARM boards).
    V4l2,
    /// DirectShow (Windows).
    DirectShow,
    /// Media Foundation (Windows).
    MediaFoundation,
    /// AVFoundation (macOS).
    AvFoundation,
    /// Let the driver pick.
    Any,
}

impl BackendId {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::V4l2 => "v4l2",
            BackendId::DirectShow => "directshow",
            BackendId::MediaFoundation => "mediafoundation",
            BackendId::AvFoundation => "avfoundation",
            BackendId::Any => "any",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v4l2" => Ok(BackendId::V4l2),
            "directshow" | "dshow" => Ok(BackendId::DirectShow),
            "mediafoundation" | "msmf" => Ok(BackendId::MediaFoundation),
            "avfoundation" => Ok(BackendId::AvFoundation),
            "any" | "auto" => Ok(BackendId::Any),
            other => Err(anyhow!("unknown capture backend '{}'", other)),
        }
    }
}

/// Identity of the host the process runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Platform {
    pub os: &'static str,
    pub arch: &'static str,
}

impl Platform {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
        }
    }

    /// ARM Linux boards (Jetson and similar) with CSI/USB cameras on V4L2.
    pub fn is_embedded_linux(&self) -> bool {
        self.os == "linux" && matches!(self.arch, "aarch64" | "arm")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)?;
        if self.is_embedded_linux() {
            f.write_str(" (embedded)")?;
        }
        Ok(())
    }
}

/// Resolve the backend for the running host.
pub fn resolve() -> BackendId {
    resolve_for(Platform::current())
}

/// Resolve the backend for a given host identity. Pure.
pub fn resolve_for(platform: Platform) -> BackendId {
    match platform.os {
        "windows" => BackendId::DirectShow,
        "linux" | "android" => BackendId::V4l2,
        "macos" | "ios" => BackendId::AvFoundation,
        _ => BackendId::Any,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(os: &'static str, arch: &'static str) -> Platform {
        Platform { os, arch }
    }

    #[test]
    fn display_marks_embedded_once() {
        assert_eq!(host("linux", "aarch64").to_string(), "linux/aarch64 (embedded)");
        assert_eq!(host("linux", "x86_64").to_string(), "linux/x86_64");
    }

    #[test]
    fn windows_uses_directshow() {
        assert_eq!(resolve_for(host("windows", "x86_64")), BackendId::DirectShow);
    }

    #[test]
    fn linux_uses_v4l2_on_every_arch() {
        assert_eq!(resolve_for(host("linux", "x86_64")), BackendId::V4l2);
        assert_eq!(resolve_for(host("linux", "aarch64")), BackendId::V4l2);
    }

    #[test]
    fn unknown_host_falls_back_to_any() {
        assert_eq!(resolve_for(host("plan9", "mips")), BackendId::Any);
        assert_eq!(resolve_for(host("", "")), BackendId::Any);
    }

    #[test]
    fn resolution_is_deterministic() {
        assert_eq!(resolve(), resolve());
    }

    #[test]
    fn embedded_linux_detection() {
        assert!(host("linux", "aarch64").is_embedded_linux());
        assert!(!host("linux", "x86_64").is_embedded_linux());
        assert!(!host("macos", "aarch64").is_embedded_linux());
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!("dshow".parse::<BackendId>().unwrap(), BackendId::DirectShow);
        assert_eq!("V4L2".parse::<BackendId>().unwrap(), BackendId::V4l2);
        assert!("cap_xyz".parse::<BackendId>().is_err());
    }
}
