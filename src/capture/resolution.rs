//! Canonical capture resolutions and their textual aliases

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StreamError;

/// Canonical frame sizes a camera can be asked for.
///
/// Aliases such as `"VGA"` and `"640X480"` resolve to the same variant once,
/// when configuration is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    R160x120,
    R176x144,
    R240x176,
    R320x240,
    R480x320,
    R400x296,
    R640x480,
    R800x480,
    R800x600,
    R1024x768,
    R1280x720,
    R1280x1024,
    R1600x1200,
    R1920x1080,
    R720x1280,
    R864x1536,
    R2048x1536,
    R2560x1440,
    R2560x1600,
    R1080x1920,
    R2560x1920,
    /// Whatever the camera offers by default
    Any,
}

const ALIASES: &[(&str, Resolution)] = &[
    ("160X120", Resolution::R160x120),
    ("QQVGA", Resolution::R160x120),
    ("176X144", Resolution::R176x144),
    ("QCIF", Resolution::R176x144),
    ("240X176", Resolution::R240x176),
    ("HQVGA", Resolution::R240x176),
    ("320X240", Resolution::R320x240),
    ("QVGA", Resolution::R320x240),
    ("480X320", Resolution::R480x320),
    ("HVGA", Resolution::R480x320),
    ("400X296", Resolution::R400x296),
    ("CIF", Resolution::R400x296),
    ("640X480", Resolution::R640x480),
    ("VGA", Resolution::R640x480),
    ("800X480", Resolution::R800x480),
    ("WVGA", Resolution::R800x480),
    ("800X600", Resolution::R800x600),
    ("SVGA", Resolution::R800x600),
    ("1024X768", Resolution::R1024x768),
    ("XGA", Resolution::R1024x768),
    ("1280X720", Resolution::R1280x720),
    ("HD", Resolution::R1280x720),
    ("1280X1024", Resolution::R1280x1024),
    ("SXGA", Resolution::R1280x1024),
    ("1600X1200", Resolution::R1600x1200),
    ("UXGA", Resolution::R1600x1200),
    ("1920X1080", Resolution::R1920x1080),
    ("FHD", Resolution::R1920x1080),
    ("720X1280", Resolution::R720x1280),
    ("PHD", Resolution::R720x1280),
    ("864X1536", Resolution::R864x1536),
    ("P3MP", Resolution::R864x1536),
    ("2048X1536", Resolution::R2048x1536),
    ("QXGA", Resolution::R2048x1536),
    ("2560X1440", Resolution::R2560x1440),
    ("QHD", Resolution::R2560x1440),
    ("2560X1600", Resolution::R2560x1600),
    ("WQXGA", Resolution::R2560x1600),
    ("1080X1920", Resolution::R1080x1920),
    ("PFHD", Resolution::R1080x1920),
    ("2560X1920", Resolution::R2560x1920),
    ("QSXGA", Resolution::R2560x1920),
    ("ANY", Resolution::Any),
];

impl Resolution {
    /// Resolve a textual alias (case-insensitive) to its canonical value.
    pub fn from_alias(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == upper)
            .map(|(_, res)| *res)
    }

    /// Every accepted alias with the value it resolves to
    pub fn aliases() -> impl Iterator<Item = (&'static str, Resolution)> {
        ALIASES.iter().copied()
    }

    /// Width and height in pixels, `None` for [`Resolution::Any`].
    pub fn dimensions(self) -> Option<(u32, u32)> {
        use Resolution::*;
        let dims = match self {
            R160x120 => (160, 120),
            R176x144 => (176, 144),
            R240x176 => (240, 176),
            R320x240 => (320, 240),
            R480x320 => (480, 320),
            R400x296 => (400, 296),
            R640x480 => (640, 480),
            R800x480 => (800, 480),
            R800x600 => (800, 600),
            R1024x768 => (1024, 768),
            R1280x720 => (1280, 720),
            R1280x1024 => (1280, 1024),
            R1600x1200 => (1600, 1200),
            R1920x1080 => (1920, 1080),
            R720x1280 => (720, 1280),
            R864x1536 => (864, 1536),
            R2048x1536 => (2048, 1536),
            R2560x1440 => (2560, 1440),
            R2560x1600 => (2560, 1600),
            R1080x1920 => (1080, 1920),
            R2560x1920 => (2560, 1920),
            Any => return None,
        };
        Some(dims)
    }

    /// Short marketing name used in configuration dumps
    pub fn label(self) -> &'static str {
        use Resolution::*;
        match self {
            R160x120 => "QQVGA",
            R176x144 => "QCIF",
            R240x176 => "HQVGA",
            R320x240 => "QVGA",
            R480x320 => "HVGA",
            R400x296 => "CIF",
            R640x480 => "VGA",
            R800x480 => "WVGA",
            R800x600 => "SVGA",
            R1024x768 => "XGA",
            R1280x720 => "HD",
            R1280x1024 => "SXGA",
            R1600x1200 => "UXGA",
            R1920x1080 => "FHD",
            R720x1280 => "P_HD",
            R864x1536 => "P_3MP",
            R2048x1536 => "QXGA",
            R2560x1440 => "QHD",
            R2560x1600 => "WQXGA",
            R1080x1920 => "P_FHD",
            R2560x1920 => "QSXGA",
            Any => "Any",
        }
    }
}

impl FromStr for Resolution {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_alias(s)
            .ok_or_else(|| StreamError::InvalidConfig(format!("unknown resolution '{s}'")))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dimensions() {
            Some((w, h)) => write!(f, "{w}x{h} ({})", self.label()),
            None => f.write_str("Any"),
        }
    }
}
