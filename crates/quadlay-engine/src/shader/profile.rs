use std::fmt;

/// Pipeline stage selected by a target profile.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

/// Parsed target profile: `<stage>_<major>_<minor>`.
///
/// Stage prefixes are `vs`, `ps` and `cs`. The version is the SPIR-V language
/// version of the output and must lie in `1.0..=1.6`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TargetProfile {
    pub stage: ShaderStage,
    pub version: (u8, u8),
}

impl TargetProfile {
    const MAX_MINOR: u8 = 6;

    pub fn parse(profile: &str) -> Option<Self> {
        let mut parts = profile.split('_');
        let stage = match parts.next()? {
            "vs" => ShaderStage::Vertex,
            "ps" => ShaderStage::Fragment,
            "cs" => ShaderStage::Compute,
            _ => return None,
        };
        let major: u8 = parts.next()?.parse().ok()?;
        let minor: u8 = parts.next()?.parse().ok()?;
        if parts.next().is_some() || major != 1 || minor > Self::MAX_MINOR {
            return None;
        }
        Some(Self {
            stage,
            version: (major, minor),
        })
    }
}

impl fmt::Display for TargetProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.stage {
            ShaderStage::Vertex => "vs",
            ShaderStage::Fragment => "ps",
            ShaderStage::Compute => "cs",
        };
        write!(f, "{prefix}_{}_{}", self.version.0, self.version.1)
    }
}
