use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::parse::Constant;
use crate::util;

#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[derive(Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Top-level description file.
    pub input: Option<PathBuf>,
    /// Directory `input` is relative to.
    pub base_dir: Option<PathBuf>,
    /// Output directory of the VHDL interface modules and packages.
    pub hdl: Option<PathBuf>,
    /// Output directory of the C headers.
    pub header: Option<PathBuf>,
    /// Output directory of the HTML address map.
    pub html: Option<PathBuf>,
    /// Absolute address map file, `.json` or `.yaml`.
    pub map: Option<PathBuf>,
    /// Output directory of the IPbus address tables.
    pub ipbus: Option<PathBuf>,
    /// FuseSoC core file listing the VHDL outputs.
    pub fusesoc: Option<PathBuf>,
    /// `vendor:library:name:version` of the FuseSoC core.
    pub fusesoc_vlnv: Option<String>,
    /// Overrides the `top` attribute of the description.
    pub top: Option<String>,
    /// Registered crossbar outputs.
    pub registered: bool,
    /// Interface version word, a number or constant name.
    pub iface_version: Option<String>,
    pub log_level: Option<String>,
}

impl Config {
    /// The version word: the configured value, or `checksum` when unset.
    pub fn version_word(&self, checksum: u32, constants: &[Constant]) -> Result<u32> {
        let Some(version) = self.iface_version.as_deref().map(str::trim) else {
            return Ok(checksum);
        };
        let value = util::parse_int(version).or_else(|| {
            constants
                .iter()
                .find(|c| c.name == version)
                .map(|c| c.value)
        });
        match value.map(u32::try_from) {
            Some(Ok(word)) => Ok(word),
            Some(Err(_)) => bail!("interface version {} doesn't fit in 32 bits", version),
            None => bail!("invalid interface version {}", version),
        }
    }

    pub fn input(&self) -> Result<&Path> {
        match self.input.as_deref() {
            Some(input) => Ok(input),
            None => bail!("no input file given"),
        }
    }

    pub fn base_dir(&self) -> &Path {
        self.base_dir.as_deref().unwrap_or(Path::new("."))
    }

    pub fn has_outputs(&self) -> bool {
        self.hdl.is_some()
            || self.header.is_some()
            || self.html.is_some()
            || self.map.is_some()
            || self.ipbus.is_some()
            || self.fusesoc.is_some()
    }
}

#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(rename_all = "lowercase")
)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MapFormat {
    #[cfg(feature = "json")]
    Json,
    #[cfg(feature = "yaml")]
    Yaml,
}

impl MapFormat {
    /// Make a new [`MapFormat`] from a given extension.
    pub fn from_extension(s: &str) -> Option<Self> {
        match s {
            #[cfg(feature = "json")]
            "json" => Some(Self::Json),
            #[cfg(feature = "yaml")]
            "yml" | "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
        {
            Some(format) => Ok(format),
            None => bail!(
                "unsupported map format of {} (enabled: {})",
                path.display(),
                Self::enabled().join(", ")
            ),
        }
    }

    fn enabled() -> Vec<&'static str> {
        #[allow(unused_mut)]
        let mut names = Vec::new();
        #[cfg(feature = "json")]
        names.push("json");
        #[cfg(feature = "yaml")]
        names.push("yaml");
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_word() {
        let constants = [Constant {
            name: "REV".to_string(),
            value: 7,
            description: None,
        }];
        let mut config = Config::default();
        assert_eq!(config.version_word(0xabcd, &constants).unwrap(), 0xabcd);
        config.iface_version = Some("0x0102_0003".to_string());
        assert_eq!(config.version_word(0, &[]).unwrap(), 0x0102_0003);
        config.iface_version = Some("REV".to_string());
        assert_eq!(config.version_word(0, &constants).unwrap(), 7);
        config.iface_version = Some("0x1_0000_0000".to_string());
        assert!(config.version_word(0, &[]).is_err());
        config.iface_version = Some("v1".to_string());
        assert!(config.version_word(0, &constants).is_err());
    }

    #[test]
    fn missing_input() {
        assert!(Config::default().input().is_err());
        assert_eq!(Config::default().base_dir(), Path::new("."));
    }

    #[test]
    fn map_format_from_extension() {
        #[cfg(feature = "json")]
        assert_eq!(
            MapFormat::from_path(Path::new("out/map.json")).unwrap(),
            MapFormat::Json
        );
        #[cfg(feature = "yaml")]
        assert_eq!(
            MapFormat::from_path(Path::new("map.yml")).unwrap(),
            MapFormat::Yaml
        );
        assert!(MapFormat::from_path(Path::new("map.txt")).is_err());
    }
}
