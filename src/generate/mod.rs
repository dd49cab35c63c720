//! Output backends.
//!
//! Every backend renders into memory; nothing is written until all of them
//! have succeeded.

pub mod constants;
pub mod fusesoc;
pub mod header;
pub mod html;
pub mod ipbus;
pub mod map;
pub mod template;
pub mod vhdl;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::analyze::Analysis;
use crate::config::Config;
use crate::parse::Design;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Hdl,
    Header,
    Html,
    Map,
    Ipbus,
    /// FuseSoC core file.
    Core,
}

/// One generated file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub file_name: String,
    pub contents: String,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, file_name: String, contents: String) -> Self {
        Self {
            kind,
            file_name,
            contents,
        }
    }

    /// Where the artifact goes, `None` when its kind is not enabled.
    pub fn path(&self, config: &Config) -> Option<PathBuf> {
        let dir = match self.kind {
            ArtifactKind::Hdl => config.hdl.as_deref(),
            ArtifactKind::Header => config.header.as_deref(),
            ArtifactKind::Html => config.html.as_deref(),
            ArtifactKind::Ipbus => config.ipbus.as_deref(),
            ArtifactKind::Map => return config.map.clone(),
            ArtifactKind::Core => return config.fusesoc.clone(),
        };
        dir.map(|d| d.join(&self.file_name))
    }
}

/// Renders the artifacts of every kind enabled in `config`.
///
/// `analysis` must hold the layout of the top block of `design`.
pub fn render(design: &Design, analysis: &Analysis, config: &Config) -> Result<Vec<Artifact>> {
    let mut artifacts = Vec::new();

    if config.hdl.is_some() {
        let version = config.version_word(design.checksum, &design.constants)?;
        for (block, layout) in analysis.blocks() {
            let options = vhdl::Options {
                masters: if block.name == design.top {
                    design.masters
                } else {
                    1
                },
                registered: config.registered,
                version,
            };
            debug!("Rendering VHDL of {}", block.name);
            artifacts.extend(
                vhdl::render(block, layout, &options)
                    .with_context(|| format!("Error rendering block {}", block.name))?,
            );
        }
        artifacts.push(constants::vhdl_package(&design.top, &design.constants));
    }

    if config.header.is_some() {
        for (block, layout) in analysis.blocks() {
            artifacts.push(header::render(block, layout));
        }
        artifacts.push(constants::c_header(&design.top, &design.constants));
    }

    if config.html.is_some() {
        artifacts.push(html::render(design, analysis)?);
    }

    if let Some(path) = config.map.as_deref() {
        artifacts.push(map::render(design, analysis, path)?);
    }

    if config.ipbus.is_some() {
        for (block, layout) in analysis.blocks() {
            artifacts.push(ipbus::render(block, layout));
        }
    }

    if config.fusesoc.is_some() {
        artifacts.push(fusesoc::render(design, analysis, config)?);
    }

    Ok(artifacts)
}

/// Writes `artifacts` to the directories configured for their kind.
pub fn write(artifacts: &[Artifact], config: &Config) -> Result<()> {
    for artifact in artifacts {
        let Some(path) = artifact.path(config) else {
            continue;
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Could not create directory {}", dir.display()))?;
        }
        fs::write(&path, &artifact.contents)
            .with_context(|| format!("Could not write {}", path.display()))?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}
