//! FuseSoC core description listing the generated VHDL.

use std::path::Path;

use anyhow::{bail, Result};

use crate::analyze::Analysis;
use crate::config::Config;
use crate::generate::{Artifact, ArtifactKind};
use crate::parse::Design;

/// `vendor:library:name:version` of the core when none is configured.
fn default_vlnv(top: &str) -> String {
    format!("::{top}:0")
}

/// FuseSoC resolves file names against the directory of the core file.
fn relative(file: &Path, core: &Path) -> String {
    let dir = core.parent().unwrap_or(Path::new(""));
    file.strip_prefix(dir).unwrap_or(file).display().to_string()
}

/// Renders the core for the VHDL of `design`, packages before the modules
/// using them.
pub fn render(design: &Design, analysis: &Analysis, config: &Config) -> Result<Artifact> {
    let Some(core) = config.fusesoc.as_deref() else {
        bail!("no FuseSoC core file configured");
    };
    let Some(hdl) = config.hdl.as_deref() else {
        bail!("a FuseSoC core needs the VHDL output directory (`hdl`)");
    };

    let mut files = vec![format!("{}_const_pkg.vhd", design.top)];
    for (block, _) in analysis.blocks() {
        files.push(format!("{}_pkg.vhd", block.name));
        files.push(format!("{}_wb.vhd", block.name));
    }

    let vlnv = config
        .fusesoc_vlnv
        .clone()
        .unwrap_or_else(|| default_vlnv(&design.top));
    let mut lines = vec![
        "CAPI=2:".to_string(),
        format!("# Generated by addrgen {}, do not edit.", env!("CARGO_PKG_VERSION")),
        format!("name: \"{vlnv}\""),
        String::new(),
        "filesets:".to_string(),
        "  rtl:".to_string(),
        "    files:".to_string(),
    ];
    for file in files {
        lines.push(format!("      - {}", relative(&hdl.join(file), core)));
    }
    lines.extend(
        [
            "    file_type: vhdlSource-93",
            "",
            "targets:",
            "  default:",
            "    filesets:",
            "      - rtl",
            "",
        ]
        .map(String::from),
    );

    Ok(Artifact::new(
        ArtifactKind::Core,
        core.display().to_string(),
        lines.join("\n"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::include::Expanded;
    use crate::parse::parse;

    const SOURCE: &str = r#"<sysdef top="main">
  <block name="main">
    <creg name="ctrl"/>
    <subblock name="link" type="leaf"/>
  </block>
  <block name="leaf">
    <sreg name="stat"/>
  </block>
</sysdef>
"#;

    #[test]
    fn lists_packages_before_modules() {
        let design = parse(&Expanded::from_text(SOURCE, "sys.xml"), None).unwrap();
        let mut analysis = Analysis::new(&design.registry);
        analysis.analyze(&design.top).unwrap();
        let config = Config {
            hdl: Some("build/hdl".into()),
            fusesoc: Some("build/main.core".into()),
            ..Default::default()
        };

        let core = render(&design, &analysis, &config).unwrap();
        assert_eq!(core.kind, ArtifactKind::Core);
        assert_eq!(core.file_name, "build/main.core");
        assert!(core.contents.starts_with("CAPI=2:\n"));
        assert!(core.contents.contains("name: \"::main:0\"\n"));
        assert!(core.contents.contains(
            "    files:\n      - hdl/main_const_pkg.vhd\n      - hdl/main_pkg.vhd\n      \
             - hdl/main_wb.vhd\n      - hdl/leaf_pkg.vhd\n      - hdl/leaf_wb.vhd\n    \
             file_type: vhdlSource-93\n"
        ));
    }

    #[test]
    fn needs_the_vhdl_output() {
        let design = parse(&Expanded::from_text(SOURCE, "sys.xml"), None).unwrap();
        let mut analysis = Analysis::new(&design.registry);
        analysis.analyze(&design.top).unwrap();
        let config = Config {
            fusesoc: Some("main.core".into()),
            fusesoc_vlnv: Some("acme:regs:main:1.0".to_string()),
            ..Default::default()
        };
        assert!(render(&design, &analysis, &config).is_err());

        let config = Config {
            hdl: Some("/abs/hdl".into()),
            ..config
        };
        let core = render(&design, &analysis, &config).unwrap();
        assert!(core.contents.contains("name: \"acme:regs:main:1.0\"\n"));
        assert!(core.contents.contains("      - /abs/hdl/leaf_wb.vhd\n"));
    }
}
