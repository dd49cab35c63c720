//! Design-wide constants, for VHDL and C.

use inflections::Inflect;

use crate::generate::header;
use crate::generate::{Artifact, ArtifactKind};
use crate::parse::Constant;

pub fn vhdl_package(top: &str, constants: &[Constant]) -> Artifact {
    let mut lines = vec![
        format!("-- Constants of design {top}."),
        format!(
            "-- Generated by addrgen {}, do not edit.",
            env!("CARGO_PKG_VERSION")
        ),
        String::new(),
        "library ieee;".to_string(),
        "use ieee.std_logic_1164.all;".to_string(),
        String::new(),
        format!("package {top}_const_pkg is"),
        String::new(),
    ];
    for c in constants {
        let comment = c
            .description
            .as_deref()
            .map(|d| format!("  -- {d}"))
            .unwrap_or_default();
        // VHDL integers are 32-bit signed
        if c.value <= i32::MAX as u64 {
            lines.push(format!("  constant C_{} : integer := {};{comment}", c.name, c.value));
        } else {
            lines.push(format!(
                "  constant C_{} : std_logic_vector(63 downto 0) := x\"{:016x}\";{comment}",
                c.name, c.value
            ));
        }
    }
    if !constants.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!("end package {top}_const_pkg;"));
    lines.push(String::new());
    Artifact::new(
        ArtifactKind::Hdl,
        format!("{top}_const_pkg.vhd"),
        lines.join("\n"),
    )
}

pub fn c_header(top: &str, constants: &[Constant]) -> Artifact {
    let guard = format!("{}_CONST_H", top.to_constant_case());
    let mut lines = header::preamble(&format!("Constants of design {top}"), &guard);
    for c in constants {
        if let Some(desc) = &c.description {
            lines.push(format!("/* {} */", header::comment(desc)));
        }
        let suffix = if c.value > u64::from(u32::MAX) { "ull" } else { "u" };
        lines.push(format!("#define {} {}{suffix}", c.name, c.value));
    }
    if !constants.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!("#endif /* {guard} */"));
    lines.push(String::new());
    Artifact::new(ArtifactKind::Header, format!("{top}_const.h"), lines.join("\n"))
}
