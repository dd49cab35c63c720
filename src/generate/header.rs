//! C header with the register map of a block.
//!
//! Offsets are word offsets relative to the base of the block.

use inflections::Inflect;

use crate::analyze::Layout;
use crate::generate::{Artifact, ArtifactKind};
use crate::model::block::{ID_ADDRESS, VERSION_ADDRESS};
use crate::model::Block;
use crate::util;

/// Text safe to put inside a C block comment.
pub(crate) fn comment(text: &str) -> String {
    text.replace("*/", "* /")
}

/// Opening comment and include guard.
pub(crate) fn preamble(title: &str, guard: &str) -> Vec<String> {
    vec![
        format!("/* {}", comment(title)),
        format!(
            " * Generated by addrgen {}, do not edit. */",
            env!("CARGO_PKG_VERSION")
        ),
        String::new(),
        format!("#ifndef {guard}"),
        format!("#define {guard}"),
        String::new(),
    ]
}

fn define(lines: &mut Vec<String>, name: &str, value: impl std::fmt::Display) {
    lines.push(format!("#define {name} {value}"));
}

fn offset(value: u64) -> String {
    format!("{}u", util::hex(value))
}

pub fn render(block: &Block, layout: &Layout) -> Artifact {
    let prefix = block.name.to_constant_case();
    let guard = format!("{prefix}_H");
    let title = match &block.description {
        Some(desc) => format!("Register map of block {}: {}", block.name, desc),
        None => format!("Register map of block {}", block.name),
    };
    let mut lines = preamble(&title, &guard);

    let local = layout.local_area().base_address;
    define(&mut lines, &format!("{prefix}_ADDRESS_BITS"), layout.address_bits);
    define(&mut lines, &format!("{prefix}_SIZE"), offset(layout.total_address_size));
    define(&mut lines, &format!("{prefix}_ID"), offset(block.id_word().into()));
    define(
        &mut lines,
        &format!("{prefix}_ID_OFFSET"),
        offset(local + u64::from(ID_ADDRESS)),
    );
    define(
        &mut lines,
        &format!("{prefix}_VER_OFFSET"),
        offset(local + u64::from(VERSION_ADDRESS)),
    );

    for reg in &block.registers {
        let name = format!("{prefix}_{}", reg.name.to_constant_case());
        lines.push(String::new());
        match &reg.description {
            Some(desc) => lines.push(format!("/* {}: {} */", reg.name, comment(desc))),
            None => lines.push(format!("/* {} */", reg.name)),
        }
        define(&mut lines, &format!("{name}_OFFSET"), offset(local + u64::from(reg.base)));
        if reg.is_array() {
            define(&mut lines, &format!("{name}_COUNT"), reg.reps);
        }
        for f in &reg.fields {
            let field = format!("{name}_{}", f.name.to_constant_case());
            define(&mut lines, &format!("{field}_SHIFT"), f.offset);
            define(&mut lines, &format!("{field}_WIDTH"), f.width);
            define(&mut lines, &format!("{field}_MASK"), offset(f.mask().into()));
        }
    }

    for sub in &block.subblocks {
        let Some(area) = layout.area(&sub.name) else {
            continue;
        };
        let name = format!("{prefix}_{}", sub.name.to_constant_case());
        lines.push(String::new());
        lines.push(format!("/* {}: block {} */", sub.name, sub.ty));
        define(&mut lines, &format!("{name}_OFFSET"), offset(area.base_address));
        if area.is_array() {
            define(&mut lines, &format!("{name}_COUNT"), area.reps);
            define(&mut lines, &format!("{name}_STRIDE"), offset(area.stride));
        }
    }

    lines.push(String::new());
    lines.push(format!("#endif /* {guard} */"));
    lines.push(String::new());
    Artifact::new(ArtifactKind::Header, format!("{}.h", block.name), lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::Analysis;
    use crate::model::{
        BlockOptions, FieldOptions, RegisterKind, RegisterOptions, Registry, SubblockRef,
    };

    #[test]
    fn offsets_include_the_local_area_base() {
        let mut mode = RegisterOptions::new("mode_reg", RegisterKind::Control);
        mode.fields = vec![FieldOptions::new("enable", 1), FieldOptions::new("div", 4)];
        let mut cnt = RegisterOptions::new("cnt", RegisterKind::Status);
        cnt.reps = 3;
        cnt.description = Some("event */ counters".to_string());
        let mut link = SubblockRef::new("leaf");
        link.name = "link".to_string();
        link.reps = 2;
        let registry = Registry::from_blocks([
            Block::new(
                BlockOptions::new("top")
                    .register(mode)
                    .register(cnt)
                    .subblock(link),
            )
            .unwrap(),
            Block::new(
                BlockOptions::new("leaf")
                    .register(RegisterOptions::new("a", RegisterKind::Status))
                    .register(RegisterOptions::new("b", RegisterKind::Status))
                    .register(RegisterOptions::new("c", RegisterKind::Status))
                    .register(RegisterOptions::new("d", RegisterKind::Status))
                    .register(RegisterOptions::new("e", RegisterKind::Status))
                    .register(RegisterOptions::new("f", RegisterKind::Status)),
            )
            .unwrap(),
        ])
        .unwrap();
        let mut analysis = Analysis::new(&registry);
        // leaf: 8 words; top: link area 16 words at 0, 6 local words at 16
        let layout = analysis.analyze("top").unwrap().clone();
        let header = render(registry.get("top").unwrap(), &layout).contents;

        assert!(header.contains("#ifndef TOP_H\n#define TOP_H\n"));
        assert!(header.contains("#define TOP_SIZE 0x00000020u\n"));
        assert!(header.contains("#define TOP_ID_OFFSET 0x00000010u\n"));
        assert!(header.contains("#define TOP_MODE_REG_OFFSET 0x00000012u\n"));
        assert!(header.contains("#define TOP_MODE_REG_DIV_SHIFT 1\n"));
        assert!(header.contains("#define TOP_MODE_REG_DIV_MASK 0x0000001eu\n"));
        assert!(header.contains("#define TOP_CNT_OFFSET 0x00000013u\n#define TOP_CNT_COUNT 3\n"));
        assert!(header.contains("/* cnt: event * / counters */"));
        assert!(header.contains("#define TOP_LINK_OFFSET 0x00000000u\n"));
        assert!(header.contains("#define TOP_LINK_STRIDE 0x00000008u\n"));
        assert!(header.ends_with("#endif /* TOP_H */\n"));
    }
}
