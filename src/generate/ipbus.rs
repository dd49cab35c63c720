//! IPbus (uHAL) address tables.
//!
//! One table per block, addresses relative to the block. Sub-block instances
//! refer to the table of their block type through `module="file://..."`, so
//! uHAL rebuilds the hierarchy itself.

use html_escape::encode_double_quoted_attribute as attr;

use crate::analyze::Layout;
use crate::generate::{Artifact, ArtifactKind};
use crate::model::block::{ID_ADDRESS, VERSION_ADDRESS};
use crate::model::{Block, Register, RegisterKind};
use crate::util;

pub fn file_name(block: &str) -> String {
    format!("{block}_address.xml")
}

fn description(text: Option<&str>) -> String {
    text.map(|d| format!(" description=\"{}\"", attr(d)))
        .unwrap_or_default()
}

fn permission(register: &Register) -> &'static str {
    match register.kind {
        RegisterKind::Control => "rw",
        RegisterKind::Status => "r",
    }
}

fn register_nodes(lines: &mut Vec<String>, register: &Register, local: u64) {
    for (i, address) in register.addresses().enumerate() {
        let id = if register.is_array() {
            format!("{}_{i}", register.name)
        } else {
            register.name.clone()
        };
        let head = format!(
            "  <node id=\"{id}\" address=\"{}\" permission=\"{}\"{}",
            util::hex(local + u64::from(address)),
            permission(register),
            description(register.description.as_deref())
        );
        if !register.has_fields() {
            lines.push(format!("{head}/>"));
            continue;
        }
        lines.push(format!("{head}>"));
        for f in &register.fields {
            lines.push(format!(
                "    <node id=\"{}\" mask=\"{}\"{}/>",
                f.name,
                util::hex(f.mask().into()),
                description(f.description.as_deref())
            ));
        }
        lines.push("  </node>".to_string());
    }
}

pub fn render(block: &Block, layout: &Layout) -> Artifact {
    let local = layout.local_area().base_address;
    let mut lines = vec![
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>".to_string(),
        format!(
            "<!-- Address table of block {}. Generated by addrgen {}, do not edit. -->",
            block.name,
            env!("CARGO_PKG_VERSION")
        ),
        format!(
            "<node id=\"{}\"{}>",
            block.name,
            description(block.description.as_deref())
        ),
        format!(
            "  <node id=\"ID\" address=\"{}\" permission=\"r\"/>",
            util::hex(local + u64::from(ID_ADDRESS))
        ),
        format!(
            "  <node id=\"VER\" address=\"{}\" permission=\"r\"/>",
            util::hex(local + u64::from(VERSION_ADDRESS))
        ),
    ];
    for register in &block.registers {
        register_nodes(&mut lines, register, local);
    }
    for sub in &block.subblocks {
        let Some(area) = layout.area(&sub.name) else {
            continue;
        };
        for (i, window) in area.windows().enumerate() {
            let id = if area.is_array() {
                format!("{}_{i}", sub.name)
            } else {
                sub.name.clone()
            };
            lines.push(format!(
                "  <node id=\"{id}\" address=\"{}\" module=\"file://{}\"{}/>",
                util::hex(window.base),
                file_name(&sub.ty),
                description(sub.description.as_deref())
            ));
        }
    }
    lines.push("</node>".to_string());
    lines.push(String::new());
    Artifact::new(ArtifactKind::Ipbus, file_name(&block.name), lines.join("\n"))
}
