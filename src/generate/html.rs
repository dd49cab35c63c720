//! HTML address map.

use anyhow::Result;
use html_escape::encode_text;

use crate::analyze::Analysis;
use crate::generate::map::{self, MapNode, MapRegister};
use crate::generate::template::{self, Values};
use crate::generate::{Artifact, ArtifactKind};
use crate::model::RegisterKind;
use crate::parse::Design;
use crate::util;

const TEMPLATE: &str = include_str!("templates/address_map.html");

pub const FILE_NAME: &str = "address_map.html";

fn row(address: u64, name: &str, kind: &str, words: u64, bits: &str, desc: Option<&str>) -> String {
    format!(
        "<tr><td class=\"addr\">{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
        util::hex(address),
        encode_text(name),
        kind,
        words,
        encode_text(bits),
        encode_text(desc.unwrap_or_default())
    )
}

fn bits(reg: &MapRegister) -> String {
    if reg.fields.is_empty() {
        return "31:0".to_string();
    }
    reg.fields
        .iter()
        .map(|f| {
            let msb = f.offset + f.width - 1;
            if f.width == 1 {
                format!("{}[{}]", f.name, f.offset)
            } else {
                format!("{}[{}:{}]", f.name, msb, f.offset)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn node_rows(node: &MapNode, rows: &mut Vec<String>) {
    rows.push(format!(
        "<tr class=\"block\"><td class=\"addr\">{}</td><td>{}</td><td>block {}</td><td>{}</td><td></td><td>{}</td></tr>",
        util::hex(node.base),
        encode_text(&node.path),
        encode_text(&node.block),
        node.size,
        encode_text(node.description.as_deref().unwrap_or_default())
    ));
    let id = format!("{}.ID", node.path);
    let id_desc = format!("identification word {}", util::hex(node.id.into()));
    rows.push(row(node.id_address, &id, "status", 1, "31:0", Some(&id_desc)));
    let ver = format!("{}.VER", node.path);
    rows.push(row(node.id_address + 1, &ver, "status", 1, "31:0", Some("interface version")));
    for reg in &node.registers {
        let kind = match reg.kind {
            RegisterKind::Control => "control",
            RegisterKind::Status => "status",
        };
        rows.push(row(
            reg.address,
            &format!("{}.{}", node.path, reg.name),
            kind,
            reg.reps.into(),
            &bits(reg),
            reg.description.as_deref(),
        ));
    }
    for child in &node.children {
        node_rows(child, rows);
    }
}

pub fn render(design: &Design, analysis: &Analysis) -> Result<Artifact> {
    let root = map::build(design, analysis)?;
    let mut rows = Vec::new();
    node_rows(&root, &mut rows);

    let mut values = Values::new();
    values.insert("tool_version", env!("CARGO_PKG_VERSION").to_string());
    values.insert("top", encode_text(&design.top).into_owned());
    values.insert("blocks", root.walk().len().to_string());
    values.insert("size", root.size.to_string());
    values.insert("rows", rows.join("\n"));
    Ok(Artifact::new(
        ArtifactKind::Html,
        FILE_NAME.to_string(),
        template::render(FILE_NAME, TEMPLATE, &values)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::include::Expanded;
    use crate::parse;

    #[test]
    fn lists_every_instance_with_escaped_text() {
        let text = r#"<sysdef top="top">
  <block name="top" desc="a &lt;b&gt; c">
    <creg name="ctrl" desc="x &amp; y">
      <field name="en" width="1"/>
      <field name="mode" width="3"/>
    </creg>
    <subblock name="link" type="leaf" reps="2"/>
  </block>
  <block name="leaf">
    <sreg name="count"/>
  </block>
</sysdef>"#;
        let design = parse::parse(&Expanded::from_text(text, "t.xml"), None).unwrap();
        let mut analysis = Analysis::new(&design.registry);
        analysis.analyze("top").unwrap();
        let html = render(&design, &analysis).unwrap().contents;

        assert!(html.contains("<title>Address map of top</title>"));
        assert!(html.contains("a &lt;b&gt; c"));
        assert!(html.contains("x &amp; y"));
        assert!(html.contains("en[0], mode[3:1]"));
        assert!(html.contains("top.link[1].count"));
        assert!(html.contains("3 block instances"));
        assert!(html.contains("td { border"));
    }
}
