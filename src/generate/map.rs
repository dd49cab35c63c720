//! Absolute address map of the whole hierarchy.

use std::path::Path;

use anyhow::{anyhow, Result};

use crate::analyze::Analysis;
#[cfg(any(feature = "json", feature = "yaml"))]
use crate::config::MapFormat;
use crate::generate::{Artifact, ArtifactKind};
use crate::model::{Block, ElementType, Register, RegisterKind};
use crate::parse::Design;

/// One block instance, placed at an absolute address.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapNode {
    /// Instance path from the top block, e.g. `main.link[1]`.
    pub path: String,
    pub block: String,
    pub base: u64,
    pub size: u64,
    pub id: u32,
    /// Absolute address of the identification word.
    pub id_address: u64,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
    pub registers: Vec<MapRegister>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Vec::is_empty"))]
    pub children: Vec<MapNode>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapRegister {
    pub name: String,
    pub kind: RegisterKind,
    /// Absolute address of the first element.
    pub address: u64,
    pub reps: u32,
    pub element_type: ElementType,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Vec::is_empty"))]
    pub fields: Vec<MapField>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapField {
    pub name: String,
    pub offset: u32,
    pub width: u32,
    pub element_type: ElementType,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
}

impl MapNode {
    /// This node and all nodes below it, depth first.
    pub fn walk(&self) -> Vec<&MapNode> {
        let mut nodes = vec![self];
        for child in &self.children {
            nodes.extend(child.walk());
        }
        nodes
    }
}

fn map_register(reg: &Register, local_base: u64) -> MapRegister {
    MapRegister {
        name: reg.name.clone(),
        kind: reg.kind,
        address: local_base + u64::from(reg.base),
        reps: reg.reps,
        element_type: reg.element_type,
        fields: reg
            .fields
            .iter()
            .map(|f| MapField {
                name: f.name.clone(),
                offset: f.offset,
                width: f.width,
                element_type: f.element_type,
                description: f.description.clone(),
            })
            .collect(),
        description: reg.description.clone(),
    }
}

fn node(analysis: &Analysis, block: &Block, path: String, base: u64) -> Result<MapNode> {
    let layout = analysis
        .layout(&block.name)
        .ok_or_else(|| anyhow!("block {} was not analysed", block.name))?;
    let local_base = base + layout.local_area().base_address;
    let mut children = Vec::new();
    for area in layout.areas.iter().filter(|a| !a.is_local()) {
        let target = area
            .target
            .as_deref()
            .and_then(|t| analysis.registry().get(t))
            .ok_or_else(|| anyhow!("unknown block type of {}", area.name))?;
        for (i, window) in area.windows().enumerate() {
            let name = if area.is_array() {
                format!("{path}.{}[{i}]", area.name)
            } else {
                format!("{path}.{}", area.name)
            };
            children.push(node(analysis, target, name, base + window.base)?);
        }
    }
    Ok(MapNode {
        path,
        block: block.name.clone(),
        base,
        size: layout.total_address_size,
        id: block.id_word(),
        id_address: local_base,
        description: block.description.clone(),
        registers: block
            .registers
            .iter()
            .map(|r| map_register(r, local_base))
            .collect(),
        children,
    })
}

/// Builds the map of the top block of `design`, placed at address 0.
pub fn build(design: &Design, analysis: &Analysis) -> Result<MapNode> {
    let top = design
        .registry
        .get(&design.top)
        .ok_or_else(|| anyhow!("unknown top block {}", design.top))?;
    node(analysis, top, top.name.clone(), 0)
}

/// Serialises the map in the format selected by the extension of `path`.
#[cfg(any(feature = "json", feature = "yaml"))]
pub fn render(design: &Design, analysis: &Analysis, path: &Path) -> Result<Artifact> {
    let root = build(design, analysis)?;
    let contents = match MapFormat::from_path(path)? {
        #[cfg(feature = "json")]
        MapFormat::Json => serde_json::to_string_pretty(&root)? + "\n",
        #[cfg(feature = "yaml")]
        MapFormat::Yaml => serde_yaml::to_string(&root)?,
    };
    Ok(Artifact::new(
        ArtifactKind::Map,
        path.display().to_string(),
        contents,
    ))
}

#[cfg(not(any(feature = "json", feature = "yaml")))]
pub fn render(_design: &Design, _analysis: &Analysis, path: &Path) -> Result<Artifact> {
    Err(anyhow!(
        "cannot write {}: built without the `json` and `yaml` features",
        path.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::include::Expanded;
    use crate::parse;

    const DESIGN: &str = r#"<sysdef top="top">
  <block name="top">
    <creg name="ctrl">
      <field name="en" width="1"/>
    </creg>
    <subblock name="link" type="leaf" reps="2"/>
  </block>
  <block name="leaf" id="7">
    <sreg name="count" reps="2"/>
  </block>
</sysdef>"#;

    fn tree() -> MapNode {
        let design = parse::parse(&Expanded::from_text(DESIGN, "map.xml"), None).unwrap();
        let mut analysis = Analysis::new(&design.registry);
        analysis.analyze(&design.top).unwrap();
        build(&design, &analysis).unwrap()
    }

    #[test]
    fn instances_get_absolute_addresses() {
        // leaf: 4 words; top: link area 8 words at 0, local area at 8
        let root = tree();
        assert_eq!((root.base, root.size), (0, 16));
        assert_eq!(root.registers[0].address, 10);
        assert_eq!(root.id_address, 8);
        let children: Vec<_> = root
            .children
            .iter()
            .map(|c| (c.path.as_str(), c.base, c.id))
            .collect();
        assert_eq!(children, [("top.link[0]", 0, 7), ("top.link[1]", 4, 7)]);
        assert_eq!(root.children[1].registers[0].address, 6);
        assert_eq!(root.walk().len(), 3);
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_map() {
        let design = parse::parse(&Expanded::from_text(DESIGN, "map.xml"), None).unwrap();
        let mut analysis = Analysis::new(&design.registry);
        analysis.analyze(&design.top).unwrap();
        let artifact = render(&design, &analysis, Path::new("out/map.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&artifact.contents).unwrap();
        assert_eq!(value["children"][1]["path"], "top.link[1]");
        assert_eq!(value["registers"][0]["kind"], "control");
        assert_eq!(value["registers"][0]["fields"][0]["element_type"], "std_logic_vector");
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn yaml_map() {
        let design = parse::parse(&Expanded::from_text(DESIGN, "map.xml"), None).unwrap();
        let mut analysis = Analysis::new(&design.registry);
        analysis.analyze(&design.top).unwrap();
        let artifact = render(&design, &analysis, Path::new("map.yaml")).unwrap();
        assert!(artifact.contents.contains("top.link[0]"));
        assert!(artifact.contents.contains("kind: status"));
    }
}
