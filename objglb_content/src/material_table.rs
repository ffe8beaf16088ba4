//! Parsing of Wavefront MTL files.
//!
//! Only the subset that is needed for the GLB materials is read:
//!
//! | Directive          | Effect                                  |
//! |--------------------|-----------------------------------------|
//! | `newmtl <name>`    | starts a new material with defaults     |
//! | `Ka`, `Kd`, `Ks`   | ambient, diffuse and specular color     |
//! | `Ns`               | shininess                               |
//! | `d`                | transparency (1.0 is opaque)            |
//! | `Tr`               | inverted transparency (`1.0 - value`)   |
//! | `map_Kd`           | diffuse texture                         |
//! | `map_Bump`, `bump` | normal texture                          |
//! | `map_Ks`           | specular texture                        |
//! | `map_Ka`           | ambient texture                         |
//!
//! Everything else is ignored. Malformed values never abort the parse.

use std::{collections::BTreeMap, fmt, fs, path::Path};

use objglb_shared::nalgebra::Vector3;

use crate::{
    color::{parse_color, ColorTriple},
    common::split_command,
    observer::{Event, Observer},
};

/// Name of the material that is used when a model doesn't provide any.
pub const DEFAULT_MATERIAL_NAME: &str = "default";

/// Channel of a material that references an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TextureSlot {
    Diffuse,
    Normal,
    Specular,
    Ambient,
}

impl TextureSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextureSlot::Diffuse => "diffuse",
            TextureSlot::Normal => "normal",
            TextureSlot::Specular => "specular",
            TextureSlot::Ambient => "ambient",
        }
    }
}

impl fmt::Display for TextureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Surface properties of a single named material.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialProperties {
    pub ambient: ColorTriple,
    pub diffuse: ColorTriple,
    pub specular: ColorTriple,
    pub shininess: f32,
    /// Opacity in [0, 1] where 1.0 is fully opaque.
    pub transparency: f32,
    /// Texture references exactly as they are written in the MTL file.
    pub textures: BTreeMap<TextureSlot, String>,
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self {
            ambient: Vector3::new(0.2, 0.2, 0.2),
            diffuse: Vector3::new(0.8, 0.8, 0.8),
            specular: Vector3::new(1.0, 1.0, 1.0),
            shininess: 32.0,
            transparency: 1.0,
            textures: BTreeMap::new(),
        }
    }
}

/// Materials by name in the order in which they first appeared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialTable {
    entries: Vec<(String, MaterialProperties)>,
}

impl MaterialTable {
    /// Table that only contains the [`DEFAULT_MATERIAL_NAME`] material.
    pub fn with_default_material() -> Self {
        let mut table = Self::default();
        table.insert(DEFAULT_MATERIAL_NAME, MaterialProperties::default());
        table
    }

    /// Reads and parses the MTL file at `path`.
    ///
    /// A missing or unreadable file results in an empty table. The caller decides what to do
    /// in that case.
    pub fn parse(path: impl AsRef<Path>, observer: &dyn Observer) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            observer.notify(Event::MaterialFileMissing(path.to_owned()));
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(contents) => {
                let table = Self::parse_str(&contents);
                observer.notify(Event::MaterialsParsed {
                    path: path.to_owned(),
                    count: table.len(),
                });
                table
            }
            Err(err) => {
                observer.notify(Event::MaterialFileUnreadable {
                    path: path.to_owned(),
                    message: err.to_string(),
                });
                Self::default()
            }
        }
    }

    /// Parses the contents of an MTL file.
    ///
    /// # Example
    ///
    /// ```
    /// use objglb_content::material_table::MaterialTable;
    /// let table = MaterialTable::parse_str("newmtl Wood\nNs 96.0\n");
    /// assert_eq!(table.get("Wood").unwrap().shininess, 96.0);
    /// ```
    pub fn parse_str(contents: &str) -> Self {
        let mut table = Self::default();
        let mut current: Option<(String, MaterialProperties)> = None;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (command, value) = split_command(line);

            if command == "newmtl" {
                if let Some((name, properties)) = current.take() {
                    table.insert(name, properties);
                }
                if !value.is_empty() {
                    current = Some((value.to_owned(), MaterialProperties::default()));
                }
                continue;
            }

            // Directives before the first valid `newmtl` are dropped.
            let Some((_, material)) = current.as_mut() else {
                continue;
            };

            match command {
                "Ka" => material.ambient = parse_color(value),
                "Kd" => material.diffuse = parse_color(value),
                "Ks" => material.specular = parse_color(value),
                "Ns" => {
                    if let Ok(shininess) = value.parse() {
                        material.shininess = shininess;
                    }
                }
                "d" => {
                    if let Ok(dissolve) = value.parse() {
                        material.transparency = dissolve;
                    }
                }
                "Tr" => {
                    if let Ok(transparency) = value.parse::<f32>() {
                        material.transparency = 1.0 - transparency;
                    }
                }
                "map_Kd" => set_texture(material, TextureSlot::Diffuse, value),
                "map_Bump" | "bump" => set_texture(material, TextureSlot::Normal, value),
                "map_Ks" => set_texture(material, TextureSlot::Specular, value),
                "map_Ka" => set_texture(material, TextureSlot::Ambient, value),
                _ => {}
            }
        }

        if let Some((name, properties)) = current {
            table.insert(name, properties);
        }
        table
    }

    /// Inserts a material. A material with the same name is replaced but keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, properties: MaterialProperties) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = properties,
            None => self.entries.push((name, properties)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&MaterialProperties> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, properties)| properties)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the materials in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MaterialProperties)> {
        self.entries.iter().map(|(name, properties)| (name.as_str(), properties))
    }
}

/// Empty references are ignored.
fn set_texture(material: &mut MaterialProperties, slot: TextureSlot, reference: &str) {
    if !reference.is_empty() {
        material.textures.insert(slot, reference.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use objglb_shared::{crossbeam_channel, float_cmp::assert_approx_eq};
    use tempdir::TempDir;

    use super::*;

    const TWO_MATERIALS: &str = "
# Test MTL file
newmtl Material1
Ka 0.2 0.2 0.2
Kd 0.8 0.0 0.0
Ks 1.0 1.0 1.0
Ns 96.0
d 1.0

newmtl Material2
Ka 0.1 0.1 0.1
Kd 0.0 0.8 0.0
Ks 0.5 0.5 0.5
Ns 32.0
";

    #[test]
    fn two_materials() {
        let table = MaterialTable::parse_str(TWO_MATERIALS);
        assert_eq!(table.len(), 2);
        let names = table.iter().map(|(name, _)| name).collect::<Vec<_>>();
        assert_eq!(names, vec!["Material1", "Material2"]);

        let material1 = table.get("Material1").unwrap();
        assert_eq!(material1.diffuse, Vector3::new(0.8, 0.0, 0.0));
        assert_eq!(material1.shininess, 96.0);

        let material2 = table.get("Material2").unwrap();
        assert_eq!(material2.diffuse, Vector3::new(0.0, 0.8, 0.0));
        assert_eq!(material2.shininess, 32.0);
        assert_eq!(material2.transparency, 1.0);
    }

    #[test]
    fn diffuse_round_trips_exactly() {
        for (r, g, b) in [(0.1f32, 0.2f32, 0.3f32), (1.0, 0.0, 0.5), (0.123456, 0.654321, 0.999999)] {
            let table = MaterialTable::parse_str(&format!("newmtl M\nKd {r} {g} {b}\n"));
            assert_eq!(table.get("M").unwrap().diffuse, Vector3::new(r, g, b));
        }
    }

    #[test]
    fn defaults() {
        let table = MaterialTable::parse_str("newmtl Empty");
        assert_eq!(table.get("Empty").unwrap(), &MaterialProperties::default());
        let defaults = MaterialProperties::default();
        assert_eq!(defaults.ambient, Vector3::new(0.2, 0.2, 0.2));
        assert_eq!(defaults.specular, Vector3::new(1.0, 1.0, 1.0));
        assert!(defaults.textures.is_empty());
    }

    #[test]
    fn duplicate_material_is_replaced() {
        let table = MaterialTable::parse_str("newmtl Foo\nKd 1 0 0\nNs 10\nnewmtl Bar\nnewmtl Foo\nKd 0 0 1\n");
        assert_eq!(table.len(), 2);
        let foo = table.get("Foo").unwrap();
        assert_eq!(foo.diffuse, Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(foo.shininess, 32.0);
        assert_eq!(table.iter().next().unwrap().0, "Foo");
    }

    #[test]
    fn directives_before_newmtl_are_dropped() {
        let table = MaterialTable::parse_str("Kd 1 0 0\nNs 500\nnewmtl M\n");
        assert_eq!(table.get("M").unwrap(), &MaterialProperties::default());
    }

    #[test]
    fn newmtl_without_name_clears_the_current_material() {
        let table = MaterialTable::parse_str("newmtl A\nKd 1 0 0\nnewmtl\nKd 0 1 0\nnewmtl B\n");
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("A").unwrap().diffuse, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(table.get("B").unwrap(), &MaterialProperties::default());
    }

    #[test]
    fn tr_and_d_are_equivalent() {
        let tr = MaterialTable::parse_str("newmtl M\nTr 0.3\n");
        let d = MaterialTable::parse_str("newmtl M\nd 0.7\n");
        assert_approx_eq!(f32, tr.get("M").unwrap().transparency, 0.7, epsilon = 1e-6);
        assert_approx_eq!(f32, d.get("M").unwrap().transparency, 0.7, epsilon = 1e-6);
    }

    #[test]
    fn malformed_numbers_keep_previous_values() {
        let table = MaterialTable::parse_str("newmtl M\nNs 12\nNs shiny\nd 0.5\nd\nTr opaque\nKd nope\n");
        let material = table.get("M").unwrap();
        assert_eq!(material.shininess, 12.0);
        assert_eq!(material.transparency, 0.5);
        assert_eq!(material.diffuse, Vector3::new(0.8, 0.8, 0.8));
    }

    #[test]
    fn textures() {
        let table = MaterialTable::parse_str(
            "newmtl T\nmap_Kd textures/wood diffuse.png\nmap_Bump normal.png\nbump bump.png\nmap_Ks  spec.jpg \nmap_Ka ao.png\nmap_Ke emission.png\n",
        );
        let textures = &table.get("T").unwrap().textures;
        assert_eq!(textures.len(), 4);
        assert_eq!(textures[&TextureSlot::Diffuse], "textures/wood diffuse.png");
        assert_eq!(textures[&TextureSlot::Normal], "bump.png");
        assert_eq!(textures[&TextureSlot::Specular], "spec.jpg");
        assert_eq!(textures[&TextureSlot::Ambient], "ao.png");
    }

    #[test]
    fn material_names_may_contain_spaces() {
        let table = MaterialTable::parse_str("newmtl Oak   Veneer\nKd 0.5\n");
        assert!(table.contains("Oak   Veneer"));
    }

    #[test]
    fn missing_file() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let table = MaterialTable::parse("does/not/exist.mtl", &sender);
        assert!(table.is_empty());
        assert_eq!(
            receiver.try_recv().unwrap(),
            Event::MaterialFileMissing("does/not/exist.mtl".into())
        );
    }

    #[test]
    fn unreadable_file_yields_empty_table() {
        let root = TempDir::new("material_table").unwrap();
        let path = root.path().join("binary.mtl");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x9f]).unwrap();
        let (sender, receiver) = crossbeam_channel::unbounded();
        let table = MaterialTable::parse(&path, &sender);
        assert!(table.is_empty());
        assert!(matches!(receiver.try_recv().unwrap(), Event::MaterialFileUnreadable { .. }));
    }

    #[test]
    fn parse_file() {
        let root = TempDir::new("material_table").unwrap();
        let path = root.path().join("test.mtl");
        fs::write(&path, TWO_MATERIALS).unwrap();
        let (sender, receiver) = crossbeam_channel::unbounded();
        let table = MaterialTable::parse(&path, &sender);
        assert_eq!(table.len(), 2);
        assert_eq!(receiver.try_recv().unwrap(), Event::MaterialsParsed { path, count: 2 });
    }
}
