//! Material resolver.
//!
//! Builds target materials from the source material table and picks the
//! material of each object from its material source mode. Materials are
//! keyed by name; an existing material is reused unless the pass forces a
//! reload. Every material touched by a pass stays keep-alive until
//! [`MaterialTable::release`].

use std::collections::HashMap;

use io3dm_math::Vec4;

use crate::host::{Overwrite, SceneHost};
use crate::options::{DisplacementMethod, ImportOptions};
use crate::scene::{Material, MaterialId, Resource};
use crate::source::{MaterialSource, SourceFile, SourceMaterial, SourceObject, BLACK};

/// Name of the synthetic fallback material.
pub const DEFAULT_MATERIAL_NAME: &str = "RhinoDefault";

/// A target material together with the name it was resolved under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedMaterial {
    pub id: MaterialId,
    pub name: String,
}

/// Base color of a source material, with alpha = 1 - transparency.
///
/// A pure black diffuse color counts as unset: reflective materials fall
/// back to the reflection color, transparent ones to the transparent color.
pub fn base_color(material: &SourceMaterial) -> Vec4 {
    let black = material.diffuse_color == BLACK;
    let reflective = material.reflectivity > 0.0;
    let transparent = material.transparency > 0.0;

    let [r, g, b, _] = if black && reflective && !transparent {
        material.reflection_color
    } else if black && transparent {
        material.transparent_color
    } else {
        material.diffuse_color
    };

    Vec4::new(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        1.0 - material.transparency as f32,
    )
}

/// Per-pass material table.
#[derive(Debug)]
pub struct MaterialTable {
    enabled: bool,
    force: bool,
    displacement: DisplacementMethod,
    /// Resolved material per source table index
    indexed: Vec<Option<ResolvedMaterial>>,
    /// Materials created or reused this pass, by name
    by_name: HashMap<String, ResolvedMaterial>,
}

impl MaterialTable {
    pub fn new(options: &ImportOptions) -> Self {
        Self {
            enabled: options.filter_materials,
            force: options.force_reload,
            displacement: options.material_displacement,
            indexed: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Import every material of the file. Returns the number of entries.
    pub fn import(&mut self, host: &mut dyn SceneHost, file: &SourceFile) -> usize {
        if !self.enabled {
            return 0;
        }
        self.indexed = file
            .materials()
            .iter()
            .map(|material| {
                (!material.name.is_empty())
                    .then(|| self.obtain(host, material.name.as_str(), Some(material)))
            })
            .collect();
        self.indexed.len()
    }

    /// Number of distinct materials touched so far.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// The default material, created on first use.
    pub fn default_material(&mut self, host: &mut dyn SceneHost) -> ResolvedMaterial {
        self.obtain(host, DEFAULT_MATERIAL_NAME, None)
    }

    /// Material at a source table index. Unknown indices and unnamed
    /// materials resolve to the default material.
    pub fn by_index(&mut self, host: &mut dyn SceneHost, index: i32) -> ResolvedMaterial {
        let entry = usize::try_from(index)
            .ok()
            .and_then(|i| self.indexed.get(i))
            .cloned()
            .flatten();
        match entry {
            Some(resolved) => resolved,
            None => self.default_material(host),
        }
    }

    /// Material of `object`, or `None` when materials are disabled.
    ///
    /// `inherited` is the material of the enclosing block placement, used
    /// by objects that take their material from the parent.
    pub fn resolve(
        &mut self,
        host: &mut dyn SceneHost,
        object: &SourceObject,
        file: &SourceFile,
        inherited: Option<&ResolvedMaterial>,
    ) -> Option<ResolvedMaterial> {
        if !self.enabled {
            return None;
        }
        let attributes = &object.attributes;
        let resolved = match attributes.material_source {
            MaterialSource::FromObject => self.by_index(host, attributes.material_index),
            MaterialSource::FromLayer => match file.layer(attributes.layer_index) {
                Some(layer) => self.by_index(host, layer.render_material_index),
                None => self.default_material(host),
            },
            MaterialSource::FromParent => match inherited {
                Some(material) => material.clone(),
                None => {
                    log::warn!(
                        "Object {} takes its material from a parent but nothing is inherited",
                        attributes.id
                    );
                    self.default_material(host)
                }
            },
        };
        Some(resolved)
    }

    /// Clear the keep-alive flag of every material touched this pass.
    pub fn release(&self, host: &mut dyn SceneHost) {
        for resolved in self.by_name.values() {
            host.set_keep_alive(Resource::Material(resolved.id), false);
        }
    }

    fn obtain(
        &mut self,
        host: &mut dyn SceneHost,
        name: &str,
        source: Option<&SourceMaterial>,
    ) -> ResolvedMaterial {
        if let Some(resolved) = self.by_name.get(name) {
            return resolved.clone();
        }

        let id = match host.find_material(name) {
            Some(existing) if !self.force => existing,
            _ => {
                let overwrite = if self.force {
                    Overwrite::Replace
                } else {
                    Overwrite::Keep
                };
                let id = host.get_or_create_material(name, overwrite);
                if let Some(material) = host.material_mut(id) {
                    *material = match source {
                        Some(source) => Material {
                            base_color: base_color(source),
                            displacement: self.displacement,
                            source_id: source.id,
                        },
                        None => Material {
                            displacement: self.displacement,
                            ..Default::default()
                        },
                    };
                }
                log::debug!("Created material '{}'", name);
                id
            }
        };

        host.set_keep_alive(Resource::Material(id), true);
        let resolved = ResolvedMaterial {
            id,
            name: name.to_string(),
        };
        self.by_name.insert(name.to_string(), resolved.clone());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::host::MemoryHost;
    use crate::source::{Geometry, ObjectAttributes, Settings, SourceLayer};

    fn material(diffuse: [u8; 4], reflectivity: f64, transparency: f64) -> SourceMaterial {
        SourceMaterial {
            name: "Test".into(),
            diffuse_color: diffuse,
            reflection_color: [0, 255, 0, 255],
            transparent_color: [0, 0, 255, 255],
            reflectivity,
            transparency,
            ..Default::default()
        }
    }

    fn assert_color(actual: Vec4, expected: Vec4) {
        assert!((actual - expected).length() < 0.001, "{actual:?} != {expected:?}");
    }

    #[test]
    fn test_color_fallback_reflective() {
        let color = base_color(&material([0, 0, 0, 255], 0.5, 0.0));
        assert_color(color, Vec4::new(0.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn test_color_fallback_transparent() {
        let color = base_color(&material([0, 0, 0, 255], 0.0, 0.5));
        assert_color(color, Vec4::new(0.0, 0.0, 1.0, 0.5));

        let both = base_color(&material([0, 0, 0, 255], 0.5, 0.25));
        assert_color(both, Vec4::new(0.0, 0.0, 1.0, 0.75));
    }

    #[test]
    fn test_color_uses_diffuse() {
        let color = base_color(&material([10, 20, 30, 255], 0.5, 0.0));
        assert_color(color, Vec4::new(10.0 / 255.0, 20.0 / 255.0, 30.0 / 255.0, 1.0));

        // black with nothing else set stays black
        let black = base_color(&material([0, 0, 0, 255], 0.0, 0.0));
        assert_color(black, Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    fn file() -> SourceFile {
        let mut file = SourceFile::new(Settings::default());
        file.add_material(SourceMaterial {
            name: "Red".into(),
            diffuse_color: [255, 0, 0, 255],
            ..Default::default()
        });
        file.add_material(SourceMaterial::default());
        file.add_layer(SourceLayer {
            id: Uuid::from_u128(1),
            name: "Default".into(),
            render_material_index: 0,
            ..Default::default()
        });
        file
    }

    fn object(source: MaterialSource, index: i32) -> SourceObject {
        SourceObject::new(
            Geometry::Unsupported { kind: "Point".into() },
            ObjectAttributes {
                material_source: source,
                material_index: index,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_resolve_modes() {
        let mut host = MemoryHost::default();
        let file = file();
        let mut table = MaterialTable::new(&ImportOptions::default());
        assert_eq!(table.import(&mut host, &file), 2);

        let from_object = table
            .resolve(&mut host, &object(MaterialSource::FromObject, 0), &file, None)
            .unwrap();
        assert_eq!(from_object.name, "Red");

        let from_layer = table
            .resolve(&mut host, &object(MaterialSource::FromLayer, -1), &file, None)
            .unwrap();
        assert_eq!(from_layer, from_object);

        let unnamed = table
            .resolve(&mut host, &object(MaterialSource::FromObject, 1), &file, None)
            .unwrap();
        assert_eq!(unnamed.name, DEFAULT_MATERIAL_NAME);

        let out_of_range = table
            .resolve(&mut host, &object(MaterialSource::FromObject, 42), &file, None)
            .unwrap();
        assert_eq!(out_of_range.name, DEFAULT_MATERIAL_NAME);
    }

    #[test]
    fn test_from_parent() {
        let mut host = MemoryHost::default();
        let file = file();
        let mut table = MaterialTable::new(&ImportOptions::default());
        table.import(&mut host, &file);

        let red = table.by_index(&mut host, 0);
        let inherited = table
            .resolve(&mut host, &object(MaterialSource::FromParent, -1), &file, Some(&red))
            .unwrap();
        assert_eq!(inherited, red);

        let orphan = table
            .resolve(&mut host, &object(MaterialSource::FromParent, -1), &file, None)
            .unwrap();
        assert_eq!(orphan.name, DEFAULT_MATERIAL_NAME);
        let default = host.material(orphan.id).unwrap();
        assert_color(default.base_color, Vec4::ONE);
    }

    #[test]
    fn test_default_material_is_created_once() {
        let mut host = MemoryHost::default();
        let mut table = MaterialTable::new(&ImportOptions::default());
        let a = table.default_material(&mut host);
        let b = table.default_material(&mut host);
        assert_eq!(a, b);
        assert_eq!(host.material_count(), 1);
    }

    #[test]
    fn test_existing_material_is_reused() {
        let mut host = MemoryHost::default();
        let file = file();

        let mut first = MaterialTable::new(&ImportOptions::default());
        first.import(&mut host, &file);
        let red = first.by_index(&mut host, 0);

        let mut second = MaterialTable::new(&ImportOptions::default());
        second.import(&mut host, &file);
        assert_eq!(second.by_index(&mut host, 0), red);

        let forced = ImportOptions {
            force_reload: true,
            ..Default::default()
        };
        let mut third = MaterialTable::new(&forced);
        third.import(&mut host, &file);
        assert_ne!(third.by_index(&mut host, 0).id, red.id);
        assert_eq!(host.material_count(), 1);
    }

    #[test]
    fn test_disabled_materials() {
        let mut host = MemoryHost::default();
        let file = file();
        let options = ImportOptions {
            filter_materials: false,
            ..Default::default()
        };
        let mut table = MaterialTable::new(&options);
        assert_eq!(table.import(&mut host, &file), 0);
        assert!(table
            .resolve(&mut host, &object(MaterialSource::FromObject, 0), &file, None)
            .is_none());
        assert_eq!(host.material_count(), 0);
    }

    #[test]
    fn test_release_allows_purge() {
        let mut host = MemoryHost::default();
        let file = file();
        let mut table = MaterialTable::new(&ImportOptions::default());
        table.import(&mut host, &file);

        assert_eq!(host.purge_orphans(), 0);
        table.release(&mut host);
        assert_eq!(host.purge_orphans(), 1);
    }
}
