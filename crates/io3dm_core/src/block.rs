//! Block/instance resolver.
//!
//! Instance definitions are resolved lazily, the first time a placement
//! needs them. A definition whose members take their material from the
//! parent is built once per inherited material; every other definition is
//! built once per pass. While a definition's members are expanded its id is
//! marked as resolving, and meeting it again means the member graph has a
//! cycle.
//!
//! Two strategies are supported:
//!
//! - **Collection instance**: a definition becomes a container under the
//!   project's block container, holding its member objects and inner
//!   instances. Placements are lightweight instance objects.
//! - **Single mesh**: a definition becomes one mesh shared by all of its
//!   placements. Merging is deferred: resolution only queues the members,
//!   and [`BlockResolver::populate`] joins every queue once all objects
//!   exist, nested definitions first.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use io3dm_math::{xform_to_mat4, Mat4};

use crate::convert::{convert, Converted};
use crate::host::{Overwrite, SceneHost};
use crate::import::{create_object, BuildContext, ImportError, ImportResult};
use crate::material::ResolvedMaterial;
use crate::mesh::Mesh;
use crate::options::{BlockInstancing, MeshFaceMode};
use crate::scene::{ContainerId, MeshId, ObjectData, ObjectId};
use crate::source::{
    Geometry, MaterialSource, SourceFile, SourceInstanceDefinition, SourceObject,
};

/// Target representation of a resolved definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Definition {
    /// Container instanced by placements
    Container(ContainerId),
    /// Merged mesh shared by placements
    Mesh(MeshId),
}

impl Definition {
    fn object_data(self) -> ObjectData {
        match self {
            Definition::Container(id) => ObjectData::Instance(id),
            Definition::Mesh(id) => ObjectData::Mesh(id),
        }
    }
}

/// Cache key of a built definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct DefinitionKey {
    id: Uuid,
    /// Inherited material name, only set when a member takes the parent's
    material: Option<String>,
}

impl DefinitionKey {
    fn new(
        file: &SourceFile,
        source: &SourceInstanceDefinition,
        material: Option<&ResolvedMaterial>,
    ) -> Self {
        let inherits = source
            .object_ids
            .iter()
            .filter_map(|id| file.find_object(*id))
            .any(|member| member.attributes.material_source == MaterialSource::FromParent);
        Self {
            id: source.id,
            material: material.filter(|_| inherits).map(|m| m.name.clone()),
        }
    }

    /// `name`, suffixed with the inherited material for material variants.
    fn variant(&self, name: &str) -> String {
        match &self.material {
            Some(material) => format!("{}.{}", name, material),
            None => name.to_string(),
        }
    }
}

/// Pending joins of one single-mesh definition.
#[derive(Debug, Default)]
struct MergeQueue {
    /// Nested definition meshes with their placement in definition space
    nested: Vec<(MeshId, Mat4)>,
    /// Converted member meshes, already in definition space
    direct: Vec<Mesh>,
}

/// Resolves instance definitions for one import pass.
#[derive(Debug)]
pub struct BlockResolver {
    strategy: BlockInstancing,
    /// Parent of definition containers
    blocks: ContainerId,
    resolved: HashMap<DefinitionKey, Definition>,
    resolving: HashSet<Uuid>,
    queues: HashMap<DefinitionKey, MergeQueue>,
    /// Definitions in the order they finished resolving (nested first)
    order: Vec<DefinitionKey>,
}

impl BlockResolver {
    pub fn new(strategy: BlockInstancing, blocks: ContainerId) -> Self {
        Self {
            strategy,
            blocks,
            resolved: HashMap::new(),
            resolving: HashSet::new(),
            queues: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Number of definitions built so far, counting material variants.
    pub fn resolved_count(&self) -> usize {
        self.order.len()
    }

    /// Create the placement object for an instance reference.
    ///
    /// `material` is the reference's own resolved material; members that
    /// take their material from the parent receive it. Returns `None` for
    /// references to unknown definitions.
    pub fn place(
        &mut self,
        host: &mut dyn SceneHost,
        ctx: &mut BuildContext<'_>,
        reference: &SourceObject,
        material: Option<&ResolvedMaterial>,
        name: &str,
    ) -> ImportResult<Option<ObjectId>> {
        let Geometry::InstanceReference {
            definition_id,
            xform,
        } = &reference.geometry
        else {
            return Ok(None);
        };

        let Some(definition) = self.resolve(host, ctx, *definition_id, material)? else {
            return Ok(None);
        };

        let id = host.get_or_create_object(name, definition.object_data(), Overwrite::Rename);
        if let Some(object) = host.object_mut(id) {
            object.data = definition.object_data();
            object.matrix_world = xform_to_mat4(xform, ctx.unit_scale);
        }
        ctx.report.instances_placed += 1;
        Ok(Some(id))
    }

    /// Resolve a definition for an inherited material, building it on first use.
    fn resolve<'f>(
        &mut self,
        host: &mut dyn SceneHost,
        ctx: &mut BuildContext<'f>,
        id: Uuid,
        material: Option<&ResolvedMaterial>,
    ) -> ImportResult<Option<Definition>> {
        if self.resolving.contains(&id) {
            return Err(ImportError::BlockCycle(id));
        }

        let file: &'f SourceFile = ctx.file;
        let Some(source) = file.find_definition(id) else {
            log::warn!("Instance reference to unknown definition {}", id);
            return Ok(None);
        };

        let key = DefinitionKey::new(file, source, material);
        if let Some(definition) = self.resolved.get(&key) {
            return Ok(Some(*definition));
        }

        self.resolving.insert(id);
        let built = match self.strategy {
            BlockInstancing::CollectionInstance => {
                self.build_container(host, ctx, source, &key, material)
            }
            BlockInstancing::SingleMesh => self.build_mesh(host, ctx, source, &key, material),
        };
        self.resolving.remove(&id);
        let definition = built?;

        log::debug!("Resolved definition '{}'", key.variant(&source.name));
        self.resolved.insert(key.clone(), definition);
        self.order.push(key);
        ctx.report.definitions_resolved += 1;
        Ok(Some(definition))
    }

    fn members<'f>(
        ctx: &BuildContext<'f>,
        source: &'f SourceInstanceDefinition,
    ) -> impl Iterator<Item = &'f SourceObject> + 'f {
        let file = ctx.file;
        source.object_ids.iter().filter_map(move |id| {
            let member = file.find_object(*id);
            if member.is_none() {
                log::warn!("Definition '{}' lists unknown member {}", source.name, id);
            }
            member
        })
    }

    fn build_container<'f>(
        &mut self,
        host: &mut dyn SceneHost,
        ctx: &mut BuildContext<'f>,
        source: &'f SourceInstanceDefinition,
        key: &DefinitionKey,
        material: Option<&ResolvedMaterial>,
    ) -> ImportResult<Definition> {
        let container =
            host.get_or_create_container(&ctx.name(&key.variant(&source.name)), Overwrite::Rename);
        host.link_container(self.blocks, container);

        for member in Self::members(ctx, source) {
            let name = key.variant(&ctx.object_name(member.id()));
            let object = match &member.geometry {
                Geometry::Curve { .. } if !ctx.options.filter_curves => None,
                Geometry::Unsupported { kind } => {
                    log::debug!("Skipping unsupported {} in '{}'", kind, source.name);
                    None
                }
                Geometry::InstanceReference { .. } => {
                    let member_material = ctx.materials.resolve(host, member, ctx.file, material);
                    self.place(host, ctx, member, member_material.as_ref(), &name)?
                }
                _ => {
                    let member_material = ctx.materials.resolve(host, member, ctx.file, material);
                    create_object(host, ctx, member, member_material.as_ref(), &name)
                }
            };
            if let Some(object) = object {
                host.link_object(container, object);
            }
        }

        Ok(Definition::Container(container))
    }

    fn build_mesh<'f>(
        &mut self,
        host: &mut dyn SceneHost,
        ctx: &mut BuildContext<'f>,
        source: &'f SourceInstanceDefinition,
        key: &DefinitionKey,
        material: Option<&ResolvedMaterial>,
    ) -> ImportResult<Definition> {
        let name = ctx.name(&key.variant(&source.name));
        let mesh = host.get_or_create_mesh(&name, Overwrite::Rename);
        let mut queue = MergeQueue::default();

        for member in Self::members(ctx, source) {
            match &member.geometry {
                Geometry::InstanceReference {
                    definition_id,
                    xform,
                } => {
                    let member_material = ctx.materials.resolve(host, member, ctx.file, material);
                    let nested = self.resolve(host, ctx, *definition_id, member_material.as_ref())?;
                    if let Some(Definition::Mesh(nested)) = nested {
                        queue
                            .nested
                            .push((nested, xform_to_mat4(xform, ctx.unit_scale)));
                    }
                }
                geometry if geometry.is_mesh_bearing() => {
                    let member_material = ctx.materials.resolve(host, member, ctx.file, material);
                    if let Some(Converted::Mesh(mut converted)) =
                        convert(geometry, ctx.unit_scale, ctx.options)
                    {
                        if let Some(member_material) = member_material {
                            converted.material_slot(member_material.id);
                        }
                        queue.direct.push(converted);
                    }
                }
                other => {
                    log::debug!(
                        "Skipping {:?} member of single-mesh block '{}'",
                        other.object_type(),
                        source.name
                    );
                }
            }
        }

        self.queues.insert(key.clone(), queue);
        Ok(Definition::Mesh(mesh))
    }

    /// Run the deferred joins of single-mesh definitions.
    ///
    /// Nested definitions are merged before the definitions that contain
    /// them, and within a definition nested blocks come before direct
    /// members. Returns the number of populated meshes.
    pub fn populate(&mut self, host: &mut dyn SceneHost, ctx: &BuildContext<'_>) -> usize {
        let weld = match ctx.options.mesh_face_mode {
            MeshFaceMode::Join => Some(ctx.options.mesh_join_threshold as f32),
            MeshFaceMode::Split => None,
        };

        let mut populated = 0;
        for key in &self.order {
            let Some(queue) = self.queues.remove(key) else {
                continue;
            };
            let Some(Definition::Mesh(target)) = self.resolved.get(key) else {
                continue;
            };

            let mut merged = Mesh::default();
            for (nested, matrix) in &queue.nested {
                if let Some(nested) = host.mesh(*nested) {
                    merged.append(nested, matrix);
                }
            }
            for member in &queue.direct {
                merged.append(member, &Mat4::IDENTITY);
            }
            if let Some(distance) = weld {
                merged.weld(distance);
            }
            merged.set_smooth(ctx.options.mesh_shading.is_smooth());

            log::debug!(
                "Merged {} nested and {} direct members into {} faces",
                queue.nested.len(),
                queue.direct.len(),
                merged.face_count()
            );
            if let Some(mesh) = host.mesh_mut(*target) {
                *mesh = merged;
            }
            populated += 1;
        }
        populated
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;

    use super::*;
    use crate::host::MemoryHost;
    use crate::options::ImportOptions;
    use crate::source::{MaterialSource, ObjectAttributes, Settings, SourceMaterial, SourceMesh};

    const IDENTITY: [f64; 16] = [
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    ];

    fn translation(x: f64) -> [f64; 16] {
        let mut xform = IDENTITY;
        xform[3] = x;
        xform
    }

    fn member(id: u128, geometry: Geometry, source: MaterialSource) -> SourceObject {
        SourceObject::new(
            geometry,
            ObjectAttributes {
                id: Uuid::from_u128(id),
                material_source: source,
                is_instance_definition_object: true,
                ..Default::default()
            },
        )
    }

    fn square() -> Geometry {
        Geometry::Mesh(SourceMesh::new(
            vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(1.0, 1.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2, 3]],
        ))
    }

    fn reference(id: u128, definition: u128, x: f64, source: MaterialSource) -> SourceObject {
        SourceObject::new(
            Geometry::InstanceReference {
                definition_id: Uuid::from_u128(definition),
                xform: translation(x),
            },
            ObjectAttributes {
                id: Uuid::from_u128(id),
                material_source: source,
                material_index: 0,
                ..Default::default()
            },
        )
    }

    /// Outer (100) holds a placement of Inner (200) and a direct square;
    /// Inner holds one square. Every member takes its material from the parent.
    fn nested_file() -> SourceFile {
        let mut file = SourceFile::new(Settings::default());
        file.add_material(SourceMaterial {
            name: "Red".into(),
            ..Default::default()
        });
        file.add_material(SourceMaterial {
            name: "Blue".into(),
            ..Default::default()
        });
        file.add_object(member(201, square(), MaterialSource::FromParent));
        file.add_instance_definition(SourceInstanceDefinition {
            id: Uuid::from_u128(200),
            name: "Inner".into(),
            object_ids: vec![Uuid::from_u128(201)],
        });

        let mut nested = reference(101, 200, 5.0, MaterialSource::FromParent);
        nested.attributes.is_instance_definition_object = true;
        file.add_object(nested);
        file.add_object(member(102, square(), MaterialSource::FromParent));
        file.add_instance_definition(SourceInstanceDefinition {
            id: Uuid::from_u128(100),
            name: "Outer".into(),
            object_ids: vec![Uuid::from_u128(101), Uuid::from_u128(102)],
        });
        file
    }

    #[test]
    fn test_single_mesh_block_expansion() {
        let file = nested_file();
        let options = ImportOptions::default();
        let mut ctx = BuildContext::new(&file, &options, "P");
        let mut host = MemoryHost::default();
        ctx.materials.import(&mut host, &file);
        let blocks = host.get_or_create_container("P#Blocks", Overwrite::Keep);
        let mut resolver = BlockResolver::new(BlockInstancing::SingleMesh, blocks);

        let placement = reference(1, 100, 10.0, MaterialSource::FromObject);
        let red = ctx.materials.resolve(&mut host, &placement, &file, None);
        let object = resolver
            .place(&mut host, &mut ctx, &placement, red.as_ref(), "P:placement")
            .unwrap()
            .unwrap();
        assert_eq!(resolver.populate(&mut host, &ctx), 2);
        assert_eq!(resolver.resolved_count(), 2);

        let target = host.object(object).unwrap();
        assert!((target.matrix_world.w_axis.x - 10.0).abs() < 0.001);
        let ObjectData::Mesh(mesh) = target.data else {
            panic!("expected mesh data");
        };
        let mesh = host.mesh(mesh).unwrap();
        // one square from each level
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.vertex_count(), 8);
        // the nested square sits at its placement
        assert!((mesh.bounds.max.x - 6.0).abs() < 0.001);
        // Red passed through two FromParent levels
        let red = host.find_material("Red").unwrap();
        assert_eq!(mesh.materials, vec![red]);
        assert_eq!(mesh.smooth, vec![true, true]);
    }

    #[test]
    fn test_inherited_material_builds_a_variant_per_material() {
        let file = nested_file();
        let options = ImportOptions::default();
        let mut ctx = BuildContext::new(&file, &options, "P");
        let mut host = MemoryHost::default();
        ctx.materials.import(&mut host, &file);
        let blocks = host.get_or_create_container("P#Blocks", Overwrite::Keep);
        let mut resolver = BlockResolver::new(BlockInstancing::SingleMesh, blocks);

        let red_placement = reference(1, 100, 0.0, MaterialSource::FromObject);
        let mut blue_placement = reference(2, 100, 3.0, MaterialSource::FromObject);
        blue_placement.attributes.material_index = 1;
        let red_again = reference(3, 100, 6.0, MaterialSource::FromObject);

        let mut placed = Vec::new();
        for placement in [&red_placement, &blue_placement, &red_again] {
            let material = ctx.materials.resolve(&mut host, placement, &file, None);
            let name = format!("P:{}", placement.id());
            let object = resolver
                .place(&mut host, &mut ctx, placement, material.as_ref(), &name)
                .unwrap()
                .unwrap();
            placed.push(host.object(object).unwrap().data);
        }
        // Outer and Inner, once for Red and once for Blue
        assert_eq!(resolver.resolved_count(), 4);
        assert_eq!(resolver.populate(&mut host, &ctx), 4);

        assert_eq!(placed[0], placed[2]);
        assert_ne!(placed[0], placed[1]);

        let materials = |data: ObjectData| {
            let ObjectData::Mesh(mesh) = data else {
                panic!("expected mesh data");
            };
            host.mesh(mesh).unwrap().materials.clone()
        };
        let red = host.find_material("Red").unwrap();
        let blue = host.find_material("Blue").unwrap();
        assert_eq!(materials(placed[0]), vec![red]);
        assert_eq!(materials(placed[1]), vec![blue]);
        assert!(host.find_mesh("P:Outer.Blue").is_some());
        assert!(host.find_mesh("P:Inner.Red").is_some());
    }

    #[test]
    fn test_flat_shading_on_merged_mesh() {
        let file = nested_file();
        let options = ImportOptions {
            mesh_shading: crate::options::MeshShading::Flat,
            ..Default::default()
        };
        let mut ctx = BuildContext::new(&file, &options, "P");
        let mut host = MemoryHost::default();
        let blocks = host.get_or_create_container("P#Blocks", Overwrite::Keep);
        let mut resolver = BlockResolver::new(BlockInstancing::SingleMesh, blocks);

        let placement = reference(1, 100, 0.0, MaterialSource::FromLayer);
        let object = resolver
            .place(&mut host, &mut ctx, &placement, None, "P:placement")
            .unwrap()
            .unwrap();
        resolver.populate(&mut host, &ctx);

        let Some(ObjectData::Mesh(mesh)) = host.object(object).map(|o| o.data) else {
            panic!("expected mesh data");
        };
        assert_eq!(host.mesh(mesh).unwrap().smooth, vec![false, false]);
    }

    #[test]
    fn test_definition_is_built_once() {
        let file = nested_file();
        let options = ImportOptions::default();
        let mut ctx = BuildContext::new(&file, &options, "P");
        let mut host = MemoryHost::default();
        let blocks = host.get_or_create_container("P#Blocks", Overwrite::Keep);
        let mut resolver = BlockResolver::new(BlockInstancing::SingleMesh, blocks);

        let a = reference(1, 200, 0.0, MaterialSource::FromLayer);
        let b = reference(2, 200, 3.0, MaterialSource::FromLayer);
        let a = resolver.place(&mut host, &mut ctx, &a, None, "P:a").unwrap().unwrap();
        let b = resolver.place(&mut host, &mut ctx, &b, None, "P:b").unwrap().unwrap();

        assert_eq!(resolver.resolved_count(), 1);
        assert_eq!(ctx.report.instances_placed, 2);
        assert_eq!(
            host.object(a).map(|o| o.data),
            host.object(b).map(|o| o.data)
        );
        assert_eq!(host.mesh_count(), 1);
    }

    #[test]
    fn test_collection_instance_strategy() {
        let file = nested_file();
        let options = ImportOptions {
            block_instancing: BlockInstancing::CollectionInstance,
            ..Default::default()
        };
        let mut ctx = BuildContext::new(&file, &options, "P");
        let mut host = MemoryHost::default();
        let blocks = host.get_or_create_container("P#Blocks", Overwrite::Keep);
        let mut resolver = BlockResolver::new(BlockInstancing::CollectionInstance, blocks);

        let placement = reference(1, 100, 0.0, MaterialSource::FromLayer);
        let object = resolver
            .place(&mut host, &mut ctx, &placement, None, "P:placement")
            .unwrap()
            .unwrap();
        assert_eq!(resolver.populate(&mut host, &ctx), 0);

        let Some(ObjectData::Instance(outer)) = host.object(object).map(|o| o.data) else {
            panic!("expected an instance");
        };
        let outer_container = host.container(outer).unwrap();
        // one inner instance and one mesh object
        assert_eq!(outer_container.objects.len(), 2);

        let blocks = host.container(blocks).unwrap();
        assert_eq!(blocks.children.len(), 2);
        assert_eq!(host.find_container("P:Outer"), Some(outer));
    }

    #[test]
    fn test_collection_variants_keep_their_members() {
        let file = nested_file();
        let options = ImportOptions {
            block_instancing: BlockInstancing::CollectionInstance,
            ..Default::default()
        };
        let mut ctx = BuildContext::new(&file, &options, "P");
        let mut host = MemoryHost::default();
        ctx.materials.import(&mut host, &file);
        let blocks = host.get_or_create_container("P#Blocks", Overwrite::Keep);
        let mut resolver = BlockResolver::new(BlockInstancing::CollectionInstance, blocks);

        let red_placement = reference(1, 100, 0.0, MaterialSource::FromObject);
        let mut blue_placement = reference(2, 100, 0.0, MaterialSource::FromObject);
        blue_placement.attributes.material_index = 1;
        for (placement, name) in [(&red_placement, "P:red"), (&blue_placement, "P:blue")] {
            let material = ctx.materials.resolve(&mut host, placement, &file, None);
            resolver
                .place(&mut host, &mut ctx, placement, material.as_ref(), name)
                .unwrap()
                .unwrap();
        }

        let red = host.find_container("P:Outer.Red").unwrap();
        let blue = host.find_container("P:Outer.Blue").unwrap();
        assert_eq!(host.container(red).unwrap().objects.len(), 2);
        assert_eq!(host.container(blue).unwrap().objects.len(), 2);
        assert_eq!(host.container(blocks).unwrap().children.len(), 4);

        let square = host
            .find_object(&format!("P:{}.Blue", Uuid::from_u128(102)))
            .unwrap();
        assert!(host.container(blue).unwrap().objects.contains(&square));
    }

    #[test]
    fn test_block_cycle_is_an_error() {
        let mut file = SourceFile::new(Settings::default());
        let mut looped = reference(11, 10, 0.0, MaterialSource::FromParent);
        looped.attributes.is_instance_definition_object = true;
        file.add_object(looped);
        file.add_instance_definition(SourceInstanceDefinition {
            id: Uuid::from_u128(10),
            name: "Loop".into(),
            object_ids: vec![Uuid::from_u128(11)],
        });

        let options = ImportOptions::default();
        let mut ctx = BuildContext::new(&file, &options, "P");
        let mut host = MemoryHost::default();
        let blocks = host.get_or_create_container("P#Blocks", Overwrite::Keep);
        let mut resolver = BlockResolver::new(BlockInstancing::SingleMesh, blocks);

        let placement = reference(1, 10, 0.0, MaterialSource::FromLayer);
        let err = resolver
            .place(&mut host, &mut ctx, &placement, None, "P:placement")
            .unwrap_err();
        assert!(matches!(err, ImportError::BlockCycle(id) if id == Uuid::from_u128(10)));
    }

    #[test]
    fn test_unknown_definition_is_skipped() {
        let file = SourceFile::new(Settings::default());
        let options = ImportOptions::default();
        let mut ctx = BuildContext::new(&file, &options, "P");
        let mut host = MemoryHost::default();
        let blocks = host.get_or_create_container("P#Blocks", Overwrite::Keep);
        let mut resolver = BlockResolver::new(BlockInstancing::SingleMesh, blocks);

        let placement = reference(1, 404, 0.0, MaterialSource::FromLayer);
        let placed = resolver
            .place(&mut host, &mut ctx, &placement, None, "P:placement")
            .unwrap();
        assert!(placed.is_none());
        assert_eq!(host.object_count(), 0);
    }
}
