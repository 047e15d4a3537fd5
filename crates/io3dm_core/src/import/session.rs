//! Import session orchestrator.
//!
//! [`run_import`] drives one pass over a source file: load, project
//! set-up, cameras, materials, layers, block definitions, objects, the
//! deferred block merges, and finally the keep-alive release and orphan
//! purge. A reload compares each object's fingerprint against the table
//! persisted by the previous pass and restores unchanged objects instead of
//! recreating them.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::block::BlockResolver;
use crate::convert::convert_view;
use crate::fingerprint::Fingerprint;
use crate::host::{Overwrite, SceneHost, Severity};
use crate::layer::LayerTree;
use crate::options::ImportOptions;
use crate::scene::{ContainerId, ObjectData, ObjectId, Resource};
use crate::source::{DecodeError, Decoder, Geometry, SourceFile, SourceObject};

use super::object::{create_object, tag_object, BuildContext};

/// Errors that abort an import pass.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to load {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("No project named '{0}' to reload")]
    ProjectNotFound(String),

    #[error("Layer {0} is its own ancestor")]
    LayerCycle(Uuid),

    #[error("Instance definition {0} contains itself")]
    BlockCycle(Uuid),
}

/// Result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Counts gathered over one import pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub cameras: usize,
    pub materials: usize,
    pub layers: usize,
    pub objects_created: usize,
    pub objects_restored: usize,
    pub objects_skipped: usize,
    pub definitions_resolved: usize,
    pub instances_placed: usize,
    pub purged: usize,
}

/// Logs the start and duration of one pipeline stage.
struct Stage {
    name: &'static str,
    start: Instant,
}

impl Stage {
    fn begin(name: &'static str) -> Self {
        log::info!("{}", name);
        Self {
            name,
            start: Instant::now(),
        }
    }

    fn end(self) {
        log::info!("{} took {:?}", self.name, self.start.elapsed());
    }
}

/// Import `path` into the project container named `project`.
///
/// With `reload` set the project must already exist; objects whose
/// fingerprint is unchanged since the last pass are kept as they are,
/// unless `options.force_reload` asks for everything to be rebuilt.
///
/// Failures are reported through [`SceneHost::report`] and returned. A load
/// failure leaves the host untouched; a later failure leaves the partially
/// populated project linked to the scene.
pub fn run_import(
    host: &mut dyn SceneHost,
    decoder: &dyn Decoder,
    path: &Path,
    project: &str,
    reload: bool,
    options: &ImportOptions,
) -> ImportResult<ImportReport> {
    let start = Instant::now();
    let result = load(decoder, path)
        .and_then(|file| import_file(host, &file, project, reload, options));

    match &result {
        Ok(report) => log::info!(
            "Imported '{}' into '{}' in {:?}: {:?}",
            path.display(),
            project,
            start.elapsed(),
            report
        ),
        Err(err) => {
            log::error!("Import of '{}' failed: {}", path.display(), err);
            host.report(Severity::Error, &err.to_string());
        }
    }
    result
}

fn load(decoder: &dyn Decoder, path: &Path) -> ImportResult<SourceFile> {
    let stage = Stage::begin("Loading file");
    let file = decoder.decode(path).map_err(|source| ImportError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    stage.end();
    Ok(file)
}

/// Run every stage after loading against an already decoded file.
///
/// When a stage fails the project goes back into the scene with whatever
/// was built so far, and the objects the pass recorded are kept for the
/// next reload alongside the previous ones it did not restore.
pub fn import_file(
    host: &mut dyn SceneHost,
    file: &SourceFile,
    project: &str,
    reload: bool,
    options: &ImportOptions,
) -> ImportResult<ImportReport> {
    let root = prepare_project(host, project, reload, options.force_reload)?;

    let mut ctx = BuildContext::new(file, options, project);
    ctx.unit_scale = unit_scale(host, file);

    if let Err(err) = build_project(host, &mut ctx, root) {
        log::warn!("Pass over '{}' stopped early, keeping what was built", project);
        host.link_to_scene(root);
        host.set_keep_alive(Resource::Container(root), false);
        ctx.materials.release(host);
        host.project_state_mut(root).merge_next();
        return Err(err);
    }

    let stage = Stage::begin("Finishing");
    host.link_to_scene(root);
    host.set_keep_alive(Resource::Container(root), false);
    ctx.materials.release(host);
    host.project_state_mut(root).swap();
    ctx.report.purged = host.purge_orphans();
    stage.end();

    Ok(ctx.report)
}

fn build_project(
    host: &mut dyn SceneHost,
    ctx: &mut BuildContext<'_>,
    root: ContainerId,
) -> ImportResult<()> {
    let file = ctx.file;
    let options = ctx.options;

    if options.filter_cameras && !file.named_views().is_empty() {
        import_cameras(host, ctx, root);
    }

    if options.filter_materials && !file.materials().is_empty() {
        let stage = Stage::begin("Importing materials");
        ctx.materials.import(host, file);
        ctx.report.materials = ctx.materials.len();
        stage.end();
    }

    let stage = Stage::begin("Importing layers");
    let top = host.get_or_create_container(&ctx.container_name("Layers"), Overwrite::Keep);
    host.link_container(root, top);
    host.project_state_mut(root).layers = Some(top);
    let layers = LayerTree::build(host, file, top, &ctx.project)?;
    ctx.report.layers = layers.len();
    stage.end();

    let mut blocks = None;
    if options.filter_blocks && !file.instance_definitions().is_empty() {
        let stage = Stage::begin("Importing block definitions");
        let container = host.get_or_create_container(&ctx.container_name("Blocks"), Overwrite::Keep);
        host.project_state_mut(root).blocks = Some(container);
        blocks = Some(BlockResolver::new(options.block_instancing, container));
        stage.end();
    }

    if !file.objects().is_empty() {
        let stage = Stage::begin("Importing objects");
        for object in file.objects() {
            import_object(host, ctx, root, &layers, blocks.as_mut(), object)?;
        }
        stage.end();
    }

    if let Some(resolver) = blocks.as_mut() {
        let stage = Stage::begin("Populating block meshes");
        resolver.populate(host, ctx);
        stage.end();
    }
    Ok(())
}

/// Find or create the project container and clear it for a reload.
///
/// The project stays keep-alive and out of the scene until the pass
/// finishes.
fn prepare_project(
    host: &mut dyn SceneHost,
    project: &str,
    reload: bool,
    force: bool,
) -> ImportResult<ContainerId> {
    let stage = Stage::begin("Preparing project");
    let existing = host.find_container(project);
    let root = if reload {
        let root = existing.ok_or_else(|| ImportError::ProjectNotFound(project.to_string()))?;
        host.unlink_from_scene(root);
        root
    } else {
        host.get_or_create_container(project, Overwrite::Replace)
    };
    host.set_keep_alive(Resource::Container(root), true);
    host.project_state_mut(root).next_mut().clear();

    if !reload && existing.is_some() {
        // the replaced project's children must not be picked up by name
        let purged = host.purge_orphans();
        log::info!("Replaced project '{}', {} resources purged", project, purged);
    } else if reload {
        let state = host.project_state_mut(root);
        if force {
            state.current_mut().clear();
        }
        let blocks = state.blocks;
        let previous = state.current().len();

        host.empty_container(root, true);
        if let Some(blocks) = blocks {
            host.empty_container(blocks, false);
        }
        let purged = host.purge_orphans();
        log::info!(
            "Reloading '{}': {} objects on record, {} resources purged",
            project,
            previous,
            purged
        );
    }
    stage.end();
    Ok(root)
}

/// Source meters per unit over host meters per unit.
fn unit_scale(host: &dyn SceneHost, file: &SourceFile) -> f64 {
    let source = file.settings().model_unit_system.meters_per_unit();
    let target = host.scene_unit_scale();
    if target <= 0.0 {
        log::warn!("Scene unit scale {} is not positive, using 1.0", target);
        return source;
    }
    source / target
}

fn import_cameras(host: &mut dyn SceneHost, ctx: &mut BuildContext<'_>, root: ContainerId) {
    let stage = Stage::begin("Importing cameras");
    let container = host.get_or_create_container(&ctx.container_name("Cameras"), Overwrite::Keep);
    host.link_container(root, container);
    host.project_state_mut(root).cameras = Some(container);

    let file = ctx.file;
    for view in file.named_views() {
        let name = ctx.name(&view.name);
        let (camera, matrix) = convert_view(view, ctx.unit_scale);
        let data = host.get_or_create_camera(&name, Overwrite::Rename);
        if let Some(target) = host.camera_mut(data) {
            *target = camera;
        }
        let object = host.get_or_create_object(&name, ObjectData::Camera(data), Overwrite::Rename);
        if let Some(target) = host.object_mut(object) {
            target.matrix_world = matrix;
        }
        host.link_object(container, object);
        ctx.report.cameras += 1;
    }
    stage.end();
}

fn import_object(
    host: &mut dyn SceneHost,
    ctx: &mut BuildContext<'_>,
    root: ContainerId,
    layers: &LayerTree,
    blocks: Option<&mut BlockResolver>,
    object: &SourceObject,
) -> ImportResult<()> {
    let attributes = &object.attributes;
    if attributes.is_instance_definition_object {
        return Ok(());
    }
    if !attributes.visible || !ctx.accepts(&object.geometry) {
        log::debug!("Skipping object {}", attributes.id);
        ctx.report.objects_skipped += 1;
        return Ok(());
    }
    let Some(layer) = layers.container_for_index(ctx.file, attributes.layer_index) else {
        log::debug!("Skipping object {} on a hidden or unknown layer", attributes.id);
        ctx.report.objects_skipped += 1;
        return Ok(());
    };

    let material = ctx.materials.resolve(host, object, ctx.file, None);
    let material_name = material.as_ref().map_or("", |m| m.name.as_str());
    let fingerprint = Fingerprint::compute(&object.geometry, ctx.file, material_name);

    if let Some(existing) = restore(host, root, fingerprint) {
        host.link_object(layer, existing);
        host.project_state_mut(root).next_mut().insert(fingerprint, existing);
        ctx.report.objects_restored += 1;
        return Ok(());
    }

    let name = ctx.object_name(attributes.id);
    let created = match (&object.geometry, blocks) {
        (Geometry::InstanceReference { .. }, Some(resolver)) => {
            resolver.place(host, ctx, object, material.as_ref(), &name)?
        }
        (Geometry::InstanceReference { .. }, None) => None,
        _ => create_object(host, ctx, object, material.as_ref(), &name),
    };

    match created {
        Some(id) => {
            tag_object(host, id, object, Some(fingerprint));
            host.link_object(layer, id);
            host.project_state_mut(root).next_mut().insert(fingerprint, id);
            ctx.report.objects_created += 1;
        }
        None => ctx.report.objects_skipped += 1,
    }
    Ok(())
}

/// Take a live object recorded under `fingerprint` by the previous pass.
fn restore(host: &mut dyn SceneHost, root: ContainerId, fingerprint: Fingerprint) -> Option<ObjectId> {
    loop {
        let id = host.project_state_mut(root).current_mut().take(fingerprint)?;
        if host.object(id).is_some() {
            return Some(id);
        }
        log::debug!("Recorded object for {} no longer exists", fingerprint);
    }
}
