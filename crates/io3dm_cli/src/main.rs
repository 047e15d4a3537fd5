//! io3dm - import a decoded 3DM object model into an in-memory scene.
//!
//! Usage:
//!   io3dm model.json                      Import into project "model"
//!   io3dm model.json --project Site       Import under another name
//!   io3dm model.json --twice              Import, then reload unchanged
//!   io3dm model.json --options opts.json  Read import options from JSON

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use io3dm_core::{
    run_import, BlockInstancing, ImportOptions, ImportReport, JsonDecoder, MemoryHost,
    MeshFaceMode, MeshShading, SceneHost,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Instancing {
    SingleMesh,
    Collection,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FaceMode {
    Join,
    Split,
}

#[derive(Parser, Debug)]
#[command(name = "io3dm", version, about = "Import a 3DM object model dump")]
struct Args {
    /// JSON dump of the decoded file
    file: PathBuf,

    /// Project name (defaults to the file stem)
    #[arg(short, long)]
    project: Option<String>,

    /// Import options as JSON; flags below override it
    #[arg(long)]
    options: Option<PathBuf>,

    /// Import a second time to exercise reload
    #[arg(long)]
    twice: bool,

    /// Rebuild every object on reload
    #[arg(long)]
    force_reload: bool,

    #[arg(long)]
    cameras: bool,

    #[arg(long)]
    curves: bool,

    #[arg(long)]
    no_materials: bool,

    #[arg(long)]
    no_blocks: bool,

    #[arg(long, value_enum)]
    instancing: Option<Instancing>,

    #[arg(long, value_enum)]
    face_mode: Option<FaceMode>,

    /// Shade faces flat instead of smooth
    #[arg(long)]
    flat: bool,

    /// Scene meters per unit
    #[arg(long, default_value_t = 1.0)]
    unit_scale: f64,
}

fn load_options(args: &Args) -> Result<ImportOptions> {
    let mut options = match &args.options {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open options: {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Invalid options: {}", path.display()))?
        }
        None => ImportOptions::default(),
    };

    options.filter_cameras |= args.cameras;
    options.filter_curves |= args.curves;
    options.force_reload |= args.force_reload;
    if args.no_materials {
        options.filter_materials = false;
    }
    if args.no_blocks {
        options.filter_blocks = false;
    }
    if let Some(instancing) = args.instancing {
        options.block_instancing = match instancing {
            Instancing::SingleMesh => BlockInstancing::SingleMesh,
            Instancing::Collection => BlockInstancing::CollectionInstance,
        };
    }
    if let Some(mode) = args.face_mode {
        options.mesh_face_mode = match mode {
            FaceMode::Join => MeshFaceMode::Join,
            FaceMode::Split => MeshFaceMode::Split,
        };
    }
    if args.flat {
        options.mesh_shading = MeshShading::Flat;
    }
    Ok(options)
}

fn project_name(args: &Args) -> String {
    args.project.clone().unwrap_or_else(|| {
        args.file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string()
    })
}

/// Import once, reloading when the project is already in the scene.
fn import(host: &mut MemoryHost, path: &Path, project: &str, options: &ImportOptions) -> Result<ImportReport> {
    let reload = host
        .find_container(project)
        .is_some_and(|id| host.is_in_scene(id));
    if reload {
        println!("Reloading project '{}'", project);
    } else {
        println!("Importing into project '{}'", project);
    }
    run_import(host, &JsonDecoder, path, project, reload, options)
        .with_context(|| format!("Import of {} failed", path.display()))
}

fn print_report(report: &ImportReport) {
    println!("  Cameras:     {}", report.cameras);
    println!("  Materials:   {}", report.materials);
    println!("  Layers:      {}", report.layers);
    println!(
        "  Objects:     {} created, {} restored, {} skipped",
        report.objects_created, report.objects_restored, report.objects_skipped
    );
    println!(
        "  Blocks:      {} definitions, {} placements",
        report.definitions_resolved, report.instances_placed
    );
    println!("  Purged:      {}", report.purged);
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let options = load_options(&args)?;
    let project = project_name(&args);
    let mut host = MemoryHost::new(args.unit_scale);

    let passes = if args.twice { 2 } else { 1 };
    for _ in 0..passes {
        let report = import(&mut host, &args.file, &project, &options)?;
        print_report(&report);
    }

    println!("\n=== Scene ===");
    println!("Containers: {}", host.container_count());
    println!("Objects:    {}", host.object_count());
    println!("Meshes:     {}", host.mesh_count());
    println!("Curves:     {}", host.curve_count());
    println!("Materials:  {}", host.material_names().join(", "));
    for (severity, message) in host.messages() {
        println!("[{}] {}", severity, message);
    }
    Ok(())
}
