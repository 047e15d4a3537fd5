//! Example: Inspect a decoded 3DM object model.
//!
//! Run with: cargo run --example inspect_3dm -- model.json

use std::env;

use io3dm_core::fingerprint::Fingerprint;
use io3dm_core::material::MaterialTable;
use io3dm_core::source::{Decoder, JsonDecoder};
use io3dm_core::{ImportOptions, MemoryHost};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: inspect_3dm <path-to-model-json>");
        println!("\nExample:");
        println!("  cargo run --example inspect_3dm -- model.json");
        return;
    }

    let path = &args[1];
    println!("Decoding: {}", path);

    match JsonDecoder.decode(path.as_ref()) {
        Ok(file) => {
            let units = file.settings().model_unit_system;
            println!("\n=== Units: {:?} ({} m) ===", units, units.meters_per_unit());
            println!("Layers: {}", file.layers().len());
            println!("Materials: {}", file.materials().len());
            println!("Objects: {}", file.objects().len());
            println!("Definitions: {}", file.instance_definitions().len());
            println!("Named views: {}", file.named_views().len());

            println!("\n--- Layers ---");
            for layer in file.layers() {
                println!(
                    "  {} '{}' parent {}{}",
                    layer.id,
                    layer.name,
                    layer.parent_id,
                    if layer.visible { "" } else { " (hidden)" }
                );
            }

            // resolve materials the way an import pass does
            let options = ImportOptions::default();
            let mut host = MemoryHost::default();
            let mut materials = MaterialTable::new(&options);
            materials.import(&mut host, &file);

            println!("\n--- Objects ---");
            for object in file.objects() {
                let material = materials
                    .resolve(&mut host, object, &file, None)
                    .map(|m| m.name)
                    .unwrap_or_default();
                println!(
                    "  {} {:?} layer {} fingerprint {}",
                    object.id(),
                    object.geometry.object_type(),
                    object.attributes.layer_index,
                    Fingerprint::compute(&object.geometry, &file, &material)
                );
            }

            println!("\n--- Definitions ---");
            for definition in file.instance_definitions() {
                println!(
                    "  {} '{}' - {} members",
                    definition.id,
                    definition.name,
                    definition.object_ids.len()
                );
            }
        }
        Err(e) => {
            eprintln!("Error decoding file: {}", e);
            std::process::exit(1);
        }
    }
}
