use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use deskside_formats::{SceneStore, list_models};

#[derive(Parser, Debug)]
#[command(about = "Inspect saved deskside scenes and the model library", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List model files available to the editor palette
    ListModels {
        /// Directory scanned recursively for .glb/.gltf/.obj files
        #[arg(long, value_name = "DIR", default_value = "public/models")]
        root: PathBuf,

        /// Emit the listing as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Validate a saved scene and summarise its objects
    Check {
        /// Saved scene JSON
        #[arg(long, value_name = "FILE", default_value = "saved-scene.json")]
        scene: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::ListModels { root, json } => {
            let models = list_models(&root)?;
            if json {
                let body = serde_json::json!({ "models": models });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&body).context("serializing model listing")?
                );
            } else {
                for model in &models {
                    println!("{:<48} {:>10} bytes", model.path, model.size);
                }
                println!("{} model(s) under {}", models.len(), root.display());
            }
        }
        Command::Check { scene } => {
            let store = SceneStore::new(&scene);
            let Some(document) = store.load()? else {
                bail!("no saved scene at {}", scene.display());
            };
            println!(
                "{}: version {} with {} object(s)",
                store.path().display(),
                document.version,
                document.objects.len()
            );
            for object in &document.objects {
                let parent = object.parent.as_deref().unwrap_or("-");
                println!(
                    "  - {:<24} {:?} parent={} pos=({:.2}, {:.2}, {:.2})",
                    object.id,
                    object.kind,
                    parent,
                    object.position[0],
                    object.position[1],
                    object.position[2]
                );
            }
        }
    }
    Ok(())
}
