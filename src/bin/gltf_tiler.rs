//! Command line front end
//!
//! Usage:
//!   gltf_tiler tileset <input.gltf> [tileset.json] [--measure <unit>] [--up <Y|Z>]
//!   gltf_tiler glb <input.gltf> [output.glb]
//!   gltf_tiler b3dm <input.gltf> [output.b3dm]
//!
//! Logging goes through env_logger; set RUST_LOG=debug for per-tile output.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, bail, Result};
use env_logger::Env;

use gltf_tiler::{gltf_to_b3dm, gltf_to_glb, gltf_to_tileset, Measure, TilingContext, UpAxis};

fn print_usage(program: &str) {
    eprintln!("Usage: {} <tileset|glb|b3dm> <input> [output] [options]", program);
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  tileset   Split the model into a 3D Tiles tileset (default output: tileset.json beside the input)");
    eprintln!("  glb       Convert to binary glTF (default output: input with .glb extension)");
    eprintln!("  b3dm      Convert to a single b3dm (default output: input with .b3dm extension)");
    eprintln!();
    eprintln!("Options (tileset only):");
    eprintln!("  --measure <meter|foot|millimeter>  Length unit of the model (default: meter)");
    eprintln!("  --up <Y|Z>                         Up axis of the output frame (default: Y)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} tileset scene.gltf", program);
    eprintln!("  {} tileset scene.gltf out/tileset.json --measure foot --up Z", program);
    eprintln!("  {} b3dm scene.gltf", program);
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        print_usage(&args[0]);
        bail!("missing command or input path");
    }

    let command = args[1].as_str();
    let input = PathBuf::from(&args[2]);

    let mut output: Option<PathBuf> = None;
    let mut ctx = TilingContext::default();

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--measure" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| anyhow!("--measure needs a value"))?;
                ctx.measure = value.parse::<Measure>().map_err(|e| anyhow!(e))?;
            }
            "--up" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| anyhow!("--up needs a value"))?;
                ctx.up_axis = value.parse::<UpAxis>().map_err(|e| anyhow!(e))?;
            }
            other if other.starts_with("--") => {
                print_usage(&args[0]);
                bail!("unknown option {}", other);
            }
            other => {
                if output.is_some() {
                    bail!("unexpected argument {}", other);
                }
                output = Some(PathBuf::from(other));
            }
        }
        i += 1;
    }

    let start = Instant::now();
    match command {
        "tileset" => {
            let output = output.unwrap_or_else(|| sibling(&input, "tileset.json"));
            let tileset = gltf_to_tileset(&input, &output, &ctx)?;
            println!(
                "{} content tiles ({}, up {}) written to {}",
                tileset.content_tiles().len(),
                ctx.measure,
                ctx.up_axis,
                output.display()
            );
        }
        "glb" => {
            let output = output.unwrap_or_else(|| input.with_extension("glb"));
            gltf_to_glb(&input, &output)?;
            println!("written to {}", output.display());
        }
        "b3dm" => {
            let output = output.unwrap_or_else(|| input.with_extension("b3dm"));
            gltf_to_b3dm(&input, &output)?;
            println!("written to {}", output.display());
        }
        other => {
            print_usage(&args[0]);
            bail!("unknown command {}", other);
        }
    }
    println!("completed in: {:.2?}", start.elapsed());

    Ok(())
}

fn sibling(input: &Path, name: &str) -> PathBuf {
    input
        .parent()
        .map(|parent| parent.join(name))
        .unwrap_or_else(|| PathBuf::from(name))
}
