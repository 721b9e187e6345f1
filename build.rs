use anyhow::*;
use fs_extra::copy_items;
use fs_extra::dir::{CopyOptions, get_dir_content};
use std::env;
use std::path::PathBuf;

// Meshes and textures the renderer loads at runtime. Shaders are compiled in
// with `include_str!` and need no copy.
const ASSET_DIR: &str = "assets";

fn main() -> Result<()> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let assets_src = manifest_dir.join(ASSET_DIR);

    // Cargo does not expand globs, so watch the directory for additions and
    // every file in it for edits.
    println!("cargo:rerun-if-changed={ASSET_DIR}");
    if !assets_src.exists() {
        return Ok(());
    }

    let content = get_dir_content(&assets_src)?;
    for file in &content.files {
        println!("cargo:rerun-if-changed={file}");
    }

    let out_dir = env::var("OUT_DIR")?;
    let mut copy_options = CopyOptions::new();
    copy_options.overwrite = true;
    copy_items(&[&assets_src], &out_dir, &copy_options)
        .with_context(|| format!("copying {} into {out_dir}", assets_src.display()))?;

    Ok(())
}
