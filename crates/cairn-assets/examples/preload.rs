//! Preloading example.
//!
//! This example shows:
//! - Registering a texture loader that decodes off-thread and promotes on
//!   first access
//! - Preloading a level's assets in the background and polling for progress
//! - Switching levels with a flushing preload
//! - Closing the manager

use std::any::Any;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use cairn_assets::prelude::*;
use cairn_assets::{DynAsset, PreloadStatus};

/// Pixels decoded on a loader thread.
struct DecodedImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

/// A texture "uploaded" on the thread that first uses it.
#[derive(Debug)]
struct Texture {
    width: u32,
    height: u32,
    bytes: usize,
}

impl Asset for Texture {
    fn type_name() -> &'static str {
        "Texture"
    }

    fn close(&self) -> AssetResult<()> {
        println!(
            "  releasing {}x{} texture ({} bytes)",
            self.width, self.height, self.bytes
        );
        Ok(())
    }
}

/// Loader for a toy image format: width and height as u32 LE, then RGBA.
struct ImageLoader;

impl AssetLoader for ImageLoader {
    fn load(&self, mut ctx: LoadContext<'_>) -> AssetResult<Resource> {
        let bytes = ctx.read_to_end()?;
        if bytes.len() < 8 {
            return Err(ctx.error("image file too small"));
        }
        let width = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let height = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Ok(Resource::decoded(
            AssetKind::Texture,
            DecodedImage {
                width,
                height,
                pixels: bytes[8..].to_vec(),
            },
        ))
    }

    fn promote(&self, key: &AssetKey, decoded: Box<dyn Any + Send>) -> AssetResult<Arc<dyn DynAsset>> {
        let image = decoded.downcast::<DecodedImage>().map_err(|_| AssetError::Loader {
            path: key.name().to_string(),
            message: "not a decoded image".into(),
        })?;
        println!("  uploading {}", key);
        Ok(Arc::new(Texture {
            width: image.width,
            height: image.height,
            bytes: image.pixels.len(),
        }))
    }
}

fn write_image(dir: &Path, name: &str, width: u32, height: u32) -> std::io::Result<()> {
    let mut file = std::fs::File::create(dir.join(name))?;
    file.write_all(&width.to_le_bytes())?;
    file.write_all(&height.to_le_bytes())?;
    file.write_all(&vec![0xff; (width * height * 4) as usize])?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    cairn_core::logging::init();

    let temp_dir = tempfile::tempdir()?;
    let textures = temp_dir.path().join("textures");
    std::fs::create_dir_all(&textures)?;
    write_image(&textures, "grass.img", 16, 16)?;
    write_image(&textures, "stone.img", 32, 32)?;
    write_image(&textures, "sand.img", 8, 8)?;
    std::fs::write(textures.join("broken.img"), b"xx")?;

    let loaders = LoaderRegistry::with_defaults().with(AssetKind::Texture, ImageLoader);
    let config = ManagerConfig::new().with_texture_path("textures");
    let manager = AssetManager::new(DiskFileSystem::new(temp_dir.path()), config, loaders)?;

    println!("=== Level 1 ===");
    let level1 = ["grass.img", "stone.img", "broken.img"].map(AssetKey::texture);
    let preload = manager.preload(level1, false)?;
    println!("Scheduled {} loads", preload.scheduled());

    loop {
        match preload.poll() {
            PreloadStatus::Ready(result) => match &result.error {
                None => println!("  loaded {}", result.key),
                Some(err) => println!("  failed {}: {}", result.key, err),
            },
            PreloadStatus::Pending => std::thread::yield_now(),
            PreloadStatus::Done => break,
        }
    }
    if let Err(err) = manager.wait() {
        println!("Failures:\n{}", err);
    }

    let grass: Arc<Texture> = manager.texture("grass.img")?;
    println!("grass: {:?}", grass);

    println!("=== Level 2 ===");
    let level2 = ["stone.img", "sand.img"].map(AssetKey::texture);
    manager.preload(level2, true)?.wait()?;
    println!("Cached: {:?}", manager.loaded_keys());

    for event in manager.drain_events() {
        println!("  event: {:?}", event);
    }

    println!("=== Shutdown ===");
    manager.close()?;
    Ok(())
}
