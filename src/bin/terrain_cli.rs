use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use w3x_terrain_lib::assets::DirectoryAssets;
use w3x_terrain_lib::config::{EditorSettings, Ini};
use w3x_terrain_lib::map::catalog::TerrainCatalog;
use w3x_terrain_lib::map::gpu::HeadlessBackend;
use w3x_terrain_lib::map::minimap::write_minimap_png;
use w3x_terrain_lib::map::terrain::{EditContext, Terrain};
use w3x_terrain_lib::map::w3e::{parse_w3e, write_w3e};

struct Args {
    map_dir: PathBuf,
    data_dir: Option<PathBuf>,
    catalog: Option<PathBuf>,
    settings: Option<PathBuf>,
    minimap: Option<PathBuf>,
    roundtrip: bool,
}

fn usage() {
    eprintln!("Usage:");
    eprintln!("  terrain-cli <map_dir> [--data <dir>] [--catalog <ini>] [--settings <json>]");
    eprintln!("              [--minimap <png>] [--roundtrip]");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  terrain-cli ./MyMap.w3x");
    eprintln!("  terrain-cli ./MyMap.w3x --data ./war3 --catalog ./terrain.ini --minimap mini.png");
    eprintln!("  RUST_LOG=debug terrain-cli ./MyMap.w3x --roundtrip");
}

fn parse_args() -> Result<Args> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let Some(map_dir) = raw.first() else {
        bail!("missing map directory");
    };
    let mut args = Args {
        map_dir: PathBuf::from(map_dir),
        data_dir: None,
        catalog: None,
        settings: None,
        minimap: None,
        roundtrip: false,
    };

    let mut i = 1;
    while i < raw.len() {
        let value = || {
            raw.get(i + 1)
                .map(PathBuf::from)
                .with_context(|| format!("{} requires a value", raw[i]))
        };
        match raw[i].as_str() {
            "--data" => args.data_dir = Some(value()?),
            "--catalog" => args.catalog = Some(value()?),
            "--settings" => args.settings = Some(value()?),
            "--minimap" => args.minimap = Some(value()?),
            "--roundtrip" => {
                args.roundtrip = true;
                i += 1;
                continue;
            }
            other => bail!("unknown argument '{other}'"),
        }
        i += 2;
    }
    Ok(args)
}

fn run(args: Args) -> Result<()> {
    let settings = match &args.settings {
        Some(path) => EditorSettings::load(path)?,
        None => EditorSettings::default(),
    };
    let catalog = match &args.catalog {
        Some(path) => {
            let ini = Ini::load(path).with_context(|| format!("Failed to read catalog: {}", path.display()))?;
            TerrainCatalog::from_ini(&ini)
        }
        None => TerrainCatalog::new(),
    };

    // meshes and textures come from the game data when given, else from the map
    let data_dir = args
        .data_dir
        .clone()
        .or_else(|| settings.asset_root.clone())
        .unwrap_or_else(|| args.map_dir.clone());
    let mut assets = DirectoryAssets::new(&data_dir);
    let mut backend = HeadlessBackend::new();

    let terrain_path = args.map_dir.join("war3map.w3e");
    let source = std::fs::read(&terrain_path)
        .with_context(|| format!("Failed to read terrain file: {}", terrain_path.display()))?;

    let terrain = Terrain::load_from_path(
        &terrain_path,
        &mut EditContext {
            catalog: &catalog,
            settings: &settings,
            assets: &mut assets,
            backend: &mut backend,
        },
    )?;

    let water = terrain.grid().corners().iter().filter(|c| c.water).count();
    let ramps = terrain.grid().corners().iter().filter(|c| c.ramp).count();
    info!(
        width = terrain.width(),
        height = terrain.height(),
        tiles = terrain.tileset_ids().len(),
        cliff_types = terrain.cliffset_ids().len(),
        cliffs = terrain.cliff_placements().len(),
        water,
        ramps,
        uploads = backend.uploads().len(),
        "terrain summary"
    );

    if let Some(path) = args.minimap.as_ref().or(settings.minimap_path.as_ref()) {
        write_minimap_png(&terrain, path)?;
        info!(path = %path.display(), "minimap written");
    }

    if args.roundtrip {
        let bytes = write_w3e(&terrain.to_w3e())?;
        let again = write_w3e(&parse_w3e(&bytes)?)?;
        if again != bytes {
            bail!("terrain changed across save and reload");
        }
        info!(bytes = bytes.len(), identical_to_source = bytes == source, "roundtrip complete");
    }

    terrain.release(&mut backend);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            usage();
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:?}");
            ExitCode::FAILURE
        }
    }
}
