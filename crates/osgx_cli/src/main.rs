// Export a host scene description to an OSG text file.
// Run with: cargo run --release --bin osgx -- <scene.json> <out.osg> [--config cfg.json] [--log export.log]

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use osgx_core::{export_scene, read_scene, ExportConfig, ExportLog};

const USAGE: &str = "Usage: osgx <scene.json> <out.osg> [--config <config.json>] [--log <export.log>]";

#[derive(Debug, PartialEq)]
struct Args {
    scene: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    log: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut positional = Vec::new();
    let mut config = None;
    let mut log = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => match iter.next() {
                Some(path) => config = Some(PathBuf::from(path)),
                None => bail!("--config needs a path"),
            },
            "--log" => match iter.next() {
                Some(path) => log = Some(PathBuf::from(path)),
                None => bail!("--log needs a path"),
            },
            flag if flag.starts_with("--") => bail!("Unknown option {}", flag),
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let mut positional = positional.into_iter();
    match (positional.next(), positional.next(), positional.next()) {
        (Some(scene), Some(output), None) => Ok(Args {
            scene,
            output,
            config,
            log,
        }),
        _ => bail!("Expected a scene file and an output file"),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            std::process::exit(1);
        }
    };

    let config = match &args.config {
        Some(path) => ExportConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ExportConfig::default(),
    };

    let scene = read_scene(&args.scene)
        .with_context(|| format!("Failed to read scene {}", args.scene.display()))?;

    let export_log = match &args.log {
        Some(path) => ExportLog::with_file(path)
            .with_context(|| format!("Failed to create log {}", path.display()))?,
        None => ExportLog::new(),
    };

    log::info!("Exporting {} -> {}", args.scene.display(), args.output.display());
    let report = export_scene(&scene, config, export_log, &args.output)
        .with_context(|| format!("Failed to export {}", args.output.display()))?;

    let stats = &report.stats;
    log::info!(
        "Done: {} objects, {} geometries ({} skinned), {} bones, {} lights, {} animations, {} textures",
        stats.objects,
        stats.geometries,
        stats.rig_geometries,
        stats.bones,
        stats.lights,
        stats.animations,
        stats.textures
    );
    if report.warning_count() > 0 {
        log::warn!("{} warning(s) during export", report.warning_count());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_positional() {
        let args = parse_args(&strings(&["scene.json", "out/scene.osg"])).unwrap();
        assert_eq!(args.scene, PathBuf::from("scene.json"));
        assert_eq!(args.output, PathBuf::from("out/scene.osg"));
        assert!(args.config.is_none());
        assert!(args.log.is_none());
    }

    #[test]
    fn test_parse_options_anywhere() {
        let args = parse_args(&strings(&[
            "--log",
            "export.log",
            "scene.json",
            "--config",
            "cfg.json",
            "scene.osg",
        ]))
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("cfg.json")));
        assert_eq!(args.log, Some(PathBuf::from("export.log")));
        assert_eq!(args.output, PathBuf::from("scene.osg"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&strings(&["scene.json"])).is_err());
        assert!(parse_args(&strings(&["a", "b", "c"])).is_err());
        assert!(parse_args(&strings(&["a", "b", "--config"])).is_err());
        assert!(parse_args(&strings(&["a", "b", "--fast"])).is_err());
    }
}
