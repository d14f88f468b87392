use std::error::Error;
use std::path::Path;

use traywell::{LightMode, TrayAnalyzer, TrayRequest};

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <tray.tiff> [uv] [small] [out.json]", args[0]);
        std::process::exit(2);
    }

    let path = Path::new(&args[1]);
    let flags = &args[2..];
    let uv = flags.iter().any(|a| a == "uv");
    let small = flags.iter().any(|a| a == "small");
    let out = flags.iter().find(|a| a.ends_with(".json"));

    let image_id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args[1].clone());
    let request = TrayRequest::new(image_id)
        .with_mode(LightMode::from_uv(uv))
        .with_small_wells(small);

    let analyzer = TrayAnalyzer::new();
    let classified = analyzer.classify(analyzer.analyze_path(path, &request)?);
    println!(
        "{}: {} positive big wells, {} positive small wells",
        classified.image_id(),
        classified.big_positive_count,
        classified.small_positive_count
    );

    if let Some(out_path) = out {
        let json = serde_json::to_string_pretty(&classified)?;
        std::fs::write(out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
