use std::env;
use std::path::PathBuf;

use library::scan_library;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let music_root = args
        .next()
        .or_else(|| env::var("LIBRARY_ROOT").ok())
        .ok_or("LIBRARY_ROOT not set and no path argument")?;

    let albums = scan_library(&PathBuf::from(&music_root));
    let tracks: usize = albums.iter().map(|album| album.track_count()).sum();
    info!("Scanned: {} albums, {} tracks", albums.len(), tracks);
    println!("{}", serde_json::to_string_pretty(&albums)?);

    Ok(())
}
