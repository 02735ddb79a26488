use std::fs;
use std::path::{Path, PathBuf};

use lofty::{
    file::{AudioFile, TaggedFileExt},
    probe::Probe,
    tag::Accessor,
};
use lyra_core::Track;

const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a", "aac"];

/// Turn command line arguments (files or directories) into a queue
pub fn collect_tracks(args: &[String]) -> Vec<Track> {
    let mut paths = Vec::new();
    for arg in args {
        let path = PathBuf::from(arg);
        if path.is_dir() {
            paths.extend(audio_files_in(&path));
        } else if is_supported(&path) {
            paths.push(path);
        } else {
            log::warn!("Skipping unsupported file {:?}", path);
        }
    }

    log::info!("Found {} tracks", paths.len());
    paths.iter().map(|path| track_from_path(path)).collect()
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Supported audio files directly inside `dir`, sorted by name
fn audio_files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_supported(path))
            .collect(),
        Err(e) => {
            log::warn!("Cannot read directory {:?}: {}", dir, e);
            Vec::new()
        }
    };

    files.sort_by_key(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });
    files
}

/// Build a track from tags, falling back to the file stem for the title
pub fn track_from_path(path: &Path) -> Track {
    let location = path.to_string_lossy().to_string();
    let mut track = Track::new(location.clone(), location);

    match Probe::open(path).and_then(|p| p.read()) {
        Ok(tagged_file) => {
            track.duration_seconds = tagged_file.properties().duration().as_secs_f32();
            if let Some(tag) = tagged_file.primary_tag() {
                track.title = tag.title().map(|s| s.to_string()).unwrap_or_default();
                track.artist = tag.artist().map(|s| s.to_string()).unwrap_or_default();
            }
        }
        Err(e) => {
            log::debug!("No tags for {:?}: {}", path, e);
        }
    }

    if track.title.is_empty() {
        track.title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
            .unwrap_or_default();
    }
    track
}
