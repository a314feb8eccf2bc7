//! Container codec: reads and writes the zip-compatible song archive.
//!
//! Archive layout:
//!
//! - `manifest.json` — song metadata, timing hints, styling
//! - `alignment.json` — the timed alignment
//! - `vocals.<ext>` / `instrumentals.<ext>` — the two stems (mandatory)
//! - `background.<ext>` — optional background video
//! - `fonts/<family>` — optional font buffers
//!
//! Writing always uses the canonical entry names. Reading matches entries
//! primarily by filename; entries whose names deviate are matched by their
//! entry comment (`tag:vocals`, `tag:instrumentals`, `tag:background`), with
//! the audio format inferred from the matched filename.

use crate::container::SongContainer;
use crate::error::{CoreError, Result};
use crate::manifest::MANIFEST_VERSION;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub const MANIFEST_ENTRY: &str = "manifest.json";
pub const ALIGNMENT_ENTRY: &str = "alignment.json";
pub const VOCALS_STEM: &str = "vocals";
pub const INSTRUMENTALS_STEM: &str = "instrumentals";
pub const BACKGROUND_STEM: &str = "background";
pub const FONTS_PREFIX: &str = "fonts/";

/// Write a container to any seekable sink as a zip archive.
///
/// # Errors
///
/// Returns `CoreError::Config` if the manifest fails validation, and any
/// archive or serialization error encountered while writing.
pub fn write_container<W: Write + Seek>(container: &SongContainer, writer: W) -> Result<W> {
    container.manifest.validate()?;

    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default();

    let manifest_json = serde_json::to_vec(&container.manifest).map_err(|source| {
        CoreError::Decode {
            entry: MANIFEST_ENTRY.to_string(),
            source,
        }
    })?;
    zip.start_file(MANIFEST_ENTRY, options)?;
    zip.write_all(&manifest_json)?;

    let alignment_json =
        serde_json::to_vec(container.alignment()).map_err(|source| CoreError::Decode {
            entry: ALIGNMENT_ENTRY.to_string(),
            source,
        })?;
    zip.start_file(ALIGNMENT_ENTRY, options)?;
    zip.write_all(&alignment_json)?;

    if let Some(ref vocals) = container.vocal_track {
        zip.start_file(format!("{VOCALS_STEM}.{}", container.vocal_format), options)?;
        zip.write_all(vocals)?;
    } else {
        warn!("Writing container without a vocals track");
    }

    if let Some(ref instrumentals) = container.instrumental_track {
        zip.start_file(
            format!("{INSTRUMENTALS_STEM}.{}", container.instrumental_format),
            options,
        )?;
        zip.write_all(instrumentals)?;
    } else {
        warn!("Writing container without an instrumentals track");
    }

    if let Some(ref video) = container.background_video {
        zip.start_file(
            format!("{BACKGROUND_STEM}.{}", container.video_format),
            options,
        )?;
        zip.write_all(video)?;
    }

    for (family, bytes) in &container.fonts {
        zip.start_file(format!("{FONTS_PREFIX}{family}"), options)?;
        zip.write_all(bytes)?;
    }

    Ok(zip.finish()?)
}

/// Read a container from any seekable source.
///
/// Missing optional entries (video, fonts, manifest/styling fields) are
/// tolerated and default-filled; missing stems are fatal.
///
/// # Errors
///
/// Returns `CoreError::MissingEntry` when a mandatory stem is absent,
/// `CoreError::Decode` for unparseable JSON, and archive errors otherwise.
pub fn read_container<R: Read + Seek>(reader: R) -> Result<SongContainer> {
    let mut archive = ZipArchive::new(reader)?;
    let mut container = SongContainer::new();
    let mut alignment = None;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        let comment = entry.comment().to_string();

        if name == MANIFEST_ENTRY {
            let manifest =
                serde_json::from_reader(&mut entry).map_err(|source| CoreError::Decode {
                    entry: name.clone(),
                    source,
                })?;
            container.manifest = manifest;
        } else if name == ALIGNMENT_ENTRY {
            alignment =
                Some(
                    serde_json::from_reader(&mut entry).map_err(|source| CoreError::Decode {
                        entry: name.clone(),
                        source,
                    })?,
                );
        } else if matches_stem(&name, &comment, VOCALS_STEM) {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            let format = extension_of(&name, &container.vocal_format);
            container.set_vocal_track(bytes, format);
        } else if matches_stem(&name, &comment, INSTRUMENTALS_STEM) {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            let format = extension_of(&name, &container.instrumental_format);
            container.set_instrumental_track(bytes, format);
        } else if matches_stem(&name, &comment, BACKGROUND_STEM) {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            let format = extension_of(&name, &container.video_format);
            container.set_background_video(bytes, format);
        } else if let Some(family) = name.strip_prefix(FONTS_PREFIX) {
            if !family.is_empty() {
                let mut bytes = Vec::new();
                entry.read_to_end(&mut bytes)?;
                container.add_font(family, bytes);
            }
        } else {
            debug!("Ignoring unrecognized container entry: {name}");
        }
    }

    if container.manifest.version > MANIFEST_VERSION {
        warn!(
            "Container manifest version {} is newer than supported {}; loading best-effort",
            container.manifest.version, MANIFEST_VERSION
        );
    }
    if let Err(e) = container.manifest.validate() {
        warn!("Manifest failed validation, keeping values as-is: {e}");
    }

    if container.vocal_track.is_none() {
        return Err(CoreError::MissingEntry {
            entry: VOCALS_STEM.to_string(),
        });
    }
    if container.instrumental_track.is_none() {
        return Err(CoreError::MissingEntry {
            entry: INSTRUMENTALS_STEM.to_string(),
        });
    }

    // Regenerates the visual cache
    container.set_alignment(alignment.unwrap_or_default());

    info!(
        "Loaded container: title={:?}, {} segments, vocals {} bytes, instrumentals {} bytes",
        container.manifest.title,
        container.alignment().segments.len(),
        container.vocal_track.as_ref().map_or(0, Vec::len),
        container.instrumental_track.as_ref().map_or(0, Vec::len),
    );

    Ok(container)
}

/// Write a container to a file path.
///
/// # Errors
///
/// Propagates `write_container` and file-creation errors.
pub fn save_to_path(container: &SongContainer, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_container(container, BufWriter::new(file))?;
    Ok(())
}

/// Read a container from a file path.
///
/// # Errors
///
/// Propagates `read_container` and file-open errors.
pub fn load_from_path(path: &Path) -> Result<SongContainer> {
    let file = File::open(path)?;
    read_container(BufReader::new(file))
}

/// Filename-primary matching with an entry-comment fallback for archives
/// whose entry names deviate from the canonical layout.
fn matches_stem(name: &str, comment: &str, stem: &str) -> bool {
    let by_name = name
        .rsplit_once('.')
        .is_some_and(|(base, _)| base == stem)
        || name == stem;
    by_name || comment == format!("tag:{stem}")
}

/// Extension of a matched entry name, or the current default when the name
/// carries none.
fn extension_of(name: &str, fallback: &str) -> String {
    name.rsplit_once('.')
        .map_or_else(|| fallback.to_string(), |(_, ext)| ext.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::{Alignment, Segment, Word};
    use std::io::Cursor;
    use std::time::Duration;

    fn sample_container() -> SongContainer {
        let mut container = SongContainer::new();
        container.manifest.set_title("Round Trip");
        container.manifest.set_artists(vec!["Tester".to_string()]);
        container.manifest.timing_hints.use_focus_volume_control = true;
        container.set_alignment(Alignment {
            segments: vec![Segment {
                start: Duration::from_secs(1),
                end: Duration::from_secs(3),
                text: "Hi you".to_string(),
                words: Some(vec![Word {
                    start: Duration::from_secs(1),
                    end: Duration::from_secs(2),
                    word: "Hi".to_string(),
                    score: Some(0.9),
                }]),
                chars: None,
            }],
            prefered_mode: Some("word".to_string()),
        });
        container.set_vocal_track(vec![1, 2, 3, 4], "wav");
        container.set_instrumental_track(vec![9, 8, 7], "wav");
        container
    }

    fn round_trip(container: &SongContainer) -> SongContainer {
        let buffer = write_container(container, Cursor::new(Vec::new())).unwrap();
        read_container(Cursor::new(buffer.into_inner())).unwrap()
    }

    #[test]
    fn test_round_trip_preserves_everything() {
        let original = sample_container();
        let loaded = round_trip(&original);

        assert_eq!(loaded.manifest, original.manifest);
        assert_eq!(loaded.alignment(), original.alignment());
        assert_eq!(loaded.vocal_track, original.vocal_track);
        assert_eq!(loaded.instrumental_track, original.instrumental_track);
        assert_eq!(loaded.vocal_format, "wav");
        // Cache was regenerated on load
        assert_eq!(loaded.display_cache().len(), 1);
        assert!(!loaded.display_cache()[0].words.is_empty());
    }

    #[test]
    fn test_round_trip_optional_assets() {
        let mut original = sample_container();
        original.set_background_video(vec![0xAA; 32], "mp4");
        original.add_font("Display", vec![0x01, 0x02]);
        original.add_font("Body", vec![0x03]);

        let loaded = round_trip(&original);
        assert_eq!(loaded.background_video, original.background_video);
        assert_eq!(loaded.video_format, "mp4");
        assert_eq!(loaded.fonts, original.fonts);
    }

    #[test]
    fn test_missing_instrumentals_is_fatal() {
        let mut container = sample_container();
        container.instrumental_track = None;
        let buffer = write_container(&container, Cursor::new(Vec::new())).unwrap();

        let err = read_container(Cursor::new(buffer.into_inner())).unwrap_err();
        assert!(matches!(
            err,
            CoreError::MissingEntry { ref entry } if entry == INSTRUMENTALS_STEM
        ));
    }

    #[test]
    fn test_missing_alignment_defaults_empty() {
        let mut container = SongContainer::new();
        container.set_vocal_track(vec![1], "wav");
        container.set_instrumental_track(vec![2], "wav");
        let loaded = round_trip(&container);
        assert!(loaded.alignment().segments.is_empty());
    }

    #[test]
    fn test_format_inferred_from_filename() {
        let mut container = sample_container();
        container.set_vocal_track(vec![5, 6], "flac");
        let loaded = round_trip(&container);
        assert_eq!(loaded.vocal_format, "flac");
        assert_eq!(loaded.vocal_track, Some(vec![5, 6]));
    }

    #[test]
    fn test_invalid_manifest_rejected_on_write() {
        let mut container = sample_container();
        container.manifest.timing_hints.vocal_volume_focused = 2.0;
        let err = write_container(&container, Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn test_garbage_archive_is_format_error() {
        let err = read_container(Cursor::new(b"not a zip file".to_vec())).unwrap_err();
        assert!(matches!(err, CoreError::Archive(_)));
    }

    #[test]
    fn test_unparseable_manifest_is_decode_error() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.start_file(MANIFEST_ENTRY, options).unwrap();
        zip.write_all(b"{ this is not json").unwrap();
        zip.start_file("vocals.wav", options).unwrap();
        zip.write_all(&[0]).unwrap();
        zip.start_file("instrumentals.wav", options).unwrap();
        zip.write_all(&[0]).unwrap();
        let buffer = zip.finish().unwrap();

        let err = read_container(Cursor::new(buffer.into_inner())).unwrap_err();
        assert!(matches!(err, CoreError::Decode { ref entry, .. } if entry == MANIFEST_ENTRY));
    }

    #[test]
    fn test_matches_stem_variants() {
        assert!(matches_stem("vocals.wav", "", "vocals"));
        assert!(matches_stem("vocals.flac", "", "vocals"));
        assert!(matches_stem("vocals", "", "vocals"));
        assert!(!matches_stem("lead-stem.wav", "", "vocals"));
        // Deviant filename matched through the entry comment
        assert!(matches_stem("lead-stem.wav", "tag:vocals", "vocals"));
        assert!(!matches_stem("lead-stem.wav", "tag:instrumentals", "vocals"));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("vocals.flac", "wav"), "flac");
        assert_eq!(extension_of("vocals", "wav"), "wav");
    }
}
