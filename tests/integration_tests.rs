//! Integration tests for the replaytag pipeline
//!
//! The external tools are replaced with in-process stubs so the passes,
//! the scheduler and the copy-and-swap writer run against real files in a
//! temp directory.

use replaytag::analysis::{AlbumProbe, LoudnessMeter, StreamConcatenator, TagField, TagWriter};
use replaytag::config::Settings;
use replaytag::pipeline::{self, Pipeline, Stage};
use replaytag::tools::Toolchain;
use replaytag::types::{Decibel, LoudnessMeasurement, LoudnessUnit, TagMode, TagScope};
use replaytag::{ReplaytagError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// =============================================================================
// Stub collaborators
// =============================================================================

fn measurement(integrated: f64, peak: f64) -> LoudnessMeasurement {
    LoudnessMeasurement {
        integrated_loudness: LoudnessUnit(integrated),
        loudness_range: LoudnessUnit(5.0),
        true_peak: Decibel(peak),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}

/// Per-file values by file name; anything named `replaytag-*` is a combined album file
#[derive(Default)]
struct StubMeter {
    tracks: HashMap<String, LoudnessMeasurement>,
    album: Option<LoudnessMeasurement>,
    delay: Duration,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl LoudnessMeter for StubMeter {
    fn measure(&self, path: &Path) -> Result<LoudnessMeasurement> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.active.fetch_sub(1, Ordering::SeqCst);

        if !path.is_file() {
            return Err(ReplaytagError::measurement_failure(path, "no such file"));
        }

        let name = file_name(path);
        if name.starts_with("replaytag-") {
            if let Some(album) = self.album {
                return Ok(album);
            }
        }
        self.tracks.get(&name).copied().ok_or_else(|| {
            ReplaytagError::measurement_failure(path, "Invalid data found when processing input")
        })
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Album names by file name; names in `broken` fail to probe
#[derive(Default)]
struct StubProbe {
    albums: HashMap<String, String>,
    broken: Vec<String>,
}

impl AlbumProbe for StubProbe {
    fn album(&self, path: &Path) -> Result<String> {
        let name = file_name(path);
        if self.broken.contains(&name) {
            return Err(ReplaytagError::probe_failure(path, "moov atom not found"));
        }
        Ok(self.albums.get(&name).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Concatenates the listed files and remembers every temp path it saw
#[derive(Default)]
struct StubConcatenator {
    seen: Arc<Mutex<Vec<PathBuf>>>,
    /// Leave a truncated output behind and report failure
    fail_after_write: bool,
}

impl StreamConcatenator for StubConcatenator {
    fn concatenate(&self, descriptor: &Path, output: &Path) -> Result<()> {
        {
            let mut seen = self.seen.lock().unwrap();
            seen.push(descriptor.to_path_buf());
            seen.push(output.to_path_buf());
        }

        let list = fs::read_to_string(descriptor)?;
        let mut combined = Vec::new();
        for line in list.lines() {
            let quoted = line.trim_start_matches("file '").trim_end_matches('\'');
            combined.extend(fs::read(quoted.replace(r"'\''", "'"))?);
        }

        if self.fail_after_write {
            fs::write(output, &combined[..combined.len() / 2])?;
            return Err(ReplaytagError::ConcatenationFailure {
                album: output.display().to_string(),
                reason: "Non-monotonous DTS in output stream".to_string(),
            });
        }

        fs::write(output, combined)?;
        Ok(())
    }
}

/// Copies the source and appends `KEY=VALUE` lines
struct AppendingWriter;

impl TagWriter for AppendingWriter {
    fn write_tags(&self, source: &Path, tags: &[TagField], output: &Path) -> Result<()> {
        let mut bytes = fs::read(source)?;
        for tag in tags {
            bytes.extend(format!("\n{}={}", tag.key, tag.value).into_bytes());
        }
        fs::write(output, bytes)?;
        Ok(())
    }
}

/// Reports success without producing the temp copy
struct SilentWriter;

impl TagWriter for SilentWriter {
    fn write_tags(&self, _source: &Path, _tags: &[TagField], _output: &Path) -> Result<()> {
        Ok(())
    }
}

fn toolchain(
    meter: StubMeter,
    probe: StubProbe,
    concatenator: StubConcatenator,
    writer: Box<dyn TagWriter>,
) -> Toolchain {
    Toolchain {
        meter: Box::new(meter),
        probe: Some(Box::new(probe)),
        concatenator: Box::new(concatenator),
        tag_writer: writer,
    }
}

fn settings(dir: &TempDir, tag_mode: TagMode, album: bool, track: bool) -> Settings {
    let temp_dir = dir.path().join("scratch");
    fs::create_dir_all(&temp_dir).unwrap();
    Settings {
        inputs: vec![dir.path().join("music")],
        tag_mode,
        album,
        track,
        workers_limit: 4,
        temp_dir,
        show_progress: false,
        ..Settings::default()
    }
}

fn music_file(dir: &TempDir, name: &str) -> PathBuf {
    let music = dir.path().join("music");
    fs::create_dir_all(&music).unwrap();
    let path = music.join(name);
    fs::write(&path, format!("audio:{}", name)).unwrap();
    path
}

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

fn same_album(names: &[&str], album: &str) -> HashMap<String, String> {
    names
        .iter()
        .map(|name| (name.to_string(), album.to_string()))
        .collect()
}

// =============================================================================
// Track pass
// =============================================================================

#[test]
fn test_track_pass_writes_tags_and_leaves_no_artifacts() {
    let dir = TempDir::new().unwrap();
    let a = music_file(&dir, "a.flac");
    let b = music_file(&dir, "b.flac");

    let meter = StubMeter {
        tracks: HashMap::from([
            ("a.flac".to_string(), measurement(-14.0, -1.5)),
            ("b.flac".to_string(), measurement(-20.0, -6.0)),
        ]),
        ..StubMeter::default()
    };
    let tools = toolchain(
        meter,
        StubProbe::default(),
        StubConcatenator::default(),
        Box::new(AppendingWriter),
    );
    let settings = settings(&dir, TagMode::WriteStandard, false, true);

    let pipeline = Pipeline::new(&settings, &tools).unwrap();
    let result = pipeline.run(&[a.clone(), b.clone()]);

    assert_eq!(result.failed(), 0);
    assert_eq!(result.written(), 2);
    assert_eq!(result.passes.len(), 1);
    assert_eq!(result.passes[0].scope, TagScope::Track);

    let tagged = fs::read_to_string(&a).unwrap();
    assert!(tagged.starts_with("audio:a.flac"));
    assert!(tagged.contains("REPLAYGAIN_TRACK_GAIN=-4.00 dB"));
    assert!(!tagged.contains("ALBUM"));

    let tagged = fs::read_to_string(&b).unwrap();
    assert!(tagged.contains("REPLAYGAIN_TRACK_GAIN=2.00 dB"));

    assert_eq!(dir_entries(&dir.path().join("music")), vec!["a.flac", "b.flac"]);
}

#[test]
fn test_failed_measurement_does_not_abort_batch() {
    let dir = TempDir::new().unwrap();
    let good = music_file(&dir, "good.mp3");
    let bad = music_file(&dir, "corrupt.mp3");

    let meter = StubMeter {
        tracks: HashMap::from([("good.mp3".to_string(), measurement(-18.0, -3.0))]),
        ..StubMeter::default()
    };
    let tools = toolchain(
        meter,
        StubProbe::default(),
        StubConcatenator::default(),
        Box::new(AppendingWriter),
    );
    let settings = settings(&dir, TagMode::WriteStandard, false, true);

    let result = Pipeline::new(&settings, &tools)
        .unwrap()
        .run(&[bad.clone(), good.clone()]);

    let pass = &result.passes[0];
    assert_eq!(pass.results.len(), 1);
    assert_eq!(pass.results[0].file_path, good);
    assert_eq!(pass.failures.len(), 1);
    assert_eq!(pass.failures[0].stage, Stage::Scan);
    assert_eq!(pass.failures[0].paths, vec![bad.clone()]);
    assert!(matches!(
        pass.failures[0].error,
        ReplaytagError::MeasurementFailure { .. }
    ));

    assert_eq!(fs::read_to_string(&bad).unwrap(), "audio:corrupt.mp3");
    assert!(fs::read_to_string(&good)
        .unwrap()
        .contains("REPLAYGAIN_TRACK_GAIN=0.00 dB"));
}

#[test]
fn test_skip_mode_never_touches_files() {
    let dir = TempDir::new().unwrap();
    let a = music_file(&dir, "a.ogg");

    let meter = StubMeter {
        tracks: HashMap::from([("a.ogg".to_string(), measurement(-16.0, -2.0))]),
        ..StubMeter::default()
    };
    let tools = toolchain(
        meter,
        StubProbe::default(),
        StubConcatenator::default(),
        Box::new(SilentWriter),
    );
    let settings = settings(&dir, TagMode::Skip, false, true);

    let result = Pipeline::new(&settings, &tools).unwrap().run(&[a.clone()]);

    assert_eq!(result.passes[0].results.len(), 1);
    assert_eq!(result.passes[0].skipped, 1);
    assert_eq!(result.written(), 0);
    assert_eq!(fs::read_to_string(&a).unwrap(), "audio:a.ogg");
}

// =============================================================================
// Album pass
// =============================================================================

#[test]
fn test_album_members_share_combined_values() {
    let dir = TempDir::new().unwrap();
    let one = music_file(&dir, "01 Intro.flac");
    let two = music_file(&dir, "02 O'Brien's Song.flac");

    let concatenator = StubConcatenator::default();
    let seen = Arc::clone(&concatenator.seen);

    let meter = StubMeter {
        tracks: HashMap::from([
            ("01 Intro.flac".to_string(), measurement(-10.0, -0.5)),
            ("02 O'Brien's Song.flac".to_string(), measurement(-25.0, -12.0)),
        ]),
        album: Some(measurement(-12.0, -0.5)),
        ..StubMeter::default()
    };
    let probe = StubProbe {
        albums: same_album(&["01 Intro.flac", "02 O'Brien's Song.flac"], "Debut"),
        ..StubProbe::default()
    };
    let tools = toolchain(meter, probe, concatenator, Box::new(AppendingWriter));
    let settings = settings(&dir, TagMode::WriteExtra, true, false);

    let result = Pipeline::new(&settings, &tools)
        .unwrap()
        .run(&[one.clone(), two.clone()]);

    assert_eq!(result.failed(), 0);
    let pass = &result.passes[0];
    assert_eq!(pass.scope, TagScope::Album);
    assert_eq!(pass.results.len(), 2);

    // Every number identical, only the path differs
    let first = &pass.results[0];
    let second = &pass.results[1];
    assert_ne!(first.file_path, second.file_path);
    assert_eq!(first.for_member(&second.file_path), *second);
    assert_eq!(first.track_gain, Decibel(-6.0));
    assert_eq!(first.loudness, LoudnessUnit(-12.0));

    for path in [&one, &two] {
        let tagged = fs::read_to_string(path).unwrap();
        assert!(tagged.contains("REPLAYGAIN_ALBUM_GAIN=-6.00 dB"));
        assert!(tagged.contains("REPLAYGAIN_REFERENCE_LOUDNESS=-18.00 LUFS"));
        assert!(!tagged.contains("REPLAYGAIN_TRACK_GAIN"));
    }

    // Descriptor and combined file are gone once the group finishes
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    for artifact in seen.iter() {
        assert!(!artifact.exists(), "{} left behind", artifact.display());
    }
    assert!(dir_entries(&settings.temp_dir).is_empty());
}

#[test]
fn test_failed_album_measurement_removes_combined_file() {
    let dir = TempDir::new().unwrap();
    let one = music_file(&dir, "1.flac");
    let two = music_file(&dir, "2.flac");

    let concatenator = StubConcatenator::default();
    let seen = Arc::clone(&concatenator.seen);

    // Members measure fine on their own, the combined file does not
    let meter = StubMeter {
        tracks: HashMap::from([
            ("1.flac".to_string(), measurement(-14.0, -1.0)),
            ("2.flac".to_string(), measurement(-15.0, -1.0)),
        ]),
        album: None,
        ..StubMeter::default()
    };
    let probe = StubProbe {
        albums: same_album(&["1.flac", "2.flac"], "Broken"),
        ..StubProbe::default()
    };
    let tools = toolchain(meter, probe, concatenator, Box::new(AppendingWriter));
    let settings = settings(&dir, TagMode::WriteStandard, true, false);

    let result = Pipeline::new(&settings, &tools)
        .unwrap()
        .run(&[one.clone(), two.clone()]);

    let pass = &result.passes[0];
    assert!(pass.results.is_empty());
    assert_eq!(pass.failures.len(), 1);
    assert_eq!(pass.failures[0].stage, Stage::Scan);
    assert_eq!(pass.failures[0].paths, vec![one.clone(), two.clone()]);
    assert!(matches!(
        pass.failures[0].error,
        ReplaytagError::MeasurementFailure { .. }
    ));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    for artifact in seen.iter() {
        assert!(!artifact.exists(), "{} left behind", artifact.display());
    }
    assert!(dir_entries(&settings.temp_dir).is_empty());
    assert_eq!(fs::read_to_string(&one).unwrap(), "audio:1.flac");
}

#[test]
fn test_failed_concatenation_removes_partial_output() {
    let dir = TempDir::new().unwrap();
    let one = music_file(&dir, "1.mp3");
    let two = music_file(&dir, "2.mp3");

    let concatenator = StubConcatenator {
        fail_after_write: true,
        ..StubConcatenator::default()
    };
    let seen = Arc::clone(&concatenator.seen);

    let meter = StubMeter {
        album: Some(measurement(-12.0, -1.0)),
        ..StubMeter::default()
    };
    let probe = StubProbe {
        albums: same_album(&["1.mp3", "2.mp3"], "Live"),
        ..StubProbe::default()
    };
    let tools = toolchain(meter, probe, concatenator, Box::new(AppendingWriter));
    let settings = settings(&dir, TagMode::WriteStandard, true, false);

    let result = Pipeline::new(&settings, &tools)
        .unwrap()
        .run(&[one.clone(), two.clone()]);

    let pass = &result.passes[0];
    assert_eq!(pass.failures.len(), 1);
    assert_eq!(pass.failures[0].paths, vec![one, two]);
    match &pass.failures[0].error {
        ReplaytagError::ConcatenationFailure { album, .. } => assert_eq!(album, "Live"),
        other => panic!("unexpected error: {}", other),
    }

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    for artifact in seen.iter() {
        assert!(!artifact.exists(), "{} left behind", artifact.display());
    }
    assert!(dir_entries(&settings.temp_dir).is_empty());
}

#[test]
fn test_unprobeable_track_is_scanned_alone() {
    let dir = TempDir::new().unwrap();
    let one = music_file(&dir, "1.m4a");
    let two = music_file(&dir, "2.m4a");
    let odd = music_file(&dir, "3.m4a");

    let concatenator = StubConcatenator::default();
    let seen = Arc::clone(&concatenator.seen);

    let meter = StubMeter {
        tracks: HashMap::from([("3.m4a".to_string(), measurement(-20.0, -4.0))]),
        album: Some(measurement(-12.0, -1.0)),
        ..StubMeter::default()
    };
    let probe = StubProbe {
        albums: same_album(&["1.m4a", "2.m4a", "3.m4a"], "Sessions"),
        broken: vec!["3.m4a".to_string()],
    };
    let tools = toolchain(meter, probe, concatenator, Box::new(AppendingWriter));
    let settings = settings(&dir, TagMode::Skip, true, false);

    let result = Pipeline::new(&settings, &tools)
        .unwrap()
        .run(&[one.clone(), two.clone(), odd.clone()]);

    let pass = &result.passes[0];
    assert!(pass.failures.is_empty());
    assert_eq!(pass.results.len(), 3);

    // One combination for the tagged pair only
    assert_eq!(seen.lock().unwrap().len(), 2);

    let gain_of = |path: &PathBuf| {
        pass.results
            .iter()
            .find(|r| &r.file_path == path)
            .map(|r| r.track_gain)
            .unwrap()
    };
    assert_eq!(gain_of(&one), Decibel(-6.0));
    assert_eq!(gain_of(&two), Decibel(-6.0));
    assert_eq!(gain_of(&odd), Decibel(2.0));
}

#[test]
fn test_single_track_album_matches_track_scan() {
    let dir = TempDir::new().unwrap();
    let only = music_file(&dir, "single.m4a");

    let concatenator = StubConcatenator::default();
    let seen = Arc::clone(&concatenator.seen);

    let meter = StubMeter {
        tracks: HashMap::from([("single.m4a".to_string(), measurement(-21.3, -4.2))]),
        album: Some(measurement(0.0, 0.0)),
        ..StubMeter::default()
    };
    let probe = StubProbe {
        albums: same_album(&["single.m4a"], "Maxi"),
        ..StubProbe::default()
    };
    let tools = toolchain(meter, probe, concatenator, Box::new(AppendingWriter));
    let settings = settings(&dir, TagMode::Skip, true, true);

    let result = Pipeline::new(&settings, &tools).unwrap().run(&[only]);

    assert_eq!(result.passes.len(), 2);
    assert_eq!(result.passes[0].scope, TagScope::Album);
    assert_eq!(result.passes[1].scope, TagScope::Track);
    assert_eq!(result.passes[0].results, result.passes[1].results);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn test_mixed_format_album_fails_alone() {
    let dir = TempDir::new().unwrap();
    let flac = music_file(&dir, "a.flac");
    let mp3 = music_file(&dir, "b.mp3");
    let other_one = music_file(&dir, "c.ogg");
    let other_two = music_file(&dir, "d.ogg");

    let meter = StubMeter {
        album: Some(measurement(-15.0, -2.0)),
        ..StubMeter::default()
    };
    let mut albums = same_album(&["a.flac", "b.mp3"], "Mixed");
    albums.extend(same_album(&["c.ogg", "d.ogg"], "Clean"));
    let probe = StubProbe {
        albums,
        ..StubProbe::default()
    };
    let tools = toolchain(
        meter,
        probe,
        StubConcatenator::default(),
        Box::new(AppendingWriter),
    );
    let settings = settings(&dir, TagMode::WriteStandard, true, false);

    let result = Pipeline::new(&settings, &tools).unwrap().run(&[
        flac.clone(),
        mp3.clone(),
        other_one.clone(),
        other_two.clone(),
    ]);

    let pass = &result.passes[0];
    assert_eq!(pass.written, 2);
    assert_eq!(pass.failures.len(), 1);
    assert_eq!(pass.failures[0].paths, vec![flac.clone(), mp3.clone()]);
    assert!(matches!(
        pass.failures[0].error,
        ReplaytagError::MixedFormatInAlbum { .. }
    ));
    assert_eq!(result.failed(), 2);

    assert_eq!(fs::read_to_string(&flac).unwrap(), "audio:a.flac");
    assert!(fs::read_to_string(&other_one)
        .unwrap()
        .contains("REPLAYGAIN_ALBUM_GAIN=-3.00 dB"));
}

#[test]
fn test_album_pass_without_probe_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut tools = toolchain(
        StubMeter::default(),
        StubProbe::default(),
        StubConcatenator::default(),
        Box::new(AppendingWriter),
    );
    tools.probe = None;

    let settings = settings(&dir, TagMode::Skip, true, true);
    assert!(matches!(
        Pipeline::new(&settings, &tools),
        Err(ReplaytagError::ConfigError(_))
    ));

    let settings = Settings {
        album: false,
        ..settings
    };
    assert!(Pipeline::new(&settings, &tools).is_ok());
}

// =============================================================================
// Writer
// =============================================================================

#[test]
fn test_missing_copy_restores_original() {
    let dir = TempDir::new().unwrap();
    let track = music_file(&dir, "keep.flac");

    let meter = StubMeter {
        tracks: HashMap::from([("keep.flac".to_string(), measurement(-18.0, -1.0))]),
        ..StubMeter::default()
    };
    let tools = toolchain(
        meter,
        StubProbe::default(),
        StubConcatenator::default(),
        Box::new(SilentWriter),
    );
    let settings = settings(&dir, TagMode::WriteStandard, false, true);

    let result = Pipeline::new(&settings, &tools)
        .unwrap()
        .run(&[track.clone()]);

    let pass = &result.passes[0];
    assert_eq!(pass.results.len(), 1);
    assert_eq!(pass.written, 0);
    assert_eq!(pass.failures.len(), 1);
    assert_eq!(pass.failures[0].stage, Stage::Write);
    assert!(matches!(
        pass.failures[0].error,
        ReplaytagError::SwapFailure { .. }
    ));
    assert!(!result.needs_manual_recovery());

    assert_eq!(fs::read_to_string(&track).unwrap(), "audio:keep.flac");
    assert_eq!(dir_entries(&dir.path().join("music")), vec!["keep.flac"]);
}

// =============================================================================
// Scheduling
// =============================================================================

#[test]
fn test_workers_limit_bounds_concurrent_measurements() {
    let dir = TempDir::new().unwrap();
    let mut files = Vec::new();
    let mut tracks = HashMap::new();
    for i in 0..50 {
        let name = format!("{:02}.mp3", i);
        files.push(music_file(&dir, &name));
        tracks.insert(name, measurement(-18.0 - i as f64 / 10.0, -3.0));
    }

    let max_active = Arc::new(AtomicUsize::new(0));
    let meter = StubMeter {
        tracks,
        delay: Duration::from_millis(5),
        max_active: Arc::clone(&max_active),
        ..StubMeter::default()
    };
    let tools = toolchain(
        meter,
        StubProbe::default(),
        StubConcatenator::default(),
        Box::new(AppendingWriter),
    );
    let settings = settings(&dir, TagMode::Skip, false, true);

    let result = Pipeline::new(&settings, &tools).unwrap().run(&files);

    assert_eq!(result.passes[0].results.len(), 50);
    assert_eq!(result.failed(), 0);
    let observed = max_active.load(Ordering::SeqCst);
    assert!((1..=4).contains(&observed), "max active was {}", observed);
}

// =============================================================================
// Entry point
// =============================================================================

#[test]
fn test_dry_run_lists_without_tools() {
    let dir = TempDir::new().unwrap();
    music_file(&dir, "a.flac");
    music_file(&dir, "b.mp3");
    fs::write(dir.path().join("music").join("cover.jpg"), b"").unwrap();

    let settings = Settings {
        dry_run: true,
        ffmpeg: Some(dir.path().join("no-such-ffmpeg")),
        ..settings(&dir, TagMode::WriteStandard, true, true)
    };

    let result = pipeline::run(&settings).unwrap();

    assert_eq!(result.total_files, 2);
    assert!(result.passes.is_empty());
}

#[test]
fn test_missing_tool_is_fatal() {
    let dir = TempDir::new().unwrap();
    let track = music_file(&dir, "a.flac");

    let settings = Settings {
        ffmpeg: Some(dir.path().join("no-such-ffmpeg")),
        ..settings(&dir, TagMode::WriteStandard, false, true)
    };

    assert!(matches!(
        pipeline::run(&settings),
        Err(ReplaytagError::ToolNotFound { name: "ffmpeg", .. })
    ));
    assert_eq!(fs::read_to_string(track).unwrap(), "audio:a.flac");
}
