//! Batch bridge between chunk blob files and panel images.

use std::{
    fs,
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};
use walkdir::WalkDir;

use crate::{
    builder::PanelBuilder,
    common::{CodecConfig, GapError, GapResult},
    reader::PanelReader,
    transfer::resources::{build_pool, DefaultPolicy, ResourcePolicy, Task},
};

const IMAGE_EXTS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Result for one blob or image. `result` carries the payload byte count.
#[derive(Debug)]
pub struct PanelOutcome {
    pub source: PathBuf,
    pub output: PathBuf,
    pub result: GapResult<usize>,
}

impl PanelOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Renders every `*.bin` blob in `blob_dir` to `<stem>.png` in `image_dir`.
pub fn encode_blobs<P, Q>(
    blob_dir: P,
    image_dir: Q,
    cfg: &CodecConfig,
) -> GapResult<Vec<PanelOutcome>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    encode_blobs_with(blob_dir, image_dir, cfg, &DefaultPolicy::detect())
}

pub fn encode_blobs_with<P, Q>(
    blob_dir: P,
    image_dir: Q,
    cfg: &CodecConfig,
    policy: &dyn ResourcePolicy,
) -> GapResult<Vec<PanelOutcome>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let _span = info_span!("encode_panels").entered();
    let (blob_dir, image_dir) = (blob_dir.as_ref(), image_dir.as_ref());
    let sources = list_files(blob_dir, |ext| ext == "bin")?;
    fs::create_dir_all(image_dir)?;

    let builder = PanelBuilder::new(cfg);
    let pool = build_pool(policy, Task::Cpu, sources.len())?;
    let outcomes: Vec<PanelOutcome> = pool.install(|| {
        sources
            .into_par_iter()
            .map(|source| {
                let output = image_dir.join(output_name(&source, "png"));
                let result = fs::read(&source).map_err(GapError::from).and_then(|data| {
                    builder.write(&data, &output)?;
                    Ok(data.len())
                });
                PanelOutcome { source, output, result }
            })
            .collect()
    });

    report("Rendered", &outcomes);
    Ok(outcomes)
}

/// Decodes every image in `image_dir` back to `<stem>.bin` in `blob_dir`.
pub fn decode_images<P, Q>(
    image_dir: P,
    blob_dir: Q,
    cfg: &CodecConfig,
) -> GapResult<Vec<PanelOutcome>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    decode_images_with(image_dir, blob_dir, cfg, &DefaultPolicy::detect())
}

pub fn decode_images_with<P, Q>(
    image_dir: P,
    blob_dir: Q,
    cfg: &CodecConfig,
    policy: &dyn ResourcePolicy,
) -> GapResult<Vec<PanelOutcome>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let _span = info_span!("decode_panels").entered();
    let (image_dir, blob_dir) = (image_dir.as_ref(), blob_dir.as_ref());
    let sources = list_files(image_dir, |ext| IMAGE_EXTS.contains(&ext))?;
    fs::create_dir_all(blob_dir)?;

    let reader = PanelReader::new(cfg);
    let pool = build_pool(policy, Task::Cpu, sources.len())?;
    let outcomes: Vec<PanelOutcome> = pool.install(|| {
        sources
            .into_par_iter()
            .map(|source| {
                let output = blob_dir.join(output_name(&source, "bin"));
                let result = reader.read_path(&source).and_then(|data| {
                    fs::write(&output, &data)?;
                    Ok(data.len())
                });
                PanelOutcome { source, output, result }
            })
            .collect()
    });

    report("Decoded", &outcomes);
    Ok(outcomes)
}

// Regular files directly under `dir` whose lowercased extension passes `keep`, sorted by path
fn list_files(dir: &Path, keep: impl Fn(&str) -> bool) -> GapResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(GapError::FileNotFound(dir.to_path_buf()));
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .is_some_and(|x| keep(&x.to_ascii_lowercase()))
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    debug!("Found {} inputs in {}", files.len(), dir.display());
    Ok(files)
}

fn output_name(source: &Path, ext: &str) -> PathBuf {
    let stem = source.file_stem().unwrap_or(source.as_os_str());
    Path::new(stem).with_extension(ext)
}

fn report(verb: &str, outcomes: &[PanelOutcome]) {
    for o in outcomes.iter().filter(|o| !o.is_ok()) {
        if let Err(e) = &o.result {
            warn!("{}: {e}", o.source.display());
        }
    }
    let ok = outcomes.iter().filter(|o| o.is_ok()).count();
    info!("{verb} {ok} of {} panels", outcomes.len());
}
