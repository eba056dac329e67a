// Shared fixtures: PNG builders, a scripted download service, a recording callback.
#![allow(dead_code)]

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use parking_lot::{Condvar, Mutex};

use ma_ninepatch_loader::config::LoaderConfig;
use ma_ninepatch_loader::detect::ninepatch::{NinePatchChunk, Padding};
use ma_ninepatch_loader::engine::decoder::DecodedArtifact;
use ma_ninepatch_loader::engine::session::LoadCallback;
use ma_ninepatch_loader::error::DownloadError;
use ma_ninepatch_loader::source::traits::{
    DownloadCallback, DownloadResult, DownloadService, TaskId,
};

pub const URL: &str = "http://x/a.9.png";

pub fn config_for(root: &Path) -> LoaderConfig {
    LoaderConfig {
        cache_root: root.to_string_lossy().into_owned(),
        ..LoaderConfig::default()
    }
}

/// Plain PNG, no nine-patch metadata.
pub fn plain_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// RGBA PNG carrying `chunk` as a raw `npTc` chunk ahead of the pixel data.
pub fn png_with_chunk(width: u32, height: u32, chunk: &[u8]) -> Vec<u8> {
    let pixels = RgbaImage::from_pixel(width, height, Rgba([40, 200, 40, 255]));
    let mut buf = Vec::new();
    let mut encoder = png::Encoder::new(&mut buf, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().unwrap();
    writer
        .write_chunk(png::chunk::ChunkType(*b"npTc"), chunk)
        .unwrap();
    writer.write_image_data(pixels.as_raw()).unwrap();
    writer.finish().unwrap();
    buf
}

pub fn sample_chunk() -> NinePatchChunk {
    NinePatchChunk {
        x_divs: vec![4, 8],
        y_divs: vec![4, 8],
        padding: Padding {
            left: 2,
            right: 2,
            top: 2,
            bottom: 2,
        },
        colors: vec![1; 9],
    }
}

/// 12x12 compiled nine-patch.
pub fn nine_patch_png() -> Vec<u8> {
    png_with_chunk(12, 12, &sample_chunk().to_bytes())
}

struct Pending {
    task_id: TaskId,
    url: String,
    dest: PathBuf,
    callback: Option<DownloadCallback>,
}

/// Download service completed by hand from the test.
#[derive(Default)]
pub struct ScriptedDownloadService {
    next_id: AtomicU64,
    pending: Mutex<Vec<Pending>>,
}

impl ScriptedDownloadService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn started(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn url(&self, index: usize) -> String {
        self.pending.lock()[index].url.clone()
    }

    pub fn dest(&self, index: usize) -> PathBuf {
        self.pending.lock()[index].dest.clone()
    }

    pub fn task_id(&self, index: usize) -> TaskId {
        self.pending.lock()[index].task_id
    }

    fn take(&self, index: usize) -> (String, PathBuf, DownloadCallback) {
        let mut pending = self.pending.lock();
        let entry = &mut pending[index];
        let callback = entry.callback.take().expect("download already completed");
        (entry.url.clone(), entry.dest.clone(), callback)
    }

    /// Write `bytes` to the destination and report success with a handle.
    pub fn succeed(&self, index: usize, bytes: &[u8]) {
        let (_, dest, callback) = self.take(index);
        fs::write(&dest, bytes).unwrap();
        callback(Ok(DownloadResult {
            file: Some(dest),
            bytes_written: bytes.len() as u64,
        }));
    }

    /// Report success without handing back the written file.
    pub fn succeed_without_handle(&self, index: usize, bytes: &[u8]) {
        let (_, dest, callback) = self.take(index);
        fs::write(&dest, bytes).unwrap();
        callback(Ok(DownloadResult {
            file: None,
            bytes_written: bytes.len() as u64,
        }));
    }

    /// Report success without writing anything.
    pub fn succeed_empty(&self, index: usize) {
        let (_, _, callback) = self.take(index);
        callback(Ok(DownloadResult::default()));
    }

    /// Drop the callback without calling it, as a dead runtime would.
    pub fn abandon(&self, index: usize) {
        let (_, _, callback) = self.take(index);
        drop(callback);
    }

    /// Leave `partial` in the destination and fail with `status`.
    pub fn fail(&self, index: usize, status: u16, partial: Option<&[u8]>) {
        let (url, dest, callback) = self.take(index);
        if let Some(bytes) = partial {
            fs::write(&dest, bytes).unwrap();
        }
        callback(Err(DownloadError::HttpStatus { status, url }));
    }
}

impl DownloadService for ScriptedDownloadService {
    fn generate_task_id(&self) -> TaskId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn is_file_downloading(&self, url: &str) -> bool {
        self.pending
            .lock()
            .iter()
            .any(|p| p.url == url && p.callback.is_some())
    }

    fn download(&self, task_id: TaskId, url: &str, dest: &Path, callback: DownloadCallback) {
        self.pending.lock().push(Pending {
            task_id,
            url: url.to_string(),
            dest: dest.to_path_buf(),
            callback: Some(callback),
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NinePatch { width: u32, height: u32 },
    Bitmap { width: u32, height: u32 },
    Failed,
}

#[derive(Default)]
pub struct RecordingCallback {
    outcomes: Mutex<Vec<Outcome>>,
    changed: Condvar,
}

impl RecordingCallback {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.outcomes.lock().clone()
    }

    /// Block until at least `count` outcomes arrived or `timeout` elapsed.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Outcome> {
        let deadline = Instant::now() + timeout;
        let mut outcomes = self.outcomes.lock();
        while outcomes.len() < count {
            if self.changed.wait_until(&mut outcomes, deadline).timed_out() {
                break;
            }
        }
        outcomes.clone()
    }

    fn push(&self, outcome: Outcome) {
        self.outcomes.lock().push(outcome);
        self.changed.notify_all();
    }
}

impl LoadCallback for RecordingCallback {
    fn on_drawable_ready(&self, artifact: DecodedArtifact) {
        let (width, height) = (artifact.width(), artifact.height());
        self.push(match artifact {
            DecodedArtifact::NinePatch(_) => Outcome::NinePatch { width, height },
            DecodedArtifact::Bitmap(_) => Outcome::Bitmap { width, height },
        });
    }

    fn on_load_failed(&self) {
        self.push(Outcome::Failed);
    }
}
