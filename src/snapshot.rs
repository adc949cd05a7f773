use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use image::{ImageFormat, RgbaImage};
use log::{info, warn};

use crate::render::{PageSession, RawFrame};

/// Persists one visual artifact per capture, trying capture methods in order:
/// native whole-page PNG, raw pixel buffer encoded to PNG, rendered text as
/// bytes. Total failure is non-fatal; the record just carries no reference.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn capture(
        &self,
        page: &dyn PageSession,
        captured_at: DateTime<Local>,
    ) -> Option<PathBuf> {
        let (bytes, extension) = match acquire_artifact(page) {
            Some(artifact) => artifact,
            None => {
                warn!("every snapshot capture method came back empty for {}", page.url());
                return None;
            }
        };

        let stamp = captured_at.format("%Y%m%d_%H%M%S");
        let path = self.dir.join(format!("smm_silver_{stamp}.{extension}"));
        match fs::write(&path, &bytes) {
            Ok(()) => {
                info!("snapshot saved: {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("failed writing snapshot {}: {e}", path.display());
                None
            }
        }
    }
}

/// First capture method returning a non-empty artifact wins.
fn acquire_artifact(page: &dyn PageSession) -> Option<(Vec<u8>, &'static str)> {
    if let Some(png) = page.capture_page_png() {
        if !png.is_empty() {
            return Some((png, "png"));
        }
    }
    if let Some(frame) = page.capture_raw_frame() {
        match encode_frame(frame) {
            Some(png) => return Some((png, "png")),
            None => warn!("raw frame capture produced an unencodable buffer"),
        }
    }
    let text = page.body_text();
    if !text.is_empty() {
        return Some((text.as_bytes().to_vec(), "txt"));
    }
    None
}

fn encode_frame(frame: RawFrame) -> Option<Vec<u8>> {
    let img = RgbaImage::from_raw(frame.width, frame.height, frame.rgba)?;
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).ok()?;
    Some(buf.into_inner())
}
