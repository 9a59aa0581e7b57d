//! Image export of a plot's view element.
//!
//! Exporters run asynchronously: [`ImageExporter::export`] returns a
//! [`PendingExport`] that the caller polls (or waits on) for the outcome.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, TryRecvError};

use egui::Color32;
use image::{DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{PlotError, PlotResult};
use crate::scope::ViewElement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Jpeg,
    Png,
}

impl ExportFormat {
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            ExportFormat::Jpeg => image::ImageFormat::Jpeg,
            ExportFormat::Png => image::ImageFormat::Png,
        }
    }
}

/// Path of the written file on success.
pub type ExportResult = PlotResult<PathBuf>;

pub struct PendingExport {
    rx: Receiver<ExportResult>,
}

impl PendingExport {
    pub fn from_receiver(rx: Receiver<ExportResult>) -> Self {
        Self { rx }
    }

    /// Export that already has its outcome.
    pub fn ready(result: ExportResult) -> Self {
        let (tx, rx) = std::sync::mpsc::channel();
        let _ = tx.send(result);
        Self { rx }
    }

    /// `None` while the export is still running.
    pub fn try_finish(&self) -> Option<ExportResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(PlotError::ExportAbandoned)),
        }
    }

    /// Block until the export finishes.
    pub fn wait(self) -> ExportResult {
        self.rx.recv().unwrap_or(Err(PlotError::ExportAbandoned))
    }
}

pub trait ImageExporter: Send + Sync {
    fn export(
        &self,
        element: &ViewElement,
        file_name: &str,
        format: ExportFormat,
        background: Color32,
    ) -> PendingExport;
}

/// Writes the element's last captured frame into `output_dir` on a worker thread.
#[derive(Debug, Clone)]
pub struct FileImageExporter {
    output_dir: PathBuf,
}

impl FileImageExporter {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl ImageExporter for FileImageExporter {
    fn export(
        &self,
        element: &ViewElement,
        file_name: &str,
        format: ExportFormat,
        background: Color32,
    ) -> PendingExport {
        let Some(capture) = element.capture.clone() else {
            return PendingExport::ready(Err(PlotError::NothingToExport));
        };
        let path = self.output_dir.join(file_name);
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let result = write_image(&capture, &path, format, background).map(|()| path);
            let _ = tx.send(result);
        });
        PendingExport::from_receiver(rx)
    }
}

/// Composite a captured frame over an opaque background.
pub fn flatten_onto(capture: &egui::ColorImage, background: Color32) -> RgbaImage {
    let [w, h] = capture.size;
    let mut out = RgbaImage::new(w as u32, h as u32);
    for y in 0..h {
        for x in 0..w {
            // egui colors are premultiplied
            let p = capture.pixels[y * w + x];
            let rest = 255 - p.a() as u16;
            let blend = |c: u8, bg: u8| (c as u16 + (bg as u16 * rest + 127) / 255).min(255) as u8;
            out.put_pixel(
                x as u32,
                y as u32,
                Rgba([
                    blend(p.r(), background.r()),
                    blend(p.g(), background.g()),
                    blend(p.b(), background.b()),
                    255,
                ]),
            );
        }
    }
    out
}

fn write_image(
    capture: &egui::ColorImage,
    path: &Path,
    format: ExportFormat,
    background: Color32,
) -> PlotResult<()> {
    let flat = flatten_onto(capture, background);
    match format {
        // JPEG has no alpha channel
        ExportFormat::Jpeg => DynamicImage::ImageRgba8(flat)
            .to_rgb8()
            .save_with_format(path, format.image_format())?,
        ExportFormat::Png => flat.save_with_format(path, format.image_format())?,
    }
    log::debug!("wrote {:?} export to {}", format, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn frame(pixels: &[Color32], w: usize, h: usize) -> egui::ColorImage {
        let rgba: Vec<u8> = pixels.iter().flat_map(|c| c.to_array()).collect();
        egui::ColorImage::from_rgba_unmultiplied([w, h], &rgba)
    }

    fn element(pixels: &[Color32], w: usize, h: usize) -> ViewElement {
        ViewElement {
            width_px: w as f32,
            height_px: h as f32,
            capture: Some(Arc::new(frame(pixels, w, h))),
        }
    }

    #[test]
    fn transparent_pixels_take_background() {
        let img = frame(&[Color32::TRANSPARENT, Color32::BLACK], 2, 1);
        let flat = flatten_onto(&img, Color32::WHITE);
        assert_eq!(flat.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(flat.get_pixel(1, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn writes_png_and_jpg() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = FileImageExporter::new(dir.path());
        let el = element(&[Color32::RED; 16], 4, 4);

        let png = exporter
            .export(&el, "plot.png", ExportFormat::Png, Color32::WHITE)
            .wait()
            .unwrap();
        let back = image::open(&png).unwrap().to_rgba8();
        assert_eq!(back.dimensions(), (4, 4));
        assert_eq!(back.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));

        let jpg = exporter
            .export(&el, "plot.jpg", ExportFormat::Jpeg, Color32::WHITE)
            .wait()
            .unwrap();
        assert!(jpg.exists());
    }

    #[test]
    fn missing_capture_fails() {
        let exporter = FileImageExporter::new(std::env::temp_dir());
        let outcome = exporter
            .export(&ViewElement::default(), "plot.png", ExportFormat::Png, Color32::WHITE)
            .wait();
        assert!(matches!(outcome, Err(PlotError::NothingToExport)));
    }
}
