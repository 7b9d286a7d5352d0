//! Image decoding, dimension extraction and thumbnail generation.
//!
//! Resampling sits behind [`ThumbnailScaler`] so a higher quality filter can
//! replace [`NearestNeighbor`] without touching callers.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader, RgbaImage};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{AppError, Result};

/// Produces a thumbnail bounded by `max_width` x `max_height`.
pub trait ThumbnailScaler: Send + Sync {
    fn scale(&self, source: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage;
}

/// Target size for a `width` x `height` source.
///
/// The longer side becomes the bound; the shorter side is scaled with
/// integer arithmetic and never drops below one pixel.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let (w, h) = (width.max(1) as u64, height.max(1) as u64);
    let (new_w, new_h) = if w > h {
        (max_width as u64, h * max_width as u64 / w)
    } else {
        (w * max_height as u64 / h, max_height as u64)
    };
    (new_w.max(1) as u32, new_h.max(1) as u32)
}

/// Nearest-neighbor resampling: destination `(x, y)` copies source
/// `(x * width / new_width, y * height / new_height)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighbor;

impl ThumbnailScaler for NearestNeighbor {
    fn scale(&self, source: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
        let src = source.to_rgba8();
        let (width, height) = src.dimensions();
        let (new_w, new_h) = fit_within(width, height, max_width, max_height);

        let thumb = RgbaImage::from_fn(new_w, new_h, |x, y| {
            let sx = (x as u64 * width as u64 / new_w as u64) as u32;
            let sy = (y as u64 * height as u64 / new_h as u64) as u32;
            *src.get_pixel(sx, sy)
        });

        DynamicImage::ImageRgba8(thumb)
    }
}

/// Encoding used for a thumbnail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailFormat {
    Jpeg,
    Png,
}

impl ThumbnailFormat {
    /// Same family as the source when recognized, JPEG otherwise.
    pub fn for_source(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Png => ThumbnailFormat::Png,
            _ => ThumbnailFormat::Jpeg,
        }
    }

    /// File extension of the encoded thumbnail.
    ///
    /// This follows the thumbnail's own encoding rather than the stored
    /// original's extension, so a GIF, BMP or WebP source gets `_thumb.jpg`.
    pub fn extension(&self) -> &'static str {
        match self {
            ThumbnailFormat::Jpeg => "jpg",
            ThumbnailFormat::Png => "png",
        }
    }
}

fn map_image_error(context: String, err: ImageError) -> AppError {
    match err {
        ImageError::IoError(e) => AppError::fs(context, e),
        other => AppError::Decode(format!("{}: {}", context, other)),
    }
}

/// Decodes uploaded images and writes their thumbnails
#[derive(Clone)]
pub struct ImageProcessor {
    scaler: Arc<dyn ThumbnailScaler>,
    max_dimension: u32,
    jpeg_quality: u8,
}

impl ImageProcessor {
    pub fn new(max_dimension: u32, jpeg_quality: u8) -> Self {
        Self::with_scaler(Arc::new(NearestNeighbor), max_dimension, jpeg_quality)
    }

    pub fn with_scaler(
        scaler: Arc<dyn ThumbnailScaler>,
        max_dimension: u32,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            scaler,
            max_dimension,
            jpeg_quality,
        }
    }

    /// Decode the image at `path`, detecting the format from its content.
    pub fn decode(&self, path: &Path) -> Result<(DynamicImage, ImageFormat)> {
        let reader = ImageReader::open(path)
            .map_err(|e| AppError::fs(format!("open {}", path.display()), e))?
            .with_guessed_format()
            .map_err(|e| AppError::fs(format!("read {}", path.display()), e))?;

        let format = reader.format().ok_or_else(|| {
            AppError::Decode(format!("{}: unrecognized image format", path.display()))
        })?;

        // Truncated payloads surface as io errors from the decoder; they are
        // still bad content, not a filesystem failure.
        let image = reader
            .decode()
            .map_err(|e| AppError::Decode(format!("decode {}: {}", path.display(), e)))?;

        Ok((image, format))
    }

    pub fn dimensions(image: &DynamicImage) -> (u32, u32) {
        (image.width(), image.height())
    }

    /// Scale `image` and encode it to `dest`, returning the thumbnail size.
    ///
    /// `dest` must not exist yet; a partially written thumbnail is removed on failure.
    pub fn generate_thumbnail(
        &self,
        image: &DynamicImage,
        format: ThumbnailFormat,
        dest: &Path,
    ) -> Result<(u32, u32)> {
        let thumb = self
            .scaler
            .scale(image, self.max_dimension, self.max_dimension);

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dest)
            .map_err(|e| AppError::fs(format!("create {}", dest.display()), e))?;

        if let Err(e) = self.encode(&thumb, format, file, dest) {
            if let Err(remove_err) = fs::remove_file(dest) {
                tracing::warn!("Failed to remove partial thumbnail {:?}: {}", dest, remove_err);
            }
            return Err(e);
        }

        tracing::debug!(
            "Generated {}x{} {:?} thumbnail at {:?}",
            thumb.width(),
            thumb.height(),
            format,
            dest
        );
        Ok((thumb.width(), thumb.height()))
    }

    /// [`generate_thumbnail`](Self::generate_thumbnail) on the blocking pool.
    ///
    /// If the returned future is dropped before the task finishes, `dest` is
    /// removed once the task has written it, so an abandoned upload leaves no
    /// thumbnail behind.
    pub async fn write_thumbnail(
        &self,
        image: DynamicImage,
        format: ThumbnailFormat,
        dest: PathBuf,
    ) -> Result<(u32, u32)> {
        let abandoned = AbandonedThumbnail::new(dest.clone());
        let flag = abandoned.flag.clone();
        let images = self.clone();

        let size = tokio::task::spawn_blocking(move || {
            let size = images.generate_thumbnail(&image, format, &dest)?;
            if flag.load(Ordering::SeqCst) {
                remove_abandoned(&dest);
                return Err(AppError::Internal(format!(
                    "thumbnail {} abandoned",
                    dest.display()
                )));
            }
            Ok(size)
        })
        .await??;

        abandoned.disarm();
        Ok(size)
    }

    fn encode(
        &self,
        thumb: &DynamicImage,
        format: ThumbnailFormat,
        file: fs::File,
        dest: &Path,
    ) -> Result<()> {
        let context = || format!("encode {}", dest.display());
        let mut writer = BufWriter::new(file);

        match format {
            ThumbnailFormat::Jpeg => {
                // JPEG carries no alpha channel.
                let rgb = DynamicImage::ImageRgb8(thumb.to_rgb8());
                rgb.write_with_encoder(JpegEncoder::new_with_quality(
                    &mut writer,
                    self.jpeg_quality,
                ))
                .map_err(|e| map_image_error(context(), e))?;
            }
            ThumbnailFormat::Png => {
                thumb
                    .write_with_encoder(PngEncoder::new(&mut writer))
                    .map_err(|e| map_image_error(context(), e))?;
            }
        }

        writer
            .flush()
            .map_err(|e| AppError::fs(format!("flush {}", dest.display()), e))
    }
}

/// Marks a thumbnail task as abandoned when dropped while still armed.
///
/// The flag is raised before the path is removed; the task checks it after
/// writing. Whichever side runs second removes the file.
struct AbandonedThumbnail {
    flag: Arc<AtomicBool>,
    path: Option<PathBuf>,
}

impl AbandonedThumbnail {
    fn new(path: PathBuf) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            path: Some(path),
        }
    }

    fn disarm(mut self) {
        self.path = None;
    }
}

impl Drop for AbandonedThumbnail {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            self.flag.store(true, Ordering::SeqCst);
            remove_abandoned(&path);
        }
    }
}

fn remove_abandoned(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed abandoned thumbnail {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove abandoned thumbnail {:?}: {}", path, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{Rgba, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_fit_within_landscape() {
        assert_eq!(fit_within(800, 600, 300, 300), (300, 225));
        assert_eq!(fit_within(1920, 1080, 300, 300), (300, 168));
    }

    #[test]
    fn test_fit_within_portrait_and_square() {
        assert_eq!(fit_within(600, 800, 300, 300), (225, 300));
        assert_eq!(fit_within(50, 50, 300, 300), (300, 300));
    }

    #[test]
    fn test_fit_within_never_collapses_to_zero() {
        assert_eq!(fit_within(3000, 2, 300, 300), (300, 1));
        assert_eq!(fit_within(1, 5000, 300, 300), (1, 300));
    }

    #[test]
    fn test_nearest_neighbor_samples_exact_source_pixels() {
        let mut src = RgbaImage::new(2, 2);
        src.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        src.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        src.put_pixel(0, 1, Rgba([0, 0, 255, 255]));
        src.put_pixel(1, 1, Rgba([255, 255, 255, 255]));

        let out = NearestNeighbor
            .scale(&DynamicImage::ImageRgba8(src), 4, 4)
            .to_rgba8();

        assert_eq!(out.dimensions(), (4, 4));
        assert_eq!(*out.get_pixel(1, 1), Rgba([255, 0, 0, 255]));
        assert_eq!(*out.get_pixel(2, 0), Rgba([0, 255, 0, 255]));
        assert_eq!(*out.get_pixel(0, 3), Rgba([0, 0, 255, 255]));
        assert_eq!(*out.get_pixel(3, 3), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_thumbnail_format_family() {
        assert_eq!(ThumbnailFormat::for_source(ImageFormat::Png), ThumbnailFormat::Png);
        assert_eq!(ThumbnailFormat::for_source(ImageFormat::Jpeg), ThumbnailFormat::Jpeg);
        assert_eq!(ThumbnailFormat::for_source(ImageFormat::Gif), ThumbnailFormat::Jpeg);
        assert_eq!(ThumbnailFormat::for_source(ImageFormat::WebP).extension(), "jpg");
    }

    #[test]
    fn test_decode_and_thumbnail_png() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("wide.png");
        RgbImage::from_pixel(400, 100, image::Rgb([10, 20, 30]))
            .save_with_format(&source, ImageFormat::Png)
            .unwrap();

        let processor = ImageProcessor::new(300, 85);
        let (decoded, format) = processor.decode(&source).unwrap();
        assert_eq!(format, ImageFormat::Png);
        assert_eq!(ImageProcessor::dimensions(&decoded), (400, 100));

        let dest = temp_dir.path().join("wide_thumb.png");
        let size = processor
            .generate_thumbnail(&decoded, ThumbnailFormat::Png, &dest)
            .unwrap();
        assert_eq!(size, (300, 75));

        let thumb = image::open(&dest).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (300, 75));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("fake.bin");
        std::fs::write(&source, b"definitely not an image").unwrap();

        let err = ImageProcessor::new(300, 85).decode(&source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_truncated_png_is_a_decode_error() {
        let temp_dir = TempDir::new().unwrap();
        let full = temp_dir.path().join("full.png");
        RgbImage::from_fn(200, 200, |x, y| image::Rgb([x as u8, y as u8, 0]))
            .save_with_format(&full, ImageFormat::Png)
            .unwrap();
        let bytes = std::fs::read(&full).unwrap();
        let half = temp_dir.path().join("half.png");
        std::fs::write(&half, &bytes[..bytes.len() / 2]).unwrap();

        let err = ImageProcessor::new(300, 85).decode(&half).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_missing_source_is_a_filesystem_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = ImageProcessor::new(300, 85)
            .decode(&temp_dir.path().join("nope.png"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Filesystem);
    }

    struct SlowScaler;

    impl ThumbnailScaler for SlowScaler {
        fn scale(&self, _source: &DynamicImage, _w: u32, _h: u32) -> DynamicImage {
            std::thread::sleep(std::time::Duration::from_millis(300));
            DynamicImage::new_rgb8(4, 4)
        }
    }

    #[tokio::test]
    async fn test_write_thumbnail_runs_off_the_runtime() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("t.png");

        let size = ImageProcessor::new(300, 85)
            .write_thumbnail(DynamicImage::new_rgb8(600, 300), ThumbnailFormat::Png, dest.clone())
            .await
            .unwrap();

        assert_eq!(size, (300, 150));
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_abandoned_thumbnail_is_removed() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("late_thumb.jpg");
        let processor = ImageProcessor::with_scaler(Arc::new(SlowScaler), 300, 85);

        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            processor.write_thumbnail(DynamicImage::new_rgb8(10, 10), ThumbnailFormat::Jpeg, dest.clone()),
        )
        .await;
        assert!(outcome.is_err());

        // Let the blocking task finish writing.
        tokio::time::sleep(std::time::Duration::from_millis(600)).await;
        assert!(!dest.exists());
    }

    #[test]
    fn test_custom_scaler_is_used() {
        struct Fixed;
        impl ThumbnailScaler for Fixed {
            fn scale(&self, _source: &DynamicImage, _w: u32, _h: u32) -> DynamicImage {
                DynamicImage::new_rgb8(7, 3)
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("t.jpg");
        let processor = ImageProcessor::with_scaler(Arc::new(Fixed), 300, 85);
        let size = processor
            .generate_thumbnail(&DynamicImage::new_rgb8(10, 10), ThumbnailFormat::Jpeg, &dest)
            .unwrap();

        assert_eq!(size, (7, 3));
        assert_eq!(image::open(&dest).unwrap().width(), 7);
    }
}
