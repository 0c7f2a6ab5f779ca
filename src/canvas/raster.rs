//! Canvas rasterization
//!
//! Renders the stroke buffer onto a black RGB image at the frame
//! resolution. Segments are drawn by stamping filled disks along the line,
//! which gives round caps and joins at any thickness.

use super::state::Segment;
use crate::config::{CanvasConfig, FrameConfig};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("Failed to encode canvas: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Image size and stroke style
#[derive(Debug, Clone, PartialEq)]
pub struct Rasterizer {
    width: u32,
    height: u32,
    thickness: u32,
    color: [u8; 3],
}

impl Rasterizer {
    pub fn new(width: u32, height: u32, thickness: u32, color: [u8; 3]) -> Self {
        Self {
            width,
            height,
            thickness: thickness.max(1),
            color,
        }
    }

    pub fn from_config(frame: &FrameConfig, canvas: &CanvasConfig) -> Self {
        Self::new(
            frame.width,
            frame.height,
            canvas.stroke_thickness,
            canvas.stroke_color,
        )
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Draw every segment onto a fresh black image
    pub fn render(&self, segments: &[Segment]) -> RgbImage {
        let mut image = RgbImage::new(self.width, self.height);
        for segment in segments {
            self.draw_segment(&mut image, segment);
        }
        image
    }

    /// Render and encode as PNG
    pub fn encode_png(&self, segments: &[Segment]) -> Result<Vec<u8>, RasterError> {
        let image = self.render(segments);
        let mut png_bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;
        Ok(png_bytes)
    }

    /// Render and write a PNG file
    pub fn save_png(&self, segments: &[Segment], path: &Path) -> Result<(), RasterError> {
        self.render(segments)
            .save_with_format(path, ImageFormat::Png)
            .map_err(|source| RasterError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!("Saved canvas snapshot to {}", path.display());
        Ok(())
    }

    fn draw_segment(&self, image: &mut RgbImage, segment: &Segment) {
        let Some(((x0, y0), (x1, y1))) = self.clip(segment) else {
            return;
        };
        let length = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        let steps = length.ceil().max(1.0) as u32;

        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            self.stamp(image, x0 + (x1 - x0) * t, y0 + (y1 - y0) * t);
        }
    }

    /// Clip a segment to the image grown by the stroke radius (Liang-Barsky)
    ///
    /// Returns `None` for segments with non-finite ends or that miss the
    /// image entirely.
    fn clip(&self, segment: &Segment) -> Option<((f32, f32), (f32, f32))> {
        let (x0, y0) = segment.from;
        let (x1, y1) = segment.to;
        if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
            return None;
        }

        let margin = self.thickness as f32 / 2.0 + 1.0;
        let (min_x, max_x) = (-margin, self.width as f32 + margin);
        let (min_y, max_y) = (-margin, self.height as f32 + margin);
        let (dx, dy) = (x1 - x0, y1 - y0);

        let mut t0 = 0.0f32;
        let mut t1 = 1.0f32;
        for (p, q) in [
            (-dx, x0 - min_x),
            (dx, max_x - x0),
            (-dy, y0 - min_y),
            (dy, max_y - y0),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return None;
            }
        }

        Some((
            (x0 + dx * t0, y0 + dy * t0),
            (x0 + dx * t1, y0 + dy * t1),
        ))
    }

    fn stamp(&self, image: &mut RgbImage, cx: f32, cy: f32) {
        let radius = self.thickness as f32 / 2.0;
        let min_x = (cx - radius).floor().max(0.0) as i64;
        let min_y = (cy - radius).floor().max(0.0) as i64;
        let max_x = ((cx + radius).ceil() as i64).min(self.width as i64 - 1);
        let max_y = ((cy + radius).ceil() as i64).min(self.height as i64 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= radius * radius {
                    image.put_pixel(x as u32, y as u32, Rgb(self.color));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGENTA: [u8; 3] = [255, 0, 255];

    fn rasterizer() -> Rasterizer {
        Rasterizer::new(200, 100, 10, MAGENTA)
    }

    fn segment(from: (f32, f32), to: (f32, f32)) -> Segment {
        Segment { from, to }
    }

    #[test]
    fn test_empty_canvas_is_black() {
        let image = rasterizer().render(&[]);
        assert_eq!(image.dimensions(), (200, 100));
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_segment_is_drawn_with_thickness() {
        let image = rasterizer().render(&[segment((20.0, 50.0), (180.0, 50.0))]);
        assert_eq!(image.get_pixel(100, 50).0, MAGENTA);
        assert_eq!(image.get_pixel(100, 53).0, MAGENTA);
        assert_eq!(image.get_pixel(100, 60).0, [0, 0, 0]);
        assert_eq!(image.get_pixel(5, 50).0, [0, 0, 0]);
    }

    #[test]
    fn test_strokes_are_clipped_to_image() {
        let image = rasterizer().render(&[segment((-50.0, -50.0), (250.0, 150.0))]);
        assert_eq!(image.dimensions(), (200, 100));
        assert_eq!(image.get_pixel(100, 50).0, MAGENTA);
    }

    #[test]
    fn test_far_off_image_endpoint_renders_quickly() {
        let rasterizer = Rasterizer::new(1280, 720, 10, MAGENTA);
        let started = std::time::Instant::now();
        let image = rasterizer.render(&[
            segment((100.0, 100.0), (1e9, 100.0)),
            segment((100.0, 200.0), (-1e9, -1e9)),
        ]);
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        assert_eq!(image.get_pixel(1279, 100).0, MAGENTA);
        assert_eq!(image.get_pixel(100, 400).0, [0, 0, 0]);
    }

    #[test]
    fn test_non_finite_segment_is_skipped() {
        let image = rasterizer().render(&[
            segment((10.0, 10.0), (f32::INFINITY, 10.0)),
            segment((f32::NAN, 50.0), (100.0, 50.0)),
        ]);
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_segment_outside_image_draws_nothing() {
        let image = rasterizer().render(&[segment((-500.0, -500.0), (-400.0, 900.0))]);
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_zero_length_segment_draws_a_dot() {
        let image = rasterizer().render(&[segment((50.0, 50.0), (50.0, 50.0))]);
        assert_eq!(image.get_pixel(50, 50).0, MAGENTA);
    }

    #[test]
    fn test_encode_png_signature() {
        let png = rasterizer()
            .encode_png(&[segment((0.0, 0.0), (10.0, 10.0))])
            .unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("canvas.png");
        rasterizer()
            .save_png(&[segment((10.0, 10.0), (90.0, 90.0))], &path)
            .unwrap();

        let reloaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(reloaded.dimensions(), (200, 100));
        assert_eq!(reloaded.get_pixel(50, 50).0, MAGENTA);
    }

    #[test]
    fn test_save_png_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("canvas.png");
        let err = rasterizer().save_png(&[], &path).unwrap_err();
        assert!(matches!(err, RasterError::Write { .. }));
    }
}
