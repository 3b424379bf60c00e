use crate::{ImageAsset, LoadedRasterOverlayImage, PixelRectangle, blit_image};
use bevy_log::debug;
use itertools::Itertools;
use std::sync::Arc;
use tessera_geometry::Rectangle;

/// Fractions of a pixel below this are treated as rounding noise.
const PIXEL_TOLERANCE: f64 = 0.01;

/// One fetched quadtree tile, or the part of an ancestor standing in for it.
#[derive(Clone, Debug)]
pub struct LoadedQuadtreeImage {
    pub loaded: Arc<LoadedRasterOverlayImage>,
    /// The projected part of `loaded` to use, `None` to use all of it.
    pub subset: Option<Rectangle>,
}

impl LoadedQuadtreeImage {
    pub fn new(loaded: LoadedRasterOverlayImage) -> Self {
        Self {
            loaded: Arc::new(loaded),
            subset: None,
        }
    }

    fn valid_image(&self) -> Option<&ImageAsset> {
        self.loaded.image.as_ref().filter(|image| image.is_valid())
    }

    /// Bytes this entry keeps alive. Ancestor subsets share their ancestor's
    /// image and count nothing.
    pub fn byte_size(&self) -> usize {
        match self.subset {
            Some(_) => 0,
            None => self.valid_image().map_or(0, ImageAsset::byte_size),
        }
    }
}

fn round_down(value: f64, tolerance: f64) -> f64 {
    let rounded = value.round();
    if (value - rounded).abs() < tolerance {
        rounded
    } else {
        value.floor()
    }
}

fn round_up(value: f64, tolerance: f64) -> f64 {
    let rounded = value.round();
    if (value - rounded).abs() < tolerance {
        rounded
    } else {
        value.ceil()
    }
}

/// The pixels of `image`, which covers `total`, lying under `part`.
///
/// Pixels are counted from the top left, projected coordinates from the
/// bottom left.
fn compute_pixel_rectangle(image: &ImageAsset, total: &Rectangle, part: &Rectangle) -> PixelRectangle {
    let width = image.width as f64;
    let height = image.height as f64;

    let x = round_down(width * (part.minimum_x - total.minimum_x) / total.width(), PIXEL_TOLERANCE).max(0.0);
    let y = round_down(height * (total.maximum_y - part.maximum_y) / total.height(), PIXEL_TOLERANCE).max(0.0);
    let maximum_x = round_up(width * (part.maximum_x - total.minimum_x) / total.width(), PIXEL_TOLERANCE).min(width);
    let maximum_y =
        round_up(height * (total.maximum_y - part.minimum_y) / total.height(), PIXEL_TOLERANCE).min(height);

    PixelRectangle::new(
        x as i32,
        y as i32,
        (maximum_x - x) as i32,
        (maximum_y - y) as i32,
    )
}

#[derive(Debug, PartialEq)]
struct CombinedImageMeasurements {
    rectangle: Rectangle,
    width: u32,
    height: u32,
    channels: u32,
    bytes_per_channel: u32,
}

/// Sizes the composite at the pixel density of the finest image. Ancestor
/// images are coarser by a power of two, so their pixels line up with it.
fn measure_combined_image(target: &Rectangle, images: &[LoadedQuadtreeImage]) -> Option<CombinedImageMeasurements> {
    let mut width_per_pixel = f64::MAX;
    let mut height_per_pixel = f64::MAX;
    let mut channels = 0;
    let mut bytes_per_channel = 0;

    for image in images {
        let Some(asset) = image.valid_image() else {
            continue;
        };
        width_per_pixel = width_per_pixel.min(image.loaded.rectangle.width() / asset.width as f64);
        height_per_pixel = height_per_pixel.min(image.loaded.rectangle.height() / asset.height as f64);
        channels = channels.max(asset.channels);
        bytes_per_channel = bytes_per_channel.max(asset.bytes_per_channel);
    }

    let mut combined: Option<Rectangle> = None;
    for image in images {
        if image.valid_image().is_none() {
            continue;
        }

        let source = image.subset.unwrap_or(image.loaded.rectangle);
        let Some(mut intersection) = target.intersect(&source) else {
            continue;
        };

        // Grow to whole pixels, keeping at least one.
        intersection.minimum_x = round_down(intersection.minimum_x / width_per_pixel, PIXEL_TOLERANCE) * width_per_pixel;
        intersection.minimum_y =
            round_down(intersection.minimum_y / height_per_pixel, PIXEL_TOLERANCE) * height_per_pixel;
        intersection.maximum_x = round_up(intersection.maximum_x / width_per_pixel, PIXEL_TOLERANCE) * width_per_pixel;
        intersection.maximum_y =
            round_up(intersection.maximum_y / height_per_pixel, PIXEL_TOLERANCE) * height_per_pixel;
        if intersection.minimum_x == intersection.maximum_x {
            intersection.maximum_x += width_per_pixel;
        }
        if intersection.minimum_y == intersection.maximum_y {
            intersection.maximum_y += height_per_pixel;
        }

        combined = Some(match combined {
            Some(combined) => combined.union(&intersection),
            None => intersection,
        });
    }

    let rectangle = combined?;
    Some(CombinedImageMeasurements {
        rectangle,
        width: round_up(rectangle.width() / width_per_pixel, PIXEL_TOLERANCE).max(1.0) as u32,
        height: round_up(rectangle.height() / height_per_pixel, PIXEL_TOLERANCE).max(1.0) as u32,
        channels,
        bytes_per_channel,
    })
}

/// Composites `images` into one image covering at least `target`.
///
/// Images that failed leave their area zeroed. If every image is an
/// ancestor standing in for a failed tile, nothing is gained over the
/// ancestor itself and no image is produced.
pub(crate) fn combine_images(target: &Rectangle, images: &[LoadedQuadtreeImage]) -> LoadedRasterOverlayImage {
    let problems = images
        .iter()
        .flat_map(|image| image.loaded.errors.iter().chain(&image.loaded.warnings))
        .cloned()
        .unique()
        .collect_vec();

    let useful = images
        .iter()
        .any(|image| image.subset.is_none() && image.valid_image().is_some());
    let measurements = useful
        .then(|| measure_combined_image(target, images))
        .flatten()
        .filter(|measurements| measurements.channels > 0 && measurements.bytes_per_channel > 0);

    let Some(measurements) = measurements else {
        return LoadedRasterOverlayImage {
            rectangle: *target,
            errors: problems,
            more_detail_available: true,
            ..Default::default()
        };
    };

    let mut combined = ImageAsset::zeroed(
        measurements.width,
        measurements.height,
        measurements.channels,
        measurements.bytes_per_channel,
    );
    let mut more_detail_available = false;

    for image in images {
        let Some(source) = image.valid_image() else {
            continue;
        };
        more_detail_available |= image.loaded.more_detail_available;

        let source_part = image.subset.unwrap_or(image.loaded.rectangle);
        let Some(overlap) = measurements.rectangle.intersect(&source_part) else {
            continue;
        };

        let target_pixels = compute_pixel_rectangle(&combined, &measurements.rectangle, &overlap);
        let source_pixels = compute_pixel_rectangle(source, &image.loaded.rectangle, &overlap);
        if !blit_image(&mut combined, target_pixels, source, source_pixels) {
            debug!("Could not copy {source_pixels:?} of a {}x{} image into a composite", source.width, source.height);
        }
    }

    let credits = images
        .iter()
        .filter(|image| image.valid_image().is_some())
        .flat_map(|image| image.loaded.credits.iter().cloned())
        .unique()
        .collect();

    LoadedRasterOverlayImage {
        image: Some(combined),
        rectangle: measurements.rectangle,
        credits,
        errors: Vec::new(),
        warnings: problems,
        more_detail_available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Credit;

    fn uniform(rectangle: Rectangle, size: u32, value: u8) -> LoadedRasterOverlayImage {
        LoadedRasterOverlayImage {
            image: Some(ImageAsset::new(size, size, 4, 1, vec![value; (size * size * 4) as usize])),
            rectangle,
            credits: vec![Credit::new("imagery", true)],
            ..Default::default()
        }
    }

    fn row(image: &ImageAsset, row: usize) -> Vec<u8> {
        image.pixel_data[row * image.row_size()..(row + 1) * image.row_size()]
            .chunks(4)
            .map(|pixel| pixel[0])
            .collect()
    }

    #[test]
    fn rounding_tolerates_noise() {
        assert_eq!(round_down(2.995, PIXEL_TOLERANCE), 3.0);
        assert_eq!(round_down(2.9, PIXEL_TOLERANCE), 2.0);
        assert_eq!(round_up(3.005, PIXEL_TOLERANCE), 3.0);
        assert_eq!(round_up(3.1, PIXEL_TOLERANCE), 4.0);
    }

    #[test]
    fn pixel_rectangles_start_at_the_top() {
        let image = ImageAsset::zeroed(4, 4, 4, 1);
        let total = Rectangle::new(0.0, 0.0, 4.0, 4.0);
        let pixels = compute_pixel_rectangle(&image, &total, &Rectangle::new(1.0, 0.0, 2.0, 1.0));
        assert_eq!(pixels, PixelRectangle::new(1, 3, 1, 1));
    }

    #[test]
    fn siblings_composite_side_by_side() {
        let images = [
            LoadedQuadtreeImage::new(uniform(Rectangle::new(0.0, 0.0, 1.0, 1.0), 2, 10)),
            LoadedQuadtreeImage::new(uniform(Rectangle::new(1.0, 0.0, 2.0, 1.0), 2, 20)),
        ];
        let combined = combine_images(&Rectangle::new(0.0, 0.0, 2.0, 1.0), &images);

        let image = combined.image.unwrap();
        assert_eq!((image.width, image.height), (4, 2));
        assert_eq!(combined.rectangle, Rectangle::new(0.0, 0.0, 2.0, 1.0));
        assert_eq!(row(&image, 0), vec![10, 10, 20, 20]);
        assert_eq!(row(&image, 1), vec![10, 10, 20, 20]);
        assert_eq!(combined.credits, vec![Credit::new("imagery", true)]);
    }

    #[test]
    fn ancestors_fill_in_at_the_finest_resolution() {
        let parent = LoadedQuadtreeImage::new(uniform(Rectangle::new(0.0, 0.0, 2.0, 2.0), 2, 200));
        let images = [
            LoadedQuadtreeImage::new(uniform(Rectangle::new(0.0, 0.0, 1.0, 1.0), 2, 10)),
            LoadedQuadtreeImage {
                subset: Some(Rectangle::new(1.0, 0.0, 2.0, 1.0)),
                ..parent
            },
        ];
        let combined = combine_images(&Rectangle::new(0.0, 0.0, 2.0, 1.0), &images);

        let image = combined.image.unwrap();
        assert_eq!((image.width, image.height), (4, 2));
        assert_eq!(row(&image, 0), vec![10, 10, 200, 200]);
        assert_eq!(row(&image, 1), vec![10, 10, 200, 200]);
    }

    #[test]
    fn failed_parts_become_warnings() {
        let failed = LoadedRasterOverlayImage::failed(Rectangle::new(1.0, 0.0, 2.0, 1.0), "not found");
        let images = [
            LoadedQuadtreeImage::new(uniform(Rectangle::new(0.0, 0.0, 1.0, 1.0), 2, 10)),
            LoadedQuadtreeImage::new(failed),
        ];
        let combined = combine_images(&Rectangle::new(0.0, 0.0, 2.0, 1.0), &images);

        // Only the loaded half is measured.
        let image = combined.image.unwrap();
        assert_eq!((image.width, image.height), (2, 2));
        assert_eq!(combined.rectangle, Rectangle::new(0.0, 0.0, 1.0, 1.0));
        assert!(combined.errors.is_empty());
        assert_eq!(combined.warnings, vec!["not found".to_string()]);
    }

    #[test]
    fn only_ancestors_produce_no_image() {
        let parent = LoadedQuadtreeImage::new(uniform(Rectangle::new(0.0, 0.0, 2.0, 2.0), 2, 200));
        let images = [LoadedQuadtreeImage {
            subset: Some(Rectangle::new(0.0, 0.0, 1.0, 1.0)),
            ..parent
        }];
        let combined = combine_images(&Rectangle::new(0.0, 0.0, 1.0, 1.0), &images);
        assert!(combined.image.is_none());
        assert_eq!(images[0].byte_size(), 0);
    }
}
