use image::{
    ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba,
    imageops::{self, FilterType},
};

/// A decoded image, rows stored top to bottom.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageAsset {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub bytes_per_channel: u32,
    pub pixel_data: Vec<u8>,
}

impl ImageAsset {
    pub fn new(width: u32, height: u32, channels: u32, bytes_per_channel: u32, pixel_data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            bytes_per_channel,
            pixel_data,
        }
    }

    /// A zero filled image.
    pub fn zeroed(width: u32, height: u32, channels: u32, bytes_per_channel: u32) -> Self {
        let mut image = Self::new(width, height, channels, bytes_per_channel, Vec::new());
        image.pixel_data = vec![0; image.expected_byte_len()];
        image
    }

    pub fn pixel_size(&self) -> usize {
        self.channels as usize * self.bytes_per_channel as usize
    }

    pub fn row_size(&self) -> usize {
        self.width as usize * self.pixel_size()
    }

    pub fn expected_byte_len(&self) -> usize {
        self.row_size() * self.height as usize
    }

    /// Has at least one pixel and enough data for all of them.
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixel_size() > 0
            && self.pixel_data.len() >= self.expected_byte_len()
    }

    pub fn byte_size(&self) -> usize {
        self.pixel_data.len()
    }
}

/// A block of pixels, measured from the top left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRectangle {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn fits(&self, image: &ImageAsset) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.width >= 0
            && self.height >= 0
            && (self.x + self.width) as u32 <= image.width
            && (self.y + self.height) as u32 <= image.height
    }
}

/// Copies `source_pixels` of `source` into `target_pixels` of `target`,
/// resampling when the two differ in size.
///
/// Returns `false` without touching `target` if the pixel formats differ,
/// a rectangle leaves its image or the format cannot be resampled.
pub fn blit_image(
    target: &mut ImageAsset,
    target_pixels: PixelRectangle,
    source: &ImageAsset,
    source_pixels: PixelRectangle,
) -> bool {
    if target.channels != source.channels
        || target.bytes_per_channel != source.bytes_per_channel
        || !target.is_valid()
        || !source.is_valid()
        || !target_pixels.fits(target)
        || !source_pixels.fits(source)
    {
        return false;
    }

    if target_pixels.width == 0 || target_pixels.height == 0 {
        return true;
    }

    let region = copy_region(source, source_pixels);

    if target_pixels.width == source_pixels.width && target_pixels.height == source_pixels.height {
        write_region(target, target_pixels, &region);
        return true;
    }

    if source_pixels.width == 0 || source_pixels.height == 0 || source.bytes_per_channel != 1 {
        return false;
    }

    let (width, height) = (source_pixels.width as u32, source_pixels.height as u32);
    let (new_width, new_height) = (target_pixels.width as u32, target_pixels.height as u32);
    let resized = match source.channels {
        1 => resize::<Luma<u8>>(region, width, height, new_width, new_height),
        2 => resize::<LumaA<u8>>(region, width, height, new_width, new_height),
        3 => resize::<Rgb<u8>>(region, width, height, new_width, new_height),
        4 => resize::<Rgba<u8>>(region, width, height, new_width, new_height),
        _ => None,
    };

    match resized {
        Some(resized) => {
            write_region(target, target_pixels, &resized);
            true
        }
        None => false,
    }
}

fn copy_region(image: &ImageAsset, pixels: PixelRectangle) -> Vec<u8> {
    let pixel_size = image.pixel_size();
    let row_size = image.row_size();
    let region_row = pixels.width as usize * pixel_size;

    let mut region = Vec::with_capacity(region_row * pixels.height as usize);
    for row in pixels.y as usize..(pixels.y + pixels.height) as usize {
        let start = row * row_size + pixels.x as usize * pixel_size;
        region.extend_from_slice(&image.pixel_data[start..start + region_row]);
    }
    region
}

fn write_region(image: &mut ImageAsset, pixels: PixelRectangle, region: &[u8]) {
    let pixel_size = image.pixel_size();
    let row_size = image.row_size();
    let region_row = pixels.width as usize * pixel_size;

    for (index, source_row) in region.chunks_exact(region_row).enumerate() {
        let start = (pixels.y as usize + index) * row_size + pixels.x as usize * pixel_size;
        image.pixel_data[start..start + region_row].copy_from_slice(source_row);
    }
}

fn resize<P: Pixel<Subpixel = u8> + 'static>(
    region: Vec<u8>,
    width: u32,
    height: u32,
    new_width: u32,
    new_height: u32,
) -> Option<Vec<u8>> {
    let buffer = ImageBuffer::<P, Vec<u8>>::from_raw(width, height, region)?;
    Some(imageops::resize(&buffer, new_width, new_height, FilterType::Triangle).into_raw())
}

/// The outcome of decoding an image. Decoders report problems instead of
/// failing so a broken image only fails the tile it belongs to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageReaderResult {
    pub image: Option<ImageAsset>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub trait ImageDecoder: Send + Sync + 'static {
    fn decode(&self, data: &[u8]) -> ImageReaderResult;
}

/// Decodes PNG and JPEG images to 8 bit RGBA.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, data: &[u8]) -> ImageReaderResult {
        match image::load_from_memory(data) {
            Ok(decoded) => {
                let rgba = decoded.to_rgba8();
                let (width, height) = rgba.dimensions();
                ImageReaderResult {
                    image: Some(ImageAsset::new(width, height, 4, 1, rgba.into_raw())),
                    ..Default::default()
                }
            }
            Err(error) => ImageReaderResult {
                errors: vec![format!("Image could not be decoded: {error}")],
                ..Default::default()
            },
        }
    }
}
