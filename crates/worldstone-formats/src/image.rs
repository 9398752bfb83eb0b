//! Palette-indexed images
//!
//! Every decoder in this crate produces 8-bit palette indices. [`ImageView`]
//! and [`ImageViewMut`] are strided windows into a pixel buffer,
//! [`ImageBuffer`] owns one. [`ImageProvider`] is what a renderer consumes:
//! it reads pixels without knowing which format produced them.

use crate::error::{FormatError, FormatResult};

/// Read access to a rectangle of palette indices
pub trait ImageProvider {
    /// Width and height in pixels
    fn dimensions(&self) -> (usize, usize);

    /// Palette index at `(x, y)`, `None` outside the image
    fn pixel_at(&self, x: usize, y: usize) -> Option<u8>;

    /// Width in pixels
    fn width(&self) -> usize {
        self.dimensions().0
    }

    /// Height in pixels
    fn height(&self) -> usize {
        self.dimensions().1
    }

    /// Copy the pixels into a packed buffer
    fn to_buffer(&self) -> ImageBuffer {
        let (width, height) = self.dimensions();
        let mut image = ImageBuffer::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if let Some(pixel) = self.pixel_at(x, y) {
                    image.data[x + y * width] = pixel;
                }
            }
        }
        image
    }
}

fn check_layout(len: usize, width: usize, height: usize, stride: usize) -> FormatResult<()> {
    if width > stride {
        return Err(FormatError::CorruptData(format!(
            "image width {width} exceeds stride {stride}"
        )));
    }
    let needed = match height {
        0 => 0,
        rows => (rows - 1)
            .checked_mul(stride)
            .and_then(|n| n.checked_add(width))
            .ok_or_else(|| FormatError::CorruptData(format!("image {width}x{height} too large")))?,
    };
    if needed > len {
        return Err(FormatError::TruncatedData {
            offset: 0,
            requested: needed as u64,
            available: len as u64,
        });
    }
    Ok(())
}

/// Borrowed, strided image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageView<'a> {
    buffer: &'a [u8],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a> ImageView<'a> {
    /// View `height` rows of `width` pixels, rows `stride` bytes apart
    pub fn new(buffer: &'a [u8], width: usize, height: usize, stride: usize) -> FormatResult<Self> {
        check_layout(buffer.len(), width, height, stride)?;
        Ok(Self {
            buffer,
            width,
            height,
            stride,
        })
    }

    /// View a packed buffer
    pub fn packed(buffer: &'a [u8], width: usize, height: usize) -> FormatResult<Self> {
        Self::new(buffer, width, height, width)
    }

    /// Distance in bytes between two rows
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// True when the view holds no pixel
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Row `y`, `width` pixels long
    pub fn row(&self, y: usize) -> Option<&'a [u8]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.stride;
        self.buffer.get(start..start + self.width)
    }

    /// Rows top to bottom
    pub fn rows(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        (0..self.height).filter_map(|y| self.row(y))
    }

    /// Window contained in this view, `None` if it does not fit
    pub fn sub_view(&self, x: usize, y: usize, width: usize, height: usize) -> Option<Self> {
        if x.checked_add(width)? > self.width || y.checked_add(height)? > self.height {
            return None;
        }
        let start = x + y * self.stride;
        Some(Self {
            buffer: self.buffer.get(start..)?,
            width,
            height,
            stride: self.stride,
        })
    }

    /// Blit into `destination`, which must be at least as large
    pub fn copy_to(&self, destination: &mut ImageViewMut<'_>) -> FormatResult<()> {
        if destination.width < self.width || destination.height < self.height {
            return Err(FormatError::CorruptData(format!(
                "cannot copy a {}x{} image into {}x{}",
                self.width, self.height, destination.width, destination.height
            )));
        }
        for (y, row) in self.rows().enumerate() {
            let start = y * destination.stride;
            destination.buffer[start..start + row.len()].copy_from_slice(row);
        }
        Ok(())
    }
}

impl ImageProvider for ImageView<'_> {
    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn pixel_at(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width {
            return None;
        }
        self.row(y).map(|row| row[x])
    }
}

/// Mutable, strided image
#[derive(Debug, PartialEq, Eq)]
pub struct ImageViewMut<'a> {
    buffer: &'a mut [u8],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a> ImageViewMut<'a> {
    /// Mutable view of `height` rows of `width` pixels, rows `stride` bytes apart
    pub fn new(buffer: &'a mut [u8], width: usize, height: usize, stride: usize) -> FormatResult<Self> {
        check_layout(buffer.len(), width, height, stride)?;
        Ok(Self {
            buffer,
            width,
            height,
            stride,
        })
    }

    /// Distance in bytes between two rows
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Read-only view of the same pixels
    pub fn as_view(&self) -> ImageView<'_> {
        ImageView {
            buffer: &*self.buffer,
            width: self.width,
            height: self.height,
            stride: self.stride,
        }
    }

    /// Mutable row `y`
    pub fn row_mut(&mut self, y: usize) -> Option<&mut [u8]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.stride;
        self.buffer.get_mut(start..start + self.width)
    }

    /// Set the pixel at `(x, y)`; false when outside the image
    pub fn set_pixel(&mut self, x: usize, y: usize, value: u8) -> bool {
        if x >= self.width {
            return false;
        }
        self.row_mut(y).map(|row| row[x] = value).is_some()
    }

    /// Mutable window contained in this view, `None` if it does not fit
    pub fn sub_view_mut(&mut self, x: usize, y: usize, width: usize, height: usize) -> Option<ImageViewMut<'_>> {
        if x.checked_add(width)? > self.width || y.checked_add(height)? > self.height {
            return None;
        }
        let start = x + y * self.stride;
        Some(ImageViewMut {
            buffer: self.buffer.get_mut(start..)?,
            width,
            height,
            stride: self.stride,
        })
    }

    /// Fill `columns` x `rows` pixels starting at `(x, y)`, clipped to the image
    pub fn fill(&mut self, x: usize, y: usize, columns: usize, rows: usize, value: u8) {
        let x_end = x.saturating_add(columns).min(self.width);
        let y_end = y.saturating_add(rows).min(self.height);
        for row in y..y_end {
            let start = row * self.stride;
            if x < x_end {
                self.buffer[start + x..start + x_end].fill(value);
            }
        }
    }
}

impl ImageProvider for ImageViewMut<'_> {
    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn pixel_at(&self, x: usize, y: usize) -> Option<u8> {
        self.as_view().pixel_at(x, y)
    }
}

/// Owned, packed image
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageBuffer {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl ImageBuffer {
    /// Zero-filled image
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: vec![0; width * height],
            width,
            height,
        }
    }

    /// Wrap packed pixels; `data` must hold exactly `width * height` bytes
    pub fn from_vec(data: Vec<u8>, width: usize, height: usize) -> FormatResult<Self> {
        if width.checked_mul(height) != Some(data.len()) {
            return Err(FormatError::CorruptData(format!(
                "{} bytes cannot hold a {width}x{height} image",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Packed pixels, row-major
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Give back the pixels
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// True when the image holds no pixel
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow as a view
    pub fn view(&self) -> ImageView<'_> {
        ImageView {
            buffer: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }

    /// Borrow as a mutable view
    pub fn view_mut(&mut self) -> ImageViewMut<'_> {
        ImageViewMut {
            buffer: &mut self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }
}

impl ImageProvider for ImageBuffer {
    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn pixel_at(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[x + y * self.width])
    }
}

/// Hands out image storage to decoders.
///
/// An allocator decides where decoded frames land, for example one large
/// atlas shared by many frames.
pub trait ImageAllocator {
    /// Storage for an image of the given size, `None` for an empty size
    fn new_image(&mut self, width: usize, height: usize) -> Option<ImageViewMut<'_>>;
}

/// Allocates one buffer per image
#[derive(Debug, Clone, Default)]
pub struct SimpleImageAllocator {
    images: Vec<ImageBuffer>,
}

impl SimpleImageAllocator {
    /// Empty allocator
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of images handed out
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// True when no image was handed out
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Image number `index`, in allocation order
    pub fn image(&self, index: usize) -> Option<ImageView<'_>> {
        self.images.get(index).map(ImageBuffer::view)
    }

    /// Move the pixels of image `index` out; the slot is left empty so later
    /// indices stay valid
    pub fn take_buffer(&mut self, index: usize) -> Option<Vec<u8>> {
        self.images
            .get_mut(index)
            .map(|image| std::mem::take(image).into_vec())
    }
}

impl ImageAllocator for SimpleImageAllocator {
    fn new_image(&mut self, width: usize, height: usize) -> Option<ImageViewMut<'_>> {
        if width == 0 || height == 0 {
            return None;
        }
        self.images.push(ImageBuffer::new(width, height));
        self.images.last_mut().map(ImageBuffer::view_mut)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbered(width: usize, height: usize) -> ImageBuffer {
        let data = (0..width * height).map(|i| i as u8).collect();
        ImageBuffer::from_vec(data, width, height).unwrap()
    }

    #[test]
    fn test_view_layout_checks() {
        let data = [0u8; 10];
        assert!(ImageView::new(&data, 4, 3, 3).is_err());
        assert!(ImageView::new(&data, 3, 3, 4).is_err());
        // the last row does not need a full stride
        assert!(ImageView::new(&data, 2, 3, 4).is_ok());
    }

    #[test]
    fn test_sub_view() {
        let image = numbered(4, 4);
        let view = image.view();
        let sub = view.sub_view(1, 2, 3, 2).unwrap();
        assert_eq!(sub.dimensions(), (3, 2));
        assert_eq!(sub.stride(), 4);
        assert_eq!(sub.pixel_at(0, 0), Some(9));
        assert_eq!(sub.pixel_at(2, 1), Some(15));
        assert_eq!(sub.pixel_at(3, 0), None);

        assert!(view.sub_view(2, 0, 3, 1).is_none());
        assert!(view.sub_view(0, 4, 1, 1).is_none());
        assert!(view.sub_view(0, 0, 4, 4).is_some());
    }

    #[test]
    fn test_copy_to() {
        let source = numbered(2, 2);
        let mut target = ImageBuffer::new(4, 3);
        {
            let mut view = target.view_mut();
            let mut window = view.sub_view_mut(1, 1, 2, 2).unwrap();
            source.view().copy_to(&mut window).unwrap();
        }
        assert_eq!(
            target.as_slice(),
            &[0, 0, 0, 0, 0, 0, 1, 0, 0, 2, 3, 0]
        );

        let mut small = ImageBuffer::new(1, 1);
        assert!(source.view().copy_to(&mut small.view_mut()).is_err());
    }

    #[test]
    fn test_fill_clips() {
        let mut image = ImageBuffer::new(3, 3);
        image.view_mut().fill(1, 1, 5, 5, 7);
        assert_eq!(image.as_slice(), &[0, 0, 0, 0, 7, 7, 0, 7, 7]);
        image.view_mut().fill(3, 0, 1, 1, 9);
        assert_eq!(image.pixel_at(2, 0), Some(0));
    }

    #[test]
    fn test_set_pixel() {
        let mut image = ImageBuffer::new(2, 2);
        let mut view = image.view_mut();
        assert!(view.set_pixel(1, 1, 5));
        assert!(!view.set_pixel(2, 0, 5));
        assert_eq!(image.pixel_at(1, 1), Some(5));
    }

    #[test]
    fn test_provider_to_buffer() {
        let image = numbered(4, 2);
        let sub = image.view().sub_view(1, 0, 2, 2).unwrap();
        let packed = sub.to_buffer();
        assert_eq!(packed.as_slice(), &[1, 2, 5, 6]);
        assert_eq!(packed.width(), 2);
    }

    #[test]
    fn test_simple_allocator() {
        let mut allocator = SimpleImageAllocator::new();
        assert!(allocator.new_image(0, 4).is_none());
        allocator.new_image(2, 1).unwrap().fill(0, 0, 2, 1, 3);
        allocator.new_image(1, 1).unwrap().fill(0, 0, 1, 1, 4);
        assert_eq!(allocator.len(), 2);
        assert_eq!(allocator.image(1).unwrap().pixel_at(0, 0), Some(4));

        assert_eq!(allocator.take_buffer(0), Some(vec![3, 3]));
        assert!(allocator.image(0).unwrap().is_empty());
        assert_eq!(allocator.image(1).unwrap().pixel_at(0, 0), Some(4));
        assert_eq!(allocator.take_buffer(5), None);
    }
}
