//! Capture collaborators
//!
//! The broadcaster does not talk to devices. A [`FrameSource`] hands over
//! frames on its own schedule, either already encoded or as a raw pixel
//! buffer that a [`FrameEncoder`] turns into an image.
//!
//! Backends (a hardware pipeline that encodes on its own, a generic device
//! that yields raw buffers) are chosen once at construction; everything
//! downstream is written against these traits only.

#[cfg(feature = "jpeg")]
pub mod jpeg;
pub mod replay;
pub mod synthetic;

use bytes::Bytes;

#[cfg(feature = "jpeg")]
pub use jpeg::JpegEncoder;
pub use replay::ReplaySource;
pub use synthetic::SyntheticSource;

/// Pixel layout of a raw image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit grayscale
    Gray8,
    /// 8-bit RGB, interleaved
    Rgb8,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// Error type for raw image handling and encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// Pixel buffer size does not match the dimensions
    BufferSize { expected: usize, actual: usize },
    /// Image has a zero dimension
    EmptyImage,
    /// The codec rejected the image
    Encode(String),
}

impl std::fmt::Display for ImageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageError::BufferSize { expected, actual } => write!(
                f,
                "Pixel buffer is {} bytes, expected {}",
                actual, expected
            ),
            ImageError::EmptyImage => write!(f, "Image has a zero dimension"),
            ImageError::Encode(msg) => write!(f, "Encode failed: {}", msg),
        }
    }
}

impl std::error::Error for ImageError {}

/// An unencoded pixel buffer
#[derive(Debug, Clone)]
pub struct RawImage {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Bytes,
}

impl RawImage {
    /// Wrap a pixel buffer, checking its size against the dimensions
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: impl Into<Bytes>,
    ) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::EmptyImage);
        }

        let data = data.into();
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(ImageError::BufferSize {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Pixel bytes, row-major
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Crop the largest centered square
    ///
    /// Returns a clone when the image is already square.
    pub fn center_square(&self) -> RawImage {
        let side = self.width.min(self.height);
        if self.width == self.height {
            return self.clone();
        }

        let bpp = self.format.bytes_per_pixel();
        let x0 = ((self.width - side) / 2) as usize;
        let y0 = ((self.height - side) / 2) as usize;
        let stride = self.width as usize * bpp;
        let row_len = side as usize * bpp;

        let mut out = Vec::with_capacity(row_len * side as usize);
        for y in y0..y0 + side as usize {
            let start = y * stride + x0 * bpp;
            out.extend_from_slice(&self.data[start..start + row_len]);
        }

        RawImage {
            width: side,
            height: side,
            format: self.format,
            data: Bytes::from(out),
        }
    }
}

/// One frame as handed over by a source
#[derive(Debug, Clone)]
pub enum Captured {
    /// Already-encoded image bytes (hardware encoders)
    Encoded(Bytes),
    /// Raw pixels that still need encoding
    Raw(RawImage),
}

/// A capture device or pipeline
///
/// `acquire` may block on device I/O; it is only ever called from the
/// producer thread. A transient miss returns `None`.
pub trait FrameSource: Send {
    /// Get the next frame, or `None` on a transient miss
    fn acquire(&mut self) -> Option<Captured>;

    /// Human-readable name for logs
    fn name(&self) -> &str {
        "source"
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn acquire(&mut self) -> Option<Captured> {
        (**self).acquire()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Turns raw pixels into an encoded image
///
/// Pure function of its input; shared between threads.
pub trait FrameEncoder: Send + Sync {
    /// Encode a raw image
    fn encode(&self, image: &RawImage) -> Result<Bytes, ImageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_image_size_checked() {
        let err = RawImage::new(4, 2, PixelFormat::Rgb8, vec![0u8; 10]).unwrap_err();
        assert_eq!(
            err,
            ImageError::BufferSize {
                expected: 24,
                actual: 10
            }
        );

        assert_eq!(
            RawImage::new(0, 2, PixelFormat::Gray8, Vec::new()).unwrap_err(),
            ImageError::EmptyImage
        );

        assert!(RawImage::new(4, 2, PixelFormat::Gray8, vec![0u8; 8]).is_ok());
    }

    #[test]
    fn test_center_square_landscape() {
        // 4x2 gray, columns numbered 0..4 on each row
        let data: Vec<u8> = vec![0, 1, 2, 3, 10, 11, 12, 13];
        let image = RawImage::new(4, 2, PixelFormat::Gray8, data).unwrap();

        let square = image.center_square();
        assert_eq!(square.width(), 2);
        assert_eq!(square.height(), 2);
        assert_eq!(square.data().as_ref(), &[1, 2, 11, 12]);
    }

    #[test]
    fn test_center_square_portrait_rgb() {
        // 1x3 rgb, one pixel per row
        let data: Vec<u8> = vec![1, 1, 1, 2, 2, 2, 3, 3, 3];
        let image = RawImage::new(1, 3, PixelFormat::Rgb8, data).unwrap();

        let square = image.center_square();
        assert_eq!((square.width(), square.height()), (1, 1));
        assert_eq!(square.data().as_ref(), &[2, 2, 2]);
    }

    #[test]
    fn test_center_square_already_square() {
        let image = RawImage::new(2, 2, PixelFormat::Gray8, vec![1u8, 2, 3, 4]).unwrap();
        let square = image.center_square();

        assert_eq!(square.data(), image.data());
    }

    #[test]
    fn test_boxed_source() {
        struct Once(bool);
        impl FrameSource for Once {
            fn acquire(&mut self) -> Option<Captured> {
                if std::mem::replace(&mut self.0, false) {
                    Some(Captured::Encoded(Bytes::from_static(b"x")))
                } else {
                    None
                }
            }

            fn name(&self) -> &str {
                "once"
            }
        }

        let mut source: Box<dyn FrameSource> = Box::new(Once(true));
        assert_eq!(source.name(), "once");
        assert!(source.acquire().is_some());
        assert!(source.acquire().is_none());
    }
}
