/// Errors raised when wrapping a raw grayscale buffer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid grayscale image dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },
    #[error("row stride {stride} is smaller than image width {width}")]
    StrideTooSmall { stride: usize, width: usize },
    #[error("grayscale buffer too short (expected at least {expected} bytes, got {got})")]
    BufferTooShort { expected: usize, got: usize },
}

/// Borrowed 8-bit grayscale image, row-major with an explicit row stride.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub data: &'a [u8],
}

impl<'a> GrayImageView<'a> {
    /// Wrap a buffer, checking that every row fits inside `data`.
    pub fn new(
        width: usize,
        height: usize,
        stride: usize,
        data: &'a [u8],
    ) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidDimensions { width, height });
        }
        if stride < width {
            return Err(ImageError::StrideTooSmall { stride, width });
        }
        let expected = stride
            .checked_mul(height - 1)
            .and_then(|v| v.checked_add(width))
            .ok_or(ImageError::InvalidDimensions { width, height })?;
        if data.len() < expected {
            return Err(ImageError::BufferTooShort {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// Tightly packed buffer (`stride == width`).
    pub fn packed(width: usize, height: usize, data: &'a [u8]) -> Result<Self, ImageError> {
        Self::new(width, height, width, data)
    }
}
