//! Decoded bitmap buffer and page rotation types.

/// Page rotation in quarter turns.
///
/// Only the four axis-aligned rotations are representable, so an invalid
/// rotation can never reach the decode worker or a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Rotation angle in degrees.
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Parse a rotation from degrees.
    ///
    /// Returns `None` for anything other than 0, 90, 180 or 270.
    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    /// Whether this rotation swaps page width and height.
    pub fn is_sideways(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    /// Rotate a further quarter turn clockwise.
    pub fn rotated_cw(self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg90,
            Rotation::Deg90 => Rotation::Deg180,
            Rotation::Deg180 => Rotation::Deg270,
            Rotation::Deg270 => Rotation::Deg0,
        }
    }
}

/// A decoded raster page at one resolution and rotation.
///
/// Pixels are tightly packed RGBA, 4 bytes per pixel. The pixel buffer is
/// owned; dropping the last reference releases the memory deterministically,
/// which is what the cache relies on when it evicts an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Raw pixel data (RGBA format)
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// Create a bitmap from raw RGBA pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 4);
        Self { width, height, pixels }
    }

    /// Create a bitmap filled with a single RGBA color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width as usize * height as usize) {
            pixels.extend_from_slice(&rgba);
        }
        Self { width, height, pixels }
    }

    /// Size of the pixel buffer in bytes.
    pub fn size_bytes(&self) -> usize {
        self.pixels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_degrees_round_trip() {
        for rotation in [Rotation::Deg0, Rotation::Deg90, Rotation::Deg180, Rotation::Deg270] {
            assert_eq!(Rotation::from_degrees(rotation.degrees()), Some(rotation));
        }
    }

    #[test]
    fn test_rotation_rejects_off_axis_angles() {
        assert_eq!(Rotation::from_degrees(45), None);
        assert_eq!(Rotation::from_degrees(91), None);
        assert_eq!(Rotation::from_degrees(359), None);
    }

    #[test]
    fn test_rotation_wraps_full_turns() {
        assert_eq!(Rotation::from_degrees(360), Some(Rotation::Deg0));
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
    }

    #[test]
    fn test_rotation_sideways() {
        assert!(!Rotation::Deg0.is_sideways());
        assert!(Rotation::Deg90.is_sideways());
        assert!(!Rotation::Deg180.is_sideways());
        assert!(Rotation::Deg270.is_sideways());
    }

    #[test]
    fn test_rotation_cw_cycle() {
        let mut rotation = Rotation::Deg0;
        for _ in 0..4 {
            rotation = rotation.rotated_cw();
        }
        assert_eq!(rotation, Rotation::Deg0);
    }

    #[test]
    fn test_bitmap_size_bytes() {
        let bitmap = Bitmap::filled(16, 8, [255, 255, 255, 255]);
        assert_eq!(bitmap.size_bytes(), 16 * 8 * 4);
        assert_eq!(bitmap.width, 16);
        assert_eq!(bitmap.height, 8);
    }

    #[test]
    fn test_bitmap_filled_pattern() {
        let bitmap = Bitmap::filled(2, 2, [1, 2, 3, 4]);
        assert_eq!(bitmap.pixels, vec![1, 2, 3, 4, 1, 2, 3, 4, 1, 2, 3, 4, 1, 2, 3, 4]);
    }
}
