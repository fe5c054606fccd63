/// Corner coordinates in source-image pixels. Either corner may lie outside
/// the image, drawing code clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Converts a center-based box to corners, truncating toward zero.
    pub fn from_center(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x1: (x - width / 2.) as i32,
            y1: (y - height / 2.) as i32,
            x2: (x + width / 2.) as i32,
            y2: (y + height / 2.) as i32,
        }
    }
}
