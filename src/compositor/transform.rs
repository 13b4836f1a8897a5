use kurbo::Affine;
use serde::{Deserialize, Serialize};

/// Placement of the overlay in canvas units. `(x, y)` is the top-left of
/// the unrotated, scaled box; rotation (degrees) pivots about its centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayTransform {
    pub x: f64,
    pub y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub rotation: f64,
}

impl Default for OverlayTransform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
        }
    }
}

impl OverlayTransform {
    pub fn scaled_size(&self, natural: (u32, u32)) -> (f64, f64) {
        (
            natural.0 as f64 * self.scale_x,
            natural.1 as f64 * self.scale_y,
        )
    }

    /// Maps overlay pixel coordinates to canvas coordinates.
    pub fn to_affine(&self, natural: (u32, u32)) -> Affine {
        self.box_affine(natural) * Affine::scale_non_uniform(self.scale_x, self.scale_y)
    }

    /// Maps the scaled (but unrotated) box to canvas coordinates.
    pub fn box_affine(&self, natural: (u32, u32)) -> Affine {
        let (w, h) = self.scaled_size(natural);
        Affine::translate((self.x + w / 2.0, self.y + h / 2.0))
            * Affine::rotate(self.rotation.to_radians())
            * Affine::translate((-w / 2.0, -h / 2.0))
    }
}

/// Keep rotations in `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    if (wrapped - 360.0).abs() < 1e-9 {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    #[test]
    fn unrotated_transform_maps_corners_to_scaled_box() {
        let t = OverlayTransform {
            x: 10.0,
            y: 20.0,
            scale_x: 0.5,
            scale_y: 2.0,
            rotation: 0.0,
        };
        let affine = t.to_affine((100, 10));
        let far = affine * Point::new(100.0, 10.0);
        assert!((far.x - 60.0).abs() < 1e-9);
        assert!((far.y - 40.0).abs() < 1e-9);
    }

    #[test]
    fn rotation_pivots_about_the_centre() {
        let t = OverlayTransform {
            x: 0.0,
            y: 0.0,
            rotation: 180.0,
            ..Default::default()
        };
        let affine = t.to_affine((10, 10));
        let origin = affine * Point::new(0.0, 0.0);
        assert!((origin.x - 10.0).abs() < 1e-9);
        assert!((origin.y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn degrees_wrap_into_range() {
        assert_eq!(normalize_degrees(370.0), 10.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
    }
}
