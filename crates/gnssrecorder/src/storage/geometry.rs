//! GeoPackage binary geometry encoding and bounding-box tracking.

use serde::Serialize;

/// Spatial reference id of WGS 84 geographic coordinates.
pub const WGS84_SRS_ID: i32 = 4326;

/// WKB geometry type code for a three-dimensional point.
const WKB_POINT_Z: u32 = 1001;

/// Flags byte: little endian, no envelope, not empty, standard binary.
const FLAGS_LITTLE_ENDIAN_NO_ENVELOPE: u8 = 0x01;

/// Encoded size of a point blob: 8 byte header plus 29 byte WKB body.
pub const POINT_BLOB_LEN: usize = 8 + 1 + 4 + 24;

/// Encode a WGS 84 Point Z as a GeoPackage geometry blob.
///
/// `x` is longitude and `y` is latitude, matching the axis order of the
/// `geom` column.
#[must_use]
pub fn encode_point_z(x: f64, y: f64, z: f64) -> Vec<u8> {
    let mut blob = Vec::with_capacity(POINT_BLOB_LEN);
    blob.extend_from_slice(b"GP");
    blob.push(0);
    blob.push(FLAGS_LITTLE_ENDIAN_NO_ENVELOPE);
    blob.extend_from_slice(&WGS84_SRS_ID.to_le_bytes());

    blob.push(1);
    blob.extend_from_slice(&WKB_POINT_Z.to_le_bytes());
    blob.extend_from_slice(&x.to_le_bytes());
    blob.extend_from_slice(&y.to_le_bytes());
    blob.extend_from_slice(&z.to_le_bytes());
    blob
}

/// Decode the coordinates of a point blob written by [`encode_point_z`].
///
/// Returns `None` for blobs with a different layout.
#[must_use]
pub fn decode_point_z(blob: &[u8]) -> Option<(f64, f64, f64)> {
    if blob.len() != POINT_BLOB_LEN
        || &blob[..2] != b"GP"
        || blob[3] != FLAGS_LITTLE_ENDIAN_NO_ENVELOPE
    {
        return None;
    }
    let body = &blob[8..];
    if body[0] != 1 || u32::from_le_bytes(body[1..5].try_into().ok()?) != WKB_POINT_Z {
        return None;
    }
    let read = |offset: usize| -> Option<f64> {
        Some(f64::from_le_bytes(body[offset..offset + 8].try_into().ok()?))
    };
    Some((read(5)?, read(13)?, read(21)?))
}

/// Extent of the observation points written so far.
///
/// Starts inverted so the first point always widens it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    /// Smallest longitude seen.
    pub min_x: f64,
    /// Largest longitude seen.
    pub max_x: f64,
    /// Smallest latitude seen.
    pub min_y: f64,
    /// Largest latitude seen.
    pub max_y: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BoundingBox {
    /// The inverted sentinel a fresh store starts with.
    pub const EMPTY: Self = Self {
        min_x: 180.0,
        max_x: -180.0,
        min_y: 90.0,
        max_y: -90.0,
    };

    /// Whether no point has been added yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Widen the box to include `(x, y)`.
    ///
    /// Returns `true` when any edge moved.
    pub fn extend(&mut self, x: f64, y: f64) -> bool {
        let mut changed = false;
        if x < self.min_x {
            self.min_x = x;
            changed = true;
        }
        if x > self.max_x {
            self.max_x = x;
            changed = true;
        }
        if y < self.min_y {
            self.min_y = y;
            changed = true;
        }
        if y > self.max_y {
            self.max_y = y;
            changed = true;
        }
        changed
    }

    /// Whether `(x, y)` lies inside the box, edges included.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}
