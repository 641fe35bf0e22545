//! Rendering spots into a label image and reading them back.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::raster::{Calibration, Dimensions, LabelStack};
use crate::spot::{Spot, SpotCollection, SpotId};

/// Feature under which [`spots_from_labels`] records the source label.
pub const LABEL_FEATURE: &str = "LABEL";

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Frame {frame} holds {count} spots, more than a 16-bit label image can index")]
    TooManySpots { frame: u32, count: usize },
}

fn to_pixels(spot: &Spot, calibration: &Calibration) -> (f64, f64, f64) {
    (
        spot.x / calibration.pixel_width,
        spot.y / calibration.pixel_height,
        spot.z / calibration.pixel_depth,
    )
}

fn centre_pixel(
    spot: &Spot,
    dims: &Dimensions,
    calibration: &Calibration,
) -> Option<(usize, usize, usize)> {
    let (cx, cy, cz) = to_pixels(spot, calibration);
    let (x, y) = (cx.round(), cy.round());
    let z = if dims.is_3d() { cz.round() } else { 0.0 };

    let inside = x >= 0.0
        && y >= 0.0
        && z >= 0.0
        && (x as usize) < dims.width
        && (y as usize) < dims.height
        && (z as usize) < dims.depth;
    inside.then_some((x as usize, y as usize, z as usize))
}

fn axis_range(centre: f64, radius: f64, len: usize) -> std::ops::RangeInclusive<usize> {
    let lo = (centre - radius).floor().max(0.0) as usize;
    let hi = (centre + radius).ceil().min(len as f64 - 1.0).max(0.0) as usize;
    lo..=hi
}

fn paint_spot(labels: &mut LabelStack, spot: &Spot, calibration: &Calibration, label: u16) {
    let dims = labels.dims();
    let frame = spot.frame as usize;
    let (cx, cy, cz) = to_pixels(spot, calibration);
    let rx = spot.radius / calibration.pixel_width;
    let ry = spot.radius / calibration.pixel_height;
    let rz = spot.radius / calibration.pixel_depth;
    if rx <= 0.0 || ry <= 0.0 {
        return;
    }

    let z_range = if dims.is_3d() && rz > 0.0 {
        axis_range(cz, rz, dims.depth)
    } else {
        0..=0
    };

    for z in z_range {
        let dz = if dims.is_3d() && rz > 0.0 {
            (z as f64 - cz) / rz
        } else {
            0.0
        };
        for y in axis_range(cy, ry, dims.height) {
            let dy = (y as f64 - cy) / ry;
            for x in axis_range(cx, rx, dims.width) {
                let dx = (x as f64 - cx) / rx;
                if dx * dx + dy * dy + dz * dz <= 1.0 {
                    labels.set(x, y, z, 0, frame, label);
                }
            }
        }
    }
}

/// Paints every spot into a fresh label stack of the given dimensions.
///
/// Labels start at 1 in every frame and follow the collection order, so they
/// are unique within a frame only. Shapes may overlap; the centre pixel of each
/// spot is stamped last so that sampling the centre always returns its label.
pub fn paint_labels(
    spots: &SpotCollection,
    dims: Dimensions,
    calibration: &Calibration,
) -> Result<LabelStack, LabelError> {
    let mut labels = LabelStack::new(dims, 1);

    for frame in spots.frames() {
        let frame_spots = spots.in_frame(frame);
        if frame as usize >= dims.frames {
            warn!(
                frame,
                count = frame_spots.len(),
                "Spots lie outside the image time range; not painted"
            );
            continue;
        }
        if frame_spots.len() > u16::MAX as usize {
            return Err(LabelError::TooManySpots {
                frame,
                count: frame_spots.len(),
            });
        }

        for (idx, spot) in frame_spots.iter().enumerate() {
            paint_spot(&mut labels, spot, calibration, idx as u16 + 1);
        }

        let mut stamped: HashMap<(usize, usize, usize), SpotId> = HashMap::new();
        for (idx, spot) in frame_spots.iter().enumerate() {
            let Some((x, y, z)) = centre_pixel(spot, &dims, calibration) else {
                warn!(spot = %spot.id, frame, "Spot centre lies outside the image");
                continue;
            };
            if let Some(previous) = stamped.insert((x, y, z), spot.id) {
                warn!(
                    spot = %spot.id,
                    %previous,
                    frame,
                    "Two spots share a centre pixel; the earlier one cannot be resolved"
                );
            }
            labels.set(x, y, z, 0, frame as usize, idx as u16 + 1);
        }
    }

    debug!(spots = spots.len(), frames = dims.frames, "Painted label image");
    Ok(labels)
}

/// Label under the spot centre in its own frame; `None` for background or outside.
pub fn sample_label(labels: &LabelStack, spot: &Spot, calibration: &Calibration) -> Option<u16> {
    let dims = labels.dims();
    if spot.frame as usize >= dims.frames {
        return None;
    }
    let (x, y, z) = centre_pixel(spot, &dims, calibration)?;
    let label = labels.get(x, y, z, 0, spot.frame as usize);
    (label != 0).then_some(label)
}

#[derive(Default)]
struct Moments {
    count: usize,
    sum_x: f64,
    sum_y: f64,
    sum_z: f64,
}

/// Builds one spot per labelled object: centroid position, radius of the
/// equal-area disk (equal-volume ball in 3D), label kept as [`LABEL_FEATURE`].
pub fn spots_from_labels(labels: &LabelStack, calibration: &Calibration) -> SpotCollection {
    let dims = labels.dims();
    let mut spots = SpotCollection::new();

    for frame in 0..dims.frames {
        let mut moments: BTreeMap<u16, Moments> = BTreeMap::new();
        for z in 0..dims.depth {
            let plane = labels.plane(frame, 0, z);
            for (idx, &label) in plane.iter().enumerate() {
                if label == 0 {
                    continue;
                }
                let m = moments.entry(label).or_default();
                m.count += 1;
                m.sum_x += (idx % dims.width) as f64;
                m.sum_y += (idx / dims.width) as f64;
                m.sum_z += z as f64;
            }
        }

        for (label, m) in moments {
            let n = m.count as f64;
            let radius_px = if dims.is_3d() {
                (3.0 * n / (4.0 * std::f64::consts::PI)).cbrt()
            } else {
                (n / std::f64::consts::PI).sqrt()
            };
            let spot = Spot::new(
                frame as u32,
                m.sum_x / n * calibration.pixel_width,
                m.sum_y / n * calibration.pixel_height,
                m.sum_z / n * calibration.pixel_depth,
                radius_px * calibration.pixel_width,
            )
            .with_feature(LABEL_FEATURE, label as f64);
            spots.add(spot);
        }
    }

    spots
}
