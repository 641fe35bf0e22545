use std::collections::BTreeMap;

use common::id_type;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

id_type!(SpotId);

/// One detected object in one frame. Coordinates and radius are in physical units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub id: SpotId,
    pub frame: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub radius: f64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub features: HashMap<String, f64>,
}

impl Spot {
    pub fn new(frame: u32, x: f64, y: f64, z: f64, radius: f64) -> Self {
        Self {
            id: SpotId::unique(),
            frame,
            x,
            y,
            z,
            radius,
            features: HashMap::new(),
        }
    }

    pub fn with_feature(mut self, name: &str, value: f64) -> Self {
        self.features.insert(name.to_string(), value);
        self
    }

    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }
}

/// Spots grouped by frame, iterated in frame order.
#[derive(Clone, Debug, Default)]
pub struct SpotCollection {
    frames: BTreeMap<u32, Vec<Spot>>,
    location_by_id: HashMap<SpotId, (u32, usize)>,
}

impl SpotCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a spot, replacing any spot with the same id.
    pub fn add(&mut self, spot: Spot) {
        if let Some((frame, idx)) = self.location_by_id.get(&spot.id).copied() {
            if frame == spot.frame {
                if let Some(spots) = self.frames.get_mut(&frame) {
                    spots[idx] = spot;
                    return;
                }
            }
            self.remove(spot.id);
        }

        let spots = self.frames.entry(spot.frame).or_default();
        self.location_by_id.insert(spot.id, (spot.frame, spots.len()));
        spots.push(spot);
    }

    pub fn remove(&mut self, id: SpotId) -> Option<Spot> {
        let (frame, idx) = self.location_by_id.remove(&id)?;
        let spots = self.frames.get_mut(&frame)?;
        let removed = spots.remove(idx);

        for (pos, spot) in spots.iter().enumerate().skip(idx) {
            self.location_by_id.insert(spot.id, (frame, pos));
        }
        if spots.is_empty() {
            self.frames.remove(&frame);
        }

        Some(removed)
    }

    pub fn get(&self, id: SpotId) -> Option<&Spot> {
        let (frame, idx) = self.location_by_id.get(&id).copied()?;
        self.frames.get(&frame).map(|spots| &spots[idx])
    }

    pub fn in_frame(&self, frame: u32) -> &[Spot] {
        self.frames.get(&frame).map_or(&[], Vec::as_slice)
    }

    pub fn frames(&self) -> impl Iterator<Item = u32> + '_ {
        self.frames.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Spot> {
        self.frames.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.location_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.location_by_id.is_empty()
    }
}

impl FromIterator<Spot> for SpotCollection {
    fn from_iter<T: IntoIterator<Item = Spot>>(iter: T) -> Self {
        let mut collection = SpotCollection::new();
        for spot in iter {
            collection.add(spot);
        }
        collection
    }
}
