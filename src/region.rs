//! Named rectangular trigger regions
//!
//! A `RegionMap` holds regions in registration order. Hit tests return the
//! first region containing the point, so overlapping regions always resolve
//! to whichever was registered first.

use serde::{Deserialize, Serialize};

/// A named screen rectangle in pixel coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Region {
    pub fn new(name: impl Into<String>, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            name: name.into(),
            x1,
            y1,
            x2,
            y2,
        }
    }

    /// Whether the rectangle has non-negative extent on both axes
    pub fn is_well_formed(&self) -> bool {
        self.x1 <= self.x2 && self.y1 <= self.y2
    }

    pub fn contains(&self, point: (f32, f32), edges: EdgePolicy) -> bool {
        let (x, y) = point;
        match edges {
            EdgePolicy::Inclusive => self.x1 <= x && x <= self.x2 && self.y1 <= y && y <= self.y2,
            EdgePolicy::Exclusive => self.x1 < x && x < self.x2 && self.y1 < y && y < self.y2,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// Whether points on a region's border count as inside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    #[default]
    Inclusive,
    Exclusive,
}

/// Ordered set of regions, fixed once built
#[derive(Debug, Clone, Default)]
pub struct RegionMap {
    regions: Vec<Region>,
    edges: EdgePolicy,
}

impl RegionMap {
    pub fn new(regions: Vec<Region>, edges: EdgePolicy) -> Self {
        Self { regions, edges }
    }

    pub fn single(region: Region, edges: EdgePolicy) -> Self {
        Self::new(vec![region], edges)
    }

    /// First region (in registration order) containing `point`
    pub fn hit(&self, point: (f32, f32)) -> Option<&Region> {
        self.regions
            .iter()
            .find(|region| region.contains(point, self.edges))
    }

    /// Name of the first region containing `point`
    pub fn hit_name(&self, point: (f32, f32)) -> Option<&str> {
        self.hit(point).map(|region| region.name.as_str())
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn edges(&self) -> EdgePolicy {
        self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
