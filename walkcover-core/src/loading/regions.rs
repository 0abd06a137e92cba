//! Region calibration profiles and the registry that serves them

use geo::{Coord, Intersects, Rect};
use hashbrown::HashMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{Error, Meters};

fn default_min_point_density() -> f64 {
    50.0
}

/// Calibrated thresholds for one geographic region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionProfile {
    /// Buffer radius around walks, in metres
    pub buffer_distance: Meters,
    /// Calibrated upper walking speed, m/s
    pub max_walking_speed: f64,
    /// Sustained speeds below this (over long trips) look like idle trackers, m/s
    pub min_walking_speed: f64,
    /// Informative only; not used by the classifier
    pub max_sinuosity: f64,
    /// Longest plausible start-to-end distance of a walk, in metres
    pub max_direct_distance: Meters,
    /// Segments with fewer points per km than this look interpolated
    #[serde(default = "default_min_point_density")]
    pub min_point_density: f64,
    /// Region extent as `[min_lon, min_lat, max_lon, max_lat]`
    #[serde(default)]
    pub bbox: Option<[f64; 4]>,
}

impl RegionProfile {
    pub fn validate(&self) -> Result<(), Error> {
        let positive = [
            ("buffer_distance", self.buffer_distance),
            ("max_walking_speed", self.max_walking_speed),
            ("max_direct_distance", self.max_direct_distance),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }

        if !(self.min_walking_speed >= 0.0 && self.min_walking_speed < self.max_walking_speed) {
            return Err(Error::InvalidConfig(format!(
                "min_walking_speed ({}) must be in [0, max_walking_speed ({}))",
                self.min_walking_speed, self.max_walking_speed
            )));
        }

        if self.min_point_density < 0.0 {
            return Err(Error::InvalidConfig(
                "min_point_density must not be negative".to_string(),
            ));
        }

        if let Some([min_lon, min_lat, max_lon, max_lat]) = self.bbox
            && (min_lon > max_lon || min_lat > max_lat)
        {
            return Err(Error::InvalidConfig(format!(
                "bbox minimum exceeds maximum: {:?}",
                self.bbox
            )));
        }

        Ok(())
    }

    /// Region extent as a lon/lat rectangle
    pub fn extent(&self) -> Option<Rect<f64>> {
        self.bbox.map(|[min_lon, min_lat, max_lon, max_lat]| {
            Rect::new(
                Coord { x: min_lon, y: min_lat },
                Coord { x: max_lon, y: max_lat },
            )
        })
    }

    /// Whether a lon/lat rectangle touches the region extent.
    /// Regions without an extent accept everything.
    pub fn overlaps(&self, lon_lat_bounds: &Rect<f64>) -> bool {
        self.extent()
            .is_none_or(|extent| extent.intersects(lon_lat_bounds))
    }
}

/// Region profiles keyed by lower-case region name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionRegistry {
    #[serde(default)]
    regions: HashMap<String, RegionProfile>,
}

impl RegionRegistry {
    /// Profiles calibrated for London, Blacksburg and Mumbai
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        registry.regions.insert(
            "london".to_string(),
            RegionProfile {
                buffer_distance: 8.0,
                max_walking_speed: 2.5,
                min_walking_speed: 0.2,
                max_sinuosity: 3.0,
                max_direct_distance: 8000.0,
                min_point_density: default_min_point_density(),
                bbox: Some([-0.351, 51.38, 0.148, 51.669]),
            },
        );
        registry.regions.insert(
            "blacksburg".to_string(),
            RegionProfile {
                buffer_distance: 10.0,
                max_walking_speed: 2.8,
                min_walking_speed: 0.2,
                max_sinuosity: 3.5,
                max_direct_distance: 5000.0,
                min_point_density: default_min_point_density(),
                bbox: Some([-80.5, 37.18, -80.38, 37.25]),
            },
        );
        registry.regions.insert(
            "mumbai".to_string(),
            RegionProfile {
                buffer_distance: 6.0,
                max_walking_speed: 2.2,
                min_walking_speed: 0.1,
                max_sinuosity: 3.2,
                max_direct_distance: 6000.0,
                min_point_density: default_min_point_density(),
                bbox: Some([72.77, 18.89, 72.99, 19.28]),
            },
        );
        registry
    }

    /// Parse a registry from TOML with one `[regions.<name>]` table per region
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or a profile is invalid
    pub fn from_toml_str(source: &str) -> Result<Self, Error> {
        let parsed: RegionRegistry = toml::from_str(source)?;

        let mut registry = Self::default();
        for (name, profile) in parsed.regions {
            registry.insert(&name, profile)?;
        }
        debug!("Loaded {} region profiles from TOML", registry.len());
        Ok(registry)
    }

    /// Adds or replaces a profile after validating it
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is invalid or the name is empty
    pub fn insert(&mut self, name: &str, profile: RegionProfile) -> Result<(), Error> {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            return Err(Error::InvalidConfig("region name is empty".to_string()));
        }
        profile
            .validate()
            .map_err(|e| Error::InvalidConfig(format!("region '{key}': {e}")))?;
        self.regions.insert(key, profile);
        Ok(())
    }

    /// Looks up a region profile
    ///
    /// # Errors
    ///
    /// `Error::UnknownRegion` if the region is not configured
    pub fn get(&self, region: &str) -> Result<&RegionProfile, Error> {
        self.regions
            .get(&region.trim().to_lowercase())
            .ok_or_else(|| Error::UnknownRegion(region.to_string()))
    }

    pub fn contains(&self, region: &str) -> bool {
        self.regions.contains_key(&region.trim().to_lowercase())
    }

    /// Region names in alphabetical order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.regions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
