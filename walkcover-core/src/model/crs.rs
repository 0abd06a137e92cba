use std::fmt;
use std::str::FromStr;

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Coordinate reference system of an input geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// Longitude/latitude in degrees (EPSG:4326)
    Wgs84,
    /// WGS84 UTM zone in metres (EPSG:326zz north, EPSG:327zz south)
    Utm { zone: u8, south: bool },
}

impl Crs {
    /// UTM zone containing the given lon/lat coordinate
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn utm_for(lon_lat: Coord<f64>) -> Self {
        let zone = (((lon_lat.x + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8;
        Crs::Utm {
            zone,
            south: lon_lat.y < 0.0,
        }
    }

    pub fn epsg(&self) -> u32 {
        match *self {
            Crs::Wgs84 => 4326,
            Crs::Utm { zone, south: false } => 32600 + u32::from(zone),
            Crs::Utm { zone, south: true } => 32700 + u32::from(zone),
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Wgs84)
    }

    pub(crate) fn proj4(&self) -> String {
        match *self {
            Crs::Wgs84 => "+proj=longlat +datum=WGS84 +no_defs +type=crs".to_string(),
            Crs::Utm { zone, south } => {
                let south = if south { " +south" } else { "" };
                format!("+proj=utm +zone={zone}{south} +datum=WGS84 +units=m +no_defs +type=crs")
            }
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl FromStr for Crs {
    type Err = Error;

    /// Accepts `EPSG:4326`, `EPSG:326zz` and `EPSG:327zz` (case-insensitive
    /// prefix, or a bare code).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let code = trimmed
            .get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("epsg:"))
            .map_or(trimmed, |_| &trimmed[5..]);

        let code: u32 = code
            .parse()
            .map_err(|_| Error::UnknownCrs(trimmed.to_string()))?;

        match code {
            4326 => Ok(Crs::Wgs84),
            32601..=32660 => Ok(Crs::Utm {
                zone: u8::try_from(code - 32600).map_err(|_| Error::UnknownCrs(s.to_string()))?,
                south: false,
            }),
            32701..=32760 => Ok(Crs::Utm {
                zone: u8::try_from(code - 32700).map_err(|_| Error::UnknownCrs(s.to_string()))?,
                south: true,
            }),
            _ => Err(Error::UnknownCrs(trimmed.to_string())),
        }
    }
}
