//! Real Las Vegas / Henderson places for geographic dispatch scenarios.
//!
//! Coordinates sourced from OpenStreetMap via Overpass API and routable on
//! OSRM Nevada data.

use drt_dispatch::model::Location;

/// A named place with (lat, lng) coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Place {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Place {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coords(&self) -> Location {
        (self.lat, self.lng)
    }
}

// Fleet depots.
pub const DEPOTS: &[Place] = &[
    Place::new("Wynn Las Vegas", 36.1263781, -115.1658180),
    Place::new("MGM Grand", 36.1023654, -115.1688720),
    Place::new("Longhorn Casino", 36.1070664, -115.0591256),
];

// Strip pickup points, a few hundred meters apart.
pub const STRIP: &[Place] = &[
    Place::new("Bellagio", 36.1126, -115.1767),
    Place::new("Caesars Palace", 36.1162, -115.1745),
    Place::new("Brooklyn Bowl", 36.1175388, -115.1695094),
    Place::new("Gordon Ramsay BurGR", 36.1107195, -115.1720818),
    Place::new("Grand Lux Cafe", 36.1216416, -115.1685024),
    Place::new("Hard Rock Cafe", 36.1041592, -115.1722166),
];

// Destinations off the Strip.
pub const OUTLYING: &[Place] = &[
    Place::new("Bootlegger Bistro", 36.0492047, -115.1715744),
    Place::new("Budget Suites South", 36.0366259, -115.1713361),
    Place::new("Green Valley Ranch Area", 36.0308, -115.0825),
    Place::new("Sunset Station Area", 36.0614, -115.0631),
    Place::new("Beers and Bets", 36.1428945, -115.1573836),
    Place::new("Rivas Mexican Grill North", 36.1450055, -115.0482587),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn places_lie_in_the_vegas_area() {
        for place in DEPOTS.iter().chain(STRIP).chain(OUTLYING) {
            assert!(place.lat > 35.9 && place.lat < 36.3, "{} lat out of range", place.name);
            assert!(place.lng > -115.4 && place.lng < -114.8, "{} lng out of range", place.name);
        }
    }
}
