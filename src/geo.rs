//! Composite coordinate cells ("51.5072, -0.1275") and the virtual
//! `<base>_lat` / `<base>_lon` columns projected from them.

use std::sync::OnceLock;

use regex::Regex;

use crate::{
    data::{Value, parse_number},
    numeric::{count_decimals, round_to_decimals},
};

pub const LAT_SUFFIX: &str = "_lat";
pub const LON_SUFFIX: &str = "_lon";

/// Rounding applied to a derived coordinate whose token has no fraction digits.
pub const DEFAULT_GEO_PRECISION: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub lat_decimals: u32,
    pub lon_decimals: u32,
}

impl GeoPoint {
    pub fn component(&self, axis: GeoAxis) -> (f64, u32) {
        match axis {
            GeoAxis::Lat => (self.lat, self.lat_decimals),
            GeoAxis::Lon => (self.lon, self.lon_decimals),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeoAxis {
    Lat,
    Lon,
}

impl GeoAxis {
    pub fn suffix(self) -> &'static str {
        match self {
            GeoAxis::Lat => LAT_SUFFIX,
            GeoAxis::Lon => LON_SUFFIX,
        }
    }

    pub fn label_suffix(self) -> &'static str {
        match self {
            GeoAxis::Lat => "Latitude",
            GeoAxis::Lon => "Longitude",
        }
    }
}

/// Max literal precision seen per half of a geo column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeoInfo {
    pub lat_decimals: u32,
    pub lon_decimals: u32,
}

impl GeoInfo {
    pub fn observe(&mut self, point: &GeoPoint) {
        self.lat_decimals = self.lat_decimals.max(point.lat_decimals);
        self.lon_decimals = self.lon_decimals.max(point.lon_decimals);
    }

    pub fn decimals(&self, axis: GeoAxis) -> u32 {
        match axis {
            GeoAxis::Lat => self.lat_decimals,
            GeoAxis::Lon => self.lon_decimals,
        }
    }
}

fn comma_whitespace() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r",\s+").expect("valid comma pattern"))
}

fn virtual_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^(.+)_(lat|lon)$").expect("valid suffix pattern"))
}

/// Splits a composite "lat, lon" cell. Semicolons count as commas and the
/// pair must land inside [-90, 90] x [-180, 180].
pub fn parse_geo(value: &Value) -> Option<GeoPoint> {
    let raw = value.textual()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let normalized = raw.replace(';', ",");
    let normalized = comma_whitespace().replace_all(&normalized, ",");
    let mut parts = normalized.split(',');
    let (Some(lat_token), Some(lon_token), None) = (parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    let lat_token = lat_token.trim();
    let lon_token = lon_token.trim();
    let lat = parse_number(lat_token)?;
    let lon = parse_number(lon_token)?;
    if lat.abs() > 90.0 || lon.abs() > 180.0 {
        return None;
    }
    Some(GeoPoint {
        lat,
        lon,
        lat_decimals: count_decimals(lat_token),
        lon_decimals: count_decimals(lon_token),
    })
}

pub fn virtual_key(base: &str, axis: GeoAxis) -> String {
    format!("{base}{}", axis.suffix())
}

/// Recognizes `<base>_lat` / `<base>_lon` (suffix matched case-insensitively)
/// and returns the base key with the axis.
pub fn split_virtual_key(key: &str) -> Option<(&str, GeoAxis)> {
    let captures = virtual_key_pattern().captures(key)?;
    let base = captures.get(1)?.as_str();
    let axis = if captures.get(2)?.as_str().eq_ignore_ascii_case("lat") {
        GeoAxis::Lat
    } else {
        GeoAxis::Lon
    };
    Some((base, axis))
}

/// Projects one half of a composite cell, rounded to the literal precision of
/// that cell's own token. Tokens without fraction digits use `fallback`.
/// Display precision of the target field never affects the stored value.
pub fn derive_coordinate(base_value: &Value, axis: GeoAxis, fallback: u32) -> Option<f64> {
    let point = parse_geo(base_value)?;
    let (component, decimals) = point.component(axis);
    let decimals = if decimals > 0 { decimals } else { fallback };
    Some(round_to_decimals(component, decimals))
}
