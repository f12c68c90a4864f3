use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::constants::*;

/// One property listing, keyed by the ad URL. Known columns are typed;
/// anything else the export grows in the future lands in `extras`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Listing {
    pub url: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub price: Option<i64>,
    pub asking_price: Option<i64>,
    pub closing_costs: Option<i64>,
    pub shared_costs: Option<i64>,
    pub rooms: Option<i64>,
    pub bedrooms: Option<i64>,
    pub internal_usable_area: Option<i64>,
    pub usable_area: Option<i64>,
    pub external_usable_area: Option<i64>,
    pub floor: Option<i64>,
    pub build_year: Option<i64>,
    pub energy_rating: Option<String>,
    pub energy_rating_color: Option<String>,
    pub facilities: Vec<String>,
    pub has_elevator: bool,
    pub has_balcony: bool,
    pub price_per_area: Option<i64>,
    pub asking_price_per_area: Option<i64>,
    pub image_url: Option<String>,
    pub sold: bool,
    pub pinned: bool,
    pub hidden: bool,
    pub first_seen: Option<String>,
    pub extras: BTreeMap<String, Value>,
}

/// The full dataset at one point in time, in stable order.
pub type Snapshot = Vec<Listing>;

/// The raw export between the staging, geocoding and cleaning stages:
/// header order plus one string-cell map per row.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<BTreeMap<String, String>>,
}

impl RawTable {
    pub fn ensure_column(&mut self, name: &str) {
        if !self.headers.iter().any(|h| h == name) {
            self.headers.push(name.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Lenient integer coercion: numbers are rounded, strings are stripped of
/// everything but digits and decimal points before parsing. Anything that
/// still fails becomes null rather than an error, so already-clean data
/// passes through unchanged.
pub fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f.round() as i64),
        Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
            if digits.is_empty() {
                return None;
            }
            digits.parse::<f64>().ok().map(|f| f.round() as i64)
        }
        _ => None,
    }
}

pub fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Facilities arrive either as a proper list or as the flattened
/// `", "`-joined form used by the tabular and GeoJSON serializations.
fn coerce_facilities(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::String(s) => s
            .split(", ")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn int_value(v: Option<i64>) -> Value {
    v.map(Value::from).unwrap_or(Value::Null)
}

fn float_value(v: Option<f64>) -> Value {
    v.map(Value::from).unwrap_or(Value::Null)
}

fn string_value(v: &Option<String>) -> Value {
    v.as_deref().map(Value::from).unwrap_or(Value::Null)
}

impl Listing {
    /// Builds a listing from a property map. Returns `None` when the
    /// identifying key is missing; such rows cannot be reconciled.
    pub fn from_properties(props: &Map<String, Value>) -> Option<Self> {
        let url = props.get(COL_URL).and_then(coerce_string)?;

        let mut listing = Listing {
            url,
            ..Default::default()
        };

        for (name, value) in props {
            if value.is_null() {
                continue;
            }
            match name.as_str() {
                COL_URL => {}
                COL_ADDRESS => listing.address = coerce_string(value),
                COL_LATITUDE => listing.latitude = coerce_float(value),
                COL_LONGITUDE => listing.longitude = coerce_float(value),
                COL_PRICE => listing.price = coerce_integer(value),
                COL_ASKING_PRICE => listing.asking_price = coerce_integer(value),
                COL_CLOSING_COSTS => listing.closing_costs = coerce_integer(value),
                COL_SHARED_COSTS => listing.shared_costs = coerce_integer(value),
                COL_ROOMS => listing.rooms = coerce_integer(value),
                COL_BEDROOMS => listing.bedrooms = coerce_integer(value),
                COL_INTERNAL_USABLE_AREA => listing.internal_usable_area = coerce_integer(value),
                COL_USABLE_AREA => listing.usable_area = coerce_integer(value),
                COL_EXTERNAL_USABLE_AREA => listing.external_usable_area = coerce_integer(value),
                COL_FLOOR => listing.floor = coerce_integer(value),
                COL_BUILD_YEAR => listing.build_year = coerce_integer(value),
                COL_ENERGY_RATING => listing.energy_rating = coerce_string(value),
                COL_ENERGY_RATING_COLOR => listing.energy_rating_color = coerce_string(value),
                COL_FACILITIES => listing.facilities = coerce_facilities(value),
                COL_HAS_ELEVATOR => listing.has_elevator = coerce_bool(value).unwrap_or(false),
                COL_HAS_BALCONY => listing.has_balcony = coerce_bool(value).unwrap_or(false),
                COL_PRICE_PER_AREA => listing.price_per_area = coerce_integer(value),
                COL_ASKING_PRICE_PER_AREA => {
                    listing.asking_price_per_area = coerce_integer(value)
                }
                COL_IMAGE_URL => listing.image_url = coerce_string(value),
                COL_SOLD => listing.sold = coerce_bool(value).unwrap_or(false),
                COL_PINNED => listing.pinned = coerce_bool(value).unwrap_or(false),
                COL_HIDDEN => listing.hidden = coerce_bool(value).unwrap_or(false),
                COL_FIRST_SEEN => listing.first_seen = coerce_string(value),
                _ => {
                    listing.extras.insert(name.clone(), value.clone());
                }
            }
        }

        Some(listing)
    }

    /// Serializes the listing back to a property map with explicit nulls and
    /// the facilities list flattened to its `", "`-joined form. Coordinates
    /// are included only when the caller asks for the tabular shape; in the
    /// geospatial shape they belong to the geometry.
    pub fn to_properties(&self, include_coords: bool) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert(COL_URL.into(), Value::from(self.url.as_str()));
        props.insert(COL_ADDRESS.into(), string_value(&self.address));
        if include_coords {
            props.insert(COL_LATITUDE.into(), float_value(self.latitude));
            props.insert(COL_LONGITUDE.into(), float_value(self.longitude));
        }
        props.insert(COL_PRICE.into(), int_value(self.price));
        props.insert(COL_ASKING_PRICE.into(), int_value(self.asking_price));
        props.insert(COL_CLOSING_COSTS.into(), int_value(self.closing_costs));
        props.insert(COL_SHARED_COSTS.into(), int_value(self.shared_costs));
        props.insert(COL_ROOMS.into(), int_value(self.rooms));
        props.insert(COL_BEDROOMS.into(), int_value(self.bedrooms));
        props.insert(
            COL_INTERNAL_USABLE_AREA.into(),
            int_value(self.internal_usable_area),
        );
        props.insert(COL_USABLE_AREA.into(), int_value(self.usable_area));
        props.insert(
            COL_EXTERNAL_USABLE_AREA.into(),
            int_value(self.external_usable_area),
        );
        props.insert(COL_FLOOR.into(), int_value(self.floor));
        props.insert(COL_BUILD_YEAR.into(), int_value(self.build_year));
        props.insert(COL_ENERGY_RATING.into(), string_value(&self.energy_rating));
        props.insert(
            COL_ENERGY_RATING_COLOR.into(),
            string_value(&self.energy_rating_color),
        );
        props.insert(
            COL_FACILITIES.into(),
            Value::from(self.facilities.join(", ")),
        );
        props.insert(COL_HAS_ELEVATOR.into(), Value::from(self.has_elevator));
        props.insert(COL_HAS_BALCONY.into(), Value::from(self.has_balcony));
        props.insert(COL_PRICE_PER_AREA.into(), int_value(self.price_per_area));
        props.insert(
            COL_ASKING_PRICE_PER_AREA.into(),
            int_value(self.asking_price_per_area),
        );
        props.insert(COL_IMAGE_URL.into(), string_value(&self.image_url));
        props.insert(COL_SOLD.into(), Value::from(self.sold));
        props.insert(COL_PINNED.into(), Value::from(self.pinned));
        props.insert(COL_HIDDEN.into(), Value::from(self.hidden));
        props.insert(COL_FIRST_SEEN.into(), string_value(&self.first_seen));
        for (name, value) in &self.extras {
            props.entry(name.clone()).or_insert_with(|| value.clone());
        }
        props
    }

    /// String form of a single column, used for building reconciliation
    /// keys. `None` means the column exists but holds no value here.
    pub fn field_as_string(&self, column: &str) -> Option<String> {
        match column {
            COL_URL => Some(self.url.clone()),
            COL_ADDRESS => self.address.clone(),
            COL_LATITUDE => self.latitude.map(|v| v.to_string()),
            COL_LONGITUDE => self.longitude.map(|v| v.to_string()),
            COL_PRICE => self.price.map(|v| v.to_string()),
            COL_ASKING_PRICE => self.asking_price.map(|v| v.to_string()),
            COL_CLOSING_COSTS => self.closing_costs.map(|v| v.to_string()),
            COL_SHARED_COSTS => self.shared_costs.map(|v| v.to_string()),
            COL_ROOMS => self.rooms.map(|v| v.to_string()),
            COL_BEDROOMS => self.bedrooms.map(|v| v.to_string()),
            COL_INTERNAL_USABLE_AREA => self.internal_usable_area.map(|v| v.to_string()),
            COL_USABLE_AREA => self.usable_area.map(|v| v.to_string()),
            COL_EXTERNAL_USABLE_AREA => self.external_usable_area.map(|v| v.to_string()),
            COL_FLOOR => self.floor.map(|v| v.to_string()),
            COL_BUILD_YEAR => self.build_year.map(|v| v.to_string()),
            COL_ENERGY_RATING => self.energy_rating.clone(),
            COL_ENERGY_RATING_COLOR => self.energy_rating_color.clone(),
            COL_FIRST_SEEN => self.first_seen.clone(),
            COL_IMAGE_URL => self.image_url.clone(),
            other => self.extras.get(other).and_then(coerce_string),
        }
    }

    /// Whether `column` names a typed field of the schema.
    pub fn is_schema_column(column: &str) -> bool {
        matches!(
            column,
            COL_URL
                | COL_ADDRESS
                | COL_LATITUDE
                | COL_LONGITUDE
                | COL_PRICE
                | COL_ASKING_PRICE
                | COL_CLOSING_COSTS
                | COL_SHARED_COSTS
                | COL_ROOMS
                | COL_BEDROOMS
                | COL_INTERNAL_USABLE_AREA
                | COL_USABLE_AREA
                | COL_EXTERNAL_USABLE_AREA
                | COL_FLOOR
                | COL_BUILD_YEAR
                | COL_ENERGY_RATING
                | COL_ENERGY_RATING_COLOR
                | COL_FACILITIES
                | COL_HAS_ELEVATOR
                | COL_HAS_BALCONY
                | COL_PRICE_PER_AREA
                | COL_ASKING_PRICE_PER_AREA
                | COL_IMAGE_URL
                | COL_SOLD
                | COL_PINNED
                | COL_HIDDEN
                | COL_FIRST_SEEN
        )
    }
}
