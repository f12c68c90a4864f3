/// Wire column names from the Finn.no listings export, shared across the
/// cleaning, merging and conversion stages so nothing matches on bare strings.

// Identifying key
pub const COL_URL: &str = "annonse-href";

// Geometry
pub const COL_LATITUDE: &str = "latitude";
pub const COL_LONGITUDE: &str = "longitude";

// Free-text fields
pub const COL_ADDRESS: &str = "adresse";
pub const COL_IMAGE_URL: &str = "image-url-src";
pub const COL_ENERGY_RATING: &str = "energiklasse";
pub const COL_ENERGY_RATING_COLOR: &str = "energiklasse-farge";
pub const COL_FACILITIES: &str = "fasiliteter";

// Numeric fields
pub const COL_PRICE: &str = "pris";
pub const COL_ASKING_PRICE: &str = "prisantydning";
pub const COL_CLOSING_COSTS: &str = "omkostninger";
pub const COL_ROOMS: &str = "antall-rom";
pub const COL_BEDROOMS: &str = "antall-soverom";
pub const COL_INTERNAL_USABLE_AREA: &str = "internt-bruksareal";
pub const COL_USABLE_AREA: &str = "bruksareal";
pub const COL_BUILD_YEAR: &str = "byggeår";
pub const COL_EXTERNAL_USABLE_AREA: &str = "eksternt-bruksareal";
pub const COL_FLOOR: &str = "etasje";
pub const COL_SHARED_COSTS: &str = "felleskostnader";

// Derived fields
pub const COL_HAS_ELEVATOR: &str = "heis";
pub const COL_HAS_BALCONY: &str = "balkong";
pub const COL_PRICE_PER_AREA: &str = "pris/m2";
pub const COL_ASKING_PRICE_PER_AREA: &str = "prisantydning/m2";

// Status flags and bookkeeping
pub const COL_SOLD: &str = "solgt";
pub const COL_PINNED: &str = "pin";
pub const COL_HIDDEN: &str = "gjem";
pub const COL_FIRST_SEEN: &str = "first-seen";

/// Tabular column order for the typed part of the schema. Extras follow,
/// sorted by name, so output column order is deterministic within a run.
pub const SCHEMA_COLUMNS: [&str; 27] = [
    COL_URL,
    COL_ADDRESS,
    COL_LATITUDE,
    COL_LONGITUDE,
    COL_PRICE,
    COL_ASKING_PRICE,
    COL_CLOSING_COSTS,
    COL_SHARED_COSTS,
    COL_ROOMS,
    COL_BEDROOMS,
    COL_INTERNAL_USABLE_AREA,
    COL_USABLE_AREA,
    COL_EXTERNAL_USABLE_AREA,
    COL_FLOOR,
    COL_BUILD_YEAR,
    COL_ENERGY_RATING,
    COL_ENERGY_RATING_COLOR,
    COL_FACILITIES,
    COL_HAS_ELEVATOR,
    COL_HAS_BALCONY,
    COL_PRICE_PER_AREA,
    COL_ASKING_PRICE_PER_AREA,
    COL_IMAGE_URL,
    COL_SOLD,
    COL_PINNED,
    COL_HIDDEN,
    COL_FIRST_SEEN,
];

/// Columns subject to hyphen-range averaging and integer coercion.
pub const NUMERIC_COLUMNS: [&str; 11] = [
    COL_PRICE,
    COL_ASKING_PRICE,
    COL_CLOSING_COSTS,
    COL_ROOMS,
    COL_BEDROOMS,
    COL_INTERNAL_USABLE_AREA,
    COL_USABLE_AREA,
    COL_BUILD_YEAR,
    COL_EXTERNAL_USABLE_AREA,
    COL_FLOOR,
    COL_SHARED_COSTS,
];

// Facility labels the derived booleans test for
pub const FACILITY_ELEVATOR: &str = "Heis";
pub const FACILITY_BALCONY: &str = "Balkong/Terrasse";

// Artifact file names under <root>/files/
pub const MERGED_BASENAME: &str = "merged_finn_eiendom";
pub const EXISTING_BASENAME: &str = "existing_finn_eiendom";

// Default service endpoints, overridable through the environment
pub const DEFAULT_ATLAS_API_URL: &str = "https://gis-api.atlas.co";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/search";
