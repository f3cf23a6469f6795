//! Table definitions the built-in mappings write into.
//!
//! Every statement is `IF NOT EXISTS`, so running the bootstrap against an
//! existing database only adds what is missing.

use log::info;

use crate::error::{ImportError, Result};

pub const EXTENSION: &str = "CREATE EXTENSION IF NOT EXISTS postgis;";

pub const COUNTY: &str = "
CREATE TABLE IF NOT EXISTS county (
    id SERIAL PRIMARY KEY,
    name TEXT UNIQUE,
    district INTEGER,
    tsd_id INTEGER,
    objectid INTEGER,
    county_fip INTEGER,
    county_num INTEGER,
    shape_area DOUBLE PRECISION,
    shape_length DOUBLE PRECISION,
    geom GEOMETRY(Geometry, 4326)
);";

pub const MUNICIPALITY: &str = "
CREATE TABLE IF NOT EXISTS municipality (
    id SERIAL PRIMARY KEY,
    name TEXT UNIQUE NOT NULL
);";

/// County names the update import matches on.
pub const COUNTY_SEED: &str = "
INSERT INTO county (name) VALUES
    ('Caroline'), ('Cecil'), ('Dorchester'), ('Kent'), ('Queen Anne''s'),
    ('Somerset'), ('Talbot'), ('Wicomico'), ('Worcester')
ON CONFLICT (name) DO NOTHING;";

pub const MUNICIPALITY_SEED: &str = "
INSERT INTO municipality (name) VALUES
    ('Caroline Rural'), ('Dorchester Rural'), ('Kent Rural'), ('Queen Anne''s Rural'),
    ('Somerset Rural'), ('Talbot Rural'), ('Wicomico Rural'), ('Worcester Rural'),
    ('Barclay'), ('Berlin'), ('Betterton'), ('Brookview'), ('Cambridge'),
    ('Centreville'), ('Chestertown'), ('Church Creek'), ('Church Hill'), ('Crisfield'),
    ('Delmar'), ('Denton'), ('East New Market'), ('Easton'), ('Eldorado'),
    ('Federalsburg'), ('Fruitland'), ('Galena'), ('Galestown'), ('Goldsboro'),
    ('Greensboro'), ('Hebron'), ('Henderson'), ('Hillsboro'), ('Hurlock'),
    ('Mardela Springs'), ('Marydel'), ('Millington'), ('Ocean City'), ('Oxford'),
    ('Pittsville'), ('Pocomoke City'), ('Preston'), ('Princess Anne'), ('Queen Anne'),
    ('Queenstown'), ('Ridgely'), ('Rock Hall'), ('Salisbury'), ('Secretary'),
    ('Sharptown'), ('Snow Hill'), ('St Michaels'), ('Sudlersville'), ('Templeville'),
    ('Trappe'), ('Vienna'), ('Willards')
ON CONFLICT (name) DO NOTHING;";

/// Columns shared by `parcel` and `barclay_vpa`.
const PARCEL_ATTRIBUTES: &str = "
    objectid INTEGER,
    mergeid TEXT,
    address TEXT,
    yearbuilt INTEGER,
    calc_area DOUBLE PRECISION,
    u3value INTEGER,
    vpa DOUBLE PRECISION,
    landvpa INTEGER,
    txbl_val INTEGER,
    jurscode TEXT,
    acctid TEXT,
    city TEXT,
    zipcode TEXT,
    ownname1 TEXT,
    ownname2 TEXT,
    landuseu3 TEXT,
    lu TEXT,
    desclu TEXT,
    descstyl TEXT,
    descbldg TEXT,
    nfmlndvl INTEGER,
    nfmimpvl INTEGER,
    nfmttlvl INTEGER,
    bldg_story INTEGER,
    resident INTEGER,
    merge_ TEXT,
    new_merge TEXT,
    notes TEXT,
    downtown TEXT,
    fid1 TEXT,
    cityname TEXT,
    insidecore TEXT,
    outsidecore TEXT,
    yearbuiltcat TEXT,
    impvalperacre DOUBLE PRECISION,
    dt_easton TEXT,
    developed TEXT,
    geom GEOMETRY(Geometry, 4326)";

pub fn parcel_table() -> String {
    format!(
        "
CREATE TABLE IF NOT EXISTS parcel (
    id SERIAL PRIMARY KEY,
    municipality_id INTEGER REFERENCES municipality(id),{PARCEL_ATTRIBUTES},
    vpa_decile INTEGER
);"
    )
}

pub fn vpa_table() -> String {
    format!(
        "
CREATE TABLE IF NOT EXISTS barclay_vpa (
    id SERIAL PRIMARY KEY,{PARCEL_ATTRIBUTES}
);"
    )
}

/// The full bootstrap script, parents before children, then the seed rows.
pub fn bootstrap_script() -> String {
    [
        EXTENSION.to_string(),
        COUNTY.to_string(),
        MUNICIPALITY.to_string(),
        parcel_table(),
        vpa_table(),
        COUNTY_SEED.to_string(),
        MUNICIPALITY_SEED.to_string(),
    ]
    .join("\n")
}

pub fn init_schema(client: &mut postgres::Client) -> Result<()> {
    info!("Creating tables if missing");
    client
        .batch_execute(&bootstrap_script())
        .map_err(ImportError::from_query)
}
