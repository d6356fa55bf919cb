//! `SQLite` schema definitions for gnssrecorder.
//!
//! This module contains the SQL statements for the GeoPackage core tables,
//! the Related Tables extension and the recorder's own tables.

/// `PRAGMA application_id` value identifying a GeoPackage ("GPKG").
pub const GPKG_APPLICATION_ID: i32 = 0x4750_4B47;

/// `PRAGMA user_version` value for GeoPackage 1.2.
pub const GPKG_USER_VERSION: i32 = 10200;

/// Feature table holding one row per location fix.
pub const OBSERVATION_POINTS_TABLE: &str = "gps_observation_points";
/// Attributes table holding one row per satellite measurement.
pub const SAT_DATA_TABLE: &str = "sat_data";
/// Attributes table holding one row per receiver clock reading.
pub const CLOCK_TABLE: &str = "rcvr_clock";
/// Attributes table holding one row per motion-sensor sample.
pub const MOTION_TABLE: &str = "motion";
/// Mapping table linking satellite rows (base) to clock rows (related).
pub const SAT_CLOCK_MAP_TABLE: &str = "sat_data_rcvr_clock";
/// Mapping table linking observation points (base) to satellite rows (related).
pub const POINT_SAT_MAP_TABLE: &str = "gps_observation_points_sat_data";

/// Name of the geometry column of the observation-point table.
pub const GEOMETRY_COLUMN: &str = "geom";

/// Extension name registered for the Related Tables extension.
pub const RELATED_TABLES_EXTENSION: &str = "gpkg_related_tables";
/// Definition URL registered for the Related Tables extension.
pub const RELATED_TABLES_DEFINITION: &str = "http://docs.opengeospatial.org/is/18-000/18-000.html";
/// Relation name used for attribute-to-attribute and feature-to-attribute links.
pub const SIMPLE_ATTRIBUTES_RELATION: &str = "simple_attributes";

/// SQL statement to create the spatial reference system table.
pub const CREATE_SPATIAL_REF_SYS_TABLE: &str = r"
CREATE TABLE gpkg_spatial_ref_sys (
    srs_name TEXT NOT NULL,
    srs_id INTEGER PRIMARY KEY,
    organization TEXT NOT NULL,
    organization_coordsys_id INTEGER NOT NULL,
    definition TEXT NOT NULL,
    description TEXT
)
";

/// SQL statement seeding the spatial reference systems every GeoPackage carries.
pub const INSERT_DEFAULT_SPATIAL_REFS: &str = r#"
INSERT INTO gpkg_spatial_ref_sys
    (srs_name, srs_id, organization, organization_coordsys_id, definition, description)
VALUES
    ('WGS 84 geodetic', 4326, 'EPSG', 4326,
     'GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]]',
     'longitude/latitude coordinates in decimal degrees on the WGS 84 spheroid'),
    ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined',
     'undefined cartesian coordinate reference system'),
    ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined',
     'undefined geographic coordinate reference system')
"#;

/// SQL statement to create the contents table.
pub const CREATE_CONTENTS_TABLE: &str = r"
CREATE TABLE gpkg_contents (
    table_name TEXT NOT NULL PRIMARY KEY,
    data_type TEXT NOT NULL,
    identifier TEXT UNIQUE,
    description TEXT DEFAULT '',
    last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
    min_x DOUBLE,
    min_y DOUBLE,
    max_x DOUBLE,
    max_y DOUBLE,
    srs_id INTEGER,
    CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
)
";

/// SQL statement to create the geometry columns table.
pub const CREATE_GEOMETRY_COLUMNS_TABLE: &str = r"
CREATE TABLE gpkg_geometry_columns (
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    geometry_type_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL,
    z TINYINT NOT NULL,
    m TINYINT NOT NULL,
    CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
    CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
    CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
)
";

/// SQL statement to create the extensions table.
pub const CREATE_EXTENSIONS_TABLE: &str = r"
CREATE TABLE gpkg_extensions (
    table_name TEXT,
    column_name TEXT,
    extension_name TEXT NOT NULL,
    definition TEXT NOT NULL,
    scope TEXT NOT NULL,
    CONSTRAINT ge_tce UNIQUE (table_name, column_name, extension_name)
)
";

/// SQL statement to create the Related Tables relations registry.
pub const CREATE_RELATIONS_TABLE: &str = r"
CREATE TABLE gpkgext_relations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    base_table_name TEXT NOT NULL,
    base_primary_column TEXT NOT NULL DEFAULT 'id',
    related_table_name TEXT NOT NULL,
    related_primary_column TEXT NOT NULL DEFAULT 'id',
    relation_name TEXT NOT NULL,
    mapping_table_name TEXT NOT NULL UNIQUE
)
";

/// SQL statement to create the observation-point feature table.
pub const CREATE_OBSERVATION_POINTS_TABLE: &str = r"
CREATE TABLE gps_observation_points (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    geom POINT,
    SysTime DATETIME NOT NULL,
    Lat REAL NOT NULL,
    Lon REAL NOT NULL,
    Alt REAL NOT NULL,
    Provider TEXT NOT NULL,
    GPSTime INTEGER NOT NULL,
    FixSatCount INTEGER NOT NULL,
    HasRadialAccuracy INTEGER NOT NULL,
    RadialAccuracy REAL NOT NULL,
    HasVerticalAccuracy INTEGER NOT NULL,
    VerticalAccuracy REAL NOT NULL,
    HasSpeed INTEGER NOT NULL,
    Speed REAL NOT NULL,
    HasSpeedAccuracy INTEGER NOT NULL,
    SpeedAccuracy REAL NOT NULL,
    HasBearing INTEGER NOT NULL,
    Bearing REAL NOT NULL,
    HasBearingAccuracy INTEGER NOT NULL,
    BearingAccuracy REAL NOT NULL,
    ElapsedRealtimeNanos REAL NOT NULL,
    data_dump TEXT NOT NULL
)
";

/// SQL statement to create the satellite measurement attributes table.
pub const CREATE_SAT_DATA_TABLE: &str = r"
CREATE TABLE sat_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    local_time DATETIME NOT NULL,
    svid INTEGER NOT NULL,
    constellation TEXT NOT NULL,
    cn0 REAL NOT NULL,
    agc REAL NOT NULL,
    has_agc INTEGER NOT NULL,
    in_fix INTEGER NOT NULL,
    sync_state_flags INTEGER NOT NULL,
    sync_state_txt TEXT NOT NULL,
    sat_time_nanos REAL NOT NULL,
    sat_time_1sigma_nanos REAL NOT NULL,
    rcvr_time_offset_nanos REAL NOT NULL,
    multipath INTEGER NOT NULL,
    has_carrier_freq INTEGER NOT NULL,
    carrier_freq_hz REAL NOT NULL,
    accum_delta_range REAL NOT NULL,
    accum_delta_range_1sigma REAL NOT NULL,
    accum_delta_range_state_flags INTEGER NOT NULL,
    accum_delta_range_state_txt TEXT NOT NULL,
    pseudorange_rate_mps REAL NOT NULL,
    pseudorange_rate_1sigma REAL NOT NULL,
    has_ephemeris INTEGER NOT NULL,
    has_almanac INTEGER NOT NULL,
    azimuth_deg REAL NOT NULL,
    elevation_deg REAL NOT NULL,
    data_dump TEXT NOT NULL
)
";

/// SQL statement to create the receiver clock attributes table.
pub const CREATE_CLOCK_TABLE: &str = r"
CREATE TABLE rcvr_clock (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    time_nanos REAL NOT NULL,
    time_uncertainty_nanos REAL NOT NULL,
    has_time_uncertainty_nanos INTEGER NOT NULL,
    bias_nanos REAL NOT NULL,
    has_bias_nanos INTEGER NOT NULL,
    bias_uncertainty_nanos REAL NOT NULL,
    has_bias_uncertainty_nanos INTEGER NOT NULL,
    full_bias_nanos INTEGER NOT NULL,
    has_full_bias_nanos INTEGER NOT NULL,
    drift_nanos_per_sec REAL NOT NULL,
    has_drift_nanos_per_sec INTEGER NOT NULL,
    drift_uncertainty_nps REAL NOT NULL,
    has_drift_uncertainty_nps INTEGER NOT NULL,
    hw_clock_discontinuity_count INTEGER NOT NULL,
    leap_second INTEGER NOT NULL,
    has_leap_second INTEGER NOT NULL,
    data_dump TEXT NOT NULL
)
";

/// SQL statement to create the motion-sensor attributes table.
pub const CREATE_MOTION_TABLE: &str = r"
CREATE TABLE motion (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    time INTEGER NOT NULL,
    accel_x REAL NOT NULL,
    accel_y REAL NOT NULL,
    accel_z REAL NOT NULL,
    linear_accel_x REAL NOT NULL,
    linear_accel_y REAL NOT NULL,
    linear_accel_z REAL NOT NULL,
    mag_x REAL NOT NULL,
    mag_y REAL NOT NULL,
    mag_z REAL NOT NULL,
    gyro_x REAL NOT NULL,
    gyro_y REAL NOT NULL,
    gyro_z REAL NOT NULL,
    gravity_x REAL NOT NULL,
    gravity_y REAL NOT NULL,
    gravity_z REAL NOT NULL,
    rot_vec_x REAL NOT NULL,
    rot_vec_y REAL NOT NULL,
    rot_vec_z REAL NOT NULL,
    rot_vec_cos REAL NOT NULL,
    rot_vec_hdg_acc REAL NOT NULL,
    baro REAL NOT NULL,
    humidity REAL NOT NULL,
    temp REAL NOT NULL,
    lux REAL NOT NULL,
    prox REAL NOT NULL,
    stationary INTEGER NOT NULL,
    motion INTEGER NOT NULL,
    data_dump TEXT NOT NULL
)
";

/// Build the DDL of a Related Tables mapping table.
#[must_use]
pub fn create_mapping_table(name: &str) -> String {
    format!(
        "CREATE TABLE {name} (base_id INTEGER NOT NULL, related_id INTEGER NOT NULL, \
         PRIMARY KEY (base_id, related_id))"
    )
}

/// GeoPackage core tables in creation order.
pub const CORE_STATEMENTS: &[&str] = &[
    CREATE_SPATIAL_REF_SYS_TABLE,
    INSERT_DEFAULT_SPATIAL_REFS,
    CREATE_CONTENTS_TABLE,
    CREATE_GEOMETRY_COLUMNS_TABLE,
    CREATE_EXTENSIONS_TABLE,
    CREATE_RELATIONS_TABLE,
];

/// Attributes tables paired with their `gpkg_contents` identifier.
pub const ATTRIBUTE_TABLES: &[(&str, &str)] = &[
    (SAT_DATA_TABLE, CREATE_SAT_DATA_TABLE),
    (CLOCK_TABLE, CREATE_CLOCK_TABLE),
    (MOTION_TABLE, CREATE_MOTION_TABLE),
];

/// Mapping tables as `(mapping, base, related)`.
pub const RELATIONS: &[(&str, &str, &str)] = &[
    (SAT_CLOCK_MAP_TABLE, SAT_DATA_TABLE, CLOCK_TABLE),
    (POINT_SAT_MAP_TABLE, OBSERVATION_POINTS_TABLE, SAT_DATA_TABLE),
];

/// Every table a finished recording contains.
pub const ALL_TABLES: &[&str] = &[
    "gpkg_spatial_ref_sys",
    "gpkg_contents",
    "gpkg_geometry_columns",
    "gpkg_extensions",
    "gpkgext_relations",
    OBSERVATION_POINTS_TABLE,
    SAT_DATA_TABLE,
    CLOCK_TABLE,
    MOTION_TABLE,
    SAT_CLOCK_MAP_TABLE,
    POINT_SAT_MAP_TABLE,
];
