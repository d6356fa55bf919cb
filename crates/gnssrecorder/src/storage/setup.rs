//! GeoPackage schema setup for a fresh recording file.
//!
//! Every recording starts from an empty file, so tables are created with
//! plain `CREATE TABLE`: finding one already present is an error.

use rusqlite::{params, Connection};
use tracing::debug;

use super::geometry::{BoundingBox, WGS84_SRS_ID};
use super::schema::{
    create_mapping_table, ATTRIBUTE_TABLES, CORE_STATEMENTS, CREATE_OBSERVATION_POINTS_TABLE,
    GEOMETRY_COLUMN, OBSERVATION_POINTS_TABLE, RELATED_TABLES_DEFINITION,
    RELATED_TABLES_EXTENSION, RELATIONS, SIMPLE_ATTRIBUTES_RELATION,
};

/// Create the GeoPackage core tables, the recorder tables and their relations.
///
/// Runs in a single transaction; on error nothing is committed.
///
/// # Errors
///
/// Returns the first `SQLite` error encountered.
pub fn initialize_schema(conn: &mut Connection) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;

    for statement in CORE_STATEMENTS {
        tx.execute_batch(statement)?;
    }

    create_feature_table(&tx)?;

    for (table, ddl) in ATTRIBUTE_TABLES {
        tx.execute_batch(ddl)?;
        register_contents(&tx, table, "attributes")?;
        debug!("Created attributes table {}", table);
    }

    tx.execute(
        "INSERT INTO gpkg_extensions (table_name, column_name, extension_name, definition, scope)
         VALUES ('gpkgext_relations', NULL, ?1, ?2, 'read-write')",
        params![RELATED_TABLES_EXTENSION, RELATED_TABLES_DEFINITION],
    )?;

    for (mapping, base, related) in RELATIONS {
        create_relation(&tx, mapping, base, related)?;
    }

    tx.commit()
}

fn create_feature_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CREATE_OBSERVATION_POINTS_TABLE)?;

    let bbox = BoundingBox::EMPTY;
    conn.execute(
        "INSERT INTO gpkg_contents
            (table_name, data_type, identifier, description, min_x, min_y, max_x, max_y, srs_id)
         VALUES (?1, 'features', ?1, '', ?2, ?3, ?4, ?5, ?6)",
        params![
            OBSERVATION_POINTS_TABLE,
            bbox.min_x,
            bbox.min_y,
            bbox.max_x,
            bbox.max_y,
            WGS84_SRS_ID,
        ],
    )?;
    conn.execute(
        "INSERT INTO gpkg_geometry_columns
            (table_name, column_name, geometry_type_name, srs_id, z, m)
         VALUES (?1, ?2, 'POINT', ?3, 1, 0)",
        params![OBSERVATION_POINTS_TABLE, GEOMETRY_COLUMN, WGS84_SRS_ID],
    )?;
    debug!("Created feature table {}", OBSERVATION_POINTS_TABLE);
    Ok(())
}

fn register_contents(conn: &Connection, table: &str, data_type: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO gpkg_contents (table_name, data_type, identifier, description)
         VALUES (?1, ?2, ?1, '')",
        params![table, data_type],
    )?;
    Ok(())
}

fn create_relation(
    conn: &Connection,
    mapping: &str,
    base: &str,
    related: &str,
) -> rusqlite::Result<()> {
    conn.execute_batch(&create_mapping_table(mapping))?;
    register_contents(conn, mapping, "attributes")?;
    conn.execute(
        "INSERT INTO gpkgext_relations
            (base_table_name, base_primary_column, related_table_name,
             related_primary_column, relation_name, mapping_table_name)
         VALUES (?1, 'id', ?2, 'id', ?3, ?4)",
        params![base, related, SIMPLE_ATTRIBUTES_RELATION, mapping],
    )?;
    conn.execute(
        "INSERT INTO gpkg_extensions (table_name, column_name, extension_name, definition, scope)
         VALUES (?1, NULL, ?2, ?3, 'read-write')",
        params![mapping, RELATED_TABLES_EXTENSION, RELATED_TABLES_DEFINITION],
    )?;
    debug!("Related {} -> {} via {}", base, related, mapping);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::ALL_TABLES;

    fn create_test_db() -> Connection {
        let mut conn = Connection::open_in_memory().expect("failed to create in-memory database");
        initialize_schema(&mut conn).expect("failed to initialize schema");
        conn
    }

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_initialize_schema_creates_tables() {
        let conn = create_test_db();
        for table in ALL_TABLES {
            let n: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(n, 1, "missing table {table}");
        }
    }

    #[test]
    fn test_spatial_refs_seeded() {
        let conn = create_test_db();
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM gpkg_spatial_ref_sys"), 3);
        let org: String = conn
            .query_row(
                "SELECT organization FROM gpkg_spatial_ref_sys WHERE srs_id = 4326",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(org, "EPSG");
    }

    #[test]
    fn test_feature_contents_start_with_inverted_bbox() {
        let conn = create_test_db();
        let (data_type, min_x, max_x, min_y, max_y): (String, f64, f64, f64, f64) = conn
            .query_row(
                "SELECT data_type, min_x, max_x, min_y, max_y FROM gpkg_contents
                 WHERE table_name = 'gps_observation_points'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .unwrap();
        assert_eq!(data_type, "features");
        assert_eq!((min_x, max_x, min_y, max_y), (180.0, -180.0, 90.0, -90.0));
    }

    #[test]
    fn test_geometry_column_registered() {
        let conn = create_test_db();
        let (ty, srs, z, m): (String, i32, i32, i32) = conn
            .query_row(
                "SELECT geometry_type_name, srs_id, z, m FROM gpkg_geometry_columns
                 WHERE table_name = 'gps_observation_points' AND column_name = 'geom'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();
        assert_eq!((ty.as_str(), srs, z, m), ("POINT", 4326, 1, 0));
    }

    #[test]
    fn test_relations_registered() {
        let conn = create_test_db();
        assert_eq!(
            count(
                &conn,
                "SELECT COUNT(*) FROM gpkgext_relations WHERE relation_name = 'simple_attributes'"
            ),
            2
        );
        let base: String = conn
            .query_row(
                "SELECT base_table_name FROM gpkgext_relations
                 WHERE mapping_table_name = 'gps_observation_points_sat_data'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(base, "gps_observation_points");
        assert_eq!(
            count(
                &conn,
                "SELECT COUNT(*) FROM gpkg_extensions WHERE extension_name = 'gpkg_related_tables'"
            ),
            3
        );
    }

    #[test]
    fn test_attribute_tables_registered() {
        let conn = create_test_db();
        assert_eq!(
            count(
                &conn,
                "SELECT COUNT(*) FROM gpkg_contents WHERE data_type = 'attributes'"
            ),
            5
        );
    }

    #[test]
    fn test_second_initialization_fails() {
        let mut conn = create_test_db();
        assert!(initialize_schema(&mut conn).is_err());
    }

    #[test]
    fn test_failed_initialization_leaves_nothing() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE sat_data (id INTEGER)").unwrap();
        assert!(initialize_schema(&mut conn).is_err());
        assert_eq!(
            count(
                &conn,
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'gpkg_contents'"
            ),
            0
        );
    }
}
