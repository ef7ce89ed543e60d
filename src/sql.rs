//! SQL bindings (§4.9): registers the codec and schema layer as `rusqlite` scalar functions.
//!
//! Grounded on `examples/other_examples/9a7799d8_yutannihilation-rusqlite-gpkg__src-sql_functions.rs.rs`'s
//! `register_bounds_component`/`wkb_from_ctx` idiom (`create_scalar_function` with
//! `FunctionFlags::SQLITE_DETERMINISTIC`, `ctx.get_raw(0)`, `Error::UserFunctionError`), and on
//! `schema.rs` for the administration group's DDL operations.

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{Type, ValueRef};
use rusqlite::{Connection, Error as SqlError};

use crate::blob::{self, BlobDialect, BlobHeader, BlobWriter};
use crate::envelope::EnvelopeAccumulator;
use crate::error::GpkgError;
use crate::geometry::{Axis, GeomConsumer};
use crate::schema::{self, Backend};
use crate::stream::BinaryStream;
use crate::wkb;
use crate::wkt;

fn sql_error(err: GpkgError) -> SqlError {
    SqlError::UserFunctionError(Box::new(err))
}

/// Registers `x_func` under `st_name` and, when `st_name` carries an `ST_` prefix, again
/// under the bare name, so e.g. both `ST_MinX` and `MinX` resolve (§4.9/§6: "function names
/// are case-insensitive and available both with and without an `ST_` prefix"). SQLite
/// already treats registered names case-insensitively.
fn register_aliased<F, T>(
    conn: &Connection,
    st_name: &'static str,
    arity: i32,
    flags: FunctionFlags,
    x_func: F,
) -> rusqlite::Result<()>
where
    F: FnMut(&Context<'_>) -> rusqlite::Result<T> + Copy + Send + std::panic::UnwindSafe + 'static,
    T: rusqlite::types::ToSql,
{
    conn.create_scalar_function(st_name, arity, flags, x_func)?;
    if let Some(bare) = st_name.strip_prefix("ST_") {
        conn.create_scalar_function(bare, arity, flags, x_func)?;
    }
    Ok(())
}

/// Parses the blob at argument 0 as a GeoPackage container, returning `None` on SQL `NULL`
/// and an error for anything else that isn't a blob.
fn header_from_ctx(ctx: &Context) -> rusqlite::Result<Option<(BlobHeader, Vec<u8>)>> {
    match ctx.get_raw(0) {
        ValueRef::Null => Ok(None),
        ValueRef::Blob(bytes) => {
            let mut stream = BinaryStream::from_slice(bytes);
            let mut env = EnvelopeAccumulator::new();
            let header = blob::read_gpkg_blob(&mut stream, &mut env).map_err(sql_error)?;
            Ok(Some((header, bytes.to_vec())))
        }
        _ => Err(SqlError::InvalidFunctionParameterType(0, Type::Blob)),
    }
}

/// Like [`header_from_ctx`] but also returns the fully accumulated envelope, needed when the
/// container header itself carries no envelope (a `Point` root, §4.7).
fn header_and_envelope(ctx: &Context) -> rusqlite::Result<Option<(BlobHeader, crate::geometry::Envelope)>> {
    match ctx.get_raw(0) {
        ValueRef::Null => Ok(None),
        ValueRef::Blob(bytes) => {
            let mut stream = BinaryStream::from_slice(bytes);
            let mut env = EnvelopeAccumulator::new();
            let header = blob::read_gpkg_blob(&mut stream, &mut env).map_err(sql_error)?;
            let (envelope, _) = env.finalize();
            Ok(Some((header, envelope)))
        }
        _ => Err(SqlError::InvalidFunctionParameterType(0, Type::Blob)),
    }
}

fn axis_for(name: &str, env: crate::geometry::Envelope) -> Axis {
    match name {
        "ST_MinX" | "ST_MaxX" => env.x,
        "ST_MinY" | "ST_MaxY" => env.y,
        "ST_MinZ" | "ST_MaxZ" => env.z,
        "ST_MinM" | "ST_MaxM" => env.m,
        _ => unreachable!("unregistered axis accessor {name}"),
    }
}

fn axis_extreme(name: &str, axis: Axis) -> f64 {
    if name.starts_with("ST_Min") {
        axis.min
    } else {
        axis.max
    }
}

fn register_bound(conn: &Connection, name: &'static str) -> rusqlite::Result<()> {
    register_aliased(conn, name, 1, FunctionFlags::SQLITE_DETERMINISTIC, move |ctx| {
        let env = match header_and_envelope(ctx)? {
            Some((_, env)) => env,
            None => return Ok(None),
        };
        let axis = axis_for(name, env);
        if !axis.present {
            return Ok(None);
        }
        Ok(Some(axis_extreme(name, axis)))
    })
}

fn register_st_srid(conn: &Connection) -> rusqlite::Result<()> {
    register_aliased(conn, "ST_SRID", 1, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        let (header, _) = match header_from_ctx(ctx)? {
            Some(v) => v,
            None => return Ok(None),
        };
        Ok(Some(header.srid))
    })?;
    register_aliased(conn, "ST_SRID", 2, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        let (_, bytes) = match header_from_ctx(ctx)? {
            Some(v) => v,
            None => return Ok(None),
        };
        let new_srid: i32 = ctx.get(1)?;
        let mut stream = BinaryStream::from_slice(&bytes);
        blob::read_gpkg_header(&mut stream).map_err(sql_error)?;
        let mut out = BinaryStream::with_capacity(bytes.len());
        let mut writer = BlobWriter::new(&mut out, BlobDialect::Gpkg, new_srid);
        writer.begin().map_err(sql_error)?;
        wkb::read_geometry(&mut stream, crate::wkb::WkbDialect::Iso, &mut writer).map_err(sql_error)?;
        writer.end().map_err(sql_error)?;
        Ok(Some(out.into_vec()))
    })?;
    Ok(())
}

fn register_st_coord_dim(conn: &Connection) -> rusqlite::Result<()> {
    register_aliased(conn, "ST_CoordDim", 1, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        let geom = match geometry_header_of(ctx)? {
            Some(g) => g,
            None => return Ok(None),
        };
        Ok(Some(geom.ordinate_count() as i64))
    })
}

fn register_st_geometry_type(conn: &Connection) -> rusqlite::Result<()> {
    register_aliased(conn, "ST_GeometryType", 1, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        let geom = match geometry_header_of(ctx)? {
            Some(g) => g,
            None => return Ok(None),
        };
        Ok(Some(geom.geom_type.wkt_keyword().to_string()))
    })
}

fn register_st_is3d(conn: &Connection) -> rusqlite::Result<()> {
    register_aliased(conn, "ST_Is3d", 1, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        let geom = match geometry_header_of(ctx)? {
            Some(g) => g,
            None => return Ok(None),
        };
        Ok(Some(i64::from(geom.coord_type.has_z())))
    })
}

fn register_st_is_measured(conn: &Connection) -> rusqlite::Result<()> {
    register_aliased(conn, "ST_IsMeasured", 1, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        let geom = match geometry_header_of(ctx)? {
            Some(g) => g,
            None => return Ok(None),
        };
        Ok(Some(i64::from(geom.coord_type.has_m())))
    })
}

fn register_st_is_empty(conn: &Connection) -> rusqlite::Result<()> {
    register_aliased(conn, "ST_IsEmpty", 1, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        match ctx.get_raw(0) {
            ValueRef::Null => Ok(None),
            ValueRef::Blob(bytes) => {
                let mut stream = BinaryStream::from_slice(bytes);
                let mut env = EnvelopeAccumulator::new();
                let header = blob::read_gpkg_blob(&mut stream, &mut env).map_err(sql_error)?;
                let (_, accumulated_empty) = env.finalize();
                Ok(Some(i64::from(header.empty || accumulated_empty)))
            }
            _ => Err(SqlError::InvalidFunctionParameterType(0, Type::Blob)),
        }
    })
}

fn register_st_is_valid(conn: &Connection) -> rusqlite::Result<()> {
    register_aliased(conn, "ST_IsValid", 1, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        match ctx.get_raw(0) {
            ValueRef::Null => Ok(None),
            ValueRef::Blob(bytes) => {
                let mut stream = BinaryStream::from_slice(bytes);
                let mut sink = EnvelopeAccumulator::new();
                Ok(Some(i64::from(blob::read_gpkg_blob(&mut stream, &mut sink).is_ok())))
            }
            _ => Err(SqlError::InvalidFunctionParameterType(0, Type::Blob)),
        }
    })
}

/// Captures the root geometry's header without building a full envelope, for the accessor
/// functions that only need the type/coordinate dimensionality.
struct HeaderCapture {
    header: Option<crate::geometry::GeometryHeader>,
}

impl GeomConsumer for HeaderCapture {
    fn begin_geometry(&mut self, header: crate::geometry::GeometryHeader) -> crate::error::Result<()> {
        if self.header.is_none() {
            self.header = Some(header);
        }
        Ok(())
    }
}

fn geometry_header_of(ctx: &Context) -> rusqlite::Result<Option<crate::geometry::GeometryHeader>> {
    match ctx.get_raw(0) {
        ValueRef::Null => Ok(None),
        ValueRef::Blob(bytes) => {
            let mut stream = BinaryStream::from_slice(bytes);
            let mut capture = HeaderCapture { header: None };
            blob::read_gpkg_blob(&mut stream, &mut capture).map_err(sql_error)?;
            Ok(capture.header)
        }
        _ => Err(SqlError::InvalidFunctionParameterType(0, Type::Blob)),
    }
}

fn register_st_as_binary(conn: &Connection) -> rusqlite::Result<()> {
    register_aliased(conn, "ST_AsBinary", 1, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        match ctx.get_raw(0) {
            ValueRef::Null => Ok(None),
            ValueRef::Blob(bytes) => {
                let mut stream = BinaryStream::from_slice(bytes);
                blob::read_gpkg_header(&mut stream).map_err(sql_error)?;
                Ok(Some(stream.data_pointer().to_vec()))
            }
            _ => Err(SqlError::InvalidFunctionParameterType(0, Type::Blob)),
        }
    })
}

fn register_st_as_text(conn: &Connection) -> rusqlite::Result<()> {
    register_aliased(conn, "ST_AsText", 1, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        match ctx.get_raw(0) {
            ValueRef::Null => Ok(None),
            ValueRef::Blob(bytes) => {
                let mut stream = BinaryStream::from_slice(bytes);
                let mut out = String::new();
                let mut writer = wkt::WktWriter::new(&mut out);
                blob::read_gpkg_blob(&mut stream, &mut writer).map_err(sql_error)?;
                Ok(Some(out))
            }
            _ => Err(SqlError::InvalidFunctionParameterType(0, Type::Blob)),
        }
    })
}

fn wkb_to_gpkg_blob(wkb: &[u8], srid: i32) -> crate::error::Result<Vec<u8>> {
    let mut in_stream = BinaryStream::from_slice(wkb);
    let mut out = BinaryStream::with_capacity(wkb.len() + 64);
    let mut writer = BlobWriter::new(&mut out, BlobDialect::Gpkg, srid);
    writer.begin()?;
    wkb::read_geometry(&mut in_stream, crate::wkb::WkbDialect::Iso, &mut writer)?;
    writer.end()?;
    Ok(out.into_vec())
}

fn wkt_to_gpkg_blob(wkt_text: &str, srid: i32) -> crate::error::Result<Vec<u8>> {
    let mut out = BinaryStream::with_capacity(wkt_text.len() + 64);
    let mut writer = BlobWriter::new(&mut out, BlobDialect::Gpkg, srid);
    writer.begin()?;
    wkt::read_geometry(wkt_text, &mut writer)?;
    writer.end()?;
    Ok(out.into_vec())
}

fn wkt_to_wkb(wkt_text: &str) -> crate::error::Result<Vec<u8>> {
    let mut out = BinaryStream::with_capacity(wkt_text.len() + 32);
    let mut writer = wkb::WkbWriter::new(&mut out, crate::wkb::WkbDialect::Iso);
    writer.begin()?;
    wkt::read_geometry(wkt_text, &mut writer)?;
    writer.end()?;
    Ok(out.into_vec())
}

fn srid_arg(ctx: &Context, index: usize) -> rusqlite::Result<i32> {
    if ctx.len() > index {
        ctx.get(index)
    } else {
        Ok(0)
    }
}

fn register_st_geom_from_wkb(conn: &Connection) -> rusqlite::Result<()> {
    for arity in [1, 2] {
        register_aliased(conn, "ST_GeomFromWKB", arity, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
            let wkb = match ctx.get_raw(0) {
                ValueRef::Null => return Ok(None),
                ValueRef::Blob(bytes) => bytes,
                _ => return Err(SqlError::InvalidFunctionParameterType(0, Type::Blob)),
            };
            let srid = srid_arg(ctx, 1)?;
            wkb_to_gpkg_blob(wkb, srid).map(Some).map_err(sql_error)
        })?;
    }
    Ok(())
}

fn register_st_geom_from_text(conn: &Connection) -> rusqlite::Result<()> {
    for arity in [1, 2] {
        register_aliased(conn, "ST_GeomFromText", arity, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
            let text = match ctx.get_raw(0) {
                ValueRef::Null => return Ok(None),
                ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                    .map_err(|_| SqlError::InvalidFunctionParameterType(0, Type::Text))?,
                _ => return Err(SqlError::InvalidFunctionParameterType(0, Type::Text)),
            };
            let srid = srid_arg(ctx, 1)?;
            wkt_to_gpkg_blob(text, srid).map(Some).map_err(sql_error)
        })?;
    }
    Ok(())
}

fn register_st_wkb_from_text(conn: &Connection) -> rusqlite::Result<()> {
    register_aliased(conn, "ST_WKBFromText", 1, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        let text = match ctx.get_raw(0) {
            ValueRef::Null => return Ok(None),
            ValueRef::Text(bytes) => {
                std::str::from_utf8(bytes).map_err(|_| SqlError::InvalidFunctionParameterType(0, Type::Text))?
            }
            _ => return Err(SqlError::InvalidFunctionParameterType(0, Type::Text)),
        };
        wkt_to_wkb(text).map(Some).map_err(sql_error)
    })
}

/// Registers every SQL function named in §4.9, case-insensitively duplicated with and
/// without the `ST_` prefix where the canonical name carries one, as §6 requires.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    register_st_srid(conn)?;
    for name in ["ST_MinX", "ST_MaxX", "ST_MinY", "ST_MaxY", "ST_MinZ", "ST_MaxZ", "ST_MinM", "ST_MaxM"] {
        register_bound(conn, name)?;
    }
    register_st_coord_dim(conn)?;
    register_st_geometry_type(conn)?;
    register_st_is_empty(conn)?;
    register_st_is3d(conn)?;
    register_st_is_measured(conn)?;
    register_st_is_valid(conn)?;
    register_st_as_binary(conn)?;
    register_st_as_text(conn)?;
    register_st_geom_from_wkb(conn)?;
    register_st_geom_from_text(conn)?;
    register_st_wkb_from_text(conn)?;

    conn.create_scalar_function("WKBToSQL", 1, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        let wkb = match ctx.get_raw(0) {
            ValueRef::Null => return Ok(None),
            ValueRef::Blob(bytes) => bytes,
            _ => return Err(SqlError::InvalidFunctionParameterType(0, Type::Blob)),
        };
        wkb_to_gpkg_blob(wkb, 0).map(Some).map_err(sql_error)
    })?;
    conn.create_scalar_function("WKTToSQL", 1, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        let text = match ctx.get_raw(0) {
            ValueRef::Null => return Ok(None),
            ValueRef::Text(bytes) => {
                std::str::from_utf8(bytes).map_err(|_| SqlError::InvalidFunctionParameterType(0, Type::Text))?
            }
            _ => return Err(SqlError::InvalidFunctionParameterType(0, Type::Text)),
        };
        wkt_to_gpkg_blob(text, 0).map(Some).map_err(sql_error)
    })?;

    register_administration_functions(conn)?;
    Ok(())
}

/// `CheckGpkg`/`InitGpkg`/`AddGeometryColumn`/`CreateSpatialIndex`/`CreateTilesTable`/
/// `SpatialDBType` (§4.9). `CreateTilesTable` is the thin SQL-assembly form §1 describes for
/// DDL helpers: it creates the standard tile-pyramid table shape and nothing more (no
/// `gpkg_contents`/tile-matrix bookkeeping, which this crate does not model).
fn register_administration_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function("InitGpkg", -1, FunctionFlags::empty(), |ctx| {
        run_ddl(ctx, |c| {
            let mut errors = crate::errstream::ErrorStream::new();
            schema::init(c, Backend::Gpkg, &mut errors)?;
            Ok(if errors.has_errors() {
                Some(errors.into_message())
            } else {
                None
            })
        })
    })?;

    conn.create_scalar_function("CheckGpkg", -1, FunctionFlags::empty(), |ctx| {
        run_ddl(ctx, |c| {
            let errors = schema::check(c, Backend::Gpkg)?;
            Ok(if errors.has_errors() {
                Some(errors.into_message())
            } else {
                None
            })
        })
    })?;

    conn.create_scalar_function("AddGeometryColumn", 5, FunctionFlags::empty(), |ctx| {
        let table: String = ctx.get(0)?;
        let column: String = ctx.get(1)?;
        let geom_type: String = ctx.get(2)?;
        let srs_id: i32 = ctx.get(3)?;
        let zm: String = ctx.get(4)?;
        let (z, m) = parse_zm(&zm);
        run_ddl(ctx, move |c| {
            schema::add_geometry_column(c, &table, &column, &geom_type, srs_id, z, m)?;
            Ok(None::<String>)
        })
    })?;

    for arity in [1, 2] {
        conn.create_scalar_function("CreateTilesTable", arity, FunctionFlags::empty(), move |ctx| {
            let table: String = ctx.get((arity - 1) as usize)?;
            run_ddl(ctx, move |c| {
                schema::create_tiles_table(c, &table)?;
                Ok(None::<String>)
            })
        })?;
    }

    conn.create_scalar_function("CreateSpatialIndex", 3, FunctionFlags::empty(), |ctx| {
        let table: String = ctx.get(0)?;
        let column: String = ctx.get(1)?;
        let id_column: String = ctx.get(2)?;
        run_ddl(ctx, move |c| {
            schema::create_spatial_index(c, Backend::Gpkg, &table, &column, &id_column)?;
            Ok(None::<String>)
        })
    })?;

    conn.create_scalar_function("SpatialDBType", 0, FunctionFlags::SQLITE_DETERMINISTIC, |_ctx| {
        Ok("GPKG".to_string())
    })?;

    Ok(())
}

fn parse_zm(flag: &str) -> (u8, u8) {
    match flag.to_ascii_uppercase().as_str() {
        "Z" => (1, 0),
        "M" => (0, 1),
        "ZM" => (1, 1),
        _ => (0, 0),
    }
}

/// Runs an administration function's DDL inside a named savepoint (§5), releasing on
/// success and rolling back on any error so a failed call leaves no partial schema change.
///
/// `Context::get_connection` hands back a *second* owning [`Connection`] wrapping the same
/// raw handle the host already owns; it must never be allowed to run its `Drop` (which would
/// close that handle out from under the host), so every path out of this function goes
/// through `mem::forget` first.
fn run_ddl<F>(ctx: &Context, f: F) -> rusqlite::Result<Option<String>>
where
    F: FnOnce(&Connection) -> crate::error::Result<Option<String>>,
{
    let conn = unsafe { ctx.get_connection() }.map_err(|e| SqlError::UserFunctionError(Box::new(e)))?;
    let outcome = (|| -> rusqlite::Result<Option<String>> {
        conn.execute_batch("SAVEPOINT gpkg_sql_ddl")?;
        match f(&conn) {
            Ok(message) => {
                conn.execute_batch("RELEASE gpkg_sql_ddl")?;
                Ok(message)
            }
            Err(err) => {
                let _ = conn.execute_batch("ROLLBACK TO gpkg_sql_ddl; RELEASE gpkg_sql_ddl");
                Err(sql_error(err))
            }
        }
    })();
    std::mem::forget(conn);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CoordType, GeomType, GeometryHeader};
    use rusqlite::params;

    fn point_blob(srid: i32, xy: (f64, f64)) -> Vec<u8> {
        let mut stream = BinaryStream::with_capacity(64);
        let mut writer = BlobWriter::new(&mut stream, BlobDialect::Gpkg, srid);
        let header = GeometryHeader::new(GeomType::Point, CoordType::Xy);
        writer.begin().unwrap();
        writer.begin_geometry(header).unwrap();
        writer.coordinates(header, 1, &[xy.0, xy.1], 0).unwrap();
        writer.end_geometry(header).unwrap();
        writer.end().unwrap();
        stream.into_vec()
    }

    #[test]
    fn st_minx_maxx_round_trip_through_sqlite() {
        let conn = Connection::open_in_memory().unwrap();
        register_functions(&conn).unwrap();
        let blob = point_blob(4326, (1.5, -2.0));
        let (minx, maxx, srid): (f64, f64, i32) = conn
            .query_row(
                "SELECT ST_MinX(?1), ST_MaxX(?1), ST_SRID(?1)",
                params![blob],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(minx, 1.5);
        assert_eq!(maxx, 1.5);
        assert_eq!(srid, 4326);
    }

    #[test]
    fn st_astext_and_geomfromtext_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        register_functions(&conn).unwrap();
        let blob = point_blob(0, (3.0, 4.0));
        let wkt_text: String = conn
            .query_row("SELECT ST_AsText(?1)", params![blob], |r| r.get(0))
            .unwrap();
        assert_eq!(wkt_text, "POINT(3 4)");
        let round: Vec<u8> = conn
            .query_row("SELECT ST_GeomFromText(?1, 0)", params![wkt_text], |r| r.get(0))
            .unwrap();
        assert_eq!(round, blob);
    }

    #[test]
    fn st_isempty_true_for_empty_point() {
        let conn = Connection::open_in_memory().unwrap();
        register_functions(&conn).unwrap();
        let mut stream = BinaryStream::with_capacity(64);
        let mut writer = BlobWriter::new(&mut stream, BlobDialect::Gpkg, 0);
        let header = GeometryHeader::new(GeomType::Point, CoordType::Xy);
        writer.begin().unwrap();
        writer.begin_geometry(header).unwrap();
        writer.end_geometry(header).unwrap();
        writer.end().unwrap();
        let blob = stream.into_vec();
        let empty: i64 = conn
            .query_row("SELECT ST_IsEmpty(?1)", params![blob], |r| r.get(0))
            .unwrap();
        assert_eq!(empty, 1);
    }

    #[test]
    fn bare_name_alias_resolves_alongside_st_prefix() {
        let conn = Connection::open_in_memory().unwrap();
        register_functions(&conn).unwrap();
        let blob = point_blob(4326, (1.5, -2.0));
        let (minx, srid): (f64, i32) = conn
            .query_row("SELECT MinX(?1), SRID(?1)", params![blob], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(minx, 1.5);
        assert_eq!(srid, 4326);
    }

    #[test]
    fn init_and_check_gpkg_round_trip_via_sql() {
        let conn = Connection::open_in_memory().unwrap();
        register_functions(&conn).unwrap();
        let init_result: Option<String> = conn.query_row("SELECT InitGpkg()", [], |r| r.get(0)).unwrap();
        assert!(init_result.is_none());
        let check_result: Option<String> = conn.query_row("SELECT CheckGpkg()", [], |r| r.get(0)).unwrap();
        assert!(check_result.is_none());
    }

    #[test]
    fn create_tiles_table_via_sql_builds_pyramid_shape() {
        let conn = Connection::open_in_memory().unwrap();
        register_functions(&conn).unwrap();
        let result: Option<String> =
            conn.query_row("SELECT CreateTilesTable('tiles')", [], |r| r.get(0)).unwrap();
        assert!(result.is_none());
        let cols: Vec<String> = conn
            .prepare("PRAGMA table_info(\"tiles\")")
            .unwrap()
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(cols, vec!["id", "zoom_level", "tile_column", "tile_row", "tile_data"]);
    }
}
