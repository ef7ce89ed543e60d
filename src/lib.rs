//! Geometry codec and envelope engine for the OGC GeoPackage / Spatialite spatial
//! extension: WKB, WKT and container-blob encodings built around a single
//! [`geometry::GeomConsumer`] visitor protocol, a schema catalogue for the mandatory
//! GeoPackage tables, and SQL scalar-function bindings for embedding into a host
//! connection.
//!
//! The crate has no single entry point the way a format-conversion library does;
//! instead each codec module exposes a reader function and/or a writer type that all
//! speak the same [`geometry::GeomConsumer`]/[`geometry::GeometryHeader`] vocabulary, so
//! any producer (a [`wkb`] or [`wkt`] reader, a [`blob`] reader, or, with `with-geos`,
//! [`foreign`]'s GEOS bridge) can drive any consumer (a writer for one of those same
//! encodings, or [`envelope::EnvelopeAccumulator`]) without the two ever naming each
//! other directly.
//!
//! ```
//! use gpkg_geom::geometry::{CoordType, GeomType, GeometryHeader};
//! use gpkg_geom::envelope::EnvelopeAccumulator;
//! use gpkg_geom::geometry::GeomConsumer;
//!
//! let mut env = EnvelopeAccumulator::new();
//! let header = GeometryHeader::new(GeomType::Point, CoordType::Xy);
//! env.begin().unwrap();
//! env.begin_geometry(header).unwrap();
//! env.coordinates(header, 1, &[1.0, 2.0], 0).unwrap();
//! env.end_geometry(header).unwrap();
//! env.end().unwrap();
//! let (envelope, empty) = env.finalize();
//! assert!(!empty);
//! assert_eq!(envelope.x.min, 1.0);
//! ```

pub mod blob;
pub mod envelope;
pub mod error;
pub mod errstream;
pub mod geometry;
pub mod strbuf;
pub mod stream;
pub mod wkb;
pub mod wkt;

#[cfg(feature = "with-sql")]
pub mod schema;
#[cfg(feature = "with-sql")]
pub mod sql;

#[cfg(feature = "with-geos")]
pub mod foreign;

pub use error::{GpkgError, Result};
pub use errstream::ErrorStream;
pub use geometry::{CoordType, GeomConsumer, GeomType, GeometryHeader};
