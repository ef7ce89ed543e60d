//! Recursive-descent WKT parser driving a [`GeomConsumer`] (§4.6).
//!
//! New code: the teacher delegates to the external `wkt` crate (`wkt::Wkt::from_str`),
//! which has neither `CircularString`/`CompoundCurve`/`CurvePolygon` variants nor
//! column-offset diagnostics, so it cannot satisfy §4.6/§8's negative-case requirements.
//! Informed by the teacher's recursive `process_wkt_geom_n` dispatch shape
//! (`examples/georust-geozero/geozero/src/wkt/wkt_reader.rs`).

use crate::error::{GpkgError, Result};
use crate::geometry::{CoordType, GeomConsumer, GeomType, GeometryHeader, GEOM_MAX_DEPTH};
use crate::wkt::lexer::{Lexer, Token, TokenKind};

fn format_error(tok: &Token, message: impl Into<String>) -> GpkgError {
    GpkgError::Format {
        column: tok.column,
        message: format!("{} (found `{}`)", message.into(), tok.text),
    }
}

fn expect_lparen(lexer: &mut Lexer) -> Result<()> {
    let tok = lexer.next_token();
    if tok.kind == TokenKind::LParen {
        Ok(())
    } else {
        Err(format_error(&tok, "expected `(`"))
    }
}

fn expect_rparen(lexer: &mut Lexer) -> Result<()> {
    let tok = lexer.next_token();
    if tok.kind == TokenKind::RParen {
        Ok(())
    } else {
        Err(format_error(&tok, "expected `)`"))
    }
}

fn expect_comma(lexer: &mut Lexer) -> Result<()> {
    let tok = lexer.next_token();
    if tok.kind == TokenKind::Comma {
        Ok(())
    } else {
        Err(format_error(&tok, "expected `,`"))
    }
}

fn expect_number(lexer: &mut Lexer) -> Result<f64> {
    let tok = lexer.next_token();
    match tok.kind {
        TokenKind::Number(v) => Ok(v),
        _ => Err(format_error(&tok, "expected a number")),
    }
}

fn keyword_to_geom_type(tok: &Token) -> Result<GeomType> {
    let TokenKind::Keyword(ref k) = tok.kind else {
        return Err(format_error(tok, "expected a geometry keyword"));
    };
    for (name, ty) in [
        ("POINT", GeomType::Point),
        ("LINESTRING", GeomType::LineString),
        ("POLYGON", GeomType::Polygon),
        ("MULTIPOINT", GeomType::MultiPoint),
        ("MULTILINESTRING", GeomType::MultiLineString),
        ("MULTIPOLYGON", GeomType::MultiPolygon),
        ("GEOMETRYCOLLECTION", GeomType::GeometryCollection),
        ("GEOMCOLLECTION", GeomType::GeometryCollection),
        ("CIRCULARSTRING", GeomType::CircularString),
        ("COMPOUNDCURVE", GeomType::CompoundCurve),
        ("CURVEPOLYGON", GeomType::CurvePolygon),
    ] {
        if k.eq_ignore_ascii_case(name) {
            return Ok(ty);
        }
    }
    Err(format_error(tok, format!("unknown geometry keyword `{k}`")))
}

/// Consumes an optional `Z`/`M`/`ZM` dimension tag, defaulting to XY.
fn read_dimension_tag(lexer: &mut Lexer) -> CoordType {
    let tok = lexer.peek_token();
    if let TokenKind::Keyword(ref k) = tok.kind {
        if k.eq_ignore_ascii_case("ZM") {
            lexer.next_token();
            return CoordType::Xyzm;
        } else if k.eq_ignore_ascii_case("Z") {
            lexer.next_token();
            return CoordType::Xyz;
        } else if k.eq_ignore_ascii_case("M") {
            lexer.next_token();
            return CoordType::Xym;
        }
    }
    CoordType::Xy
}

fn is_empty(lexer: &mut Lexer) -> bool {
    let tok = lexer.peek_token();
    if tok.kind.is_keyword("EMPTY") {
        lexer.next_token();
        true
    } else {
        false
    }
}

fn read_point_ordinates(lexer: &mut Lexer, stride: usize) -> Result<Vec<f64>> {
    let mut point = Vec::with_capacity(stride);
    for _ in 0..stride {
        point.push(expect_number(lexer)?);
    }
    Ok(point)
}

/// Reads `EMPTY | ( point (, point)* )` and emits a single `coordinates` batch.
fn read_coord_list<C: GeomConsumer>(
    lexer: &mut Lexer,
    header: GeometryHeader,
    consumer: &mut C,
) -> Result<()> {
    if is_empty(lexer) {
        return Ok(());
    }
    expect_lparen(lexer)?;
    let stride = header.ordinate_count();
    let mut coords = Vec::new();
    let mut count = 0;
    loop {
        coords.extend(read_point_ordinates(lexer, stride)?);
        count += 1;
        let tok = lexer.peek_token();
        if tok.kind == TokenKind::Comma {
            lexer.next_token();
            continue;
        }
        break;
    }
    expect_rparen(lexer)?;
    if header.geom_type == GeomType::CircularString && count != 0 && (count < 3 || (count - 3) % 2 != 0) {
        return Err(GpkgError::BadArity(count));
    }
    if count > 0 {
        consumer.coordinates(header, count, &coords, 0)?;
    }
    Ok(())
}

fn point_text<C: GeomConsumer>(
    lexer: &mut Lexer,
    header: GeometryHeader,
    consumer: &mut C,
) -> Result<()> {
    if is_empty(lexer) {
        return Ok(());
    }
    expect_lparen(lexer)?;
    let stride = header.ordinate_count();
    let coords = read_point_ordinates(lexer, stride)?;
    expect_rparen(lexer)?;
    consumer.coordinates(header, 1, &coords, 0)
}

fn ring_text<C: GeomConsumer>(
    lexer: &mut Lexer,
    coord_type: CoordType,
    consumer: &mut C,
) -> Result<()> {
    let header = GeometryHeader::new(GeomType::LinearRing, coord_type);
    consumer.begin_geometry(header)?;
    read_coord_list(lexer, header, consumer)?;
    consumer.end_geometry(header)
}

fn polygon_text<C: GeomConsumer>(
    lexer: &mut Lexer,
    header: GeometryHeader,
    consumer: &mut C,
) -> Result<()> {
    if is_empty(lexer) {
        return Ok(());
    }
    expect_lparen(lexer)?;
    loop {
        ring_text(lexer, header.coord_type, consumer)?;
        let tok = lexer.peek_token();
        if tok.kind == TokenKind::Comma {
            lexer.next_token();
            continue;
        }
        break;
    }
    expect_rparen(lexer)
}

fn untagged_member<C: GeomConsumer>(
    lexer: &mut Lexer,
    geom_type: GeomType,
    coord_type: CoordType,
    consumer: &mut C,
) -> Result<()> {
    let header = GeometryHeader::new(geom_type, coord_type);
    consumer.begin_geometry(header)?;
    match geom_type {
        GeomType::Point => {
            // MultiPoint members accept either `(x y)` or bare `x y`.
            let tok = lexer.peek_token();
            if tok.kind == TokenKind::LParen {
                point_text(lexer, header, consumer)?;
            } else {
                let coords = read_point_ordinates(lexer, header.ordinate_count())?;
                consumer.coordinates(header, 1, &coords, 0)?;
            }
        }
        GeomType::LineString => read_coord_list(lexer, header, consumer)?,
        GeomType::Polygon => polygon_text(lexer, header, consumer)?,
        _ => unreachable!("untagged_member only used for Point/LineString/Polygon"),
    }
    consumer.end_geometry(header)
}

fn multi_text<C: GeomConsumer>(
    lexer: &mut Lexer,
    header: GeometryHeader,
    member_type: GeomType,
    consumer: &mut C,
) -> Result<()> {
    if is_empty(lexer) {
        return Ok(());
    }
    expect_lparen(lexer)?;
    loop {
        untagged_member(lexer, member_type, header.coord_type, consumer)?;
        let tok = lexer.peek_token();
        if tok.kind == TokenKind::Comma {
            lexer.next_token();
            continue;
        }
        break;
    }
    expect_rparen(lexer)
}

fn geometrycollection_text<C: GeomConsumer>(
    lexer: &mut Lexer,
    header: GeometryHeader,
    consumer: &mut C,
    depth: usize,
) -> Result<()> {
    if is_empty(lexer) {
        return Ok(());
    }
    expect_lparen(lexer)?;
    loop {
        let child = geometry_tagged_text(lexer, consumer, depth + 1)?;
        if child.coord_type != header.coord_type {
            return Err(GpkgError::DimensionMismatch {
                parent: format!("{:?}", header.coord_type),
                child: format!("{:?}", child.coord_type),
            });
        }
        let tok = lexer.peek_token();
        if tok.kind == TokenKind::Comma {
            lexer.next_token();
            continue;
        }
        break;
    }
    expect_rparen(lexer)
}

/// A compound-curve / curve-polygon child: a bare coordinate list (a `LineString`), or a
/// tagged `CIRCULARSTRING`/`COMPOUNDCURVE` body. An explicit `LINESTRING` keyword here is a
/// format error (§4.6).
fn curve_member<C: GeomConsumer>(
    lexer: &mut Lexer,
    coord_type: CoordType,
    allow_compound_curve: bool,
    consumer: &mut C,
    depth: usize,
) -> Result<()> {
    let tok = lexer.peek_token();
    match &tok.kind {
        TokenKind::LParen => {
            let header = GeometryHeader::new(GeomType::LineString, coord_type);
            consumer.begin_geometry(header)?;
            read_coord_list(lexer, header, consumer)?;
            consumer.end_geometry(header)
        }
        TokenKind::Keyword(k) if k.eq_ignore_ascii_case("CIRCULARSTRING") => {
            lexer.next_token();
            let header = GeometryHeader::new(GeomType::CircularString, coord_type);
            consumer.begin_geometry(header)?;
            read_coord_list(lexer, header, consumer)?;
            consumer.end_geometry(header)
        }
        TokenKind::Keyword(k) if allow_compound_curve && k.eq_ignore_ascii_case("COMPOUNDCURVE") => {
            lexer.next_token();
            if depth > GEOM_MAX_DEPTH {
                return Err(GpkgError::DepthOverflow(depth));
            }
            let header = GeometryHeader::new(GeomType::CompoundCurve, coord_type);
            consumer.begin_geometry(header)?;
            compoundcurve_body(lexer, header, consumer, depth + 1)?;
            consumer.end_geometry(header)
        }
        TokenKind::Keyword(k) if k.eq_ignore_ascii_case("LINESTRING") => Err(format_error(
            &tok,
            "an explicit LINESTRING keyword is not allowed here; use a bare coordinate list",
        )),
        _ => Err(format_error(&tok, "expected a coordinate list or curve member")),
    }
}

fn compoundcurve_body<C: GeomConsumer>(
    lexer: &mut Lexer,
    header: GeometryHeader,
    consumer: &mut C,
    depth: usize,
) -> Result<()> {
    if is_empty(lexer) {
        return Ok(());
    }
    expect_lparen(lexer)?;
    loop {
        curve_member(lexer, header.coord_type, false, consumer, depth)?;
        let tok = lexer.peek_token();
        if tok.kind == TokenKind::Comma {
            lexer.next_token();
            continue;
        }
        break;
    }
    expect_rparen(lexer)
}

fn curvepolygon_body<C: GeomConsumer>(
    lexer: &mut Lexer,
    header: GeometryHeader,
    consumer: &mut C,
    depth: usize,
) -> Result<()> {
    if is_empty(lexer) {
        return Ok(());
    }
    expect_lparen(lexer)?;
    loop {
        curve_member(lexer, header.coord_type, true, consumer, depth)?;
        let tok = lexer.peek_token();
        if tok.kind == TokenKind::Comma {
            lexer.next_token();
            continue;
        }
        break;
    }
    expect_rparen(lexer)
}

fn geometry_tagged_text<C: GeomConsumer>(
    lexer: &mut Lexer,
    consumer: &mut C,
    depth: usize,
) -> Result<GeometryHeader> {
    if depth > GEOM_MAX_DEPTH {
        return Err(GpkgError::DepthOverflow(depth));
    }
    let tok = lexer.next_token();
    let geom_type = keyword_to_geom_type(&tok)?;
    let coord_type = read_dimension_tag(lexer);
    let header = GeometryHeader::new(geom_type, coord_type);

    consumer.begin_geometry(header)?;
    match geom_type {
        GeomType::Point => point_text(lexer, header, consumer)?,
        GeomType::LineString => read_coord_list(lexer, header, consumer)?,
        GeomType::CircularString => read_coord_list(lexer, header, consumer)?,
        GeomType::Polygon => polygon_text(lexer, header, consumer)?,
        GeomType::MultiPoint => multi_text(lexer, header, GeomType::Point, consumer)?,
        GeomType::MultiLineString => {
            multi_text(lexer, header, GeomType::LineString, consumer)?
        }
        GeomType::MultiPolygon => multi_text(lexer, header, GeomType::Polygon, consumer)?,
        GeomType::GeometryCollection => {
            geometrycollection_text(lexer, header, consumer, depth)?
        }
        GeomType::CompoundCurve => compoundcurve_body(lexer, header, consumer, depth + 1)?,
        GeomType::CurvePolygon => curvepolygon_body(lexer, header, consumer, depth + 1)?,
        _ => {
            return Err(format_error(
                &tok,
                format!("{geom_type:?} has no WKT wire representation"),
            ))
        }
    }
    consumer.end_geometry(header)?;
    Ok(header)
}

/// Parse one WKT geometry from `input`, driving `consumer` in document order.
pub fn read_geometry<C: GeomConsumer>(input: &str, consumer: &mut C) -> Result<()> {
    let mut lexer = Lexer::new(input);
    consumer.begin()?;
    geometry_tagged_text(&mut lexer, consumer, 0)?;
    let tok = lexer.next_token();
    if tok.kind != TokenKind::Eof {
        return Err(format_error(&tok, "unexpected trailing input"));
    }
    consumer.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvelopeAccumulator;

    #[test]
    fn reads_point_s1() {
        let mut acc = EnvelopeAccumulator::new();
        read_geometry("Point(1 2)", &mut acc).unwrap();
        let (env, empty) = acc.finalize();
        assert!(!empty);
        assert_eq!(env.x.min, 1.0);
        assert_eq!(env.y.min, 2.0);
    }

    #[test]
    fn point_z_requires_three_ordinates() {
        let mut acc = EnvelopeAccumulator::new();
        assert!(read_geometry("Point Z(1 2)", &mut acc).is_err());
    }

    #[test]
    fn geometrycollection_dimension_mismatch_is_rejected() {
        let mut acc = EnvelopeAccumulator::new();
        let err = read_geometry(
            "GeometryCollection(Point(1 2), Point Z(3 4 5))",
            &mut acc,
        )
        .unwrap_err();
        assert!(matches!(err, GpkgError::DimensionMismatch { .. }));
    }

    #[test]
    fn compoundcurve_rejects_explicit_linestring_keyword() {
        let mut acc = EnvelopeAccumulator::new();
        let err = read_geometry(
            "COMPOUNDCURVE(LINESTRING(0 0, 1 1), CIRCULARSTRING(1 1, 2 2, 3 1))",
            &mut acc,
        )
        .unwrap_err();
        match err {
            GpkgError::Format { column, .. } => assert!(column > 0),
            other => panic!("expected Format error, got {other:?}"),
        }
    }

    #[test]
    fn depth_overflow_fails_cleanly() {
        let mut input = String::new();
        for _ in 0..=GEOM_MAX_DEPTH + 1 {
            input.push_str("GEOMETRYCOLLECTION(");
        }
        input.push_str("POINT(1 2)");
        for _ in 0..=GEOM_MAX_DEPTH + 1 {
            input.push(')');
        }
        let mut acc = EnvelopeAccumulator::new();
        assert!(matches!(
            read_geometry(&input, &mut acc),
            Err(GpkgError::DepthOverflow(_))
        ));
    }

    #[test]
    fn circularstring_arc_crest_s6() {
        let mut acc = EnvelopeAccumulator::new();
        read_geometry("CIRCULARSTRING(0 0, 1 1, 2 0)", &mut acc).unwrap();
        let (env, _) = acc.finalize();
        assert!((env.y.max - 1.0).abs() < 1e-9);
    }
}
