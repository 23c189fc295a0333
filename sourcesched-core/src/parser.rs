use crate::acceptance::SkipPolicy;
use crate::ast::{Property, PropertyDecl, Script, Setting, SettingDecl, SourceDecl};
use crate::diagnostics::Span;
use crate::model::{DirectionModel, EnergyModel, ParticleKind, PositionModel, TimePolicy};
use crate::partition::PartitionStrategy;
use crate::source::SourceType;
use crate::thread_manager::SourceOrdering;
use crate::timing::RunInterval;
use crate::units::{unit_factor, Dimension};
use glam::DVec3;
use std::str::FromStr;
use thiserror::Error;

/// Parse error with optional span information
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("{message}")]
    SyntaxError {
        message: String,
        span: Option<Span>,
    },
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        Self::SyntaxError {
            message: message.into(),
            span,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::SyntaxError {
            message: message.into(),
            span: None,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::SyntaxError { span, .. } => *span,
        }
    }
}

/// Helper to track byte offsets while parsing
struct ParseContext {
    line_offsets: Vec<usize>, // Byte offset of start of each line
    len: usize,
}

impl ParseContext {
    fn new(source: &str) -> Self {
        let mut line_offsets = vec![0];
        let mut offset = 0;
        for ch in source.chars() {
            offset += ch.len_utf8();
            if ch == '\n' {
                line_offsets.push(offset);
            }
        }
        Self {
            line_offsets,
            len: source.len(),
        }
    }

    /// Get byte offset for start of line (0-indexed)
    fn line_start(&self, line: usize) -> usize {
        self.line_offsets.get(line).copied().unwrap_or(self.len)
    }

    /// Create a span for the entire line
    fn full_line_span(&self, line: usize) -> Span {
        Span::new(self.line_start(line), self.line_start(line + 1))
    }
}

/// Parse a simulation script
pub fn parse_script(source: &str) -> Result<Script, ParseError> {
    let ctx = ParseContext::new(source);
    let mut script = Script::default();

    let lines: Vec<&str> = source.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        let line = strip_comment(lines[i]);
        let line_span = ctx.full_line_span(i);

        if line.is_empty() {
            i += 1;
            continue;
        }

        if line == "source" || line.starts_with("source ") {
            let (decl, next_line) = parse_source_block(&lines, i, &ctx)?;
            script.sources.push(decl);
            i = next_line;
        } else if line == "}" {
            return Err(ParseError::new("Unexpected '}' outside of a source block", Some(line_span)));
        } else {
            script.settings.push(parse_setting(line, Some(line_span))?);
            i += 1;
        }
    }

    Ok(script)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => line[..pos].trim(),
        None => line.trim(),
    }
}

/// Split `key = value`
fn split_assignment(line: &str, span: Option<Span>) -> Result<(&str, &str), ParseError> {
    let eq_pos = line
        .find('=')
        .ok_or_else(|| ParseError::new(format!("Expected 'key = value': {}", line), span))?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();
    if key.is_empty() {
        return Err(ParseError::new(format!("Missing key before '=': {}", line), span));
    }
    if value.is_empty() {
        return Err(ParseError::new(format!("Missing value for '{}'", key), span));
    }
    Ok((key, value))
}

/// Parse a global setting: `seed = 42`, `run_timing_intervals = [0, 1] [1, 2] s`, ...
fn parse_setting(line: &str, span: Option<Span>) -> Result<SettingDecl, ParseError> {
    let (key, value) = split_assignment(line, span)?;

    let setting = match key {
        "seed" => Setting::Seed(parse_integer(value, span)?),
        "threads" => Setting::Threads(parse_integer(value, span)?),
        "run_timing_intervals" => Setting::RunTimingIntervals(parse_intervals(value, span)?),
        "ordering" => Setting::Ordering(parse_keyword::<SourceOrdering>(value, span)?),
        "partition" => Setting::Partition(parse_keyword::<PartitionStrategy>(value, span)?),
        "max_batch" => Setting::MaxBatch(parse_integer(value, span)?),
        "max_redraws" => Setting::MaxRedraws(parse_integer(value, span)?),
        "visualization" => Setting::Visualization(parse_switch(value, span)?),
        other => {
            return Err(ParseError::new(format!("Unknown setting '{}'", other), span));
        }
    };

    Ok(SettingDecl { setting, span })
}

/// Parse a source block:
/// ```text
/// source Generic name {
///     activity = 10 kBq
/// }
/// ```
fn parse_source_block(
    lines: &[&str],
    start: usize,
    ctx: &ParseContext,
) -> Result<(SourceDecl, usize), ParseError> {
    let header_span = Some(ctx.full_line_span(start));
    let header = strip_comment(lines[start]);

    let body = header
        .strip_suffix('{')
        .ok_or_else(|| ParseError::new(format!("Expected '{{' at end of source header: {}", header), header_span))?;
    let body = body["source".len()..].trim();

    let (type_str, name) = split_word(body);
    if type_str.is_empty() {
        return Err(ParseError::new("Expected a source type after 'source'", header_span));
    }
    let source_type = parse_keyword::<SourceType>(type_str, header_span)?;
    let name = name.trim_matches('"').trim();
    let name = (!name.is_empty()).then(|| name.to_string());

    let mut properties = Vec::new();
    let mut i = start + 1;
    while i < lines.len() {
        let line = strip_comment(lines[i]);
        let line_span = Some(ctx.full_line_span(i));
        if line.is_empty() {
            i += 1;
            continue;
        }
        if line == "}" {
            return Ok((
                SourceDecl {
                    source_type,
                    name,
                    properties,
                    span: header_span,
                },
                i + 1,
            ));
        }
        properties.push(parse_property(line, line_span)?);
        i += 1;
    }

    Err(ParseError::new(
        format!("Unterminated source block: {}", header),
        header_span,
    ))
}

fn parse_property(line: &str, span: Option<Span>) -> Result<PropertyDecl, ParseError> {
    let (key, value) = split_assignment(line, span)?;

    let property = match key {
        "particle" => Property::Particle(parse_particle(value, span)?),
        "activity" => Property::Activity(parse_quantity(value, Dimension::Activity, span)?),
        "n" => Property::PerRun(parse_integer(value, span)?),
        "energy" => Property::Energy(parse_energy(value, span)?),
        "direction" => Property::Direction(parse_direction(value, span)?),
        "position" => Property::Position(parse_position(value, span)?),
        "time" => Property::Time(match value {
            "start" => TimePolicy::IntervalStart,
            "uniform" => TimePolicy::Uniform,
            other => {
                return Err(ParseError::new(
                    format!("Unknown time policy '{}' (expected start or uniform)", other),
                    span,
                ))
            }
        }),
        "acceptance_angle.enabled" => Property::AcceptanceEnabled(parse_switch(value, span)?),
        "acceptance_angle.fraction" => Property::AcceptanceFraction(parse_number(value, span)?),
        "acceptance_angle.axis" => {
            let (axis, rest) = parse_vector(value, span)?;
            expect_end(rest, span)?;
            Property::AcceptanceAxis(axis)
        }
        "acceptance_angle.skip_policy" => {
            Property::AcceptanceSkipPolicy(parse_keyword::<SkipPolicy>(value, span)?)
        }
        other => {
            return Err(ParseError::new(format!("Unknown source property '{}'", other), span));
        }
    };

    Ok(PropertyDecl { property, span })
}

// ============================================================================
// Values
// ============================================================================

/// First whitespace-separated word and the trimmed rest
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim()),
        None => (s, ""),
    }
}

fn expect_end(rest: &str, span: Option<Span>) -> Result<(), ParseError> {
    if rest.trim().is_empty() {
        Ok(())
    } else {
        Err(ParseError::new(format!("Unexpected trailing input: {}", rest.trim()), span))
    }
}

fn parse_keyword<T: FromStr<Err = String>>(s: &str, span: Option<Span>) -> Result<T, ParseError> {
    s.trim().parse::<T>().map_err(|message| ParseError::new(message, span))
}

fn parse_number(s: &str, span: Option<Span>) -> Result<f64, ParseError> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| ParseError::new(format!("Expected a number, got '{}'", s.trim()), span))
}

fn parse_integer<T: FromStr>(s: &str, span: Option<Span>) -> Result<T, ParseError> {
    let s = s.trim().replace('_', "");
    s.parse::<T>()
        .map_err(|_| ParseError::new(format!("Expected an integer, got '{}'", s), span))
}

fn parse_switch(s: &str, span: Option<Span>) -> Result<bool, ParseError> {
    match s.trim() {
        "true" | "on" | "yes" => Ok(true),
        "false" | "off" | "no" => Ok(false),
        other => Err(ParseError::new(format!("Expected on or off, got '{}'", other), span)),
    }
}

/// `<number> [unit]`, converted to internal units
fn parse_quantity(s: &str, dimension: Dimension, span: Option<Span>) -> Result<f64, ParseError> {
    let (number, unit) = split_word(s);
    let value = parse_number(number, span)?;
    Ok(value * parse_unit(unit, dimension, span)?)
}

/// Scale factor of an optional unit symbol (empty means internal unit)
fn parse_unit(unit: &str, dimension: Dimension, span: Option<Span>) -> Result<f64, ParseError> {
    let unit = unit.trim();
    if unit.is_empty() {
        return Ok(1.0);
    }
    unit_factor(unit, dimension).ok_or_else(|| {
        ParseError::new(format!("Unknown {} unit '{}'", dimension.name(), unit), span)
    })
}

/// `(x, y, z)` followed by anything; returns the vector and the rest
fn parse_vector(s: &str, span: Option<Span>) -> Result<(DVec3, &str), ParseError> {
    let s = s.trim();
    let inner = s
        .strip_prefix('(')
        .ok_or_else(|| ParseError::new(format!("Expected '(' in vector: {}", s), span))?;
    let close = inner
        .find(')')
        .ok_or_else(|| ParseError::new(format!("Expected ')' in vector: {}", s), span))?;

    let coords: Vec<&str> = inner[..close].split(',').map(|c| c.trim()).collect();
    if coords.len() != 3 {
        return Err(ParseError::new(
            format!("Expected three coordinates in vector: {}", s),
            span,
        ));
    }
    let v = DVec3::new(
        parse_number(coords[0], span)?,
        parse_number(coords[1], span)?,
        parse_number(coords[2], span)?,
    );
    Ok((v, &inner[close + 1..]))
}

/// `(x, y, z) [unit]` as a length
fn parse_length_vector(s: &str, span: Option<Span>) -> Result<DVec3, ParseError> {
    let (v, rest) = parse_vector(s, span)?;
    Ok(v * parse_unit(rest, Dimension::Length, span)?)
}

/// `[start, end] [start, end] ... [unit]`
fn parse_intervals(s: &str, span: Option<Span>) -> Result<Vec<RunInterval>, ParseError> {
    let mut pairs = Vec::new();
    let mut rest = s.trim();
    while let Some(inner) = rest.strip_prefix('[') {
        let close = inner
            .find(']')
            .ok_or_else(|| ParseError::new(format!("Expected ']' in run interval: {}", s), span))?;
        let bounds: Vec<&str> = inner[..close].split(',').map(|b| b.trim()).collect();
        if bounds.len() != 2 {
            return Err(ParseError::new(
                format!("Expected [start, end] in run interval: {}", s),
                span,
            ));
        }
        pairs.push((parse_number(bounds[0], span)?, parse_number(bounds[1], span)?));
        rest = inner[close + 1..].trim_start();
    }

    if pairs.is_empty() {
        return Err(ParseError::new(
            format!("Expected at least one [start, end] interval: {}", s),
            span,
        ));
    }
    let factor = parse_unit(rest, Dimension::Time, span)?;
    Ok(pairs
        .into_iter()
        .map(|(start, end)| RunInterval::new(start * factor, end * factor))
        .collect())
}

/// `gamma`, `e-`, ..., or `ion <Z> <A>`
fn parse_particle(s: &str, span: Option<Span>) -> Result<ParticleKind, ParseError> {
    let (name, rest) = split_word(s);
    if name == "ion" {
        let (z, a) = split_word(rest);
        let (a, trailing) = split_word(a);
        expect_end(trailing, span)?;
        return Ok(ParticleKind::Ion {
            z: parse_integer(z, span)?,
            a: parse_integer(a, span)?,
        });
    }
    expect_end(rest, span)?;
    ParticleKind::from_name(name)
        .ok_or_else(|| ParseError::new(format!("Unknown particle '{}'", name), span))
}

/// `mono E`, `gauss E sigma S`, `uniform E1 to E2`
fn parse_energy(s: &str, span: Option<Span>) -> Result<EnergyModel, ParseError> {
    let (kind, rest) = split_word(s);
    let model = match kind {
        "mono" => EnergyModel::Mono {
            energy: parse_quantity(rest, Dimension::Energy, span)?,
        },
        "gauss" => {
            let pos = rest.find(" sigma ").ok_or_else(|| {
                ParseError::new(format!("Expected 'sigma' in gauss energy: {}", s), span)
            })?;
            EnergyModel::Gauss {
                mean: parse_quantity(&rest[..pos], Dimension::Energy, span)?,
                sigma: parse_quantity(&rest[pos + 7..], Dimension::Energy, span)?,
            }
        }
        "uniform" => {
            let pos = rest.find(" to ").ok_or_else(|| {
                ParseError::new(format!("Expected 'to' in uniform energy: {}", s), span)
            })?;
            EnergyModel::Uniform {
                min: parse_quantity(&rest[..pos], Dimension::Energy, span)?,
                max: parse_quantity(&rest[pos + 4..], Dimension::Energy, span)?,
            }
        }
        other => {
            return Err(ParseError::new(
                format!("Unknown energy type '{}' (expected mono, gauss or uniform)", other),
                span,
            ))
        }
    };
    Ok(model)
}

/// `iso`, `momentum (x, y, z)`, `focused (x, y, z) [unit]`
fn parse_direction(s: &str, span: Option<Span>) -> Result<DirectionModel, ParseError> {
    let (kind, rest) = split_word(s);
    let model = match kind {
        "iso" => {
            expect_end(rest, span)?;
            DirectionModel::Isotropic
        }
        "momentum" => {
            let (direction, trailing) = parse_vector(rest, span)?;
            expect_end(trailing, span)?;
            DirectionModel::Momentum { direction }
        }
        "focused" => DirectionModel::Focused {
            point: parse_length_vector(rest, span)?,
        },
        other => {
            return Err(ParseError::new(
                format!("Unknown direction type '{}' (expected iso, momentum or focused)", other),
                span,
            ))
        }
    };
    Ok(model)
}

/// `point (x, y, z)`, `sphere R [at (x, y, z)]`, `disc R [at ...]`, `box (sx, sy, sz) [at ...]`
fn parse_position(s: &str, span: Option<Span>) -> Result<PositionModel, ParseError> {
    let (kind, rest) = split_word(s);
    let (shape, center) = match rest.find(" at ") {
        Some(pos) => (&rest[..pos], parse_length_vector(&rest[pos + 4..], span)?),
        None => (rest, DVec3::ZERO),
    };

    let model = match kind {
        "point" => PositionModel::Point {
            center: parse_length_vector(rest, span)?,
        },
        "sphere" => PositionModel::Sphere {
            center,
            radius: parse_quantity(shape, Dimension::Length, span)?,
        },
        "disc" => PositionModel::Disc {
            center,
            radius: parse_quantity(shape, Dimension::Length, span)?,
        },
        "box" => PositionModel::Box {
            center,
            size: parse_length_vector(shape, span)?,
        },
        other => {
            return Err(ParseError::new(
                format!("Unknown position type '{}' (expected point, sphere, disc or box)", other),
                span,
            ))
        }
    };
    Ok(model)
}
