//! Map documents carried by [`Packet::MapData`](crate::Packet::MapData).
//!
//! On the wire a map is just UTF-8 text. When the `json` feature is
//! enabled it can be parsed into a [`MapDocument`] and resolved against
//! the world size into concrete wall segments and spawn points.
//!
//! Every coordinate in a document is a *dimension expression*: `w` or `h`
//! (world width or height), an operator `*` or `/`, and a number. For
//! example `w*0.5` is the horizontal centre and `h/4` a quarter of the way
//! down.

use serde::{Deserialize, Serialize};

use crate::Vec2;

/// Width of the game world in world units.
pub const WORLD_WIDTH: f64 = 2000.0;
/// Height of the game world in world units.
pub const WORLD_HEIGHT: f64 = 2000.0;

/// Errors produced while parsing or resolving a map document.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    /// The document is not valid JSON for the map format.
    #[error("malformed map document: {0}")]
    Malformed(String),

    /// A coordinate could not be evaluated.
    #[error("invalid dimension {expr:?}: {reason}")]
    InvalidDimension { expr: String, reason: &'static str },
}

/// Raw map text as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapData {
    pub json: String,
}

impl MapData {
    pub fn new(json: impl Into<String>) -> Self {
        Self { json: json.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.json
    }

    /// Parses the text as a [`MapDocument`].
    #[cfg(feature = "json")]
    pub fn document(&self) -> Result<MapDocument, MapError> {
        MapDocument::parse(&self.json)
    }
}

#[cfg(feature = "json")]
impl From<MapDocument> for MapData {
    fn from(doc: MapDocument) -> Self {
        // Plain strings and integers always serialise.
        Self::new(serde_json::to_string(&doc).unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Document format
// ---------------------------------------------------------------------------

/// A wall segment between two points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapLine {
    pub x1: String,
    pub y1: String,
    pub x2: String,
    pub y2: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// An axis-aligned box, resolved into its four edges.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapBox {
    pub x: String,
    pub y: String,
    pub width: String,
    pub height: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapSpawnPoint {
    pub x: String,
    pub y: String,
    #[serde(default)]
    pub id: u8,
    #[serde(default)]
    pub flags: u8,
}

/// A map as authored: coordinates are still unevaluated expressions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDocument {
    #[serde(default)]
    pub lines: Vec<MapLine>,
    #[serde(default)]
    pub boxes: Vec<MapBox>,
    #[serde(default)]
    pub spawn_points: Vec<MapSpawnPoint>,
}

/// A resolved wall segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Vec2,
    pub end: Vec2,
}

/// A resolved spawn location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub position: Vec2,
    pub id: u8,
    pub flags: u8,
}

/// A map with every expression evaluated against a world size.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapGeometry {
    pub segments: Vec<Segment>,
    pub spawn_points: Vec<SpawnPoint>,
}

impl MapDocument {
    #[cfg(feature = "json")]
    pub fn parse(json: &str) -> Result<Self, MapError> {
        serde_json::from_str(json).map_err(|e| MapError::Malformed(e.to_string()))
    }

    /// Evaluates every coordinate. Lines come first, then box edges in
    /// document order (top, right, bottom, left), then spawn points.
    pub fn resolve(&self, width: f64, height: f64) -> Result<MapGeometry, MapError> {
        let eval = |expr: &str| evaluate_dimension(expr, width, height);
        let mut segments =
            Vec::with_capacity(self.lines.len() + 4 * self.boxes.len());

        for line in &self.lines {
            segments.push(Segment {
                start: Vec2::new(eval(&line.x1)?, eval(&line.y1)?),
                end: Vec2::new(eval(&line.x2)?, eval(&line.y2)?),
            });
        }

        for b in &self.boxes {
            let (x, y) = (eval(&b.x)?, eval(&b.y)?);
            let (w, h) = (eval(&b.width)?, eval(&b.height)?);
            let corners = [
                Vec2::new(x, y),
                Vec2::new(x + w, y),
                Vec2::new(x + w, y + h),
                Vec2::new(x, y + h),
            ];
            for i in 0..4 {
                segments.push(Segment {
                    start: corners[i],
                    end: corners[(i + 1) % 4],
                });
            }
        }

        let spawn_points = self
            .spawn_points
            .iter()
            .map(|sp| {
                Ok(SpawnPoint {
                    position: Vec2::new(eval(&sp.x)?, eval(&sp.y)?),
                    id: sp.id,
                    flags: sp.flags,
                })
            })
            .collect::<Result<_, MapError>>()?;

        Ok(MapGeometry {
            segments,
            spawn_points,
        })
    }

    /// Resolves against [`WORLD_WIDTH`] × [`WORLD_HEIGHT`].
    pub fn resolve_world(&self) -> Result<MapGeometry, MapError> {
        self.resolve(WORLD_WIDTH, WORLD_HEIGHT)
    }
}

/// Evaluates a single `w*f`, `w/f`, `h*f` or `h/f` expression.
pub fn evaluate_dimension(
    expr: &str,
    width: f64,
    height: f64,
) -> Result<f64, MapError> {
    let invalid = |reason| MapError::InvalidDimension {
        expr: expr.to_string(),
        reason,
    };

    let mut chars = expr.chars();
    let base = match chars.next() {
        Some('w') => width,
        Some('h') => height,
        Some(_) => return Err(invalid("base must be 'w' or 'h'")),
        None => return Err(invalid("empty expression")),
    };
    let op = chars.next().ok_or_else(|| invalid("missing operator"))?;
    let scale: f64 = chars
        .as_str()
        .trim()
        .parse()
        .map_err(|_| invalid("scale is not a number"))?;
    if !scale.is_finite() {
        return Err(invalid("scale must be finite"));
    }

    match op {
        '*' => Ok(base * scale),
        '/' if scale == 0.0 => Err(invalid("division by zero")),
        '/' => Ok(base / scale),
        _ => Err(invalid("operator must be '*' or '/'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_dimension_operators() {
        assert_eq!(evaluate_dimension("w*0.5", 2000.0, 1000.0).unwrap(), 1000.0);
        assert_eq!(evaluate_dimension("h/4", 2000.0, 1000.0).unwrap(), 250.0);
        assert_eq!(evaluate_dimension("h*1", 2000.0, 1000.0).unwrap(), 1000.0);
    }

    #[test]
    fn test_evaluate_dimension_rejects_garbage() {
        for expr in ["", "w", "x*1", "w+1", "w/0", "w*abc", "h*inf"] {
            let err = evaluate_dimension(expr, 10.0, 10.0).unwrap_err();
            assert!(
                matches!(err, MapError::InvalidDimension { .. }),
                "{expr:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_box_resolves_to_four_closed_edges() {
        let doc = MapDocument {
            boxes: vec![MapBox {
                x: "w*0.1".into(),
                y: "h*0.2".into(),
                width: "w/10".into(),
                height: "h/20".into(),
                color: None,
            }],
            ..Default::default()
        };
        let geometry = doc.resolve_world().unwrap();
        assert_eq!(geometry.segments.len(), 4);
        assert_eq!(geometry.segments[0].start, Vec2::new(200.0, 400.0));
        assert_eq!(geometry.segments[1].start, Vec2::new(400.0, 400.0));
        assert_eq!(geometry.segments[2].start, Vec2::new(400.0, 500.0));
        assert_eq!(geometry.segments[3].end, Vec2::new(200.0, 400.0));
        for pair in geometry.segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_bad_expression_fails_whole_resolve() {
        let doc = MapDocument {
            lines: vec![MapLine {
                x1: "w*0".into(),
                y1: "h*0".into(),
                x2: "q*1".into(),
                y2: "h*1".into(),
                color: None,
            }],
            ..Default::default()
        };
        assert!(doc.resolve_world().is_err());
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_parse_document_with_camel_case_spawns() {
        let json = r##"{
            "lines": [{"x1": "w*0", "y1": "h*0", "x2": "w*1", "y2": "h*0", "color": "#fff"}],
            "spawnPoints": [{"x": "w*0.5", "y": "h*0.5", "id": 3, "flags": 1}]
        }"##;
        let doc = MapData::new(json).document().unwrap();
        assert!(doc.boxes.is_empty());
        assert_eq!(doc.lines[0].color.as_deref(), Some("#fff"));

        let geometry = doc.resolve_world().unwrap();
        assert_eq!(geometry.segments[0].end, Vec2::new(2000.0, 0.0));
        assert_eq!(
            geometry.spawn_points,
            vec![SpawnPoint {
                position: Vec2::new(1000.0, 1000.0),
                id: 3,
                flags: 1,
            }]
        );
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_parse_rejects_malformed_json() {
        let err = MapDocument::parse("{\"lines\": 3}").unwrap_err();
        assert!(matches!(err, MapError::Malformed(_)));
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_document_into_map_data_reparses() {
        let doc = MapDocument {
            spawn_points: vec![MapSpawnPoint {
                x: "w/2".into(),
                y: "h/2".into(),
                id: 1,
                flags: 0,
            }],
            ..Default::default()
        };
        let data = MapData::from(doc.clone());
        assert!(data.as_str().contains("spawnPoints"));
        assert_eq!(data.document().unwrap(), doc);
    }
}
