// Print job options as sent by the host runtime

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Orientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Duplex {
    None,
    LongEdge,
    ShortEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum PaperSize {
    A3,
    A4,
    A5,
    A6,
    Letter,
    Legal,
    Tabloid,
    Custom { width_pt: f64, height_pt: f64 },
}

impl PaperSize {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "A3" => Some(PaperSize::A3),
            "A4" => Some(PaperSize::A4),
            "A5" => Some(PaperSize::A5),
            "A6" => Some(PaperSize::A6),
            "LETTER" => Some(PaperSize::Letter),
            "LEGAL" => Some(PaperSize::Legal),
            "TABLOID" => Some(PaperSize::Tabloid),
            _ => None,
        }
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Presentation hints for a print or picker flow. `None` means platform default.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrintJobOptions {
    pub name: Option<String>,
    pub printer_id: Option<String>,
    pub orientation: Option<Orientation>,
    pub duplex: Option<Duplex>,
    pub paper_size: Option<PaperSize>,
    pub photo: Option<bool>,
    pub border: Option<bool>,
    pub copies: Option<u32>,
    pub grayscale: Option<bool>,
    pub bounds: Option<Bounds>,
}

impl PrintJobOptions {
    /// Reads options leniently: unknown keys and malformed values are skipped.
    pub fn from_json(value: Option<&Value>) -> Self {
        let map = match value {
            Some(Value::Object(map)) => map,
            Some(Value::Null) | None => return Self::default(),
            Some(other) => {
                warn!("Ignoring non-object print options: {}", other);
                return Self::default();
            }
        };

        let mut options = PrintJobOptions {
            name: string_opt(map, "name"),
            printer_id: string_opt(map, "printerId").or_else(|| string_opt(map, "printer")),
            photo: bool_opt(map, "photo"),
            border: bool_opt(map, "border"),
            grayscale: bool_opt(map, "grayscale"),
            ..Default::default()
        };

        options.orientation = match map.get("orientation") {
            Some(Value::String(s)) if s.eq_ignore_ascii_case("portrait") => {
                Some(Orientation::Portrait)
            }
            Some(Value::String(s)) if s.eq_ignore_ascii_case("landscape") => {
                Some(Orientation::Landscape)
            }
            Some(other) => {
                malformed("orientation", other);
                None
            }
            None => None,
        }
        .or_else(|| {
            bool_opt(map, "landscape").map(|landscape| {
                if landscape {
                    Orientation::Landscape
                } else {
                    Orientation::Portrait
                }
            })
        });

        options.duplex = match map.get("duplex") {
            Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "none" => Some(Duplex::None),
                "long" => Some(Duplex::LongEdge),
                "short" => Some(Duplex::ShortEdge),
                _ => {
                    malformed("duplex", &Value::String(s.clone()));
                    None
                }
            },
            Some(Value::Bool(true)) => Some(Duplex::LongEdge),
            Some(Value::Bool(false)) => Some(Duplex::None),
            Some(other) => {
                malformed("duplex", other);
                None
            }
            None => None,
        };

        options.paper_size = ["paperSize", "paper"]
            .iter()
            .find_map(|key| map.get(*key).map(|v| (*key, v)))
            .and_then(|(key, value)| {
                let parsed = parse_paper(value);
                if parsed.is_none() {
                    malformed(key, value);
                }
                parsed
            });

        options.copies = match map.get("copies") {
            Some(value) => match value.as_u64().filter(|n| *n >= 1) {
                Some(n) => Some(u32::try_from(n).unwrap_or(u32::MAX)),
                None => {
                    malformed("copies", value);
                    None
                }
            },
            None => None,
        };

        options.bounds = map.get("bounds").and_then(|value| {
            let parsed = parse_bounds(value);
            if parsed.is_none() {
                malformed("bounds", value);
            }
            parsed
        });

        options
    }

    pub fn borderless(&self) -> bool {
        matches!(self.border, Some(false))
    }
}

fn malformed(key: &str, value: &Value) {
    warn!("Ignoring malformed print option {}: {}", key, value);
}

fn string_opt(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::String(_) | Value::Null => None,
        other => {
            malformed(key, other);
            None
        }
    }
}

fn bool_opt(map: &Map<String, Value>, key: &str) -> Option<bool> {
    match map.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Null => None,
        other => {
            malformed(key, other);
            None
        }
    }
}

fn parse_paper(value: &Value) -> Option<PaperSize> {
    match value {
        Value::String(name) => PaperSize::from_name(name),
        Value::Object(map) => {
            if let Some(named) = map
                .get("name")
                .and_then(Value::as_str)
                .and_then(PaperSize::from_name)
            {
                return Some(named);
            }
            let width_pt = parse_dimension(map.get("width")?)?;
            let height_pt = parse_dimension(map.get("height")?)?;
            Some(PaperSize::Custom {
                width_pt,
                height_pt,
            })
        }
        _ => None,
    }
}

/// A dimension in points, or `{size, unit}` with unit `mm`, `in`, `pt` or `mil`.
fn parse_dimension(value: &Value) -> Option<f64> {
    let points = match value {
        Value::Number(n) => n.as_f64()?,
        Value::Object(map) => {
            let size = map.get("size")?.as_f64()?;
            let factor = match map.get("unit").and_then(Value::as_str).unwrap_or("pt") {
                "mm" => 72.0 / 25.4,
                "in" => 72.0,
                "pt" => 1.0,
                "mil" => 0.072,
                _ => return None,
            };
            size * factor
        }
        _ => return None,
    };
    (points.is_finite() && points > 0.0).then_some(points)
}

fn parse_bounds(value: &Value) -> Option<Bounds> {
    let values: Vec<f64> = value
        .as_array()?
        .iter()
        .map(Value::as_f64)
        .collect::<Option<_>>()?;
    match values.as_slice() {
        [x, y, width, height] => Some(Bounds {
            x: *x,
            y: *y,
            width: *width,
            height: *height,
        }),
        _ => None,
    }
}
