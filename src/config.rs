//! Viewer configuration.
//!
//! Options arrive as a [`Value::Table`] and are deep-merged over the
//! documented defaults once, at construction, using the same diff/patch
//! machinery the update pipeline runs on (the removal sentinel is unused on
//! this path). The merged tree is then validated strictly: unrecognized
//! options reject the whole construction.

use thiserror::Error;

use crate::diff::{apply_delta, Delta};
use crate::format::FormatOptions;
use crate::surface::Rgba;
use crate::value::{Key, Table, Value, ValueKind};

// =============================================================================
// Errors
// =============================================================================

/// Construction-time configuration failures. Hard errors: the viewer is not
/// created.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unrecognized option `{0}`")]
    UnrecognizedOption(String),
    #[error("option `{option}` expects {expected}")]
    InvalidValue {
        option: String,
        expected: &'static str,
    },
    #[error("options must be a container, got {0}")]
    NotATable(&'static str),
}

// =============================================================================
// Per-kind tables
// =============================================================================

/// A value per [`ValueKind`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindTable<T> {
    values: [T; 7],
}

impl<T: Copy> KindTable<T> {
    pub const fn new(values: [T; 7]) -> Self {
        Self { values }
    }

    pub fn get(&self, kind: ValueKind) -> T {
        self.values[kind.index()]
    }

    pub fn set(&mut self, kind: ValueKind, value: T) {
        self.values[kind.index()] = value;
    }
}

// =============================================================================
// Config
// =============================================================================

/// When filter/exclusion edits take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCommit {
    /// Re-run visibility on every keystroke.
    EveryEdit,
    /// Stage edits until an explicit commit.
    OnCommit,
}

/// Width/height pair for the display surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Validated viewer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub title: String,
    pub decorate_title: bool,
    pub summarize_containers: bool,
    pub type_aware_filter: bool,
    pub case_sensitive_filter: bool,
    pub size_weighted_ordering: bool,
    /// Decimal places for numbers; negative = no rounding.
    pub precision: i32,
    pub font: String,
    /// Display-cell budget for value text; 0 = unlimited.
    pub truncate_width: usize,
    pub start_size: Size,
    pub min_size: Size,
    pub max_size: Size,
    pub default_expanded: bool,
    /// Ordering bucket offset per kind; kept in the thousands so buckets
    /// dominate sibling indices.
    pub order_buckets: KindTable<i64>,
    /// Highlight color per kind.
    pub kind_colors: KindTable<Rgba>,
    pub filter_commit: FilterCommit,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "treescope".to_string(),
            decorate_title: true,
            summarize_containers: true,
            type_aware_filter: false,
            case_sensitive_filter: false,
            size_weighted_ordering: false,
            precision: 3,
            font: "monospace".to_string(),
            truncate_width: 64,
            start_size: Size { width: 320.0, height: 480.0 },
            min_size: Size { width: 160.0, height: 120.0 },
            max_size: Size { width: 1280.0, height: 2048.0 },
            default_expanded: true,
            order_buckets: KindTable::new([
                1000, // boolean
                2000, // number
                3000, // text
                7000, // container
                4000, // callable
                5000, // external
                6000, // other
            ]),
            kind_colors: KindTable::new([
                Rgba::rgb(229, 192, 123), // boolean
                Rgba::rgb(86, 182, 194),  // number
                Rgba::rgb(152, 195, 121), // text
                Rgba::rgb(97, 175, 239),  // container
                Rgba::rgb(198, 120, 221), // callable
                Rgba::GRAY,               // external
                Rgba::WHITE,              // other
            ]),
            filter_commit: FilterCommit::EveryEdit,
        }
    }
}

impl ViewerConfig {
    /// Merge caller options over the defaults and validate.
    pub fn from_options(options: Option<&Value>) -> Result<Self, ConfigError> {
        let mut merged = Self::default().to_table();
        if let Some(options) = options {
            let Value::Table(user) = options else {
                return Err(ConfigError::NotATable(options.kind().name()));
            };
            // Deep merge: every user entry is an "addition" over the defaults
            apply_delta(&mut merged, &Delta::verbatim(user));
        }
        Self::parse(&merged)
    }

    /// Formatting knobs for this config.
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            precision: self.precision,
            summarize_containers: self.summarize_containers,
            truncate_width: self.truncate_width,
        }
    }

    /// The documented defaults as an option tree.
    fn to_table(&self) -> Table {
        let mut t = Table::new();
        let mut put = |name: &str, v: Value| {
            t.insert(Key::text(name), v);
        };
        put("title", Value::Text(self.title.clone()));
        put("decorate_title", Value::Bool(self.decorate_title));
        put("summarize_containers", Value::Bool(self.summarize_containers));
        put("type_aware_filter", Value::Bool(self.type_aware_filter));
        put("case_sensitive_filter", Value::Bool(self.case_sensitive_filter));
        put("size_weighted_ordering", Value::Bool(self.size_weighted_ordering));
        put("precision", Value::Number(self.precision as f64));
        put("font", Value::Text(self.font.clone()));
        put("truncate_width", Value::Number(self.truncate_width as f64));
        put("start_size", size_table(self.start_size));
        put("min_size", size_table(self.min_size));
        put("max_size", size_table(self.max_size));
        put("default_expanded", Value::Bool(self.default_expanded));
        put("order_buckets", {
            let mut b = Table::new();
            for kind in ValueKind::ALL {
                b.insert(
                    Key::text(kind.name()),
                    Value::Number(self.order_buckets.get(kind) as f64),
                );
            }
            Value::Table(b)
        });
        put("kind_colors", {
            let mut c = Table::new();
            for kind in ValueKind::ALL {
                let color = self.kind_colors.get(kind);
                c.insert(
                    Key::text(kind.name()),
                    Value::Text(format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)),
                );
            }
            Value::Table(c)
        });
        put(
            "filter_commit",
            Value::Text(match self.filter_commit {
                FilterCommit::EveryEdit => "edit".to_string(),
                FilterCommit::OnCommit => "commit".to_string(),
            }),
        );
        t
    }

    /// Strictly parse a merged option tree.
    fn parse(table: &Table) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for (key, value) in table {
            let Some(name) = key.as_text() else {
                return Err(ConfigError::UnrecognizedOption(
                    crate::format::format_key(key),
                ));
            };
            match name {
                "title" => config.title = expect_text(name, value)?,
                "decorate_title" => config.decorate_title = expect_bool(name, value)?,
                "summarize_containers" => {
                    config.summarize_containers = expect_bool(name, value)?
                }
                "type_aware_filter" => config.type_aware_filter = expect_bool(name, value)?,
                "case_sensitive_filter" => {
                    config.case_sensitive_filter = expect_bool(name, value)?
                }
                "size_weighted_ordering" => {
                    config.size_weighted_ordering = expect_bool(name, value)?
                }
                "precision" => config.precision = expect_number(name, value)? as i32,
                "font" => config.font = expect_text(name, value)?,
                "truncate_width" => {
                    let n = expect_number(name, value)?;
                    if n < 0.0 {
                        return Err(ConfigError::InvalidValue {
                            option: name.to_string(),
                            expected: "a non-negative number",
                        });
                    }
                    config.truncate_width = n as usize;
                }
                "start_size" => config.start_size = parse_size(name, value)?,
                "min_size" => config.min_size = parse_size(name, value)?,
                "max_size" => config.max_size = parse_size(name, value)?,
                "default_expanded" => config.default_expanded = expect_bool(name, value)?,
                "order_buckets" => {
                    parse_kind_table(name, value, |kind, v| {
                        let Value::Number(n) = v else { return None };
                        config.order_buckets.set(kind, *n as i64);
                        Some(())
                    })?;
                }
                "kind_colors" => {
                    parse_kind_table(name, value, |kind, v| {
                        let Value::Text(hex) = v else { return None };
                        let color = Rgba::from_hex(hex)?;
                        config.kind_colors.set(kind, color);
                        Some(())
                    })?;
                }
                "filter_commit" => {
                    config.filter_commit = match value {
                        Value::Text(s) if s == "edit" => FilterCommit::EveryEdit,
                        Value::Text(s) if s == "commit" => FilterCommit::OnCommit,
                        _ => {
                            return Err(ConfigError::InvalidValue {
                                option: name.to_string(),
                                expected: "\"edit\" or \"commit\"",
                            })
                        }
                    };
                }
                other => return Err(ConfigError::UnrecognizedOption(other.to_string())),
            }
        }

        let ordered = |a: Size, b: Size| a.width <= b.width && a.height <= b.height;
        if !ordered(config.min_size, config.start_size)
            || !ordered(config.start_size, config.max_size)
        {
            return Err(ConfigError::InvalidValue {
                option: "start_size".to_string(),
                expected: "min_size <= start_size <= max_size",
            });
        }
        Ok(config)
    }
}

// =============================================================================
// Parse helpers
// =============================================================================

fn expect_bool(option: &str, value: &Value) -> Result<bool, ConfigError> {
    match value {
        Value::Bool(b) => Ok(*b),
        _ => Err(ConfigError::InvalidValue {
            option: option.to_string(),
            expected: "a boolean",
        }),
    }
}

fn expect_number(option: &str, value: &Value) -> Result<f64, ConfigError> {
    match value {
        Value::Number(n) => Ok(*n),
        _ => Err(ConfigError::InvalidValue {
            option: option.to_string(),
            expected: "a number",
        }),
    }
}

fn expect_text(option: &str, value: &Value) -> Result<String, ConfigError> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        _ => Err(ConfigError::InvalidValue {
            option: option.to_string(),
            expected: "text",
        }),
    }
}

fn size_table(size: Size) -> Value {
    [
        (Key::text("width"), Value::Number(size.width)),
        (Key::text("height"), Value::Number(size.height)),
    ]
    .into_iter()
    .collect()
}

fn parse_size(option: &str, value: &Value) -> Result<Size, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        option: option.to_string(),
        expected: "a table with numeric `width` and `height`",
    };
    let Value::Table(t) = value else { return Err(invalid()) };
    if t.len() != 2 {
        return Err(invalid());
    }
    let field = |name: &str| match t.get(&Key::text(name)) {
        Some(Value::Number(n)) if *n >= 0.0 => Ok(*n),
        _ => Err(invalid()),
    };
    Ok(Size {
        width: field("width")?,
        height: field("height")?,
    })
}

fn parse_kind_table(
    option: &str,
    value: &Value,
    mut set: impl FnMut(ValueKind, &Value) -> Option<()>,
) -> Result<(), ConfigError> {
    let Value::Table(t) = value else {
        return Err(ConfigError::InvalidValue {
            option: option.to_string(),
            expected: "a table keyed by kind name",
        });
    };
    for (key, entry) in t {
        let kind = key.as_text().and_then(ValueKind::parse).ok_or_else(|| {
            ConfigError::UnrecognizedOption(format!(
                "{option}.{}",
                crate::format::format_key(key)
            ))
        })?;
        set(kind, entry).ok_or(ConfigError::InvalidValue {
            option: option.to_string(),
            expected: "a valid per-kind entry",
        })?;
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
