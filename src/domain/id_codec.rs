//! Combination identifier codec.
//!
//! Renders a [`Combination`] into its canonical string identifier and parses
//! identifiers back, using the templates and patterns declared under
//! `conventions.id_format` in the blueprint.
//!
//! Templates use `{field}` placeholders. A placeholder may carry a format spec
//! after a colon: `[[fill]align][0][width][d|s]`, e.g. `{generation:02d}` or
//! `{symbol:_<8}`. `{{` and `}}` produce literal braces.

use crate::domain::blueprint::Blueprint;
use crate::domain::combination::{Combination, Field};
use crate::domain::error::ReentryError;
use regex::Regex;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FormatSpec {
    fill: char,
    align: Option<Align>,
    zero_pad: bool,
    width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { name: String, spec: FormatSpec },
}

#[derive(Debug, Clone)]
struct IdFormat {
    template: String,
    segments: Vec<Segment>,
    pattern: Regex,
}

#[derive(Debug, Clone)]
pub struct IdCodec {
    readable: IdFormat,
    compact: IdFormat,
}

impl IdCodec {
    pub fn new(
        readable_template: &str,
        readable_regex: &str,
        compact_template: &str,
        compact_regex: &str,
    ) -> Result<Self, ReentryError> {
        Ok(Self {
            readable: IdFormat::new(readable_template, readable_regex)?,
            compact: IdFormat::new(compact_template, compact_regex)?,
        })
    }

    pub fn from_blueprint(bp: &Blueprint) -> Result<Self, ReentryError> {
        let id_format = bp
            .conventions()
            .get("id_format")
            .ok_or_else(|| ReentryError::format("conventions.id_format is missing"))?;
        Self::new(
            id_format_entry(id_format, "readable", "template")?,
            id_format_entry(id_format, "readable", "regex")?,
            id_format_entry(id_format, "compact", "template")?,
            id_format_entry(id_format, "compact", "regex")?,
        )
    }

    pub fn readable_template(&self) -> &str {
        &self.readable.template
    }

    pub fn compact_template(&self) -> &str {
        &self.compact.template
    }

    /// Render the identifier for `combo`. Field values are not validated.
    pub fn build(&self, combo: &Combination, compact: bool) -> Result<String, ReentryError> {
        let format = if compact { &self.compact } else { &self.readable };
        let mut out = String::new();
        for segment in &format.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { name, spec } => {
                    let field: Field = name.parse().map_err(|_| {
                        ReentryError::format(format!(
                            "template references unknown field '{}'",
                            name
                        ))
                    })?;
                    let value = match combo.get(field) {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    out.push_str(&spec.apply(&value, field.is_integer()));
                }
            }
        }
        Ok(out)
    }

    /// Parse an identifier in either form into its captured fields.
    ///
    /// `outcome` and `generation` are returned as integers, everything else
    /// as strings.
    pub fn parse(&self, identifier: &str) -> Result<Map<String, Value>, ReentryError> {
        let (pattern, captures) = [&self.readable.pattern, &self.compact.pattern]
            .into_iter()
            .find_map(|pattern| pattern.captures(identifier).map(|c| (pattern, c)))
            .ok_or_else(|| {
                ReentryError::format(format!("invalid combination id: {}", identifier))
            })?;

        let mut fields = Map::new();
        for name in pattern.capture_names().flatten() {
            let Some(m) = captures.name(name) else {
                continue;
            };
            let value = if name == "outcome" || name == "generation" {
                let n = m.as_str().parse::<i64>().map_err(|_| {
                    ReentryError::format(format!(
                        "{} must be an integer, got '{}'",
                        name,
                        m.as_str()
                    ))
                })?;
                Value::from(n)
            } else {
                Value::from(m.as_str())
            };
            fields.insert(name.to_string(), value);
        }
        Ok(fields)
    }

    pub fn parse_combination(&self, identifier: &str) -> Result<Combination, ReentryError> {
        Combination::from_fields(&self.parse(identifier)?)
    }
}

impl IdFormat {
    fn new(template: &str, regex: &str) -> Result<Self, ReentryError> {
        let pattern = Regex::new(&format!("^(?:{})", regex)).map_err(|e| {
            ReentryError::format(format!("invalid id pattern '{}': {}", regex, e))
        })?;
        Ok(Self {
            template: template.to_string(),
            segments: parse_template(template)?,
            pattern,
        })
    }
}

fn id_format_entry<'a>(
    id_format: &'a Value,
    style: &str,
    key: &str,
) -> Result<&'a str, ReentryError> {
    id_format
        .get(style)
        .and_then(|s| s.get(key))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ReentryError::format(format!("conventions.id_format.{}.{} is missing", style, key))
        })
}

fn parse_template(template: &str) -> Result<Vec<Segment>, ReentryError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' if chars.peek().map(|(_, c)| *c) == Some('{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek().map(|(_, c)| *c) == Some('}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut body = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    body.push(c);
                }
                if !closed {
                    return Err(ReentryError::format(format!(
                        "unclosed placeholder at position {} in template '{}'",
                        pos, template
                    )));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                let (name, spec) = match body.split_once(':') {
                    Some((name, spec)) => (name, FormatSpec::parse(spec)?),
                    None => (body.as_str(), FormatSpec::default()),
                };
                if name.is_empty() {
                    return Err(ReentryError::format(format!(
                        "empty placeholder at position {} in template '{}'",
                        pos, template
                    )));
                }
                segments.push(Segment::Placeholder {
                    name: name.to_string(),
                    spec,
                });
            }
            '}' => {
                return Err(ReentryError::format(format!(
                    "single '}}' at position {} in template '{}'",
                    pos, template
                )));
            }
            _ => literal.push(ch),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

impl Default for FormatSpec {
    fn default() -> Self {
        Self {
            fill: ' ',
            align: None,
            zero_pad: false,
            width: 0,
        }
    }
}

impl FormatSpec {
    fn parse(spec: &str) -> Result<Self, ReentryError> {
        let invalid = || ReentryError::format(format!("unsupported format spec '{}'", spec));
        let chars: Vec<char> = spec.chars().collect();
        let align_of = |c: char| match c {
            '<' => Some(Align::Left),
            '>' => Some(Align::Right),
            '^' => Some(Align::Center),
            _ => None,
        };

        let mut out = FormatSpec::default();
        let mut i = 0;
        if chars.len() >= 2 && align_of(chars[1]).is_some() {
            out.fill = chars[0];
            out.align = align_of(chars[1]);
            i = 2;
        } else if let Some(align) = chars.first().and_then(|c| align_of(*c)) {
            out.align = Some(align);
            i = 1;
        }
        if chars.get(i) == Some(&'0') {
            out.zero_pad = true;
            i += 1;
        }
        let digits_start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i > digits_start {
            let digits: String = chars[digits_start..i].iter().collect();
            out.width = digits.parse().map_err(|_| invalid())?;
        }
        if matches!(chars.get(i), Some('d') | Some('s')) {
            i += 1;
        }
        if i != chars.len() {
            return Err(invalid());
        }
        Ok(out)
    }

    fn apply(&self, value: &str, numeric: bool) -> String {
        let len = value.chars().count();
        if len >= self.width {
            return value.to_string();
        }
        let padding = self.width - len;

        if self.zero_pad && self.align.is_none() {
            let (sign, digits) = match value.strip_prefix('-') {
                Some(rest) if numeric => ("-", rest),
                _ => ("", value),
            };
            return format!("{}{}{}", sign, "0".repeat(padding), digits);
        }

        let fill = if self.zero_pad && self.fill == ' ' {
            '0'
        } else {
            self.fill
        };
        let align = self
            .align
            .unwrap_or(if numeric { Align::Right } else { Align::Left });
        let pad = |n: usize| fill.to_string().repeat(n);
        match align {
            Align::Left => format!("{}{}", value, pad(padding)),
            Align::Right => format!("{}{}", pad(padding), value),
            Align::Center => {
                let left = padding / 2;
                format!("{}{}{}", pad(left), value, pad(padding - left))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const READABLE_T: &str = "{symbol}-{signal_type}-{time_category}-O{outcome}-{context}-G{generation}";
    const READABLE_R: &str = r"(?P<symbol>[A-Z]{6})-(?P<signal_type>[A-Z_]+)-(?P<time_category>[A-Z_]+)-O(?P<outcome>[1-6])-(?P<context>[A-Z0-9_]+)-G(?P<generation>\d+)$";
    const COMPACT_T: &str = "{symbol}:{signal_type}:{time_category}:{outcome}:{context}:{generation:02d}";
    const COMPACT_R: &str = r"(?P<symbol>[A-Z]{6}):(?P<signal_type>[A-Z_]+):(?P<time_category>[A-Z_]+):(?P<outcome>[1-6]):(?P<context>[A-Z0-9_]+):(?P<generation>\d{2})$";

    fn codec() -> IdCodec {
        IdCodec::new(READABLE_T, READABLE_R, COMPACT_T, COMPACT_R).unwrap()
    }

    fn combo() -> Combination {
        Combination {
            symbol: "EURUSD".into(),
            signal_type: "ECO_HIGH".into(),
            time_category: "FLASH".into(),
            outcome: 3,
            context: "PRE_1H".into(),
            generation: 2,
        }
    }

    #[test]
    fn build_readable() {
        let id = codec().build(&combo(), false).unwrap();
        assert_eq!(id, "EURUSD-ECO_HIGH-FLASH-O3-PRE_1H-G2");
    }

    #[test]
    fn build_compact_applies_zero_padding() {
        let id = codec().build(&combo(), true).unwrap();
        assert_eq!(id, "EURUSD:ECO_HIGH:FLASH:3:PRE_1H:02");
    }

    #[test]
    fn parse_casts_integer_fields() {
        let fields = codec().parse("EURUSD-ECO_HIGH-FLASH-O3-PRE_1H-G2").unwrap();
        assert_eq!(fields.get("outcome"), Some(&json!(3)));
        assert_eq!(fields.get("generation"), Some(&json!(2)));
        assert_eq!(fields.get("symbol"), Some(&json!("EURUSD")));
    }

    #[test]
    fn parse_falls_back_to_compact() {
        let fields = codec().parse("EURUSD:ECO_HIGH:FLASH:3:PRE_1H:02").unwrap();
        assert_eq!(fields.get("generation"), Some(&json!(2)));
        assert_eq!(fields.get("context"), Some(&json!("PRE_1H")));
    }

    #[test]
    fn round_trip_both_forms() {
        let c = combo();
        let codec = codec();
        for compact in [false, true] {
            let id = codec.build(&c, compact).unwrap();
            assert_eq!(codec.parse(&id).unwrap(), c.to_fields());
            assert_eq!(codec.parse_combination(&id).unwrap(), c);
        }
    }

    #[test]
    fn parse_rejects_unknown_identifier() {
        let err = codec().parse("not-an-id").unwrap_err();
        assert!(matches!(err, ReentryError::Format { .. }));
    }

    #[test]
    fn parse_is_anchored_at_start() {
        assert!(codec().parse("xxEURUSD-ECO_HIGH-FLASH-O3-PRE_1H-G2").is_err());
    }

    #[test]
    fn build_rejects_unknown_placeholder() {
        let codec = IdCodec::new("{symbol}-{venue}", ".*", "{symbol}", ".*").unwrap();
        let err = codec.build(&combo(), false).unwrap_err();
        assert!(matches!(err, ReentryError::Format { reason } if reason.contains("venue")));
    }

    #[test]
    fn template_escapes_braces() {
        let codec = IdCodec::new("{{{symbol}}}", ".*", "{symbol}", ".*").unwrap();
        assert_eq!(codec.build(&combo(), false).unwrap(), "{EURUSD}");
    }

    #[test]
    fn template_errors_are_reported() {
        assert!(IdCodec::new("{symbol", ".*", "{symbol}", ".*").is_err());
        assert!(IdCodec::new("symbol}", ".*", "{symbol}", ".*").is_err());
        assert!(IdCodec::new("{symbol:x9}", ".*", "{symbol}", ".*").is_err());
        assert!(IdCodec::new("{symbol}", "(", "{symbol}", ".*").is_err());
    }

    #[test]
    fn format_spec_alignment() {
        let spec = FormatSpec::parse("_>8").unwrap();
        assert_eq!(spec.apply("EURUSD", false), "__EURUSD");
        let spec = FormatSpec::parse("^7").unwrap();
        assert_eq!(spec.apply("abc", false), "  abc  ");
        let spec = FormatSpec::parse("4").unwrap();
        assert_eq!(spec.apply("7", true), "   7");
        assert_eq!(spec.apply("ab", false), "ab  ");
        let spec = FormatSpec::parse("03d").unwrap();
        assert_eq!(spec.apply("-7", true), "-07");
    }

    #[test]
    fn from_blueprint_reads_id_format() {
        let bp = Blueprint::from_value(json!({
            "conventions": {"id_format": {
                "readable": {"template": READABLE_T, "regex": READABLE_R},
                "compact": {"template": COMPACT_T, "regex": COMPACT_R}
            }}
        }));
        let codec = IdCodec::from_blueprint(&bp).unwrap();
        assert_eq!(codec.readable_template(), READABLE_T);
        assert_eq!(codec.compact_template(), COMPACT_T);
    }

    #[test]
    fn from_blueprint_names_missing_entry() {
        let bp = Blueprint::from_value(json!({
            "conventions": {"id_format": {"readable": {"template": READABLE_T, "regex": READABLE_R}}}
        }));
        let err = IdCodec::from_blueprint(&bp).unwrap_err();
        assert!(matches!(err, ReentryError::Format { reason } if reason.contains("compact.template")));
    }
}
