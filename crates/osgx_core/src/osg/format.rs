//! Float formatting and placeholder-based indentation.

use std::collections::HashSet;

use crate::config::ExportConfig;
use crate::graph::ObjectId;

/// Placeholder expanded to `level × indent` spaces.
pub const LEVEL_MARK: char = '$';

/// Placeholder expanded to `block_indent` spaces.
pub const BLOCK_MARK: char = '#';

/// Render a float with a fixed number of decimals, rounding to nearest.
/// Non-finite values are written as `0`; negative zero loses its sign.
pub fn format_float(value: f32, precision: usize) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let text = format!("{:.*}", precision, value);
    match text.strip_prefix('-') {
        Some(rest) if rest.chars().all(|c| c == '0' || c == '.') => rest.to_string(),
        _ => text,
    }
}

/// Expands the leading placeholders of a line template.
#[derive(Clone, Copy, Debug)]
pub struct Encoder {
    pub indent: usize,
    pub block_indent: usize,
}

impl Default for Encoder {
    fn default() -> Self {
        Self {
            indent: 2,
            block_indent: 2,
        }
    }
}

impl Encoder {
    /// Replace the run of placeholders at the start of `template`. Marks
    /// after the first other character are kept literally, so names and
    /// paths containing `$` or `#` pass through.
    pub fn encode(&self, level: usize, template: &str) -> String {
        let mut out = String::with_capacity(template.len() + level * self.indent);
        let mut rest = template;
        loop {
            if let Some(tail) = rest.strip_prefix(LEVEL_MARK) {
                out.extend(std::iter::repeat(' ').take(level * self.indent));
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix(BLOCK_MARK) {
                out.extend(std::iter::repeat(' ').take(self.block_indent));
                rest = tail;
            } else {
                break;
            }
        }
        out.push_str(rest);
        out
    }
}

/// Per-job serialization state.
#[derive(Clone, Debug)]
pub struct WriteContext {
    pub encoder: Encoder,
    pub precision: usize,
    written: HashSet<ObjectId>,
}

impl Default for WriteContext {
    fn default() -> Self {
        Self {
            encoder: Encoder::default(),
            precision: 5,
            written: HashSet::new(),
        }
    }
}

impl WriteContext {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            encoder: Encoder {
                indent: config.indent,
                block_indent: config.block_indent,
            },
            precision: config.float_precision,
            written: HashSet::new(),
        }
    }

    /// Forget every written id, before serializing another graph.
    pub fn reset(&mut self) {
        self.written.clear();
    }

    /// Record `id` as written. Returns false if it already was.
    pub fn mark_written(&mut self, id: ObjectId) -> bool {
        self.written.insert(id)
    }

    pub fn float(&self, value: f32) -> String {
        format_float(value, self.precision)
    }

    /// Space separated list of floats.
    pub fn floats(&self, values: &[f32]) -> String {
        values
            .iter()
            .map(|v| self.float(*v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Quote a string for the text format.
pub fn quote(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('"');
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result.push('"');
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float_rounds() {
        assert_eq!(format_float(1.0, 5), "1.00000");
        assert_eq!(format_float(0.123456, 5), "0.12346");
        assert_eq!(format_float(2.6, 0), "3");
        assert_eq!(format_float(-0.000001, 3), "0.000");
        assert_eq!(format_float(-1.26, 1), "-1.3");
    }

    #[test]
    fn test_format_float_nan_is_zero() {
        assert_eq!(format_float(f32::NAN, 5), "0");
        assert_eq!(format_float(f32::INFINITY, 2), "0");
    }

    #[test]
    fn test_format_float_roundtrip_within_half_ulp() {
        let values = [0.0f32, 1.0, -3.141_592_7, 12345.678, 0.000_05, -0.499_99, 7.999_999];
        for precision in 0..=6 {
            let tolerance = 0.5 * 10f64.powi(-(precision as i32)) + 1e-3 * 10f64.powi(-(precision as i32));
            for v in values {
                let text = format_float(v, precision);
                let back: f64 = text.parse().unwrap();
                assert!(
                    (back - v as f64).abs() <= tolerance,
                    "{} at {} -> {}",
                    v,
                    precision,
                    text
                );
            }
        }
    }

    #[test]
    fn test_encoder_expands_leading_marks() {
        let enc = Encoder {
            indent: 2,
            block_indent: 3,
        };
        assert_eq!(enc.encode(0, "$Group {"), "Group {");
        assert_eq!(enc.encode(2, "$Group {"), "    Group {");
        assert_eq!(enc.encode(1, "$#name \"a\""), "     name \"a\"");
        assert_eq!(enc.encode(1, "$##1 2"), "        1 2");
    }

    #[test]
    fn test_encoder_keeps_marks_inside_text() {
        let enc = Encoder::default();
        assert_eq!(enc.encode(1, "$#name \"$#x\""), "    name \"$#x\"");
    }

    #[test]
    fn test_written_set_reset() {
        let mut graph = crate::graph::SceneGraph::new();
        let id = graph.add(
            "g",
            crate::graph::DataVariance::Static,
            crate::graph::ObjectData::Group(Default::default()),
        );
        let mut ctx = WriteContext::default();
        assert!(ctx.mark_written(id));
        assert!(!ctx.mark_written(id));
        ctx.reset();
        assert!(ctx.mark_written(id));
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
        assert_eq!(quote("plain"), "\"plain\"");
    }
}
