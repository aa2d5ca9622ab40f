use std::fmt::Write as _;

use crate::metric::{FieldValue, Fields, Metric, Tags};

/// Wire-level record handed to a [`TimeSeriesClient`](super::TimeSeriesClient).
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: Tags,
    pub fields: Fields,
    pub timestamp: Option<i64>,
}

impl Point {
    /// `metric.timestamp` is carried as is; the builder already scaled it to
    /// the configured precision.
    pub fn from_metric(metric: &Metric) -> Self {
        Self {
            measurement: metric.name.clone(),
            tags: metric.tags.clone(),
            fields: metric.fields.clone(),
            timestamp: Some(metric.timestamp),
        }
    }

    /// Encodes the point as one line of InfluxDB line protocol.
    ///
    /// Empty tag values and non-finite floats are left out. A point left
    /// with no fields cannot be written and yields `None`.
    pub fn to_line_protocol(&self) -> Option<String> {
        let mut line = String::with_capacity(128);
        escape_key(&mut line, &self.measurement, MEASUREMENT_SPECIALS);

        for (k, v) in &self.tags {
            if k.is_empty() || v.is_empty() {
                continue;
            }
            line.push(',');
            escape_key(&mut line, k, KEY_SPECIALS);
            line.push('=');
            escape_key(&mut line, v, KEY_SPECIALS);
        }

        let mut first = true;
        for (k, v) in &self.fields {
            if let FieldValue::Float(f) = v {
                if !f.is_finite() {
                    continue;
                }
            }
            line.push(if first { ' ' } else { ',' });
            first = false;
            escape_key(&mut line, k, KEY_SPECIALS);
            line.push('=');
            match v {
                FieldValue::Integer(i) => {
                    let _ = write!(line, "{i}i");
                }
                FieldValue::Float(f) => {
                    let _ = write!(line, "{f}");
                }
                FieldValue::Boolean(b) => {
                    let _ = write!(line, "{b}");
                }
                FieldValue::String(s) => {
                    line.push('"');
                    escape_string(&mut line, s);
                    line.push('"');
                }
            }
        }
        if first {
            return None;
        }

        if let Some(ts) = self.timestamp {
            let _ = write!(line, " {ts}");
        }
        Some(line)
    }
}

const MEASUREMENT_SPECIALS: &[char] = &[',', ' ', '\\'];

/// Characters that must be escaped in tag keys, tag values and field keys.
const KEY_SPECIALS: &[char] = &[',', '=', ' ', '\\'];

/// Line breaks and tabs are spelled out so a point never spans two lines.
fn escape_key(out: &mut String, s: &str, specials: &[char]) {
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => {
                if specials.contains(&c) {
                    out.push('\\');
                }
                out.push(c);
            }
        }
    }
}

fn escape_string(out: &mut String, s: &str) {
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Joins the encodable points of a batch, one per line.
pub fn encode_batch(points: &[Point]) -> String {
    points
        .iter()
        .filter_map(Point::to_line_protocol)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> Point {
        let mut tags = Tags::new();
        tags.insert("hook".into(), "render_partial".into());
        tags.insert("location".into(), "MetricsController#index".into());
        let mut fields = Fields::new();
        fields.insert("value".into(), FieldValue::Integer(12));
        fields.insert("request_id".into(), "abc".into());
        Point {
            measurement: "axum".into(),
            tags,
            fields,
            timestamp: Some(1_514_797_200_000),
        }
    }

    #[test]
    fn encodes_tags_fields_and_timestamp() {
        assert_eq!(
            point().to_line_protocol().unwrap(),
            "axum,hook=render_partial,location=MetricsController#index \
             request_id=\"abc\",value=12i 1514797200000"
        );
    }

    #[test]
    fn escapes_special_characters() {
        let mut p = point();
        p.measurement = "my app,v2".into();
        p.tags.clear();
        p.tags.insert("file name".into(), "a=b,c".into());
        p.fields.clear();
        p.fields.insert("sql".into(), r#"SELECT "x" FROM t WHERE y = '\'"#.into());
        p.timestamp = None;
        assert_eq!(
            p.to_line_protocol().unwrap(),
            r#"my\ app\,v2,file\ name=a\=b\,c sql="SELECT \"x\" FROM t WHERE y = '\\'""#
        );
    }

    #[test]
    fn line_breaks_and_backslashes_stay_on_one_line() {
        let mut p = point();
        p.tags.clear();
        p.tags.insert("location".into(), "import\nreport\tq\r".into());
        p.tags.insert("path".into(), r"C:\jobs\".into());
        p.fields.clear();
        p.fields.insert("value".into(), FieldValue::Integer(3));
        p.timestamp = Some(1);

        let body = encode_batch(&[p.clone(), p]);
        assert_eq!(body.lines().count(), 2);
        assert_eq!(
            body.lines().next().unwrap(),
            r"axum,location=import\nreport\tq\r,path=C:\\jobs\\ value=3i 1"
        );
    }

    #[test]
    fn skips_empty_tags_and_non_finite_floats() {
        let mut p = point();
        p.tags.insert("app_name".into(), String::new());
        p.fields.insert("ratio".into(), FieldValue::Float(f64::NAN));
        p.fields.insert("on".into(), FieldValue::Boolean(true));
        let line = p.to_line_protocol().unwrap();
        assert!(!line.contains("app_name"));
        assert!(!line.contains("ratio"));
        assert!(line.contains("on=true"));
    }

    #[test]
    fn point_without_fields_is_not_encodable() {
        let mut p = point();
        p.fields.clear();
        assert!(p.to_line_protocol().is_none());
        assert_eq!(encode_batch(&[p, point()]).lines().count(), 1);
    }
}
