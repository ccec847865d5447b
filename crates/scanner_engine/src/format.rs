use chrono::NaiveDateTime;
use scanner_core::SnapshotFormat;
use serde_json::json;

use crate::extract::strip_tags;

/// Input to a formatter: one capture plus how the job wants it written.
#[derive(Debug, Clone, Copy)]
pub struct FormatRequest<'a> {
    pub job: &'a str,
    pub captured_at: NaiveDateTime,
    pub content: &'a str,
    pub format: SnapshotFormat,
    pub strip_tags: bool,
}

/// Turns captured content into the bytes written to a snapshot file.
pub trait SnapshotFormatter: Send + Sync {
    fn render(&self, request: &FormatRequest<'_>) -> String;
}

/// Plain text, CSV with one row per non-blank line, or a JSON document.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFormatter;

impl SnapshotFormatter for DefaultFormatter {
    fn render(&self, request: &FormatRequest<'_>) -> String {
        let body = if request.strip_tags {
            strip_tags(request.content)
        } else {
            request.content.to_string()
        };
        let body = body.trim();

        match request.format {
            SnapshotFormat::Text => body.to_string(),
            SnapshotFormat::Csv => render_csv(body),
            SnapshotFormat::Json => {
                let doc = json!({
                    "job": request.job,
                    "captured_at": request.captured_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
                    "tags_stripped": request.strip_tags,
                    "content": body,
                });
                format!("{doc:#}")
            }
        }
    }
}

fn render_csv(body: &str) -> String {
    let mut out = String::from("line,content\n");
    for (idx, line) in body.lines().filter(|l| !l.trim().is_empty()).enumerate() {
        out.push_str(&format!("{},{}\n", idx + 1, csv_field(line)));
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request(content: &str, format: SnapshotFormat, strip: bool) -> String {
        let captured_at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        DefaultFormatter.render(&FormatRequest {
            job: "news",
            captured_at,
            content,
            format,
            strip_tags: strip,
        })
    }

    #[test]
    fn text_is_trimmed_content() {
        assert_eq!(
            request("<h2>A</h2>\n\n", SnapshotFormat::Text, false),
            "<h2>A</h2>"
        );
        assert_eq!(request("<h2>A</h2>\n\n", SnapshotFormat::Text, true), "A");
    }

    #[test]
    fn csv_quotes_fields_that_need_it() {
        let csv = request("plain\n\nwith, comma\nsay \"hi\"", SnapshotFormat::Csv, false);
        assert_eq!(
            csv,
            "line,content\n1,plain\n2,\"with, comma\"\n3,\"say \"\"hi\"\"\"\n"
        );
    }

    #[test]
    fn json_carries_job_and_timestamp() {
        let text = request("<p>x</p>", SnapshotFormat::Json, true);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["job"], "news");
        assert_eq!(value["captured_at"], "2024-01-02T03:04:05");
        assert_eq!(value["content"], "x");
        assert_eq!(value["tags_stripped"], true);
    }
}
