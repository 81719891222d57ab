/// Export of stored contacts to CSV or JSON
use crate::contact::ContactRecord;
use crate::error::Result;
use crate::settings::ExportFormat;
use chrono::{DateTime, Utc};

/// Serialize contacts in the requested format
pub fn export(contacts: &[ContactRecord], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Csv => Ok(to_csv(contacts)),
        ExportFormat::Json => to_json(contacts),
    }
}

/// Union of field names across all contacts, in first-seen order
pub fn headers(contacts: &[ContactRecord]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for contact in contacts {
        for name in contact.field_names() {
            if !headers.iter().any(|h| h == name) {
                headers.push(name.to_string());
            }
        }
    }
    headers
}

/// CSV with one header row; every data value is quoted.
/// Empty input gives an empty string (no header row).
pub fn to_csv(contacts: &[ContactRecord]) -> String {
    if contacts.is_empty() {
        return String::new();
    }

    let headers = headers(contacts);
    let mut rows = Vec::with_capacity(contacts.len() + 1);

    rows.push(
        headers
            .iter()
            .map(|h| {
                if needs_quoting(h) { quote(h) } else { h.clone() }
            })
            .collect::<Vec<_>>()
            .join(","),
    );

    for contact in contacts {
        let row: Vec<String> = headers.iter().map(|h| quote(&contact.cell(h))).collect();
        rows.push(row.join(","));
    }

    rows.join("\n")
}

pub fn to_json(contacts: &[ContactRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(contacts)?)
}

/// `linkedin_contacts_2024-05-01.csv`
pub fn export_filename(format: ExportFormat, now: DateTime<Utc>) -> String {
    format!("linkedin_contacts_{}.{}", now.format("%Y-%m-%d"), format.ext())
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn needs_quoting(value: &str) -> bool {
    value.contains([',', '"', '\n', '\r'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(value: serde_json::Value) -> ContactRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_csv_headers_first_seen_across_records() {
        let contacts = vec![
            record(json!({"name": "A", "title": "T"})),
            record(json!({"email": "b@x.io", "name": "B"})),
        ];

        let csv = to_csv(&contacts);

        let lines: Vec<&str> = csv.split('\n').collect();
        assert_eq!(lines[0], "name,title,email");
        assert_eq!(lines[1], r#""A","T","""#);
        assert_eq!(lines[2], r#""B","","b@x.io""#);
    }

    #[test]
    fn test_csv_quoting_round_trip() {
        let tricky = [
            r#"He said "hi""#,
            "comma, inside",
            "line\nbreak",
            r#""""#,
            "plain",
        ];
        let contacts: Vec<ContactRecord> = tricky
            .iter()
            .map(|v| record(json!({"profileUrl": "https://site.example/in/x", "about": v})))
            .collect();

        let csv = to_csv(&contacts);

        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(csv.as_bytes());
        let header = reader.headers().unwrap().clone();
        assert_eq!(header.iter().collect::<Vec<_>>(), vec!["profileUrl", "about"]);

        let parsed: Vec<String> = reader
            .records()
            .map(|r| r.unwrap()[1].to_string())
            .collect();
        assert_eq!(parsed, tricky.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn test_csv_renders_flags_and_numbers() {
        let contacts = vec![record(json!({"premium": true, "searchIndex": 4, "scraped": false}))];

        assert_eq!(to_csv(&contacts), "premium,searchIndex,scraped\n\"true\",\"4\",\"false\"");
    }

    #[test]
    fn test_empty_exports() {
        assert_eq!(export(&[], ExportFormat::Csv).unwrap(), "");
        assert_eq!(export(&[], ExportFormat::Json).unwrap(), "[]");
    }

    #[test]
    fn test_json_is_pretty() {
        let contacts = vec![record(json!({"name": "A"}))];

        let out = to_json(&contacts).unwrap();

        assert_eq!(out, "[\n  {\n    \"name\": \"A\"\n  }\n]");
    }

    #[test]
    fn test_export_filename() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 0).unwrap();

        assert_eq!(export_filename(ExportFormat::Csv, now), "linkedin_contacts_2024-05-01.csv");
        assert_eq!(export_filename(ExportFormat::Json, now), "linkedin_contacts_2024-05-01.json");
    }
}
