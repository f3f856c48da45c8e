//! `COPY ... FROM STDIN` text-format encoding and streaming
//!
//! Rows are tab separated and newline terminated, `\N` is NULL, and
//! backslash, tab, CR and LF inside values are backslash escaped.

use crate::{Error, Result, Stage};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnection, PgCopyIn, PgPoolCopyExt};
use sqlx::PgPool;
use std::ops::DerefMut;
use uuid::Uuid;

/// A record that can be bulk loaded with `COPY`.
pub trait CopyRecord {
    /// Fully qualified target table.
    const TABLE: &'static str;
    /// Columns in the order `write_fields` emits them.
    const COLUMNS: &'static [&'static str];

    fn write_fields(&self, row: &mut CopyRow<'_>);

    fn copy_statement() -> String {
        format!(
            "COPY {} ({}) FROM STDIN",
            Self::TABLE,
            Self::COLUMNS.join(", ")
        )
    }
}

/// A single value in COPY text format.
pub trait CopyValue {
    fn encode(&self, out: &mut String);
}

impl CopyValue for str {
    fn encode(&self, out: &mut String) {
        for c in self.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\t' => out.push_str("\\t"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                other => out.push(other),
            }
        }
    }
}

impl CopyValue for String {
    fn encode(&self, out: &mut String) {
        self.as_str().encode(out);
    }
}

impl CopyValue for Uuid {
    fn encode(&self, out: &mut String) {
        out.push_str(&self.hyphenated().to_string());
    }
}

impl CopyValue for i32 {
    fn encode(&self, out: &mut String) {
        out.push_str(&self.to_string());
    }
}

impl CopyValue for i64 {
    fn encode(&self, out: &mut String) {
        out.push_str(&self.to_string());
    }
}

impl CopyValue for bool {
    fn encode(&self, out: &mut String) {
        out.push(if *self { 't' } else { 'f' });
    }
}

impl CopyValue for Decimal {
    fn encode(&self, out: &mut String) {
        out.push_str(&self.to_string());
    }
}

impl CopyValue for DateTime<Utc> {
    fn encode(&self, out: &mut String) {
        out.push_str(&self.to_rfc3339_opts(SecondsFormat::Micros, true));
    }
}

impl<T: CopyValue> CopyValue for Option<T> {
    fn encode(&self, out: &mut String) {
        match self {
            Some(value) => value.encode(out),
            None => out.push_str("\\N"),
        }
    }
}

/// Field writer for one row; the row terminator is added when it is dropped.
pub struct CopyRow<'a> {
    out: &'a mut String,
    first: bool,
}

impl CopyRow<'_> {
    pub fn field<V: CopyValue + ?Sized>(&mut self, value: &V) -> &mut Self {
        if !self.first {
            self.out.push('\t');
        }
        self.first = false;
        value.encode(self.out);
        self
    }
}

impl Drop for CopyRow<'_> {
    fn drop(&mut self) {
        self.out.push('\n');
    }
}

/// Encode `rows` as one COPY payload.
pub fn encode_rows<R: CopyRecord>(rows: &[R]) -> String {
    let mut out = String::with_capacity(rows.len() * 128);
    for record in rows {
        let mut row = CopyRow {
            out: &mut out,
            first: true,
        };
        record.write_fields(&mut row);
    }
    out
}

/// Stream `rows` through `conn` (usually an open transaction). Returns rows written.
pub async fn copy_rows<R: CopyRecord>(
    conn: &mut PgConnection,
    rows: &[R],
    stage: Stage,
) -> Result<u64> {
    let payload = encode_rows(rows);
    let copy = conn
        .copy_in_raw(&R::copy_statement())
        .await
        .map_err(|e| Error::store(stage, e))?;
    stream(copy, payload, stage).await
}

/// Stream `rows` through a pooled connection as one atomic load, without an explicit transaction.
pub async fn copy_rows_pooled<R: CopyRecord>(
    pool: &PgPool,
    rows: &[R],
    stage: Stage,
) -> Result<u64> {
    let payload = encode_rows(rows);
    let copy = pool
        .copy_in_raw(&R::copy_statement())
        .await
        .map_err(|e| Error::store(stage, e))?;
    stream(copy, payload, stage).await
}

async fn stream<C>(mut copy: PgCopyIn<C>, payload: String, stage: Stage) -> Result<u64>
where
    C: DerefMut<Target = PgConnection>,
{
    if let Err(e) = copy.send(payload.as_bytes()).await {
        if let Err(abort_err) = copy.abort("bulk load aborted by client").await {
            tracing::warn!(stage = %stage, error = %abort_err, "COPY abort failed");
        }
        return Err(Error::store(stage, e));
    }
    copy.finish().await.map_err(|e| Error::store(stage, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Sample {
        id: i32,
        name: String,
        note: Option<String>,
        active: bool,
        at: DateTime<Utc>,
    }

    impl CopyRecord for Sample {
        const TABLE: &'static str = "catalog.samples";
        const COLUMNS: &'static [&'static str] = &["id", "name", "note", "active", "at"];

        fn write_fields(&self, row: &mut CopyRow<'_>) {
            row.field(&self.id)
                .field(&self.name)
                .field(&self.note)
                .field(&self.active)
                .field(&self.at);
        }
    }

    #[test]
    fn statement_lists_columns_in_order() {
        assert_eq!(
            Sample::copy_statement(),
            "COPY catalog.samples (id, name, note, active, at) FROM STDIN"
        );
    }

    #[test]
    fn rows_are_tab_separated_with_null_markers() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        let rows = [
            Sample {
                id: 1,
                name: "plain".into(),
                note: None,
                active: true,
                at,
            },
            Sample {
                id: 2,
                name: "tab\there\\slash\nline\rret".into(),
                note: Some("n".into()),
                active: false,
                at,
            },
        ];

        let encoded = encode_rows(&rows);
        let lines: Vec<&str> = encoded.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "1\tplain\t\\N\tt\t2025-03-01T12:30:00.000000Z");
        assert_eq!(
            lines[1],
            "2\ttab\\there\\\\slash\\nline\\rret\tn\tf\t2025-03-01T12:30:00.000000Z"
        );
        assert!(encoded.ends_with('\n'));
    }

    #[test]
    fn decimals_and_uuids_use_canonical_text() {
        let mut out = String::new();
        Decimal::new(-12345, 2).encode(&mut out);
        assert_eq!(out, "-123.45");

        let mut out = String::new();
        Uuid::nil().encode(&mut out);
        assert_eq!(out, "00000000-0000-0000-0000-000000000000");
    }
}
