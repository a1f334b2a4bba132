use anyhow::{anyhow, Context, Result};
use duckdb::types::ToSql;
use duckdb::Connection;
use serde_json::Value;

use sitelens_core::analytics::{EventStore, Row};
use sitelens_core::sql::{iso_instant, parse_store_timestamp, ColumnKind, QueryPlan, SqlValue};

use crate::DuckDbBackend;

#[async_trait::async_trait]
impl EventStore for DuckDbBackend {
    async fn fetch(&self, plan: &QueryPlan) -> Result<Vec<Row>> {
        let conn = self.reader().await?;
        let plan = plan.clone();
        let label = plan.label;
        tokio::task::spawn_blocking(move || run_plan(&conn, &plan))
            .await
            .map_err(|e| anyhow!("{label} query task failed: {e}"))?
    }

    async fn ping(&self) -> Result<()> {
        DuckDbBackend::ping(self).await
    }
}

fn run_plan(conn: &Connection, plan: &QueryPlan) -> Result<Vec<Row>> {
    let params: Vec<Box<dyn ToSql>> = plan
        .params
        .iter()
        .map(|p| -> Box<dyn ToSql> {
            match p {
                SqlValue::Text(s) => Box::new(s.clone()),
                SqlValue::Int(i) => Box::new(*i),
                SqlValue::Float(f) => Box::new(*f),
            }
        })
        .collect();
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn
        .prepare(&plan.sql)
        .with_context(|| format!("preparing {} query", plan.label))?;
    let mut rows = stmt
        .query(param_refs.as_slice())
        .with_context(|| format!("executing {} query", plan.label))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (idx, column) in plan.columns.iter().enumerate() {
            record.insert(column.name.clone(), read_cell(row, idx, column.kind)?);
        }
        out.push(record);
    }
    Ok(out)
}

/// Coerce one engine value to its JSON form.
fn read_cell(row: &duckdb::Row<'_>, idx: usize, kind: ColumnKind) -> Result<Value> {
    let value = match kind {
        ColumnKind::Int => row.get::<_, Option<i64>>(idx)?.map(Value::from),
        ColumnKind::Float => row.get::<_, Option<f64>>(idx)?.map(Value::from),
        ColumnKind::Text => row.get::<_, Option<String>>(idx)?.map(Value::String),
        ColumnKind::Timestamp => row
            .get::<_, Option<String>>(idx)?
            .map(|raw| match parse_store_timestamp(&raw) {
                Some(ts) => Value::String(iso_instant(ts)),
                None => Value::String(raw),
            }),
        ColumnKind::Json => row
            .get::<_, Option<String>>(idx)?
            .map(|raw| serde_json::from_str(&raw).unwrap_or(Value::String(raw))),
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sitelens_core::sql::{Column, QueryBuilder};

    #[tokio::test]
    async fn values_are_bound_and_cells_coerced() {
        let db = DuckDbBackend::open_in_memory().unwrap();
        let mut q = QueryBuilder::new();
        let n = q.bind(41_i64);
        let s = q.bind("it's bound");
        let sql = format!(
            "SELECT CAST({n} AS BIGINT) AS n, CAST(0.5 AS DOUBLE) AS f, CAST({s} AS VARCHAR) AS s, \
             CAST(CAST('2024-01-02 03:04:05' AS TIMESTAMP) AS VARCHAR) AS ts, \
             '{{\"plan\":\"pro\"}}' AS doc, CAST(NULL AS VARCHAR) AS missing"
        );
        let plan = q.finish(
            "probe",
            sql,
            vec![
                Column::new("n", ColumnKind::Int),
                Column::new("f", ColumnKind::Float),
                Column::new("s", ColumnKind::Text),
                Column::new("ts", ColumnKind::Timestamp),
                Column::new("doc", ColumnKind::Json),
                Column::new("missing", ColumnKind::Text),
            ],
        );

        let rows = db.fetch(&plan).await.unwrap();
        assert_eq!(
            Value::Object(rows[0].clone()),
            json!({
                "n": 41,
                "f": 0.5,
                "s": "it's bound",
                "ts": "2024-01-02T03:04:05.000Z",
                "doc": {"plan": "pro"},
                "missing": null
            })
        );
    }

    #[tokio::test]
    async fn engine_errors_surface_as_errors() {
        let db = DuckDbBackend::open_in_memory().unwrap();
        let plan = QueryBuilder::new().finish("broken", "SELECT * FROM nowhere".into(), Vec::new());
        let err = db.fetch(&plan).await.unwrap_err();
        assert!(err.to_string().contains("broken"));
    }
}
