//! Event-store abstraction.
//!
//! Query constructors produce [`QueryPlan`]s; an [`EventStore`] executes them
//! and hands back rows already coerced to JSON-friendly types (integers,
//! floats, ISO-8601 instants, parsed JSON documents).

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;

use crate::sql::QueryPlan;

pub type Row = serde_json::Map<String, serde_json::Value>;

#[async_trait::async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Execute a read-only plan. Engine error text stays inside the returned
    /// error and must not be forwarded to API callers.
    async fn fetch(&self, plan: &QueryPlan) -> Result<Vec<Row>>;

    /// Cheap liveness probe used by the health endpoint.
    async fn ping(&self) -> Result<()>;
}

/// Execute `plan` and deserialize every row into `T`.
pub async fn fetch_as<T: DeserializeOwned>(store: &dyn EventStore, plan: &QueryPlan) -> Result<Vec<T>> {
    store
        .fetch(plan)
        .await?
        .into_iter()
        .map(|row| {
            serde_json::from_value(serde_json::Value::Object(row))
                .with_context(|| format!("decoding {} row", plan.label))
        })
        .collect()
}

/// Execute a single-row plan that projects one integer column named `total`.
pub async fn fetch_total(store: &dyn EventStore, plan: &QueryPlan) -> Result<i64> {
    let rows = store.fetch(plan).await?;
    match rows.first().and_then(|r| r.get("total")) {
        None => Ok(0),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| anyhow!("{}: total is not an integer", plan.label)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::CountRow;
    use crate::sql::QueryBuilder;
    use serde_json::json;

    struct FixedStore(Vec<Row>);

    #[async_trait::async_trait]
    impl EventStore for FixedStore {
        async fn fetch(&self, _plan: &QueryPlan) -> Result<Vec<Row>> {
            Ok(self.0.clone())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    fn row(v: serde_json::Value) -> Row {
        match v {
            serde_json::Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    fn plan() -> QueryPlan {
        QueryBuilder::new().finish("test", "SELECT 1".into(), Vec::new())
    }

    #[tokio::test]
    async fn rows_decode_into_typed_structs() {
        let store = FixedStore(vec![row(json!({"total": 12}))]);
        let rows: Vec<CountRow> = fetch_as(&store, &plan()).await.unwrap();
        assert_eq!(rows, vec![CountRow { total: 12 }]);
        assert_eq!(fetch_total(&store, &plan()).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn missing_total_row_counts_as_zero() {
        let store = FixedStore(Vec::new());
        assert_eq!(fetch_total(&store, &plan()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn shape_mismatch_is_an_error() {
        let store = FixedStore(vec![row(json!({"total": "many"}))]);
        assert!(fetch_as::<CountRow>(&store, &plan()).await.is_err());
        assert!(fetch_total(&store, &plan()).await.is_err());
    }
}
