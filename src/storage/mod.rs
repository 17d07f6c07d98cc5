//! Persistence layer.
//!
//! Reads historical datasets and live event inputs from JSON files and
//! writes reports back out. The engine itself never touches the
//! filesystem; only the binary calls into this module.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::backtest::HistoricalRecord;
use crate::strategy::EventInput;

async fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {what} from {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse {what} from {}", path.display()))
}

/// Load a backtest dataset: a JSON array of historical records.
pub async fn load_dataset(path: impl AsRef<Path>) -> Result<Vec<HistoricalRecord>> {
    let path = path.as_ref();
    let records: Vec<HistoricalRecord> = read_json(path, "dataset").await?;
    info!(path = %path.display(), records = records.len(), "Dataset loaded");
    Ok(records)
}

/// Load live inputs: a single event or a JSON array of events.
pub async fn load_event_inputs(path: impl AsRef<Path>) -> Result<Vec<EventInput>> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<EventInput>),
        One(Box<EventInput>),
    }

    let path = path.as_ref();
    let inputs = match read_json::<OneOrMany>(path, "event input").await? {
        OneOrMany::Many(v) => v,
        OneOrMany::One(one) => vec![*one],
    };
    info!(path = %path.display(), events = inputs.len(), "Event inputs loaded");
    Ok(inputs)
}

/// Write any report as pretty-printed JSON.
pub async fn save_report<T: Serialize>(report: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(report).context("Failed to serialise report")?;
    tokio::fs::write(path, &json)
        .await
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    debug!(path = %path.display(), bytes = json.len(), "Report saved");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("betting_edge_{name}_{}.json", uuid::Uuid::new_v4()));
        p
    }

    const RECORD: &str = r#"{
        "event": {
            "id": "ev1",
            "outcomes": ["home", "away"],
            "starts_at": "2024-04-06T15:00:00Z"
        },
        "quotes": [
            {"event_id": "ev1", "outcome": "home", "bookmaker": "a", "price": 2.1,
             "captured_at": "2024-04-06T09:00:00Z"}
        ],
        "estimates": [
            {"outcome": "home", "probability": 0.6, "source": "statistical"}
        ],
        "winner": "home"
    }"#;

    #[tokio::test]
    async fn test_load_dataset() {
        let path = temp_path("dataset");
        tokio::fs::write(&path, format!("[{RECORD}]")).await.unwrap();

        let records = load_dataset(&path).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].winner.as_deref(), Some("home"));
        assert_eq!(records[0].input.quotes[0].price, 2.1);
        assert_eq!(records[0].input.estimates[0].weight, None);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_single_event_input() {
        let path = temp_path("input");
        tokio::fs::write(&path, RECORD).await.unwrap();

        let inputs = load_event_inputs(&path).await.unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].event.id, "ev1");

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_report_round_trip() {
        let path = temp_path("report");
        let value = serde_json::json!({"total_bets": 3});
        save_report(&value, &path).await.unwrap();

        let back: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(back, value);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_outcomes_rejected() {
        let path = temp_path("duplicate");
        let bad = RECORD.replace(r#"["home", "away"]"#, r#"["home", "home"]"#);
        tokio::fs::write(&path, format!("[{bad}]")).await.unwrap();

        let err = load_dataset(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse dataset"));
        assert!(load_event_inputs(&path).await.is_err());

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_errors() {
        let err = load_dataset("/nonexistent/betting_edge_dataset.json")
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read dataset"));
    }
}
