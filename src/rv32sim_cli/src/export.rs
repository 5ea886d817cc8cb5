//! Counter export: a textual component-data record written after a run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

#[derive(Serialize)]
struct CounterRecord<'a> {
    component: &'a str,
    counters: BTreeMap<&'a str, u64>,
}

/// Write `counters.toml` into `dir`, creating the directory if needed.
/// Returns the path written.
pub fn write_counters(dir: &Path, counters: &[(String, u64)]) -> anyhow::Result<PathBuf> {
    let record = CounterRecord {
        component: "core",
        counters: counters
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
            .collect(),
    };
    let text = toml::to_string(&record).context("could not serialize the counter record")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("could not create '{}'", dir.display()))?;
    let path = dir.join("counters.toml");
    std::fs::write(&path, text).with_context(|| format!("could not write '{}'", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn record_round_trips_through_toml() {
        let dir = TempDir::new("rv32sim-counters").unwrap();
        let counters = vec![
            ("instructions_retired".to_owned(), 42u64),
            ("retired_loads".to_owned(), 7),
        ];
        let path = write_counters(dir.path(), &counters).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let parsed: toml::Value = text.parse().unwrap();
        assert_eq!(
            parsed["component"].as_str(),
            Some("core")
        );
        assert_eq!(
            parsed["counters"]["instructions_retired"].as_integer(),
            Some(42)
        );
        assert_eq!(parsed["counters"]["retired_loads"].as_integer(), Some(7));
    }
}
