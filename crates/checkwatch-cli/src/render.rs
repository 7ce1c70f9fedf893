//! Output formatting for aggregation results.

use checkwatch_core::{AggregationResult, Origin};
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Serialize)]
struct ResultLine<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation: Option<u64>,
    #[serde(flatten)]
    result: &'a AggregationResult,
}

/// Render one result, optionally tagged with the session that produced it.
pub fn render_result(
    format: OutputFormat,
    origin: Option<&Origin>,
    result: &AggregationResult,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(&ResultLine {
            revision: origin.map(|o| o.revision.to_string()),
            generation: origin.map(|o| o.generation),
            result,
        })?),
        OutputFormat::Text => {
            let overall = result
                .overall_status
                .map(|s| s.as_str().to_uppercase())
                .unwrap_or_else(|| "UNKNOWN".to_string());
            let state = if result.is_complete { "complete" } else { "in progress" };
            let prefix = origin
                .map(|o| format!("[{} #{}] ", o.revision, o.generation))
                .unwrap_or_default();
            Ok(format!("{prefix}{overall} ({state}) {}", result.summary_line()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkwatch_core::{aggregate, Check, CheckStatus, RevisionKey};

    #[test]
    fn test_text_includes_overall_and_summary() {
        let result = aggregate(&[
            Check::new("a", CheckStatus::Failure),
            Check::new("b", CheckStatus::Success),
        ]);
        let line = render_result(OutputFormat::Text, None, &result).unwrap();
        assert_eq!(line, "FAILURE (complete) 2 checks: 1 failure, 1 success");
    }

    #[test]
    fn test_text_prefixes_origin() {
        let origin = Origin {
            revision: RevisionKey::new("org/app", "abc"),
            generation: 4,
        };
        let line = render_result(OutputFormat::Text, Some(&origin), &aggregate(&[])).unwrap();
        assert!(line.starts_with("[org/app@abc #4] UNKNOWN (in progress)"));
    }

    #[test]
    fn test_json_flattens_result() {
        let result = aggregate(&[Check::new("a", CheckStatus::Running)]);
        let line = render_result(OutputFormat::Json, None, &result).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["overall_status"], "running");
        assert_eq!(value["counts"]["running"], 1);
        assert_eq!(value["is_complete"], false);
        assert!(value.get("revision").is_none());
    }
}
