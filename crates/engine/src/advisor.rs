// crates/engine/src/advisor.rs
use adapters::AnalysisSource;
use chrono::NaiveDate;
use common::Result;
use std::sync::Arc;
use std::time::Instant;
use universe::weights::{resolve_from_text, strip_weight_block};
use universe::WeightResolution;

/// Report text for display plus the weights resolved from it
#[derive(Debug, Clone)]
pub struct Analysis {
    pub report: String,
    pub resolution: WeightResolution,
}

/// Asks the text-generation service for a rate outlook and factor weights
pub struct Advisor {
    source: Arc<dyn AnalysisSource>,
}

impl Advisor {
    pub fn new(source: Arc<dyn AnalysisSource>) -> Self {
        Self { source }
    }

    /// A failed request is an error; an unreadable weight block is not.
    pub async fn analyze(&self, today: NaiveDate) -> Result<Analysis> {
        let start = Instant::now();
        tracing::info!("Requesting factor analysis from {}", self.source.model());

        let text = self.source.generate(&analysis_prompt(today)).await?;
        tracing::info!("Analysis received in {:?} ({} chars)", start.elapsed(), text.len());

        let resolution = resolve_from_text(&text);
        Ok(Analysis {
            report: strip_weight_block(&text),
            resolution,
        })
    }
}

pub fn analysis_prompt(today: NaiveDate) -> String {
    format!(
        r#"# Role
You are a Korean macroeconomist and quantitative equity strategist. Study recent
Korean market news and published data, and rate how much each factor below
matters for stock returns right now. Your answer sets the factor weights of a
stock and ETF ranking model.

# Constraints
- Frame the report around the Bank of Korea's next base rate decision.
- Today is {today}. Base the analysis on the last three months of material.
- Factors:
  - Momentum: price trend, rising volume
  - Value: low PER, low PBR
  - Quality: steady growth in revenue, operating profit and net income
- Cite objective data and official releases.

# Output
- [Bank of Korea] Probability of a rate cut in percent, with supporting evidence.
- [Factor importance] Weight (%) of Momentum, Value and Quality under the cut and
  hold scenarios, with reasons.
- [Required] End the report with one final set of weights for current
  conditions, independent of scenario, written only as the JSON block below.
  The three weights must sum to 100.
```json
{{
  "Momentum": 30,
  "Value": 20,
  "Quality": 50
}}
```
"#,
        today = today.format("%Y.%m.%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::{Error, WeightVector};
    use universe::{FallbackReason, WeightSource};

    struct CannedAnalysis(std::result::Result<&'static str, &'static str>);

    #[async_trait]
    impl AnalysisSource for CannedAnalysis {
        async fn generate(&self, prompt: &str) -> Result<String> {
            assert!(prompt.contains("```json"));
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(msg) => Err(Error::Upstream(msg.to_string())),
            }
        }

        fn model(&self) -> &str {
            "canned"
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
    }

    #[test]
    fn test_prompt_is_dated() {
        let prompt = analysis_prompt(day());
        assert!(prompt.contains("Today is 2025.03.07."));
        assert!(prompt.contains("\"Momentum\": 30"));
    }

    #[test]
    fn test_prompt_sample_block_parses() {
        let resolved = resolve_from_text(&analysis_prompt(day()));
        assert_eq!(resolved.weights, WeightVector::new(30.0, 20.0, 50.0));
    }

    #[tokio::test]
    async fn test_analyze_splits_report_and_weights() {
        let advisor = Advisor::new(Arc::new(CannedAnalysis(Ok(
            "[Bank of Korea] Cut probability 65%.\n\n\
             [Factor importance] Momentum leads.\n\n\
             ```json\n{\"Momentum\": 45, \"Value\": 25, \"Quality\": 30}\n```\n",
        ))));

        let analysis = advisor.analyze(day()).await.unwrap();
        assert_eq!(analysis.resolution.source, WeightSource::Parsed);
        assert_eq!(analysis.resolution.weights, WeightVector::new(45.0, 25.0, 30.0));
        assert!(analysis.report.ends_with("Momentum leads."));
        assert!(!analysis.report.contains("```"));
    }

    #[tokio::test]
    async fn test_analyze_without_block_falls_back() {
        let advisor = Advisor::new(Arc::new(CannedAnalysis(Ok("Rates on hold."))));

        let analysis = advisor.analyze(day()).await.unwrap();
        assert_eq!(
            analysis.resolution.source,
            WeightSource::Fallback(FallbackReason::NoPayload)
        );
        assert_eq!(analysis.report, "Rates on hold.");
    }

    #[tokio::test]
    async fn test_analyze_propagates_service_failure() {
        let advisor = Advisor::new(Arc::new(CannedAnalysis(Err("quota exceeded"))));
        let err = advisor.analyze(day()).await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }
}
