//! Anomaly Analysis
//!
//! Produces an explanation for a metric's recent behaviour from its recent
//! points, the similar historical segments, and its deployment environment.
//!
//! A [`Generator`] (normally [`OllamaGenerator`]) is tried first; any failure
//! degrades to the [`FallbackEstimator`]. Which path produced the answer is
//! visible in the [`AnalysisResult`] variant.

mod env;
mod error;
mod fallback;
mod ollama;

pub use env::{resolve_env, EnvInfo};
pub use error::AnalysisError;
pub use fallback::{FallbackEstimator, RiskLevel, StatisticalAnalysis, Trend};
pub use ollama::{build_prompt, strip_code_fences, OllamaConfig, OllamaGenerator};

use crate::context::ContextMatch;
use crate::series::Point;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Everything the analysis step sees
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    pub metric_name: String,
    pub recent_points: Vec<Point>,
    pub context: Vec<ContextMatch>,
    pub env: EnvInfo,
}

/// Answer parsed from the generative model
///
/// Missing fields default to empty; models often omit one or two.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedAnalysis {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub current_status: String,
    #[serde(default)]
    pub prediction: String,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub thought: String,
    #[serde(default, deserialize_with = "lenient_points")]
    pub prediction_points: Vec<Point>,
}

/// Outcome of an analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AnalysisResult {
    Generated(GeneratedAnalysis),
    StatisticalFallback(StatisticalAnalysis),
}

impl AnalysisResult {
    pub fn is_generated(&self) -> bool {
        matches!(self, AnalysisResult::Generated(_))
    }

    pub fn title(&self) -> &str {
        match self {
            AnalysisResult::Generated(g) => &g.title,
            AnalysisResult::StatisticalFallback(s) => &s.title,
        }
    }
}

/// Generative analysis backend
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &AnalysisRequest) -> Result<GeneratedAnalysis, AnalysisError>;
}

/// Runs the generator, falling back to statistics on any failure
pub struct Analyst {
    generator: Option<Arc<dyn Generator>>,
    fallback: FallbackEstimator,
}

impl Analyst {
    pub fn new(generator: Option<Arc<dyn Generator>>, fallback: FallbackEstimator) -> Self {
        Self { generator, fallback }
    }

    /// Statistics only
    pub fn statistical() -> Self {
        Self::new(None, FallbackEstimator::default())
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        let Some(generator) = &self.generator else {
            return AnalysisResult::StatisticalFallback(self.fallback.estimate(
                &request.metric_name,
                &request.recent_points,
                "generative analysis disabled",
            ));
        };

        match generator.generate(request).await {
            Ok(generated) => {
                tracing::info!(
                    metric = %request.metric_name,
                    generator = %generator.name(),
                    level = %generated.level,
                    "Generated analysis"
                );
                AnalysisResult::Generated(generated)
            }
            Err(e) => {
                tracing::warn!(
                    metric = %request.metric_name,
                    generator = %generator.name(),
                    error = %e,
                    "Generative analysis failed, using statistical fallback"
                );
                AnalysisResult::StatisticalFallback(self.fallback.estimate(
                    &request.metric_name,
                    &request.recent_points,
                    &e.to_string(),
                ))
            }
        }
    }
}

/// Accept `[[ts, val], ...]` with numeric or string members, skipping bad pairs
fn lenient_points<'de, D>(deserializer: D) -> Result<Vec<Point>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();

    fn number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    Ok(raw
        .iter()
        .filter_map(|pair| {
            let pair = pair.as_array()?;
            if pair.len() != 2 {
                return None;
            }
            Some(Point::new(number(&pair[0])? as i64, number(&pair[1])?))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedGenerator(Result<GeneratedAnalysis, String>);

    #[async_trait]
    impl Generator for FixedGenerator {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _request: &AnalysisRequest) -> Result<GeneratedAnalysis, AnalysisError> {
            self.0.clone().map_err(AnalysisError::InvalidResponse)
        }
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            metric_name: "up".to_string(),
            recent_points: (0..10).map(|i| Point::new(i * 60, 1.0)).collect(),
            context: Vec::new(),
            env: EnvInfo::new("unknown", ""),
        }
    }

    #[tokio::test]
    async fn test_generator_success() {
        let generated = GeneratedAnalysis {
            title: "All good".to_string(),
            ..GeneratedAnalysis::default()
        };
        let analyst = Analyst::new(
            Some(Arc::new(FixedGenerator(Ok(generated.clone())))),
            FallbackEstimator::default(),
        );

        let result = analyst.analyze(&request()).await;
        assert_eq!(result, AnalysisResult::Generated(generated));
        assert_eq!(result.title(), "All good");
    }

    #[tokio::test]
    async fn test_generator_failure_falls_back() {
        let analyst = Analyst::new(
            Some(Arc::new(FixedGenerator(Err("not json".to_string())))),
            FallbackEstimator::default(),
        );

        match analyst.analyze(&request()).await {
            AnalysisResult::StatisticalFallback(stats) => {
                assert!(stats.reason.contains("not json"));
                assert_eq!(stats.sample_count, 10);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disabled_generator() {
        let result = Analyst::statistical().analyze(&request()).await;
        assert!(!result.is_generated());
    }

    #[test]
    fn test_result_is_tagged_by_source() {
        let json = serde_json::to_value(AnalysisResult::Generated(GeneratedAnalysis::default())).unwrap();
        assert_eq!(json["source"], "generated");

        let stats = FallbackEstimator::default().estimate("up", &[], "x");
        let json = serde_json::to_value(AnalysisResult::StatisticalFallback(stats)).unwrap();
        assert_eq!(json["source"], "statistical_fallback");
        assert_eq!(json["level"], "unknown");
    }

    #[test]
    fn test_null_prediction_points() {
        let parsed: GeneratedAnalysis =
            serde_json::from_str(r#"{"title": "t", "prediction_points": null}"#).unwrap();
        assert!(parsed.prediction_points.is_empty());
    }
}
