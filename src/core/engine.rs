use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use std::time::Instant;

pub struct AlignmentEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> AlignmentEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<String> {
        let started = Instant::now();
        tracing::info!("🚀 Starting alignment run");

        // Extract
        let input = self.pipeline.extract().await?;
        tracing::info!(
            "📥 Loaded {} datasets in {:?}",
            input.datasets.len(),
            started.elapsed()
        );

        // Transform
        let phase = Instant::now();
        let results = self.pipeline.transform(input).await?;
        let matched: usize = results.iter().map(|r| r.matched_count()).sum();
        let unmatched: usize = results.iter().map(|r| r.unmatched_count()).sum();
        tracing::info!(
            "🔗 Aligned {} processes ({} matched, {} unmatched) in {:?}",
            results.len(),
            matched,
            unmatched,
            phase.elapsed()
        );

        // Load
        let output_path = self.pipeline.load(results).await?;
        tracing::info!(
            "📦 Report written to {} (total {:?})",
            output_path,
            started.elapsed()
        );

        Ok(output_path)
    }
}
