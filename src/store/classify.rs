//! `classifyAndDecay`: periodic age-based decay and short-term/long-term
//! reclassification.

use std::sync::atomic::Ordering;

use crate::error::Result;

use super::{now_millis, MemoryStore};

impl MemoryStore {
    /// Apply exponential decay to every short-term interaction's
    /// `decay_factor`, pin frequently-accessed ones back to full weight, and
    /// demote rarely-accessed, heavily-decayed ones to long-term. A no-op if
    /// called again within the same millisecond.
    pub async fn classify_and_decay(&self) -> Result<()> {
        let _writer = self.write_gate.lock().await;

        let now = now_millis();
        if self.last_classified_at_millis.swap(now, Ordering::SeqCst) == now {
            return Ok(());
        }

        let lambda = self.config.decay_lambda_per_hour;
        let promotion_access_count = self.config.short_term_promotion_access_count;
        let demotion_decay_threshold = self.config.long_term_demotion_decay;

        let mut state = self.state.write().await;
        state.cache.classify_and_decay(|interaction| {
            let age_hours = (now - interaction.timestamp).max(0) as f64 / 3_600_000.0;
            interaction.decay_factor *= (-lambda * age_hours).exp();
            if interaction.access_count >= promotion_access_count {
                interaction.decay_factor = 1.0;
            }
            interaction.decay_factor < demotion_decay_threshold && interaction.access_count < 3
        });

        if let Err(e) = self.save_memory_to_history(&state).await {
            tracing::warn!(error = %e, "persisting after classify/decay failed");
            return Err(e);
        }
        drop(state);
        self.query_cache.invalidate_all();
        Ok(())
    }
}
