//! Pipeline forecast roll-up.
//!
//! Weighted revenue projection across the funnel: each valued lead
//! contributes `deal_value × stage probability`. Leads without a deal value
//! contribute nothing.

use std::collections::HashMap;

use serde::Serialize;

use crate::db::LeadDb;
use crate::error::AppError;
use crate::scoring::{self, KNOWN_STAGES};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageForecast {
    pub stage: String,
    /// Number of valued leads in this stage.
    pub lead_count: u32,
    pub total_value: f64,
    pub weighted_value: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastReport {
    pub stages: Vec<StageForecast>,
    pub total_value: f64,
    pub weighted_total: f64,
}

pub fn pipeline_forecast(db: &LeadDb) -> Result<ForecastReport, AppError> {
    let rows = db.get_forecast_rows()?;

    let mut by_stage: HashMap<String, (u32, f64, f64)> = HashMap::new();
    for (stage, value) in rows {
        let weighted = scoring::forecast(value, &stage);
        let slot = by_stage.entry(stage).or_insert((0, 0.0, 0.0));
        slot.0 += 1;
        slot.1 += value;
        slot.2 += weighted;
    }

    // Funnel order first, then whatever unknown labels the data carries.
    let mut stages = Vec::with_capacity(by_stage.len());
    for stage in KNOWN_STAGES {
        if let Some((count, total, weighted)) = by_stage.remove(stage) {
            stages.push(StageForecast {
                stage: stage.to_string(),
                lead_count: count,
                total_value: total,
                weighted_value: weighted,
            });
        }
    }
    let mut leftovers: Vec<_> = by_stage.into_iter().collect();
    leftovers.sort_by(|a, b| a.0.cmp(&b.0));
    for (stage, (count, total, weighted)) in leftovers {
        stages.push(StageForecast {
            stage,
            lead_count: count,
            total_value: total,
            weighted_value: weighted,
        });
    }

    let total_value = stages.iter().map(|s| s.total_value).sum();
    let weighted_total = stages.iter().map(|s| s.weighted_value).sum();

    Ok(ForecastReport {
        stages,
        total_value,
        weighted_total,
    })
}
