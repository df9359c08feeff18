//! Per-step contact metrics

use crate::contact::handler::CollisionHandler;
use serde::{Deserialize, Serialize};

/// Summary of the constraint set after one computation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    /// Number of bilateral constraints
    pub num_bilateral: usize,

    /// Number of unilateral constraints
    pub num_unilateral: usize,

    /// Maximum penetration depth reported by the builders
    pub max_penetration: f64,

    /// Average signed distance over all constraints
    pub avg_distance: f64,

    /// Minimum (most penetrating) signed distance
    pub min_distance: f64,

    /// Sum of the constraint impulses carried into the step
    pub impulse_sum: f64,
}

impl StepMetrics {
    /// Compute metrics from the handler's current constraints
    pub fn compute(handler: &CollisionHandler, max_penetration: f64) -> Self {
        let mut count = 0usize;
        let mut distance_sum = 0.0;
        let mut min_dist = f64::MAX;
        let mut impulse_sum = 0.0;

        for cons in handler
            .bilateral_constraints()
            .chain(handler.unilateral_constraints())
        {
            count += 1;
            distance_sum += cons.distance();
            min_dist = min_dist.min(cons.distance());
            impulse_sum += cons.impulse();
        }

        Self {
            num_bilateral: handler.num_bilateral_constraints(),
            num_unilateral: handler.num_unilateral_constraints(),
            max_penetration,
            avg_distance: if count > 0 {
                distance_sum / count as f64
            } else {
                0.0
            },
            min_distance: if count > 0 { min_dist } else { 0.0 },
            impulse_sum,
        }
    }

    pub fn num_constraints(&self) -> usize {
        self.num_bilateral + self.num_unilateral
    }

    /// Print metrics summary
    pub fn print_summary(&self, step: usize) {
        println!("\n{}", "=".repeat(60));
        println!("STEP {} CONTACTS", step);
        println!("{}", "=".repeat(60));
        println!();
        println!("  Bilateral:        {}", self.num_bilateral);
        println!("  Unilateral:       {}", self.num_unilateral);
        println!();

        if self.num_constraints() > 0 {
            println!("  Distance Statistics:");
            println!("    Average:        {:.6}", self.avg_distance);
            println!("    Min:            {:.6}", self.min_distance);
            println!("  Max Penetration:  {:.6}", self.max_penetration);
            println!("  Impulse Sum:      {:.6}", self.impulse_sum);
        } else {
            println!("  No active contacts");
        }
        println!("{}", "=".repeat(60));
    }
}
