//! Terminal report of a protocol plan

use std::fmt;

use crate::protocols::ProtocolPlan;

/// Counts, skipped rows and consumption of one plan
///
/// ```text
/// normalizer: 3 rows, 2 ready, 1 skipped
///   row 2 (lysate 2 -> B1): below_minimum_pipette_volume: ...
/// worklist: 9 steps
///   P20: 12.40 µL, 2 tips
///   P300: 388.00 µL, 4 tips
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PlanSummary<'a> {
    protocol: &'a str,
    plan: &'a ProtocolPlan,
}

impl<'a> PlanSummary<'a> {
    pub fn new(protocol: &'a str, plan: &'a ProtocolPlan) -> Self {
        Self { protocol, plan }
    }
}

impl fmt::Display for PlanSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plan = self.plan;
        writeln!(
            f,
            "{}: {} rows, {} ready, {} skipped",
            self.protocol,
            plan.rows.len(),
            plan.ready_count(),
            plan.skipped_count()
        )?;

        for row in plan.skipped() {
            writeln!(
                f,
                "  row {} ({} -> {}): {}: {}",
                row.row,
                row.name,
                row.destination,
                row.outcome.status(),
                row.outcome.reason().unwrap_or_default()
            )?;
        }

        write!(f, "worklist: {} steps", plan.worklist.len())?;
        let tips = plan.worklist.tips_by_pipette();
        for (pipette, volume) in plan.worklist.volume_by_pipette() {
            write!(
                f,
                "\n  {pipette}: {volume:.2} µL, {} tips",
                tips.get(&pipette).copied().unwrap_or(0)
            )?;
        }
        Ok(())
    }
}
