//! Budget gate (spec §4.1): before a billable stage runs, check whether
//! its quote would push the job's projected total cost over
//! `max_cost_usd_per_job`. `None` means unbounded, per spec §6's
//! documented default.

use redub_ledger::CostLedger;

use crate::error::CoreError;

pub fn check_budget(ledger: &CostLedger, projected_units: f64, projected_rate: f64, cap: Option<f64>) -> Result<(), CoreError> {
    let Some(cap) = cap else {
        return Ok(());
    };
    let projected = ledger.projected_total_with(projected_units, projected_rate);
    if projected > cap {
        return Err(CoreError::BudgetExceeded { projected, cap });
    }
    Ok(())
}

/// Combines a per-request cap (spec §6 `max_cost_usd` on the request
/// body) with the process-wide `max_cost_usd_per_job` default: the
/// tighter of the two wins. Either side missing means that side imposes
/// no bound; both missing means unbounded.
pub fn effective_cap(request_cap: Option<f64>, configured_cap: Option<f64>) -> Option<f64> {
    match (request_cap, configured_cap) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}
