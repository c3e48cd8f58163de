//! Reconciling the claimant's withdrawal against the treaty.
use crate::institution::{Claimant, Regulator};
use crate::units::{Dimensionless, Volume};
use crate::year::{Calendar, MONTHS_PER_YEAR};

/// How the claimant's withdrawal counts against the treaty for a month
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConcessionUse {
    /// Water counted against the allocation
    pub quantity_available: Volume,
    /// Concession actually taken
    pub concession_used: Volume,
}

/// Count a withdrawal against the month's allocation and concession.
///
/// The allocation is used first. Only withdrawal beyond it takes up the concession, and
/// withdrawal beyond both counts against the allocation again.
pub fn use_concession(withdrawal: Volume, allocation: Volume, concession: Volume) -> ConcessionUse {
    if withdrawal <= allocation {
        ConcessionUse {
            quantity_available: withdrawal,
            concession_used: Volume::ZERO,
        }
    } else if withdrawal <= allocation + concession {
        ConcessionUse {
            quantity_available: allocation,
            concession_used: withdrawal - allocation,
        }
    } else {
        ConcessionUse {
            quantity_available: withdrawal - concession,
            concession_used: concession,
        }
    }
}

/// Pump the claimant's share from the outlet and return unused concession to the joint quota.
///
/// Withdrawal is limited by the pumping capacity and the rest of the remainder share is lost.
/// Each month, the concession owed but not taken over the past twelve months, spread over twelve
/// months and added to the bypass flow, is credited to the joint quota.
pub fn reconcile(
    claimant: &mut Claimant,
    regulator: &mut Regulator,
    remainder_share: Volume,
    timestep: u32,
) {
    claimant.withdrawal = claimant.config.pumping_capacity.min(remainder_share);
    claimant.pumping_loss = remainder_share - claimant.withdrawal;

    let treaty = &regulator.treaty;
    let used = use_concession(
        claimant.withdrawal,
        treaty.allocation.volume(timestep),
        treaty.concession.volume(timestep),
    );
    claimant.quantity_available = used.quantity_available;
    claimant.concession_used = used.concession_used;
    claimant.observed_concession.0[Calendar::month_index(timestep)] = used.concession_used.value();

    let unused = (treaty.concession.annual_total() - claimant.observed_concession.annual_total())
        / Dimensionless(MONTHS_PER_YEAR as f64);
    claimant.concession_credit = (claimant.config.bypass.volume(timestep) + unused).max(Volume::ZERO);
    regulator.quota_delivered += claimant.concession_credit;
}
