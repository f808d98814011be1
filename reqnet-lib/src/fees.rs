//! Fee collection and the burn sink.
//!
//! Each extension may carry a [`FeeSchedule`]. The fee on a request is a
//! capped proportion of its total expected amount and must be attached
//! exactly by the caller of a creation entry point. Collected fees go to the
//! sink address, whose [`BurnSink`] hook converts them to a reference amount
//! and removes them from the native supply.

use crate::ledger::{Ledger, ReceiveHook};
use crate::types::AssetId;
use crate::{AccessControl, Address, Amount, LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Proportional fee with an absolute cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub numerator: Amount,
    pub denominator: Amount,
    pub max_collectable: Amount,
}

impl FeeSchedule {
    pub fn new(
        numerator: impl Into<Amount>,
        denominator: impl Into<Amount>,
        max_collectable: impl Into<Amount>,
    ) -> Result<Self> {
        let schedule = Self {
            numerator: numerator.into(),
            denominator: denominator.into(),
            max_collectable: max_collectable.into(),
        };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn validate(&self) -> Result<()> {
        if self.denominator.value() <= 0 {
            return Err(LedgerError::invalid_input("fee denominator", "must be positive"));
        }
        if self.numerator.is_negative() || self.max_collectable.is_negative() {
            return Err(LedgerError::invalid_input("fee schedule", "must not be negative"));
        }
        Ok(())
    }

    /// `min(principal * numerator / denominator, max_collectable)`, or zero
    /// for a negative principal.
    ///
    /// ```rust
    /// use reqnet_lib::{Amount, FeeSchedule};
    ///
    /// let fees = FeeSchedule::new(1, 1000, 50).unwrap();
    /// assert_eq!(fees.estimate(Amount::new(20_000)).unwrap(), Amount::new(20));
    /// assert_eq!(fees.estimate(Amount::new(1_000_000)).unwrap(), Amount::new(50));
    /// assert_eq!(fees.estimate(Amount::new(-5)).unwrap(), Amount::ZERO);
    /// ```
    pub fn estimate(&self, principal: Amount) -> Result<Amount> {
        if principal.is_negative() {
            return Ok(Amount::ZERO);
        }
        let computed = principal
            .checked_mul(self.numerator)
            .ok_or(LedgerError::Overflow("fee"))?
            .checked_div(self.denominator)
            .ok_or_else(|| LedgerError::invalid_input("fee denominator", "must be positive"))?;
        Ok(computed.min(self.max_collectable))
    }
}

/// Rate at which the sink values burned native units in the reference asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRate {
    pub numerator: Amount,
    pub denominator: Amount,
}

impl Default for ConversionRate {
    fn default() -> Self {
        Self {
            numerator: Amount::new(1),
            denominator: Amount::new(1),
        }
    }
}

impl ConversionRate {
    pub fn convert(&self, amount: Amount) -> Result<Amount> {
        amount
            .checked_mul(self.numerator)
            .ok_or(LedgerError::Overflow("conversion"))?
            .checked_div(self.denominator)
            .ok_or_else(|| LedgerError::invalid_input("conversion rate", "denominator is zero"))
    }
}

/// One fee removed from circulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnRecord {
    pub from: Address,
    pub burned: Amount,
    pub reference_amount: Amount,
}

/// Per-extension fee schedules and the sink they pay into.
pub struct FeeCollector {
    sink: Address,
    access: Arc<dyn AccessControl>,
    schedules: RwLock<HashMap<Address, FeeSchedule>>,
}

impl FeeCollector {
    pub fn new(sink: Address, access: Arc<dyn AccessControl>) -> Self {
        Self {
            sink,
            access,
            schedules: RwLock::new(HashMap::new()),
        }
    }

    pub fn sink(&self) -> Address {
        self.sink
    }

    /// Administrator only.
    pub fn set_fee_schedule(
        &self,
        caller: &Address,
        extension: Address,
        schedule: FeeSchedule,
    ) -> Result<()> {
        self.access.require_admin(caller)?;
        schedule.validate()?;
        let mut schedules = self.schedules.write().unwrap_or_else(|e| e.into_inner());
        schedules.insert(extension, schedule);
        tracing::info!(
            %extension,
            numerator = %schedule.numerator,
            denominator = %schedule.denominator,
            max = %schedule.max_collectable,
            "fee schedule set"
        );
        Ok(())
    }

    /// Administrator only. Returns the removed schedule.
    pub fn clear_fee_schedule(&self, caller: &Address, extension: &Address) -> Result<Option<FeeSchedule>> {
        self.access.require_admin(caller)?;
        let mut schedules = self.schedules.write().unwrap_or_else(|e| e.into_inner());
        Ok(schedules.remove(extension))
    }

    pub fn schedule(&self, extension: &Address) -> Option<FeeSchedule> {
        let schedules = self.schedules.read().unwrap_or_else(|e| e.into_inner());
        schedules.get(extension).copied()
    }

    /// Fee owed on `principal` through `extension`. Zero without a schedule.
    pub fn estimate(&self, extension: &Address, principal: Amount) -> Result<Amount> {
        match self.schedule(extension) {
            Some(schedule) => schedule.estimate(principal),
            None => Ok(Amount::ZERO),
        }
    }
}

/// Receive hook at the fee sink address that burns what it receives.
pub struct BurnSink {
    address: Address,
    rate: ConversionRate,
}

impl BurnSink {
    pub fn new(address: Address, rate: ConversionRate) -> Self {
        Self { address, rate }
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

impl ReceiveHook for BurnSink {
    fn on_receive(
        &self,
        ledger: &mut Ledger,
        from: Address,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<()> {
        if *asset != AssetId::Native {
            return Err(LedgerError::invalid_input("fee asset", format!("sink only burns native value, got {asset}")));
        }
        let reference_amount = self.rate.convert(amount)?;
        ledger.burn_native(&self.address, amount)?;
        ledger.record_burn(BurnRecord {
            from,
            burned: amount,
            reference_amount,
        });
        tracing::debug!(%from, %amount, %reference_amount, "fee burned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessRegistry;

    #[test]
    fn test_estimate_caps_and_truncates() {
        let schedule = FeeSchedule::new(3, 1000, 100).unwrap();
        assert_eq!(schedule.estimate(Amount::new(999)).unwrap(), Amount::new(2));
        assert_eq!(schedule.estimate(Amount::new(1_000_000)).unwrap(), Amount::new(100));
        assert_eq!(schedule.estimate(Amount::ZERO).unwrap(), Amount::ZERO);
        assert_eq!(
            schedule.estimate(Amount::MAX).unwrap_err(),
            LedgerError::Overflow("fee")
        );
    }

    #[test]
    fn test_invalid_schedules_rejected() {
        assert!(FeeSchedule::new(1, 0, 10).is_err());
        assert!(FeeSchedule::new(-1, 10, 10).is_err());
        assert!(FeeSchedule::new(1, 10, -10).is_err());
    }

    #[test]
    fn test_only_admin_sets_schedule() {
        let admin = Address::from_label("admin");
        let ext = Address::from_label("native");
        let access = Arc::new(AccessRegistry::new(admin));
        let collector = FeeCollector::new(Address::from_label("sink"), access);
        let schedule = FeeSchedule::new(1, 100, 10).unwrap();

        assert!(collector.set_fee_schedule(&ext, ext, schedule).is_err());
        assert_eq!(collector.estimate(&ext, Amount::new(500)).unwrap(), Amount::ZERO);

        collector.set_fee_schedule(&admin, ext, schedule).unwrap();
        assert_eq!(collector.estimate(&ext, Amount::new(500)).unwrap(), Amount::new(5));

        assert_eq!(collector.clear_fee_schedule(&admin, &ext).unwrap(), Some(schedule));
        assert_eq!(collector.schedule(&ext), None);
    }

    #[test]
    fn test_conversion_rate() {
        let rate = ConversionRate {
            numerator: Amount::new(3),
            denominator: Amount::new(2),
        };
        assert_eq!(rate.convert(Amount::new(10)).unwrap(), Amount::new(15));
        assert_eq!(ConversionRate::default().convert(Amount::new(7)).unwrap(), Amount::new(7));
    }
}
