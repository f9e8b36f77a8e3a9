use std::fmt;

use serde::{Deserialize, Serialize};

/// A pair of SMS and email credit quantities.
///
/// Used both for account balances and for transfer amounts. Both sides are
/// unsigned, so a balance can never be represented as negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Credits {
    pub sms: u64,
    pub email: u64,
}

impl Credits {
    pub const ZERO: Credits = Credits { sms: 0, email: 0 };

    pub fn new(sms: u64, email: u64) -> Self {
        Credits { sms, email }
    }

    pub fn is_zero(&self) -> bool {
        self.sms == 0 && self.email == 0
    }

    /// True when both sides are at least as large as `amount`.
    pub fn covers(&self, amount: Credits) -> bool {
        self.sms >= amount.sms && self.email >= amount.email
    }

    /// Subtract `amount` from both sides, or `None` if either side would go negative.
    pub fn checked_sub(self, amount: Credits) -> Option<Credits> {
        Some(Credits {
            sms: self.sms.checked_sub(amount.sms)?,
            email: self.email.checked_sub(amount.email)?,
        })
    }

    /// Add `amount` to both sides, or `None` if either side would overflow.
    ///
    /// There is no `+` on `Credits`; balances only grow through this.
    pub fn checked_add(self, amount: Credits) -> Option<Credits> {
        Some(Credits {
            sms: self.sms.checked_add(amount.sms)?,
            email: self.email.checked_add(amount.email)?,
        })
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sms / {} email", self.sms, self.email)
    }
}
