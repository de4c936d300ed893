//! Affiliate directory records.

use std::fmt;
use std::str::FromStr;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CommissionKind, UnknownLabel};

/// Affiliate primary key.
pub type AffiliateId = Uuid;

/// Normalize a coupon code for comparison and uniqueness.
///
/// Coupons are matched trimmed and case-insensitively everywhere.
pub fn coupon_key(code: &str) -> String {
    code.trim().to_lowercase()
}

/// Child slot under a parent in the binary tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    Right,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Left => "left",
            Position::Right => "right",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Position::Left),
            "right" => Ok(Position::Right),
            other => Err(UnknownLabel::new("position", other)),
        }
    }
}

/// Approval state. Only approved affiliates may earn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffiliateStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl AffiliateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AffiliateStatus::Pending => "pending",
            AffiliateStatus::Approved => "approved",
            AffiliateStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for AffiliateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AffiliateStatus {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AffiliateStatus::Pending),
            "approved" => Ok(AffiliateStatus::Approved),
            "rejected" => Ok(AffiliateStatus::Rejected),
            other => Err(UnknownLabel::new("affiliate status", other)),
        }
    }
}

/// Argon2id digest of an affiliate credential.
///
/// Stored as a PHC string (`$argon2id$v=19$...`) carrying its own salt and
/// parameters. The clear-text password never leaves [`PasswordDigest::hash`].
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordDigest(String);

#[derive(Debug, thiserror::Error)]
#[error("Credential hashing failed: {0}")]
pub struct CredentialError(String);

impl PasswordDigest {
    /// Hash a clear-text password with a fresh random salt.
    pub fn hash(password: &str) -> Result<Self, CredentialError> {
        let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
            .map_err(|e| CredentialError(e.to_string()))?;
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CredentialError(e.to_string()))?;
        Ok(Self(hash.to_string()))
    }

    /// Check a clear-text password against this digest.
    ///
    /// Comparison is constant-time. Anything that does not parse as a PHC
    /// string never verifies.
    pub fn verify(&self, password: &str) -> bool {
        match PasswordHash::new(&self.0) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Wrap a digest loaded from storage.
    pub fn from_stored(stored: String) -> Self {
        Self(stored)
    }

    pub fn as_stored(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordDigest(<redacted>)")
    }
}

/// Cached aggregate fields on an affiliate.
///
/// Derived data: the commission ledger, payout requests and the order table
/// are authoritative, and the resync job can rebuild every field here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliateBalances {
    pub total_orders: u64,
    pub total_sales_amount: Decimal,
    pub total_earnings: Decimal,
    pub direct_earnings: Decimal,
    pub level1_earnings: Decimal,
    pub level2_earnings: Decimal,
    pub level3_earnings: Decimal,
    /// Earned and not yet paid out (`total_earnings - paid_balance`).
    pub pending_balance: Decimal,
    /// Sum of completed payouts.
    pub paid_balance: Decimal,
    /// Withdrawable now: pending minus amounts held by open payout requests.
    pub available_balance: Decimal,
}

impl AffiliateBalances {
    /// Earnings bucket for a commission kind.
    pub fn earnings_for(&self, kind: CommissionKind) -> Decimal {
        match kind {
            CommissionKind::Direct => self.direct_earnings,
            CommissionKind::Level1 => self.level1_earnings,
            CommissionKind::Level2 => self.level2_earnings,
            CommissionKind::Level3 => self.level3_earnings,
        }
    }

    pub(crate) fn earnings_for_mut(&mut self, kind: CommissionKind) -> &mut Decimal {
        match kind {
            CommissionKind::Direct => &mut self.direct_earnings,
            CommissionKind::Level1 => &mut self.level1_earnings,
            CommissionKind::Level2 => &mut self.level2_earnings,
            CommissionKind::Level3 => &mut self.level3_earnings,
        }
    }
}

/// Canonical affiliate record.
#[derive(Debug, Clone, PartialEq)]
pub struct Affiliate {
    pub id: AffiliateId,
    pub coupon_code: String,
    pub full_name: String,
    pub mobile: String,
    pub password: PasswordDigest,
    /// Placement parent in the binary tree.
    pub parent_id: Option<AffiliateId>,
    /// Who invited this affiliate. May differ from `parent_id`.
    pub referrer_id: Option<AffiliateId>,
    pub position: Option<Position>,
    pub status: AffiliateStatus,
    pub is_paid: bool,
    pub orders_since_paid: u64,
    pub balances: AffiliateBalances,
    pub created_at: DateTime<Utc>,
}

impl Affiliate {
    /// Unplaced, pending affiliate with zero balances, stamped now.
    pub fn new(
        coupon_code: impl Into<String>,
        full_name: impl Into<String>,
        mobile: impl Into<String>,
        password: PasswordDigest,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            coupon_code: coupon_code.into(),
            full_name: full_name.into(),
            mobile: mobile.into(),
            password,
            parent_id: None,
            referrer_id: None,
            position: None,
            status: AffiliateStatus::Pending,
            is_paid: false,
            orders_since_paid: 0,
            balances: AffiliateBalances::default(),
            created_at: Utc::now(),
        }
    }

    /// Same record placed under `parent` at `position`.
    pub fn placed(mut self, parent: AffiliateId, position: Position) -> Self {
        self.parent_id = Some(parent);
        self.position = Some(position);
        self
    }

    pub fn can_earn(&self) -> bool {
        self.status == AffiliateStatus::Approved
    }

    pub fn is_self_parented(&self) -> bool {
        self.parent_id == Some(self.id)
    }
}

/// Occupants of a node's two child slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Children {
    pub left: Option<AffiliateId>,
    pub right: Option<AffiliateId>,
}

impl Children {
    pub fn get(&self, position: Position) -> Option<AffiliateId> {
        match position {
            Position::Left => self.left,
            Position::Right => self.right,
        }
    }
}
