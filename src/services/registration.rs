//! Affiliate onboarding and status administration.

use std::sync::Arc;

use backon::Retryable;
use tracing::{debug, info, instrument, warn};

use super::placement::{PlacementError, TreePlacement};
use crate::error::ErrorKind;
use crate::interfaces::{dispatch, AffiliateStore, Notification, Notifier, StorageError};
use crate::model::{Affiliate, AffiliateId, AffiliateStatus, CredentialError, PasswordDigest};
use crate::utils::retry::store_backoff;

const MIN_PASSWORD_LEN: usize = 6;
const COUPON_LEN: std::ops::RangeInclusive<usize> = 3..=32;
const MOBILE_DIGITS: std::ops::RangeInclusive<usize> = 10..=15;

/// How a new affiliate names who invited them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Referrer {
    Id(AffiliateId),
    /// The inviter's coupon code.
    Coupon(String),
}

/// Registration form.
#[derive(Clone)]
pub struct NewAffiliate {
    pub full_name: String,
    pub mobile: String,
    pub coupon_code: String,
    pub password: String,
    pub referrer: Option<Referrer>,
}

impl std::fmt::Debug for NewAffiliate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAffiliate")
            .field("full_name", &self.full_name)
            .field("mobile", &self.mobile)
            .field("coupon_code", &self.coupon_code)
            .field("referrer", &self.referrer)
            .finish_non_exhaustive()
    }
}

impl NewAffiliate {
    fn validate(&self) -> Result<(), RegistrationError> {
        if self.full_name.trim().is_empty() {
            return Err(RegistrationError::invalid("full_name", "must not be empty"));
        }

        let mobile = self.mobile.trim();
        let digits = mobile.strip_prefix('+').unwrap_or(mobile);
        if !digits.chars().all(|c| c.is_ascii_digit()) || !MOBILE_DIGITS.contains(&digits.len()) {
            return Err(RegistrationError::invalid(
                "mobile",
                "must be 10 to 15 digits, optionally prefixed with +",
            ));
        }

        let coupon = self.coupon_code.trim();
        if !COUPON_LEN.contains(&coupon.len())
            || !coupon
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(RegistrationError::invalid(
                "coupon_code",
                "must be 3 to 32 letters, digits, '-' or '_'",
            ));
        }

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RegistrationError::invalid(
                "password",
                "must be at least 6 characters",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: &'static str },

    #[error("Coupon code already registered: {0}")]
    CouponTaken(String),

    #[error("Affiliate not found: {0}")]
    NotFound(AffiliateId),

    #[error("Cannot move affiliate {id} from {from} to {to}")]
    InvalidTransition {
        id: AffiliateId,
        from: AffiliateStatus,
        to: AffiliateStatus,
    },

    #[error("Affiliate {0} is already on the paid tier")]
    AlreadyPaid(AffiliateId),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Affiliate {0} is not approved")]
    NotApproved(AffiliateId),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RegistrationError {
    fn invalid(field: &'static str, reason: &'static str) -> Self {
        RegistrationError::Invalid { field, reason }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistrationError::Invalid { .. }
            | RegistrationError::InvalidCredentials
            | RegistrationError::Credential(_) => ErrorKind::Validation,
            RegistrationError::NotFound(_) => ErrorKind::NotFound,
            RegistrationError::CouponTaken(_)
            | RegistrationError::InvalidTransition { .. }
            | RegistrationError::AlreadyPaid(_)
            | RegistrationError::NotApproved(_) => ErrorKind::Conflict,
            RegistrationError::Placement(e) => e.kind(),
            RegistrationError::Storage(e) => e.kind(),
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, RegistrationError::Storage(e) if e.is_retryable())
    }
}

/// Onboarding and status changes for affiliates.
pub struct RegistrationService {
    affiliates: Arc<dyn AffiliateStore>,
    placement: TreePlacement,
    notifier: Arc<dyn Notifier>,
}

impl RegistrationService {
    pub fn new(affiliates: Arc<dyn AffiliateStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            placement: TreePlacement::new(affiliates.clone()),
            affiliates,
            notifier,
        }
    }

    /// Register a new affiliate as `Pending`, placed in the tree.
    ///
    /// Losing a slot to a concurrent registration re-runs placement.
    #[instrument(skip_all, fields(coupon = %form.coupon_code.trim()))]
    pub async fn register(&self, form: NewAffiliate) -> Result<Affiliate, RegistrationError> {
        form.validate()?;

        if self.affiliates.find_by_coupon(&form.coupon_code).await?.is_some() {
            return Err(RegistrationError::CouponTaken(form.coupon_code.trim().to_string()));
        }

        let referrer_id = self.resolve_referrer(form.referrer.as_ref()).await?;
        let password = PasswordDigest::hash(&form.password)?;

        let affiliate = (|| async { self.place_and_insert(&form, referrer_id, &password).await })
            .retry(store_backoff())
            .when(RegistrationError::is_retryable)
            .notify(|e, delay| {
                warn!(error = %e, ?delay, "registration lost a race, retrying");
            })
            .await?;

        info!(
            affiliate_id = %affiliate.id,
            parent_id = ?affiliate.parent_id,
            position = ?affiliate.position,
            "affiliate registered"
        );
        dispatch(
            &self.notifier,
            Notification::AffiliateRegistered {
                affiliate_id: affiliate.id,
            },
        );
        Ok(affiliate)
    }

    async fn resolve_referrer(
        &self,
        referrer: Option<&Referrer>,
    ) -> Result<Option<AffiliateId>, RegistrationError> {
        let found = match referrer {
            None => return Ok(None),
            Some(Referrer::Id(id)) => self.affiliates.get(*id).await?,
            Some(Referrer::Coupon(code)) => self.affiliates.find_by_coupon(code).await?,
        };
        if found.is_none() {
            debug!(?referrer, "referrer not found, registering without one");
        }
        Ok(found.map(|a| a.id))
    }

    async fn place_and_insert(
        &self,
        form: &NewAffiliate,
        referrer_id: Option<AffiliateId>,
        password: &PasswordDigest,
    ) -> Result<Affiliate, RegistrationError> {
        let slot = self.placement.place(referrer_id).await?;

        let mut affiliate = Affiliate::new(
            form.coupon_code.trim(),
            form.full_name.trim(),
            form.mobile.trim(),
            password.clone(),
        );
        affiliate.parent_id = slot.parent_id;
        affiliate.position = slot.position;
        affiliate.referrer_id = referrer_id;

        match self.affiliates.insert(&affiliate).await {
            Ok(()) => Ok(affiliate),
            Err(StorageError::DuplicateCoupon(code)) => Err(RegistrationError::CouponTaken(code)),
            Err(e) => Err(e.into()),
        }
    }

    async fn load(&self, id: AffiliateId) -> Result<Affiliate, RegistrationError> {
        self.affiliates
            .get(id)
            .await?
            .ok_or(RegistrationError::NotFound(id))
    }

    async fn transition(
        &self,
        id: AffiliateId,
        to: AffiliateStatus,
    ) -> Result<(), RegistrationError> {
        let affiliate = self.load(id).await?;
        if affiliate.status == to {
            return Err(RegistrationError::InvalidTransition {
                id,
                from: affiliate.status,
                to,
            });
        }
        self.affiliates.set_status(id, to).await?;
        info!(affiliate_id = %id, from = %affiliate.status, to = %to, "affiliate status changed");
        Ok(())
    }

    /// Allow the affiliate to log in and earn.
    pub async fn approve(&self, id: AffiliateId) -> Result<(), RegistrationError> {
        self.transition(id, AffiliateStatus::Approved).await
    }

    pub async fn reject(&self, id: AffiliateId) -> Result<(), RegistrationError> {
        self.transition(id, AffiliateStatus::Rejected).await
    }

    /// Move an approved affiliate to the paid tier.
    pub async fn upgrade_to_paid(&self, id: AffiliateId) -> Result<(), RegistrationError> {
        let affiliate = self.load(id).await?;
        if !affiliate.can_earn() {
            return Err(RegistrationError::NotApproved(id));
        }
        if affiliate.is_paid {
            return Err(RegistrationError::AlreadyPaid(id));
        }
        self.affiliates.mark_paid(id).await?;
        info!(affiliate_id = %id, "affiliate upgraded to paid tier");
        Ok(())
    }

    /// Check a coupon/password pair. Only approved affiliates pass.
    pub async fn authenticate(
        &self,
        coupon_code: &str,
        password: &str,
    ) -> Result<Affiliate, RegistrationError> {
        let affiliate = self
            .affiliates
            .find_by_coupon(coupon_code)
            .await?
            .filter(|a| a.password.verify(password))
            .ok_or(RegistrationError::InvalidCredentials)?;

        if !affiliate.can_earn() {
            return Err(RegistrationError::NotApproved(affiliate.id));
        }
        Ok(affiliate)
    }
}
