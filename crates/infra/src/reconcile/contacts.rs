//! Business-partner (contact) synchronization.
//!
//! Pull direction: an ERP business partner record overwrites a fixed set of
//! profile attributes (address, bank, tax, phone) on the matching
//! identity-provider user. Matching resolves the ERP id attribute first and
//! falls back to the record's e-mail address. A record matching neither is
//! a human-actionable failure, reported and not retried.

use std::sync::Arc;

use async_trait::async_trait;
use coopsync_core::directory_ports::UserDirectory;
use coopsync_domain::{
    user_attributes, ErpAddressType, ErpBusinessPartner, Result, SyncJob, UserProfile,
};
use tracing::debug;

use crate::queue::{JobProcessor, TaskOutcome};

/// Task syncing one ERP business partner into the identity provider.
pub struct ContactSyncTask {
    users: Arc<dyn UserDirectory>,
}

impl ContactSyncTask {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    async fn resolve_user(&self, partner: &ErpBusinessPartner) -> Result<Option<UserProfile>> {
        if let Some(user) = self
            .users
            .find_user_by_attribute(user_attributes::SAP_ID, &partner.card_code)
            .await?
        {
            return Ok(Some(user));
        }

        match partner.email.as_deref() {
            Some(email) if !email.is_empty() => self.users.find_user_by_email(email).await,
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl JobProcessor for ContactSyncTask {
    async fn process(&self, job: &SyncJob) -> Result<TaskOutcome> {
        let partner: ErpBusinessPartner = job.payload()?;

        let Some(mut user) = self.resolve_user(&partner).await? else {
            return Ok(TaskOutcome::Failure {
                message: format!(
                    "no local user matches business partner {} by ERP id or e-mail",
                    partner.card_code
                ),
            });
        };

        apply_partner_attributes(&mut user, &partner);
        self.users.update_user(&user).await?;

        debug!(card_code = %partner.card_code, user_id = %user.id, "contact synchronized");
        Ok(TaskOutcome::Success {
            message: format!("business partner {} synchronized to user {}", partner.card_code, user.id),
        })
    }
}

/// Overwrite the ERP-owned attribute set on a user profile.
///
/// Only the fixed set the ERP is authoritative for is touched; everything
/// else on the profile stays as the member left it.
fn apply_partner_attributes(user: &mut UserProfile, partner: &ErpBusinessPartner) {
    user.set_attribute(user_attributes::SAP_ID, &partner.card_code);

    set_or_clear(user, user_attributes::COMPANY_NAME, partner.card_name.as_deref());
    set_or_clear(user, user_attributes::PHONE_1, partner.phone1.as_deref());
    set_or_clear(user, user_attributes::PHONE_2, partner.phone2.as_deref());
    set_or_clear(user, user_attributes::TAX_CODE, partner.federal_tax_id.as_deref());
    set_or_clear(user, user_attributes::VAT_LIABLE, partner.vat_liable.as_deref());

    let billing = partner
        .addresses
        .iter()
        .find(|a| a.address_type == ErpAddressType::Billing)
        .or_else(|| partner.addresses.first());
    set_or_clear(user, user_attributes::ADDRESS, billing.and_then(|a| a.street.as_deref()));
    set_or_clear(user, user_attributes::POSTAL_CODE, billing.and_then(|a| a.zip_code.as_deref()));
    set_or_clear(user, user_attributes::CITY, billing.and_then(|a| a.city.as_deref()));

    let bank = partner.bank_accounts.first();
    set_or_clear(user, user_attributes::IBAN, bank.and_then(|b| b.iban.as_deref()));
    set_or_clear(user, user_attributes::BIC, bank.and_then(|b| b.bic.as_deref()));
}

fn set_or_clear(user: &mut UserProfile, key: &str, value: Option<&str>) {
    match value {
        Some(value) if !value.is_empty() => user.set_attribute(key, value),
        _ => user.clear_attribute(key),
    }
}
