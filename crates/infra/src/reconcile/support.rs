//! Shared in-memory port implementations for reconciliation task tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use coopsync_core::directory_ports::UserDirectory;
use coopsync_core::entity_ports::{
    ContractRepository, DeliveryPlaceRepository, ItemGroupRepository,
};
use coopsync_core::erp_ports::{
    AgreementsApi, BusinessPartnersApi, DeliveryPlacesApi, ItemGroupsApi,
};
use coopsync_domain::{
    user_attributes, Contract, CoopsyncError, DeliveryPlace, ErpAgreement, ErpAgreementStatus,
    ErpBusinessPartner, ErpDeliveryPlace, ErpItemGroup, ItemGroup, Result as DomainResult,
    UserProfile,
};

/// In-memory identity directory.
#[derive(Default)]
pub(crate) struct MemoryUserDirectory {
    pub users: Mutex<Vec<UserProfile>>,
    pub updates: Mutex<Vec<UserProfile>>,
}

impl MemoryUserDirectory {
    pub fn with_users(users: Vec<UserProfile>) -> Self {
        Self { users: Mutex::new(users), updates: Mutex::new(Vec::new()) }
    }

    pub fn updated(&self) -> Vec<UserProfile> {
        self.updates.lock().expect("updates").clone()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn list_users(&self) -> DomainResult<Vec<UserProfile>> {
        Ok(self.users.lock().expect("users").clone())
    }

    async fn find_user(&self, id: &str) -> DomainResult<Option<UserProfile>> {
        Ok(self.users.lock().expect("users").iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> DomainResult<Option<UserProfile>> {
        Ok(self
            .users
            .lock()
            .expect("users")
            .iter()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_user_by_attribute(
        &self,
        key: &str,
        value: &str,
    ) -> DomainResult<Option<UserProfile>> {
        Ok(self
            .users
            .lock()
            .expect("users")
            .iter()
            .find(|u| u.attribute(key) == Some(value))
            .cloned())
    }

    async fn update_user(&self, user: &UserProfile) -> DomainResult<()> {
        let mut users = self.users.lock().expect("users");
        if let Some(existing) = users.iter_mut().find(|u| u.id == user.id) {
            *existing = user.clone();
        }
        self.updates.lock().expect("updates").push(user.clone());
        Ok(())
    }
}

/// In-memory item group repository keyed by sap id.
#[derive(Default)]
pub(crate) struct MemoryItemGroups {
    pub groups: Mutex<HashMap<String, ItemGroup>>,
}

impl MemoryItemGroups {
    pub fn with_groups(groups: Vec<ItemGroup>) -> Self {
        Self {
            groups: Mutex::new(
                groups.into_iter().map(|g| (g.sap_id.clone(), g)).collect(),
            ),
        }
    }

    pub fn get(&self, sap_id: &str) -> Option<ItemGroup> {
        self.groups.lock().expect("groups").get(sap_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.groups.lock().expect("groups").len()
    }
}

#[async_trait]
impl ItemGroupRepository for MemoryItemGroups {
    async fn find_by_sap_id(&self, sap_id: &str) -> DomainResult<Option<ItemGroup>> {
        Ok(self.get(sap_id))
    }

    async fn upsert(&self, group: &ItemGroup) -> DomainResult<()> {
        let mut groups = self.groups.lock().expect("groups");
        match groups.get_mut(&group.sap_id) {
            Some(existing) => {
                let keep_id = existing.id.clone();
                let keep_created = existing.created_at;
                *existing = group.clone();
                existing.id = keep_id;
                existing.created_at = keep_created;
            }
            None => {
                groups.insert(group.sap_id.clone(), group.clone());
            }
        }
        Ok(())
    }
}

/// In-memory delivery place repository keyed by sap id.
#[derive(Default)]
pub(crate) struct MemoryDeliveryPlaces {
    pub places: Mutex<HashMap<String, DeliveryPlace>>,
}

impl MemoryDeliveryPlaces {
    pub fn with_places(places: Vec<DeliveryPlace>) -> Self {
        Self {
            places: Mutex::new(
                places.into_iter().map(|p| (p.sap_id.clone(), p)).collect(),
            ),
        }
    }

    pub fn get(&self, sap_id: &str) -> Option<DeliveryPlace> {
        self.places.lock().expect("places").get(sap_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.places.lock().expect("places").len()
    }
}

#[async_trait]
impl DeliveryPlaceRepository for MemoryDeliveryPlaces {
    async fn find_by_sap_id(&self, sap_id: &str) -> DomainResult<Option<DeliveryPlace>> {
        Ok(self.get(sap_id))
    }

    async fn insert(&self, place: &DeliveryPlace) -> DomainResult<()> {
        self.places.lock().expect("places").insert(place.sap_id.clone(), place.clone());
        Ok(())
    }

    async fn update(&self, place: &DeliveryPlace) -> DomainResult<()> {
        self.places.lock().expect("places").insert(place.sap_id.clone(), place.clone());
        Ok(())
    }
}

/// In-memory contract repository keyed by sap id.
#[derive(Default)]
pub(crate) struct MemoryContracts {
    pub contracts: Mutex<Vec<Contract>>,
}

impl MemoryContracts {
    pub fn with_contracts(contracts: Vec<Contract>) -> Self {
        Self { contracts: Mutex::new(contracts) }
    }

    pub fn all(&self) -> Vec<Contract> {
        self.contracts.lock().expect("contracts").clone()
    }

    pub fn by_sap_id(&self, sap_id: &str) -> Option<Contract> {
        self.all().into_iter().find(|c| c.sap_id.as_deref() == Some(sap_id))
    }
}

#[async_trait]
impl ContractRepository for MemoryContracts {
    async fn find_by_sap_id(&self, sap_id: &str) -> DomainResult<Option<Contract>> {
        Ok(self.by_sap_id(sap_id))
    }

    async fn insert(&self, contract: &Contract) -> DomainResult<()> {
        self.contracts.lock().expect("contracts").push(contract.clone());
        Ok(())
    }

    async fn update(&self, contract: &Contract) -> DomainResult<()> {
        let mut contracts = self.contracts.lock().expect("contracts");
        match contracts.iter_mut().find(|c| c.id == contract.id) {
            Some(existing) => {
                *existing = contract.clone();
                Ok(())
            }
            None => Err(CoopsyncError::NotFound(format!(
                "contract {} does not exist",
                contract.id
            ))),
        }
    }

    async fn list_with_sap_ids(&self) -> DomainResult<Vec<Contract>> {
        Ok(self.all().into_iter().filter(|c| c.sap_id.is_some()).collect())
    }
}

/// Recording agreements API with scripted listings.
#[derive(Default)]
pub(crate) struct MemoryAgreementsApi {
    pub agreements: Mutex<Vec<ErpAgreement>>,
    pub created: Mutex<Vec<ErpAgreement>>,
    pub updated: Mutex<Vec<(i64, ErpAgreement)>>,
    pub status_updates: Mutex<Vec<(i64, ErpAgreementStatus)>>,
}

impl MemoryAgreementsApi {
    pub fn with_agreements(agreements: Vec<ErpAgreement>) -> Self {
        Self { agreements: Mutex::new(agreements), ..Default::default() }
    }
}

#[async_trait]
impl AgreementsApi for MemoryAgreementsApi {
    async fn list_agreements(&self) -> DomainResult<Vec<ErpAgreement>> {
        Ok(self.agreements.lock().expect("agreements").clone())
    }

    async fn list_agreements_for_partner(&self, bp_code: &str) -> DomainResult<Vec<ErpAgreement>> {
        Ok(self
            .agreements
            .lock()
            .expect("agreements")
            .iter()
            .filter(|a| a.bp_code == bp_code)
            .cloned()
            .collect())
    }

    async fn create_agreement(&self, agreement: &ErpAgreement) -> DomainResult<ErpAgreement> {
        let mut created = agreement.clone();
        created.agreement_no = Some(9_000 + self.created.lock().expect("created").len() as i64);
        created.doc_num = created.doc_num.or(Some(5_000));
        self.created.lock().expect("created").push(created.clone());
        Ok(created)
    }

    async fn update_agreement(
        &self,
        agreement_no: i64,
        agreement: &ErpAgreement,
    ) -> DomainResult<()> {
        self.updated.lock().expect("updated").push((agreement_no, agreement.clone()));
        Ok(())
    }

    async fn update_agreement_status(
        &self,
        agreement_no: i64,
        status: ErpAgreementStatus,
    ) -> DomainResult<()> {
        self.status_updates.lock().expect("status updates").push((agreement_no, status));
        Ok(())
    }
}

/// Scripted business partner listing.
pub(crate) struct ScriptedPartnersApi {
    pub partners: Vec<ErpBusinessPartner>,
}

#[async_trait]
impl BusinessPartnersApi for ScriptedPartnersApi {
    async fn list_business_partners(&self) -> DomainResult<Vec<ErpBusinessPartner>> {
        Ok(self.partners.clone())
    }

    async fn find_business_partner(
        &self,
        card_code: &str,
    ) -> DomainResult<Option<ErpBusinessPartner>> {
        Ok(self.partners.iter().find(|p| p.card_code == card_code).cloned())
    }
}

/// Scripted item group listing.
pub(crate) struct ScriptedItemGroupsApi {
    pub groups: Vec<ErpItemGroup>,
}

#[async_trait]
impl ItemGroupsApi for ScriptedItemGroupsApi {
    async fn list_item_groups(&self) -> DomainResult<Vec<ErpItemGroup>> {
        Ok(self.groups.clone())
    }

    async fn find_item_group(&self, number: i64) -> DomainResult<Option<ErpItemGroup>> {
        Ok(self.groups.iter().find(|g| g.number == number).cloned())
    }
}

/// Scripted delivery place listing.
pub(crate) struct ScriptedDeliveryPlacesApi {
    pub places: Vec<ErpDeliveryPlace>,
}

#[async_trait]
impl DeliveryPlacesApi for ScriptedDeliveryPlacesApi {
    async fn list_delivery_places(&self) -> DomainResult<Vec<ErpDeliveryPlace>> {
        Ok(self.places.clone())
    }
}

/// A member user correlated to an ERP business partner.
pub(crate) fn member_user(id: &str, email: &str, sap_id: Option<&str>) -> UserProfile {
    let mut user = UserProfile {
        id: id.to_string(),
        email: Some(email.to_string()),
        first_name: Some("Maija".into()),
        last_name: Some("Mansikka".into()),
        attributes: Default::default(),
    };
    if let Some(sap_id) = sap_id {
        user.set_attribute(user_attributes::SAP_ID, sap_id);
    }
    user
}
