use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::company::{self, Entity as CompanyEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Purchasing rules enforced by the purchase workflow.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PurchasingRules {
    /// Ceiling on line items per purchase
    pub max_items_per_purchase: u32,
    /// Whether an expedition partner must be attached to every purchase
    pub require_expedition: bool,
}

impl Default for PurchasingRules {
    fn default() -> Self {
        Self {
            max_items_per_purchase: 50,
            require_expedition: false,
        }
    }
}

/// Batch naming settings. The template supports `{farm}`, `{coop}`, `{date}`
/// and `{index}` placeholders.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchSettings {
    pub naming_template: String,
    pub date_format: String,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            naming_template: "{farm}-{coop}-{date}-{index}".to_string(),
            date_format: "%Y%m%d".to_string(),
        }
    }
}

/// Readiness of a configured method. Only `ready` methods are offered.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MethodStatus {
    Ready,
    Development,
    NotApplicable,
}

/// Feature-flag pair for one livestock method.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MethodToggle {
    pub enabled: bool,
    pub status: MethodStatus,
}

/// Which family of livestock methods is being queried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Depletion,
    Mutation,
    FeedUsage,
}

/// Method toggles per family. These describe intended strategies; nothing in
/// this service executes a depletion, it only reports what is selectable.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LivestockMethods {
    pub depletion: BTreeMap<String, MethodToggle>,
    pub mutation: BTreeMap<String, MethodToggle>,
    pub feed_usage: BTreeMap<String, MethodToggle>,
}

impl Default for LivestockMethods {
    fn default() -> Self {
        let ready = MethodToggle {
            enabled: true,
            status: MethodStatus::Ready,
        };
        let in_development = MethodToggle {
            enabled: false,
            status: MethodStatus::Development,
        };

        let mut depletion = BTreeMap::new();
        depletion.insert("fifo".to_string(), ready);
        depletion.insert("manual".to_string(), ready);
        depletion.insert("lifo".to_string(), in_development);

        let mut mutation = BTreeMap::new();
        mutation.insert("fifo".to_string(), ready);
        mutation.insert("manual".to_string(), in_development);

        let mut feed_usage = BTreeMap::new();
        feed_usage.insert("fifo".to_string(), ready);
        feed_usage.insert("manual".to_string(), ready);

        Self {
            depletion,
            mutation,
            feed_usage,
        }
    }
}

/// Company-level configuration: static defaults deep-merged with the
/// per-company JSON override column, company values winning.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompanyConfig {
    pub purchasing: PurchasingRules,
    pub batch: BatchSettings,
    pub livestock: LivestockMethods,
}

impl CompanyConfig {
    /// Resolves the effective config from an optional override blob.
    pub fn from_overrides(overrides: Option<&Value>) -> Result<Self, ServiceError> {
        let mut base = serde_json::to_value(CompanyConfig::default())
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        if let Some(overrides) = overrides {
            deep_merge(&mut base, overrides);
        }
        serde_json::from_value(base).map_err(|e| {
            ServiceError::ValidationError(format!("Company config override is malformed: {}", e))
        })
    }

    /// Methods flagged both `enabled` and `ready` for the given family.
    pub fn available_livestock_methods(&self, kind: MethodKind) -> Vec<String> {
        let methods = match kind {
            MethodKind::Depletion => &self.livestock.depletion,
            MethodKind::Mutation => &self.livestock.mutation,
            MethodKind::FeedUsage => &self.livestock.feed_usage,
        };
        methods
            .iter()
            .filter(|(_, toggle)| toggle.enabled && toggle.status == MethodStatus::Ready)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Renders a batch name from the configured template.
    pub fn render_batch_name(
        &self,
        farm_code: &str,
        coop_code: &str,
        date: NaiveDate,
        index: usize,
    ) -> String {
        self.batch
            .naming_template
            .replace("{farm}", farm_code)
            .replace("{coop}", coop_code)
            .replace(
                "{date}",
                &date.format(&self.batch.date_format).to_string(),
            )
            .replace("{index}", &index.to_string())
    }
}

/// Recursively merges `overrides` into `base`; override values win, objects
/// merge key-by-key, everything else replaces.
pub fn deep_merge(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            for (key, override_value) in override_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, override_value),
                    None => {
                        base_map.insert(key.clone(), override_value.clone());
                    }
                }
            }
        }
        (base, overrides) => *base = overrides.clone(),
    }
}

/// Service for company rows and their configuration overrides
#[derive(Clone)]
pub struct CompanyService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl CompanyService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a company with no config overrides
    #[instrument(skip(self))]
    pub async fn create_company(&self, name: String) -> Result<company::Model, ServiceError> {
        let db = &*self.db_pool;
        let now = chrono::Utc::now();

        let model = company::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            config: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create company");
            ServiceError::DatabaseError(e)
        })?;

        info!(company_id = %model.id, "Company created");
        Ok(model)
    }

    /// Gets a company by ID
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn get_company(
        &self,
        company_id: Uuid,
    ) -> Result<Option<company::Model>, ServiceError> {
        let db = &*self.db_pool;
        CompanyEntity::find_by_id(company_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Resolves the effective configuration for a company
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn effective_config(&self, company_id: Uuid) -> Result<CompanyConfig, ServiceError> {
        let company = self
            .get_company(company_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Company {} not found", company_id)))?;

        CompanyConfig::from_overrides(company.config.as_ref())
    }

    /// Merges a patch into the stored override blob and persists it. The
    /// merged result must still deserialize into a valid config shape.
    #[instrument(skip(self, patch), fields(company_id = %company_id))]
    pub async fn update_config(
        &self,
        company_id: Uuid,
        patch: Value,
    ) -> Result<CompanyConfig, ServiceError> {
        let db = &*self.db_pool;

        let company = self
            .get_company(company_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Company {} not found", company_id)))?;

        let mut overrides = company.config.clone().unwrap_or_else(|| Value::Object(Default::default()));
        deep_merge(&mut overrides, &patch);

        // Reject patches that break the config shape before persisting them
        let effective = CompanyConfig::from_overrides(Some(&overrides))?;

        let mut active: company::ActiveModel = company.into();
        active.config = Set(Some(overrides));
        active.updated_at = Set(Some(chrono::Utc::now()));
        active.update(db).await.map_err(|e| {
            error!(error = %e, company_id = %company_id, "Failed to persist company config");
            ServiceError::DatabaseError(e)
        })?;

        info!(company_id = %company_id, "Company config updated");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::CompanyConfigUpdated(company_id)).await {
                tracing::warn!(error = %e, company_id = %company_id, "Failed to send company config updated event");
            }
        }

        Ok(effective)
    }
}
