use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One priced line of a purchase: strain, quantity and per-unit price/weight
/// with their computed totals. `data` is the denormalized line snapshot the
/// upstream system also keeps.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "livestock_purchase_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub strain_id: Uuid,
    pub quantity: i32,
    pub price_per_unit: Decimal,
    pub price_total: Decimal,
    pub weight_per_unit: Decimal,
    pub weight_total: Decimal,
    pub data: Option<Json>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::livestock_purchase::Entity",
        from = "Column::PurchaseId",
        to = "super::livestock_purchase::Column::Id"
    )]
    Purchase,
    #[sea_orm(
        belongs_to = "super::livestock_strain::Entity",
        from = "Column::StrainId",
        to = "super::livestock_strain::Column::Id"
    )]
    Strain,
    #[sea_orm(has_many = "super::livestock_batch::Entity")]
    Batches,
}

impl Related<super::livestock_purchase::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchase.def()
    }
}

impl Related<super::livestock_strain::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Strain.def()
    }
}

impl Related<super::livestock_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batches.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }

        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}
