use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A materialized slice of a purchase line, tracked per farm+coop for
/// aggregation into `livestocks` / `current_livestocks`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "livestock_batches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub purchase_item_id: Uuid,
    pub livestock_id: Uuid,
    pub farm_id: Uuid,
    pub coop_id: Uuid,
    pub strain_id: Uuid,
    pub name: String,
    pub initial_quantity: i32,
    pub initial_weight: Decimal,
    pub price_per_unit: Decimal,
    pub status: String,
    pub start_date: Date,
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
        belongs_to = "super::livestock_purchase_item::Entity",
        from = "Column::PurchaseItemId",
        to = "super::livestock_purchase_item::Column::Id"
    )]
    PurchaseItem,
    #[sea_orm(
        belongs_to = "super::livestock::Entity",
        from = "Column::LivestockId",
        to = "super::livestock::Column::Id"
    )]
    Livestock,
}

impl Related<super::livestock_purchase::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchase.def()
    }
}

impl Related<super::livestock_purchase_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseItem.def()
    }
}

impl Related<super::livestock::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Livestock.def()
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
