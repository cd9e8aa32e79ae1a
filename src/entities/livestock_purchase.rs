use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Purchase header. Lifecycle runs `draft -> in_coop -> complete`, with
/// `cancelled` as the alternate terminal state; status gates mutability.
/// `data` carries a JSON snapshot of the priced header alongside the native
/// columns, as the upstream system stores it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "livestock_purchases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(
        min = 1,
        max = 50,
        message = "Invoice number must be between 1 and 50 characters"
    ))]
    pub invoice_number: String,

    pub purchase_date: Date,
    pub supplier_id: Uuid,
    pub expedition_id: Option<Uuid>,
    pub farm_id: Uuid,
    pub coop_id: Uuid,
    pub status: String,
    pub notes: Option<String>,
    pub data: Option<Json>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::partner::Entity",
        from = "Column::SupplierId",
        to = "super::partner::Column::Id"
    )]
    Supplier,
    #[sea_orm(has_many = "super::livestock_purchase_item::Entity")]
    Items,
    #[sea_orm(has_many = "super::livestock_batch::Entity")]
    Batches,
}

impl Related<super::partner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl Related<super::livestock_purchase_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
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
