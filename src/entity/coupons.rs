use sea_orm::entity::prelude::*;

use super::enums::CouponStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub coupon_code: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub coupon_amount: Decimal,
    pub coupon_status: CouponStatus,
    pub is_fixed: bool,
    pub is_percentage: bool,
    pub from_date: DateTimeWithTimeZone,
    pub to_date: DateTimeWithTimeZone,
    pub is_enabled: bool,
    pub enabled_at: Option<DateTimeWithTimeZone>,
    pub enabled_by: Option<Uuid>,
    pub disabled_at: Option<DateTimeWithTimeZone>,
    pub disabled_by: Option<Uuid>,
    pub added_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::coupon_users::Entity")]
    CouponUsers,
}

impl Related<super::coupon_users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CouponUsers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
