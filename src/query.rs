//! List endpoints share one query-string vocabulary: pagination, a sort key
//! and a handful of search fields. [`QueryFeatures`] applies it to any entity
//! that describes its columns through [`QueryColumns`].

use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, Order, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select,
    sea_query::{Expr, LikeExpr, extension::postgres::PgExpr},
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    entity::{brands, categories, coupons, orders, products, reviews, sub_categories, users},
    response::Meta,
};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// 1-based page, defaults to 1.
    pub page: Option<i64>,
    /// Page size, defaults to 20 and is capped at 100.
    pub size: Option<i64>,
    /// `"field asc|desc"`; newest first when absent.
    pub sort: Option<String>,
    pub coupon_code: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    /// Any value restricts results to discounted products.
    pub discount: Option<String>,
    pub price_from: Option<Decimal>,
    pub price_to: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u64,
    pub size: u64,
    pub skip: u64,
}

impl ListQuery {
    pub fn window(&self) -> PageWindow {
        let page = self.page.unwrap_or(1).max(1) as u64;
        let size = self
            .size
            .map(|s| s.clamp(1, MAX_PAGE_SIZE as i64) as u64)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        PageWindow {
            page,
            size,
            skip: (page - 1) * size,
        }
    }

    fn text_searches(&self) -> [(&'static str, Option<&str>); 3] {
        [
            ("couponCode", self.coupon_code.as_deref()),
            ("name", self.name.as_deref()),
            ("title", self.title.as_deref()),
        ]
    }
}

/// Split a sort expression such as `"price desc"` into its field and direction.
/// A missing direction sorts ascending; anything else after the field is rejected.
pub fn parse_sort(raw: &str) -> Option<(&str, Order)> {
    let mut parts = raw.split_whitespace();
    let field = parts.next()?;
    let order = match parts.next().map(|d| d.to_ascii_lowercase()) {
        None => Order::Asc,
        Some(d) if d == "asc" || d == "1" => Order::Asc,
        Some(d) if d == "desc" || d == "-1" => Order::Desc,
        Some(_) => return None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((field, order))
}

/// Maps API field names to entity columns.
pub trait QueryColumns: EntityTrait {
    fn created_at() -> Self::Column;

    /// Resolve a camelCase or snake_case field name. Unknown names yield `None`
    /// and are ignored by the query builder.
    fn column(field: &str) -> Option<Self::Column>;
}

pub struct QueryFeatures<'q, E: EntityTrait> {
    select: Select<E>,
    query: &'q ListQuery,
}

impl<'q, E> QueryFeatures<'q, E>
where
    E: QueryColumns,
{
    pub fn new(select: Select<E>, query: &'q ListQuery) -> Self {
        Self { select, query }
    }

    pub fn search(mut self) -> Self {
        for (field, value) in self.query.text_searches() {
            let (Some(value), Some(column)) = (value, E::column(field)) else {
                continue;
            };
            for word in value.split_whitespace() {
                let pattern = format!("%{}%", escape_like(word));
                self.select = self.select.filter(
                    Expr::col((column.entity_name(), column))
                        .ilike(LikeExpr::new(pattern).escape('\\')),
                );
            }
        }

        if self.query.discount.is_some() {
            if let Some(column) = E::column("discount") {
                self.select = self.select.filter(column.ne(Decimal::ZERO));
            }
        }

        if let Some(column) = E::column("appliedPrice") {
            if let Some(from) = self.query.price_from {
                self.select = self.select.filter(column.gte(from));
            }
            if let Some(to) = self.query.price_to {
                self.select = self.select.filter(column.lte(to));
            }
        }
        self
    }

    pub fn sort(mut self) -> Self {
        let requested = self
            .query
            .sort
            .as_deref()
            .and_then(parse_sort)
            .and_then(|(field, order)| E::column(field).map(|column| (column, order)));

        self.select = match requested {
            Some((column, order)) => self.select.order_by(column, order),
            None => self.select.order_by_desc(E::created_at()),
        };
        self
    }

    pub fn paginate(mut self) -> Self {
        let window = self.query.window();
        self.select = self.select.offset(window.skip).limit(window.size);
        self
    }

    pub fn into_select(self) -> Select<E> {
        self.select
    }
}

/// Apply search and sort, count the matches, then fetch the requested page.
pub async fn fetch_page<E, C>(
    db: &C,
    select: Select<E>,
    query: &ListQuery,
) -> Result<(Vec<E::Model>, Meta), DbErr>
where
    E: QueryColumns,
    E::Model: Send + Sync,
    C: ConnectionTrait,
{
    let filtered = QueryFeatures::new(select, query).search().sort();
    let total = filtered.select.clone().count(db).await?;
    let window = query.window();
    let rows = filtered.paginate().into_select().all(db).await?;
    Ok((rows, Meta::new(window.page, window.size, total)))
}

fn escape_like(word: &str) -> String {
    let mut escaped = String::with_capacity(word.len());
    for ch in word.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl QueryColumns for categories::Entity {
    fn created_at() -> Self::Column {
        categories::Column::CreatedAt
    }

    fn column(field: &str) -> Option<Self::Column> {
        use categories::Column::*;
        Some(match field {
            "name" => Name,
            "slug" => Slug,
            "createdAt" | "created_at" => CreatedAt,
            "updatedAt" | "updated_at" => UpdatedAt,
            _ => return None,
        })
    }
}

impl QueryColumns for sub_categories::Entity {
    fn created_at() -> Self::Column {
        sub_categories::Column::CreatedAt
    }

    fn column(field: &str) -> Option<Self::Column> {
        use sub_categories::Column::*;
        Some(match field {
            "name" => Name,
            "slug" => Slug,
            "createdAt" | "created_at" => CreatedAt,
            "updatedAt" | "updated_at" => UpdatedAt,
            _ => return None,
        })
    }
}

impl QueryColumns for brands::Entity {
    fn created_at() -> Self::Column {
        brands::Column::CreatedAt
    }

    fn column(field: &str) -> Option<Self::Column> {
        use brands::Column::*;
        Some(match field {
            "name" => Name,
            "slug" => Slug,
            "createdAt" | "created_at" => CreatedAt,
            "updatedAt" | "updated_at" => UpdatedAt,
            _ => return None,
        })
    }
}

impl QueryColumns for products::Entity {
    fn created_at() -> Self::Column {
        products::Column::CreatedAt
    }

    fn column(field: &str) -> Option<Self::Column> {
        use products::Column::*;
        Some(match field {
            "title" => Title,
            "slug" => Slug,
            "basePrice" | "base_price" => BasePrice,
            "appliedPrice" | "applied_price" | "price" => AppliedPrice,
            "discount" => Discount,
            "stock" => Stock,
            "rate" => Rate,
            "createdAt" | "created_at" => CreatedAt,
            "updatedAt" | "updated_at" => UpdatedAt,
            _ => return None,
        })
    }
}

impl QueryColumns for coupons::Entity {
    fn created_at() -> Self::Column {
        coupons::Column::CreatedAt
    }

    fn column(field: &str) -> Option<Self::Column> {
        use coupons::Column::*;
        Some(match field {
            "couponCode" | "coupon_code" => CouponCode,
            "couponAmount" | "coupon_amount" => CouponAmount,
            "fromDate" | "from_date" => FromDate,
            "toDate" | "to_date" => ToDate,
            "createdAt" | "created_at" => CreatedAt,
            _ => return None,
        })
    }
}

impl QueryColumns for orders::Entity {
    fn created_at() -> Self::Column {
        orders::Column::CreatedAt
    }

    fn column(field: &str) -> Option<Self::Column> {
        use orders::Column::*;
        Some(match field {
            "totalPrice" | "total_price" | "price" => TotalPrice,
            "status" => Status,
            "createdAt" | "created_at" => CreatedAt,
            "updatedAt" | "updated_at" => UpdatedAt,
            _ => return None,
        })
    }
}

impl QueryColumns for users::Entity {
    fn created_at() -> Self::Column {
        users::Column::CreatedAt
    }

    fn column(field: &str) -> Option<Self::Column> {
        use users::Column::*;
        Some(match field {
            "name" | "username" => Username,
            "email" => Email,
            "age" => Age,
            "createdAt" | "created_at" => CreatedAt,
            _ => return None,
        })
    }
}

impl QueryColumns for reviews::Entity {
    fn created_at() -> Self::Column {
        reviews::Column::CreatedAt
    }

    fn column(field: &str) -> Option<Self::Column> {
        use reviews::Column::*;
        Some(match field {
            "reviewRate" | "review_rate" | "rate" => ReviewRate,
            "createdAt" | "created_at" => CreatedAt,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sea_orm::{DbBackend, QueryTrait};

    fn sql<E: QueryColumns>(query: &ListQuery) -> String {
        QueryFeatures::new(E::find(), query)
            .search()
            .sort()
            .paginate()
            .into_select()
            .build(DbBackend::Postgres)
            .to_string()
    }

    #[test]
    fn window_defaults_and_skip() {
        let q = ListQuery::default();
        assert_eq!(
            q.window(),
            PageWindow {
                page: 1,
                size: 20,
                skip: 0
            }
        );

        let q = ListQuery {
            page: Some(3),
            size: Some(15),
            ..Default::default()
        };
        assert_eq!(q.window().skip, 30);
        assert_eq!(q.window().size, 15);
    }

    #[test]
    fn window_clamps_out_of_range_values() {
        let q = ListQuery {
            page: Some(-4),
            size: Some(5000),
            ..Default::default()
        };
        let w = q.window();
        assert_eq!(w.page, 1);
        assert_eq!(w.size, MAX_PAGE_SIZE);

        let q = ListQuery {
            size: Some(0),
            ..Default::default()
        };
        assert_eq!(q.window().size, 1);
    }

    #[test]
    fn parse_sort_reads_direction() {
        assert_eq!(parse_sort("price desc"), Some(("price", Order::Desc)));
        assert_eq!(parse_sort("name asc"), Some(("name", Order::Asc)));
        assert_eq!(parse_sort("name"), Some(("name", Order::Asc)));
        assert_eq!(parse_sort("name sideways"), None);
        assert_eq!(parse_sort("   "), None);
    }

    #[test]
    fn default_sort_is_newest_first() {
        let out = sql::<products::Entity>(&ListQuery::default());
        assert!(out.contains(r#"ORDER BY "products"."created_at" DESC"#), "{out}");
        assert!(out.contains("LIMIT 20 OFFSET 0"), "{out}");
    }

    #[test]
    fn unknown_sort_field_falls_back_to_default() {
        let q = ListQuery {
            sort: Some("password_hash desc".into()),
            ..Default::default()
        };
        let out = sql::<users::Entity>(&q);
        assert!(out.contains(r#"ORDER BY "users"."created_at" DESC"#), "{out}");
    }

    #[test]
    fn sort_by_price_desc() {
        let q = ListQuery {
            sort: Some("appliedPrice desc".into()),
            ..Default::default()
        };
        let out = sql::<products::Entity>(&q);
        assert!(out.contains(r#"ORDER BY "products"."applied_price" DESC"#), "{out}");
    }

    #[test]
    fn title_search_requires_every_word() {
        let q = ListQuery {
            title: Some("red  shoe".into()),
            ..Default::default()
        };
        let out = sql::<products::Entity>(&q);
        assert!(out.contains(r#""products"."title" ILIKE '%red%'"#), "{out}");
        assert!(out.contains(r#""products"."title" ILIKE '%shoe%'"#), "{out}");
        assert!(out.contains(" AND "), "{out}");
    }

    #[test]
    fn search_fields_without_column_are_ignored() {
        let q = ListQuery {
            title: Some("phone".into()),
            price_from: Some(dec!(10)),
            discount: Some("true".into()),
            ..Default::default()
        };
        let out = sql::<categories::Entity>(&q);
        assert!(!out.contains("WHERE"), "{out}");
    }

    #[test]
    fn price_range_and_discount_filters() {
        let q = ListQuery {
            price_from: Some(dec!(10)),
            price_to: Some(dec!(50)),
            discount: Some("1".into()),
            ..Default::default()
        };
        let out = sql::<products::Entity>(&q);
        assert!(out.contains(r#""products"."discount" <> 0"#), "{out}");
        assert!(out.contains(r#""products"."applied_price" >= 10"#), "{out}");
        assert!(out.contains(r#""products"."applied_price" <= 50"#), "{out}");
    }

    #[test]
    fn coupon_code_search_targets_coupons() {
        let q = ListQuery {
            coupon_code: Some("summer".into()),
            ..Default::default()
        };
        let out = sql::<coupons::Entity>(&q);
        assert!(out.contains(r#""coupons"."coupon_code" ILIKE '%summer%'"#), "{out}");
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off"), r"50\%\_off");
    }
}
