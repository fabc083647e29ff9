pub mod audit_logs;
pub mod brands;
pub mod cart_items;
pub mod carts;
pub mod categories;
pub mod coupon_users;
pub mod coupons;
pub mod enums;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod sub_categories;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use brands::Entity as Brands;
pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use categories::Entity as Categories;
pub use coupon_users::Entity as CouponUsers;
pub use coupons::Entity as Coupons;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use reviews::Entity as Reviews;
pub use sub_categories::Entity as SubCategories;
pub use users::Entity as Users;
