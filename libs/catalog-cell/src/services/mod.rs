pub mod coupons;
pub mod packages;
pub mod therapies;

pub use coupons::CouponService;
pub use packages::PackageService;
pub use therapies::TherapyService;
