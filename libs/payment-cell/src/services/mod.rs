pub mod payments;

pub use payments::PaymentService;
