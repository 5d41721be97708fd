pub mod enrollment_service;
pub mod maintenance;
pub mod order_service;
pub mod payments;
