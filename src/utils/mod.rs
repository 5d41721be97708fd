pub mod ids;
pub mod jwt;
pub mod password;
