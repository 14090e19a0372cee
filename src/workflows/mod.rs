pub mod authorizations;
