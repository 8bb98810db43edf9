pub mod group;
pub mod modem;
pub mod sim;
pub mod status;
pub mod swap;
