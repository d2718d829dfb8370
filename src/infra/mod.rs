// Adapters implementing the ports in `crate::app::ports`
pub mod http_client;
pub mod next_data;
