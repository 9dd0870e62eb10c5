pub mod backoff_helper;
pub mod date_helper;
pub mod dht_helper;
pub mod mqtt_helper;
#[cfg(target_os = "espidf")]
pub mod orchestrator_helper;
