pub mod clock_service;
pub mod mqtt_service;
pub mod orchestrator_service;
pub mod sensor_service;
pub mod wifi_service;
