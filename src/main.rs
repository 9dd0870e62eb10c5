// most helpers only have callers in the ESP-IDF services
#![cfg_attr(not(target_os = "espidf"), allow(dead_code))]

mod config;
mod dto;
mod error;
mod helper;
#[cfg(target_os = "espidf")]
mod service;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    service::orchestrator_service::orchestrate()
}

/// Off target there is no radio or GPIO: check the embedded configuration.
#[cfg(not(target_os = "espidf"))]
fn main() -> std::process::ExitCode {
    use config::config::DeviceConfig;

    match DeviceConfig::embedded() {
        Ok(config) => {
            println!("{:#?}", config);
            std::process::ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("invalid configuration: {}", e);
            std::process::ExitCode::FAILURE
        }
    }
}
