use std::{env, error::Error, fs, path::Path};

const CONFIG_FILE: &str = "cfg.toml";
const CONFIG_TEMPLATE: &str = "cfg.example.toml";

fn main() -> Result<(), Box<dyn Error>> {
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }

    println!("cargo:rerun-if-env-changed=SENSOR_CONFIG_PATH");
    println!("cargo:rerun-if-changed={}", CONFIG_FILE);
    println!("cargo:rerun-if-changed={}", CONFIG_TEMPLATE);

    let source = match env::var("SENSOR_CONFIG_PATH") {
        Ok(path) => path,
        Err(_) if Path::new(CONFIG_FILE).exists() => CONFIG_FILE.to_owned(),
        Err(_) => {
            println!(
                "cargo:warning={} not found, embedding {}",
                CONFIG_FILE, CONFIG_TEMPLATE
            );
            CONFIG_TEMPLATE.to_owned()
        }
    };
    println!("cargo:rerun-if-changed={}", source);

    // parsing and validation happen in the firmware, here we only embed the file
    let contents = fs::read_to_string(&source)?;
    let out_dir = env::var("OUT_DIR")?;
    fs::write(Path::new(&out_dir).join("cfg.toml"), contents)?;
    Ok(())
}
