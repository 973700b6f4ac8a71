use std::env;
use std::fs;
use std::path::Path;

// Claves que AppConfig::from_env lee con option_env!
const CONFIG_KEYS: [&str; 8] = [
    "API_URL",
    "ENVIRONMENT",
    "ENABLE_LOGGING",
    "RETRY_ATTEMPTS",
    "RETRY_BASE_DELAY_MS",
    "SEARCH_DEBOUNCE_MS",
    "PAGE_SIZE",
    "PROCESOS_PAGE_SIZE",
];

fn main() {
    for key in CONFIG_KEYS {
        println!("cargo:rerun-if-env-changed={}", key);
    }
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.env");

    let env_file = Path::new(".env");
    let Ok(contents) = fs::read_to_string(env_file) else {
        println!("cargo:warning=Sin archivo .env: se usan los valores por defecto (ver .env.example)");
        return;
    };

    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if !CONFIG_KEYS.contains(&key) {
            println!("cargo:warning=Clave desconocida en .env: {}", key);
            continue;
        }
        // Una variable del entorno de compilación tiene prioridad sobre .env
        if env::var(key).is_err() {
            let value = value.trim().trim_matches('"');
            println!("cargo:rustc-env={}={}", key, value);
        }
    }
}
