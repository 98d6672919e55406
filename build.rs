// build.rs

use std::env;

fn main() -> anyhow::Result<()> {
    // Necessary because of this issue: https://github.com/rust-lang/cargo/issues/9641
    // see also https://github.com/rust-lang/cargo/issues/9554
    #[cfg(feature = "espidf")]
    {
        embuild::build::CfgArgs::output_propagated("ESP_IDF")?;
        embuild::build::LinkArgs::output_propagated("ESP_IDF")?;
    }

    let wifi_ssid = env::var("WIFI_SSID").unwrap_or_else(|_| "internet".into());
    let wifi_pass = env::var("WIFI_PASS").unwrap_or_else(|_| "password".into());
    let api_port = env::var("API_PORT").unwrap_or_else(|_| "80".into());
    let mqtt_url = env::var("MQTT_URL").unwrap_or_else(|_| "mqtt://mqtt.local:1883".into());
    let dashboard_token = env::var("DASHBOARD_TOKEN").unwrap_or_default();

    println!("cargo:rustc-env=WIFI_SSID={wifi_ssid}");
    println!("cargo:rustc-env=WIFI_PASS={wifi_pass}");
    println!("cargo:rustc-env=API_PORT={api_port}");
    println!("cargo:rustc-env=MQTT_URL={mqtt_url}");
    println!("cargo:rustc-env=DASHBOARD_TOKEN={dashboard_token}");
    for var in ["WIFI_SSID", "WIFI_PASS", "API_PORT", "MQTT_URL", "DASHBOARD_TOKEN"] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    Ok(())
}

// EOF
