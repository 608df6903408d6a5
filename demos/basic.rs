use std::path::Path;

use tracing_subscriber::EnvFilter;

fn main() -> Result<(), confg::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");

    confg::template_function("hostname", |_| Ok("demo-host".to_owned()));

    // CONFG_DATABASE__PORT=6543 overrides the file's port, keeping the host.
    let config = confg::configure("development", &root, |config| {
        config.load_yaml("app")?;
        config.load_key("servers")?;
        config.load_env()
    })?;

    let config = config.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    println!("confg {}", confg::VERSION);
    println!("name: {:?}", config.fetch("name")?);
    println!("database: {:?}", config.fetch("database")?);
    println!("first server: {:?}", config["servers"].as_sequence().and_then(|s| s.first()));
    println!(
        "{}",
        serde_yaml::to_string(&config.to_h()).unwrap_or_default()
    );

    Ok(())
}
