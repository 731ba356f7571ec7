//! `docmind init`: write a default config file.

use docmind_config::AppConfig;

pub async fn run(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    }

    if config_path.exists() && !force {
        println!("Config already exists at: {}", config_path.display());
        println!("Edit it manually or re-run with --force.");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Wrote {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. docmind set-secret GROQ_API_KEY <key>");
    println!("  2. docmind set-secret TYPESENSE_API_KEY <key>   (or set vector.backend = \"memory\")");
    println!("  3. docmind ingest paper.pdf --user <you>");
    println!("  4. docmind chat --user <you>");

    Ok(())
}
