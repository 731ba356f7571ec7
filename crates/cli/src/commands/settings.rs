//! `docmind set-secret` and `docmind set-profile`.

use docmind_core::store::keys;

const KNOWN_KEYS: [&str; 3] = [keys::GROQ_API_KEY, keys::TYPESENSE_API_KEY, keys::TYPESENSE_HOST];

pub async fn set_secret(key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    if key.trim().is_empty() {
        return Err("Setting name must not be empty".into());
    }
    if !KNOWN_KEYS.contains(&key) {
        eprintln!("Warning: {key} is not read by DocMind (known: {})", KNOWN_KEYS.join(", "));
    }

    let (_, services) = super::load_services().await?;
    services.store.put_setting(key, value).await?;
    // Never echo the value.
    println!("Stored {key} in the {} store", services.store.name());
    Ok(())
}

pub async fn set_profile(user_id: &str, full_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    if user_id.trim().is_empty() {
        return Err("A user_id is required".into());
    }

    let (_, services) = super::load_services().await?;
    services.store.put_profile(user_id, full_name.trim()).await?;
    println!("Profile for {user_id} set to \"{}\"", full_name.trim());
    Ok(())
}
