use serde_json::json;

use crate::auth::{allowed_platforms, generate_jwt, Claims, Platform};
use crate::cli::{utils::output_success, OutputFormat};
use crate::config::config;

pub fn handle(
    user: i64,
    platform: &str,
    user_type: i64,
    username: &str,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let platform = Platform::parse(platform)
        .ok_or_else(|| anyhow::anyhow!("unknown platform '{}', expected device or client", platform))?;
    if !allowed_platforms(user_type).contains(&platform) {
        anyhow::bail!("user type {} may not log in on the {} platform", user_type, platform);
    }

    let config = config();
    let claims = Claims::new(user, username, user_type, config.security.jwt_expiry_hours);
    let token = generate_jwt(&claims, config.jwt_secret_for(platform))?;

    match output_format {
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
        OutputFormat::Json => output_success(
            &output_format,
            "Token generated",
            Some(json!({ "token": token, "platform": platform, "expires": claims.exp })),
        ),
    }
}
