// Startup hook: install the branded HTML templates into the stored
// auth-email settings document.
use chrono::{Datelike, Utc};
use rusqlite::{params, OptionalExtension};
use serde_json::{json, Value};
use std::path::Path;

use crate::config::EmailConfig;
use crate::db::now_timestamp;
use crate::error::AppResult;
use crate::state::DbPool;

pub const SETTINGS_KEY: &str = "email";
pub const CONFIRMATION_FILE: &str = "registration-confirmation.html";
pub const RESET_FILE: &str = "reset-password.html";
pub const CONFIRMATION_SUBJECT: &str = "Welcome to BabyVision — Please verify your email";
pub const RESET_SUBJECT: &str = "Reset Your Password — BabyVision";

/// Settings document used when nothing has been stored yet.
pub fn default_settings() -> Value {
    let template = |object: &str| {
        json!({
            "options": {
                "from": "",
                "response_email": "",
                "object": object,
                "message": ""
            }
        })
    };
    json!({
        "email_confirmation": template("Account confirmation"),
        "reset_password": template("Reset password")
    })
}

pub fn load_settings(pool: &DbPool) -> AppResult<Value> {
    let conn = pool.get()?;
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM plugin_settings WHERE key = ?1",
            params![SETTINGS_KEY],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(default_settings()),
    }
}

pub fn save_settings(pool: &DbPool, settings: &Value) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO plugin_settings (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![SETTINGS_KEY, serde_json::to_string(settings)?, now_timestamp()],
    )?;
    Ok(())
}

/// Rewrite `{{placeholder}}` markers of the confirmation template into the
/// auth layer's token syntax. Links known at startup are resolved in place.
pub fn convert_confirmation(html: &str, config: &EmailConfig, year: i32) -> String {
    html.replace("{{firstName}}", "<%= USER.username %>")
        .replace("{{email}}", "<%= USER.email %>")
        .replace(
            "{{verificationLink}}",
            "<%= URL %>?confirmation=<%= USER_CONFIRMATION_TOKEN %>",
        )
        .replace("{{year}}", &year.to_string())
        .replace("{{appStoreLink}}", &config.app_store_link)
        .replace("{{playStoreLink}}", &config.play_store_link)
        .replace("{{unsubscribeLink}}", "#")
}

pub fn convert_reset(html: &str, year: i32) -> String {
    html.replace("{{resetLink}}", "<%= URL %>?code=<%= TOKEN %>")
        .replace("{{year}}", &year.to_string())
}

fn read_template(dir: &Path, file: &str) -> Option<String> {
    let path = dir.join(file);
    match std::fs::read_to_string(&path) {
        Ok(html) => {
            tracing::info!(path = %path.display(), "Loaded email template");
            Some(html)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Email template not found");
            None
        }
    }
}

/// Patch one template section. Returns whether anything changed.
fn patch_section(
    settings: &mut Value,
    section: &str,
    html: Option<&str>,
    subject: &str,
    config: &EmailConfig,
) -> bool {
    let Some(options) = settings
        .get_mut(section)
        .and_then(|s| s.get_mut("options"))
        .and_then(Value::as_object_mut)
    else {
        return false;
    };
    let mut changed = false;

    let from = options.get("from").and_then(Value::as_str).unwrap_or("");
    if from.is_empty() || from.contains("strapi.io") {
        options.insert("from".into(), json!(config.default_from));
        options.insert("response_email".into(), json!(config.default_reply_to));
        changed = true;
    }

    if let Some(html) = html.filter(|h| !h.is_empty()) {
        if options.get("message").and_then(Value::as_str) != Some(html) {
            options.insert("message".into(), json!(html));
            options.insert("object".into(), json!(subject));
            tracing::info!(section, "Updated email template");
            changed = true;
        }
    }

    changed
}

/// Load, patch and persist the settings. Returns whether a write happened.
pub fn sync_email_settings(pool: &DbPool, config: &EmailConfig) -> AppResult<bool> {
    let mut settings = load_settings(pool)?;
    let year = Utc::now().year();

    let confirmation = read_template(&config.templates_dir, CONFIRMATION_FILE)
        .map(|html| convert_confirmation(&html, config, year));
    let reset = read_template(&config.templates_dir, RESET_FILE)
        .map(|html| convert_reset(&html, year));

    let mut changed = patch_section(
        &mut settings,
        "email_confirmation",
        confirmation.as_deref(),
        CONFIRMATION_SUBJECT,
        config,
    );
    changed |= patch_section(
        &mut settings,
        "reset_password",
        reset.as_deref(),
        RESET_SUBJECT,
        config,
    );

    if changed {
        save_settings(pool, &settings)?;
        tracing::info!("Email settings and templates updated");
    }
    Ok(changed)
}

/// Run the hook at startup. Failures are logged and never stop the server.
pub fn run(pool: &DbPool, config: &EmailConfig) {
    if let Err(e) = sync_email_settings(pool, config) {
        tracing::error!(error = %e, "Failed to update email settings");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_pool;
    use tempfile::TempDir;

    fn config_with_templates() -> (EmailConfig, TempDir) {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIRMATION_FILE),
            "<p>Hi {{firstName}} ({{email}})</p><a href=\"{{verificationLink}}\">go</a>\
             <a href=\"{{appStoreLink}}\">ios</a><a href=\"{{unsubscribeLink}}\">u</a> {{year}}",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(RESET_FILE),
            "<a href=\"{{resetLink}}\">reset</a> {{year}}",
        )
        .unwrap();
        let config = EmailConfig {
            templates_dir: dir.path().to_path_buf(),
            default_from: "hello@babyvision.app".into(),
            default_reply_to: "support@babyvision.app".into(),
            ..EmailConfig::default()
        };
        (config, dir)
    }

    #[test]
    fn confirmation_placeholders_are_converted() {
        let config = EmailConfig::default();
        let out = convert_confirmation(
            "{{firstName}} {{email}} {{verificationLink}} {{year}} {{playStoreLink}} {{unsubscribeLink}}",
            &config,
            2026,
        );
        assert_eq!(
            out,
            format!(
                "<%= USER.username %> <%= USER.email %> <%= URL %>?confirmation=<%= USER_CONFIRMATION_TOKEN %> 2026 {} #",
                config.play_store_link
            )
        );
        assert_eq!(
            convert_reset("{{resetLink}} / {{year}}", 2026),
            "<%= URL %>?code=<%= TOKEN %> / 2026"
        );
    }

    #[test]
    fn first_run_installs_templates_and_senders() {
        let (pool, _db) = test_pool();
        let (config, _dir) = config_with_templates();

        assert!(sync_email_settings(&pool, &config).unwrap());

        let settings = load_settings(&pool).unwrap();
        let confirm = &settings["email_confirmation"]["options"];
        assert_eq!(confirm["from"], "hello@babyvision.app");
        assert_eq!(confirm["response_email"], "support@babyvision.app");
        assert_eq!(confirm["object"], CONFIRMATION_SUBJECT);
        assert!(confirm["message"]
            .as_str()
            .unwrap()
            .contains("<%= USER.username %>"));

        let reset = &settings["reset_password"]["options"];
        assert_eq!(reset["object"], RESET_SUBJECT);
        assert!(reset["message"]
            .as_str()
            .unwrap()
            .contains("<%= URL %>?code=<%= TOKEN %>"));
    }

    #[test]
    fn second_run_writes_nothing() {
        let (pool, _db) = test_pool();
        let (config, _dir) = config_with_templates();

        assert!(sync_email_settings(&pool, &config).unwrap());
        let stamp = |pool: &DbPool| -> String {
            pool.get()
                .unwrap()
                .query_row(
                    "SELECT updated_at FROM plugin_settings WHERE key = 'email'",
                    [],
                    |row| row.get(0),
                )
                .unwrap()
        };
        let before = stamp(&pool);

        assert!(!sync_email_settings(&pool, &config).unwrap());
        assert_eq!(stamp(&pool), before);
    }

    #[test]
    fn custom_sender_is_kept_and_strapi_sender_replaced() {
        let (pool, _db) = test_pool();
        let (config, _dir) = config_with_templates();
        let mut settings = default_settings();
        settings["email_confirmation"]["options"]["from"] = json!("team@custom.example");
        settings["reset_password"]["options"]["from"] = json!("no-reply@strapi.io");
        settings["reset_password"]["extra"] = json!("kept");
        save_settings(&pool, &settings).unwrap();

        sync_email_settings(&pool, &config).unwrap();
        let settings = load_settings(&pool).unwrap();
        assert_eq!(
            settings["email_confirmation"]["options"]["from"],
            "team@custom.example"
        );
        assert_eq!(
            settings["reset_password"]["options"]["from"],
            "hello@babyvision.app"
        );
        assert_eq!(settings["reset_password"]["extra"], "kept");
    }

    #[test]
    fn missing_templates_only_fix_senders() {
        let (pool, _db) = test_pool();
        let dir = TempDir::new().unwrap();
        let config = EmailConfig {
            templates_dir: dir.path().join("absent"),
            ..EmailConfig::default()
        };

        assert!(sync_email_settings(&pool, &config).unwrap());
        let settings = load_settings(&pool).unwrap();
        assert_eq!(settings["email_confirmation"]["options"]["message"], "");
        assert_eq!(
            settings["email_confirmation"]["options"]["from"],
            "onboarding@resend.dev"
        );
        assert!(!sync_email_settings(&pool, &config).unwrap());
    }

    #[test]
    fn sections_without_options_are_left_alone() {
        let (pool, _db) = test_pool();
        let (config, _dir) = config_with_templates();
        save_settings(&pool, &json!({ "email_confirmation": {} })).unwrap();

        assert!(!sync_email_settings(&pool, &config).unwrap());
        assert_eq!(load_settings(&pool).unwrap(), json!({ "email_confirmation": {} }));
    }
}
