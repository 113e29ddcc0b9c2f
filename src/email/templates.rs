use askama::Template;
use chrono::{Datelike, Utc};

use crate::config::EmailConfig;
use crate::email::provider::EmailMessage;

pub const DEFAULT_FIRST_NAME: &str = "Parent";

#[derive(Template)]
#[template(path = "email/registration.html")]
struct RegistrationHtml<'a> {
    first_name: &'a str,
    email: &'a str,
    verification_link: &'a str,
    app_store_link: &'a str,
    play_store_link: &'a str,
    unsubscribe_link: &'a str,
    year: i32,
}

#[derive(Template)]
#[template(path = "email/registration.txt")]
struct RegistrationText<'a> {
    first_name: &'a str,
    email: &'a str,
    verification_link: &'a str,
    app_store_link: &'a str,
    play_store_link: &'a str,
    unsubscribe_link: &'a str,
    year: i32,
}

#[derive(Template)]
#[template(path = "email/test.html")]
struct TestEmailHtml {
    sent_at: String,
}

/// Fields a caller supplies for the registration email.
#[derive(Debug, Clone, Default)]
pub struct Registration<'a> {
    pub to: &'a str,
    pub first_name: Option<&'a str>,
    pub verification_link: &'a str,
    pub unsubscribe_link: Option<&'a str>,
}

pub fn registration_email(
    config: &EmailConfig,
    reg: &Registration<'_>,
) -> Result<EmailMessage, askama::Error> {
    let first_name = reg
        .first_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_FIRST_NAME);
    let unsubscribe_link = reg.unsubscribe_link.unwrap_or("#");
    let year = Utc::now().year();

    let html = RegistrationHtml {
        first_name,
        email: reg.to,
        verification_link: reg.verification_link,
        app_store_link: &config.app_store_link,
        play_store_link: &config.play_store_link,
        unsubscribe_link,
        year,
    }
    .render()?;
    let text = RegistrationText {
        first_name,
        email: reg.to,
        verification_link: reg.verification_link,
        app_store_link: &config.app_store_link,
        play_store_link: &config.play_store_link,
        unsubscribe_link,
        year,
    }
    .render()?;

    Ok(EmailMessage {
        to: reg.to.to_string(),
        subject: format!(
            "Welcome to BabyVision, {} — Please verify your email",
            first_name
        ),
        html,
        text: Some(text),
        from: None,
        reply_to: None,
    })
}

pub fn test_email(to: &str) -> Result<EmailMessage, askama::Error> {
    let html = TestEmailHtml {
        sent_at: crate::db::now_timestamp(),
    }
    .render()?;

    Ok(EmailMessage {
        to: to.to_string(),
        subject: "BabyVision Email Test ✅".to_string(),
        html,
        text: Some("BabyVision email configuration is working correctly!".to_string()),
        from: None,
        reply_to: None,
    })
}
