//! Outbound templated email.
//!
//! Sends are fire-and-forget: [`dispatch`] spawns the send and only logs a
//! failure. The state change that triggered the mail is never undone.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use pageant_core::{Account, PaymentStatus};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const BRAND: &str = "Global Heritage Pageant";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Plain-text fallback
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Posts messages as JSON to an HTTP mail relay
pub struct HttpMailRelay {
    client: reqwest::Client,
    url: String,
    from: String,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

impl HttpMailRelay {
    pub fn new(url: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            from,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailRelay {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        self.client
            .post(&self.url)
            .json(&RelayPayload {
                from: &self.from,
                to: &message.to,
                subject: &message.subject,
                html: &message.html,
                text: &message.text,
            })
            .send()
            .await?
            .error_for_status()?;

        debug!(to = %message.to, subject = %message.subject, "Mail relayed");
        Ok(())
    }
}

/// Logs messages instead of sending them
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        info!(to = %message.to, subject = %message.subject, "Mail (not sent, no relay configured)");
        Ok(())
    }
}

/// Send in the background; failures are logged only
pub fn dispatch(mailer: Arc<dyn Mailer>, message: MailMessage) {
    tokio::spawn(async move {
        if let Err(e) = mailer.send(&message).await {
            warn!(to = %message.to, subject = %message.subject, error = %e, "Failed to send mail");
        }
    });
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(content: &str, now: DateTime<Utc>) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{BRAND}</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; background-color: #f4f4f4;">
<div style="max-width: 600px; margin: 20px auto; padding: 20px; background-color: #ffffff; border-radius: 8px;">
{content}
<div style="text-align: center; padding-top: 20px; border-top: 2px solid #f0f0f0; color: #666; font-size: 12px;">
<p>&copy; {year} {BRAND}. All rights reserved.</p>
</div>
</div>
</body>
</html>"#,
        year = now.year()
    )
}

pub fn payment_subject(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "Payment Pending - Global Heritage Pageant Registration",
        PaymentStatus::Processing => "Payment Processing - Global Heritage Pageant",
        PaymentStatus::Approved => "Welcome to Global Heritage Pageant - Payment Approved!",
        PaymentStatus::Rejected => "Payment Status Update - Global Heritage Pageant",
    }
}

/// Notification for a payment status change
pub fn payment_status_email(account: &Account, status: PaymentStatus, now: DateTime<Utc>) -> MailMessage {
    let name = escape(&account.name);
    let payment_id = escape(account.payment.payment_id.as_deref().unwrap_or("-"));
    let amount = format!("{:.2}", account.payment.amount);

    let body = match status {
        PaymentStatus::Pending => format!(
            "<h2>Payment Pending</h2><p>Dear {name},</p>\
             <p>Your registration for {BRAND} requires payment to be completed.</p>\
             <ul><li>Amount: ${amount}</li><li>Reference ID: {payment_id}</li></ul>"
        ),
        PaymentStatus::Processing => format!(
            "<h2>Payment Processing</h2><p>Dear {name},</p>\
             <p>We have received your payment submission and it is currently being processed.</p>\
             <ul><li>Amount: ${amount}</li><li>Payment ID: {payment_id}</li>\
             <li>Submission Date: {date}</li></ul>\
             <p>We will notify you once your payment has been approved.</p>",
            date = now.format("%Y-%m-%d")
        ),
        PaymentStatus::Approved => format!(
            "<h2>Payment Approved!</h2><p>Dear {name},</p>\
             <p>Congratulations! Your payment has been approved.</p>\
             <ul><li>Amount: ${amount}</li><li>Payment ID: {payment_id}</li></ul>\
             <p>You can now complete your competition registration.</p>"
        ),
        PaymentStatus::Rejected => {
            let notes = account
                .payment
                .notes
                .as_deref()
                .map(|n| format!("<p>Reason: {}</p>", escape(n)))
                .unwrap_or_default();
            format!(
                "<h2>Payment Status Update</h2><p>Dear {name},</p>\
                 <p>Unfortunately we could not approve your payment.</p>{notes}\
                 <ul><li>Payment ID: {payment_id}</li></ul>"
            )
        }
    };

    MailMessage {
        to: account.email.clone(),
        subject: payment_subject(status).to_string(),
        html: layout(&body, now),
        text: format!("Payment status: {status}"),
    }
}

/// Confirmation of a completed competition registration
pub fn registration_email(account: &Account, now: DateTime<Utc>) -> MailMessage {
    let category = account
        .competition_registration
        .category
        .as_deref()
        .unwrap_or("-");
    let body = format!(
        "<h2>Competition Registration Confirmed</h2><p>Dear {name},</p>\
         <p>Your registration for {BRAND} is complete.</p>\
         <ul><li>Category: {category}</li><li>Registration Date: {date}</li></ul>",
        name = escape(&account.name),
        category = escape(category),
        date = now.format("%Y-%m-%d"),
    );

    MailMessage {
        to: account.email.clone(),
        subject: "Competition Registration Confirmed - Global Heritage Pageant".to_string(),
        html: layout(&body, now),
        text: "Your competition registration has been confirmed".to_string(),
    }
}
