//! Email service for booking confirmations, show reminders and new-show
//! announcements.

use chrono::{DateTime, Utc};
use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use rust_decimal::Decimal;
use std::path::Path;

use crate::{config::Config, errors::Error};

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
    reply_to: Option<String>,
    frontend_url: String,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            crate::config::EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                // Use SMTP transport
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            crate::config::EmailTransportConfig::File { path } => {
                // Use file transport for development/testing
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                let file_transport = AsyncFileTransport::<Tokio1Executor>::new(emails_dir);
                EmailTransport::File(file_transport)
            }
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
            reply_to: email_config.reply_to.clone(),
            frontend_url: config.frontend_url.clone(),
        })
    }

    /// Sent once a booking has been confirmed paid.
    pub async fn send_booking_confirmation(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        movie_title: &str,
        show_time: &DateTime<Utc>,
        seats: &[String],
        amount: &Decimal,
    ) -> Result<(), Error> {
        let subject = format!("Booking Confirmed: {movie_title}");
        let body = self.create_booking_confirmation_body(to_name, movie_title, show_time, seats, amount);

        self.send_email(to_email, to_name, &subject, &body).await
    }

    /// Sent by the reminder sweep shortly before a booked show starts.
    pub async fn send_show_reminder(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        movie_title: &str,
        show_time: &DateTime<Utc>,
        seats: &[String],
    ) -> Result<(), Error> {
        let subject = format!("Reminder: {movie_title} starts soon");
        let body = self.create_show_reminder_body(to_name, movie_title, show_time, seats);

        self.send_email(to_email, to_name, &subject, &body).await
    }

    /// Sent to every user when an admin schedules shows for a movie.
    pub async fn send_new_show_announcement(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        movie_title: &str,
    ) -> Result<(), Error> {
        let subject = format!("New Show Added: {movie_title}");
        let body = self.create_new_show_body(to_name, movie_title);

        self.send_email(to_email, to_name, &subject, &body).await
    }

    async fn send_email(&self, to_email: &str, to_name: Option<&str>, subject: &str, body: &str) -> Result<(), Error> {
        // Create from mailbox
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;

        // Create to mailbox
        let to = if let Some(name) = to_name {
            format!("{name} <{to_email}>")
        } else {
            to_email.to_string()
        }
        .parse::<Mailbox>()
        .map_err(|e| Error::Internal {
            operation: format!("parse to email: {e}"),
        })?;

        // Build message
        let mut builder = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML);

        if let Some(reply_to) = &self.reply_to {
            let reply_to = reply_to.parse::<Mailbox>().map_err(|e| Error::Internal {
                operation: format!("parse reply-to email: {e}"),
            })?;
            builder = builder.reply_to(reply_to);
        }

        let message = builder.body(body.to_string()).map_err(|e| Error::Internal {
            operation: format!("build email message: {e}"),
        })?;

        // Send based on transport type
        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }

    fn create_booking_confirmation_body(
        &self,
        to_name: Option<&str>,
        movie_title: &str,
        show_time: &DateTime<Utc>,
        seats: &[String],
        amount: &Decimal,
    ) -> String {
        let greeting = greeting(to_name);
        let show_time = format_show_time(show_time);
        let seats = seats.join(", ");

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Booking Confirmed</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Your booking is confirmed</h2>

        <p>{greeting}</p>

        <p>Your payment went through and your seats are locked in. See you at the movies!</p>

        <p><strong>Movie:</strong> {movie_title}</p>
        <p><strong>Showtime:</strong> {show_time}</p>
        <p><strong>Seats:</strong> {seats}</p>
        <p><strong>Amount paid:</strong> {amount}</p>

        <div class="footer">
            <p>This is an automated message, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#
        )
    }

    fn create_show_reminder_body(
        &self,
        to_name: Option<&str>,
        movie_title: &str,
        show_time: &DateTime<Utc>,
        seats: &[String],
    ) -> String {
        let greeting = greeting(to_name);
        let show_time = format_show_time(show_time);
        let seats = seats.join(", ");

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Show Reminder</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>{movie_title} starts soon</h2>

        <p>{greeting}</p>

        <p>A quick reminder about your upcoming show:</p>

        <p><strong>Movie:</strong> {movie_title}</p>
        <p><strong>Showtime:</strong> {show_time}</p>
        <p><strong>Seats:</strong> {seats}</p>

        <div class="footer">
            <p>This is an automated message, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#
        )
    }

    fn create_new_show_body(&self, to_name: Option<&str>, movie_title: &str) -> String {
        let greeting = greeting(to_name);
        let browse_link = format!("{}/movies", self.frontend_url.trim_end_matches('/'));

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>New Show Added</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>New showtimes for {movie_title}</h2>

        <p>{greeting}</p>

        <p>Showtimes for <strong>{movie_title}</strong> just went live. Seats go fast for new releases.</p>

        <p><a href="{browse_link}">Browse showtimes</a></p>

        <div class="footer">
            <p>This is an automated message, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#
        )
    }
}

fn greeting(to_name: Option<&str>) -> String {
    if let Some(name) = to_name {
        format!("Hello {name},")
    } else {
        "Hello,".to_string()
    }
}

fn format_show_time(show_time: &DateTime<Utc>) -> String {
    show_time.format("%A, %B %-d, %Y at %H:%M UTC").to_string()
}
