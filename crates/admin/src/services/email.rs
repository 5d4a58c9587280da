//! Customer notifications sent from the back-office.
//!
//! Uses SMTP via lettre for delivery with Askama HTML and text templates.
//! Callers spawn sends with [`EmailService::spawn`]; a failed send is logged
//! and never fails the request that triggered it.

use std::future::Future;

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use desguace_core::models::order::order_reference;
use desguace_core::{ContactFormType, ContactMessage, Order, OrderStatus, PaymentStatus};

use crate::config::EmailConfig;

/// Presentation of a status in notification emails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusInfo {
    pub title: &'static str,
    pub color: &'static str,
    pub description: &'static str,
    pub next_step: &'static str,
}

/// How an order status is described to the customer.
#[must_use]
pub const fn order_status_info(status: OrderStatus) -> StatusInfo {
    match status {
        OrderStatus::PendienteVerificar => StatusInfo {
            title: "Pendiente de verificar",
            color: "#f59e0b",
            description: "Tu pedido está siendo revisado por nuestro equipo",
            next_step: "Te notificaremos cuando el pedido sea verificado",
        },
        OrderStatus::Verificado => StatusInfo {
            title: "Verificado",
            color: "#3b82f6",
            description: "Tu pedido ha sido verificado y se está preparando",
            next_step: "Procederemos con el embalaje de tus productos",
        },
        OrderStatus::Embalado => StatusInfo {
            title: "Embalado",
            color: "#8b5cf6",
            description: "Tu pedido está embalado y listo para envío",
            next_step: "Se coordinará el envío con la empresa de transporte",
        },
        OrderStatus::Enviado => StatusInfo {
            title: "Enviado",
            color: "#10b981",
            description: "Tu pedido está en camino",
            next_step: "Recibirás tu pedido en la dirección especificada",
        },
        OrderStatus::Incidencia => StatusInfo {
            title: "Incidencia",
            color: "#ef4444",
            description: "Ha surgido una incidencia con tu pedido",
            next_step: "Nuestro equipo se pondrá en contacto contigo",
        },
    }
}

/// How a payment status is described to the customer.
#[must_use]
pub const fn payment_status_info(status: PaymentStatus) -> StatusInfo {
    match status {
        PaymentStatus::Pagado => StatusInfo {
            title: "Pago confirmado",
            color: "#10b981",
            description: "Tu pago ha sido confirmado correctamente",
            next_step: "Tu pedido será procesado inmediatamente",
        },
        PaymentStatus::Pendiente => StatusInfo {
            title: "Pago pendiente",
            color: "#f59e0b",
            description: "Estamos esperando la confirmación de tu pago",
            next_step: "Una vez confirmado el pago, procesaremos tu pedido",
        },
        PaymentStatus::Fallido => StatusInfo {
            title: "Pago fallido",
            color: "#ef4444",
            description: "No hemos podido confirmar tu pago",
            next_step: "Contacta con nosotros para completar el pago",
        },
        PaymentStatus::Reembolsado => StatusInfo {
            title: "Pago reembolsado",
            color: "#6b7280",
            description: "El importe de tu pedido ha sido reembolsado",
            next_step: "El reembolso aparecerá en tu cuenta en unos días",
        },
    }
}

#[derive(Template)]
#[template(path = "email/order_status.html")]
struct OrderStatusHtml<'a> {
    reference: &'a str,
    customer_name: &'a str,
    info: StatusInfo,
    transport_agency: Option<&'a str>,
    expedition_number: Option<&'a str>,
    admin_observations: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/order_status.txt")]
struct OrderStatusText<'a> {
    reference: &'a str,
    customer_name: &'a str,
    info: StatusInfo,
    transport_agency: Option<&'a str>,
    expedition_number: Option<&'a str>,
    admin_observations: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/payment_status.html")]
struct PaymentStatusHtml<'a> {
    reference: &'a str,
    customer_name: &'a str,
    info: StatusInfo,
    total: String,
}

#[derive(Template)]
#[template(path = "email/payment_status.txt")]
struct PaymentStatusText<'a> {
    reference: &'a str,
    customer_name: &'a str,
    info: StatusInfo,
    total: String,
}

#[derive(Template)]
#[template(path = "email/contact_reply.html")]
struct ContactReplyHtml<'a> {
    name: &'a str,
    kind: &'a str,
    subject: Option<&'a str>,
    reply: &'a str,
    original_message: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/contact_reply.txt")]
struct ContactReplyText<'a> {
    name: &'a str,
    kind: &'a str,
    subject: Option<&'a str>,
    reply: &'a str,
    original_message: Option<&'a str>,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for customer notifications.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Run a send in the background, logging any failure.
    pub fn spawn<F>(kind: &'static str, send: F)
    where
        F: Future<Output = Result<(), EmailError>> + Send + 'static,
    {
        tokio::spawn(async move {
            if let Err(e) = send.await {
                tracing::warn!(error = %e, kind, "Notification email failed");
            }
        });
    }

    /// Tell the customer their order moved to a new fulfilment status.
    ///
    /// # Errors
    ///
    /// Returns error if the email fails to render or send.
    pub async fn send_order_status(&self, order: &Order) -> Result<(), EmailError> {
        let reference = order_reference(order.id);
        let info = order_status_info(order.order_status);
        let html = OrderStatusHtml {
            reference: &reference,
            customer_name: &order.customer_name,
            info,
            transport_agency: order.transport_agency.as_deref(),
            expedition_number: order.expedition_number.as_deref(),
            admin_observations: order.admin_observations.as_deref(),
        }
        .render()?;
        let text = OrderStatusText {
            reference: &reference,
            customer_name: &order.customer_name,
            info,
            transport_agency: order.transport_agency.as_deref(),
            expedition_number: order.expedition_number.as_deref(),
            admin_observations: order.admin_observations.as_deref(),
        }
        .render()?;

        let subject = format!("Estado de pedido actualizado: {} - {reference}", info.title);
        self.send_multipart_email(&order.customer_email, &subject, &text, &html)
            .await
    }

    /// Tell the customer their payment status changed.
    ///
    /// # Errors
    ///
    /// Returns error if the email fails to render or send.
    pub async fn send_payment_status(&self, order: &Order) -> Result<(), EmailError> {
        let reference = order_reference(order.id);
        let info = payment_status_info(order.payment_status);
        let total = order.total.to_string();
        let html = PaymentStatusHtml {
            reference: &reference,
            customer_name: &order.customer_name,
            info,
            total: total.clone(),
        }
        .render()?;
        let text = PaymentStatusText {
            reference: &reference,
            customer_name: &order.customer_name,
            info,
            total,
        }
        .render()?;

        let subject = format!("{} - {reference}", info.title);
        self.send_multipart_email(&order.customer_email, &subject, &text, &html)
            .await
    }

    /// Send staff's answer to a contact or valuation form.
    ///
    /// # Errors
    ///
    /// Returns error if the email fails to render or send.
    pub async fn send_contact_reply(
        &self,
        message: &ContactMessage,
        reply: &str,
    ) -> Result<(), EmailError> {
        let kind = match message.form_type {
            ContactFormType::Contact => "consulta",
            ContactFormType::Valuation => "solicitud de tasación",
        };
        let html = ContactReplyHtml {
            name: &message.name,
            kind,
            subject: message.subject.as_deref(),
            reply,
            original_message: message.message.as_deref(),
        }
        .render()?;
        let text = ContactReplyText {
            name: &message.name,
            kind,
            subject: message.subject.as_deref(),
            reply,
            original_message: message.message.as_deref(),
        }
        .render()?;

        let subject = message.subject.as_deref().map_or_else(
            || "Respuesta a tu consulta - Desguace Murcia".to_owned(),
            |s| format!("Re: {s}"),
        );
        self.send_multipart_email(&message.email, &subject, &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_titles_match_labels() {
        for status in OrderStatus::ALL {
            assert_eq!(order_status_info(*status).title, status.label());
        }
    }

    #[test]
    fn test_order_status_text_renders_shipping_details() {
        let text = OrderStatusText {
            reference: "PED-000042",
            customer_name: "Lucía",
            info: order_status_info(OrderStatus::Enviado),
            transport_agency: Some("SEUR"),
            expedition_number: Some("ES123"),
            admin_observations: None,
        }
        .render()
        .unwrap();
        assert!(text.contains("PED-000042"));
        assert!(text.contains("Nuevo estado: Enviado"));
        assert!(text.contains("Empresa de transporte: SEUR"));
        assert!(text.contains("Número de seguimiento: ES123"));
        assert!(!text.contains("Notas adicionales"));
    }

    #[test]
    fn test_contact_reply_html_escapes_reply() {
        let html = ContactReplyHtml {
            name: "Pedro",
            kind: "consulta",
            subject: Some("Motor"),
            reply: "<b>Sí</b> lo tenemos",
            original_message: None,
        }
        .render()
        .unwrap();
        assert!(html.contains("&lt;b&gt;"));
        assert!(html.contains("Motor"));
    }
}
