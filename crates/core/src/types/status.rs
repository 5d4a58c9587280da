//! Status enums for orders, payments, users, CMS entities and imports.
//!
//! Every enum round-trips through the exact lowercase string stored in the
//! database and sent over the wire, via `Display`/`FromStr` and serde.

/// Error returned when a string is not a known variant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseStatusError {
    /// Name of the enum being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $pg:literal, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize,
        )]
        #[cfg_attr(feature = "postgres", derive(sqlx::Type))]
        #[cfg_attr(feature = "postgres", sqlx(type_name = $pg, rename_all = "snake_case"))]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The wire/database representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::types::ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    _ => Err($crate::types::ParseStatusError {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

pub(crate) use wire_enum;

wire_enum! {
    /// Payment state of an order.
    PaymentStatus, "payment_status", "payment status" {
        /// Awaiting payment or manual confirmation.
        Pendiente => "pendiente",
        /// Paid; purchased parts are withdrawn from sale.
        Pagado => "pagado",
        /// Gateway reported a failure.
        Fallido => "fallido",
        /// Refunded after payment.
        Reembolsado => "reembolsado",
    }
}

impl PaymentStatus {
    /// Statuses staff may set by hand from the back-office.
    #[must_use]
    pub const fn is_admin_settable(&self) -> bool {
        matches!(self, Self::Pendiente | Self::Pagado)
    }

    /// Customer-facing label used in notifications.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pendiente => "Pendiente",
            Self::Pagado => "Pagado",
            Self::Fallido => "Fallido",
            Self::Reembolsado => "Reembolsado",
        }
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        Self::Pendiente
    }
}

wire_enum! {
    /// Fulfilment state of an order.
    OrderStatus, "order_status", "order status" {
        /// Newly placed; staff must check stock and payment.
        PendienteVerificar => "pendiente_verificar",
        Verificado => "verificado",
        Embalado => "embalado",
        Enviado => "enviado",
        /// Something went wrong (damaged, missing, returned).
        Incidencia => "incidencia",
    }
}

impl OrderStatus {
    /// Customer-facing label used in notifications.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::PendienteVerificar => "Pendiente de verificar",
            Self::Verificado => "Verificado",
            Self::Embalado => "Embalado",
            Self::Enviado => "Enviado",
            Self::Incidencia => "Incidencia",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::PendienteVerificar
    }
}

wire_enum! {
    /// User role. Ordered by privilege.
    UserRole, "user_role", "user role" {
        Customer => "customer",
        /// Staff with back-office access except user management and backups.
        Manager => "manager",
        /// Full access.
        Admin => "admin",
    }
}

impl UserRole {
    const fn rank(self) -> u8 {
        match self {
            Self::Customer => 0,
            Self::Manager => 1,
            Self::Admin => 2,
        }
    }

    /// Whether this role grants at least the privileges of `other`.
    #[must_use]
    pub const fn at_least(self, other: Self) -> bool {
        self.rank() >= other.rank()
    }

    /// Whether this role may sign in to the back-office.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        self.at_least(Self::Manager)
    }
}

wire_enum! {
    /// Which public form produced a contact message.
    ContactFormType, "contact_form_type", "contact form type" {
        Contact => "contact",
        /// "Sell us your vehicle" valuation request.
        Valuation => "valuation",
    }
}

wire_enum! {
    /// Inbox state of a contact message.
    ContactStatus, "contact_status", "contact status" {
        Unread => "unread",
        Read => "read",
        Replied => "replied",
    }
}

wire_enum! {
    /// When a pop-up is shown.
    PopupTrigger, "popup_trigger", "popup trigger" {
        Immediate => "immediate",
        /// After `trigger_value` seconds.
        Delay => "delay",
        /// After scrolling `trigger_value` percent.
        Scroll => "scroll",
        /// On exit intent.
        Exit => "exit",
    }
}

wire_enum! {
    /// Visual style of a pop-up.
    PopupType, "popup_type", "popup type" {
        Info => "info",
        Promotion => "promotion",
        Warning => "warning",
        Announcement => "announcement",
    }
}

wire_enum! {
    /// How often a visitor may see the same pop-up.
    DisplayFrequency, "display_frequency", "display frequency" {
        Always => "always",
        Once => "once",
        Daily => "daily",
        Weekly => "weekly",
    }
}

wire_enum! {
    /// What the pop-up button does.
    ButtonAction, "button_action", "button action" {
        Close => "close",
        Redirect => "redirect",
    }
}

wire_enum! {
    /// Interaction recorded against a pop-up.
    PopupAction, "popup_action", "popup action" {
        Viewed => "viewed",
        Closed => "closed",
        Clicked => "clicked",
        Ignored => "ignored",
    }
}

wire_enum! {
    /// What an import run fetches from Metasync.
    ImportType, "import_type", "import type" {
        Vehicles => "vehicles",
        Parts => "parts",
        /// Vehicles first, then parts.
        All => "all",
    }
}

wire_enum! {
    /// Lifecycle of an import run.
    ImportStatus, "import_status", "import status" {
        Pending => "pending",
        Running => "running",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl ImportStatus {
    /// Whether the run has stopped for good.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_wire_strings() {
        for status in OrderStatus::ALL {
            let parsed: OrderStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, *status);
        }
        assert_eq!(
            serde_json::to_string(&OrderStatus::PendienteVerificar).unwrap(),
            "\"pendiente_verificar\""
        );
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = "cancelado".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.kind, "order status");
        assert_eq!(err.value, "cancelado");
    }

    #[test]
    fn test_payment_status_admin_settable() {
        assert!(PaymentStatus::Pendiente.is_admin_settable());
        assert!(PaymentStatus::Pagado.is_admin_settable());
        assert!(!PaymentStatus::Fallido.is_admin_settable());
        assert!(!PaymentStatus::Reembolsado.is_admin_settable());
    }

    #[test]
    fn test_role_hierarchy() {
        assert!(UserRole::Admin.at_least(UserRole::Manager));
        assert!(UserRole::Manager.at_least(UserRole::Manager));
        assert!(!UserRole::Customer.at_least(UserRole::Manager));
        assert!(UserRole::Manager.is_staff());
        assert!(!UserRole::Customer.is_staff());
    }

    #[test]
    fn test_order_status_labels() {
        assert_eq!(
            OrderStatus::PendienteVerificar.label(),
            "Pendiente de verificar"
        );
        assert_eq!(OrderStatus::Enviado.label(), "Enviado");
    }

    #[test]
    fn test_import_status_finished() {
        assert!(ImportStatus::Completed.is_finished());
        assert!(!ImportStatus::Running.is_finished());
    }
}
