//! Gateway response codes mapped to customer-facing messages.

/// Message when the gateway returned no code at all.
pub const GENERIC_FAILURE: &str = "Error en el procesamiento del pago";

/// Message for codes not in the table.
pub const UNKNOWN_FAILURE: &str = "Error no especificado en el procesamiento del pago";

/// Suggestion for codes without a specific one.
pub const DEFAULT_SOLUTION: &str = "Intenta realizar el pago nuevamente o contacta con nosotros.";

const USER_CANCELLED: &str = "9915";

const MESSAGES: &[(&str, &str)] = &[
    ("101", "Tarjeta caducada"),
    (
        "102",
        "Tarjeta en lista de excepción transitoria o bajo sospecha de fraude",
    ),
    ("106", "Número de intentos de PIN excedido"),
    ("125", "Tarjeta no efectiva"),
    ("129", "Código de seguridad (CVV) incorrecto"),
    ("180", "Tarjeta no válida"),
    ("184", "Error en la autenticación del titular"),
    ("190", "Denegación del emisor sin especificar motivo"),
    ("201", "Tarjeta caducada"),
    (
        "202",
        "Tarjeta en lista de excepción transitoria o bajo sospecha de fraude",
    ),
    ("912", "Emisor no disponible"),
    ("913", "Pedido repetido"),
    ("944", "Sesión incorrecta"),
    ("950", "Operación de devolución no permitida"),
    (USER_CANCELLED, "A petición del usuario se ha cancelado el pago"),
];

const SOLUTIONS: &[(&str, &str)] = &[
    ("101", "Verifica la fecha de caducidad de tu tarjeta o utiliza otra tarjeta."),
    ("102", "Contacta con tu banco para verificar el estado de tu tarjeta."),
    ("106", "Espera unos minutos antes de intentarlo de nuevo o contacta con tu banco."),
    ("125", "Tu tarjeta no está activa. Contacta con tu banco."),
    ("129", "Verifica el código de seguridad (CVV) de tu tarjeta."),
    ("180", "Verifica los datos de tu tarjeta o utiliza otra tarjeta."),
    ("184", "Completa correctamente la autenticación de tu banco."),
    ("190", "Contacta con tu banco para conocer el motivo de la denegación."),
    ("912", "El banco emisor no está disponible. Inténtalo más tarde."),
    (USER_CANCELLED, "Puedes volver a intentar el pago cuando quieras."),
];

fn normalize(code: &str) -> &str {
    let trimmed = code.trim().trim_start_matches('0');
    if trimmed.is_empty() && !code.trim().is_empty() {
        "0"
    } else {
        trimmed
    }
}

fn lookup(table: &'static [(&str, &str)], code: &str) -> Option<&'static str> {
    let code = normalize(code);
    table.iter().find(|(c, _)| *c == code).map(|(_, m)| *m)
}

/// Customer-facing message for a gateway code.
#[must_use]
pub fn failure_message(code: Option<&str>) -> &'static str {
    match code.map(str::trim).filter(|c| !c.is_empty()) {
        None => GENERIC_FAILURE,
        Some(code) => lookup(MESSAGES, code).unwrap_or(UNKNOWN_FAILURE),
    }
}

/// Suggested next step for a gateway code.
#[must_use]
pub fn failure_solution(code: Option<&str>) -> &'static str {
    code.and_then(|c| lookup(SOLUTIONS, c))
        .unwrap_or(DEFAULT_SOLUTION)
}

/// Whether the customer cancelled the payment themselves. Cancellation is
/// not an error; the client returns to checkout.
#[must_use]
pub fn is_user_cancellation(code: Option<&str>) -> bool {
    code.is_some_and(|c| normalize(c) == USER_CANCELLED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(failure_message(Some("101")), "Tarjeta caducada");
        assert_eq!(
            failure_message(Some("129")),
            "Código de seguridad (CVV) incorrecto"
        );
        assert_eq!(failure_message(Some("913")), "Pedido repetido");
        assert_eq!(failure_message(Some("202")), failure_message(Some("102")));
    }

    #[test]
    fn test_leading_zeros_are_ignored() {
        assert_eq!(failure_message(Some("0180")), "Tarjeta no válida");
        assert_eq!(failure_message(Some(" 0912 ")), "Emisor no disponible");
    }

    #[test]
    fn test_unknown_and_missing_codes() {
        assert_eq!(failure_message(Some("7777")), UNKNOWN_FAILURE);
        assert_eq!(failure_message(None), GENERIC_FAILURE);
        assert_eq!(failure_message(Some("  ")), GENERIC_FAILURE);
    }

    #[test]
    fn test_solutions() {
        assert_eq!(
            failure_solution(Some("129")),
            "Verifica el código de seguridad (CVV) de tu tarjeta."
        );
        assert_eq!(failure_solution(Some("913")), DEFAULT_SOLUTION);
        assert_eq!(failure_solution(None), DEFAULT_SOLUTION);
    }

    #[test]
    fn test_user_cancellation() {
        assert!(is_user_cancellation(Some("9915")));
        assert!(is_user_cancellation(Some("09915")));
        assert!(!is_user_cancellation(Some("101")));
        assert!(!is_user_cancellation(None));
    }
}
