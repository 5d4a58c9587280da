//! Turns raw Metasync JSON into catalog rows.
//!
//! The API is loose about field names and types: the same field may arrive
//! under several spellings, as a number or as a string, or not at all.
//! Everything here is pure so the rules can be tested without a server.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

use desguace_core::Price;

/// Brand given to vehicles the API sends without one.
pub const UNKNOWN_BRAND: &str = "Desconocida";
/// Model given to vehicles the API sends without one.
pub const UNKNOWN_MODEL: &str = "Desconocido";
/// Family given to parts without one.
pub const DEFAULT_FAMILY: &str = "General";
/// Compatibility range assumed when the API omits it.
pub const DEFAULT_YEAR_FROM: i32 = 2000;
pub const DEFAULT_YEAR_TO: i32 = 2050;

/// `situacion` values that take a part off sale.
const WITHDRAWN_SITUATIONS: [&str; 3] = ["vendida", "baja", "eliminada"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("vehículo sin idLocal")]
    MissingVehicleId,
    #[error("pieza sin refLocal")]
    MissingPartRef,
}

/// A vehicle ready for upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleRecord {
    pub id_local: i64,
    pub id_empresa: i32,
    pub marca: String,
    pub modelo: String,
    pub version: Option<String>,
    pub anyo: Option<i32>,
    pub descripcion: Option<String>,
    pub combustible: Option<String>,
    pub bastidor: Option<String>,
    pub matricula: Option<String>,
    pub color: Option<String>,
    pub kilometraje: Option<i32>,
    pub potencia: Option<i32>,
    pub puertas: Option<i32>,
    pub imagenes: Vec<String>,
}

impl VehicleRecord {
    #[must_use]
    pub fn summary(&self) -> VehicleSummary {
        VehicleSummary {
            id_local: self.id_local,
            marca: self.marca.clone(),
            modelo: self.modelo.clone(),
            version: self.version.clone(),
            anyo: self.anyo,
            combustible: self.combustible.clone(),
        }
    }
}

/// Vehicle fields a part copies.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct VehicleSummary {
    pub id_local: i64,
    pub marca: String,
    pub modelo: String,
    pub version: Option<String>,
    pub anyo: Option<i32>,
    pub combustible: Option<String>,
}

/// A part ready for upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRecord {
    pub ref_local: i64,
    pub id_empresa: i32,
    pub id_vehiculo: i64,
    pub vehicle_marca: Option<String>,
    pub vehicle_modelo: Option<String>,
    pub vehicle_version: Option<String>,
    pub vehicle_anyo: Option<i32>,
    pub combustible: Option<String>,
    pub cod_familia: Option<String>,
    pub descripcion_familia: String,
    pub cod_articulo: Option<String>,
    pub descripcion_articulo: String,
    pub ref_principal: Option<String>,
    pub anyo_inicio: i32,
    pub anyo_fin: i32,
    pub precio: Price,
    pub peso: Option<Decimal>,
    pub observaciones: Option<String>,
    pub reserva: Option<i32>,
    pub situacion: Option<String>,
    pub imagenes: Vec<String>,
    pub activo: bool,
}

// ===== Field access =====

/// First non-null, non-blank value under any of `keys`.
fn field<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| raw.get(*k)).find(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

fn text(raw: &Value, keys: &[&str]) -> Option<String> {
    match field(raw, keys)? {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn decimal(raw: &Value, keys: &[&str]) -> Option<Decimal> {
    match field(raw, keys)? {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

fn int64(raw: &Value, keys: &[&str]) -> Option<i64> {
    use rust_decimal::prelude::ToPrimitive;
    decimal(raw, keys).and_then(|d| d.trunc().to_i64())
}

fn int32(raw: &Value, keys: &[&str]) -> Option<i32> {
    int64(raw, keys).and_then(|n| i32::try_from(n).ok())
}

/// Image URLs from an array or a comma-separated string.
fn images(raw: &Value, keys: &[&str]) -> Vec<String> {
    let urls: Vec<String> = match field(raw, keys) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::trim).map(str::to_owned))
            .collect(),
        Some(Value::String(s)) => s.split(',').map(|u| u.trim().to_owned()).collect(),
        _ => Vec::new(),
    };
    urls.into_iter().filter(|u| !u.is_empty()).collect()
}

// ===== Vehicles =====

/// Normalise one entry of a vehicles batch.
///
/// # Errors
///
/// Returns `NormalizeError::MissingVehicleId` when `idLocal` is absent.
pub fn normalize_vehicle(raw: &Value, company_id: i32) -> Result<VehicleRecord, NormalizeError> {
    let id_local = int64(raw, &["idLocal", "IdLocal", "id"]).ok_or(NormalizeError::MissingVehicleId)?;

    Ok(VehicleRecord {
        id_local,
        id_empresa: int32(raw, &["idEmpresa", "IdEmpresa"]).unwrap_or(company_id),
        marca: text(raw, &["nombreMarca", "marca", "Marca"])
            .unwrap_or_else(|| UNKNOWN_BRAND.to_owned()),
        modelo: text(raw, &["nombreModelo", "modelo", "Modelo"])
            .unwrap_or_else(|| UNKNOWN_MODEL.to_owned()),
        version: text(raw, &["nombreVersion", "version", "Version"]),
        anyo: int32(raw, &["anyoVehiculo", "anyo", "Anyo"]),
        descripcion: text(raw, &["descripcion", "Descripcion"]),
        combustible: text(raw, &["combustible", "Combustible", "tipoCombustible"]),
        bastidor: text(raw, &["bastidor", "Bastidor"]),
        matricula: text(raw, &["matricula", "Matricula"]),
        color: text(raw, &["color", "Color"]),
        kilometraje: int32(raw, &["kilometraje", "Kilometraje"]),
        potencia: int32(raw, &["potencia", "Potencia"]),
        puertas: int32(raw, &["puertas", "Puertas"]),
        imagenes: images(raw, &["imagenes", "UrlsImgs", "urlsImgs"]),
    })
}

// ===== Parts =====

/// Whether a part must be kept off sale.
#[must_use]
pub fn part_is_withdrawn(
    situacion: Option<&str>,
    descripcion: &str,
    id_vehiculo: i64,
    precio: Price,
) -> bool {
    let situacion_withdrawn = situacion.is_some_and(|s| {
        let s = s.trim().to_lowercase();
        WITHDRAWN_SITUATIONS.contains(&s.as_str())
    });
    let unidentified = descripcion.to_lowercase().contains("no identificad");
    let unpriced = id_vehiculo > 0 && !precio.is_positive();
    situacion_withdrawn || unidentified || unpriced
}

/// Normalise one entry of a parts batch.
///
/// Vehicle fields come from `batch_vehicles` (vehicles sent alongside the
/// parts), then from `local_vehicles`.
///
/// # Errors
///
/// Returns `NormalizeError::MissingPartRef` when `refLocal` is absent.
pub fn normalize_part(
    raw: &Value,
    company_id: i32,
    batch_vehicles: &HashMap<i64, VehicleSummary>,
    local_vehicles: &HashMap<i64, VehicleSummary>,
) -> Result<PartRecord, NormalizeError> {
    let ref_local = int64(raw, &["refLocal", "RefLocal"]).ok_or(NormalizeError::MissingPartRef)?;
    let id_vehiculo = int64(raw, &["idVehiculo", "IdVehiculo"]).unwrap_or(-1);

    let cents = decimal(raw, &["precio", "Precio"]).unwrap_or(Decimal::ZERO);
    let precio = Price::new((cents / Decimal::ONE_HUNDRED).round_dp(2).max(Decimal::ZERO));

    let descripcion_articulo = text(raw, &["descripcionArticulo", "DescripcionArticulo", "descripcion"])
        .filter(|d| d.chars().count() >= 3)
        .unwrap_or_else(|| format!("Pieza ID {ref_local}"));

    let vehicle = batch_vehicles
        .get(&id_vehiculo)
        .or_else(|| local_vehicles.get(&id_vehiculo));

    let situacion = text(raw, &["situacion", "Situacion", "estado"]);
    let activo = !part_is_withdrawn(situacion.as_deref(), &descripcion_articulo, id_vehiculo, precio);

    Ok(PartRecord {
        ref_local,
        id_empresa: int32(raw, &["idEmpresa", "IdEmpresa"]).unwrap_or(company_id),
        id_vehiculo,
        vehicle_marca: vehicle.map(|v| v.marca.clone()),
        vehicle_modelo: vehicle.map(|v| v.modelo.clone()),
        vehicle_version: vehicle.and_then(|v| v.version.clone()),
        vehicle_anyo: vehicle.and_then(|v| v.anyo),
        combustible: vehicle.and_then(|v| v.combustible.clone()),
        cod_familia: text(raw, &["codFamilia", "CodFamilia"]),
        descripcion_familia: text(raw, &["descripcionFamilia", "DescripcionFamilia", "familia"])
            .unwrap_or_else(|| DEFAULT_FAMILY.to_owned()),
        cod_articulo: text(raw, &["codArticulo", "CodArticulo"]),
        descripcion_articulo,
        ref_principal: text(raw, &["refPrincipal", "RefPrincipal"]),
        anyo_inicio: int32(raw, &["anyoInicio", "AnyoInicio"]).unwrap_or(DEFAULT_YEAR_FROM),
        anyo_fin: int32(raw, &["anyoFin", "AnyoFin"]).unwrap_or(DEFAULT_YEAR_TO),
        precio,
        peso: decimal(raw, &["peso", "Peso"]).filter(|p| *p > Decimal::ZERO),
        observaciones: text(raw, &["observaciones", "Observaciones"]),
        reserva: int32(raw, &["reserva", "Reserva"]),
        situacion,
        imagenes: images(raw, &["imagenes", "UrlsImgs", "urlsImgs"]),
        activo,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_vehicle_aliases_and_defaults() {
        let raw = json!({
            "idLocal": "1234",
            "Marca": "SEAT",
            "anyo": 2009,
            "UrlsImgs": "https://img/1.jpg, https://img/2.jpg,",
        });
        let v = normalize_vehicle(&raw, 7).unwrap();
        assert_eq!(v.id_local, 1234);
        assert_eq!(v.id_empresa, 7);
        assert_eq!(v.marca, "SEAT");
        assert_eq!(v.modelo, UNKNOWN_MODEL);
        assert_eq!(v.anyo, Some(2009));
        assert_eq!(v.imagenes, ["https://img/1.jpg", "https://img/2.jpg"]);
    }

    #[test]
    fn test_vehicle_requires_id() {
        let raw = json!({ "nombreMarca": "Ford" });
        assert_eq!(normalize_vehicle(&raw, 1), Err(NormalizeError::MissingVehicleId));
    }

    #[test]
    fn test_vehicle_brand_prefers_nombre_marca() {
        let raw = json!({ "idLocal": 1, "nombreMarca": "Renault", "marca": "REN" });
        assert_eq!(normalize_vehicle(&raw, 1).unwrap().marca, "Renault");
        let raw = json!({ "idLocal": 1, "nombreMarca": "  " });
        assert_eq!(normalize_vehicle(&raw, 1).unwrap().marca, UNKNOWN_BRAND);
    }

    fn batch() -> HashMap<i64, VehicleSummary> {
        HashMap::from([(
            55,
            VehicleSummary {
                id_local: 55,
                marca: "Peugeot".into(),
                modelo: "308".into(),
                version: None,
                anyo: Some(2012),
                combustible: Some("Diesel".into()),
            },
        )])
    }

    #[test]
    fn test_part_price_is_cents() {
        let raw = json!({
            "refLocal": 9001,
            "idVehiculo": 55,
            "precio": 4550,
            "descripcionArticulo": "Alternador",
        });
        let p = normalize_part(&raw, 1, &batch(), &HashMap::new()).unwrap();
        assert_eq!(p.precio, Price::from_cents(4550));
        assert_eq!(p.vehicle_marca.as_deref(), Some("Peugeot"));
        assert_eq!(p.combustible.as_deref(), Some("Diesel"));
        assert_eq!(p.descripcion_familia, DEFAULT_FAMILY);
        assert_eq!((p.anyo_inicio, p.anyo_fin), (DEFAULT_YEAR_FROM, DEFAULT_YEAR_TO));
        assert!(p.activo);
    }

    #[test]
    fn test_part_vehicle_falls_back_to_local() {
        let raw = json!({ "refLocal": 1, "idVehiculo": 55, "precio": "1200", "descripcionArticulo": "Faro" });
        let p = normalize_part(&raw, 1, &HashMap::new(), &batch()).unwrap();
        assert_eq!(p.vehicle_modelo.as_deref(), Some("308"));
    }

    #[test]
    fn test_short_title_gets_placeholder() {
        let raw = json!({ "refLocal": 77, "descripcionArticulo": "ab", "precio": 100 });
        let p = normalize_part(&raw, 1, &HashMap::new(), &HashMap::new()).unwrap();
        assert_eq!(p.descripcion_articulo, "Pieza ID 77");
        assert_eq!(p.id_vehiculo, -1);
    }

    #[test]
    fn test_withdrawal_rules() {
        let priced = Price::from_cents(1000);
        assert!(part_is_withdrawn(Some("Vendida"), "Motor", 5, priced));
        assert!(part_is_withdrawn(Some("baja"), "Motor", -1, priced));
        assert!(part_is_withdrawn(None, "Pieza no identificada", -1, priced));
        assert!(part_is_withdrawn(None, "Motor", 5, Price::ZERO));
        // Loose parts may be unpriced.
        assert!(!part_is_withdrawn(None, "Motor", -1, Price::ZERO));
        assert!(!part_is_withdrawn(Some("disponible"), "Motor", 5, priced));
    }

    #[test]
    fn test_part_requires_ref() {
        let raw = json!({ "precio": 100 });
        assert_eq!(
            normalize_part(&raw, 1, &HashMap::new(), &HashMap::new()),
            Err(NormalizeError::MissingPartRef)
        );
    }
}
