//! Vehicles and the second-hand parts recovered from them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{PartId, Price, VehicleId};

/// Grams assumed for a part whose weight was never recorded.
pub const DEFAULT_PART_WEIGHT_GRAMS: i64 = 500;

/// Placeholder image Metasync returns for parts without photos.
pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/150";

/// A dismantled vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: VehicleId,
    /// Metasync `idLocal`.
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
    pub activo: bool,
    pub active_parts_count: i32,
    pub total_parts_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A part offered for sale. Each row is a single physical item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub id: PartId,
    /// Metasync `refLocal`; looked up verbatim.
    pub ref_local: i64,
    pub id_empresa: i32,
    /// Metasync vehicle id. Negative for parts not tied to a vehicle.
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
    pub anyo_inicio: Option<i32>,
    pub anyo_fin: Option<i32>,
    /// Price without VAT.
    pub precio: Price,
    /// Weight in hundredths of a kilogram, as Metasync reports it.
    pub peso: Option<Decimal>,
    pub observaciones: Option<String>,
    pub reserva: Option<i32>,
    pub situacion: Option<String>,
    pub imagenes: Vec<String>,
    pub activo: bool,
    pub disponible_api: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Part {
    /// Shipping weight in grams (`peso / 100 kg`).
    #[must_use]
    pub fn weight_grams(&self) -> i64 {
        use rust_decimal::prelude::ToPrimitive;

        self.peso
            .filter(|p| *p > Decimal::ZERO)
            .and_then(|p| (p * Decimal::TEN).round().to_i64())
            .unwrap_or(DEFAULT_PART_WEIGHT_GRAMS)
    }

    /// Name shown to customers.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.descripcion_articulo
    }

    /// Customer-facing price, VAT included.
    #[must_use]
    pub fn price_with_vat(&self) -> Price {
        self.precio.with_vat()
    }

    /// Images excluding the Metasync placeholder.
    pub fn real_images(&self) -> impl Iterator<Item = &str> {
        self.imagenes
            .iter()
            .map(String::as_str)
            .filter(|url| !url.is_empty() && *url != PLACEHOLDER_IMAGE)
    }

    /// Human description of the donor vehicle, e.g. `"SEAT Ibiza 1.4 (2008)"`.
    #[must_use]
    pub fn vehicle_label(&self) -> Option<String> {
        let marca = self.vehicle_marca.as_deref()?;
        let mut label = marca.to_owned();
        for extra in [&self.vehicle_modelo, &self.vehicle_version]
            .into_iter()
            .flatten()
        {
            label.push(' ');
            label.push_str(extra);
        }
        if let Some(anyo) = self.vehicle_anyo {
            label.push_str(&format!(" ({anyo})"));
        }
        Some(label)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_part() -> Part {
        Part {
            id: PartId::new(1),
            ref_local: 123_456,
            id_empresa: 1,
            id_vehiculo: 9_001,
            vehicle_marca: Some("SEAT".into()),
            vehicle_modelo: Some("Ibiza".into()),
            vehicle_version: Some("1.4 TDI".into()),
            vehicle_anyo: Some(2008),
            combustible: Some("Diesel".into()),
            cod_familia: Some("MOT".into()),
            descripcion_familia: "Motor".into(),
            cod_articulo: Some("A1".into()),
            descripcion_articulo: "Alternador".into(),
            ref_principal: Some("0124325003".into()),
            anyo_inicio: Some(2002),
            anyo_fin: Some(2009),
            precio: Price::from_cents(10_000),
            peso: Some(Decimal::new(450, 0)),
            observaciones: None,
            reserva: None,
            situacion: Some("almacenada".into()),
            imagenes: vec!["https://img.example/1.jpg".into()],
            activo: true,
            disponible_api: true,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_weight_grams_from_hundredths_of_kg() {
        assert_eq!(sample_part().weight_grams(), 4_500);
    }

    #[test]
    fn test_weight_grams_defaults_when_missing() {
        let mut part = sample_part();
        part.peso = None;
        assert_eq!(part.weight_grams(), DEFAULT_PART_WEIGHT_GRAMS);
        part.peso = Some(Decimal::ZERO);
        assert_eq!(part.weight_grams(), DEFAULT_PART_WEIGHT_GRAMS);
    }

    #[test]
    fn test_price_with_vat() {
        assert_eq!(sample_part().price_with_vat(), Price::from_cents(12_100));
    }

    #[test]
    fn test_real_images_skip_placeholder() {
        let mut part = sample_part();
        part.imagenes.insert(0, PLACEHOLDER_IMAGE.into());
        assert_eq!(
            part.real_images().collect::<Vec<_>>(),
            vec!["https://img.example/1.jpg"]
        );
    }

    #[test]
    fn test_vehicle_label() {
        assert_eq!(
            sample_part().vehicle_label().unwrap(),
            "SEAT Ibiza 1.4 TDI (2008)"
        );
        let mut part = sample_part();
        part.vehicle_marca = None;
        assert!(part.vehicle_label().is_none());
    }
}
