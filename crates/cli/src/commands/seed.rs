//! Reference data: shipping zones, provinces and import schedules.
//!
//! Every seed is idempotent and leaves existing rows untouched.

use sqlx::PgPool;
use tracing::info;

use desguace_admin::db;
use desguace_admin::services::scheduler::seed_default_schedules;

/// Default shipping zones.
pub const ZONES: &[(&str, &str)] = &[
    ("Península", "España peninsular"),
    ("Baleares", "Illes Balears"),
    ("Canarias", "Islas Canarias"),
    ("Ceuta y Melilla", "Ciudades autónomas"),
];

/// The 52 provinces: (name, INE code, zone).
pub const PROVINCES: &[(&str, &str, &str)] = &[
    ("Álava", "01", "Península"),
    ("Albacete", "02", "Península"),
    ("Alicante", "03", "Península"),
    ("Almería", "04", "Península"),
    ("Ávila", "05", "Península"),
    ("Badajoz", "06", "Península"),
    ("Illes Balears", "07", "Baleares"),
    ("Barcelona", "08", "Península"),
    ("Burgos", "09", "Península"),
    ("Cáceres", "10", "Península"),
    ("Cádiz", "11", "Península"),
    ("Castellón", "12", "Península"),
    ("Ciudad Real", "13", "Península"),
    ("Córdoba", "14", "Península"),
    ("A Coruña", "15", "Península"),
    ("Cuenca", "16", "Península"),
    ("Girona", "17", "Península"),
    ("Granada", "18", "Península"),
    ("Guadalajara", "19", "Península"),
    ("Gipuzkoa", "20", "Península"),
    ("Huelva", "21", "Península"),
    ("Huesca", "22", "Península"),
    ("Jaén", "23", "Península"),
    ("León", "24", "Península"),
    ("Lleida", "25", "Península"),
    ("La Rioja", "26", "Península"),
    ("Lugo", "27", "Península"),
    ("Madrid", "28", "Península"),
    ("Málaga", "29", "Península"),
    ("Murcia", "30", "Península"),
    ("Navarra", "31", "Península"),
    ("Ourense", "32", "Península"),
    ("Asturias", "33", "Península"),
    ("Palencia", "34", "Península"),
    ("Las Palmas", "35", "Canarias"),
    ("Pontevedra", "36", "Península"),
    ("Salamanca", "37", "Península"),
    ("Santa Cruz de Tenerife", "38", "Canarias"),
    ("Cantabria", "39", "Península"),
    ("Segovia", "40", "Península"),
    ("Sevilla", "41", "Península"),
    ("Soria", "42", "Península"),
    ("Tarragona", "43", "Península"),
    ("Teruel", "44", "Península"),
    ("Toledo", "45", "Península"),
    ("Valencia", "46", "Península"),
    ("Valladolid", "47", "Península"),
    ("Bizkaia", "48", "Península"),
    ("Zamora", "49", "Península"),
    ("Zaragoza", "50", "Península"),
    ("Ceuta", "51", "Ceuta y Melilla"),
    ("Melilla", "52", "Ceuta y Melilla"),
];

const DEFAULT_METHOD_NAME: &str = "Envío estándar";

/// Counts of rows inserted by [`seed_shipping`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShippingSeed {
    pub zones: u64,
    pub provinces: u64,
    pub methods: u64,
}

async fn insert_reference_data(pool: &PgPool) -> Result<ShippingSeed, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut seeded = ShippingSeed::default();

    for (name, description) in ZONES {
        seeded.zones += sqlx::query(
            "INSERT INTO shipping_zones (name, description) VALUES ($1, $2) \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(description)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    for (name, code, zone) in PROVINCES {
        seeded.provinces += sqlx::query(
            "INSERT INTO provinces (name, code, zone_id) \
             SELECT $1, $2, id FROM shipping_zones WHERE name = $3 \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(code)
        .bind(zone)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    seeded.methods = sqlx::query(
        "INSERT INTO shipping_methods (name, description, base_price, estimated_days) \
         SELECT $1, 'Entrega a domicilio por agencia de transporte', 0, '24-72 horas' \
         WHERE NOT EXISTS (SELECT 1 FROM shipping_methods)",
    )
    .bind(DEFAULT_METHOD_NAME)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;
    Ok(seeded)
}

/// Seed the default zones, the provinces with their zone and a default
/// method when the table is empty.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn seed_shipping() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;

    let seeded = insert_reference_data(&pool).await?;
    info!(
        zones = seeded.zones,
        provinces = seeded.provinces,
        methods = seeded.methods,
        "Shipping data seeded"
    );
    if seeded.methods == 1 {
        info!("Add zone rates for '{DEFAULT_METHOD_NAME}' in the back-office before taking orders");
    }
    Ok(())
}

/// Insert the default import schedules (inactive) when none exist.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn seed_schedules() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;

    let inserted = seed_default_schedules(&pool).await?;
    if inserted == 0 {
        info!("Import schedules already exist, nothing to do");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_every_province_is_listed_once() {
        assert_eq!(PROVINCES.len(), 52);
        let names: HashSet<_> = PROVINCES.iter().map(|(name, _, _)| *name).collect();
        let codes: HashSet<_> = PROVINCES.iter().map(|(_, code, _)| *code).collect();
        assert_eq!(names.len(), 52);
        assert_eq!(codes.len(), 52);
    }

    #[test]
    fn test_every_province_zone_exists() {
        let zones: HashSet<_> = ZONES.iter().map(|(name, _)| *name).collect();
        assert!(PROVINCES.iter().all(|(_, _, zone)| zones.contains(zone)));
    }

    #[test]
    fn test_islands_and_cities_are_off_the_peninsula() {
        let zone_of = |wanted: &str| {
            PROVINCES
                .iter()
                .find(|(name, _, _)| *name == wanted)
                .map(|(_, _, zone)| *zone)
        };
        assert_eq!(zone_of("Murcia"), Some("Península"));
        assert_eq!(zone_of("Las Palmas"), Some("Canarias"));
        assert_eq!(zone_of("Illes Balears"), Some("Baleares"));
        assert_eq!(zone_of("Melilla"), Some("Ceuta y Melilla"));
    }
}
