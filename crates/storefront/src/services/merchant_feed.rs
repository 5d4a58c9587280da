//! Google Merchant Center product feed.
//!
//! Builds RSS 2.0 items (with the `g:` namespace) for active, priced parts
//! that have at least one real photo. Text is escaped here, so the template
//! emits it verbatim.

use askama::Template;

use desguace_core::Part;

/// Maximum characters kept from any free-text field.
pub const MAX_TEXT_CHARS: usize = 150;

/// Parts considered per feed build.
pub const FEED_LIMIT: i64 = 1000;

/// Additional images beyond the main one.
const MAX_ADDITIONAL_IMAGES: usize = 10;

pub const CHANNEL_TITLE: &str = "Desguace Murcia - Piezas de Recambio";
const CHANNEL_DESCRIPTION: &str = "Piezas de recambio de segunda mano verificadas";
const GOOGLE_PRODUCT_CATEGORY: &str = "Vehicle Parts &amp; Accessories";

/// Family keyword to product-type category.
const PRODUCT_TYPES: &[(&str, &str)] = &[
    ("MOTOR", "Motor"),
    ("CARROCERIA", "Carrocería"),
    ("ELECTRICIDAD", "Sistema eléctrico"),
    ("TRANSMISION", "Transmisión"),
    ("SUSPENSION", "Suspensión"),
    ("FRENOS", "Frenos"),
    ("DIRECCION", "Dirección"),
    ("CLIMATIZACION", "Climatización"),
    ("ESCAPE", "Sistema de escape"),
    ("COMBUSTIBLE", "Sistema de combustible"),
];

/// Escape XML metacharacters and truncate to [`MAX_TEXT_CHARS`] characters.
#[must_use]
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.trim().chars().take(MAX_TEXT_CHARS) {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Google `product_type` for a part family.
#[must_use]
pub fn product_type(family: &str) -> String {
    let upper = family.to_uppercase();
    let category = PRODUCT_TYPES
        .iter()
        .find(|(keyword, _)| upper.contains(keyword))
        .map_or("Otros", |(_, category)| category);
    format!("Vehículos &gt; Piezas de vehículos &gt; {category}")
}

/// Escape a URL for use in XML text.
fn escape_url(url: &str) -> String {
    url.replace('&', "&amp;")
}

/// One `<item>` of the feed. Every field is already XML-safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub image_link: String,
    pub additional_image_links: Vec<String>,
    pub price: String,
    pub brand: String,
    pub mpn: String,
    pub product_type: String,
    pub family: String,
    pub vehicle_brand: String,
}

impl FeedItem {
    /// Build the item for a part, or `None` if it does not qualify.
    #[must_use]
    pub fn from_part(part: &Part, base_url: &str) -> Option<Self> {
        if !part.activo || !part.precio.is_positive() {
            return None;
        }
        let mut images = part.real_images();
        let image_link = images.next()?;
        let additional_image_links = images
            .take(MAX_ADDITIONAL_IMAGES)
            .map(escape_url)
            .collect();

        let reference = part
            .ref_principal
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| part.ref_local.to_string());
        let marca = part
            .vehicle_marca
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());

        let mut description = part.display_name().to_owned();
        if let Some(vehicle) = part.vehicle_label() {
            description.push_str(&format!(" - Compatible con: {vehicle}"));
        }
        description.push_str(&format!(
            ". Familia: {}. Referencia: {reference}",
            part.descripcion_familia
        ));

        Some(Self {
            id: part.ref_local.to_string(),
            title: sanitize(part.display_name()),
            description: sanitize(&description),
            link: escape_url(&format!("{base_url}/parts/{}", part.id)),
            image_link: escape_url(image_link),
            additional_image_links,
            price: part.price_with_vat().feed_format(),
            brand: sanitize(marca.unwrap_or("Genérico")),
            mpn: sanitize(&reference),
            product_type: product_type(&part.descripcion_familia),
            family: sanitize(&part.descripcion_familia),
            vehicle_brand: sanitize(marca.unwrap_or("Universal")),
        })
    }
}

/// The rendered RSS document.
#[derive(Template)]
#[template(path = "feed/google_merchant.xml")]
pub struct GoogleMerchantFeed {
    pub title: &'static str,
    pub link: String,
    pub description: &'static str,
    pub google_product_category: &'static str,
    pub items: Vec<FeedItem>,
}

impl GoogleMerchantFeed {
    /// Build the feed from candidate parts.
    #[must_use]
    pub fn build(parts: &[Part], base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            title: CHANNEL_TITLE,
            link: escape_url(base_url),
            description: CHANNEL_DESCRIPTION,
            google_product_category: GOOGLE_PRODUCT_CATEGORY,
            items: parts
                .iter()
                .filter_map(|p| FeedItem::from_part(p, base_url))
                .collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;

    use desguace_core::models::catalog::PLACEHOLDER_IMAGE;
    use desguace_core::{PartId, Price};

    use super::*;

    fn part() -> Part {
        Part {
            id: PartId::new(5),
            ref_local: 987_654,
            id_empresa: 1,
            id_vehiculo: 1,
            vehicle_marca: Some("SEAT".into()),
            vehicle_modelo: Some("Ibiza".into()),
            vehicle_version: None,
            vehicle_anyo: Some(2008),
            combustible: None,
            cod_familia: None,
            descripcion_familia: "MOTOR Y ACCESORIOS".into(),
            cod_articulo: None,
            descripcion_articulo: "Alternador <Bosch> & regulador".into(),
            ref_principal: Some("0124525".into()),
            anyo_inicio: None,
            anyo_fin: None,
            precio: Price::new(Decimal::new(10_000, 2)),
            peso: None,
            observaciones: None,
            reserva: None,
            situacion: None,
            imagenes: vec![
                PLACEHOLDER_IMAGE.into(),
                "https://img.example/a.jpg?w=1&h=2".into(),
                "https://img.example/b.jpg".into(),
            ],
            activo: true,
            disponible_api: true,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_sanitize_escapes_and_truncates() {
        assert_eq!(sanitize(r#"A & B <"c"> 'd'"#), "A &amp; B &lt;&quot;c&quot;&gt; &apos;d&apos;");
        let long = "ñ".repeat(200);
        assert_eq!(sanitize(&long).chars().count(), MAX_TEXT_CHARS);
    }

    #[test]
    fn test_product_type_mapping() {
        assert_eq!(
            product_type("Frenos delanteros"),
            "Vehículos &gt; Piezas de vehículos &gt; Frenos"
        );
        assert_eq!(
            product_type("ACCESORIOS INTERIOR"),
            "Vehículos &gt; Piezas de vehículos &gt; Otros"
        );
        assert!(product_type("ELECTRICIDAD MOTOR").ends_with("&gt; Motor"));
        assert!(product_type("Tubos de escape").ends_with("Sistema de escape"));
        assert!(product_type("BOMBA COMBUSTIBLE").ends_with("Sistema de combustible"));
        assert!(product_type("Electricidad").ends_with("Sistema eléctrico"));
    }

    #[test]
    fn test_item_fields() {
        let item = FeedItem::from_part(&part(), "https://desguacesmurcia.com").unwrap();
        assert_eq!(item.id, "987654");
        assert_eq!(item.title, "Alternador &lt;Bosch&gt; &amp; regulador");
        assert_eq!(item.link, "https://desguacesmurcia.com/parts/5");
        assert_eq!(item.image_link, "https://img.example/a.jpg?w=1&amp;h=2");
        assert_eq!(item.additional_image_links, vec!["https://img.example/b.jpg"]);
        assert_eq!(item.price, "121.00 EUR");
        assert_eq!(item.brand, "SEAT");
        assert_eq!(item.mpn, "0124525");
        assert!(item.description.contains("Compatible con: SEAT Ibiza (2008)"));
        assert!(item.description.contains("Referencia: 0124525"));
        assert!(item.product_type.ends_with("Motor"));
    }

    #[test]
    fn test_item_defaults_without_vehicle() {
        let mut p = part();
        p.vehicle_marca = None;
        p.ref_principal = None;
        let item = FeedItem::from_part(&p, "https://x.es").unwrap();
        assert_eq!(item.brand, "Genérico");
        assert_eq!(item.vehicle_brand, "Universal");
        assert_eq!(item.mpn, "987654");
    }

    #[test]
    fn test_unqualified_parts_are_skipped() {
        let mut no_photo = part();
        no_photo.imagenes = vec![PLACEHOLDER_IMAGE.into()];
        assert!(FeedItem::from_part(&no_photo, "https://x.es").is_none());

        let mut free = part();
        free.precio = Price::ZERO;
        assert!(FeedItem::from_part(&free, "https://x.es").is_none());
    }

    #[test]
    fn test_feed_renders_namespace_and_items() {
        let feed = GoogleMerchantFeed::build(&[part()], "https://desguacesmurcia.com/");
        let xml = feed.render().unwrap();
        assert!(xml.contains(r#"xmlns:g="http://base.google.com/ns/1.0""#));
        assert!(xml.contains("<g:id>987654</g:id>"));
        assert!(xml.contains("<g:condition>used</g:condition>"));
        assert!(xml.contains("<link>https://desguacesmurcia.com</link>"));
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].price, "121.00 EUR");
        assert!(xml.contains(
            "<g:google_product_category>Vehicle Parts &amp; Accessories</g:google_product_category>"
        ));
        assert!(xml.contains("<title>Alternador &lt;Bosch&gt; &amp; regulador</title>"));
        assert!(!xml.contains("CDATA"));
        assert!(!xml.contains("& "));
    }
}
