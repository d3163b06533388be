//! Static marketing playbook keyed by segment and establishment
//!
//! Downstream reporting reads these tables; they never feed back into scoring.

use crate::filter::HourRange;
use crate::segment::Segment;

/// Establishments with hand-written offers
pub const KNOWN_ESTABLISHMENTS: [&str; 2] = ["Grifos", "Supermercados"];

pub fn recommendation(segment: Segment) -> &'static str {
    match segment {
        Segment::Champions => "Ofrecer acceso exclusivo, preventas y programas de fidelización.",
        Segment::Leales => "Recompensar su fidelidad con descuentos o beneficios adicionales.",
        Segment::Potenciales => "Enviar campañas atractivas y descuentos iniciales.",
        Segment::EnRiesgo => "Lanzar ofertas agresivas y recordatorios personalizados.",
    }
}

pub fn channel(segment: Segment) -> &'static str {
    match segment {
        Segment::Champions => "Push + Email + WhatsApp Business",
        Segment::Leales => "WhatsApp Business + SMS",
        Segment::Potenciales => "Publicidad en redes + SMS",
        Segment::EnRiesgo => "Email remarketing + SMS",
    }
}

pub fn optimal_hours(segment: Segment) -> &'static str {
    match segment {
        Segment::Champions | Segment::Leales => "06:00 – 09:00",
        Segment::Potenciales | Segment::EnRiesgo => "17:00 – 20:00",
    }
}

/// Offer for `segment` at `establishment`; `None` outside the known establishments.
pub fn offer(segment: Segment, establishment: &str) -> Option<&'static str> {
    let offer = match (segment, establishment) {
        (Segment::Champions, "Grifos") => "Café + snack gratis por carga > S/50",
        (Segment::Champions, "Supermercados") => "Acceso anticipado a promociones exclusivas",
        (Segment::Leales, "Grifos") => "Cada 5 cargas, 1 gratis",
        (Segment::Leales, "Supermercados") => "Cupones semanales en productos frecuentes",
        (Segment::Potenciales, "Grifos") => "Descuento en snacks con carga mínima",
        (Segment::Potenciales, "Supermercados") => "Promociones cruzadas en productos populares",
        (Segment::EnRiesgo, "Grifos") => "Oferta flash: -30% en snacks",
        (Segment::EnRiesgo, "Supermercados") => "Cupón de recuperación con vencimiento rápido",
        _ => return None,
    };
    Some(offer)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybookEntry {
    pub segment: Segment,
    pub establishment: String,
    pub optimal_hours: &'static str,
    pub offer: &'static str,
    pub channel: &'static str,
    pub message: String,
}

/// One entry per segment and establishment that has an offer.
pub fn playbook<'a, I>(establishments: I) -> Vec<PlaybookEntry>
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    let mut entries = Vec::new();
    for segment in Segment::ALL {
        for establishment in establishments.clone() {
            let Some(offer) = offer(segment, establishment) else {
                continue;
            };
            entries.push(PlaybookEntry {
                segment,
                establishment: establishment.to_string(),
                optimal_hours: optimal_hours(segment),
                offer,
                channel: channel(segment),
                message: format!("¡Hola {segment}! {offer}. Disponible en {establishment}. ¡Aprovecha hoy!"),
            });
        }
    }
    entries
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyPromotion {
    pub establishment: String,
    pub hour: u8,
    pub strategy: String,
}

/// One promotion line per establishment and hour of the selected window
pub fn hourly_promotions<'a, I>(establishments: I, hour_range: HourRange) -> Vec<HourlyPromotion>
where
    I: IntoIterator<Item = &'a str>,
{
    establishments
        .into_iter()
        .flat_map(|establishment| {
            hour_range.hours().map(move |hour| HourlyPromotion {
                establishment: establishment.to_string(),
                hour,
                strategy: format!("Promoción activa en {establishment} durante {hour}:00"),
            })
        })
        .collect()
}
