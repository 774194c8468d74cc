//! services/catalog.rs
//! Nombres legibles de país/servicio -> códigos del proveedor.

const COUNTRY_CODES: &[(&str, &str)] = &[
    ("USA", "12"),
    ("Russia", "0"),
    ("Ukraine", "1"),
    ("Kazakhstan", "2"),
    ("China", "3"),
    ("Philippines", "4"),
    ("Myanmar", "5"),
    ("Indonesia", "6"),
    ("Malaysia", "7"),
    ("Kenya", "8"),
    ("Tanzania", "9"),
    ("Vietnam", "10"),
    ("Kyrgyzstan", "11"),
];

const SERVICE_CODES: &[(&str, &str)] = &[
    ("tinder", "ot"),
    ("telegram", "tg"),
    ("whatsapp", "wa"),
    ("google", "go"),
    ("facebook", "fb"),
    ("instagram", "ig"),
    ("twitter", "tw"),
];

/// País usado cuando el nombre no es conocido ni numérico.
pub const DEFAULT_COUNTRY_CODE: &str = "12";

/// Los códigos numéricos pasan tal cual; los nombres se comparan sin mayúsculas.
pub fn country_code(country: &str) -> &str {
    let country = country.trim();
    if !country.is_empty() && country.chars().all(|c| c.is_ascii_digit()) {
        return country;
    }
    COUNTRY_CODES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(country))
        .map(|(_, code)| *code)
        .unwrap_or(DEFAULT_COUNTRY_CODE)
}

/// Los servicios conocidos van a su código corto; lo demás se envía tal cual.
pub fn service_code(service: &str) -> &str {
    let service = service.trim();
    SERVICE_CODES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(service))
        .map(|(_, code)| *code)
        .unwrap_or(service)
}
