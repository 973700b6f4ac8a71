// ============================================================================
// FECHAS - Parseo ISO y formato en hora de Lima (UTC-05:00, sin horario de verano)
// ============================================================================

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDateTime, Offset, TimeZone, Timelike, Utc};

const LIMA_OFFSET_SECONDS: i32 = -5 * 3600;

const DIAS: [&str; 7] = ["lunes", "martes", "miércoles", "jueves", "viernes", "sábado", "domingo"];
const MESES: [&str; 12] = [
    "enero", "febrero", "marzo", "abril", "mayo", "junio",
    "julio", "agosto", "septiembre", "octubre", "noviembre", "diciembre",
];

pub fn lima_offset() -> FixedOffset {
    FixedOffset::east_opt(LIMA_OFFSET_SECONDS).unwrap_or_else(|| Utc.fix())
}

/// ISO 8601 con zona (`...Z`, `...-05:00`) o sin zona (se asume UTC)
pub fn parse_timestamp(input: &str) -> Option<i64> {
    let input = input.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Some(date.timestamp_millis());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Clave `YYYY-MM-DD` tomada del prefijo de la fecha
pub fn date_key(input: &str) -> String {
    input.split('T').next().unwrap_or_default().to_string()
}

/// "sábado, 28 de junio de 2025, 05:30:00" en hora de Lima
pub fn format_lima(input: &str) -> Option<String> {
    let millis = parse_timestamp(input)?;
    let date = lima_offset().timestamp_millis_opt(millis).single()?;
    Some(format!(
        "{}, {} de {} de {}, {:02}:{:02}:{:02}",
        DIAS[date.weekday().num_days_from_monday() as usize],
        date.day(),
        MESES[date.month0() as usize],
        date.year(),
        date.hour(),
        date.minute(),
        date.second()
    ))
}

/// Rango [00:00 de hace `days - 1` días, 23:59:59.999 de hoy] en hora de Lima, en ms UTC
pub fn day_range_ms(now_ms: i64, days: u32) -> (i64, i64) {
    let offset = lima_offset();
    let local = match offset.timestamp_millis_opt(now_ms).single() {
        Some(date) => date,
        None => return (now_ms, now_ms),
    };
    let today = local.date_naive();
    let first_day = today - Duration::days(i64::from(days.max(1)) - 1);

    let start = first_day
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .map_or(now_ms, |date| date.timestamp_millis());
    let end = today
        .and_hms_milli_opt(23, 59, 59, 999)
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .map_or(now_ms, |date| date.timestamp_millis());
    (start, end)
}

pub fn to_iso(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|date| date.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_default()
}
