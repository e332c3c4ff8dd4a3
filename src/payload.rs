//! Payload encoders.
//!
//! [`encode`] turns a [`ContentForm`] into the exact string placed in the QR
//! symbol. It is total and pure: when a required field is blank the result is
//! an empty string, never an error.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::content::{
    ContactForm, ContentForm, CryptoForm, EmailForm, EventForm, LocationForm, SmsForm, WifiForm,
    WifiSecurity,
};
use crate::escape::{escape_text, escape_wifi};

/// Line separator used inside vCard and iCalendar blocks.
const LINE_BREAK: &str = "\n";

/// Compact UTC form used by `DTSTART` / `DTEND`.
const ICS_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Layouts produced by datetime inputs, read as UTC.
const LOCAL_DATE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Serializes one form into its payload string.
///
/// ```rust
/// use coldlink::content::{ContentForm, PhoneForm};
/// use coldlink::payload::encode;
///
/// let form = ContentForm::Phone(PhoneForm { number: " +15550100 ".into() });
/// assert_eq!(encode(&form), "tel:+15550100");
/// ```
pub fn encode(form: &ContentForm) -> String {
    match form {
        ContentForm::Url(f) => f.url.trim().to_string(),
        ContentForm::Text(f) => f.text.trim().to_string(),
        ContentForm::Wifi(f) => encode_wifi(f),
        ContentForm::Contact(f) => encode_contact(f),
        ContentForm::Email(f) => encode_email(f),
        ContentForm::Phone(f) => prefixed("tel:", &f.number),
        ContentForm::Sms(f) => encode_sms(f),
        ContentForm::Location(f) => encode_location(f),
        ContentForm::Event(f) => encode_event(f),
        ContentForm::Crypto(f) => encode_crypto(f),
    }
}

fn prefixed(scheme: &str, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        String::new()
    } else {
        format!("{scheme}{value}")
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// `WIFI:T:<SEC>;S:<ssid>;[P:<password>;][H:true;]`
///
/// SSID and password keep their surrounding whitespace; it is part of the
/// network credentials.
fn encode_wifi(form: &WifiForm) -> String {
    if form.ssid.trim().is_empty() {
        return String::new();
    }
    let mut out = format!(
        "WIFI:T:{};S:{};",
        form.security.scheme_token(),
        escape_wifi(&form.ssid)
    );
    if form.security != WifiSecurity::Nopass && !form.password.is_empty() {
        out.push_str(&format!("P:{};", escape_wifi(&form.password)));
    }
    if form.hidden {
        out.push_str("H:true;");
    }
    out
}

/// vCard 3.0. Empty unless at least one property beyond the header is set.
fn encode_contact(form: &ContactForm) -> String {
    let mut properties: Vec<String> = Vec::new();

    let first = form.first_name.trim();
    let last = form.last_name.trim();
    if !first.is_empty() || !last.is_empty() {
        properties.push(format!("N:{};{};;;", escape_text(last), escape_text(first)));
        let full = [first, last]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        properties.push(format!("FN:{}", escape_text(&full)));
    }

    let optional = [
        ("TEL", &form.phone),
        ("EMAIL", &form.email),
        ("ORG", &form.company),
        ("TITLE", &form.title),
        ("URL", &form.website),
        ("ADR", &form.address),
    ];
    for (key, value) in optional {
        if let Some(value) = non_blank(value) {
            properties.push(format!("{key}:{}", escape_text(value)));
        }
    }

    if properties.is_empty() {
        return String::new();
    }

    let mut lines = vec!["BEGIN:VCARD".to_string(), "VERSION:3.0".to_string()];
    lines.extend(properties);
    lines.push("END:VCARD".to_string());
    lines.join(LINE_BREAK)
}

/// Characters `encodeURIComponent` leaves alone but `urlencoding` escapes.
const URI_COMPONENT_MARKS: [(&str, &str); 5] = [
    ("%21", "!"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
];

/// Percent-encodes everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
fn encode_uri_component(value: &str) -> String {
    URI_COMPONENT_MARKS
        .iter()
        .fold(urlencoding::encode(value).into_owned(), |encoded, (escaped, mark)| {
            encoded.replace(escaped, mark)
        })
}

/// `mailto:` with subject/body percent-encoded the way `encodeURIComponent` does.
fn encode_email(form: &EmailForm) -> String {
    let Some(address) = non_blank(&form.address) else {
        return String::new();
    };
    let query = [("subject", &form.subject), ("body", &form.body)]
        .into_iter()
        .filter_map(|(key, value)| {
            non_blank(value).map(|value| format!("{key}={}", encode_uri_component(value)))
        })
        .collect::<Vec<_>>();
    if query.is_empty() {
        format!("mailto:{address}")
    } else {
        format!("mailto:{address}?{}", query.join("&"))
    }
}

fn encode_sms(form: &SmsForm) -> String {
    match non_blank(&form.phone) {
        Some(phone) => format!("SMSTO:{phone}:{}", form.message.trim()),
        None => String::new(),
    }
}

fn encode_location(form: &LocationForm) -> String {
    match (non_blank(&form.latitude), non_blank(&form.longitude)) {
        (Some(lat), Some(lon)) => format!("geo:{lat},{lon}"),
        _ => String::new(),
    }
}

/// iCalendar VEVENT wrapped in a VCALENDAR.
fn encode_event(form: &EventForm) -> String {
    let title = non_blank(&form.title);
    let start = format_ics_date(&form.start);
    let end = format_ics_date(&form.end);
    if title.is_none() && start.is_none() && end.is_none() {
        return String::new();
    }

    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "BEGIN:VEVENT".to_string(),
    ];
    if let Some(title) = title {
        lines.push(format!("SUMMARY:{}", escape_text(title)));
    }
    if let Some(location) = non_blank(&form.location) {
        lines.push(format!("LOCATION:{}", escape_text(location)));
    }
    if let Some(start) = start {
        lines.push(format!("DTSTART:{start}"));
    }
    if let Some(end) = end {
        lines.push(format!("DTEND:{end}"));
    }
    if let Some(description) = non_blank(&form.description) {
        lines.push(format!("DESCRIPTION:{}", escape_text(description)));
    }
    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());
    lines.join(LINE_BREAK)
}

/// Reformats a datetime input as `YYYYMMDDTHHMMSSZ`; `None` for blank or
/// unparseable input.
pub fn format_ics_date(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(value) {
        return Some(
            with_offset
                .with_timezone(&Utc)
                .format(ICS_DATE_FORMAT)
                .to_string(),
        );
    }
    LOCAL_DATE_FORMATS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
        .map(|naive| naive.and_utc().format(ICS_DATE_FORMAT).to_string())
}

fn encode_crypto(form: &CryptoForm) -> String {
    let Some(address) = non_blank(&form.address) else {
        return String::new();
    };
    let mut out = format!("{}:{address}", form.network);
    if let Some(amount) = non_blank(&form.amount) {
        out.push_str(&format!("?{}={amount}", form.network.amount_key()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{
        ContentType, CryptoNetwork, FormState, PhoneForm, TextForm, UrlForm,
    };
    use strum::IntoEnumIterator;

    fn wifi(ssid: &str, security: WifiSecurity, password: &str, hidden: bool) -> ContentForm {
        ContentForm::Wifi(WifiForm {
            ssid: ssid.into(),
            security,
            password: password.into(),
            hidden,
        })
    }

    #[test]
    fn blank_forms_encode_to_empty_for_every_type() {
        let forms = FormState::default();
        for content_type in ContentType::iter() {
            assert_eq!(forms.draft(content_type), "", "{content_type} should be empty");
        }
    }

    #[test]
    fn url_and_text_are_trimmed() {
        let url = ContentForm::Url(UrlForm {
            url: "  https://example.com/a?b=c  ".into(),
        });
        assert_eq!(encode(&url), "https://example.com/a?b=c");
        let text = ContentForm::Text(TextForm { text: "   ".into() });
        assert_eq!(encode(&text), "");
    }

    #[test]
    fn wifi_scenario_matches_expected_payload() {
        let form = wifi("Home;Net", WifiSecurity::Wpa, "a,b", true);
        assert_eq!(encode(&form), r"WIFI:T:WPA;S:Home\;Net;P:a\,b;H:true;");
    }

    #[test]
    fn wifi_nopass_omits_password() {
        let form = wifi("Cafe", WifiSecurity::Nopass, "ignored", false);
        assert_eq!(encode(&form), "WIFI:T:nopass;S:Cafe;");
    }

    #[test]
    fn wifi_wep_with_blank_password_has_no_p_segment() {
        let form = wifi("Lab", WifiSecurity::Wep, "", false);
        assert_eq!(encode(&form), "WIFI:T:WEP;S:Lab;");
    }

    #[test]
    fn wifi_requires_ssid() {
        let form = wifi("  ", WifiSecurity::Wpa, "secret", true);
        assert_eq!(encode(&form), "");
    }

    #[test]
    fn contact_builds_vcard_with_escaped_values() {
        let form = ContentForm::Contact(ContactForm {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            phone: "+44 20 7946 0000".into(),
            email: "ada@example.com".into(),
            company: "Analytical, Ltd".into(),
            address: "12 St; London\nUK".into(),
            ..ContactForm::default()
        });
        let expected = [
            "BEGIN:VCARD",
            "VERSION:3.0",
            "N:Lovelace;Ada;;;",
            "FN:Ada Lovelace",
            "TEL:+44 20 7946 0000",
            "EMAIL:ada@example.com",
            r"ORG:Analytical\, Ltd",
            r"ADR:12 St\; London\nUK",
            "END:VCARD",
        ]
        .join("\n");
        assert_eq!(encode(&form), expected);
    }

    #[test]
    fn contact_without_name_skips_n_and_fn() {
        let form = ContentForm::Contact(ContactForm {
            email: "team@example.com".into(),
            ..ContactForm::default()
        });
        assert_eq!(
            encode(&form),
            "BEGIN:VCARD\nVERSION:3.0\nEMAIL:team@example.com\nEND:VCARD"
        );
    }

    #[test]
    fn contact_with_only_last_name_has_single_word_fn() {
        let form = ContentForm::Contact(ContactForm {
            last_name: "Hopper".into(),
            ..ContactForm::default()
        });
        let payload = encode(&form);
        assert!(payload.contains("N:Hopper;;;;"));
        assert!(payload.contains("FN:Hopper\n"));
    }

    #[test]
    fn email_encodes_query_like_encode_uri_component() {
        let form = ContentForm::Email(EmailForm {
            address: "hi@example.com".into(),
            subject: "Hello there".into(),
            body: "a&b=c".into(),
        });
        assert_eq!(
            encode(&form),
            "mailto:hi@example.com?subject=Hello%20there&body=a%26b%3Dc"
        );
    }

    #[test]
    fn email_keeps_uri_component_marks_unescaped() {
        let form = ContentForm::Email(EmailForm {
            address: "hi@example.com".into(),
            subject: "Hi! (it's *me*) ~50%".into(),
            body: String::new(),
        });
        assert_eq!(
            encode(&form),
            "mailto:hi@example.com?subject=Hi!%20(it's%20*me*)%20~50%25"
        );
    }

    #[test]
    fn email_skips_blank_query_parts() {
        let form = ContentForm::Email(EmailForm {
            address: "hi@example.com".into(),
            subject: " ".into(),
            body: "ping".into(),
        });
        assert_eq!(encode(&form), "mailto:hi@example.com?body=ping");

        let bare = ContentForm::Email(EmailForm {
            address: "hi@example.com".into(),
            ..EmailForm::default()
        });
        assert_eq!(encode(&bare), "mailto:hi@example.com");
    }

    #[test]
    fn phone_and_sms() {
        let phone = ContentForm::Phone(PhoneForm {
            number: "555-0100".into(),
        });
        assert_eq!(encode(&phone), "tel:555-0100");

        let sms = ContentForm::Sms(SmsForm {
            phone: "555-0100".into(),
            message: "".into(),
        });
        assert_eq!(encode(&sms), "SMSTO:555-0100:");

        let no_phone = ContentForm::Sms(SmsForm {
            phone: "".into(),
            message: "hello".into(),
        });
        assert_eq!(encode(&no_phone), "");
    }

    #[test]
    fn location_requires_both_coordinates() {
        let both = ContentForm::Location(LocationForm {
            latitude: "34.1639".into(),
            longitude: "-118.1676".into(),
        });
        assert_eq!(encode(&both), "geo:34.1639,-118.1676");
        let half = ContentForm::Location(LocationForm {
            latitude: "34.1639".into(),
            longitude: "".into(),
        });
        assert_eq!(encode(&half), "");
    }

    #[test]
    fn event_scenario_has_start_but_no_end() {
        let form = ContentForm::Event(EventForm {
            title: "Sync".into(),
            start: "2024-01-01T10:00".into(),
            ..EventForm::default()
        });
        let payload = encode(&form);
        assert!(payload.contains("SUMMARY:Sync"));
        assert!(payload.contains("DTSTART:20240101T100000Z"));
        assert!(!payload.contains("DTEND"));
        assert!(payload.starts_with("BEGIN:VCALENDAR\nVERSION:2.0\nBEGIN:VEVENT"));
        assert!(payload.ends_with("END:VEVENT\nEND:VCALENDAR"));
    }

    #[test]
    fn event_drops_invalid_dates_and_needs_title_or_date() {
        let only_bad_date = ContentForm::Event(EventForm {
            start: "next tuesday".into(),
            location: "Room 1".into(),
            ..EventForm::default()
        });
        assert_eq!(encode(&only_bad_date), "");

        let date_only = ContentForm::Event(EventForm {
            end: "2024-03-05T18:30:15".into(),
            ..EventForm::default()
        });
        assert!(encode(&date_only).contains("DTEND:20240305T183015Z"));
    }

    #[test]
    fn ics_dates_convert_offsets_to_utc() {
        assert_eq!(
            format_ics_date("2024-06-01T12:00:00+02:00").as_deref(),
            Some("20240601T100000Z")
        );
        assert_eq!(format_ics_date("2024-06-01 08:15").as_deref(), Some("20240601T081500Z"));
        assert_eq!(format_ics_date("2024-13-01T10:00"), None);
        assert_eq!(format_ics_date(""), None);
    }

    #[test]
    fn crypto_uses_network_specific_amount_key() {
        let btc = ContentForm::Crypto(CryptoForm {
            network: CryptoNetwork::Bitcoin,
            address: "bc1qexample".into(),
            amount: "0.01".into(),
        });
        assert_eq!(encode(&btc), "bitcoin:bc1qexample?amount=0.01");

        let eth = ContentForm::Crypto(CryptoForm {
            network: CryptoNetwork::Ethereum,
            address: "0xabc".into(),
            amount: "1.5".into(),
        });
        assert_eq!(encode(&eth), "ethereum:0xabc?value=1.5");

        let no_amount = ContentForm::Crypto(CryptoForm {
            address: "bc1qexample".into(),
            ..CryptoForm::default()
        });
        assert_eq!(encode(&no_amount), "bitcoin:bc1qexample");

        let no_address = ContentForm::Crypto(CryptoForm {
            amount: "2".into(),
            ..CryptoForm::default()
        });
        assert_eq!(encode(&no_address), "");
    }

    #[test]
    fn encoding_is_idempotent() {
        let form = wifi("Home;Net", WifiSecurity::Wpa, "a,b", true);
        assert_eq!(encode(&form), encode(&form));
    }
}
