//! Content types and the form records behind them.
//!
//! Each [`ContentType`] owns one record type. [`ContentForm`] is the tagged
//! union handed to the encoders, and [`FormState`] keeps one record per type
//! so switching back and forth never mixes fields.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::FieldError;
use crate::payload;

/// The kind of payload being built.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ContentType {
    #[default]
    Url,
    Text,
    Wifi,
    Contact,
    Email,
    Phone,
    Sms,
    Location,
    Event,
    Crypto,
}

/// WiFi authentication scheme.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum WifiSecurity {
    #[default]
    Wpa,
    Wep,
    Nopass,
}

impl WifiSecurity {
    /// Token used after `T:` in a `WIFI:` payload.
    pub fn scheme_token(self) -> &'static str {
        match self {
            WifiSecurity::Wpa => "WPA",
            WifiSecurity::Wep => "WEP",
            WifiSecurity::Nopass => "nopass",
        }
    }
}

/// Cryptocurrency network of a payment URI.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CryptoNetwork {
    #[default]
    Bitcoin,
    Ethereum,
}

impl CryptoNetwork {
    /// Query key carrying the requested amount.
    pub fn amount_key(self) -> &'static str {
        match self {
            CryptoNetwork::Bitcoin => "amount",
            CryptoNetwork::Ethereum => "value",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlForm {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextForm {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiForm {
    pub ssid: String,
    pub security: WifiSecurity,
    pub password: String,
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactForm {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub company: String,
    pub title: String,
    pub website: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailForm {
    pub address: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneForm {
    pub number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsForm {
    pub phone: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationForm {
    pub latitude: String,
    pub longitude: String,
}

/// Calendar event. `start` and `end` hold what a datetime input produces,
/// e.g. `2024-01-01T10:00`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventForm {
    pub title: String,
    pub location: String,
    pub start: String,
    pub end: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoForm {
    pub network: CryptoNetwork,
    pub address: String,
    pub amount: String,
}

/// One content type together with its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentForm {
    Url(UrlForm),
    Text(TextForm),
    Wifi(WifiForm),
    Contact(ContactForm),
    Email(EmailForm),
    Phone(PhoneForm),
    Sms(SmsForm),
    Location(LocationForm),
    Event(EventForm),
    Crypto(CryptoForm),
}

impl ContentForm {
    pub fn content_type(&self) -> ContentType {
        match self {
            ContentForm::Url(_) => ContentType::Url,
            ContentForm::Text(_) => ContentType::Text,
            ContentForm::Wifi(_) => ContentType::Wifi,
            ContentForm::Contact(_) => ContentType::Contact,
            ContentForm::Email(_) => ContentType::Email,
            ContentForm::Phone(_) => ContentType::Phone,
            ContentForm::Sms(_) => ContentType::Sms,
            ContentForm::Location(_) => ContentType::Location,
            ContentForm::Event(_) => ContentType::Event,
            ContentForm::Crypto(_) => ContentType::Crypto,
        }
    }

    /// Serialized payload, or an empty string when required fields are blank.
    pub fn encode(&self) -> String {
        payload::encode(self)
    }
}

/// Field records for every content type, each edited independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormState {
    pub url: UrlForm,
    pub text: TextForm,
    pub wifi: WifiForm,
    pub contact: ContactForm,
    pub email: EmailForm,
    pub phone: PhoneForm,
    pub sms: SmsForm,
    pub location: LocationForm,
    pub event: EventForm,
    pub crypto: CryptoForm,
}

impl FormState {
    /// Snapshot of the record for `content_type`.
    pub fn form(&self, content_type: ContentType) -> ContentForm {
        match content_type {
            ContentType::Url => ContentForm::Url(self.url.clone()),
            ContentType::Text => ContentForm::Text(self.text.clone()),
            ContentType::Wifi => ContentForm::Wifi(self.wifi.clone()),
            ContentType::Contact => ContentForm::Contact(self.contact.clone()),
            ContentType::Email => ContentForm::Email(self.email.clone()),
            ContentType::Phone => ContentForm::Phone(self.phone.clone()),
            ContentType::Sms => ContentForm::Sms(self.sms.clone()),
            ContentType::Location => ContentForm::Location(self.location.clone()),
            ContentType::Event => ContentForm::Event(self.event.clone()),
            ContentType::Crypto => ContentForm::Crypto(self.crypto.clone()),
        }
    }

    /// The draft payload of `content_type`. Recomputed on every call.
    pub fn draft(&self, content_type: ContentType) -> String {
        self.form(content_type).encode()
    }

    /// Restores one record to its defaults, leaving the others untouched.
    pub fn reset(&mut self, content_type: ContentType) {
        match content_type {
            ContentType::Url => self.url = UrlForm::default(),
            ContentType::Text => self.text = TextForm::default(),
            ContentType::Wifi => self.wifi = WifiForm::default(),
            ContentType::Contact => self.contact = ContactForm::default(),
            ContentType::Email => self.email = EmailForm::default(),
            ContentType::Phone => self.phone = PhoneForm::default(),
            ContentType::Sms => self.sms = SmsForm::default(),
            ContentType::Location => self.location = LocationForm::default(),
            ContentType::Event => self.event = EventForm::default(),
            ContentType::Crypto => self.crypto = CryptoForm::default(),
        }
    }

    /// Sets a field by its name, e.g. `("wifi", "ssid", "Home")`.
    pub fn set_field(
        &mut self,
        content_type: ContentType,
        field: &str,
        value: &str,
    ) -> Result<(), FieldError> {
        let unknown = || FieldError::UnknownField {
            content_type,
            field: field.to_string(),
        };
        let slot: &mut String = match (content_type, field) {
            (ContentType::Url, "url") => &mut self.url.url,
            (ContentType::Text, "text") => &mut self.text.text,
            (ContentType::Wifi, "ssid") => &mut self.wifi.ssid,
            (ContentType::Wifi, "password") => &mut self.wifi.password,
            (ContentType::Wifi, "security") => {
                self.wifi.security = parse_choice(field, value)?;
                return Ok(());
            }
            (ContentType::Wifi, "hidden") => {
                self.wifi.hidden = parse_flag(field, value)?;
                return Ok(());
            }
            (ContentType::Contact, "first_name") => &mut self.contact.first_name,
            (ContentType::Contact, "last_name") => &mut self.contact.last_name,
            (ContentType::Contact, "phone") => &mut self.contact.phone,
            (ContentType::Contact, "email") => &mut self.contact.email,
            (ContentType::Contact, "company") => &mut self.contact.company,
            (ContentType::Contact, "title") => &mut self.contact.title,
            (ContentType::Contact, "website") => &mut self.contact.website,
            (ContentType::Contact, "address") => &mut self.contact.address,
            (ContentType::Email, "address") => &mut self.email.address,
            (ContentType::Email, "subject") => &mut self.email.subject,
            (ContentType::Email, "body") => &mut self.email.body,
            (ContentType::Phone, "number") => &mut self.phone.number,
            (ContentType::Sms, "phone") => &mut self.sms.phone,
            (ContentType::Sms, "message") => &mut self.sms.message,
            (ContentType::Location, "latitude") => &mut self.location.latitude,
            (ContentType::Location, "longitude") => &mut self.location.longitude,
            (ContentType::Event, "title") => &mut self.event.title,
            (ContentType::Event, "location") => &mut self.event.location,
            (ContentType::Event, "start") => &mut self.event.start,
            (ContentType::Event, "end") => &mut self.event.end,
            (ContentType::Event, "description") => &mut self.event.description,
            (ContentType::Crypto, "address") => &mut self.crypto.address,
            (ContentType::Crypto, "amount") => &mut self.crypto.amount,
            (ContentType::Crypto, "network") => {
                self.crypto.network = parse_choice(field, value)?;
                return Ok(());
            }
            _ => return Err(unknown()),
        };
        *slot = value.to_string();
        Ok(())
    }
}

fn parse_choice<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, FieldError> {
    value.trim().parse().map_err(|_| FieldError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(field: &str, value: &str) -> Result<bool, FieldError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(FieldError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn content_type_round_trips_through_its_name() {
        for content_type in ContentType::iter() {
            let name = content_type.to_string();
            assert_eq!(name.parse::<ContentType>().unwrap(), content_type);
            assert_eq!(FormState::default().form(content_type).content_type(), content_type);
        }
        assert_eq!("WiFi".parse::<ContentType>().unwrap(), ContentType::Wifi);
    }

    #[test]
    fn set_field_updates_only_the_named_record() {
        let mut forms = FormState::default();
        forms.set_field(ContentType::Wifi, "ssid", "Home").unwrap();
        forms.set_field(ContentType::Wifi, "security", "WEP").unwrap();
        forms.set_field(ContentType::Wifi, "hidden", "yes").unwrap();
        forms.set_field(ContentType::Crypto, "network", "ethereum").unwrap();

        assert_eq!(forms.wifi.ssid, "Home");
        assert_eq!(forms.wifi.security, WifiSecurity::Wep);
        assert!(forms.wifi.hidden);
        assert_eq!(forms.crypto.network, CryptoNetwork::Ethereum);
        assert_eq!(forms.url, UrlForm::default());
    }

    #[test]
    fn set_field_rejects_unknown_fields_and_values() {
        let mut forms = FormState::default();
        assert!(matches!(
            forms.set_field(ContentType::Phone, "ssid", "x"),
            Err(FieldError::UnknownField { .. })
        ));
        assert!(matches!(
            forms.set_field(ContentType::Wifi, "security", "wpa3"),
            Err(FieldError::InvalidValue { .. })
        ));
        assert!(matches!(
            forms.set_field(ContentType::Wifi, "hidden", "maybe"),
            Err(FieldError::InvalidValue { .. })
        ));
    }

    #[test]
    fn reset_clears_a_single_record() {
        let mut forms = FormState::default();
        forms.url.url = "https://example.com".into();
        forms.text.text = "hello".into();
        forms.reset(ContentType::Url);
        assert!(forms.url.url.is_empty());
        assert_eq!(forms.text.text, "hello");
    }

    #[test]
    fn content_form_serializes_with_a_type_tag() {
        let form = ContentForm::Phone(PhoneForm {
            number: "+15550100".into(),
        });
        let json = serde_json::to_value(&form).unwrap();
        assert_eq!(json["type"], "phone");
        assert_eq!(json["number"], "+15550100");
    }
}
