//! Invoice carrier classification.
//!
//! Taiwan B2C e-invoices can be delivered to a mobile barcode, a citizen
//! digital certificate, or the member's email account. Every invoice path
//! goes through this one classifier; the carrier formats are defined by
//! the Ministry of Finance and do not vary per call site.

use once_cell::sync::Lazy;
use regex::Regex;

/// `/` followed by 7 barcode characters
static MOBILE_BARCODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/[0-9A-Z.+-]{7}$").expect("mobile barcode regex"));

/// Two letters then 14 digits
static CITIZEN_CERTIFICATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}[0-9]{14}$").expect("citizen certificate regex"));

/// How the invoice reaches the buyer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CarrierKind {
    /// Mobile barcode carrier, e.g. `/ABC+123`
    MobileBarcode(String),
    /// Citizen digital certificate carrier, e.g. `AB12345678901234`
    CitizenCertificate(String),
    /// No recognizable carrier: invoice goes to the member account and
    /// the buyer is notified by email
    Member,
}

impl CarrierKind {
    /// Classify a raw carrier string. Anything that is not a well-formed
    /// mobile barcode or citizen certificate falls back to the member
    /// carrier rather than failing the invoice.
    pub fn classify(carrier: Option<&str>) -> Self {
        let carrier = carrier.map(str::trim).unwrap_or("");
        if MOBILE_BARCODE.is_match(carrier) {
            CarrierKind::MobileBarcode(carrier.to_string())
        } else if CITIZEN_CERTIFICATE.is_match(carrier) {
            CarrierKind::CitizenCertificate(carrier.to_string())
        } else {
            CarrierKind::Member
        }
    }

    /// Wire code the invoice service expects
    pub fn type_code(&self) -> u8 {
        match self {
            CarrierKind::Member => 0,
            CarrierKind::MobileBarcode(_) => 1,
            CarrierKind::CitizenCertificate(_) => 2,
        }
    }

    /// Carrier number sent alongside the type code, empty for member
    pub fn number(&self) -> &str {
        match self {
            CarrierKind::Member => "",
            CarrierKind::MobileBarcode(number) => number,
            CarrierKind::CitizenCertificate(number) => number,
        }
    }

    /// Member carriers notify the buyer by email; physical carriers
    /// do not.
    pub fn notify_by_email(&self) -> bool {
        matches!(self, CarrierKind::Member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_barcode_is_recognized() {
        let kind = CarrierKind::classify(Some("/ABC+123"));
        assert_eq!(kind, CarrierKind::MobileBarcode("/ABC+123".to_string()));
        assert_eq!(kind.type_code(), 1);
        assert!(!kind.notify_by_email());
    }

    #[test]
    fn citizen_certificate_is_recognized() {
        let kind = CarrierKind::classify(Some("AB12345678901234"));
        assert_eq!(
            kind,
            CarrierKind::CitizenCertificate("AB12345678901234".to_string())
        );
        assert_eq!(kind.type_code(), 2);
    }

    #[test]
    fn everything_else_is_member() {
        for carrier in [
            Some("foo@bar"),
            Some(""),
            Some("/TOOLONG123"),
            Some("/abc+123"), // lowercase is invalid
            Some("A112345678901234"),
            None,
        ] {
            let kind = CarrierKind::classify(carrier);
            assert_eq!(kind, CarrierKind::Member, "carrier {:?}", carrier);
            assert_eq!(kind.type_code(), 0);
            assert!(kind.notify_by_email());
        }
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let kind = CarrierKind::classify(Some("  /ABC+123  "));
        assert_eq!(kind.number(), "/ABC+123");
    }
}
