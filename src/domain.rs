//! Email-domain resolution: registration country/organization and MX
//! diagnostics.

pub mod dns;
pub mod registration;
pub mod resolver;

pub use dns::{DnsMxLookup, MxResolver};
pub use registration::{
    parse_registration, LookupError, RegistrationLookup, RegistrationRecord, WhoisLookup,
};
pub use resolver::{extract_domain, is_free_mail, DomainInfo, DomainResolver, FREE_MAIL_DOMAINS};
