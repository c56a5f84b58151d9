//! Minimal DER/ASN.1 Subject-RDN extraction for the PKCS#12-style credential
//! format described in §6: "Base64-encoded PKCS#12 with CN=anything,
//! OU=userId, O=tenantId."
//!
//! This does not parse a full PKCS#12 (PFX) container — that needs a native
//! TLS/PKCS#12 stack this crate's dependency tree doesn't otherwise carry
//! (see DESIGN.md). Instead it walks the DER bytes looking for the two
//! attribute-type OIDs the credential format actually uses (`O`, `OU`) and
//! decodes the value immediately following each, the same way the teacher
//! hand-rolls a narrow parser rather than adding a heavy dependency for one
//! feature (`llm/sse.rs`'s hand-rolled SSE frame parsing).
//!
//! Encrypted/password-protected containers are out of scope; this only
//! handles the unencrypted leaf-certificate case the spec's CN/OU/O
//! description covers.

use crate::error::{Error, Result};

/// DER encoding of OID 2.5.4.10 (`organizationName`), tag+length included.
const OID_ORGANIZATION: &[u8] = &[0x06, 0x03, 0x55, 0x04, 0x0A];
/// DER encoding of OID 2.5.4.11 (`organizationalUnitName`), tag+length included.
const OID_ORGANIZATIONAL_UNIT: &[u8] = &[0x06, 0x03, 0x55, 0x04, 0x0B];

/// Extracted Subject fields: `(organization, organizational_unit)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectFields {
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
}

/// Decode a base64-encoded certificate credential and extract its Subject
/// `O`/`OU` fields.
pub fn parse_credential(base64_credential: &str) -> Result<SubjectFields> {
    use base64::Engine;
    let der = base64::engine::general_purpose::STANDARD
        .decode(base64_credential.trim())
        .map_err(|e| Error::validation(format!("credential is not valid base64: {}", e)))?;

    Ok(SubjectFields {
        organization: find_attribute_value(&der, OID_ORGANIZATION),
        organizational_unit: find_attribute_value(&der, OID_ORGANIZATIONAL_UNIT),
    })
}

/// Scan `der` for `oid`'s encoded bytes, then decode the DER string value
/// (`PrintableString`, `UTF8String`, `IA5String`, or `T61String`) that
/// immediately follows it — the layout of an `AttributeTypeAndValue
/// SEQUENCE { type OBJECT IDENTIFIER, value ANY }`.
fn find_attribute_value(der: &[u8], oid: &[u8]) -> Option<String> {
    let mut search_from = 0;
    while let Some(relative) = find_subslice(&der[search_from..], oid) {
        let match_start = search_from + relative;
        let after_oid = match_start + oid.len();
        if let Some(value) = parse_der_string(der, after_oid) {
            return Some(value);
        }
        search_from = after_oid;
    }
    None
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Parse one DER TLV (tag, length, value) at `offset`, returning the
/// decoded string if the tag is a recognized ASN.1 string type.
fn parse_der_string(der: &[u8], offset: usize) -> Option<String> {
    let tag = *der.get(offset)?;
    const PRINTABLE_STRING: u8 = 0x13;
    const UTF8_STRING: u8 = 0x0C;
    const IA5_STRING: u8 = 0x16;
    const T61_STRING: u8 = 0x14;
    if !matches!(tag, PRINTABLE_STRING | UTF8_STRING | IA5_STRING | T61_STRING) {
        return None;
    }

    let (length, value_start) = parse_der_length(der, offset + 1)?;
    let value_end = value_start.checked_add(length)?;
    let bytes = der.get(value_start..value_end)?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

/// Parse a DER length field (short or long form) starting at `offset`,
/// returning `(length, offset_of_value)`.
fn parse_der_length(der: &[u8], offset: usize) -> Option<(usize, usize)> {
    let first = *der.get(offset)?;
    if first & 0x80 == 0 {
        return Some((first as usize, offset + 1));
    }
    let num_bytes = (first & 0x7F) as usize;
    if num_bytes == 0 || num_bytes > std::mem::size_of::<usize>() {
        return None;
    }
    let mut length: usize = 0;
    for i in 0..num_bytes {
        length = (length << 8) | (*der.get(offset + 1 + i)? as usize);
    }
    Some((length, offset + 1 + num_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal DER `AttributeTypeAndValue SEQUENCE { OID, PrintableString }`
    /// for test purposes, without a full ASN.1 writer.
    fn encode_attribute(oid: &[u8], value: &str) -> Vec<u8> {
        let mut attr_value = vec![0x13, value.len() as u8];
        attr_value.extend_from_slice(value.as_bytes());

        let mut inner = Vec::new();
        inner.extend_from_slice(oid);
        inner.extend_from_slice(&attr_value);

        let mut seq = vec![0x30, inner.len() as u8];
        seq.extend_from_slice(&inner);
        seq
    }

    #[test]
    fn extracts_organization_and_unit_from_der() {
        let mut der = Vec::new();
        der.extend(encode_attribute(OID_ORGANIZATION, "acme-tenant"));
        der.extend(encode_attribute(OID_ORGANIZATIONAL_UNIT, "user-42"));

        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&der);
        let fields = parse_credential(&encoded).unwrap();
        assert_eq!(fields.organization.as_deref(), Some("acme-tenant"));
        assert_eq!(fields.organizational_unit.as_deref(), Some("user-42"));
    }

    #[test]
    fn invalid_base64_is_a_validation_error() {
        let err = parse_credential("not base64 !!!").unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn missing_fields_resolve_to_none() {
        use base64::Engine;
        let der = encode_attribute(OID_ORGANIZATION, "only-tenant");
        let encoded = base64::engine::general_purpose::STANDARD.encode(&der);
        let fields = parse_credential(&encoded).unwrap();
        assert_eq!(fields.organization.as_deref(), Some("only-tenant"));
        assert_eq!(fields.organizational_unit, None);
    }
}
