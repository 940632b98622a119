use bech32::{Bech32, Hrp};

const HRP: Hrp = Hrp::parse_unchecked("lnurl");

/// Encodes a URL as an LNURL: bech32 with the `lnurl` prefix, upper-cased for compact QR codes.
pub fn encode(url: &str) -> Result<String, bech32::EncodeError> {
    bech32::encode_upper::<Bech32>(HRP, url.as_bytes())
}
