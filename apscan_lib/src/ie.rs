/** ------------------------------------------------------------
 * Information element decoding from a BSS record's IE blob.
 * ------------------------------------------------------------- */
use crate::ht_capability::HtCapability;
use crate::util::ByteCursor;

pub mod element_id {
    pub const SSID: u8 = 0;
    pub const SUPPORTED_RATES: u8 = 1;
    pub const DS_PARAMETER_SET: u8 = 3;
    pub const HT_CAPABILITIES: u8 = 45;
    pub const RSN: u8 = 48;
    pub const EXTENDED_SUPPORTED_RATES: u8 = 50;
    pub const VENDOR_SPECIFIC: u8 = 221;
}

const WFA_OUI: [u8; 3] = [0x00, 0x50, 0xf2];
const WPA_VENDOR_TYPE: u8 = 0x01;
const BROADCOM_OUI: [u8; 3] = [0x00, 0x90, 0x4c];
const PRE_STANDARD_HT_CAP_TYPE: u8 = 0x33;

/**
 * One tagged element: id, length byte, payload
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InformationElement<'a> {
    pub element_id: u8,
    pub payload: &'a [u8],
}

impl<'a> InformationElement<'a> {
    /**
     * Split a vendor-specific payload into (OUI, vendor type, body).
     */
    pub fn vendor(&self) -> Option<([u8; 3], u8, &'a [u8])> {
        if self.element_id != element_id::VENDOR_SPECIFIC {
            return None;
        }
        let mut cursor = ByteCursor::new(self.payload);
        let oui = cursor.read_array::<3>()?;
        let vendor_type = cursor.read_u8()?;
        Some((oui, vendor_type, cursor.rest()))
    }

    /// Body of an HT capabilities element, standard or pre-standard.
    fn ht_capability_body(&self) -> Option<&'a [u8]> {
        match self.element_id {
            element_id::HT_CAPABILITIES => Some(self.payload),
            element_id::VENDOR_SPECIFIC => match self.vendor()? {
                (BROADCOM_OUI, PRE_STANDARD_HT_CAP_TYPE, body) => Some(body),
                _ => None,
            },
            _ => None,
        }
    }
}

/**
 * Iterator over the elements of an IE blob
 *
 * Stops at the declared region length. An element whose length byte
 * claims more than what is left ends the iteration; it is dropped, not
 * reported as an error.
 */
pub struct IeReader<'a> {
    cursor: ByteCursor<'a>,
}

impl<'a> IeReader<'a> {
    pub fn new(bytes: &'a [u8], declared_len: usize) -> Self {
        Self {
            cursor: ByteCursor::with_limit(bytes, declared_len),
        }
    }
}

impl<'a> Iterator for IeReader<'a> {
    type Item = InformationElement<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.remaining() < 2 {
            return None;
        }

        let offset = self.cursor.position();
        let header = self.cursor.read_array::<2>()?;
        let [element_id, len] = header;
        match self.cursor.read_bytes(len as usize) {
            Some(payload) => Some(InformationElement {
                element_id,
                payload,
            }),
            None => {
                tracing::trace!(
                    element_id,
                    offset,
                    declared = len,
                    available = self.cursor.remaining(),
                    "truncated information element"
                );
                self.cursor = ByteCursor::new(&[]);
                None
            }
        }
    }
}

/**
 * Decode an IE blob into its ordered elements
 */
pub fn parse_ies(bytes: &[u8], declared_len: usize) -> Vec<InformationElement<'_>> {
    IeReader::new(bytes, declared_len).collect()
}

/**
 * Find and decode the first well-formed HT capabilities element
 */
pub fn ht_capability(bytes: &[u8], declared_len: usize) -> Option<HtCapability> {
    IeReader::new(bytes, declared_len)
        .find_map(|ie| ie.ht_capability_body().and_then(HtCapability::from_bytes))
}

/**
 * Leading cipher / AKM suite types from an RSN or WPA element
 *
 * Only the suite type byte is kept; the first entry of each list wins.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CipherSuites {
    pub group: Option<u8>,
    pub pairwise: Option<u8>,
    pub akm: Option<u8>,
}

impl CipherSuites {
    /**
     * Parse from the bytes following the element header (RSN) or the
     * vendor OUI/type (WPA). Fields after the version are optional and
     * a truncated list keeps what was read so far.
     */
    pub fn parse(body: &[u8]) -> Option<Self> {
        let mut cursor = ByteCursor::new(body);
        let _version = cursor.read_u16_le()?;

        let mut suites = CipherSuites {
            group: Self::read_suite(&mut cursor),
            ..Default::default()
        };
        if suites.group.is_none() {
            return Some(suites);
        }

        suites.pairwise = Self::read_suite_list(&mut cursor);
        suites.akm = Self::read_suite_list(&mut cursor);
        Some(suites)
    }

    fn read_suite(cursor: &mut ByteCursor) -> Option<u8> {
        let selector = cursor.read_array::<4>()?;
        Some(selector[3])
    }

    fn read_suite_list(cursor: &mut ByteCursor) -> Option<u8> {
        let count = cursor.read_u16_le()?;
        let mut first = None;
        for _ in 0..count {
            let suite = Self::read_suite(cursor)?;
            first.get_or_insert(suite);
        }
        first
    }
}

/**
 * Everything the normalizer and the capture backend read from an IE blob
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedIes {
    pub ssid: Option<Vec<u8>>,
    pub supported_rates: Vec<u8>,
    pub extended_rates: Vec<u8>,
    pub ds_channel: Option<u8>,
    pub ht: Option<HtCapability>,
    pub rsn: Option<CipherSuites>,
    pub wpa: Option<CipherSuites>,
}

/**
 * Single pass over the blob collecting the elements of interest. The
 * first occurrence of each element wins.
 */
pub fn decode_ies(bytes: &[u8], declared_len: usize) -> DecodedIes {
    let mut decoded = DecodedIes::default();

    for ie in IeReader::new(bytes, declared_len) {
        match ie.element_id {
            element_id::SSID if decoded.ssid.is_none() => {
                decoded.ssid = Some(ie.payload.to_vec());
            }
            element_id::SUPPORTED_RATES if decoded.supported_rates.is_empty() => {
                decoded.supported_rates = ie.payload.to_vec();
            }
            element_id::EXTENDED_SUPPORTED_RATES if decoded.extended_rates.is_empty() => {
                decoded.extended_rates = ie.payload.to_vec();
            }
            element_id::DS_PARAMETER_SET if decoded.ds_channel.is_none() => {
                decoded.ds_channel = ie.payload.first().copied();
            }
            element_id::RSN if decoded.rsn.is_none() => {
                decoded.rsn = CipherSuites::parse(ie.payload);
            }
            element_id::HT_CAPABILITIES | element_id::VENDOR_SPECIFIC => {
                if decoded.ht.is_none() {
                    decoded.ht = ie.ht_capability_body().and_then(HtCapability::from_bytes);
                }
                if decoded.wpa.is_none() {
                    if let Some((WFA_OUI, WPA_VENDOR_TYPE, body)) = ie.vendor() {
                        decoded.wpa = CipherSuites::parse(body);
                    }
                }
            }
            _ => {}
        }
    }

    decoded
}
