/** ------------------------------------------------------------
 * Security summary strings.
 *
 * A display heuristic over the (authentication, cipher) pair the
 * driver reports. It is not a protocol-accurate classifier.
 * ------------------------------------------------------------- */
use crate::ie::CipherSuites;

/**
 * 802.11 authentication algorithm as named by the WLAN/NDIS APIs
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AuthAlgorithm {
    Open,
    SharedKey,
    Wpa,
    WpaPsk,
    WpaNone,
    Rsna,
    RsnaPsk,
}

impl AuthAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthAlgorithm::Open => "IEEE80211_Open",
            AuthAlgorithm::SharedKey => "IEEE80211_SharedKey",
            AuthAlgorithm::Wpa => "WPA",
            AuthAlgorithm::WpaPsk => "WPA_PSK",
            AuthAlgorithm::WpaNone => "WPA_NONE",
            AuthAlgorithm::Rsna => "RSNA",
            AuthAlgorithm::RsnaPsk => "RSNA_PSK",
        }
    }
}

/**
 * 802.11 cipher algorithm as named by the WLAN/NDIS APIs
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CipherAlgorithm {
    None,
    Wep40,
    Tkip,
    Ccmp,
    Wep104,
    WpaUseGroup,
    RsnUseGroup,
    Wep,
}

impl CipherAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            CipherAlgorithm::None => "None",
            CipherAlgorithm::Wep40 => "WEP40",
            CipherAlgorithm::Tkip => "TKIP",
            CipherAlgorithm::Ccmp => "CCMP",
            CipherAlgorithm::Wep104 => "WEP104",
            CipherAlgorithm::WpaUseGroup => "WPA_UseGroup",
            CipherAlgorithm::RsnUseGroup => "RSN_UseGroup",
            CipherAlgorithm::Wep => "WEP",
        }
    }

    /// Map an RSN / WPA cipher suite type to a cipher.
    fn from_suite_type(suite: u8, use_group: CipherAlgorithm) -> CipherAlgorithm {
        match suite {
            1 => CipherAlgorithm::Wep40,
            2 => CipherAlgorithm::Tkip,
            4 => CipherAlgorithm::Ccmp,
            5 => CipherAlgorithm::Wep104,
            _ => use_group,
        }
    }
}

// AKM suite types that use a pre-shared key (PSK, PSK-SHA256, SAE)
const PSK_AKM_SUITES: [u8; 3] = [2, 6, 8];

/**
 * Derive the (authentication, cipher) pair of a BSS from its privacy
 * capability bit and its RSN / WPA elements. RSN wins over WPA.
 */
pub fn classify(
    privacy: bool,
    rsn: Option<&CipherSuites>,
    wpa: Option<&CipherSuites>,
) -> (AuthAlgorithm, CipherAlgorithm) {
    if let Some(rsn) = rsn {
        let auth = match rsn.akm {
            Some(akm) if PSK_AKM_SUITES.contains(&akm) => AuthAlgorithm::RsnaPsk,
            _ => AuthAlgorithm::Rsna,
        };
        let cipher = match rsn.pairwise {
            Some(suite) => CipherAlgorithm::from_suite_type(suite, CipherAlgorithm::RsnUseGroup),
            None => CipherAlgorithm::RsnUseGroup,
        };
        return (auth, cipher);
    }

    if let Some(wpa) = wpa {
        let auth = match wpa.akm {
            Some(2) => AuthAlgorithm::WpaPsk,
            _ => AuthAlgorithm::Wpa,
        };
        let cipher = match wpa.pairwise {
            Some(suite) => CipherAlgorithm::from_suite_type(suite, CipherAlgorithm::WpaUseGroup),
            None => CipherAlgorithm::WpaUseGroup,
        };
        return (auth, cipher);
    }

    if privacy {
        (AuthAlgorithm::Open, CipherAlgorithm::Wep)
    } else {
        (AuthAlgorithm::Open, CipherAlgorithm::None)
    }
}

/**
 * Build the human-readable security summary for an
 * (authentication, cipher) name pair.
 *
 * The substitutions run in a fixed order; an empty result means the
 * network is open.
 */
pub fn security_summary(authentication: &str, cipher: &str) -> String {
    let text = format!("{authentication}-{cipher}")
        .replace("RSNA", "WPA2")
        .replace("_PSK-CCMP", "-Personal")
        .replace("_PSK-TKIP", "-Personal")
        .replace("CCMP", "Enterprise")
        .replace("IEEE80211_", "")
        .replace("None", "")
        .replace("Open", "")
        .replace("WEP40", "WEP")
        .replace("WEP104", "WEP");

    let text = text.trim_matches('-');
    if text.is_empty() {
        "Open".to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn personal_networks() {
        assert_eq!(security_summary("RSNA_PSK", "CCMP"), "WPA2-Personal");
        assert_eq!(security_summary("WPA2_PSK", "CCMP"), "WPA2-Personal");
        assert_eq!(security_summary("WPA_PSK", "TKIP"), "WPA-Personal");
        assert_eq!(security_summary("RSNA_PSK", "TKIP"), "WPA2-Personal");
    }

    #[test]
    fn enterprise_networks() {
        assert_eq!(security_summary("RSNA", "CCMP"), "WPA2-Enterprise");
        assert_eq!(security_summary("WPA", "TKIP"), "WPA-TKIP");
    }

    #[test]
    fn open_networks() {
        assert_eq!(security_summary("Open", "None"), "Open");
        assert_eq!(security_summary("IEEE80211_Open", "None"), "Open");
        assert_eq!(security_summary("", ""), "Open");
    }

    #[test]
    fn wep_collapses() {
        assert_eq!(security_summary("IEEE80211_Open", "WEP40"), "WEP");
        assert_eq!(security_summary("IEEE80211_Open", "WEP104"), "WEP");
        assert_eq!(security_summary("IEEE80211_SharedKey", "WEP104"), "SharedKey-WEP");
    }

    #[test]
    fn typed_pairs() {
        let summary = |auth: AuthAlgorithm, cipher: CipherAlgorithm| {
            security_summary(auth.as_str(), cipher.as_str())
        };
        assert_eq!(summary(AuthAlgorithm::RsnaPsk, CipherAlgorithm::Ccmp), "WPA2-Personal");
        assert_eq!(summary(AuthAlgorithm::Open, CipherAlgorithm::None), "Open");
        assert_eq!(summary(AuthAlgorithm::Open, CipherAlgorithm::Wep), "WEP");
    }

    #[test]
    fn classify_prefers_rsn() {
        let rsn = CipherSuites {
            group: Some(4),
            pairwise: Some(4),
            akm: Some(2),
        };
        let wpa = CipherSuites {
            group: Some(2),
            pairwise: Some(2),
            akm: Some(2),
        };
        assert_eq!(
            classify(true, Some(&rsn), Some(&wpa)),
            (AuthAlgorithm::RsnaPsk, CipherAlgorithm::Ccmp)
        );
        assert_eq!(
            classify(true, None, Some(&wpa)),
            (AuthAlgorithm::WpaPsk, CipherAlgorithm::Tkip)
        );
    }

    #[test]
    fn classify_without_security_elements() {
        assert_eq!(classify(true, None, None), (AuthAlgorithm::Open, CipherAlgorithm::Wep));
        assert_eq!(classify(false, None, None), (AuthAlgorithm::Open, CipherAlgorithm::None));
    }

    #[test]
    fn classify_enterprise_rsn() {
        let rsn = CipherSuites {
            group: Some(4),
            pairwise: Some(4),
            akm: Some(1),
        };
        let (auth, cipher) = classify(true, Some(&rsn), None);
        assert_eq!(security_summary(auth.as_str(), cipher.as_str()), "WPA2-Enterprise");
    }
}
