use serde::{Deserialize, Serialize};

/// What a client tool presents when it activates or verifies a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFingerprint {
    pub hwid: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
}

impl DeviceFingerprint {
    pub fn new(hwid: impl Into<String>) -> Self {
        Self {
            hwid: hwid.into(),
            ip: None,
            mac: None,
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = Some(mac.into());
        self
    }
}

/// The device a license is locked to. `hwid` never changes after the first bind;
/// `ip` and `mac` track the most recent successful activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBinding {
    pub hwid: String,
    pub ip: Option<String>,
    pub mac: Option<String>,
}

impl DeviceBinding {
    /// Binding written by an activation: keeps the bound hwid if there is one.
    pub fn for_activation(existing: Option<&DeviceBinding>, device: &DeviceFingerprint) -> Self {
        let hwid = match existing {
            Some(binding) => binding.hwid.clone(),
            None => device.hwid.clone(),
        };
        Self {
            hwid,
            ip: device
                .ip
                .clone()
                .or_else(|| existing.and_then(|b| b.ip.clone())),
            mac: device
                .mac
                .clone()
                .or_else(|| existing.and_then(|b| b.mac.clone())),
        }
    }
}
