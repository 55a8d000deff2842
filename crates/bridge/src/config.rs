//! Bridge configuration management

use anyhow::{Context, Result, anyhow};
use protocol::{CHANNELS_PER_UNIVERSE, PortAddress, udmx};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::usb::DeviceIdentity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub node: NodeSettings,
    #[serde(default)]
    pub dmx: DmxSettings,
    #[serde(default)]
    pub usb: UsbSettings,
}

/// Art-Net node identity and listen address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    /// IP address to listen on; None binds all interfaces
    #[serde(default)]
    pub bind_addr: Option<String>,
    /// Short node name reported to controllers (17 bytes on the wire)
    #[serde(default = "NodeSettings::default_short_name")]
    pub short_name: String,
    /// Long node name reported to controllers (63 bytes on the wire)
    #[serde(default = "NodeSettings::default_long_name")]
    pub long_name: String,
    /// Default log level when RUST_LOG is unset
    #[serde(default = "NodeSettings::default_log_level")]
    pub log_level: String,
}

impl NodeSettings {
    fn default_short_name() -> String {
        "udmx-artnet".to_string()
    }

    fn default_long_name() -> String {
        "uDMX ArtNet Proxy".to_string()
    }

    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            bind_addr: None,
            short_name: Self::default_short_name(),
            long_name: Self::default_long_name(),
            log_level: Self::default_log_level(),
        }
    }
}

/// The one output port's universe subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmxSettings {
    /// Art-Net net (0-127)
    #[serde(default)]
    pub net: u8,
    /// Art-Net sub-net (0-15)
    #[serde(default)]
    pub subnet: u8,
    /// Art-Net universe (0-15)
    #[serde(default)]
    pub universe: u8,
    /// 1-based first logical channel frames are written to
    #[serde(default = "DmxSettings::default_channel_start")]
    pub channel_start: u16,
}

impl DmxSettings {
    fn default_channel_start() -> u16 {
        1
    }

    /// The configured port address
    pub fn port_address(&self) -> Result<PortAddress> {
        PortAddress::new(self.net, self.subnet, self.universe)
            .map_err(|e| anyhow!("Invalid [dmx] section: {}", e))
    }
}

impl Default for DmxSettings {
    fn default() -> Self {
        Self {
            net: 0,
            subnet: 0,
            universe: 0,
            channel_start: Self::default_channel_start(),
        }
    }
}

/// Which device to bind and how to talk to it
///
/// The defaults identify a genuine uDMX; clones that report different
/// descriptor strings can be matched by overriding them here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsbSettings {
    #[serde(default = "UsbSettings::default_vendor_id")]
    pub vendor_id: u16,
    #[serde(default = "UsbSettings::default_product_id")]
    pub product_id: u16,
    /// Manufacturer descriptor string the device must report
    #[serde(default = "UsbSettings::default_manufacturer")]
    pub manufacturer: String,
    /// Product descriptor string the device must report
    #[serde(default = "UsbSettings::default_product")]
    pub product: String,
    /// Per-transfer timeout in milliseconds
    #[serde(default = "UsbSettings::default_transfer_timeout_ms")]
    pub transfer_timeout_ms: u64,
}

impl UsbSettings {
    fn default_vendor_id() -> u16 {
        udmx::UDMX_SHARED_VENDOR_ID
    }

    fn default_product_id() -> u16 {
        udmx::UDMX_SHARED_PRODUCT_ID
    }

    fn default_manufacturer() -> String {
        udmx::UDMX_MANUFACTURER.to_string()
    }

    fn default_product() -> String {
        udmx::UDMX_PRODUCT.to_string()
    }

    fn default_transfer_timeout_ms() -> u64 {
        1000
    }

    /// The identity the device scan matches against
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            manufacturer: self.manufacturer.clone(),
            product: self.product.clone(),
        }
    }
}

impl Default for UsbSettings {
    fn default() -> Self {
        Self {
            vendor_id: Self::default_vendor_id(),
            product_id: Self::default_product_id(),
            manufacturer: Self::default_manufacturer(),
            product: Self::default_product(),
            transfer_timeout_ms: Self::default_transfer_timeout_ms(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            node: NodeSettings::default(),
            dmx: DmxSettings::default(),
            usb: UsbSettings::default(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/udmx-artnet/bridge.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: BridgeConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Falling back to default config: {}", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("udmx-artnet").join("bridge.toml")
        } else {
            PathBuf::from(".config/udmx-artnet/bridge.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.node.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.node.log_level,
                valid_levels.join(", ")
            ));
        }

        if let Some(addr) = &self.node.bind_addr {
            addr.parse::<IpAddr>()
                .map_err(|_| anyhow!("Invalid bind address '{}', expected an IP address", addr))?;
        }

        self.dmx.port_address()?;

        if self.dmx.channel_start == 0 || self.dmx.channel_start as usize > CHANNELS_PER_UNIVERSE {
            return Err(anyhow!(
                "Invalid channel_start {}, must be 1-{}",
                self.dmx.channel_start,
                CHANNELS_PER_UNIVERSE
            ));
        }

        if self.usb.manufacturer.is_empty() || self.usb.product.is_empty() {
            return Err(anyhow!(
                "USB manufacturer and product strings must not be empty"
            ));
        }

        if self.usb.transfer_timeout_ms == 0 {
            return Err(anyhow!("transfer_timeout_ms must be greater than 0"));
        }

        Ok(())
    }
}
